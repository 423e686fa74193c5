//! Request and response logging with automatic secret redaction.
//!
//! Sensitive headers (authorization, API keys, tokens) are never written out;
//! bodies are logged at trace level and truncated to `HTTPBIND_LOG_MAX_BODY`
//! characters.

use crate::constants;
use crate::request::{Headers, HttpRequest};
use crate::response::HttpResponse;
use tracing::{debug, info, trace};

const TARGET: &str = "httpbind::transport";

/// Redacts sensitive values from strings
#[must_use]
pub fn redact_sensitive_value(value: &str) -> String {
    if value.is_empty() {
        value.to_string()
    } else {
        "[REDACTED]".to_string()
    }
}

/// Checks if a header name should be redacted
#[must_use]
pub fn should_redact_header(header_name: &str) -> bool {
    if constants::is_auth_header(header_name) {
        return true;
    }
    matches!(
        header_name.to_lowercase().as_str(),
        "x-access-token" | "api_key" | "secret" | "password" | "x-secret-token" | "x-webhook-secret"
    )
}

fn log_headers(label: &str, headers: &Headers) {
    if headers.is_empty() {
        return;
    }
    debug!(target: TARGET, "{label} headers:");
    for (name, value) in headers.iter() {
        let display_value = if should_redact_header(name) {
            redact_sensitive_value(value)
        } else {
            value.to_string()
        };
        debug!(target: TARGET, "  {name}: {display_value}");
    }
}

fn log_body(label: &str, body: &str, max_body_len: usize) {
    if body.is_empty() {
        return;
    }
    match body.char_indices().nth(max_body_len) {
        Some((cut, _)) => trace!(
            target: TARGET,
            "{label} body: {} (truncated at {max_body_len} chars)",
            &body[..cut]
        ),
        None => trace!(target: TARGET, "{label} body: {body}"),
    }
}

/// Logs a sealed request: request line at info, headers at debug, body at trace
pub fn log_request(request: &HttpRequest, max_body_len: usize) {
    info!(target: TARGET, "→ {}", request.request_line());
    log_headers("Request", request.headers());
    if let Some(payload) = request.payload() {
        for (name, value) in payload.metadata().to_headers() {
            debug!(target: TARGET, "  {name}: {value}");
        }
        log_body("Request", &payload.body_text(), max_body_len);
    }
}

/// Logs a response: status and duration at info, headers at debug, body at trace
pub fn log_response(response: &HttpResponse, duration_ms: u128, max_body_len: usize) {
    info!(
        target: TARGET,
        "← {} {} ({}ms)",
        response.status(),
        response.message(),
        duration_ms
    );
    log_headers("Response", response.headers());
    log_body("Response", &response.body_text(), max_body_len);
}

/// Gets the maximum body length from `HTTPBIND_LOG_MAX_BODY`
#[must_use]
pub fn get_max_body_len() -> usize {
    std::env::var(constants::ENV_HTTPBIND_LOG_MAX_BODY)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1000)
}
