use crate::error::Error;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Configuration for timeout behavior
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000, // 10 seconds
            request_timeout_ms: 30_000, // 30 seconds
        }
    }
}

/// Verbs that can be replayed without changing the outcome
#[must_use]
pub fn is_idempotent(method: &str) -> bool {
    matches!(
        method.to_uppercase().as_str(),
        "GET" | "HEAD" | "PUT" | "DELETE" | "OPTIONS"
    )
}

/// Status codes worth another attempt
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    match status {
        // Request Timeout, Too Many Requests
        408 | 429 => true,
        // Exclude Not Implemented, HTTP Version not supported
        500..=599 => !matches!(status, 501 | 505),
        _ => false,
    }
}

/// Determines if an error is retryable based on its characteristics
#[must_use]
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() {
        return true;
    }
    error
        .status()
        .is_some_and(|status| is_retryable_status(status.as_u16()))
}

/// Calculates the delay for a given retry attempt with exponential backoff
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn calculate_retry_delay(config: &RetryConfig, attempt: usize) -> Duration {
    let base_delay = config.initial_delay_ms as f64;
    let attempt_i32 = attempt.min(30) as i32; // Cap attempt to prevent overflow
    let delay_ms =
        (base_delay * config.backoff_multiplier.powi(attempt_i32)).min(config.max_delay_ms as f64);

    let final_delay_ms = if config.jitter {
        // Up to 25% jitter
        let jitter_factor = fastrand::f64().mul_add(0.25, 1.0);
        delay_ms * jitter_factor
    } else {
        delay_ms
    } as u64;

    Duration::from_millis(final_delay_ms)
}

/// Executes an operation with retry logic based on the configuration.
///
/// An `Ok` value for which `retry_result` returns `true` (a 503, say) is
/// retried like a transient error; the last such value is returned as-is so
/// the caller can still inspect it.
///
/// # Errors
/// Returns a transport error for a non-retryable failure, or
/// `RetryLimitExceeded` once every attempt has failed.
pub async fn execute_with_retry<F, Fut, T, R>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    retry_result: R,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, reqwest::Error>>,
    R: Fn(&T) -> bool,
{
    let start_time = Instant::now();
    let max_attempts = config.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..max_attempts {
        let is_last_attempt = attempt + 1 >= max_attempts;
        match operation().await {
            Ok(result) if is_last_attempt || !retry_result(&result) => return Ok(result),
            Ok(_) => {
                debug!(operation = operation_name, attempt, "retrying after retryable response");
            }
            Err(error) => {
                if !is_retryable_error(&error) || max_attempts == 1 {
                    return Err(Error::transport(operation_name, error.to_string()));
                }
                warn!(operation = operation_name, attempt, error = %error, "request attempt failed");
                last_error = Some(error.to_string());
                if is_last_attempt {
                    break;
                }
            }
        }
        sleep(calculate_retry_delay(config, attempt)).await;
    }

    let duration = start_time.elapsed();
    Err(Error::RetryLimitExceeded {
        attempts: max_attempts,
        #[allow(clippy::cast_possible_truncation)]
        duration_ms: duration.as_millis().min(u128::from(u64::MAX)) as u64,
        last_error: last_error.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Creates a resilient HTTP client with timeout configuration
///
/// # Errors
/// Returns an error if the HTTP client cannot be created with the specified configuration
pub fn create_resilient_client(
    timeout_config: &TimeoutConfig,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, Error> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(timeout_config.connect_timeout_ms))
        .timeout(Duration::from_millis(timeout_config.request_timeout_ms));
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent.to_string());
    }
    builder
        .build()
        .map_err(|e| Error::configuration(format!("Failed to create resilient HTTP client: {e}")))
}
