//! Rendering of definitions, requests and replies for stdout.

use crate::metadata::{ApiDefinition, ParamBinding};
use crate::request::HttpRequest;
use crate::response::Reply;
use std::fmt::Write;

/// One block per interface, one line per method.
#[must_use]
pub fn describe(definitions: &ApiDefinition) -> String {
    let mut out = String::new();
    for interface in &definitions.interfaces {
        let _ = writeln!(
            out,
            "{}{}",
            interface.name,
            interface
                .path
                .as_deref()
                .map(|p| format!(" ({p})"))
                .unwrap_or_default()
        );
        for method in &interface.methods {
            let params: Vec<String> = method
                .params
                .iter()
                .map(|param| {
                    let kind = param.binding.as_ref().map_or("unbound", ParamBinding::kind);
                    let optional = if param.nullable { "?" } else { "" };
                    format!("{}{optional}: {kind}", param.name)
                })
                .collect();
            let target = match (&method.verb, &method.delegate) {
                (_, Some(delegate)) => format!("-> {delegate}"),
                (Some(verb), None) => format!(
                    "{} {}",
                    verb.to_uppercase(),
                    method.path.as_deref().unwrap_or("/")
                ),
                (None, None) => "?".to_string(),
            };
            let _ = writeln!(out, "  {}({})  {target}", method.name, params.join(", "));
        }
    }
    out
}

/// Request line, headers and body, as for `--dry-run`.
#[must_use]
pub fn request(request: &HttpRequest) -> String {
    let mut out = format!("{request}\n");
    for (name, value) in request.headers().iter() {
        let _ = writeln!(out, "{name}: {value}");
    }
    if let Some(payload) = request.payload() {
        for (name, value) in payload.metadata().to_headers() {
            let _ = writeln!(out, "{name}: {value}");
        }
        let _ = write!(out, "\n{}", payload.body_text());
    }
    out
}

/// Text for a reply; `None` for replies with nothing to show.
#[must_use]
pub fn reply(reply: &Reply) -> Option<String> {
    match reply {
        Reply::Void => None,
        Reply::Null => Some("null".to_string()),
        Reply::Bool(value) => Some(value.to_string()),
        Reply::Text(text) => Some(text.clone()),
        Reply::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Reply::Uri(uri) => Some(uri.to_string()),
        Reply::Json(value) => {
            Some(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
        }
        Reply::Response(response) => Some(format!(
            "{} {}\n{}",
            response.status(),
            response.message(),
            response.body_text()
        )),
    }
}
