use crate::constants;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or contradictory declarative metadata. Raised at assembly or
    /// first-call time, never offered to a fallback policy.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// A call-time argument that cannot be bound (null required value,
    /// empty host prefix, unresolvable template token, ...).
    #[error("Invalid argument '{param}' (position {position}) for {method}: {reason}")]
    Argument {
        method: String,
        param: String,
        position: usize,
        reason: String,
    },

    #[error("Transport failure for {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("HTTP {status} from {method}: {message}")]
    Http {
        method: String,
        status: u16,
        message: String,
        body: Option<String>,
    },

    #[error("Could not transform the response of {method}: {reason}")]
    Transform { method: String, reason: String },

    #[error("{method} did not complete within {}ms", timeout.as_millis())]
    Timeout { method: String, timeout: Duration },

    #[error("{method} was cancelled before it completed")]
    Cancelled { method: String },

    #[error("Request failed after {attempts} attempts over {duration_ms}ms: {last_error}")]
    RetryLimitExceeded {
        attempts: usize,
        duration_ms: u64,
        last_error: String,
    },

    /// 401 and 403 as classified by the default fallback policy
    #[error("Not authorized to call {method} (HTTP {status})")]
    Authorization {
        method: String,
        status: u16,
        body: Option<String>,
    },

    /// 404 as classified by the default fallback policy
    #[error("Resource not found for {method}")]
    ResourceNotFound { method: String, body: Option<String> },

    /// 409 as classified by the default fallback policy
    #[error("Illegal state for {method} (HTTP {status})")]
    IllegalState {
        method: String,
        status: u16,
        body: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// JSON representation of an error for structured output
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonError {
    pub error_type: String,
    pub message: String,
    pub context: Option<String>,
}

impl Error {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn argument(
        method: impl Into<String>,
        param: impl Into<String>,
        position: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::Argument {
            method: method.into(),
            param: param.into(),
            position,
            reason: reason.into(),
        }
    }

    pub fn transport(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn transform(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transform {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Whether a fallback policy may see this error.
    ///
    /// Configuration and argument errors are programming errors and abort the
    /// call before anything is sent.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Http { .. }
                | Self::Transform { .. }
                | Self::Timeout { .. }
                | Self::Cancelled { .. }
                | Self::RetryLimitExceeded { .. }
                | Self::Authorization { .. }
                | Self::ResourceNotFound { .. }
                | Self::IllegalState { .. }
        )
    }

    /// HTTP status carried by the error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. }
            | Self::Authorization { status, .. }
            | Self::IllegalState { status, .. } => Some(*status),
            Self::ResourceNotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Convert error to JSON representation for structured output
    #[must_use]
    pub fn to_json(&self) -> JsonError {
        let (error_type, context) = match self {
            Self::Configuration { .. } => ("Configuration", Some(constants::ERR_METADATA)),
            Self::Argument { .. } => ("Argument", Some(constants::ERR_ARGUMENT)),
            Self::Transport { .. } => ("Transport", Some(constants::ERR_CONNECTION)),
            Self::Http { status, .. } => (
                "HttpResponse",
                match status {
                    500..=599 => Some(constants::ERR_SERVER_ERROR),
                    _ => None,
                },
            ),
            Self::Transform { .. } => ("Transform", Some(constants::ERR_JSON_SYNTAX)),
            Self::Timeout { .. } => ("Timeout", Some(constants::ERR_TIMEOUT)),
            Self::Cancelled { .. } => ("Cancelled", None),
            Self::RetryLimitExceeded { .. } => ("RetryLimitExceeded", Some(constants::ERR_CONNECTION)),
            Self::Authorization { .. } => ("Authorization", Some(constants::ERR_API_CREDENTIALS)),
            Self::ResourceNotFound { .. } => {
                ("ResourceNotFound", Some(constants::ERR_ENDPOINT_NOT_FOUND))
            }
            Self::IllegalState { .. } => ("IllegalState", Some(constants::ERR_CONFLICT)),
            Self::Io(io_err) => (
                "FileSystem",
                match io_err.kind() {
                    std::io::ErrorKind::NotFound => Some(constants::ERR_FILE_NOT_FOUND),
                    _ => None,
                },
            ),
            Self::Yaml(_) => ("YAMLParsing", Some(constants::ERR_YAML_SYNTAX)),
            Self::Json(_) => ("JSONParsing", Some(constants::ERR_JSON_SYNTAX)),
            Self::Toml(_) => ("TOMLParsing", Some(constants::ERR_TOML_SYNTAX)),
            Self::Anyhow(_) => ("Unexpected", None),
        };

        JsonError {
            error_type: error_type.to_string(),
            message: self.to_string(),
            context: context.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_name_method_and_parameter() {
        let err = Error::argument("Buckets.get", "bucket", 0, "was null");
        let message = err.to_string();
        assert!(message.contains("Buckets.get"));
        assert!(message.contains("'bucket'"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn only_runtime_failures_are_recoverable() {
        assert!(!Error::configuration("no endpoint").is_recoverable());
        assert!(Error::transport("GET http://localhost", "refused").is_recoverable());
        assert!(Error::Timeout {
            method: "Api.get".into(),
            timeout: Duration::from_millis(250),
        }
        .is_recoverable());
    }

    #[test]
    fn json_rendering_carries_context() {
        let err = Error::ResourceNotFound {
            method: "Api.get".into(),
            body: None,
        };
        let json = err.to_json();
        assert_eq!(json.error_type, "ResourceNotFound");
        assert_eq!(err.status(), Some(404));
        assert_eq!(json.context.as_deref(), Some(constants::ERR_ENDPOINT_NOT_FOUND));
    }
}
