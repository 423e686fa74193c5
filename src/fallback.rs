//! Fallback policies: what a failed call turns into.
//!
//! A policy sees every recoverable failure of a method (transport, HTTP
//! status, transform, timeout, cancellation) exactly once and either returns
//! a substitute reply or propagates an error. Declaring a policy on a method
//! replaces the default one outright.

use crate::error::Error;
use crate::response::Reply;
use serde_json::Value;
use tracing::debug;

pub trait Fallback: Send + Sync {
    /// # Errors
    ///
    /// Returns the (possibly reclassified) error when no substitute applies.
    fn create_or_propagate(&self, error: Error) -> Result<Reply, Error>;
}

impl<F> Fallback for F
where
    F: Fn(Error) -> Result<Reply, Error> + Send + Sync,
{
    fn create_or_propagate(&self, error: Error) -> Result<Reply, Error> {
        self(error)
    }
}

/// Default policy: reclassify 401/403, 404 and 409; propagate everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapHttp4xxCodesToErrors;

impl Fallback for MapHttp4xxCodesToErrors {
    fn create_or_propagate(&self, error: Error) -> Result<Reply, Error> {
        Err(match error {
            Error::Http {
                method,
                status: status @ (401 | 403),
                body,
                ..
            } => Error::Authorization {
                method,
                status,
                body,
            },
            Error::Http {
                method,
                status: 404,
                body,
                ..
            } => Error::ResourceNotFound { method, body },
            Error::Http {
                method,
                status: 409,
                body,
                ..
            } => Error::IllegalState {
                method,
                status: 409,
                body,
            },
            other => other,
        })
    }
}

fn is_not_found(error: &Error) -> bool {
    error.status() == Some(404)
}

/// Substitutes a fixed reply when the failure was a 404.
#[derive(Debug, Clone)]
pub struct OnNotFound {
    substitute: Reply,
}

impl OnNotFound {
    #[must_use]
    pub const fn new(substitute: Reply) -> Self {
        Self { substitute }
    }

    #[must_use]
    pub const fn null() -> Self {
        Self::new(Reply::Null)
    }

    #[must_use]
    pub const fn void() -> Self {
        Self::new(Reply::Void)
    }

    #[must_use]
    pub const fn value(value: bool) -> Self {
        Self::new(Reply::Bool(value))
    }

    #[must_use]
    pub const fn empty_list() -> Self {
        Self::new(Reply::Json(Value::Array(Vec::new())))
    }
}

impl Fallback for OnNotFound {
    fn create_or_propagate(&self, error: Error) -> Result<Reply, Error> {
        if is_not_found(&error) {
            debug!(substitute = ?self.substitute, "substituting reply for 404");
            return Ok(self.substitute.clone());
        }
        Err(error)
    }
}

/// `null` when the call timed out.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOnTimeout;

impl Fallback for NullOnTimeout {
    fn create_or_propagate(&self, error: Error) -> Result<Reply, Error> {
        match error {
            Error::Timeout { .. } => Ok(Reply::Null),
            other => Err(other),
        }
    }
}

/// Propagates every failure untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Propagate;

impl Fallback for Propagate {
    fn create_or_propagate(&self, error: Error) -> Result<Reply, Error> {
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn http(status: u16) -> Error {
        Error::Http {
            method: "Api.get".into(),
            status,
            message: "boom".into(),
            body: Some("details".into()),
        }
    }

    #[test]
    fn default_policy_classifies_4xx() {
        let policy = MapHttp4xxCodesToErrors;
        assert!(matches!(
            policy.create_or_propagate(http(401)),
            Err(Error::Authorization { status: 401, .. })
        ));
        assert!(matches!(
            policy.create_or_propagate(http(403)),
            Err(Error::Authorization { status: 403, .. })
        ));
        assert!(matches!(
            policy.create_or_propagate(http(404)),
            Err(Error::ResourceNotFound { .. })
        ));
        assert!(matches!(
            policy.create_or_propagate(http(409)),
            Err(Error::IllegalState { .. })
        ));
        assert!(matches!(
            policy.create_or_propagate(http(500)),
            Err(Error::Http { status: 500, .. })
        ));
    }

    #[test]
    fn not_found_policies_only_cover_404() {
        assert_eq!(OnNotFound::null().create_or_propagate(http(404)).unwrap(), Reply::Null);
        assert_eq!(
            OnNotFound::value(false).create_or_propagate(http(404)).unwrap(),
            Reply::Bool(false)
        );
        assert!(OnNotFound::null().create_or_propagate(http(500)).is_err());
        let classified = Error::ResourceNotFound {
            method: "Api.get".into(),
            body: None,
        };
        assert!(OnNotFound::void().create_or_propagate(classified).is_ok());
    }

    #[test]
    fn null_on_timeout_ignores_other_errors() {
        let timeout = Error::Timeout {
            method: "Api.get".into(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(NullOnTimeout.create_or_propagate(timeout).unwrap(), Reply::Null);
        assert!(NullOnTimeout.create_or_propagate(http(404)).is_err());
    }
}
