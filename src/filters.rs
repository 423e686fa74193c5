//! Request filters: order-sensitive rewrites applied just before sealing.
//!
//! A request may be replayed, so every filter must give the same result when
//! applied to its own output. The built-ins replace headers instead of
//! appending them.

use crate::constants;
use crate::error::Error;
use crate::request::HttpRequest;
use base64::Engine as _;

pub trait RequestFilter: Send + Sync {
    /// # Errors
    ///
    /// Fails if the request cannot be rewritten (e.g. missing credentials).
    fn filter(&self, request: HttpRequest) -> Result<HttpRequest, Error>;
}

impl<F> RequestFilter for F
where
    F: Fn(HttpRequest) -> Result<HttpRequest, Error> + Send + Sync,
{
    fn filter(&self, request: HttpRequest) -> Result<HttpRequest, Error> {
        self(request)
    }
}

/// Removes `Expect` so servers never see `100-continue` handshakes.
#[derive(Debug, Default, Clone, Copy)]
pub struct StripExpectHeader;

impl RequestFilter for StripExpectHeader {
    fn filter(&self, mut request: HttpRequest) -> Result<HttpRequest, Error> {
        request.headers_mut().remove(constants::HEADER_EXPECT);
        Ok(request)
    }
}

/// `Authorization: Basic base64(user:password)`
#[derive(Clone)]
pub struct BasicAuthentication {
    header: String,
}

impl BasicAuthentication {
    #[must_use]
    pub fn new(user: &str, password: &str) -> Self {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        Self {
            header: format!("Basic {encoded}"),
        }
    }
}

impl std::fmt::Debug for BasicAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthentication")
            .field("header", &"[REDACTED]")
            .finish()
    }
}

impl RequestFilter for BasicAuthentication {
    fn filter(&self, mut request: HttpRequest) -> Result<HttpRequest, Error> {
        request
            .headers_mut()
            .replace(constants::HEADER_AUTHORIZATION, self.header.clone());
        Ok(request)
    }
}

/// `Authorization: Bearer <token>`
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl RequestFilter for BearerToken {
    fn filter(&self, mut request: HttpRequest) -> Result<HttpRequest, Error> {
        if self.token.is_empty() {
            return Err(Error::configuration("bearer token filter has an empty token"));
        }
        request.headers_mut().replace(
            constants::HEADER_AUTHORIZATION,
            format!("Bearer {}", self.token),
        );
        Ok(request)
    }
}

/// Sets one header to a fixed value.
#[derive(Debug, Clone)]
pub struct SetHeader {
    name: String,
    value: String,
}

impl SetHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl RequestFilter for SetHeader {
    fn filter(&self, mut request: HttpRequest) -> Result<HttpRequest, Error> {
        request.headers_mut().replace(&self.name, self.value.clone());
        Ok(request)
    }
}

/// Records the payload's MD5 digest in its content metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentMd5;

impl RequestFilter for ContentMd5 {
    fn filter(&self, mut request: HttpRequest) -> Result<HttpRequest, Error> {
        if let Some(payload) = request.payload_mut() {
            payload.calculate_md5();
        }
        Ok(request)
    }
}
