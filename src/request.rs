//! HTTP requests: the generated (still mutable) form and the sealed form.

use crate::constants;
use crate::error::Error;
use crate::filters::RequestFilter;
use crate::invocation::Invocation;
use crate::payload::Payload;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Insertion-ordered header multimap with case-insensitive lookup.
///
/// Duplicate names are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces all values of `name` with a single value.
    pub fn replace(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.entries.push((name.to_string(), value.into()));
    }

    /// Removes every value of `name`, returning them in order.
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|(key, value)| {
            if key.eq_ignore_ascii_case(name) {
                removed.push(value.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// A request ready for (or already through) the filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: String,
    endpoint: Url,
    headers: Headers,
    payload: Option<Payload>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, endpoint: Url) -> Self {
        Self {
            method: method.into(),
            endpoint,
            headers: Headers::new(),
            payload: None,
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        self.payload.as_mut()
    }

    pub fn set_payload(&mut self, payload: Option<Payload>) {
        self.payload = payload;
    }

    /// `Transfer-Encoding: chunked` was requested explicitly.
    #[must_use]
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_all(constants::HEADER_TRANSFER_ENCODING)
            .iter()
            .any(|value| value.eq_ignore_ascii_case(constants::TRANSFER_ENCODING_CHUNKED))
    }

    /// `METHOD url` request line, as used in logs and dry runs.
    #[must_use]
    pub fn request_line(&self) -> String {
        format!("{} {}", self.method, self.endpoint)
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} HTTP/1.1", self.method, self.endpoint)
    }
}

/// A request under construction, still tied to the call that produced it.
#[derive(Clone)]
pub struct GeneratedRequest {
    request: HttpRequest,
    invocation: Invocation,
    caller: Option<Invocation>,
    filters: Vec<Arc<dyn RequestFilter>>,
}

impl GeneratedRequest {
    #[must_use]
    pub fn new(
        request: HttpRequest,
        invocation: Invocation,
        caller: Option<Invocation>,
        filters: Vec<Arc<dyn RequestFilter>>,
    ) -> Self {
        Self {
            request,
            invocation,
            caller,
            filters,
        }
    }

    #[must_use]
    pub const fn request(&self) -> &HttpRequest {
        &self.request
    }

    #[must_use]
    pub const fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    #[must_use]
    pub const fn caller(&self) -> Option<&Invocation> {
        self.caller.as_ref()
    }

    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn RequestFilter>] {
        &self.filters
    }

    /// Runs the filter chain in order, then fixes the content length.
    ///
    /// Content length is omitted when the request forces chunked transfer,
    /// even if it is known.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a filter.
    pub fn seal(self) -> Result<HttpRequest, Error> {
        let mut request = self.request;
        for filter in &self.filters {
            request = filter.filter(request)?;
        }
        let chunked = request.is_chunked();
        if let Some(payload) = request.payload_mut() {
            payload.metadata_mut().content_length = if chunked {
                None
            } else {
                Some(payload.len())
            };
        }
        Ok(request)
    }
}

impl fmt::Debug for GeneratedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedRequest")
            .field("request", &self.request)
            .field("invocation", &self.invocation.to_string())
            .field(
                "caller",
                &self.caller.as_ref().map(ToString::to_string),
            )
            .field("filters", &self.filters.len())
            .finish()
    }
}
