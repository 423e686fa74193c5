//! Raw HTTP responses and the typed replies produced from them.

use bytes::Bytes;
use crate::constants;
use crate::request::Headers;
use serde::Serialize;
use serde_json::Value;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    message: String,
    headers: Headers,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(constants::HEADER_CONTENT_TYPE)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// The value a dispatched method returns, shaped by its declared return kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Void,
    Null,
    Bool(bool),
    Text(String),
    Bytes(Bytes),
    Uri(Url),
    Json(Value),
    Response(HttpResponse),
}

impl Reply {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Json(Value::Null))
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) | Self::Json(Value::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Json(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// JSON rendering of any reply, used for printing.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Void | Self::Null => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Text(text) => Value::String(text.clone()),
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            Self::Uri(url) => Value::String(url.to_string()),
            Self::Json(value) => value.clone(),
            Self::Response(response) => serde_json::to_value(ResponseSummary::from(response))
                .unwrap_or(Value::Null),
        }
    }
}

#[derive(Serialize)]
struct ResponseSummary {
    status: u16,
    message: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl From<&HttpResponse> for ResponseSummary {
    fn from(response: &HttpResponse) -> Self {
        Self {
            status: response.status(),
            message: response.message().to_string(),
            headers: response
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: response.body_text(),
        }
    }
}
