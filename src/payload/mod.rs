//! Request payloads and their content metadata.

pub mod multipart;

pub use multipart::{MultipartForm, Part};

use crate::constants;
use base64::Engine as _;
use bytes::Bytes;
use md5::{Digest, Md5};

/// Headers that describe a payload rather than the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMetadata {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    /// Base64 of the MD5 digest, as sent in `Content-MD5`
    pub content_md5: Option<String>,
    pub expires: Option<String>,
}

impl ContentMetadata {
    /// Sets the field matching a content header name.
    ///
    /// Returns `false` if `name` is not a content header.
    pub fn set_from_header(&mut self, name: &str, value: &str) -> bool {
        let slot = if name.eq_ignore_ascii_case(constants::HEADER_CONTENT_TYPE) {
            &mut self.content_type
        } else if name.eq_ignore_ascii_case(constants::HEADER_CONTENT_DISPOSITION) {
            &mut self.content_disposition
        } else if name.eq_ignore_ascii_case(constants::HEADER_CONTENT_ENCODING) {
            &mut self.content_encoding
        } else if name.eq_ignore_ascii_case(constants::HEADER_CONTENT_LANGUAGE) {
            &mut self.content_language
        } else if name.eq_ignore_ascii_case(constants::HEADER_CONTENT_MD5) {
            &mut self.content_md5
        } else if name.eq_ignore_ascii_case(constants::HEADER_EXPIRES) {
            &mut self.expires
        } else if name.eq_ignore_ascii_case(constants::HEADER_CONTENT_LENGTH) {
            self.content_length = value.trim().parse().ok();
            return true;
        } else {
            return false;
        };
        *slot = Some(value.to_string());
        true
    }

    /// Header lines for every populated field, in a stable order.
    #[must_use]
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        let mut push = |name: &'static str, value: Option<&String>| {
            if let Some(value) = value {
                headers.push((name, value.clone()));
            }
        };
        push(constants::HEADER_CONTENT_TYPE, self.content_type.as_ref());
        push(
            constants::HEADER_CONTENT_DISPOSITION,
            self.content_disposition.as_ref(),
        );
        push(constants::HEADER_CONTENT_ENCODING, self.content_encoding.as_ref());
        push(constants::HEADER_CONTENT_LANGUAGE, self.content_language.as_ref());
        push(constants::HEADER_CONTENT_MD5, self.content_md5.as_ref());
        push(constants::HEADER_EXPIRES, self.expires.as_ref());
        if let Some(length) = self.content_length {
            headers.push((constants::HEADER_CONTENT_LENGTH, length.to_string()));
        }
        headers
    }
}

/// An in-memory request body plus its content metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    body: Bytes,
    metadata: ContentMetadata,
}

impl Payload {
    pub fn new(body: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            body: body.into(),
            metadata: ContentMetadata {
                content_type: content_type.map(str::to_string),
                ..ContentMetadata::default()
            },
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new(body.into(), Some(constants::CONTENT_TYPE_TEXT))
    }

    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Self::new(body, Some(constants::CONTENT_TYPE_OCTET_STREAM))
    }

    /// Empty body carrying only a content type.
    #[must_use]
    pub fn empty(content_type: &str) -> Self {
        Self::new(Bytes::new(), Some(content_type))
    }

    /// `application/x-www-form-urlencoded` body; `None` values render as a
    /// bare key.
    #[must_use]
    pub fn url_encoded_form(params: &[(String, Option<String>)]) -> Self {
        let body = params
            .iter()
            .map(|(key, value)| match value {
                Some(value) => format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                ),
                None => urlencoding::encode(key).into_owned(),
            })
            .collect::<Vec<_>>()
            .join("&");
        Self::new(body, Some(constants::CONTENT_TYPE_FORM))
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
    pub const fn metadata(&self) -> &ContentMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ContentMetadata {
        &mut self.metadata
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.metadata.content_type.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.body.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Computes the body's MD5 and records it as `Content-MD5`.
    pub fn calculate_md5(&mut self) {
        let digest = Md5::digest(&self.body);
        self.metadata.content_md5 = Some(base64::engine::general_purpose::STANDARD.encode(digest));
    }
}
