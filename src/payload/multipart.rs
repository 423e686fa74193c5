//! `multipart/form-data` bodies built from part-bound parameters.

use super::Payload;
use crate::constants;
use bytes::{BufMut, Bytes, BytesMut};

/// One named body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    data: Bytes,
    content_type: Option<String>,
    filename: Option<String>,
}

impl Part {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            content_type: None,
            filename: None,
        }
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn write_to(&self, boundary: &str, out: &mut BytesMut) {
        out.put_slice(format!("--{boundary}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", self.name);
        if let Some(filename) = &self.filename {
            disposition.push_str(&format!("; filename=\"{filename}\""));
        }
        out.put_slice(disposition.as_bytes());
        out.put_slice(b"\r\n");
        if let Some(content_type) = &self.content_type {
            out.put_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        out.put_slice(b"\r\n");
        out.put_slice(&self.data);
        out.put_slice(b"\r\n");
    }
}

/// Ordered parts joined by a fixed boundary marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartForm {
    #[must_use]
    pub fn new(parts: Vec<Part>) -> Self {
        Self::with_boundary(constants::MULTIPART_BOUNDARY, parts)
    }

    pub fn with_boundary(boundary: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            boundary: boundary.into(),
            parts,
        }
    }

    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", constants::CONTENT_TYPE_MULTIPART, self.boundary)
    }

    /// Renders the form into a single payload.
    #[must_use]
    pub fn into_payload(self) -> Payload {
        let mut body = BytesMut::new();
        for part in &self.parts {
            part.write_to(&self.boundary, &mut body);
        }
        body.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        let content_type = self.content_type();
        Payload::new(body.freeze(), Some(&content_type))
    }
}
