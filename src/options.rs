//! Options aggregates: a call-time argument that contributes its own request
//! fragments.
//!
//! Several options may be supplied to one call. Their header, query, matrix
//! and form contributions accumulate in call-site order, while a later
//! payload replaces an earlier one.

/// Request fragments carried by an options argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    query: Vec<(String, Option<String>)>,
    matrix: Vec<(String, Option<String>)>,
    form: Vec<(String, Option<String>)>,
    path_suffix: Option<String>,
    payload: Option<String>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), Some(value.into())));
        self
    }

    /// Query key with no value; rendered without `=`.
    #[must_use]
    pub fn query_flag(mut self, key: impl Into<String>) -> Self {
        self.query.push((key.into(), None));
        self
    }

    #[must_use]
    pub fn matrix_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.matrix.push((key.into(), Some(value.into())));
        self
    }

    #[must_use]
    pub fn form_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), Some(value.into())));
        self
    }

    #[must_use]
    pub fn path_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.path_suffix = Some(suffix.into());
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub fn query(&self) -> &[(String, Option<String>)] {
        &self.query
    }

    #[must_use]
    pub fn matrix(&self) -> &[(String, Option<String>)] {
        &self.matrix
    }

    #[must_use]
    pub fn form(&self) -> &[(String, Option<String>)] {
        &self.form
    }

    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.path_suffix.as_deref()
    }

    #[must_use]
    pub fn string_payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}
