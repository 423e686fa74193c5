//! Invocation model for the dispatch engine.
//!
//! An [`Invocation`] is one call: the identity of the declared method plus the
//! ordered argument values. It is produced once per call, never mutated, and
//! consumed by every later stage (endpoint resolution, request building,
//! dispatch).

use base64::Engine as _;
use crate::options::RequestOptions;
use crate::payload::Payload;
use serde_json::Value;
use std::fmt;
use url::Url;

/// Identity of a declared method: declaring type, name and parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodId {
    declaring_type: String,
    name: String,
    param_types: Vec<String>,
}

impl MethodId {
    pub fn new<I, S>(declaring_type: impl Into<String>, name: impl Into<String>, param_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            param_types: param_types.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn param_types(&self) -> &[String] {
        &self.param_types
    }

    /// `Type.method`, the form used in error messages.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    /// Same declaring type and parameter types under another method name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            declaring_type: self.declaring_type.clone(),
            name: name.into(),
            param_types: self.param_types.clone(),
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.declaring_type,
            self.name,
            self.param_types.join(", ")
        )
    }
}

/// A single call-time argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Str(String),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
    List(Vec<Arg>),
    Json(Value),
    Uri(Url),
    Payload(Payload),
    Options(RequestOptions),
    OptionsList(Vec<RequestOptions>),
}

impl Arg {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Json(Value::Null))
    }

    /// String form used for path, query, header, matrix and form bindings.
    ///
    /// Returns `None` for values that have no scalar rendering (null,
    /// payloads, options).
    #[must_use]
    pub fn as_param_string(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::Uri(url) => Some(url.to_string()),
            Self::Json(Value::String(s)) => Some(s.clone()),
            Self::Json(Value::Null) => None,
            Self::Json(other) => Some(other.to_string()),
            Self::List(items) => Some(
                items
                    .iter()
                    .filter_map(Self::as_param_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Self::Null | Self::Payload(_) | Self::Options(_) | Self::OptionsList(_) => None,
        }
    }

    /// Raw bytes used when the value becomes a body part.
    #[must_use]
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Some(bytes.clone()),
            Self::Payload(payload) => Some(payload.body().to_vec()),
            other => other.as_param_string().map(String::into_bytes),
        }
    }

    /// JSON form handed to map binders and JSON binders.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null | Self::Options(_) | Self::OptionsList(_) => Value::Null,
            Self::Str(s) => Value::String(s.clone()),
            Self::Int(i) => Value::from(*i),
            Self::Bool(b) => Value::Bool(*b),
            Self::Bytes(bytes) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Json(value) => value.clone(),
            Self::Uri(url) => Value::String(url.to_string()),
            Self::Payload(payload) => Value::String(payload.body_text()),
        }
    }

    /// Elements of a list argument, or the argument itself.
    #[must_use]
    pub fn elements(&self) -> Vec<&Self> {
        match self {
            Self::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Url> for Arg {
    fn from(value: Url) -> Self {
        Self::Uri(value)
    }
}

impl From<Payload> for Arg {
    fn from(value: Payload) -> Self {
        Self::Payload(value)
    }
}

impl From<RequestOptions> for Arg {
    fn from(value: RequestOptions) -> Self {
        Self::Options(value)
    }
}

impl From<Vec<RequestOptions>> for Arg {
    fn from(value: Vec<RequestOptions>) -> Self {
        Self::OptionsList(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One call: method identity plus ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    method: MethodId,
    args: Vec<Arg>,
}

impl Invocation {
    #[must_use]
    pub const fn new(method: MethodId, args: Vec<Arg>) -> Self {
        Self { method, args }
    }

    #[must_use]
    pub const fn method(&self) -> &MethodId {
        &self.method
    }

    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Argument at `index`, treating a missing trailing argument as null.
    #[must_use]
    pub fn arg(&self, index: usize) -> &Arg {
        self.args.get(index).unwrap_or(&Arg::Null)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.method.declaring_type, self.method.name)?;
        let rendered: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.as_param_string().unwrap_or_else(|| "null".to_string()))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_id_renders_signature() {
        let id = MethodId::new("Buckets", "list", ["String", "ListOptions"]);
        assert_eq!(id.to_string(), "Buckets.list(String, ListOptions)");
        assert_eq!(id.qualified_name(), "Buckets.list");
        assert_eq!(id.renamed("listAsync").name(), "listAsync");
    }

    #[test]
    fn scalar_args_render_as_param_strings() {
        assert_eq!(Arg::from("a b").as_param_string().as_deref(), Some("a b"));
        assert_eq!(Arg::from(42).as_param_string().as_deref(), Some("42"));
        assert_eq!(Arg::from(json!("x")).as_param_string().as_deref(), Some("x"));
        assert_eq!(Arg::Null.as_param_string(), None);
        assert!(Arg::from(Option::<String>::None).is_null());
    }

    #[test]
    fn list_elements_are_flattened_one_level() {
        let arg = Arg::List(vec![Arg::from("a"), Arg::from("b")]);
        assert_eq!(arg.elements().len(), 2);
        assert_eq!(arg.to_json(), json!(["a", "b"]));
    }

    #[test]
    fn missing_trailing_argument_reads_as_null() {
        let invocation = Invocation::new(MethodId::new("Api", "get", ["String"]), vec![]);
        assert!(invocation.arg(0).is_null());
        assert_eq!(invocation.to_string(), "Api.get[]");
    }
}
