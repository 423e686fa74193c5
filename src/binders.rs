//! Payload binders, parameter parsers, endpoint parsers and marshallers.
//!
//! Each strategy is a trait with a blanket implementation for matching
//! closures, so callers can register either a type or a function.

use crate::constants;
use crate::error::Error;
use crate::invocation::Arg;
use crate::payload::Payload;
use crate::request::HttpRequest;
use crate::uri;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Converts between JSON values and payload bytes for one content type.
pub trait Marshaller: Send + Sync {
    fn content_type(&self) -> &str;

    /// # Errors
    ///
    /// Fails if the value cannot be encoded.
    fn to_payload(&self, value: &Value) -> Result<Payload, Error>;

    /// # Errors
    ///
    /// Fails if the bytes are not valid for this content type.
    fn from_bytes(&self, body: &[u8]) -> Result<Value, Error>;
}

/// `application/json` via `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarshaller;

impl Marshaller for JsonMarshaller {
    fn content_type(&self) -> &str {
        constants::CONTENT_TYPE_JSON
    }

    fn to_payload(&self, value: &Value) -> Result<Payload, Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Payload::new(body, Some(constants::CONTENT_TYPE_JSON)))
    }

    fn from_bytes(&self, body: &[u8]) -> Result<Value, Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(body)?)
    }
}

/// Binds one argument into the request, usually as its payload.
pub trait Binder: Send + Sync {
    /// # Errors
    ///
    /// Fails if the input cannot be encoded.
    fn bind_to_request(&self, request: HttpRequest, input: &Arg) -> Result<HttpRequest, Error>;
}

impl<F> Binder for F
where
    F: Fn(HttpRequest, &Arg) -> Result<HttpRequest, Error> + Send + Sync,
{
    fn bind_to_request(&self, request: HttpRequest, input: &Arg) -> Result<HttpRequest, Error> {
        self(request, input)
    }
}

/// Binds every payload-param value, collected by name, into the request.
pub trait MapBinder: Send + Sync {
    /// # Errors
    ///
    /// Fails if the map cannot be encoded.
    fn bind_to_request(
        &self,
        request: HttpRequest,
        params: &IndexMap<String, Value>,
    ) -> Result<HttpRequest, Error>;
}

impl<F> MapBinder for F
where
    F: Fn(HttpRequest, &IndexMap<String, Value>) -> Result<HttpRequest, Error> + Send + Sync,
{
    fn bind_to_request(
        &self,
        request: HttpRequest,
        params: &IndexMap<String, Value>,
    ) -> Result<HttpRequest, Error> {
        self(request, params)
    }
}

/// Derives the bound value from an argument before it is used.
pub trait ParamParser: Send + Sync {
    /// # Errors
    ///
    /// Fails if the value cannot be derived.
    fn parse(&self, value: &Arg) -> Result<Arg, Error>;
}

impl<F> ParamParser for F
where
    F: Fn(&Arg) -> Result<Arg, Error> + Send + Sync,
{
    fn parse(&self, value: &Arg) -> Result<Arg, Error> {
        self(value)
    }
}

/// Turns endpoint-bound arguments, in declaration order, into an endpoint.
///
/// The result may be relative; it is rebased onto the default endpoint.
pub trait EndpointParser: Send + Sync {
    /// # Errors
    ///
    /// Fails if no endpoint can be derived.
    fn parse_endpoint(&self, values: &[Arg]) -> Result<String, Error>;
}

impl<F> EndpointParser for F
where
    F: Fn(&[Arg]) -> Result<String, Error> + Send + Sync,
{
    fn parse_endpoint(&self, values: &[Arg]) -> Result<String, Error> {
        self(values)
    }
}

/// Identity for parameters; string form for endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl ParamParser for Identity {
    fn parse(&self, value: &Arg) -> Result<Arg, Error> {
        Ok(value.clone())
    }
}

impl EndpointParser for Identity {
    fn parse_endpoint(&self, values: &[Arg]) -> Result<String, Error> {
        let parts: Vec<String> = values.iter().filter_map(Arg::as_param_string).collect();
        if parts.is_empty() {
            return Err(Error::configuration("endpoint parameter has no value"));
        }
        Ok(if parts.len() == 1 {
            parts.into_iter().next().unwrap_or_default()
        } else {
            uri::join_paths(parts.iter().map(String::as_str))
        })
    }
}

/// Serializes the argument with the JSON marshaller.
pub struct BindToJsonPayload {
    marshaller: Arc<dyn Marshaller>,
}

impl BindToJsonPayload {
    #[must_use]
    pub fn new(marshaller: Arc<dyn Marshaller>) -> Self {
        Self { marshaller }
    }
}

impl Binder for BindToJsonPayload {
    fn bind_to_request(&self, mut request: HttpRequest, input: &Arg) -> Result<HttpRequest, Error> {
        request.set_payload(Some(self.marshaller.to_payload(&input.to_json())?));
        Ok(request)
    }
}

/// Wraps the argument as `{ key: value }` before serializing.
pub struct BindToJsonPayloadWrappedWith {
    key: String,
    marshaller: Arc<dyn Marshaller>,
}

impl BindToJsonPayloadWrappedWith {
    pub fn new(key: impl Into<String>, marshaller: Arc<dyn Marshaller>) -> Self {
        Self {
            key: key.into(),
            marshaller,
        }
    }
}

impl Binder for BindToJsonPayloadWrappedWith {
    fn bind_to_request(&self, mut request: HttpRequest, input: &Arg) -> Result<HttpRequest, Error> {
        let mut wrapped = serde_json::Map::new();
        wrapped.insert(self.key.clone(), input.to_json());
        request.set_payload(Some(self.marshaller.to_payload(&Value::Object(wrapped))?));
        Ok(request)
    }
}

/// Uses the argument's string form as a `text/plain` body.
#[derive(Debug, Default, Clone, Copy)]
pub struct BindToStringPayload;

impl Binder for BindToStringPayload {
    fn bind_to_request(&self, mut request: HttpRequest, input: &Arg) -> Result<HttpRequest, Error> {
        let text = input
            .as_param_string()
            .ok_or_else(|| Error::configuration("string binder needs a scalar value"))?;
        request.set_payload(Some(Payload::text(text)));
        Ok(request)
    }
}

/// Uses the argument's bytes as an `application/octet-stream` body.
#[derive(Debug, Default, Clone, Copy)]
pub struct BindBytesPayload;

impl Binder for BindBytesPayload {
    fn bind_to_request(&self, mut request: HttpRequest, input: &Arg) -> Result<HttpRequest, Error> {
        let bytes = input
            .as_bytes()
            .ok_or_else(|| Error::configuration("bytes binder needs a value with a body"))?;
        request.set_payload(Some(Payload::bytes(bytes)));
        Ok(request)
    }
}

/// Serializes the payload-param map as a JSON object.
pub struct BindMapToJsonPayload {
    marshaller: Arc<dyn Marshaller>,
    wrap_with: Option<String>,
}

impl BindMapToJsonPayload {
    #[must_use]
    pub fn new(marshaller: Arc<dyn Marshaller>) -> Self {
        Self {
            marshaller,
            wrap_with: None,
        }
    }

    /// Nests the whole map under `key`.
    #[must_use]
    pub fn wrapped_with(marshaller: Arc<dyn Marshaller>, key: impl Into<String>) -> Self {
        Self {
            marshaller,
            wrap_with: Some(key.into()),
        }
    }
}

impl MapBinder for BindMapToJsonPayload {
    fn bind_to_request(
        &self,
        mut request: HttpRequest,
        params: &IndexMap<String, Value>,
    ) -> Result<HttpRequest, Error> {
        let object: serde_json::Map<String, Value> =
            params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let value = match &self.wrap_with {
            Some(key) => {
                let mut outer = serde_json::Map::new();
                outer.insert(key.clone(), Value::Object(object));
                Value::Object(outer)
            }
            None => Value::Object(object),
        };
        request.set_payload(Some(self.marshaller.to_payload(&value)?));
        Ok(request)
    }
}

/// Expands a literal payload template from the payload-param map.
#[derive(Debug, Clone)]
pub struct BindMapToStringPayload {
    template: String,
}

impl BindMapToStringPayload {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl MapBinder for BindMapToStringPayload {
    fn bind_to_request(
        &self,
        mut request: HttpRequest,
        params: &IndexMap<String, Value>,
    ) -> Result<HttpRequest, Error> {
        let tokens: IndexMap<String, String> = params
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect();
        let missing: Vec<String> = uri::template_tokens(&self.template)
            .map_err(|e| Error::configuration(e.to_string()))?
            .into_iter()
            .filter(|token| !tokens.contains_key(token))
            .collect();
        if !missing.is_empty() {
            return Err(Error::configuration(format!(
                "payload template '{}' has no value for {}",
                self.template,
                missing.join(", ")
            )));
        }
        let body = uri::replace_tokens(&self.template, &tokens);
        let content_type = request
            .payload()
            .and_then(Payload::content_type)
            .map_or_else(|| constants::CONTENT_TYPE_TEXT.to_string(), str::to_string);
        request.set_payload(Some(Payload::new(body, Some(&content_type))));
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;

    fn request() -> HttpRequest {
        HttpRequest::new("POST", Url::parse("http://localhost:9999").unwrap())
    }

    fn json() -> Arc<dyn Marshaller> {
        Arc::new(JsonMarshaller)
    }

    #[test]
    fn json_binder_serializes_values() {
        let bound = BindToJsonPayload::new(json())
            .bind_to_request(request(), &Arg::from(json!({"name": "foo"})))
            .unwrap();
        let payload = bound.payload().unwrap();
        assert_eq!(payload.body_text(), r#"{"name":"foo"}"#);
        assert_eq!(payload.content_type(), Some(constants::CONTENT_TYPE_JSON));
    }

    #[test]
    fn wrapped_binder_nests_value() {
        let bound = BindToJsonPayloadWrappedWith::new("server", json())
            .bind_to_request(request(), &Arg::from("web"))
            .unwrap();
        assert_eq!(bound.payload().unwrap().body_text(), r#"{"server":"web"}"#);
    }

    #[test]
    fn map_binder_keeps_insertion_order() {
        let mut params = IndexMap::new();
        params.insert("fooble".to_string(), json!("robot"));
        params.insert("name".to_string(), json!("data"));
        let bound = BindMapToJsonPayload::wrapped_with(json(), "request")
            .bind_to_request(request(), &params)
            .unwrap();
        assert_eq!(
            bound.payload().unwrap().body_text(),
            r#"{"request":{"fooble":"robot","name":"data"}}"#
        );
    }

    #[test]
    fn string_template_needs_every_token() {
        let mut params = IndexMap::new();
        params.insert("name".to_string(), json!("data"));
        let bound = BindMapToStringPayload::new("name {name}")
            .bind_to_request(request(), &params)
            .unwrap();
        assert_eq!(bound.payload().unwrap().body_text(), "name data");

        let err = BindMapToStringPayload::new("{missing}")
            .bind_to_request(request(), &params)
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn identity_endpoint_parser_joins_multiple_values() {
        let single = Identity.parse_endpoint(&[Arg::from("http://foo/bar")]).unwrap();
        assert_eq!(single, "http://foo/bar");
        let joined = Identity.parse_endpoint(&[Arg::from("http://foo"), Arg::from("bar")]).unwrap();
        assert_eq!(joined, "http://foo/bar");
    }

    #[test]
    fn empty_body_decodes_to_null() {
        assert_eq!(JsonMarshaller.from_bytes(b"  ").unwrap(), Value::Null);
        assert!(JsonMarshaller.from_bytes(b"{").is_err());
    }
}
