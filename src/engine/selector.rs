//! Response parser selection.
//!
//! Each method gets one [`ResponseTransform`], chosen when the method is
//! bound and reused for every call. The choice is, first match wins:
//! a named parser, then `unwrap`, then `select_json`, then the structural
//! default for the declared return kind. A named transform runs last.
//!
//! Deferred methods use the transform of their unwrapped return kind.

use crate::binders::Marshaller;
use crate::constants;
use crate::error::Error;
use crate::metadata::{MethodMetadata, ReturnKind, SelectJsonDecl, UnwrapDecl};
use crate::response::{HttpResponse, Reply};
use crate::strategies::Strategies;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// Turns a successful response into a reply.
pub trait ResponseParser: Send + Sync {
    /// # Errors
    ///
    /// Fails if the response cannot be decoded.
    fn parse(&self, response: &HttpResponse) -> Result<Reply, Error>;
}

impl<F> ResponseParser for F
where
    F: Fn(&HttpResponse) -> Result<Reply, Error> + Send + Sync,
{
    fn parse(&self, response: &HttpResponse) -> Result<Reply, Error> {
        self(response)
    }
}

/// Post-processes a parsed reply.
pub trait Transform: Send + Sync {
    /// # Errors
    ///
    /// Fails if the reply does not have the expected shape.
    fn transform(&self, reply: Reply) -> Result<Reply, Error>;
}

impl<F> Transform for F
where
    F: Fn(Reply) -> Result<Reply, Error> + Send + Sync,
{
    fn transform(&self, reply: Reply) -> Result<Reply, Error> {
        self(reply)
    }
}

#[derive(Clone)]
enum Decoder {
    Void,
    TrueIf2xx,
    Text,
    ByteStream,
    Uri,
    Json {
        marshaller: Arc<dyn Marshaller>,
        list: bool,
    },
    PassThrough,
    Custom {
        name: String,
        parser: Arc<dyn ResponseParser>,
    },
}

#[derive(Debug, Clone)]
enum Step {
    Unwrap(UnwrapDecl),
    Select(SelectJsonDecl),
}

/// The selected response strategy for one method.
#[derive(Clone)]
pub struct ResponseTransform {
    method: String,
    decoder: Decoder,
    step: Option<Step>,
    transform: Option<(String, Arc<dyn Transform>)>,
}

impl ResponseTransform {
    /// Chooses the strategy for a method.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown parser or transform names,
    /// a response content type with no marshaller, or an `unwrap` /
    /// `select_json` declaration on a return kind that has no JSON body.
    pub fn select(metadata: &MethodMetadata, strategies: &Strategies) -> Result<Self, Error> {
        let method = metadata.id.qualified_name();
        let kind = metadata.returns.kind;

        let step = match (&metadata.unwrap, &metadata.select_json) {
            (Some(unwrap), _) => Some(Step::Unwrap(unwrap.clone())),
            (None, Some(select)) => Some(Step::Select(select.clone())),
            (None, None) => None,
        };

        let decoder = if let Some(name) = &metadata.parser {
            Decoder::Custom {
                name: name.clone(),
                parser: strategies.parser(name)?,
            }
        } else if step.is_some() {
            if !matches!(kind, ReturnKind::Json | ReturnKind::JsonList) {
                return Err(Error::configuration(format!(
                    "{method} unwraps or selects JSON but returns {kind:?}"
                )));
            }
            Decoder::Json {
                marshaller: strategies.marshaller_for(metadata.consumes.as_deref())?,
                list: kind == ReturnKind::JsonList,
            }
        } else {
            match kind {
                ReturnKind::Void => Decoder::Void,
                ReturnKind::Boolean => Decoder::TrueIf2xx,
                ReturnKind::Text => Decoder::Text,
                ReturnKind::ByteStream => Decoder::ByteStream,
                ReturnKind::Uri => Decoder::Uri,
                ReturnKind::Response => Decoder::PassThrough,
                ReturnKind::Json | ReturnKind::JsonList => Decoder::Json {
                    marshaller: strategies
                        .marshaller_for(metadata.consumes.as_deref())
                        .map_err(|e| {
                            Error::configuration(format!(
                                "{method} has no response parser for its return type: {e}"
                            ))
                        })?,
                    list: kind == ReturnKind::JsonList,
                },
            }
        };
        let step = if matches!(decoder, Decoder::Custom { .. }) {
            None
        } else {
            step
        };

        let transform = match &metadata.transform {
            Some(name) => Some((name.clone(), strategies.transform(name)?)),
            None => None,
        };

        let selected = Self {
            method,
            decoder,
            step,
            transform,
        };
        trace!(method = %selected.method, transform = %selected, "selected response transform");
        Ok(selected)
    }

    /// Applies the transform to a successful response.
    ///
    /// # Errors
    ///
    /// Returns a transform error when the body does not match the declared
    /// shape, or whatever a custom parser or transform raises.
    pub fn apply(&self, response: &HttpResponse) -> Result<Reply, Error> {
        let mut reply = match &self.decoder {
            Decoder::Void => Reply::Void,
            Decoder::TrueIf2xx => Reply::Bool(response.is_success()),
            Decoder::Text => Reply::Text(response.body_text()),
            Decoder::ByteStream => Reply::Bytes(response.body().clone()),
            Decoder::Uri => Reply::Uri(self.parse_uri(response)?),
            Decoder::PassThrough => Reply::Response(response.clone()),
            Decoder::Custom { parser, .. } => parser.parse(response)?,
            Decoder::Json { marshaller, list } => {
                let value = marshaller
                    .from_bytes(response.body())
                    .map_err(|e| Error::transform(&self.method, e.to_string()))?;
                let value = match &self.step {
                    Some(Step::Unwrap(unwrap)) => self.unwrap(value, unwrap)?,
                    Some(Step::Select(select)) => self.select_json(&value, select)?,
                    None => value,
                };
                Reply::Json(if *list { self.as_list(value)? } else { value })
            }
        };
        if let Some((_, transform)) = &self.transform {
            reply = transform.transform(reply)?;
        }
        Ok(reply)
    }

    fn parse_uri(&self, response: &HttpResponse) -> Result<Url, Error> {
        let candidate = response
            .header(constants::HEADER_LOCATION)
            .map(str::to_string)
            .or_else(|| {
                response
                    .body_text()
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string)
            })
            .ok_or_else(|| Error::transform(&self.method, "no Location header or URI in body"))?;
        Url::parse(&candidate)
            .map_err(|e| Error::transform(&self.method, format!("'{candidate}' is not a URI: {e}")))
    }

    fn unwrap(&self, mut value: Value, unwrap: &UnwrapDecl) -> Result<Value, Error> {
        for _ in 0..unwrap.depth {
            value = match value {
                Value::Null => return Ok(Value::Null),
                Value::Object(map) if map.is_empty() => return Ok(Value::Null),
                Value::Object(map) if map.len() == 1 => {
                    map.into_iter().next().map_or(Value::Null, |(_, inner)| inner)
                }
                other => {
                    return Err(Error::transform(
                        &self.method,
                        format!("expected an object with one member, got {other}"),
                    ))
                }
            };
        }
        if unwrap.only_element {
            return self.only_element(value);
        }
        Ok(value)
    }

    fn select_json(&self, value: &Value, select: &SelectJsonDecl) -> Result<Value, Error> {
        let found = find_named(value, &select.keys).cloned().unwrap_or(Value::Null);
        if select.only_element {
            return self.only_element(found);
        }
        Ok(found)
    }

    fn only_element(&self, value: Value) -> Result<Value, Error> {
        match value {
            Value::Array(items) if items.len() > 1 => Err(Error::transform(
                &self.method,
                format!("expected at most one element, got {}", items.len()),
            )),
            Value::Array(items) => Ok(items.into_iter().next().unwrap_or(Value::Null)),
            other => Ok(other),
        }
    }

    fn as_list(&self, value: Value) -> Result<Value, Error> {
        match value {
            Value::Null => Ok(Value::Array(Vec::new())),
            Value::Array(_) => Ok(value),
            other => Err(Error::transform(
                &self.method,
                format!("expected a JSON array, got {other}"),
            )),
        }
    }
}

/// First value stored under any of `keys`, searching depth-first in
/// document order.
fn find_named<'v>(value: &'v Value, keys: &[String]) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, inner)| {
            if keys.iter().any(|wanted| wanted == key) {
                Some(inner)
            } else {
                find_named(inner, keys)
            }
        }),
        Value::Array(items) => items.iter().find_map(|item| find_named(item, keys)),
        _ => None,
    }
}

impl fmt::Display for ResponseTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.decoder {
            Decoder::Void => f.write_str("void")?,
            Decoder::TrueIf2xx => f.write_str("true_if_2xx")?,
            Decoder::Text => f.write_str("text")?,
            Decoder::ByteStream => f.write_str("byte_stream")?,
            Decoder::Uri => f.write_str("uri")?,
            Decoder::PassThrough => f.write_str("response")?,
            Decoder::Custom { name, .. } => write!(f, "parser({name})")?,
            Decoder::Json { marshaller, list } => {
                write!(f, "{}{}", marshaller.content_type(), if *list { "[]" } else { "" })?;
            }
        }
        match &self.step {
            Some(Step::Unwrap(unwrap)) => write!(f, " | unwrap({})", unwrap.depth)?,
            Some(Step::Select(select)) => write!(f, " | select({})", select.keys.join(","))?,
            None => {}
        }
        if let Some((name, _)) = &self.transform {
            write!(f, " | {name}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ResponseTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseTransform")
            .field("method", &self.method)
            .field("strategy", &self.to_string())
            .finish()
    }
}
