//! Declarative interface metadata.
//!
//! These tables replace per-method annotations: an [`InterfaceDecl`] holds the
//! class-level declarations and its [`MethodDecl`]s, each parameter carries at
//! most one [`ParamBinding`]. They are plain data, loaded from definition files
//! or built in code, and merged once per method into a [`MethodMetadata`].

pub mod loader;
pub mod merge;

pub use merge::MethodMetadata;

use crate::duration::deserialize_timeout;
use serde::Deserialize;
use std::time::Duration;

/// A static key/value declaration; `None` renders the bare key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// Root of a definitions file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiDefinition {
    #[serde(default)]
    pub interfaces: Vec<InterfaceDecl>,
}

/// Class-level declarations plus the interface's methods.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceDecl {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Qualifier of a named endpoint supplier
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    #[serde(default)]
    pub query: Vec<KeyValue>,
    #[serde(default)]
    pub matrix: Vec<KeyValue>,
    #[serde(default)]
    pub form: Vec<KeyValue>,
    #[serde(default)]
    pub filters: Vec<String>,
    /// Characters exempt from percent-encoding in path substitutions
    #[serde(default)]
    pub skip_encoding: String,
    #[serde(default, deserialize_with = "deserialize_timeout")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub virtual_host: bool,
    #[serde(default)]
    pub produces: Option<String>,
    #[serde(default)]
    pub consumes: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

impl InterfaceDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn endpoint(mut self, qualifier: impl Into<String>) -> Self {
        self.endpoint = Some(qualifier.into());
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn matrix(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.matrix.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filters.push(name.into());
        self
    }

    #[must_use]
    pub fn skip_encoding(mut self, chars: impl Into<String>) -> Self {
        self.skip_encoding = chars.into();
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn virtual_host(mut self) -> Self {
        self.virtual_host = true;
        self
    }

    #[must_use]
    pub fn produces(mut self, content_type: impl Into<String>) -> Self {
        self.produces = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn consumes(mut self, content_type: impl Into<String>) -> Self {
        self.consumes = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn find_method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// `Unwrap`: take the single value of a one-key object, `depth` times.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnwrapDecl {
    #[serde(default = "default_depth")]
    pub depth: usize,
    #[serde(default)]
    pub only_element: bool,
}

const fn default_depth() -> usize {
    1
}

/// `SelectJson`: pick the first value found under any of `keys`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectJsonDecl {
    pub keys: Vec<String>,
    #[serde(default)]
    pub only_element: bool,
}

/// Raw shape of a method's declared return type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Void,
    /// `true` on any 2xx
    Boolean,
    Text,
    ByteStream,
    Uri,
    #[default]
    Json,
    JsonList,
    /// The raw response, untouched
    Response,
}

/// Declared return type: the raw shape and whether it is future-wrapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ReturnShape {
    #[serde(default)]
    pub kind: ReturnKind,
    #[serde(default)]
    pub deferred: bool,
}

impl ReturnShape {
    #[must_use]
    pub const fn of(kind: ReturnKind) -> Self {
        Self {
            kind,
            deferred: false,
        }
    }

    #[must_use]
    pub const fn deferred(kind: ReturnKind) -> Self {
        Self {
            kind,
            deferred: true,
        }
    }
}

/// Method-level declarations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub verb: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    #[serde(default)]
    pub query: Vec<KeyValue>,
    #[serde(default)]
    pub matrix: Vec<KeyValue>,
    #[serde(default)]
    pub form: Vec<KeyValue>,
    #[serde(default)]
    pub filters: Vec<String>,
    /// Replace rather than extend the interface's filters
    #[serde(default)]
    pub override_filters: bool,
    #[serde(default)]
    pub skip_encoding: String,
    #[serde(default, deserialize_with = "deserialize_timeout")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub virtual_host: bool,
    #[serde(default)]
    pub produces: Option<String>,
    #[serde(default)]
    pub consumes: Option<String>,
    /// Named response parser; wins over every other transform declaration
    #[serde(default)]
    pub parser: Option<String>,
    #[serde(default)]
    pub unwrap: Option<UnwrapDecl>,
    #[serde(default)]
    pub select_json: Option<SelectJsonDecl>,
    /// Named transform applied after parsing
    #[serde(default)]
    pub transform: Option<String>,
    #[serde(default)]
    pub fallback: Option<String>,
    /// Literal payload template with `{token}` placeholders
    #[serde(default)]
    pub payload: Option<String>,
    /// Defaults merged into the payload-param map
    #[serde(default)]
    pub payload_params: Vec<KeyValue>,
    #[serde(default)]
    pub map_binder: Option<String>,
    /// Wrap the payload-param map as `{ key: map }`
    #[serde(default)]
    pub wrap_with: Option<String>,
    #[serde(default)]
    pub returns: ReturnShape,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    /// This method returns a sub-client for the named interface
    #[serde(default)]
    pub delegate: Option<String>,
    /// Synchronous facade over the named asynchronous method
    #[serde(default)]
    pub async_method: Option<String>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verb: Some(verb.into()),
            ..Self::default()
        }
    }

    pub fn get(name: impl Into<String>) -> Self {
        Self::new(name, "GET")
    }

    pub fn post(name: impl Into<String>) -> Self {
        Self::new(name, "POST")
    }

    pub fn put(name: impl Into<String>) -> Self {
        Self::new(name, "PUT")
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self::new(name, "DELETE")
    }

    pub fn head(name: impl Into<String>) -> Self {
        Self::new(name, "HEAD")
    }

    /// A method that returns a sub-client instead of issuing a request.
    pub fn delegate(name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delegate: Some(interface.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn endpoint(mut self, qualifier: impl Into<String>) -> Self {
        self.endpoint = Some(qualifier.into());
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn query_flag(mut self, key: impl Into<String>) -> Self {
        self.query.push(KeyValue::bare(key));
        self
    }

    #[must_use]
    pub fn matrix(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.matrix.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filters.push(name.into());
        self
    }

    #[must_use]
    pub const fn override_filters(mut self) -> Self {
        self.override_filters = true;
        self
    }

    #[must_use]
    pub fn skip_encoding(mut self, chars: impl Into<String>) -> Self {
        self.skip_encoding = chars.into();
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn virtual_host(mut self) -> Self {
        self.virtual_host = true;
        self
    }

    #[must_use]
    pub fn produces(mut self, content_type: impl Into<String>) -> Self {
        self.produces = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn consumes(mut self, content_type: impl Into<String>) -> Self {
        self.consumes = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn parser(mut self, name: impl Into<String>) -> Self {
        self.parser = Some(name.into());
        self
    }

    #[must_use]
    pub const fn unwrap_json(mut self, depth: usize, only_element: bool) -> Self {
        self.unwrap = Some(UnwrapDecl {
            depth,
            only_element,
        });
        self
    }

    #[must_use]
    pub fn select_json<I, S>(mut self, keys: I, only_element: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_json = Some(SelectJsonDecl {
            keys: keys.into_iter().map(Into::into).collect(),
            only_element,
        });
        self
    }

    #[must_use]
    pub fn transform(mut self, name: impl Into<String>) -> Self {
        self.transform = Some(name.into());
        self
    }

    #[must_use]
    pub fn fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = Some(name.into());
        self
    }

    #[must_use]
    pub fn payload(mut self, template: impl Into<String>) -> Self {
        self.payload = Some(template.into());
        self
    }

    #[must_use]
    pub fn payload_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload_params.push(KeyValue::new(key, value));
        self
    }

    #[must_use]
    pub fn map_binder(mut self, name: impl Into<String>) -> Self {
        self.map_binder = Some(name.into());
        self
    }

    #[must_use]
    pub fn wrap_with(mut self, key: impl Into<String>) -> Self {
        self.wrap_with = Some(key.into());
        self
    }

    #[must_use]
    pub const fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }

    #[must_use]
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn async_method(mut self, name: impl Into<String>) -> Self {
        self.async_method = Some(name.into());
        self
    }
}

fn default_separator() -> String {
    ".".to_string()
}

/// How one parameter contributes to the request.
///
/// Key names default to the parameter's own name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamBinding {
    Path {
        #[serde(default)]
        name: Option<String>,
    },
    Query {
        #[serde(default)]
        name: Option<String>,
    },
    Matrix {
        #[serde(default)]
        name: Option<String>,
    },
    Header {
        #[serde(default)]
        name: Option<String>,
    },
    Form {
        #[serde(default)]
        name: Option<String>,
    },
    Payload {
        #[serde(default)]
        name: Option<String>,
    },
    /// Named binder strategy applied to the value
    Binder { strategy: String },
    /// JSON payload `{ key: value }`
    WrapWith { key: String },
    Endpoint {
        #[serde(default)]
        parser: Option<String>,
    },
    HostPrefix {
        #[serde(default = "default_separator")]
        separator: String,
    },
    Part {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        content_type: Option<String>,
        /// Template substituted from path tokens and form params
        #[serde(default)]
        filename: Option<String>,
    },
    Options,
    OptionsVarargs,
    /// Token made available to a delegate sub-client
    Delegate {
        #[serde(default)]
        name: Option<String>,
    },
}

impl ParamBinding {
    /// Short name used in logs and error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Path { .. } => "path",
            Self::Query { .. } => "query",
            Self::Matrix { .. } => "matrix",
            Self::Header { .. } => "header",
            Self::Form { .. } => "form",
            Self::Payload { .. } => "payload",
            Self::Binder { .. } => "binder",
            Self::WrapWith { .. } => "wrap_with",
            Self::Endpoint { .. } => "endpoint",
            Self::HostPrefix { .. } => "host_prefix",
            Self::Part { .. } => "part",
            Self::Options => "options",
            Self::OptionsVarargs => "options_varargs",
            Self::Delegate { .. } => "delegate",
        }
    }
}

/// One formal parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub binding: Option<ParamBinding>,
    #[serde(default)]
    pub nullable: bool,
    /// Named extraction function applied before the value is bound
    #[serde(default)]
    pub parser: Option<String>,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, binding: Option<ParamBinding>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            binding,
            nullable: false,
            parser: None,
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Path { name: None }))
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Query { name: None }))
    }

    pub fn matrix(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Matrix { name: None }))
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Header { name: None }))
    }

    pub fn form(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Form { name: None }))
    }

    pub fn payload(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Payload { name: None }))
    }

    pub fn binder(name: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self::new(
            name,
            Some(ParamBinding::Binder {
                strategy: strategy.into(),
            }),
        )
    }

    pub fn wrap_with(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::WrapWith { key: key.into() }))
    }

    pub fn endpoint(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Endpoint { parser: None }))
    }

    pub fn host_prefix(name: impl Into<String>) -> Self {
        Self::new(
            name,
            Some(ParamBinding::HostPrefix {
                separator: default_separator(),
            }),
        )
    }

    pub fn part(name: impl Into<String>) -> Self {
        Self::new(
            name,
            Some(ParamBinding::Part {
                name: None,
                content_type: None,
                filename: None,
            }),
        )
    }

    pub fn options(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Options))
    }

    pub fn options_varargs(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::OptionsVarargs))
    }

    pub fn delegate(name: impl Into<String>) -> Self {
        Self::new(name, Some(ParamBinding::Delegate { name: None }))
    }

    /// A parameter with no binding: raw payloads and pass-through options.
    pub fn unbound(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    #[must_use]
    pub fn parser(mut self, name: impl Into<String>) -> Self {
        self.parser = Some(name.into());
        self
    }

    /// Sets the key/part name when it differs from the parameter name.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match &mut self.binding {
            Some(
                ParamBinding::Path { name }
                | ParamBinding::Query { name }
                | ParamBinding::Matrix { name }
                | ParamBinding::Header { name }
                | ParamBinding::Form { name }
                | ParamBinding::Payload { name }
                | ParamBinding::Part { name, .. }
                | ParamBinding::Delegate { name },
            ) => *name = key,
            _ => {}
        }
        self
    }

    /// Part content type; ignored for non-part bindings.
    #[must_use]
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        if let Some(ParamBinding::Part { content_type, .. }) = &mut self.binding {
            *content_type = Some(value.into());
        }
        self
    }

    /// Part filename template; ignored for non-part bindings.
    #[must_use]
    pub fn filename(mut self, template: impl Into<String>) -> Self {
        if let Some(ParamBinding::Part { filename, .. }) = &mut self.binding {
            *filename = Some(template.into());
        }
        self
    }

    /// Host-prefix separator; ignored for other bindings.
    #[must_use]
    pub fn separator(mut self, value: impl Into<String>) -> Self {
        if let Some(ParamBinding::HostPrefix { separator }) = &mut self.binding {
            *separator = value.into();
        }
        self
    }

    /// Endpoint parser name; ignored for other bindings.
    #[must_use]
    pub fn endpoint_parser(mut self, name: impl Into<String>) -> Self {
        if let Some(ParamBinding::Endpoint { parser }) = &mut self.binding {
            *parser = Some(name.into());
        }
        self
    }

    /// The key this parameter binds under: the declared key or its own name.
    #[must_use]
    pub fn key_name(&self) -> &str {
        let declared = match &self.binding {
            Some(
                ParamBinding::Path { name }
                | ParamBinding::Query { name }
                | ParamBinding::Matrix { name }
                | ParamBinding::Header { name }
                | ParamBinding::Form { name }
                | ParamBinding::Payload { name }
                | ParamBinding::Part { name, .. }
                | ParamBinding::Delegate { name },
            ) => name.as_deref(),
            _ => None,
        };
        declared.unwrap_or(&self.name)
    }

    /// Whether a null argument must be rejected before anything is built.
    #[must_use]
    pub const fn requires_value(&self) -> bool {
        !self.nullable
            && !matches!(
                self.binding,
                None | Some(ParamBinding::Options | ParamBinding::OptionsVarargs)
            )
    }
}
