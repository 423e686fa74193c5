//! Named strategy registry.
//!
//! Metadata refers to binders, parsers, filters, transforms, fallbacks and
//! endpoint suppliers by name. The registry maps those names to shared
//! implementations and is filled once while the client is assembled; after
//! that it is read-only.

use crate::binders::{
    BindBytesPayload, BindMapToJsonPayload, BindToJsonPayload, BindToStringPayload, Binder,
    EndpointParser, Identity, JsonMarshaller, MapBinder, Marshaller, ParamParser,
};
use crate::constants;
use crate::endpoint::UriSupplier;
use crate::engine::dispatcher::AsyncMapper;
use crate::engine::selector::{ResponseParser, Transform};
use crate::error::Error;
use crate::fallback::{Fallback, MapHttp4xxCodesToErrors, NullOnTimeout, OnNotFound, Propagate};
use crate::filters::{ContentMd5, RequestFilter, StripExpectHeader};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
pub struct Strategies {
    binders: HashMap<String, Arc<dyn Binder>>,
    map_binders: HashMap<String, Arc<dyn MapBinder>>,
    param_parsers: HashMap<String, Arc<dyn ParamParser>>,
    endpoint_parsers: HashMap<String, Arc<dyn EndpointParser>>,
    filters: HashMap<String, Arc<dyn RequestFilter>>,
    parsers: HashMap<String, Arc<dyn ResponseParser>>,
    transforms: HashMap<String, Arc<dyn Transform>>,
    fallbacks: HashMap<String, Arc<dyn Fallback>>,
    endpoints: HashMap<String, Arc<dyn UriSupplier>>,
    marshallers: HashMap<String, Arc<dyn Marshaller>>,
    async_mappers: HashMap<String, Arc<dyn AsyncMapper>>,
}

fn lookup<T: ?Sized>(
    table: &HashMap<String, Arc<T>>,
    kind: &str,
    name: &str,
) -> Result<Arc<T>, Error> {
    trace!(kind, name, "resolving strategy");
    table.get(name).cloned().ok_or_else(|| {
        let mut known: Vec<&str> = table.keys().map(String::as_str).collect();
        known.sort_unstable();
        Error::configuration(format!(
            "no {kind} named '{name}' is registered (known: {})",
            if known.is_empty() {
                "none".to_string()
            } else {
                known.join(", ")
            }
        ))
    })
}

/// Media type without parameters, lowercased: `Application/JSON; charset=utf-8`
/// becomes `application/json`.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

impl Default for Strategies {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategies {
    /// A registry holding the built-in strategies.
    #[must_use]
    pub fn new() -> Self {
        let json: Arc<dyn Marshaller> = Arc::new(JsonMarshaller);
        let mut strategies = Self::empty();

        strategies
            .marshallers
            .insert(constants::CONTENT_TYPE_JSON.to_string(), Arc::clone(&json));

        strategies.register_binder(
            constants::BINDER_JSON,
            BindToJsonPayload::new(Arc::clone(&json)),
        );
        strategies.register_binder(constants::BINDER_STRING, BindToStringPayload);
        strategies.register_binder(constants::BINDER_BYTES, BindBytesPayload);
        strategies.register_map_binder(constants::MAP_BINDER_JSON, BindMapToJsonPayload::new(json));

        strategies.register_param_parser(constants::PARAM_PARSER_IDENTITY, Identity);
        strategies.register_endpoint_parser(constants::PARAM_PARSER_IDENTITY, Identity);

        strategies.register_filter(constants::FILTER_STRIP_EXPECT, StripExpectHeader);
        strategies.register_filter(constants::FILTER_CONTENT_MD5, ContentMd5);

        strategies.register_fallback(constants::FALLBACK_MAP_4XX, MapHttp4xxCodesToErrors);
        strategies.register_fallback(constants::FALLBACK_NULL_ON_404, OnNotFound::null());
        strategies.register_fallback(constants::FALLBACK_VOID_ON_404, OnNotFound::void());
        strategies.register_fallback(constants::FALLBACK_FALSE_ON_404, OnNotFound::value(false));
        strategies.register_fallback(constants::FALLBACK_TRUE_ON_404, OnNotFound::value(true));
        strategies.register_fallback(
            constants::FALLBACK_EMPTY_LIST_ON_404,
            OnNotFound::empty_list(),
        );
        strategies.register_fallback(constants::FALLBACK_NULL_ON_TIMEOUT, NullOnTimeout);
        strategies.register_fallback(constants::FALLBACK_PROPAGATE, Propagate);
        strategies
    }

    /// A registry with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            binders: HashMap::new(),
            map_binders: HashMap::new(),
            param_parsers: HashMap::new(),
            endpoint_parsers: HashMap::new(),
            filters: HashMap::new(),
            parsers: HashMap::new(),
            transforms: HashMap::new(),
            fallbacks: HashMap::new(),
            endpoints: HashMap::new(),
            marshallers: HashMap::new(),
            async_mappers: HashMap::new(),
        }
    }

    pub fn register_binder(&mut self, name: impl Into<String>, binder: impl Binder + 'static) {
        self.binders.insert(name.into(), Arc::new(binder));
    }

    pub fn register_map_binder(
        &mut self,
        name: impl Into<String>,
        binder: impl MapBinder + 'static,
    ) {
        self.map_binders.insert(name.into(), Arc::new(binder));
    }

    pub fn register_param_parser(
        &mut self,
        name: impl Into<String>,
        parser: impl ParamParser + 'static,
    ) {
        self.param_parsers.insert(name.into(), Arc::new(parser));
    }

    pub fn register_endpoint_parser(
        &mut self,
        name: impl Into<String>,
        parser: impl EndpointParser + 'static,
    ) {
        self.endpoint_parsers.insert(name.into(), Arc::new(parser));
    }

    pub fn register_filter(&mut self, name: impl Into<String>, filter: impl RequestFilter + 'static) {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn register_parser(
        &mut self,
        name: impl Into<String>,
        parser: impl ResponseParser + 'static,
    ) {
        self.parsers.insert(name.into(), Arc::new(parser));
    }

    pub fn register_transform(
        &mut self,
        name: impl Into<String>,
        transform: impl Transform + 'static,
    ) {
        self.transforms.insert(name.into(), Arc::new(transform));
    }

    pub fn register_fallback(&mut self, name: impl Into<String>, fallback: impl Fallback + 'static) {
        self.fallbacks.insert(name.into(), Arc::new(fallback));
    }

    /// Registers the supplier behind an endpoint qualifier.
    pub fn register_endpoint(
        &mut self,
        qualifier: impl Into<String>,
        supplier: impl UriSupplier + 'static,
    ) {
        self.endpoints.insert(qualifier.into(), Arc::new(supplier));
    }

    /// Registers a marshaller under its own content type.
    pub fn register_marshaller(&mut self, marshaller: impl Marshaller + 'static) {
        let key = media_type(marshaller.content_type());
        self.marshallers.insert(key, Arc::new(marshaller));
    }

    /// Registers the invocation mapping for a synchronous facade, keyed by the
    /// facade's `Type.method` name.
    pub fn register_async_mapper(
        &mut self,
        sync_method: impl Into<String>,
        mapper: impl AsyncMapper + 'static,
    ) {
        self.async_mappers.insert(sync_method.into(), Arc::new(mapper));
    }

    /// # Errors
    ///
    /// Returns a configuration error when nothing is registered under `name`.
    pub fn binder(&self, name: &str) -> Result<Arc<dyn Binder>, Error> {
        lookup(&self.binders, "binder", name)
    }

    /// # Errors
    ///
    /// Returns a configuration error when nothing is registered under `name`.
    pub fn map_binder(&self, name: &str) -> Result<Arc<dyn MapBinder>, Error> {
        lookup(&self.map_binders, "map binder", name)
    }

    /// # Errors
    ///
    /// Returns a configuration error when nothing is registered under `name`.
    pub fn param_parser(&self, name: &str) -> Result<Arc<dyn ParamParser>, Error> {
        lookup(&self.param_parsers, "parameter parser", name)
    }

    /// The named endpoint parser, or the identity parser when `name` is absent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when nothing is registered under `name`.
    pub fn endpoint_parser(&self, name: Option<&str>) -> Result<Arc<dyn EndpointParser>, Error> {
        match name {
            Some(name) => lookup(&self.endpoint_parsers, "endpoint parser", name),
            None => Ok(Arc::new(Identity)),
        }
    }

    /// # Errors
    ///
    /// Returns a configuration error when nothing is registered under `name`.
    pub fn filter(&self, name: &str) -> Result<Arc<dyn RequestFilter>, Error> {
        lookup(&self.filters, "filter", name)
    }

    /// # Errors
    ///
    /// Returns a configuration error when nothing is registered under `name`.
    pub fn parser(&self, name: &str) -> Result<Arc<dyn ResponseParser>, Error> {
        lookup(&self.parsers, "response parser", name)
    }

    /// # Errors
    ///
    /// Returns a configuration error when nothing is registered under `name`.
    pub fn transform(&self, name: &str) -> Result<Arc<dyn Transform>, Error> {
        lookup(&self.transforms, "transform", name)
    }

    /// The named fallback, or the default 4xx mapping when `name` is absent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when nothing is registered under `name`.
    pub fn fallback(&self, name: Option<&str>) -> Result<Arc<dyn Fallback>, Error> {
        match name {
            Some(name) => lookup(&self.fallbacks, "fallback", name),
            None => Ok(Arc::new(MapHttp4xxCodesToErrors)),
        }
    }

    /// # Errors
    ///
    /// Returns a configuration error when no supplier has this qualifier.
    pub fn endpoint(&self, qualifier: &str) -> Result<Arc<dyn UriSupplier>, Error> {
        lookup(&self.endpoints, "endpoint supplier", qualifier)
    }

    /// Marshaller for a content type; JSON when none is declared.
    ///
    /// Any `+json` or `json` media type falls back to the JSON marshaller.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no marshaller handles the type.
    pub fn marshaller_for(&self, content_type: Option<&str>) -> Result<Arc<dyn Marshaller>, Error> {
        let key = media_type(content_type.unwrap_or(constants::CONTENT_TYPE_JSON));
        if let Some(marshaller) = self.marshallers.get(&key) {
            return Ok(Arc::clone(marshaller));
        }
        if constants::is_json_content_type(&key) {
            return lookup(&self.marshallers, "marshaller", constants::CONTENT_TYPE_JSON);
        }
        lookup(&self.marshallers, "marshaller", &key)
    }

    #[must_use]
    pub fn async_mapper(&self, sync_method: &str) -> Option<Arc<dyn AsyncMapper>> {
        self.async_mappers.get(sync_method).cloned()
    }
}

impl std::fmt::Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn names<T: ?Sized>(table: &HashMap<String, Arc<T>>) -> Vec<&str> {
            let mut names: Vec<&str> = table.keys().map(String::as_str).collect();
            names.sort_unstable();
            names
        }
        f.debug_struct("Strategies")
            .field("binders", &names(&self.binders))
            .field("map_binders", &names(&self.map_binders))
            .field("param_parsers", &names(&self.param_parsers))
            .field("endpoint_parsers", &names(&self.endpoint_parsers))
            .field("filters", &names(&self.filters))
            .field("parsers", &names(&self.parsers))
            .field("transforms", &names(&self.transforms))
            .field("fallbacks", &names(&self.fallbacks))
            .field("endpoints", &names(&self.endpoints))
            .field("marshallers", &names(&self.marshallers))
            .field("async_mappers", &names(&self.async_mappers))
            .finish()
    }
}
