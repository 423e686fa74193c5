//! The generic client: one dispatcher for every declared interface, keyed by
//! method identity.
//!
//! Methods are bound lazily, on first use or by [`RestClient::validate`].
//! Binding merges the declarations, checks every strategy name against the
//! registry and selects the response transform and fallback policy; the result
//! is cached for the life of the client.

use crate::config::EngineConfig;
use crate::constants;
use crate::endpoint::FixedUri;
use crate::engine::builder::RequestBuilder;
use crate::engine::dispatcher::{AsyncMapper, BoundMethod, Dispatcher, Outcome, RenameTo};
use crate::engine::executors::Executors;
use crate::engine::selector::ResponseTransform;
use crate::error::Error;
use crate::filters::BasicAuthentication;
use crate::invocation::{Arg, Invocation};
use crate::metadata::{ApiDefinition, InterfaceDecl, MethodMetadata, ParamBinding};
use crate::request::HttpRequest;
use crate::response::Reply;
use crate::strategies::Strategies;
use crate::transport::{HttpCommandExecutorService, ReqwestExecutor};
use crate::uri;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

struct Inner {
    interfaces: IndexMap<String, InterfaceDecl>,
    bound: DashMap<String, Arc<BoundMethod>>,
    strategies: Strategies,
    dispatcher: Dispatcher,
    default_endpoint: Option<Url>,
    base_tokens: IndexMap<String, String>,
    strip_expect: bool,
}

/// The delegate call a sub-client was created from.
#[derive(Clone)]
struct CallerContext {
    bound: Arc<BoundMethod>,
    invocation: Invocation,
    target: String,
}

/// Entry point for calls against declared interfaces.
///
/// Cheap to clone; clones share bound methods, pools and transport.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
    caller: Option<CallerContext>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("interfaces", &self.inner.interfaces.keys().collect::<Vec<_>>())
            .field("default_endpoint", &self.inner.default_endpoint)
            .field(
                "caller",
                &self.caller.as_ref().map(|c| c.invocation.to_string()),
            )
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Declared interfaces in declaration order.
    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceDecl> {
        self.inner.interfaces.values()
    }

    /// Interface a sub-client is scoped to, if this is one.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.caller.as_ref().map(|c| c.target.as_str())
    }

    /// The merged metadata of a method, binding it if needed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown interfaces or methods and
    /// for declarations that do not bind.
    pub fn metadata(&self, interface: &str, method: &str) -> Result<MethodMetadata, Error> {
        Ok(self.bind(interface, method)?.metadata.clone())
    }

    /// Binds every declared method, surfacing configuration errors up front.
    ///
    /// # Errors
    ///
    /// Returns the first binding error.
    pub fn validate(&self) -> Result<(), Error> {
        for interface in self.inner.interfaces.values() {
            for method in &interface.methods {
                self.bind(&interface.name, &method.name)?;
            }
        }
        Ok(())
    }

    /// Invokes `interface.method` with positional arguments and waits for the
    /// reply.
    ///
    /// # Errors
    ///
    /// Returns binding, argument and transport errors, or whatever the
    /// method's fallback policy propagates.
    pub fn call(&self, interface: &str, method: &str, args: Vec<Arg>) -> Result<Reply, Error> {
        let id = self.bind(interface, method)?.metadata.id.clone();
        self.invoke(Invocation::new(id, args))?.into_reply()
    }

    /// Dispatches one invocation.
    ///
    /// Deferred methods return [`Outcome::Deferred`]; everything else is
    /// resolved before returning.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn invoke(&self, invocation: Invocation) -> Result<Outcome, Error> {
        let bound = self.bound_for(&invocation)?;
        if let Some(mapper) = self.async_mapping(&bound) {
            let mapped = mapper.map(&invocation)?;
            let async_bound = self.bind(mapped.method().declaring_type(), mapped.method().name())?;
            debug!(from = %invocation.method(), to = %mapped.method(), "sync facade over async method");
            let outcome = self.dispatch(&async_bound, &mapped)?;
            return outcome.into_reply().map(Outcome::Ready);
        }
        self.dispatch(&bound, &invocation)
    }

    /// Builds and seals the request an invocation would send, without
    /// sending it.
    ///
    /// # Errors
    ///
    /// Returns binding and argument errors.
    pub fn build_request(&self, invocation: &Invocation) -> Result<HttpRequest, Error> {
        let bound = self.bound_for(invocation)?;
        self.request_for(&bound, invocation)
    }

    /// Calls a method that returns a sub-client.
    ///
    /// Calls through the sub-client carry this invocation as their caller: its
    /// endpoint is tried first and its path, tokens, form and payload params
    /// come ahead of the callee's.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the method does not return a
    /// sub-client, and an argument error for null required arguments.
    pub fn delegate(&self, invocation: Invocation) -> Result<Self, Error> {
        if self.caller.is_some() {
            return Err(Error::configuration(format!(
                "{} is called through a sub-client; nested sub-clients are not supported",
                invocation.method().qualified_name()
            )));
        }
        let bound = self.bind(invocation.method().declaring_type(), invocation.method().name())?;
        let target = bound.metadata.delegate.clone().ok_or_else(|| {
            Error::configuration(format!(
                "{} does not return a sub-client",
                bound.metadata.id.qualified_name()
            ))
        })?;
        for (index, param) in bound.metadata.params.iter().enumerate() {
            if param.requires_value() && invocation.arg(index).is_null() {
                return Err(Error::argument(
                    bound.metadata.id.qualified_name(),
                    param.key_name(),
                    index,
                    "value is null; declare the parameter nullable to allow this",
                ));
            }
        }
        trace!(method = %invocation.method(), target = %target, "created sub-client");
        Ok(Self {
            inner: Arc::clone(&self.inner),
            caller: Some(CallerContext {
                bound,
                invocation,
                target,
            }),
        })
    }

    fn bound_for(&self, invocation: &Invocation) -> Result<Arc<BoundMethod>, Error> {
        let id = invocation.method();
        if let Some(caller) = &self.caller {
            if id.declaring_type() != caller.target {
                return Err(Error::configuration(format!(
                    "this sub-client serves {}, not {}",
                    caller.target,
                    id.qualified_name()
                )));
            }
        }
        self.bind(id.declaring_type(), id.name())
    }

    /// A registered mapper wins over the declared `async_method` rename.
    fn async_mapping(&self, bound: &BoundMethod) -> Option<Arc<dyn AsyncMapper>> {
        self.inner
            .strategies
            .async_mapper(&bound.metadata.id.qualified_name())
            .or_else(|| {
                bound
                    .metadata
                    .async_method
                    .as_ref()
                    .map(|name| Arc::new(RenameTo(name.clone())) as Arc<dyn AsyncMapper>)
            })
    }

    fn request_for(&self, bound: &BoundMethod, invocation: &Invocation) -> Result<HttpRequest, Error> {
        let builder = RequestBuilder::new(
            &self.inner.strategies,
            self.inner.default_endpoint.as_ref(),
            &self.inner.base_tokens,
            self.inner.strip_expect,
        );
        let caller = self
            .caller
            .as_ref()
            .map(|c| (&c.bound.metadata, &c.invocation));
        builder.build(&bound.metadata, invocation, caller)?.seal()
    }

    fn dispatch(&self, bound: &Arc<BoundMethod>, invocation: &Invocation) -> Result<Outcome, Error> {
        let request = self.request_for(bound, invocation)?;
        self.inner.dispatcher.dispatch(bound, request)
    }

    fn bind(&self, interface: &str, method: &str) -> Result<Arc<BoundMethod>, Error> {
        let key = format!("{interface}.{method}");
        if let Some(bound) = self.inner.bound.get(&key) {
            return Ok(Arc::clone(bound.value()));
        }

        let declared = self
            .inner
            .interfaces
            .get(interface)
            .ok_or_else(|| Error::configuration(format!("unknown interface '{interface}'")))?;
        let method_decl = declared.find_method(method).ok_or_else(|| {
            Error::configuration(format!("interface '{interface}' has no method '{method}'"))
        })?;
        let metadata = MethodMetadata::merge(declared, method_decl)?;
        self.check_strategies(&metadata)?;
        self.check_tokens(&metadata)?;
        if let Some(target) = &metadata.delegate {
            if !self.inner.interfaces.contains_key(target) {
                return Err(Error::configuration(format!(
                    "{key} returns a sub-client for unknown interface '{target}'"
                )));
            }
        }
        if let Some(name) = &metadata.async_method {
            if declared.find_method(name).is_none() {
                return Err(Error::configuration(format!(
                    "{key} is backed by '{name}', which '{interface}' does not declare"
                )));
            }
        }

        let transform = ResponseTransform::select(&metadata, &self.inner.strategies)?;
        let fallback = self.inner.strategies.fallback(metadata.fallback.as_deref())?;
        debug!(method = %metadata.id, transform = %transform, "bound method");
        let bound = Arc::new(BoundMethod {
            metadata,
            transform,
            fallback,
        });
        Ok(Arc::clone(
            self.inner.bound.entry(key).or_insert(bound).value(),
        ))
    }

    /// Every strategy a method names must be registered.
    fn check_strategies(&self, metadata: &MethodMetadata) -> Result<(), Error> {
        let strategies = &self.inner.strategies;
        for name in &metadata.filters {
            strategies.filter(name)?;
        }
        if let Some(qualifier) = &metadata.endpoint {
            strategies.endpoint(qualifier)?;
        }
        if let Some(name) = &metadata.map_binder {
            strategies.map_binder(name)?;
        }
        let mut wraps = metadata.wrap_with.is_some();
        for param in &metadata.params {
            if let Some(name) = &param.parser {
                strategies.param_parser(name)?;
            }
            match &param.binding {
                Some(ParamBinding::Binder { strategy }) => {
                    strategies.binder(strategy)?;
                }
                Some(ParamBinding::Endpoint { parser }) => {
                    strategies.endpoint_parser(parser.as_deref())?;
                }
                Some(ParamBinding::WrapWith { .. }) => wraps = true,
                _ => {}
            }
        }
        if wraps {
            strategies.marshaller_for(metadata.produces.as_deref())?;
        }
        Ok(())
    }

    /// Path tokens must be bound by a parameter or a base token, except on
    /// interfaces reached through a sub-client, whose caller supplies them.
    fn check_tokens(&self, metadata: &MethodMetadata) -> Result<(), Error> {
        let interface = metadata.id.declaring_type();
        let delegate_target = self.inner.interfaces.values().any(|decl| {
            decl.methods
                .iter()
                .any(|m| m.delegate.as_deref() == Some(interface))
        });
        if delegate_target {
            return Ok(());
        }
        let mut bound = metadata.bound_path_tokens();
        bound.extend(
            metadata
                .params_with(|b| matches!(b, ParamBinding::Delegate { .. }))
                .map(|(_, param)| param.key_name()),
        );
        let tokens = uri::template_tokens(&metadata.path)
            .map_err(|e| Error::configuration(format!("{}: {e}", metadata.id.qualified_name())))?;
        for token in tokens {
            if !bound.contains(&token.as_str()) && !self.inner.base_tokens.contains_key(&token) {
                return Err(Error::configuration(format!(
                    "{}: path token '{{{token}}}' is not bound by any parameter",
                    metadata.id.qualified_name()
                )));
            }
        }
        Ok(())
    }
}

/// Assembles a [`RestClient`] from configuration, declarations, strategy
/// overrides and a transport.
pub struct ClientBuilder {
    config: EngineConfig,
    interfaces: Vec<InterfaceDecl>,
    strategies: Strategies,
    transport: Option<Arc<dyn HttpCommandExecutorService>>,
    endpoint: Option<String>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("interfaces", &self.interfaces.len())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            interfaces: Vec::new(),
            strategies: Strategies::new(),
            transport: None,
            endpoint: None,
        }
    }

    #[must_use]
    pub fn interface(mut self, interface: InterfaceDecl) -> Self {
        self.interfaces.push(interface);
        self
    }

    #[must_use]
    pub fn definitions(mut self, definitions: ApiDefinition) -> Self {
        self.interfaces.extend(definitions.interfaces);
        self
    }

    /// Registers or overrides strategies.
    #[must_use]
    pub fn strategies(mut self, configure: impl FnOnce(&mut Strategies)) -> Self {
        configure(&mut self.strategies);
        self
    }

    /// Default endpoint, ahead of `HTTPBIND_ENDPOINT` and the configuration.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Replaces the reqwest transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpCommandExecutorService>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// # Errors
    ///
    /// Returns a configuration error for duplicate interfaces, invalid
    /// endpoints or pool sizes, or a transport that cannot start.
    pub fn build(self) -> Result<RestClient, Error> {
        let Self {
            config,
            interfaces,
            mut strategies,
            transport,
            endpoint,
        } = self;

        let mut declared = IndexMap::new();
        for interface in interfaces {
            let name = interface.name.clone();
            if declared.insert(name.clone(), interface).is_some() {
                return Err(Error::configuration(format!(
                    "interface '{name}' is declared twice"
                )));
            }
        }

        for (qualifier, url) in config.named_endpoints()? {
            if strategies.endpoint(&qualifier).is_err() {
                strategies.register_endpoint(qualifier, FixedUri(url));
            }
        }
        if let Some(auth) = &config.basic_auth {
            if strategies.filter(constants::FILTER_BASIC_AUTH).is_err() {
                strategies.register_filter(
                    constants::FILTER_BASIC_AUTH,
                    BasicAuthentication::new(&auth.user, &auth.password),
                );
            }
        }

        let default_endpoint = config.resolve_default_endpoint(endpoint.as_deref())?;
        let executors = Arc::new(Executors::new(config.user_threads, config.io_threads)?);
        let transport = match transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestExecutor::new(
                executors.io().clone(),
                &config.timeouts,
                config.retry.clone(),
                config.user_agent.as_deref(),
            )?),
        };
        debug!(
            interfaces = declared.len(),
            default_endpoint = ?default_endpoint.as_ref().map(Url::as_str),
            "client assembled"
        );

        Ok(RestClient {
            inner: Arc::new(Inner {
                interfaces: declared,
                bound: DashMap::new(),
                strategies,
                dispatcher: Dispatcher::new(transport, executors),
                default_endpoint,
                base_tokens: config.base_tokens(),
                strip_expect: config.strip_expect_header,
            }),
            caller: None,
        })
    }
}
