//! Endpoint resolution.
//!
//! The first source that yields an endpoint wins:
//! 1. the calling delegate's endpoint, for sub-client calls
//! 2. endpoint-bound parameters, joined by the endpoint parser
//! 3. the declared endpoint qualifier, looked up as a named supplier
//! 4. the client's default endpoint
//!
//! A relative result is rebased onto the default endpoint; an absolute one is
//! used verbatim.

use crate::error::Error;
use crate::invocation::{Arg, Invocation};
use crate::metadata::{MethodMetadata, ParamBinding};
use crate::strategies::Strategies;
use crate::uri;
use tracing::trace;
use url::Url;

/// Supplies the URI behind an endpoint qualifier.
pub trait UriSupplier: Send + Sync {
    /// # Errors
    ///
    /// Fails if the endpoint is not currently available.
    fn get(&self) -> Result<Url, Error>;
}

impl<F> UriSupplier for F
where
    F: Fn() -> Result<Url, Error> + Send + Sync,
{
    fn get(&self) -> Result<Url, Error> {
        self()
    }
}

/// A supplier that always returns the same URI.
#[derive(Debug, Clone)]
pub struct FixedUri(pub Url);

impl UriSupplier for FixedUri {
    fn get(&self) -> Result<Url, Error> {
        Ok(self.0.clone())
    }
}

/// Resolves endpoints against the registry and the client's default.
#[derive(Debug, Clone, Copy)]
pub struct EndpointResolver<'a> {
    strategies: &'a Strategies,
    default: Option<&'a Url>,
}

impl<'a> EndpointResolver<'a> {
    #[must_use]
    pub const fn new(strategies: &'a Strategies, default: Option<&'a Url>) -> Self {
        Self {
            strategies,
            default,
        }
    }

    /// Base URI for a call, before host prefix rewriting.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no source yields an endpoint, or
    /// when a relative endpoint has no default to rebase onto.
    pub fn resolve(
        &self,
        metadata: &MethodMetadata,
        invocation: &Invocation,
        caller: Option<(&MethodMetadata, &Invocation)>,
    ) -> Result<Url, Error> {
        if let Some((caller_metadata, caller_invocation)) = caller {
            if let Some(url) = self.declared(caller_metadata, caller_invocation)? {
                trace!(endpoint = %url, caller = %caller_invocation, "using caller endpoint");
                return Ok(url);
            }
        }
        if let Some(url) = self.declared(metadata, invocation)? {
            trace!(endpoint = %url, method = %metadata.id, "using declared endpoint");
            return Ok(url);
        }
        self.default.cloned().ok_or_else(|| {
            Error::configuration(format!(
                "no endpoint for {}: bind an endpoint parameter, declare an endpoint or configure a default",
                metadata.id.qualified_name()
            ))
        })
    }

    fn declared(
        &self,
        metadata: &MethodMetadata,
        invocation: &Invocation,
    ) -> Result<Option<Url>, Error> {
        if let Some(endpoint) = self.from_parameters(metadata, invocation)? {
            return self.rebase(metadata, &endpoint).map(Some);
        }
        match &metadata.endpoint {
            Some(qualifier) => {
                let url = self.strategies.endpoint(qualifier)?.get()?;
                self.rebase(metadata, url.as_str()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn from_parameters(
        &self,
        metadata: &MethodMetadata,
        invocation: &Invocation,
    ) -> Result<Option<String>, Error> {
        let mut parser_name = None;
        let mut values: Vec<Arg> = Vec::new();
        for (index, param) in metadata.params_with(|b| matches!(b, ParamBinding::Endpoint { .. })) {
            if let Some(ParamBinding::Endpoint { parser: Some(name) }) = &param.binding {
                parser_name.get_or_insert(name.as_str());
            }
            let value = invocation.arg(index);
            if !value.is_null() {
                values.push(value.clone());
            }
        }
        if values.is_empty() {
            return Ok(None);
        }
        let parser = self.strategies.endpoint_parser(parser_name)?;
        parser.parse_endpoint(&values).map(Some)
    }

    fn rebase(&self, metadata: &MethodMetadata, endpoint: &str) -> Result<Url, Error> {
        uri::add_host_if_missing(endpoint, self.default).ok_or_else(|| {
            Error::configuration(format!(
                "endpoint '{endpoint}' for {} is relative and no default endpoint is configured",
                metadata.id.qualified_name()
            ))
        })
    }
}

/// Rewrites the host to `{prefix}{separator}{host}` when a parameter is bound
/// as a host prefix.
///
/// # Errors
///
/// Returns an argument error for an empty prefix or one that makes the host
/// invalid.
pub fn apply_host_prefix(
    endpoint: Url,
    metadata: &MethodMetadata,
    invocation: &Invocation,
) -> Result<Url, Error> {
    let Some((index, param)) = metadata
        .params_with(|b| matches!(b, ParamBinding::HostPrefix { .. }))
        .next()
    else {
        return Ok(endpoint);
    };
    let Some(ParamBinding::HostPrefix { separator }) = &param.binding else {
        return Ok(endpoint);
    };
    let method = metadata.id.qualified_name();
    let prefix = invocation
        .arg(index)
        .as_param_string()
        .unwrap_or_default();
    if prefix.is_empty() {
        return Err(Error::argument(
            method,
            &param.name,
            index,
            "host prefix must not be empty",
        ));
    }
    let host = endpoint.host_str().ok_or_else(|| {
        Error::configuration(format!("endpoint {endpoint} for {method} has no host to prefix"))
    })?;
    let prefixed = format!("{prefix}{separator}{host}");
    let mut rewritten = endpoint.clone();
    rewritten
        .set_host(Some(&prefixed))
        .map_err(|e| Error::argument(&method, &param.name, index, format!("host '{prefixed}' is invalid: {e}")))?;
    trace!(host = %prefixed, "applied host prefix");
    Ok(rewritten)
}

/// `Host` header value for virtual-host style addressing.
#[must_use]
pub fn virtual_host_header(endpoint: &Url) -> Option<String> {
    uri::host_and_port(endpoint)
}
