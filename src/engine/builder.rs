//! Request building: metadata plus an invocation in, a generated request out.
//!
//! The steps run in a fixed order so that later steps see earlier bindings:
//! argument checks, endpoint, path tokens, path, matrix and query, headers,
//! options, payload, content headers, filters. Every null required argument
//! is rejected before anything is built.

use crate::binders::{BindMapToJsonPayload, BindMapToStringPayload, BindToJsonPayloadWrappedWith, Binder, MapBinder};
use crate::constants;
use crate::endpoint::{self, EndpointResolver};
use crate::error::Error;
use crate::invocation::{Arg, Invocation};
use crate::metadata::{KeyValue, MethodMetadata, ParamBinding, ParamDecl};
use crate::options::RequestOptions;
use crate::payload::{MultipartForm, Part, Payload};
use crate::request::{GeneratedRequest, Headers, HttpRequest};
use crate::strategies::Strategies;
use crate::uri;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

type Params = Vec<(String, Option<String>)>;

/// A delegate call in progress: its metadata and invocation.
pub type Caller<'a> = (&'a MethodMetadata, &'a Invocation);

/// Builds requests for one client.
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    strategies: &'a Strategies,
    default_endpoint: Option<&'a Url>,
    base_tokens: &'a IndexMap<String, String>,
    strip_expect: bool,
}

impl<'a> RequestBuilder<'a> {
    /// `base_tokens` are available to every template (API and build
    /// version, configured extras); argument tokens take precedence.
    #[must_use]
    pub const fn new(
        strategies: &'a Strategies,
        default_endpoint: Option<&'a Url>,
        base_tokens: &'a IndexMap<String, String>,
        strip_expect: bool,
    ) -> Self {
        Self {
            strategies,
            default_endpoint,
            base_tokens,
            strip_expect,
        }
    }

    /// Builds the request for one call.
    ///
    /// # Errors
    ///
    /// Returns an argument error for null required arguments or an empty
    /// host prefix, and a configuration error for unresolvable endpoints,
    /// templates or strategy names.
    pub fn build(
        &self,
        metadata: &MethodMetadata,
        invocation: &Invocation,
        caller: Option<Caller<'_>>,
    ) -> Result<GeneratedRequest, Error> {
        let method = metadata.id.qualified_name();
        let verb = metadata.verb.as_deref().ok_or_else(|| {
            Error::configuration(format!("{method} returns a sub-client and sends no request"))
        })?;
        check_arguments(metadata, invocation)?;

        let resolved = EndpointResolver::new(self.strategies, self.default_endpoint)
            .resolve(metadata, invocation, caller)?;
        let virtual_host = (metadata.virtual_host
            || caller.is_some_and(|(caller_metadata, _)| caller_metadata.virtual_host))
        .then(|| endpoint::virtual_host_header(&resolved))
        .flatten();
        let base = endpoint::apply_host_prefix(resolved, metadata, invocation)?;

        let mut tokens = self.base_tokens.clone();
        if let Some((caller_metadata, caller_invocation)) = caller {
            tokens.extend(self.path_tokens(caller_metadata, caller_invocation)?);
        }
        tokens.extend(self.path_tokens(metadata, invocation)?);

        let options = collect_options(metadata, invocation);

        let mut skip = metadata.skip_encoding.clone();
        let mut template = String::new();
        if let Some((caller_metadata, _)) = caller {
            template = caller_metadata.path.clone();
            skip.extend(caller_metadata.skip_encoding.iter().copied());
        }
        template = uri::join_paths([template.as_str(), metadata.path.as_str()]);
        for suffix in options.iter().filter_map(|opts| opts.suffix()) {
            template = uri::join_paths([template.as_str(), suffix]);
        }
        let path = uri::expand_path(&template, &tokens, &skip)
            .map_err(|e| Error::configuration(format!("{method}: {e}")))?;

        let mut matrix = Params::new();
        apply_static(&mut matrix, &metadata.matrix, &tokens);
        self.apply_params(&mut matrix, metadata, invocation, |b| {
            matches!(b, ParamBinding::Matrix { .. })
        })?;
        let mut query = Params::new();
        apply_static(&mut query, &metadata.query, &tokens);
        self.apply_params(&mut query, metadata, invocation, |b| {
            matches!(b, ParamBinding::Query { .. })
        })?;
        for opts in &options {
            extend_replaced(&mut matrix, opts.matrix(), &tokens);
            extend_replaced(&mut query, opts.query(), &tokens);
        }

        let url = uri::assemble(
            &base,
            &path,
            &uri::encode_matrix(&matrix, &skip),
            &uri::encode_query(&query),
        )
        .map_err(|e| Error::configuration(format!("{method} produced an invalid URI: {e}")))?;
        let mut request = HttpRequest::new(verb, url);
        *request.headers_mut() = self.headers(metadata, invocation, &tokens, &options, virtual_host)?;

        let mut request =
            self.bind_payload(request, metadata, invocation, caller, &tokens, &options)?;
        move_content_headers(&mut request);

        let mut filters = Vec::with_capacity(metadata.filters.len() + 1);
        for name in &metadata.filters {
            filters.push(self.strategies.filter(name)?);
        }
        if self.strip_expect {
            filters.push(self.strategies.filter(constants::FILTER_STRIP_EXPECT)?);
        }

        debug!(method = %method, request = %request.request_line(), "built request");
        Ok(GeneratedRequest::new(
            request,
            invocation.clone(),
            caller.map(|(_, caller_invocation)| caller_invocation.clone()),
            filters,
        ))
    }

    /// Template tokens bound by a method's own arguments: path and delegate
    /// parameters, after their parsers. A nullable null value binds `""`.
    ///
    /// # Errors
    ///
    /// Fails if a parameter parser is unknown or rejects the value.
    pub fn path_tokens(
        &self,
        metadata: &MethodMetadata,
        invocation: &Invocation,
    ) -> Result<IndexMap<String, String>, Error> {
        let mut tokens = IndexMap::new();
        for (index, param) in metadata.params_with(|b| {
            matches!(b, ParamBinding::Path { .. } | ParamBinding::Delegate { .. })
        }) {
            let value = self.parsed(param, invocation.arg(index))?;
            tokens.insert(
                param.key_name().to_string(),
                value.as_param_string().unwrap_or_default(),
            );
        }
        Ok(tokens)
    }

    fn parsed(&self, param: &ParamDecl, value: &Arg) -> Result<Arg, Error> {
        match &param.parser {
            Some(name) => self.strategies.param_parser(name)?.parse(value),
            None => Ok(value.clone()),
        }
    }

    /// One string per element for list arguments; nothing for null.
    fn values(&self, param: &ParamDecl, value: &Arg) -> Result<Vec<String>, Error> {
        let parsed = self.parsed(param, value)?;
        Ok(parsed
            .elements()
            .into_iter()
            .filter_map(Arg::as_param_string)
            .collect())
    }

    fn apply_params(
        &self,
        target: &mut Params,
        metadata: &MethodMetadata,
        invocation: &Invocation,
        pred: fn(&ParamBinding) -> bool,
    ) -> Result<(), Error> {
        for (index, param) in metadata.params_with(pred) {
            for value in self.values(param, invocation.arg(index))? {
                target.push((param.key_name().to_string(), Some(value)));
            }
        }
        Ok(())
    }

    fn headers(
        &self,
        metadata: &MethodMetadata,
        invocation: &Invocation,
        tokens: &IndexMap<String, String>,
        options: &[&RequestOptions],
        virtual_host: Option<String>,
    ) -> Result<Headers, Error> {
        let mut headers = Headers::new();
        for kv in &metadata.headers {
            match &kv.value {
                Some(value) => headers.append(kv.key.clone(), uri::replace_tokens(value, tokens)),
                None => {
                    headers.remove(&kv.key);
                }
            }
        }
        for (index, param) in metadata.params_with(|b| matches!(b, ParamBinding::Header { .. })) {
            for value in self.values(param, invocation.arg(index))? {
                headers.append(param.key_name(), uri::replace_tokens(&value, tokens));
            }
        }
        if let Some(content_type) = &metadata.produces {
            headers.replace(constants::HEADER_CONTENT_TYPE, content_type.clone());
        }
        if let Some(accept) = &metadata.consumes {
            headers.replace(constants::HEADER_ACCEPT, accept.clone());
        }
        if let Some(host) = virtual_host {
            headers.replace(constants::HEADER_HOST, host);
        }
        for opts in options {
            for (name, value) in opts.headers() {
                headers.append(name.clone(), uri::replace_tokens(value, tokens));
            }
        }
        Ok(headers)
    }

    fn form_params(
        &self,
        metadata: &MethodMetadata,
        invocation: &Invocation,
        caller: Option<Caller<'_>>,
        tokens: &IndexMap<String, String>,
        options: &[&RequestOptions],
    ) -> Result<Params, Error> {
        let mut form = Params::new();
        if let Some((caller_metadata, caller_invocation)) = caller {
            apply_static(&mut form, &caller_metadata.form, tokens);
            self.apply_params(&mut form, caller_metadata, caller_invocation, |b| {
                matches!(b, ParamBinding::Form { .. })
            })?;
        }
        apply_static(&mut form, &metadata.form, tokens);
        self.apply_params(&mut form, metadata, invocation, |b| {
            matches!(b, ParamBinding::Form { .. })
        })?;
        for opts in options {
            extend_replaced(&mut form, opts.form(), tokens);
        }
        Ok(form)
    }

    fn parts(
        &self,
        metadata: &MethodMetadata,
        invocation: &Invocation,
        tokens: &IndexMap<String, String>,
        form: &Params,
    ) -> Result<Vec<Part>, Error> {
        let part_params: Vec<(usize, &ParamDecl)> = metadata
            .params_with(|b| matches!(b, ParamBinding::Part { .. }))
            .collect();
        if part_params.is_empty() {
            return Ok(Vec::new());
        }

        let mut filename_tokens = tokens.clone();
        for (key, value) in form {
            filename_tokens.insert(key.clone(), value.clone().unwrap_or_default());
        }
        for (index, param) in &part_params {
            if let Some(text) = self.parsed(param, invocation.arg(*index))?.as_param_string() {
                filename_tokens
                    .entry(param.key_name().to_string())
                    .or_insert(text);
            }
        }

        let mut parts = Vec::with_capacity(part_params.len());
        for (index, param) in part_params {
            let Some(ParamBinding::Part {
                content_type,
                filename,
                ..
            }) = &param.binding
            else {
                continue;
            };
            let value = self.parsed(param, invocation.arg(index))?;
            if value.is_null() {
                continue;
            }
            let (data, payload_type) = match &value {
                Arg::Payload(payload) => (
                    payload.body().clone(),
                    payload.content_type().map(str::to_string),
                ),
                other => (other.as_bytes().unwrap_or_default().into(), None),
            };
            let mut part = Part::new(param.key_name(), data);
            if let Some(content_type) = content_type.clone().or(payload_type) {
                part = part.content_type(content_type);
            }
            if let Some(template) = filename {
                part = part.filename(uri::replace_tokens(template, &filename_tokens));
            }
            parts.push(part);
        }
        Ok(parts)
    }

    fn bind_payload(
        &self,
        mut request: HttpRequest,
        metadata: &MethodMetadata,
        invocation: &Invocation,
        caller: Option<Caller<'_>>,
        tokens: &IndexMap<String, String>,
        options: &[&RequestOptions],
    ) -> Result<HttpRequest, Error> {
        // Options payloads: the last one wins.
        if let Some(text) = options.iter().rev().find_map(|opts| opts.string_payload()) {
            request.set_payload(Some(Payload::text(uri::replace_tokens(text, tokens))));
        }

        for (index, param) in metadata.params.iter().enumerate() {
            if param.binding.is_none() {
                if let Arg::Payload(payload) = invocation.arg(index) {
                    request.set_payload(Some(payload.clone()));
                }
            }
        }

        let form = self.form_params(metadata, invocation, caller, tokens, options)?;
        let parts = self.parts(metadata, invocation, tokens, &form)?;
        if !parts.is_empty() {
            let leading = form.into_iter().map(|(key, value)| {
                Part::new(key, value.unwrap_or_default().into_bytes())
            });
            let all: Vec<Part> = leading.chain(parts).collect();
            request.set_payload(Some(MultipartForm::new(all).into_payload()));
        } else if !form.is_empty() {
            request.set_payload(Some(Payload::url_encoded_form(&form)));
        } else if request.payload().is_none() && metadata.is_payload_verb() {
            if let Some(content_type) = request.headers().get(constants::HEADER_CONTENT_TYPE) {
                let empty = Payload::empty(content_type);
                request.set_payload(Some(empty));
            }
        }

        if metadata.uses_map_binder() {
            self.bind_map(request, metadata, invocation, caller, tokens)
        } else {
            self.bind_params(request, metadata, invocation)
        }
    }

    fn payload_params(
        &self,
        params: &mut IndexMap<String, Value>,
        metadata: &MethodMetadata,
        invocation: &Invocation,
    ) -> Result<(), Error> {
        for (index, param) in metadata.params_with(|b| matches!(b, ParamBinding::Payload { .. })) {
            let value = self.parsed(param, invocation.arg(index))?;
            if !value.is_null() {
                params.insert(param.key_name().to_string(), value.to_json());
            }
        }
        Ok(())
    }

    fn bind_map(
        &self,
        request: HttpRequest,
        metadata: &MethodMetadata,
        invocation: &Invocation,
        caller: Option<Caller<'_>>,
        tokens: &IndexMap<String, String>,
    ) -> Result<HttpRequest, Error> {
        let mut params: IndexMap<String, Value> = IndexMap::new();
        if metadata.payload_template.is_some() {
            for (key, value) in tokens {
                params.insert(key.clone(), Value::String(value.clone()));
            }
        }
        if let Some((caller_metadata, caller_invocation)) = caller {
            self.payload_params(&mut params, caller_metadata, caller_invocation)?;
            insert_defaults(&mut params, &caller_metadata.payload_params, tokens);
        }
        self.payload_params(&mut params, metadata, invocation)?;
        insert_defaults(&mut params, &metadata.payload_params, tokens);

        if params.is_empty() && metadata.payload_template.is_none() {
            return Ok(request);
        }

        let binder: Arc<dyn MapBinder> = if let Some(name) = &metadata.map_binder {
            self.strategies.map_binder(name)?
        } else if let Some(template) = &metadata.payload_template {
            Arc::new(BindMapToStringPayload::new(template.clone()))
        } else if let Some(key) = &metadata.wrap_with {
            Arc::new(BindMapToJsonPayload::wrapped_with(
                self.strategies.marshaller_for(metadata.produces.as_deref())?,
                key.clone(),
            ))
        } else {
            self.strategies.map_binder(constants::MAP_BINDER_JSON)?
        };
        binder.bind_to_request(request, &params)
    }

    fn bind_params(
        &self,
        mut request: HttpRequest,
        metadata: &MethodMetadata,
        invocation: &Invocation,
    ) -> Result<HttpRequest, Error> {
        for (index, param) in metadata.params_with(|b| {
            matches!(b, ParamBinding::Binder { .. } | ParamBinding::WrapWith { .. })
        }) {
            let value = self.parsed(param, invocation.arg(index))?;
            if value.is_null() {
                continue;
            }
            let binder: Arc<dyn Binder> = match &param.binding {
                Some(ParamBinding::Binder { strategy }) => self.strategies.binder(strategy)?,
                Some(ParamBinding::WrapWith { key }) => Arc::new(BindToJsonPayloadWrappedWith::new(
                    key.clone(),
                    self.strategies.marshaller_for(metadata.produces.as_deref())?,
                )),
                _ => continue,
            };
            request = binder.bind_to_request(request, &value)?;
        }
        Ok(request)
    }
}

/// Rejects extra arguments and null required values, naming the parameter.
fn check_arguments(metadata: &MethodMetadata, invocation: &Invocation) -> Result<(), Error> {
    let method = metadata.id.qualified_name();
    if invocation.args().len() > metadata.params.len() {
        return Err(Error::argument(
            &method,
            format!("#{}", metadata.params.len()),
            metadata.params.len(),
            format!(
                "{method} takes {} arguments, got {}",
                metadata.params.len(),
                invocation.args().len()
            ),
        ));
    }
    for (index, param) in metadata.params.iter().enumerate() {
        if param.requires_value() && invocation.arg(index).is_null() {
            let kind = param.binding.as_ref().map_or("parameter", |b| b.kind());
            return Err(Error::argument(
                &method,
                param.key_name(),
                index,
                format!("{kind} value is null; declare the parameter nullable to allow this"),
            ));
        }
    }
    Ok(())
}

/// Options arguments in declaration order, list elements in call-site order.
fn collect_options<'i>(metadata: &MethodMetadata, invocation: &'i Invocation) -> Vec<&'i RequestOptions> {
    let mut options = Vec::new();
    for (index, param) in metadata.params.iter().enumerate() {
        if !matches!(
            param.binding,
            None | Some(ParamBinding::Options | ParamBinding::OptionsVarargs)
        ) {
            continue;
        }
        match invocation.arg(index) {
            Arg::Options(opts) => options.push(opts),
            Arg::OptionsList(list) => options.extend(list.iter()),
            _ => {}
        }
    }
    options
}

/// Static declarations; a declaration without a value drops earlier entries
/// for its key and leaves the bare key.
fn apply_static(target: &mut Params, declared: &[KeyValue], tokens: &IndexMap<String, String>) {
    for kv in declared {
        match &kv.value {
            Some(value) => target.push((kv.key.clone(), Some(uri::replace_tokens(value, tokens)))),
            None => {
                target.retain(|(key, _)| key != &kv.key);
                target.push((kv.key.clone(), None));
            }
        }
    }
}

fn extend_replaced(target: &mut Params, extra: &[(String, Option<String>)], tokens: &IndexMap<String, String>) {
    target.extend(extra.iter().map(|(key, value)| {
        (
            key.clone(),
            value.as_deref().map(|v| uri::replace_tokens(v, tokens)),
        )
    }));
}

fn insert_defaults(params: &mut IndexMap<String, Value>, defaults: &[KeyValue], tokens: &IndexMap<String, String>) {
    for kv in defaults {
        let value = kv
            .value
            .as_deref()
            .map_or(Value::Null, |v| Value::String(uri::replace_tokens(v, tokens)));
        params.insert(kv.key.clone(), value);
    }
}

/// Content headers describe the payload, so they move into its metadata.
fn move_content_headers(request: &mut HttpRequest) {
    if request.payload().is_none() {
        return;
    }
    for name in constants::CONTENT_HEADERS {
        let values = request.headers_mut().remove(name);
        if let (Some(value), Some(payload)) = (values.last(), request.payload_mut()) {
            payload.metadata_mut().set_from_header(name, value);
        }
    }
}
