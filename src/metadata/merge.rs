//! Merging class-level and method-level declarations into the per-method
//! record that the rest of the engine reads.

use super::{
    InterfaceDecl, KeyValue, MethodDecl, ParamBinding, ParamDecl, ReturnShape, SelectJsonDecl,
    UnwrapDecl,
};
use crate::error::Error;
use crate::invocation::MethodId;
use crate::uri;
use std::time::Duration;

const KNOWN_VERBS: &[&str] = &["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Verbs that never carry a body.
pub const NON_PAYLOAD_VERBS: &[&str] = &["GET", "HEAD", "DELETE", "OPTIONS"];

/// Everything the engine knows about one method, computed once.
///
/// Static key/value lists hold class-level entries first, then method-level
/// entries, each in declaration order; duplicates are kept.
#[derive(Debug, Clone)]
pub struct MethodMetadata {
    pub id: MethodId,
    pub verb: Option<String>,
    /// Interface path joined with method path, not yet expanded
    pub path: String,
    pub endpoint: Option<String>,
    pub headers: Vec<KeyValue>,
    pub query: Vec<KeyValue>,
    pub matrix: Vec<KeyValue>,
    pub form: Vec<KeyValue>,
    /// Filter names in application order
    pub filters: Vec<String>,
    pub skip_encoding: Vec<char>,
    pub timeout: Option<Duration>,
    pub virtual_host: bool,
    pub produces: Option<String>,
    pub consumes: Option<String>,
    pub parser: Option<String>,
    pub unwrap: Option<UnwrapDecl>,
    pub select_json: Option<SelectJsonDecl>,
    pub transform: Option<String>,
    pub fallback: Option<String>,
    pub payload_template: Option<String>,
    pub payload_params: Vec<KeyValue>,
    pub map_binder: Option<String>,
    pub wrap_with: Option<String>,
    pub returns: ReturnShape,
    pub params: Vec<ParamDecl>,
    pub delegate: Option<String>,
    pub async_method: Option<String>,
}

impl MethodMetadata {
    /// Merges an interface's declarations with one of its methods.
    ///
    /// Checks everything that can be checked without the strategy registry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a missing or unknown verb, a
    /// malformed path template, or conflicting bindings.
    pub fn merge(interface: &InterfaceDecl, method: &MethodDecl) -> Result<Self, Error> {
        let id = MethodId::new(
            interface.name.clone(),
            method.name.clone(),
            method
                .params
                .iter()
                .map(|param| param.type_name.clone().unwrap_or_else(|| "Object".to_string())),
        );
        let qualified = id.qualified_name();

        let verb = method.verb.as_ref().map(|verb| verb.to_uppercase());
        match (&verb, &method.delegate) {
            (None, None) => {
                return Err(Error::configuration(format!(
                    "{qualified} declares no HTTP verb"
                )))
            }
            (Some(verb), _) if !KNOWN_VERBS.contains(&verb.as_str()) => {
                return Err(Error::configuration(format!(
                    "{qualified} declares unknown HTTP verb '{verb}'"
                )))
            }
            _ => {}
        }

        let path = uri::join_paths([
            interface.path.as_deref().unwrap_or(""),
            method.path.as_deref().unwrap_or(""),
        ]);
        uri::template_tokens(&path)
            .map_err(|e| Error::configuration(format!("{qualified}: {e}")))?;

        let mut filters = if method.override_filters {
            Vec::new()
        } else {
            interface.filters.clone()
        };
        filters.extend(method.filters.iter().cloned());

        let mut skip_encoding: Vec<char> = interface.skip_encoding.chars().collect();
        for c in method.skip_encoding.chars() {
            if !skip_encoding.contains(&c) {
                skip_encoding.push(c);
            }
        }

        let metadata = Self {
            verb,
            path,
            endpoint: method.endpoint.clone().or_else(|| interface.endpoint.clone()),
            headers: concat(&interface.headers, &method.headers),
            query: concat(&interface.query, &method.query),
            matrix: concat(&interface.matrix, &method.matrix),
            form: concat(&interface.form, &method.form),
            filters,
            skip_encoding,
            timeout: method.timeout.or(interface.timeout),
            virtual_host: interface.virtual_host || method.virtual_host,
            produces: method.produces.clone().or_else(|| interface.produces.clone()),
            consumes: method.consumes.clone().or_else(|| interface.consumes.clone()),
            parser: method.parser.clone(),
            unwrap: method.unwrap.clone(),
            select_json: method.select_json.clone(),
            transform: method.transform.clone(),
            fallback: method.fallback.clone(),
            payload_template: method.payload.clone(),
            payload_params: method.payload_params.clone(),
            map_binder: method.map_binder.clone(),
            wrap_with: method.wrap_with.clone(),
            returns: method.returns,
            params: method.params.clone(),
            delegate: method.delegate.clone(),
            async_method: method.async_method.clone(),
            id,
        };
        metadata.check_bindings()?;
        Ok(metadata)
    }

    fn check_bindings(&self) -> Result<(), Error> {
        let qualified = self.id.qualified_name();
        let count = |pred: fn(&ParamBinding) -> bool| {
            self.params
                .iter()
                .filter(|param| param.binding.as_ref().is_some_and(pred))
                .count()
        };

        let binders = count(|b| matches!(b, ParamBinding::Binder { .. } | ParamBinding::WrapWith { .. }));
        if binders > 0 && self.uses_map_binder() {
            return Err(Error::configuration(format!(
                "{qualified} mixes binder parameters with a map payload binder"
            )));
        }
        if self.payload_template.is_some() && self.map_binder.is_some() {
            return Err(Error::configuration(format!(
                "{qualified} declares both a payload template and a map binder"
            )));
        }
        if count(|b| matches!(b, ParamBinding::HostPrefix { .. })) > 1 {
            return Err(Error::configuration(format!(
                "{qualified} binds more than one host prefix"
            )));
        }
        if self.unwrap.is_some() && self.select_json.is_some() {
            return Err(Error::configuration(format!(
                "{qualified} declares both unwrap and select_json"
            )));
        }
        if let Some(verb) = &self.verb {
            let has_body_binding = self.params.iter().any(|param| {
                matches!(
                    param.binding,
                    Some(
                        ParamBinding::Form { .. }
                            | ParamBinding::Part { .. }
                            | ParamBinding::Payload { .. }
                            | ParamBinding::Binder { .. }
                            | ParamBinding::WrapWith { .. }
                    )
                )
            });
            if has_body_binding && matches!(verb.as_str(), "GET" | "HEAD") {
                return Err(Error::configuration(format!(
                    "{qualified} binds a request body on a {verb} request"
                )));
            }
        }
        let mut seen = Vec::new();
        for param in &self.params {
            if seen.contains(&param.name.as_str()) {
                return Err(Error::configuration(format!(
                    "{qualified} declares parameter '{}' twice",
                    param.name
                )));
            }
            seen.push(param.name.as_str());
            if let Some(ParamBinding::Part {
                filename: Some(template),
                ..
            }) = &param.binding
            {
                uri::template_tokens(template)
                    .map_err(|e| Error::configuration(format!("{qualified}: {e}")))?;
            }
        }
        Ok(())
    }

    /// Payload params, a template or a method-level wrap select a map binder.
    #[must_use]
    pub fn uses_map_binder(&self) -> bool {
        self.map_binder.is_some()
            || self.payload_template.is_some()
            || self.wrap_with.is_some()
            || !self.payload_params.is_empty()
            || self
                .params
                .iter()
                .any(|param| matches!(param.binding, Some(ParamBinding::Payload { .. })))
    }

    /// Path tokens that can be filled from this method's own parameters.
    #[must_use]
    pub fn bound_path_tokens(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|param| matches!(param.binding, Some(ParamBinding::Path { .. })))
            .map(ParamDecl::key_name)
            .collect()
    }

    #[must_use]
    pub fn params_with<'a>(
        &'a self,
        pred: impl Fn(&ParamBinding) -> bool + 'a,
    ) -> impl Iterator<Item = (usize, &'a ParamDecl)> + 'a {
        self.params
            .iter()
            .enumerate()
            .filter(move |(_, param)| param.binding.as_ref().is_some_and(&pred))
    }

    #[must_use]
    pub fn is_payload_verb(&self) -> bool {
        self.verb
            .as_deref()
            .is_some_and(|verb| !NON_PAYLOAD_VERBS.contains(&verb))
    }
}

fn concat(class: &[KeyValue], method: &[KeyValue]) -> Vec<KeyValue> {
    class.iter().chain(method).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn interface() -> InterfaceDecl {
        InterfaceDecl::new("Buckets")
            .path("/client/{jclouds}")
            .query("x-ms-version", "2009-07-17")
            .filter("sign")
            .skip_encoding("/")
            .timeout(Duration::from_secs(10))
    }

    #[test]
    fn class_entries_precede_method_entries() {
        let method = MethodDecl::get("list")
            .path("/items")
            .query("x-ms-version", "2010")
            .filter("trace");
        let merged = MethodMetadata::merge(&interface(), &method).unwrap();
        let values: Vec<_> = merged.query.iter().map(|kv| kv.value.as_deref()).collect();
        assert_eq!(values, [Some("2009-07-17"), Some("2010")]);
        assert_eq!(merged.filters, ["sign", "trace"]);
        assert_eq!(merged.path, "/client/{jclouds}/items");
        assert_eq!(merged.id.to_string(), "Buckets.list()");
    }

    #[test]
    fn method_settings_override_class_settings() {
        let method = MethodDecl::get("list")
            .override_filters()
            .filter("trace")
            .skip_encoding(":")
            .timeout(Duration::from_millis(250));
        let merged = MethodMetadata::merge(&interface(), &method).unwrap();
        assert_eq!(merged.filters, ["trace"]);
        assert_eq!(merged.skip_encoding, ['/', ':']);
        assert_eq!(merged.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn missing_or_unknown_verb_is_a_configuration_error() {
        let mut method = MethodDecl::get("list");
        method.verb = None;
        let err = MethodMetadata::merge(&interface(), &method).unwrap_err();
        assert!(err.to_string().contains("Buckets.list declares no HTTP verb"));

        let err = MethodMetadata::merge(&interface(), &MethodDecl::new("list", "FETCH")).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn conflicting_payload_sources_are_rejected() {
        let method = MethodDecl::post("create")
            .param(ParamDecl::payload("name"))
            .param(ParamDecl::binder("body", "json"));
        assert!(MethodMetadata::merge(&interface(), &method).is_err());
    }

    #[test]
    fn malformed_templates_are_rejected() {
        let method = MethodDecl::get("get").path("/{id");
        assert!(MethodMetadata::merge(&interface(), &method).is_err());
    }
}
