//! Engine configuration: file loading and endpoint overrides.

pub mod models;

pub use models::{BasicAuthConfig, EngineConfig};

use crate::constants;
use crate::error::Error;
use indexmap::IndexMap;
use std::path::Path;
use tracing::debug;
use url::Url;

impl EngineConfig {
    /// Reads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// The endpoint for methods that declare none.
    ///
    /// Priority: `explicit`, then `HTTPBIND_ENDPOINT`, then the configured
    /// `default_endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chosen value is not an absolute URI.
    pub fn resolve_default_endpoint(&self, explicit: Option<&str>) -> Result<Option<Url>, Error> {
        let chosen = explicit
            .map(str::to_string)
            .or_else(|| std::env::var(constants::ENV_HTTPBIND_ENDPOINT).ok())
            .or_else(|| self.default_endpoint.clone());
        chosen
            .map(|value| {
                Url::parse(&value).map_err(|e| {
                    Error::configuration(format!("default endpoint '{value}' is not a URI: {e}"))
                })
            })
            .transpose()
    }

    /// Named endpoints, parsed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid entry.
    pub fn named_endpoints(&self) -> Result<Vec<(String, Url)>, Error> {
        self.endpoints
            .iter()
            .map(|(qualifier, value)| {
                Url::parse(value)
                    .map(|url| (qualifier.clone(), url))
                    .map_err(|e| {
                        Error::configuration(format!(
                            "endpoint '{qualifier}' = '{value}' is not a URI: {e}"
                        ))
                    })
            })
            .collect()
    }

    /// Tokens every template can use: versions first, then configured extras.
    #[must_use]
    pub fn base_tokens(&self) -> IndexMap<String, String> {
        let mut tokens = IndexMap::new();
        if let Some(version) = &self.api_version {
            tokens.insert(constants::TOKEN_API_VERSION.to_string(), version.clone());
        }
        if let Some(version) = &self.build_version {
            tokens.insert(constants::TOKEN_BUILD_VERSION.to_string(), version.clone());
        }
        tokens.extend(self.tokens.iter().map(|(k, v)| (k.clone(), v.clone())));
        tokens
    }
}
