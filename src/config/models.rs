use crate::engine::executors::{DEFAULT_IO_THREADS, DEFAULT_USER_THREADS};
use crate::resilience::{RetryConfig, TimeoutConfig};
use indexmap::IndexMap;
use serde::Deserialize;

/// Engine configuration, usually read from `httpbind.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Endpoint used when a method declares none
    pub default_endpoint: Option<String>,
    /// Named endpoints, referenced by `endpoint = "<qualifier>"` in metadata
    pub endpoints: IndexMap<String, String>,
    pub user_threads: usize,
    pub io_threads: usize,
    /// Available to templates as `{api_version}`
    pub api_version: Option<String>,
    /// Available to templates as `{build_version}`
    pub build_version: Option<String>,
    /// Extra static template tokens
    pub tokens: IndexMap<String, String>,
    pub strip_expect_header: bool,
    pub timeouts: TimeoutConfig,
    pub retry: RetryConfig,
    pub basic_auth: Option<BasicAuthConfig>,
    pub user_agent: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_endpoint: None,
            endpoints: IndexMap::new(),
            user_threads: DEFAULT_USER_THREADS,
            io_threads: DEFAULT_IO_THREADS,
            api_version: None,
            build_version: None,
            tokens: IndexMap::new(),
            strip_expect_header: false,
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            basic_auth: None,
            user_agent: None,
        }
    }
}

/// Credentials for the `basic_auth` filter.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthConfig {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
