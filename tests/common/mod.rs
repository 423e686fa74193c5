//! Shared helpers for the integration tests.
#![allow(dead_code)]

use httpbind::config::EngineConfig;
use httpbind::engine::builder::RequestBuilder;
use httpbind::invocation::{Arg, Invocation};
use futures::future::BoxFuture;
use futures::FutureExt;
use httpbind::metadata::{InterfaceDecl, MethodDecl, MethodMetadata, ReturnKind, ReturnShape};
use httpbind::request::HttpRequest;
use httpbind::response::HttpResponse;
use httpbind::strategies::Strategies;
use httpbind::transport::HttpCommandExecutorService;
use httpbind::{ClientBuilder, Error, RestClient};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Cached binary path for the httpbind CLI
#[allow(deprecated)]
pub static HTTPBIND_BIN: std::sync::LazyLock<PathBuf> =
    std::sync::LazyLock::new(|| assert_cmd::cargo::cargo_bin("httpbind"));

pub fn httpbind_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(&*HTTPBIND_BIN)
}

pub const DEFAULT_ENDPOINT: &str = "http://localhost:9999";

pub fn merged(interface: &InterfaceDecl, method: &MethodDecl) -> MethodMetadata {
    MethodMetadata::merge(interface, method).expect("metadata merges")
}

/// Builds and seals a request against `http://localhost:9999`.
pub fn build_with(
    strategies: &Strategies,
    tokens: &IndexMap<String, String>,
    interface: &InterfaceDecl,
    method: &MethodDecl,
    args: Vec<Arg>,
) -> Result<HttpRequest, Error> {
    let metadata = MethodMetadata::merge(interface, method)?;
    let default = Url::parse(DEFAULT_ENDPOINT).expect("valid default");
    let builder = RequestBuilder::new(strategies, Some(&default), tokens, false);
    let invocation = Invocation::new(metadata.id.clone(), args);
    builder.build(&metadata, &invocation, None)?.seal()
}

pub fn build(interface: &InterfaceDecl, method: &MethodDecl, args: Vec<Arg>) -> Result<HttpRequest, Error> {
    build_with(&Strategies::new(), &IndexMap::new(), interface, method, args)
}

/// Small pools and no retry delays; the endpoint is usually a mock server.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig {
        user_threads: 2,
        io_threads: 2,
        ..EngineConfig::default()
    };
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.retry.jitter = false;
    config
}

pub fn client(endpoint: &str, interfaces: Vec<InterfaceDecl>) -> RestClient {
    let mut builder = ClientBuilder::new(test_config()).endpoint(endpoint);
    for interface in interfaces {
        builder = builder.interface(interface);
    }
    builder.build().expect("client builds")
}

/// Answers every request with `200 OK` and its request line as the body.
pub struct Echo;

impl HttpCommandExecutorService for Echo {
    fn invoke(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        Ok(HttpResponse::new(200, "OK").with_body(request.request_line()))
    }

    fn submit(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>> {
        let line = request.request_line();
        async move { Ok(HttpResponse::new(200, "OK").with_body(line)) }.boxed()
    }
}

/// A client on the echo transport; `endpoint` is the default endpoint.
pub fn echo_client(
    config: EngineConfig,
    endpoint: Option<&str>,
    interfaces: Vec<InterfaceDecl>,
    configure: impl FnOnce(&mut Strategies),
) -> RestClient {
    let mut builder = ClientBuilder::new(config)
        .transport(Arc::new(Echo))
        .strategies(configure);
    if let Some(endpoint) = endpoint {
        builder = builder.endpoint(endpoint);
    }
    for interface in interfaces {
        builder = builder.interface(interface);
    }
    builder.build().expect("client builds")
}

pub fn text() -> ReturnShape {
    ReturnShape::of(ReturnKind::Text)
}
