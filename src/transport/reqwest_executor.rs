use super::HttpCommandExecutorService;
use crate::error::Error;
use crate::logging;
use crate::request::{Headers, HttpRequest};
use crate::resilience::{
    create_resilient_client, execute_with_retry, is_idempotent, is_retryable_status, RetryConfig,
    TimeoutConfig,
};
use crate::response::HttpResponse;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::mpsc;
use std::time::Instant;
use tokio::runtime::Handle;

/// Transport backed by a shared `reqwest::Client`.
///
/// Blocking calls are driven on the I/O pool; the calling thread only waits
/// for the result.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
    io: Handle,
    retry: RetryConfig,
    max_body_len: usize,
}

#[cfg(not(windows))]
fn install_crypto_provider() {
    // Err only means another provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[cfg(windows)]
fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

impl ReqwestExecutor {
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(
        io: Handle,
        timeouts: &TimeoutConfig,
        retry: RetryConfig,
        user_agent: Option<&str>,
    ) -> Result<Self, Error> {
        install_crypto_provider();
        Ok(Self {
            client: create_resilient_client(timeouts, user_agent)?,
            io,
            retry,
            max_body_len: logging::get_max_body_len(),
        })
    }
}

fn to_reqwest(
    client: &reqwest::Client,
    method: reqwest::Method,
    request: &HttpRequest,
) -> reqwest::RequestBuilder {
    let mut builder = client.request(method, request.endpoint().clone());
    for (name, value) in request.headers().iter() {
        builder = builder.header(name, value);
    }
    if let Some(payload) = request.payload() {
        for (name, value) in payload.metadata().to_headers() {
            // reqwest derives the length from the body
            if !name.eq_ignore_ascii_case(crate::constants::HEADER_CONTENT_LENGTH) {
                builder = builder.header(name, value);
            }
        }
        builder = builder.body(payload.body().clone());
    }
    builder
}

async fn read(response: reqwest::Response) -> Result<HttpResponse, reqwest::Error> {
    let status = response.status();
    let headers: Headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.bytes().await?;
    Ok(
        HttpResponse::new(status.as_u16(), status.canonical_reason().unwrap_or_default())
            .with_headers(headers)
            .with_body(body),
    )
}

async fn send(
    client: reqwest::Client,
    request: HttpRequest,
    retry: RetryConfig,
    max_body_len: usize,
) -> Result<HttpResponse, Error> {
    let line = request.request_line();
    let method = reqwest::Method::from_bytes(request.method().as_bytes())
        .map_err(|e| Error::transport(&line, e.to_string()))?;
    let retry = if is_idempotent(request.method()) {
        retry
    } else {
        RetryConfig::no_retry()
    };

    logging::log_request(&request, max_body_len);
    let start = Instant::now();
    let response = execute_with_retry(
        &retry,
        &line,
        || {
            let builder = to_reqwest(&client, method.clone(), &request);
            async move { read(builder.send().await?).await }
        },
        |response: &HttpResponse| is_retryable_status(response.status()),
    )
    .await?;
    logging::log_response(&response, start.elapsed().as_millis(), max_body_len);
    Ok(response)
}

impl HttpCommandExecutorService for ReqwestExecutor {
    fn invoke(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let (sender, receiver) = mpsc::channel();
        let future = send(
            self.client.clone(),
            request.clone(),
            self.retry.clone(),
            self.max_body_len,
        );
        self.io.spawn(async move {
            let _ = sender.send(future.await);
        });
        receiver.recv().map_err(|_| {
            Error::transport(
                request.request_line(),
                "the I/O task ended without a response",
            )
        })?
    }

    fn submit(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>> {
        send(
            self.client.clone(),
            request,
            self.retry.clone(),
            self.max_body_len,
        )
        .boxed()
    }
}
