//! The transport collaborator.
//!
//! The engine never talks to the network itself. It hands sealed requests to
//! an [`HttpCommandExecutorService`], which must be safe to share across
//! concurrent calls.

pub mod reqwest_executor;

pub use reqwest_executor::ReqwestExecutor;

use crate::error::Error;
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use futures::future::BoxFuture;

pub trait HttpCommandExecutorService: Send + Sync {
    /// Sends the request and blocks until the response is complete.
    ///
    /// # Errors
    ///
    /// Returns a transport error when no response could be obtained. Non-2xx
    /// responses are returned as responses, not errors.
    fn invoke(&self, request: &HttpRequest) -> Result<HttpResponse, Error>;

    /// Sends the request without blocking; the future owns everything it needs.
    fn submit(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>>;

    /// Releases resources held for a dispatched request. Called exactly once
    /// per dispatch, whatever the outcome.
    fn cleanup(&self, _request: &HttpRequest) {}
}
