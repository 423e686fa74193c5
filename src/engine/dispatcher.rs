//! Invocation dispatch.
//!
//! A sealed request takes one of three paths:
//!
//! * a declared timeout: submitted to the I/O pool, the caller waits at most
//!   that long and a late operation is aborted;
//! * no timeout, direct return: the transport is invoked in place;
//! * no timeout, deferred return: submitted to the I/O pool, and a listener
//!   on the user pool transforms the result and completes the handle.
//!
//! Non-2xx responses become [`Error::Http`] before the response transform
//! runs. Every recoverable failure is offered to the method's fallback policy
//! exactly once, and the transport's `cleanup` runs exactly once per request.

use crate::engine::deferred::Deferred;
use crate::engine::executors::Executors;
use crate::engine::selector::ResponseTransform;
use crate::error::Error;
use crate::fallback::Fallback;
use crate::invocation::Invocation;
use crate::metadata::MethodMetadata;
use crate::request::HttpRequest;
use crate::response::{HttpResponse, Reply};
use crate::transport::HttpCommandExecutorService;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maps a synchronous facade call onto the asynchronous method behind it.
pub trait AsyncMapper: Send + Sync {
    /// # Errors
    ///
    /// Fails if the arguments cannot be carried over.
    fn map(&self, invocation: &Invocation) -> Result<Invocation, Error>;
}

impl<F> AsyncMapper for F
where
    F: Fn(&Invocation) -> Result<Invocation, Error> + Send + Sync,
{
    fn map(&self, invocation: &Invocation) -> Result<Invocation, Error> {
        self(invocation)
    }
}

/// Default mapping: same arguments, the declared async method's name.
#[derive(Debug, Clone)]
pub struct RenameTo(pub String);

impl AsyncMapper for RenameTo {
    fn map(&self, invocation: &Invocation) -> Result<Invocation, Error> {
        Ok(Invocation::new(
            invocation.method().renamed(self.0.clone()),
            invocation.args().to_vec(),
        ))
    }
}

/// Everything the dispatcher needs about a method, computed once at bind time.
pub struct BoundMethod {
    pub metadata: MethodMetadata,
    pub transform: ResponseTransform,
    pub fallback: Arc<dyn Fallback>,
}

impl std::fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundMethod")
            .field("method", &self.metadata.id.to_string())
            .field("transform", &self.transform.to_string())
            .finish_non_exhaustive()
    }
}

impl BoundMethod {
    /// Status check, transform, then fallback for recoverable failures.
    fn complete(&self, result: Result<HttpResponse, Error>) -> Result<Reply, Error> {
        let method = self.metadata.id.qualified_name();
        let reply = result
            .map_err(|error| transport_failure(&method, error))
            .and_then(|response| check_status(&method, response))
            .and_then(|response| {
                self.transform
                    .apply(&response)
                    .map_err(|error| transform_failure(&method, error))
            });
        match reply {
            Err(error) if error.is_recoverable() => {
                let message = error.to_string();
                let substituted = self.fallback.create_or_propagate(error);
                if substituted.is_ok() {
                    warn!(method = %method, error = %message, "fallback substituted a reply");
                }
                substituted
            }
            other => other,
        }
    }
}

/// What a call produced, shaped by the declared return type.
#[derive(Debug)]
pub enum Outcome {
    Ready(Reply),
    Deferred(Deferred<Reply>),
}

impl Outcome {
    /// The reply, waiting for a deferred one.
    ///
    /// # Errors
    ///
    /// Returns the error a deferred reply resolved with.
    pub fn into_reply(self) -> Result<Reply, Error> {
        match self {
            Self::Ready(reply) => Ok(reply),
            Self::Deferred(deferred) => deferred.wait(),
        }
    }

    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

/// Anything the transport raises is a transport failure, whatever its type.
fn transport_failure(method: &str, error: Error) -> Error {
    if error.is_recoverable() {
        error
    } else {
        Error::transport(method, error.to_string())
    }
}

/// Anything a parser or transform raises is a transform failure.
fn transform_failure(method: &str, error: Error) -> Error {
    if error.is_recoverable() {
        error
    } else {
        Error::transform(method, error.to_string())
    }
}

fn check_status(method: &str, response: HttpResponse) -> Result<HttpResponse, Error> {
    if response.is_success() {
        return Ok(response);
    }
    let body = response.body_text();
    Err(Error::Http {
        method: method.to_string(),
        status: response.status(),
        message: response.message().to_string(),
        body: (!body.is_empty()).then_some(body),
    })
}

/// Calls `cleanup` when dropped, so every exit path releases the request.
struct CleanupGuard {
    transport: Arc<dyn HttpCommandExecutorService>,
    request: HttpRequest,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.transport.cleanup(&self.request);
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpCommandExecutorService>,
    executors: Arc<Executors>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("executors", &self.executors)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpCommandExecutorService>, executors: Arc<Executors>) -> Self {
        Self {
            transport,
            executors,
        }
    }

    /// Sends the request and shapes the result for the method.
    ///
    /// # Errors
    ///
    /// Returns whatever the fallback policy propagates.
    pub fn dispatch(&self, bound: &Arc<BoundMethod>, request: HttpRequest) -> Result<Outcome, Error> {
        let metadata = &bound.metadata;
        debug!(method = %metadata.id, request = %request.request_line(), "dispatching");
        match (metadata.timeout, metadata.returns.deferred) {
            (Some(timeout), deferred) => self.dispatch_with_timeout(bound, request, timeout, deferred),
            (None, false) => self.dispatch_sync(bound, request).map(Outcome::Ready),
            (None, true) => Ok(Outcome::Deferred(self.dispatch_deferred(bound, request))),
        }
    }

    fn guard(&self, request: &HttpRequest) -> CleanupGuard {
        CleanupGuard {
            transport: Arc::clone(&self.transport),
            request: request.clone(),
        }
    }

    fn dispatch_sync(&self, bound: &BoundMethod, request: HttpRequest) -> Result<Reply, Error> {
        let _guard = self.guard(&request);
        bound.complete(self.transport.invoke(&request))
    }

    fn dispatch_with_timeout(
        &self,
        bound: &BoundMethod,
        request: HttpRequest,
        timeout: Duration,
        deferred: bool,
    ) -> Result<Outcome, Error> {
        let method = bound.metadata.id.qualified_name();
        let _guard = self.guard(&request);
        let line = request.request_line();

        let (sender, receiver) = mpsc::channel();
        let pending = self.transport.submit(request);
        let task = self.executors.io().spawn(async move {
            let _ = sender.send(pending.await);
        });
        let result = match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                task.abort();
                warn!(method = %method, ?timeout, "call timed out");
                Err(Error::Timeout {
                    method: method.clone(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::transport(
                line,
                "the I/O task ended without a response",
            )),
        };

        let reply = bound.complete(result);
        if deferred {
            Ok(Outcome::Deferred(Deferred::ready(method, reply)))
        } else {
            reply.map(Outcome::Ready)
        }
    }

    fn dispatch_deferred(&self, bound: &Arc<BoundMethod>, request: HttpRequest) -> Deferred<Reply> {
        let method = bound.metadata.id.qualified_name();
        let (completer, deferred) = Deferred::pending(method.clone());
        let guard = self.guard(&request);
        let line = request.request_line();

        let io_task = self.executors.io().spawn(self.transport.submit(request));
        let abort = io_task.abort_handle();
        let bound = Arc::clone(bound);
        self.executors.user().spawn(async move {
            let _guard = guard;
            let result = match io_task.await {
                Ok(result) => result,
                Err(join) if join.is_cancelled() => Err(Error::Cancelled { method }),
                Err(join) => Err(Error::transport(line, join.to_string())),
            };
            if !completer.complete(bound.complete(result)) {
                debug!("deferred reply dropped before completion");
            }
        });
        deferred.with_abort(abort)
    }
}
