//! Deferred results.
//!
//! A [`Deferred`] is the handle returned by methods whose declared return type
//! is future-wrapped. It resolves exactly once: the matching [`Completer`] is
//! consumed by completion, and a completer dropped without completing
//! resolves the handle as cancelled.

use crate::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// Write side of a [`Deferred`].
#[derive(Debug)]
pub struct Completer<T> {
    sender: oneshot::Sender<Result<T, Error>>,
}

impl<T> Completer<T> {
    /// Resolves the handle. Returns `false` if the handle was already dropped.
    pub fn complete(self, result: Result<T, Error>) -> bool {
        self.sender.send(result).is_ok()
    }
}

/// A single-resolution result with best-effort cancellation.
#[derive(Debug)]
pub struct Deferred<T> {
    method: String,
    receiver: oneshot::Receiver<Result<T, Error>>,
    abort: Option<AbortHandle>,
}

impl<T> Deferred<T> {
    /// A pending handle and the completer that resolves it.
    pub fn pending(method: impl Into<String>) -> (Completer<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            Completer { sender },
            Self {
                method: method.into(),
                receiver,
                abort: None,
            },
        )
    }

    /// A handle that is already resolved.
    pub fn ready(method: impl Into<String>, result: Result<T, Error>) -> Self {
        let (completer, deferred) = Self::pending(method);
        completer.complete(result);
        deferred
    }

    /// Ties the handle to the task producing its value, so that
    /// [`cancel`](Self::cancel) can abort it.
    #[must_use]
    pub fn with_abort(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    /// Aborts the underlying operation, if it is still running.
    ///
    /// The handle then resolves with whatever the fallback policy makes of
    /// the cancellation.
    pub fn cancel(&self) {
        if let Some(handle) = &self.abort {
            handle.abort();
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Blocks the current thread until the handle resolves.
    ///
    /// # Errors
    ///
    /// Returns the error the handle resolved with.
    pub fn wait(self) -> Result<T, Error> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Cancelled {
                method: this.method.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
