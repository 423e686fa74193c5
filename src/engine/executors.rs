//! The two worker pools: one for user-facing continuations, one for I/O.
//!
//! Keeping them apart means a slow completion listener can never hold up the
//! tasks that drive the transport, and the other way round.

use crate::error::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

pub const DEFAULT_USER_THREADS: usize = 8;
pub const DEFAULT_IO_THREADS: usize = 4;

pub struct Executors {
    user: Option<Runtime>,
    io: Option<Runtime>,
    user_handle: Handle,
    io_handle: Handle,
}

fn pool(name: &str, threads: usize) -> Result<Runtime, Error> {
    if threads == 0 {
        return Err(Error::configuration(format!(
            "the {name} pool needs at least one thread"
        )));
    }
    Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name(format!("httpbind-{name}"))
        .enable_all()
        .build()
        .map_err(|e| Error::configuration(format!("cannot start the {name} pool: {e}")))
}

impl Executors {
    /// Starts both pools.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero-sized pool or when the
    /// runtime cannot start.
    pub fn new(user_threads: usize, io_threads: usize) -> Result<Self, Error> {
        let user = pool("user", user_threads)?;
        let io = pool("io", io_threads)?;
        debug!(user_threads, io_threads, "started executor pools");
        Ok(Self {
            user_handle: user.handle().clone(),
            io_handle: io.handle().clone(),
            user: Some(user),
            io: Some(io),
        })
    }

    /// Pool that runs completion listeners.
    #[must_use]
    pub const fn user(&self) -> &Handle {
        &self.user_handle
    }

    /// Pool that runs transport operations.
    #[must_use]
    pub const fn io(&self) -> &Handle {
        &self.io_handle
    }
}

impl Drop for Executors {
    fn drop(&mut self) {
        // May run inside an async context, where a blocking shutdown panics.
        if let Some(user) = self.user.take() {
            user.shutdown_background();
        }
        if let Some(io) = self.io.take() {
            io.shutdown_background();
        }
    }
}

impl std::fmt::Debug for Executors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executors").finish_non_exhaustive()
    }
}
