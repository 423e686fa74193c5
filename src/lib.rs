//! Declarative HTTP-RPC invocation engine.
//!
//! Interfaces are described as metadata tables ([`metadata`]); a
//! [`client::RestClient`] turns each call into an HTTP request, dispatches it
//! through a pluggable transport and binds the response back to the declared
//! return shape.

pub mod binders;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod duration;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod filters;
pub mod invocation;
pub mod logging;
pub mod metadata;
pub mod options;
pub mod payload;
pub mod request;
pub mod resilience;
pub mod response;
pub mod strategies;
pub mod transport;
pub mod uri;

pub use client::{ClientBuilder, RestClient};
pub use error::Error;
