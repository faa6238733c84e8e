//! Client for the memory-assistant HTTP API.
//!
//! [`MemoryClient`] is async, [`blocking::MemoryClient`] runs on the calling
//! thread. Both share the same retry loop and error classification.

pub mod api;
pub mod blocking;
mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
mod response;

pub use client::MemoryClient;
pub use config::ClientConfig;
pub use error::{ApiError, ApiErrorKind, Error, ErrorKind, Result};
pub use http::RetryPolicy;
pub use response::Payload;
