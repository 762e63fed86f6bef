//! HTTP infrastructure.
//!
//! This module provides:
//! - The typed API client and its future handle
//! - The default `reqwest` transport
//! - The default JSON error decoder

pub mod client;
pub mod error_decoder;
pub mod future;
pub mod transport;

pub use client::{ApiClient, ApiClientBuilder, EmptyResponse};
pub use error_decoder::JsonErrorDecoder;
pub use future::ApiFuture;
pub use transport::{DEFAULT_TIMEOUT_SECS, ReqwestTransport};
