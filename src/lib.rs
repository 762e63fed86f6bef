//! fetchkit - networking and caching for UI clients.
//!
//! This crate provides a typed HTTP client with a pluggable error decoder,
//! a time-to-live key-value cache, and an image loader that deduplicates
//! concurrent fetches and broadcasts load events to its consumers.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing use cases and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;
/// Presentation layer containing consumer-side view state.
pub mod presentation;

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "fetchkit";
