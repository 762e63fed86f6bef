//! Image loading infrastructure.
//!
//! This module provides:
//! - The deduplicating cache-or-fetch loader
//! - Event subscriptions for loader consumers

pub mod loader;

pub use loader::{DEFAULT_EVENT_CAPACITY, ImageLoader, ImageLoaderConfig, ImageSubscription};
