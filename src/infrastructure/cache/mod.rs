//! Cache infrastructure.
//!
//! This module provides:
//! - Disk and in-memory key-value stores
//! - The TTL cache service layered on top of them

pub mod disk_store;
pub mod memory_store;
pub mod service;

pub use disk_store::{DiskKeyValueStore, default_cache_dir};
pub use memory_store::MemoryKeyValueStore;
pub use service::{CacheService, DEFAULT_TTL_MINUTES};
