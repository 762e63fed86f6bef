//! Port definition for the durable key-value medium behind the cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::CacheEntry;
use crate::domain::errors::CacheResult;

/// Durable key-value medium storing byte payloads with an expiry instant.
///
/// Implementations must be thread-safe and must serialize writes to the same
/// key so that `put` never leaves zero or two entries behind.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the entry stored under `key`, expired or not.
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Stores `entry`, replacing any entry with the same key in one step.
    async fn put(&self, entry: CacheEntry) -> CacheResult<()>;

    /// Removes the entry for `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Removes the entry for `key` only if it has expired at `now`, checked
    /// and removed as one step. Returns whether an entry was removed.
    async fn delete_expired(&self, key: &str, now: DateTime<Utc>) -> CacheResult<bool>;

    /// Removes every entry.
    async fn clear(&self) -> CacheResult<()>;
}
