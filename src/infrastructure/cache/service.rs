//! Time-to-live cache over a key-value store.
//!
//! Cache failures never reach callers: write errors are logged and dropped,
//! read errors are reported as misses.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::domain::entities::CacheEntry;
use crate::domain::ports::{Clock, KeyValueStore, SystemClock};

/// Default entry lifetime in minutes.
pub const DEFAULT_TTL_MINUTES: u32 = 60;

/// TTL cache with lazy expiry.
///
/// Expired entries are removed when a `get` finds them; there is no
/// background sweep.
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    default_ttl_minutes: u32,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("default_ttl_minutes", &self.default_ttl_minutes)
            .finish_non_exhaustive()
    }
}

impl CacheService {
    /// Creates a cache over `store` using the wall clock.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            default_ttl_minutes: DEFAULT_TTL_MINUTES,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the lifetime used when `put` is given no TTL.
    #[must_use]
    pub const fn with_default_ttl(mut self, minutes: u32) -> Self {
        self.default_ttl_minutes = minutes;
        self
    }

    /// Returns the lifetime used when `put` is given no TTL.
    #[must_use]
    pub const fn default_ttl_minutes(&self) -> u32 {
        self.default_ttl_minutes
    }

    /// Stores `payload` under `key` for `ttl_minutes` (or the default),
    /// replacing any previous entry.
    pub async fn put(&self, key: &str, payload: impl Into<Bytes>, ttl_minutes: Option<u32>) {
        let ttl = ttl_minutes.unwrap_or(self.default_ttl_minutes);
        let entry = CacheEntry::with_ttl(key, payload, self.clock.now(), ttl);

        match self.store.put(entry).await {
            Ok(()) => debug!(key = %key, ttl_minutes = ttl, "Cached entry"),
            Err(e) => warn!(key = %key, error = %e, "Failed to write cache entry"),
        }
    }

    /// Returns the payload for `key` if present and not expired.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                trace!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let now = self.clock.now();
        if !entry.is_expired_at(now) {
            trace!(key = %key, "Cache hit");
            return Some(entry.payload);
        }

        debug!(key = %key, expired_at = %entry.expires_at, "Cache entry expired");
        if let Err(e) = self.store.delete_expired(key, now).await {
            warn!(key = %key, error = %e, "Failed to remove expired cache entry");
        }
        None
    }

    /// Removes any entry for `key`.
    pub async fn invalidate(&self, key: &str) {
        match self.store.delete(key).await {
            Ok(()) => debug!(key = %key, "Invalidated cache entry"),
            Err(e) => warn!(key = %key, error = %e, "Failed to invalidate cache entry"),
        }
    }

    /// Serializes `value` as JSON and stores it under `key`.
    pub async fn put_object<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_minutes: Option<u32>,
    ) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.put(key, bytes, ttl_minutes).await,
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize cache object"),
        }
    }

    /// Returns the value stored under `key`, or `None` on miss or when the
    /// stored bytes do not deserialize as `T`.
    pub async fn get_object<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to deserialize cache object");
                None
            }
        }
    }

    /// Removes every entry.
    pub async fn clear(&self) {
        match self.store.clear().await {
            Ok(()) => debug!("Cleared cache"),
            Err(e) => warn!(error = %e, "Failed to clear cache"),
        }
    }
}
