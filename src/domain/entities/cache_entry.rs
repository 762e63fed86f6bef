//! Cache entry entity.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

/// A payload stored under a unique key until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Unique key.
    pub key: String,
    /// Stored bytes.
    pub payload: Bytes,
    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry with an absolute expiry.
    #[must_use]
    pub fn new(key: impl Into<String>, payload: impl Into<Bytes>, expires_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            expires_at,
        }
    }

    /// Creates an entry expiring `ttl_minutes` after `now`.
    #[must_use]
    pub fn with_ttl(
        key: impl Into<String>,
        payload: impl Into<Bytes>,
        now: DateTime<Utc>,
        ttl_minutes: u32,
    ) -> Self {
        Self::new(key, payload, now + Duration::minutes(i64::from(ttl_minutes)))
    }

    /// Returns true once `now` has reached the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
