//! Cache storage error types.

use thiserror::Error;

/// Result type for key-value store operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors raised by key-value store adapters.
///
/// These never cross the cache service boundary; they are logged and turned
/// into misses or no-ops there.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// I/O error during a store operation.
    #[error("IO error: {0}")]
    Io(String),
    /// A stored record could not be read back.
    #[error("corrupt cache record: {0}")]
    Corrupt(String),
    /// A value could not be marshalled to or from bytes.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Creates IO error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Creates corrupt record error.
    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    /// Creates serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }
}
