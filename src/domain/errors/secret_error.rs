//! Credential store error types.

use thiserror::Error;

/// Errors raised while reading or writing the bearer token store.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The secure store could not be opened.
    #[error("failed to access secure storage: {0}")]
    AccessFailed(String),

    /// The token could not be read.
    #[error("failed to retrieve token: {0}")]
    RetrievalFailed(String),

    /// The token could not be written.
    #[error("failed to store token: {0}")]
    StorageFailed(String),

    /// The token could not be removed.
    #[error("failed to delete token: {0}")]
    DeletionFailed(String),

    /// The supplied token is empty or malformed.
    #[error("invalid token: {0}")]
    InvalidToken(String),
}
