//! Error decoder port definition.

use thiserror::Error;

use crate::domain::errors::ApiError;

/// A failure body that could not be turned into an [`ApiError`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ErrorDecodeFailure(pub String);

/// Strategy turning a non-2xx response body into an [`ApiError`].
pub trait ErrorDecoder: Send + Sync {
    /// Decodes the failure body.
    ///
    /// # Errors
    /// Returns error if the body is not in the expected shape.
    fn decode(&self, body: &[u8]) -> Result<ApiError, ErrorDecodeFailure>;
}
