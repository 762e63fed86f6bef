//! Domain error types.

mod api_error;
mod cache_error;
mod secret_error;

pub use api_error::{ApiError, ApiErrorKind};
pub use cache_error::{CacheError, CacheResult};
pub use secret_error::SecretError;
