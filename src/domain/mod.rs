//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{AuthToken, CacheEntry, DedupScope, FetchState, ImageEvent};
pub use errors::{ApiError, ApiErrorKind, CacheError, SecretError};
pub use ports::{Clock, CredentialSource, ErrorDecoder, HttpTransport, KeyValueStore};
