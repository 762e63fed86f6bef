//! Credential source and token storage port definitions.

use async_trait::async_trait;

use crate::domain::entities::AuthToken;
use crate::domain::errors::SecretError;

/// Supplies the bearer token for outgoing requests.
///
/// Polled synchronously before every request; `None` means requests are
/// sent without an `Authorization` header.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialSource: Send + Sync {
    /// Returns the current token, if any.
    fn token(&self) -> Option<AuthToken>;
}

/// Port for token persistence operations.
#[async_trait]
pub trait TokenStoragePort: Send + Sync {
    /// Retrieves stored token.
    async fn get_token(&self) -> Result<Option<AuthToken>, SecretError>;

    /// Stores token securely.
    async fn store_token(&self, token: &AuthToken) -> Result<(), SecretError>;

    /// Deletes stored token.
    async fn delete_token(&self) -> Result<(), SecretError>;
}
