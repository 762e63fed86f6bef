//! Keyring-based token storage.

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, trace, warn};

use crate::domain::entities::AuthToken;
use crate::domain::errors::SecretError;
use crate::domain::ports::{CredentialSource, TokenStoragePort};

/// Default keyring service name.
pub const KEYRING_SERVICE: &str = "fetchkit";
/// Default keyring user name.
pub const KEYRING_USER: &str = "token";

/// System keyring token storage adapter.
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    service: String,
    user: String,
}

impl KeyringTokenStorage {
    /// Creates new storage with default names.
    #[must_use]
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_USER)
    }

    /// Creates storage with custom names.
    #[must_use]
    pub fn with_names(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    fn entry(&self) -> Result<Entry, SecretError> {
        Entry::new(&self.service, &self.user)
            .map_err(|e| SecretError::AccessFailed(format!("failed to access keyring: {e}")))
    }

    fn read(&self) -> Result<Option<AuthToken>, SecretError> {
        let entry = self.entry()?;

        match entry.get_password() {
            Ok(password) => Ok(AuthToken::new(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SecretError::RetrievalFailed(e.to_string())),
        }
    }
}

impl Default for KeyringTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStoragePort for KeyringTokenStorage {
    async fn get_token(&self) -> Result<Option<AuthToken>, SecretError> {
        debug!(service = %self.service, "Retrieving token from keyring");

        let token = self.read().inspect_err(|e| {
            warn!(error = %e, "Failed to retrieve token from keyring");
        })?;

        if token.is_some() {
            debug!("Token found in keyring");
        } else {
            debug!("No token stored in keyring");
        }
        Ok(token)
    }

    async fn store_token(&self, token: &AuthToken) -> Result<(), SecretError> {
        debug!(service = %self.service, "Storing token in keyring");

        let entry = self.entry()?;

        entry.set_password(token.as_str()).map_err(|e| {
            warn!(error = %e, "Failed to store token in keyring");
            SecretError::StorageFailed(e.to_string())
        })?;

        debug!("Token stored successfully");
        Ok(())
    }

    async fn delete_token(&self) -> Result<(), SecretError> {
        debug!(service = %self.service, "Deleting token from keyring");

        let entry = self.entry()?;

        match entry.delete_credential() {
            Ok(()) => {
                debug!("Token deleted from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No token to delete");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to delete token from keyring");
                Err(SecretError::DeletionFailed(e.to_string()))
            }
        }
    }
}

/// Credential source reading the token from the system keyring on every
/// request, so a token stored or cleared elsewhere takes effect at once.
#[derive(Debug, Clone, Default)]
pub struct KeyringCredentials {
    storage: KeyringTokenStorage,
}

impl KeyringCredentials {
    /// Creates a source over `storage`.
    #[must_use]
    pub const fn new(storage: KeyringTokenStorage) -> Self {
        Self { storage }
    }
}

impl CredentialSource for KeyringCredentials {
    fn token(&self) -> Option<AuthToken> {
        match self.storage.read() {
            Ok(token) => token,
            Err(e) => {
                trace!(error = %e, "Keyring unavailable, sending request without token");
                None
            }
        }
    }
}
