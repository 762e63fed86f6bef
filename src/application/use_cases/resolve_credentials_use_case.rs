//! Credential resolution use case.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::dto::TokenSource;
use crate::domain::entities::AuthToken;
use crate::domain::errors::SecretError;
use crate::domain::ports::TokenStoragePort;

/// Resolved token with its source.
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    /// The bearer token.
    pub token: AuthToken,
    /// Source of the token.
    pub source: TokenSource,
}

impl ResolvedToken {
    /// Creates new resolved token.
    #[must_use]
    pub const fn new(token: AuthToken, source: TokenSource) -> Self {
        Self { token, source }
    }
}

/// Picks the bearer token requests are sent with.
pub struct ResolveCredentialsUseCase {
    storage_port: Arc<dyn TokenStoragePort>,
}

impl ResolveCredentialsUseCase {
    /// Creates new use case.
    #[must_use]
    pub const fn new(storage_port: Arc<dyn TokenStoragePort>) -> Self {
        Self { storage_port }
    }

    /// Resolves token from keyring or CLI/Env.
    ///
    /// Priority:
    /// 1. Keyring
    /// 2. CLI/Env (passed as argument)
    ///
    /// An unreadable keyring falls through to the CLI token.
    ///
    /// # Errors
    /// Returns error if the CLI token is present but malformed and the
    /// keyring holds nothing.
    pub async fn execute(
        &self,
        cli_token: Option<String>,
    ) -> Result<Option<ResolvedToken>, SecretError> {
        debug!("Checking keyring for stored token");
        match self.storage_port.get_token().await {
            Ok(Some(token)) => {
                info!(token = %token, "Using token from system keyring");
                return Ok(Some(ResolvedToken::new(token, TokenSource::Keyring)));
            }
            Ok(None) => debug!("No token found in keyring"),
            Err(e) => debug!(error = %e, "Failed to check keyring"),
        }

        let Some(raw) = cli_token.filter(|s| !s.trim().is_empty()) else {
            debug!("No token found in any source");
            return Ok(None);
        };

        debug!("Checking command-line/env token");
        let token = AuthToken::new(raw).ok_or_else(|| {
            SecretError::InvalidToken("token must not contain whitespace".to_string())
        })?;

        info!(token = %token, "Using token from command line / environment");
        Ok(Some(ResolvedToken::new(token, TokenSource::CommandLine)))
    }
}
