//! In-process credential source.

use parking_lot::RwLock;

use crate::domain::entities::AuthToken;
use crate::domain::ports::CredentialSource;

/// Credential source holding a token in memory.
///
/// The token can be swapped at runtime; the next request picks it up.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<AuthToken>>,
}

impl StaticCredentials {
    /// Creates a source yielding `token`.
    #[must_use]
    pub fn new(token: Option<AuthToken>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    /// Replaces the token.
    pub fn set(&self, token: AuthToken) {
        *self.token.write() = Some(token);
    }

    /// Removes the token.
    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl CredentialSource for StaticCredentials {
    fn token(&self) -> Option<AuthToken> {
        self.token.read().clone()
    }
}
