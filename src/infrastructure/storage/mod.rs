//! Token storage, preferences and credential source adapters.

mod keyring_storage;
mod preferences;
mod static_credentials;

pub use keyring_storage::{KEYRING_SERVICE, KEYRING_USER, KeyringCredentials, KeyringTokenStorage};
pub use preferences::{
    PREFERENCES_FILE_NAME, PreferencesCredentials, PreferencesError, PreferencesStore, TOKEN_KEY,
};
pub use static_credentials::StaticCredentials;
