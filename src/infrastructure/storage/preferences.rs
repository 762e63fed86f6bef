//! File-backed preferences and the credential source reading from them.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::entities::AuthToken;
use crate::domain::ports::CredentialSource;
use crate::infrastructure::config::app_config::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER};

/// File name of the preferences file inside the config directory.
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

/// Key holding the bearer token.
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Small typed key-value store persisted as one JSON object.
///
/// Reads are served from memory. Every write rewrites the file atomically.
/// Failures are logged and swallowed: a missing or broken preference reads
/// as absent and a failed write leaves the in-memory value in place.
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl PreferencesStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Self::read_file(&path) {
            Ok(values) => values,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read preferences, starting empty");
                Map::new()
            }
        };

        Self {
            path,
            values: RwLock::new(values),
        }
    }

    /// Opens `preferences.json` in the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns `PreferencesError` if the config directory cannot be determined.
    pub fn open_default() -> Result<Self, PreferencesError> {
        let dir = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(PreferencesError::ConfigDirNotFound)?;

        Ok(Self::open(dir.join(PREFERENCES_FILE_NAME)))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `value` under `key`.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.write(key, Some(value)),
            Err(e) => warn!(key, error = %e, "Failed to encode preference"),
        }
    }

    /// Returns the value under `key`, or `None` if absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.read().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Preference has unexpected shape");
                None
            }
        }
    }

    /// Removes `key`. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) {
        self.write(key, None);
    }

    pub fn save_string(&self, key: &str, value: &str) {
        self.save(key, value);
    }

    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.read().get(key)?.as_str().map(str::to_owned)
    }

    pub fn save_bool(&self, key: &str, value: bool) {
        self.save(key, &value);
    }

    /// Returns the flag under `key`; absent or non-boolean values read as false.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.values
            .read()
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn write(&self, key: &str, value: Option<Value>) {
        let mut values = self.values.write();
        let changed = match value {
            Some(value) => {
                values.insert(key.to_string(), value);
                true
            }
            None => values.remove(key).is_some(),
        };
        if !changed {
            return;
        }

        // Persisted under the write lock so files land in write order.
        if let Err(e) = Self::write_file(&self.path, &values) {
            warn!(path = ?self.path, key, error = %e, "Failed to persist preferences");
        }
    }

    fn read_file(path: &Path) -> Result<Map<String, Value>, PreferencesError> {
        if !path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn write_file(path: &Path, values: &Map<String, Value>) -> Result<(), PreferencesError> {
        let parent = path
            .parent()
            .ok_or_else(|| std::io::Error::other("Invalid path"))?;
        fs::create_dir_all(parent)?;

        let content = serde_json::to_vec_pretty(values)?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(&content)?;
        temp_file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Credential source reading the bearer token from the `token` preference.
///
/// The preference is read on every call, so a token saved later is picked
/// up by the next request.
#[derive(Debug, Clone)]
pub struct PreferencesCredentials {
    store: Arc<PreferencesStore>,
}

impl PreferencesCredentials {
    #[must_use]
    pub const fn new(store: Arc<PreferencesStore>) -> Self {
        Self { store }
    }
}

impl CredentialSource for PreferencesCredentials {
    fn token(&self) -> Option<AuthToken> {
        let raw = self.store.get_string(TOKEN_KEY)?;
        let token = AuthToken::new(raw);
        if token.is_none() {
            warn!("Stored token preference is malformed, ignoring");
        }
        token
    }
}
