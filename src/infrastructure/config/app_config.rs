//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::entities::DedupScope;
use crate::infrastructure::cache::{DEFAULT_TTL_MINUTES, default_cache_dir};
use crate::infrastructure::http::DEFAULT_TIMEOUT_SECS;
use crate::infrastructure::storage::{KEYRING_SERVICE, KEYRING_USER};

pub(crate) const APP_NAME: &str = "fetchkit";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Keyring entry holding the bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyringConfig {
    /// Keyring service name.
    #[serde(default = "default_keyring_service")]
    pub service: String,
    /// Keyring user name.
    #[serde(default = "default_keyring_user")]
    pub user: String,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            service: default_keyring_service(),
            user: default_keyring_user(),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by
/// CLI arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Base URL API paths are resolved against.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Lifetime of cache entries written without an explicit TTL.
    #[serde(default = "default_cache_minutes")]
    pub default_cache_minutes: u32,

    /// Minutes fetched images stay cached. Images are not cached when
    /// unset.
    #[serde(default)]
    pub image_cache_minutes: Option<u32>,

    /// Cache directory override.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// User agent override.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// How the image loader deduplicates concurrent requests.
    #[serde(default)]
    pub dedup_scope: DedupScope,

    /// Keyring entry for the bearer token.
    #[serde(default)]
    pub keyring: KeyringConfig,
}

fn default_cache_minutes() -> u32 {
    DEFAULT_TTL_MINUTES
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_keyring_service() -> String {
    KEYRING_SERVICE.to_string()
}

fn default_keyring_user() -> String {
    KEYRING_USER.to_string()
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(base_url) = &args.base_url {
            self.base_url = Some(base_url.clone());
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache_dir = Some(cache_dir.clone());
        }
        if let Some(timeout) = args.timeout {
            self.request_timeout_secs = timeout;
        }
        if let Some(dedup_scope) = args.dedup_scope {
            self.dedup_scope = dedup_scope;
        }
    }

    /// Returns effective cache directory.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: LogLevel::Info,
            base_url: None,
            default_cache_minutes: DEFAULT_TTL_MINUTES,
            image_cache_minutes: None,
            cache_dir: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            dedup_scope: DedupScope::default(),
            keyring: KeyringConfig::default(),
        }
    }
}
