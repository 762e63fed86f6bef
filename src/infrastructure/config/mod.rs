//! Application configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{AppConfig, KeyringConfig, LogLevel};
pub use args::{CliArgs, Command, TokenCommand};
pub use storage::{ConfigError, ConfigStore};
