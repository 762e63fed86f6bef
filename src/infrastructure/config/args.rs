use super::app_config::LogLevel;
use crate::domain::entities::DedupScope;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Dedup scope as a CLI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DedupArg {
    PerUrl,
    PerInstance,
}

impl From<DedupArg> for DedupScope {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::PerUrl => Self::PerUrl,
            DedupArg::PerInstance => Self::PerInstance,
        }
    }
}

fn parse_dedup(value: &str) -> Result<DedupScope, String> {
    DedupArg::from_str(value, true).map(DedupScope::from)
}

#[derive(Debug, Parser)]
#[command(
    name = "fetchkit",
    version,
    about = "Typed API requests, cached image downloads and cache maintenance",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Base URL API paths are resolved against.
    #[arg(long, env = "FETCHKIT_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Bearer token, used when the keyring holds none.
    #[arg(long, env = "FETCHKIT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Cache directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Image request deduplication scope (per-url, per-instance).
    #[arg(long, value_parser = parse_dedup)]
    pub dedup_scope: Option<DedupScope>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a GET request and print the JSON response.
    Get {
        /// Path appended to the base URL.
        path: String,
    },
    /// Download an image through the cache.
    Image {
        /// Absolute image URL.
        url: String,
        /// Minutes to keep the image cached.
        #[arg(long)]
        cache_mins: Option<u32>,
        /// Write the image bytes to this file.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Remove a cache entry.
    Invalidate {
        /// Cache key, for images the URL.
        key: String,
    },
    /// Remove every cache entry.
    ClearCache,
    /// Manage the bearer token in the system keyring.
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Store a token.
    Set {
        /// The bearer token.
        token: String,
    },
    /// Delete the stored token.
    Clear,
}
