//! Infrastructure layer with external service adapters.

/// Key-value stores and the TTL cache.
pub mod cache;
/// Application configuration.
pub mod config;
/// Typed HTTP client and transport.
pub mod http;
/// Image loading.
pub mod image;
/// Token storage and preferences adapters.
pub mod storage;

pub use cache::{CacheService, DiskKeyValueStore, MemoryKeyValueStore};
pub use config::{AppConfig, CliArgs, ConfigStore, LogLevel};
pub use http::{ApiClient, ApiClientBuilder, ApiFuture, EmptyResponse, JsonErrorDecoder, ReqwestTransport};
pub use image::{ImageLoader, ImageLoaderConfig, ImageSubscription};
pub use storage::{
    KeyringCredentials, KeyringTokenStorage, PreferencesCredentials, PreferencesStore,
    StaticCredentials,
};
