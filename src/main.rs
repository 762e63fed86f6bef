use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, bail, eyre};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fetchkit::application::ResolveCredentialsUseCase;
use fetchkit::domain::{AuthToken, FetchState};
use fetchkit::domain::ports::{CredentialSource, TokenStoragePort};
use fetchkit::infrastructure::config::{Command, TokenCommand};
use fetchkit::infrastructure::{
    ApiClient, AppConfig, CacheService, CliArgs, ConfigStore, DiskKeyValueStore, ImageLoader,
    ImageLoaderConfig, KeyringTokenStorage, PreferencesCredentials, PreferencesStore,
    StaticCredentials,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let store = ConfigStore::new()?;
    let mut config = store.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

fn token_storage(config: &AppConfig) -> KeyringTokenStorage {
    KeyringTokenStorage::with_names(&config.keyring.service, &config.keyring.user)
}

async fn create_client(config: &AppConfig, cli_token: Option<String>) -> Result<ApiClient> {
    let resolver = ResolveCredentialsUseCase::new(Arc::new(token_storage(config)));
    let resolved = resolver.execute(cli_token).await?;
    if let Some(resolved) = &resolved {
        debug!(source = %resolved.source, "Resolved bearer token");
    }

    let credentials: Arc<dyn CredentialSource> = match resolved {
        Some(resolved) => Arc::new(StaticCredentials::new(Some(resolved.token))),
        None => {
            let store = PreferencesStore::open_default()?;
            debug!(path = %store.path().display(), "Reading token from preferences");
            Arc::new(PreferencesCredentials::new(Arc::new(store)))
        }
    };
    let mut builder = ApiClient::builder(config.base_url.clone().unwrap_or_default())
        .credentials(credentials)
        .timeout(config.request_timeout());
    if let Some(agent) = &config.user_agent {
        builder = builder.user_agent(agent);
    }

    Ok(builder.build()?)
}

async fn create_cache(config: &AppConfig) -> Result<CacheService> {
    let store = DiskKeyValueStore::new(config.effective_cache_dir()).await?;
    Ok(CacheService::new(Arc::new(store)).with_default_ttl(config.default_cache_minutes))
}

async fn run(config: AppConfig, args: CliArgs) -> Result<()> {
    match args.command {
        Command::Get { path } => {
            if config.base_url.is_none() {
                bail!("no base URL configured, pass --base-url or set base_url in config.toml");
            }
            let client = create_client(&config, args.token).await?;
            let value: serde_json::Value = client.get(&path).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Image {
            url,
            cache_mins,
            output,
        } => {
            let client = create_client(&config, args.token).await?;
            let cache = create_cache(&config).await?;
            let loader = ImageLoader::new(
                client,
                cache,
                ImageLoaderConfig {
                    cache_minutes: cache_mins.or(config.image_cache_minutes),
                    dedup: config.dedup_scope,
                    ..ImageLoaderConfig::default()
                },
            );

            let bytes = match loader.load(Some(&url)).await {
                FetchState::Succeeded(bytes) => bytes,
                state => bail!("failed to load image {url} ({state:?})"),
            };

            match output {
                Some(path) => {
                    tokio::fs::write(&path, &bytes).await?;
                    println!("wrote {} bytes to {}", bytes.len(), path.display());
                }
                None => println!("loaded {} bytes", bytes.len()),
            }
        }
        Command::Invalidate { key } => {
            create_cache(&config).await?.invalidate(&key).await;
            println!("invalidated {key}");
        }
        Command::ClearCache => {
            create_cache(&config).await?.clear().await;
            println!("cache cleared");
        }
        Command::Token { action } => {
            let storage = token_storage(&config);
            match action {
                TokenCommand::Set { token } => {
                    let token = AuthToken::new(token)
                        .ok_or_else(|| eyre!("token must be non-empty and contain no whitespace"))?;
                    storage.store_token(&token).await?;
                    println!("stored token {token}");
                }
                TokenCommand::Clear => {
                    storage.delete_token().await?;
                    println!("token removed");
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = fetchkit::VERSION, "Starting fetchkit");

    run(config, args).await
}
