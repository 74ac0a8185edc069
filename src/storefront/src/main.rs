//! Storefront: loyalty points ledger service.
//!
//! Main entry point that loads configuration, opens the ledger against the
//! selected store and starts the HTTP server.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use storefront_api::loyalty_rest::LoyaltyState;
use storefront_api::ApiServer;
use storefront_cache::{LocalStore, RedisStore};
use storefront_core::config::{AppConfig, StorageBackend};
use storefront_core::storage::LedgerStore;
use storefront_loyalty::LoyaltyLedger;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(about = "Storefront loyalty points ledger service")]
#[command(version)]
struct Cli {
    /// Optional TOML config file
    #[arg(long, env = "STOREFRONT_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "STOREFRONT__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "STOREFRONT__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Ledger storage backend: memory or redis (overrides config)
    #[arg(long, env = "STOREFRONT__STORAGE__BACKEND")]
    storage: Option<StorageBackend>,

    /// Redis URL (overrides config)
    #[arg(long, env = "STOREFRONT__STORAGE__REDIS_URL")]
    redis_url: Option<String>,
}

fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory ledger store; balances are lost on restart");
            Ok(Arc::new(LocalStore::new()))
        }
        StorageBackend::Redis => {
            let store = RedisStore::connect(&config.storage).context("Redis connection required")?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "storefront=info,storefront_api=info,storefront_loyalty=info,\
                 storefront_cache=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Storefront starting up");

    // Load configuration
    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(backend) = cli.storage {
        config.storage.backend = backend;
    }
    if let Some(url) = cli.redis_url {
        config.storage.redis_url = url;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        storage = ?config.storage.backend,
        storage_key = %config.loyalty.storage_key,
        "Configuration loaded"
    );

    let store = open_store(&config)?;
    let ledger =
        LoyaltyLedger::open(&config.loyalty, store).context("Failed to open loyalty ledger")?;

    let api_server = ApiServer::new(config.clone(), LoyaltyState::new(ledger));

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Storefront is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
