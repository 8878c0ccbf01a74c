//! Cat Facts Daemon - fetches, stores and serves cat facts
//!
//! Pulls facts from the upstream provider on request, keeps them in SQLite,
//! and exposes browse/rate/favorite/export commands over HTTP.

use anyhow::{Context, Result};
use catfacts_common::CatFactClient;
use catfactsd::config::Config;
use catfactsd::server::{self, AppState};
use catfactsd::service::FactCatalogService;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

/// Cat Facts daemon
#[derive(Parser)]
#[command(name = "catfactsd")]
#[command(about = "Cat Facts - fetch, store and browse cat facts", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (overrides /etc/catfacts/config.toml and ./catfacts.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (overrides [server] bind)
    #[arg(long)]
    bind: Option<String>,

    /// Write a default config file to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging first so config loading is visible; the config
    // log level is applied once it is known
    let startup_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, filter_handle) = reload::Layer::new(startup_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    if let Some(path) = cli.write_default_config {
        Config::save_default(&path)?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = match cli.config {
        Some(ref path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    // RUST_LOG wins over the config file
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        let configured = EnvFilter::try_new(&config.daemon.log_level)
            .with_context(|| format!("Invalid log_level {:?}", config.daemon.log_level))?;
        filter_handle
            .reload(configured)
            .context("Failed to apply log level")?;
    }

    info!("Cat Facts Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let store = config.storage.open_store()?;
    info!("  Fact store: {}", config.storage.db_path);

    let client = CatFactClient::new(config.upstream.clone())
        .context("Failed to build upstream client")?;
    info!("  Upstream: {}", config.upstream.url);

    let service = FactCatalogService::new(
        Arc::new(store),
        Arc::new(client),
        config.storage.export_dir(),
    );
    let state = AppState::new(service, config.server.max_fetch_per_request);

    server::run(state, &config.server.bind).await
}
