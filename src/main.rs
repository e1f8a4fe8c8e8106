use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use notifyd::config::{Config, DEFAULT_CONFIG_PATH};
use notifyd::dispatch::DispatchEngine;
use notifyd::providers::ProviderRegistry;
use notifyd::server::app::{bind_address, build_router};
use notifyd::server::state::AppState;
use notifyd::{logging, store};

#[derive(Debug, Parser)]
#[command(name = "notifyd", about = "Asynchronous notification dispatch service")]
struct Cli {
    /// Path to the TOML config file. Must exist when given; otherwise
    /// `notifyd.toml` is read if present.
    #[arg(long, short, env = "NOTIFYD_CONFIG")]
    config: Option<PathBuf>,
    /// Overrides `server.bind`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load_required(path)?,
        None => Config::load(Path::new(DEFAULT_CONFIG_PATH))?,
    };
    if let Some(bind) = cli.bind {
        config.server.get_or_insert_with(Default::default).bind = Some(bind);
    }
    logging::init(&config);

    let registry = ProviderRegistry::from_config(&config.providers())
        .context("failed to build provider registry")?;
    tracing::info!(
        event = "providers_ready",
        channels = ?registry.channels(),
        "provider registry initialized"
    );
    let store = store::open_store(&config.store())
        .await
        .context("failed to open state store")?;

    let engine = DispatchEngine::from_config(&config, Arc::new(registry), store);
    let _workers = engine.spawn_workers();

    let state = AppState::new(engine, config.server.clone());
    let addr = bind_address(&state).context("invalid bind address")?;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(event = "server_started", %addr, "notification service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(event = "signal_error", error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!(event = "server_stopping", "shutdown requested");
}
