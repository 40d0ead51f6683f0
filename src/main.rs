use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatekeeper::config::{GatekeeperConfig, StoreBackend};
use gatekeeper::http::{AppState, HttpServer};
use gatekeeper::ratelimit::{
    AdmissionController, CounterStore, IdentityResolver, InMemoryCounterStore, RedisCounterStore,
    WindowAccounting,
};

/// Weighted fixed-window admission control in front of HTTP routes.
#[derive(Debug, Parser)]
#[command(name = "gatekeeper", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "GATEKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override the counter store backend
    #[arg(long, value_enum)]
    store: Option<StoreBackend>,

    /// Override the Redis URL
    #[arg(long)]
    redis_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("Starting Gatekeeper");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GatekeeperConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }
    if let Some(store) = cli.store {
        config.store.backend = store;
    }
    if let Some(url) = cli.redis_url {
        config.store.redis_url = url;
    }

    let policies = config.limits.policies();
    info!(
        listen_addr = %config.server.listen_addr,
        address_limit = policies.address.limit,
        credential_limit = policies.credential.limit,
        window_seconds = policies.address.window_seconds,
        store = ?config.store.backend,
        fallback = ?config.store.fallback,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    let store = build_store(&config).await?;
    let controller = AdmissionController::new(
        IdentityResolver::new(policies),
        WindowAccounting::new(store),
        config.store.key_prefix.clone(),
        config.store.fallback,
    );

    let state = AppState::new(controller, config.routes.clone())
        .trust_forwarded_for(config.server.trust_forwarded_for);
    let server = HttpServer::new(config.server.listen_addr, state);

    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Gatekeeper stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_store(config: &GatekeeperConfig) -> anyhow::Result<Arc<dyn CounterStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let store = Arc::new(InMemoryCounterStore::new());
            // Runs for the process lifetime
            let _sweeper = store.clone().spawn_sweeper(config.store.sweep_interval());
            info!("Using in-process counter store");
            Ok(store as Arc<dyn CounterStore>)
        }
        StoreBackend::Redis => {
            let store = RedisCounterStore::connect_with_timeout(
                &config.store.redis_url,
                config.store.call_timeout(),
            )
            .await
            .with_context(|| format!("connecting to Redis at {}", config.store.redis_url))?;
            info!(url = %config.store.redis_url, "Using Redis counter store");
            Ok(Arc::new(store))
        }
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
