//! Nexus server entry point.
//!
//! Loads configuration, hardens the process, connects the store and serves
//! the API until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use nexus_server::config::{ServerConfig, StorageKind};
use nexus_server::hardening;
use nexus_server::routes;
use nexus_server::state::AppState;
use nexus_storage::{MemoryStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;

    // Runs before logging is initialized, so warnings go to stderr.
    apply_hardening(&config);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(addr = %config.bind_addr, "Nexus starting");

    let store = open_store(&config.storage).await?;
    let state = Arc::new(AppState::new(
        store,
        config.cipher.clone(),
        config.sessions.clone(),
    ));
    let app = routes::build_router(state, &config.cors_origins);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Nexus server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Nexus server stopped");
    Ok(())
}

async fn open_store(kind: &StorageKind) -> anyhow::Result<Arc<dyn Store>> {
    match kind {
        StorageKind::Memory => {
            info!("using in-memory storage (data will not persist)");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "postgres-backend")]
        StorageKind::Postgres { url } => {
            info!(url = %"[redacted]", "using PostgreSQL storage");
            let store = nexus_storage::PostgresStore::connect(url)
                .await
                .context("failed to connect to PostgreSQL storage")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres-backend"))]
        StorageKind::Postgres { .. } => {
            anyhow::bail!("PostgreSQL storage requested but feature 'postgres-backend' is not enabled");
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}

#[allow(clippy::print_stderr)]
fn apply_hardening(config: &ServerConfig) {
    if let Err(e) = hardening::disable_core_dumps() {
        eprintln!("WARNING: failed to disable core dumps: {e}");
    }

    if config.disable_mlock {
        eprintln!("WARNING: mlock disabled via NEXUS_DISABLE_MLOCK, keys may be swapped to disk");
    } else if let Err(e) = hardening::lock_memory() {
        eprintln!("WARNING: failed to lock memory: {e} (set NEXUS_DISABLE_MLOCK=true for dev)");
    }
}
