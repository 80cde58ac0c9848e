//! Gatehouse API Server
//!
//! Account registration and JWT session server.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use gatehouse_api::{create_router, state::AppState};
use gatehouse_core::{open_stores, AppConfig, LoggingConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "gatehouse_api={level},gatehouse_core={level},audit=info,tower_http=info",
            level = logging.level
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load(None).context("Failed to load configuration")?;

    init_tracing(&config.logging);

    if config.uses_development_key() {
        tracing::warn!("Using the built-in development signing key; set JWT_SECRET in production");
    }

    let stores = open_stores(&config.database)
        .await
        .context("Failed to open account store")?;
    tracing::info!(backend = stores.accounts.name(), "Account store ready");

    let addr = config.server.bind_address();
    let prune_every = Duration::from_secs(config.auth.blacklist_prune_interval_secs);

    // Create application state
    let state = Arc::new(AppState::new(config, stores).context("Failed to build session service")?);

    let pruner = state.sessions.registry().spawn_pruner(prune_every);

    let app = create_router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Gatehouse API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_state.set_ready(false);
            tracing::info!("Shutdown signal received");
        })
        .await?;

    pruner.abort();
    tracing::info!("Server stopped");

    Ok(())
}
