use std::sync::Arc;

use anyhow::{Context, Result};
use rollcall_core::RosterStore;
use tracing_subscriber::EnvFilter;

mod attendance;
mod config;
mod engine;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::from_env();

    let log = Arc::new(attendance::AttendanceLog::open(&config.db_path)?);
    let handle = engine::spawn_engine(&config)?;

    let state = routes::AppState {
        engine: handle,
        store: RosterStore::new(config.roster_path.clone()),
        log,
        default_tolerance: config.tolerance,
    };

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "rollcalld listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("rollcalld stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
