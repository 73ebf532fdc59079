use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

mod api;
mod balancer;
mod config;
mod coordinator;
mod db;
mod error;
mod events;
mod executor;
mod state;

#[cfg(test)]
mod tests;

use config::AppConfig;
use db::Database;
use events::EventHub;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cluster_drs=info,tower_http=info".into()),
        )
        .init();

    info!("Cluster DRS v{} starting up", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!(
        "Configuration loaded: port={}, db_path={}, tick={}s, migrate_command={}",
        config.port, config.db_path, config.tick_seconds, config.migrate_command
    );

    let db = Database::open(&config.db_path)?;
    db.run_migrations()?;
    let recovered = db.recover_stale_runs().context("Startup recovery failed")?;
    info!(
        "Database initialized at {} (recovered {} stale run(s), {} move(s) skipped)",
        config.db_path, recovered.runs_failed, recovered.moves_skipped
    );

    let event_hub = EventHub::new(256);
    let state = Arc::new(AppState::new(Arc::new(db), config.clone(), event_hub));

    let scheduler = state.coordinator.spawn();

    let app = api::router(state.clone());

    let bind_addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    state.coordinator.shutdown();
    if let Err(e) = scheduler.await {
        warn!("DRS coordinator task ended abnormally: {}", e);
    }

    info!("Cluster DRS shut down cleanly");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { warn!("Received Ctrl+C, shutting down..."); },
        () = terminate => { warn!("Received SIGTERM, shutting down..."); },
    }
}
