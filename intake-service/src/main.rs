//! Case intake service entry point

use anyhow::{Context, Result};
use intake_service::admission::{spawn_eviction_task, AdmissionController};
use intake_service::config::IntakeConfig;
use intake_service::logging::init_logging;
use intake_service::{app, open_store, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let config = IntakeConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    let store = open_store(&config).await?;
    let admission = Arc::new(AdmissionController::in_memory(&config.rate_limit));
    let eviction = spawn_eviction_task(&admission, config.rate_limit.cleanup_interval);

    let state = Arc::new(AppState::new(store, admission));
    let router = app(state);

    let addr = config.server.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        %addr,
        backend = ?config.storage.backend,
        general_max = config.rate_limit.general_max,
        form_max = config.rate_limit.form_max,
        "intake-service listening"
    );

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    eviction.abort();
    info!("intake-service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
