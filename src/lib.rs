pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod models;
pub mod scoring; // Instrument scoring + question catalogue
pub mod sessions;
pub mod assessments;
pub mod crisis;
pub mod treatment;
pub mod mood;
pub mod groups; // Support groups + group sessions
pub mod consent;
pub mod medications;
pub mod notes;
pub mod sweeper; // Consent expiry + audit retention

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::CoreState;

/// Start the service and run until Ctrl-C.
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = AppConfig::from_env().context("Invalid configuration")?;
    let core = Arc::new(CoreState::init(&app_config).context("Failed to open data store")?);

    let mut server = api::start_server(core.clone(), app_config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", app_config.addr))?;
    let mut sweeper = sweeper::start_sweeper(core.clone(), app_config.sweep_interval);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    server.shutdown();
    sweeper.shutdown().await;

    // Audit entries still buffered go to disk before exit
    let flushed = core.flush_and_prune_audit()?;
    tracing::info!(flushed, "{} stopped", config::APP_NAME);
    Ok(())
}
