pub mod ai_service; // Risk Analysis Client
pub mod api;
pub mod config;
pub mod conversations;
pub mod core_state;
pub mod dashboard;
pub mod db;
pub mod events;
pub mod models;
pub mod notifications;
pub mod patients;
pub mod streams;
pub mod workflow; // Dose / alert workflow engine

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Startup task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run the service until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env();
    tracing::debug!(?config, "Configuration loaded");

    // SQLite and the blocking HTTP client live off the async worker threads
    let bind_addr = config.bind_addr;
    let core = tokio::task::spawn_blocking(move || {
        let (store, ai) = core_state::open_backends(&config)?;
        CoreState::new(config, store, ai)
    })
    .await??;
    let core = Arc::new(core);

    let mut server = match api::start_server(Arc::clone(&core), bind_addr).await {
        Ok(server) => server,
        Err(e) => {
            core.shutdown();
            tokio::task::spawn_blocking(move || drop(core)).await?;
            return Err(StartupError::Server(e));
        }
    };
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    tracing::info!("Shutting down");

    // Close streams first so open SSE connections end and graceful shutdown can finish
    core.shutdown();
    server.shutdown();
    server.stopped().await;

    // Last reference owns the blocking HTTP client
    tokio::task::spawn_blocking(move || drop(core)).await?;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
