pub mod api; // HTTP API + change-feed WebSocket
pub mod auth;
pub mod changes;
pub mod compliance;
pub mod config;
pub mod core_state;
pub mod db;
pub mod doctors;
pub mod models;
pub mod notify;
pub mod patients;
pub mod records;
pub mod schedules; // expander + regeneration
pub mod scoping;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Auth(#[from] auth::AuthError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Start the service and block until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env();
    let core = Arc::new(CoreState::new(config)?);

    {
        let conn = core.open_db()?;
        tracing::info!(path = %core.db_path().display(), "Database ready");
        if let Some(operator) = &core.config.bootstrap {
            auth::bootstrap_operator(&conn, operator, core.config.password_iterations)?;
        }
    }

    let mut server = api::start_api_server(core.clone(), core.config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.wait().await;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
