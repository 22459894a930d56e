//! HTTP surface for the hostpulse service.
//!
//! Multi-sample endpoints run bounded sampling sessions through the registries
//! held in [`AppState`]; the remaining endpoints take one reading from the
//! shared collector.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;

// Re-export commonly used items
pub use config::{SamplerConfig, SamplingConfig, WebConfig};
pub use router::create_app;
pub use state::AppState;

use crate::error::{Result, SystemError};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Start the web server with the provided configuration and state.
pub async fn start_web_server(config: WebConfig, state: Arc<AppState>) -> Result<()> {
    let app = create_app(&config, state);

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| SystemError::config_error(format!("Invalid bind address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SystemError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Starting hostpulse web server on http://{}", addr);
    info!("API index available at http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| SystemError::web_server_error(format!("Server error: {}", e)))?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
}
