//! ==============================================================================
//! main.rs - dashboard host entry point
//! ==============================================================================
//!
//! purpose:
//!     wires one dashboard session to the web server and runs until ctrl-c.
//!
//! responsibilities:
//!     - load dashboard.toml (or fall back to defaults)
//!     - install the tracing subscriber
//!     - start the session (transport adapter + ingestion engine)
//!     - serve the status page and json api
//!     - tear everything down in order on shutdown
//!
//! relationships:
//!     - uses: config.rs, logging.rs, session.rs, server.rs
//!     - reads: config/dashboard.toml
//!
//! ==============================================================================

use anyhow::Result;
use telemetry_dashboard::config::{ConfigSource, DashboardConfig};
use telemetry_dashboard::server::{self, ServerState};
use telemetry_dashboard::{logging, DashboardSession};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let (config, source) = DashboardConfig::load_or_default();

    // step 2: logging (needs the configured level)
    logging::init(&config.logging)?;
    match &source {
        ConfigSource::File(path) => tracing::info!(path = %path.display(), "loaded configuration"),
        ConfigSource::Defaults { failures } => {
            for failure in failures {
                tracing::warn!(error = %failure, "ignoring unreadable configuration");
            }
            tracing::info!("no configuration file, using defaults");
        }
    }
    config.log_summary();

    // step 3: session
    let session = DashboardSession::start(&config);

    // step 4: web server in background
    let server_token = CancellationToken::new();
    let server_state = ServerState::new(session.publisher(), config.visual.clone());
    let bind = config.server.bind.clone();
    let server = tokio::spawn({
        let token = server_token.clone();
        async move {
            if let Err(e) = server::run(&bind, server_state, token).await {
                tracing::error!(error = %format!("{:#}", e), "web server error");
            }
        }
    });

    // step 5: run until interrupted
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }

    server_token.cancel();
    session.shutdown().await;
    if let Err(e) = server.await {
        tracing::error!(error = %e, "web server task failed");
    }
    Ok(())
}
