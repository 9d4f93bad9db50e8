//! Telematics Service
//!
//! Starts the telematics pipeline with synthetic producers, logs metrics on an
//! interval, and drains the pipeline on Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use tracing::info;

use telematics_service::{initialize_logging, load_configuration, setup_signal_handlers, ServiceState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = load_configuration()?;

    // Initialize logging
    initialize_logging(&config.logging)?;

    info!("Starting Telematics Service v{}", env!("CARGO_PKG_VERSION"));

    // Set up signal handlers for graceful shutdown
    let shutdown_signal = setup_signal_handlers().context("Failed to install signal handlers")?;

    // Start the pipeline and the metrics reporter
    let state = ServiceState::new(config)?;
    let reporter = state.start_reporter();

    info!("Telematics Service is running. Press Ctrl+C to shutdown gracefully.");

    // Wait for shutdown signal
    let _ = shutdown_signal.await;

    info!("Shutdown signal received. Draining pipeline...");
    let report = state.shutdown(reporter).await;
    info!("Final report: {}", serde_json::to_string(&report)?);

    info!("Telematics Service shutdown complete");
    Ok(())
}
