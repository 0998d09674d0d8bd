//! # Telemetry Relay Hub
//!
//! Entry point for the hub process.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics
//! 2. Load configuration from the environment and validate it
//! 3. Open the bucket store and start the ingest, control, fan-out and
//!    retention tasks
//! 4. Serve WebSocket and HTTP routes until Ctrl-C
//! 5. Drain queued batches, stop background tasks, flush the store

use anyhow::{Context, Result};
use relay_telemetry::{init_telemetry, log_event, TelemetryConfig};
use tr_03_connection_hub::{HubConfig, HubService};
use tracing::info;

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log_event!(info, "hub", "Shutdown requested"),
        Err(e) => {
            log_event!(warn, "hub", "Cannot listen for Ctrl-C", error = %e);
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_component("hub"))
        .context("Failed to initialize telemetry")?;

    let config = HubConfig::from_env().context("Failed to load hub configuration")?;
    info!(
        component = "hub",
        addr = %config.addr(),
        backend = ?config.store.backend,
        bucket_capacity = config.store.bucket_capacity,
        retention_secs = config.store.retention.as_secs(),
        fanout_interval_ms = config.fanout.interval.as_millis() as u64,
        "Starting telemetry relay hub"
    );

    let service = HubService::new(config).context("Failed to start hub")?;
    service
        .start(shutdown_signal())
        .await
        .context("Hub stopped with an error")?;

    Ok(())
}
