//! # Relay Producer
//!
//! Connects to the hub as a producer and emits encrypted batches on command.

use anyhow::{Context, Result};
use relay_telemetry::{init_telemetry, TelemetryConfig};
use shared_crypto::SecretKey;
use tokio::sync::watch;
use tr_04_producer::{BatchBuilder, Emitter, ProducerConfig, SampleData};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_component("producer"))
        .context("Failed to initialize telemetry")?;

    let config = ProducerConfig::from_env().context("Failed to load producer configuration")?;
    config.validate().context("Invalid producer configuration")?;

    let data = match &config.data_file {
        Some(path) => SampleData::load(path).context("Failed to load sample data")?,
        None => SampleData::default(),
    };
    let builder = BatchBuilder::new(
        SecretKey::derive(&config.shared_secret),
        data,
        config.min_messages,
        config.max_messages,
    )
    .context("Failed to build batch generator")?;

    info!(
        component = "producer",
        url = %config.listener_url,
        interval_ms = config.emit_interval.as_millis() as u64,
        min = config.min_messages,
        max = config.max_messages,
        "Starting producer"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!(component = "producer", "Cannot listen for Ctrl-C");
            return;
        }
        info!(component = "producer", "Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let mut emitter = Emitter::new(config, builder);
    emitter.run(shutdown_rx).await.context("Producer stopped")?;
    info!(component = "producer", batches = emitter.batches_sent(), "Producer stopped");
    Ok(())
}
