//! # Relay Telemetry
//!
//! Logging and metrics for the telemetry relay.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with a pretty (dev) or JSON (containers) `fmt` layer
//! - **Metrics**: Prometheus counters, gauges and histograms in a private
//!   registry, rendered by [`gather_metrics`] for the hub's `/metrics` route
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `telemetry-relay` | Service name in logs |
//! | `RELAY_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Emit logs to stdout |
//! | `RELAY_JSON_LOGS` | `true` in containers | JSON log lines |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    gather_metrics, register_metrics, HistogramTimer, ACTIVE_CONNECTIONS, BATCH_DURATION,
    BUCKETS_PURGED, CONTROL_COMMANDS, ENVELOPES_RECEIVED, FANOUT_BROADCASTS, RECORDS_ACCEPTED,
    RECORDS_DROPPED_AT_CAPACITY, RECORDS_REJECTED, STORE_WRITE_FAILURES,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
