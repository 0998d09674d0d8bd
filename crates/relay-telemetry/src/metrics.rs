//! Prometheus metrics for the relay.
//!
//! All metrics follow the naming convention: `relay_<stage>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., envelopes_received_total)
//! - **Gauge**: Value that can go up or down (e.g., connections_active)
//! - **Histogram**: Distribution of values (e.g., batch_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Relay metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // INGEST METRICS
    // =========================================================================

    /// Envelopes received, counted before any processing
    pub static ref ENVELOPES_RECEIVED: Counter = Counter::new(
        "relay_ingest_envelopes_received_total",
        "Total envelopes received in data stream batches"
    ).expect("metric creation failed");

    /// Records that decrypted, validated and were stored
    pub static ref RECORDS_ACCEPTED: Counter = Counter::new(
        "relay_ingest_records_accepted_total",
        "Total records accepted by the pipeline"
    ).expect("metric creation failed");

    /// Rejected envelopes by reason
    pub static ref RECORDS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("relay_ingest_records_rejected_total", "Envelopes rejected by the pipeline"),
        &["reason"]  // reason: decrypt/validation/store
    ).expect("metric creation failed");

    /// Batch processing duration
    pub static ref BATCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "relay_ingest_batch_duration_seconds",
            "Time spent processing one data stream batch"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // STORE METRICS
    // =========================================================================

    /// Store write failures (each retry attempt counts)
    pub static ref STORE_WRITE_FAILURES: Counter = Counter::new(
        "relay_store_write_failures_total",
        "Total failed bucket writes"
    ).expect("metric creation failed");

    /// Records dropped because their minute bucket was full
    pub static ref RECORDS_DROPPED_AT_CAPACITY: Counter = Counter::new(
        "relay_store_records_dropped_total",
        "Records dropped because their bucket reached capacity"
    ).expect("metric creation failed");

    /// Buckets removed by the retention sweeper
    pub static ref BUCKETS_PURGED: Counter = Counter::new(
        "relay_store_buckets_purged_total",
        "Total buckets purged by retention"
    ).expect("metric creation failed");

    // =========================================================================
    // HUB METRICS
    // =========================================================================

    /// Fan-out broadcasts sent to observers
    pub static ref FANOUT_BROADCASTS: Counter = Counter::new(
        "relay_hub_fanout_broadcasts_total",
        "Total newData broadcasts sent to observers"
    ).expect("metric creation failed");

    /// Active connections by role
    pub static ref ACTIVE_CONNECTIONS: GaugeVec = GaugeVec::new(
        Opts::new("relay_hub_connections_active", "Currently connected clients"),
        &["role"]  // role: producer/observer
    ).expect("metric creation failed");

    /// Control commands by command and source
    pub static ref CONTROL_COMMANDS: CounterVec = CounterVec::new(
        Opts::new("relay_hub_control_commands_total", "Start/stop commands received"),
        &["command", "source"]  // command: start/stop, source: ws/http
    ).expect("metric creation failed");
}

/// Register all metrics with the relay registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Ingest
        Box::new(ENVELOPES_RECEIVED.clone()),
        Box::new(RECORDS_ACCEPTED.clone()),
        Box::new(RECORDS_REJECTED.clone()),
        Box::new(BATCH_DURATION.clone()),
        // Store
        Box::new(STORE_WRITE_FAILURES.clone()),
        Box::new(RECORDS_DROPPED_AT_CAPACITY.clone()),
        Box::new(BUCKETS_PURGED.clone()),
        // Hub
        Box::new(FANOUT_BROADCASTS.clone()),
        Box::new(ACTIVE_CONNECTIONS.clone()),
        Box::new(CONTROL_COMMANDS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all relay metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    register_metrics()?;

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
