//! # Stats Tracker
//!
//! Process-lifetime counters, written only by the pipeline and read by the
//! status surface.

use parking_lot::RwLock;
use shared_types::StatsSnapshot;

#[derive(Debug, Default)]
pub struct StatsTracker {
    inner: RwLock<StatsSnapshot>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn success_rate(processed: u64, received: u64) -> f64 {
    if received == 0 {
        return 0.0;
    }
    round2(processed as f64 / received as f64 * 100.0)
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count envelopes of a batch before any of them is processed.
    pub fn record_received(&self, envelopes: u64) {
        let mut stats = self.inner.write();
        stats.total_received = stats.total_received.saturating_add(envelopes);
    }

    /// Fold in a finished batch and recompute the success rate.
    pub fn record_outcome(&self, processed: u64, errors: u64) {
        let mut stats = self.inner.write();
        stats.total_processed = stats.total_processed.saturating_add(processed);
        stats.total_errors = stats.total_errors.saturating_add(errors);
        stats.success_rate = success_rate(stats.total_processed, stats.total_received);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.read()
    }
}
