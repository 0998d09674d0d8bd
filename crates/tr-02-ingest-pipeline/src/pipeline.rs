//! # Message Pipeline
//!
//! One batch in, per-envelope outcomes out. Envelopes are handled in order
//! and independently; counters reflect every envelope exactly once.

use crate::errors::PipelineError;
use crate::ports::FanoutPort;
use crate::stats::StatsTracker;
use relay_telemetry::{
    time_histogram, BATCH_DURATION, ENVELOPES_RECEIVED, RECORDS_ACCEPTED,
    RECORDS_DROPPED_AT_CAPACITY, RECORDS_REJECTED, STORE_WRITE_FAILURES,
};
use shared_crypto::{decrypt_record, validate_payload, SecretKey};
use shared_types::{split_batch, NewDataPayload, StoredRecord};
use std::sync::Arc;
use tr_01_aggregation_store::{AppendOutcome, BucketStore, TimeSource};
use tracing::{debug, warn};

/// Default number of extra attempts after a failed store write.
pub const DEFAULT_WRITE_RETRIES: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Extra store write attempts per record before it counts as an error.
    pub write_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }
}

/// What happened to one accepted envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeOutcome {
    /// Appended; `count` is the bucket count after the append.
    Stored { count: u64 },
    /// Valid, but its minute bucket was full.
    DroppedAtCapacity,
}

/// Per-batch totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub received: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Accepted records that a full bucket discarded (subset of `accepted`).
    pub dropped_at_capacity: u64,
}

pub struct Pipeline {
    key: SecretKey,
    store: Arc<dyn BucketStore>,
    stats: Arc<StatsTracker>,
    fanout: Arc<dyn FanoutPort>,
    clock: Arc<dyn TimeSource>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        key: SecretKey,
        store: Arc<dyn BucketStore>,
        stats: Arc<StatsTracker>,
        fanout: Arc<dyn FanoutPort>,
        clock: Arc<dyn TimeSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            key,
            store,
            stats,
            fanout,
            clock,
            config,
        }
    }

    pub fn stats(&self) -> &Arc<StatsTracker> {
        &self.stats
    }

    pub fn store(&self) -> &Arc<dyn BucketStore> {
        &self.store
    }

    /// Process one `|`-joined batch.
    pub fn process_batch(&self, batch: &str) -> BatchReport {
        let _timer = time_histogram!(BATCH_DURATION);
        let envelopes = split_batch(batch);

        let mut report = BatchReport {
            received: envelopes.len() as u64,
            ..BatchReport::default()
        };
        self.stats.record_received(report.received);
        ENVELOPES_RECEIVED.inc_by(report.received as f64);

        for (index, envelope) in envelopes.into_iter().enumerate() {
            match self.process_envelope(envelope) {
                Ok(outcome) => {
                    report.accepted += 1;
                    if outcome == EnvelopeOutcome::DroppedAtCapacity {
                        report.dropped_at_capacity += 1;
                    }
                }
                Err(e) => {
                    report.rejected += 1;
                    RECORDS_REJECTED.with_label_values(&[e.reason()]).inc();
                    warn!(
                        component = "pipeline",
                        index,
                        reason = e.reason(),
                        error = %e,
                        "Envelope rejected"
                    );
                }
            }
        }

        self.stats.record_outcome(report.accepted, report.rejected);
        RECORDS_ACCEPTED.inc_by(report.accepted as f64);
        debug!(
            component = "pipeline",
            received = report.received,
            accepted = report.accepted,
            rejected = report.rejected,
            dropped = report.dropped_at_capacity,
            "Batch processed"
        );
        report
    }

    /// Decrypt, validate, store and offer one envelope.
    pub fn process_envelope(&self, envelope: &str) -> Result<EnvelopeOutcome, PipelineError> {
        let payload = decrypt_record(&self.key, envelope)?;
        let record = validate_payload(payload)?;
        let stored = StoredRecord::new(record, self.clock.now());

        let outcome = match self.append_with_retry(stored.clone())? {
            AppendOutcome::Appended { count } => EnvelopeOutcome::Stored { count },
            AppendOutcome::Dropped => {
                RECORDS_DROPPED_AT_CAPACITY.inc();
                debug!(
                    component = "pipeline",
                    minute = %stored.minute_key(),
                    "Bucket full, record dropped"
                );
                EnvelopeOutcome::DroppedAtCapacity
            }
        };

        self.fanout.offer(NewDataPayload {
            record: stored,
            stats: self.stats.snapshot(),
        });
        Ok(outcome)
    }

    fn append_with_retry(&self, record: StoredRecord) -> Result<AppendOutcome, PipelineError> {
        let attempts = self.config.write_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.store.append(record.clone()) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    STORE_WRITE_FAILURES.inc();
                    if attempt >= attempts {
                        return Err(PipelineError::Store {
                            attempts,
                            source: e,
                        });
                    }
                    warn!(
                        component = "pipeline",
                        attempt,
                        error = %e,
                        "Store write failed, retrying"
                    );
                    attempt += 1;
                }
            }
        }
    }
}
