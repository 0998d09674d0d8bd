//! Shared test fixtures.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use shared_crypto::{encrypt_record, seal, SecretKey};
use shared_types::{join_batch, NewDataPayload};
use std::sync::Arc;
use tr_01_aggregation_store::{BucketStore, TimeSource};
use tr_02_ingest_pipeline::{FanoutPort, Pipeline, PipelineConfig, StatsTracker};

pub const SHARED_SECRET: &str = "test-key";

pub fn key() -> SecretKey {
    SecretKey::derive(SHARED_SECRET)
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 8, 15, 42).unwrap()
}

pub fn valid_envelope(name: &str) -> String {
    encrypt_record(&key(), &seal(name, "NY", "LA")).unwrap()
}

/// Decrypts fine, fails integrity validation.
pub fn tampered_envelope() -> String {
    let mut record = seal("John Doe", "NY", "LA");
    record.destination = "SF".into();
    encrypt_record(&key(), &record).unwrap()
}

/// Encrypted under a different secret; decrypts to garbage.
pub fn wrong_key_envelope() -> String {
    encrypt_record(&SecretKey::derive("other-key"), &seal("Eve", "NY", "LA")).unwrap()
}

pub fn batch_of(envelopes: &[String]) -> String {
    join_batch(envelopes)
}

pub fn valid_batch(prefix: &str, count: usize) -> String {
    let envelopes: Vec<String> = (0..count)
        .map(|i| valid_envelope(&format!("{prefix}-{i}")))
        .collect();
    join_batch(&envelopes)
}

/// Fan-out port that keeps every offer.
#[derive(Default)]
pub struct RecordingFanout {
    offers: Mutex<Vec<NewDataPayload>>,
}

impl RecordingFanout {
    pub fn offers(&self) -> Vec<NewDataPayload> {
        self.offers.lock().clone()
    }
}

impl FanoutPort for RecordingFanout {
    fn offer(&self, payload: NewDataPayload) {
        self.offers.lock().push(payload);
    }
}

pub fn pipeline(
    store: Arc<dyn BucketStore>,
    stats: Arc<StatsTracker>,
    fanout: Arc<dyn FanoutPort>,
    clock: Arc<dyn TimeSource>,
) -> Pipeline {
    Pipeline::new(key(), store, stats, fanout, clock, PipelineConfig::default())
}
