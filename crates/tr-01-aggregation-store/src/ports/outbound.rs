//! # Outbound Ports (Driven Ports)
//!
//! Interfaces the ingest pipeline and the hub require from storage and time.
//!
//! Production: `InMemoryBucketStore`, `RocksDbBucketStore`, `SystemTimeSource`
//! Testing: `InMemoryBucketStore`, `ManualTimeSource`

use crate::domain::errors::StoreError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use shared_types::{Bucket, MinuteKey, StoredRecord};

/// Result of appending one record to its minute bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Stored; `count` is the bucket's count after this append.
    Appended { count: u64 },
    /// The bucket was already at capacity; the record was discarded.
    Dropped,
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, AppendOutcome::Appended { .. })
    }
}

/// Backend health as reported on `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Connected,
    Degraded,
}

impl StoreHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreHealth::Connected => "connected",
            StoreHealth::Degraded => "degraded",
        }
    }
}

/// Minute-bucketed record storage.
///
/// ## Atomicity
///
/// `append` must check capacity, push the record and increment `count` as one
/// unit with respect to other appends for the same minute.
pub trait BucketStore: Send + Sync {
    /// Append to the bucket for `record.minute_key()`, creating it if absent.
    fn append(&self, record: StoredRecord) -> Result<AppendOutcome, StoreError>;

    /// Fetch one bucket.
    fn bucket(&self, minute: MinuteKey) -> Result<Option<Bucket>, StoreError>;

    /// All buckets at or after `cutoff`, oldest first.
    fn buckets_since(&self, cutoff: MinuteKey) -> Result<Vec<Bucket>, StoreError>;

    /// Remove every bucket strictly older than `cutoff`. Returns how many.
    fn purge_older_than(&self, cutoff: MinuteKey) -> Result<usize, StoreError>;

    /// Number of buckets currently held.
    fn bucket_count(&self) -> Result<usize, StoreError>;

    /// Per-bucket record cap.
    fn capacity(&self) -> usize;

    fn health(&self) -> StoreHealth {
        StoreHealth::Connected
    }

    /// Persist buffered writes. No-op for volatile backends.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualTimeSource {
    now: Mutex<DateTime<Utc>>,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
