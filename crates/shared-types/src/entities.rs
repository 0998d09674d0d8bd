//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Records**: `Record`, `RecordPayload`, `StoredRecord`
//! - **Aggregation**: `MinuteKey`, `Bucket`, `BucketSummary`
//! - **Stats**: `StatsSnapshot`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// CLUSTER A: RECORDS
// =============================================================================

/// A synthetic telemetry record as carried inside one envelope.
///
/// `integrity_tag` is the lowercase hex SHA-256 over the canonical JSON of
/// `{name, origin, destination}`. Older producers send it as `secret_key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub name: String,
    pub origin: String,
    pub destination: String,
    #[serde(alias = "secret_key")]
    pub integrity_tag: String,
}

/// A decrypted payload before field presence has been checked.
///
/// Every field is optional so that a payload missing a field still parses and
/// can be rejected as a validation failure rather than a decode failure. Use
/// [`RecordPayload::from_value`] for untrusted JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordPayload {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    #[serde(alias = "secret_key")]
    pub integrity_tag: Option<String>,
}

impl From<Record> for RecordPayload {
    fn from(record: Record) -> Self {
        Self {
            name: Some(record.name),
            origin: Some(record.origin),
            destination: Some(record.destination),
            integrity_tag: Some(record.integrity_tag),
        }
    }
}

impl RecordPayload {
    /// Pick the record fields out of any decoded JSON value.
    ///
    /// Absent and non-string fields stay `None`, as does every field when
    /// `value` is not an object. `integrityTag` wins over `secret_key`.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };
        Self {
            name: field("name"),
            origin: field("origin"),
            destination: field("destination"),
            integrity_tag: field("integrityTag").or_else(|| field("secret_key")),
        }
    }
}

/// An accepted record stamped with the hub's receipt time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    #[serde(flatten)]
    pub record: Record,
    pub received_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(record: Record, received_at: DateTime<Utc>) -> Self {
        Self {
            record,
            received_at,
        }
    }

    /// Bucket key this record belongs to.
    pub fn minute_key(&self) -> MinuteKey {
        MinuteKey::from_datetime(self.received_at)
    }
}

// =============================================================================
// CLUSTER B: AGGREGATION
// =============================================================================

/// Receipt time floored to the minute, as unix seconds.
///
/// Ordering follows wall-clock order, so range scans over keys are range scans
/// over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinuteKey(i64);

impl MinuteKey {
    /// Floor a timestamp to its minute.
    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        Self(ts.timestamp().div_euclid(60) * 60)
    }

    /// Build from unix seconds, flooring to the minute.
    pub fn from_unix_seconds(secs: i64) -> Self {
        Self(secs.div_euclid(60) * 60)
    }

    /// Unix seconds at the start of the minute.
    pub fn as_unix_seconds(&self) -> i64 {
        self.0
    }

    /// Start of the minute as a UTC timestamp.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

impl std::fmt::Display for MinuteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_datetime().format("%Y-%m-%dT%H:%M:00Z"))
    }
}

/// One minute of accepted records.
///
/// Invariant: `data.len() <= capacity` of the owning store, and `count`
/// always equals `data.len()` because both change in the same append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub timestamp_minute: DateTime<Utc>,
    pub count: u64,
    pub data: Vec<StoredRecord>,
}

impl Bucket {
    /// Create an empty bucket for the given minute.
    pub fn empty(key: MinuteKey) -> Self {
        Self {
            timestamp_minute: key.as_datetime(),
            count: 0,
            data: Vec::new(),
        }
    }

    pub fn key(&self) -> MinuteKey {
        MinuteKey::from_datetime(self.timestamp_minute)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Lightweight view used by status queries.
    pub fn summary(&self) -> BucketSummary {
        BucketSummary {
            timestamp_minute: self.timestamp_minute,
            count: self.count,
        }
    }
}

/// Bucket without its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    pub timestamp_minute: DateTime<Utc>,
    pub count: u64,
}

// =============================================================================
// CLUSTER C: STATS
// =============================================================================

/// Point-in-time view of the ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_received: u64,
    pub total_processed: u64,
    pub total_errors: u64,
    /// Percentage of received envelopes that were accepted, two decimals.
    pub success_rate: f64,
}
