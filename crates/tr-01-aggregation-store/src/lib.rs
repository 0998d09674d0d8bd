//! # TR-01: Aggregation Store
//!
//! Accepted records land in one bucket per receipt minute.
//!
//! ## Invariants
//!
//! - A bucket never holds more than `capacity` records. Appends to a full
//!   bucket are dropped, never redirected to another minute.
//! - Append and count increment happen as one unit per bucket key, so
//!   concurrent appends to the same minute never lose updates.
//! - Buckets older than the retention window are removed by an explicit,
//!   interval-driven [`RetentionSweeper`]; reads never purge.
//!
//! ## Architecture
//!
//! ```text
//! pipeline ──append──▶ BucketStore (port)
//!                        ├── InMemoryBucketStore   (DashMap, default)
//!                        └── RocksDbBucketStore    (feature = "rocksdb")
//! RetentionSweeper ──purge_older_than──▶ BucketStore
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod retention;

pub use adapters::memory::InMemoryBucketStore;
#[cfg(feature = "rocksdb")]
pub use adapters::rocksdb::{RocksDbBucketConfig, RocksDbBucketStore};
pub use domain::errors::StoreError;
pub use domain::policy::{BucketPolicy, DEFAULT_BUCKET_CAPACITY, DEFAULT_RETENTION};
pub use ports::outbound::{
    AppendOutcome, BucketStore, ManualTimeSource, StoreHealth, SystemTimeSource, TimeSource,
};
pub use retention::RetentionSweeper;
