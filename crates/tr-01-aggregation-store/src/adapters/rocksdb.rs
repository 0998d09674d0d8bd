//! # RocksDB Bucket Store
//!
//! Persistent backend. Each bucket is one key, `bucket:` followed by the
//! order-preserving encoding of its minute, holding the JSON bucket document.
//!
//! Appends are read-modify-write under a single writer lock; reads go straight
//! to the database.

use crate::domain::errors::StoreError;
use crate::domain::policy::BucketPolicy;
use crate::ports::outbound::{AppendOutcome, BucketStore, StoreHealth};
use parking_lot::Mutex;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use shared_types::{Bucket, MinuteKey, StoredRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

const BUCKET_PREFIX: &[u8] = b"bucket:";

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbBucketConfig {
    /// Path to the database directory
    pub path: String,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: false)
    pub sync_writes: bool,
}

impl Default for RocksDbBucketConfig {
    fn default() -> Self {
        Self {
            path: "./data/buckets".to_string(),
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

impl RocksDbBucketConfig {
    /// Create config for testing (smaller buffers)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed bucket store.
pub struct RocksDbBucketStore {
    db: DB,
    config: RocksDbBucketConfig,
    capacity: usize,
    write_lock: Mutex<()>,
    degraded: AtomicBool,
}

fn encode_key(minute: MinuteKey) -> Vec<u8> {
    // Flip the sign bit so byte order matches numeric order for negative keys.
    let ordered = (minute.as_unix_seconds() as u64) ^ (1 << 63);
    let mut key = Vec::with_capacity(BUCKET_PREFIX.len() + 8);
    key.extend_from_slice(BUCKET_PREFIX);
    key.extend_from_slice(&ordered.to_be_bytes());
    key
}

fn decode_bucket(bytes: &[u8]) -> Result<Bucket, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn encode_bucket(bucket: &Bucket) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(bucket).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl RocksDbBucketStore {
    /// Open or create the database.
    pub fn open(config: RocksDbBucketConfig, policy: BucketPolicy) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open(&opts, &config.path)
            .map_err(|e| StoreError::io(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self {
            db,
            config,
            capacity: policy.capacity,
            write_lock: Mutex::new(()),
            degraded: AtomicBool::new(false),
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }

    fn track<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        match &result {
            Ok(_) => self.degraded.store(false, Ordering::Relaxed),
            Err(e) => {
                warn!(component = "store", error = %e, "RocksDB operation failed");
                self.degraded.store(true, Ordering::Relaxed);
            }
        }
        result
    }

    fn read_bucket(&self, minute: MinuteKey) -> Result<Option<Bucket>, StoreError> {
        let bytes = self
            .db
            .get(encode_key(minute))
            .map_err(|e| StoreError::io(format!("RocksDB get failed: {}", e)))?;
        bytes.as_deref().map(decode_bucket).transpose()
    }

    /// Visit bucket entries from `start_key` forward, stopping when `visit` returns false.
    fn scan_from(
        &self,
        start_key: &[u8],
        mut visit: impl FnMut(&[u8], &[u8]) -> Result<bool, StoreError>,
    ) -> Result<(), StoreError> {
        let iter = self
            .db
            .iterator(IteratorMode::From(start_key, Direction::Forward));
        for item in iter {
            let (key, value) =
                item.map_err(|e| StoreError::io(format!("RocksDB iteration failed: {}", e)))?;
            if !key.starts_with(BUCKET_PREFIX) || !visit(&key, &value)? {
                break;
            }
        }
        Ok(())
    }

    fn append_locked(&self, record: StoredRecord) -> Result<AppendOutcome, StoreError> {
        let _guard = self.write_lock.lock();
        let key = record.minute_key();
        let mut bucket = self.read_bucket(key)?.unwrap_or_else(|| Bucket::empty(key));

        if bucket.data.len() >= self.capacity {
            return Ok(AppendOutcome::Dropped);
        }

        bucket.data.push(record);
        bucket.count += 1;
        self.db
            .put_opt(encode_key(key), encode_bucket(&bucket)?, &self.write_options())
            .map_err(|e| StoreError::io(format!("RocksDB put failed: {}", e)))?;

        Ok(AppendOutcome::Appended {
            count: bucket.count,
        })
    }
}

impl BucketStore for RocksDbBucketStore {
    fn append(&self, record: StoredRecord) -> Result<AppendOutcome, StoreError> {
        self.track(self.append_locked(record))
    }

    fn bucket(&self, minute: MinuteKey) -> Result<Option<Bucket>, StoreError> {
        self.track(self.read_bucket(minute))
    }

    fn buckets_since(&self, cutoff: MinuteKey) -> Result<Vec<Bucket>, StoreError> {
        let mut buckets = Vec::new();
        let result = self.scan_from(&encode_key(cutoff), |_, value| {
            buckets.push(decode_bucket(value)?);
            Ok(true)
        });
        self.track(result.map(|()| buckets))
    }

    fn purge_older_than(&self, cutoff: MinuteKey) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock();
        let cutoff_key = encode_key(cutoff);
        let mut batch = WriteBatch::default();
        let mut removed = 0;

        let scanned = self.scan_from(BUCKET_PREFIX, |key, _| {
            if key >= cutoff_key.as_slice() {
                return Ok(false);
            }
            batch.delete(key);
            removed += 1;
            Ok(true)
        });
        self.track(scanned)?;

        if removed > 0 {
            let written = self
                .db
                .write_opt(batch, &self.write_options())
                .map_err(|e| StoreError::io(format!("RocksDB batch delete failed: {}", e)));
            self.track(written)?;
        }
        Ok(removed)
    }

    fn bucket_count(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        let result = self.scan_from(BUCKET_PREFIX, |_, _| {
            count += 1;
            Ok(true)
        });
        self.track(result.map(|()| count))
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn health(&self) -> StoreHealth {
        if self.degraded.load(Ordering::Relaxed) {
            StoreHealth::Degraded
        } else {
            StoreHealth::Connected
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::io(format!("RocksDB flush failed: {}", e)))
    }
}
