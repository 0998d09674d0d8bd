//! # In-Memory Bucket Store
//!
//! `DashMap` keyed by minute. The shard write lock held by `entry()` makes the
//! capacity check, push and count increment atomic per key.

use crate::domain::errors::StoreError;
use crate::domain::policy::BucketPolicy;
use crate::ports::outbound::{AppendOutcome, BucketStore};
use dashmap::DashMap;
use shared_types::{Bucket, MinuteKey, StoredRecord};

/// Volatile store; contents are lost on restart.
#[derive(Debug)]
pub struct InMemoryBucketStore {
    buckets: DashMap<MinuteKey, Bucket>,
    capacity: usize,
}

impl InMemoryBucketStore {
    pub fn new(policy: BucketPolicy) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity: policy.capacity,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(BucketPolicy::with_capacity(capacity))
    }
}

impl Default for InMemoryBucketStore {
    fn default() -> Self {
        Self::new(BucketPolicy::default())
    }
}

impl BucketStore for InMemoryBucketStore {
    fn append(&self, record: StoredRecord) -> Result<AppendOutcome, StoreError> {
        let key = record.minute_key();
        let mut bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| Bucket::empty(key));

        if bucket.data.len() >= self.capacity {
            return Ok(AppendOutcome::Dropped);
        }

        bucket.data.push(record);
        bucket.count += 1;
        Ok(AppendOutcome::Appended {
            count: bucket.count,
        })
    }

    fn bucket(&self, minute: MinuteKey) -> Result<Option<Bucket>, StoreError> {
        Ok(self.buckets.get(&minute).map(|b| b.value().clone()))
    }

    fn buckets_since(&self, cutoff: MinuteKey) -> Result<Vec<Bucket>, StoreError> {
        let mut buckets: Vec<Bucket> = self
            .buckets
            .iter()
            .filter(|entry| *entry.key() >= cutoff)
            .map(|entry| entry.value().clone())
            .collect();
        buckets.sort_by_key(Bucket::key);
        Ok(buckets)
    }

    fn purge_older_than(&self, cutoff: MinuteKey) -> Result<usize, StoreError> {
        let mut removed = 0;
        self.buckets.retain(|key, _| {
            let keep = *key >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    fn bucket_count(&self) -> Result<usize, StoreError> {
        Ok(self.buckets.len())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
