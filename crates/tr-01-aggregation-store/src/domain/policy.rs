//! Bucket capacity and retention policy.

use std::time::Duration;

/// Maximum records per minute bucket.
pub const DEFAULT_BUCKET_CAPACITY: usize = 500;

/// Buckets older than this are purged (30 days).
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Limits applied by every store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    pub capacity: usize,
    pub retention: Duration,
}

impl Default for BucketPolicy {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUCKET_CAPACITY,
            retention: DEFAULT_RETENTION,
        }
    }
}

impl BucketPolicy {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}
