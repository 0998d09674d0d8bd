//! # Retention Sweeper
//!
//! Interval task that removes buckets older than the retention window.
//! Purging is never a side effect of reads.

use crate::domain::errors::StoreError;
use crate::ports::outbound::{BucketStore, TimeSource};
use chrono::TimeDelta;
use relay_telemetry::{log_event, BUCKETS_PURGED};
use shared_types::MinuteKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct RetentionSweeper {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn TimeSource>,
    retention: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn BucketStore>, clock: Arc<dyn TimeSource>, retention: Duration) -> Self {
        Self {
            store,
            clock,
            retention,
        }
    }

    /// Oldest minute that is still retained, or `None` if the window reaches
    /// past the representable range.
    pub fn cutoff(&self) -> Option<MinuteKey> {
        let window = TimeDelta::from_std(self.retention).ok()?;
        let oldest = self.clock.now().checked_sub_signed(window)?;
        Some(MinuteKey::from_datetime(oldest))
    }

    /// Run one purge pass.
    pub fn sweep_once(&self) -> Result<usize, StoreError> {
        let Some(cutoff) = self.cutoff() else {
            return Ok(0);
        };
        let removed = self.store.purge_older_than(cutoff)?;
        if removed > 0 {
            BUCKETS_PURGED.inc_by(removed as f64);
            log_event!(info, "store", "Purged expired buckets", removed, cutoff = %cutoff);
        }
        Ok(removed)
    }

    /// Sweep every `interval` until `shutdown` flips to true.
    ///
    /// The first sweep runs immediately.
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut sweep_interval = tokio::time::interval(interval);
        sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = sweep_interval.tick() => {
                    if let Err(e) = self.sweep_once() {
                        warn!(component = "store", error = %e, "Retention sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(component = "store", "Retention sweeper stopping");
                        break;
                    }
                }
            }
        }
    }

    pub fn spawn(self, interval: Duration, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(interval, shutdown))
    }
}
