//! # Fan-out Throttle
//!
//! The pipeline offers every accepted record; observers see at most one
//! `newData` broadcast per interval, carrying the newest record offered.

use relay_telemetry::FANOUT_BROADCASTS;
use shared_types::{shutdown_requested, NewDataPayload, WireEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tr_02_ingest_pipeline::FanoutPort;
use tracing::{debug, warn};

/// Latest-value slot in front of the observer broadcast channel.
#[derive(Debug)]
pub struct FanoutThrottle {
    latest: watch::Sender<Option<NewDataPayload>>,
    observers: broadcast::Sender<Arc<str>>,
}

impl FanoutThrottle {
    pub fn new(channel_capacity: usize) -> Self {
        let (latest, _) = watch::channel(None);
        let (observers, _) = broadcast::channel(channel_capacity.max(1));
        Self { latest, observers }
    }

    /// Receiver of serialized `newData` frames for one observer.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.observers.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.receiver_count()
    }

    /// Start the broadcast loop.
    pub fn spawn(&self, interval: Duration, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(run(
            self.latest.subscribe(),
            self.observers.clone(),
            interval,
            shutdown,
        ))
    }
}

impl FanoutPort for FanoutThrottle {
    fn offer(&self, payload: NewDataPayload) {
        self.latest.send_replace(Some(payload));
    }
}

async fn run(
    mut latest: watch::Receiver<Option<NewDataPayload>>,
    observers: broadcast::Sender<Arc<str>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = latest.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown_requested(&mut shutdown) => break,
        }

        let payload = latest.borrow_and_update().clone();
        if let Some(payload) = payload {
            broadcast_payload(&observers, payload);
        }

        // Offers made while sleeping collapse into the next broadcast.
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
    debug!(component = "hub", "Fan-out loop stopped");
}

fn broadcast_payload(observers: &broadcast::Sender<Arc<str>>, payload: NewDataPayload) {
    let frame = match WireEvent::NewData(payload).to_json() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(component = "hub", error = %e, "Failed to encode newData");
            return;
        }
    };

    match observers.send(Arc::from(frame)) {
        Ok(receivers) => {
            FANOUT_BROADCASTS.inc();
            debug!(component = "hub", receivers, "Broadcast newData");
        }
        Err(_) => debug!(component = "hub", "No observers connected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared_types::{Record, StatsSnapshot, StoredRecord};
    use tokio::time::Instant;

    fn payload(name: &str) -> NewDataPayload {
        NewDataPayload {
            record: StoredRecord::new(
                Record {
                    name: name.into(),
                    origin: "Pune".into(),
                    destination: "Goa".into(),
                    integrity_tag: "33".repeat(32),
                },
                Utc.with_ymd_and_hms(2024, 5, 5, 5, 5, 5).unwrap(),
            ),
            stats: StatsSnapshot::default(),
        }
    }

    fn name_of(frame: &str) -> String {
        let json: serde_json::Value = serde_json::from_str(frame).unwrap();
        assert_eq!(json["event"], "newData");
        json["data"]["name"].as_str().unwrap().to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_latest() {
        let throttle = FanoutThrottle::new(16);
        let mut rx = throttle.subscribe();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _task = throttle.spawn(Duration::from_millis(1000), shutdown_rx);

        throttle.offer(payload("first"));
        assert_eq!(name_of(&rx.recv().await.unwrap()), "first");
        let after_first = Instant::now();

        for name in ["a", "b", "c", "last"] {
            throttle.offer(payload(name));
        }
        assert_eq!(name_of(&rx.recv().await.unwrap()), "last");
        assert!(after_first.elapsed() >= Duration::from_millis(1000));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_loop_sends_nothing() {
        let throttle = FanoutThrottle::new(4);
        let mut rx = throttle.subscribe();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _task = throttle.spawn(Duration::from_millis(100), shutdown_rx);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_observer_gets_broadcast() {
        let throttle = FanoutThrottle::new(4);
        let mut one = throttle.subscribe();
        let mut two = throttle.subscribe();
        assert_eq!(throttle.observer_count(), 2);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _task = throttle.spawn(Duration::from_millis(100), shutdown_rx);
        throttle.offer(payload("both"));

        assert_eq!(name_of(&one.recv().await.unwrap()), "both");
        assert_eq!(name_of(&two.recv().await.unwrap()), "both");
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let throttle = FanoutThrottle::new(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = throttle.spawn(Duration::from_millis(10), shutdown_rx);
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_offer_without_loop_keeps_latest() {
        let throttle = FanoutThrottle::new(4);
        throttle.offer(payload("x"));
        throttle.offer(payload("y"));
        let latest = throttle.latest.borrow().clone().unwrap();
        assert_eq!(latest.record.record.name, "y");
    }
}
