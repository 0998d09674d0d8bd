//! Pipeline offers feeding the observer broadcast.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tr_01_aggregation_store::{InMemoryBucketStore, ManualTimeSource};
    use tr_02_ingest_pipeline::StatsTracker;
    use tr_03_connection_hub::FanoutThrottle;

    fn parse(frame: &str) -> Value {
        let json: Value = serde_json::from_str(frame).unwrap();
        assert_eq!(json["event"], "newData");
        json
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_yields_single_broadcast_of_last_record() {
        let throttle = Arc::new(FanoutThrottle::new(16));
        let mut observer = throttle.subscribe();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _loop = throttle.spawn(Duration::from_millis(1000), shutdown_rx);

        let pipeline = pipeline(
            Arc::new(InMemoryBucketStore::with_capacity(500)),
            Arc::new(StatsTracker::new()),
            throttle.clone(),
            Arc::new(ManualTimeSource::new(fixed_time())),
        );

        pipeline.process_batch(&valid_batch("burst", 10));
        let frame = parse(&observer.recv().await.unwrap());
        assert_eq!(frame["data"]["name"], "burst-9");
        assert_eq!(frame["data"]["stats"]["totalReceived"], 10);
        assert!(frame["data"]["receivedAt"].is_string());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(observer.try_recv().is_err());

        pipeline.process_batch(&valid_batch("next", 3));
        let frame = parse(&observer.recv().await.unwrap());
        assert_eq!(frame["data"]["name"], "next-2");
        assert_eq!(frame["data"]["stats"]["totalReceived"], 13);
        assert_eq!(frame["data"]["stats"]["totalProcessed"], 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_envelopes_never_broadcast() {
        let throttle = Arc::new(FanoutThrottle::new(16));
        let mut observer = throttle.subscribe();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _loop = throttle.spawn(Duration::from_millis(100), shutdown_rx);

        let pipeline = pipeline(
            Arc::new(InMemoryBucketStore::with_capacity(500)),
            Arc::new(StatsTracker::new()),
            throttle.clone(),
            Arc::new(ManualTimeSource::new(fixed_time())),
        );

        let report = pipeline.process_batch(&batch_of(&[tampered_envelope(), wrong_key_envelope()]));
        assert_eq!(report.rejected, 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(observer.try_recv().is_err());
    }
}
