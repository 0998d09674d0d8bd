//! Pipeline, store and stats working together.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::*;
    use chrono::TimeDelta;
    use shared_types::MinuteKey;
    use std::sync::Arc;
    use tokio::sync::watch;
    use tr_01_aggregation_store::{
        BucketStore, InMemoryBucketStore, ManualTimeSource, RetentionSweeper, DEFAULT_RETENTION,
    };
    use tr_02_ingest_pipeline::{spawn_ingest_dispatcher, NoopFanout, PipelineError, StatsTracker};

    fn memory_store(capacity: usize) -> Arc<InMemoryBucketStore> {
        Arc::new(InMemoryBucketStore::with_capacity(capacity))
    }

    #[test]
    fn test_mixed_batch_end_to_end() {
        let store = memory_store(500);
        let stats = Arc::new(StatsTracker::new());
        let fanout = Arc::new(RecordingFanout::default());
        let clock = Arc::new(ManualTimeSource::new(fixed_time()));
        let pipeline = pipeline(store.clone(), stats.clone(), fanout.clone(), clock);

        let mut envelopes: Vec<String> = (0..20).map(|i| valid_envelope(&format!("r{i}"))).collect();
        envelopes.insert(3, tampered_envelope());
        envelopes.insert(10, wrong_key_envelope());
        envelopes.push("not-an-envelope".into());

        let report = pipeline.process_batch(&batch_of(&envelopes));
        assert_eq!(report.received, 23);
        assert_eq!(report.accepted, 20);
        assert_eq!(report.rejected, 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_received, 23);
        assert_eq!(snapshot.total_processed, 20);
        assert_eq!(snapshot.total_errors, 3);
        assert_eq!(snapshot.success_rate, 86.96);

        let bucket = store
            .bucket(MinuteKey::from_datetime(fixed_time()))
            .unwrap()
            .unwrap();
        assert_eq!(bucket.count, 20);
        assert_eq!(bucket.data.len(), 20);
        assert_eq!(bucket.data[0].record.name, "r0");

        let offers = fanout.offers();
        assert_eq!(offers.len(), 20);
        // Every offer sees the batch's envelopes as received.
        assert!(offers.iter().all(|o| o.stats.total_received == 23));
    }

    #[test]
    fn test_rejection_reasons() {
        let store = memory_store(500);
        let stats = Arc::new(StatsTracker::new());
        let clock = Arc::new(ManualTimeSource::new(fixed_time()));
        let pipeline = pipeline(store.clone(), stats, Arc::new(NoopFanout), clock);

        let decrypt = pipeline.process_envelope("zz:yy").unwrap_err();
        assert!(matches!(decrypt, PipelineError::Decrypt(_)));
        let tampered = pipeline.process_envelope(&tampered_envelope()).unwrap_err();
        assert_eq!(tampered.reason(), "validation");
        assert_eq!(store.bucket_count().unwrap(), 0);
    }

    #[test]
    fn test_full_bucket_drops_excess() {
        let store = memory_store(5);
        let stats = Arc::new(StatsTracker::new());
        let fanout = Arc::new(RecordingFanout::default());
        let clock = Arc::new(ManualTimeSource::new(fixed_time()));
        let pipeline = pipeline(store.clone(), stats.clone(), fanout.clone(), clock);

        let report = pipeline.process_batch(&valid_batch("cap", 8));
        assert_eq!(report.accepted, 8);
        assert_eq!(report.dropped_at_capacity, 3);

        let bucket = store
            .bucket(MinuteKey::from_datetime(fixed_time()))
            .unwrap()
            .unwrap();
        assert_eq!(bucket.count, 5);
        assert_eq!(stats.snapshot().total_processed, 8);
        assert_eq!(fanout.offers().len(), 8);
        assert_eq!(store.bucket_count().unwrap(), 1);
    }

    #[test]
    fn test_minute_rollover_opens_new_bucket() {
        let store = memory_store(500);
        let clock = Arc::new(ManualTimeSource::new(fixed_time()));
        let pipeline = pipeline(
            store.clone(),
            Arc::new(StatsTracker::new()),
            Arc::new(NoopFanout),
            clock.clone(),
        );

        pipeline.process_batch(&valid_batch("a", 3));
        clock.advance(TimeDelta::seconds(30));
        pipeline.process_batch(&valid_batch("b", 2));

        let buckets = store
            .buckets_since(MinuteKey::from_datetime(fixed_time()))
            .unwrap();
        let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![3, 2]);
    }

    #[test]
    fn test_concurrent_batches_same_minute() {
        let store = memory_store(500);
        let stats = Arc::new(StatsTracker::new());
        let clock = Arc::new(ManualTimeSource::new(fixed_time()));
        let pipeline = Arc::new(pipeline(
            store.clone(),
            stats.clone(),
            Arc::new(NoopFanout),
            clock,
        ));

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let pipeline = pipeline.clone();
                let batch = valid_batch(&format!("w{worker}"), 30);
                std::thread::spawn(move || pipeline.process_batch(&batch))
            })
            .collect();
        for worker in workers {
            assert_eq!(worker.join().unwrap().accepted, 30);
        }

        let bucket = store
            .bucket(MinuteKey::from_datetime(fixed_time()))
            .unwrap()
            .unwrap();
        assert_eq!(bucket.count, 120);
        assert_eq!(bucket.data.len(), 120);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_received, 120);
        assert_eq!(snapshot.total_processed, 120);
        assert_eq!(snapshot.success_rate, 100.0);
    }

    #[test]
    fn test_concurrent_batches_respect_capacity() {
        let store = memory_store(50);
        let clock = Arc::new(ManualTimeSource::new(fixed_time()));
        let pipeline = Arc::new(pipeline(
            store.clone(),
            Arc::new(StatsTracker::new()),
            Arc::new(NoopFanout),
            clock,
        ));

        let workers: Vec<_> = (0..3)
            .map(|worker| {
                let pipeline = pipeline.clone();
                let batch = valid_batch(&format!("w{worker}"), 40);
                std::thread::spawn(move || pipeline.process_batch(&batch))
            })
            .collect();
        let dropped: u64 = workers
            .into_iter()
            .map(|w| w.join().unwrap().dropped_at_capacity)
            .sum();

        let bucket = store
            .bucket(MinuteKey::from_datetime(fixed_time()))
            .unwrap()
            .unwrap();
        assert_eq!(bucket.count, 50);
        assert_eq!(dropped, 70);
    }

    #[test]
    fn test_retention_sweep_after_thirty_days() {
        let store = memory_store(500);
        let clock = Arc::new(ManualTimeSource::new(fixed_time()));
        let pipeline = pipeline(
            store.clone(),
            Arc::new(StatsTracker::new()),
            Arc::new(NoopFanout),
            clock.clone(),
        );
        let sweeper = RetentionSweeper::new(store.clone(), clock.clone(), DEFAULT_RETENTION);

        pipeline.process_batch(&valid_batch("old", 4));
        clock.advance(TimeDelta::days(29));
        assert_eq!(sweeper.sweep_once().unwrap(), 0);

        clock.advance(TimeDelta::days(2));
        pipeline.process_batch(&valid_batch("new", 2));
        assert_eq!(sweeper.sweep_once().unwrap(), 1);

        assert_eq!(store.bucket_count().unwrap(), 1);
        assert!(store
            .bucket(MinuteKey::from_datetime(fixed_time()))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_dispatcher_drains_on_shutdown() {
        let store = memory_store(500);
        let stats = Arc::new(StatsTracker::new());
        let clock = Arc::new(ManualTimeSource::new(fixed_time()));
        let pipeline = pipeline(store.clone(), stats.clone(), Arc::new(NoopFanout), clock);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, task) = spawn_ingest_dispatcher(pipeline, 8, shutdown_rx);
        for i in 0..3 {
            handle.submit(valid_batch(&format!("b{i}"), 5)).await.unwrap();
        }
        handle
            .submit(batch_of(&[tampered_envelope()]))
            .await
            .unwrap();

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_received, 16);
        assert_eq!(snapshot.total_processed, 15);
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(store.bucket_count().unwrap(), 1);
        assert!(handle.submit(valid_batch("late", 1)).await.is_err());
    }
}
