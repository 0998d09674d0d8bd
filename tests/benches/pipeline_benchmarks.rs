//! # Telemetry Relay Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Crypto codec | envelope encrypt / decrypt |
//! | Integrity | tag recompute and compare |
//! | Pipeline | full batch at the producer's min and max sizes |
//! | Store | same-minute appends up to capacity |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use shared_crypto::{decrypt_record, encrypt_record, seal, validate_payload, validate_record};
use shared_types::StoredRecord;
use std::sync::Arc;
use std::time::Duration;
use tr_01_aggregation_store::{BucketStore, InMemoryBucketStore, SystemTimeSource, TimeSource};
use tr_02_ingest_pipeline::{NoopFanout, StatsTracker};
use tr_tests::integration::fixtures::{key, pipeline, valid_batch};

fn bench_crypto_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("crypto-codec");
    let key = key();
    let record = seal("Amara Okafor", "Lagos", "Tokyo");
    let envelope = encrypt_record(&key, &record).unwrap();

    group.bench_function("encrypt_record", |b| {
        b.iter(|| black_box(encrypt_record(&key, black_box(&record)).unwrap()))
    });
    group.bench_function("decrypt_record", |b| {
        b.iter(|| black_box(decrypt_record(&key, black_box(&envelope)).unwrap()))
    });
    group.bench_function("decrypt_and_validate", |b| {
        b.iter(|| {
            let payload = decrypt_record(&key, &envelope).unwrap();
            black_box(validate_payload(payload).is_ok())
        })
    });

    group.finish();
}

fn bench_integrity(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrity");
    let record = seal("Noah Müller", "Berlin", "Sydney");

    group.bench_function("validate_record", |b| {
        b.iter(|| black_box(validate_record(black_box(&record)).is_ok()))
    });
    group.bench_function("seal", |b| {
        b.iter(|| black_box(seal("Noah Müller", "Berlin", "Sydney")))
    });

    group.finish();
}

fn bench_process_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.measurement_time(Duration::from_secs(10));

    for size in [49usize, 499] {
        let batch = valid_batch("bench", size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("process_batch", size), &batch, |b, batch| {
            b.iter_batched(
                || {
                    pipeline(
                        Arc::new(InMemoryBucketStore::with_capacity(500)),
                        Arc::new(StatsTracker::new()),
                        Arc::new(NoopFanout),
                        Arc::new(SystemTimeSource),
                    )
                },
                |pipeline| black_box(pipeline.process_batch(batch)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_store_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation-store");
    let record = StoredRecord::new(seal("Mei Chen", "Tokyo", "Mumbai"), SystemTimeSource.now());

    group.throughput(Throughput::Elements(500));
    group.bench_function("append_until_full", |b| {
        b.iter_batched(
            || InMemoryBucketStore::with_capacity(500),
            |store| {
                for _ in 0..500 {
                    black_box(store.append(record.clone()).unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_crypto_codec,
    bench_integrity,
    bench_process_batch,
    bench_store_append,
);

criterion_main!(benches);
