use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use slated_core::OwnerId;
use slated_engine::{InMemoryJobStore, Job, JobStatus, JobStore, RetryPolicy};

fn bench_retry_delay(c: &mut Criterion) {
    let fixed = RetryPolicy::fixed(3, Duration::from_secs(60));
    let expo = RetryPolicy::exponential(10, Duration::from_millis(100), Duration::from_secs(60));

    let mut group = c.benchmark_group("retry_delay");
    group.bench_function("fixed", |b| {
        b.iter(|| black_box(fixed.delay_for_retry(black_box(3))))
    });
    group.bench_function("exponential", |b| {
        b.iter(|| black_box(expo.delay_for_retry(black_box(7))))
    });
    group.finish();
}

fn bench_store_cas(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");

    let store = Arc::new(InMemoryJobStore::new());
    let owner = OwnerId::new();
    let ids: Vec<_> = rt.block_on(async {
        let mut ids = Vec::with_capacity(1024);
        for i in 0..1024 {
            let job = Job::new(
                owner,
                format!("job-{i}"),
                "",
                Utc::now() + chrono::Duration::hours(1),
            )
            .unwrap();
            ids.push(store.create(job).await.unwrap());
        }
        ids
    });

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));
    let mut i = 0usize;
    group.bench_function("cas_lost_race", |b| {
        // Expected status never matches, so every call takes the reject path.
        b.iter(|| {
            let id = ids[i % ids.len()];
            i += 1;
            rt.block_on(store.compare_and_set_status(
                id,
                JobStatus::InProgress,
                JobStatus::Completed,
            ))
            .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_retry_delay, bench_store_cas);
criterion_main!(benches);
