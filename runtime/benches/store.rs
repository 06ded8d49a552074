//! Store benchmarks
//!
//! - Push event application through the registry write lock
//! - A full request round trip over an instant transport
//!
//! Run with: `cargo bench --bench store`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use entity_sync_core::prelude::*;
use entity_sync_runtime::Store;
use entity_sync_testing::MockTransport;
use entity_sync_testing::fixtures::{TestZone, test_registry};
use serde_json::json;

/// Benchmark applying push events
fn benchmark_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("update_notify", |b| {
        let store = Store::new(test_registry(), MockTransport::new());
        let event = InboundEvent::notify("zone", NotifyKind::Update, json!({"id": 1, "name": "z1"}));
        let (store, event) = (&store, &event);

        b.to_async(&runtime).iter(|| async move {
            store.apply(black_box(event.clone())).await.expect("apply");
        });
    });

    group.finish();
}

/// Benchmark a complete fetch round trip
fn benchmark_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("fetch", |b| {
        let transport = MockTransport::new().always("zone.list", Ok(json!([{"id": 1, "name": "z1"}])));
        let store = Store::new(test_registry(), transport);
        let store = &store;

        b.to_async(&runtime).iter(|| async move {
            let mut handle = store
                .send(black_box(EnvelopeBuilder::<TestZone>::new().fetch().no_cache()))
                .await
                .expect("send");
            handle.wait().await;
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_apply, benchmark_round_trip);
criterion_main!(benches);
