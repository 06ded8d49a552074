//! Reducer benchmarks
//!
//! Reconciliation runs on every push event, so it must stay cheap as
//! collections grow:
//! - Notify upserts against a populated collection
//! - Fetch success replacing a large list
//! - Event routing through the registry
//!
//! Run with: `cargo bench --bench reconcile`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use entity_sync_core::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Subnet {
    id: u32,
    cidr: String,
}

impl Entity for Subnet {
    type Key = u32;
    const MODEL: &'static str = "subnet";
    const PRIMARY_KEY: &'static str = "id";

    fn key(&self) -> u32 {
        self.id
    }
}

fn subnets(count: u32) -> Vec<Subnet> {
    (0..count)
        .map(|id| Subnet {
            id,
            cidr: format!("10.{}.{}.0/24", id / 256, id % 256),
        })
        .collect()
}

/// Benchmark push reconciliation against collections of increasing size
fn benchmark_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify");
    group.throughput(Throughput::Elements(1));

    let reducer = CollectionReducer::<Subnet>::new();

    for size in [10_u32, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("update_existing", size), &size, |b, &size| {
            let mut state = Collection::with_items(subnets(size));
            let item = Subnet {
                id: size / 2,
                cidr: "192.168.0.0/24".to_string(),
            };
            b.iter(|| {
                let _effects = reducer.reduce(
                    &mut state,
                    black_box(CollectionAction::update_notify(item.clone())),
                    &(),
                );
            });
        });

        group.bench_with_input(BenchmarkId::new("create_then_delete", size), &size, |b, &size| {
            let mut state = Collection::with_items(subnets(size));
            let item = Subnet {
                id: size + 1,
                cidr: "192.168.0.0/24".to_string(),
            };
            b.iter(|| {
                let _created = reducer.reduce(&mut state, CollectionAction::create_notify(item.clone()), &());
                let _deleted = reducer.reduce(&mut state, CollectionAction::delete_notify(item.id), &());
            });
        });
    }

    group.finish();
}

/// Benchmark fetch success replacing the whole list
fn benchmark_fetch_success(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_success");
    let reducer = CollectionReducer::<Subnet>::new();

    for size in [100_u32, 1_000] {
        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let items = subnets(size);
            let mut state = Collection::new();
            b.iter(|| {
                let _effects = reducer.reduce(
                    &mut state,
                    CollectionAction::fetch_success(black_box(items.clone())),
                    &(),
                );
            });
        });
    }

    group.finish();
}

/// Benchmark decoding and routing a wire event through the registry
fn benchmark_registry_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    group.throughput(Throughput::Elements(1));

    let mut registry = Registry::new().with::<Subnet>().expect("register subnet");
    let event = InboundEvent::notify(
        "subnet",
        NotifyKind::Update,
        json!({"id": 7, "cidr": "172.16.0.0/24"}),
    );

    group.bench_function("apply_update_notify", |b| {
        b.iter(|| {
            let _effects = registry.apply_event(black_box(&event)).expect("apply");
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_notify,
    benchmark_fetch_success,
    benchmark_registry_routing,
);
criterion_main!(benches);
