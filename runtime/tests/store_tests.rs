//! Integration tests for the Store round trip
//!
//! Every test drives a real Store over a `MockTransport` and inspects the
//! registry afterwards.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use entity_sync_core::prelude::*;
use entity_sync_macros::Entity;
use entity_sync_runtime::{Store, StoreConfig, StoreError};
use entity_sync_testing::MockTransport;
use entity_sync_testing::fixtures::{TestMachine, TestPod, TestZone, test_registry};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Test Fixtures
// ============================================================================

const WAIT: Duration = Duration::from_secs(2);

/// Registered nowhere
#[allow(dead_code)] // Only used as a type parameter
#[derive(Entity, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[entity(model = "vlan")]
struct Vlan {
    #[primary_key]
    id: u32,
}

fn zones() -> EnvelopeBuilder<TestZone> {
    EnvelopeBuilder::new()
}

async fn zone_collection(store: &Store) -> Collection<TestZone> {
    store
        .state(|registry| registry.collection::<TestZone>().cloned())
        .await
        .expect("zone collection registered")
}

async fn send_and_wait(store: &Store, envelope: Envelope) {
    let mut handle = store.send(envelope).await.unwrap();
    handle.wait_with_timeout(WAIT).await.expect("round trip finished");
}

// ============================================================================
// Tests
// ============================================================================

/// A fetch round trip loads the collection
#[tokio::test]
async fn test_fetch_round_trip() {
    entity_sync_testing::init_test_tracing();
    let transport = MockTransport::new().respond(
        "zone.list",
        Ok(json!([{"id": 1, "name": "z1"}, {"id": 2, "name": "z2"}])),
    );
    let store = Store::new(test_registry(), transport.clone());

    send_and_wait(&store, zones().fetch()).await;

    let zones = zone_collection(&store).await;
    assert!(zones.loaded);
    assert!(!zones.loading);
    assert_eq!(zones.items, vec![TestZone::new(1, "z1"), TestZone::new(2, "z2")]);
    assert_eq!(transport.endpoints(), vec!["zone.list"]);
}

/// Create fails with a field error, cleanup clears it, items are untouched
#[tokio::test]
async fn test_create_error_then_cleanup() {
    let transport = MockTransport::new().respond(
        "zone.create",
        Err(SyncError::fields([("name", "Zone with this name already exists.")])),
    );
    let registry = test_registry();
    let store = Store::new(registry, transport);
    store
        .apply(InboundEvent::notify("zone", NotifyKind::Create, json!({"id": 1, "name": "z1"})))
        .await
        .unwrap();

    send_and_wait(&store, zones().create(json!({"name": "z1"}))).await;

    let after_error = zone_collection(&store).await;
    assert!(!after_error.saving);
    assert!(!after_error.saved);
    assert_eq!(
        after_error.errors.as_ref().map(|e| e.field("name")),
        Some(vec!["Zone with this name already exists."])
    );
    assert_eq!(after_error.len(), 1);

    store.apply(InboundEvent::new("zone/cleanup", Value::Null)).await.unwrap();

    let after_cleanup = zone_collection(&store).await;
    assert!(after_cleanup.errors.is_none());
    assert_eq!(after_cleanup.items, after_error.items);
}

/// A successful create flips save flags; the item itself arrives by notify
#[tokio::test]
async fn test_create_success_waits_for_notify() {
    let transport = MockTransport::new().respond("zone.create", Ok(json!({"id": 9, "name": "z9"})));
    let store = Store::new(test_registry(), transport);

    send_and_wait(&store, zones().create(json!({"name": "z9"}))).await;

    let zones = zone_collection(&store).await;
    assert!(zones.saved);
    assert!(!zones.saving);
    assert!(zones.is_empty());
}

/// The first failing sub-call stops the batch and fails the whole envelope
#[tokio::test]
async fn test_dispatch_multiple_fails_together() {
    let transport = MockTransport::new()
        .respond("zone.update", Ok(json!({"id": 1, "name": "a"})))
        .respond("zone.update", Err(SyncError::message("boom")))
        .respond("zone.update", Ok(json!({"id": 3, "name": "c"})));
    let store = Store::new(test_registry(), transport.clone());

    let envelope = zones().multiple(
        Operation::Update,
        vec![
            json!({"id": 1, "name": "a"}),
            json!({"id": 2, "name": "b"}),
            json!({"id": 3, "name": "c"}),
        ],
    );
    send_and_wait(&store, envelope).await;

    assert_eq!(transport.call_count("zone.update"), 2);
    assert_eq!(
        transport.calls()[1].params,
        Some(json!({"id": 2, "name": "b"}))
    );

    let zones = zone_collection(&store).await;
    assert!(!zones.saving);
    assert!(!zones.saved);
    assert_eq!(zones.errors, Some(SyncError::message("boom")));
}

/// All sub-calls succeeding saves the batch
#[tokio::test]
async fn test_dispatch_multiple_success() {
    let transport = MockTransport::new();
    let store = Store::new(test_registry(), transport.clone());

    let envelope = zones().multiple(
        Operation::Update,
        vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})],
    );
    send_and_wait(&store, envelope).await;

    assert_eq!(transport.call_count("zone.update"), 2);
    let zones = zone_collection(&store).await;
    assert!(zones.saved);
    assert!(zones.errors.is_none());
}

/// Push events are applied in delivery order; bad events are dropped
#[tokio::test]
async fn test_listen_applies_push_events() {
    let store = Store::new(test_registry(), MockTransport::new());
    let (tx, rx) = mpsc::channel(16);
    let listener = store.listen(rx);

    let events = vec![
        InboundEvent::notify("zone", NotifyKind::Create, json!({"id": 1, "name": "z1"})),
        InboundEvent::notify("zone", NotifyKind::Create, json!({"id": 2, "name": "z2"})),
        InboundEvent::new("not-an-event", Value::Null),
        InboundEvent::notify("vlan", NotifyKind::Create, json!({"id": 5})),
        InboundEvent::notify("zone", NotifyKind::Update, json!({"id": 1, "name": "z1-renamed"})),
        InboundEvent::notify("zone", NotifyKind::Delete, json!(2)),
        InboundEvent::notify("zone", NotifyKind::Delete, json!(42)),
    ];
    for event in events {
        tx.send(event).await.unwrap();
    }
    drop(tx);
    listener.await.unwrap();

    let zones = zone_collection(&store).await;
    assert_eq!(zones.items, vec![TestZone::new(1, "z1-renamed")]);
    assert!(zones.errors.is_none());
}

/// A notify arriving mid-request is applied without disturbing the request
#[tokio::test]
async fn test_push_during_request() {
    let transport = MockTransport::new().with_latency(Duration::from_millis(50));
    let store = Store::new(test_registry(), transport);

    let mut handle = store.send(zones().create(json!({"name": "z3"}))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(zone_collection(&store).await.saving);

    store
        .apply(InboundEvent::notify("zone", NotifyKind::Update, json!({"id": 7, "name": "other"})))
        .await
        .unwrap();
    assert!(zone_collection(&store).await.saving);

    handle.wait_with_timeout(WAIT).await.unwrap();
    let zones = zone_collection(&store).await;
    assert!(zones.saved);
    assert_eq!(zones.items, vec![TestZone::new(7, "other")]);
}

/// A response that does not decode becomes the request's error
#[tokio::test]
async fn test_undecodable_response_is_an_error() {
    let transport = MockTransport::new().respond("zone.list", Ok(json!({"unexpected": true})));
    let store = Store::new(test_registry(), transport);

    send_and_wait(&store, zones().fetch()).await;

    let zones = zone_collection(&store).await;
    assert!(!zones.loading);
    assert!(!zones.loaded);
    assert!(zones.errors.is_some());
}

/// setActive success points at the item; error clears the pointer
#[tokio::test]
async fn test_set_active_round_trips() {
    let machine = TestMachine::new("abc123", "node-1");
    let transport = MockTransport::new()
        .respond("machine.set_active", Ok(serde_json::to_value(&machine).unwrap()))
        .respond("machine.set_active", Err(SyncError::message("gone")));
    let store = Store::new(test_registry(), transport);
    let machines = EnvelopeBuilder::<TestMachine>::new();
    let key = "abc123".to_string();

    send_and_wait(&store, machines.set_active(Some(&key))).await;
    let active = store
        .state(|r| r.collection::<TestMachine>().and_then(|m| m.active.clone()))
        .await;
    assert_eq!(active, Some(key.clone()));

    send_and_wait(&store, machines.set_active(Some(&key))).await;
    let (active, recorded) = store
        .state(|r| {
            let machines = r.collection::<TestMachine>().unwrap();
            (machines.active.clone(), machines.errors_for(&key).count())
        })
        .await;
    assert_eq!(active, None);
    assert_eq!(recorded, 1);
}

/// Per-item status flags rise during the request and fall after it
#[tokio::test]
async fn test_status_flags_round_trip() {
    let transport = MockTransport::new().with_latency(Duration::from_millis(50));
    let store = Store::new(test_registry(), transport);
    store
        .apply(InboundEvent::notify("pod", NotifyKind::Create, json!({"id": 1, "name": "p1"})))
        .await
        .unwrap();

    let pods = EnvelopeBuilder::<TestPod>::new();
    let mut handle = store
        .send(pods.custom_item("compose", json!({"id": 1, "cores": 4})))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let composing = store
        .state(|r| r.collection::<TestPod>().is_some_and(|p| p.is_busy(&1)))
        .await;
    assert!(composing);

    handle.wait_with_timeout(WAIT).await.unwrap();
    let (busy, saving) = store
        .state(|r| {
            let pods = r.collection::<TestPod>().unwrap();
            (pods.is_busy(&1), pods.saving)
        })
        .await;
    assert!(!busy);
    assert!(!saving);
}

/// A list endpoint is requested once until `nocache` or a reset
#[tokio::test]
async fn test_list_requests_are_sent_once() {
    let transport = MockTransport::new()
        .respond("zone.list", Ok(json!([{"id": 1, "name": "z1"}])))
        .respond("zone.list", Ok(json!([{"id": 1, "name": "z1"}, {"id": 2, "name": "z2"}])))
        .with_latency(Duration::from_millis(20));
    let store = Store::new(test_registry(), transport.clone());
    let mut events = store.subscribe_events();

    // The second request is dropped while the first is still loading
    let mut first = store.send(zones().fetch()).await.unwrap();
    let second = store.send(zones().fetch()).await.unwrap();
    assert!(second.is_complete());
    first.wait_with_timeout(WAIT).await.unwrap();

    send_and_wait(&store, zones().fetch()).await;
    assert_eq!(transport.call_count("zone.list"), 1);
    assert_eq!(zone_collection(&store).await.len(), 1);

    let mut starts = 0;
    while let Ok(event) = events.try_recv() {
        if event.event_type == "zone/fetchStart" {
            starts += 1;
        }
    }
    assert_eq!(starts, 1);

    send_and_wait(&store, zones().fetch().no_cache()).await;
    assert_eq!(transport.call_count("zone.list"), 2);
    assert_eq!(zone_collection(&store).await.len(), 2);

    store.reset_loaded();
    send_and_wait(&store, zones().fetch()).await;
    assert_eq!(transport.call_count("zone.list"), 3);
}

/// `cache` extends the once-only rule to other methods
#[tokio::test]
async fn test_cached_get_is_sent_once() {
    let transport = MockTransport::new().always("zone.get", Ok(json!({"id": 1, "name": "z1"})));
    let store = Store::new(test_registry(), transport.clone());

    send_and_wait(&store, zones().get(&1).cached()).await;
    send_and_wait(&store, zones().get(&1).cached()).await;
    assert_eq!(transport.call_count("zone.get"), 1);

    send_and_wait(&store, zones().get(&1)).await;
    assert_eq!(transport.call_count("zone.get"), 2);
    assert_eq!(zone_collection(&store).await.items, vec![TestZone::new(1, "z1")]);
}

/// Polling repeats the call until stopped, and never runs twice per endpoint
#[tokio::test]
async fn test_polling_until_stopped() {
    let transport = MockTransport::new().always("pod.refresh", Ok(Value::Null));
    let config = StoreConfig::default().with_poll_interval(Duration::from_millis(20));
    let store = Store::with_config(test_registry(), transport.clone(), config);
    let pods = EnvelopeBuilder::<TestPod>::new();

    send_and_wait(&store, pods.custom("refresh", None).polling()).await;
    // Already polled: no second loop
    send_and_wait(&store, pods.custom("refresh", None).polling()).await;
    assert_eq!(store.polling(), vec!["pod.refresh".to_string()]);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(transport.call_count("pod.refresh") >= 3);

    send_and_wait(&store, pods.poll_stop("refresh", "refresh")).await;
    assert!(store.polling().is_empty());

    let stopped_at = transport.call_count("pod.refresh");
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(transport.call_count("pod.refresh"), stopped_at);
}

/// Envelopes for unregistered models are rejected before any call
#[tokio::test]
async fn test_unknown_model_rejected() {
    let transport = MockTransport::new();
    let store = Store::new(test_registry(), transport.clone());

    let result = store.send(EnvelopeBuilder::<Vlan>::new().fetch()).await;
    assert!(matches!(
        result,
        Err(StoreError::Registry(RegistryError::UnknownModel(ref model))) if model == "vlan"
    ));
    assert!(transport.calls().is_empty());
}

/// Shutdown rejects new envelopes and waits for in-flight ones
#[tokio::test]
async fn test_shutdown() {
    let transport = MockTransport::new().with_latency(Duration::from_millis(30));
    let store = Store::new(test_registry(), transport);

    let _handle = store.send(zones().fetch()).await.unwrap();
    store.shutdown(WAIT).await.unwrap();

    assert!(zone_collection(&store).await.loaded);
    assert!(matches!(
        store.send(zones().fetch()).await,
        Err(StoreError::ShutdownInProgress)
    ));
}

/// Shutdown gives up after its timeout
#[tokio::test]
async fn test_shutdown_timeout() {
    let transport = MockTransport::new().with_latency(Duration::from_millis(500));
    let store = Store::new(test_registry(), transport);

    let _handle = store.send(zones().fetch()).await.unwrap();
    let result = store.shutdown(Duration::from_millis(20)).await;
    assert!(matches!(result, Err(StoreError::ShutdownTimeout(1))));
}

/// The snapshot covers every registered model
#[tokio::test]
async fn test_snapshot() {
    let store = Store::new(test_registry(), MockTransport::new());
    store
        .apply(InboundEvent::notify("zone", NotifyKind::Create, json!({"id": 1, "name": "z1"})))
        .await
        .unwrap();

    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot["zone"]["items"], json!([{"id": 1, "name": "z1"}]));
    assert_eq!(snapshot["pod"]["items"], json!([]));
    assert_eq!(snapshot["machine"]["active"], Value::Null);
}
