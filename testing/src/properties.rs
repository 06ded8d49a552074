//! Property-based testing utilities using proptest.
//!
//! Strategies draw keys from a small range so that generated sequences hit
//! the same items repeatedly.

use crate::fixtures::{TestPod, TestZone};
use entity_sync_core::action::{CollectionAction, Operation};
use entity_sync_core::event::{InboundEvent, NotifyKind};
use proptest::prelude::*;
use serde_json::json;

/// Keys used by the generated entities
pub const KEY_RANGE: std::ops::Range<u32> = 0..8;

/// An arbitrary zone
pub fn arb_zone() -> impl Strategy<Value = TestZone> {
    (KEY_RANGE, "[a-z]{1,6}").prop_map(|(id, name)| TestZone { id, name })
}

/// An arbitrary pod
pub fn arb_pod() -> impl Strategy<Value = TestPod> {
    (KEY_RANGE, "[a-z]{1,6}").prop_map(|(id, name)| TestPod { id, name })
}

/// A push notification for a zone
pub fn arb_zone_notify() -> impl Strategy<Value = CollectionAction<TestZone>> {
    prop_oneof![
        arb_zone().prop_map(CollectionAction::create_notify),
        arb_zone().prop_map(CollectionAction::update_notify),
        KEY_RANGE.prop_map(CollectionAction::delete_notify),
    ]
}

/// Any zone event: notifications, lifecycle transitions and cleanup
pub fn arb_zone_action() -> impl Strategy<Value = CollectionAction<TestZone>> {
    prop_oneof![
        3 => arb_zone_notify(),
        1 => Just(CollectionAction::fetch_start()),
        1 => prop::collection::vec(arb_zone(), 0..6).prop_map(CollectionAction::fetch_success),
        1 => Just(CollectionAction::fetch_error("fetch failed")),
        1 => arb_zone().prop_map(CollectionAction::get_success),
        1 => Just(CollectionAction::start(Operation::Create, None)),
        1 => Just(CollectionAction::success(Operation::Create, None)),
        1 => Just(CollectionAction::error(Operation::Update, None, "update failed")),
        1 => Just(CollectionAction::Cleanup),
    ]
}

/// Any pod event, including per-item status transitions
pub fn arb_pod_action() -> impl Strategy<Value = CollectionAction<TestPod>> {
    let operation = prop_oneof![
        Just(Operation::custom("compose")),
        Just(Operation::Delete),
        Just(Operation::custom("refresh")),
    ];
    prop_oneof![
        arb_pod().prop_map(CollectionAction::create_notify),
        arb_pod().prop_map(CollectionAction::update_notify),
        KEY_RANGE.prop_map(CollectionAction::delete_notify),
        (operation.clone(), KEY_RANGE).prop_map(|(op, id)| CollectionAction::start(op, Some(id))),
        (operation.clone(), KEY_RANGE).prop_map(|(op, id)| CollectionAction::success(op, Some(id))),
        (operation, KEY_RANGE).prop_map(|(op, id)| CollectionAction::error(op, Some(id), "failed")),
        prop::collection::vec(arb_pod(), 0..6).prop_map(CollectionAction::fetch_success),
    ]
}

/// A wire-level push event for `model`, shaped like a zone or pod
pub fn arb_notify_event(model: &'static str) -> impl Strategy<Value = InboundEvent> {
    prop_oneof![
        (KEY_RANGE, "[a-z]{1,6}").prop_map(move |(id, name)| {
            InboundEvent::notify(model, NotifyKind::Create, json!({"id": id, "name": name}))
        }),
        (KEY_RANGE, "[a-z]{1,6}").prop_map(move |(id, name)| {
            InboundEvent::notify(model, NotifyKind::Update, json!({"id": id, "name": name}))
        }),
        KEY_RANGE.prop_map(move |id| InboundEvent::notify(model, NotifyKind::Delete, json!(id))),
    ]
}
