//! Request lifecycle transitions: `Start → Success | Error`.
//!
//! Only `fetch`/`get`/`setActive` successes and custom successes carrying an
//! entity touch `items`. Create, update and delete successes only flip flags:
//! the authoritative copy of the item arrives in the matching notify event.
//! Lookup operations only write their table and `errors`.

use crate::action::{Operation, Payload};
use crate::collection::Collection;
use crate::entity::{Entity, Lookup};
use crate::error::SyncError;

/// Per-item status flag for `operation`, when the event identifies an item.
fn tracked_flag<E: Entity>(operation: &Operation, item: Option<&E::Key>) -> Option<&'static str> {
    item?;
    E::status_flag(operation.name())
}

/// Lookup declared for a custom operation
fn lookup<E: Entity>(operation: &Operation) -> Option<&'static Lookup> {
    match operation {
        Operation::Custom(name) => E::lookup(name),
        _ => None,
    }
}

/// Apply a `<operation>Start` event
pub fn start<E: Entity>(state: &mut Collection<E>, operation: &Operation, item: Option<&E::Key>) {
    if lookup::<E>(operation).is_some() {
        return;
    }
    state.errors = None;

    if let (Some(flag), Some(key)) = (tracked_flag::<E>(operation, item), item) {
        state.set_flag(key, flag, true);
        return;
    }

    match operation {
        Operation::Fetch | Operation::Get => state.loading = true,
        Operation::SetActive => {},
        Operation::Create | Operation::Update | Operation::Delete | Operation::Custom(_) => {
            state.saved = false;
            state.saving = true;
        },
    }
}

/// Apply a `<operation>Success` event
pub fn success<E: Entity>(
    state: &mut Collection<E>,
    operation: &Operation,
    item: Option<&E::Key>,
    payload: Payload<E>,
) {
    if let Some(lookup) = lookup::<E>(operation) {
        state.errors = None;
        if let Payload::Lookup { key: Some(key), value } = payload {
            state
                .lookups
                .entry(lookup.table.to_string())
                .or_default()
                .insert(key, value);
        }
        return;
    }

    match operation {
        Operation::Fetch => {
            state.loading = false;
            state.loaded = true;
            state.errors = None;
            match payload {
                Payload::Items(items) => state.replace_all(items),
                Payload::Item(single) => state.replace_all(vec![single]),
                Payload::None | Payload::Lookup { .. } => state.replace_all(Vec::new()),
            }
        },
        Operation::Get => {
            state.loading = false;
            state.errors = None;
            upsert_payload(state, payload);
        },
        Operation::SetActive => {
            state.active = match payload {
                Payload::Item(entity) => Some(entity.key()),
                Payload::None | Payload::Items(_) | Payload::Lookup { .. } => None,
            };
        },
        Operation::Create | Operation::Update | Operation::Delete | Operation::Custom(_) => {
            state.errors = None;
            if let (Some(flag), Some(key)) = (tracked_flag::<E>(operation, item), item) {
                state.set_flag(key, flag, false);
            } else {
                state.saving = false;
                state.saved = true;
            }
            if matches!(operation, Operation::Custom(_)) {
                upsert_payload(state, payload);
            }
        },
    }
}

/// Apply a `<operation>Error` event
pub fn error<E: Entity>(
    state: &mut Collection<E>,
    operation: &Operation,
    item: Option<&E::Key>,
    error: SyncError,
) {
    if E::TRACKS_EVENT_ERRORS {
        state.record_event_error(operation.name(), item.cloned(), error.clone());
    }

    match operation {
        _ if lookup::<E>(operation).is_some() => {},
        Operation::Fetch | Operation::Get => state.loading = false,
        Operation::SetActive => state.active = None,
        Operation::Create | Operation::Update | Operation::Delete | Operation::Custom(_) => {
            if let (Some(flag), Some(key)) = (tracked_flag::<E>(operation, item), item) {
                state.set_flag(key, flag, false);
            } else {
                state.saving = false;
                state.saved = false;
            }
        },
    }

    state.errors = Some(error);
}

/// Clear errors and save flags; leave items, load flags and active alone.
pub fn cleanup<E: Entity>(state: &mut Collection<E>) {
    state.errors = None;
    state.saving = false;
    state.saved = false;
    state.event_errors.clear();
}

fn upsert_payload<E: Entity>(state: &mut Collection<E>, payload: Payload<E>) {
    match payload {
        Payload::Item(entity) => {
            state.upsert(entity);
        },
        Payload::Items(items) => {
            for entity in items {
                state.upsert(entity);
            }
        },
        Payload::None | Payload::Lookup { .. } => {},
    }
}
