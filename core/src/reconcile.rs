//! Push reconciliation: fold backend notifications into a collection.
//!
//! Notifications never touch `loading`, `loaded`, `saving`, `saved` or
//! `errors`, so a local request can be in flight while another client's change
//! to the same collection is applied. Both notify and lifecycle transitions
//! reduce to insert-or-replace or remove by primary key, so they commute.

use crate::action::Notification;
use crate::collection::Collection;
use crate::entity::Entity;

/// Apply a push notification
pub fn notify<E: Entity>(state: &mut Collection<E>, notification: Notification<E>) {
    match notification {
        // Create and update are both upserts: a create can race a local
        // success path, and an update may be the first we hear of an item.
        Notification::Create(item) | Notification::Update(item) => {
            state.upsert(item);
        },
        Notification::Delete(key) => {
            state.remove(&key);
        },
    }
}
