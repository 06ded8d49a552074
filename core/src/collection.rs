//! The normalized client-side table for one resource type.

use crate::entity::Entity;
use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Named boolean flags describing what is currently happening to one item
/// (`{"composing": false, "deleting": true}`).
pub type StatusFlags = BTreeMap<String, bool>;

/// A failure recorded against one item and operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventError<K> {
    /// Operation that failed (`delete`, `checkPower`, ...)
    pub event: String,
    /// Item the operation targeted, if any
    pub id: Option<K>,
    /// Error reported by the backend
    pub error: SyncError,
}

/// Mirror of every entity of one resource type, plus request bookkeeping.
///
/// Collections are only changed through
/// [`CollectionReducer`](crate::sync::CollectionReducer); the fields are
/// public for reading and for building test fixtures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct Collection<E: Entity> {
    /// Items in insertion order, primary keys unique
    pub items: Vec<E>,
    /// A full fetch is in flight
    pub loading: bool,
    /// A full fetch has completed at least once
    pub loaded: bool,
    /// A mutating request is in flight
    pub saving: bool,
    /// The most recent mutating request succeeded
    pub saved: bool,
    /// Error from the most recent failed request
    pub errors: Option<SyncError>,
    /// Key of the active item, for resources that track one
    pub active: Option<E::Key>,
    /// Per-item status flags, for resources with status handlers
    pub statuses: HashMap<E::Key, StatusFlags>,
    /// Per-item failures, for resources that track event errors
    pub event_errors: Vec<EventError<E::Key>>,
    /// Lookup results by table, then by request param value
    #[serde(default)]
    pub lookups: BTreeMap<String, BTreeMap<String, Value>>,
}

impl<E: Entity> Default for Collection<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            loaded: false,
            saving: false,
            saved: false,
            errors: None,
            active: None,
            statuses: HashMap::new(),
            event_errors: Vec::new(),
            lookups: BTreeMap::new(),
        }
    }
}

impl<E: Entity> Collection<E> {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loaded collection holding `items`.
    ///
    /// Useful for fixtures. Items get default status records.
    #[must_use]
    pub fn with_items(items: Vec<E>) -> Self {
        let mut collection = Self {
            loaded: true,
            ..Self::default()
        };
        for item in items {
            collection.upsert(item);
        }
        collection
    }

    /// Resource model tag
    #[must_use]
    pub const fn model(&self) -> &'static str {
        E::MODEL
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection holds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item with the given primary key
    #[must_use]
    pub fn get(&self, key: &E::Key) -> Option<&E> {
        self.items.iter().find(|item| &item.key() == key)
    }

    /// Whether an item with the given primary key exists
    #[must_use]
    pub fn contains(&self, key: &E::Key) -> bool {
        self.position(key).is_some()
    }

    /// The active item, if one is set and present
    #[must_use]
    pub fn active_item(&self) -> Option<&E> {
        self.active.as_ref().and_then(|key| self.get(key))
    }

    /// Status flags for an item
    #[must_use]
    pub fn status(&self, key: &E::Key) -> Option<&StatusFlags> {
        self.statuses.get(key)
    }

    /// Whether any status flag is raised for the item
    #[must_use]
    pub fn is_busy(&self, key: &E::Key) -> bool {
        self.statuses
            .get(key)
            .is_some_and(|flags| flags.values().any(|raised| *raised))
    }

    /// Errors recorded against an item
    pub fn errors_for<'a>(&'a self, key: &'a E::Key) -> impl Iterator<Item = &'a EventError<E::Key>> {
        self.event_errors
            .iter()
            .filter(move |record| record.id.as_ref() == Some(key))
    }

    /// Stored lookup result (`lookup("projects", "10.0.0.2")`)
    #[must_use]
    pub fn lookup(&self, table: &str, key: &str) -> Option<&Value> {
        self.lookups.get(table)?.get(key)
    }

    /// Default status record for a newly seen item: every declared flag lowered
    #[must_use]
    pub fn default_status() -> StatusFlags {
        E::STATUS_HANDLERS
            .iter()
            .map(|handler| (handler.flag.to_string(), false))
            .collect()
    }

    pub(crate) fn position(&self, key: &E::Key) -> Option<usize> {
        self.items.iter().position(|item| &item.key() == key)
    }

    /// Insert or replace by primary key. Returns `true` when the item was new.
    pub(crate) fn upsert(&mut self, item: E) -> bool {
        let key = item.key();
        if let Some(index) = self.position(&key) {
            self.items[index] = item;
            false
        } else {
            self.items.push(item);
            if E::has_statuses() {
                self.statuses.entry(key).or_insert_with(Self::default_status);
            }
            true
        }
    }

    /// Remove by primary key, with its status record and active pointer.
    /// Returns the removed item.
    pub(crate) fn remove(&mut self, key: &E::Key) -> Option<E> {
        self.statuses.remove(key);
        if self.active.as_ref() == Some(key) {
            self.active = None;
        }
        self.position(key).map(|index| self.items.remove(index))
    }

    /// Replace every item, collapsing duplicate keys (last write wins in the
    /// position of the first occurrence) and reconciling status records.
    pub(crate) fn replace_all(&mut self, items: Vec<E>) {
        let previous = std::mem::take(&mut self.statuses);
        let mut positions: HashMap<E::Key, usize> = HashMap::with_capacity(items.len());
        self.items.clear();
        for item in items {
            let key = item.key();
            if let Some(&index) = positions.get(&key) {
                self.items[index] = item;
                continue;
            }
            positions.insert(key.clone(), self.items.len());
            self.items.push(item);
            if E::has_statuses() {
                let flags = previous.get(&key).cloned().unwrap_or_else(Self::default_status);
                self.statuses.insert(key, flags);
            }
        }
    }

    /// Raise or lower a status flag.
    ///
    /// Only items with a status record are tracked. The record appears with
    /// the item and goes with its delete notification, so a transition for a
    /// key that is not (or no longer) in `items` changes nothing.
    pub(crate) fn set_flag(&mut self, key: &E::Key, flag: &str, raised: bool) {
        if let Some(flags) = self.statuses.get_mut(key) {
            flags.insert(flag.to_string(), raised);
        }
    }

    /// Record a failure for `(event, id)`, replacing any earlier one.
    pub(crate) fn record_event_error(&mut self, event: &str, id: Option<E::Key>, error: SyncError) {
        self.event_errors
            .retain(|record| record.event != event || record.id != id);
        self.event_errors.push(EventError {
            event: event.to_string(),
            id,
            error,
        });
    }
}
