//! The `Entity` trait: what a record must declare to be synchronized.
//!
//! Every resource type (zones, fabrics, pods, machines, ...) instantiates the
//! same generic collection, reducers and envelope builder. The only things
//! that differ per resource are captured here: the primary key, the model tag
//! the backend knows it by, and which optional collection features it uses.
//!
//! Implement it by hand or with `#[derive(Entity)]` from `entity-sync-macros`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;

/// Maps an operation to the per-item status flag it raises while in flight.
///
/// For a pod, `compose` raises `composing` and `delete` raises `deleting`:
/// the view can show that one item is busy without blocking the rest of the
/// collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusHandler {
    /// Operation name as it appears in event types (`compose`, `delete`, ...)
    pub operation: &'static str,
    /// Flag set while the operation is running (`composing`, `deleting`, ...)
    pub flag: &'static str,
}

impl StatusHandler {
    /// Declare a status handler
    #[must_use]
    pub const fn new(operation: &'static str, flag: &'static str) -> Self {
        Self { operation, flag }
    }
}

/// An operation whose result is kept beside the items instead of in them.
///
/// Asking an LXD server for its projects answers with a list that is not a
/// pod: it is stored in the collection's `projects` table under the requested
/// address. Lookups never touch `saving`/`saved` and their start is a no-op,
/// so a lookup repeated by a poll cannot disturb a create in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lookup {
    /// Operation name as it appears in event types (`getProjects`)
    pub operation: &'static str,
    /// Table the result is stored in (`projects`)
    pub table: &'static str,
    /// Request param whose value keys the result (`power_address`)
    pub key_param: &'static str,
}

impl Lookup {
    /// Declare a lookup
    #[must_use]
    pub const fn new(operation: &'static str, table: &'static str, key_param: &'static str) -> Self {
        Self {
            operation,
            table,
            key_param,
        }
    }
}

/// A server-owned record identified by a primary key.
///
/// # Example
///
/// ```
/// use entity_sync_core::entity::{Entity, StatusHandler};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct Pod {
///     id: u32,
///     name: String,
/// }
///
/// impl Entity for Pod {
///     type Key = u32;
///     const MODEL: &'static str = "pod";
///     const PRIMARY_KEY: &'static str = "id";
///     const TRACKS_ACTIVE: bool = true;
///     const STATUS_HANDLERS: &'static [StatusHandler] = &[
///         StatusHandler::new("compose", "composing"),
///         StatusHandler::new("delete", "deleting"),
///     ];
///
///     fn key(&self) -> u32 {
///         self.id
///     }
/// }
///
/// assert_eq!(Pod::status_flag("compose"), Some("composing"));
/// assert_eq!(Pod::status_flag("refresh"), None);
/// ```
pub trait Entity:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Primary key type
    type Key: Clone + Debug + Eq + Hash + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Resource model tag, as used by the backend (`zone`, `vlan`, ...)
    const MODEL: &'static str;

    /// Name of the primary key field (`id`, `system_id`, `name`, ...)
    const PRIMARY_KEY: &'static str;

    /// Whether the collection keeps an "active" pointer
    const TRACKS_ACTIVE: bool = false;

    /// Operations tracked per item rather than collection-wide
    const STATUS_HANDLERS: &'static [StatusHandler] = &[];

    /// Whether failures are also recorded per item and operation
    const TRACKS_EVENT_ERRORS: bool = false;

    /// Operations whose results are stored by request param
    const LOOKUPS: &'static [Lookup] = &[];

    /// Primary key of this record
    fn key(&self) -> Self::Key;

    /// Flag raised by `operation`, if it is tracked per item
    #[must_use]
    fn status_flag(operation: &str) -> Option<&'static str> {
        Self::STATUS_HANDLERS
            .iter()
            .find(|handler| handler.operation == operation)
            .map(|handler| handler.flag)
    }

    /// Lookup declared for `operation`, if any
    #[must_use]
    fn lookup(operation: &str) -> Option<&'static Lookup> {
        Self::LOOKUPS.iter().find(|lookup| lookup.operation == operation)
    }

    /// Whether the collection keeps a status record per item
    #[must_use]
    fn has_statuses() -> bool {
        !Self::STATUS_HANDLERS.is_empty()
    }
}
