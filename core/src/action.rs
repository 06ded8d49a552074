//! Actions accepted by a collection reducer
//!
//! Every request follows the same three phases, `Start → Success | Error`,
//! named by the [`Operation`] it belongs to. Push notifications from the
//! backend are a separate family ([`Notification`]) so they can be applied
//! whatever local request happens to be in flight.

use crate::entity::Entity;
use crate::envelope::Envelope;
use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation a lifecycle event belongs to.
///
/// Serialized as its event-type name (`fetch`, `setActive`, `compose`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    /// Load the whole collection
    Fetch,
    /// Load a single item
    Get,
    /// Create an item
    Create,
    /// Update an item
    Update,
    /// Delete an item
    Delete,
    /// Set or clear the active item
    SetActive,
    /// A resource-specific operation (`compose`, `refresh`, `checkPower`, ...)
    Custom(String),
}

impl Operation {
    /// Name used in event types
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Fetch => "fetch",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SetActive => "setActive",
            Self::Custom(name) => name,
        }
    }

    /// Parse an operation from its event-type name
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "fetch" => Self::Fetch,
            "get" => Self::Get,
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "setActive" => Self::SetActive,
            other => Self::Custom(other.to_string()),
        }
    }

    /// A custom operation
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::parse(&name.into())
    }

    /// Remote method the backend exposes for this operation.
    ///
    /// Custom operations default to the snake_case form of their name
    /// (`getProjects` → `get_projects`).
    #[must_use]
    pub fn default_method(&self) -> String {
        match self {
            Self::Fetch => "list".to_string(),
            Self::SetActive => "set_active".to_string(),
            Self::Custom(name) => snake_case(name),
            other => other.name().to_string(),
        }
    }

    /// Whether the operation changes server state
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::Delete | Self::Custom(_)
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Operation {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<Operation> for String {
    fn from(operation: Operation) -> Self {
        operation.name().to_string()
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Phase of a request lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The request has been sent
    Start,
    /// The backend accepted the request
    Success,
    /// The backend rejected the request
    Error,
}

impl Phase {
    /// Suffix used in event types
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Success => "Success",
            Self::Error => "Error",
        }
    }
}

/// Data carried by a success event
#[derive(Clone, Debug, PartialEq)]
pub enum Payload<E> {
    /// Nothing (create/update/delete: the notify event carries the item)
    None,
    /// A single item (get, setActive, some custom operations)
    Item(E),
    /// The complete collection (fetch)
    Items(Vec<E>),
    /// A lookup result, keyed by the request param the lookup names
    Lookup {
        /// Value of the key param, if the request carried it
        key: Option<String>,
        /// Raw result
        value: serde_json::Value,
    },
}

/// A change pushed by the backend, originating from any client
#[derive(Clone, Debug, PartialEq)]
pub enum Notification<E: Entity> {
    /// An item was created
    Create(E),
    /// An item was updated
    Update(E),
    /// An item was deleted
    Delete(E::Key),
}

/// Everything a collection reducer can be asked to process
#[derive(Clone, Debug, PartialEq)]
pub enum CollectionAction<E: Entity> {
    /// Intent: hand an envelope to the transport. Does not change state.
    Dispatch(Envelope),

    /// A request was sent
    Start {
        /// Operation being performed
        operation: Operation,
        /// Item the request targets, if any
        item: Option<E::Key>,
    },

    /// A request succeeded
    Success {
        /// Operation being performed
        operation: Operation,
        /// Item the request targeted, if any
        item: Option<E::Key>,
        /// Returned data
        payload: Payload<E>,
    },

    /// A request failed
    Error {
        /// Operation being performed
        operation: Operation,
        /// Item the request targeted, if any
        item: Option<E::Key>,
        /// Error reported by the backend
        error: SyncError,
    },

    /// A push notification from the backend
    Notify(Notification<E>),

    /// Clear errors and save flags (typically when a view unmounts)
    Cleanup,
}

impl<E: Entity> CollectionAction<E> {
    /// `fetchStart`
    #[must_use]
    pub const fn fetch_start() -> Self {
        Self::Start {
            operation: Operation::Fetch,
            item: None,
        }
    }

    /// `fetchSuccess`
    #[must_use]
    pub const fn fetch_success(items: Vec<E>) -> Self {
        Self::Success {
            operation: Operation::Fetch,
            item: None,
            payload: Payload::Items(items),
        }
    }

    /// `fetchError`
    #[must_use]
    pub fn fetch_error(error: impl Into<SyncError>) -> Self {
        Self::error(Operation::Fetch, None, error)
    }

    /// `getSuccess`
    #[must_use]
    pub fn get_success(item: E) -> Self {
        Self::Success {
            operation: Operation::Get,
            item: Some(item.key()),
            payload: Payload::Item(item),
        }
    }

    /// `<operation>Start`
    #[must_use]
    pub const fn start(operation: Operation, item: Option<E::Key>) -> Self {
        Self::Start { operation, item }
    }

    /// `<operation>Success` with no payload
    #[must_use]
    pub const fn success(operation: Operation, item: Option<E::Key>) -> Self {
        Self::Success {
            operation,
            item,
            payload: Payload::None,
        }
    }

    /// `<operation>Error`
    #[must_use]
    pub fn error(operation: Operation, item: Option<E::Key>, error: impl Into<SyncError>) -> Self {
        Self::Error {
            operation,
            item,
            error: error.into(),
        }
    }

    /// `setActiveSuccess`; `None` clears the active pointer
    #[must_use]
    pub fn set_active_success(item: Option<E>) -> Self {
        Self::Success {
            operation: Operation::SetActive,
            item: item.as_ref().map(E::key),
            payload: item.map_or(Payload::None, Payload::Item),
        }
    }

    /// `createNotify`
    #[must_use]
    pub const fn create_notify(item: E) -> Self {
        Self::Notify(Notification::Create(item))
    }

    /// `updateNotify`
    #[must_use]
    pub const fn update_notify(item: E) -> Self {
        Self::Notify(Notification::Update(item))
    }

    /// `deleteNotify`
    #[must_use]
    pub const fn delete_notify(key: E::Key) -> Self {
        Self::Notify(Notification::Delete(key))
    }

    /// Short label for logs (`createStart`, `deleteNotify`, `cleanup`, ...)
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Dispatch(envelope) => format!("dispatch:{}", envelope.operation),
            Self::Start { operation, .. } => format!("{operation}{}", Phase::Start.suffix()),
            Self::Success { operation, .. } => format!("{operation}{}", Phase::Success.suffix()),
            Self::Error { operation, .. } => format!("{operation}{}", Phase::Error.suffix()),
            Self::Notify(Notification::Create(_)) => "createNotify".to_string(),
            Self::Notify(Notification::Update(_)) => "updateNotify".to_string(),
            Self::Notify(Notification::Delete(_)) => "deleteNotify".to_string(),
            Self::Cleanup => "cleanup".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::parse("setActive"), Operation::SetActive);
        assert_eq!(Operation::parse("fetch"), Operation::Fetch);
        assert_eq!(
            Operation::parse("checkPower"),
            Operation::Custom("checkPower".to_string())
        );
        assert_eq!(Operation::custom("delete"), Operation::Delete);
    }

    #[test]
    fn test_default_methods() {
        assert_eq!(Operation::Fetch.default_method(), "list");
        assert_eq!(Operation::SetActive.default_method(), "set_active");
        assert_eq!(Operation::Delete.default_method(), "delete");
        assert_eq!(Operation::custom("getProjects").default_method(), "get_projects");
        assert_eq!(Operation::custom("compose").default_method(), "compose");
    }

    #[test]
    fn test_mutations() {
        assert!(Operation::Create.is_mutation());
        assert!(Operation::custom("clone").is_mutation());
        assert!(!Operation::Fetch.is_mutation());
        assert!(!Operation::SetActive.is_mutation());
    }
}
