//! Small entities covering each collection feature.
//!
//! - [`TestZone`]: plain collection, numeric key
//! - [`TestPod`]: active pointer plus per-item statuses
//! - [`TestMachine`]: string key, active pointer, per-item event errors

use entity_sync_core::registry::Registry;
use entity_sync_macros::Entity;
use serde::{Deserialize, Serialize};

/// Plain resource with a numeric key
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(model = "zone")]
pub struct TestZone {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Display name
    pub name: String,
}

impl TestZone {
    /// A zone
    #[must_use]
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

/// Resource with an active pointer and per-item statuses
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(
    model = "pod",
    active,
    status(compose = "composing", delete = "deleting", refresh = "refreshing")
)]
pub struct TestPod {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Display name
    pub name: String,
}

impl TestPod {
    /// A pod
    #[must_use]
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

/// Resource with a string key and per-item event errors
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(model = "machine", active, event_errors)]
pub struct TestMachine {
    /// Primary key
    #[primary_key]
    pub system_id: String,
    /// Host name
    pub hostname: String,
}

impl TestMachine {
    /// A machine
    #[must_use]
    pub fn new(system_id: &str, hostname: &str) -> Self {
        Self {
            system_id: system_id.to_string(),
            hostname: hostname.to_string(),
        }
    }
}

/// A registry with every fixture entity registered
///
/// # Panics
///
/// Never in practice: the fixture models are distinct.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_registry() -> Registry {
    Registry::new()
        .with::<TestZone>()
        .and_then(Registry::with::<TestPod>)
        .and_then(Registry::with::<TestMachine>)
        .expect("fixture models are distinct")
}
