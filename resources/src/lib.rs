//! # Entity Sync Resources
//!
//! The resource catalogue of the console: every record type the backend
//! synchronizes, declared with `#[derive(Entity)]`, plus the application
//! [`registry`] composing one collection per type.
//!
//! Resource-specific requests (composing on a pod, deploying a machine,
//! saving a settings form) are associated functions on the entity types and
//! return envelopes ready for [`Store::send`](https://docs.rs/entity-sync-runtime).
//!
//! ## Example
//!
//! ```ignore
//! use entity_sync_resources::{registry, Machine};
//!
//! let store = Store::new(registry()?, transport);
//! store.send(Machine::action("deploy", "abc123", json!({}))).await?;
//! ```

use entity_sync_core::error::RegistryError;
use entity_sync_core::registry::Registry;

pub mod accounts;
pub mod network;
pub mod nodes;
pub mod settings;

pub use accounts::{Token, User};
pub use network::{Fabric, Space, Subnet, Vlan, Zone};
pub use nodes::{Controller, Device, Machine, Pod, PodProject};
pub use settings::{Config, Domain, ResourcePool, Tag};

/// Model tags of every resource in the catalogue, sorted
pub const MODELS: [&str; 15] = [
    "config",
    "controller",
    "device",
    "domain",
    "fabric",
    "machine",
    "pod",
    "resourcepool",
    "space",
    "subnet",
    "tag",
    "token",
    "user",
    "vlan",
    "zone",
];

/// Build the application registry: one collection per catalogue resource.
///
/// # Errors
///
/// [`RegistryError::DuplicateModel`] if two catalogue types claim the same
/// model tag.
pub fn registry() -> Result<Registry, RegistryError> {
    let registry = Registry::new()
        .with::<Zone>()?
        .with::<Fabric>()?
        .with::<Vlan>()?
        .with::<Subnet>()?
        .with::<Space>()?
        .with::<Tag>()?
        .with::<ResourcePool>()?
        .with::<Domain>()?
        .with::<User>()?
        .with::<Token>()?
        .with::<Config>()?
        .with::<Pod>()?
        .with::<Device>()?
        .with::<Machine>()?
        .with::<Controller>()?;

    tracing::debug!(models = MODELS.len(), "Resource registry built");
    Ok(registry)
}
