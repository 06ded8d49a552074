//! Site settings and organisational resources.

use entity_sync_core::action::Operation;
use entity_sync_core::envelope::{Envelope, EnvelopeBuilder};
use entity_sync_core::error::EnvelopeError;
use entity_sync_macros::Entity;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A configuration setting, keyed by name
#[derive(Entity, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Setting name (`maas_name`, `ntp_servers`, ...)
    #[primary_key]
    pub name: String,
    /// Current value
    pub value: Value,
    /// Allowed values, for settings with a fixed choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<(Value, String)>>,
}

impl Config {
    /// Update several settings in one user action.
    ///
    /// The backend takes one setting per `config.update` call, so this is a
    /// multi-call envelope: every setting is sent in order and the first
    /// rejection fails the whole form.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::EmptyBatch`] if `values` is empty.
    pub fn update<I, K>(values: I) -> Result<Envelope, EnvelopeError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let calls = values
            .into_iter()
            .map(|(name, value)| json!({ "name": name.into(), "value": value }))
            .collect();
        EnvelopeBuilder::<Self>::new().try_multiple(Operation::Update, calls)
    }
}

/// Machine tag
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Tag name
    pub name: String,
    /// XPath definition for automatic tags
    #[serde(default)]
    pub definition: String,
    /// Free-form comment
    #[serde(default)]
    pub comment: String,
}

/// Resource pool
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Pool name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Number of machines in the pool
    #[serde(default)]
    pub machine_total_count: u32,
}

/// DNS domain
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(active)]
pub struct Domain {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Domain name
    pub name: String,
    /// Whether MAAS is authoritative for the domain
    #[serde(default)]
    pub authoritative: bool,
    /// Default TTL in seconds
    pub ttl: Option<u32>,
}

impl Domain {
    /// Make this the default domain (`domain.set_default`)
    #[must_use]
    pub fn set_default(id: u32) -> Envelope {
        EnvelopeBuilder::<Self>::new().custom_item("setDefault", json!({ "id": id }))
    }
}
