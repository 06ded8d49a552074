//! Error types for entity synchronization
//!
//! Two different kinds of failure live here:
//!
//! - [`SyncError`]: a remote operation failed. This is *data*: it is stored in
//!   a collection's `errors` slot and never propagated as a Rust error.
//! - [`EnvelopeError`] / [`RegistryError`]: the caller broke a contract
//!   (malformed envelope, unknown model, undecodable event).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Error payload for a single form field: one message or a list of messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldError {
    /// A single message
    One(String),
    /// Several messages for the same field
    Many(Vec<String>),
}

impl FieldError {
    /// All messages for this field, in order
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        match self {
            Self::One(message) => vec![message.as_str()],
            Self::Many(messages) => messages.iter().map(String::as_str).collect(),
        }
    }
}

/// Error reported by the backend for a remote operation.
///
/// The wire format is either a bare string or a map of field name to one or
/// more messages, so the enum is untagged.
///
/// # Example
///
/// ```
/// use entity_sync_core::error::SyncError;
///
/// let plain: SyncError = serde_json::from_str(r#""name taken""#).unwrap();
/// assert_eq!(plain, SyncError::message("name taken"));
///
/// let fields: SyncError = serde_json::from_str(r#"{"name": ["too short", "invalid"]}"#).unwrap();
/// assert_eq!(fields.field("name"), vec!["too short", "invalid"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncError {
    /// A plain error message
    Message(String),
    /// Errors keyed by the field they relate to
    FieldErrors(BTreeMap<String, FieldError>),
}

impl SyncError {
    /// Create a plain message error
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Create a field error map from `(field, message)` pairs
    #[must_use]
    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::FieldErrors(
            pairs
                .into_iter()
                .map(|(field, message)| (field.into(), FieldError::One(message.into())))
                .collect(),
        )
    }

    /// Messages recorded against `field`, empty for plain message errors
    #[must_use]
    pub fn field(&self, field: &str) -> Vec<&str> {
        match self {
            Self::Message(_) => Vec::new(),
            Self::FieldErrors(map) => map.get(field).map(FieldError::messages).unwrap_or_default(),
        }
    }

    /// Build an error from an arbitrary JSON value.
    ///
    /// Strings and field maps decode as-is; anything else (numbers, arrays,
    /// maps with non-string values) is kept as its JSON text.
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Self {
        match serde_json::from_value::<Self>(value.clone()) {
            Ok(error) => error,
            Err(_) => Self::Message(value.to_string()),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::FieldErrors(map) => {
                let mut first = true;
                for (field, error) in map {
                    for message in error.messages() {
                        if !first {
                            f.write_str("; ")?;
                        }
                        write!(f, "{field}: {message}")?;
                        first = false;
                    }
                }
                Ok(())
            },
        }
    }
}

impl From<&str> for SyncError {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<String> for SyncError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

/// Contract violations when building an [`Envelope`](crate::envelope::Envelope).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The operation addresses a single item but its params carry no primary key
    #[error("{model}.{method} requires `{primary_key}` in its params")]
    MissingPrimaryKey {
        /// Resource model tag
        model: &'static str,
        /// Remote method
        method: String,
        /// Name of the primary key field
        primary_key: &'static str,
    },

    /// Params must be a JSON object for this operation
    #[error("{model}.{method} expects object params, got {found}")]
    InvalidParams {
        /// Resource model tag
        model: &'static str,
        /// Remote method
        method: String,
        /// JSON type that was supplied
        found: &'static str,
    },

    /// A multi-call envelope was built with no sub-calls
    #[error("{model}.{method} was marked dispatch-multiple with no params")]
    EmptyBatch {
        /// Resource model tag
        model: &'static str,
        /// Remote method
        method: String,
    },
}

/// Errors raised while routing an inbound event through the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No collection is registered for the model
    #[error("no collection registered for model `{0}`")]
    UnknownModel(String),

    /// The model is registered, but for a different entity type
    #[error("model `{model}` is registered as `{registered}`, not `{requested}`")]
    TypeMismatch {
        /// Model tag both types claim
        model: &'static str,
        /// Entity type the collection was registered with
        registered: &'static str,
        /// Entity type the caller asked for
        requested: &'static str,
    },

    /// A collection for the model already exists
    #[error("a collection for model `{0}` is already registered")]
    DuplicateModel(&'static str),

    /// The event type string does not follow `<model>/<operation><Phase>`
    #[error("malformed event type `{0}`")]
    MalformedEventType(String),

    /// The payload did not decode into the shape the event requires
    #[error("could not decode payload for `{event}`: {source}")]
    Payload {
        /// The event type being decoded
        event: String,
        /// Underlying decode failure
        #[source]
        source: serde_json::Error,
    },

    /// The collection state could not be rendered as JSON
    #[error("could not serialize collection `{model}`: {source}")]
    Snapshot {
        /// Model whose state failed to serialize
        model: &'static str,
        /// Underlying serialization failure
        #[source]
        source: serde_json::Error,
    },
}

/// JSON type name, for error messages
pub(crate) const fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
