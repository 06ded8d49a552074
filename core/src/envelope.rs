//! Action envelopes: the only contract between the core and the transport.
//!
//! An [`Envelope`] says *which* remote method to call on *which* model with
//! *which* params. The transport performs the call and answers with
//! `<model>/<operation>Start|Success|Error` events.
//!
//! [`EnvelopeBuilder`] produces envelopes for one entity type. It is pure: the
//! only failure is a contract violation (an operation that addresses one item
//! built without that item's primary key), which panics in the plain builder
//! methods and is returned as [`EnvelopeError`] by the `try_*` variants.

use crate::action::Operation;
use crate::entity::Entity;
use crate::error::{EnvelopeError, json_type};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::marker::PhantomData;

/// Transport directive for one user intent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Resource model tag (`zone`, `machine`, ...)
    pub resource_model: String,
    /// Remote method (`list`, `create`, `set_active`, ...)
    pub remote_method: String,
    /// Operation the answering events are named after
    pub operation: Operation,
    /// Call params; an array of sub-call params when `dispatch_multiple` is set
    pub params: Option<Value>,
    /// `params` is a sequence of independent sub-calls
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dispatch_multiple: bool,
    /// Repeat the call on an interval until a matching `poll_stop` arrives
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub poll: bool,
    /// Stop polling `resource_model.remote_method`; never sent to the backend
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub poll_stop: bool,
    /// Skip the call if the endpoint was already requested, whatever the method
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cache: bool,
    /// Always call a list endpoint, even if it was already requested
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nocache: bool,
}

impl Envelope {
    /// Endpoint name the backend dispatches on (`zone.create`)
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}.{}", self.resource_model, self.remote_method)
    }

    /// Params of each remote call this envelope stands for
    #[must_use]
    pub fn sub_calls(&self) -> Vec<Option<Value>> {
        match (&self.params, self.dispatch_multiple) {
            (Some(Value::Array(calls)), true) => calls.iter().cloned().map(Some).collect(),
            (params, _) => vec![params.clone()],
        }
    }

    /// Mark the envelope as a polling request
    #[must_use]
    pub fn polling(mut self) -> Self {
        self.poll = true;
        self
    }

    /// Call the endpoint at most once until the loaded set is reset
    #[must_use]
    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }

    /// Re-send a list request even if the endpoint was already loaded
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.nocache = true;
        self
    }

    /// Whether the call is skipped once its endpoint is loaded or loading.
    ///
    /// List methods are, unless `nocache` is set or the params ask for a
    /// page (`start`). Any method is when `cache` is set.
    #[must_use]
    pub fn deduplicated(&self) -> bool {
        if self.cache {
            return true;
        }
        if self.nocache || !self.remote_method.ends_with("list") {
            return false;
        }
        match &self.params {
            Some(Value::Array(_)) => self.dispatch_multiple,
            Some(Value::Object(params)) => !params.get("start").is_some_and(is_truthy),
            _ => true,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Builds envelopes for one entity type
///
/// # Example
///
/// ```
/// use entity_sync_core::envelope::EnvelopeBuilder;
/// use entity_sync_core::entity::Entity;
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct Zone { id: u32, name: String }
///
/// impl Entity for Zone {
///     type Key = u32;
///     const MODEL: &'static str = "zone";
///     const PRIMARY_KEY: &'static str = "id";
///     fn key(&self) -> u32 { self.id }
/// }
///
/// let envelope = EnvelopeBuilder::<Zone>::new().update(json!({"id": 1, "name": "z1"}));
/// assert_eq!(envelope.endpoint(), "zone.update");
/// ```
#[derive(Debug)]
pub struct EnvelopeBuilder<E: Entity> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for EnvelopeBuilder<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: Entity> Copy for EnvelopeBuilder<E> {}

impl<E: Entity> Default for EnvelopeBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EnvelopeBuilder<E> {
    /// Builder for `E`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }

    fn envelope(operation: Operation, method: String, params: Option<Value>) -> Envelope {
        Envelope {
            resource_model: E::MODEL.to_string(),
            remote_method: method,
            operation,
            params,
            dispatch_multiple: false,
            poll: false,
            poll_stop: false,
            cache: false,
            nocache: false,
        }
    }

    fn key_params(key: &E::Key) -> Value {
        let mut params = serde_json::Map::new();
        params.insert(E::PRIMARY_KEY.to_string(), json!(key));
        Value::Object(params)
    }

    /// Fetch the whole collection (`<model>.list`)
    #[must_use]
    pub fn fetch(&self) -> Envelope {
        Self::envelope(Operation::Fetch, Operation::Fetch.default_method(), None)
    }

    /// Fetch one item (`<model>.get`)
    #[must_use]
    pub fn get(&self, key: &E::Key) -> Envelope {
        Self::envelope(
            Operation::Get,
            Operation::Get.default_method(),
            Some(Self::key_params(key)),
        )
    }

    /// Create an item (`<model>.create`)
    #[must_use]
    pub fn create(&self, params: Value) -> Envelope {
        Self::envelope(
            Operation::Create,
            Operation::Create.default_method(),
            Some(params),
        )
    }

    /// Update an item (`<model>.update`).
    ///
    /// # Panics
    ///
    /// Panics if `params` is not an object containing the primary key.
    #[must_use]
    #[allow(clippy::panic)] // Contract violation, see module docs
    pub fn update(&self, params: Value) -> Envelope {
        match self.try_update(params) {
            Ok(envelope) => envelope,
            Err(error) => panic!("{error}"),
        }
    }

    /// Update an item, reporting missing keys instead of panicking.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::InvalidParams`] if `params` is not an object,
    /// [`EnvelopeError::MissingPrimaryKey`] if it lacks the primary key.
    pub fn try_update(&self, params: Value) -> Result<Envelope, EnvelopeError> {
        Self::require_key(&Operation::Update, &params)?;
        Ok(Self::envelope(
            Operation::Update,
            Operation::Update.default_method(),
            Some(params),
        ))
    }

    /// Delete an item (`<model>.delete`)
    #[must_use]
    pub fn delete(&self, key: &E::Key) -> Envelope {
        Self::envelope(
            Operation::Delete,
            Operation::Delete.default_method(),
            Some(Self::key_params(key)),
        )
    }

    /// Set the active item, or clear it with `None` (`<model>.set_active`).
    ///
    /// The backend unsets the active item when no primary key is sent, so
    /// clearing sends `null` params.
    #[must_use]
    pub fn set_active(&self, key: Option<&E::Key>) -> Envelope {
        Self::envelope(
            Operation::SetActive,
            Operation::SetActive.default_method(),
            key.map(Self::key_params),
        )
    }

    /// A resource-specific operation not tied to one item
    #[must_use]
    pub fn custom(&self, operation: &str, params: Option<Value>) -> Envelope {
        let operation = Operation::custom(operation);
        let method = operation.default_method();
        Self::envelope(operation, method, params)
    }

    /// A resource-specific operation calling a differently named remote method
    #[must_use]
    pub fn custom_method(&self, operation: &str, method: &str, params: Option<Value>) -> Envelope {
        Self::envelope(Operation::custom(operation), method.to_string(), params)
    }

    /// A resource-specific operation on one item.
    ///
    /// # Panics
    ///
    /// Panics if `params` is not an object containing the primary key.
    #[must_use]
    #[allow(clippy::panic)] // Contract violation, see module docs
    pub fn custom_item(&self, operation: &str, params: Value) -> Envelope {
        match self.try_custom_item(operation, params) {
            Ok(envelope) => envelope,
            Err(error) => panic!("{error}"),
        }
    }

    /// A resource-specific operation on one item, reporting missing keys.
    ///
    /// # Errors
    ///
    /// See [`try_update`](Self::try_update).
    pub fn try_custom_item(&self, operation: &str, params: Value) -> Result<Envelope, EnvelopeError> {
        let operation = Operation::custom(operation);
        Self::require_key(&operation, &params)?;
        let method = operation.default_method();
        Ok(Self::envelope(operation, method, Some(params)))
    }

    /// One user action performed as several independent remote calls.
    ///
    /// Sub-calls run in order; the first failure fails the whole batch.
    ///
    /// # Panics
    ///
    /// Panics if `calls` is empty.
    #[must_use]
    #[allow(clippy::panic)] // Contract violation, see module docs
    pub fn multiple(&self, operation: Operation, calls: Vec<Value>) -> Envelope {
        match self.try_multiple(operation, calls) {
            Ok(envelope) => envelope,
            Err(error) => panic!("{error}"),
        }
    }

    /// Multi-call envelope, reporting an empty batch instead of panicking.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::EmptyBatch`] if `calls` is empty.
    pub fn try_multiple(&self, operation: Operation, calls: Vec<Value>) -> Result<Envelope, EnvelopeError> {
        let method = operation.default_method();
        if calls.is_empty() {
            return Err(EnvelopeError::EmptyBatch {
                model: E::MODEL,
                method,
            });
        }
        let mut envelope = Self::envelope(operation, method, Some(Value::Array(calls)));
        envelope.dispatch_multiple = true;
        Ok(envelope)
    }

    /// Stop polling the given remote method
    #[must_use]
    pub fn poll_stop(&self, operation: &str, method: &str) -> Envelope {
        let mut envelope = Self::envelope(Operation::custom(operation), method.to_string(), None);
        envelope.poll_stop = true;
        envelope
    }

    fn require_key(operation: &Operation, params: &Value) -> Result<(), EnvelopeError> {
        let Value::Object(map) = params else {
            return Err(EnvelopeError::InvalidParams {
                model: E::MODEL,
                method: operation.default_method(),
                found: json_type(params),
            });
        };
        match map.get(E::PRIMARY_KEY) {
            Some(value) if !value.is_null() => Ok(()),
            _ => Err(EnvelopeError::MissingPrimaryKey {
                model: E::MODEL,
                method: operation.default_method(),
                primary_key: E::PRIMARY_KEY,
            }),
        }
    }
}

/// Primary key carried by an envelope's params, when they identify one item
#[must_use]
pub fn target_key<E: Entity>(params: Option<&Value>) -> Option<E::Key> {
    let value = match params? {
        Value::Object(map) => map.get(E::PRIMARY_KEY)?,
        scalar => scalar,
    };
    serde_json::from_value(value.clone()).ok()
}
