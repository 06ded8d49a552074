//! Collection registry: one collection per resource type, one state tree.
//!
//! Collections are registered by type. Each inbound event is routed to the
//! collection whose model tag matches the event's model, so events for
//! different models never cross-apply, and adding a resource type never
//! touches existing collections.

use crate::action::CollectionAction;
use crate::collection::Collection;
use crate::effect::Effect;
use crate::entity::Entity;
use crate::envelope::Envelope;
use crate::error::RegistryError;
use crate::event::{EventKind, InboundEvent};
use crate::reducer::Reducer;
use crate::sync::CollectionReducer;
use serde_json::Value;
use smallvec::SmallVec;
use std::any::Any;
use std::collections::BTreeMap;

/// Type-erased collection with its reducer
trait Slot: Send + Sync {
    fn apply_event(&mut self, event: &InboundEvent, kind: EventKind) -> Result<SmallVec<[Effect; 4]>, RegistryError>;
    fn dispatch(&mut self, envelope: Envelope) -> SmallVec<[Effect; 4]>;
    fn snapshot(&self) -> Result<Value, RegistryError>;
    fn entity_type(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct TypedSlot<E: Entity> {
    collection: Collection<E>,
    reducer: CollectionReducer<E>,
}

impl<E: Entity> Slot for TypedSlot<E> {
    fn apply_event(&mut self, event: &InboundEvent, kind: EventKind) -> Result<SmallVec<[Effect; 4]>, RegistryError> {
        let action = event.decode_kind::<E>(kind)?;
        Ok(self.reducer.reduce(&mut self.collection, action, &()))
    }

    fn dispatch(&mut self, envelope: Envelope) -> SmallVec<[Effect; 4]> {
        self.reducer
            .reduce(&mut self.collection, CollectionAction::Dispatch(envelope), &())
    }

    fn snapshot(&self) -> Result<Value, RegistryError> {
        serde_json::to_value(&self.collection).map_err(|source| RegistryError::Snapshot {
            model: E::MODEL,
            source,
        })
    }

    fn entity_type(&self) -> &'static str {
        std::any::type_name::<E>()
    }

    fn as_any(&self) -> &dyn Any {
        &self.collection
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.collection
    }
}

/// Every live collection, keyed by model tag.
///
/// Built once at application start and handed to whatever owns the event
/// loop. Collections are never removed.
///
/// # Example
///
/// ```ignore
/// let mut registry = Registry::new().with::<Zone>()?.with::<Vlan>()?;
///
/// registry.apply_event(&InboundEvent::new("zone/fetchStart", Value::Null))?;
/// assert!(registry.collection::<Zone>().is_some_and(|zones| zones.loading));
/// ```
#[derive(Default)]
pub struct Registry {
    slots: BTreeMap<&'static str, Box<dyn Slot>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty collection for `E`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateModel`] if a collection with the same model
    /// tag is already registered.
    pub fn register<E: Entity>(&mut self) -> Result<(), RegistryError> {
        if self.slots.contains_key(E::MODEL) {
            return Err(RegistryError::DuplicateModel(E::MODEL));
        }
        tracing::debug!(model = E::MODEL, primary_key = E::PRIMARY_KEY, "Registered collection");
        self.slots.insert(
            E::MODEL,
            Box::new(TypedSlot::<E> {
                collection: Collection::new(),
                reducer: CollectionReducer::new(),
            }),
        );
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn with<E: Entity>(mut self) -> Result<Self, RegistryError> {
        self.register::<E>()?;
        Ok(self)
    }

    /// Registered model tags, sorted
    pub fn models(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }

    /// Whether a collection is registered for `model`
    #[must_use]
    pub fn contains(&self, model: &str) -> bool {
        self.slots.contains_key(model)
    }

    /// Typed read access to a collection
    #[must_use]
    pub fn collection<E: Entity>(&self) -> Option<&Collection<E>> {
        self.slots
            .get(E::MODEL)
            .and_then(|slot| slot.as_any().downcast_ref::<Collection<E>>())
    }

    /// Apply a typed action to the collection for `E`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownModel`] if `E::MODEL` is not registered,
    /// [`RegistryError::TypeMismatch`] if it is registered for another type.
    pub fn apply<E: Entity>(&mut self, action: CollectionAction<E>) -> Result<SmallVec<[Effect; 4]>, RegistryError> {
        let slot = self
            .slots
            .get_mut(E::MODEL)
            .ok_or_else(|| RegistryError::UnknownModel(E::MODEL.to_string()))?;
        let registered = slot.entity_type();
        let collection = slot
            .as_any_mut()
            .downcast_mut::<Collection<E>>()
            .ok_or(RegistryError::TypeMismatch {
                model: E::MODEL,
                registered,
                requested: std::any::type_name::<E>(),
            })?;
        tracing::trace!(model = E::MODEL, action = %action.label(), "Applying action");
        Ok(CollectionReducer::<E>::new().reduce(collection, action, &()))
    }

    /// Route an inbound event to its collection.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MalformedEventType`] for an unparseable event type,
    /// [`RegistryError::UnknownModel`] if no collection matches its model,
    /// [`RegistryError::Payload`] if the payload has the wrong shape. The
    /// state is left unchanged in every error case.
    pub fn apply_event(&mut self, event: &InboundEvent) -> Result<SmallVec<[Effect; 4]>, RegistryError> {
        let parsed = event.parsed_type()?;
        let slot = self
            .slots
            .get_mut(parsed.model.as_str())
            .ok_or_else(|| RegistryError::UnknownModel(parsed.model.clone()))?;
        tracing::debug!(event = %event.event_type, "Applying event");
        slot.apply_event(event, parsed.kind)
    }

    /// Route a dispatch intent to the collection named by the envelope.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownModel`] if no collection matches.
    pub fn dispatch(&mut self, envelope: Envelope) -> Result<SmallVec<[Effect; 4]>, RegistryError> {
        let slot = self
            .slots
            .get_mut(envelope.resource_model.as_str())
            .ok_or_else(|| RegistryError::UnknownModel(envelope.resource_model.clone()))?;
        Ok(slot.dispatch(envelope))
    }

    /// The whole state tree as JSON, keyed by model tag
    ///
    /// # Errors
    ///
    /// [`RegistryError::Snapshot`] if a collection fails to serialize.
    pub fn snapshot(&self) -> Result<Value, RegistryError> {
        let mut tree = serde_json::Map::new();
        for (model, slot) in &self.slots {
            tree.insert((*model).to_string(), slot.snapshot()?);
        }
        Ok(Value::Object(tree))
    }

    /// End of the process lifetime. Collections hold no external resources,
    /// so there is nothing to release.
    pub fn teardown(self) {
        tracing::debug!(collections = self.slots.len(), "Registry torn down");
    }
}
