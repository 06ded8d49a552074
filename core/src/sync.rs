//! The generic collection reducer every resource type instantiates.

use crate::action::CollectionAction;
use crate::collection::Collection;
use crate::effect::Effect;
use crate::entity::Entity;
use crate::reducer::Reducer;
use crate::{lifecycle, reconcile};
use smallvec::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Reducer for `Collection<E>`.
///
/// Lifecycle events go through [`lifecycle`], notifications through
/// [`reconcile`]. A `Dispatch` intent leaves state untouched and returns the
/// envelope as an [`Effect::Dispatch`] for the transport.
///
/// # Example
///
/// ```ignore
/// let reducer = CollectionReducer::<Zone>::new();
/// let mut zones = Collection::new();
///
/// reducer.reduce(&mut zones, CollectionAction::fetch_start(), &());
/// assert!(zones.loading);
/// ```
#[derive(Debug)]
pub struct CollectionReducer<E: Entity> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> CollectionReducer<E> {
    /// Creates a new `CollectionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for CollectionReducer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Clone for CollectionReducer<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: Entity> Copy for CollectionReducer<E> {}

impl<E: Entity> Reducer for CollectionReducer<E> {
    type State = Collection<E>;
    type Action = CollectionAction<E>;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect; 4]> {
        match action {
            CollectionAction::Dispatch(envelope) => {
                if envelope.resource_model != E::MODEL {
                    tracing::warn!(
                        model = E::MODEL,
                        envelope_model = %envelope.resource_model,
                        "Ignoring envelope addressed to another model"
                    );
                    return SmallVec::new();
                }
                return smallvec![Effect::Dispatch(envelope)];
            },
            CollectionAction::Start { operation, item } => {
                lifecycle::start(state, &operation, item.as_ref());
            },
            CollectionAction::Success {
                operation,
                item,
                payload,
            } => {
                lifecycle::success(state, &operation, item.as_ref(), payload);
            },
            CollectionAction::Error {
                operation,
                item,
                error,
            } => {
                lifecycle::error(state, &operation, item.as_ref(), error);
            },
            CollectionAction::Notify(notification) => {
                reconcile::notify(state, notification);
            },
            CollectionAction::Cleanup => lifecycle::cleanup(state),
        }
        SmallVec::new()
    }
}
