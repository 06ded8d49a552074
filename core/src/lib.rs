//! # Entity Sync Core
//!
//! A normalized client-side store that mirrors server-held collections.
//!
//! Every resource type (zones, VLANs, pods, machines, ...) gets the same
//! machinery, parameterized by its primary key and model tag:
//!
//! - **Collection**: items plus `loading`/`loaded`/`saving`/`saved`/`errors`,
//!   an optional active pointer and optional per-item statuses
//! - **Lifecycle**: `Start → Success | Error` transitions for fetch, get,
//!   create, update, delete, setActive and custom operations
//! - **Reconciliation**: create/update/delete notifications pushed by the
//!   backend, applied regardless of any request in flight
//! - **Envelopes**: transport directives built from user intents
//! - **Registry**: every collection composed into one state tree, with events
//!   routed by model tag
//!
//! ## Architecture Principles
//!
//! - Reducers are pure and synchronous: `(State, Action) → (State, Effects)`
//! - The only effect is handing an envelope to the transport
//! - Remote errors are data, never Rust errors
//! - Identity is by primary key, never by reference
//!
//! ## Example
//!
//! ```
//! use entity_sync_core::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
//! struct Zone { id: u32, name: String }
//!
//! impl Entity for Zone {
//!     type Key = u32;
//!     const MODEL: &'static str = "zone";
//!     const PRIMARY_KEY: &'static str = "id";
//!     fn key(&self) -> u32 { self.id }
//! }
//!
//! let reducer = CollectionReducer::<Zone>::new();
//! let mut zones = Collection::new();
//!
//! reducer.reduce(&mut zones, CollectionAction::fetch_start(), &());
//! reducer.reduce(
//!     &mut zones,
//!     CollectionAction::fetch_success(vec![Zone { id: 1, name: "z1".into() }]),
//!     &(),
//! );
//! reducer.reduce(
//!     &mut zones,
//!     CollectionAction::update_notify(Zone { id: 1, name: "z1-renamed".into() }),
//!     &(),
//! );
//!
//! assert!(zones.loaded);
//! assert_eq!(zones.items[0].name, "z1-renamed");
//! ```

pub use smallvec::{SmallVec, smallvec};

pub mod action;
pub mod collection;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod reconcile;
pub mod registry;
pub mod sync;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They are deterministic and never perform I/O themselves.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for CollectionReducer<Zone> {
    ///     type State = Collection<Zone>;
    ///     type Action = CollectionAction<Zone>;
    ///     type Environment = ();
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut Collection<Zone>,
    ///         action: CollectionAction<Zone>,
    ///         env: &(),
    ///     ) -> SmallVec<[Effect; 4]> {
    ///         // State transitions here
    ///         SmallVec::new()
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects are values returned by reducers, not executed by them. The runtime
/// interprets them.
pub mod effect {
    use crate::envelope::Envelope;

    /// Effect type - describes a side effect to be executed
    #[derive(Clone, Debug, PartialEq)]
    pub enum Effect {
        /// No-op effect
        None,

        /// Hand an envelope to the transport
        Dispatch(Envelope),
    }

    impl Effect {
        /// The envelope this effect dispatches, if any
        #[must_use]
        pub const fn envelope(&self) -> Option<&Envelope> {
            match self {
                Self::None => None,
                Self::Dispatch(envelope) => Some(envelope),
            }
        }
    }
}

/// Commonly used types
pub mod prelude {
    pub use crate::action::{CollectionAction, Notification, Operation, Payload, Phase};
    pub use crate::collection::{Collection, EventError, StatusFlags};
    pub use crate::effect::Effect;
    pub use crate::entity::{Entity, Lookup, StatusHandler};
    pub use crate::envelope::{Envelope, EnvelopeBuilder};
    pub use crate::error::{EnvelopeError, FieldError, RegistryError, SyncError};
    pub use crate::event::{EventKind, EventType, InboundEvent, NotifyKind};
    pub use crate::reducer::Reducer;
    pub use crate::registry::Registry;
    pub use crate::sync::CollectionReducer;
}

pub use prelude::*;
