//! # Entity Sync Runtime
//!
//! The event loop that hosts a [`Registry`](entity_sync_core::Registry).
//!
//! ## Core Components
//!
//! - **Store**: owns the registry, applies events one at a time in delivery
//!   order and executes dispatch effects
//! - **Transport**: the seam where envelopes become remote calls
//! - **Polling**: envelopes flagged `poll` repeat on an interval until a
//!   matching `poll_stop` envelope arrives
//!
//! ## Request Round Trip
//!
//! ```text
//! send(envelope) → registry.dispatch → Effect::Dispatch
//!     → <op>Start → transport.call (one per sub-call) → <op>Success | <op>Error
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use entity_sync_runtime::Store;
//!
//! let store = Store::new(registry, transport);
//! let pushes = store.listen(push_receiver);
//!
//! let mut handle = store.send(EnvelopeBuilder::<Zone>::new().fetch()).await?;
//! handle.wait().await;
//!
//! let zones = store.state(|r| r.collection::<Zone>().map(Collection::len)).await;
//! ```

use entity_sync_core::effect::Effect;
use entity_sync_core::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Prometheus metrics for observability
pub mod metrics;

/// Transport seam
pub mod transport;

pub use transport::{RemoteCall, Transport};

/// Error types for the Store runtime
pub mod error {
    use entity_sync_core::error::RegistryError;
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// Remote failures are not errors here: they become `<op>Error` events
    /// and land in the collection's `errors`.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new envelopes
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for round trips to complete
        #[error("Shutdown timed out with {0} requests still running")]
        ShutdownTimeout(usize),

        /// The registry could not route or decode an event or envelope
        #[error(transparent)]
        Registry(#[from] RegistryError),
    }
}

pub use error::StoreError;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use entity_sync_runtime::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_poll_interval(Duration::from_secs(30))
///     .with_event_broadcast_capacity(256);
///
/// assert_eq!(config.poll_interval, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the applied-event broadcast channel
    pub event_broadcast_capacity: usize,
    /// Delay between repeats of a polling request
    pub poll_interval: Duration,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(
        event_broadcast_capacity: usize,
        poll_interval: Duration,
        default_shutdown_timeout: Duration,
    ) -> Self {
        Self {
            event_broadcast_capacity,
            poll_interval,
            default_shutdown_timeout,
        }
    }

    /// Set the applied-event broadcast capacity
    #[must_use]
    pub const fn with_event_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.event_broadcast_capacity = capacity;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_broadcast_capacity: 64,
            poll_interval: Duration::from_secs(10),
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for tracking a request's round trip
///
/// Returned by [`Store::send()`]. Resolves once the answering `Success` or
/// `Error` event has been applied.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(envelope).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // The collection now reflects the outcome
/// ```
#[derive(Clone, Debug)]
pub struct RequestHandle {
    completion: watch::Receiver<bool>,
}

impl RequestHandle {
    fn new() -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { completion: rx }, tx)
    }

    /// Create a handle that's already complete
    ///
    /// Returned for envelopes that start no round trip (`poll_stop`, a
    /// `poll` for an endpoint that is already being polled, or a list
    /// request for an endpoint that is already loaded or loading).
    #[must_use]
    pub fn completed() -> Self {
        let (_, rx) = watch::channel(true);
        Self { completion: rx }
    }

    /// Whether the round trip has finished
    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self.completion.borrow()
    }

    /// Wait for the round trip to finish
    ///
    /// Also returns if the request task was dropped (store shut down).
    pub async fn wait(&mut self) {
        while !*self.completion.borrow_and_update() {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for the round trip with a timeout
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the timeout expires first.
    #[allow(clippy::result_unit_err)]
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), ()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ())
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct PendingGuard(Arc<std::sync::atomic::AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Store runtime for coordinating registry updates and remote calls.
pub mod store {
    use super::{
        Arc, Duration, Effect, PendingGuard, Registry, RequestHandle, RwLock, StoreConfig,
        StoreError,
    };
    use crate::metrics::{EventMetrics, PollMetrics, RequestMetrics};
    use crate::transport::{RemoteCall, Transport};
    use entity_sync_core::envelope::Envelope;
    use entity_sync_core::error::{RegistryError, SyncError};
    use entity_sync_core::event::InboundEvent;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use serde_json::Value;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use tokio::sync::{broadcast, mpsc};
    use tokio::task::JoinHandle;

    /// The Store - runtime coordinator for a registry
    ///
    /// The Store manages:
    /// 1. The registry (behind `RwLock`; every event is applied under one
    ///    write guard, so events apply strictly in delivery order)
    /// 2. The transport
    /// 3. Request tasks and polling loops
    ///
    /// Cloning is cheap; clones share everything.
    pub struct Store {
        registry: Arc<RwLock<Registry>>,
        transport: Arc<dyn Transport>,
        config: StoreConfig,
        shutdown: Arc<AtomicBool>,
        pending_requests: Arc<AtomicUsize>,
        /// Every event applied to the registry, in application order
        event_broadcast: broadcast::Sender<InboundEvent>,
        /// Polling loops keyed by endpoint
        polls: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
        /// Endpoints of deduplicated requests already sent
        loaded: Arc<Mutex<HashSet<String>>>,
    }

    impl Store {
        /// Create a new store with default configuration
        #[must_use]
        pub fn new(registry: Registry, transport: impl Transport) -> Self {
            Self::with_config(registry, transport, StoreConfig::default())
        }

        /// Create a new store with custom configuration
        ///
        /// # Example
        ///
        /// ```ignore
        /// let config = StoreConfig::default().with_poll_interval(Duration::from_secs(30));
        /// let store = Store::with_config(registry, transport, config);
        /// ```
        #[must_use]
        pub fn with_config(registry: Registry, transport: impl Transport, config: StoreConfig) -> Self {
            let (event_broadcast, _) = broadcast::channel(config.event_broadcast_capacity.max(1));

            Self {
                registry: Arc::new(RwLock::new(registry)),
                transport: Arc::new(transport),
                config,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_requests: Arc::new(AtomicUsize::new(0)),
                event_broadcast,
                polls: Arc::new(Mutex::new(HashMap::new())),
                loaded: Arc::new(Mutex::new(HashSet::new())),
            }
        }

        /// The store's configuration
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// Send an envelope through its collection and start the round trip
        ///
        /// 1. Routes the envelope to its collection's reducer
        /// 2. Executes the returned dispatch effect in a spawned task:
        ///    `<op>Start`, the remote call(s), then `<op>Success` or `<op>Error`
        ///
        /// `send()` returns once the round trip has been started; wait on the
        /// returned handle for the outcome.
        ///
        /// # Errors
        ///
        /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
        /// - [`StoreError::Registry`] if no collection is registered for the
        ///   envelope's model
        #[tracing::instrument(skip(self, envelope), name = "store_send", fields(endpoint = %envelope.endpoint()))]
        pub async fn send(&self, envelope: Envelope) -> Result<RequestHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected envelope: store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            let effects = self.registry.write().await.dispatch(envelope)?;

            let mut handle = RequestHandle::completed();
            for effect in effects {
                if let Effect::Dispatch(envelope) = effect {
                    handle = self.execute(envelope);
                }
            }
            Ok(handle)
        }

        /// Apply one inbound event to the registry
        ///
        /// # Errors
        ///
        /// [`StoreError::Registry`] for an unknown model, a malformed event
        /// type or a payload of the wrong shape. The state is unchanged.
        #[tracing::instrument(skip(self, event), name = "store_apply", fields(event = %event.event_type))]
        pub async fn apply(&self, event: InboundEvent) -> Result<(), StoreError> {
            let model = event.parsed_type().map(|parsed| parsed.model);

            let effects = {
                let mut registry = self.registry.write().await;
                let start = std::time::Instant::now();
                let effects = registry.apply_event(&event).inspect_err(|_| {
                    EventMetrics::record_rejected();
                })?;
                EventMetrics::record_applied(model.as_deref().unwrap_or_default(), start.elapsed());
                effects
            };

            // Nobody listening is fine
            let _ = self.event_broadcast.send(event);

            for effect in effects {
                if let Effect::Dispatch(envelope) = effect {
                    let _ = self.execute(envelope);
                }
            }
            Ok(())
        }

        /// Apply push events from `events` until the channel closes
        ///
        /// Events are applied in the order they are received. Events the
        /// registry rejects are logged and dropped; they never stop the loop.
        #[must_use = "dropping the handle detaches the listener"]
        pub fn listen(&self, mut events: mpsc::Receiver<InboundEvent>) -> JoinHandle<()> {
            let store = self.clone();
            tokio::spawn(async move {
                tracing::debug!("Listening for push events");
                while let Some(event) = events.recv().await {
                    let event_type = event.event_type.clone();
                    if let Err(error) = store.apply(event).await {
                        tracing::warn!(event = %event_type, error = %error, "Dropped inbound event");
                    }
                }
                tracing::debug!("Push channel closed");
            })
        }

        /// Subscribe to every event the store applies
        ///
        /// Includes lifecycle events generated by round trips and push events
        /// received through [`listen`](Self::listen).
        #[must_use]
        pub fn subscribe_events(&self) -> broadcast::Receiver<InboundEvent> {
            self.event_broadcast.subscribe()
        }

        /// Read the registry via a closure
        ///
        /// ```ignore
        /// let loaded = store.state(|r| r.collection::<Zone>().is_some_and(|z| z.loaded)).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&Registry) -> T,
        {
            let registry = self.registry.read().await;
            f(&registry)
        }

        /// JSON snapshot of the whole state tree, keyed by model
        ///
        /// # Errors
        ///
        /// [`StoreError::Registry`] if a collection fails to serialize.
        pub async fn snapshot(&self) -> Result<Value, StoreError> {
            Ok(self.registry.read().await.snapshot()?)
        }

        /// Endpoints currently being polled, sorted
        #[must_use]
        pub fn polling(&self) -> Vec<String> {
            let polls = self.polls.lock().unwrap_or_else(PoisonError::into_inner);
            let mut endpoints: Vec<_> = polls.keys().cloned().collect();
            endpoints.sort();
            endpoints
        }

        /// Forget which endpoints were loaded, so the next list request for
        /// each is sent again. Call when the transport reconnects.
        pub fn reset_loaded(&self) {
            self.loaded.lock().unwrap_or_else(PoisonError::into_inner).clear();
            tracing::debug!("Reset loaded endpoints");
        }

        /// Initiate graceful shutdown of the store
        ///
        /// 1. Sets the shutdown flag (rejecting new envelopes)
        /// 2. Stops every polling loop
        /// 3. Waits for in-flight round trips (with timeout)
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before
        /// all pending round trips complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            {
                let mut polls = self.polls.lock().unwrap_or_else(PoisonError::into_inner);
                for (endpoint, task) in polls.drain() {
                    tracing::debug!(endpoint = %endpoint, "Stopped polling");
                    task.abort();
                }
                PollMetrics::record_active(0);
            }

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_requests.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All requests completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_requests = pending,
                        "Shutdown timeout: {} requests still running",
                        pending
                    );
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Shut down with the configured default timeout
        ///
        /// # Errors
        ///
        /// See [`shutdown`](Self::shutdown).
        pub async fn shutdown_default(&self) -> Result<(), StoreError> {
            self.shutdown(self.config.default_shutdown_timeout).await
        }

        /// Execute one dispatch effect
        fn execute(&self, envelope: Envelope) -> RequestHandle {
            if envelope.poll_stop {
                self.stop_polling(&envelope.endpoint());
                return RequestHandle::completed();
            }

            if envelope.deduplicated() && !envelope.poll {
                let endpoint = envelope.endpoint();
                let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
                if !loaded.insert(endpoint) {
                    tracing::debug!(endpoint = %envelope.endpoint(), "Already loaded");
                    return RequestHandle::completed();
                }
            }

            if envelope.poll {
                let endpoint = envelope.endpoint();
                let mut polls = self.polls.lock().unwrap_or_else(PoisonError::into_inner);
                if polls.contains_key(&endpoint) {
                    tracing::debug!(endpoint = %endpoint, "Already polling");
                    return RequestHandle::completed();
                }
                tracing::debug!(endpoint = %endpoint, interval_ms = self.config.poll_interval.as_millis(), "Started polling");
                polls.insert(endpoint, self.spawn_poll_loop(envelope.clone()));
                PollMetrics::record_active(polls.len());
            }

            self.spawn_round_trip(envelope)
        }

        fn stop_polling(&self, endpoint: &str) {
            let mut polls = self.polls.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(task) = polls.remove(endpoint) {
                task.abort();
                tracing::debug!(endpoint = %endpoint, "Stopped polling");
            } else {
                tracing::debug!(endpoint = %endpoint, "Stop requested for an endpoint that is not polled");
            }
            PollMetrics::record_active(polls.len());
        }

        fn spawn_round_trip(&self, envelope: Envelope) -> RequestHandle {
            self.pending_requests.fetch_add(1, Ordering::SeqCst);
            let pending_guard = PendingGuard(Arc::clone(&self.pending_requests));
            let (handle, done) = RequestHandle::new();
            let round_trip = self.round_trip(envelope);

            tokio::spawn(async move {
                let _pending_guard = pending_guard; // Decrement on drop
                round_trip.await;
                let _ = done.send(true);
            });

            handle
        }

        /// Repeat the round trip on the configured interval. The first call
        /// is made by the caller, so the loop starts by waiting.
        fn spawn_poll_loop(&self, envelope: Envelope) -> JoinHandle<()> {
            let store = self.clone();
            let interval = self.config.poll_interval;

            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    if store.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    store.round_trip(envelope.clone()).await;
                }
            })
        }

        /// Start, call, then succeed or fail.
        ///
        /// A `dispatch_multiple` envelope makes its sub-calls one after
        /// another; the first failure stops the batch and becomes the
        /// envelope's error (fail-together).
        fn round_trip(&self, envelope: Envelope) -> BoxFuture<'static, ()> {
            let store = self.clone();

            async move {
                let endpoint = envelope.endpoint();
                store.apply_generated(InboundEvent::start(&envelope)).await;

                let start = std::time::Instant::now();
                let outcome = store.call_all(&envelope).await;
                RequestMetrics::record_round_trip(start.elapsed());

                match outcome {
                    Ok(result) => {
                        let success = InboundEvent::success(&envelope, result);
                        if let Err(StoreError::Registry(error @ RegistryError::Payload { .. })) =
                            store.apply(success).await
                        {
                            // The collection is still waiting on this request,
                            // so a response it cannot decode becomes its error.
                            tracing::warn!(endpoint = %endpoint, error = %error, "Undecodable response");
                            let failure = SyncError::message(format!("Error parsing API response: {error}"));
                            store
                                .apply_generated(InboundEvent::failure(&envelope, &failure))
                                .await;
                        }
                    },
                    Err(error) => {
                        tracing::debug!(endpoint = %endpoint, error = %error, "Request failed");
                        store
                            .apply_generated(InboundEvent::failure(&envelope, &error))
                            .await;
                    },
                }
            }
            .boxed()
        }

        async fn call_all(&self, envelope: &Envelope) -> Result<Value, SyncError> {
            let calls = RemoteCall::from_envelope(envelope);
            let batched = envelope.dispatch_multiple;
            let mut results = Vec::with_capacity(calls.len());

            for call in calls {
                let endpoint = call.endpoint();
                RequestMetrics::record_call(&endpoint);
                tracing::trace!(endpoint = %endpoint, "Calling");
                match self.transport.call(call).await {
                    Ok(result) => results.push(result),
                    Err(error) => {
                        RequestMetrics::record_failure(&endpoint);
                        return Err(error);
                    },
                }
            }

            if batched {
                Ok(Value::Array(results))
            } else {
                Ok(results.pop().unwrap_or(Value::Null))
            }
        }

        /// Apply an event the store generated itself. Such events always
        /// parse, so a rejection here means the model was never registered.
        async fn apply_generated(&self, event: InboundEvent) {
            let event_type = event.event_type.clone();
            if let Err(error) = self.apply(event).await {
                tracing::warn!(event = %event_type, error = %error, "Generated event rejected");
            }
        }
    }

    impl Clone for Store {
        fn clone(&self) -> Self {
            Self {
                registry: Arc::clone(&self.registry),
                transport: Arc::clone(&self.transport),
                config: self.config.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_requests: Arc::clone(&self.pending_requests),
                event_broadcast: self.event_broadcast.clone(),
                polls: Arc::clone(&self.polls),
                loaded: Arc::clone(&self.loaded),
            }
        }
    }

    impl std::fmt::Debug for Store {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Store")
                .field("config", &self.config)
                .field("pending_requests", &self.pending_requests.load(Ordering::SeqCst))
                .field("shutdown", &self.shutdown.load(Ordering::SeqCst))
                .finish_non_exhaustive()
        }
    }
}

pub use store::Store;
