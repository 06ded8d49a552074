//! Mock transport for store tests.

use entity_sync_core::error::SyncError;
use entity_sync_runtime::transport::{RemoteCall, Transport};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type Response = Result<Value, SyncError>;

#[derive(Debug, Default)]
struct MockState {
    /// Queued responses per endpoint, consumed first
    scripted: HashMap<String, VecDeque<Response>>,
    /// Fallback response per endpoint once the queue is empty
    fallback: HashMap<String, Response>,
    calls: Vec<RemoteCall>,
}

/// Scripted [`Transport`] that records every call
///
/// Endpoints without a scripted response answer `Ok(null)`.
///
/// # Example
///
/// ```ignore
/// let transport = MockTransport::new()
///     .respond("zone.list", Ok(json!([{"id": 1, "name": "z1"}])))
///     .respond("zone.create", Err(SyncError::message("name taken")));
///
/// let store = Store::new(registry, transport.clone());
/// // ...
/// assert_eq!(transport.endpoints(), vec!["zone.list", "zone.create"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    latency: Option<Duration>,
}

impl MockTransport {
    /// A transport answering `Ok(null)` to everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot response for `endpoint`
    #[must_use]
    pub fn respond(self, endpoint: &str, response: Response) -> Self {
        self.lock()
            .scripted
            .entry(endpoint.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Answer `endpoint` with `response` whenever nothing is queued for it
    #[must_use]
    pub fn always(self, endpoint: &str, response: Response) -> Self {
        self.lock().fallback.insert(endpoint.to_string(), response);
        self
    }

    /// Delay every response
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every call made so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Endpoints called so far, in order
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        self.lock().calls.iter().map(RemoteCall::endpoint).collect()
    }

    /// Number of calls made to `endpoint`
    #[must_use]
    pub fn call_count(&self, endpoint: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.endpoint() == endpoint)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn call(&self, call: RemoteCall) -> BoxFuture<'static, Result<Value, SyncError>> {
        let response = {
            let mut state = self.lock();
            let endpoint = call.endpoint();
            state.calls.push(call);
            state
                .scripted
                .get_mut(&endpoint)
                .and_then(VecDeque::pop_front)
                .or_else(|| state.fallback.get(&endpoint).cloned())
                .unwrap_or(Ok(Value::Null))
        };
        let latency = self.latency;

        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            response
        })
    }
}
