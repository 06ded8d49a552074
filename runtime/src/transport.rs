//! The transport seam: how envelopes reach the backend.
//!
//! The store never talks to a socket itself. It turns each envelope into one
//! or more [`RemoteCall`]s and hands them to a [`Transport`], which resolves
//! to the call's result or a [`SyncError`]. Push notifications travel the
//! other way through the channel given to `Store::listen`.

use entity_sync_core::envelope::Envelope;
use entity_sync_core::error::SyncError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single remote procedure call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteCall {
    /// Resource model (`zone`)
    pub model: String,
    /// Remote method (`create`)
    pub method: String,
    /// Call parameters, omitted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RemoteCall {
    /// Calls an envelope stands for, in the order they must be made.
    ///
    /// A `dispatch_multiple` envelope yields one call per element of its
    /// params; every other envelope yields exactly one call.
    #[must_use]
    pub fn from_envelope(envelope: &Envelope) -> Vec<Self> {
        envelope
            .sub_calls()
            .into_iter()
            .map(|params| Self {
                model: envelope.resource_model.clone(),
                method: envelope.remote_method.clone(),
                params,
            })
            .collect()
    }

    /// Endpoint the backend dispatches on (`zone.create`)
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}.{}", self.model, self.method)
    }
}

/// Performs remote calls
///
/// Implementations must be cheap to share: the store calls them from spawned
/// tasks and from polling loops.
///
/// # Example
///
/// ```ignore
/// struct WebSocketTransport { client: Client }
///
/// impl Transport for WebSocketTransport {
///     fn call(&self, call: RemoteCall) -> BoxFuture<'static, Result<Value, SyncError>> {
///         let client = self.client.clone();
///         Box::pin(async move {
///             client
///                 .request(&call.endpoint(), call.params)
///                 .await
///                 .map_err(|e| SyncError::message(e.to_string()))
///         })
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Perform one call, resolving to its result or the backend's error
    fn call(&self, call: RemoteCall) -> BoxFuture<'static, Result<Value, SyncError>>;
}

impl<F> Transport for F
where
    F: Fn(RemoteCall) -> BoxFuture<'static, Result<Value, SyncError>> + Send + Sync + 'static,
{
    fn call(&self, call: RemoteCall) -> BoxFuture<'static, Result<Value, SyncError>> {
        self(call)
    }
}
