//! # Entity Sync Testing
//!
//! Testing utilities and helpers for Entity Sync.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for reducers, plus assertions
//! - [`MockTransport`]: scripted transport that records calls
//! - Fixture entities covering every collection feature
//! - Property-based testing strategies
//! - Tracing initialisation for tests
//!
//! ## Example
//!
//! ```ignore
//! use entity_sync_testing::{MockTransport, fixtures::{TestZone, test_registry}};
//! use entity_sync_runtime::Store;
//!
//! #[tokio::test]
//! async fn test_fetch_flow() {
//!     let transport = MockTransport::new().respond("zone.list", Ok(json!([{"id": 1, "name": "z1"}])));
//!     let store = Store::new(test_registry(), transport);
//!
//!     let mut handle = store.send(EnvelopeBuilder::<TestZone>::new().fetch()).await?;
//!     handle.wait().await;
//!
//!     let loaded = store.state(|r| r.collection::<TestZone>().is_some_and(|z| z.loaded)).await;
//!     assert!(loaded);
//! }
//! ```

/// Fixture entities
pub mod fixtures;

/// Mock implementations for testing
pub mod mocks;

/// Property-based testing utilities
pub mod properties;


pub use mocks::MockTransport;
pub use reducer_test::{ReducerTest, assertions};

/// Install a `tracing` subscriber for tests
///
/// Honours `RUST_LOG` and defaults to `debug` for this workspace's crates.
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("entity_sync_core=debug,entity_sync_runtime=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
