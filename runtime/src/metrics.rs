//! Store metrics, exported in Prometheus format.
//!
//! Recorded by the store:
//! - `sync.events.*`: events applied per model, and events rejected
//! - `sync.requests.*`: remote calls per endpoint, failures, round-trip time
//! - `sync.polls.active`: endpoints being polled
//!
//! # Example
//!
//! ```rust,no_run
//! use entity_sync_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Serve this from the application's /metrics route
//! let body = server.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Failure to set up the Prometheus exporter
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The bucket layout was rejected
    #[error("invalid histogram buckets: {0}")]
    Build(String),
    /// A different recorder could not be replaced
    #[error("cannot install Prometheus recorder: {0}")]
    Install(String),
}

/// Histogram buckets for every `*_duration_seconds` metric, 10µs to 5s
const DURATION_BUCKETS: &[f64] = &[
    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
];

/// Prometheus exporter for the store's metrics.
///
/// The embedding application owns the HTTP side and serves
/// [`render`](Self::render) on `addr`.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Exporter for scraping at `addr` (`0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe the sync metrics and install the Prometheus recorder.
    ///
    /// A process holds one global recorder. When one is already installed
    /// (several stores, or tests) this is logged and [`handle`](Self::handle)
    /// stays `None`; recording keeps working through the existing recorder.
    ///
    /// # Errors
    ///
    /// [`MetricsError`] if the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), DURATION_BUCKETS)
            .map_err(|error| MetricsError::Build(error.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                tracing::info!(addr = %self.addr, "Sync metrics exporter installed");
                self.handle = Some(handle);
                Ok(())
            },
            Err(error) if error.to_string().contains("already initialized") => {
                tracing::warn!(addr = %self.addr, "Metrics recorder already installed, reusing it");
                Ok(())
            },
            Err(error) => Err(MetricsError::Install(error.to_string())),
        }
    }

    /// Prometheus handle, once installed
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Current metrics in Prometheus text format
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "sync.events.applied_total",
        "Total number of inbound events applied to a collection"
    );
    describe_counter!(
        "sync.events.rejected_total",
        "Total number of inbound events the registry could not route or decode"
    );
    describe_histogram!(
        "sync.reducer.duration_seconds",
        "Time spent applying one event under the registry write lock"
    );

    describe_counter!("sync.requests.total", "Total number of remote calls made");
    describe_counter!(
        "sync.requests.failed_total",
        "Total number of remote calls that returned an error"
    );
    describe_histogram!(
        "sync.requests.duration_seconds",
        "Round-trip time of one envelope, all sub-calls included"
    );

    describe_gauge!("sync.polls.active", "Number of endpoints currently being polled");
}

/// Event application metrics recorder.
pub struct EventMetrics;

impl EventMetrics {
    /// Record an event applied to `model`'s collection.
    pub fn record_applied(model: &str, duration: Duration) {
        counter!("sync.events.applied_total", "model" => model.to_string()).increment(1);
        histogram!("sync.reducer.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an event the registry rejected.
    pub fn record_rejected() {
        counter!("sync.events.rejected_total").increment(1);
    }
}

/// Remote call metrics recorder.
pub struct RequestMetrics;

impl RequestMetrics {
    /// Record a remote call to `endpoint`.
    pub fn record_call(endpoint: &str) {
        counter!("sync.requests.total", "endpoint" => endpoint.to_string()).increment(1);
    }

    /// Record a failed remote call to `endpoint`.
    pub fn record_failure(endpoint: &str) {
        counter!("sync.requests.failed_total", "endpoint" => endpoint.to_string()).increment(1);
    }

    /// Record a completed round trip.
    pub fn record_round_trip(duration: Duration) {
        histogram!("sync.requests.duration_seconds").record(duration.as_secs_f64());
    }
}

/// Polling metrics recorder.
pub struct PollMetrics;

impl PollMetrics {
    /// Record the number of endpoints being polled.
    #[allow(clippy::cast_precision_loss)] // Poll counts are tiny
    pub fn record_active(count: usize) {
        gauge!("sync.polls.active").set(count as f64);
    }
}
