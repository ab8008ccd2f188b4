//! Prometheus metrics for observability and monitoring.
//!
//! Counters cover:
//! - Rating aggregate recomputes
//! - Reconciliation sweeps
//! - Event bus dispatch (recorded by `recipebox-core`)
//! - One-time code delivery
//!
//! # Example
//!
//! ```rust,no_run
//! use recipebox_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://0.0.0.0:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus exporter.
    ///
    /// Must be called from within a Tokio runtime; the exporter serves
    /// `/metrics` on a background task.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. An already
    /// installed recorder (e.g. in tests) is tolerated with a warning.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install() {
            Ok(()) => {
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Install a recorder without an HTTP listener and keep its handle for
    /// rendering.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a recorder is already installed.
    pub fn install_recorder(&mut self) -> Result<(), MetricsError> {
        register_metrics();
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` unless [`install_recorder`](Self::install_recorder) was used.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Aggregate Metrics
    describe_counter!(
        "ratings_aggregate_recomputed_total",
        "Total number of successful rating aggregate recomputes"
    );
    describe_counter!(
        "ratings_aggregate_failed_total",
        "Total number of failed rating aggregate recomputes"
    );

    // Reconciliation Metrics
    describe_counter!(
        "reconcile_sweeps_total",
        "Total number of reconciliation sweeps run"
    );
    describe_counter!(
        "reconcile_recipe_failures_total",
        "Total number of per-recipe failures during sweeps"
    );
    describe_histogram!(
        "reconcile_sweep_duration_seconds",
        "Time taken by a reconciliation sweep"
    );

    // Event Bus Metrics
    describe_counter!(
        "event_bus_events_published_total",
        "Total number of events published on the in-process bus"
    );
    describe_counter!(
        "event_bus_handler_failures_total",
        "Total number of event handler failures"
    );

    // Notification Metrics
    describe_counter!(
        "verification_codes_sent_total",
        "Total number of one-time codes handed to the notifier"
    );
}

/// Rating aggregate metrics recorder.
pub struct AggregateMetrics;

impl AggregateMetrics {
    /// Record a successful recompute.
    pub fn record_recompute() {
        counter!("ratings_aggregate_recomputed_total").increment(1);
    }

    /// Record a failed recompute.
    pub fn record_failure() {
        counter!("ratings_aggregate_failed_total").increment(1);
    }
}

/// Reconciliation sweep metrics recorder.
pub struct ReconcileMetrics;

impl ReconcileMetrics {
    /// Record a finished sweep.
    pub fn record_sweep(duration: Duration, failures: usize) {
        counter!("reconcile_sweeps_total").increment(1);
        counter!("reconcile_recipe_failures_total").increment(failures as u64);
        histogram!("reconcile_sweep_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Verification metrics recorder.
pub struct VerificationMetrics;

impl VerificationMetrics {
    /// Record a code handed to the notifier.
    pub fn record_code_sent() {
        counter!("verification_codes_sent_total").increment(1);
    }
}
