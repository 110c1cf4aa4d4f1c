//! Prometheus metrics for the Conduit pipelines.
//!
//! All metrics follow the naming convention `conduit_<metric>_<unit>` and
//! carry an `endpoint` label where they relate to a single endpoint.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::time::Instant;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // INBOUND METRICS
    // =========================================================================

    /// Raw records received from the broker
    pub static ref RECORDS_CONSUMED: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_records_consumed_total", "Raw records received from the broker"),
        &["endpoint"]
    ).expect("metric creation failed");

    /// Batches handed to subscribers
    pub static ref BATCHES_DISPATCHED: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_batches_dispatched_total", "Batches dispatched to subscribers"),
        &["endpoint"]
    ).expect("metric creation failed");

    /// Messages handed to subscribers
    pub static ref MESSAGES_DISPATCHED: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_messages_dispatched_total", "Messages dispatched to subscribers"),
        &["endpoint"]
    ).expect("metric creation failed");

    /// Batch dispatch duration, including subscriber time
    pub static ref BATCH_DISPATCH_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "conduit_batch_dispatch_duration_seconds",
            "Time spent dispatching a batch to subscribers"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("bucket creation failed")),
        &["endpoint"]
    ).expect("metric creation failed");

    /// Chunked messages whose fragments are held in the chunk store
    pub static ref CHUNKS_PENDING: IntGauge = IntGauge::new(
        "conduit_chunks_pending",
        "Chunked messages with fragments held in the chunk store"
    ).expect("metric creation failed");

    // =========================================================================
    // ERROR POLICY METRICS
    // =========================================================================

    pub static ref RETRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_retries_total", "Processing attempts retried by the error policy"),
        &["endpoint"]
    ).expect("metric creation failed");

    pub static ref MESSAGES_SKIPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_messages_skipped_total", "Messages skipped by the error policy"),
        &["endpoint"]
    ).expect("metric creation failed");

    pub static ref MESSAGES_MOVED: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_messages_moved_total", "Messages moved to another endpoint"),
        &["endpoint"]
    ).expect("metric creation failed");

    /// Workers stopped by an unrecoverable failure
    pub static ref FATAL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_fatal_failures_total", "Workers stopped by a fatal failure"),
        &["endpoint"]
    ).expect("metric creation failed");

    pub static ref OFFSETS_COMMITTED: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_offsets_committed_total", "Offset commits sent to the broker"),
        &["endpoint"]
    ).expect("metric creation failed");

    // =========================================================================
    // OUTBOUND METRICS
    // =========================================================================

    /// Broker records produced, one per chunk for chunked messages
    pub static ref MESSAGES_PRODUCED: IntCounterVec = IntCounterVec::new(
        Opts::new("conduit_records_produced_total", "Records produced to the broker"),
        &["endpoint"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Inbound
        Box::new(RECORDS_CONSUMED.clone()),
        Box::new(BATCHES_DISPATCHED.clone()),
        Box::new(MESSAGES_DISPATCHED.clone()),
        Box::new(BATCH_DISPATCH_DURATION.clone()),
        Box::new(CHUNKS_PENDING.clone()),
        // Error policy
        Box::new(RETRIES.clone()),
        Box::new(MESSAGES_SKIPPED.clone()),
        Box::new(MESSAGES_MOVED.clone()),
        Box::new(FATAL_FAILURES.clone()),
        Box::new(OFFSETS_COMMITTED.clone()),
        // Outbound
        Box::new(MESSAGES_PRODUCED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Observes [`BATCH_DISPATCH_DURATION`] for an endpoint when dropped.
pub struct BatchTimer {
    endpoint: String,
    start: Instant,
}

impl BatchTimer {
    pub fn start(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for BatchTimer {
    fn drop(&mut self) {
        BATCH_DISPATCH_DURATION
            .with_label_values(&[self.endpoint.as_str()])
            .observe(self.start.elapsed().as_secs_f64());
    }
}
