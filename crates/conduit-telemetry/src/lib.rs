//! # Conduit Telemetry
//!
//! Logging and metrics shared by every Conduit crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use conduit_telemetry::{init_logging, register_metrics, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! register_metrics()?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CONDUIT_SERVICE_NAME` | `conduit` | Service name attached to startup logs |
//! | `CONDUIT_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `CONDUIT_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |
//! | `CONDUIT_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, BatchTimer, BATCHES_DISPATCHED, BATCH_DISPATCH_DURATION,
    CHUNKS_PENDING, FATAL_FAILURES, MESSAGES_DISPATCHED, MESSAGES_MOVED, MESSAGES_PRODUCED,
    MESSAGES_SKIPPED, OFFSETS_COMMITTED, RECORDS_CONSUMED, RETRIES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Convenience macro for incrementing a per-endpoint counter.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr, $endpoint:expr) => {
        $metric.with_label_values(&[$endpoint]).inc()
    };
    ($metric:expr, $endpoint:expr, $by:expr) => {
        $metric.with_label_values(&[$endpoint]).inc_by($by)
    };
}
