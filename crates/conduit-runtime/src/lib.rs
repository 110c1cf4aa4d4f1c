//! # Conduit Runtime
//!
//! Host for the Conduit pipelines. The binary loads [`RuntimeConfig`] from
//! the environment, initializes telemetry and runs a [`ConduitRuntime`]
//! until ctrl-c or until a consumption worker stops.
//!
//! ## Modules
//!
//! - `config` - environment driven configuration
//! - `runtime` - wiring, background tasks and graceful shutdown

pub mod config;
pub mod runtime;

pub use config::RuntimeConfig;
pub use runtime::{purge_abandoned, ConduitRuntime, LoggingHandler};
