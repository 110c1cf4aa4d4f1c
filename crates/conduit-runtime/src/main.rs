//! Conduit host executable.

use anyhow::{Context, Result};
use conduit_runtime::{ConduitRuntime, RuntimeConfig};
use conduit_telemetry::{init_logging, register_metrics, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    init_logging(&telemetry).context("Failed to initialize logging")?;
    register_metrics().context("Failed to register metrics")?;

    info!(service = %telemetry.service_name, "Loading configuration");
    let config = RuntimeConfig::from_env().context("Invalid configuration")?;

    let mut runtime = ConduitRuntime::new(config)?;
    runtime.start().await?;

    info!("Conduit is running. Press Ctrl+C to stop.");
    runtime.wait_for_shutdown().await?;

    runtime.shutdown().await
}
