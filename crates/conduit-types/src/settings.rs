//! # Settings
//!
//! Configuration consumed by the pipeline. Every settings struct validates
//! itself; the inbound connector calls `validate()` at bind time so invalid
//! values never reach a running worker.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Producer-side chunking of oversized payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSettings {
    /// Maximum bytes per fragment.
    pub size: usize,
    pub enabled: bool,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            size: 0,
            enabled: false,
        }
    }
}

impl ChunkSettings {
    pub fn enabled(size: usize) -> Self {
        Self {
            size,
            enabled: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }
}

/// Consumer-side batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Maximum messages per batch.
    pub size: usize,
    /// Maximum time between the first message of a batch and its release.
    pub max_wait_time: Duration,
    pub enabled: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            size: 1,
            max_wait_time: Duration::from_secs(1),
            enabled: false,
        }
    }
}

impl BatchSettings {
    pub fn enabled(size: usize, max_wait_time: Duration) -> Self {
        Self {
            size,
            max_wait_time,
            enabled: true,
        }
    }

    /// Batch size actually applied: 1 when batching is disabled.
    pub fn effective_size(&self) -> usize {
        if self.enabled {
            self.size
        } else {
            1
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.size < 1 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.max_wait_time.is_zero() {
            return Err(ConfigError::InvalidBatchWaitTime);
        }
        Ok(())
    }
}

/// Settings of one endpoint binding on the inbound connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundConnectorSettings {
    pub batch: BatchSettings,
    /// Number of parallel consumption workers (default: 1).
    pub consumers: usize,
}

impl Default for InboundConnectorSettings {
    fn default() -> Self {
        Self {
            batch: BatchSettings::default(),
            consumers: 1,
        }
    }
}

impl InboundConnectorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batch.validate()?;
        if self.consumers < 1 {
            return Err(ConfigError::InvalidConsumers(self.consumers));
        }
        Ok(())
    }
}
