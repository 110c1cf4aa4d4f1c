//! # Runtime Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CONDUIT_TOPIC` | `conduit-inbound` | Endpoint consumed by the inbound connector |
//! | `CONDUIT_DLQ_TOPIC` | unset | Endpoint error policies may move messages to |
//! | `CONDUIT_CONSUMERS` | `1` | Consumption workers |
//! | `CONDUIT_PARTITIONS` | `1` | Partitions of the in-memory topics |
//! | `CONDUIT_BATCH_SIZE` | `1` | Batch size; batching is enabled above 1 |
//! | `CONDUIT_BATCH_MAX_WAIT_MS` | `1000` | Batch deadline |
//! | `CONDUIT_CHUNK_SIZE` | `0` | Producer chunk size; 0 disables chunking |
//! | `CONDUIT_CHUNK_MAX_AGE_SECS` | `300` | Age after which partial chunked messages are purged |
//! | `CONDUIT_ERROR_POLICIES` | `[]` | JSON list of error policy specifications |

use conduit_inbound::ErrorPolicySpec;
use conduit_types::{
    BatchSettings, ChunkSettings, ConfigError, Endpoint, InboundConnectorSettings,
};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub topic: String,
    pub dead_letter_topic: Option<String>,
    pub consumers: usize,
    pub partitions: u32,
    pub batch_size: usize,
    pub batch_max_wait: Duration,
    pub chunk_size: usize,
    pub chunk_max_age: Duration,
    pub error_policies: Vec<ErrorPolicySpec>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            topic: "conduit-inbound".to_string(),
            dead_letter_topic: None,
            consumers: 1,
            partitions: 1,
            batch_size: 1,
            batch_max_wait: Duration::from_millis(1000),
            chunk_size: 0,
            chunk_max_age: Duration::from_secs(300),
            error_policies: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            topic: lookup("CONDUIT_TOPIC").unwrap_or(defaults.topic),
            dead_letter_topic: lookup("CONDUIT_DLQ_TOPIC").filter(|t| !t.trim().is_empty()),
            consumers: parse(&lookup, "CONDUIT_CONSUMERS")?.unwrap_or(defaults.consumers),
            partitions: parse(&lookup, "CONDUIT_PARTITIONS")?.unwrap_or(defaults.partitions),
            batch_size: parse(&lookup, "CONDUIT_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            batch_max_wait: parse(&lookup, "CONDUIT_BATCH_MAX_WAIT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.batch_max_wait),
            chunk_size: parse(&lookup, "CONDUIT_CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            chunk_max_age: parse(&lookup, "CONDUIT_CHUNK_MAX_AGE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.chunk_max_age),
            error_policies: match lookup("CONDUIT_ERROR_POLICIES") {
                Some(json) => ErrorPolicySpec::parse_list(&json)?,
                None => defaults.error_policies,
            },
        };

        config.inbound_settings().validate()?;
        Ok(config)
    }

    pub fn inbound_settings(&self) -> InboundConnectorSettings {
        let batch = if self.batch_size > 1 {
            BatchSettings::enabled(self.batch_size, self.batch_max_wait)
        } else {
            BatchSettings::default()
        };

        InboundConnectorSettings {
            batch,
            consumers: self.consumers,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        let endpoint = Endpoint::new(self.topic.clone());
        if self.chunk_size > 0 {
            endpoint.with_chunking(ChunkSettings::enabled(self.chunk_size))
        } else {
            endpoint
        }
    }

    pub fn dead_letter_endpoint(&self) -> Option<Endpoint> {
        self.dead_letter_topic.as_ref().map(Endpoint::new)
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
