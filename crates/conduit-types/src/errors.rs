//! # Error Types
//!
//! - `ProcessingError` - recoverable failures routed through the error policy
//! - `ConfigError` - invalid settings, surfaced synchronously at bind time
//! - `BrokerError` - broker collaborator failures, abort the worker loop
//! - `ConnectorError` - why a consumption worker stopped

use crate::records::{Offset, PartitionKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a processing failure, matched by error policy filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A subscriber returned an error.
    Handler,
    /// The endpoint serializer could not decode the payload.
    Deserialization,
    /// The endpoint serializer could not encode an outbound message.
    Serialization,
    /// The chunk store could not be reached.
    ChunkStore,
    /// Application-defined classification.
    Custom(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler => write!(f, "handler"),
            Self::Deserialization => write!(f, "deserialization"),
            Self::Serialization => write!(f, "serialization"),
            Self::ChunkStore => write!(f, "chunk_store"),
            Self::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// A failure while processing a message or a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} failure: {message}")]
pub struct ProcessingError {
    pub kind: FailureKind,
    pub message: String,
}

impl ProcessingError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Handler, message)
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Deserialization, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Serialization, message)
    }

    pub fn chunk_store(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ChunkStore, message)
    }

    pub fn custom(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Custom(kind.into()), message)
    }
}

/// Invalid configuration detected before consumption starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("consumers must be greater or equal to 1, got {0}")]
    InvalidConsumers(usize),

    #[error("batch size must be greater or equal to 1 when batching is enabled")]
    InvalidBatchSize,

    #[error("batch max wait time must be greater than zero when batching is enabled")]
    InvalidBatchWaitTime,

    #[error("chunk size must be greater than zero when chunking is enabled")]
    InvalidChunkSize,

    #[error("endpoint name must not be empty")]
    EmptyEndpointName,

    #[error("endpoint '{0}' is already bound")]
    DuplicateBinding(String),

    #[error("invalid error policy: {0}")]
    InvalidErrorPolicy(String),

    #[error("unknown endpoint '{0}' referenced by error policy")]
    UnknownEndpoint(String),

    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Failure of the broker collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("broker connection lost: {0}")]
    ConnectionLost(String),

    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("partition {0} is not assigned to this consumer")]
    NotAssigned(PartitionKey),

    #[error("produce to '{topic}' failed: {reason}")]
    ProduceFailed { topic: String, reason: String },

    #[error("commit of {partition}@{offset} failed: {reason}")]
    CommitFailed {
        partition: PartitionKey,
        offset: Offset,
        reason: String,
    },
}

/// Why a consumption worker stopped consuming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    /// Exhausted retries or no matching policy. The offset was not committed.
    #[error("fatal failure processing message {message_id} at {partition}@{offset}: {reason}")]
    Fatal {
        message_id: String,
        partition: PartitionKey,
        offset: Offset,
        reason: String,
    },

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("connector is not started")]
    NotStarted,
}
