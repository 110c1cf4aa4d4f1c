//! # Records and Messages
//!
//! - `RawRecord` - what the broker delivers: partition, offset, headers, bytes
//! - `InboundMessage` - a record (or a reassembled chunk sequence) after
//!   deserialization, ready for dispatch
//! - `OutboundMessage` - an application message before serialization

use crate::headers::{header_names, MessageHeaders};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fresh `x-message-id` value.
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Identifies one ordered substream of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub topic: String,
    pub partition: u32,
}

impl PartitionKey {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition)
    }
}

/// Position of a record within its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Offset(pub u64);

impl Offset {
    /// The position a consumer resumes from after committing this offset.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub partition: PartitionKey,
    pub offset: Offset,
    pub headers: MessageHeaders,
    pub payload: Vec<u8>,
}

impl RawRecord {
    /// The `x-message-id` header, if present.
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get(header_names::MESSAGE_ID)
    }

    /// Whether this record is one fragment of a chunked message.
    pub fn is_chunk(&self) -> bool {
        self.headers.contains(header_names::CHUNK_INDEX)
            && self.headers.contains(header_names::CHUNKS_COUNT)
    }
}

/// Deserialized message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageContent {
    /// Null or zero-length payload.
    Empty,
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl MessageContent {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// A message ready to be dispatched to subscribers.
///
/// For chunked messages `offset` is the offset of the fragment that
/// completed reassembly.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub message_id: String,
    pub partition: PartitionKey,
    pub offset: Offset,
    pub headers: MessageHeaders,
    pub content: MessageContent,
    /// The (reassembled) payload the content was deserialized from.
    pub raw_payload: Vec<u8>,
}

impl InboundMessage {
    /// The `x-message-type` header, if present.
    pub fn message_type(&self) -> Option<&str> {
        self.headers.get(header_names::MESSAGE_TYPE)
    }

    /// Number of failed attempts recorded in the `x-failed-attempts` header.
    pub fn failed_attempts(&self) -> u32 {
        self.headers
            .get_parsed::<u32>(header_names::FAILED_ATTEMPTS)
            .and_then(Result::ok)
            .unwrap_or(0)
    }
}

/// An application message about to be produced.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub message_type: String,
    pub content: MessageContent,
    pub headers: MessageHeaders,
    /// Partitioning key; messages with the same key keep their order.
    pub key: Option<String>,
}

impl OutboundMessage {
    pub fn json(message_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            message_type: message_type.into(),
            content: MessageContent::Json(value),
            headers: MessageHeaders::new(),
            key: None,
        }
    }

    pub fn binary(message_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            message_type: message_type.into(),
            content: MessageContent::Binary(bytes),
            headers: MessageHeaders::new(),
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.add_or_replace(name, value);
        self
    }
}
