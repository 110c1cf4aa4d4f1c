//! # Message Serializers
//!
//! Contract between the pipeline and serialization codecs. Codec internals
//! are out of scope; only `serialize`/`deserialize` are used. Failures are
//! reported as `ProcessingError` so a bad payload goes through the error
//! policy like any other processing failure.

use crate::errors::ProcessingError;
use crate::headers::MessageHeaders;
use crate::records::MessageContent;

/// Information about where a payload is going to or coming from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationContext {
    pub endpoint_name: String,
}

impl SerializationContext {
    pub fn new(endpoint_name: impl Into<String>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
        }
    }
}

/// Serialization codec bound to an endpoint.
pub trait MessageSerializer: Send + Sync {
    /// Short codec name, used in logs.
    fn name(&self) -> &'static str;

    /// Encode a message body. The codec may add headers (e.g. content type).
    fn serialize(
        &self,
        content: &MessageContent,
        headers: &mut MessageHeaders,
        context: &SerializationContext,
    ) -> Result<Vec<u8>, ProcessingError>;

    /// Decode a payload.
    fn deserialize(
        &self,
        payload: &[u8],
        headers: &MessageHeaders,
        context: &SerializationContext,
    ) -> Result<MessageContent, ProcessingError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMessageSerializer;

impl MessageSerializer for JsonMessageSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(
        &self,
        content: &MessageContent,
        _headers: &mut MessageHeaders,
        context: &SerializationContext,
    ) -> Result<Vec<u8>, ProcessingError> {
        match content {
            MessageContent::Empty => Ok(Vec::new()),
            MessageContent::Json(value) => serde_json::to_vec(value).map_err(|e| {
                ProcessingError::serialization(format!("{}: {}", context.endpoint_name, e))
            }),
            MessageContent::Binary(_) => Err(ProcessingError::serialization(format!(
                "{}: json serializer cannot encode binary content",
                context.endpoint_name
            ))),
        }
    }

    fn deserialize(
        &self,
        payload: &[u8],
        _headers: &MessageHeaders,
        context: &SerializationContext,
    ) -> Result<MessageContent, ProcessingError> {
        if payload.is_empty() {
            return Ok(MessageContent::Empty);
        }

        serde_json::from_slice(payload)
            .map(MessageContent::Json)
            .map_err(|e| {
                ProcessingError::deserialization(format!("{}: {}", context.endpoint_name, e))
            })
    }
}

/// Pass-through codec for opaque payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryMessageSerializer;

impl MessageSerializer for BinaryMessageSerializer {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn serialize(
        &self,
        content: &MessageContent,
        _headers: &mut MessageHeaders,
        context: &SerializationContext,
    ) -> Result<Vec<u8>, ProcessingError> {
        match content {
            MessageContent::Empty => Ok(Vec::new()),
            MessageContent::Binary(bytes) => Ok(bytes.clone()),
            MessageContent::Json(value) => serde_json::to_vec(value).map_err(|e| {
                ProcessingError::serialization(format!("{}: {}", context.endpoint_name, e))
            }),
        }
    }

    fn deserialize(
        &self,
        payload: &[u8],
        _headers: &MessageHeaders,
        _context: &SerializationContext,
    ) -> Result<MessageContent, ProcessingError> {
        if payload.is_empty() {
            Ok(MessageContent::Empty)
        } else {
            Ok(MessageContent::Binary(payload.to_vec()))
        }
    }
}
