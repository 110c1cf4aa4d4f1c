//! # Chunks
//!
//! Oversized payloads are split by the producer into fragments that travel
//! as separate records sharing the same `x-message-id`. Each fragment carries
//! its `x-chunk-index` and the total `x-chunks-count`.

use crate::errors::{ConfigError, ProcessingError};
use crate::headers::{header_names, MessageHeaders};
use crate::records::RawRecord;

/// One fragment of a chunked message.
///
/// Invariant: `index < count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub message_id: String,
    pub index: u32,
    pub count: u32,
    pub fragment: Vec<u8>,
}

impl Chunk {
    /// Extract the chunk described by a record's headers.
    ///
    /// Returns `Ok(None)` for unchunked records. Missing message ids,
    /// unparsable indices and `index >= count` are deserialization failures.
    pub fn from_record(record: &RawRecord) -> Result<Option<Self>, ProcessingError> {
        if !record.is_chunk() {
            return Ok(None);
        }

        let message_id = record.message_id().ok_or_else(|| {
            ProcessingError::deserialization("chunked record without x-message-id header")
        })?;
        let index = parse_header(&record.headers, header_names::CHUNK_INDEX)?;
        let count = parse_header(&record.headers, header_names::CHUNKS_COUNT)?;

        if count == 0 || index >= count {
            return Err(ProcessingError::deserialization(format!(
                "invalid chunk {} of {} for message {}",
                index, count, message_id
            )));
        }

        Ok(Some(Self {
            message_id: message_id.to_string(),
            index,
            count,
            fragment: record.payload.clone(),
        }))
    }

    /// Write the chunk headers onto a header set.
    pub fn write_headers(&self, headers: &mut MessageHeaders) {
        headers.add_or_replace(header_names::MESSAGE_ID, &self.message_id);
        headers.add_or_replace(header_names::CHUNK_INDEX, self.index);
        headers.add_or_replace(header_names::CHUNKS_COUNT, self.count);
    }
}

fn parse_header(headers: &MessageHeaders, name: &str) -> Result<u32, ProcessingError> {
    match headers.get_parsed::<u32>(name) {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(ProcessingError::deserialization(format!(
            "invalid {} header: {}",
            name, e
        ))),
        None => Err(ProcessingError::deserialization(format!(
            "missing {} header",
            name
        ))),
    }
}

/// Split a payload into fragments of at most `size` bytes.
///
/// An empty payload still produces a single empty chunk so the consumer
/// receives exactly one logical message.
pub fn split_payload(
    message_id: &str,
    payload: &[u8],
    size: usize,
) -> Result<Vec<Chunk>, ConfigError> {
    if size == 0 {
        return Err(ConfigError::InvalidChunkSize);
    }

    if payload.is_empty() {
        return Ok(vec![Chunk {
            message_id: message_id.to_string(),
            index: 0,
            count: 1,
            fragment: Vec::new(),
        }]);
    }

    let parts: Vec<&[u8]> = payload.chunks(size).collect();
    let count = parts.len() as u32;

    Ok(parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| Chunk {
            message_id: message_id.to_string(),
            index: i as u32,
            count,
            fragment: part.to_vec(),
        })
        .collect())
}
