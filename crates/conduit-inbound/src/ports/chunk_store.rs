//! # Chunk Store Port
//!
//! Shared storage of message fragments. Implementations must be safe under
//! concurrent calls for different message ids and for the same message id
//! (redelivery after a retry or a rebalance).

use conduit_types::ProcessingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkStoreError {
    #[error("chunk {index} out of range for message {message_id} with {count} chunks")]
    IndexOutOfRange {
        message_id: String,
        index: u32,
        count: u32,
    },

    #[error("message {message_id} declared {expected} chunks, fragment declares {actual}")]
    InconsistentCount {
        message_id: String,
        expected: u32,
        actual: u32,
    },

    #[error("chunk store unavailable: {0}")]
    Unavailable(String),
}

/// Only an unreachable store is a chunk store failure. A fragment that
/// contradicts the stored state is bad input, as a payload that cannot be
/// decoded, and can be skipped or moved like one.
impl From<ChunkStoreError> for ProcessingError {
    fn from(e: ChunkStoreError) -> Self {
        match e {
            ChunkStoreError::Unavailable(_) => ProcessingError::chunk_store(e.to_string()),
            ChunkStoreError::IndexOutOfRange { .. } | ChunkStoreError::InconsistentCount { .. } => {
                ProcessingError::deserialization(e.to_string())
            }
        }
    }
}

/// Fragment storage used by the chunk reassembler.
///
/// Only these four operations are exposed; the store's internal maps never
/// leave the implementation.
pub trait ChunkStore: Send + Sync {
    /// Store one fragment. Storing the same `(message_id, index)` twice
    /// overwrites the fragment without changing the count.
    fn store_chunk(
        &self,
        message_id: &str,
        index: u32,
        count: u32,
        fragment: Vec<u8>,
    ) -> Result<(), ChunkStoreError>;

    /// Number of distinct fragment indices stored (0 if unseen).
    fn chunk_count(&self, message_id: &str) -> Result<usize, ChunkStoreError>;

    /// The fragments concatenated in ascending index order, only when the
    /// number of stored fragments equals `declared_count`.
    fn reassemble(
        &self,
        message_id: &str,
        declared_count: u32,
    ) -> Result<Option<Vec<u8>>, ChunkStoreError>;

    /// Release every fragment of a message.
    fn discard(&self, message_id: &str) -> Result<(), ChunkStoreError>;
}
