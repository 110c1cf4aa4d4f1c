//! # Chunk Reassembler
//!
//! On each fragment: store it and, when every fragment is present, hand back
//! the full payload. The fragments stay in the store until the worker has
//! committed the offset of the completed message and calls
//! [`ChunkReassembler::release`]. A message that fails fatally, or whose
//! partition moves before the commit, can therefore be rebuilt from the
//! store when its last fragment is redelivered.
//!
//! Store and reassembly run under a lock striped by message id, so two
//! workers delivering the last fragments of the same message concurrently
//! observe exactly one `Complete`.

use crate::ports::chunk_store::{ChunkStore, ChunkStoreError};
use conduit_telemetry::CHUNKS_PENDING;
use conduit_types::Chunk;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

const LOCK_STRIPES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyOutcome {
    /// All fragments present; the payload in ascending index order.
    Complete(Vec<u8>),
    /// Fragment stored, message still incomplete.
    Pending { received: usize, expected: u32 },
}

pub struct ChunkReassembler {
    store: Arc<dyn ChunkStore>,
    stripes: Vec<Mutex<()>>,
}

impl ChunkReassembler {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self {
            store,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe(&self, message_id: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        message_id.hash(&mut hasher);
        &self.stripes[(hasher.finish() % LOCK_STRIPES as u64) as usize]
    }

    /// Store one fragment and reassemble the message if it is complete.
    ///
    /// Store errors are returned as-is; a fragment is never dropped silently.
    pub fn accept(&self, chunk: &Chunk) -> Result<ReassemblyOutcome, ChunkStoreError> {
        let _guard = self.stripe(&chunk.message_id).lock();

        let first = self.store.chunk_count(&chunk.message_id)? == 0;
        self.store.store_chunk(
            &chunk.message_id,
            chunk.index,
            chunk.count,
            chunk.fragment.clone(),
        )?;
        if first {
            CHUNKS_PENDING.inc();
        }

        match self.store.reassemble(&chunk.message_id, chunk.count)? {
            Some(payload) => {
                debug!(
                    message_id = %chunk.message_id,
                    chunks = chunk.count,
                    bytes = payload.len(),
                    "Chunked message reassembled"
                );
                Ok(ReassemblyOutcome::Complete(payload))
            }
            None => Ok(ReassemblyOutcome::Pending {
                received: self.store.chunk_count(&chunk.message_id)?,
                expected: chunk.count,
            }),
        }
    }

    /// Drop the stored fragments of a message whose offset is committed.
    ///
    /// Releasing an unknown or already released message is a no-op.
    pub fn release(&self, message_id: &str) -> Result<(), ChunkStoreError> {
        let _guard = self.stripe(message_id).lock();

        if self.store.chunk_count(message_id)? == 0 {
            return Ok(());
        }
        self.store.discard(message_id)?;
        CHUNKS_PENDING.dec();
        trace!(message_id = message_id, "Chunk store entries released");
        Ok(())
    }
}
