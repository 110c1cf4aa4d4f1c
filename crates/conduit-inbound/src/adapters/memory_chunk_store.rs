//! # In-Memory Chunk Store
//!
//! Lock-striped map of `message_id -> (index -> fragment)`. A message id
//! always hashes to the same shard, so writers for different messages
//! rarely contend and writers for the same message serialize on one mutex.
//!
//! Partial messages whose remaining fragments never arrive are released by
//! [`InMemoryChunkStore::purge_expired`], which the host calls periodically.

use crate::ports::chunk_store::{ChunkStore, ChunkStoreError};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 16;

struct PendingMessage {
    count: u32,
    fragments: BTreeMap<u32, Vec<u8>>,
    first_seen: Instant,
}

pub struct InMemoryChunkStore {
    shards: Vec<Mutex<HashMap<String, PendingMessage>>>,
}

impl InMemoryChunkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    #[must_use]
    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1))
                .map(|_| Mutex::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, message_id: &str) -> &Mutex<HashMap<String, PendingMessage>> {
        let mut hasher = DefaultHasher::new();
        message_id.hash(&mut hasher);
        &self.shards[(hasher.finish() % self.shards.len() as u64) as usize]
    }

    /// Number of messages with at least one stored fragment.
    pub fn pending_messages(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Discard partial messages whose first fragment is older than `max_age`.
    ///
    /// Returns the purged message ids.
    pub fn purge_expired(&self, max_age: Duration) -> Vec<String> {
        let mut purged = Vec::new();

        for shard in &self.shards {
            let mut pending = shard.lock();
            pending.retain(|message_id, message| {
                let expired = message.first_seen.elapsed() >= max_age;
                if expired {
                    purged.push(message_id.clone());
                }
                !expired
            });
        }

        if !purged.is_empty() {
            warn!(
                count = purged.len(),
                max_age_ms = max_age.as_millis() as u64,
                "Purged incomplete chunked messages"
            );
        }

        purged
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for InMemoryChunkStore {
    fn store_chunk(
        &self,
        message_id: &str,
        index: u32,
        count: u32,
        fragment: Vec<u8>,
    ) -> Result<(), ChunkStoreError> {
        if index >= count {
            return Err(ChunkStoreError::IndexOutOfRange {
                message_id: message_id.to_string(),
                index,
                count,
            });
        }

        let mut pending = self.shard(message_id).lock();
        let message = pending
            .entry(message_id.to_string())
            .or_insert_with(|| PendingMessage {
                count,
                fragments: BTreeMap::new(),
                first_seen: Instant::now(),
            });

        if message.count != count {
            return Err(ChunkStoreError::InconsistentCount {
                message_id: message_id.to_string(),
                expected: message.count,
                actual: count,
            });
        }

        message.fragments.insert(index, fragment);
        Ok(())
    }

    fn chunk_count(&self, message_id: &str) -> Result<usize, ChunkStoreError> {
        Ok(self
            .shard(message_id)
            .lock()
            .get(message_id)
            .map_or(0, |m| m.fragments.len()))
    }

    fn reassemble(
        &self,
        message_id: &str,
        declared_count: u32,
    ) -> Result<Option<Vec<u8>>, ChunkStoreError> {
        let pending = self.shard(message_id).lock();
        let Some(message) = pending.get(message_id) else {
            return Ok(None);
        };

        if message.fragments.len() != declared_count as usize {
            return Ok(None);
        }

        // BTreeMap iterates in ascending index order
        Ok(Some(message.fragments.values().flatten().copied().collect()))
    }

    fn discard(&self, message_id: &str) -> Result<(), ChunkStoreError> {
        if self.shard(message_id).lock().remove(message_id).is_some() {
            debug!(message_id = message_id, "Chunks discarded");
        }
        Ok(())
    }
}
