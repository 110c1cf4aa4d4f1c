//! # Batch Accumulator
//!
//! Per-worker buffer of consecutive inbound messages.
//!
//! ```text
//! Empty ──push──► Filling ──size reached / deadline──► Ready ──take──► Empty
//! ```
//!
//! The deadline is a monotonic instant set when the first message arrives.
//! The accumulator never sleeps; the owning worker waits on
//! [`BatchAccumulator::deadline`] in its own loop. With batching disabled
//! every message is released as a one-element batch and no deadline is set.

use conduit_types::{BatchSettings, InboundMessage, Offset, PartitionKey};
use std::collections::BTreeMap;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Empty,
    Filling,
    Ready,
}

/// Messages released together for one dispatch-and-commit cycle.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: Uuid,
    pub messages: Vec<InboundMessage>,
    /// Offsets of records consumed without producing a message (pending
    /// fragments, skipped records) that commit together with this batch.
    consumed: BTreeMap<PartitionKey, Offset>,
}

impl Batch {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            consumed: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn message_ids(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.message_id.clone()).collect()
    }

    fn holds(&self, partition: &PartitionKey) -> bool {
        self.consumed.contains_key(partition)
            || self.messages.iter().any(|m| &m.partition == partition)
    }

    /// Highest offset covered by this batch, per partition.
    pub fn commit_offsets(&self) -> Vec<(PartitionKey, Offset)> {
        let mut offsets = self.consumed.clone();
        for message in &self.messages {
            let entry = offsets
                .entry(message.partition.clone())
                .or_insert(message.offset);
            if message.offset > *entry {
                *entry = message.offset;
            }
        }
        offsets.into_iter().collect()
    }
}

pub struct BatchAccumulator {
    settings: BatchSettings,
    open: Option<Batch>,
    deadline: Option<Instant>,
}

impl BatchAccumulator {
    pub fn new(settings: BatchSettings) -> Self {
        Self {
            settings,
            open: None,
            deadline: None,
        }
    }

    pub fn state(&self) -> BatchState {
        match &self.open {
            None => BatchState::Empty,
            Some(batch) if batch.len() >= self.settings.effective_size() => BatchState::Ready,
            Some(_) if self.deadline.is_some_and(|d| Instant::now() >= d) => BatchState::Ready,
            Some(_) => BatchState::Filling,
        }
    }

    /// When the open batch must be released, if batching is enabled.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Append a message, opening a batch if none is open.
    pub fn push(&mut self, message: InboundMessage) -> BatchState {
        if self.open.is_none() {
            self.open = Some(Batch::new());
            if self.settings.enabled {
                self.deadline = Some(Instant::now() + self.settings.max_wait_time);
            }
        }

        if let Some(batch) = self.open.as_mut() {
            batch.messages.push(message);
        }

        self.state()
    }

    /// Attach the offset of a record consumed without a message to the open
    /// batch when that batch holds the partition.
    ///
    /// Returns `false` when the caller must commit the offset itself.
    pub fn track_consumed(&mut self, partition: &PartitionKey, offset: Offset) -> bool {
        let Some(batch) = self.open.as_mut() else {
            return false;
        };
        if !batch.holds(partition) {
            return false;
        }

        let entry = batch.consumed.entry(partition.clone()).or_insert(offset);
        if offset > *entry {
            *entry = offset;
        }
        true
    }

    /// Drop a revoked partition's messages and tracked offsets from the open
    /// batch. Returns how many messages were dropped.
    pub fn discard_partition(&mut self, partition: &PartitionKey) -> usize {
        let Some(batch) = self.open.as_mut() else {
            return 0;
        };

        let before = batch.messages.len();
        batch.messages.retain(|m| &m.partition != partition);
        batch.consumed.remove(partition);
        let dropped = before - batch.messages.len();

        if batch.messages.is_empty() {
            self.reset();
        }

        dropped
    }

    /// Release the open batch if it is ready.
    pub fn take_ready(&mut self) -> Option<Batch> {
        if self.state() == BatchState::Ready {
            self.take()
        } else {
            None
        }
    }

    /// Release the open batch regardless of its state.
    pub fn take(&mut self) -> Option<Batch> {
        self.deadline = None;
        self.open.take()
    }

    fn reset(&mut self) {
        self.open = None;
        self.deadline = None;
    }
}
