//! # Consumption Worker
//!
//! One worker per configured consumer. It owns a broker group membership
//! and processes its event channel strictly in order:
//!
//! ```text
//! record ──► chunk reassembly ──► deserialize ──► batch accumulator
//!                                                      │ Ready
//!                                                      ▼
//!                      commit ◄── success ◄── subscriber dispatch
//!                                   failure ──► error policy ──► retry / commit / move / fatal
//! ```
//!
//! Failures before the batch stage (chunk store, deserialization) go
//! through the same error policy as handler failures, one record at a time.
//! Offsets of records that produce no message (pending fragments, skipped
//! or moved records) ride along with the open batch when it holds their
//! partition, and are committed directly otherwise. Commits are monotonic
//! per partition.
//!
//! The fragments of a reassembled message stay in the chunk store until the
//! message's own offset is committed. A fatal failure, a crash or a
//! revocation before that commit leaves them in place, and the redelivered
//! last fragment rebuilds the message.

use crate::dispatcher::Dispatcher;
use crate::domain::batch::{Batch, BatchAccumulator, BatchState};
use crate::domain::policy::{Decision, ErrorPolicy, FailureContext};
use crate::domain::reassembler::{ChunkReassembler, ReassemblyOutcome};
use conduit_bus::{Broker, ConsumerEvent, MemberId};
use conduit_telemetry::{
    metric_inc, BatchTimer, BATCHES_DISPATCHED, FATAL_FAILURES, MESSAGES_DISPATCHED,
    MESSAGES_MOVED, MESSAGES_SKIPPED, OFFSETS_COMMITTED, RECORDS_CONSUMED, RETRIES,
};
use conduit_types::{
    header_names, BrokerError, Chunk, ConnectorError, Endpoint, FailureKind, InboundMessage,
    MessageHeaders, Offset, PartitionKey, ProcessingError, RawRecord,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Result of one pipeline stage for a record.
enum Staged<T> {
    Ready(T),
    /// The record was consumed without a message; its offset is handled.
    Consumed,
    Stop,
}

enum Resolution {
    Retry,
    Handled,
    Interrupted,
}

/// Messages and offsets affected by a failure.
struct FailedUnit {
    message_ids: Vec<String>,
    offsets: Vec<(PartitionKey, Offset)>,
    /// What a move republishes: headers and payload per message.
    payloads: Vec<(MessageHeaders, Vec<u8>)>,
}

impl FailedUnit {
    fn record(record: &RawRecord, payload: Vec<u8>, attempts: u32) -> Self {
        let mut headers = record.headers.clone();
        let previous = headers
            .get_parsed::<u32>(header_names::FAILED_ATTEMPTS)
            .and_then(Result::ok)
            .unwrap_or(0);
        headers.add_or_replace(header_names::FAILED_ATTEMPTS, previous + attempts);

        Self {
            message_ids: vec![message_id_of(record)],
            offsets: vec![(record.partition.clone(), record.offset)],
            payloads: vec![(headers, payload)],
        }
    }

    fn batch(batch: &Batch) -> Self {
        Self {
            message_ids: batch.message_ids(),
            offsets: batch.commit_offsets(),
            payloads: batch
                .messages
                .iter()
                .map(|m| (m.headers.clone(), m.raw_payload.clone()))
                .collect(),
        }
    }
}

/// A reassembled message whose fragments await the commit of its offset.
#[derive(Debug, Clone)]
pub(crate) struct HeldMessage {
    partition: PartitionKey,
    offset: Offset,
    message_id: String,
}

fn message_id_of(record: &RawRecord) -> String {
    record
        .message_id()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}@{}", record.partition, record.offset))
}

pub(crate) struct ConsumptionWorker {
    pub(crate) index: usize,
    pub(crate) endpoint: Arc<Endpoint>,
    pub(crate) member: MemberId,
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) reassembler: Arc<ChunkReassembler>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) policy: ErrorPolicy,
    pub(crate) batch: BatchAccumulator,
    pub(crate) committed: HashMap<PartitionKey, Offset>,
    pub(crate) held: Vec<HeldMessage>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl ConsumptionWorker {
    /// Consume until shutdown, channel closure or a fatal failure.
    ///
    /// A fatal failure leaves the group membership in place so the worker's
    /// partitions are not consumed again until the host restarts it.
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ConsumerEvent>,
    ) -> Result<(), ConnectorError> {
        info!(
            endpoint = %self.endpoint.name,
            worker = self.index,
            member = %self.member,
            "Consumption worker started"
        );

        let result = self.consume(&mut events).await;

        if let Some(batch) = self.batch.take() {
            debug!(
                endpoint = %self.endpoint.name,
                worker = self.index,
                messages = batch.len(),
                "Unfinished batch dropped without commit"
            );
        }

        match &result {
            Err(ConnectorError::Fatal { .. }) => {
                error!(
                    endpoint = %self.endpoint.name,
                    worker = self.index,
                    member = %self.member,
                    "Worker stopped; its partitions stay assigned until restart"
                );
            }
            _ => {
                if let Err(e) = self.broker.unsubscribe(self.member).await {
                    warn!(member = %self.member, error = %e, "Failed to leave consumer group");
                }
                info!(
                    endpoint = %self.endpoint.name,
                    worker = self.index,
                    "Consumption worker stopped"
                );
            }
        }

        result
    }

    async fn consume(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<ConsumerEvent>,
    ) -> Result<(), ConnectorError> {
        loop {
            if *self.shutdown.borrow() {
                return Ok(());
            }

            let deadline = self.batch.deadline();

            let flow = tokio::select! {
                biased;

                _ = self.shutdown.changed() => Flow::Stop,

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.dispatch_ready().await?
                }

                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => {
                        info!(endpoint = %self.endpoint.name, worker = self.index, "Event channel closed");
                        Flow::Stop
                    }
                },
            };

            if flow == Flow::Stop {
                return Ok(());
            }
        }
    }

    async fn handle_event(&mut self, event: ConsumerEvent) -> Result<Flow, ConnectorError> {
        match event {
            ConsumerEvent::Record(record) => self.handle_record(record).await,
            ConsumerEvent::PartitionsAssigned(partitions) => {
                info!(
                    endpoint = %self.endpoint.name,
                    worker = self.index,
                    partitions = ?partitions,
                    "Partitions assigned"
                );
                Ok(Flow::Continue)
            }
            ConsumerEvent::PartitionsRevoked(partitions) => {
                for partition in &partitions {
                    let dropped = self.batch.discard_partition(partition);
                    self.committed.remove(partition);
                    self.held.retain(|held| held.partition != *partition);
                    if dropped > 0 {
                        warn!(
                            partition = %partition,
                            dropped = dropped,
                            "Revoked partition removed from uncommitted batch"
                        );
                    }
                }
                info!(
                    endpoint = %self.endpoint.name,
                    worker = self.index,
                    partitions = ?partitions,
                    "Partitions revoked"
                );
                Ok(Flow::Continue)
            }
            ConsumerEvent::Error(e) => {
                error!(endpoint = %self.endpoint.name, worker = self.index, error = %e, "Broker failure");
                Err(e.into())
            }
        }
    }

    async fn handle_record(&mut self, record: RawRecord) -> Result<Flow, ConnectorError> {
        metric_inc!(RECORDS_CONSUMED, self.endpoint.name.as_str());
        trace!(partition = %record.partition, offset = %record.offset, "Record received");

        let payload = match self.reassemble(&record).await? {
            Staged::Ready(payload) => payload,
            Staged::Consumed => return Ok(Flow::Continue),
            Staged::Stop => return Ok(Flow::Stop),
        };

        let message = match self.deserialize(&record, payload).await? {
            Staged::Ready(message) => message,
            Staged::Consumed => return Ok(Flow::Continue),
            Staged::Stop => return Ok(Flow::Stop),
        };

        if self.batch.push(message) == BatchState::Ready {
            return self.dispatch_ready().await;
        }
        Ok(Flow::Continue)
    }

    async fn reassemble(&mut self, record: &RawRecord) -> Result<Staged<Vec<u8>>, ConnectorError> {
        let mut attempts = 0;

        loop {
            let outcome = Chunk::from_record(record).and_then(|chunk| match chunk {
                None => Ok((ReassemblyOutcome::Complete(record.payload.clone()), None)),
                Some(chunk) => self
                    .reassembler
                    .accept(&chunk)
                    .map(|outcome| (outcome, Some(chunk.message_id)))
                    .map_err(ProcessingError::from),
            });

            match outcome {
                Ok((ReassemblyOutcome::Complete(payload), chunked)) => {
                    if let Some(message_id) = chunked {
                        self.held.push(HeldMessage {
                            partition: record.partition.clone(),
                            offset: record.offset,
                            message_id,
                        });
                    }
                    return Ok(Staged::Ready(payload));
                }
                Ok((ReassemblyOutcome::Pending { received, expected }, _)) => {
                    debug!(
                        partition = %record.partition,
                        offset = %record.offset,
                        received = received,
                        expected = expected,
                        "Fragment stored, message incomplete"
                    );
                    self.commit_consumed(&record.partition, record.offset).await?;
                    return Ok(Staged::Consumed);
                }
                Err(failure) => {
                    attempts += 1;
                    let unit = FailedUnit::record(record, record.payload.clone(), attempts);
                    match self.resolve(&failure, attempts, &unit).await? {
                        Resolution::Retry => continue,
                        Resolution::Handled => return Ok(Staged::Consumed),
                        Resolution::Interrupted => return Ok(Staged::Stop),
                    }
                }
            }
        }
    }

    async fn deserialize(
        &mut self,
        record: &RawRecord,
        payload: Vec<u8>,
    ) -> Result<Staged<InboundMessage>, ConnectorError> {
        let context = self.endpoint.serialization_context();
        let mut headers = record.headers.clone();
        headers.remove(header_names::CHUNK_INDEX);
        headers.remove(header_names::CHUNKS_COUNT);
        let mut attempts = 0;

        loop {
            let result = self
                .endpoint
                .serializer
                .deserialize(&payload, &headers, &context);

            match result {
                Ok(content) => {
                    return Ok(Staged::Ready(InboundMessage {
                        message_id: message_id_of(record),
                        partition: record.partition.clone(),
                        offset: record.offset,
                        headers,
                        content,
                        raw_payload: payload,
                    }));
                }
                Err(failure) => {
                    attempts += 1;
                    // A reassembled payload is moved as one record
                    let mut unit = FailedUnit::record(record, payload.clone(), attempts);
                    for (moved, _) in &mut unit.payloads {
                        moved.remove(header_names::CHUNK_INDEX);
                        moved.remove(header_names::CHUNKS_COUNT);
                    }
                    match self.resolve(&failure, attempts, &unit).await? {
                        Resolution::Retry => continue,
                        Resolution::Handled => return Ok(Staged::Consumed),
                        Resolution::Interrupted => return Ok(Staged::Stop),
                    }
                }
            }
        }
    }

    async fn dispatch_ready(&mut self) -> Result<Flow, ConnectorError> {
        match self.batch.take_ready() {
            Some(batch) => self.dispatch(batch).await,
            None => Ok(Flow::Continue),
        }
    }

    async fn dispatch(&mut self, mut batch: Batch) -> Result<Flow, ConnectorError> {
        let mut attempts = 0;

        loop {
            let result = {
                let _timer = BatchTimer::start(&self.endpoint.name);
                self.dispatcher.dispatch(&batch.messages).await
            };

            match result {
                Ok(deliveries) => {
                    metric_inc!(BATCHES_DISPATCHED, self.endpoint.name.as_str());
                    metric_inc!(
                        MESSAGES_DISPATCHED,
                        self.endpoint.name.as_str(),
                        batch.len() as u64
                    );
                    debug!(
                        endpoint = %self.endpoint.name,
                        batch_id = %batch.id,
                        messages = batch.len(),
                        deliveries = deliveries,
                        "Batch dispatched"
                    );
                    self.commit_offsets(&batch.commit_offsets()).await?;
                    return Ok(Flow::Continue);
                }
                Err(failure) => {
                    attempts += 1;
                    for message in &mut batch.messages {
                        let failed = message.failed_attempts() + 1;
                        message
                            .headers
                            .add_or_replace(header_names::FAILED_ATTEMPTS, failed);
                    }
                    let unit = FailedUnit::batch(&batch);
                    match self.resolve(&failure, attempts, &unit).await? {
                        Resolution::Retry => continue,
                        Resolution::Handled => return Ok(Flow::Continue),
                        Resolution::Interrupted => return Ok(Flow::Stop),
                    }
                }
            }
        }
    }

    /// Apply the error policy to a failure and carry out its decision.
    async fn resolve(
        &mut self,
        failure: &ProcessingError,
        attempts: u32,
        unit: &FailedUnit,
    ) -> Result<Resolution, ConnectorError> {
        let context = FailureContext {
            endpoint: self.endpoint.name.clone(),
            failed_attempts: attempts,
            message_ids: unit.message_ids.clone(),
            offsets: unit.offsets.clone(),
        };

        let mut decision = self.policy.apply(failure, &context);

        // Dropping a fragment would corrupt later reassembly
        if failure.kind == FailureKind::ChunkStore
            && matches!(decision, Decision::Commit | Decision::MoveTo(_))
        {
            warn!(
                endpoint = %self.endpoint.name,
                error = %failure,
                "Chunk store failure cannot be skipped or moved"
            );
            decision = Decision::Fatal;
        }

        match decision {
            Decision::RetryAfter(delay) => {
                metric_inc!(RETRIES, self.endpoint.name.as_str());
                warn!(
                    endpoint = %self.endpoint.name,
                    worker = self.index,
                    message_ids = ?unit.message_ids,
                    attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "Processing failed, retrying"
                );
                if self.wait_or_shutdown(delay).await {
                    Ok(Resolution::Retry)
                } else {
                    info!(
                        endpoint = %self.endpoint.name,
                        worker = self.index,
                        "Shutdown during retry delay, nothing committed"
                    );
                    Ok(Resolution::Interrupted)
                }
            }
            Decision::Commit => {
                metric_inc!(
                    MESSAGES_SKIPPED,
                    self.endpoint.name.as_str(),
                    unit.message_ids.len() as u64
                );
                warn!(
                    endpoint = %self.endpoint.name,
                    message_ids = ?unit.message_ids,
                    attempts = attempts,
                    error = %failure,
                    "Messages skipped"
                );
                self.commit_offsets(&unit.offsets).await?;
                Ok(Resolution::Handled)
            }
            Decision::MoveTo(target) => {
                for (headers, payload) in &unit.payloads {
                    let mut headers = headers.clone();
                    headers.add_or_replace(header_names::SOURCE_ENDPOINT, &self.endpoint.name);
                    self.broker
                        .produce(&target.name, payload.clone(), headers)
                        .await?;
                }
                metric_inc!(
                    MESSAGES_MOVED,
                    self.endpoint.name.as_str(),
                    unit.payloads.len() as u64
                );
                warn!(
                    endpoint = %self.endpoint.name,
                    target = %target.name,
                    message_ids = ?unit.message_ids,
                    attempts = attempts,
                    error = %failure,
                    "Messages moved"
                );
                self.commit_offsets(&unit.offsets).await?;
                Ok(Resolution::Handled)
            }
            Decision::Fatal => {
                metric_inc!(FATAL_FAILURES, self.endpoint.name.as_str());
                let (partition, offset) = unit
                    .offsets
                    .first()
                    .cloned()
                    .unwrap_or_else(|| (PartitionKey::new(self.endpoint.name.clone(), 0), Offset(0)));
                let message_id = unit.message_ids.first().cloned().unwrap_or_default();

                error!(
                    endpoint = %self.endpoint.name,
                    message_id = %message_id,
                    partition = %partition,
                    offset = %offset,
                    attempts = attempts,
                    error = %failure,
                    "Unrecoverable processing failure"
                );

                Err(ConnectorError::Fatal {
                    message_id,
                    partition,
                    offset,
                    reason: failure.to_string(),
                })
            }
        }
    }

    /// Sleep for `delay`. Returns `false` if shutdown was signalled first.
    ///
    /// Shutdown deliberately cuts a retry delay short instead of letting the
    /// policy resolution run to its end: nothing is committed for the failed
    /// unit, so it is redelivered to the next owner of its partitions.
    async fn wait_or_shutdown(&mut self, delay: Duration) -> bool {
        if *self.shutdown.borrow() {
            return false;
        }

        tokio::select! {
            _ = sleep(delay) => true,
            _ = self.shutdown.changed() => false,
        }
    }

    async fn commit_offsets(
        &mut self,
        offsets: &[(PartitionKey, Offset)],
    ) -> Result<(), ConnectorError> {
        for (partition, offset) in offsets {
            self.commit_consumed(partition, *offset).await?;
        }
        Ok(())
    }

    /// Commit the offset of a consumed record, deferring to the open batch
    /// when it holds the partition.
    async fn commit_consumed(
        &mut self,
        partition: &PartitionKey,
        offset: Offset,
    ) -> Result<(), ConnectorError> {
        if self.batch.track_consumed(partition, offset) {
            return Ok(());
        }
        self.commit(partition, offset).await
    }

    async fn commit(&mut self, partition: &PartitionKey, offset: Offset) -> Result<(), ConnectorError> {
        if self.committed.get(partition).is_some_and(|c| *c >= offset) {
            self.release_committed(partition, offset);
            return Ok(());
        }

        match self.broker.commit(self.member, partition, offset).await {
            Ok(()) => {
                self.committed.insert(partition.clone(), offset);
                metric_inc!(OFFSETS_COMMITTED, self.endpoint.name.as_str());
                trace!(partition = %partition, offset = %offset, "Offset committed");
                self.release_committed(partition, offset);
                Ok(())
            }
            Err(BrokerError::NotAssigned(lost)) => {
                warn!(
                    partition = %lost,
                    offset = %offset,
                    "Partition no longer assigned, commit dropped"
                );
                self.committed.remove(&lost);
                self.held.retain(|held| held.partition != lost);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Release the stored fragments of messages committed up to `offset`.
    fn release_committed(&mut self, partition: &PartitionKey, offset: Offset) {
        let (released, held): (Vec<_>, Vec<_>) = std::mem::take(&mut self.held)
            .into_iter()
            .partition(|held| held.partition == *partition && held.offset <= offset);
        self.held = held;

        for message in released {
            if let Err(e) = self.reassembler.release(&message.message_id) {
                // Left for the abandoned-message purge
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Failed to release reassembled fragments"
                );
            }
        }
    }
}
