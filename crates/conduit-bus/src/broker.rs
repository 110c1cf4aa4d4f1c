//! # Broker Port
//!
//! Boundary between the pipeline and the broker client.

use async_trait::async_trait;
use conduit_types::{BrokerError, Endpoint, MessageHeaders, Offset, PartitionKey, RawRecord};
use std::fmt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Identity of one consumer group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

/// Everything a consumer group member observes, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    Record(RawRecord),
    PartitionsAssigned(Vec<PartitionKey>),
    PartitionsRevoked(Vec<PartitionKey>),
    /// The broker connection failed; the member should stop consuming.
    Error(BrokerError),
}

/// Handle returned by [`Broker::subscribe`].
#[derive(Debug)]
pub struct Consumption {
    pub member_id: MemberId,
    pub events: mpsc::UnboundedReceiver<ConsumerEvent>,
}

impl Consumption {
    /// Consume the handle as a `Stream` of events.
    pub fn into_stream(self) -> UnboundedReceiverStream<ConsumerEvent> {
        UnboundedReceiverStream::new(self.events)
    }
}

/// Where a produced record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceAck {
    pub partition: PartitionKey,
    pub offset: Offset,
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Join the consumer group of the endpoint's topic.
    async fn subscribe(&self, endpoint: &Endpoint) -> Result<Consumption, BrokerError>;

    /// Mark every record up to and including `offset` as processed.
    ///
    /// Commits are monotonic: an offset at or below the committed position
    /// is ignored.
    async fn commit(
        &self,
        member: MemberId,
        partition: &PartitionKey,
        offset: Offset,
    ) -> Result<(), BrokerError>;

    /// Leave the consumer group. The member's partitions are reassigned.
    async fn unsubscribe(&self, member: MemberId) -> Result<(), BrokerError>;

    /// Append a record. The `x-message-key` header, when present, selects
    /// the partition.
    async fn produce(
        &self,
        topic: &str,
        payload: Vec<u8>,
        headers: MessageHeaders,
    ) -> Result<ProduceAck, BrokerError>;
}
