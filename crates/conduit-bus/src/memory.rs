//! # In-Memory Broker
//!
//! Partitioned topics with one consumer group per topic. Partitions are
//! spread round-robin over the group members (ordered by join time); every
//! membership change triggers a rebalance that revokes and assigns
//! partitions and replays newly assigned partitions from their committed
//! position.
//!
//! All state sits behind one mutex, so a produce and a rebalance never
//! interleave: each record is delivered to exactly one current owner.

use crate::broker::{Broker, ConsumerEvent, Consumption, MemberId, ProduceAck};
use crate::DEFAULT_PARTITIONS;
use async_trait::async_trait;
use conduit_types::{
    header_names, BrokerError, Endpoint, MessageHeaders, Offset, PartitionKey, RawRecord,
};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A record as persisted in a topic partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub partition: PartitionKey,
    pub offset: Offset,
    pub headers: MessageHeaders,
    pub payload: Vec<u8>,
}

impl StoredRecord {
    fn to_raw(&self) -> RawRecord {
        RawRecord {
            partition: self.partition.clone(),
            offset: self.offset,
            headers: self.headers.clone(),
            payload: self.payload.clone(),
        }
    }
}

struct Topic {
    partitions: Vec<Vec<StoredRecord>>,
    next_round_robin: usize,
}

impl Topic {
    fn new(partitions: u32) -> Self {
        Self {
            partitions: (0..partitions.max(1)).map(|_| Vec::new()).collect(),
            next_round_robin: 0,
        }
    }

    fn select_partition(&mut self, key: Option<&str>) -> usize {
        let count = self.partitions.len();
        match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % count as u64) as usize
            }
            None => {
                let partition = self.next_round_robin % count;
                self.next_round_robin = self.next_round_robin.wrapping_add(1);
                partition
            }
        }
    }
}

struct Member {
    topic: String,
    sender: mpsc::UnboundedSender<ConsumerEvent>,
    assigned: Vec<u32>,
}

impl Member {
    fn send(&self, id: MemberId, event: ConsumerEvent) {
        if self.sender.send(event).is_err() {
            debug!(member = %id, topic = %self.topic, "Member channel closed, event dropped");
        }
    }
}

#[derive(Default)]
struct Group {
    members: BTreeSet<MemberId>,
    /// Next offset to read per partition.
    committed: HashMap<u32, Offset>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Topic>,
    groups: HashMap<String, Group>,
    members: HashMap<MemberId, Member>,
    next_member: u64,
    commit_log: Vec<(PartitionKey, Offset)>,
}

/// Single-process broker implementing [`Broker`].
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    default_partitions: u32,
    auto_create_topics: bool,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_partitions(DEFAULT_PARTITIONS)
    }

    /// Broker whose auto-created topics have `partitions` partitions.
    #[must_use]
    pub fn with_default_partitions(partitions: u32) -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            default_partitions: partitions.max(1),
            auto_create_topics: true,
        }
    }

    /// Reject produce and subscribe calls for topics not created explicitly.
    #[must_use]
    pub fn without_auto_create(mut self) -> Self {
        self.auto_create_topics = false;
        self
    }

    /// Create a topic. An existing topic is left untouched.
    pub fn create_topic(&self, name: &str, partitions: u32) {
        let mut state = self.state.lock();
        state
            .topics
            .entry(name.to_string())
            .or_insert_with(|| Topic::new(partitions));
    }

    /// All records of a topic, partition by partition.
    pub fn records(&self, topic: &str) -> Vec<StoredRecord> {
        let state = self.state.lock();
        state
            .topics
            .get(topic)
            .map(|t| t.partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// The committed position (next offset to read) of a partition.
    pub fn committed(&self, partition: &PartitionKey) -> Option<Offset> {
        let state = self.state.lock();
        state
            .groups
            .get(&partition.topic)
            .and_then(|g| g.committed.get(&partition.partition).copied())
    }

    /// Every commit that advanced a position, as `(partition, committed offset)`.
    pub fn commit_log(&self) -> Vec<(PartitionKey, Offset)> {
        self.state.lock().commit_log.clone()
    }

    pub fn member_count(&self, topic: &str) -> usize {
        let state = self.state.lock();
        state.groups.get(topic).map_or(0, |g| g.members.len())
    }

    /// Members of the topic's consumer group, in join order.
    pub fn members(&self, topic: &str) -> Vec<MemberId> {
        let state = self.state.lock();
        state
            .groups
            .get(topic)
            .map(|g| g.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Partitions currently assigned to a member.
    pub fn assignment(&self, member: MemberId) -> Vec<PartitionKey> {
        let state = self.state.lock();
        state
            .members
            .get(&member)
            .map(|m| {
                m.assigned
                    .iter()
                    .map(|p| PartitionKey::new(m.topic.clone(), *p))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Simulate a lost connection: every member of the topic's group
    /// receives a [`ConsumerEvent::Error`].
    pub fn disconnect(&self, topic: &str) {
        let state = self.state.lock();
        let Some(group) = state.groups.get(topic) else {
            return;
        };
        for id in &group.members {
            if let Some(member) = state.members.get(id) {
                member.send(
                    *id,
                    ConsumerEvent::Error(BrokerError::ConnectionLost(format!(
                        "topic '{}' disconnected",
                        topic
                    ))),
                );
            }
        }
        warn!(topic = topic, "Simulated broker disconnect");
    }

    fn ensure_topic(&self, state: &mut BrokerState, name: &str) -> Result<(), BrokerError> {
        if state.topics.contains_key(name) {
            return Ok(());
        }
        if !self.auto_create_topics {
            return Err(BrokerError::UnknownTopic(name.to_string()));
        }
        state
            .topics
            .insert(name.to_string(), Topic::new(self.default_partitions));
        debug!(topic = name, partitions = self.default_partitions, "Topic auto-created");
        Ok(())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Round-robin assignment of the topic's partitions over its members,
/// followed by revoke/assign notifications and replay of the newly
/// assigned partitions from their committed position.
fn rebalance(state: &mut BrokerState, topic_name: &str) {
    let BrokerState {
        topics,
        groups,
        members,
        ..
    } = state;

    let (Some(topic), Some(group)) = (topics.get(topic_name), groups.get(topic_name)) else {
        return;
    };

    let ids: Vec<MemberId> = group.members.iter().copied().collect();
    let mut target: HashMap<MemberId, Vec<u32>> = ids.iter().map(|id| (*id, Vec::new())).collect();
    if !ids.is_empty() {
        for partition in 0..topic.partitions.len() {
            let owner = ids[partition % ids.len()];
            if let Some(assigned) = target.get_mut(&owner) {
                assigned.push(partition as u32);
            }
        }
    }

    for id in ids {
        let Some(member) = members.get_mut(&id) else {
            continue;
        };
        let next = target.remove(&id).unwrap_or_default();
        let revoked: Vec<u32> = member
            .assigned
            .iter()
            .filter(|p| !next.contains(p))
            .copied()
            .collect();
        let added: Vec<u32> = next
            .iter()
            .filter(|p| !member.assigned.contains(p))
            .copied()
            .collect();
        member.assigned = next;

        if !revoked.is_empty() {
            let keys = revoked
                .iter()
                .map(|p| PartitionKey::new(topic_name, *p))
                .collect();
            member.send(id, ConsumerEvent::PartitionsRevoked(keys));
        }

        if added.is_empty() {
            continue;
        }

        let keys = added
            .iter()
            .map(|p| PartitionKey::new(topic_name, *p))
            .collect();
        member.send(id, ConsumerEvent::PartitionsAssigned(keys));

        for partition in added {
            let from = group
                .committed
                .get(&partition)
                .map_or(0, |offset| offset.0 as usize);
            for record in topic.partitions[partition as usize].iter().skip(from) {
                member.send(id, ConsumerEvent::Record(record.to_raw()));
            }
        }

        debug!(member = %id, topic = topic_name, assigned = ?member.assigned, "Partitions rebalanced");
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn subscribe(&self, endpoint: &Endpoint) -> Result<Consumption, BrokerError> {
        let mut state = self.state.lock();
        self.ensure_topic(&mut state, &endpoint.name)?;

        state.next_member += 1;
        let member_id = MemberId(state.next_member);
        let (sender, events) = mpsc::unbounded_channel();

        state.members.insert(
            member_id,
            Member {
                topic: endpoint.name.clone(),
                sender,
                assigned: Vec::new(),
            },
        );
        state
            .groups
            .entry(endpoint.name.clone())
            .or_default()
            .members
            .insert(member_id);

        rebalance(&mut state, &endpoint.name);

        info!(member = %member_id, topic = %endpoint.name, "Member joined consumer group");

        Ok(Consumption { member_id, events })
    }

    async fn commit(
        &self,
        member: MemberId,
        partition: &PartitionKey,
        offset: Offset,
    ) -> Result<(), BrokerError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let owns = state.members.get(&member).is_some_and(|m| {
            m.topic == partition.topic && m.assigned.contains(&partition.partition)
        });
        if !owns {
            return Err(BrokerError::NotAssigned(partition.clone()));
        }

        let length = state
            .topics
            .get(&partition.topic)
            .and_then(|t| t.partitions.get(partition.partition as usize))
            .map_or(0, Vec::len);
        if offset.0 as usize >= length {
            return Err(BrokerError::CommitFailed {
                partition: partition.clone(),
                offset,
                reason: format!("partition holds {} records", length),
            });
        }

        let position = offset.next();
        let group = state.groups.entry(partition.topic.clone()).or_default();
        let current = group.committed.get(&partition.partition).copied();
        if current.is_some_and(|c| c >= position) {
            debug!(partition = %partition, offset = %offset, "Stale commit ignored");
            return Ok(());
        }

        group.committed.insert(partition.partition, position);
        state.commit_log.push((partition.clone(), position));
        debug!(member = %member, partition = %partition, offset = %offset, "Offset committed");
        Ok(())
    }

    async fn unsubscribe(&self, member: MemberId) -> Result<(), BrokerError> {
        let mut state = self.state.lock();

        let Some(removed) = state.members.remove(&member) else {
            debug!(member = %member, "Unsubscribe of unknown member ignored");
            return Ok(());
        };
        if let Some(group) = state.groups.get_mut(&removed.topic) {
            group.members.remove(&member);
        }

        rebalance(&mut state, &removed.topic);

        info!(member = %member, topic = %removed.topic, "Member left consumer group");
        Ok(())
    }

    async fn produce(
        &self,
        topic: &str,
        payload: Vec<u8>,
        headers: MessageHeaders,
    ) -> Result<ProduceAck, BrokerError> {
        let mut state = self.state.lock();
        self.ensure_topic(&mut state, topic)?;

        let BrokerState {
            topics,
            groups,
            members,
            ..
        } = &mut *state;

        let Some(target) = topics.get_mut(topic) else {
            return Err(BrokerError::UnknownTopic(topic.to_string()));
        };
        let partition = target.select_partition(headers.get(header_names::MESSAGE_KEY));
        let records = &mut target.partitions[partition];

        let record = StoredRecord {
            partition: PartitionKey::new(topic, partition as u32),
            offset: Offset(records.len() as u64),
            headers,
            payload,
        };
        records.push(record.clone());

        let owner = groups.get(topic).and_then(|g| {
            g.members.iter().copied().find(|id| {
                members
                    .get(id)
                    .is_some_and(|m| m.assigned.contains(&(partition as u32)))
            })
        });
        if let Some(id) = owner {
            if let Some(member) = members.get(&id) {
                member.send(id, ConsumerEvent::Record(record.to_raw()));
            }
        }

        Ok(ProduceAck {
            partition: record.partition,
            offset: record.offset,
        })
    }
}
