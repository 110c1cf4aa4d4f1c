//! Shared fixtures for the end-to-end scenarios.

use async_trait::async_trait;
use conduit_bus::{Broker, InMemoryBroker, ProduceAck};
use conduit_inbound::{
    ChunkStore, Dispatcher, ErrorPolicy, InMemoryChunkStore, InboundConnector, MessageHandler,
    Subscription, WorkerReport,
};
use conduit_types::{
    header_names, split_payload, Endpoint, InboundConnectorSettings, InboundMessage,
    MessageHeaders, MessageTypeRegistry, Offset, PartitionKey, ProcessingError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Handler recording what it receives, optionally failing its first calls.
pub struct Recorder {
    messages: Mutex<Vec<InboundMessage>>,
    batches: Mutex<Vec<usize>>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Self::failing(0)
    }

    /// Fails the first `times` batches it receives.
    pub fn failing(times: usize) -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(times),
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing(usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<InboundMessage> {
        self.messages.lock().clone()
    }

    pub fn message_ids(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|m| m.message_id.clone())
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl MessageHandler for Recorder {
    async fn handle(&self, message: &InboundMessage) -> Result<(), ProcessingError> {
        self.handle_batch(std::slice::from_ref(message)).await
    }

    async fn handle_batch(&self, messages: &[InboundMessage]) -> Result<(), ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                (left > 0).then(|| left.saturating_sub(1))
            })
            .is_ok();
        if failing {
            return Err(ProcessingError::handler("recorder failure"));
        }

        self.batches.lock().push(messages.len());
        self.messages.lock().extend(messages.iter().cloned());
        Ok(())
    }
}

/// An inbound connector over an in-memory broker and chunk store.
pub struct Pipeline {
    pub broker: Arc<InMemoryBroker>,
    pub connector: InboundConnector,
    pub reports: mpsc::UnboundedReceiver<WorkerReport>,
}

impl Pipeline {
    /// Pipeline whose single catch-all subscriber is `handler`.
    pub fn new(broker: Arc<InMemoryBroker>, handler: Arc<dyn MessageHandler>) -> Self {
        let mut dispatcher = Dispatcher::new(Arc::new(MessageTypeRegistry::new()));
        dispatcher.subscribe(Subscription::all(handler));
        Self::with_parts(broker, dispatcher, Arc::new(InMemoryChunkStore::new()))
    }

    pub fn with_parts(
        broker: Arc<InMemoryBroker>,
        dispatcher: Dispatcher,
        chunk_store: Arc<dyn ChunkStore>,
    ) -> Self {
        let mut connector = InboundConnector::new(
            Arc::clone(&broker) as Arc<dyn Broker>,
            chunk_store,
            Arc::new(dispatcher),
        );
        let reports = connector
            .take_reports()
            .unwrap_or_else(|| panic!("reports already taken"));

        Self {
            broker,
            connector,
            reports,
        }
    }

    /// Bind `endpoint`, start consuming and wait for the group to settle.
    pub async fn start(
        &mut self,
        endpoint: Endpoint,
        settings: InboundConnectorSettings,
        policy: ErrorPolicy,
    ) {
        self.connector.bind(endpoint, settings, policy).unwrap();
        self.connector.start().await.unwrap();
    }

    pub async fn next_report(&mut self) -> WorkerReport {
        tokio::time::timeout(Duration::from_secs(5), self.reports.recv())
            .await
            .expect("no worker report within 5s")
            .expect("report channel closed")
    }

    pub fn committed(&self, topic: &str, partition: u32) -> Option<Offset> {
        self.broker.committed(&PartitionKey::new(topic, partition))
    }
}

/// Poll `condition` until it holds, failing the test after ~5s.
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never met: {}", what);
}

pub fn headers(message_id: &str, message_type: &str) -> MessageHeaders {
    MessageHeaders::new()
        .with(header_names::MESSAGE_ID, message_id)
        .with(header_names::MESSAGE_TYPE, message_type)
}

/// Produce a JSON record the way a foreign producer would.
pub async fn produce_json(
    broker: &InMemoryBroker,
    topic: &str,
    message_id: &str,
    value: serde_json::Value,
) -> ProduceAck {
    let payload = serde_json::to_vec(&value).unwrap();
    broker
        .produce(topic, payload, headers(message_id, "Test.Event, Tests"))
        .await
        .unwrap()
}

/// Produce the chunks of `payload` in the given index order.
pub async fn produce_chunks(
    broker: &InMemoryBroker,
    topic: &str,
    message_id: &str,
    payload: &[u8],
    size: usize,
    order: &[usize],
) {
    let chunks = split_payload(message_id, payload, size).unwrap();
    for index in order {
        let chunk = &chunks[*index];
        let mut chunk_headers = headers(message_id, "Test.Blob, Tests");
        chunk.write_headers(&mut chunk_headers);
        broker
            .produce(topic, chunk.fragment.clone(), chunk_headers)
            .await
            .unwrap();
    }
}
