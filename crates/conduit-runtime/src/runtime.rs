//! # Conduit Runtime
//!
//! Wires the in-memory broker, the shared chunk store and both connectors.
//!
//! ## Startup Sequence
//!
//! 1. Create the broker and its topics
//! 2. Build the error policy, resolving move targets against known endpoints
//! 3. Bind the inbound endpoint and start its workers
//! 4. Start the chunk store purge task
//!
//! ## Shutdown Sequence
//!
//! 1. Stop the purge task
//! 2. Stop the inbound connector (unfinished batches stay uncommitted)

use crate::config::RuntimeConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use conduit_bus::{Broker, InMemoryBroker};
use conduit_inbound::{
    build_chain, Dispatcher, InMemoryChunkStore, InboundConnector, MessageHandler, Subscription,
    WorkerReport,
};
use conduit_outbound::{OutboundConnector, OutboundRouter};
use conduit_telemetry::CHUNKS_PENDING;
use conduit_types::{Endpoint, InboundMessage, MessageTypeRegistry, ProcessingError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Interval between two purges of abandoned partial messages.
const PURGE_INTERVAL: Duration = Duration::from_secs(30);

/// Subscriber logging every consumed message.
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, message: &InboundMessage) -> Result<(), ProcessingError> {
        info!(
            message_id = %message.message_id,
            message_type = message.message_type().unwrap_or("-"),
            partition = %message.partition,
            offset = %message.offset,
            bytes = message.raw_payload.len(),
            "Message received"
        );
        Ok(())
    }
}

/// Drop partial messages older than `max_age` from the store.
///
/// Returns the number of purged messages.
pub fn purge_abandoned(store: &InMemoryChunkStore, max_age: Duration) -> usize {
    let purged = store.purge_expired(max_age);
    if !purged.is_empty() {
        CHUNKS_PENDING.sub(purged.len() as i64);
        debug!(message_ids = ?purged, "Abandoned partial messages purged");
    }
    purged.len()
}

pub struct ConduitRuntime {
    config: RuntimeConfig,
    broker: Arc<InMemoryBroker>,
    chunk_store: Arc<InMemoryChunkStore>,
    inbound: InboundConnector,
    outbound: OutboundConnector,
    reports: Option<mpsc::UnboundedReceiver<WorkerReport>>,
    purge_shutdown: watch::Sender<bool>,
    purge_task: Option<JoinHandle<()>>,
}

impl ConduitRuntime {
    /// Build the runtime with the default logging subscriber.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_handler(config, Arc::new(LoggingHandler))
    }

    /// Build the runtime with a catch-all subscriber.
    pub fn with_handler(config: RuntimeConfig, handler: Arc<dyn MessageHandler>) -> Result<Self> {
        let broker = Arc::new(InMemoryBroker::with_default_partitions(config.partitions));
        let chunk_store = Arc::new(InMemoryChunkStore::new());

        let endpoint = Arc::new(config.endpoint());
        let dead_letter = config.dead_letter_endpoint().map(Arc::new);

        broker.create_topic(&endpoint.name, config.partitions);
        if let Some(dlq) = &dead_letter {
            broker.create_topic(&dlq.name, config.partitions);
        }

        let policy = build_chain(&config.error_policies, &|name: &str| {
            dead_letter
                .as_ref()
                .filter(|dlq| dlq.name == name)
                .or_else(|| Some(&endpoint).filter(|e| e.name == name))
                .cloned()
        })
        .context("Failed to build error policy")?;

        let mut dispatcher = Dispatcher::new(Arc::new(MessageTypeRegistry::new()));
        dispatcher.subscribe(Subscription::all(handler));

        let mut inbound = InboundConnector::new(
            Arc::clone(&broker) as Arc<dyn Broker>,
            Arc::clone(&chunk_store) as Arc<dyn conduit_inbound::ChunkStore>,
            Arc::new(dispatcher),
        );
        inbound
            .bind(Endpoint::clone(&endpoint), config.inbound_settings(), policy)
            .with_context(|| format!("Failed to bind endpoint '{}'", endpoint.name))?;
        let reports = inbound.take_reports();

        let mut router = OutboundRouter::new();
        router
            .add_catch_all(Arc::clone(&endpoint))
            .context("Failed to configure outbound route")?;
        let outbound = OutboundConnector::new(Arc::clone(&broker) as Arc<dyn Broker>, router);

        let (purge_shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            broker,
            chunk_store,
            inbound,
            outbound,
            reports,
            purge_shutdown,
            purge_task: None,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  Conduit Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.inbound
            .start()
            .await
            .context("Failed to start inbound connector")?;

        self.purge_task = Some(self.spawn_purge_task());

        info!(
            topic = %self.config.topic,
            consumers = self.config.consumers,
            partitions = self.config.partitions,
            batch_size = self.config.batch_size,
            chunk_size = self.config.chunk_size,
            "Conduit runtime started"
        );
        Ok(())
    }

    fn spawn_purge_task(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.chunk_store);
        let max_age = self.config.chunk_max_age;
        let mut shutdown = self.purge_shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        purge_abandoned(&store, max_age);
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    pub fn broker(&self) -> &Arc<InMemoryBroker> {
        &self.broker
    }

    pub fn outbound(&self) -> &OutboundConnector {
        &self.outbound
    }

    /// Wait until ctrl-c or until a worker stops on its own.
    pub async fn wait_for_shutdown(&mut self) -> Result<()> {
        let report = async {
            match self.reports.as_mut() {
                Some(reports) => reports.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("Shutdown signal received");
            }
            Some(report) = report => {
                match &report.result {
                    Ok(()) => info!(endpoint = %report.endpoint, worker = report.worker, "Worker finished"),
                    Err(e) => warn!(endpoint = %report.endpoint, worker = report.worker, error = %e, "Worker stopped"),
                }
            }
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        self.purge_shutdown.send_replace(true);
        if let Some(task) = self.purge_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Purge task failed");
            }
        }

        if self.inbound.is_started() {
            self.inbound
                .stop()
                .await
                .context("Failed to stop inbound connector")?;
        }

        match conduit_telemetry::gather_metrics() {
            Ok(metrics) => debug!(metrics = %metrics, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to gather metrics"),
        }
        info!("Shutdown complete");
        Ok(())
    }
}
