//! # Inbound Connector
//!
//! Binds endpoints to the broker and runs their consumption workers.
//!
//! ## Lifecycle
//!
//! 1. `bind()` each endpoint with its settings and error policy. Settings
//!    are validated here, so configuration errors surface before any
//!    consumption starts.
//! 2. `start()` joins `consumers` group members per binding and spawns one
//!    worker task per member.
//! 3. `stop()` signals shutdown and waits for every worker. Unfinished
//!    batches are dropped without commit and redelivered after restart.
//!
//! Worker outcomes are published as [`WorkerReport`]s so the host can react
//! to a fatal failure while the other workers keep consuming.

use crate::dispatcher::Dispatcher;
use crate::domain::batch::BatchAccumulator;
use crate::domain::policy::ErrorPolicy;
use crate::domain::reassembler::ChunkReassembler;
use crate::ports::chunk_store::ChunkStore;
use crate::worker::ConsumptionWorker;
use conduit_bus::Broker;
use conduit_types::{ConfigError, ConnectorError, Endpoint, InboundConnectorSettings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Outcome of one consumption worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub endpoint: String,
    pub worker: usize,
    pub result: Result<(), ConnectorError>,
}

struct Binding {
    endpoint: Arc<Endpoint>,
    settings: InboundConnectorSettings,
    policy: ErrorPolicy,
}

pub struct InboundConnector {
    broker: Arc<dyn Broker>,
    reassembler: Arc<ChunkReassembler>,
    dispatcher: Arc<Dispatcher>,
    bindings: Vec<Binding>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    reports_tx: mpsc::UnboundedSender<WorkerReport>,
    reports_rx: Option<mpsc::UnboundedReceiver<WorkerReport>>,
    started: bool,
}

impl InboundConnector {
    pub fn new(
        broker: Arc<dyn Broker>,
        chunk_store: Arc<dyn ChunkStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();

        Self {
            broker,
            reassembler: Arc::new(ChunkReassembler::new(chunk_store)),
            dispatcher,
            bindings: Vec::new(),
            shutdown,
            workers: Vec::new(),
            reports_tx,
            reports_rx: Some(reports_rx),
            started: false,
        }
    }

    /// Bind an endpoint for consumption.
    ///
    /// # Errors
    ///
    /// Invalid endpoint, settings or policy, a second binding of the same
    /// endpoint name, or binding after `start()`.
    pub fn bind(
        &mut self,
        endpoint: Endpoint,
        settings: InboundConnectorSettings,
        policy: ErrorPolicy,
    ) -> Result<(), ConfigError> {
        endpoint.validate()?;
        settings.validate()?;
        policy.validate()?;

        if self.started {
            return Err(ConfigError::InvalidValue {
                key: endpoint.name,
                reason: "connector already started".into(),
            });
        }
        if self.bindings.iter().any(|b| b.endpoint.name == endpoint.name) {
            return Err(ConfigError::DuplicateBinding(endpoint.name));
        }

        info!(
            endpoint = %endpoint.name,
            consumers = settings.consumers,
            batch_size = settings.batch.effective_size(),
            "Endpoint bound"
        );

        self.bindings.push(Binding {
            endpoint: Arc::new(endpoint),
            settings,
            policy,
        });
        Ok(())
    }

    /// Join the consumer groups and spawn the workers.
    ///
    /// # Errors
    ///
    /// A failed `subscribe`. The workers spawned before the failure are
    /// stopped again, so the connector can be started anew.
    pub async fn start(&mut self) -> Result<(), ConnectorError> {
        if self.started {
            return Ok(());
        }
        self.shutdown.send_replace(false);

        if let Err(e) = self.spawn_workers().await {
            error!(
                error = %e,
                spawned = self.workers.len(),
                "Inbound connector failed to start, stopping spawned workers"
            );
            self.join_workers().await;
            return Err(e);
        }

        self.started = true;
        info!(
            endpoints = self.bindings.len(),
            workers = self.workers.len(),
            "Inbound connector started"
        );
        Ok(())
    }

    async fn spawn_workers(&mut self) -> Result<(), ConnectorError> {
        for binding in &self.bindings {
            for index in 0..binding.settings.consumers {
                let consumption = self.broker.subscribe(&binding.endpoint).await?;

                let worker = ConsumptionWorker {
                    index,
                    endpoint: Arc::clone(&binding.endpoint),
                    member: consumption.member_id,
                    broker: Arc::clone(&self.broker),
                    reassembler: Arc::clone(&self.reassembler),
                    dispatcher: Arc::clone(&self.dispatcher),
                    policy: binding.policy.clone(),
                    batch: BatchAccumulator::new(binding.settings.batch),
                    committed: HashMap::new(),
                    held: Vec::new(),
                    shutdown: self.shutdown.subscribe(),
                };

                let reports = self.reports_tx.clone();
                let endpoint = binding.endpoint.name.clone();
                let events = consumption.events;

                self.workers.push(tokio::spawn(async move {
                    let result = worker.run(events).await;
                    // Nobody listening is fine
                    let _ = reports.send(WorkerReport {
                        endpoint,
                        worker: index,
                        result,
                    });
                }));
            }
        }
        Ok(())
    }

    /// Receiver of worker outcomes. Available once.
    pub fn take_reports(&mut self) -> Option<mpsc::UnboundedReceiver<WorkerReport>> {
        self.reports_rx.take()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn endpoints(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.endpoint.name.as_str()).collect()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Signal shutdown and wait for every worker to finish.
    pub async fn stop(&mut self) -> Result<(), ConnectorError> {
        if !self.started {
            return Err(ConnectorError::NotStarted);
        }

        info!(workers = self.workers.len(), "Stopping inbound connector");
        self.join_workers().await;

        self.started = false;
        info!("Inbound connector stopped");
        Ok(())
    }

    async fn join_workers(&mut self) {
        self.shutdown.send_replace(true);

        let results = futures::future::join_all(self.workers.drain(..)).await;
        for result in results {
            if let Err(e) = result {
                error!(error = %e, "Consumption worker panicked");
            }
        }
    }
}
