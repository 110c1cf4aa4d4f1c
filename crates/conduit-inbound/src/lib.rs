//! # Conduit Inbound - Consumption Pipeline
//!
//! Consumes broker records for bound endpoints and hands complete,
//! deserialized messages to subscribers, in batches, with offsets committed
//! only after the batch was handled.
//!
//! ## Pipeline
//!
//! ```text
//! Broker ──ConsumerEvent──► ConsumptionWorker (one per consumer)
//!                                │
//!                                ├─► ChunkReassembler ──► ChunkStore (shared)
//!                                ├─► endpoint serializer
//!                                ├─► BatchAccumulator (size / deadline)
//!                                ├─► Dispatcher ──► MessageHandler(s)
//!                                └─► ErrorPolicy on failure
//!                                        retry │ skip │ move │ fatal
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Description |
//! |-----------|-------------|
//! | At-least-once | An offset is committed only after its message was handled, skipped or moved |
//! | Partition order | Records of one partition are processed by one worker, in order |
//! | Monotonic commits | A worker never commits an offset lower than one it committed before |
//! | Exactly-once reassembly | Concurrent completion of a chunked message yields one payload |
//! | Rebuildable chunks | Fragments are kept until the reassembled message's offset is committed |
//! | Revocation safety | Messages of a revoked partition are dropped from the open batch |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - reassembly, batching and error policies
//! - `ports/` - chunk store and handler traits
//! - `adapters/` - in-memory chunk store
//! - `dispatcher.rs` - subscriber routing
//! - `worker.rs` - the per-consumer processing loop
//! - `connector.rs` - endpoint binding and worker lifecycle
//!
//! ## Usage
//!
//! ```ignore
//! let mut dispatcher = Dispatcher::new(Arc::new(MessageTypeRegistry::new()));
//! dispatcher.subscribe(Subscription::for_type("Orders.Created, Orders", handler));
//!
//! let mut connector = InboundConnector::new(broker, chunk_store, Arc::new(dispatcher));
//! connector.bind(
//!     Endpoint::new("orders"),
//!     InboundConnectorSettings::default(),
//!     ErrorPolicy::chain(vec![ErrorPolicy::retry(3), ErrorPolicy::skip()]),
//! )?;
//! connector.start().await?;
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod connector;
pub mod dispatcher;
pub mod domain;
pub mod ports;
mod worker;

pub use adapters::memory_chunk_store::InMemoryChunkStore;
pub use connector::{InboundConnector, WorkerReport};
pub use dispatcher::{Dispatcher, MessageFilter, Subscription};
pub use domain::batch::{Batch, BatchAccumulator, BatchState};
pub use domain::policy::{
    Decision, ErrorPolicy, ErrorPolicyKind, FailureContext, FailurePredicate, PolicyFilter,
};
pub use domain::policy_spec::{build_chain, ErrorPolicySpec};
pub use domain::reassembler::{ChunkReassembler, ReassemblyOutcome};
pub use ports::chunk_store::{ChunkStore, ChunkStoreError};
pub use ports::handler::{FnHandler, MessageHandler};
