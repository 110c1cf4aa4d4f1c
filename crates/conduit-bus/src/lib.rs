//! # Conduit Bus - Broker Boundary
//!
//! The inbound and outbound pipelines talk to the message broker only through
//! the [`Broker`] trait. A broker exposes partitioned topics, consumer groups
//! that split partitions between members, and per-partition offset commits.
//!
//! ```text
//!   produce()                      subscribe()
//!  ──────────►  ┌──────────────┐  ◄──────────── worker 1
//!               │    topic     │  ConsumerEvent
//!               │  p0  p1  p2  │  ─────────────► worker 1 (p0, p2)
//!               └──────────────┘  ─────────────► worker 2 (p1)
//!                                   commit()
//! ```
//!
//! Every member receives a single ordered channel of [`ConsumerEvent`]s, so a
//! revocation is always observed after the records delivered before it.
//!
//! [`InMemoryBroker`] implements the port for single-process deployments and
//! tests. Wire-level clients for real brokers live outside this workspace.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod broker;
pub mod memory;

pub use broker::{Broker, Consumption, ConsumerEvent, MemberId, ProduceAck};
pub use memory::{InMemoryBroker, StoredRecord};

/// Partitions created for a topic that is produced to or subscribed before
/// being created explicitly.
pub const DEFAULT_PARTITIONS: u32 = 1;
