//! # Conduit Outbound - Message Production
//!
//! ```text
//! OutboundMessage ──► OutboundRouter ──► [Endpoint, ...]
//!                                             │
//!                                             ▼
//!                     Producer: serialize ─► stamp headers ─► chunk? ─► Broker::produce
//! ```
//!
//! ## Stamped Headers
//!
//! | Header | Value |
//! |--------|-------|
//! | `x-message-id` | UUID v4 unless the message already carries one |
//! | `x-message-type` | The message type name |
//! | `x-message-key` | The partitioning key, if any |
//! | `x-chunk-index` / `x-chunks-count` | Only on fragments of chunked messages |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod connector;
pub mod error;
pub mod producer;
pub mod router;

pub use connector::OutboundConnector;
pub use error::OutboundError;
pub use producer::Producer;
pub use router::OutboundRouter;
