//! # Conduit Types
//!
//! Types shared by the inbound pipeline, the outbound producer and the broker
//! boundary.
//!
//! ## Contents
//!
//! - `records` - `RawRecord` as delivered by a broker, `InboundMessage` after
//!   deserialization, `OutboundMessage` before serialization
//! - `headers` - insertion-ordered `MessageHeaders` and well-known header names
//! - `endpoint` - immutable `Endpoint` configuration
//! - `settings` - `ChunkSettings`, `BatchSettings`, `InboundConnectorSettings`
//! - `chunk` - the `Chunk` model and producer-side payload splitting
//! - `serializer` - `MessageSerializer` contract with JSON and binary codecs
//! - `type_registry` - cached resolution of the `x-message-type` header
//! - `errors` - processing, configuration, broker and connector errors
//!
//! ## Error Taxonomy
//!
//! | Category | Type | Handled by |
//! |----------|------|------------|
//! | Processing failure | `ProcessingError` | Error policy engine |
//! | Configuration error | `ConfigError` | Caller of `bind` |
//! | Broker failure | `BrokerError` | Hosting runtime |

pub mod chunk;
pub mod endpoint;
pub mod errors;
pub mod headers;
pub mod records;
pub mod serializer;
pub mod settings;
pub mod type_registry;

pub use chunk::{split_payload, Chunk};
pub use endpoint::Endpoint;
pub use errors::{BrokerError, ConfigError, ConnectorError, FailureKind, ProcessingError};
pub use headers::{header_names, MessageHeaders};
pub use records::{
    new_message_id, InboundMessage, MessageContent, Offset, OutboundMessage, PartitionKey,
    RawRecord,
};
pub use serializer::{
    BinaryMessageSerializer, JsonMessageSerializer, MessageSerializer, SerializationContext,
};
pub use settings::{BatchSettings, ChunkSettings, InboundConnectorSettings};
pub use type_registry::MessageTypeRegistry;
