//! # Ports
//!
//! - `chunk_store` - storage of fragments awaiting reassembly (driven port)
//! - `handler` - business subscribers receiving dispatched messages

pub mod chunk_store;
pub mod handler;
