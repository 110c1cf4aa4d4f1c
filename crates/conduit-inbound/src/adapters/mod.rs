//! # Adapters
//!
//! - `memory_chunk_store` - lock-striped in-memory [`ChunkStore`](crate::ports::chunk_store::ChunkStore)

pub mod memory_chunk_store;
