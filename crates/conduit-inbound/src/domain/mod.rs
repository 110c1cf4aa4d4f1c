//! # Domain
//!
//! Pure pipeline logic, independent of the broker and of tokio tasks.
//!
//! - `reassembler` - turns fragments into complete payloads
//! - `batch` - the per-worker batch accumulator
//! - `policy` - the error policy engine
//! - `policy_spec` - serde configuration form of error policies

pub mod batch;
pub mod policy;
pub mod policy_spec;
pub mod reassembler;
