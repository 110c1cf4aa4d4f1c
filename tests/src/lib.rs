//! # Conduit Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/     # End-to-end pipeline scenarios
//! │   ├── fixtures.rs      # Recording handler, pipeline harness
//! │   ├── inbound_flows.rs # Reassembly, policies, batching, rebalancing
//! │   └── outbound_flows.rs# Publish and consume round trips
//! │
//! └── benches/             # Criterion benchmarks of the hot paths
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p conduit-tests
//!
//! # By category
//! cargo test -p conduit-tests integration::inbound_flows
//! cargo test -p conduit-tests integration::outbound_flows
//!
//! # Benchmarks
//! cargo bench -p conduit-tests
//! ```
