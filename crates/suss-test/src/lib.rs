//! Suss Test Harness - Replica simulation and consensus validation
//!
//! This crate provides:
//! - Seeded at-least-once pulse transport with duplication and reordering
//! - Multi-replica simulation over that transport
//! - Consensus fuzzing with per-burst convergence checks
//! - Shared fixture networks for tests and benches

pub mod chaos;
pub mod consensus_fuzzer;
pub mod fixtures;
pub mod simulator;

pub use chaos::*;
pub use consensus_fuzzer::*;
pub use fixtures::*;
pub use simulator::*;
