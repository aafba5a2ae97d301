//! Suss Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout a Suss propagator network:
//! - Identifiers (NodeId, RelationId, ReplicaId)
//! - Values (atomic and associative) and their structural comparison
//! - Causal timestamps (Epoch, SyncedWall, Idx)
//! - Lineage and the authority hierarchy
//! - Pulses and change sets

pub mod compare;
pub mod error;
pub mod id;
pub mod lineage;
pub mod pulse;
pub mod time;
pub mod value;

pub use compare::*;
pub use error::*;
pub use id::*;
pub use lineage::*;
pub use pulse::*;
pub use time::*;
pub use value::*;
