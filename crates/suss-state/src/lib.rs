//! Suss State - The P-REL network and the operations that evolve it
//!
//! This crate implements the state layer:
//! - Network data model (nodes, links, relation registry, metadata)
//! - Relation capabilities and resolvers
//! - Change-set ordering (Injector) and folding (Aggregator)
//! - Observe (CAS write), Sync (leaderless consensus) and Clock operations
//! - The solver applying relation results under the authority hierarchy

pub mod changeset;
pub mod clock;
pub mod network;
pub mod observe;
pub mod relation;
pub mod resolver;
pub mod solver;
pub mod sync;
pub mod valuation;

pub use changeset::*;
pub use clock::*;
pub use network::*;
pub use observe::*;
pub use relation::*;
pub use resolver::*;
pub use solver::*;
pub use sync::*;
pub use valuation::*;
