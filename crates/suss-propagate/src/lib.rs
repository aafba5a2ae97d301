//! Suss Propagation
//!
//! Drives a network to a fixpoint after external writes.
//!
//! # Rounds
//!
//! Each round selects the links whose source matched a node updated in the
//! previous round, runs their relations, and commits the writes that pass the
//! authority and timestamp gates. A round without writes is quiescent.
//!
//! Key pieces:
//! - Selector: `type:pattern` addressing of nodes, links and relations
//! - Template: `{{var}}` patterns that pair sources with targets
//! - Engine: the bounded Selecting → Reconciling → Quiescent loop

pub mod propagation;
pub mod selector;
pub mod template;

pub use propagation::*;
pub use selector::*;
pub use template::*;
