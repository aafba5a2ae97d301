//! Error types for Suss networks

use thiserror::Error;

use crate::{Lineage, NodeId, RelationId};

/// Core Suss errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SussError {
    // Lookup errors
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Relation not found: {0}")]
    RelationNotFound(RelationId),

    // Authority errors
    #[error("Invalid state: node {node} is {lineage}, expected stale")]
    InvalidState { node: NodeId, lineage: Lineage },

    // Causality errors
    #[error("Round {round} exceeds MaxRounds {max_rounds}")]
    RoundOverflow { round: u32, max_rounds: u32 },

    #[error("Propagation did not reach quiescence after {rounds} rounds")]
    NonConvergence { rounds: u32 },

    // Pulse errors
    #[error("Expected {expected} pulse, got tag {tag:?}")]
    UnexpectedPulse { expected: &'static str, tag: String },

    // Addressing errors
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    // Relation errors
    #[error("Relation {relation} is not a {expected} relation")]
    RelationKindMismatch {
        relation: RelationId,
        expected: &'static str,
    },

    #[error("Relation {relation} failed: {reason}")]
    Relation { relation: RelationId, reason: String },

    // Valuation errors
    #[error("Value is not numeric: {0}")]
    NonNumeric(String),

    #[error("Valuation over an empty accumulator")]
    EmptyValuation,
}

impl SussError {
    /// Fatal errors signal an unworkable network or round budget rather than
    /// a single bad input, and must not be retried with the same arguments.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SussError::RoundOverflow { .. } | SussError::InvalidState { .. }
        )
    }
}

/// Result type for Suss operations
pub type SussResult<T> = Result<T, SussError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SussError::RoundOverflow {
            round: 100,
            max_rounds: 100
        }
        .is_fatal());
        assert!(SussError::InvalidState {
            node: NodeId::new("a"),
            lineage: Lineage::Observed
        }
        .is_fatal());
        assert!(!SussError::NodeNotFound(NodeId::new("a")).is_fatal());
        assert!(!SussError::NonConvergence { rounds: 3 }.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = SussError::RoundOverflow {
            round: 100,
            max_rounds: 100,
        };
        assert_eq!(err.to_string(), "Round 100 exceeds MaxRounds 100");
    }
}
