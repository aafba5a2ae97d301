//! Lineage and the authority hierarchy
//!
//! Every node carries a lineage recording where its current value came from.
//! Lineages are totally ordered by authority:
//!
//! ```text
//! observed (4) > consensus (3) > stale (2) > derived (1)
//! ```
//!
//! The transition table below is the only place authority is decided.
//! Operations never compare lineages directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provenance of a node's value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Lineage {
    /// Written by an accepted external Observe
    Observed = 4,
    /// Resolved by a finalized Sync round
    Consensus = 3,
    /// Rejected by an Observe CAS mismatch, awaiting Sync
    Stale = 2,
    /// Computed by a link relation
    Derived = 1,
}

impl Lineage {
    /// Authority rank
    #[inline]
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            4 => Some(Lineage::Observed),
            3 => Some(Lineage::Consensus),
            2 => Some(Lineage::Stale),
            1 => Some(Lineage::Derived),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "observed" => Some(Lineage::Observed),
            "consensus" => Some(Lineage::Consensus),
            "stale" => Some(Lineage::Stale),
            "derived" => Some(Lineage::Derived),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Lineage::Observed => "observed",
            Lineage::Consensus => "consensus",
            Lineage::Stale => "stale",
            Lineage::Derived => "derived",
        }
    }

    /// Observed and consensus nodes anchor relations: a relation should
    /// treat them as inputs rather than outputs.
    #[inline]
    pub fn is_anchor(self) -> bool {
        matches!(self, Lineage::Observed | Lineage::Consensus)
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation attempting to change a node's lineage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Accepted external write
    Observe,
    /// External write that failed its CAS check
    Reject,
    /// Finalized consensus round
    Sync,
    /// Link relation output
    Link,
}

/// Lineage a node would take after `op`
pub fn transition_state(current: Lineage, op: Operation) -> Lineage {
    match op {
        Operation::Observe => Lineage::Observed,
        Operation::Reject => Lineage::Stale,
        Operation::Sync => match current {
            Lineage::Stale => Lineage::Consensus,
            other => other,
        },
        Operation::Link => match current {
            Lineage::Observed | Lineage::Consensus => current,
            _ => Lineage::Derived,
        },
    }
}

/// Whether `op` may move a node from `current` to `proposed`.
///
/// - Observe and Reject are always permitted
/// - Sync only resolves stale into consensus
/// - Link may only write derived values over nodes at or below derived
pub fn can_update_state(current: Lineage, proposed: Lineage, op: Operation) -> bool {
    match op {
        Operation::Observe | Operation::Reject => true,
        Operation::Sync => current == Lineage::Stale && proposed == Lineage::Consensus,
        Operation::Link => {
            proposed == Lineage::Derived && current.rank() <= Lineage::Derived.rank()
        }
    }
}

/// Whether `holder` has at least the authority of `other`
#[inline]
pub fn has_authority(holder: Lineage, other: Lineage) -> bool {
    holder.rank() >= other.rank()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Lineage; 4] = [
        Lineage::Observed,
        Lineage::Consensus,
        Lineage::Stale,
        Lineage::Derived,
    ];

    #[test]
    fn test_rank_order() {
        assert!(Lineage::Observed.rank() > Lineage::Consensus.rank());
        assert!(Lineage::Consensus.rank() > Lineage::Stale.rank());
        assert!(Lineage::Stale.rank() > Lineage::Derived.rank());
        for l in ALL {
            assert_eq!(Lineage::from_rank(l.rank()), Some(l));
            assert_eq!(Lineage::from_name(l.name()), Some(l));
        }
    }

    #[test]
    fn test_observe_always_overrides() {
        for l in ALL {
            assert_eq!(transition_state(l, Operation::Observe), Lineage::Observed);
            assert!(can_update_state(l, Lineage::Observed, Operation::Observe));
            assert_eq!(transition_state(l, Operation::Reject), Lineage::Stale);
        }
    }

    #[test]
    fn test_sync_only_resolves_stale() {
        assert_eq!(
            transition_state(Lineage::Stale, Operation::Sync),
            Lineage::Consensus
        );
        assert_eq!(
            transition_state(Lineage::Derived, Operation::Sync),
            Lineage::Derived
        );
        assert!(can_update_state(
            Lineage::Stale,
            Lineage::Consensus,
            Operation::Sync
        ));
        assert!(!can_update_state(
            Lineage::Observed,
            Lineage::Consensus,
            Operation::Sync
        ));
    }

    #[test]
    fn test_link_never_downgrades_anchors() {
        for anchor in [Lineage::Observed, Lineage::Consensus] {
            assert_eq!(transition_state(anchor, Operation::Link), anchor);
            assert!(!can_update_state(anchor, Lineage::Derived, Operation::Link));
        }
    }

    #[test]
    fn test_link_protects_stale() {
        assert_eq!(
            transition_state(Lineage::Stale, Operation::Link),
            Lineage::Derived
        );
        assert!(!can_update_state(
            Lineage::Stale,
            Lineage::Derived,
            Operation::Link
        ));
    }

    #[test]
    fn test_link_writes_derived() {
        assert!(can_update_state(
            Lineage::Derived,
            Lineage::Derived,
            Operation::Link
        ));
        assert!(!can_update_state(
            Lineage::Derived,
            Lineage::Consensus,
            Operation::Link
        ));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&Lineage::Consensus).unwrap(),
            "\"consensus\""
        );
    }
}
