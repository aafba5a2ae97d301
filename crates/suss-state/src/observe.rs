//! Observe - the external compare-and-swap write
//!
//! An Observe carries `(Path, Old, New)`. If `Old` structurally equals the
//! node's current value the write is accepted; otherwise it is rejected and
//! the node turns stale until a Sync round resolves it.
//!
//! Both outcomes consume a causal step: the node's `as_of` becomes
//! `increment_base_idx(T)`. A reject is not an error.

use suss_core::{
    transition_state, values_equal, Annotations, NodeId, Operation, Pulse, PulseArgs, SussError,
    SussResult, Timestamp, Value,
};
use suss_time::increment_base_idx;
use tracing::{debug, info};

use crate::{Network, Node};

/// CAS outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserveOutcome {
    Accepted,
    Rejected,
}

/// Network after an Observe
#[derive(Clone, Debug)]
pub struct ObserveTransition {
    pub network: Network,
    pub outcome: ObserveOutcome,
    /// New `as_of` of the observed node
    pub at: Timestamp,
}

impl ObserveTransition {
    #[inline]
    pub fn accepted(&self) -> bool {
        self.outcome == ObserveOutcome::Accepted
    }
}

/// Apply a CAS write to `path`
pub fn observe(
    network: &Network,
    path: &NodeId,
    old: &Value,
    new: Value,
    at: Timestamp,
    meta: Option<&Annotations>,
) -> SussResult<ObserveTransition> {
    let current = network.get_node(path)?;
    let as_of = increment_base_idx(&at);

    let (node, outcome) = if values_equal(&current.value, old) {
        debug!(node = %path, %as_of, "observe accepted");
        let node = Node {
            value: new,
            as_of,
            lineage: transition_state(current.lineage, Operation::Observe),
            meta: meta.cloned().unwrap_or_else(|| current.meta.clone()),
        };
        (node, ObserveOutcome::Accepted)
    } else {
        info!(node = %path, %as_of, "observe rejected, node is stale");
        let node = Node {
            value: current.value.clone(),
            as_of,
            lineage: transition_state(current.lineage, Operation::Reject),
            meta: current.meta.clone(),
        };
        (node, ObserveOutcome::Rejected)
    };

    let mut next = network.clone();
    next.insert_node(path.clone(), node);
    Ok(ObserveTransition {
        network: next,
        outcome,
        at: as_of,
    })
}

/// Apply an Observe pulse
pub fn apply_observe(network: &Network, pulse: &Pulse) -> SussResult<ObserveTransition> {
    match &pulse.args {
        PulseArgs::Observe(args) => observe(
            network,
            &args.path,
            &args.old,
            args.new.clone(),
            pulse.at,
            pulse.meta.as_ref(),
        ),
        _ => Err(SussError::UnexpectedPulse {
            expected: "observe",
            tag: pulse.tag.clone(),
        }),
    }
}
