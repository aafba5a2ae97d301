//! Sync - leaderless "rolling snowball" consensus
//!
//! A stale node is resolved by accumulating one vote per participant:
//! 1. A participant already in the accumulator does nothing (idempotent)
//! 2. Otherwise it appends its current value under its replica id
//! 3. Once the accumulator holds `count` votes, whoever sees that first
//!    finalizes with the round's valuation; the node becomes consensus
//! 4. Otherwise the updated round must travel on to the other participants
//!
//! No leader, no request/response. Delivery may duplicate pulses; the
//! per-participant dedup makes that harmless.

use suss_core::{
    can_update_state, transition_state, Lineage, NodeId, Operation, ReplicaId, SussError,
    SussResult, SyncArgs, Value,
};
use suss_time::increment_base_idx;
use tracing::{debug, info};

use crate::{valuate, Network, Node};

/// Result of one participant's Sync step
#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    /// Local replica had already voted
    Duplicate,
    /// Vote appended; the round needs more participants
    Pending(SyncArgs),
    /// Round complete; the node now holds the consensus value
    Finalized { value: Value, round: SyncArgs },
}

/// Network after a Sync step
#[derive(Clone, Debug)]
pub struct SyncTransition {
    pub network: Network,
    pub outcome: SyncOutcome,
}

/// Take part in a Sync round for `args.path` as `local`
pub fn sync(network: &Network, local: &ReplicaId, args: &SyncArgs) -> SussResult<SyncTransition> {
    let node = stale_node(network, &args.path)?;

    if args.accumulator.contains_key(local) {
        debug!(node = %args.path, replica = %local, "sync vote already present");
        return Ok(SyncTransition {
            network: network.clone(),
            outcome: SyncOutcome::Duplicate,
        });
    }

    let mut round = args.clone();
    round.accumulator.insert(local.clone(), node.value.clone());
    debug!(
        node = %args.path,
        replica = %local,
        votes = round.accumulator.len(),
        count = round.count,
        "sync vote appended"
    );

    if round.is_complete() {
        finalize(network, node, round)
    } else {
        Ok(SyncTransition {
            network: network.clone(),
            outcome: SyncOutcome::Pending(round),
        })
    }
}

/// Finalize from a complete accumulator without voting.
///
/// Used by participants that voted earlier and receive the completed round
/// from whoever finalized it.
pub fn settle(network: &Network, args: &SyncArgs) -> SussResult<SyncTransition> {
    let node = stale_node(network, &args.path)?;
    if args.is_complete() {
        finalize(network, node, args.clone())
    } else {
        Ok(SyncTransition {
            network: network.clone(),
            outcome: SyncOutcome::Pending(args.clone()),
        })
    }
}

fn stale_node<'n>(network: &'n Network, path: &NodeId) -> SussResult<&'n Node> {
    let node = network.get_node(path)?;
    if node.lineage != Lineage::Stale {
        return Err(SussError::InvalidState {
            node: path.clone(),
            lineage: node.lineage,
        });
    }
    Ok(node)
}

fn finalize(network: &Network, node: &Node, round: SyncArgs) -> SussResult<SyncTransition> {
    let votes: Vec<Value> = round.accumulator.values().cloned().collect();
    let value = valuate(round.valuation, &votes)?;

    let lineage = transition_state(node.lineage, Operation::Sync);
    debug_assert!(can_update_state(node.lineage, lineage, Operation::Sync));
    let as_of = increment_base_idx(&network.as_of());

    info!(
        node = %round.path,
        valuation = ?round.valuation,
        votes = votes.len(),
        %as_of,
        "sync finalized"
    );

    let mut next = network.clone();
    next.insert_node(
        round.path.clone(),
        Node {
            value: value.clone(),
            as_of,
            lineage,
            meta: node.meta.clone(),
        },
    );
    Ok(SyncTransition {
        network: next,
        outcome: SyncOutcome::Finalized { value, round },
    })
}
