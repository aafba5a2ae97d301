//! Solver - invoking relations and gating their results by authority
//!
//! The solver computes candidates and decides lineage. It does not enforce
//! timestamp monotonicity: the caller must check `new_t > node.as_of`
//! before committing a replacement node.

use suss_core::{
    can_update_state, transition_state, values_equal, Annotations, Lineage, Operation, Pulse,
    RelationId, SussError, SussResult, Timestamp, Value,
};
use tracing::{debug, trace};

use crate::{LinkRelation, Network, Node, Relation, RelationError, RelationOutput, RelationResolver};

/// Run a link relation over a node pair. Never mutates either node.
#[inline]
pub fn solve_relation(
    src: &Node,
    tgt: &Node,
    relation: &dyn LinkRelation,
    args: &[Value],
    meta: &Annotations,
) -> Result<RelationOutput, RelationError> {
    relation.apply(src, tgt, args, meta)
}

/// Whether `candidate` differs structurally from the node's value
#[inline]
pub fn would_update_node(node: &Node, candidate: &Value) -> bool {
    !values_equal(&node.value, candidate)
}

/// Lineage decision for a candidate value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateDecision {
    /// Candidate equals the current value
    Unchanged,
    /// Authority forbids the transition; the write is dropped silently
    Suppressed { current: Lineage, proposed: Lineage },
    /// Write allowed with the given lineage
    Transition(Lineage),
}

/// Decide the lineage a node would take if `candidate` were written by `op`
pub fn compute_new_state(node: &Node, candidate: &Value, op: Operation) -> StateDecision {
    if !would_update_node(node, candidate) {
        return StateDecision::Unchanged;
    }
    let proposed = transition_state(node.lineage, op);
    if can_update_state(node.lineage, proposed, op) {
        StateDecision::Transition(proposed)
    } else {
        StateDecision::Suppressed {
            current: node.lineage,
            proposed,
        }
    }
}

/// Build the replacement node for a candidate value, or `None` when the value
/// is unchanged or authority suppresses the write. Node metadata is kept.
pub fn apply_relation_result(
    node: &Node,
    candidate: Value,
    op: Operation,
    new_t: Timestamp,
) -> Option<Node> {
    match compute_new_state(node, &candidate, op) {
        StateDecision::Transition(lineage) => Some(Node {
            value: candidate,
            as_of: new_t,
            lineage,
            meta: node.meta.clone(),
        }),
        StateDecision::Suppressed { current, proposed } => {
            trace!(%current, %proposed, "write suppressed by authority");
            None
        }
        StateDecision::Unchanged => None,
    }
}

/// Network after an op relation
#[derive(Clone, Debug)]
pub struct OpTransition {
    pub network: Network,
    pub pulses: Vec<Pulse>,
}

/// Invoke an op relation explicitly.
///
/// The relation's metadata replaces the network's, and `as_of` never moves
/// backwards past the input network's.
pub fn apply_op_relation<R: RelationResolver + ?Sized>(
    network: &Network,
    resolver: &R,
    id: &RelationId,
    args: &[Value],
    meta: &Annotations,
) -> SussResult<OpTransition> {
    let relation = match resolver.resolve(id, network)? {
        Relation::Op(op) => op,
        Relation::Link(_) => {
            return Err(SussError::RelationKindMismatch {
                relation: id.clone(),
                expected: "op",
            })
        }
    };

    let out = relation
        .apply(network, args, meta)
        .map_err(|e| SussError::Relation {
            relation: id.clone(),
            reason: e.to_string(),
        })?;

    let mut next = out.network;
    next.replace_meta(out.meta);
    next.witness(network.as_of());
    debug!(relation = %id, pulses = out.pulses.len(), "op relation applied");
    Ok(OpTransition {
        network: next,
        pulses: out.pulses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DefaultRelationResolver, OpOutput, OpRelation, RelationDescriptor};

    fn t(idx: f64) -> Timestamp {
        Timestamp::new(0, 0.0, idx)
    }

    fn v(x: f64) -> Value {
        Value::number("v", x)
    }

    fn double(
        src: &Node,
        _tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        let x = src
            .value
            .as_number()
            .ok_or_else(|| RelationError::NonNumeric("src".into()))?;
        Ok(RelationOutput::new(
            src.value.clone(),
            Value::number("v", x * 2.0),
            meta.clone(),
        ))
    }

    #[test]
    fn test_solve_relation_is_pure() {
        let src = Node::observed(v(3.0), t(1.0));
        let tgt = Node::derived(v(0.0), t(1.0));
        let out = solve_relation(&src, &tgt, &double, &[], &Annotations::new()).unwrap();
        assert_eq!(out.tgt, v(6.0));
        assert_eq!(tgt.value, v(0.0));
    }

    #[test]
    fn test_compute_new_state() {
        let derived = Node::derived(v(1.0), t(1.0));
        assert_eq!(
            compute_new_state(&derived, &v(1.0), Operation::Link),
            StateDecision::Unchanged
        );
        assert_eq!(
            compute_new_state(&derived, &v(2.0), Operation::Link),
            StateDecision::Transition(Lineage::Derived)
        );

        let observed = Node::observed(v(1.0), t(1.0));
        assert_eq!(
            compute_new_state(&observed, &v(2.0), Operation::Link),
            StateDecision::Suppressed {
                current: Lineage::Observed,
                proposed: Lineage::Observed
            }
        );
    }

    #[test]
    fn test_apply_relation_result() {
        let node = Node::derived(v(1.0), t(1.0)).with_meta("unit", "F");
        let next = apply_relation_result(&node, v(2.0), Operation::Link, t(1.01)).unwrap();
        assert_eq!(next.value, v(2.0));
        assert_eq!(next.as_of, t(1.01));
        assert_eq!(next.meta, node.meta);

        let anchor = Node::new(v(1.0), t(1.0), Lineage::Consensus);
        assert!(apply_relation_result(&anchor, v(2.0), Operation::Link, t(1.01)).is_none());
    }

    struct AddNode;

    impl OpRelation for AddNode {
        fn apply(
            &self,
            network: &Network,
            args: &[Value],
            meta: &Annotations,
        ) -> Result<OpOutput, RelationError> {
            let value = args
                .first()
                .cloned()
                .ok_or_else(|| RelationError::Failed("missing value".into()))?;
            let mut next = network.clone();
            next.insert_node("added", Node::derived(value, network.as_of()));
            let mut meta = meta.clone();
            meta.insert("op".into(), "add".into());
            Ok(OpOutput {
                network: next,
                pulses: vec![],
                meta,
            })
        }
    }

    #[test]
    fn test_apply_op_relation() {
        let net = Network::new(t(2.0))
            .with_relation("add", RelationDescriptor::op("add"), Relation::op(AddNode))
            .with_relation("dbl", RelationDescriptor::link("double"), Relation::link(double));

        let tr = apply_op_relation(
            &net,
            &DefaultRelationResolver,
            &"add".into(),
            &[v(5.0)],
            &Annotations::new(),
        )
        .unwrap();
        assert_eq!(tr.network.node("added").unwrap().value, v(5.0));
        assert_eq!(tr.network.meta().get("op"), Some(&"add".into()));

        let err = apply_op_relation(
            &net,
            &DefaultRelationResolver,
            &"add".into(),
            &[],
            &Annotations::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SussError::Relation { .. }));

        let err = apply_op_relation(
            &net,
            &DefaultRelationResolver,
            &"dbl".into(),
            &[],
            &Annotations::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SussError::RelationKindMismatch { .. }));
    }
}
