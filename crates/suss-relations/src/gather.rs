//! Gather - many-to-one fold, run as an op relation
//!
//! Links are one-to-one; a target fed by many sources is updated by an
//! explicit op instead. The inner link relation is applied to each source in
//! turn, threading the candidate target value through the fold. The result
//! is written under link authority at the next causal step and reported as
//! an Observe pulse on the target, so callers can propagate from it.

use std::sync::Arc;

use suss_core::{Annotations, Literal, NodeId, Operation, Pulse, Value};
use suss_state::{
    apply_relation_result, LinkRelation, Network, Node, OpOutput, OpRelation, Relation,
    RelationDescriptor, RelationError,
};
use suss_time::increment_base_idx;

use crate::{Reduce, StandardRelation};

/// Descriptor name
pub const GATHER: &str = "gather";

/// Many-to-one op relation
#[derive(Clone)]
pub struct Gather {
    relation: Arc<dyn LinkRelation>,
    /// Descriptor of the inner relation, when it can be rebuilt
    inner: Option<RelationDescriptor>,
    sources: Vec<NodeId>,
    target: NodeId,
    /// Fold start; the target's current value when unset
    seed: Option<Value>,
}

impl Gather {
    /// Gather with a rebuildable inner relation
    pub fn new<R>(inner: R, sources: Vec<NodeId>, target: impl Into<NodeId>) -> Self
    where
        R: StandardRelation + LinkRelation + 'static,
    {
        let descriptor = inner.descriptor();
        Gather {
            relation: Arc::new(inner),
            inner: Some(descriptor),
            sources,
            target: target.into(),
            seed: None,
        }
    }

    /// Gather with an arbitrary inner relation; not rebuildable on load
    pub fn with_relation(
        relation: Arc<dyn LinkRelation>,
        sources: Vec<NodeId>,
        target: impl Into<NodeId>,
    ) -> Self {
        Gather {
            relation,
            inner: None,
            sources,
            target: target.into(),
            seed: None,
        }
    }

    /// Sum of the sources, recomputed from zero on every run
    pub fn sum(sources: Vec<NodeId>, target: impl Into<NodeId>) -> Self {
        Gather::new(Reduce::sum(), sources, target).seeded(Value::number("sum", 0.0))
    }

    /// Record the descriptor an arbitrary inner relation was built from
    pub fn described_by(mut self, inner: Option<RelationDescriptor>) -> Self {
        self.inner = inner;
        self
    }

    pub fn seeded(mut self, seed: Value) -> Self {
        self.seed = Some(seed);
        self
    }

    #[inline]
    pub fn target(&self) -> &NodeId {
        &self.target
    }

    /// Text args override the configured source ids
    fn sources(&self, args: &[Value]) -> Vec<NodeId> {
        let from_args: Vec<NodeId> = args
            .iter()
            .filter_map(|v| v.literal().and_then(Literal::as_str))
            .map(NodeId::from)
            .collect();
        if from_args.is_empty() {
            self.sources.clone()
        } else {
            from_args
        }
    }
}

impl OpRelation for Gather {
    fn apply(
        &self,
        network: &Network,
        args: &[Value],
        meta: &Annotations,
    ) -> Result<OpOutput, RelationError> {
        let target = network
            .node(self.target.as_str())
            .ok_or_else(|| RelationError::Failed(format!("missing target {}", self.target)))?;

        let mut acc = target.clone();
        if let Some(seed) = &self.seed {
            acc.value = seed.clone();
        }
        for id in self.sources(args) {
            let src = network
                .node(id.as_str())
                .ok_or_else(|| RelationError::Failed(format!("missing source {id}")))?;
            acc.value = self.relation.apply(src, &acc, &[], meta)?.tgt;
        }

        let mut out_meta = network.meta().clone();
        out_meta.extend(meta.iter().map(|(k, v)| (k.clone(), v.clone())));

        let at = increment_base_idx(&network.as_of());
        let mut next = network.clone();
        let mut pulses = Vec::new();
        if let Some(node) = apply_relation_result(target, acc.value, Operation::Link, at) {
            pulses.push(Pulse::observe(
                at,
                self.target.clone(),
                target.value.clone(),
                node.value.clone(),
            ));
            next.insert_node(self.target.clone(), node);
        }
        Ok(OpOutput {
            network: next,
            pulses,
            meta: out_meta,
        })
    }
}

impl StandardRelation for Gather {
    fn descriptor(&self) -> RelationDescriptor {
        let sources: Vec<Literal> = self
            .sources
            .iter()
            .map(|id| Literal::from(id.as_str()))
            .collect();
        let mut descriptor = RelationDescriptor::op(GATHER)
            .with_param("target", self.target.as_str())
            .with_param("sources", sources);
        if let Some(seed) = self.seed.as_ref().and_then(Value::as_number) {
            descriptor = descriptor.with_param("seed", seed);
        }
        if let Some(inner) = &self.inner {
            descriptor = descriptor.with_param("inner", inner.name.as_str());
            for (key, literal) in &inner.params {
                descriptor = descriptor.with_param(format!("inner.{key}"), literal.clone());
            }
        }
        descriptor
    }

    fn into_relation(self) -> Relation {
        Relation::op(self)
    }
}

/// Inner relation descriptor embedded in a gather descriptor
pub(crate) fn inner_descriptor(descriptor: &RelationDescriptor) -> Option<RelationDescriptor> {
    let name = descriptor.params.get("inner")?.as_str()?;
    let mut inner = RelationDescriptor::link(name);
    for (key, literal) in &descriptor.params {
        if let Some(key) = key.strip_prefix("inner.") {
            inner = inner.with_param(key, literal.clone());
        }
    }
    Some(inner)
}
