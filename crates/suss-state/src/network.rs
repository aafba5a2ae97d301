//! P-REL data model
//!
//! A [`Network`] is the serializable blueprint of a propagator network:
//! - nodes: id to [`Node`] (value, timestamp, lineage, metadata)
//! - links: ordered list of [`Link`] declarations
//! - relations: registry of opaque relation capabilities, keyed by id
//! - meta and `as_of`
//!
//! Networks are treated as immutable values and replaced wholesale per step.
//! Nodes and links sit behind `Arc`, so cloning a network shares every record
//! that the step does not rewrite.
//!
//! INVARIANT: `as_of` is the supremum of every timestamp the network has seen.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use suss_core::{
    Annotations, Lineage, Literal, NodeId, RelationId, SussError, SussResult, Timestamp, Value,
};

use crate::{Relation, RelationDescriptor, RelationRegistry};

/// A cell of the network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub value: Value,
    pub as_of: Timestamp,
    pub lineage: Lineage,
    #[serde(default)]
    pub meta: Annotations,
}

impl Node {
    pub fn new(value: Value, as_of: Timestamp, lineage: Lineage) -> Self {
        Node {
            value,
            as_of,
            lineage,
            meta: Annotations::new(),
        }
    }

    /// Externally observed node
    pub fn observed(value: Value, as_of: Timestamp) -> Self {
        Node::new(value, as_of, Lineage::Observed)
    }

    /// Relation-computed node
    pub fn derived(value: Value, as_of: Timestamp) -> Self {
        Node::new(value, as_of, Lineage::Derived)
    }

    pub fn with_meta(mut self, key: impl Into<String>, literal: impl Into<Literal>) -> Self {
        self.meta.insert(key.into(), literal.into());
        self
    }
}

/// Declared relationship between source and target nodes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Source selector
    pub src: String,
    /// Target selector
    pub tgt: String,
    pub relation: RelationId,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub meta: Annotations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Link {
    pub fn new(src: impl Into<String>, tgt: impl Into<String>, relation: impl Into<RelationId>) -> Self {
        Link {
            src: src.into(),
            tgt: tgt.into(),
            relation: relation.into(),
            args: Vec::new(),
            meta: Annotations::new(),
            label: None,
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, literal: impl Into<Literal>) -> Self {
        self.meta.insert(key.into(), literal.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Propagator network snapshot
#[derive(Clone, Default)]
pub struct Network {
    nodes: IndexMap<NodeId, Arc<Node>>,
    links: Vec<Arc<Link>>,
    relations: RelationRegistry,
    meta: Annotations,
    as_of: Timestamp,
}

impl Network {
    /// Create an empty network at `as_of`
    pub fn new(as_of: Timestamp) -> Self {
        Network {
            as_of,
            ..Default::default()
        }
    }

    // Builders

    pub fn with_node(mut self, id: impl Into<NodeId>, node: Node) -> Self {
        self.insert_node(id, node);
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.add_link(link);
        self
    }

    pub fn with_relation(
        mut self,
        id: impl Into<RelationId>,
        descriptor: RelationDescriptor,
        relation: Relation,
    ) -> Self {
        self.register_relation(id, descriptor, relation);
        self
    }

    // Nodes

    #[inline]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    /// Look up a node, failing with [`SussError::NodeNotFound`]
    pub fn get_node(&self, id: &NodeId) -> SussResult<&Node> {
        self.node(id.as_str())
            .ok_or_else(|| SussError::NodeNotFound(id.clone()))
    }

    #[inline]
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (id, node.as_ref()))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert or replace a node, lifting `as_of` to the node's timestamp
    pub fn insert_node(&mut self, id: impl Into<NodeId>, node: Node) {
        self.witness(node.as_of);
        self.nodes.insert(id.into(), Arc::new(node));
    }

    /// Remove a node. Links referring to it stay and simply stop matching.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        self.nodes
            .shift_remove(id)
            .map(|node| Arc::try_unwrap(node).unwrap_or_else(|shared| (*shared).clone()))
    }

    // Links

    #[inline]
    pub fn links(&self) -> &[Arc<Link>] {
        &self.links
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(Arc::new(link));
    }

    /// Remove the link at `index`, keeping the order of the others
    pub fn remove_link(&mut self, index: usize) -> Option<Link> {
        if index >= self.links.len() {
            return None;
        }
        let link = self.links.remove(index);
        Some(Arc::try_unwrap(link).unwrap_or_else(|shared| (*shared).clone()))
    }

    // Relations

    #[inline]
    pub fn relations(&self) -> &RelationRegistry {
        &self.relations
    }

    #[inline]
    pub fn relations_mut(&mut self) -> &mut RelationRegistry {
        &mut self.relations
    }

    pub fn register_relation(
        &mut self,
        id: impl Into<RelationId>,
        descriptor: RelationDescriptor,
        relation: Relation,
    ) {
        self.relations.register(id, descriptor, relation);
    }

    // Metadata and time

    #[inline]
    pub fn meta(&self) -> &Annotations {
        &self.meta
    }

    pub fn set_meta(&mut self, key: impl Into<String>, literal: impl Into<Literal>) {
        self.meta.insert(key.into(), literal.into());
    }

    pub fn replace_meta(&mut self, meta: Annotations) {
        self.meta = meta;
    }

    #[inline]
    pub fn as_of(&self) -> Timestamp {
        self.as_of
    }

    /// Overwrite `as_of`. Used when restoring a snapshot.
    pub fn set_as_of(&mut self, as_of: Timestamp) {
        self.as_of = as_of;
    }

    /// Lift `as_of` to `t` if `t` is ahead
    pub fn witness(&mut self, t: Timestamp) {
        if t > self.as_of {
            self.as_of = t;
        }
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("as_of", &self.as_of)
            .field("nodes", &self.nodes)
            .field("links", &self.links)
            .field("relations", &self.relations)
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(idx: f64) -> Timestamp {
        Timestamp::new(0, 0.0, idx)
    }

    #[test]
    fn test_insert_lifts_as_of() {
        let mut net = Network::new(t(1.0));
        net.insert_node("a", Node::observed(Value::number("a", 1.0), t(5.0)));
        assert_eq!(net.as_of(), t(5.0));

        net.insert_node("b", Node::derived(Value::number("b", 1.0), t(2.0)));
        assert_eq!(net.as_of(), t(5.0));
    }

    #[test]
    fn test_get_node_not_found() {
        let net = Network::default();
        let err = net.get_node(&NodeId::new("ghost")).unwrap_err();
        assert_eq!(err, SussError::NodeNotFound(NodeId::new("ghost")));
    }

    #[test]
    fn test_clone_shares_untouched_nodes() {
        let net = Network::default()
            .with_node("a", Node::observed(Value::number("a", 1.0), t(1.0)))
            .with_node("b", Node::derived(Value::number("b", 2.0), t(1.0)));
        let mut next = net.clone();
        next.insert_node("b", Node::derived(Value::number("b", 3.0), t(1.5)));

        assert!(Arc::ptr_eq(&net.nodes["a"], &next.nodes["a"]));
        assert_eq!(net.node("b").unwrap().value.as_number(), Some(2.0));
        assert_eq!(next.node("b").unwrap().value.as_number(), Some(3.0));
    }

    #[test]
    fn test_remove_node_and_link() {
        let mut net = Network::default()
            .with_node("a", Node::observed(Value::number("a", 1.0), t(1.0)))
            .with_link(Link::new("node:a", "node:b", "r1"))
            .with_link(Link::new("node:b", "node:c", "r2"));

        assert!(net.remove_node("a").is_some());
        assert!(net.remove_node("a").is_none());

        let removed = net.remove_link(0).unwrap();
        assert_eq!(removed.relation.as_str(), "r1");
        assert_eq!(net.links().len(), 1);
        assert!(net.remove_link(5).is_none());
    }

    #[test]
    fn test_node_order_preserved() {
        let net = Network::default()
            .with_node("z", Node::derived(Value::number("z", 0.0), t(0.0)))
            .with_node("a", Node::derived(Value::number("a", 0.0), t(0.0)));
        let ids: Vec<_> = net.node_ids().map(NodeId::as_str).collect();
        assert_eq!(ids, ["z", "a"]);
    }
}
