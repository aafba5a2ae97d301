//! Relation capabilities and the relation registry
//!
//! Relations are opaque, executable capabilities referenced by id:
//! - a [`LinkRelation`] is a pure function over a `(source, target)` node pair
//! - an [`OpRelation`] operates on the whole network
//!
//! Executable relations are never serialized. Each registration carries a
//! [`RelationDescriptor`] which is the only persisted form; a
//! [`RelationFactory`] rebuilds the executable relation on load.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use suss_core::{Annotations, Literal, Pulse, RelationId, Value};

use crate::{Network, Node};

/// Failure raised by a relation implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelationError {
    #[error("non-numeric input: {0}")]
    NonNumeric(String),

    #[error("singular relation: {0}")]
    Singular(String),

    #[error("unsatisfiable constraint: {0}")]
    Unsatisfiable(String),

    #[error("{0}")]
    Failed(String),
}

/// Candidate values produced by a link relation
#[derive(Clone, Debug, PartialEq)]
pub struct RelationOutput {
    pub src: Value,
    pub tgt: Value,
    pub meta: Annotations,
}

impl RelationOutput {
    pub fn new(src: Value, tgt: Value, meta: Annotations) -> Self {
        RelationOutput { src, tgt, meta }
    }
}

/// Result of an op relation: the rewritten network and pulses to emit
#[derive(Clone, Debug)]
pub struct OpOutput {
    pub network: Network,
    pub pulses: Vec<Pulse>,
    pub meta: Annotations,
}

/// Pure function over a node pair.
///
/// Implementations must not block or suspend. They may read the lineage of
/// both nodes to pick a direction: observed and consensus nodes are anchors.
pub trait LinkRelation: Send + Sync {
    fn apply(
        &self,
        src: &Node,
        tgt: &Node,
        args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError>;
}

/// Operation over the whole network
pub trait OpRelation: Send + Sync {
    fn apply(
        &self,
        network: &Network,
        args: &[Value],
        meta: &Annotations,
    ) -> Result<OpOutput, RelationError>;
}

impl<F> LinkRelation for F
where
    F: Fn(&Node, &Node, &[Value], &Annotations) -> Result<RelationOutput, RelationError>
        + Send
        + Sync,
{
    fn apply(
        &self,
        src: &Node,
        tgt: &Node,
        args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        self(src, tgt, args, meta)
    }
}

/// Executable relation
#[derive(Clone)]
pub enum Relation {
    Link(Arc<dyn LinkRelation>),
    Op(Arc<dyn OpRelation>),
}

impl Relation {
    pub fn link(relation: impl LinkRelation + 'static) -> Self {
        Relation::Link(Arc::new(relation))
    }

    pub fn op(relation: impl OpRelation + 'static) -> Self {
        Relation::Op(Arc::new(relation))
    }

    #[inline]
    pub fn kind(&self) -> RelationKind {
        match self {
            Relation::Link(_) => RelationKind::Link,
            Relation::Op(_) => RelationKind::Op,
        }
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relation::{:?}", self.kind())
    }
}

/// Relation shape
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Link,
    Op,
}

/// Persisted description of a relation, enough for a factory to rebuild it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    pub kind: RelationKind,
    /// Relation family, e.g. `linear`
    pub name: String,
    #[serde(default)]
    pub params: Annotations,
}

impl RelationDescriptor {
    pub fn link(name: impl Into<String>) -> Self {
        RelationDescriptor {
            kind: RelationKind::Link,
            name: name.into(),
            params: Annotations::new(),
        }
    }

    pub fn op(name: impl Into<String>) -> Self {
        RelationDescriptor {
            kind: RelationKind::Op,
            name: name.into(),
            params: Annotations::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, literal: impl Into<Literal>) -> Self {
        self.params.insert(key.into(), literal.into());
        self
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Literal::as_f64)
    }
}

/// Rebuilds executable relations from descriptors
pub trait RelationFactory: Send + Sync {
    fn build(&self, id: &RelationId, descriptor: &RelationDescriptor) -> Option<Relation>;
}

/// Registry entry: descriptor plus the executable relation, when resolved
#[derive(Clone, Debug)]
pub struct RegisteredRelation {
    pub descriptor: RelationDescriptor,
    pub relation: Option<Relation>,
}

/// Relations keyed by id, in registration order
#[derive(Clone, Debug, Default)]
pub struct RelationRegistry {
    entries: IndexMap<RelationId, RegisteredRelation>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        RelationRegistry::default()
    }

    /// Register an executable relation
    pub fn register(
        &mut self,
        id: impl Into<RelationId>,
        descriptor: RelationDescriptor,
        relation: Relation,
    ) {
        self.entries.insert(
            id.into(),
            RegisteredRelation {
                descriptor,
                relation: Some(relation),
            },
        );
    }

    /// Register a descriptor whose relation is not yet reconstructed
    pub fn register_descriptor(&mut self, id: impl Into<RelationId>, descriptor: RelationDescriptor) {
        self.entries.insert(
            id.into(),
            RegisteredRelation {
                descriptor,
                relation: None,
            },
        );
    }

    pub fn remove(&mut self, id: &str) -> Option<RegisteredRelation> {
        self.entries.shift_remove(id)
    }

    /// Executable relation, if registered and resolved
    pub fn get(&self, id: &str) -> Option<&Relation> {
        self.entries.get(id).and_then(|e| e.relation.as_ref())
    }

    pub fn descriptor(&self, id: &str) -> Option<&RelationDescriptor> {
        self.entries.get(id).map(|e| &e.descriptor)
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &RelationId> {
        self.entries.keys()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = (&RelationId, &RelationDescriptor)> {
        self.entries.iter().map(|(id, e)| (id, &e.descriptor))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild every unresolved entry through `factory`.
    /// Returns the ids the factory could not rebuild; they stay unresolved.
    pub fn rebuild(&mut self, factory: &dyn RelationFactory) -> Vec<RelationId> {
        let mut missing = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if entry.relation.is_some() {
                continue;
            }
            match factory.build(id, &entry.descriptor) {
                Some(relation) => entry.relation = Some(relation),
                None => missing.push(id.clone()),
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suss_core::Timestamp;

    fn identity(
        src: &Node,
        _tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        Ok(RelationOutput::new(
            src.value.clone(),
            src.value.clone(),
            meta.clone(),
        ))
    }

    struct CopyFactory;

    impl RelationFactory for CopyFactory {
        fn build(&self, _id: &RelationId, descriptor: &RelationDescriptor) -> Option<Relation> {
            (descriptor.name == "copy").then(|| Relation::link(identity))
        }
    }

    #[test]
    fn test_closure_relation() {
        let relation = Relation::link(identity);
        let Relation::Link(f) = relation else {
            panic!("expected link relation");
        };
        let node = Node::observed(Value::number("x", 4.0), Timestamp::ZERO);
        let out = f.apply(&node, &node, &[], &Annotations::new()).unwrap();
        assert_eq!(out.tgt.as_number(), Some(4.0));
    }

    #[test]
    fn test_registry_rebuild() {
        let mut registry = RelationRegistry::new();
        registry.register_descriptor("a", RelationDescriptor::link("copy"));
        registry.register_descriptor("b", RelationDescriptor::link("unknown"));
        assert!(registry.get("a").is_none());

        let missing = registry.rebuild(&CopyFactory);
        assert_eq!(missing, vec![RelationId::new("b")]);
        assert!(registry.get("a").is_some());
        assert!(registry.get("b").is_none());
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_descriptor_params() {
        let d = RelationDescriptor::link("linear")
            .with_param("a", 32.0)
            .with_param("b", 1.8);
        assert_eq!(d.param_f64("b"), Some(1.8));
        assert_eq!(d.param_f64("c"), None);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"kind\":\"link\""));
    }
}
