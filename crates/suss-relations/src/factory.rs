//! Rebuilding relations from descriptors
//!
//! Only descriptors survive serialization. [`StandardRelations`] turns the
//! descriptors of the closure-free standard relations back into executable
//! relations; callers add builders for their own relation families.

use std::sync::Arc;

use indexmap::IndexMap;
use suss_core::{Literal, NodeId, RelationId, Value};
use suss_state::{Network, Relation, RelationDescriptor, RelationFactory};
use tracing::debug;

use crate::gather::inner_descriptor;
use crate::{Gather, Linear, Mark, Reduce, Reducer, GATHER, LINEAR, MARK, REDUCE};

/// A relation that knows its own descriptor
pub trait StandardRelation: Sized {
    fn descriptor(&self) -> RelationDescriptor;

    fn into_relation(self) -> Relation;

    /// Register under `id` together with its descriptor
    fn register(self, network: &mut Network, id: impl Into<RelationId>) {
        let descriptor = self.descriptor();
        network.register_relation(id, descriptor, self.into_relation());
    }
}

/// Builder for a custom relation family
pub type RelationBuilder = Arc<dyn Fn(&RelationDescriptor) -> Option<Relation> + Send + Sync>;

/// Factory for the standard relation library plus custom builders
#[derive(Clone, Default)]
pub struct StandardRelations {
    builders: IndexMap<String, RelationBuilder>,
}

impl StandardRelations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a builder for descriptors named `name`. Custom builders take
    /// precedence over the built-in families.
    pub fn with_builder<F>(mut self, name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&RelationDescriptor) -> Option<Relation> + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Arc::new(builder));
        self
    }

    /// Build from a descriptor alone
    pub fn build_descriptor(&self, descriptor: &RelationDescriptor) -> Option<Relation> {
        if let Some(builder) = self.builders.get(&descriptor.name) {
            return builder(descriptor);
        }
        match descriptor.name.as_str() {
            LINEAR => {
                let a = descriptor.param_f64("a")?;
                let b = descriptor.param_f64("b")?;
                Some(Linear::new(a, b).into_relation())
            }
            MARK => Some(Mark.into_relation()),
            REDUCE => self.build_reduce(descriptor).map(StandardRelation::into_relation),
            GATHER => self.build_gather(descriptor).map(StandardRelation::into_relation),
            _ => None,
        }
    }

    fn build_reduce(&self, descriptor: &RelationDescriptor) -> Option<Reduce> {
        let name = descriptor.params.get("reducer")?.as_str()?;
        let reducer = Reducer::from_name(name)?;
        let initial = descriptor.param_f64("initial").unwrap_or(0.0);
        Some(Reduce::new(reducer, Value::number(name, initial)))
    }

    fn build_gather(&self, descriptor: &RelationDescriptor) -> Option<Gather> {
        let target = descriptor.params.get("target")?.as_str()?;
        let sources: Vec<NodeId> = match descriptor.params.get("sources")? {
            Literal::List(items) => items
                .iter()
                .filter_map(Literal::as_str)
                .map(NodeId::from)
                .collect(),
            _ => return None,
        };
        let inner = match self.build_descriptor(&inner_descriptor(descriptor)?)? {
            Relation::Link(link) => link,
            Relation::Op(_) => return None,
        };

        let gather =
            Gather::with_relation(inner, sources, target).described_by(inner_descriptor(descriptor));
        Some(match descriptor.param_f64("seed") {
            Some(seed) => {
                let tag = descriptor
                    .params
                    .get("inner.reducer")
                    .and_then(Literal::as_str)
                    .unwrap_or("value");
                gather.seeded(Value::number(tag, seed))
            }
            None => gather,
        })
    }
}

impl RelationFactory for StandardRelations {
    fn build(&self, id: &RelationId, descriptor: &RelationDescriptor) -> Option<Relation> {
        let relation = self.build_descriptor(descriptor);
        if relation.is_none() {
            debug!(relation = %id, name = %descriptor.name, "no builder for descriptor");
        }
        relation
    }
}
