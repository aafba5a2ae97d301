//! Node and relation resolvers
//!
//! Resolvers are the seams through which operations read a network. The
//! defaults look records up directly; callers can swap in resolvers that
//! rebuild relations lazily or project nodes from elsewhere.

use suss_core::{NodeId, RelationId, SussError, SussResult};

use crate::{Network, Node, Relation, RelationFactory};

/// Resolves a node id against a network
pub trait NodeResolver {
    fn resolve<'n>(&self, id: &NodeId, network: &'n Network) -> SussResult<&'n Node>;
}

/// Resolves a relation id against a network
pub trait RelationResolver {
    fn resolve(&self, id: &RelationId, network: &Network) -> SussResult<Relation>;
}

/// Direct lookup in the node map
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultNodeResolver;

impl NodeResolver for DefaultNodeResolver {
    fn resolve<'n>(&self, id: &NodeId, network: &'n Network) -> SussResult<&'n Node> {
        network.get_node(id)
    }
}

/// Lookup of already-executable relations in the registry
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRelationResolver;

impl RelationResolver for DefaultRelationResolver {
    fn resolve(&self, id: &RelationId, network: &Network) -> SussResult<Relation> {
        network
            .relations()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| SussError::RelationNotFound(id.clone()))
    }
}

/// Registry lookup falling back to rebuilding unresolved descriptors
pub struct FactoryRelationResolver<F> {
    factory: F,
}

impl<F: RelationFactory> FactoryRelationResolver<F> {
    pub fn new(factory: F) -> Self {
        FactoryRelationResolver { factory }
    }
}

impl<F: RelationFactory> RelationResolver for FactoryRelationResolver<F> {
    fn resolve(&self, id: &RelationId, network: &Network) -> SussResult<Relation> {
        let registry = network.relations();
        if let Some(relation) = registry.get(id.as_str()) {
            return Ok(relation.clone());
        }
        registry
            .descriptor(id.as_str())
            .and_then(|descriptor| self.factory.build(id, descriptor))
            .ok_or_else(|| SussError::RelationNotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RelationDescriptor, RelationError, RelationOutput};
    use suss_core::{Annotations, Timestamp, Value};

    fn passthrough(
        src: &Node,
        tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        Ok(RelationOutput::new(
            src.value.clone(),
            tgt.value.clone(),
            meta.clone(),
        ))
    }

    struct Passthrough;

    impl RelationFactory for Passthrough {
        fn build(&self, _id: &RelationId, _d: &RelationDescriptor) -> Option<Relation> {
            Some(Relation::link(passthrough))
        }
    }

    #[test]
    fn test_default_node_resolver() {
        let net = Network::default().with_node(
            "a",
            Node::observed(Value::number("a", 1.0), Timestamp::ZERO),
        );
        assert!(DefaultNodeResolver.resolve(&"a".into(), &net).is_ok());
        assert!(matches!(
            DefaultNodeResolver.resolve(&"b".into(), &net),
            Err(SussError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_unresolved_descriptor_fails_at_execution() {
        let mut net = Network::default();
        net.relations_mut()
            .register_descriptor("r", RelationDescriptor::link("passthrough"));

        let err = DefaultRelationResolver
            .resolve(&"r".into(), &net)
            .unwrap_err();
        assert_eq!(err, SussError::RelationNotFound("r".into()));

        let resolver = FactoryRelationResolver::new(Passthrough);
        assert!(resolver.resolve(&"r".into(), &net).is_ok());
        // Unknown ids still fail, even with a permissive factory
        assert!(resolver.resolve(&"missing".into(), &net).is_err());
    }
}
