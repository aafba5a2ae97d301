//! Pack and unpack

use suss_core::RelationId;
use suss_state::{Network, RelationFactory};
use tracing::{debug, warn};

use crate::{Envelope, WireNetwork, WireResult};

/// Encode a network as a compact JSON envelope
pub fn pack(network: &Network) -> WireResult<String> {
    let envelope = Envelope::seal(WireNetwork::from_network(network))?;
    Ok(serde_json::to_string(&envelope)?)
}

/// Encode a network as an indented JSON envelope
pub fn pack_pretty(network: &Network) -> WireResult<String> {
    let envelope = Envelope::seal(WireNetwork::from_network(network))?;
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Decode and verify an envelope. Relations come back as descriptors only.
pub fn unpack(json: &str) -> WireResult<Network> {
    let envelope: Envelope = serde_json::from_str(json)?;
    envelope.verify()?;
    let network = envelope.network.into_network()?;
    debug!(
        nodes = network.node_count(),
        links = network.links().len(),
        "network unpacked"
    );
    Ok(network)
}

/// Network decoded with its relations rebuilt
#[derive(Debug)]
pub struct Unpacked {
    pub network: Network,
    /// Descriptors the factory could not rebuild. They stay registered and
    /// fail at execution time.
    pub unresolved: Vec<RelationId>,
}

/// Decode, verify, and rebuild relations through `factory`
pub fn unpack_with(json: &str, factory: &dyn RelationFactory) -> WireResult<Unpacked> {
    let mut network = unpack(json)?;
    let unresolved = network.relations_mut().rebuild(factory);
    if !unresolved.is_empty() {
        warn!(count = unresolved.len(), "relations left unresolved after load");
    }
    Ok(Unpacked {
        network,
        unresolved,
    })
}

/// Content digest of a network, as it would appear in its envelope
pub fn digest(network: &Network) -> WireResult<String> {
    WireNetwork::from_network(network).digest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WireError;
    use suss_core::{Annotations, Lineage, Literal, Timestamp, Value};
    use suss_state::{
        Link, Node, Relation, RelationDescriptor, RelationError, RelationOutput,
    };

    fn copy(
        src: &Node,
        _tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        Ok(RelationOutput::new(src.value.clone(), src.value.clone(), meta.clone()))
    }

    struct CopyOnly;

    impl RelationFactory for CopyOnly {
        fn build(&self, _id: &RelationId, d: &RelationDescriptor) -> Option<Relation> {
            (d.name == "copy").then(|| Relation::link(copy))
        }
    }

    fn network() -> Network {
        let mut net = Network::new(Timestamp::new(2, 1700.5, 7.03))
            .with_node(
                "reading",
                Node::observed(
                    Value::assoc([("celsius", Value::number("c", 21.5))]).with_annotation("room", "lab"),
                    Timestamp::new(2, 1700.5, 7.0),
                )
                .with_meta("unit", "C"),
            )
            .with_node(
                "display",
                Node::new(Value::text("label", "21.5 C"), Timestamp::new(2, 1700.5, 7.03), Lineage::Stale),
            )
            .with_link(Link::new("node:reading", "node:display", "fmt").with_label("format"))
            .with_link(
                Link::new("node:reading", "node:archive", "copy")
                    .with_args(vec![Value::number("keep", 3.0)])
                    .with_meta("priority", 1),
            )
            .with_relation("copy", RelationDescriptor::link("copy"), Relation::link(copy));
        net.relations_mut()
            .register_descriptor("fmt", RelationDescriptor::link("format").with_param("digits", 1));
        net.set_meta("owner", "lab");
        net
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let net = network();
        let back = unpack(&pack(&net).unwrap()).unwrap();

        assert_eq!(back.as_of(), net.as_of());
        assert_eq!(back.meta(), net.meta());
        let ids: Vec<_> = back.node_ids().map(|id| id.as_str().to_owned()).collect();
        assert_eq!(ids, ["reading", "display"]);
        for (id, node) in net.nodes() {
            assert_eq!(back.node(id.as_str()), Some(node));
        }
        let links: Vec<&Link> = back.links().iter().map(|l| l.as_ref()).collect();
        let expected: Vec<&Link> = net.links().iter().map(|l| l.as_ref()).collect();
        assert_eq!(links, expected);
        assert_eq!(
            back.relations().descriptor("fmt").unwrap().params.get("digits"),
            Some(&Literal::Number(1.0))
        );
        // Executables never travel
        assert!(back.relations().get("copy").is_none());
    }

    #[test]
    fn test_timestamps_encode_as_tuples() {
        let json = pack(&network()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["network"]["as_of"], serde_json::json!([2, 1700.5, 7.03]));
        assert_eq!(doc["network"]["nodes"]["display"]["lineage"], "stale");
    }

    #[test]
    fn test_unpack_with_factory() {
        let out = unpack_with(&pack(&network()).unwrap(), &CopyOnly).unwrap();
        assert!(out.network.relations().get("copy").is_some());
        assert_eq!(out.unresolved, [RelationId::new("fmt")]);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let json = pack(&network()).unwrap().replace("21.5", "99.5");
        let err = unpack(&json).unwrap_err();
        assert!(matches!(err, WireError::DigestMismatch { .. }));
    }

    #[test]
    fn test_garbage_is_json_error() {
        assert!(matches!(unpack("{\"format\":"), Err(WireError::Json(_))));
    }

    #[test]
    fn test_pretty_and_compact_agree() {
        let net = network();
        let a = unpack(&pack(&net).unwrap()).unwrap();
        let b = unpack(&pack_pretty(&net).unwrap()).unwrap();
        assert_eq!(digest(&a).unwrap(), digest(&b).unwrap());
        assert_eq!(digest(&a).unwrap(), digest(&net).unwrap());
    }
}
