//! Envelope and the serialized network model

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use suss_core::{Annotations, Lineage, NodeId, RelationId, Timestamp, Value};
use suss_state::{Link, Network, Node, RelationDescriptor};

use crate::{WireError, WireResult};

/// Current encoding version
pub const FORMAT: &str = "suss-prel/1";

/// Node as encoded; lineage is checked on decode
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
    pub value: Value,
    pub as_of: Timestamp,
    pub lineage: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub meta: Annotations,
}

/// Network as encoded
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireNetwork {
    pub as_of: Timestamp,
    #[serde(default)]
    pub meta: Annotations,
    pub nodes: IndexMap<NodeId, WireNode>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub relations: IndexMap<RelationId, RelationDescriptor>,
}

impl WireNetwork {
    /// Snapshot a network. Relations contribute their descriptors only.
    pub fn from_network(network: &Network) -> Self {
        WireNetwork {
            as_of: network.as_of(),
            meta: network.meta().clone(),
            nodes: network
                .nodes()
                .map(|(id, node)| {
                    let wire = WireNode {
                        value: node.value.clone(),
                        as_of: node.as_of,
                        lineage: node.lineage.name().to_owned(),
                        meta: node.meta.clone(),
                    };
                    (id.clone(), wire)
                })
                .collect(),
            links: network.links().iter().map(|l| (**l).clone()).collect(),
            relations: network
                .relations()
                .descriptors()
                .map(|(id, d)| (id.clone(), d.clone()))
                .collect(),
        }
    }

    /// Rebuild the network with descriptor-only relation entries
    pub fn into_network(self) -> WireResult<Network> {
        let mut network = Network::new(self.as_of);
        network.replace_meta(self.meta);
        for (id, wire) in self.nodes {
            let lineage = Lineage::from_name(&wire.lineage).ok_or_else(|| WireError::InvalidLineage {
                node: id.to_string(),
                lineage: wire.lineage.clone(),
            })?;
            network.insert_node(
                id,
                Node {
                    value: wire.value,
                    as_of: wire.as_of,
                    lineage,
                    meta: wire.meta,
                },
            );
        }
        for link in self.links {
            network.add_link(link);
        }
        for (id, descriptor) in self.relations {
            network.relations_mut().register_descriptor(id, descriptor);
        }
        Ok(network)
    }

    /// Hex SHA-256 of the compact JSON encoding
    pub fn digest(&self) -> WireResult<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex(&Sha256::digest(&bytes)))
    }
}

/// Top-level packed form
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub format: String,
    pub digest: String,
    pub network: WireNetwork,
}

impl Envelope {
    pub fn seal(network: WireNetwork) -> WireResult<Self> {
        Ok(Envelope {
            format: FORMAT.to_owned(),
            digest: network.digest()?,
            network,
        })
    }

    /// Check format and digest
    pub fn verify(&self) -> WireResult<()> {
        if self.format != FORMAT {
            return Err(WireError::UnsupportedVersion(self.format.clone()));
        }
        let actual = self.network.digest()?;
        if actual != self.digest {
            return Err(WireError::DigestMismatch {
                expected: self.digest.clone(),
                actual,
            });
        }
        Ok(())
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        Network::new(Timestamp::new(1, 10.0, 3.0))
            .with_node("a", Node::observed(Value::number("n", 1.0), Timestamp::new(1, 10.0, 2.0)))
            .with_link(Link::new("node:a", "node:b", "copy"))
    }

    #[test]
    fn test_digest_is_stable() {
        let wire = WireNetwork::from_network(&network());
        let d1 = wire.digest().unwrap();
        let d2 = WireNetwork::from_network(&network()).digest().unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
        assert!(d1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify() {
        let envelope = Envelope::seal(WireNetwork::from_network(&network())).unwrap();
        assert!(envelope.verify().is_ok());

        let mut tampered = envelope.clone();
        tampered.network.meta.insert("x".into(), suss_core::Literal::Number(1.0));
        assert!(tampered.verify().unwrap_err().is_integrity());

        let mut old = envelope;
        old.format = "suss-prel/0".into();
        assert!(matches!(old.verify(), Err(WireError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_invalid_lineage() {
        let mut wire = WireNetwork::from_network(&network());
        wire.nodes[0].lineage = "authoritative".into();
        assert!(matches!(
            wire.into_network(),
            Err(WireError::InvalidLineage { .. })
        ));
    }

    #[test]
    fn test_as_of_restored() {
        let net = network();
        let back = WireNetwork::from_network(&net).into_network().unwrap();
        assert_eq!(back.as_of(), net.as_of());
    }
}
