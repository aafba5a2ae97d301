//! Shadow object network
//!
//! Each field of a flat object becomes an observed node holding an atomic
//! value tagged with the field name. Only the field literals are kept, so
//! reading the network back yields the same object.

use suss_core::{Fields, Timestamp, Value};
use suss_state::{Network, Node};
use tracing::debug;

/// One observed node per field, all stamped at the zero timestamp
pub fn create_shadow_network(object: &Fields) -> Network {
    let mut net = Network::new(Timestamp::ZERO);
    for (key, literal) in object {
        net.insert_node(
            key.as_str(),
            Node::observed(Value::atom(key.as_str(), literal.clone()), Timestamp::ZERO),
        );
    }
    debug!(fields = object.len(), "shadow network created");
    net
}

/// Read every atomic node back into a field. Associative nodes are skipped.
pub fn sync_from_shadow(network: &Network) -> Fields {
    network
        .nodes()
        .filter_map(|(id, node)| {
            node.value
                .literal()
                .map(|literal| (id.as_str().to_owned(), literal.clone()))
        })
        .collect()
}
