//! Temperature converter network

use suss_core::{Timestamp, Value};
use suss_relations::{Linear, StandardRelation};
use suss_state::{Link, Network, Node};

pub const CELSIUS: &str = "celsius";
pub const FAHRENHEIT: &str = "fahrenheit";

/// Relation id of the conversion
pub const C2F: &str = "c2f";

/// Celsius observed at 25, fahrenheit derived at 0 until the first
/// propagation
pub fn create_temperature_network() -> Network {
    temperature_network_at(25.0)
}

/// Temperature network with celsius observed at `celsius`
pub fn temperature_network_at(celsius: f64) -> Network {
    let mut net = Network::new(Timestamp::ZERO)
        .with_node(CELSIUS, Node::observed(Value::number("celsius", celsius), Timestamp::ZERO))
        .with_node(FAHRENHEIT, Node::derived(Value::number("fahrenheit", 0.0), Timestamp::ZERO))
        .with_link(
            Link::new(format!("node:{CELSIUS}"), format!("node:{FAHRENHEIT}"), C2F)
                .with_label("convert"),
        );
    Linear::celsius_to_fahrenheit().register(&mut net, C2F);
    net
}

/// Numeric reading of a temperature node
pub fn reading(network: &Network, id: &str) -> Option<f64> {
    network.node(id).and_then(|n| n.value.as_number())
}
