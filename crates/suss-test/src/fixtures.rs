//! Networks shared by tests, the simulator and benches

use suss_core::{Timestamp, Value};
use suss_relations::{Linear, Mark, StandardRelation};
use suss_state::{Link, Network, Node};

/// `celsius -> fahrenheit` through `f = 32 + 1.8·c`.
/// Celsius starts observed at `celsius`, fahrenheit derived at 0.
pub fn temperature_network(celsius: f64) -> Network {
    let mut net = Network::new(Timestamp::ZERO)
        .with_node("celsius", Node::observed(Value::number("c", celsius), Timestamp::ZERO))
        .with_node("fahrenheit", Node::derived(Value::number("f", 0.0), Timestamp::ZERO))
        .with_link(Link::new("node:celsius", "node:fahrenheit", "c2f").with_label("convert"));
    Linear::celsius_to_fahrenheit().register(&mut net, "c2f");
    net
}

/// Temperature network extended with `fahrenheit -> kelvin`
pub fn kelvin_chain(celsius: f64) -> Network {
    let mut net = temperature_network(celsius)
        .with_node("kelvin", Node::derived(Value::number("k", 0.0), Timestamp::ZERO))
        .with_link(Link::new("node:fahrenheit", "node:kelvin", "f2k"));
    // k = (f - 32)/1.8 + 273.15
    Linear::new(273.15 - 32.0 / 1.8, 1.0 / 1.8).register(&mut net, "f2k");
    net
}

/// `count` observed counters `n0..` at zero, with `n0` mirrored onto a
/// derived `mirror` node
pub fn counter_network(count: usize) -> Network {
    let mut net = Network::new(Timestamp::ZERO);
    for i in 0..count {
        net.insert_node(counter_id(i), Node::observed(Value::number("n", 0.0), Timestamp::ZERO));
    }
    if count > 0 {
        net.insert_node("mirror", Node::derived(Value::number("n", 0.0), Timestamp::ZERO));
        net.add_link(Link::new("node:n0", "node:mirror", "mark"));
        Mark.register(&mut net, "mark");
    }
    net
}

/// Node id of counter `i`
pub fn counter_id(i: usize) -> String {
    format!("n{i}")
}

/// Chain `s0 -> s1 -> ... -> s{len}` of doubling links; only `s0` observed
pub fn doubling_chain(len: usize) -> Network {
    let mut net = Network::new(Timestamp::ZERO)
        .with_node("s0", Node::observed(Value::number("s", 1.0), Timestamp::ZERO));
    for i in 1..=len {
        net.insert_node(format!("s{i}"), Node::derived(Value::number("s", 0.0), Timestamp::ZERO));
        net.add_link(Link::new(format!("node:s{}", i - 1), format!("node:s{i}"), "double"));
    }
    Linear::new(0.0, 2.0).register(&mut net, "double");
    net
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_shapes() {
        assert_eq!(temperature_network(25.0).node_count(), 2);
        assert_eq!(kelvin_chain(0.0).links().len(), 2);
        let counters = counter_network(4);
        assert_eq!(counters.node_count(), 5);
        assert!(counters.relations().contains("mark"));
        assert_eq!(counter_network(0).node_count(), 0);
        assert_eq!(doubling_chain(10).links().len(), 10);
    }
}
