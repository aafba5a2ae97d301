//! Property tests over propagation, change sets and replication

use proptest::prelude::*;
use suss_core::{ChangeSet, Lineage, Pulse, PulseArgs, Timestamp, Value};
use suss_propagate::{propagate, PropagationConfig, PropagationEngine};
use suss_relations::{Mark, StandardRelation};
use suss_state::{add_pulses, collapse, Link, Network, Node};
use suss_test::{counter_id, counter_network, doubling_chain, Simulator, SimulatorConfig};

fn lineage_strategy() -> impl Strategy<Value = Lineage> {
    prop_oneof![
        Just(Lineage::Observed),
        Just(Lineage::Consensus),
        Just(Lineage::Stale),
        Just(Lineage::Derived),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_settled_network_is_fixed_point(len in 1usize..12, seed in -50.0f64..50.0) {
        let mut net = doubling_chain(len);
        net.insert_node("s0", Node::observed(Value::number("s", seed), Timestamp::new(0, 0.0, 1.0)));
        let engine = PropagationEngine::new(PropagationConfig::default());

        let first = engine.propagate_from(&net, ["s0".into()]);
        prop_assert!(first.quiescent);
        let last = first.network.node(&format!("s{len}")).and_then(|n| n.value.as_number());
        prop_assert_eq!(last, Some(seed * 2f64.powi(len as i32)));

        let second = engine.propagate_from(&first.network, ["s0".into()]);
        prop_assert_eq!(second.stats.commits, 0);
    }

    #[test]
    fn prop_links_only_write_at_or_below_derived(lineage in lineage_strategy(), x in -100.0f64..100.0) {
        let mut net = Network::new(Timestamp::ZERO)
            .with_node("src", Node::observed(Value::number("v", x), Timestamp::new(0, 0.0, 1.0)))
            .with_node("tgt", Node::new(Value::number("v", 0.5), Timestamp::ZERO, lineage))
            .with_link(Link::new("node:src", "node:tgt", "mark"));
        Mark.register(&mut net, "mark");

        let seed = Pulse::observe(Timestamp::new(0, 0.0, 1.0), "src", Value::number("v", x), Value::number("v", x));
        let out = propagate(&net, &[seed], 100);
        let tgt = out.network.node("tgt").unwrap();
        if lineage == Lineage::Derived {
            prop_assert_eq!(&tgt.value, &Value::number("v", x));
        } else {
            prop_assert_eq!(tgt.lineage, lineage);
            prop_assert_eq!(&tgt.value, &Value::number("v", 0.5));
        }
    }

    #[test]
    fn prop_collapse_folds_each_path_once(
        writes in prop::collection::vec((0usize..4, 0u8..5, 1u32..1000), 0..40)
    ) {
        let pulses = writes.iter().map(|&(path, to, idx)| {
            Pulse::observe(
                Timestamp::new(0, 0.0, idx as f64),
                counter_id(path),
                Value::number("n", 0.0),
                Value::number("n", to as f64),
            )
        });
        let set = add_pulses(&ChangeSet::new(), pulses);
        prop_assert!(set.is_ordered());

        let folded = collapse(&set);
        prop_assert!(folded.is_ordered());
        prop_assert!(folded.len() <= 4);
        let mut paths = Vec::new();
        for pulse in &folded {
            let PulseArgs::Observe(args) = &pulse.args else {
                return Err(TestCaseError::fail("non-observe pulse after collapse"));
            };
            prop_assert!(!paths.contains(&args.path));
            prop_assert_ne!(&args.old, &args.new);
            paths.push(args.path.clone());
        }
    }

    #[test]
    fn prop_replicated_writes_converge(
        writes in prop::collection::vec((0usize..3, 0usize..4, 0u16..500), 1..12)
    ) {
        let mut sim = Simulator::quorum(SimulatorConfig::reliable(3), &counter_network(4));
        for &(replica, node, value) in &writes {
            sim.write(replica, &counter_id(node), Value::number("n", value as f64)).unwrap();
            prop_assert!(sim.run_until_idle().idle);
        }

        prop_assert!(sim.is_converged(), "divergent: {:?}", sim.divergent_nodes());
        let net = sim.replica(0).network();
        let (source, mirror) = (net.node("n0").unwrap(), net.node("mirror").unwrap());
        prop_assert_eq!(&source.value, &mirror.value);
    }
}
