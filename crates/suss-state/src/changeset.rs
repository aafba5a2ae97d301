//! Change-set ordering and folding
//!
//! - Injector: keeps a change set causally ordered as pulses arrive
//! - Aggregator: folds redundant Observe chains before they are applied
//!
//! A net-zero Observe chain (`1 -> 2 -> 1`) is causally invisible and
//! folds to nothing.

use indexmap::IndexMap;
use suss_core::{values_equal, ChangeSet, NodeId, ObserveArgs, Pulse, PulseArgs, Value};

/// Insert a pulse in T order. Pulses with equal T go after the existing ones.
pub fn add_pulse(set: &ChangeSet, pulse: Pulse) -> ChangeSet {
    let mut pulses = set.clone().into_vec();
    let at = pulses.partition_point(|p| p.at <= pulse.at);
    pulses.insert(at, pulse);
    ChangeSet::from_ordered(pulses)
}

/// Insert many pulses, in iteration order
pub fn add_pulses(set: &ChangeSet, pulses: impl IntoIterator<Item = Pulse>) -> ChangeSet {
    let mut out = set.clone().into_vec();
    for pulse in pulses {
        let at = out.partition_point(|p| p.at <= pulse.at);
        out.insert(at, pulse);
    }
    ChangeSet::from_ordered(out)
}

/// Whether appending `pulse` keeps the set ordered without reinsertion
pub fn can_add_pulse(set: &ChangeSet, pulse: &Pulse) -> bool {
    set.latest().map_or(true, |last| pulse.at >= last.at)
}

/// Fold Observe chains per path.
///
/// Each path's chain keeps the first `old` and the last `new`, stamped with
/// the last pulse's T and metadata. Chains whose net effect is a no-op are
/// dropped. Other pulses pass through unchanged. The result is re-sorted by T.
pub fn collapse(set: &ChangeSet) -> ChangeSet {
    let mut chains: IndexMap<NodeId, Vec<&Pulse>> = IndexMap::new();
    let mut passthrough: Vec<Pulse> = Vec::new();

    for pulse in set {
        match &pulse.args {
            PulseArgs::Observe(args) => chains.entry(args.path.clone()).or_default().push(pulse),
            _ => passthrough.push(pulse.clone()),
        }
    }

    let mut out = passthrough;
    for (path, chain) in chains {
        if let Some(folded) = fold_chain(path, &chain) {
            out.push(folded);
        }
    }
    ChangeSet::sorted(out)
}

fn fold_chain(path: NodeId, chain: &[&Pulse]) -> Option<Pulse> {
    let (first, last) = (chain.first()?, chain.last()?);
    let old = first.as_observe()?.old.clone();
    let new = last.as_observe()?.new.clone();
    if values_equal(&old, &new) {
        return None;
    }
    Some(Pulse {
        at: last.at,
        tag: first.tag.clone(),
        args: PulseArgs::Observe(ObserveArgs { path, old, new }),
        meta: last.meta.clone(),
    })
}

/// Drop Observe pulses whose `old` and `new` are structurally equal
pub fn remove_no_ops(set: &ChangeSet) -> ChangeSet {
    let kept = set
        .iter()
        .filter(|p| match p.as_observe() {
            Some(args) => !values_equal(&args.old, &args.new),
            None => true,
        })
        .cloned()
        .collect();
    ChangeSet::from_ordered(kept)
}

/// Latest observed value per path, in first-touch order
pub fn materialize(set: &ChangeSet) -> IndexMap<NodeId, Value> {
    let mut latest = IndexMap::new();
    for args in set.iter().filter_map(Pulse::as_observe) {
        latest.insert(args.path.clone(), args.new.clone());
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use suss_core::Timestamp;

    fn t(idx: f64) -> Timestamp {
        Timestamp::new(1, 0.0, idx)
    }

    fn n(x: f64) -> Value {
        Value::number("v", x)
    }

    fn obs(idx: f64, path: &str, old: f64, new: f64) -> Pulse {
        Pulse::observe(t(idx), path, n(old), n(new))
    }

    #[test]
    fn test_add_pulse_orders_by_t() {
        let mut set = ChangeSet::new();
        for idx in [3.0, 1.0, 2.0, 1.0] {
            set = add_pulse(&set, Pulse::custom(t(idx), format!("p{idx}"), vec![]));
        }
        let idxs: Vec<f64> = set.iter().map(|p| p.at.idx).collect();
        assert_eq!(idxs, [1.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_add_pulse_equal_t_is_stable() {
        let set = add_pulses(
            &ChangeSet::new(),
            [
                Pulse::custom(t(1.0), "first", vec![]),
                Pulse::custom(t(1.0), "second", vec![]),
                Pulse::custom(t(0.5), "earlier", vec![]),
                Pulse::custom(t(1.0), "third", vec![]),
            ],
        );
        let tags: Vec<_> = set.iter().map(|p| p.tag.as_str()).collect();
        assert_eq!(tags, ["earlier", "first", "second", "third"]);
    }

    #[test]
    fn test_can_add_pulse() {
        let empty = ChangeSet::new();
        assert!(can_add_pulse(&empty, &obs(0.0, "a", 0.0, 1.0)));

        let set = add_pulse(&empty, obs(2.0, "a", 0.0, 1.0));
        assert!(can_add_pulse(&set, &obs(2.0, "a", 1.0, 2.0)));
        assert!(can_add_pulse(&set, &obs(3.0, "a", 1.0, 2.0)));
        assert!(!can_add_pulse(&set, &obs(1.0, "a", 1.0, 2.0)));
    }

    #[test]
    fn test_collapse_chain() {
        let set = ChangeSet::sorted(vec![
            obs(1.0, "p", 1.0, 2.0),
            obs(2.0, "p", 2.0, 3.0),
        ]);
        let folded = collapse(&set);
        assert_eq!(folded.len(), 1);
        let args = folded.latest().unwrap().as_observe().unwrap();
        assert_eq!(args.path.as_str(), "p");
        assert_eq!(args.old, n(1.0));
        assert_eq!(args.new, n(3.0));
        assert_eq!(folded.latest().unwrap().at, t(2.0));
    }

    #[test]
    fn test_collapse_net_zero_chain() {
        let set = ChangeSet::sorted(vec![
            obs(1.0, "p", 1.0, 2.0),
            obs(2.0, "p", 2.0, 1.0),
        ]);
        assert!(collapse(&set).is_empty());
    }

    #[test]
    fn test_collapse_keeps_other_pulses_and_order() {
        let set = ChangeSet::sorted(vec![
            obs(1.0, "a", 0.0, 1.0),
            Pulse::custom(t(1.5), "note", vec![]),
            obs(2.0, "b", 5.0, 6.0),
            obs(3.0, "a", 1.0, 2.0),
            Pulse::custom(t(4.0), "note", vec![]),
        ]);
        let folded = collapse(&set);
        assert!(folded.is_ordered());
        let summary: Vec<_> = folded
            .iter()
            .map(|p| (p.tag.clone(), p.path().map(|id| id.to_string())))
            .collect();
        assert_eq!(
            summary,
            [
                ("note".to_string(), None),
                ("observe".to_string(), Some("b".to_string())),
                ("observe".to_string(), Some("a".to_string())),
                ("note".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_remove_no_ops() {
        let set = ChangeSet::sorted(vec![
            obs(1.0, "a", 1.0, 1.0),
            obs(2.0, "b", 1.0, 2.0),
            Pulse::custom(t(3.0), "note", vec![]),
        ]);
        let kept = remove_no_ops(&set);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.iter().next().unwrap().path().unwrap().as_str(), "b");
    }

    #[test]
    fn test_materialize() {
        let set = ChangeSet::sorted(vec![
            obs(1.0, "a", 0.0, 1.0),
            obs(2.0, "b", 0.0, 9.0),
            obs(3.0, "a", 1.0, 4.0),
        ]);
        let values = materialize(&set);
        assert_eq!(values.len(), 2);
        assert_eq!(values["a"], n(4.0));
        assert_eq!(values["b"], n(9.0));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_add_pulse_keeps_order(idxs in prop::collection::vec(0u8..10, 0..30)) {
                let mut set = ChangeSet::new();
                for (i, idx) in idxs.iter().enumerate() {
                    set = add_pulse(&set, Pulse::custom(t(*idx as f64), i.to_string(), vec![]));
                }
                prop_assert!(set.is_ordered());
                prop_assert_eq!(set.len(), idxs.len());

                // Equal-T pulses keep their arrival order
                for w in set.as_slice().windows(2) {
                    if w[0].at == w[1].at {
                        let a: usize = w[0].tag.parse().unwrap();
                        let b: usize = w[1].tag.parse().unwrap();
                        prop_assert!(a < b);
                    }
                }
            }
        }
    }
}
