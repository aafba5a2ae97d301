//! Clock operation - fusing gossiped time into a network
//!
//! The network's `as_of` takes the Sway Rule against the remote timestamp;
//! its synced wall lifts to the greatest wall time in the clock dictionary.

use suss_core::{ClockDict, Pulse, PulseArgs, SussError, SussResult, Timestamp};
use suss_time::apply_sway_rule;
use tracing::trace;

use crate::Network;

/// Fuse a remote timestamp and a clock dictionary into `network`
pub fn apply_clock(network: &Network, remote: &Timestamp, clocks: &ClockDict) -> Network {
    let fused = apply_sway_rule(&network.as_of(), remote);
    let wall = clocks.values().copied().fold(fused.wall, f64::max);
    let as_of = fused.with_wall(wall);
    trace!(from = %network.as_of(), to = %as_of, peers = clocks.len(), "clock fused");

    let mut next = network.clone();
    next.set_as_of(as_of);
    next
}

/// Apply a Clock pulse
pub fn apply_clock_pulse(network: &Network, pulse: &Pulse) -> SussResult<Network> {
    match &pulse.args {
        PulseArgs::Clock(args) => Ok(apply_clock(network, &pulse.at, &args.clocks)),
        _ => Err(SussError::UnexpectedPulse {
            expected: "clock",
            tag: pulse.tag.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suss_core::ReplicaId;

    #[test]
    fn test_clock_sways_epoch_and_lifts_wall() {
        let net = Network::new(Timestamp::new(2, 100.0, 5.0));
        let clocks = ClockDict::from([
            (ReplicaId::new("r1"), 150.0),
            (ReplicaId::new("r2"), 90.0),
        ]);
        let next = apply_clock(&net, &Timestamp::new(6, 0.0, 1.0), &clocks);
        let t = next.as_of();
        assert_eq!(t.epoch, 7);
        assert_eq!(t.idx, 5.0);
        assert_eq!(t.wall, 150.0);
        assert!(t > net.as_of());
    }

    #[test]
    fn test_clock_wall_never_regresses() {
        let net = Network::new(Timestamp::new(0, 500.0, 0.0));
        let next = apply_clock(&net, &Timestamp::ZERO, &ClockDict::new());
        assert_eq!(next.as_of().wall, 500.0);
        assert_eq!(next.as_of().epoch, 1);
    }

    #[test]
    fn test_clock_pulse() {
        let net = Network::default();
        let pulse = Pulse::clock(Timestamp::new(3, 0.0, 0.0), ClockDict::new());
        assert_eq!(apply_clock_pulse(&net, &pulse).unwrap().as_of().epoch, 4);
    }
}
