//! Multi-replica simulator
//!
//! Every replica holds its own copy of a network. A step broadcasts each
//! replica's outgoing pulses to all peers through the chaos transport,
//! delivers them, ticks every replica and advances the wall clocks.

use std::sync::Arc;

use suss_core::{values_equal, NodeId, Pulse, SussResult, Value};
use suss_runtime::{Replica, ReplicaConfig};
use suss_state::{Network, ObserveOutcome};
use suss_time::ManualWallClock;
use tracing::{debug, warn};

use crate::chaos::{ChaosConfig, ChaosStats, ChaosTransport};

/// Simulated replica
pub type SimReplica = Replica<Arc<ManualWallClock>>;

/// Simulator configuration
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    pub replicas: usize,
    pub chaos: ChaosConfig,
    /// Transport seed
    pub seed: u64,
    /// Step budget for `run_until_idle`
    pub max_steps: usize,
    /// Wall time per step
    pub step_ms: f64,
    /// Replica `i` starts its wall clock `i·clock_skew_ms` late
    pub clock_skew_ms: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            replicas: 3,
            chaos: ChaosConfig::default(),
            seed: 42,
            max_steps: 200,
            step_ms: 1.0,
            clock_skew_ms: 0.0,
        }
    }
}

impl SimulatorConfig {
    /// Exactly-once, in-order delivery
    pub fn reliable(replicas: usize) -> Self {
        SimulatorConfig {
            replicas,
            chaos: ChaosConfig::reliable(),
            ..Default::default()
        }
    }

    /// Hostile transport
    pub fn hostile(replicas: usize, seed: u64) -> Self {
        SimulatorConfig {
            replicas,
            chaos: ChaosConfig::hostile(),
            seed,
            ..Default::default()
        }
    }
}

/// Result of running to idle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub steps: usize,
    pub delivered: u64,
    /// Ran out of work before the step budget
    pub idle: bool,
}

/// Multi-replica simulator
pub struct Simulator {
    replicas: Vec<SimReplica>,
    walls: Vec<Arc<ManualWallClock>>,
    transport: ChaosTransport<Pulse>,
    config: SimulatorConfig,
    steps: usize,
}

impl Simulator {
    /// Replicas `r0..` built from `template`, each with its own copy of
    /// `network`
    pub fn new(config: SimulatorConfig, network: &Network, template: ReplicaConfig) -> Self {
        let walls: Vec<Arc<ManualWallClock>> = (0..config.replicas)
            .map(|i| Arc::new(ManualWallClock::new(1_000.0 - i as f64 * config.clock_skew_ms)))
            .collect();
        let replicas = walls
            .iter()
            .enumerate()
            .map(|(i, wall)| {
                let replica_config = template.clone().with_id(format!("r{i}"));
                Replica::with_wall(replica_config, network.clone(), wall.clone())
            })
            .collect();

        Simulator {
            replicas,
            walls,
            transport: ChaosTransport::new(config.chaos.clone(), config.seed),
            config,
            steps: 0,
        }
    }

    /// Every replica takes part in every Sync round
    pub fn quorum(config: SimulatorConfig, network: &Network) -> Self {
        let template = ReplicaConfig {
            max_inbound: 100_000,
            max_outbound: 100_000,
            ..ReplicaConfig::quorum(config.replicas)
        };
        Self::new(config, network, template)
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn replica(&self, i: usize) -> &SimReplica {
        &self.replicas[i]
    }

    pub fn replica_mut(&mut self, i: usize) -> &mut SimReplica {
        &mut self.replicas[i]
    }

    pub fn replicas(&self) -> &[SimReplica] {
        &self.replicas
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn transport_stats(&self) -> &ChaosStats {
        self.transport.stats()
    }

    /// Local write at replica `i`
    pub fn observe(
        &mut self,
        i: usize,
        path: impl Into<NodeId>,
        old: Value,
        new: Value,
    ) -> SussResult<ObserveOutcome> {
        self.replicas[i].observe_local(path, old, new)
    }

    /// Write at replica `i` against its current value of `path`
    pub fn write(&mut self, i: usize, path: &str, new: Value) -> SussResult<ObserveOutcome> {
        let old = self.replicas[i]
            .network()
            .get_node(&NodeId::from(path))?
            .value
            .clone();
        self.observe(i, path, old, new)
    }

    /// Every replica queues a Clock pulse
    pub fn gossip_clocks(&mut self) {
        for replica in &mut self.replicas {
            replica.gossip_clock();
        }
    }

    /// Broadcast, deliver, tick. Returns the number of pulses delivered.
    pub fn step(&mut self) -> usize {
        let n = self.replicas.len();
        for (i, replica) in self.replicas.iter_mut().enumerate() {
            for pulse in replica.drain_outgoing() {
                for to in (0..n).filter(|&to| to != i) {
                    self.transport.send(to, pulse.clone());
                }
            }
        }

        let packets = self.transport.deliver();
        let delivered = packets.len();
        for packet in packets {
            self.replicas[packet.to].queue_incoming(packet.payload);
        }

        for replica in &mut self.replicas {
            replica.tick();
        }
        for wall in &self.walls {
            wall.advance(self.config.step_ms);
        }
        self.steps += 1;
        delivered
    }

    /// Nothing queued anywhere
    pub fn is_idle(&self) -> bool {
        self.transport.in_flight() == 0 && self.replicas.iter().all(|r| r.is_idle())
    }

    /// Step until no pulse moves or the step budget runs out
    pub fn run_until_idle(&mut self) -> SimulationReport {
        let mut report = SimulationReport::default();
        while report.steps < self.config.max_steps {
            if self.is_idle() {
                report.idle = true;
                break;
            }
            report.delivered += self.step() as u64;
            report.steps += 1;
        }
        if !report.idle {
            report.idle = self.is_idle();
        }
        if report.idle {
            debug!(steps = report.steps, delivered = report.delivered, "simulation idle");
        } else {
            warn!(steps = report.steps, "simulation still busy at step budget");
        }
        report
    }

    /// Nodes whose value or lineage differs from replica 0
    pub fn divergent_nodes(&self) -> Vec<NodeId> {
        let Some((first, rest)) = self.replicas.split_first() else {
            return Vec::new();
        };
        first
            .network()
            .nodes()
            .filter(|(id, node)| {
                rest.iter().any(|r| match r.network().node(id.as_str()) {
                    Some(other) => {
                        other.lineage != node.lineage || !values_equal(&other.value, &node.value)
                    }
                    None => true,
                })
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_converged(&self) -> bool {
        self.divergent_nodes().is_empty()
    }
}
