//! Consensus fuzzer - randomized write bursts across replicas
//!
//! Each burst issues local writes, some of them concurrent on the same
//! node from every replica, then runs the simulator until idle. After each
//! burst it checks:
//! - Every replica holds the same value and lineage for every node
//! - No counter is left stale or demoted to derived
//! - The derived mirror matches its source

use indexmap::IndexSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use suss_core::{values_equal, Lineage, Value};

use crate::chaos::ChaosConfig;
use crate::fixtures::{counter_id, counter_network};
use crate::simulator::{Simulator, SimulatorConfig};

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    pub replicas: usize,
    /// Counter nodes
    pub nodes: usize,
    pub bursts: usize,
    /// Write attempts per burst; a node is written at most once per burst
    pub writes_per_burst: usize,
    /// Probability that a write is issued by every replica at once
    pub conflict_prob: f64,
    pub chaos: ChaosConfig,
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            replicas: 3,
            nodes: 8,
            bursts: 20,
            writes_per_burst: 4,
            conflict_prob: 0.3,
            chaos: ChaosConfig::default(),
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            replicas: 2,
            nodes: 4,
            bursts: 5,
            writes_per_burst: 2,
            ..Default::default()
        }
    }

    /// Heavy fuzzing on a hostile transport
    pub fn heavy() -> Self {
        FuzzerConfig {
            replicas: 5,
            nodes: 16,
            bursts: 40,
            writes_per_burst: 8,
            conflict_prob: 0.5,
            chaos: ChaosConfig::hostile(),
            seed: 42,
        }
    }
}

/// Fuzzing outcome
#[derive(Clone, Debug, Default)]
pub struct FuzzResult {
    pub writes: u64,
    pub conflicts: u64,
    pub steps: usize,
    pub sync_finalized: u64,
    pub violations: Vec<String>,
}

impl FuzzResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Randomized multi-replica consensus run
pub struct ConsensusFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
    sim: Simulator,
}

impl ConsensusFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let sim_config = SimulatorConfig {
            replicas: config.replicas,
            chaos: config.chaos.clone(),
            seed: config.seed,
            ..Default::default()
        };
        let sim = Simulator::quorum(sim_config, &counter_network(config.nodes));
        ConsensusFuzzer {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            sim,
        }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    /// Run all bursts
    pub fn run(&mut self) -> FuzzResult {
        let mut result = FuzzResult::default();
        if self.config.nodes == 0 || self.config.replicas == 0 {
            return result;
        }

        for burst in 0..self.config.bursts {
            self.burst(&mut result);

            let report = self.sim.run_until_idle();
            result.steps += report.steps;
            if !report.idle {
                result
                    .violations
                    .push(format!("burst {burst}: not idle after {} steps", report.steps));
            }
            self.check(burst, &mut result);
        }

        result.sync_finalized = self
            .sim
            .replicas()
            .iter()
            .map(|r| r.stats().sync_finalized)
            .sum();
        result
    }

    fn burst(&mut self, result: &mut FuzzResult) {
        let mut written = IndexSet::new();
        for _ in 0..self.config.writes_per_burst {
            let node = self.rng.gen_range(0..self.config.nodes);
            if !written.insert(node) {
                continue;
            }
            let path = counter_id(node);

            let writers: Vec<usize> = if self.rng.gen::<f64>() < self.config.conflict_prob {
                result.conflicts += 1;
                (0..self.config.replicas).collect()
            } else {
                vec![self.rng.gen_range(0..self.config.replicas)]
            };
            for replica in writers {
                let value = Value::number("n", self.rng.gen_range(0..1000) as f64);
                match self.sim.write(replica, &path, value) {
                    Ok(_) => result.writes += 1,
                    Err(e) => result.violations.push(format!("write to {path} failed: {e}")),
                }
            }
        }
    }

    fn check(&self, burst: usize, result: &mut FuzzResult) {
        let divergent = self.sim.divergent_nodes();
        if !divergent.is_empty() {
            result
                .violations
                .push(format!("burst {burst}: divergent nodes {divergent:?}"));
        }

        for replica in self.sim.replicas() {
            let net = replica.network();
            for i in 0..self.config.nodes {
                let id = counter_id(i);
                match net.node(&id).map(|n| n.lineage) {
                    Some(Lineage::Observed | Lineage::Consensus) => {}
                    other => result.violations.push(format!(
                        "burst {burst}: {} holds {id} as {other:?}",
                        replica.id()
                    )),
                }
            }
            let (Some(source), Some(mirror)) = (net.node("n0"), net.node("mirror")) else {
                continue;
            };
            if !values_equal(&source.value, &mirror.value) {
                result
                    .violations
                    .push(format!("burst {burst}: {} mirror out of date", replica.id()));
            }
        }
    }
}
