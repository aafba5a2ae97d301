//! Chaos transport for pulse delivery
//!
//! Models the delivery guarantees replicas are built for:
//! - At-least-once: nothing is lost, anything may arrive twice
//! - Reordering within a bounded depth
//!
//! Seeded, so a failing run replays exactly.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Transport chaos configuration
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Probability a packet jumps ahead of queued ones
    pub reorder_prob: f64,
    /// How far ahead a reordered packet may jump
    pub reorder_depth: u32,
    /// Probability a packet is delivered twice
    pub duplicate_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            reorder_prob: 0.05,
            reorder_depth: 3,
            duplicate_prob: 0.01,
        }
    }
}

impl ChaosConfig {
    /// In-order, exactly-once delivery
    pub fn reliable() -> Self {
        ChaosConfig {
            reorder_prob: 0.0,
            reorder_depth: 0,
            duplicate_prob: 0.0,
        }
    }

    /// Frequent duplicates, no reordering
    pub fn duplicating() -> Self {
        ChaosConfig {
            duplicate_prob: 0.3,
            ..Self::reliable()
        }
    }

    /// Heavy reordering and duplication
    pub fn hostile() -> Self {
        ChaosConfig {
            reorder_prob: 0.3,
            reorder_depth: 8,
            duplicate_prob: 0.2,
        }
    }
}

/// Packet in flight
#[derive(Clone, Debug)]
pub struct ChaosPacket<T> {
    /// Destination index
    pub to: usize,
    /// Send sequence number; duplicates share it
    pub seq: u64,
    pub payload: T,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChaosStats {
    pub packets_sent: u64,
    pub packets_delivered: u64,
    pub packets_reordered: u64,
    pub packets_duplicated: u64,
}

impl ChaosStats {
    pub fn duplicate_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.packets_duplicated as f64 / self.packets_sent as f64
        }
    }
}

/// Seeded at-least-once transport
pub struct ChaosTransport<T> {
    config: ChaosConfig,
    rng: StdRng,
    in_flight: VecDeque<ChaosPacket<T>>,
    next_seq: u64,
    stats: ChaosStats,
}

impl<T: Clone> ChaosTransport<T> {
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        ChaosTransport {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: VecDeque::new(),
            next_seq: 0,
            stats: ChaosStats::default(),
        }
    }

    /// Send a payload to destination `to`
    pub fn send(&mut self, to: usize, payload: T) {
        self.stats.packets_sent += 1;
        let seq = self.next_seq;
        self.next_seq += 1;

        let packet = ChaosPacket { to, seq, payload };

        // Duplicate lands at the back; the original may still jump ahead
        if self.rng.gen::<f64>() < self.config.duplicate_prob {
            self.stats.packets_duplicated += 1;
            self.enqueue(packet.clone());
        }
        self.enqueue(packet);
    }

    fn enqueue(&mut self, packet: ChaosPacket<T>) {
        if self.rng.gen::<f64>() < self.config.reorder_prob && !self.in_flight.is_empty() {
            let depth = self.config.reorder_depth.min(self.in_flight.len() as u32);
            let pos = self.rng.gen_range(0..=depth) as usize;
            let insert_pos = self.in_flight.len().saturating_sub(pos);
            self.in_flight.insert(insert_pos, packet);
            self.stats.packets_reordered += 1;
        } else {
            self.in_flight.push_back(packet);
        }
    }

    /// Deliver everything in flight, in transport order
    pub fn deliver(&mut self) -> Vec<ChaosPacket<T>> {
        let delivered: Vec<ChaosPacket<T>> = self.in_flight.drain(..).collect();
        self.stats.packets_delivered += delivered.len() as u64;
        delivered
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ChaosStats::default();
    }
}
