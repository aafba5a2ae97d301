//! Clock Engine - the causal clock of one replica
//!
//! The engine owns the replica's current timestamp and decides how it moves:
//! - `tick` starts a new causal step for a local external event
//! - `receive` fuses a remote timestamp through the Sway Rule
//! - `witness` lifts the clock to a timestamp produced locally
//!
//! Wall time comes from a pluggable [`WallClock`] so simulations and tests
//! can drive it deterministically.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use suss_core::{SussResult, Timestamp};

use crate::{apply_sway_rule, increment_base_idx, increment_round, DEFAULT_MAX_ROUNDS};

/// Source of synchronized wall time, in milliseconds
pub trait WallClock: Send + Sync {
    fn now_ms(&self) -> f64;
}

impl<W: WallClock + ?Sized> WallClock for Arc<W> {
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }
}

/// Operating system wall clock, milliseconds since the UNIX epoch
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_ms(&self) -> f64 {
        // A clock set before 1970 reads as zero
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Manually driven wall clock for simulations
#[derive(Debug, Default)]
pub struct ManualWallClock {
    now: Mutex<f64>,
}

impl ManualWallClock {
    pub fn new(start_ms: f64) -> Self {
        ManualWallClock {
            now: Mutex::new(start_ms),
        }
    }

    pub fn set(&self, ms: f64) {
        *self.now.lock() = ms;
    }

    pub fn advance(&self, ms: f64) {
        *self.now.lock() += ms;
    }
}

impl WallClock for ManualWallClock {
    fn now_ms(&self) -> f64 {
        *self.now.lock()
    }
}

/// Clock configuration
#[derive(Clone, Debug)]
pub struct ClockConfig {
    /// Propagation rounds available per causal step
    pub max_rounds: u32,
    /// Epoch of a freshly created clock
    pub initial_epoch: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            max_rounds: DEFAULT_MAX_ROUNDS,
            initial_epoch: 0,
        }
    }
}

impl ClockConfig {
    /// Configuration for deep relation chains
    pub fn fine_grained() -> Self {
        ClockConfig {
            max_rounds: 1000,
            ..Default::default()
        }
    }
}

/// Replica clock
pub struct ClockEngine<W: WallClock = SystemWallClock> {
    current: Timestamp,
    wall: W,
    config: ClockConfig,
}

impl ClockEngine<SystemWallClock> {
    /// Create a clock on the system wall time
    pub fn new(config: ClockConfig) -> Self {
        Self::with_wall(config, SystemWallClock)
    }
}

impl Default for ClockEngine<SystemWallClock> {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}

impl<W: WallClock> ClockEngine<W> {
    /// Create a clock on a custom wall time source
    pub fn with_wall(config: ClockConfig, wall: W) -> Self {
        let current = Timestamp::new(config.initial_epoch, wall.now_ms(), 0.0);
        ClockEngine {
            current,
            wall,
            config,
        }
    }

    /// Current timestamp
    #[inline]
    pub fn now(&self) -> Timestamp {
        self.current
    }

    #[inline]
    pub fn max_rounds(&self) -> u32 {
        self.config.max_rounds
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Start a new causal step for a local external event.
    /// The synced wall never moves backwards.
    pub fn tick(&mut self) -> Timestamp {
        let wall = self.current.wall.max(self.wall.now_ms());
        self.current = increment_base_idx(&self.current).with_wall(wall);
        self.current
    }

    /// Fuse a remote timestamp (Sway Rule)
    pub fn receive(&mut self, remote: &Timestamp) -> Timestamp {
        self.current = apply_sway_rule(&self.current, remote);
        self.current
    }

    /// Lift the clock to a locally produced timestamp, if it is ahead
    pub fn witness(&mut self, t: &Timestamp) -> Timestamp {
        if *t > self.current {
            self.current = *t;
        }
        self.current
    }

    /// Next propagation round after `t` under this clock's budget
    pub fn next_round(&self, t: &Timestamp) -> SussResult<Timestamp> {
        increment_round(t, self.config.max_rounds)
    }

    /// Lift the synced wall to the greatest of a set of gossiped wall times
    pub fn sync_wall(&mut self, walls: impl IntoIterator<Item = f64>) -> Timestamp {
        let wall = walls
            .into_iter()
            .fold(self.current.wall.max(self.wall.now_ms()), f64::max);
        self.current = self.current.with_wall(wall);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual(start: f64) -> (Arc<ManualWallClock>, ClockEngine<Arc<ManualWallClock>>) {
        let wall = Arc::new(ManualWallClock::new(start));
        let engine = ClockEngine::with_wall(ClockConfig::default(), wall.clone());
        (wall, engine)
    }

    #[test]
    fn test_tick_advances_base_idx() {
        let (wall, mut clock) = manual(1000.0);
        let t0 = clock.now();
        wall.advance(5.0);
        let t1 = clock.tick();
        assert!(t1 > t0);
        assert_eq!(t1.idx, 1.0);
        assert_eq!(t1.wall, 1005.0);
    }

    #[test]
    fn test_tick_wall_never_regresses() {
        let (wall, mut clock) = manual(1000.0);
        wall.set(10.0);
        let t = clock.tick();
        assert_eq!(t.wall, 1000.0);
    }

    #[test]
    fn test_receive_applies_sway() {
        let (_, mut clock) = manual(0.0);
        let remote = Timestamp::new(4, 0.0, 9.0);
        let fused = clock.receive(&remote);
        assert_eq!(fused.epoch, 5);
        assert_eq!(fused.idx, 0.0);
        assert!(fused > remote);
    }

    #[test]
    fn test_witness_only_moves_forward() {
        let (_, mut clock) = manual(0.0);
        let ahead = Timestamp::new(0, 0.0, 3.0);
        assert_eq!(clock.witness(&ahead), ahead);
        let behind = Timestamp::new(0, 0.0, 1.0);
        assert_eq!(clock.witness(&behind), ahead);
    }

    #[test]
    fn test_next_round_uses_budget() {
        let wall = ManualWallClock::new(0.0);
        let clock = ClockEngine::with_wall(
            ClockConfig {
                max_rounds: 2,
                initial_epoch: 0,
            },
            wall,
        );
        let t = clock.next_round(&clock.now()).unwrap();
        assert!(clock.next_round(&t).is_err());
    }

    #[test]
    fn test_sync_wall() {
        let (_, mut clock) = manual(100.0);
        let t = clock.sync_wall([50.0, 250.0, 120.0]);
        assert_eq!(t.wall, 250.0);
    }

    #[test]
    fn test_system_wall_clock_positive() {
        assert!(SystemWallClock.now_ms() > 0.0);
    }
}
