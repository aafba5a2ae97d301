//! Causal timestamps
//!
//! Suss uses a hybrid logical clock `T = (Epoch, SyncedWall, Idx)`:
//! - Epoch: logical counter advanced by the Sway Rule on every remote fusion
//! - SyncedWall: best-known synchronized wall time in milliseconds
//! - Idx: `BaseIdx + Round / MaxRounds`, the causal step plus its
//!   fractional propagation round
//!
//! Ordering is Epoch-authoritative: Epoch first, then Idx, with SyncedWall
//! only breaking ties. Wall-clock skew can never reorder causally distinct
//! events.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Causal timestamp, serialized as the numeric 3-tuple `[epoch, wall, idx]`
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
#[serde(from = "(u64, f64, f64)", into = "(u64, f64, f64)")]
pub struct Timestamp {
    pub epoch: u64,
    pub wall: f64,
    pub idx: f64,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp {
        epoch: 0,
        wall: 0.0,
        idx: 0.0,
    };

    #[inline]
    pub fn new(epoch: u64, wall: f64, idx: f64) -> Self {
        Timestamp { epoch, wall, idx }
    }

    /// Integral part of Idx: the causal step
    #[inline]
    pub fn base_idx(&self) -> f64 {
        self.idx.floor()
    }

    /// Propagation round encoded in the fractional part of Idx
    #[inline]
    pub fn round(&self, max_rounds: u32) -> u32 {
        ((self.idx - self.idx.floor()) * max_rounds as f64).round() as u32
    }

    /// Same timestamp with a different synced wall
    #[inline]
    pub fn with_wall(self, wall: f64) -> Self {
        Timestamp { wall, ..self }
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.idx.total_cmp(&other.idx))
            .then_with(|| self.wall.total_cmp(&other.wall))
    }
}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.idx.to_bits().hash(state);
        self.wall.to_bits().hash(state);
    }
}

impl From<(u64, f64, f64)> for Timestamp {
    fn from((epoch, wall, idx): (u64, f64, f64)) -> Self {
        Timestamp { epoch, wall, idx }
    }
}

impl From<Timestamp> for (u64, f64, f64) {
    fn from(t: Timestamp) -> Self {
        (t.epoch, t.wall, t.idx)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T({}, {}, {})", self.epoch, self.wall, self.idx)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
