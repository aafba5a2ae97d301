//! Round arithmetic on causal timestamps
//!
//! `Idx = BaseIdx + Round / MaxRounds` with `0 <= Round < MaxRounds`.
//! - `increment_round` refines a timestamp inside one causal step
//! - `increment_base_idx` marks a genuine external causal step
//!
//! INVARIANT: Idx strictly increases across the rounds of one causal step.
//! Running out of rounds is fatal and signals a divergent network.

use std::cmp::Ordering;

use suss_core::{SussError, SussResult, Timestamp};

/// Default round budget per causal step
pub const DEFAULT_MAX_ROUNDS: u32 = 100;

/// Build a timestamp from its decomposed index
pub fn create_t(epoch: u64, wall: f64, base_idx: f64, round: u32, max_rounds: u32) -> Timestamp {
    let fraction = if max_rounds == 0 {
        0.0
    } else {
        round as f64 / max_rounds as f64
    };
    Timestamp::new(epoch, wall, base_idx + fraction)
}

/// Lexicographic comparison on (Epoch, Idx, Wall)
#[inline]
pub fn compare_t(a: &Timestamp, b: &Timestamp) -> Ordering {
    a.cmp(b)
}

/// Advance to the next propagation round of the same causal step.
///
/// Fails with [`SussError::RoundOverflow`] once the round would reach
/// `max_rounds`.
pub fn increment_round(t: &Timestamp, max_rounds: u32) -> SussResult<Timestamp> {
    let base = t.base_idx();
    let round = t.round(max_rounds) + 1;
    if round >= max_rounds {
        return Err(SussError::RoundOverflow { round, max_rounds });
    }
    Ok(create_t(t.epoch, t.wall, base, round, max_rounds))
}

/// Start the next causal step: BaseIdx + 1, round reset to 0
#[inline]
pub fn increment_base_idx(t: &Timestamp) -> Timestamp {
    Timestamp::new(t.epoch, t.wall, t.base_idx() + 1.0)
}
