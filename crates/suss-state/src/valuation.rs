//! Valuation functions finalizing a Sync round
//!
//! Safety of leaderless finalization rests on these functions: mode, max and
//! quorum do not depend on who finalizes, and mean is only ever taken over
//! the complete accumulator.

use std::collections::HashMap;

use suss_core::{canonical_cmp, hash_value, SussError, SussResult, Valuation, Value};

/// Apply a valuation over accumulated values, in accumulator order
pub fn valuate(valuation: Valuation, values: &[Value]) -> SussResult<Value> {
    match valuation {
        Valuation::Mean => mean(values),
        Valuation::Mode => mode(values),
        Valuation::Max => max(values),
        Valuation::Quorum => quorum(values),
    }
}

/// Numeric average, shaped like the first value
pub fn mean(values: &[Value]) -> SussResult<Value> {
    let first = values.first().ok_or(SussError::EmptyValuation)?;
    let mut sum = 0.0;
    for value in values {
        sum += value
            .as_number()
            .ok_or_else(|| SussError::NonNumeric(format!("{value:?}")))?;
    }
    let avg = sum / values.len() as f64;
    first
        .with_number(avg)
        .ok_or_else(|| SussError::NonNumeric(format!("{first:?}")))
}

/// Most frequent value. Ties go to the value that reached the top count first.
pub fn mode(values: &[Value]) -> SussResult<Value> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut best: Option<(&Value, usize)> = None;
    for value in values {
        let count = counts.entry(hash_value(value)).or_insert(0);
        *count += 1;
        if best.map_or(true, |(_, top)| *count > top) {
            best = Some((value, *count));
        }
    }
    best.map(|(value, _)| value.clone())
        .ok_or(SussError::EmptyValuation)
}

/// Greatest value under the canonical total order. Equal values keep the first.
pub fn max(values: &[Value]) -> SussResult<Value> {
    values
        .iter()
        .reduce(|best, v| {
            if canonical_cmp(v, best).is_gt() {
                v
            } else {
                best
            }
        })
        .cloned()
        .ok_or(SussError::EmptyValuation)
}

/// First value to reach a strict majority (`n / 2 + 1`) in accumulator order,
/// falling back to [`mode`]
pub fn quorum(values: &[Value]) -> SussResult<Value> {
    let threshold = values.len() / 2 + 1;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        let count = counts.entry(hash_value(value)).or_insert(0);
        *count += 1;
        if *count >= threshold {
            return Ok(value.clone());
        }
    }
    mode(values)
}
