//! Pulse definitions
//!
//! A pulse is a timestamped operation record `(T, Tag, Args, Meta?)`, either
//! applied to a network or emitted by one. Pulses are the only thing replicas
//! exchange:
//! - Observe pulses carry a CAS write `(Path, Old, New)`
//! - Sync pulses carry a consensus round and its accumulator
//! - Clock pulses carry gossiped wall times for clock fusion
//!
//! A change set is a T-ordered sequence of pulses.

use std::slice;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Annotations, NodeId, ReplicaId, Tag, Timestamp, Value};

/// Tag carried by Observe pulses
pub const OBSERVE_TAG: &str = "observe";
/// Tag carried by Sync pulses
pub const SYNC_TAG: &str = "sync";
/// Tag carried by Clock pulses
pub const CLOCK_TAG: &str = "clock";

/// Sync votes: participant id to proposed value, in arrival order
pub type Accumulator = IndexMap<ReplicaId, Value>;

/// Gossiped wall times, replica id to milliseconds
pub type ClockDict = IndexMap<ReplicaId, f64>;

/// Function finalizing a Sync round from its accumulated values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Valuation {
    /// Numeric average
    Mean,
    /// Most frequent value; ties go to the first value to reach the top count
    #[default]
    Mode,
    /// Greatest value under the canonical total order
    Max,
    /// First value held by a strict majority, falling back to mode
    Quorum,
}

/// Arguments of a CAS write
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObserveArgs {
    pub path: NodeId,
    pub old: Value,
    pub new: Value,
}

/// Arguments of a consensus round
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncArgs {
    pub path: NodeId,
    /// Participants required to finalize
    pub count: usize,
    pub accumulator: Accumulator,
    pub valuation: Valuation,
}

impl SyncArgs {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.accumulator.len() >= self.count
    }
}

/// Arguments of a clock fusion
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockArgs {
    pub clocks: ClockDict,
}

/// Pulse arguments, one shape per operation family
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseArgs {
    Observe(ObserveArgs),
    Sync(SyncArgs),
    Clock(ClockArgs),
    /// Free-form values for application-defined tags
    Values(Vec<Value>),
}

/// Timestamped operation record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    pub at: Timestamp,
    pub tag: Tag,
    pub args: PulseArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Annotations>,
}

impl Pulse {
    /// Create an Observe pulse
    pub fn observe(at: Timestamp, path: impl Into<NodeId>, old: Value, new: Value) -> Self {
        Pulse {
            at,
            tag: OBSERVE_TAG.to_owned(),
            args: PulseArgs::Observe(ObserveArgs {
                path: path.into(),
                old,
                new,
            }),
            meta: None,
        }
    }

    /// Create a Sync pulse opening a round with an empty accumulator
    pub fn sync(at: Timestamp, path: impl Into<NodeId>, count: usize, valuation: Valuation) -> Self {
        Pulse {
            at,
            tag: SYNC_TAG.to_owned(),
            args: PulseArgs::Sync(SyncArgs {
                path: path.into(),
                count,
                accumulator: Accumulator::new(),
                valuation,
            }),
            meta: None,
        }
    }

    /// Create a Clock pulse
    pub fn clock(at: Timestamp, clocks: ClockDict) -> Self {
        Pulse {
            at,
            tag: CLOCK_TAG.to_owned(),
            args: PulseArgs::Clock(ClockArgs { clocks }),
            meta: None,
        }
    }

    /// Create an application-defined pulse
    pub fn custom(at: Timestamp, tag: impl Into<Tag>, values: Vec<Value>) -> Self {
        Pulse {
            at,
            tag: tag.into(),
            args: PulseArgs::Values(values),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Annotations) -> Self {
        self.meta = Some(meta);
        self
    }

    #[inline]
    pub fn as_observe(&self) -> Option<&ObserveArgs> {
        match &self.args {
            PulseArgs::Observe(args) => Some(args),
            _ => None,
        }
    }

    #[inline]
    pub fn as_sync(&self) -> Option<&SyncArgs> {
        match &self.args {
            PulseArgs::Sync(args) => Some(args),
            _ => None,
        }
    }

    #[inline]
    pub fn is_observe(&self) -> bool {
        matches!(self.args, PulseArgs::Observe(_))
    }

    /// Node addressed by an Observe or Sync pulse
    pub fn path(&self) -> Option<&NodeId> {
        match &self.args {
            PulseArgs::Observe(args) => Some(&args.path),
            PulseArgs::Sync(args) => Some(&args.path),
            _ => None,
        }
    }
}

/// T-ordered pulse sequence: non-decreasing T, stable for equal T
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(Vec<Pulse>);

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet(Vec::new())
    }

    /// Build a change set by stable-sorting pulses on T
    pub fn sorted(mut pulses: Vec<Pulse>) -> Self {
        pulses.sort_by(|a, b| a.at.cmp(&b.at));
        ChangeSet(pulses)
    }

    /// Wrap pulses that are already T-ordered
    pub fn from_ordered(pulses: Vec<Pulse>) -> Self {
        debug_assert!(pulses.windows(2).all(|w| w[0].at <= w[1].at));
        ChangeSet(pulses)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pulse with the greatest T
    #[inline]
    pub fn latest(&self) -> Option<&Pulse> {
        self.0.last()
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Pulse> {
        self.0.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Pulse] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Pulse> {
        self.0
    }

    /// Whether T never decreases along the sequence
    pub fn is_ordered(&self) -> bool {
        self.0.windows(2).all(|w| w[0].at <= w[1].at)
    }
}

impl IntoIterator for ChangeSet {
    type Item = Pulse;
    type IntoIter = std::vec::IntoIter<Pulse>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Pulse;
    type IntoIter = slice::Iter<'a, Pulse>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
