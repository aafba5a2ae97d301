//! Suss Replica - Runtime loop implementation

use std::collections::{HashSet, VecDeque};

use indexmap::IndexSet;
use suss_core::{
    hash_value, Annotations, ChangeSet, ClockDict, NodeId, ObserveArgs, Pulse, PulseArgs,
    RelationId, ReplicaId, SussError, SussResult, SyncArgs, Valuation, Value, SYNC_TAG,
};
use suss_propagate::{Fanout, PropagationConfig, PropagationEngine};
use suss_state::{
    add_pulse, apply_clock, apply_observe, apply_op_relation, settle, sync, DefaultRelationResolver,
    Network, ObserveOutcome, RelationFactory, SyncOutcome,
};
use suss_time::{ClockConfig, ClockEngine, SystemWallClock, WallClock, DEFAULT_MAX_ROUNDS};
use suss_wire::{pack, unpack_with, WireResult};
use tracing::{debug, info, trace, warn};

use crate::RuntimeResult;

/// Observe pulses remembered for replay detection
const REPLAY_WINDOW: usize = 4096;

/// Bounded set of recently applied Observe keys; the oldest key is evicted
/// first once `capacity` is reached
#[derive(Debug)]
struct ReplayWindow {
    order: VecDeque<String>,
    keys: HashSet<String>,
    capacity: usize,
}

impl ReplayWindow {
    fn new(capacity: usize) -> Self {
        ReplayWindow {
            order: VecDeque::with_capacity(capacity),
            keys: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: String) {
        if self.capacity == 0 || self.keys.contains(&key) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.keys.insert(key.clone());
        self.order.push_back(key);
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// How a replica resolves a conflicted node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Participants required to finalize a round
    pub count: usize,
    pub valuation: Valuation,
}

impl SyncPolicy {
    pub fn new(count: usize, valuation: Valuation) -> Self {
        SyncPolicy { count, valuation }
    }
}

/// Replica configuration
#[derive(Clone, Debug)]
pub struct ReplicaConfig {
    pub replica_id: ReplicaId,
    /// Propagation rounds per causal step
    pub max_rounds: u32,
    pub fanout: Fanout,
    /// Without a policy, conflicted nodes stay stale
    pub sync: Option<SyncPolicy>,
    /// Maximum queued inbound pulses
    pub max_inbound: usize,
    /// Maximum queued outbound pulses
    pub max_outbound: usize,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        ReplicaConfig {
            replica_id: ReplicaId::new("local"),
            max_rounds: DEFAULT_MAX_ROUNDS,
            fanout: Fanout::FirstMatch,
            sync: None,
            max_inbound: 1000,
            max_outbound: 1000,
        }
    }
}

impl ReplicaConfig {
    /// Single replica; conflicts are left stale
    pub fn solo() -> Self {
        Self::default()
    }

    /// Conflicts resolve once `count` replicas have voted. Rounds finalize
    /// with `max`, which does not depend on vote order.
    pub fn quorum(count: usize) -> Self {
        ReplicaConfig {
            sync: Some(SyncPolicy::new(count, Valuation::Max)),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, replica_id: impl Into<ReplicaId>) -> Self {
        self.replica_id = replica_id.into();
        self
    }

    pub fn with_valuation(mut self, valuation: Valuation) -> Self {
        if let Some(policy) = self.sync.as_mut() {
            policy.valuation = valuation;
        }
        self
    }

    pub fn propagation(&self) -> PropagationConfig {
        PropagationConfig {
            max_rounds: self.max_rounds,
            fanout: self.fanout,
        }
    }

    pub fn clock(&self) -> ClockConfig {
        ClockConfig {
            max_rounds: self.max_rounds,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReplicaStats {
    pub ticks: u64,
    pub inbound_queued: u64,
    pub inbound_dropped: u64,
    pub outbound_queued: u64,
    pub outbound_dropped: u64,
    pub outbound_popped: u64,
    pub observes_accepted: u64,
    pub observes_rejected: u64,
    /// Observe pulses seen before and skipped
    pub replays: u64,
    pub sync_votes: u64,
    pub sync_finalized: u64,
    pub clock_fusions: u64,
    /// Pulses dropped because they could not be applied
    pub failures: u64,
    pub propagations: u64,
    pub non_quiescent: u64,
}

/// Summary of one tick or local step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pulses taken from the inbound queue
    pub ingested: usize,
    /// Nodes written by pulses, in order; propagation started from these
    pub touched: Vec<NodeId>,
    pub rounds: u32,
    pub quiescent: bool,
}

/// Suss replica
pub struct Replica<W: WallClock = SystemWallClock> {
    config: ReplicaConfig,
    network: Network,
    clock: ClockEngine<W>,
    engine: PropagationEngine,
    /// Incoming pulse buffer
    inbound: VecDeque<Pulse>,
    /// Outgoing pulse buffer
    outbound: VecDeque<Pulse>,
    /// Writes applied to this replica, in T order
    journal: ChangeSet,
    seen: ReplayWindow,
    stats: ReplicaStats,
}

impl Replica<SystemWallClock> {
    /// Create a replica on the system wall time
    pub fn new(config: ReplicaConfig, network: Network) -> Self {
        Self::with_wall(config, network, SystemWallClock)
    }

    /// Load a packed network, rebuilding its relations through `factory`
    pub fn from_packed(
        config: ReplicaConfig,
        json: &str,
        factory: &dyn RelationFactory,
    ) -> RuntimeResult<Self> {
        let unpacked = unpack_with(json, factory)?;
        Ok(Self::new(config, unpacked.network))
    }
}

impl<W: WallClock> Replica<W> {
    /// Create a replica on a custom wall time source
    pub fn with_wall(config: ReplicaConfig, network: Network, wall: W) -> Self {
        let mut clock = ClockEngine::with_wall(config.clock(), wall);
        clock.witness(&network.as_of());
        Replica {
            engine: PropagationEngine::new(config.propagation()),
            config,
            network,
            clock,
            inbound: VecDeque::new(),
            outbound: VecDeque::new(),
            journal: ChangeSet::new(),
            seen: ReplayWindow::new(REPLAY_WINDOW),
            stats: ReplicaStats::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> &ReplicaId {
        &self.config.replica_id
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// Current network
    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    pub fn clock(&self) -> &ClockEngine<W> {
        &self.clock
    }

    /// Observe and op writes applied here, in T order
    pub fn journal(&self) -> &ChangeSet {
        &self.journal
    }

    pub fn stats(&self) -> &ReplicaStats {
        &self.stats
    }

    /// Nothing queued in either direction
    pub fn is_idle(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty()
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Encode the current network
    pub fn pack(&self) -> WireResult<String> {
        pack(&self.network)
    }

    /// Queue an incoming pulse for the next tick.
    /// Returns false when the buffer is full and the pulse was dropped.
    pub fn queue_incoming(&mut self, pulse: Pulse) -> bool {
        if self.inbound.len() < self.config.max_inbound {
            self.inbound.push_back(pulse);
            self.stats.inbound_queued += 1;
            true
        } else {
            self.stats.inbound_dropped += 1;
            warn!(replica = %self.config.replica_id, tag = %pulse.tag, "inbound buffer full, pulse dropped");
            false
        }
    }

    /// Get next outgoing pulse (if any)
    pub fn pop_outgoing(&mut self) -> Option<Pulse> {
        let pulse = self.outbound.pop_front();
        if pulse.is_some() {
            self.stats.outbound_popped += 1;
        }
        pulse
    }

    /// Drain every outgoing pulse
    pub fn drain_outgoing(&mut self) -> Vec<Pulse> {
        let pulses: Vec<Pulse> = self.outbound.drain(..).collect();
        self.stats.outbound_popped += pulses.len() as u64;
        pulses
    }

    /// Run one loop iteration over the queued pulses
    pub fn tick(&mut self) -> TickReport {
        self.stats.ticks += 1;

        // Stage 1: Ingest pulses
        let pulses: Vec<Pulse> = self.inbound.drain(..).collect();
        let mut touched = IndexSet::new();

        for pulse in &pulses {
            // Stage 2: Fuse the remote timestamp
            self.clock.receive(&pulse.at);

            // Stage 3-4: Dispatch; Sync rounds open and roll here
            if let Err(e) = self.dispatch(pulse, &mut touched) {
                self.stats.failures += 1;
                warn!(
                    replica = %self.config.replica_id,
                    tag = %pulse.tag,
                    error = %e,
                    "pulse dropped"
                );
            }
        }

        // Stage 5-6: Propagate, lift the clock. Outbound pulses wait for
        // pop_outgoing.
        self.propagate_touched(pulses.len(), touched)
    }

    /// Write `new` to `path` if it still holds `old`, as a fresh causal step.
    ///
    /// An accepted write is propagated locally and queued for the peers. A
    /// rejected one turns the node stale and is not forwarded.
    pub fn observe_local(
        &mut self,
        path: impl Into<NodeId>,
        old: Value,
        new: Value,
    ) -> SussResult<ObserveOutcome> {
        let path = path.into();
        self.network.get_node(&path)?;

        let at = self.clock.tick();
        let pulse = Pulse::observe(at, path, old, new);
        let mut touched = IndexSet::new();
        let outcome = self.apply_observe_pulse(&pulse, false, &mut touched)?;
        if outcome == ObserveOutcome::Accepted {
            self.emit(pulse);
        }
        self.propagate_touched(0, touched);
        Ok(outcome)
    }

    /// Invoke an op relation and propagate from the nodes it wrote.
    ///
    /// Op writes stay local; peers run the op themselves.
    pub fn apply_op(
        &mut self,
        id: impl Into<RelationId>,
        args: &[Value],
        meta: &Annotations,
    ) -> SussResult<TickReport> {
        let id = id.into();
        let tr = apply_op_relation(&self.network, &DefaultRelationResolver, &id, args, meta)?;
        self.network = tr.network;

        let mut touched = IndexSet::new();
        for pulse in tr.pulses {
            if let Some(path) = pulse.path() {
                touched.insert(path.clone());
            }
            self.journal = add_pulse(&self.journal, pulse);
        }
        debug!(replica = %self.config.replica_id, relation = %id, writes = touched.len(), "op applied");
        Ok(self.propagate_touched(0, touched))
    }

    /// Queue a Clock pulse carrying this replica's wall time
    pub fn gossip_clock(&mut self) {
        let now = self.clock.now();
        let clocks = ClockDict::from([(self.config.replica_id.clone(), now.wall)]);
        self.emit(Pulse::clock(now, clocks));
    }

    fn dispatch(&mut self, pulse: &Pulse, touched: &mut IndexSet<NodeId>) -> SussResult<()> {
        match &pulse.args {
            PulseArgs::Observe(args) => {
                if self.seen.contains(&replay_key(pulse, args)) {
                    self.stats.replays += 1;
                    trace!(node = %args.path, at = %pulse.at, "observe replay skipped");
                    return Ok(());
                }
                self.apply_observe_pulse(pulse, true, touched).map(|_| ())
            }
            PulseArgs::Sync(args) => self.roll_sync(args, touched),
            PulseArgs::Clock(args) => {
                self.network = apply_clock(&self.network, &pulse.at, &args.clocks);
                self.clock.sync_wall(args.clocks.values().copied());
                self.stats.clock_fusions += 1;
                Ok(())
            }
            PulseArgs::Values(_) => {
                debug!(tag = %pulse.tag, "no handler for pulse, ignored");
                Ok(())
            }
        }
    }

    fn apply_observe_pulse(
        &mut self,
        pulse: &Pulse,
        remote: bool,
        touched: &mut IndexSet<NodeId>,
    ) -> SussResult<ObserveOutcome> {
        let PulseArgs::Observe(args) = &pulse.args else {
            return Err(SussError::UnexpectedPulse {
                expected: "observe",
                tag: pulse.tag.clone(),
            });
        };
        let tr = apply_observe(&self.network, pulse)?;
        self.network = tr.network;
        self.remember(replay_key(pulse, args));

        match tr.outcome {
            ObserveOutcome::Accepted => {
                self.stats.observes_accepted += 1;
                self.journal = add_pulse(&self.journal, pulse.clone());
                touched.insert(args.path.clone());
            }
            ObserveOutcome::Rejected => {
                self.stats.observes_rejected += 1;
                // A remote reject is a concurrent write; a local one is a
                // stale read by the caller
                if remote {
                    self.open_round(&args.path, touched)?;
                }
            }
        }
        Ok(tr.outcome)
    }

    fn open_round(&mut self, path: &NodeId, touched: &mut IndexSet<NodeId>) -> SussResult<()> {
        let Some(policy) = self.config.sync else {
            return Ok(());
        };
        info!(replica = %self.config.replica_id, node = %path, count = policy.count, "sync round opened");
        let round = SyncArgs {
            path: path.clone(),
            count: policy.count,
            accumulator: Default::default(),
            valuation: policy.valuation,
        };
        self.roll_sync(&round, touched)
    }

    /// Vote in a round, or settle one that already carries our vote
    fn roll_sync(&mut self, round: &SyncArgs, touched: &mut IndexSet<NodeId>) -> SussResult<()> {
        let voted = round.accumulator.contains_key(&self.config.replica_id);
        let result = if voted {
            settle(&self.network, round)
        } else {
            sync(&self.network, &self.config.replica_id, round)
        };
        let tr = match result {
            Ok(tr) => tr,
            Err(SussError::InvalidState { node, lineage }) => {
                // Already resolved here, or never in conflict
                debug!(replica = %self.config.replica_id, %node, %lineage, "sync round ignored");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.network = tr.network;

        match tr.outcome {
            SyncOutcome::Duplicate => {}
            SyncOutcome::Pending(next) => {
                // Our own round coming back incomplete needs no re-send
                if !voted {
                    self.stats.sync_votes += 1;
                    self.emit_sync(next);
                }
            }
            SyncOutcome::Finalized { round: completed, .. } => {
                self.stats.sync_finalized += 1;
                touched.insert(completed.path.clone());
                // The finalizer sends the complete accumulator once so
                // earlier voters can settle
                if !voted {
                    self.stats.sync_votes += 1;
                    self.emit_sync(completed);
                }
            }
        }
        Ok(())
    }

    fn emit_sync(&mut self, round: SyncArgs) {
        let at = self.clock.witness(&self.network.as_of());
        self.emit(Pulse {
            at,
            tag: SYNC_TAG.to_owned(),
            args: PulseArgs::Sync(round),
            meta: None,
        });
    }

    fn emit(&mut self, pulse: Pulse) {
        if self.outbound.len() < self.config.max_outbound {
            trace!(replica = %self.config.replica_id, tag = %pulse.tag, at = %pulse.at, "pulse queued");
            self.outbound.push_back(pulse);
            self.stats.outbound_queued += 1;
        } else {
            self.stats.outbound_dropped += 1;
            warn!(replica = %self.config.replica_id, tag = %pulse.tag, "outbound buffer full, pulse dropped");
        }
    }

    fn remember(&mut self, key: String) {
        self.seen.insert(key);
    }

    fn propagate_touched(&mut self, ingested: usize, touched: IndexSet<NodeId>) -> TickReport {
        let touched: Vec<NodeId> = touched.into_iter().collect();
        let mut report = TickReport {
            ingested,
            touched: touched.clone(),
            rounds: 0,
            quiescent: true,
        };

        if !touched.is_empty() {
            let outcome = self.engine.propagate_from(&self.network, touched);
            self.stats.propagations += 1;
            if !outcome.quiescent {
                self.stats.non_quiescent += 1;
            }
            report.rounds = outcome.rounds;
            report.quiescent = outcome.quiescent;
            self.network = outcome.network;
        }

        self.clock.witness(&self.network.as_of());
        report
    }
}

/// Identity of an Observe write: where, when, and what
fn replay_key(pulse: &Pulse, args: &ObserveArgs) -> String {
    format!(
        "{}|{}|{}|{}",
        pulse.at,
        args.path,
        hash_value(&args.old),
        hash_value(&args.new)
    )
}
