//! Propagation engine
//!
//! Bounded fixpoint loop over link relations:
//! 1. Selecting: a link is selected when one of its source matches was
//!    updated in the previous round (round 0: the paths the pulses touched)
//! 2. Reconciling: each selected link runs its relation and the target
//!    write is committed if authority allows, the value differs, and the
//!    round timestamp is strictly ahead of the target's
//! 3. A round with no commits is quiescent; otherwise continue
//!
//! Running out of rounds is a normal result (`quiescent == false`), not an
//! error. A relation failure or a target with no round left skips that one
//! execution; the round continues. Any round overflow leaves the result
//! non-quiescent.

use std::sync::Arc;

use indexmap::IndexSet;
use suss_core::{NodeId, Operation, Pulse, SussError, SussResult};
use suss_state::{
    apply_relation_result, solve_relation, DefaultNodeResolver, DefaultRelationResolver, Link,
    LinkRelation, Network, NodeResolver, Relation, RelationResolver,
};
use suss_time::{increment_round, DEFAULT_MAX_ROUNDS};
use tracing::{debug, trace, warn};

use crate::{resolve_nodes, source_bindings, substitute_vars, Pattern, Selector, SelectorKind};

/// How many executions a non-template link gets per round
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fanout {
    /// First source and first target match only; extras are logged
    #[default]
    FirstMatch,
    /// Every source match paired with every target match
    All,
}

/// Propagation configuration
#[derive(Clone, Debug)]
pub struct PropagationConfig {
    /// Round budget for one propagation call
    pub max_rounds: u32,
    pub fanout: Fanout,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            fanout: Fanout::FirstMatch,
        }
    }
}

impl PropagationConfig {
    /// Small round budget for tight feedback loops
    pub fn bounded(max_rounds: u32) -> Self {
        Self {
            max_rounds,
            ..Default::default()
        }
    }

    /// Run every source/target pair of multi-match links
    pub fn exhaustive() -> Self {
        Self {
            fanout: Fanout::All,
            ..Default::default()
        }
    }
}

/// Counters for one propagation call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Relation invocations
    pub executions: u64,
    /// Target writes committed
    pub commits: u64,
    /// Executions that produced no write (unchanged, suppressed or not ahead)
    pub skipped: u64,
    /// Links or executions skipped because of an error
    pub failures: u64,
    /// Executions whose target had no round left in its causal step
    pub overflows: u64,
}

/// Result of a propagation call
#[derive(Clone, Debug)]
pub struct PropagationOutcome {
    pub network: Network,
    /// A round completed with no writes
    pub quiescent: bool,
    /// Rounds executed, including the quiescent one
    pub rounds: u32,
    /// Ids written in the last productive round
    pub touched: Vec<NodeId>,
    pub stats: PropagationStats,
}

impl PropagationOutcome {
    /// Turn a non-quiescent result into [`SussError::NonConvergence`]
    pub fn ensure_quiescent(self) -> SussResult<Self> {
        if self.quiescent {
            Ok(self)
        } else {
            Err(SussError::NonConvergence {
                rounds: self.rounds,
            })
        }
    }
}

/// A link with its selectors parsed for the duration of one call
struct PreparedLink {
    link: Arc<Link>,
    src: Selector,
    /// `None` for template links, whose target depends on the source
    tgt: Option<Selector>,
}

/// Propagation engine
pub struct PropagationEngine<N = DefaultNodeResolver, R = DefaultRelationResolver> {
    config: PropagationConfig,
    nodes: N,
    relations: R,
}

impl PropagationEngine {
    pub fn new(config: PropagationConfig) -> Self {
        Self::with_resolvers(config, DefaultNodeResolver, DefaultRelationResolver)
    }
}

impl Default for PropagationEngine {
    fn default() -> Self {
        Self::new(PropagationConfig::default())
    }
}

impl<N: NodeResolver, R: RelationResolver> PropagationEngine<N, R> {
    pub fn with_resolvers(config: PropagationConfig, nodes: N, relations: R) -> Self {
        Self {
            config,
            nodes,
            relations,
        }
    }

    #[inline]
    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Propagate from the paths touched by `pulses`.
    ///
    /// The pulses are expected to be applied already; only their paths seed
    /// the first round.
    pub fn propagate(&self, network: &Network, pulses: &[Pulse]) -> PropagationOutcome {
        let touched: Vec<NodeId> = pulses.iter().filter_map(Pulse::path).cloned().collect();
        self.propagate_from(network, touched)
    }

    /// Propagate from an explicit set of updated node ids
    pub fn propagate_from(
        &self,
        network: &Network,
        touched: impl IntoIterator<Item = NodeId>,
    ) -> PropagationOutcome {
        let mut net = network.clone();
        let mut updated: IndexSet<NodeId> = touched.into_iter().collect();
        let mut stats = PropagationStats::default();
        let links = self.prepare(&net, &mut stats);
        let mut rounds = 0;

        while rounds < self.config.max_rounds {
            rounds += 1;
            let selected: Vec<&PreparedLink> = links
                .iter()
                .filter(|p| self.is_selected(p, &net, &updated))
                .collect();

            let mut written = IndexSet::new();
            for prepared in selected {
                if let Err(e) = self.reconcile(prepared, &mut net, &updated, &mut written, &mut stats) {
                    stats.failures += 1;
                    warn!(
                        relation = %prepared.link.relation,
                        src = %prepared.link.src,
                        tgt = %prepared.link.tgt,
                        error = %e,
                        "link skipped"
                    );
                }
            }

            if written.is_empty() {
                if stats.overflows > 0 {
                    warn!(rounds, overflows = stats.overflows, "propagation settled with exhausted rounds");
                    return self.finish(net, false, rounds, updated, stats);
                }
                debug!(rounds, commits = stats.commits, "propagation quiescent");
                return self.finish(net, true, rounds, updated, stats);
            }
            trace!(round = rounds, writes = written.len(), "round complete");
            updated = written;
        }

        warn!(rounds, max_rounds = self.config.max_rounds, "propagation did not converge");
        self.finish(net, false, rounds, updated, stats)
    }

    fn finish(
        &self,
        network: Network,
        quiescent: bool,
        rounds: u32,
        touched: IndexSet<NodeId>,
        stats: PropagationStats,
    ) -> PropagationOutcome {
        PropagationOutcome {
            network,
            quiescent,
            rounds,
            touched: touched.into_iter().collect(),
            stats,
        }
    }

    /// Parse every link's selectors once; bad links are skipped for the call
    fn prepare(&self, network: &Network, stats: &mut PropagationStats) -> Vec<PreparedLink> {
        let mut prepared = Vec::with_capacity(network.links().len());
        for link in network.links() {
            match prepare_link(link) {
                Ok(p) => prepared.push(p),
                Err(e) => {
                    stats.failures += 1;
                    warn!(src = %link.src, tgt = %link.tgt, error = %e, "link skipped");
                }
            }
        }
        prepared
    }

    fn is_selected(&self, prepared: &PreparedLink, network: &Network, updated: &IndexSet<NodeId>) -> bool {
        match &prepared.src.pattern {
            Pattern::Exact(id) => updated.contains(id.as_str()),
            _ => updated.iter().any(|id| {
                network
                    .node(id.as_str())
                    .is_some_and(|node| prepared.src.matches_node(id.as_str(), node))
            }),
        }
    }

    fn reconcile(
        &self,
        prepared: &PreparedLink,
        network: &mut Network,
        updated: &IndexSet<NodeId>,
        written: &mut IndexSet<NodeId>,
        stats: &mut PropagationStats,
    ) -> SussResult<()> {
        let link = &prepared.link;
        let relation = match self.relations.resolve(&link.relation, network)? {
            Relation::Link(relation) => relation,
            Relation::Op(_) => {
                return Err(SussError::RelationKindMismatch {
                    relation: link.relation.clone(),
                    expected: "link",
                })
            }
        };

        // A failing pair is skipped; the link's other pairs still run
        for (src, tgt) in self.pairs(prepared, network, updated)? {
            match self.execute(link, relation.as_ref(), &src, &tgt, network, stats) {
                Ok(true) => {
                    written.insert(tgt);
                }
                Ok(false) => {}
                Err(SussError::RoundOverflow { round, max_rounds }) => {
                    stats.failures += 1;
                    stats.overflows += 1;
                    warn!(node = %tgt, round, max_rounds, "round overflow, execution skipped");
                }
                Err(e) => {
                    stats.failures += 1;
                    warn!(relation = %link.relation, src = %src, tgt = %tgt, error = %e, "execution skipped");
                }
            }
        }
        Ok(())
    }

    /// Source/target executions for a selected link
    fn pairs(
        &self,
        prepared: &PreparedLink,
        network: &Network,
        updated: &IndexSet<NodeId>,
    ) -> SussResult<Vec<(NodeId, NodeId)>> {
        let sources = self.match_ids(&prepared.src, network)?;

        let Some(tgt) = &prepared.tgt else {
            // Template: one execution per updated source, target bound from it
            let mut pairs = Vec::new();
            for src in sources.into_iter().filter(|id| updated.contains(id)) {
                let bindings = source_bindings(&prepared.src, src.as_str());
                let selector: Selector = substitute_vars(&prepared.link.tgt, &bindings).parse()?;
                let targets = self.match_ids(&selector, network)?;
                let Some(first) = targets.first().cloned() else {
                    continue;
                };
                match self.config.fanout {
                    Fanout::FirstMatch => {
                        log_ignored(&selector, &targets);
                        pairs.push((src, first));
                    }
                    Fanout::All => pairs.extend(targets.into_iter().map(|t| (src.clone(), t))),
                }
            }
            return Ok(pairs);
        };

        let targets = self.match_ids(tgt, network)?;
        let (Some(src), Some(first)) = (sources.first().cloned(), targets.first().cloned()) else {
            return Ok(Vec::new());
        };
        Ok(match self.config.fanout {
            Fanout::FirstMatch => {
                log_ignored(&prepared.src, &sources);
                log_ignored(tgt, &targets);
                vec![(src, first)]
            }
            Fanout::All => sources
                .iter()
                .flat_map(|s| targets.iter().map(move |t| (s.clone(), t.clone())))
                .collect(),
        })
    }

    fn match_ids(&self, selector: &Selector, network: &Network) -> SussResult<Vec<NodeId>> {
        Ok(resolve_nodes(selector, network, &self.nodes)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Run one relation execution; `Ok(true)` when the target was written
    fn execute(
        &self,
        link: &Link,
        relation: &dyn LinkRelation,
        src_id: &NodeId,
        tgt_id: &NodeId,
        network: &mut Network,
        stats: &mut PropagationStats,
    ) -> SussResult<bool> {
        let replacement = {
            let src = self.nodes.resolve(src_id, network)?;
            let tgt = self.nodes.resolve(tgt_id, network)?;

            stats.executions += 1;
            let out = solve_relation(src, tgt, relation, &link.args, &link.meta).map_err(|e| {
                SussError::Relation {
                    relation: link.relation.clone(),
                    reason: e.to_string(),
                }
            })?;

            let new_t = increment_round(&tgt.as_of, self.config.max_rounds)?;
            if new_t <= tgt.as_of {
                None
            } else {
                apply_relation_result(tgt, out.tgt, Operation::Link, new_t)
            }
        };

        match replacement {
            Some(node) => {
                trace!(node = %tgt_id, as_of = %node.as_of, "commit");
                network.insert_node(tgt_id.clone(), node);
                stats.commits += 1;
                Ok(true)
            }
            None => {
                stats.skipped += 1;
                Ok(false)
            }
        }
    }
}

fn prepare_link(link: &Arc<Link>) -> SussResult<PreparedLink> {
    let src: Selector = link.src.parse()?;
    if src.kind != SelectorKind::Node {
        return Err(SussError::InvalidSelector(link.src.clone()));
    }
    let tgt = if src.is_template() {
        None
    } else {
        let tgt: Selector = link.tgt.parse()?;
        if tgt.kind != SelectorKind::Node {
            return Err(SussError::InvalidSelector(link.tgt.clone()));
        }
        Some(tgt)
    };
    Ok(PreparedLink {
        link: Arc::clone(link),
        src,
        tgt,
    })
}

fn log_ignored(selector: &Selector, matches: &[NodeId]) {
    if matches.len() > 1 {
        debug!(
            selector = %selector,
            ignored = matches.len() - 1,
            "extra selector matches ignored"
        );
    }
}

/// Propagate with default resolvers and first-match fanout
pub fn propagate(network: &Network, pulses: &[Pulse], max_rounds: u32) -> PropagationOutcome {
    PropagationEngine::new(PropagationConfig::bounded(max_rounds)).propagate(network, pulses)
}
