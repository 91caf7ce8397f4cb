//! Coordination strategies and their per-state statistics stores.
//!
//! A coordination strategy owns the factored statistics of every visited
//! state and resolves them into a joint action without enumerating the
//! joint action space:
//! - [`VarElStats`]: exact, exponential only in the largest clique
//! - [`MaxPlusStats`]: approximate message passing over graph edges
//!
//! Stores are indexed by [`NodeId`]; the search tree assigns ids densely
//! and calls [`Coordinator::initialize`] exactly once per new node, in id
//! order. All actions here are action indices into each agent's action set.

pub mod max_plus;
pub mod var_el;

pub use max_plus::MaxPlusStats;
pub use var_el::{Factor, VarElStats};

use crate::config::CoordinationStrategy;
use crate::graph::{maximal_cliques, min_degree_order};
use crate::node::{ActionStat, NodeId};
use fvmcts_core::{AdjacencyMatrix, Result};

/// A joint action chosen by a coordination strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// One action index per agent.
    pub actions: Vec<usize>,

    /// Payoff of `actions` under the (possibly UCB-augmented) factored
    /// utilities used to choose it.
    pub value: f64,
}

/// Common contract of the coordination statistics stores.
pub trait Coordinator {
    /// Create the statistics of a newly inserted node.
    ///
    /// `seed` maps `(agents, action indices)` of one entry to its initial
    /// count and value.
    fn initialize(
        &mut self,
        node: NodeId,
        seed: &mut dyn FnMut(&[usize], &[usize]) -> ActionStat,
    ) -> Result<()>;

    /// Choose a joint action at `node`.
    ///
    /// With a positive `exploration` constant, UCB bonuses are added to the
    /// local payoffs before inference; with zero the choice is greedy.
    fn select_action(&mut self, node: NodeId, total_n: u32, exploration: f64) -> Result<Selection>;

    /// Record a backed-up return for the joint action taken at `node`.
    fn update(&mut self, node: NodeId, actions: &[usize], value: f64) -> Result<()>;

    /// Drop all per-node statistics, keeping the graph structure.
    fn reset(&mut self);

    /// Number of nodes with statistics.
    fn len(&self) -> usize;

    /// Whether no node has statistics.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runtime-selected coordination statistics.
#[derive(Clone, Debug)]
pub enum CoordinationStats {
    VarEl(VarElStats),
    MaxPlus(MaxPlusStats),
}

impl CoordinationStats {
    /// Build an empty store for `strategy` over the given interaction graph.
    ///
    /// # Errors
    /// Returns `NoExploration` for a max-plus strategy with both
    /// exploration flags off.
    pub fn for_strategy(
        strategy: &CoordinationStrategy,
        adjacency: &AdjacencyMatrix,
        n_actions: Vec<usize>,
    ) -> Result<Self> {
        match strategy {
            CoordinationStrategy::VarEl => {
                let components = maximal_cliques(adjacency);
                let order = min_degree_order(adjacency);
                Ok(CoordinationStats::VarEl(VarElStats::new(
                    components, order, n_actions,
                )))
            }
            CoordinationStrategy::MaxPlus(config) => {
                config.validate()?;
                Ok(CoordinationStats::MaxPlus(MaxPlusStats::new(
                    adjacency,
                    n_actions,
                    config.clone(),
                )))
            }
        }
    }

    /// Per-component visit-count sums at `node` (variable elimination only).
    pub fn component_visit_sums(&self, node: NodeId) -> Option<Vec<u64>> {
        match self {
            CoordinationStats::VarEl(stats) => stats.component_visit_sums(node),
            CoordinationStats::MaxPlus(_) => None,
        }
    }

    /// Messages of the last action selection at `node` (max-plus only).
    pub fn last_messages(&self, node: NodeId) -> Option<&[Vec<f64>]> {
        match self {
            CoordinationStats::VarEl(_) => None,
            CoordinationStats::MaxPlus(stats) => stats.last_messages(node),
        }
    }

    fn inner(&self) -> &dyn Coordinator {
        match self {
            CoordinationStats::VarEl(stats) => stats,
            CoordinationStats::MaxPlus(stats) => stats,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Coordinator {
        match self {
            CoordinationStats::VarEl(stats) => stats,
            CoordinationStats::MaxPlus(stats) => stats,
        }
    }
}

impl Coordinator for CoordinationStats {
    fn initialize(
        &mut self,
        node: NodeId,
        seed: &mut dyn FnMut(&[usize], &[usize]) -> ActionStat,
    ) -> Result<()> {
        self.inner_mut().initialize(node, seed)
    }

    fn select_action(&mut self, node: NodeId, total_n: u32, exploration: f64) -> Result<Selection> {
        self.inner_mut().select_action(node, total_n, exploration)
    }

    fn update(&mut self, node: NodeId, actions: &[usize], value: f64) -> Result<()> {
        self.inner_mut().update(node, actions, value)
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }
}

/// Initial count and value of a statistics entry, as a function of the
/// state, the agents the entry covers and their actions.
pub trait StatInit<S, A>: Send + Sync {
    fn init(&self, state: &S, agents: &[usize], actions: &[A]) -> ActionStat;
}

/// The same seed for every entry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConstantInit {
    pub n: u32,
    pub q: f64,
}

impl<S, A> StatInit<S, A> for ConstantInit {
    fn init(&self, _state: &S, _agents: &[usize], _actions: &[A]) -> ActionStat {
        ActionStat::new(self.n, self.q)
    }
}

/// Seed computed by a closure.
pub struct FnInit<F>(pub F);

impl<S, A, F> StatInit<S, A> for FnInit<F>
where
    F: Fn(&S, &[usize], &[A]) -> ActionStat + Send + Sync,
{
    fn init(&self, state: &S, agents: &[usize], actions: &[A]) -> ActionStat {
        (self.0)(state, agents, actions)
    }
}

/// Strict-greater argmax: ties go to the lowest index.
pub(crate) fn argmax(values: impl IntoIterator<Item = f64>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best
}
