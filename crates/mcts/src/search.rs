//! Factored-value Monte Carlo Tree Search.
//!
//! Each planning call discards the previous tree, inserts the current joint
//! state as the root and runs the simulation budget in parallel. Every
//! simulation walks down the tree choosing joint actions through the
//! configured coordination strategy with UCB-augmented factored payoffs,
//! expands at most one new node, and backs the discounted return up into the
//! factored statistics of each node it passed. The final joint action is the
//! strategy's greedy choice at the root.

use crate::{
    config::{CoordinationStrategy, FvMctsConfig},
    coordination::{ConstantInit, CoordinationStats, StatInit},
    evaluator::Evaluator,
    node::{ActionStat, NodeId},
    tree::SearchTree,
};
use fvmcts_core::{FvMctsError, MultiAgentModel, Result};
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Diagnostics of one planning call.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanInfo {
    /// Simulations started before the wall-clock deadline, if any.
    pub simulations: usize,

    /// Number of nodes in the tree after the call.
    pub tree_size: usize,

    /// Total visit count of the root.
    pub root_visits: u32,

    /// Factored greedy value of the returned joint action at the root.
    pub root_value: f64,

    /// Wall time spent in the call.
    pub elapsed: Duration,
}

/// Factored-value MCTS planner.
///
/// Generic over:
/// - `M`: the multi-agent decision process
/// - `E`: the leaf-value estimator
/// - `R`: the random number generator; each simulation runs on its own
///   `R` seeded from this one
pub struct FvMcts<M: MultiAgentModel, E: Evaluator<M>, R: Rng + SeedableRng> {
    config: FvMctsConfig,
    model: M,
    evaluator: E,
    rng: R,
    agent_actions: Vec<Vec<M::Action>>,
    tree: SearchTree<M::State>,
    stat_init: Box<dyn StatInit<M::State, M::Action>>,
    pool: Option<rayon::ThreadPool>,
}

/// Bind a configuration and a model into a planner. Equivalent to
/// [`FvMcts::new`].
pub fn solve<M, E, R>(config: FvMctsConfig, model: M, evaluator: E, rng: R) -> Result<FvMcts<M, E, R>>
where
    M: MultiAgentModel,
    E: Evaluator<M>,
    R: Rng + SeedableRng,
{
    FvMcts::new(config, model, evaluator, rng)
}

impl<M, E, R> FvMcts<M, E, R>
where
    M: MultiAgentModel,
    E: Evaluator<M>,
    R: Rng + SeedableRng,
{
    /// Create a planner. No search is performed.
    ///
    /// Action sets and the coordination structure (cliques and elimination
    /// order, or the edge list) are computed here once for the planner's
    /// lifetime.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the model has no
    /// agents, an agent has no actions, the discount is outside `[0, 1]`,
    /// or the coordination graph's dimension differs from the agent count.
    pub fn new(config: FvMctsConfig, model: M, evaluator: E, rng: R) -> Result<Self> {
        config.validate()?;

        let n_agents = model.n_agents();
        if n_agents == 0 {
            return Err(FvMctsError::NoAgents);
        }
        let discount = model.discount();
        if !(0.0..=1.0).contains(&discount) {
            return Err(FvMctsError::InvalidDiscount(discount));
        }

        let agent_actions: Vec<Vec<M::Action>> =
            (0..n_agents).map(|agent| model.agent_actions(agent)).collect();
        if let Some(agent) = agent_actions.iter().position(Vec::is_empty) {
            return Err(FvMctsError::EmptyActionSet(agent));
        }
        let n_actions: Vec<usize> = agent_actions.iter().map(Vec::len).collect();

        let graph = model.coordination_graph();
        graph.check_dim(n_agents)?;

        let stats = CoordinationStats::for_strategy(&config.strategy, &graph, n_actions)?;
        let factors = match &stats {
            CoordinationStats::VarEl(ve) => ve.components().len(),
            CoordinationStats::MaxPlus(mp) => mp.edges().len(),
        };

        let pool = match config.num_threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| FvMctsError::InvalidConfig(e.to_string()))?,
            ),
            None => None,
        };

        info!(
            strategy = config.strategy.name(),
            agents = n_agents,
            factors,
            iterations = config.n_iterations,
            depth = config.depth,
            "created planner"
        );

        let stat_init = Box::new(ConstantInit {
            n: config.init_n,
            q: config.init_q,
        });

        Ok(Self {
            config,
            model,
            evaluator,
            rng,
            agent_actions,
            tree: SearchTree::new(stats),
            stat_init,
            pool,
        })
    }

    /// Replace the constant `init_n`/`init_q` seeding of new statistics
    /// entries.
    pub fn with_stat_init<I>(mut self, stat_init: I) -> Self
    where
        I: StatInit<M::State, M::Action> + 'static,
    {
        self.stat_init = Box::new(stat_init);
        self
    }

    /// Planner configuration.
    pub fn config(&self) -> &FvMctsConfig {
        &self.config
    }

    /// The model being planned for.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Search tree of the most recent planning call.
    pub fn tree(&self) -> &SearchTree<M::State> {
        &self.tree
    }

    /// Plan a joint action for `state`.
    pub fn plan_action(&mut self, state: &M::State) -> Result<Vec<M::Action>> {
        self.plan_action_with_info(state).map(|(actions, _)| actions)
    }

    /// Plan a joint action for `state` and report diagnostics.
    ///
    /// # Errors
    /// Any error raised by a simulation aborts the whole call.
    pub fn plan_action_with_info(&mut self, state: &M::State) -> Result<(Vec<M::Action>, PlanInfo)> {
        let start = Instant::now();
        self.tree.clear()?;

        let stat_init = self.stat_init.as_ref();
        let agent_actions = &self.agent_actions;
        let mut seed = |agents: &[usize], actions: &[usize]| {
            seed_entry(stat_init, agent_actions, state, agents, actions)
        };
        let (root, _) = self.tree.insert(state, &mut seed)?;

        let seeds: Vec<u64> = (0..self.config.n_iterations)
            .map(|_| self.rng.gen())
            .collect();
        let deadline = self.config.max_time.map(|limit| start + limit);
        let started = AtomicUsize::new(0);
        let depth = self.config.depth;

        let simulator = Simulator {
            model: &self.model,
            evaluator: &self.evaluator,
            tree: &self.tree,
            stat_init,
            agent_actions,
            exploration: self.config.exploration_constant,
        };

        let run = || {
            seeds.par_iter().try_for_each(|&seed| {
                if deadline.map_or(false, |d| Instant::now() >= d) {
                    return Ok(());
                }
                started.fetch_add(1, Ordering::Relaxed);
                let mut rng = R::seed_from_u64(seed);
                simulator
                    .simulate(root, state, depth, &mut rng)
                    .map(|_| ())
            })
        };
        match &self.pool {
            Some(pool) => pool.install(run)?,
            None => run()?,
        }

        let greedy = self.tree.select(root, 0.0)?;
        let actions = self.to_joint_action(&greedy.actions);

        let info = PlanInfo {
            simulations: started.into_inner(),
            tree_size: self.tree.len()?,
            root_visits: self.tree.visits(root)?,
            root_value: greedy.value,
            elapsed: start.elapsed(),
        };

        debug!(
            simulations = info.simulations,
            tree_size = info.tree_size,
            root_visits = info.root_visits,
            root_value = info.root_value,
            elapsed_ms = info.elapsed.as_millis() as u64,
            actions = ?actions,
            "planned joint action"
        );

        Ok((actions, info))
    }

    /// Configured coordination strategy.
    pub fn strategy(&self) -> &CoordinationStrategy {
        &self.config.strategy
    }

    fn to_joint_action(&self, indices: &[usize]) -> Vec<M::Action> {
        to_joint_action(&self.agent_actions, indices)
    }
}

/// Borrowed view of the planner shared by concurrent simulations.
struct Simulator<'a, M: MultiAgentModel, E> {
    model: &'a M,
    evaluator: &'a E,
    tree: &'a SearchTree<M::State>,
    stat_init: &'a dyn StatInit<M::State, M::Action>,
    agent_actions: &'a [Vec<M::Action>],
    exploration: f64,
}

impl<M, E> Simulator<'_, M, E>
where
    M: MultiAgentModel,
    E: Evaluator<M>,
{
    /// Run one simulation from `node` and return its discounted return.
    ///
    /// The tree lock is taken per operation; sampling the model and
    /// descending happen outside it.
    fn simulate<R: Rng>(&self, node: NodeId, state: &M::State, depth: usize, rng: &mut R) -> Result<f64> {
        if self.model.is_terminal(state) {
            return Ok(0.0);
        }
        if depth == 0 {
            return Ok(self.evaluator.estimate(self.model, state, 0, rng));
        }

        let selection = self.tree.select(node, self.exploration)?;
        let joint = to_joint_action(self.agent_actions, &selection.actions);
        let (next, reward) = self.model.generate(state, &joint, rng);
        let discount = self.model.discount();

        let tail = match self.tree.lookup(&next)? {
            Some(child) => self.simulate(child, &next, depth - 1, rng)?,
            None => {
                let mut seed = |agents: &[usize], actions: &[usize]| {
                    seed_entry(self.stat_init, self.agent_actions, &next, agents, actions)
                };
                let (child, created) = self.tree.insert(&next, &mut seed)?;
                if !created {
                    // Another simulation expanded it first
                    self.simulate(child, &next, depth - 1, rng)?
                } else if self.model.is_terminal(&next) {
                    0.0
                } else {
                    self.evaluator.estimate(self.model, &next, depth - 1, rng)
                }
            }
        };

        let value = reward + discount * tail;
        self.tree.backup(node, &selection.actions, value)?;
        Ok(value)
    }
}

fn to_joint_action<A: Copy>(agent_actions: &[Vec<A>], indices: &[usize]) -> Vec<A> {
    agent_actions
        .iter()
        .zip(indices)
        .map(|(actions, &i)| actions[i])
        .collect()
}

fn seed_entry<S, A: Copy>(
    stat_init: &dyn StatInit<S, A>,
    agent_actions: &[Vec<A>],
    state: &S,
    agents: &[usize],
    actions: &[usize],
) -> ActionStat {
    let actions: Vec<A> = agents
        .iter()
        .zip(actions)
        .map(|(&agent, &a)| agent_actions[agent][a])
        .collect();
    stat_init.init(state, agents, &actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaxPlusConfig;
    use crate::coordination::FnInit;
    use crate::evaluator::{RolloutEvaluator, ZeroEvaluator};
    use fvmcts_core::AdjacencyMatrix;
    use rand_chacha::ChaCha8Rng;

    // Two agents act for three steps; state is (time, score) and the shared
    // reward is 1 on every step where both agents choose `true`.
    struct Lockstep {
        graph: AdjacencyMatrix,
    }

    impl Lockstep {
        fn new() -> Self {
            Self {
                graph: AdjacencyMatrix::fully_connected(2),
            }
        }
    }

    impl MultiAgentModel for Lockstep {
        type State = (u8, u8);
        type Action = bool;

        fn n_agents(&self) -> usize {
            2
        }

        fn agent_actions(&self, _agent: usize) -> Vec<bool> {
            vec![false, true]
        }

        fn coordination_graph(&self) -> AdjacencyMatrix {
            self.graph.clone()
        }

        fn generate<R: Rng + ?Sized>(
            &self,
            state: &(u8, u8),
            actions: &[bool],
            _rng: &mut R,
        ) -> ((u8, u8), f64) {
            let (time, score) = *state;
            if actions[0] && actions[1] {
                ((time + 1, score + 1), 1.0)
            } else {
                ((time + 1, score), 0.0)
            }
        }

        fn is_terminal(&self, state: &(u8, u8)) -> bool {
            state.0 >= 3
        }

        fn discount(&self) -> f64 {
            0.95
        }

        fn initial_state<R: Rng + ?Sized>(&self, _rng: &mut R) -> (u8, u8) {
            (0, 0)
        }
    }

    fn planner(config: FvMctsConfig) -> FvMcts<Lockstep, RolloutEvaluator, ChaCha8Rng> {
        FvMcts::new(
            config,
            Lockstep::new(),
            RolloutEvaluator::new(),
            ChaCha8Rng::seed_from_u64(42),
        )
        .unwrap()
    }

    #[test]
    fn test_var_el_finds_cooperative_action() {
        let mut mcts = planner(FvMctsConfig::with_iterations(300));
        let (actions, info) = mcts.plan_action_with_info(&(0, 0)).unwrap();

        assert_eq!(actions, vec![true, true]);
        assert_eq!(info.simulations, 300);
        assert_eq!(info.root_visits, 300);
        assert_eq!(info.tree_size, mcts.tree().len().unwrap());
        assert!(info.tree_size >= 2);
    }

    #[test]
    fn test_max_plus_finds_cooperative_action() {
        let config = FvMctsConfig::max_plus(300, MaxPlusConfig::default());
        let mut mcts = planner(config);
        assert_eq!(mcts.plan_action(&(0, 0)).unwrap(), vec![true, true]);
        assert_eq!(mcts.tree().visits(NodeId::ROOT).unwrap(), 300);
    }

    #[test]
    fn test_terminal_root_is_not_visited() {
        let mut mcts = planner(FvMctsConfig::with_iterations(10));
        let (_, info) = mcts.plan_action_with_info(&(3, 0)).unwrap();
        assert_eq!(info.root_visits, 0);
        assert_eq!(info.tree_size, 1);
    }

    #[test]
    fn test_component_sums_match_visits() {
        let mut mcts = planner(FvMctsConfig::with_iterations(200));
        mcts.plan_action(&(0, 0)).unwrap();

        let tree = mcts.tree();
        for state in tree.states().unwrap() {
            let id = tree.lookup(&state).unwrap().unwrap();
            let visits = tree.visits(id).unwrap() as u64;
            let sums = tree.component_visit_sums(id).unwrap().unwrap();
            assert!(sums.iter().all(|&s| s == visits));
        }
    }

    #[test]
    fn test_tree_cleared_between_calls() {
        let mut mcts = planner(FvMctsConfig::with_iterations(50));
        mcts.plan_action(&(0, 0)).unwrap();
        mcts.plan_action(&(2, 0)).unwrap();

        let tree = mcts.tree();
        assert_eq!(tree.lookup(&(2, 0)).unwrap(), Some(NodeId::ROOT));
        assert_eq!(tree.lookup(&(0, 0)).unwrap(), None);
        assert_eq!(tree.visits(NodeId::ROOT).unwrap(), 50);
    }

    #[test]
    fn test_zero_max_time_skips_simulations() {
        let config = FvMctsConfig {
            max_time: Some(Duration::ZERO),
            ..FvMctsConfig::with_iterations(100)
        };
        let mut mcts = planner(config);
        let (_, info) = mcts.plan_action_with_info(&(0, 0)).unwrap();
        assert_eq!(info.simulations, 0);
        assert_eq!(info.root_visits, 0);
    }

    #[test]
    fn test_dedicated_pool() {
        let config = FvMctsConfig {
            num_threads: Some(2),
            ..FvMctsConfig::with_iterations(100)
        };
        let mut mcts = planner(config);
        let (_, info) = mcts.plan_action_with_info(&(0, 0)).unwrap();
        assert_eq!(info.root_visits, 100);
    }

    #[test]
    fn test_stat_init_seeds_entries() {
        // Optimistic prior on (true, true) with many pseudo-visits makes it
        // the greedy choice even with a zero evaluator.
        let init = FnInit(|_: &(u8, u8), _: &[usize], actions: &[bool]| {
            if actions.iter().all(|&a| a) {
                ActionStat::new(1000, 10.0)
            } else {
                ActionStat::new(0, 0.0)
            }
        });
        let mut mcts = FvMcts::new(
            FvMctsConfig::with_iterations(20),
            Lockstep::new(),
            ZeroEvaluator,
            ChaCha8Rng::seed_from_u64(1),
        )
        .unwrap()
        .with_stat_init(init);

        assert_eq!(mcts.plan_action(&(0, 0)).unwrap(), vec![true, true]);
    }

    #[test]
    fn test_construction_errors() {
        let bad_reuse = FvMctsConfig {
            reuse_tree: true,
            ..Default::default()
        };
        let err = FvMcts::new(bad_reuse, Lockstep::new(), ZeroEvaluator, ChaCha8Rng::seed_from_u64(0));
        assert!(matches!(err, Err(FvMctsError::TreeReuseUnsupported)));

        let mismatched = Lockstep {
            graph: AdjacencyMatrix::fully_connected(3),
        };
        let err = solve(
            FvMctsConfig::default(),
            mismatched,
            ZeroEvaluator,
            ChaCha8Rng::seed_from_u64(0),
        );
        assert!(matches!(err, Err(FvMctsError::AdjacencyDimension { .. })));
    }
}
