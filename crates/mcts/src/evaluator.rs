//! Leaf-value estimation for MCTS.
//!
//! The `Evaluator` trait lets the planner swap how states beyond the tree
//! are valued:
//! - `RolloutEvaluator` simulates uniformly random joint actions
//! - `ZeroEvaluator` treats the horizon as worthless
//! - `FnEvaluator` wraps a heuristic closure
//!
//! Evaluators are shared by concurrent simulations, so they take the
//! simulation's own generator instead of owning one.

use fvmcts_core::MultiAgentModel;
use rand::Rng;

/// Trait for estimating the value of a state at the search frontier.
pub trait Evaluator<M: MultiAgentModel>: Send + Sync {
    /// Estimate the discounted return obtainable from `state` with
    /// `depth` steps of search budget left.
    fn estimate<R: Rng + ?Sized>(&self, model: &M, state: &M::State, depth: usize, rng: &mut R) -> f64;
}

/// Evaluator using uniformly random joint-action rollouts.
#[derive(Clone, Debug, Default)]
pub struct RolloutEvaluator {
    /// Upper bound on rollout length, on top of the remaining depth.
    max_rollout_depth: Option<usize>,
}

impl RolloutEvaluator {
    /// Roll out for exactly the remaining search depth.
    pub fn new() -> Self {
        Self::default()
    }

    /// Roll out for at most `max_rollout_depth` steps.
    pub fn with_max_depth(max_rollout_depth: usize) -> Self {
        Self {
            max_rollout_depth: Some(max_rollout_depth),
        }
    }

    /// Perform a random rollout from the given state.
    ///
    /// Returns the discounted reward sum, stopping at a terminal state.
    fn rollout<M: MultiAgentModel, R: Rng + ?Sized>(
        &self,
        model: &M,
        initial_state: &M::State,
        depth: usize,
        rng: &mut R,
    ) -> f64 {
        let steps = self.max_rollout_depth.map_or(depth, |max| depth.min(max));
        let action_sets: Vec<Vec<M::Action>> = (0..model.n_agents())
            .map(|agent| model.agent_actions(agent))
            .collect();

        let mut state = initial_state.clone();
        let mut total = 0.0;
        let mut weight = 1.0;
        let mut joint = Vec::with_capacity(action_sets.len());

        for _ in 0..steps {
            if model.is_terminal(&state) {
                break;
            }

            joint.clear();
            joint.extend(
                action_sets
                    .iter()
                    .map(|actions| actions[rng.gen_range(0..actions.len())]),
            );

            let (next, reward) = model.generate(&state, &joint, rng);
            total += weight * reward;
            weight *= model.discount();
            state = next;
        }

        total
    }
}

impl<M: MultiAgentModel> Evaluator<M> for RolloutEvaluator {
    fn estimate<R: Rng + ?Sized>(&self, model: &M, state: &M::State, depth: usize, rng: &mut R) -> f64 {
        self.rollout(model, state, depth, rng)
    }
}

/// Evaluator that values every frontier state at zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroEvaluator;

impl<M: MultiAgentModel> Evaluator<M> for ZeroEvaluator {
    fn estimate<R: Rng + ?Sized>(&self, _model: &M, _state: &M::State, _depth: usize, _rng: &mut R) -> f64 {
        0.0
    }
}

/// Evaluator backed by a `(state, remaining_depth) -> value` closure.
#[derive(Clone, Debug)]
pub struct FnEvaluator<F>(pub F);

impl<M, F> Evaluator<M> for FnEvaluator<F>
where
    M: MultiAgentModel,
    F: Fn(&M::State, usize) -> f64 + Send + Sync,
{
    fn estimate<R: Rng + ?Sized>(&self, _model: &M, state: &M::State, depth: usize, _rng: &mut R) -> f64 {
        (self.0)(state, depth)
    }
}
