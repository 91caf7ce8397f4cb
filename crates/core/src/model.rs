use crate::AdjacencyMatrix;
use rand::Rng;
use std::fmt::Debug;
use std::hash::Hash;

/// A cooperative multi-agent decision process with a generative model.
///
/// The planner never sees transition probabilities, only samples drawn
/// through [`generate`](MultiAgentModel::generate). States are used as
/// search tree keys, so `Eq` and `Hash` must agree: two states that compare
/// equal are the same tree node.
pub trait MultiAgentModel: Send + Sync {
    /// Joint state of all agents
    type State: Clone + Eq + Hash + Send + Sync;

    /// A single agent's action
    type Action: Clone + Copy + Eq + Send + Sync + Debug;

    /// Number of agents
    fn n_agents(&self) -> usize;

    /// Action set of one agent, in a fixed enumeration order.
    ///
    /// Planners enumerate this once at construction; the order is the
    /// tie-breaking order for action selection.
    fn agent_actions(&self, agent: usize) -> Vec<Self::Action>;

    /// Pairwise interaction structure between agents.
    fn coordination_graph(&self) -> AdjacencyMatrix;

    /// Samples a successor state and the shared reward for a joint action.
    ///
    /// `actions` holds one action per agent, indexed by agent.
    fn generate<R: Rng + ?Sized>(
        &self,
        state: &Self::State,
        actions: &[Self::Action],
        rng: &mut R,
    ) -> (Self::State, f64);

    /// Returns true if no further reward can be collected from `state`
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Discount factor in [0, 1]
    fn discount(&self) -> f64;

    /// Samples a starting state
    fn initial_state<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::State;
}
