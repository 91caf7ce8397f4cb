//! Repeated cooperative matrix game with a factored payoff.
//!
//! Every agent picks one of `n_actions` actions each round; the shared
//! reward is the sum of pairwise payoffs over the edges of the coordination
//! graph. The state only counts rounds, so the reachable state set does not
//! depend on which actions are played. The optimum is known by brute force,
//! which makes this the reference scenario for checking the planners.

use fvmcts_core::{AdjacencyMatrix, FvMctsError, MultiAgentModel, Result};
use rand::Rng;

/// Round counter of a [`CoopMatrixGame`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub struct MatrixState {
    round: u32,
}

impl MatrixState {
    /// Start of a game.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rounds already played.
    pub fn round(&self) -> u32 {
        self.round
    }
}

/// Cooperative game with payoff `sum over edges (i, j) of payoff_ij[a_i][a_j]`.
#[derive(Clone, Debug)]
pub struct CoopMatrixGame {
    n_agents: usize,
    n_actions: usize,
    graph: AdjacencyMatrix,
    edges: Vec<(usize, usize)>,
    // Row-major by (a_i, a_j), one table per edge
    payoffs: Vec<Vec<f64>>,
    rounds: u32,
    noise: f64,
}

impl CoopMatrixGame {
    /// Create a one-round game.
    ///
    /// Each payoff table is row-major over `(a_i, a_j)` for its edge
    /// `(i, j)`, so it holds `n_actions * n_actions` entries.
    ///
    /// # Errors
    /// Returns an error if there are no agents or actions, an edge names an
    /// unknown agent, or a table has the wrong size.
    pub fn new(
        n_agents: usize,
        n_actions: usize,
        edge_payoffs: Vec<((usize, usize), Vec<f64>)>,
    ) -> Result<Self> {
        if n_agents == 0 {
            return Err(FvMctsError::NoAgents);
        }
        if n_actions == 0 {
            return Err(FvMctsError::EmptyActionSet(0));
        }

        let (edges, payoffs): (Vec<_>, Vec<_>) = edge_payoffs.into_iter().unzip();
        if let Some(table) = payoffs.iter().find(|t| t.len() != n_actions * n_actions) {
            return Err(FvMctsError::InvalidConfig(format!(
                "payoff table has {} entries, expected {}",
                table.len(),
                n_actions * n_actions
            )));
        }
        let graph = AdjacencyMatrix::from_edges(n_agents, &edges)?;

        Ok(Self {
            n_agents,
            n_actions,
            graph,
            edges,
            payoffs,
            rounds: 1,
            noise: 0.0,
        })
    }

    /// Two agents playing one square payoff matrix, `matrix[a_0][a_1]`.
    ///
    /// # Errors
    /// Returns an error if the matrix is empty or not square.
    pub fn two_agent(matrix: Vec<Vec<f64>>) -> Result<Self> {
        let n_actions = matrix.len();
        if matrix.iter().any(|row| row.len() != n_actions) {
            return Err(FvMctsError::InvalidConfig(
                "payoff matrix must be square".to_string(),
            ));
        }
        Self::new(2, n_actions, vec![((0, 1), matrix.concat())])
    }

    /// Play `rounds` rounds before the game ends.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds.max(1);
        self
    }

    /// Add uniform reward noise in `[-amplitude, amplitude]`.
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude.abs();
        self
    }

    /// Noise-free payoff of a joint action.
    pub fn payoff(&self, actions: &[usize]) -> f64 {
        self.edges
            .iter()
            .zip(&self.payoffs)
            .map(|(&(i, j), table)| table[actions[i] * self.n_actions + actions[j]])
            .sum()
    }

    /// Best joint action and its payoff by exhaustive enumeration.
    ///
    /// Ties go to the joint action that comes first with agent 0 most
    /// significant.
    pub fn optimum(&self) -> (Vec<usize>, f64) {
        let total = self.n_actions.pow(self.n_agents as u32);
        let mut best = (vec![0; self.n_agents], f64::NEG_INFINITY);
        let mut joint = vec![0; self.n_agents];

        for code in 0..total {
            let mut rest = code;
            for slot in joint.iter_mut().rev() {
                *slot = rest % self.n_actions;
                rest /= self.n_actions;
            }
            let value = self.payoff(&joint);
            if value > best.1 {
                best = (joint.clone(), value);
            }
        }

        best
    }
}

impl MultiAgentModel for CoopMatrixGame {
    type State = MatrixState;
    type Action = usize;

    fn n_agents(&self) -> usize {
        self.n_agents
    }

    fn agent_actions(&self, _agent: usize) -> Vec<usize> {
        (0..self.n_actions).collect()
    }

    fn coordination_graph(&self) -> AdjacencyMatrix {
        self.graph.clone()
    }

    fn generate<R: Rng + ?Sized>(
        &self,
        state: &MatrixState,
        actions: &[usize],
        rng: &mut R,
    ) -> (MatrixState, f64) {
        let mut reward = self.payoff(actions);
        if self.noise > 0.0 {
            reward += rng.gen_range(-self.noise..=self.noise);
        }
        let next = MatrixState {
            round: state.round + 1,
        };
        (next, reward)
    }

    fn is_terminal(&self, state: &MatrixState) -> bool {
        state.round >= self.rounds
    }

    fn discount(&self) -> f64 {
        1.0
    }

    fn initial_state<R: Rng + ?Sized>(&self, _rng: &mut R) -> MatrixState {
        MatrixState::new()
    }
}
