//! Planner configuration parameters.
//!
//! These parameters control the search budget, the exploration schedule
//! and which coordination strategy resolves joint actions at each node.
//! All structs deserialize with defaults for missing fields, so a partial
//! JSON or TOML document is a valid configuration.

use fvmcts_core::{FvMctsError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Max-plus message passing parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxPlusConfig {
    /// Number of message passing rounds. There is no convergence test.
    pub message_iters: usize,

    /// Subtract each message's mean after every round to bound drift.
    pub message_norm: bool,

    /// Include per-agent local utilities in the payoff. Agents without
    /// neighbours always use theirs.
    pub use_agent_utils: bool,

    /// Add the UCB bonus to per-agent utilities.
    pub node_exploration: bool,

    /// Add the UCB bonus to pairwise edge utilities.
    pub edge_exploration: bool,
}

impl Default for MaxPlusConfig {
    fn default() -> Self {
        Self {
            message_iters: 10,
            message_norm: true,
            use_agent_utils: false,
            node_exploration: true,
            edge_exploration: true,
        }
    }
}

impl MaxPlusConfig {
    /// Check the exploration flags.
    ///
    /// # Errors
    /// Returns `FvMctsError::NoExploration` if both flags are off.
    pub fn validate(&self) -> Result<()> {
        if !self.node_exploration && !self.edge_exploration {
            return Err(FvMctsError::NoExploration);
        }
        Ok(())
    }
}

/// How joint actions are chosen at each node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CoordinationStrategy {
    /// Exact maximisation by variable elimination over coordination cliques.
    #[default]
    VarEl,

    /// Approximate maximisation by max-plus message passing over graph edges.
    MaxPlus(MaxPlusConfig),
}

impl CoordinationStrategy {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CoordinationStrategy::VarEl => "varel",
            CoordinationStrategy::MaxPlus(_) => "maxplus",
        }
    }
}

impl FromStr for CoordinationStrategy {
    type Err = FvMctsError;

    /// Parse a strategy selector. Max-plus gets default parameters.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "varel" | "var_el" | "variable_elimination" => Ok(CoordinationStrategy::VarEl),
            "maxplus" | "max_plus" => Ok(CoordinationStrategy::MaxPlus(MaxPlusConfig::default())),
            _ => Err(FvMctsError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Factored-value MCTS configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FvMctsConfig {
    /// Number of simulations per planning call. Authoritative budget.
    pub n_iterations: usize,

    /// Optional wall-clock budget. Checked before each simulation starts;
    /// running simulations are never interrupted.
    pub max_time: Option<Duration>,

    /// Maximum search depth before falling back to the leaf evaluator.
    pub depth: usize,

    /// UCB1 exploration constant.
    pub exploration_constant: f64,

    /// Visit count seeded into every new statistics entry.
    pub init_n: u32,

    /// Value seeded into every new statistics entry.
    pub init_q: f64,

    /// Keep the tree between planning calls. Unsupported; must be false.
    pub reuse_tree: bool,

    /// Size of a dedicated worker pool. `None` runs on rayon's global pool.
    pub num_threads: Option<usize>,

    /// Coordination strategy and its parameters.
    pub strategy: CoordinationStrategy,
}

impl Default for FvMctsConfig {
    fn default() -> Self {
        Self {
            n_iterations: 100,
            max_time: None,
            depth: 10,
            exploration_constant: 1.0,
            init_n: 0,
            init_q: 0.0,
            reuse_tree: false,
            num_threads: None,
            strategy: CoordinationStrategy::VarEl,
        }
    }
}

impl FvMctsConfig {
    /// Create a new config with the specified number of iterations.
    pub fn with_iterations(n_iterations: usize) -> Self {
        Self {
            n_iterations,
            ..Default::default()
        }
    }

    /// Create a max-plus config with the specified number of iterations.
    pub fn max_plus(n_iterations: usize, max_plus: MaxPlusConfig) -> Self {
        Self {
            n_iterations,
            strategy: CoordinationStrategy::MaxPlus(max_plus),
            ..Default::default()
        }
    }

    /// Check every value that does not depend on the model.
    ///
    /// # Errors
    /// Returns `TreeReuseUnsupported`, `NoExploration` or `InvalidConfig`.
    pub fn validate(&self) -> Result<()> {
        if self.reuse_tree {
            return Err(FvMctsError::TreeReuseUnsupported);
        }
        if self.n_iterations == 0 {
            return Err(FvMctsError::InvalidConfig(
                "n_iterations must be positive".to_string(),
            ));
        }
        if self.depth == 0 {
            return Err(FvMctsError::InvalidConfig(
                "depth must be positive".to_string(),
            ));
        }
        if !(self.exploration_constant >= 0.0 && self.exploration_constant.is_finite()) {
            return Err(FvMctsError::InvalidConfig(format!(
                "exploration_constant {} must be finite and non-negative",
                self.exploration_constant
            )));
        }
        if self.num_threads == Some(0) {
            return Err(FvMctsError::InvalidConfig(
                "num_threads must be positive".to_string(),
            ));
        }
        if let CoordinationStrategy::MaxPlus(max_plus) = &self.strategy {
            max_plus.validate()?;
        }
        Ok(())
    }
}
