//! Factored-value Monte Carlo Tree Search for cooperative multi-agent
//! planning.
//!
//! The planner searches over joint states of a team of agents but never
//! enumerates the joint action space. Action values are kept factored over
//! a coordination graph, and joint actions are chosen by inference over
//! those factors.
//!
//! # Features
//!
//! - **Generic**: Works with any `fvmcts_core::MultiAgentModel`
//! - **Variable elimination**: Exact maximisation over the maximal cliques
//!   of the coordination graph, exponential only in the largest clique
//! - **Max-plus**: Approximate message passing over graph edges with
//!   configurable node and edge exploration
//! - **Concurrent**: Simulations run in parallel on rayon workers against
//!   one shared tree
//! - **Evaluator Abstraction**: Random rollouts, zero, or a heuristic closure
//!   at the search frontier
//!
//! # Example
//!
//! ```
//! use fvmcts::{FvMcts, FvMctsConfig, RolloutEvaluator, games::CoopMatrixGame};
//! use fvmcts_core::MultiAgentModel;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let game = CoopMatrixGame::two_agent(vec![
//!     vec![11.0, -30.0, 0.0],
//!     vec![-30.0, 7.0, 6.0],
//!     vec![0.0, 0.0, 5.0],
//! ])
//! .unwrap();
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let state = game.initial_state(&mut rng);
//!
//! let config = FvMctsConfig::with_iterations(500);
//! let mut planner = FvMcts::new(config, game, RolloutEvaluator::new(), rng).unwrap();
//!
//! let (actions, info) = planner.plan_action_with_info(&state).unwrap();
//! println!("Joint action: {:?}", actions);
//! assert_eq!(info.root_visits, 500);
//! ```

pub mod config;
pub mod coordination;
pub mod evaluator;
pub mod games;
pub mod graph;
mod node;
pub mod search;
mod tree;

pub use config::{CoordinationStrategy, FvMctsConfig, MaxPlusConfig};
pub use coordination::{
    ConstantInit, CoordinationStats, Coordinator, FnInit, MaxPlusStats, Selection, StatInit,
    VarElStats,
};
pub use evaluator::{Evaluator, FnEvaluator, RolloutEvaluator, ZeroEvaluator};
pub use node::{ActionStat, NodeId};
pub use search::{solve, FvMcts, PlanInfo};
pub use tree::SearchTree;
