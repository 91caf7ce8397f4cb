//! Max-plus message passing over the coordination graph.
//!
//! Each visited state holds per-agent action statistics and per-edge
//! action-pair statistics. Action selection runs a fixed number of
//! synchronous message passing rounds on the pairwise payoff decomposition
//! and lets every agent pick its best action given the final incoming
//! messages. Exact on trees once the round count reaches the diameter;
//! approximate on graphs with cycles.
//!
//! Exploration uses the count-smoothed bonus from
//! [`smoothed_bonus`](crate::node::smoothed_bonus): an infinite bonus on
//! unvisited entries would saturate every message and erase the ranking.

use super::{argmax, Coordinator, Selection};
use crate::config::MaxPlusConfig;
use crate::node::{smoothed_bonus, ActionStat, NodeId};
use fvmcts_core::{AdjacencyMatrix, FvMctsError, Result};

/// Pairwise payoff decomposition over a graph.
///
/// Message `2e` flows from `edges[e].0` to `edges[e].1` and is indexed by
/// the receiver's action; message `2e + 1` flows the other way.
#[derive(Clone, Debug)]
pub struct PairwiseProblem<'a> {
    /// Action count per agent.
    pub n_actions: &'a [usize],

    /// Undirected edges `(i, j)`.
    pub edges: &'a [(usize, usize)],

    /// Local utility per agent and action.
    pub agent_utils: &'a [Vec<f64>],

    /// Pairwise utility per edge, indexed `a_i * n_actions[j] + a_j`.
    pub edge_utils: &'a [Vec<f64>],
}

impl PairwiseProblem<'_> {
    /// Total payoff of a joint action.
    pub fn payoff(&self, actions: &[usize]) -> f64 {
        let local: f64 = self
            .agent_utils
            .iter()
            .zip(actions)
            .map(|(utils, &a)| utils[a])
            .sum();
        let pairwise: f64 = self
            .edges
            .iter()
            .zip(self.edge_utils)
            .map(|(&(i, j), utils)| utils[actions[i] * self.n_actions[j] + actions[j]])
            .sum();
        local + pairwise
    }

    /// Messages arriving at `agent`, one slot per neighbour.
    fn incoming(&self, agent: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(move |(e, &(i, j))| {
                if j == agent {
                    Some((e, 2 * e))
                } else if i == agent {
                    Some((e, 2 * e + 1))
                } else {
                    None
                }
            })
    }

    /// Sender's utility for action `a` plus all messages into the sender
    /// except the one travelling back along `skip_edge`.
    fn sender_value(&self, sender: usize, a: usize, skip_edge: usize, messages: &[Vec<f64>]) -> f64 {
        self.agent_utils[sender][a]
            + self
                .incoming(sender)
                .filter(|&(e, _)| e != skip_edge)
                .map(|(_, m)| messages[m][a])
                .sum::<f64>()
    }

    /// Run `rounds` synchronous rounds and pick each agent's best action.
    ///
    /// Returns the joint action and the final messages. Ties resolve to the
    /// lowest action index.
    pub fn solve(&self, rounds: usize, normalize: bool) -> (Vec<usize>, Vec<Vec<f64>>) {
        let mut messages: Vec<Vec<f64>> = self
            .edges
            .iter()
            .flat_map(|&(i, j)| [vec![0.0; self.n_actions[j]], vec![0.0; self.n_actions[i]]])
            .collect();

        for _ in 0..rounds {
            let mut next = messages.clone();
            for (e, &(i, j)) in self.edges.iter().enumerate() {
                let utils = &self.edge_utils[e];
                let k_j = self.n_actions[j];

                for a_j in 0..k_j {
                    next[2 * e][a_j] = (0..self.n_actions[i])
                        .map(|a_i| self.sender_value(i, a_i, e, &messages) + utils[a_i * k_j + a_j])
                        .fold(f64::NEG_INFINITY, f64::max);
                }
                for a_i in 0..self.n_actions[i] {
                    next[2 * e + 1][a_i] = (0..k_j)
                        .map(|a_j| self.sender_value(j, a_j, e, &messages) + utils[a_i * k_j + a_j])
                        .fold(f64::NEG_INFINITY, f64::max);
                }
            }
            if normalize {
                next.iter_mut().for_each(|m| normalize_message(m));
            }
            messages = next;
        }

        let actions = (0..self.n_actions.len())
            .map(|agent| {
                let totals = (0..self.n_actions[agent]).map(|a| {
                    self.agent_utils[agent][a]
                        + self
                            .incoming(agent)
                            .map(|(_, m)| messages[m][a])
                            .sum::<f64>()
                });
                argmax(totals).map_or(0, |(a, _)| a)
            })
            .collect();

        (actions, messages)
    }
}

/// Subtract the mean of the finite entries.
fn normalize_message(message: &mut [f64]) {
    let (sum, count) = message
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count > 0 {
        let mean = sum / count as f64;
        message.iter_mut().for_each(|v| *v -= mean);
    }
}

/// Max-plus statistics: per (node, agent) and per (node, edge) tables.
#[derive(Clone, Debug)]
pub struct MaxPlusStats {
    config: MaxPlusConfig,
    n_actions: Vec<usize>,
    edges: Vec<(usize, usize)>,
    isolated: Vec<bool>,
    agent_stats: Vec<Vec<Vec<ActionStat>>>,
    edge_stats: Vec<Vec<Vec<ActionStat>>>,
    messages: Vec<Vec<Vec<f64>>>,
}

impl MaxPlusStats {
    /// Create an empty store over the edges of `adjacency`.
    pub fn new(adjacency: &AdjacencyMatrix, n_actions: Vec<usize>, config: MaxPlusConfig) -> Self {
        let isolated = (0..n_actions.len())
            .map(|i| adjacency.neighbors(i).next().is_none())
            .collect();
        Self {
            config,
            n_actions,
            edges: adjacency.edges(),
            isolated,
            agent_stats: Vec::new(),
            edge_stats: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Graph edges `(i, j)` with `i < j`.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Statistics of one agent's action at a node.
    pub fn agent_entry(&self, node: NodeId, agent: usize, action: usize) -> Option<ActionStat> {
        self.agent_stats.get(node.0)?.get(agent)?.get(action).copied()
    }

    /// Statistics of one edge's action pair at a node.
    pub fn edge_entry(&self, node: NodeId, edge: usize, a_i: usize, a_j: usize) -> Option<ActionStat> {
        let (_, j) = *self.edges.get(edge)?;
        self.edge_stats
            .get(node.0)?
            .get(edge)?
            .get(a_i * self.n_actions[j] + a_j)
            .copied()
    }

    /// Messages computed by the last action selection at `node`.
    pub fn last_messages(&self, node: NodeId) -> Option<&[Vec<f64>]> {
        self.messages.get(node.0).map(Vec::as_slice)
    }
}

impl Coordinator for MaxPlusStats {
    fn initialize(
        &mut self,
        node: NodeId,
        seed: &mut dyn FnMut(&[usize], &[usize]) -> ActionStat,
    ) -> Result<()> {
        if node.0 != self.agent_stats.len() {
            return Err(FvMctsError::DuplicateNode(node.0));
        }

        let agents: Vec<Vec<ActionStat>> = self
            .n_actions
            .iter()
            .enumerate()
            .map(|(i, &k)| (0..k).map(|a| seed(&[i], &[a])).collect())
            .collect();
        let edges: Vec<Vec<ActionStat>> = self
            .edges
            .iter()
            .map(|&(i, j)| {
                let k_j = self.n_actions[j];
                (0..self.n_actions[i] * k_j)
                    .map(|idx| seed(&[i, j], &[idx / k_j, idx % k_j]))
                    .collect()
            })
            .collect();

        self.agent_stats.push(agents);
        self.edge_stats.push(edges);
        self.messages.push(Vec::new());
        Ok(())
    }

    fn select_action(&mut self, node: NodeId, total_n: u32, exploration: f64) -> Result<Selection> {
        let agent_stats = self
            .agent_stats
            .get(node.0)
            .ok_or(FvMctsError::UnknownNode(node.0))?;
        let edge_stats = &self.edge_stats[node.0];
        let config = &self.config;

        let agent_utils: Vec<Vec<f64>> = agent_stats
            .iter()
            .enumerate()
            .map(|(agent, stats)| {
                let use_q = config.use_agent_utils || self.isolated[agent];
                stats
                    .iter()
                    .map(|s| {
                        let q = if use_q { s.q } else { 0.0 };
                        let bonus = if config.node_exploration {
                            smoothed_bonus(exploration, total_n, s.n)
                        } else {
                            0.0
                        };
                        q + bonus
                    })
                    .collect()
            })
            .collect();
        let edge_utils: Vec<Vec<f64>> = edge_stats
            .iter()
            .map(|stats| {
                stats
                    .iter()
                    .map(|s| {
                        if config.edge_exploration {
                            s.q + smoothed_bonus(exploration, total_n, s.n)
                        } else {
                            s.q
                        }
                    })
                    .collect()
            })
            .collect();

        let problem = PairwiseProblem {
            n_actions: &self.n_actions,
            edges: &self.edges,
            agent_utils: &agent_utils,
            edge_utils: &edge_utils,
        };
        let (actions, messages) = problem.solve(config.message_iters, config.message_norm);
        let value = problem.payoff(&actions);

        self.messages[node.0] = messages;
        Ok(Selection { actions, value })
    }

    fn update(&mut self, node: NodeId, actions: &[usize], value: f64) -> Result<()> {
        let agent_stats = self
            .agent_stats
            .get_mut(node.0)
            .ok_or(FvMctsError::UnknownNode(node.0))?;
        for (stats, &a) in agent_stats.iter_mut().zip(actions) {
            stats[a].record(value);
        }

        for (stats, &(i, j)) in self.edge_stats[node.0].iter_mut().zip(&self.edges) {
            stats[actions[i] * self.n_actions[j] + actions[j]].record(value);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.agent_stats.clear();
        self.edge_stats.clear();
        self.messages.clear();
    }

    fn len(&self) -> usize {
        self.agent_stats.len()
    }
}
