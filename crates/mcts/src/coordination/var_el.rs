//! Variable elimination over coordination components.
//!
//! Each visited state holds, per component (maximal clique), a table of
//! [`ActionStat`] over every joint sub-action of the component's agents.
//! Action selection turns those tables into [`Factor`]s and maximises their
//! sum by eliminating agents one at a time in a fixed order. The cost is
//! exponential in the induced width of that order, not in the agent count.

use super::{argmax, Coordinator, Selection};
use crate::node::{ln_visits, ActionStat, NodeId};
use fvmcts_core::{FvMctsError, Result};

/// A payoff table over the joint actions of a set of agents.
///
/// Entries are laid out in mixed radix over `scope`, first agent most
/// significant.
#[derive(Clone, Debug, PartialEq)]
pub struct Factor {
    scope: Vec<usize>,
    values: Vec<f64>,
}

impl Factor {
    /// Create a factor. `scope` must be sorted and duplicate-free and
    /// `values` must have one entry per joint sub-action.
    pub fn new(scope: Vec<usize>, values: Vec<f64>) -> Self {
        Self { scope, values }
    }

    /// Agents this factor depends on.
    pub fn scope(&self) -> &[usize] {
        &self.scope
    }

    /// Value at a full joint assignment (indexed by agent).
    pub fn value_at(&self, assignment: &[usize], n_actions: &[usize]) -> f64 {
        self.values[encode(&self.scope, n_actions, assignment)]
    }
}

/// Mixed-radix index of the scope agents' actions in `assignment`.
pub(crate) fn encode(scope: &[usize], n_actions: &[usize], assignment: &[usize]) -> usize {
    scope
        .iter()
        .fold(0, |idx, &agent| idx * n_actions[agent] + assignment[agent])
}

/// Write the scope agents' actions for table index `idx` into `assignment`.
pub(crate) fn decode(mut idx: usize, scope: &[usize], n_actions: &[usize], assignment: &mut [usize]) {
    for &agent in scope.iter().rev() {
        assignment[agent] = idx % n_actions[agent];
        idx /= n_actions[agent];
    }
}

fn table_size(scope: &[usize], n_actions: &[usize]) -> usize {
    scope.iter().map(|&agent| n_actions[agent]).product()
}

/// Best response of an eliminated agent as a function of its message scope.
struct BestResponse {
    agent: usize,
    scope: Vec<usize>,
    actions: Vec<usize>,
}

/// Maximise the sum of `factors` by variable elimination.
///
/// Returns one action per agent and the maximal total. Agents missing from
/// `order` are left at action 0. Ties resolve to the lowest action index.
pub fn eliminate(factors: Vec<Factor>, order: &[usize], n_actions: &[usize]) -> (Vec<usize>, f64) {
    let mut pending = factors;
    let mut total = 0.0;
    let mut responses = Vec::with_capacity(order.len());
    let mut assignment = vec![0; n_actions.len()];

    for &agent in order {
        let (touching, rest): (Vec<Factor>, Vec<Factor>) = pending
            .into_iter()
            .partition(|f| f.scope.contains(&agent));
        pending = rest;

        let mut scope: Vec<usize> = touching
            .iter()
            .flat_map(|f| f.scope.iter().copied())
            .filter(|&a| a != agent)
            .collect();
        scope.sort_unstable();
        scope.dedup();

        let size = table_size(&scope, n_actions);
        let mut message = Vec::with_capacity(size);
        let mut best = Vec::with_capacity(size);

        for idx in 0..size {
            decode(idx, &scope, n_actions, &mut assignment);
            let payoffs = (0..n_actions[agent]).map(|a| {
                assignment[agent] = a;
                touching
                    .iter()
                    .map(|f| f.value_at(&assignment, n_actions))
                    .sum::<f64>()
            });
            let (action, value) = argmax(payoffs).unwrap_or((0, f64::NEG_INFINITY));
            message.push(value);
            best.push(action);
        }

        if scope.is_empty() {
            total += message[0];
        } else {
            pending.push(Factor::new(scope.clone(), message));
        }
        responses.push(BestResponse {
            agent,
            scope,
            actions: best,
        });
    }

    // Back-substitute: every agent in a response scope was eliminated later
    let mut joint = vec![0; n_actions.len()];
    for response in responses.iter().rev() {
        let idx = encode(&response.scope, n_actions, &joint);
        joint[response.agent] = response.actions[idx];
    }

    (joint, total)
}

/// Variable elimination statistics: one table per (node, component).
#[derive(Clone, Debug)]
pub struct VarElStats {
    components: Vec<Vec<usize>>,
    order: Vec<usize>,
    n_actions: Vec<usize>,
    tables: Vec<Vec<Vec<ActionStat>>>,
}

impl VarElStats {
    /// Create an empty store over the given components and elimination order.
    pub fn new(components: Vec<Vec<usize>>, order: Vec<usize>, n_actions: Vec<usize>) -> Self {
        Self {
            components,
            order,
            n_actions,
            tables: Vec::new(),
        }
    }

    /// Coordination components, each a sorted list of agents.
    pub fn components(&self) -> &[Vec<usize>] {
        &self.components
    }

    /// Agent elimination order.
    pub fn elimination_order(&self) -> &[usize] {
        &self.order
    }

    /// Statistics of one component entry at a node.
    pub fn entry(&self, node: NodeId, component: usize, actions: &[usize]) -> Option<ActionStat> {
        let scope = self.components.get(component)?;
        self.tables
            .get(node.0)?
            .get(component)?
            .get(encode(scope, &self.n_actions, actions))
            .copied()
    }

    /// Sum of entry visit counts per component at `node`.
    pub fn component_visit_sums(&self, node: NodeId) -> Option<Vec<u64>> {
        let tables = self.tables.get(node.0)?;
        Some(
            tables
                .iter()
                .map(|table| table.iter().map(|s| s.n as u64).sum())
                .collect(),
        )
    }

    fn node_tables(&self, node: NodeId) -> Result<&Vec<Vec<ActionStat>>> {
        self.tables.get(node.0).ok_or(FvMctsError::UnknownNode(node.0))
    }
}

impl Coordinator for VarElStats {
    fn initialize(
        &mut self,
        node: NodeId,
        seed: &mut dyn FnMut(&[usize], &[usize]) -> ActionStat,
    ) -> Result<()> {
        if node.0 != self.tables.len() {
            return Err(FvMctsError::DuplicateNode(node.0));
        }

        let mut assignment = vec![0; self.n_actions.len()];
        let mut sub_action = Vec::new();
        let tables: Vec<Vec<ActionStat>> = self
            .components
            .iter()
            .map(|scope| {
                (0..table_size(scope, &self.n_actions))
                    .map(|idx| {
                        decode(idx, scope, &self.n_actions, &mut assignment);
                        sub_action.clear();
                        sub_action.extend(scope.iter().map(|&agent| assignment[agent]));
                        seed(scope, &sub_action)
                    })
                    .collect()
            })
            .collect();

        self.tables.push(tables);
        Ok(())
    }

    fn select_action(&mut self, node: NodeId, total_n: u32, exploration: f64) -> Result<Selection> {
        let ln_total = ln_visits(total_n);
        let factors = self
            .components
            .iter()
            .zip(self.node_tables(node)?)
            .map(|(scope, table)| {
                let values = table
                    .iter()
                    .map(|stat| stat.upper_bound(exploration, ln_total))
                    .collect();
                Factor::new(scope.clone(), values)
            })
            .collect();

        let (actions, value) = eliminate(factors, &self.order, &self.n_actions);
        Ok(Selection { actions, value })
    }

    fn update(&mut self, node: NodeId, actions: &[usize], value: f64) -> Result<()> {
        let tables = self
            .tables
            .get_mut(node.0)
            .ok_or(FvMctsError::UnknownNode(node.0))?;

        for (scope, table) in self.components.iter().zip(tables.iter_mut()) {
            table[encode(scope, &self.n_actions, actions)].record(value);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.tables.clear();
    }

    fn len(&self) -> usize {
        self.tables.len()
    }
}
