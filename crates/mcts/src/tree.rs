//! Shared search tree.
//!
//! Joint states are mapped to dense [`NodeId`]s; labels, visit counts and
//! coordination statistics live in vectors indexed by those ids. Nodes hold
//! no parent/child links: a simulation finds its successor by looking the
//! sampled state up again.
//!
//! One mutex guards everything. Each public operation takes the lock for
//! its own duration only, so simulations never hold it while sampling the
//! model.

use crate::coordination::{CoordinationStats, Coordinator, Selection};
use crate::node::{ActionStat, NodeId};
use fvmcts_core::{FvMctsError, Result};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

#[derive(Debug)]
struct TreeData<S> {
    lookup: HashMap<S, NodeId>,
    labels: Vec<S>,
    total_n: Vec<u32>,
    stats: CoordinationStats,
}

impl<S> TreeData<S> {
    fn check(&self, id: NodeId) -> Result<()> {
        if id.0 < self.total_n.len() {
            Ok(())
        } else {
            Err(FvMctsError::UnknownNode(id.0))
        }
    }
}

/// Concurrent state-keyed search tree with factored node statistics.
#[derive(Debug)]
pub struct SearchTree<S> {
    inner: Mutex<TreeData<S>>,
}

impl<S: Clone + Eq + Hash> SearchTree<S> {
    /// Create an empty tree around an empty statistics store.
    pub fn new(stats: CoordinationStats) -> Self {
        Self {
            inner: Mutex::new(TreeData {
                lookup: HashMap::new(),
                labels: Vec::new(),
                total_n: Vec::new(),
                stats,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TreeData<S>>> {
        self.inner.lock().map_err(|_| FvMctsError::LockPoisoned)
    }

    /// Node id of `state`, if it has been inserted.
    pub fn lookup(&self, state: &S) -> Result<Option<NodeId>> {
        Ok(self.lock()?.lookup.get(state).copied())
    }

    /// Insert `state` unless present and return its id.
    ///
    /// The flag is true only for the call that created the node; a
    /// concurrent insert of the same state returns the canonical id with
    /// `false`. New nodes start with zero visits and statistics seeded by
    /// `seed(agents, action indices)`.
    ///
    /// # Errors
    /// Returns `DuplicateNode` if the state's `Hash`/`Eq` are inconsistent.
    pub fn insert(
        &self,
        state: &S,
        seed: &mut dyn FnMut(&[usize], &[usize]) -> ActionStat,
    ) -> Result<(NodeId, bool)> {
        let mut data = self.lock()?;
        if let Some(&id) = data.lookup.get(state) {
            return Ok((id, false));
        }

        let id = NodeId(data.labels.len());
        if let Some(previous) = data.lookup.insert(state.clone(), id) {
            return Err(FvMctsError::DuplicateNode(previous.0));
        }
        data.labels.push(state.clone());
        data.total_n.push(0);
        data.stats.initialize(id, seed)?;

        trace!(node = id.0, "inserted node");
        Ok((id, true))
    }

    /// Count one more simulation through `id`.
    pub fn increment_visits(&self, id: NodeId) -> Result<()> {
        let mut data = self.lock()?;
        data.check(id)?;
        data.total_n[id.0] += 1;
        Ok(())
    }

    /// Choose a joint action at `id` from its current statistics.
    pub fn select(&self, id: NodeId, exploration: f64) -> Result<Selection> {
        let mut data = self.lock()?;
        data.check(id)?;
        let total_n = data.total_n[id.0];
        data.stats.select_action(id, total_n, exploration)
    }

    /// Record a completed simulation through `id`: one visit and one
    /// statistics update, applied together.
    pub fn backup(&self, id: NodeId, actions: &[usize], value: f64) -> Result<()> {
        let mut data = self.lock()?;
        data.check(id)?;
        data.total_n[id.0] += 1;
        data.stats.update(id, actions, value)
    }

    /// Drop every node and all statistics.
    pub fn clear(&self) -> Result<()> {
        let mut data = self.lock()?;
        data.lookup.clear();
        data.labels.clear();
        data.total_n.clear();
        data.stats.reset();
        Ok(())
    }

    /// Number of nodes.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.labels.len())
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Total visit count of `id`.
    pub fn visits(&self, id: NodeId) -> Result<u32> {
        let data = self.lock()?;
        data.check(id)?;
        Ok(data.total_n[id.0])
    }

    /// Snapshot of all node labels in id order.
    pub fn states(&self) -> Result<Vec<S>> {
        Ok(self.lock()?.labels.clone())
    }

    /// Number of nodes holding statistics.
    pub fn stats_len(&self) -> Result<usize> {
        Ok(self.lock()?.stats.len())
    }

    /// Per-component visit-count sums at `id` (variable elimination only).
    pub fn component_visit_sums(&self, id: NodeId) -> Result<Option<Vec<u64>>> {
        let data = self.lock()?;
        data.check(id)?;
        Ok(data.stats.component_visit_sums(id))
    }

    /// Directed max-plus messages from the last selection at `id`.
    pub fn last_messages(&self, id: NodeId) -> Result<Option<Vec<Vec<f64>>>> {
        let data = self.lock()?;
        data.check(id)?;
        Ok(data.stats.last_messages(id).map(<[Vec<f64>]>::to_vec))
    }
}
