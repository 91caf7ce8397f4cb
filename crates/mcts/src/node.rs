//! Node handles and per-entry statistics.
//!
//! Tree nodes are dense integer ids; all per-node data lives in vectors
//! indexed by those ids rather than in the nodes themselves.

/// Index of a joint state in the search tree.
///
/// Ids are assigned sequentially from 0 in insertion order and are never
/// reassigned within a planning call. The root is always 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root node is always the first inserted.
    pub const ROOT: NodeId = NodeId(0);

    /// Position of this node in the tree's dense storage.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Visit count and running-mean value for one statistics entry.
///
/// An entry is a (component, joint sub-action) pair for variable
/// elimination, or an (agent, action) / (edge, action pair) for max-plus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActionStat {
    /// Number of backups recorded (plus any seeded count).
    pub n: u32,

    /// Mean backed-up return.
    pub q: f64,
}

impl ActionStat {
    /// Create an entry with a seeded count and value.
    pub fn new(n: u32, q: f64) -> Self {
        Self { n, q }
    }

    /// Fold one observed return into the running mean.
    pub fn record(&mut self, value: f64) {
        self.n += 1;
        self.q += (value - self.q) / self.n as f64;
    }

    /// Value estimate plus the UCB1 exploration term.
    pub fn upper_bound(&self, exploration: f64, ln_total: f64) -> f64 {
        self.q + exploration_bonus(exploration, ln_total, self.n)
    }
}

impl Default for ActionStat {
    fn default() -> Self {
        Self::new(0, 0.0)
    }
}

/// UCB1 bonus `c * sqrt(ln(N) / n)`.
///
/// Unvisited entries get an infinite bonus so they are tried first; a zero
/// exploration constant disables the bonus entirely.
pub fn exploration_bonus(exploration: f64, ln_total: f64, n: u32) -> f64 {
    if exploration == 0.0 {
        0.0
    } else if n == 0 {
        f64::INFINITY
    } else {
        exploration * (ln_total / n as f64).sqrt()
    }
}

/// Count-smoothed UCB1 bonus `c * sqrt(ln(N + 1) / (n + 1))`.
///
/// Always finite, so message passing never saturates on unvisited entries.
pub fn smoothed_bonus(exploration: f64, total_n: u32, n: u32) -> f64 {
    exploration * ((total_n as f64 + 1.0).ln() / (n as f64 + 1.0)).sqrt()
}

/// `ln(N)` for a node's total visit count, with `ln(0)` treated as 0.
pub fn ln_visits(total_n: u32) -> f64 {
    (total_n.max(1) as f64).ln()
}
