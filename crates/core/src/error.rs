use thiserror::Error;

/// Errors raised while building or running a factored-value planner.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FvMctsError {
    #[error("adjacency matrix is {rows}x{cols} but the model has {agents} agents")]
    AdjacencyDimension {
        rows: usize,
        cols: usize,
        agents: usize,
    },

    #[error("adjacency matrix is not symmetric at ({0}, {1})")]
    AsymmetricAdjacency(usize, usize),

    #[error("unknown coordination strategy: {0}")]
    UnknownStrategy(String),

    #[error("max-plus needs node or edge exploration enabled")]
    NoExploration,

    #[error("tree reuse across planning calls is not supported")]
    TreeReuseUnsupported,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("model has no agents")]
    NoAgents,

    #[error("agent {0} has an empty action set")]
    EmptyActionSet(usize),

    #[error("discount factor {0} is outside [0, 1]")]
    InvalidDiscount(f64),

    #[error("state inserted twice into the search tree (node {0})")]
    DuplicateNode(usize),

    #[error("unknown node id {0}")]
    UnknownNode(usize),

    #[error("search tree lock poisoned")]
    LockPoisoned,
}

/// Convenience Result type for planner operations
pub type Result<T> = std::result::Result<T, FvMctsError>;
