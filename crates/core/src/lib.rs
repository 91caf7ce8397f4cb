//! Core abstractions for factored-value multi-agent planning.
//!
//! This crate defines the contract a cooperative multi-agent decision
//! process must satisfy to be planned over by `fvmcts`.
//!
//! # Types
//!
//! - [`MultiAgentModel`] - Trait for generative multi-agent models
//! - [`AdjacencyMatrix`] - Symmetric agent interaction matrix
//! - [`FvMctsError`] - Construction and planning errors

mod error;
mod model;
mod types;

pub use error::{FvMctsError, Result};
pub use model::MultiAgentModel;
pub use types::AdjacencyMatrix;
