//! Reference multi-agent domains.
//!
//! Small cooperative problems used to check the planners: one with a known
//! optimum and one with stochastic, locally coupled dynamics.

pub mod coop_matrix;
pub mod sysadmin;

pub use coop_matrix::{CoopMatrixGame, MatrixState};
pub use sysadmin::{AdminAction, Machine, SysAdmin, SysAdminState};
