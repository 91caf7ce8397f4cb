//! Coordination structure types with enforced invariants.
//!
//! [`AdjacencyMatrix`] guarantees at the type level that the agent
//! interaction matrix is square and symmetric. The diagonal is ignored.

use crate::{FvMctsError, Result};
use serde::{Deserialize, Serialize};

/// Symmetric boolean interaction matrix over agents.
///
/// Entry `(i, j)` is true when agents `i` and `j` interact through the
/// reward or transition structure and must coordinate their actions.
///
/// # Example
/// ```
/// use fvmcts_core::AdjacencyMatrix;
///
/// let path = AdjacencyMatrix::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
/// assert!(path.is_adjacent(1, 0));
/// assert!(!path.is_adjacent(0, 2));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<bool>>", into = "Vec<Vec<bool>>")]
pub struct AdjacencyMatrix {
    n: usize,
    cells: Vec<bool>,
}

impl AdjacencyMatrix {
    /// Create a matrix from rows.
    ///
    /// # Errors
    /// Returns `FvMctsError::AdjacencyDimension` if the rows are not square
    /// and `FvMctsError::AsymmetricAdjacency` at the first asymmetric pair.
    pub fn new(rows: Vec<Vec<bool>>) -> Result<Self> {
        let n = rows.len();
        if let Some(row) = rows.iter().find(|r| r.len() != n) {
            return Err(FvMctsError::AdjacencyDimension {
                rows: n,
                cols: row.len(),
                agents: n,
            });
        }

        let cells: Vec<bool> = rows.into_iter().flatten().collect();
        for i in 0..n {
            for j in (i + 1)..n {
                if cells[i * n + j] != cells[j * n + i] {
                    return Err(FvMctsError::AsymmetricAdjacency(i, j));
                }
            }
        }

        Ok(Self { n, cells })
    }

    /// Create a matrix over `n` agents from an undirected edge list.
    ///
    /// # Errors
    /// Returns error if an edge names an agent outside `0..n`.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut cells = vec![false; n * n];
        for &(i, j) in edges {
            if i >= n || j >= n {
                return Err(FvMctsError::InvalidConfig(format!(
                    "edge ({}, {}) names an agent outside 0..{}",
                    i, j, n
                )));
            }
            cells[i * n + j] = true;
            cells[j * n + i] = true;
        }
        Ok(Self { n, cells })
    }

    /// Every pair of distinct agents interacts.
    pub fn fully_connected(n: usize) -> Self {
        let cells = (0..n * n).map(|c| c / n != c % n).collect();
        Self { n, cells }
    }

    /// Agents `0..n` arranged in a cycle.
    pub fn ring(n: usize) -> Self {
        let mut cells = vec![false; n * n];
        if n > 1 {
            for i in 0..n {
                let j = (i + 1) % n;
                cells[i * n + j] = true;
                cells[j * n + i] = true;
            }
        }
        Self { n, cells }
    }

    /// Number of agents (rows).
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Whether two distinct agents interact. Always false on the diagonal.
    pub fn is_adjacent(&self, i: usize, j: usize) -> bool {
        i != j && i < self.n && j < self.n && self.cells[i * self.n + j]
    }

    /// Neighbours of `agent` in increasing index order.
    pub fn neighbors(&self, agent: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n).filter(move |&j| self.is_adjacent(agent, j))
    }

    /// Undirected edges `(i, j)` with `i < j`, in row-major order.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        (0..self.n)
            .flat_map(|i| ((i + 1)..self.n).map(move |j| (i, j)))
            .filter(|&(i, j)| self.is_adjacent(i, j))
            .collect()
    }

    /// Check that the matrix covers exactly `agents` agents.
    ///
    /// # Errors
    /// Returns `FvMctsError::AdjacencyDimension` on mismatch.
    pub fn check_dim(&self, agents: usize) -> Result<()> {
        if self.n != agents {
            return Err(FvMctsError::AdjacencyDimension {
                rows: self.n,
                cols: self.n,
                agents,
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<Vec<bool>>> for AdjacencyMatrix {
    type Error = FvMctsError;

    fn try_from(rows: Vec<Vec<bool>>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<AdjacencyMatrix> for Vec<Vec<bool>> {
    fn from(m: AdjacencyMatrix) -> Self {
        m.cells.chunks(m.n.max(1)).take(m.n).map(<[bool]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let m = AdjacencyMatrix::new(vec![
            vec![false, true, false],
            vec![true, false, true],
            vec![false, true, false],
        ])
        .unwrap();
        assert_eq!(m.dim(), 3);
        assert_eq!(m.edges(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_new_not_square() {
        let result = AdjacencyMatrix::new(vec![vec![false, true], vec![true]]);
        assert!(matches!(
            result,
            Err(FvMctsError::AdjacencyDimension { rows: 2, cols: 1, .. })
        ));
    }

    #[test]
    fn test_new_asymmetric() {
        let result = AdjacencyMatrix::new(vec![vec![false, true], vec![false, false]]);
        assert_eq!(result, Err(FvMctsError::AsymmetricAdjacency(0, 1)));
    }

    #[test]
    fn test_diagonal_ignored() {
        let m = AdjacencyMatrix::new(vec![vec![true, false], vec![false, true]]).unwrap();
        assert!(!m.is_adjacent(0, 0));
        assert!(m.edges().is_empty());
    }

    #[test]
    fn test_fully_connected() {
        let m = AdjacencyMatrix::fully_connected(3);
        assert_eq!(m.edges(), vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(m.neighbors(1).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_ring() {
        let m = AdjacencyMatrix::ring(4);
        assert_eq!(m.edges(), vec![(0, 1), (0, 3), (1, 2), (2, 3)]);
        assert!(AdjacencyMatrix::ring(1).edges().is_empty());
    }

    #[test]
    fn test_from_edges_out_of_range() {
        assert!(AdjacencyMatrix::from_edges(2, &[(0, 2)]).is_err());
    }

    #[test]
    fn test_check_dim() {
        let m = AdjacencyMatrix::ring(3);
        assert!(m.check_dim(3).is_ok());
        assert!(matches!(
            m.check_dim(4),
            Err(FvMctsError::AdjacencyDimension { agents: 4, .. })
        ));
    }

    #[test]
    fn test_rows_roundtrip_through_vec() {
        let m = AdjacencyMatrix::ring(3);
        let rows: Vec<Vec<bool>> = m.clone().into();
        assert_eq!(AdjacencyMatrix::new(rows).unwrap(), m);
    }
}
