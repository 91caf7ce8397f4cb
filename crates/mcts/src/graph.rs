//! Coordination graph analysis.
//!
//! Derives the two structures variable elimination needs from the agent
//! adjacency matrix: the maximal cliques ("coordination components") and a
//! greedy minimum-degree elimination ordering. Both are pure functions of
//! the matrix and are computed once per planner.

use fvmcts_core::AdjacencyMatrix;
use std::collections::BTreeSet;

/// Maximal cliques of the interaction graph.
///
/// Every clique is sorted by agent index and the list is sorted
/// lexicographically, so the result is deterministic. Isolated agents form
/// singleton cliques, so every agent belongs to at least one component.
pub fn maximal_cliques(adjacency: &AdjacencyMatrix) -> Vec<Vec<usize>> {
    let n = adjacency.dim();
    if n == 0 {
        return Vec::new();
    }

    let mut cliques = Vec::new();
    let mut current = Vec::new();
    bron_kerbosch(adjacency, &mut current, (0..n).collect(), Vec::new(), &mut cliques);

    cliques.sort();
    cliques
}

/// Bron-Kerbosch with pivoting.
fn bron_kerbosch(
    adjacency: &AdjacencyMatrix,
    current: &mut Vec<usize>,
    mut candidates: Vec<usize>,
    mut excluded: Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if candidates.is_empty() && excluded.is_empty() {
        let mut clique = current.clone();
        clique.sort_unstable();
        out.push(clique);
        return;
    }

    // Pivot on the vertex covering the most candidates
    let pivot = candidates
        .iter()
        .chain(excluded.iter())
        .copied()
        .max_by_key(|&u| {
            let covered = candidates.iter().filter(|&&v| adjacency.is_adjacent(u, v)).count();
            (covered, std::cmp::Reverse(u))
        });

    let branch: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&v| pivot.map_or(true, |u| !adjacency.is_adjacent(u, v)))
        .collect();

    for v in branch {
        let next_candidates = candidates
            .iter()
            .copied()
            .filter(|&w| adjacency.is_adjacent(v, w))
            .collect();
        let next_excluded = excluded
            .iter()
            .copied()
            .filter(|&w| adjacency.is_adjacent(v, w))
            .collect();

        current.push(v);
        bron_kerbosch(adjacency, current, next_candidates, next_excluded, out);
        current.pop();

        candidates.retain(|&w| w != v);
        excluded.push(v);
    }
}

/// Greedy minimum-degree elimination ordering.
///
/// Repeatedly removes the agent with the fewest remaining neighbours (ties
/// go to the lowest index) and connects its neighbours to each other, the
/// fill-in that eliminating it would create.
pub fn min_degree_order(adjacency: &AdjacencyMatrix) -> Vec<usize> {
    let n = adjacency.dim();
    let mut neighbors: Vec<BTreeSet<usize>> = (0..n)
        .map(|i| adjacency.neighbors(i).collect())
        .collect();
    let mut remaining: BTreeSet<usize> = (0..n).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(agent) = remaining
        .iter()
        .copied()
        .min_by_key(|&i| (neighbors[i].len(), i))
    {
        let adjacent: Vec<usize> = neighbors[agent].iter().copied().collect();
        for &a in &adjacent {
            neighbors[a].remove(&agent);
            for &b in &adjacent {
                if a != b {
                    neighbors[a].insert(b);
                }
            }
        }
        neighbors[agent].clear();
        remaining.remove(&agent);
        order.push(agent);
    }

    order
}
