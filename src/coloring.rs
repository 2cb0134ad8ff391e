//! Sparse Hessian compression via structural sparsity patterns and graph
//! coloring.
//!
//! Probing one direction per variable costs O(n) directional sweeps; coloring
//! the interaction graph so that same-colored columns cannot alias compresses
//! this to one sweep per color. The [`RecoveryPlan`] produced at compile time
//! drives both the seeding (which columns share a probe) and the recovery
//! (which adjoint row disambiguates each entry).

use std::collections::HashSet;

/// Symmetric sparsity pattern in COO format (lower triangle + diagonal).
///
/// Entries are sorted by (row, col) and represent positions where the Hessian
/// may have non-zero values.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SparsityPattern {
    /// Dimension of the (square) Hessian matrix.
    pub dim: usize,
    /// Row indices (0-based).
    pub rows: Vec<u32>,
    /// Column indices (0-based), where `cols[k] <= rows[k]` (lower triangle).
    pub cols: Vec<u32>,
}

impl SparsityPattern {
    /// Build a sorted pattern from lower-triangle edge pairs `(row, col)`,
    /// `row >= col`. The input must already be deduplicated.
    pub fn from_edges(dim: usize, edges: &[(u32, u32)]) -> Self {
        let mut entries: Vec<(u32, u32)> = edges.to_vec();
        entries.sort_unstable();
        SparsityPattern {
            dim,
            rows: entries.iter().map(|&(r, _)| r).collect(),
            cols: entries.iter().map(|&(_, c)| c).collect(),
        }
    }

    /// Number of non-zero entries in the pattern.
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Whether the pattern is empty (all zeros).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check if position (i, j) is in the pattern (checks both (i,j) and (j,i)).
    pub fn contains(&self, i: usize, j: usize) -> bool {
        let (r, c) = if i >= j { (i, j) } else { (j, i) };
        self.rows
            .iter()
            .zip(self.cols.iter())
            .any(|(&row, &col)| row as usize == r && col as usize == c)
    }
}

/// Compile-time coloring plan for one function's Hessian.
///
/// `colors[v]` is the probe group of column `v`; one directional sweep is run
/// per color and entry `(row, col)` is recovered from the adjoint tangent at
/// `row` during the sweep for `colors[col]`.
#[derive(Clone, Debug)]
pub struct RecoveryPlan {
    pub pattern: SparsityPattern,
    pub colors: Vec<u32>,
    pub num_colors: u32,
}

impl RecoveryPlan {
    pub fn new(pattern: SparsityPattern) -> Self {
        let (colors, num_colors) = greedy_coloring(&pattern);
        RecoveryPlan {
            pattern,
            colors,
            num_colors,
        }
    }
}

/// Greedy graph coloring for symmetric sparse Hessian recovery.
///
/// Colors the squared graph G² (vertices within distance 2 in the interaction
/// graph are adjacent) so that for each row of the Hessian, at most one
/// column in each color group has a non-zero entry. This enables direct
/// recovery of Hessian entries from compressed directional probes.
///
/// Returns `(colors, num_colors)` where `colors[i]` is the color assigned to
/// column `i`. Vertices are visited in decreasing-degree order.
pub fn greedy_coloring(pattern: &SparsityPattern) -> (Vec<u32>, u32) {
    let n = pattern.dim;
    if n == 0 {
        return (Vec::new(), 0);
    }

    let mut adj: Vec<Vec<u32>> = vec![Vec::new(); n];
    for (&r, &c) in pattern.rows.iter().zip(pattern.cols.iter()) {
        let r = r as usize;
        let c = c as usize;
        if r != c {
            adj[r].push(c as u32);
            adj[c].push(r as u32);
        }
    }

    // G²: adjacent iff directly adjacent or sharing a common neighbor. No two
    // columns in the same color group may then hit the same row.
    let mut adj2: Vec<HashSet<u32>> = vec![HashSet::new(); n];
    for v in 0..n {
        for &u in &adj[v] {
            adj2[v].insert(u);
            for &w in &adj[u as usize] {
                if w as usize != v {
                    adj2[v].insert(w);
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| adj2[b].len().cmp(&adj2[a].len()));

    let mut colors = vec![u32::MAX; n];
    let mut num_colors = 0u32;

    for &v in &order {
        let used: HashSet<u32> = adj2[v]
            .iter()
            .map(|&u| colors[u as usize])
            .filter(|&c| c != u32::MAX)
            .collect();

        let mut color = 0u32;
        while used.contains(&color) {
            color += 1;
        }
        colors[v] = color;
        num_colors = num_colors.max(color + 1);
    }

    (colors, num_colors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_coloring(pattern: &SparsityPattern, colors: &[u32]) -> bool {
        // Two columns of the same color must not both appear in any row.
        for k in 0..pattern.nnz() {
            for l in 0..pattern.nnz() {
                let (r1, c1) = (pattern.rows[k], pattern.cols[k]);
                let (r2, c2) = (pattern.rows[l], pattern.cols[l]);
                // Symmetric entries share rows both ways.
                for (ra, ca) in [(r1, c1), (c1, r1)] {
                    for (rb, cb) in [(r2, c2), (c2, r2)] {
                        if ra == rb && ca != cb && colors[ca as usize] == colors[cb as usize] {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    #[test]
    fn diagonal_pattern_needs_one_color() {
        let pattern = SparsityPattern::from_edges(4, &[(0, 0), (1, 1), (2, 2), (3, 3)]);
        let (colors, num_colors) = greedy_coloring(&pattern);
        assert_eq!(num_colors, 1);
        assert!(valid_coloring(&pattern, &colors));
    }

    #[test]
    fn tridiagonal_pattern_is_compressed() {
        let n = 10;
        let mut edges: Vec<(u32, u32)> = (0..n).map(|i| (i, i)).collect();
        edges.extend((1..n).map(|i| (i, i - 1)));
        let pattern = SparsityPattern::from_edges(n as usize, &edges);
        let (colors, num_colors) = greedy_coloring(&pattern);
        assert!(valid_coloring(&pattern, &colors));
        assert!(num_colors < n);
    }

    #[test]
    fn dense_pattern_gets_distinct_colors() {
        let mut edges = Vec::new();
        for r in 0..4u32 {
            for c in 0..=r {
                edges.push((r, c));
            }
        }
        let pattern = SparsityPattern::from_edges(4, &edges);
        let (colors, num_colors) = greedy_coloring(&pattern);
        assert_eq!(num_colors, 4);
        assert!(valid_coloring(&pattern, &colors));
    }
}
