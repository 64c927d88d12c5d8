//! Sparse boolean adjacency for non-grid topologies.
//!
//! Cortical surface meshes and other graph-shaped layouts supply their
//! neighbor relation explicitly instead of through a grid connectivity
//! criterion. The relation is stored in compressed sparse row form so that
//! flood fills can borrow a node's neighbor list as a slice.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Symmetric boolean adjacency over `n` nodes, CSR layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacency {
    n: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
}

impl Adjacency {
    /// Build from an undirected edge list.
    ///
    /// Edges are symmetrized and deduplicated; self-edges are dropped;
    /// node indices must be `< n`.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut pairs = Vec::with_capacity(edges.len() * 2);
        for &(a, b) in edges {
            if a >= n || b >= n {
                return Err(Error::Validation(format!(
                    "edge ({a}, {b}) references a node outside 0..{n}"
                )));
            }
            if a == b {
                continue;
            }
            pairs.push((a, b));
            pairs.push((b, a));
        }
        pairs.sort_unstable();
        pairs.dedup();

        let mut indptr = vec![0usize; n + 1];
        for &(a, _) in &pairs {
            indptr[a + 1] += 1;
        }
        for i in 0..n {
            indptr[i + 1] += indptr[i];
        }
        let indices = pairs.into_iter().map(|(_, b)| b).collect();
        Ok(Self { n, indptr, indices })
    }

    /// Number of nodes the relation covers.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.n
    }

    /// Number of stored directed edges (twice the undirected edge count).
    #[inline]
    pub fn n_links(&self) -> usize {
        self.indices.len()
    }

    /// Neighbors of node `i`, sorted ascending.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.indices[self.indptr[i]..self.indptr[i + 1]]
    }

    /// Structural validity check for adjacencies built outside `from_edges`
    /// (e.g. deserialized from JSON).
    pub fn validate(&self) -> Result<()> {
        if self.indptr.len() != self.n + 1 {
            return Err(Error::Validation(format!(
                "adjacency indptr has {} entries for {} nodes",
                self.indptr.len(),
                self.n
            )));
        }
        if self.indptr[0] != 0 || *self.indptr.last().unwrap_or(&0) != self.indices.len() {
            return Err(Error::Validation("adjacency indptr does not span indices".to_string()));
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::Validation("adjacency indptr must be non-decreasing".to_string()));
        }
        if self.indices.iter().any(|&j| j >= self.n) {
            return Err(Error::Validation("adjacency index out of range".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_edges_symmetrizes_and_dedups() {
        let adj = Adjacency::from_edges(4, &[(0, 1), (1, 0), (1, 2), (3, 3)]).unwrap();
        assert_eq!(adj.n_nodes(), 4);
        assert_eq!(adj.neighbors(0), &[1]);
        assert_eq!(adj.neighbors(1), &[0, 2]);
        assert_eq!(adj.neighbors(2), &[1]);
        assert!(adj.neighbors(3).is_empty());
        assert_eq!(adj.n_links(), 4);
        assert!(adj.validate().is_ok());
    }

    #[test]
    fn out_of_range_edge_rejected() {
        assert!(Adjacency::from_edges(2, &[(0, 2)]).is_err());
    }

    #[test]
    fn json_roundtrip() {
        let adj = Adjacency::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
        let json = serde_json::to_string(&adj).unwrap();
        let back: Adjacency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, adj);
    }
}
