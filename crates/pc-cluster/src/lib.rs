//! # pc-cluster
//!
//! Connected-component labeling for thresholded statistic maps, over 2D/3D
//! grids (4/8 and 6/18/26 connectivity) or explicit graph adjacency, plus
//! the per-cluster summary statistics consumed by the permutation tests in
//! `pc-inference`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod graph;
pub mod grid;
pub mod stat;

pub use graph::label_graph;
pub use grid::{grid_adjacency, label_grid};
pub use stat::cluster_stats;

/// Cluster assignment for one thresholded statistic map.
///
/// `labels[i]` is 0 for background and `k` in `1..=n_clusters` for members
/// of cluster `k`; labels are gapless and local to the map they were
/// computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    /// Per-unit cluster label, 0 = background.
    pub labels: Vec<u32>,
    /// Number of distinct clusters.
    pub n_clusters: u32,
}

impl LabelMap {
    /// Units assigned to cluster `k` (1-based), in index order.
    pub fn members(&self, k: u32) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| (l == k).then_some(i))
            .collect()
    }
}
