//! Graph connected-component labeling over explicit adjacency.
//!
//! Non-grid-reshapeable topologies (cortical surface meshes, arbitrary
//! graphs) supply their neighbor relation as an [`Adjacency`]; clusters are
//! connected components of that relation restricted to active nodes.

use pc_core::{Adjacency, Error, Result};

use crate::LabelMap;

/// Label connected true-regions of a boolean indicator under `adjacency`.
///
/// Same contract as [`crate::label_grid`]: gapless labels `1..=n` in
/// first-encounter scan order, 0 for inactive nodes. Inactive nodes never
/// bridge components.
pub fn label_graph(indicator: &[bool], adjacency: &Adjacency) -> Result<LabelMap> {
    if indicator.len() != adjacency.n_nodes() {
        return Err(Error::Validation(format!(
            "indicator has {} nodes, adjacency covers {}",
            indicator.len(),
            adjacency.n_nodes()
        )));
    }

    let n = indicator.len();
    let mut labels = vec![0u32; n];
    let mut n_clusters = 0u32;
    let mut stack: Vec<usize> = Vec::new();

    for seed in 0..n {
        if !indicator[seed] || labels[seed] != 0 {
            continue;
        }
        n_clusters += 1;
        labels[seed] = n_clusters;
        stack.push(seed);

        while let Some(node) = stack.pop() {
            for &nb in adjacency.neighbors(node) {
                if indicator[nb] && labels[nb] == 0 {
                    labels[nb] = n_clusters;
                    stack.push(nb);
                }
            }
        }
    }

    Ok(LabelMap { labels, n_clusters })
}
