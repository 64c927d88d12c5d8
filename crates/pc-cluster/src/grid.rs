//! Grid connected-component labeling.
//!
//! Statistic maps arrive as flat vectors in axis-0-fastest order; `dim`
//! recovers the 2D or 3D grid shape. The connectivity criterion selects
//! which neighbor offsets count as adjacent: faces only (4/6), faces and
//! edges (18), or faces, edges and corners (8/26).

use pc_core::{Adjacency, Error, Result};

use crate::LabelMap;

/// Normalized grid shape: 2D grids become 3D with a unit third axis.
fn axes(dim: &[usize]) -> Result<[usize; 3]> {
    match *dim {
        [d0, d1] => Ok([d0, d1, 1]),
        [d0, d1, d2] => Ok([d0, d1, d2]),
        _ => Err(Error::Validation(format!(
            "grid labeling needs 2 or 3 axes, got {}",
            dim.len()
        ))),
    }
}

/// Neighbor offsets for the given dimensionality and connectivity criterion.
fn offsets(ndim: usize, conn: u32) -> Result<Vec<[i64; 3]>> {
    let max_nonzero = match (ndim, conn) {
        (2, 4) | (3, 6) => 1,
        (3, 18) => 2,
        (2, 8) => 2,
        (3, 26) => 3,
        _ => {
            return Err(Error::Validation(format!(
                "connectivity {conn} is not supported for {ndim}D grids"
            )));
        }
    };
    let mut out = Vec::new();
    let dz_range: &[i64] = if ndim == 2 { &[0] } else { &[-1, 0, 1] };
    for &dz in dz_range {
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nonzero = usize::from(dx != 0) + usize::from(dy != 0) + usize::from(dz != 0);
                if nonzero >= 1 && nonzero <= max_nonzero {
                    out.push([dx, dy, dz]);
                }
            }
        }
    }
    Ok(out)
}

/// Label connected true-regions of a boolean grid indicator.
///
/// `indicator.len()` must equal the product of `dim`; out-of-mask cells are
/// expected to already be `false`. Returns gapless labels `1..=n` assigned
/// in first-encounter scan order, 0 elsewhere.
pub fn label_grid(indicator: &[bool], dim: &[usize], conn: u32) -> Result<LabelMap> {
    let [d0, d1, d2] = axes(dim)?;
    let n = d0 * d1 * d2;
    if indicator.len() != n {
        return Err(Error::Validation(format!(
            "indicator has {} cells for grid {:?}",
            indicator.len(),
            dim
        )));
    }
    let offs = offsets(dim.len(), conn)?;

    let mut labels = vec![0u32; n];
    let mut n_clusters = 0u32;
    // Iterative flood fill; the stack holds flat indices still to expand.
    let mut stack: Vec<usize> = Vec::new();

    for seed in 0..n {
        if !indicator[seed] || labels[seed] != 0 {
            continue;
        }
        n_clusters += 1;
        labels[seed] = n_clusters;
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            let x = (idx % d0) as i64;
            let y = ((idx / d0) % d1) as i64;
            let z = (idx / (d0 * d1)) as i64;
            for &[dx, dy, dz] in &offs {
                let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                if nx < 0
                    || ny < 0
                    || nz < 0
                    || nx >= d0 as i64
                    || ny >= d1 as i64
                    || nz >= d2 as i64
                {
                    continue;
                }
                let nidx = nx as usize + d0 * (ny as usize + d1 * nz as usize);
                if indicator[nidx] && labels[nidx] == 0 {
                    labels[nidx] = n_clusters;
                    stack.push(nidx);
                }
            }
        }
    }

    Ok(LabelMap { labels, n_clusters })
}

/// The grid graph for `dim` under connectivity `conn`, as an explicit
/// adjacency. Lets graph-based labeling be cross-checked against the grid
/// path, and gives callers a starting point for mesh-style topologies.
pub fn grid_adjacency(dim: &[usize], conn: u32) -> Result<Adjacency> {
    let [d0, d1, d2] = axes(dim)?;
    let n = d0 * d1 * d2;
    let offs = offsets(dim.len(), conn)?;

    let mut edges = Vec::new();
    for idx in 0..n {
        let x = (idx % d0) as i64;
        let y = ((idx / d0) % d1) as i64;
        let z = (idx / (d0 * d1)) as i64;
        for &[dx, dy, dz] in &offs {
            let (nx, ny, nz) = (x + dx, y + dy, z + dz);
            if nx < 0 || ny < 0 || nz < 0 || nx >= d0 as i64 || ny >= d1 as i64 || nz >= d2 as i64
            {
                continue;
            }
            let nidx = nx as usize + d0 * (ny as usize + d1 * nz as usize);
            if idx < nidx {
                edges.push((idx, nidx));
            }
        }
    }
    Adjacency::from_edges(n, &edges)
}
