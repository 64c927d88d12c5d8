//! Single-configuration permutation cluster test.
//!
//! One run of this test fixes a (tail, threshold rule, cluster alpha,
//! connectivity) configuration, thresholds the observed and randomized
//! statistic maps, labels suprathreshold clusters, builds a null
//! distribution of the most extreme cluster statistic per permutation, and
//! converts observed cluster statistics into permutation p-values with the
//! add-one correction `(count + 1) / (n_perm + 1)`.

use pc_cluster::{cluster_stats, label_graph, label_grid, LabelMap};
use pc_core::{ClusterTestConfig, Error, Result, StatMatrix, TailCritVal, TailSide};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::threshold::resolve_thresholds;
use crate::Execution;

/// One observed cluster: its summary statistic and permutation p-value.
///
/// Clusters are sorted by extremity, so entry 0 is always the most extreme
/// cluster of its tail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterEntry {
    /// Cluster summary statistic.
    pub stat: f64,
    /// Permutation p-value, in (0, 1].
    pub prob: f64,
}

/// Result of one single-configuration cluster test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTestResult {
    /// Per-unit probability; 1.0 for units outside every cluster.
    pub prob: Vec<f64>,
    /// Positive-tail clusters, most extreme first.
    pub pos_clusters: Vec<ClusterEntry>,
    /// Negative-tail clusters, most extreme first.
    pub neg_clusters: Vec<ClusterEntry>,
    /// Positive-tail label map, relabeled so label 1 is the most extreme cluster.
    pub pos_labels: Vec<u32>,
    /// Negative-tail label map, relabeled so label 1 is the most extreme cluster.
    pub neg_labels: Vec<u32>,
    /// Per-permutation most extreme positive cluster statistic (0.0 when a
    /// permutation produced no positive clusters).
    pub pos_distribution: Vec<f64>,
    /// Per-permutation most extreme negative cluster statistic (0.0 when a
    /// permutation produced no negative clusters).
    pub neg_distribution: Vec<f64>,
}

impl ClusterTestResult {
    /// Per-unit probability map for a single tail: the unit's cluster
    /// p-value, or 1.0 outside every cluster of that tail.
    pub fn tail_prob(&self, side: TailSide) -> Vec<f64> {
        let (labels, clusters) = match side {
            TailSide::Positive => (&self.pos_labels, &self.pos_clusters),
            TailSide::Negative => (&self.neg_labels, &self.neg_clusters),
        };
        labels
            .iter()
            .map(|&l| if l > 0 { clusters[(l - 1) as usize].prob } else { 1.0 })
            .collect()
    }
}

fn vacuous_result(n_units: usize, n_perm: usize) -> ClusterTestResult {
    ClusterTestResult {
        prob: vec![1.0; n_units],
        pos_clusters: Vec::new(),
        neg_clusters: Vec::new(),
        pos_labels: vec![0; n_units],
        neg_labels: vec![0; n_units],
        pos_distribution: vec![0.0; n_perm],
        neg_distribution: vec![0.0; n_perm],
    }
}

/// Boolean suprathreshold indicator restricted to inside units.
fn indicator(stat: &[f64], inside: &[bool], cv: &TailCritVal, side: TailSide) -> Vec<bool> {
    stat.iter()
        .enumerate()
        .map(|(i, &x)| {
            inside[i]
                && match side {
                    TailSide::Positive => x >= cv.value_at(i),
                    TailSide::Negative => x <= cv.value_at(i),
                }
        })
        .collect()
}

pub(crate) fn count_ge_sorted(sorted: &[f64], x: f64) -> usize {
    sorted.len() - sorted.partition_point(|v| *v < x)
}

pub(crate) fn count_le_sorted(sorted: &[f64], x: f64) -> usize {
    sorted.partition_point(|v| *v <= x)
}

/// Sort observed cluster statistics by extremity, relabel the map so label 1
/// is the most extreme cluster, and assign add-one permutation p-values
/// against the (ordered) null distributions.
fn evaluate_observed(
    map: &LabelMap,
    stats: &[f64],
    side: TailSide,
    distributions: &[Vec<f64>],
) -> (Vec<u32>, Vec<ClusterEntry>) {
    let n = stats.len();
    let mut order: Vec<usize> = (0..n).collect();
    match side {
        TailSide::Positive => order.sort_by(|&a, &b| stats[b].total_cmp(&stats[a])),
        TailSide::Negative => order.sort_by(|&a, &b| stats[a].total_cmp(&stats[b])),
    }

    let sorted_dists: Vec<Vec<f64>> = distributions
        .iter()
        .map(|d| {
            let mut s = d.clone();
            s.sort_unstable_by(f64::total_cmp);
            s
        })
        .collect();
    let n_perm = distributions.first().map_or(0, Vec::len);

    let entries: Vec<ClusterEntry> = order
        .iter()
        .enumerate()
        .map(|(j, &old)| {
            let stat = stats[old];
            let dist = &sorted_dists[j.min(sorted_dists.len() - 1)];
            let more_extreme = match side {
                TailSide::Positive => count_ge_sorted(dist, stat),
                TailSide::Negative => count_le_sorted(dist, stat),
            };
            let prob = (more_extreme as f64 + 1.0) / (n_perm as f64 + 1.0);
            ClusterEntry { stat, prob }
        })
        .collect();

    let mut new_of_old = vec![0u32; n];
    for (j, &old) in order.iter().enumerate() {
        new_of_old[old] = (j + 1) as u32;
    }
    let labels = map
        .labels
        .iter()
        .map(|&l| if l > 0 { new_of_old[(l - 1) as usize] } else { 0 })
        .collect();

    (labels, entries)
}

/// Run the test with the default (parallel) permutation loop.
pub fn cluster_test(
    cfg: &ClusterTestConfig,
    statobs: &[f64],
    statrnd: &StatMatrix,
) -> Result<ClusterTestResult> {
    cluster_test_with(cfg, statobs, statrnd, Execution::default())
}

/// Run the test with an explicit execution mode.
///
/// Both modes produce bit-identical results; see [`Execution`].
pub fn cluster_test_with(
    cfg: &ClusterTestConfig,
    statobs: &[f64],
    statrnd: &StatMatrix,
    execution: Execution,
) -> Result<ClusterTestResult> {
    let n_units = statobs.len();
    cfg.validate(n_units)?;
    if statrnd.n_units() != n_units {
        return Err(Error::Validation(format!(
            "observed map has {n_units} units, randomized matrix has {}",
            statrnd.n_units()
        )));
    }
    let n_perm = statrnd.n_perm();

    if !cfg.inside.iter().any(|&b| b) {
        log::warn!("cluster test: empty post-mask statistic vector, returning all-ones result");
        return Ok(vacuous_result(n_units, n_perm));
    }

    let resolved =
        resolve_thresholds(&cfg.threshold, cfg.cluster_alpha, cfg.tail, statrnd, &cfg.inside)?;
    let missing_threshold = || {
        Error::Validation(
            "cluster statistics require a cluster-defining threshold; \
             threshold rule 'none' only suits threshold-free statistics"
                .to_string(),
        )
    };
    let pos_cv = if cfg.tail.needs_pos() {
        Some(resolved.pos.ok_or_else(missing_threshold)?)
    } else {
        None
    };
    let neg_cv = if cfg.tail.needs_neg() {
        Some(resolved.neg.ok_or_else(missing_threshold)?)
    } else {
        None
    };

    let label = |ind: &[bool]| -> Result<LabelMap> {
        match &cfg.connectivity {
            Some(adj) => label_graph(ind, adj),
            None => label_grid(ind, &cfg.dim, cfg.conn),
        }
    };

    // Observed clustering. No clusters in any needed tail is a valid,
    // vacuous outcome: skip the permutation loop entirely.
    let obs_pos = match &pos_cv {
        Some(cv) => Some(label(&indicator(statobs, &cfg.inside, cv, TailSide::Positive))?),
        None => None,
    };
    let obs_neg = match &neg_cv {
        Some(cv) => Some(label(&indicator(statobs, &cfg.inside, cv, TailSide::Negative))?),
        None => None,
    };
    let n_obs_clusters = obs_pos.as_ref().map_or(0, |m| m.n_clusters)
        + obs_neg.as_ref().map_or(0, |m| m.n_clusters);
    if n_obs_clusters == 0 {
        return Ok(vacuous_result(n_units, n_perm));
    }

    // Randomization loop: per permutation, the `num_ordered_stats` most
    // extreme cluster statistics per tail (0.0-padded when a permutation
    // yields fewer clusters).
    let k = cfg.num_ordered_stats;
    let per_perm = |r: usize| -> Result<(Vec<f64>, Vec<f64>)> {
        let col = statrnd.column(r);
        let mut pos_top = vec![0.0; k];
        let mut neg_top = vec![0.0; k];
        if let Some(cv) = &pos_cv {
            let map = label(&indicator(col, &cfg.inside, cv, TailSide::Positive))?;
            if map.n_clusters > 0 {
                let mut stats = cluster_stats(
                    &map.labels,
                    map.n_clusters,
                    col,
                    TailSide::Positive,
                    cfg.statistic,
                    Some(cv),
                    cfg.wcm_weight,
                )?;
                stats.sort_unstable_by(|a, b| b.total_cmp(a));
                for (j, v) in stats.into_iter().take(k).enumerate() {
                    pos_top[j] = v;
                }
            }
        }
        if let Some(cv) = &neg_cv {
            let map = label(&indicator(col, &cfg.inside, cv, TailSide::Negative))?;
            if map.n_clusters > 0 {
                let mut stats = cluster_stats(
                    &map.labels,
                    map.n_clusters,
                    col,
                    TailSide::Negative,
                    cfg.statistic,
                    Some(cv),
                    cfg.wcm_weight,
                )?;
                stats.sort_unstable_by(f64::total_cmp);
                for (j, v) in stats.into_iter().take(k).enumerate() {
                    neg_top[j] = v;
                }
            }
        }
        Ok((pos_top, neg_top))
    };

    let per_perm_extremes: Vec<(Vec<f64>, Vec<f64>)> = match execution {
        Execution::Parallel => {
            (0..n_perm).into_par_iter().map(per_perm).collect::<Result<Vec<_>>>()?
        }
        Execution::Sequential => (0..n_perm).map(per_perm).collect::<Result<Vec<_>>>()?,
    };

    let mut pos_dists = vec![vec![0.0; n_perm]; k];
    let mut neg_dists = vec![vec![0.0; n_perm]; k];
    for (r, (p, n)) in per_perm_extremes.into_iter().enumerate() {
        for j in 0..k {
            pos_dists[j][r] = p[j];
            neg_dists[j][r] = n[j];
        }
    }

    // Observed cluster evaluation and p-value assignment.
    let mut prob = vec![1.0f64; n_units];
    let mut pos_labels = vec![0u32; n_units];
    let mut neg_labels = vec![0u32; n_units];
    let mut pos_clusters = Vec::new();
    let mut neg_clusters = Vec::new();

    if let (Some(map), Some(cv)) = (&obs_pos, &pos_cv) {
        let stats = cluster_stats(
            &map.labels,
            map.n_clusters,
            statobs,
            TailSide::Positive,
            cfg.statistic,
            Some(cv),
            cfg.wcm_weight,
        )?;
        let (labels, entries) = evaluate_observed(map, &stats, TailSide::Positive, &pos_dists);
        for (u, &l) in labels.iter().enumerate() {
            if l > 0 {
                prob[u] = prob[u].min(entries[(l - 1) as usize].prob);
            }
        }
        pos_labels = labels;
        pos_clusters = entries;
    }
    if let (Some(map), Some(cv)) = (&obs_neg, &neg_cv) {
        let stats = cluster_stats(
            &map.labels,
            map.n_clusters,
            statobs,
            TailSide::Negative,
            cfg.statistic,
            Some(cv),
            cfg.wcm_weight,
        )?;
        let (labels, entries) = evaluate_observed(map, &stats, TailSide::Negative, &neg_dists);
        for (u, &l) in labels.iter().enumerate() {
            if l > 0 {
                prob[u] = prob[u].min(entries[(l - 1) as usize].prob);
            }
        }
        neg_labels = labels;
        neg_clusters = entries;
    }

    Ok(ClusterTestResult {
        prob,
        pos_clusters,
        neg_clusters,
        pos_labels,
        neg_labels,
        pos_distribution: pos_dists.swap_remove(0),
        neg_distribution: neg_dists.swap_remove(0),
    })
}
