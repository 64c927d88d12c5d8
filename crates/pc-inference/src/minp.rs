//! Min(p) combination across cluster-defining thresholds and connectivity
//! criteria.
//!
//! Running the single-configuration test once per (alpha, connectivity)
//! pair and keeping, per unit and per permutation, the minimum p-value
//! across configurations cancels the sensitivity to any one arbitrary
//! threshold choice. The minimum is itself recalibrated against its own
//! permutation distribution, so the combination stays a valid permutation
//! test rather than a Bonferroni bound.

use pc_core::{Error, MinpJob, Result, StatMatrix, TailSide};
use serde::{Deserialize, Serialize};

use crate::clusterstat::{cluster_test_with, count_ge_sorted, count_le_sorted};
use crate::Execution;

/// Result of a min(p) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinpResult {
    /// Corrected p-value per unit, in (0, 1].
    pub prob: Vec<f64>,
    /// Per-permutation minimum rank-based null p across configurations,
    /// positive tail (all ones when the positive tail is not tested).
    pub pos_distribution_minp: Vec<f64>,
    /// Per-permutation minimum rank-based null p, negative tail.
    pub neg_distribution_minp: Vec<f64>,
    /// Per-unit minimum observed cluster p across configurations, positive tail.
    pub pos_obs_minp: Vec<f64>,
    /// Per-unit minimum observed cluster p across configurations, negative tail.
    pub neg_obs_minp: Vec<f64>,
}

/// Rank-based p-value for every entry of a null distribution.
///
/// Entry `r` gets the fraction of entries at least as extreme as itself, so
/// the most extreme entry gets `1/n` and the least extreme 1. "More
/// extreme" is larger for the positive tail, smaller for the negative.
fn distribution_to_p(distribution: &[f64], side: TailSide) -> Vec<f64> {
    let n = distribution.len();
    let mut sorted = distribution.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    distribution
        .iter()
        .map(|&d| {
            let at_least = match side {
                TailSide::Positive => count_ge_sorted(&sorted, d),
                TailSide::Negative => count_le_sorted(&sorted, d),
            };
            at_least as f64 / n as f64
        })
        .collect()
}

fn elementwise_min(acc: &mut [f64], other: &[f64]) {
    for (a, &b) in acc.iter_mut().zip(other.iter()) {
        *a = a.min(b);
    }
}

/// Calibrate observed min-p values against the null min-p distribution with
/// the add-one correction.
fn calibrate(dist_minp: &[f64], obs_minp: &[f64]) -> Vec<f64> {
    let n = dist_minp.len();
    let mut sorted = dist_minp.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    obs_minp
        .iter()
        .map(|&p| (count_le_sorted(&sorted, p) as f64 + 1.0) / (n as f64 + 1.0))
        .collect()
}

/// Run the min(p) combiner with the default (parallel) permutation loop.
pub fn run_minp(job: &MinpJob, statobs: &[f64], statrnd: &StatMatrix) -> Result<MinpResult> {
    run_minp_with(job, statobs, statrnd, Execution::default())
}

/// Run the min(p) combiner with an explicit execution mode.
///
/// Iterates the `cluster_alphas x cluster_conns` cross-product, folds each
/// configuration's rank-based null p-distribution and observed cluster
/// p-map into running element-wise minima, and calibrates the observed
/// minima against the null minima.
pub fn run_minp_with(
    job: &MinpJob,
    statobs: &[f64],
    statrnd: &StatMatrix,
    execution: Execution,
) -> Result<MinpResult> {
    let n_units = statobs.len();
    job.validate(n_units)?;
    if statrnd.n_units() != n_units {
        return Err(Error::Validation(format!(
            "observed map has {n_units} units, randomized matrix has {}",
            statrnd.n_units()
        )));
    }
    let n_perm = statrnd.n_perm();

    let mut pos_distribution_minp = vec![1.0; n_perm];
    let mut neg_distribution_minp = vec![1.0; n_perm];
    let mut pos_obs_minp = vec![1.0; n_units];
    let mut neg_obs_minp = vec![1.0; n_units];

    // Each configuration is an independent partial result folded into the
    // running minima; completion order cannot matter.
    for &alpha in &job.cluster_alphas {
        for &conn in &job.cluster_conns {
            let cfg = job.single_config(alpha, conn);
            let res = cluster_test_with(&cfg, statobs, statrnd, execution)?;

            if job.tail.needs_pos() {
                let null_p = distribution_to_p(&res.pos_distribution, TailSide::Positive);
                elementwise_min(&mut pos_distribution_minp, &null_p);
                elementwise_min(&mut pos_obs_minp, &res.tail_prob(TailSide::Positive));
            }
            if job.tail.needs_neg() {
                let null_p = distribution_to_p(&res.neg_distribution, TailSide::Negative);
                elementwise_min(&mut neg_distribution_minp, &null_p);
                elementwise_min(&mut neg_obs_minp, &res.tail_prob(TailSide::Negative));
            }
        }
    }

    let mut prob = vec![1.0; n_units];
    if job.tail.needs_pos() {
        let corrected = calibrate(&pos_distribution_minp, &pos_obs_minp);
        elementwise_min(&mut prob, &corrected);
    }
    if job.tail.needs_neg() {
        let corrected = calibrate(&neg_distribution_minp, &neg_obs_minp);
        elementwise_min(&mut prob, &corrected);
    }

    Ok(MinpResult {
        prob,
        pos_distribution_minp,
        neg_distribution_minp,
        pos_obs_minp,
        neg_obs_minp,
    })
}
