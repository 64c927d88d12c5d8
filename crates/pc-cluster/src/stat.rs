//! Per-cluster summary statistics.
//!
//! Given a label map and the raw statistic values it was thresholded from,
//! produce one scalar per cluster. Negative-tail summaries are encoded so
//! that "more extreme" is always "more negative", mirroring the positive
//! tail where "more extreme" is "larger".

use pc_core::{ClusterStatistic, Error, Result, TailCritVal, TailSide};

/// Evaluate the chosen statistic for every cluster in `labels`.
///
/// Returns one value per label `1..=n_clusters`, index `k - 1` holding
/// cluster `k`. `critval` is the tail's resolved critical value; it is
/// required for [`ClusterStatistic::Wcm`] (the mass baseline) and ignored
/// otherwise.
pub fn cluster_stats(
    labels: &[u32],
    n_clusters: u32,
    stat: &[f64],
    side: TailSide,
    kind: ClusterStatistic,
    critval: Option<&TailCritVal>,
    wcm_weight: f64,
) -> Result<Vec<f64>> {
    if labels.len() != stat.len() {
        return Err(Error::Validation(format!(
            "label map has {} units, statistic vector has {}",
            labels.len(),
            stat.len()
        )));
    }
    let n = n_clusters as usize;

    match kind {
        ClusterStatistic::Max => {
            let init = match side {
                TailSide::Positive => f64::NEG_INFINITY,
                TailSide::Negative => f64::INFINITY,
            };
            let mut out = vec![init; n];
            for (&l, &x) in labels.iter().zip(stat.iter()) {
                if l == 0 {
                    continue;
                }
                let slot = &mut out[(l - 1) as usize];
                *slot = match side {
                    TailSide::Positive => slot.max(x),
                    TailSide::Negative => slot.min(x),
                };
            }
            Ok(out)
        }
        ClusterStatistic::MaxSize => {
            let mut counts = vec![0usize; n];
            for &l in labels {
                if l > 0 {
                    counts[(l - 1) as usize] += 1;
                }
            }
            let sign = match side {
                TailSide::Positive => 1.0,
                TailSide::Negative => -1.0,
            };
            Ok(counts.into_iter().map(|c| sign * c as f64).collect())
        }
        ClusterStatistic::MaxSum => {
            let mut out = vec![0.0; n];
            for (&l, &x) in labels.iter().zip(stat.iter()) {
                if l > 0 {
                    out[(l - 1) as usize] += x;
                }
            }
            Ok(out)
        }
        ClusterStatistic::Wcm => {
            let cv = critval.ok_or_else(|| {
                Error::Validation(
                    "weighted cluster mass requires a resolved critical value".to_string(),
                )
            })?;
            let mut out = vec![0.0; n];
            for (i, (&l, &x)) in labels.iter().zip(stat.iter()).enumerate() {
                if l == 0 {
                    continue;
                }
                // Members exceed the tail's cutoff, so the excess is >= 0.
                let excess = match side {
                    TailSide::Positive => x - cv.value_at(i),
                    TailSide::Negative => cv.value_at(i) - x,
                };
                out[(l - 1) as usize] += excess.powf(wcm_weight);
            }
            if side == TailSide::Negative {
                for v in &mut out {
                    *v = -*v;
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 6 units, two clusters: {0, 1} and {3, 4, 5}.
    const LABELS: [u32; 6] = [1, 1, 0, 2, 2, 2];

    #[test]
    fn max_per_tail() {
        let stat = [3.0, 5.0, 0.0, 2.5, 4.0, 1.0];
        let pos = cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Positive,
            ClusterStatistic::Max,
            None,
            1.0,
        )
        .unwrap();
        assert_eq!(pos, vec![5.0, 4.0]);

        let stat = [-3.0, -5.0, 0.0, -2.5, -4.0, -1.0];
        let neg = cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Negative,
            ClusterStatistic::Max,
            None,
            1.0,
        )
        .unwrap();
        assert_eq!(neg, vec![-5.0, -4.0]);
    }

    #[test]
    fn maxsize_negated_for_negative_tail() {
        let stat = [0.0; 6];
        let pos = cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Positive,
            ClusterStatistic::MaxSize,
            None,
            1.0,
        )
        .unwrap();
        assert_eq!(pos, vec![2.0, 3.0]);
        let neg = cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Negative,
            ClusterStatistic::MaxSize,
            None,
            1.0,
        )
        .unwrap();
        assert_eq!(neg, vec![-2.0, -3.0]);
    }

    #[test]
    fn maxsum_sums_members() {
        let stat = [3.0, 4.0, 100.0, 5.0, 6.0, 7.0];
        let out = cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Positive,
            ClusterStatistic::MaxSum,
            None,
            1.0,
        )
        .unwrap();
        assert_eq!(out, vec![7.0, 18.0]);
    }

    #[test]
    fn wcm_weight_one_matches_maxsum_minus_threshold_mass() {
        let stat = [3.0, 4.0, 0.0, 5.0, 6.0, 7.0];
        let thr = TailCritVal::Scalar(2.5);
        let wcm = cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Positive,
            ClusterStatistic::Wcm,
            Some(&thr),
            1.0,
        )
        .unwrap();
        let maxsum = cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Positive,
            ClusterStatistic::MaxSum,
            None,
            1.0,
        )
        .unwrap();
        let sizes = [2.0, 3.0];
        for k in 0..2 {
            assert!((wcm[k] - (maxsum[k] - 2.5 * sizes[k])).abs() < 1e-12);
        }
    }

    #[test]
    fn wcm_negative_tail_is_negative_mass() {
        let stat = [-3.0, -4.0, 0.0, -5.0, -6.0, -7.0];
        let thr = TailCritVal::Scalar(-2.5);
        let out = cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Negative,
            ClusterStatistic::Wcm,
            Some(&thr),
            1.0,
        )
        .unwrap();
        assert!((out[0] - (-(0.5 + 1.5))).abs() < 1e-12);
        assert!((out[1] - (-(2.5 + 3.5 + 4.5))).abs() < 1e-12);
    }

    #[test]
    fn wcm_without_critval_is_an_error() {
        let stat = [0.0; 6];
        assert!(cluster_stats(
            &LABELS,
            2,
            &stat,
            TailSide::Positive,
            ClusterStatistic::Wcm,
            None,
            1.0
        )
        .is_err());
    }
}
