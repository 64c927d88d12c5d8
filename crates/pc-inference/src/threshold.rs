//! Cluster-defining threshold resolution.
//!
//! Each test configuration needs a positive-tail and a negative-tail
//! critical value (scalar or per-unit) before any thresholding can happen.
//! They come from a caller-supplied parametric value, or from empirical
//! quantiles of the randomized statistic matrix.

use pc_core::{CritVal, Error, Result, StatMatrix, Tail, TailCritVal, ThresholdRule};

/// Per-tail critical values produced by [`resolve_thresholds`].
///
/// `None` for a tail means no cluster-defining threshold exists for it,
/// which only happens under [`ThresholdRule::None`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedThresholds {
    /// Positive-tail critical value (`x >= cv` marks a unit active).
    pub pos: Option<TailCritVal>,
    /// Negative-tail critical value (`x <= cv` marks a unit active).
    pub neg: Option<TailCritVal>,
}

/// Quantile for sorted data via linear interpolation.
///
/// - `q = 0` returns the minimum, `q = 1` the maximum
/// - empty input returns `NaN`
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let t = pos - lo as f64;
    (1.0 - t) * sorted[lo] + t * sorted[hi]
}

/// Widening epsilon for a degenerate (zero-width) value range.
#[inline]
fn range_eps(value: f64) -> f64 {
    f64::EPSILON.sqrt() * (1.0 + value.abs())
}

fn sort_unstable_f64(v: &mut [f64]) {
    v.sort_unstable_by(f64::total_cmp);
}

/// The per-tail quantile level for one cluster alpha.
///
/// Two-sided tests split the alpha across tails.
fn tail_alpha(alpha: f64, tail: Tail) -> f64 {
    match tail {
        Tail::Both => alpha / 2.0,
        Tail::Positive | Tail::Negative => alpha,
    }
}

fn check_per_unit_len(name: &str, len: usize, n_units: usize) -> Result<()> {
    if len != n_units {
        return Err(Error::Validation(format!(
            "{name} critical values have {len} entries for {n_units} units"
        )));
    }
    Ok(())
}

fn parametric(critval: &CritVal, n_units: usize) -> Result<ResolvedThresholds> {
    // A single value or column describes symmetric tails.
    let (neg, pos) = match critval {
        CritVal::Scalar(v) => (TailCritVal::Scalar(-v), TailCritVal::Scalar(*v)),
        CritVal::PerTail { neg, pos } => (TailCritVal::Scalar(*neg), TailCritVal::Scalar(*pos)),
        CritVal::PerUnit(v) => {
            check_per_unit_len("per-unit", v.len(), n_units)?;
            (
                TailCritVal::PerUnit(v.iter().map(|x| -x).collect()),
                TailCritVal::PerUnit(v.clone()),
            )
        }
        CritVal::PerUnitPerTail { neg, pos } => {
            check_per_unit_len("negative-tail", neg.len(), n_units)?;
            check_per_unit_len("positive-tail", pos.len(), n_units)?;
            (TailCritVal::PerUnit(neg.clone()), TailCritVal::PerUnit(pos.clone()))
        }
    };
    Ok(ResolvedThresholds { pos: Some(pos), neg: Some(neg) })
}

fn nonparametric_individual(
    alpha: f64,
    tail: Tail,
    statrnd: &StatMatrix,
    inside: &[bool],
) -> ResolvedThresholds {
    let a = tail_alpha(alpha, tail);
    let n_units = statrnd.n_units();
    let n_perm = statrnd.n_perm();

    let mut pos = vec![0.0; n_units];
    let mut neg = vec![0.0; n_units];
    let mut n_degenerate = 0usize;
    let mut row = vec![0.0; n_perm];

    for u in 0..n_units {
        if !inside[u] {
            // Masked units never threshold; park their cutoffs at infinity
            // so no value can cross them.
            pos[u] = f64::INFINITY;
            neg[u] = f64::NEG_INFINITY;
            continue;
        }
        for r in 0..n_perm {
            row[r] = statrnd.value(u, r);
        }
        sort_unstable_f64(&mut row);
        if row[0] == row[n_perm - 1] {
            // Zero-width range: widen to an open interval around the
            // constant so thresholding stays conservative.
            let eps = range_eps(row[0]);
            pos[u] = row[0] + eps;
            neg[u] = row[0] - eps;
            n_degenerate += 1;
            continue;
        }
        pos[u] = quantile_sorted(&row, 1.0 - a);
        neg[u] = quantile_sorted(&row, a);
    }

    if n_degenerate > 0 {
        log::warn!(
            "nonparametric threshold: {n_degenerate} unit(s) with zero-range randomization values; widened to an open interval"
        );
    }

    ResolvedThresholds {
        pos: Some(TailCritVal::PerUnit(pos)),
        neg: Some(TailCritVal::PerUnit(neg)),
    }
}

fn nonparametric_common(
    alpha: f64,
    tail: Tail,
    statrnd: &StatMatrix,
    inside: &[bool],
) -> Result<ResolvedThresholds> {
    let a = tail_alpha(alpha, tail);
    let n_units = statrnd.n_units();

    let mut pooled = Vec::with_capacity(inside.iter().filter(|&&b| b).count() * statrnd.n_perm());
    for r in 0..statrnd.n_perm() {
        let col = statrnd.column(r);
        for u in 0..n_units {
            if inside[u] {
                pooled.push(col[u]);
            }
        }
    }
    if pooled.is_empty() {
        return Err(Error::Validation(
            "nonparametric common threshold: no inside units to pool".to_string(),
        ));
    }
    sort_unstable_f64(&mut pooled);

    let (lo, hi) = (pooled[0], pooled[pooled.len() - 1]);
    if lo == hi {
        let eps = range_eps(lo);
        log::warn!(
            "nonparametric threshold: pooled randomization values have zero range; widened to an open interval"
        );
        return Ok(ResolvedThresholds {
            pos: Some(TailCritVal::Scalar(lo + eps)),
            neg: Some(TailCritVal::Scalar(lo - eps)),
        });
    }

    Ok(ResolvedThresholds {
        pos: Some(TailCritVal::Scalar(quantile_sorted(&pooled, 1.0 - a))),
        neg: Some(TailCritVal::Scalar(quantile_sorted(&pooled, a))),
    })
}

/// Resolve per-tail critical values for one configuration.
///
/// `alpha` is the configuration's cluster-defining threshold, used by the
/// nonparametric rules (parametric values are taken as supplied). The alpha
/// must already be validated to lie in (0, 1) for nonparametric rules.
pub fn resolve_thresholds(
    rule: &ThresholdRule,
    alpha: f64,
    tail: Tail,
    statrnd: &StatMatrix,
    inside: &[bool],
) -> Result<ResolvedThresholds> {
    if inside.len() != statrnd.n_units() {
        return Err(Error::Validation(format!(
            "inside mask has {} entries for {} units",
            inside.len(),
            statrnd.n_units()
        )));
    }
    match rule {
        ThresholdRule::Parametric(cv) => parametric(cv, statrnd.n_units()),
        ThresholdRule::NonparametricIndividual => {
            Ok(nonparametric_individual(alpha, tail, statrnd, inside))
        }
        ThresholdRule::NonparametricCommon => nonparametric_common(alpha, tail, statrnd, inside),
        ThresholdRule::None => Ok(ResolvedThresholds { pos: None, neg: None }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rnd_matrix(columns: &[Vec<f64>]) -> StatMatrix {
        StatMatrix::from_columns(columns).unwrap()
    }

    #[test]
    fn quantile_endpoints_and_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&v, 0.0), 1.0);
        assert_eq!(quantile_sorted(&v, 1.0), 4.0);
        assert!((quantile_sorted(&v, 0.5) - 2.5).abs() < 1e-12);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn parametric_scalar_is_symmetric() {
        let rnd = rnd_matrix(&[vec![0.0; 3]]);
        let t = resolve_thresholds(
            &ThresholdRule::Parametric(CritVal::Scalar(2.0)),
            0.05,
            Tail::Both,
            &rnd,
            &[true; 3],
        )
        .unwrap();
        assert_eq!(t.pos, Some(TailCritVal::Scalar(2.0)));
        assert_eq!(t.neg, Some(TailCritVal::Scalar(-2.0)));
    }

    #[test]
    fn parametric_per_unit_len_checked() {
        let rnd = rnd_matrix(&[vec![0.0; 3]]);
        let bad = resolve_thresholds(
            &ThresholdRule::Parametric(CritVal::PerUnit(vec![1.0, 2.0])),
            0.05,
            Tail::Positive,
            &rnd,
            &[true; 3],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn common_quantiles_bound_the_pool() {
        // 2 units x 5 permutations, pooled values 1..=10.
        let cols: Vec<Vec<f64>> =
            (0..5).map(|r| vec![(2 * r + 1) as f64, (2 * r + 2) as f64]).collect();
        let rnd = rnd_matrix(&cols);
        let t = resolve_thresholds(
            &ThresholdRule::NonparametricCommon,
            0.2,
            Tail::Positive,
            &rnd,
            &[true; 2],
        )
        .unwrap();
        let (Some(TailCritVal::Scalar(pos)), Some(TailCritVal::Scalar(neg))) = (t.pos, t.neg)
        else {
            panic!("expected scalar thresholds");
        };
        // 80th/20th percentile of 1..=10 under linear interpolation.
        assert!((pos - 8.2).abs() < 1e-12);
        assert!((neg - 2.8).abs() < 1e-12);
    }

    #[test]
    fn individual_thresholds_are_per_unit() {
        // Unit 0 has small values, unit 1 large ones.
        let cols: Vec<Vec<f64>> = (0..4).map(|r| vec![r as f64, 100.0 + r as f64]).collect();
        let rnd = rnd_matrix(&cols);
        let t = resolve_thresholds(
            &ThresholdRule::NonparametricIndividual,
            0.5,
            Tail::Positive,
            &rnd,
            &[true; 2],
        )
        .unwrap();
        let Some(TailCritVal::PerUnit(pos)) = t.pos else {
            panic!("expected per-unit thresholds");
        };
        assert!(pos[0] < 4.0);
        assert!(pos[1] > 100.0);
    }

    #[test]
    fn masked_units_get_unreachable_cutoffs() {
        let cols: Vec<Vec<f64>> = (0..3).map(|r| vec![r as f64, r as f64]).collect();
        let rnd = rnd_matrix(&cols);
        let t = resolve_thresholds(
            &ThresholdRule::NonparametricIndividual,
            0.1,
            Tail::Both,
            &rnd,
            &[true, false],
        )
        .unwrap();
        let Some(TailCritVal::PerUnit(pos)) = t.pos else { panic!() };
        let Some(TailCritVal::PerUnit(neg)) = t.neg else { panic!() };
        assert_eq!(pos[1], f64::INFINITY);
        assert_eq!(neg[1], f64::NEG_INFINITY);
    }

    #[test]
    fn zero_range_pool_widens_to_open_interval() {
        let rnd = rnd_matrix(&[vec![5.0; 4], vec![5.0; 4]]);
        let t = resolve_thresholds(
            &ThresholdRule::NonparametricCommon,
            0.05,
            Tail::Positive,
            &rnd,
            &[true; 4],
        )
        .unwrap();
        let (Some(TailCritVal::Scalar(pos)), Some(TailCritVal::Scalar(neg))) = (t.pos, t.neg)
        else {
            panic!("expected scalar thresholds");
        };
        assert!(pos > 5.0);
        assert!(neg < 5.0);
    }

    #[test]
    fn none_rule_leaves_thresholds_empty() {
        let rnd = rnd_matrix(&[vec![0.0; 2]]);
        let t =
            resolve_thresholds(&ThresholdRule::None, 0.05, Tail::Both, &rnd, &[true; 2]).unwrap();
        assert!(t.pos.is_none());
        assert!(t.neg.is_none());
    }
}
