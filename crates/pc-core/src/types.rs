//! Common data types for permclust

use serde::{Deserialize, Serialize};

use crate::adjacency::Adjacency;
use crate::{Error, Result};

/// Which direction of effect is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tail {
    /// Negative tail only (`tail = -1`).
    Negative,
    /// Two-sided (`tail = 0`).
    Both,
    /// Positive tail only (`tail = 1`).
    Positive,
}

impl Tail {
    /// Whether the positive tail must be evaluated.
    pub fn needs_pos(self) -> bool {
        matches!(self, Tail::Positive | Tail::Both)
    }

    /// Whether the negative tail must be evaluated.
    pub fn needs_neg(self) -> bool {
        matches!(self, Tail::Negative | Tail::Both)
    }
}

impl TryFrom<i8> for Tail {
    type Error = Error;

    fn try_from(v: i8) -> Result<Self> {
        match v {
            -1 => Ok(Tail::Negative),
            0 => Ok(Tail::Both),
            1 => Ok(Tail::Positive),
            _ => Err(Error::Validation(format!("tail must be -1, 0 or 1, got {v}"))),
        }
    }
}

impl From<Tail> for i8 {
    fn from(t: Tail) -> i8 {
        match t {
            Tail::Negative => -1,
            Tail::Both => 0,
            Tail::Positive => 1,
        }
    }
}

/// One side of a two-tailed comparison. Internal dispatch type for the
/// labeler/evaluator; `Tail` is the caller-facing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailSide {
    /// Values exceeding the positive critical value.
    Positive,
    /// Values below the negative critical value.
    Negative,
}

/// Scalar summary computed per cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatistic {
    /// Most extreme member value (max for the positive tail, min for the negative).
    Max,
    /// Cluster cardinality (negated for the negative tail).
    MaxSize,
    /// Sum of member values.
    #[default]
    MaxSum,
    /// Weighted cluster mass: sum of threshold excesses raised to a weight.
    Wcm,
}

impl TryFrom<&str> for ClusterStatistic {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self> {
        match name {
            "max" => Ok(ClusterStatistic::Max),
            "maxsize" => Ok(ClusterStatistic::MaxSize),
            "maxsum" => Ok(ClusterStatistic::MaxSum),
            "wcm" => Ok(ClusterStatistic::Wcm),
            other => Err(Error::Validation(format!("unknown cluster statistic '{other}'"))),
        }
    }
}

/// Caller-supplied critical value(s) for parametric thresholding.
///
/// A single value or column is assumed to describe symmetric tails; the
/// negative-tail critical value is then its negation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritVal {
    /// One scalar shared by both tails (negated for the negative tail).
    Scalar(f64),
    /// Asymmetric per-tail scalars.
    PerTail {
        /// Negative-tail critical value.
        neg: f64,
        /// Positive-tail critical value.
        pos: f64,
    },
    /// One value per unit, shared by both tails (negated for the negative tail).
    PerUnit(Vec<f64>),
    /// Asymmetric per-unit columns.
    PerUnitPerTail {
        /// Negative-tail critical values, one per unit.
        neg: Vec<f64>,
        /// Positive-tail critical values, one per unit.
        pos: Vec<f64>,
    },
}

/// How the cluster-defining threshold is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method", content = "critval")]
pub enum ThresholdRule {
    /// Caller-supplied parametric critical value(s).
    Parametric(CritVal),
    /// Per-unit empirical quantile of that unit's own randomized values.
    NonparametricIndividual,
    /// Single pooled empirical quantile over all units and permutations.
    NonparametricCommon,
    /// No critical values. Only meaningful for threshold-free statistics,
    /// none of which are cluster statistics; rejected by the cluster test.
    None,
}

/// A resolved critical value for one tail: scalar or per-unit.
#[derive(Debug, Clone, PartialEq)]
pub enum TailCritVal {
    /// Same cutoff for every unit.
    Scalar(f64),
    /// Unit-specific cutoffs, indexed like the statistic vector.
    PerUnit(Vec<f64>),
}

impl TailCritVal {
    /// Critical value applying to unit `i`.
    #[inline]
    pub fn value_at(&self, i: usize) -> f64 {
        match self {
            TailCritVal::Scalar(v) => *v,
            TailCritVal::PerUnit(v) => v[i],
        }
    }
}

/// Column-major `units x permutations` matrix of randomized statistic maps.
///
/// Column `r` is the full statistic map produced by permutation `r`, stored
/// contiguously so the permutation loop can borrow it as a slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatMatrix {
    n_units: usize,
    n_perm: usize,
    data: Vec<f64>,
}

impl StatMatrix {
    /// Build from column-major data; `data.len()` must equal `n_units * n_perm`.
    pub fn new(n_units: usize, n_perm: usize, data: Vec<f64>) -> Result<Self> {
        if n_units == 0 || n_perm == 0 {
            return Err(Error::Validation(format!(
                "statistic matrix must be non-empty: n_units={n_units} n_perm={n_perm}"
            )));
        }
        if data.len() != n_units * n_perm {
            return Err(Error::Validation(format!(
                "statistic matrix shape mismatch: {} values for {} units x {} permutations",
                data.len(),
                n_units,
                n_perm
            )));
        }
        Ok(Self { n_units, n_perm, data })
    }

    /// Build from per-permutation columns, each of the same length.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self> {
        let n_perm = columns.len();
        let n_units = columns.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_units * n_perm);
        for (r, col) in columns.iter().enumerate() {
            if col.len() != n_units {
                return Err(Error::Validation(format!(
                    "permutation column {r} has {} units, expected {n_units}",
                    col.len()
                )));
            }
            data.extend_from_slice(col);
        }
        Self::new(n_units, n_perm, data)
    }

    /// Number of spatial units (rows).
    #[inline]
    pub fn n_units(&self) -> usize {
        self.n_units
    }

    /// Number of permutations (columns).
    #[inline]
    pub fn n_perm(&self) -> usize {
        self.n_perm
    }

    /// The statistic map from permutation `r`.
    #[inline]
    pub fn column(&self, r: usize) -> &[f64] {
        &self.data[r * self.n_units..(r + 1) * self.n_units]
    }

    /// Value of unit `u` under permutation `r`.
    #[inline]
    pub fn value(&self, u: usize, r: usize) -> f64 {
        self.data[r * self.n_units + u]
    }
}

fn default_wcm_weight() -> f64 {
    1.0
}

fn default_num_ordered() -> usize {
    1
}

/// Whether `conn` is a supported grid connectivity for `ndim` axes.
fn valid_grid_conn(ndim: usize, conn: u32) -> bool {
    matches!((ndim, conn), (2, 4) | (2, 8) | (3, 6) | (3, 18) | (3, 26))
}

fn check_spatial_layout(
    dim: &[usize],
    inside: &[bool],
    connectivity: Option<&Adjacency>,
    n_units: usize,
) -> Result<()> {
    if dim.is_empty() {
        return Err(Error::Validation("missing dim: spatial axis sizes are required".to_string()));
    }
    if dim.len() != 2 && dim.len() != 3 {
        return Err(Error::Validation(format!(
            "dim must have 2 or 3 axes, got {}",
            dim.len()
        )));
    }
    if inside.len() != n_units {
        return Err(Error::Validation(format!(
            "inside mask has {} entries for {} units",
            inside.len(),
            n_units
        )));
    }
    match connectivity {
        Some(adj) => {
            adj.validate()?;
            if adj.n_nodes() != n_units {
                return Err(Error::Validation(format!(
                    "adjacency covers {} nodes for {} units",
                    adj.n_nodes(),
                    n_units
                )));
            }
        }
        None => {
            let total: usize = dim.iter().product();
            if total != n_units {
                return Err(Error::Validation(format!(
                    "dim {:?} describes {total} grid cells for {n_units} units",
                    dim
                )));
            }
        }
    }
    Ok(())
}

/// Immutable description of a single min(p) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinpJob {
    /// Spatial axis sizes (2 or 3 entries), axis 0 fastest in the flat ordering.
    pub dim: Vec<usize>,
    /// Mask of valid units; `false` units never enter thresholding or clustering.
    pub inside: Vec<bool>,
    /// Tested effect direction.
    pub tail: Tail,
    /// Cluster-defining thresholds to try, in order.
    pub cluster_alphas: Vec<f64>,
    /// Connectivity criteria to try, in order (4/8 for 2D, 6/18/26 for 3D).
    pub cluster_conns: Vec<u32>,
    /// Explicit sparse adjacency for non-grid topologies (e.g. surface meshes).
    /// When present, `cluster_conns` entries do not alter the neighbor relation.
    #[serde(default)]
    pub connectivity: Option<Adjacency>,
    /// Per-cluster summary statistic.
    #[serde(default)]
    pub statistic: ClusterStatistic,
    /// How the cluster-defining threshold is derived from each alpha.
    pub threshold: ThresholdRule,
    /// Exponent for the weighted-cluster-mass statistic.
    #[serde(default = "default_wcm_weight")]
    pub wcm_weight: f64,
}

impl MinpJob {
    /// Validate the job against a statistic vector of `n_units` entries.
    pub fn validate(&self, n_units: usize) -> Result<()> {
        check_spatial_layout(&self.dim, &self.inside, self.connectivity.as_ref(), n_units)?;
        if self.cluster_alphas.is_empty() {
            return Err(Error::Validation("cluster_alphas must not be empty".to_string()));
        }
        if self.cluster_conns.is_empty() {
            return Err(Error::Validation("cluster_conns must not be empty".to_string()));
        }
        for &a in &self.cluster_alphas {
            if !(a > 0.0 && a < 1.0) {
                return Err(Error::Validation(format!(
                    "cluster alpha must lie in (0, 1), got {a}"
                )));
            }
        }
        if self.connectivity.is_none() {
            for &c in &self.cluster_conns {
                if !valid_grid_conn(self.dim.len(), c) {
                    return Err(Error::Validation(format!(
                        "connectivity {c} is not supported for {}D grids",
                        self.dim.len()
                    )));
                }
            }
        }
        if !(self.wcm_weight.is_finite() && self.wcm_weight > 0.0) {
            return Err(Error::Validation(format!(
                "wcm weight must be finite and positive, got {}",
                self.wcm_weight
            )));
        }
        Ok(())
    }

    /// The single-configuration test for one (alpha, connectivity) pair.
    pub fn single_config(&self, cluster_alpha: f64, conn: u32) -> ClusterTestConfig {
        ClusterTestConfig {
            dim: self.dim.clone(),
            inside: self.inside.clone(),
            tail: self.tail,
            cluster_tail: None,
            cluster_alpha,
            conn,
            connectivity: self.connectivity.clone(),
            statistic: self.statistic,
            threshold: self.threshold.clone(),
            wcm_weight: self.wcm_weight,
            num_ordered_stats: 1,
        }
    }
}

/// Configuration of one single-configuration cluster test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterTestConfig {
    /// Spatial axis sizes (2 or 3 entries), axis 0 fastest in the flat ordering.
    pub dim: Vec<usize>,
    /// Mask of valid units.
    pub inside: Vec<bool>,
    /// Tested effect direction.
    pub tail: Tail,
    /// Redundant tail parameter; must agree with `tail` when set.
    #[serde(default)]
    pub cluster_tail: Option<Tail>,
    /// Cluster-defining threshold alpha (used by the nonparametric rules).
    pub cluster_alpha: f64,
    /// Grid connectivity criterion.
    pub conn: u32,
    /// Explicit sparse adjacency for non-grid topologies.
    #[serde(default)]
    pub connectivity: Option<Adjacency>,
    /// Per-cluster summary statistic.
    #[serde(default)]
    pub statistic: ClusterStatistic,
    /// How the cluster-defining threshold is derived.
    pub threshold: ThresholdRule,
    /// Exponent for the weighted-cluster-mass statistic.
    #[serde(default = "default_wcm_weight")]
    pub wcm_weight: f64,
    /// Number of ordered cluster statistics retained per permutation.
    /// 1 (the default) keeps only the most extreme cluster.
    #[serde(default = "default_num_ordered")]
    pub num_ordered_stats: usize,
}

impl ClusterTestConfig {
    /// Validate the configuration against a statistic vector of `n_units` entries.
    pub fn validate(&self, n_units: usize) -> Result<()> {
        check_spatial_layout(&self.dim, &self.inside, self.connectivity.as_ref(), n_units)?;
        if let Some(ct) = self.cluster_tail {
            if ct != self.tail {
                return Err(Error::Validation(format!(
                    "cluster_tail ({:?}) disagrees with tail ({:?})",
                    ct, self.tail
                )));
            }
        }
        if self.connectivity.is_none() && !valid_grid_conn(self.dim.len(), self.conn) {
            return Err(Error::Validation(format!(
                "connectivity {} is not supported for {}D grids",
                self.conn,
                self.dim.len()
            )));
        }
        match self.threshold {
            ThresholdRule::NonparametricIndividual | ThresholdRule::NonparametricCommon => {
                if !(self.cluster_alpha > 0.0 && self.cluster_alpha < 1.0) {
                    return Err(Error::Validation(format!(
                        "nonparametric thresholding needs a cluster alpha in (0, 1), got {}",
                        self.cluster_alpha
                    )));
                }
            }
            ThresholdRule::Parametric(_) | ThresholdRule::None => {}
        }
        if !(self.wcm_weight.is_finite() && self.wcm_weight > 0.0) {
            return Err(Error::Validation(format!(
                "wcm weight must be finite and positive, got {}",
                self.wcm_weight
            )));
        }
        if self.num_ordered_stats == 0 {
            return Err(Error::Validation(
                "num_ordered_stats must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
