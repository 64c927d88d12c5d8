//! # pc-inference
//!
//! Nonparametric cluster-based permutation testing for spatially structured
//! statistic maps (volumetric voxels or surface vertices).
//!
//! This crate provides:
//! - cluster-defining threshold resolution (parametric and nonparametric)
//! - the single-configuration permutation cluster test ([`cluster_test`])
//! - the min(p) combiner across cluster-defining thresholds and
//!   connectivity criteria ([`run_minp`])
//!
//! Spatial bookkeeping (labeling, per-cluster statistics) lives in
//! `pc-cluster`; shared configuration and error types in `pc-core`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Single-configuration permutation cluster test.
pub mod clusterstat;
/// Min(p) combination across threshold/connectivity configurations.
pub mod minp;
/// Cluster-defining threshold resolution.
pub mod threshold;

pub use clusterstat::{cluster_test, cluster_test_with, ClusterEntry, ClusterTestResult};
pub use minp::{run_minp, run_minp_with, MinpResult};
pub use threshold::{quantile_sorted, resolve_thresholds, ResolvedThresholds};

/// How the permutation loop is executed.
///
/// Both modes produce bit-identical results; the selector changes
/// throughput only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Rayon work-stealing across permutation columns (the default).
    #[default]
    Parallel,
    /// Plain single-threaded iteration.
    Sequential,
}
