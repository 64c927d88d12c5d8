//! # pc-core
//!
//! Core types for permclust: the shared error type, job configuration for
//! cluster-based permutation tests, the randomized-statistic matrix, and
//! sparse boolean adjacency for non-grid topologies.
//!
//! This crate holds no algorithms. Labeling lives in `pc-cluster`, the
//! permutation tests in `pc-inference`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adjacency;
pub mod error;
pub mod types;

pub use adjacency::Adjacency;
pub use error::{Error, Result};
pub use types::{
    ClusterStatistic, ClusterTestConfig, CritVal, MinpJob, StatMatrix, Tail, TailCritVal,
    TailSide, ThresholdRule,
};
