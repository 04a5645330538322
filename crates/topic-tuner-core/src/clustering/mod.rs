//! Density clustering capability.
//!
//! A clusterer assigns every row either a cluster label (`>= 0`) or
//! [`NOISE_LABEL`], together with a membership probability in `[0, 1]`.
//! Noise rows always carry probability `0`.

pub mod hdbscan;

pub use hdbscan::{ClusterSelectionMethod, HdbscanClusterer, HdbscanParams};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matrix::EmbeddingMatrix;

/// Reserved label for rows not assigned to any cluster.
pub const NOISE_LABEL: i32 = -1;

/// Per-row output of a clusterer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// One label per row; [`NOISE_LABEL`] for noise.
    pub labels: Vec<i32>,
    /// One membership probability per row.
    pub probabilities: Vec<f32>,
}

impl ClusterAssignment {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no rows were assigned.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distinct non-noise labels.
    pub fn label_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|&&l| l != NOISE_LABEL)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Rows labelled as noise.
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE_LABEL).count()
    }
}

/// A clusterer that is fitted once and can then label unseen rows.
pub trait DensityClusterer: Send + Sync + fmt::Debug {
    /// Cluster `data` and remember the result.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the parameters cannot be honored for this
    /// input (too few rows, inconsistent sample counts).
    fn fit(&mut self, data: &EmbeddingMatrix) -> Result<ClusterAssignment>;

    /// Assignment produced by the last `fit`.
    ///
    /// # Errors
    ///
    /// `NotReady` before `fit`.
    fn assignment(&self) -> Result<&ClusterAssignment>;

    /// Assign unseen rows to the fitted clusters without refitting.
    ///
    /// # Errors
    ///
    /// `NotReady` before `fit`, `DimensionMismatch` on a column-count mismatch.
    fn predict(&self, data: &EmbeddingMatrix) -> Result<ClusterAssignment>;
}
