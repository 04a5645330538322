//! Trial cost function.
//!
//! Cost is the fraction of rows whose membership probability falls below the
//! threshold, plus a flat step penalty when the number of topics lies outside
//! `[min_count, max_count]`. Lower is better.

use serde::{Deserialize, Serialize};

use crate::clustering::{ClusterAssignment, NOISE_LABEL};
use crate::config::constants::scoring as defaults;
use crate::config::TunerConfig;
use crate::error::{Result, TunerError};

/// `(label_count, cost)` of one clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Distinct non-noise labels.
    pub label_count: usize,
    /// Ambiguous fraction plus any range penalty.
    pub cost: f64,
}

/// Pure scorer for clustering output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterScorer {
    /// Probabilities strictly below this count as ambiguous.
    pub prob_threshold: f64,
    /// Inclusive lower bound of the acceptable topic count.
    pub min_count: usize,
    /// Inclusive upper bound of the acceptable topic count.
    pub max_count: usize,
    /// Added once when the topic count is out of range.
    pub penalty: f64,
}

impl ClusterScorer {
    /// Scorer with the default penalty.
    pub fn new(prob_threshold: f64, min_count: usize, max_count: usize) -> Self {
        Self {
            prob_threshold,
            min_count,
            max_count,
            penalty: defaults::DEFAULT_PENALTY,
        }
    }

    /// Scorer matching a validated tuner config.
    pub fn from_config(config: &TunerConfig) -> Self {
        Self {
            prob_threshold: config.prob_threshold,
            min_count: config.min_cluster_count,
            max_count: config.max_cluster_count,
            penalty: config.penalty,
        }
    }

    /// Override the step penalty.
    #[must_use]
    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    /// Whether `label_count` needs no penalty.
    #[inline]
    pub fn in_range(&self, label_count: usize) -> bool {
        (self.min_count..=self.max_count).contains(&label_count)
    }

    /// Score raw labels and probabilities.
    ///
    /// # Errors
    ///
    /// - `EmptyInput` for zero rows
    /// - `DimensionMismatch` when the slices differ in length
    pub fn score(&self, labels: &[i32], probabilities: &[f32]) -> Result<Score> {
        if labels.is_empty() {
            return Err(TunerError::EmptyInput);
        }
        if labels.len() != probabilities.len() {
            return Err(TunerError::dimension_mismatch(
                labels.len(),
                probabilities.len(),
            ));
        }

        let mut distinct: Vec<i32> = labels.iter().copied().filter(|&l| l != NOISE_LABEL).collect();
        distinct.sort_unstable();
        distinct.dedup();
        let label_count = distinct.len();

        let ambiguous = probabilities
            .iter()
            .filter(|&&p| f64::from(p) < self.prob_threshold)
            .count();
        let mut cost = ambiguous as f64 / probabilities.len() as f64;

        if !self.in_range(label_count) {
            cost += self.penalty;
        }

        Ok(Score { label_count, cost })
    }

    /// Score a clusterer's assignment.
    pub fn score_assignment(&self, assignment: &ClusterAssignment) -> Result<Score> {
        self.score(&assignment.labels, &assignment.probabilities)
    }
}
