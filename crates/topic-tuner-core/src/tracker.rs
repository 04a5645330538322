//! Best-model bookkeeping for one search.

use crate::clustering::{ClusterAssignment, DensityClusterer};
use crate::error::{Result, TunerError};
use crate::reduction::DimensionReducer;
use crate::space::ParamSet;

/// Outcome of one fully evaluated trial, including the fitted models.
#[derive(Debug)]
pub struct TrialResult {
    /// Parameters the trial ran with.
    pub params: ParamSet,
    /// Distinct non-noise labels.
    pub label_count: usize,
    /// Scored cost.
    pub cost: f64,
    /// Reducer fitted on the full embedding matrix.
    pub reducer: Box<dyn DimensionReducer>,
    /// Clusterer fitted on the reduced matrix.
    pub clusterer: Box<dyn DensityClusterer>,
}

impl TrialResult {
    /// Labels and probabilities of the fitted clusterer.
    pub fn assignment(&self) -> Result<&ClusterAssignment> {
        self.clusterer.assignment()
    }
}

/// Keeps the lowest-cost trial seen so far.
///
/// A trial replaces the current best only when its cost is strictly lower,
/// so the earliest trial wins ties.
#[derive(Debug, Default)]
pub struct BestModelTracker {
    best: Option<TrialResult>,
    considered: usize,
}

impl BestModelTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a trial; returns `true` if it became the new best.
    pub fn consider(&mut self, trial: TrialResult) -> bool {
        self.considered += 1;

        let improved = match &self.best {
            None => true,
            Some(best) => trial.cost < best.cost,
        };
        if improved {
            tracing::debug!(
                cost = trial.cost,
                label_count = trial.label_count,
                params = %trial.params,
                "New best trial"
            );
            self.best = Some(trial);
        }
        improved
    }

    /// Current best, or `None` while unset.
    pub fn current(&self) -> Option<&TrialResult> {
        self.best.as_ref()
    }

    /// Current best.
    ///
    /// # Errors
    ///
    /// `NotReady` while no trial has been considered.
    pub fn best(&self) -> Result<&TrialResult> {
        self.best
            .as_ref()
            .ok_or_else(|| TunerError::not_ready("no trial has completed yet"))
    }

    /// Take ownership of the best trial, leaving the tracker unset.
    pub fn take(&mut self) -> Option<TrialResult> {
        self.best.take()
    }

    /// Trials offered since construction or the last reset.
    pub fn considered(&self) -> usize {
        self.considered
    }

    /// Whether a best trial exists.
    pub fn is_set(&self) -> bool {
        self.best.is_some()
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.best = None;
        self.considered = 0;
    }
}
