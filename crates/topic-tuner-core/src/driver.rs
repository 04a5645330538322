//! Sequential search loop.
//!
//! # State machine
//!
//! ```text
//! Idle ──run()──▶ Running ──budget exhausted──▶ Done
//!                    │                            │
//!                    └──cancel / error──▶ Done    └──run()──▶ Running (fresh history)
//! ```
//!
//! Every `run` is an independent search: trial history, the best-model
//! tracker and the optimizer are reset before the first trial. Trials run
//! strictly one after another because each suggestion depends on every
//! earlier outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clustering::ClusterAssignment;
use crate::config::constants::scoring::FAILED_TRIAL_COST;
use crate::error::{Result, TunerError};
use crate::evaluator::PipelineEvaluator;
use crate::matrix::EmbeddingMatrix;
use crate::optimizer::{Observation, SequentialOptimizer};
use crate::scoring::ClusterScorer;
use crate::space::{ParamSet, SearchSpace};
use crate::tracker::{BestModelTracker, TrialResult};

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    /// No search has started.
    Idle,
    /// A search is in progress.
    Running,
    /// The last search finished, failed or was cancelled.
    Done,
}

/// How a trial ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialStatus {
    /// Fitted and scored.
    Completed,
    /// A stage rejected the parameters; the trial was charged the failure cost.
    Rejected {
        /// Error message from the rejecting stage.
        reason: String,
    },
}

/// One row of trial history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Zero-based trial number within the search.
    pub index: usize,
    /// Parameters suggested by the optimizer.
    pub params: ParamSet,
    /// Cost reported to the optimizer.
    pub cost: f64,
    /// Topic count, absent for rejected trials.
    pub label_count: Option<usize>,
    /// Outcome.
    pub status: TrialStatus,
    /// Whether this trial became the best so far.
    pub improved: bool,
}

impl TrialRecord {
    /// The `(params, cost)` pair fed back to the optimizer.
    pub fn observation(&self) -> Observation {
        Observation {
            params: self.params,
            cost: self.cost,
        }
    }
}

/// Cooperative cancellation flag, checked between trials only.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the running search stops before its next trial.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Borrowed collaborators for one search.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    /// Parameter ranges and shared seed.
    pub space: &'a SearchSpace,
    /// Input matrix, read-only.
    pub embeddings: &'a EmbeddingMatrix,
    /// Runs a single trial.
    pub evaluator: &'a PipelineEvaluator,
    /// Turns clustering output into a cost.
    pub scorer: &'a ClusterScorer,
    /// Trial budget.
    pub max_evals: usize,
}

/// Runs a fixed budget of trials and tracks the best one.
#[derive(Debug)]
pub struct SearchDriver {
    state: DriverState,
    history: Vec<TrialRecord>,
    tracker: BestModelTracker,
    cancel: CancellationToken,
}

impl Default for SearchDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchDriver {
    /// Idle driver with its own cancellation token.
    pub fn new() -> Self {
        Self {
            state: DriverState::Idle,
            history: Vec::new(),
            tracker: BestModelTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this driver's searches.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Trials of the most recent search, in order.
    pub fn history(&self) -> &[TrialRecord] {
        &self.history
    }

    /// Best-model tracker of the most recent search.
    pub fn tracker(&self) -> &BestModelTracker {
        &self.tracker
    }

    /// Take the best trial out of the tracker.
    pub fn take_best(&mut self) -> Option<TrialResult> {
        self.tracker.take()
    }

    /// Forget the previous search and return to `Idle`.
    pub fn reset(&mut self) {
        self.state = DriverState::Idle;
        self.history.clear();
        self.tracker.reset();
    }

    /// Run exactly `ctx.max_evals` trials and return the best parameters.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` for a zero budget, an invalid space, or when
    ///   every trial was rejected
    /// - `OptimizerFailure` when the optimizer fails; the search aborts and
    ///   the tracker is cleared
    /// - `Cancelled` when the token is set between trials; the tracker keeps
    ///   the best trial completed so far. The token stays set until the caller
    ///   resets it, so later runs fail the same way.
    pub fn run(
        &mut self,
        ctx: SearchContext<'_>,
        optimizer: &mut dyn SequentialOptimizer,
    ) -> Result<ParamSet> {
        if ctx.max_evals == 0 {
            return Err(TunerError::invalid_configuration(
                "max_evals must be greater than 0",
            ));
        }
        ctx.space.validate()?;

        self.reset();
        optimizer.reset();
        self.state = DriverState::Running;

        tracing::info!(
            max_evals = ctx.max_evals,
            rows = ctx.embeddings.n_rows(),
            dimension = ctx.embeddings.n_cols(),
            optimizer = optimizer.name(),
            random_state = ctx.space.random_state,
            "Search started"
        );

        let outcome = self.run_trials(ctx, optimizer);
        self.state = DriverState::Done;
        if let Err(e) = outcome {
            // Only a cancelled search keeps its best trial.
            if !matches!(e, TunerError::Cancelled { .. }) {
                self.tracker.reset();
            }
            return Err(e);
        }

        let best = self.tracker.best().map_err(|_| {
            let reason = self
                .history
                .iter()
                .rev()
                .find_map(|r| match &r.status {
                    TrialStatus::Rejected { reason } => Some(reason.clone()),
                    TrialStatus::Completed => None,
                })
                .unwrap_or_default();
            TunerError::invalid_configuration(format!(
                "all {} trials were rejected; last reason: {reason}",
                self.history.len()
            ))
        })?;

        tracing::info!(
            trials = self.history.len(),
            rejected = self.history.iter().filter(|r| r.label_count.is_none()).count(),
            best_cost = best.cost,
            label_count = best.label_count,
            params = %best.params,
            "Search finished"
        );

        Ok(best.params)
    }

    fn run_trials(
        &mut self,
        ctx: SearchContext<'_>,
        optimizer: &mut dyn SequentialOptimizer,
    ) -> Result<()> {
        let mut observations: Vec<Observation> = Vec::with_capacity(ctx.max_evals);

        for index in 0..ctx.max_evals {
            if self.cancel.is_cancelled() {
                tracing::warn!(completed_trials = index, "Search cancelled");
                return Err(TunerError::Cancelled {
                    completed_trials: index,
                });
            }

            let params = optimizer
                .suggest(ctx.space, &observations)
                .map_err(into_optimizer_failure)?;

            let record = match ctx.evaluator.evaluate(&params, ctx.embeddings) {
                Ok(evaluation) => {
                    let score = ctx.scorer.score_assignment(&evaluation.assignment)?;
                    warn_if_degenerate(index, &params, &evaluation.assignment);
                    let improved = self.tracker.consider(TrialResult {
                        params,
                        label_count: score.label_count,
                        cost: score.cost,
                        reducer: evaluation.reducer,
                        clusterer: evaluation.clusterer,
                    });
                    TrialRecord {
                        index,
                        params,
                        cost: score.cost,
                        label_count: Some(score.label_count),
                        status: TrialStatus::Completed,
                        improved,
                    }
                }
                Err(e) if e.is_trial_recoverable() => {
                    tracing::warn!(trial = index, %params, error = %e, "Trial rejected");
                    TrialRecord {
                        index,
                        params,
                        cost: FAILED_TRIAL_COST,
                        label_count: None,
                        status: TrialStatus::Rejected {
                            reason: e.to_string(),
                        },
                        improved: false,
                    }
                }
                Err(e) => return Err(e),
            };

            let observation = record.observation();
            optimizer
                .report(&observation)
                .map_err(into_optimizer_failure)?;
            observations.push(observation);

            if record.improved {
                tracing::info!(
                    trial = index,
                    cost = record.cost,
                    label_count = ?record.label_count,
                    params = %record.params,
                    "New best trial"
                );
            } else {
                tracing::debug!(
                    trial = index,
                    cost = record.cost,
                    label_count = ?record.label_count,
                    "Trial finished"
                );
            }
            self.history.push(record);
        }

        Ok(())
    }
}

fn warn_if_degenerate(index: usize, params: &ParamSet, assignment: &ClusterAssignment) {
    match assignment.label_count() {
        0 => tracing::warn!(trial = index, %params, "Every row labelled noise"),
        1 if assignment.noise_count() * 10 < assignment.len() => {
            tracing::warn!(trial = index, %params, "Single cluster holds almost every row")
        }
        _ => {}
    }
}

fn into_optimizer_failure(e: TunerError) -> TunerError {
    match e {
        TunerError::OptimizerFailure(_) => e,
        other => TunerError::optimizer_failure(other.to_string()),
    }
}
