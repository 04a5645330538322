//! Error types for the topic tuner.
//!
//! [`TunerError`] is the single error type returned by every public operation.
//!
//! # Recovery
//!
//! - `InvalidConfiguration` raised by `TopicTuner::configure` is fatal. The same
//!   variant raised while fitting a reducer or clusterer inside a trial is
//!   recovered by the search driver, which penalises the trial and continues.
//! - `NotReady` is always fatal to the calling operation.
//! - `OptimizerFailure` aborts the running search.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TunerError>;

/// Errors returned by tuner operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TunerError {
    /// Malformed bounds/threshold/budget/seed, or a trial parameter combination
    /// the reduction or clustering stage cannot honor.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A read was attempted before the stage that produces it completed.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The pluggable optimizer failed; trial history can no longer be trusted.
    #[error("Optimizer failure: {0}")]
    OptimizerFailure(String),

    /// The search was cancelled between two trials.
    #[error("Search cancelled after {completed_trials} completed trials")]
    Cancelled {
        /// Trials fully evaluated before the cancellation was observed
        completed_trials: usize,
    },

    /// Row width does not match the matrix width.
    #[error("Dimension mismatch: expected {expected}, actual {actual}")]
    DimensionMismatch {
        /// Expected number of columns
        expected: usize,
        /// Columns found in the offending row
        actual: usize,
    },

    /// A matrix or document list with no rows.
    #[error("Empty input")]
    EmptyInput,

    /// Config file could not be read, parsed or serialized.
    #[error("Config error: {0}")]
    Config(String),
}

impl TunerError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a NotReady error.
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady(message.into())
    }

    /// Create an OptimizerFailure error.
    pub fn optimizer_failure(message: impl Into<String>) -> Self {
        Self::OptimizerFailure(message.into())
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Too few rows for the requested neighbourhood or cluster size.
    pub fn insufficient_data(parameter: &str, required: usize, actual: usize) -> Self {
        Self::InvalidConfiguration(format!(
            "{parameter} requires more than {required} rows, got {actual}"
        ))
    }

    /// Whether the search driver may absorb this error as a penalised trial.
    #[inline]
    pub fn is_trial_recoverable(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}
