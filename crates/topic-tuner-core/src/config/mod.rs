//! Root configuration for the topic tuner.
//!
//! # Loading Configuration
//!
//! ```rust,ignore
//! use topic_tuner_core::TunerConfig;
//!
//! // Load from file
//! let config = TunerConfig::from_file("tuner.toml")?;
//!
//! // Or defaults with environment overrides
//! let config = TunerConfig::default().with_env_overrides();
//! config.validate()?;
//! ```
//!
//! # TOML Structure
//!
//! ```toml
//! min_cluster_count = 10
//! max_cluster_count = 50
//! prob_threshold = 0.1
//! max_evals = 20
//! seed = 42423
//! penalty = 0.15
//!
//! [search_space]
//! n_neighbors = { lo = 4, hi = 12 }
//! n_components = { lo = 3, hi = 12 }
//! min_cluster_size = { lo = 5, hi = 15 }
//! min_samples = { lo = 2, hi = 4 }
//!
//! [optimizer]
//! kind = "tpe"
//! n_startup = 10
//!
//! [reducer]
//! metric = "cosine"
//! n_epochs = 200
//! ```
//!
//! Invalid values are reported by [`TunerConfig::validate`], never silently
//! replaced with defaults.

pub mod constants;
mod optimizer;
mod reducer;


pub use optimizer::{OptimizerConfig, OptimizerKind};
pub use reducer::ReducerConfig;

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};
use crate::space::{IntRange, SearchSpace};
use constants::{scoring, search, search_space};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "TOPIC_TUNER_";

// ============================================================================
// SEARCH SPACE CONFIG
// ============================================================================

/// Parameter ranges. The seed of the resulting [`SearchSpace`] comes from
/// [`TunerConfig::seed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpaceConfig {
    /// Reducer neighbourhood size.
    pub n_neighbors: IntRange,
    /// Reducer output dimension.
    pub n_components: IntRange,
    /// Clusterer minimum cluster size.
    pub min_cluster_size: IntRange,
    /// Clusterer core-point sample count.
    pub min_samples: IntRange,
}

impl Default for SearchSpaceConfig {
    fn default() -> Self {
        Self {
            n_neighbors: search_space::N_NEIGHBORS,
            n_components: search_space::N_COMPONENTS,
            min_cluster_size: search_space::MIN_CLUSTER_SIZE,
            min_samples: search_space::MIN_SAMPLES,
        }
    }
}

impl SearchSpaceConfig {
    /// Build the search space for a given seed.
    pub fn to_space(&self, random_state: u64) -> SearchSpace {
        SearchSpace {
            n_neighbors: self.n_neighbors,
            n_components: self.n_components,
            min_cluster_size: self.min_cluster_size,
            min_samples: self.min_samples,
            random_state,
        }
    }
}

// ============================================================================
// ROOT TUNER CONFIG
// ============================================================================

/// Everything needed to construct a [`TopicTuner`](crate::TopicTuner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Fewest acceptable topics; fewer incurs the penalty.
    pub min_cluster_count: usize,

    /// Most acceptable topics; more incurs the penalty.
    pub max_cluster_count: usize,

    /// Assignments with lower probability count as ambiguous.
    pub prob_threshold: f64,

    /// Trial budget per search.
    pub max_evals: usize,

    /// Seeds the optimizer and every reducer fit. Must be positive.
    pub seed: u64,

    /// Step penalty for an out-of-range cluster count.
    pub penalty: f64,

    /// Parameter ranges.
    pub search_space: SearchSpaceConfig,

    /// Optimizer backend.
    pub optimizer: OptimizerConfig,

    /// Reference reducer settings.
    pub reducer: ReducerConfig,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            min_cluster_count: search::DEFAULT_MIN_CLUSTER_COUNT,
            max_cluster_count: search::DEFAULT_MAX_CLUSTER_COUNT,
            prob_threshold: scoring::DEFAULT_PROB_THRESHOLD,
            max_evals: search::DEFAULT_MAX_EVALS,
            seed: search::DEFAULT_SEED,
            penalty: scoring::DEFAULT_PENALTY,
            search_space: SearchSpaceConfig::default(),
            optimizer: OptimizerConfig::default(),
            reducer: ReducerConfig::default(),
        }
    }
}

impl TunerConfig {
    /// Config with the given cluster-count bounds and defaults elsewhere.
    pub fn with_bounds(min_cluster_count: usize, max_cluster_count: usize) -> Self {
        Self {
            min_cluster_count,
            max_cluster_count,
            ..Self::default()
        }
    }

    /// Set the trial budget.
    #[must_use]
    pub fn max_evals(mut self, max_evals: usize) -> Self {
        self.max_evals = max_evals;
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the probability threshold.
    #[must_use]
    pub fn prob_threshold(mut self, prob_threshold: f64) -> Self {
        self.prob_threshold = prob_threshold;
        self
    }

    /// Search space built from the configured ranges and seed.
    pub fn search_space(&self) -> SearchSpace {
        self.search_space.to_space(self.seed)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// - `TunerError::Config` if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|e| {
            TunerError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&contents).map_err(|e| {
            TunerError::Config(format!(
                "Failed to parse TOML in '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| TunerError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TunerError::Config(format!("Failed to serialize to TOML: {e}")))
    }

    /// Validate all values, returning the first problem found.
    ///
    /// # Errors
    /// `TunerError::InvalidConfiguration` if:
    /// - `min_cluster_count >= max_cluster_count`
    /// - `prob_threshold` is outside (0, 1)
    /// - `max_evals == 0` or `seed == 0`
    /// - `penalty` is negative or not finite
    /// - any nested section is invalid
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_count >= self.max_cluster_count {
            return Err(TunerError::invalid_configuration(format!(
                "min_cluster_count ({}) must be smaller than max_cluster_count ({})",
                self.min_cluster_count, self.max_cluster_count
            )));
        }

        if !(self.prob_threshold > 0.0 && self.prob_threshold < 1.0) {
            return Err(TunerError::invalid_configuration(format!(
                "prob_threshold must be in (0, 1), got {}",
                self.prob_threshold
            )));
        }

        if self.max_evals == 0 {
            return Err(TunerError::invalid_configuration(
                "max_evals must be greater than 0",
            ));
        }

        if self.seed == 0 {
            return Err(TunerError::invalid_configuration(
                "seed must be greater than 0",
            ));
        }

        if !(self.penalty.is_finite() && self.penalty >= 0.0) {
            return Err(TunerError::invalid_configuration(format!(
                "penalty must be finite and >= 0, got {}",
                self.penalty
            )));
        }

        self.search_space().validate()?;

        self.optimizer
            .validate()
            .map_err(|e| TunerError::invalid_configuration(format!("[optimizer] {e}")))?;

        self.reducer
            .validate()
            .map_err(|e| TunerError::invalid_configuration(format!("[reducer] {e}")))?;

        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `TOPIC_TUNER_MIN_CLUSTERS` | `min_cluster_count` |
    /// | `TOPIC_TUNER_MAX_CLUSTERS` | `max_cluster_count` |
    /// | `TOPIC_TUNER_PROB_THRESHOLD` | `prob_threshold` |
    /// | `TOPIC_TUNER_MAX_EVALS` | `max_evals` |
    /// | `TOPIC_TUNER_SEED` | `seed` |
    /// | `TOPIC_TUNER_OPTIMIZER` | `optimizer.kind` |
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env_parse::<usize>("MIN_CLUSTERS") {
            self.min_cluster_count = n;
        }
        if let Some(n) = env_parse::<usize>("MAX_CLUSTERS") {
            self.max_cluster_count = n;
        }
        if let Some(p) = env_parse::<f64>("PROB_THRESHOLD") {
            self.prob_threshold = p;
        }
        if let Some(n) = env_parse::<usize>("MAX_EVALS") {
            self.max_evals = n;
        }
        if let Some(s) = env_parse::<u64>("SEED") {
            self.seed = s;
        }
        if let Some(kind) = env_parse::<OptimizerKind>("OPTIMIZER") {
            self.optimizer.kind = kind;
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(suffix: &str) -> Option<T> {
    let key = format!("{ENV_PREFIX}{suffix}");
    let raw = env::var(&key).ok()?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(variable = %key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
