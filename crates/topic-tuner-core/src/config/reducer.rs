//! Reference reducer settings.
//!
//! Only the knobs that stay fixed during a search live here. `n_neighbors`,
//! `n_components` and the seed come from each trial's parameter set.

use serde::{Deserialize, Serialize};

use super::constants::reducer as defaults;
use crate::distance::DistanceMetric;

/// Settings for [`UmapReducer`](crate::reduction::UmapReducer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerConfig {
    /// Metric in the input space.
    pub metric: DistanceMetric,

    /// SGD epochs.
    pub n_epochs: usize,

    /// Minimum spacing in the output space.
    pub min_dist: f32,

    /// Effective scale of the output space.
    pub spread: f32,

    /// Initial learning rate.
    pub learning_rate: f32,

    /// Negative samples per positive sample.
    pub negative_sample_rate: usize,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            n_epochs: defaults::N_EPOCHS,
            min_dist: defaults::MIN_DIST,
            spread: defaults::SPREAD,
            learning_rate: defaults::LEARNING_RATE,
            negative_sample_rate: defaults::NEGATIVE_SAMPLE_RATE,
        }
    }
}

impl ReducerConfig {
    /// Validate values.
    pub fn validate(&self) -> Result<(), String> {
        if self.n_epochs == 0 {
            return Err("n_epochs must be >= 1".to_string());
        }
        if !(self.spread > 0.0) {
            return Err(format!("spread must be > 0, got {}", self.spread));
        }
        if !(self.min_dist >= 0.0 && self.min_dist < self.spread) {
            return Err(format!(
                "min_dist must be in [0, spread={}), got {}",
                self.spread, self.min_dist
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            ));
        }
        Ok(())
    }
}
