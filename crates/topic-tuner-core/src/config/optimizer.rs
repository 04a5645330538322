//! Optimizer backend selection.

use serde::{Deserialize, Serialize};

use super::constants::optimizer as defaults;

/// Which sequential optimizer drives the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Tree-structured Parzen estimator.
    #[default]
    Tpe,
    /// Seeded uniform random search.
    Random,
}

impl std::str::FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tpe" => Ok(OptimizerKind::Tpe),
            "random" => Ok(OptimizerKind::Random),
            other => Err(format!("unknown optimizer '{other}', expected 'tpe' or 'random'")),
        }
    }
}

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Backend.
    pub kind: OptimizerKind,

    /// Random trials before TPE starts modelling.
    pub n_startup: usize,

    /// Good/bad split quantile for TPE.
    pub gamma: f64,

    /// Candidates drawn per parameter by TPE.
    pub n_candidates: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kind: OptimizerKind::Tpe,
            n_startup: defaults::N_STARTUP,
            gamma: defaults::GAMMA,
            n_candidates: defaults::N_CANDIDATES,
        }
    }
}

impl OptimizerConfig {
    /// Validate values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(format!("gamma must be in (0, 1), got {}", self.gamma));
        }
        if self.n_candidates == 0 {
            return Err("n_candidates must be >= 1".to_string());
        }
        Ok(())
    }
}
