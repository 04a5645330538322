//! Sequential hyperparameter optimizers.
//!
//! The search driver only talks to [`SequentialOptimizer`]: it asks for one
//! candidate at a time given every `(params, cost)` observed so far, then
//! reports the realized cost back. Backends:
//!
//! | Backend | Strategy |
//! |---------|----------|
//! | [`TpeOptimizer`] | Tree-structured Parzen estimator after a random warm-up |
//! | [`RandomSearch`] | Seeded uniform sampling |

mod random;
mod tpe;

pub use random::RandomSearch;
pub use tpe::TpeOptimizer;

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{OptimizerConfig, OptimizerKind};
use crate::error::{Result, TunerError};
use crate::space::{IntRange, ParamSet, SearchSpace};

/// A completed `(params, cost)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Parameters evaluated.
    pub params: ParamSet,
    /// Realized cost; lower is better.
    pub cost: f64,
}

/// Proposes parameter sets one at a time.
pub trait SequentialOptimizer: Send + fmt::Debug {
    /// Propose the next candidate, conditioned on `history`.
    ///
    /// # Errors
    ///
    /// `OptimizerFailure` when the backend cannot produce a candidate.
    fn suggest(&mut self, space: &SearchSpace, history: &[Observation]) -> Result<ParamSet>;

    /// Record the cost realized by a suggested candidate.
    ///
    /// # Errors
    ///
    /// `OptimizerFailure` for a non-finite cost.
    fn report(&mut self, observation: &Observation) -> Result<()>;

    /// Return to the freshly seeded state.
    fn reset(&mut self);

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the configured backend.
pub fn from_config(config: &OptimizerConfig, seed: u64) -> Box<dyn SequentialOptimizer> {
    match config.kind {
        OptimizerKind::Tpe => Box::new(TpeOptimizer::from_config(config, seed)),
        OptimizerKind::Random => Box::new(RandomSearch::new(seed)),
    }
}

/// Reject non-finite costs; shared by every backend's `report`.
pub(crate) fn check_observation(observation: &Observation) -> Result<()> {
    if observation.cost.is_finite() {
        Ok(())
    } else {
        Err(TunerError::optimizer_failure(format!(
            "non-finite cost {} reported for {}",
            observation.cost, observation.params
        )))
    }
}

/// Uniform parameter set inside `space`.
pub(crate) fn sample_uniform<R: Rng>(space: &SearchSpace, rng: &mut R) -> ParamSet {
    let mut params = space.lower_corner();
    for (param, range) in space.iter() {
        params.set(param, uniform_in(range, rng));
    }
    params
}

#[inline]
fn uniform_in<R: Rng>(range: IntRange, rng: &mut R) -> usize {
    rng.gen_range(range.lo..=range.hi)
}
