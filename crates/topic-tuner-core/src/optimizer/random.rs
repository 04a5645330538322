//! Seeded uniform random search.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{check_observation, sample_uniform, Observation, SequentialOptimizer};
use crate::error::Result;
use crate::space::{ParamSet, SearchSpace};

/// Ignores history and samples every parameter uniformly.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    /// Random search seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SequentialOptimizer for RandomSearch {
    fn suggest(&mut self, space: &SearchSpace, _history: &[Observation]) -> Result<ParamSet> {
        space.validate()?;
        Ok(sample_uniform(space, &mut self.rng))
    }

    fn report(&mut self, observation: &Observation) -> Result<()> {
        check_observation(observation)
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
