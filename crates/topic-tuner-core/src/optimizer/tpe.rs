//! Tree-structured Parzen estimator over integer parameters.
//!
//! After `n_startup` observations, history is split at the `gamma` quantile of
//! cost into good and bad trials. For every parameter independently, a
//! discrete Parzen density is built from each group (Gaussian kernels plus a
//! uniform prior), `n_candidates` values are drawn from the good density, and
//! the candidate maximizing `l(x) / g(x)` is kept.

use std::cmp::Ordering;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{check_observation, sample_uniform, Observation, SequentialOptimizer};
use crate::config::constants::optimizer as defaults;
use crate::config::OptimizerConfig;
use crate::error::{Result, TunerError};
use crate::space::{IntRange, ParamSet, SearchSpace};

/// TPE optimizer with a seeded sampler.
#[derive(Debug, Clone)]
pub struct TpeOptimizer {
    seed: u64,
    n_startup: usize,
    gamma: f64,
    n_candidates: usize,
    rng: ChaCha8Rng,
}

impl TpeOptimizer {
    /// TPE with default settings.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            n_startup: defaults::N_STARTUP,
            gamma: defaults::GAMMA,
            n_candidates: defaults::N_CANDIDATES,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// TPE from an optimizer config section.
    pub fn from_config(config: &OptimizerConfig, seed: u64) -> Self {
        Self::new(seed)
            .with_startup(config.n_startup)
            .with_gamma(config.gamma)
            .with_candidates(config.n_candidates)
    }

    /// Random trials before modelling starts.
    #[must_use]
    pub fn with_startup(mut self, n: usize) -> Self {
        self.n_startup = n;
        self
    }

    /// Good-group quantile.
    #[must_use]
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Candidates per parameter.
    #[must_use]
    pub fn with_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }

    fn model_sample(&mut self, space: &SearchSpace, usable: &[&Observation]) -> Result<ParamSet> {
        let mut sorted = usable.to_vec();
        sorted.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap_or(Ordering::Equal));

        let n_good = ((sorted.len() as f64) * self.gamma).ceil() as usize;
        let n_good = n_good.max(1).min(sorted.len() - 1);
        let (good, bad) = sorted.split_at(n_good);

        let mut params = space.lower_corner();
        for (param, range) in space.iter() {
            let good_values: Vec<usize> = good.iter().map(|o| o.params.get(param)).collect();
            let bad_values: Vec<usize> = bad.iter().map(|o| o.params.get(param)).collect();

            let l = parzen(&good_values, range);
            let g = parzen(&bad_values, range);

            let mut best: Option<(usize, f64)> = None;
            for _ in 0..self.n_candidates {
                let idx = draw_index(&l, &mut self.rng);
                let ratio = l[idx] / g[idx];
                if !ratio.is_finite() {
                    return Err(TunerError::optimizer_failure(format!(
                        "non-finite density ratio for {param}"
                    )));
                }
                if best.map_or(true, |(_, r)| ratio > r) {
                    best = Some((idx, ratio));
                }
            }

            let (idx, _) = best.unwrap_or((0, 0.0));
            params.set(param, range.lo + idx);
        }

        Ok(params)
    }
}

impl SequentialOptimizer for TpeOptimizer {
    fn suggest(&mut self, space: &SearchSpace, history: &[Observation]) -> Result<ParamSet> {
        space.validate()?;

        let usable: Vec<&Observation> = history
            .iter()
            .filter(|o| o.cost.is_finite() && space.contains(&o.params))
            .collect();

        if usable.len() < self.n_startup.max(2) {
            return Ok(sample_uniform(space, &mut self.rng));
        }

        let params = self.model_sample(space, &usable)?;
        tracing::trace!(observations = usable.len(), %params, "TPE candidate");
        Ok(params)
    }

    fn report(&mut self, observation: &Observation) -> Result<()> {
        check_observation(observation)
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    fn name(&self) -> &'static str {
        "tpe"
    }
}

/// Discrete density over `range`: a uniform prior of mass 1 plus one unit
/// Gaussian kernel per observation. Bandwidth narrows as data accumulates.
fn parzen(values: &[usize], range: IntRange) -> Vec<f64> {
    let width = range.len();
    let bandwidth = (width as f64 / (values.len() as f64 + 1.0)).max(1.0);

    let mut density = vec![1.0 / width as f64; width];
    for &v in values {
        let kernel: Vec<f64> = (0..width)
            .map(|i| {
                let z = ((range.lo + i) as f64 - v as f64) / bandwidth;
                (-0.5 * z * z).exp()
            })
            .collect();
        let total: f64 = kernel.iter().sum();
        if total > 0.0 {
            for (slot, k) in density.iter_mut().zip(kernel) {
                *slot += k / total;
            }
        }
    }

    let total: f64 = density.iter().sum();
    for slot in &mut density {
        *slot /= total;
    }
    density
}

/// Inverse-CDF draw from a normalized discrete distribution.
fn draw_index<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    let r: f64 = rng.gen();
    let mut cumsum = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumsum += w;
        if r < cumsum {
            return i;
        }
    }
    weights.len() - 1
}
