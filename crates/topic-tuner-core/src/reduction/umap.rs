//! UMAP-style manifold reducer.
//!
//! # Algorithm
//!
//! 1. Exact k-nearest neighbours in the input metric (rows in parallel)
//! 2. Smooth kNN calibration: per-row `rho` (nearest positive distance) and
//!    `sigma` so that `Σ exp(-(d - rho) / sigma) = log2(n_neighbors)`
//! 3. Fuzzy union of the directed membership graph: `w = a + b - a·b`
//! 4. Seeded uniform initialisation in `[-10, 10]^c`
//! 5. SGD on the fuzzy cross-entropy with the curve `1 / (1 + a·d^{2b})`,
//!    edge sampling proportional to weight and negative sampling
//!
//! Steps 1-2 are the expensive part and are recomputed on every `fit`. The
//! layout (4-5) is fully determined by `random_state`.
//!
//! Unseen rows are placed at the membership-weighted mean of the embeddings
//! of their nearest training rows.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::DimensionReducer;
use crate::config::constants::reducer as consts;
use crate::config::ReducerConfig;
use crate::distance::DistanceMetric;
use crate::error::{Result, TunerError};
use crate::matrix::EmbeddingMatrix;

/// Half-width of the random initialisation box.
const INIT_SCALE: f32 = 10.0;

/// Lower bound on sigma, as a fraction of the mean neighbour distance.
const MIN_K_DIST_SCALE: f32 = 1e-3;

#[derive(Debug, Clone)]
struct FittedLayout {
    training: EmbeddingMatrix,
    embedding: EmbeddingMatrix,
}

/// Graph-based reducer with a fixed seed.
#[derive(Debug, Clone)]
pub struct UmapReducer {
    n_neighbors: usize,
    n_components: usize,
    random_state: u64,
    config: ReducerConfig,
    a: f32,
    b: f32,
    fitted: Option<FittedLayout>,
}

impl UmapReducer {
    /// Create an unfitted reducer.
    pub fn new(
        n_neighbors: usize,
        n_components: usize,
        random_state: u64,
        config: ReducerConfig,
    ) -> Self {
        let (a, b) = find_ab_params(config.spread, config.min_dist);
        Self {
            n_neighbors,
            n_components,
            random_state,
            config,
            a,
            b,
            fitted: None,
        }
    }

    /// Curve parameters `(a, b)` derived from `min_dist` and `spread`.
    pub fn curve_params(&self) -> (f32, f32) {
        (self.a, self.b)
    }

    /// Seed used for initialisation and negative sampling.
    pub fn random_state(&self) -> u64 {
        self.random_state
    }

    /// Layout of the fitted rows, if fitted.
    pub fn embedding(&self) -> Option<&EmbeddingMatrix> {
        self.fitted.as_ref().map(|f| &f.embedding)
    }

    fn check_fit_input(&self, data: &EmbeddingMatrix) -> Result<()> {
        if self.n_neighbors < 2 {
            return Err(TunerError::invalid_configuration(format!(
                "n_neighbors must be >= 2, got {}",
                self.n_neighbors
            )));
        }
        if self.n_components == 0 {
            return Err(TunerError::invalid_configuration(
                "n_components must be >= 1",
            ));
        }
        if self.n_neighbors >= data.n_rows() {
            return Err(TunerError::invalid_configuration(format!(
                "n_neighbors ({}) must be smaller than the number of rows ({})",
                self.n_neighbors,
                data.n_rows()
            )));
        }
        if self.n_components >= data.n_cols() {
            return Err(TunerError::invalid_configuration(format!(
                "n_components ({}) must be smaller than the embedding dimension ({})",
                self.n_components,
                data.n_cols()
            )));
        }
        Ok(())
    }

    /// Symmetric fuzzy graph as a directed edge list `(head, tail, weight)`.
    fn fuzzy_graph(&self, data: &EmbeddingMatrix) -> Vec<(usize, usize, f32)> {
        let k = self.n_neighbors - 1;
        let target = (self.n_neighbors as f32).log2();
        let metric = self.config.metric;

        let memberships: Vec<Vec<(usize, f32)>> = (0..data.n_rows())
            .into_par_iter()
            .map(|i| {
                let neighbors = nearest_rows(data, data.row(i), k, metric, Some(i));
                let dists: Vec<f32> = neighbors.iter().map(|&(_, d)| d).collect();
                let (sigma, rho) = smooth_knn(&dists, target);
                neighbors
                    .into_iter()
                    .map(|(j, d)| (j, membership(d, rho, sigma)))
                    .collect()
            })
            .collect();

        // (low, high) -> (w[low->high], w[high->low])
        let mut pairs: BTreeMap<(usize, usize), (f32, f32)> = BTreeMap::new();
        for (i, row) in memberships.iter().enumerate() {
            for &(j, w) in row {
                let entry = pairs.entry((i.min(j), i.max(j))).or_insert((0.0, 0.0));
                if i < j {
                    entry.0 = w;
                } else {
                    entry.1 = w;
                }
            }
        }

        let mut edges = Vec::with_capacity(pairs.len() * 2);
        for (&(i, j), &(fwd, back)) in &pairs {
            let w = fwd + back - fwd * back;
            if w > 0.0 {
                edges.push((i, j, w));
                edges.push((j, i, w));
            }
        }
        edges
    }

    fn optimize_layout(&self, edges: &[(usize, usize, f32)], n_vertices: usize) -> Vec<f32> {
        let c = self.n_components;
        let n_epochs = self.config.n_epochs;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let mut embedding: Vec<f32> = (0..n_vertices * c)
            .map(|_| rng.gen_range(-INIT_SCALE..INIT_SCALE))
            .collect();

        let max_w = edges.iter().map(|e| e.2).fold(0.0f32, f32::max);
        if max_w <= 0.0 {
            return embedding;
        }

        let kept: Vec<&(usize, usize, f32)> = edges
            .iter()
            .filter(|e| e.2 >= max_w / n_epochs as f32)
            .collect();

        let epochs_per_sample: Vec<f32> = kept.iter().map(|e| max_w / e.2).collect();
        let neg_rate = self.config.negative_sample_rate.max(1) as f32;
        let epochs_per_negative: Vec<f32> = epochs_per_sample.iter().map(|e| e / neg_rate).collect();
        let mut next_sample = epochs_per_sample.clone();
        let mut next_negative = epochs_per_negative.clone();

        let (a, b) = (self.a, self.b);
        let use_negative = self.config.negative_sample_rate > 0;

        for epoch in 0..n_epochs {
            let alpha = self.config.learning_rate * (1.0 - epoch as f32 / n_epochs as f32);
            let now = epoch as f32;

            for (e, &&(head, tail, _)) in kept.iter().enumerate() {
                if next_sample[e] > now {
                    continue;
                }

                let dist_sq = squared_distance(&embedding, head, tail, c);
                if dist_sq > 0.0 {
                    let coeff = -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0);
                    for d in 0..c {
                        let diff = embedding[head * c + d] - embedding[tail * c + d];
                        let grad = clip(coeff * diff);
                        embedding[head * c + d] += grad * alpha;
                        embedding[tail * c + d] -= grad * alpha;
                    }
                }
                next_sample[e] += epochs_per_sample[e];

                if !use_negative {
                    continue;
                }
                let n_neg = ((now - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
                for _ in 0..n_neg {
                    let other = rng.gen_range(0..n_vertices);
                    let dist_sq = squared_distance(&embedding, head, other, c);
                    let coeff = if dist_sq > 0.0 {
                        2.0 * b / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                    } else if head == other {
                        continue;
                    } else {
                        0.0
                    };
                    for d in 0..c {
                        let grad = if coeff > 0.0 {
                            clip(coeff * (embedding[head * c + d] - embedding[other * c + d]))
                        } else {
                            consts::GRADIENT_CLIP
                        };
                        embedding[head * c + d] += grad * alpha;
                    }
                }
                next_negative[e] += n_neg as f32 * epochs_per_negative[e];
            }
        }

        embedding
    }

    fn place_unseen(&self, fitted: &FittedLayout, data: &EmbeddingMatrix) -> Result<EmbeddingMatrix> {
        let c = self.n_components;
        let k = self.n_neighbors.min(fitted.training.n_rows());
        let target = (self.n_neighbors as f32).log2();
        let metric = self.config.metric;

        let placed: Vec<f32> = (0..data.n_rows())
            .into_par_iter()
            .flat_map_iter(|i| {
                let neighbors = nearest_rows(&fitted.training, data.row(i), k, metric, None);
                let dists: Vec<f32> = neighbors.iter().map(|&(_, d)| d).collect();
                let (sigma, rho) = smooth_knn(&dists, target);
                let weights: Vec<f32> = dists.iter().map(|&d| membership(d, rho, sigma)).collect();
                let total: f32 = weights.iter().sum();

                let mut point = vec![0.0f32; c];
                for (&(j, _), &w) in neighbors.iter().zip(weights.iter()) {
                    let w = if total > 0.0 { w / total } else { 1.0 / k as f32 };
                    for (d, slot) in point.iter_mut().enumerate() {
                        *slot += w * fitted.embedding.row(j)[d];
                    }
                }
                point
            })
            .collect();

        EmbeddingMatrix::from_flat(placed, data.n_rows(), c)
    }
}

impl DimensionReducer for UmapReducer {
    fn fit(&mut self, data: &EmbeddingMatrix) -> Result<()> {
        self.check_fit_input(data)?;

        let edges = self.fuzzy_graph(data);
        let layout = self.optimize_layout(&edges, data.n_rows());

        tracing::debug!(
            rows = data.n_rows(),
            n_neighbors = self.n_neighbors,
            n_components = self.n_components,
            graph_edges = edges.len(),
            epochs = self.config.n_epochs,
            "Reducer fitted"
        );

        self.fitted = Some(FittedLayout {
            training: data.clone(),
            embedding: EmbeddingMatrix::from_flat(layout, data.n_rows(), self.n_components)?,
        });
        Ok(())
    }

    fn transform(&self, data: &EmbeddingMatrix) -> Result<EmbeddingMatrix> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| TunerError::not_ready("reducer has not been fitted"))?;

        if data.n_cols() != fitted.training.n_cols() {
            return Err(TunerError::dimension_mismatch(
                fitted.training.n_cols(),
                data.n_cols(),
            ));
        }

        if data.as_slice() == fitted.training.as_slice() {
            return Ok(fitted.embedding.clone());
        }

        self.place_unseen(fitted, data)
    }

    fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    fn n_components(&self) -> usize {
        self.n_components
    }
}

/// Fit the curve `1 / (1 + a·x^{2b})` to the target membership profile
/// (1 below `min_dist`, exponential decay with scale `spread` above).
///
/// Coarse-to-fine grid search over `(log10 a, b)`; deterministic.
pub fn find_ab_params(spread: f32, min_dist: f32) -> (f32, f32) {
    const SAMPLES: usize = 300;
    const STEPS: usize = 24;
    const ROUNDS: usize = 6;

    let xs: Vec<f32> = (1..=SAMPLES)
        .map(|i| i as f32 * 3.0 * spread / SAMPLES as f32)
        .collect();
    let ys: Vec<f32> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let loss = |a: f32, b: f32| -> f32 {
        xs.iter()
            .zip(ys.iter())
            .map(|(&x, &y)| {
                let p = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (p - y) * (p - y)
            })
            .sum()
    };

    let (mut log_a, mut b) = (0.0f32, 1.0f32);
    let (mut span_log_a, mut span_b) = (3.0f32, 0.95f32);

    for _ in 0..ROUNDS {
        let mut best = (f32::INFINITY, log_a, b);
        for i in 0..=STEPS {
            let la = log_a - span_log_a + 2.0 * span_log_a * i as f32 / STEPS as f32;
            for j in 0..=STEPS {
                let bb = (b - span_b + 2.0 * span_b * j as f32 / STEPS as f32).max(0.05);
                let l = loss(10f32.powf(la), bb);
                if l < best.0 {
                    best = (l, la, bb);
                }
            }
        }
        log_a = best.1;
        b = best.2;
        span_log_a /= 4.0;
        span_b /= 4.0;
    }

    (10f32.powf(log_a), b)
}

/// `k` nearest rows of `data` to `query`, ascending by distance then index.
fn nearest_rows(
    data: &EmbeddingMatrix,
    query: &[f32],
    k: usize,
    metric: DistanceMetric,
    exclude: Option<usize>,
) -> Vec<(usize, f32)> {
    let mut dists: Vec<(usize, f32)> = (0..data.n_rows())
        .filter(|&j| Some(j) != exclude)
        .map(|j| (j, metric.distance(query, data.row(j)).max(0.0)))
        .collect();
    dists.sort_by(|x, y| {
        x.1.partial_cmp(&y.1)
            .unwrap_or(Ordering::Equal)
            .then(x.0.cmp(&y.0))
    });
    dists.truncate(k);
    dists
}

/// Binary search for `sigma`; returns `(sigma, rho)`.
fn smooth_knn(dists: &[f32], target: f32) -> (f32, f32) {
    let rho = dists.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);

    let mut lo = 0.0f32;
    let mut hi = f32::INFINITY;
    let mut mid = 1.0f32;

    for _ in 0..consts::SMOOTH_KNN_ITERATIONS {
        let psum: f32 = dists
            .iter()
            .map(|&d| {
                let d = d - rho;
                if d > 0.0 {
                    (-d / mid).exp()
                } else {
                    1.0
                }
            })
            .sum();

        if (psum - target).abs() < consts::SMOOTH_KNN_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let mean = if dists.is_empty() {
        0.0
    } else {
        dists.iter().sum::<f32>() / dists.len() as f32
    };
    (mid.max(MIN_K_DIST_SCALE * mean), rho)
}

#[inline]
fn membership(d: f32, rho: f32, sigma: f32) -> f32 {
    if d - rho <= 0.0 || sigma <= 0.0 {
        1.0
    } else {
        (-(d - rho) / sigma).exp()
    }
}

#[inline]
fn squared_distance(embedding: &[f32], i: usize, j: usize, c: usize) -> f32 {
    (0..c)
        .map(|d| {
            let diff = embedding[i * c + d] - embedding[j * c + d];
            diff * diff
        })
        .sum()
}

#[inline]
fn clip(v: f32) -> f32 {
    v.clamp(-consts::GRADIENT_CLIP, consts::GRADIENT_CLIP)
}
