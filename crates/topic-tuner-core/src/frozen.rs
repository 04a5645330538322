//! Inference with the winning models.
//!
//! A [`FrozenPipeline`] owns the reducer and clusterer fitted during the best
//! trial. `fit` is a no-op so the pipeline can be handed to code
//! that always calls `fit` before use without discarding the tuned models.

use crate::clustering::{ClusterAssignment, DensityClusterer};
use crate::error::Result;
use crate::matrix::EmbeddingMatrix;
use crate::reduction::DimensionReducer;
use crate::space::ParamSet;
use crate::tracker::TrialResult;

/// Already-fitted reduce → cluster pipeline.
#[derive(Debug)]
pub struct FrozenPipeline {
    params: ParamSet,
    cost: f64,
    reducer: Box<dyn DimensionReducer>,
    clusterer: Box<dyn DensityClusterer>,
}

impl From<TrialResult> for FrozenPipeline {
    fn from(trial: TrialResult) -> Self {
        Self {
            params: trial.params,
            cost: trial.cost,
            reducer: trial.reducer,
            clusterer: trial.clusterer,
        }
    }
}

impl FrozenPipeline {
    /// Parameters of the trial the models came from.
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// Cost of that trial.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// No-op; the models stay as tuned.
    pub fn fit(&mut self, data: &EmbeddingMatrix) -> Result<()> {
        tracing::trace!(rows = data.n_rows(), "Frozen pipeline ignores fit");
        Ok(())
    }

    /// Labels of the rows the pipeline was tuned on.
    pub fn training_assignment(&self) -> Result<&ClusterAssignment> {
        self.clusterer.assignment()
    }

    /// Reduce `data` with the tuned reducer.
    pub fn transform(&self, data: &EmbeddingMatrix) -> Result<EmbeddingMatrix> {
        self.reducer.transform(data)
    }

    /// Reduce, then assign to the tuned clusters.
    pub fn predict(&self, data: &EmbeddingMatrix) -> Result<ClusterAssignment> {
        let reduced = self.reducer.transform(data)?;
        self.clusterer.predict(&reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::PipelineEvaluator;
    use crate::scoring::ClusterScorer;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn frozen() -> (FrozenPipeline, EmbeddingMatrix) {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let rows: Vec<Vec<f32>> = (0..2)
            .flat_map(|g| {
                (0..15)
                    .map(|_| {
                        let mut r: Vec<f32> = (0..8).map(|_| rng.gen_range(-0.05..0.05)).collect();
                        r[g * 4] += 1.0;
                        r
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        let data = EmbeddingMatrix::from_rows(&rows).unwrap();

        let params = ParamSet {
            n_neighbors: 6,
            n_components: 3,
            min_cluster_size: 8,
            min_samples: 2,
            random_state: 3,
        };
        let eval = PipelineEvaluator::default().evaluate(&params, &data).unwrap();
        let score = ClusterScorer::new(0.1, 1, 4).score_assignment(&eval.assignment).unwrap();
        let trial = TrialResult {
            params,
            label_count: score.label_count,
            cost: score.cost,
            reducer: eval.reducer,
            clusterer: eval.clusterer,
        };
        (FrozenPipeline::from(trial), data)
    }

    #[test]
    fn test_fit_is_noop() {
        let (mut pipeline, data) = frozen();
        let before = pipeline.training_assignment().unwrap().clone();
        let shifted = EmbeddingMatrix::from_flat(
            data.as_slice().iter().map(|v| v + 3.0).collect(),
            data.n_rows(),
            data.n_cols(),
        )
        .unwrap();
        pipeline.fit(&shifted).unwrap();
        assert_eq!(pipeline.training_assignment().unwrap(), &before);
    }

    #[test]
    fn test_predict_on_training_rows_matches_labels() {
        let (pipeline, data) = frozen();
        let predicted = pipeline.predict(&data).unwrap();
        let trained = pipeline.training_assignment().unwrap();
        assert_eq!(predicted.len(), data.n_rows());
        let agree = predicted
            .labels
            .iter()
            .zip(trained.labels.iter())
            .filter(|(a, b)| a == b)
            .count();
        assert!(agree >= 27, "only {agree}/30 labels agree");
        println!("[PASS] test_predict_on_training_rows_matches_labels");
    }

    #[test]
    fn test_transform_keeps_tuned_dimension() {
        let (pipeline, data) = frozen();
        assert_eq!(pipeline.transform(&data).unwrap().n_cols(), pipeline.params().n_components);
    }
}
