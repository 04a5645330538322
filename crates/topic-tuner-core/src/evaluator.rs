//! One trial: reduce, then cluster.

use std::fmt;
use std::time::Instant;

use crate::clustering::{
    ClusterAssignment, ClusterSelectionMethod, DensityClusterer, HdbscanClusterer, HdbscanParams,
};
use crate::config::ReducerConfig;
use crate::error::{Result, TunerError};
use crate::matrix::EmbeddingMatrix;
use crate::reduction::{DimensionReducer, UmapReducer};
use crate::space::ParamSet;

/// Creates unfitted reducers and clusterers for a parameter set.
pub trait PipelineBuilder: Send + Sync + fmt::Debug {
    /// Reducer configured from `params`.
    fn reducer(&self, params: &ParamSet) -> Box<dyn DimensionReducer>;

    /// Clusterer configured from `params`.
    fn clusterer(&self, params: &ParamSet) -> Box<dyn DensityClusterer>;
}

/// [`UmapReducer`] followed by [`HdbscanClusterer`].
#[derive(Debug, Clone, Default)]
pub struct UmapHdbscanBuilder {
    /// Fixed reducer settings.
    pub reducer: ReducerConfig,
    /// Cluster selection method.
    pub selection: ClusterSelectionMethod,
}

impl UmapHdbscanBuilder {
    /// Builder with the given reducer settings and EOM selection.
    pub fn new(reducer: ReducerConfig) -> Self {
        Self {
            reducer,
            selection: ClusterSelectionMethod::EOM,
        }
    }
}

impl PipelineBuilder for UmapHdbscanBuilder {
    fn reducer(&self, params: &ParamSet) -> Box<dyn DimensionReducer> {
        Box::new(UmapReducer::new(
            params.n_neighbors,
            params.n_components,
            params.random_state,
            self.reducer.clone(),
        ))
    }

    fn clusterer(&self, params: &ParamSet) -> Box<dyn DensityClusterer> {
        Box::new(HdbscanClusterer::new(
            HdbscanParams::new(params.min_cluster_size, params.min_samples)
                .with_selection_method(self.selection),
        ))
    }
}

/// Freshly fitted models and their output.
#[derive(Debug)]
pub struct Evaluation {
    /// Labels and probabilities, one per row.
    pub assignment: ClusterAssignment,
    /// Fitted reducer.
    pub reducer: Box<dyn DimensionReducer>,
    /// Fitted clusterer.
    pub clusterer: Box<dyn DensityClusterer>,
}

/// Runs the reduce → cluster pipeline for one parameter set.
#[derive(Debug)]
pub struct PipelineEvaluator {
    builder: Box<dyn PipelineBuilder>,
}

impl Default for PipelineEvaluator {
    fn default() -> Self {
        Self::new(Box::new(UmapHdbscanBuilder::default()))
    }
}

impl PipelineEvaluator {
    /// Evaluator using `builder` for every trial.
    pub fn new(builder: Box<dyn PipelineBuilder>) -> Self {
        Self { builder }
    }

    /// Fit a fresh reducer and clusterer on `embeddings`.
    ///
    /// The input matrix is only read.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` when either stage cannot honor `params` for
    ///   this input
    /// - `DimensionMismatch` when the clusterer does not label every row
    pub fn evaluate(&self, params: &ParamSet, embeddings: &EmbeddingMatrix) -> Result<Evaluation> {
        let start = Instant::now();

        let mut reducer = self.builder.reducer(params);
        let reduced = reducer.fit_transform(embeddings)?;

        let mut clusterer = self.builder.clusterer(params);
        let assignment = clusterer.fit(&reduced)?;
        let rows = embeddings.n_rows();
        if assignment.len() != rows {
            return Err(TunerError::dimension_mismatch(rows, assignment.len()));
        }
        if assignment.probabilities.len() != rows {
            return Err(TunerError::dimension_mismatch(
                rows,
                assignment.probabilities.len(),
            ));
        }

        tracing::debug!(
            %params,
            label_count = assignment.label_count(),
            noise = assignment.noise_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline evaluated"
        );

        Ok(Evaluation {
            assignment,
            reducer,
            clusterer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::SearchSpace;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn grouped(per_group: usize) -> EmbeddingMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let rows: Vec<Vec<f32>> = (0..3)
            .flat_map(|g| {
                (0..per_group)
                    .map(|_| {
                        let mut r: Vec<f32> = (0..16).map(|_| rng.gen_range(-0.05..0.05)).collect();
                        r[g * 5] += 1.0;
                        r
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        EmbeddingMatrix::from_rows(&rows).unwrap()
    }

    fn params(n_neighbors: usize, n_components: usize, mcs: usize, ms: usize) -> ParamSet {
        ParamSet {
            n_neighbors,
            n_components,
            min_cluster_size: mcs,
            min_samples: ms,
            random_state: 42,
        }
    }

    #[test]
    fn test_evaluate_finds_groups() {
        let data = grouped(20);
        let eval = PipelineEvaluator::default()
            .evaluate(&params(8, 3, 11, 3), &data)
            .unwrap();

        assert_eq!(eval.assignment.len(), 60);
        assert_eq!(eval.assignment.label_count(), 3);
        assert_eq!(eval.reducer.n_components(), 3);
        assert_eq!(eval.clusterer.assignment().unwrap(), &eval.assignment);
        println!("[PASS] test_evaluate_finds_groups");
    }

    #[test]
    fn test_evaluate_does_not_mutate_input() {
        let data = grouped(10);
        let before = data.clone();
        let _ = PipelineEvaluator::default().evaluate(&params(5, 3, 5, 2), &data);
        assert_eq!(data, before);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let data = grouped(10);
        let evaluator = PipelineEvaluator::default();
        let a = evaluator.evaluate(&params(5, 3, 5, 2), &data).unwrap();
        let b = evaluator.evaluate(&params(5, 3, 5, 2), &data).unwrap();
        assert_eq!(a.assignment, b.assignment);
    }

    #[test]
    fn test_neighbors_at_row_count_is_invalid() {
        let data = grouped(2);
        let err = PipelineEvaluator::default()
            .evaluate(&params(6, 3, 5, 2), &data)
            .unwrap_err();
        assert!(matches!(err, TunerError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_components_at_dimension_is_invalid() {
        let data = grouped(10);
        let err = PipelineEvaluator::default()
            .evaluate(&params(5, 16, 5, 2), &data)
            .unwrap_err();
        assert!(err.is_trial_recoverable());
    }

    /// Drops the last row from whatever the reference clusterer produces.
    #[derive(Debug)]
    struct DropsLastRow {
        inner: HdbscanClusterer,
        assignment: Option<ClusterAssignment>,
    }

    impl DensityClusterer for DropsLastRow {
        fn fit(&mut self, data: &EmbeddingMatrix) -> Result<ClusterAssignment> {
            let mut a = self.inner.fit(data)?;
            a.labels.pop();
            a.probabilities.pop();
            self.assignment = Some(a.clone());
            Ok(a)
        }

        fn assignment(&self) -> Result<&ClusterAssignment> {
            self.assignment
                .as_ref()
                .ok_or_else(|| TunerError::not_ready("not fitted"))
        }

        fn predict(&self, data: &EmbeddingMatrix) -> Result<ClusterAssignment> {
            self.inner.predict(data)
        }
    }

    #[derive(Debug)]
    struct ShortLabelBuilder;

    impl PipelineBuilder for ShortLabelBuilder {
        fn reducer(&self, params: &ParamSet) -> Box<dyn DimensionReducer> {
            UmapHdbscanBuilder::default().reducer(params)
        }

        fn clusterer(&self, params: &ParamSet) -> Box<dyn DensityClusterer> {
            Box::new(DropsLastRow {
                inner: HdbscanClusterer::new(HdbscanParams::new(
                    params.min_cluster_size,
                    params.min_samples,
                )),
                assignment: None,
            })
        }
    }

    #[test]
    fn test_short_assignment_is_dimension_mismatch() {
        let data = grouped(20);
        let err = PipelineEvaluator::new(Box::new(ShortLabelBuilder))
            .evaluate(&params(8, 3, 11, 3), &data)
            .unwrap_err();
        println!("error = {err}");
        assert_eq!(err, TunerError::dimension_mismatch(60, 59));
        assert!(!err.is_trial_recoverable());
    }

    #[test]
    fn test_builder_uses_shared_random_state() {
        let builder = UmapHdbscanBuilder::default();
        let p = SearchSpace::new(77).lower_corner();
        assert_eq!(builder.reducer(&p).n_neighbors(), p.n_neighbors);
        assert_eq!(builder.reducer(&p).n_components(), p.n_components);
    }
}
