//! 2-D layout for visualization.
//!
//! A fresh two-component reducer is fitted with the winning trial's
//! `n_neighbors` and the search seed. It never influences cluster selection.

use crate::config::constants::reducer::PROJECTION_COMPONENTS;
use crate::config::ReducerConfig;
use crate::error::Result;
use crate::matrix::EmbeddingMatrix;
use crate::reduction::{DimensionReducer, UmapReducer};
use crate::tracker::BestModelTracker;

/// Fit a 2-component layout of `embeddings`.
///
/// # Errors
///
/// `InvalidConfiguration` when `n_neighbors >= rows` or the input has two or
/// fewer columns.
pub fn project_2d(
    embeddings: &EmbeddingMatrix,
    n_neighbors: usize,
    seed: u64,
    config: &ReducerConfig,
) -> Result<EmbeddingMatrix> {
    let mut reducer = UmapReducer::new(n_neighbors, PROJECTION_COMPONENTS, seed, config.clone());
    let layout = reducer.fit_transform(embeddings)?;
    tracing::debug!(rows = layout.n_rows(), n_neighbors, seed, "2-D projection fitted");
    Ok(layout)
}

/// [`project_2d`] using the tracker's best trial.
///
/// # Errors
///
/// `NotReady` while the tracker is unset.
pub fn project_best(
    embeddings: &EmbeddingMatrix,
    tracker: &BestModelTracker,
    config: &ReducerConfig,
) -> Result<EmbeddingMatrix> {
    let best = tracker.best()?;
    project_2d(
        embeddings,
        best.params.n_neighbors,
        best.params.random_state,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TunerError;

    fn ring(n: usize) -> EmbeddingMatrix {
        let rows: Vec<Vec<f32>> = (0..n)
            .map(|i| {
                let t = i as f32 / n as f32 * std::f32::consts::TAU;
                vec![t.cos(), t.sin(), 0.1 * (3.0 * t).cos(), 0.5]
            })
            .collect();
        EmbeddingMatrix::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_projection_shape_and_determinism() {
        let data = ring(30);
        let config = ReducerConfig::default();
        let a = project_2d(&data, 5, 11, &config).unwrap();
        let b = project_2d(&data, 5, 11, &config).unwrap();
        assert_eq!(a.n_rows(), 30);
        assert_eq!(a.n_cols(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_projection_before_search_not_ready() {
        let tracker = BestModelTracker::new();
        let err = project_best(&ring(10), &tracker, &ReducerConfig::default()).unwrap_err();
        assert!(matches!(err, TunerError::NotReady(_)));
    }

    #[test]
    fn test_projection_needs_more_than_two_columns() {
        let rows: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32, 1.0]).collect();
        let data = EmbeddingMatrix::from_rows(&rows).unwrap();
        let err = project_2d(&data, 4, 1, &ReducerConfig::default()).unwrap_err();
        assert!(err.is_trial_recoverable());
    }
}
