//! Dimensionality reduction capability.
//!
//! The tuner only needs `fit` / `transform` from a reducer. [`UmapReducer`] is
//! the reference implementation; any other algorithm can be plugged in by
//! implementing [`DimensionReducer`] and supplying a matching
//! [`PipelineBuilder`](crate::evaluator::PipelineBuilder).

mod umap;

pub use umap::{find_ab_params, UmapReducer};

use std::fmt;

use crate::error::Result;
use crate::matrix::EmbeddingMatrix;

/// A transformer that learns a low-dimensional projection.
pub trait DimensionReducer: Send + Sync + fmt::Debug {
    /// Learn the projection from `data`.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the requested neighbourhood or output size
    /// cannot be honored for this input (e.g. `n_neighbors >= rows`,
    /// `n_components >= columns`).
    fn fit(&mut self, data: &EmbeddingMatrix) -> Result<()>;

    /// Project rows with the same column count as the fitted data.
    ///
    /// # Errors
    ///
    /// `NotReady` before `fit`, `DimensionMismatch` on a column-count mismatch.
    fn transform(&self, data: &EmbeddingMatrix) -> Result<EmbeddingMatrix>;

    /// `fit` followed by `transform` on the same data.
    fn fit_transform(&mut self, data: &EmbeddingMatrix) -> Result<EmbeddingMatrix> {
        self.fit(data)?;
        self.transform(data)
    }

    /// Neighbourhood size this reducer was configured with.
    fn n_neighbors(&self) -> usize;

    /// Output dimension.
    fn n_components(&self) -> usize;
}
