//! Topic Tuner Core Library
//!
//! Searches jointly over UMAP and HDBSCAN hyperparameters for a clustering of
//! document embeddings whose topic count falls inside a target range while
//! leaving as few documents as possible with low membership probability.
//!
//! # Architecture
//!
//! This crate defines:
//! - The input matrix and search space types (`EmbeddingMatrix`, `SearchSpace`, `ParamSet`)
//! - Pipeline stages behind traits (`DimensionReducer`, `DensityClusterer`)
//! - The cost function (`ClusterScorer`) and best-model tracking (`BestModelTracker`)
//! - Pluggable sequential optimizers (`TpeOptimizer`, `RandomSearch`)
//! - The search loop (`SearchDriver`) and its facade (`TopicTuner`)
//! - Error types and configuration
//!
//! # Example
//!
//! ```
//! use topic_tuner_core::{TunerConfig, SearchSpace};
//!
//! let config = TunerConfig::with_bounds(2, 5).max_evals(10).seed(7);
//! assert!(config.validate().is_ok());
//!
//! let space: SearchSpace = config.search_space();
//! assert_eq!(space.random_state, 7);
//! ```

pub mod clustering;
pub mod config;
pub mod distance;
pub mod driver;
pub mod embeddings;
pub mod error;
pub mod evaluator;
pub mod frozen;
pub mod matrix;
pub mod optimizer;
pub mod projection;
pub mod reduction;
pub mod scoring;
pub mod space;
pub mod tracker;
pub mod tuner;

// Re-exports for convenience
pub use clustering::{
    ClusterAssignment, ClusterSelectionMethod, DensityClusterer, HdbscanClusterer,
    HdbscanParams, NOISE_LABEL,
};
pub use config::{OptimizerConfig, OptimizerKind, ReducerConfig, TunerConfig};
pub use distance::DistanceMetric;
pub use driver::{CancellationToken, DriverState, SearchDriver, TrialRecord, TrialStatus};
pub use embeddings::{EmbeddingProvider, HashingEmbedder};
pub use error::{Result, TunerError};
pub use evaluator::{PipelineBuilder, PipelineEvaluator, UmapHdbscanBuilder};
pub use frozen::FrozenPipeline;
pub use matrix::EmbeddingMatrix;
pub use optimizer::{Observation, RandomSearch, SequentialOptimizer, TpeOptimizer};
pub use reduction::{DimensionReducer, UmapReducer};
pub use scoring::{ClusterScorer, Score};
pub use space::{IntRange, Param, ParamSet, SearchSpace};
pub use tracker::{BestModelTracker, TrialResult};
pub use tuner::TopicTuner;
