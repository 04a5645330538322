//! Centralized tuning constants.
//!
//! Defaults used by [`TunerConfig`](super::TunerConfig) and the reference
//! reducer/clusterer/optimizer. Grouped by the component that consumes them.

/// Default search-space ranges.
pub mod search_space {
    use crate::space::IntRange;

    /// Reducer neighbourhood size.
    pub const N_NEIGHBORS: IntRange = IntRange::new(4, 12);

    /// Reducer output dimension.
    pub const N_COMPONENTS: IntRange = IntRange::new(3, 12);

    /// Clusterer minimum cluster size.
    pub const MIN_CLUSTER_SIZE: IntRange = IntRange::new(5, 15);

    /// Clusterer core-point sample count.
    pub const MIN_SAMPLES: IntRange = IntRange::new(2, 4);
}

/// Cost function constants.
pub mod scoring {
    /// Flat penalty added when the cluster count falls outside the range.
    pub const DEFAULT_PENALTY: f64 = 0.15;

    /// Assignments below this probability count as ambiguous.
    pub const DEFAULT_PROB_THRESHOLD: f64 = 0.1;

    /// Cost reported to the optimizer for a rejected trial.
    ///
    /// Finite so the surrogate model's ordering stays well-defined. Every
    /// scored trial costs at most `1.0 + penalty`, far below this value.
    pub const FAILED_TRIAL_COST: f64 = 1.0e6;
}

/// Search driver defaults.
pub mod search {
    /// Trial budget per search.
    pub const DEFAULT_MAX_EVALS: usize = 20;

    /// Seed for optimizer sampling and every reducer fit.
    pub const DEFAULT_SEED: u64 = 42423;

    /// Lower bound of the acceptable topic count.
    pub const DEFAULT_MIN_CLUSTER_COUNT: usize = 10;

    /// Upper bound of the acceptable topic count.
    pub const DEFAULT_MAX_CLUSTER_COUNT: usize = 50;
}

/// Tree-structured Parzen estimator defaults.
pub mod optimizer {
    /// Random trials before the density model is used.
    pub const N_STARTUP: usize = 10;

    /// Fraction of observations treated as "good".
    pub const GAMMA: f64 = 0.25;

    /// Candidates scored per parameter when maximizing l(x)/g(x).
    pub const N_CANDIDATES: usize = 24;
}

/// Reference reducer defaults.
pub mod reducer {
    /// SGD epochs for the layout optimization.
    pub const N_EPOCHS: usize = 200;

    /// Minimum spacing of points in the embedding.
    pub const MIN_DIST: f32 = 0.1;

    /// Effective scale of embedded points.
    pub const SPREAD: f32 = 1.0;

    /// Initial SGD learning rate, decayed linearly to zero.
    pub const LEARNING_RATE: f32 = 1.0;

    /// Negative samples drawn per positive edge sample.
    pub const NEGATIVE_SAMPLE_RATE: usize = 5;

    /// Binary-search iterations for smooth kNN sigma calibration.
    pub const SMOOTH_KNN_ITERATIONS: usize = 64;

    /// Tolerance of the sigma binary search.
    pub const SMOOTH_KNN_TOLERANCE: f32 = 1e-5;

    /// Gradient clip applied to every SGD coordinate update.
    pub const GRADIENT_CLIP: f32 = 4.0;

    /// Output dimension of the visualization projection.
    pub const PROJECTION_COMPONENTS: usize = 2;
}
