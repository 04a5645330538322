//! The topic tuner facade.
//!
//! ```rust,ignore
//! use topic_tuner_core::{TopicTuner, TunerConfig};
//!
//! let mut tuner = TopicTuner::configure(TunerConfig::with_bounds(2, 5))?;
//! tuner.attach_embeddings(matrix)?;
//! let best = tuner.search()?;
//! let labels = tuner.labels()?;
//! ```

use uuid::Uuid;

use crate::config::TunerConfig;
use crate::driver::{CancellationToken, SearchContext, SearchDriver, TrialRecord};
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, TunerError};
use crate::evaluator::{PipelineBuilder, PipelineEvaluator, UmapHdbscanBuilder};
use crate::frozen::FrozenPipeline;
use crate::matrix::EmbeddingMatrix;
use crate::optimizer::{self, SequentialOptimizer};
use crate::projection;
use crate::scoring::ClusterScorer;
use crate::space::{ParamSet, SearchSpace};
use crate::tracker::TrialResult;

/// Owns one search's configuration, input and results.
///
/// Each instance is independent; nothing is shared between tuners.
#[derive(Debug)]
pub struct TopicTuner {
    run_id: Uuid,
    config: TunerConfig,
    space: SearchSpace,
    scorer: ClusterScorer,
    evaluator: PipelineEvaluator,
    optimizer: Box<dyn SequentialOptimizer>,
    driver: SearchDriver,
    embeddings: Option<EmbeddingMatrix>,
}

impl TopicTuner {
    /// Validate `config` and build a tuner with the reference pipeline and the
    /// configured optimizer.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for malformed bounds, threshold, budget or seed.
    pub fn configure(config: TunerConfig) -> Result<Self> {
        config.validate()?;

        let run_id = Uuid::new_v4();
        tracing::info!(
            %run_id,
            min_cluster_count = config.min_cluster_count,
            max_cluster_count = config.max_cluster_count,
            prob_threshold = config.prob_threshold,
            max_evals = config.max_evals,
            seed = config.seed,
            optimizer = ?config.optimizer.kind,
            "Tuner configured"
        );

        Ok(Self {
            run_id,
            space: config.search_space(),
            scorer: ClusterScorer::from_config(&config),
            evaluator: PipelineEvaluator::new(Box::new(UmapHdbscanBuilder::new(
                config.reducer.clone(),
            ))),
            optimizer: optimizer::from_config(&config.optimizer, config.seed),
            driver: SearchDriver::new(),
            embeddings: None,
            config,
        })
    }

    /// Shorthand for [`configure`](Self::configure) with defaults elsewhere.
    pub fn new(
        min_cluster_count: usize,
        max_cluster_count: usize,
        prob_threshold: f64,
        max_evals: usize,
        seed: u64,
    ) -> Result<Self> {
        Self::configure(
            TunerConfig::with_bounds(min_cluster_count, max_cluster_count)
                .prob_threshold(prob_threshold)
                .max_evals(max_evals)
                .seed(seed),
        )
    }

    /// Replace the reducer/clusterer pair used by every trial.
    #[must_use]
    pub fn with_builder(mut self, builder: Box<dyn PipelineBuilder>) -> Self {
        self.evaluator = PipelineEvaluator::new(builder);
        self
    }

    /// Replace the optimizer backend.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Box<dyn SequentialOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Identifier of this tuner, included in its log events.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Validated configuration.
    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Search space used by [`search`](Self::search).
    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Token that cancels a running search between trials.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.driver.cancellation_token()
    }

    /// Attach the input matrix, discarding any previous search results.
    pub fn attach_embeddings(&mut self, embeddings: EmbeddingMatrix) -> Result<()> {
        tracing::debug!(
            run_id = %self.run_id,
            rows = embeddings.n_rows(),
            dimension = embeddings.n_cols(),
            "Embeddings attached"
        );
        self.driver.reset();
        self.embeddings = Some(embeddings);
        Ok(())
    }

    /// Embed `documents` with `provider` and attach the result.
    pub fn embed_docs(
        &mut self,
        provider: &dyn EmbeddingProvider,
        documents: &[String],
    ) -> Result<()> {
        let matrix = provider.embed(documents)?;
        self.attach_embeddings(matrix)
    }

    /// Attached matrix.
    pub fn embeddings(&self) -> Result<&EmbeddingMatrix> {
        self.embeddings
            .as_ref()
            .ok_or_else(|| TunerError::not_ready("no embeddings attached"))
    }

    /// Run the full trial budget and return the best parameters.
    ///
    /// # Errors
    ///
    /// - `NotReady` if no embeddings are attached
    /// - `OptimizerFailure` if the optimizer fails; no best model is kept
    /// - `Cancelled` if the cancellation token is set; the best trial so far
    ///   stays readable
    ///
    /// The token is not cleared here. After a cancelled search, call
    /// [`CancellationToken::reset`] on [`Self::cancellation_token`] before
    /// searching again.
    pub fn search(&mut self) -> Result<ParamSet> {
        let embeddings = self
            .embeddings
            .as_ref()
            .ok_or_else(|| TunerError::not_ready("no embeddings attached; call attach_embeddings first"))?;

        let span = tracing::info_span!("search", run_id = %self.run_id);
        let _guard = span.enter();

        self.driver.run(
            SearchContext {
                space: &self.space,
                embeddings,
                evaluator: &self.evaluator,
                scorer: &self.scorer,
                max_evals: self.config.max_evals,
            },
            self.optimizer.as_mut(),
        )
    }

    fn best(&self) -> Result<&TrialResult> {
        self.driver
            .tracker()
            .best()
            .map_err(|_| TunerError::not_ready("search has not produced a best model"))
    }

    /// Per-row topic labels of the best model; `-1` is noise.
    pub fn labels(&self) -> Result<Vec<i32>> {
        Ok(self.best()?.assignment()?.labels.clone())
    }

    /// Per-row membership probabilities of the best model.
    pub fn probabilities(&self) -> Result<Vec<f32>> {
        Ok(self.best()?.assignment()?.probabilities.clone())
    }

    /// Parameters of the best trial.
    pub fn best_params(&self) -> Result<ParamSet> {
        Ok(self.best()?.params)
    }

    /// Topic count of the best trial.
    pub fn best_label_count(&self) -> Result<usize> {
        Ok(self.best()?.label_count)
    }

    /// Cost of the best trial.
    pub fn best_cost(&self) -> Result<f64> {
        Ok(self.best()?.cost)
    }

    /// Trials of the most recent search.
    pub fn trial_history(&self) -> &[TrialRecord] {
        self.driver.history()
    }

    /// 2-D layout fitted with the best trial's `n_neighbors` and the seed.
    ///
    /// # Errors
    ///
    /// `NotReady` before a successful search.
    pub fn project_2d(&self) -> Result<EmbeddingMatrix> {
        projection::project_best(self.embeddings()?, self.driver.tracker(), &self.config.reducer)
    }

    /// Hand the winning models over for inference.
    ///
    /// # Errors
    ///
    /// `NotReady` before a successful search.
    pub fn into_frozen_pipeline(mut self) -> Result<FrozenPipeline> {
        self.driver
            .take_best()
            .map(FrozenPipeline::from)
            .ok_or_else(|| TunerError::not_ready("search has not produced a best model"))
    }
}
