//! search CLI command
//!
//! # Input
//!
//! Exactly one of:
//! - `--embeddings FILE`: JSON array of equal-length number arrays
//! - `--docs FILE`: one document per line, embedded with the hashing embedder
//!
//! # Output
//!
//! ```json
//! {
//!   "run_id": "…",
//!   "best_params": { "n_neighbors": 7, "n_components": 5, … },
//!   "label_count": 3,
//!   "cost": 0.04,
//!   "labels": [0, 0, 1, -1, …],
//!   "probabilities": [1.0, 0.93, …],
//!   "trials": [ … ],
//!   "projection": [[x, y], …]
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use topic_tuner_core::{
    EmbeddingMatrix, HashingEmbedder, OptimizerKind, ParamSet, TopicTuner, TrialRecord,
    TunerConfig,
};

use crate::error::{exit_code_for_error, CliExitCode};

/// Arguments for `search` command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// JSON file holding one embedding row per document
    #[arg(long, conflicts_with = "docs", required_unless_present = "docs")]
    pub embeddings: Option<PathBuf>,

    /// Text file holding one document per line
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// Dimension of the hashing embedder used with `--docs`
    #[arg(long, default_value_t = 256)]
    pub hashing_dim: usize,

    /// TOML configuration file
    #[arg(long, short, env = "TOPIC_TUNER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Smallest acceptable topic count
    #[arg(long)]
    pub min_clusters: Option<usize>,

    /// Largest acceptable topic count
    #[arg(long)]
    pub max_clusters: Option<usize>,

    /// Membership probability below which a document counts as unassigned
    #[arg(long)]
    pub prob_threshold: Option<f64>,

    /// Number of trials
    #[arg(long)]
    pub max_evals: Option<usize>,

    /// Seed for the optimizer and every reducer
    #[arg(long)]
    pub seed: Option<u64>,

    /// Optimizer backend: tpe or random
    #[arg(long)]
    pub optimizer: Option<OptimizerKind>,

    /// Include a 2-D layout in the report
    #[arg(long)]
    pub project_2d: bool,

    /// Write the report here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// JSON report written on success.
#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub run_id: Uuid,
    pub best_params: ParamSet,
    pub label_count: usize,
    pub cost: f64,
    pub labels: Vec<i32>,
    pub probabilities: Vec<f32>,
    pub trials: Vec<TrialRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<Vec<f32>>>,
}

/// Execute the search command
///
/// # Exit Codes
/// - 0: Report written
/// - 1: Search failed
/// - 2: Invalid configuration or input
pub fn search_command(args: SearchArgs) -> i32 {
    debug!("search_command: args={:?}", args);

    let report = match run_search(&args) {
        Ok(report) => report,
        Err(e) => {
            error!("search: {e:#}");
            return exit_code_for_error(&e).into();
        }
    };

    match write_report(&report, args.output.as_deref()) {
        Ok(()) => CliExitCode::Success.into(),
        Err(e) => {
            error!("search: {e:#}");
            exit_code_for_error(&e).into()
        }
    }
}

/// Build the config, load input, search and collect the report.
pub fn run_search(args: &SearchArgs) -> anyhow::Result<SearchReport> {
    let config = resolve_config(args)?;
    let mut tuner = TopicTuner::configure(config)?;

    match (&args.embeddings, &args.docs) {
        (Some(path), _) => {
            let matrix = load_embeddings(path)?;
            tuner.attach_embeddings(matrix)?;
        }
        (None, Some(path)) => {
            let docs = load_docs(path)?;
            let embedder = HashingEmbedder::new(args.hashing_dim);
            tuner
                .embed_docs(&embedder, &docs)
                .with_context(|| format!("embedding documents from '{}'", path.display()))?;
        }
        (None, None) => anyhow::bail!("one of --embeddings or --docs is required"),
    }

    let best_params = tuner.search()?;
    info!(
        "search: best {} label_count={} cost={:.4}",
        best_params,
        tuner.best_label_count()?,
        tuner.best_cost()?
    );

    let projection = if args.project_2d {
        Some(tuner.project_2d()?.to_rows())
    } else {
        None
    };

    Ok(SearchReport {
        run_id: tuner.run_id(),
        best_params,
        label_count: tuner.best_label_count()?,
        cost: tuner.best_cost()?,
        labels: tuner.labels()?,
        probabilities: tuner.probabilities()?,
        trials: tuner.trial_history().to_vec(),
        projection,
    })
}

/// File config (or defaults), then environment, then flags.
fn resolve_config(args: &SearchArgs) -> anyhow::Result<TunerConfig> {
    let mut config = match &args.config {
        Some(path) => TunerConfig::from_file(path)?,
        None => TunerConfig::default(),
    }
    .with_env_overrides();

    if let Some(n) = args.min_clusters {
        config.min_cluster_count = n;
    }
    if let Some(n) = args.max_clusters {
        config.max_cluster_count = n;
    }
    if let Some(p) = args.prob_threshold {
        config.prob_threshold = p;
    }
    if let Some(n) = args.max_evals {
        config.max_evals = n;
    }
    if let Some(s) = args.seed {
        config.seed = s;
    }
    if let Some(kind) = args.optimizer {
        config.optimizer.kind = kind;
    }
    Ok(config)
}

fn load_embeddings(path: &Path) -> anyhow::Result<EmbeddingMatrix> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading embeddings from '{}'", path.display()))?;
    let rows: Vec<Vec<f32>> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing embeddings in '{}'", path.display()))?;
    let matrix = EmbeddingMatrix::from_rows(&rows)
        .with_context(|| format!("embeddings in '{}'", path.display()))?;
    debug!(
        "search: loaded {} x {} embeddings",
        matrix.n_rows(),
        matrix.n_cols()
    );
    Ok(matrix)
}

fn load_docs(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading documents from '{}'", path.display()))?;
    let docs: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect();
    debug!("search: loaded {} documents", docs.len());
    Ok(docs)
}

fn write_report(report: &SearchReport, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing report to '{}'", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topic_tuner_core::TunerError;

    fn args() -> SearchArgs {
        SearchArgs {
            embeddings: None,
            docs: None,
            hashing_dim: 64,
            config: None,
            min_clusters: Some(2),
            max_clusters: Some(5),
            prob_threshold: None,
            max_evals: Some(3),
            seed: Some(9),
            optimizer: None,
            project_2d: false,
            output: None,
        }
    }

    fn blob_rows() -> Vec<Vec<f32>> {
        (0..40)
            .map(|i| {
                let mut row: Vec<f32> = (0..16).map(|d| ((i * 13 + d * 7) % 11) as f32 * 0.01).collect();
                row[(i % 2) * 8] += 1.0;
                row
            })
            .collect()
    }

    // =========================================================================
    // Config resolution
    // =========================================================================
    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuner.toml");
        let file = TunerConfig::with_bounds(3, 30).max_evals(50).seed(5);
        std::fs::write(&path, file.to_toml_string().unwrap()).unwrap();

        let mut a = args();
        a.config = Some(path);
        a.min_clusters = None;
        a.optimizer = Some(OptimizerKind::Random);

        let config = resolve_config(&a).unwrap();
        assert_eq!(config.min_cluster_count, 3);
        assert_eq!(config.max_cluster_count, 5);
        assert_eq!(config.max_evals, 3);
        assert_eq!(config.seed, 9);
        assert_eq!(config.optimizer.kind, OptimizerKind::Random);
    }

    // =========================================================================
    // End to end
    // =========================================================================
    #[test]
    fn test_search_from_embeddings_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("embeddings.json");
        let output = dir.path().join("report.json");
        std::fs::write(&input, serde_json::to_string(&blob_rows()).unwrap()).unwrap();

        let mut a = args();
        a.embeddings = Some(input);
        a.project_2d = true;
        a.output = Some(output.clone());

        assert_eq!(search_command(a), 0);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(report["labels"].as_array().unwrap().len(), 40);
        assert_eq!(report["trials"].as_array().unwrap().len(), 3);
        assert_eq!(report["projection"].as_array().unwrap().len(), 40);
        assert_eq!(report["best_params"]["random_state"], 9);
        println!("[PASS] test_search_from_embeddings_file");
    }

    #[test]
    fn test_search_from_docs_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("docs.txt");
        let docs: Vec<String> = (0..30)
            .map(|i| {
                if i % 2 == 0 {
                    format!("compiler borrow checker trait {i}")
                } else {
                    format!("garlic onion broth simmer {i}")
                }
            })
            .collect();
        std::fs::write(&input, docs.join("\n\n")).unwrap();

        let mut a = args();
        a.docs = Some(input);
        let report = run_search(&a).unwrap();
        assert_eq!(report.labels.len(), 30);
        assert!(report.projection.is_none());
    }

    #[test]
    fn test_ragged_embeddings_are_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("embeddings.json");
        std::fs::write(&input, "[[1.0, 2.0], [3.0]]").unwrap();

        let mut a = args();
        a.embeddings = Some(input);
        let err = run_search(&a).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TunerError>(),
            Some(TunerError::DimensionMismatch { .. })
        ));
        assert_eq!(exit_code_for_error(&err), CliExitCode::InvalidInput);
    }

    #[test]
    fn test_invalid_bounds_exit_code() {
        let mut a = args();
        a.embeddings = Some(PathBuf::from("unused.json"));
        a.min_clusters = Some(9);
        a.max_clusters = Some(4);
        assert_eq!(search_command(a), i32::from(CliExitCode::InvalidInput));
    }

    #[test]
    fn test_missing_file_is_failure() {
        let mut a = args();
        a.embeddings = Some(PathBuf::from("/nonexistent/embeddings.json"));
        assert_eq!(search_command(a), i32::from(CliExitCode::Failure));
    }
}
