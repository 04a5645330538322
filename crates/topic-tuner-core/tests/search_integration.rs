//! End-to-end search tests on synthetic topic data.
//!
//! Each test builds a fresh tuner, runs a full search on seeded data and
//! prints the state it verified.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use topic_tuner_core::{
    EmbeddingMatrix, HashingEmbedder, OptimizerKind, TopicTuner, TrialStatus, TunerConfig,
    NOISE_LABEL,
};

const DIM: usize = 32;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("topic_tuner_core=debug")
        .with_test_writer()
        .try_init();
}

/// Three tight groups of 30 rows plus 10 scattered outliers.
fn three_topics_with_outliers(seed: u64) -> EmbeddingMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(100);

    for group in 0..3 {
        for _ in 0..30 {
            let mut row: Vec<f32> = (0..DIM).map(|_| rng.gen_range(-0.05..0.05)).collect();
            for d in 0..4 {
                row[group * 8 + d] += 1.0;
            }
            rows.push(row);
        }
    }
    for _ in 0..10 {
        rows.push((0..DIM).map(|_| rng.gen_range(-1.0..1.0)).collect());
    }

    EmbeddingMatrix::from_rows(&rows).expect("synthetic rows are rectangular")
}

// =========================================================================
// Scenario: in-range search
// =========================================================================

#[test]
fn test_three_topics_found_within_bounds() {
    init_logging();
    println!("\n=== Three topics, bounds [2, 5], 20 trials ===");
    let mut tuner = TopicTuner::new(2, 5, 0.1, 20, 42).unwrap();
    tuner.attach_embeddings(three_topics_with_outliers(7)).unwrap();

    let best = tuner.search().unwrap();
    let label_count = tuner.best_label_count().unwrap();
    let cost = tuner.best_cost().unwrap();
    println!("  - Best params: {best}");
    println!("  - Label count: {label_count}");
    println!("  - Cost: {cost:.4}");

    assert!((2..=5).contains(&label_count), "label_count = {label_count}");
    assert!(cost < 0.15, "cost = {cost}");
    assert_eq!(tuner.trial_history().len(), 20);
    assert_eq!(tuner.space().random_state, best.random_state);

    let labels = tuner.labels().unwrap();
    let probs = tuner.probabilities().unwrap();
    assert_eq!(labels.len(), 100);
    assert_eq!(probs.len(), 100);
    assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    assert!(labels.iter().all(|&l| l >= NOISE_LABEL));
    println!("[PASS] test_three_topics_found_within_bounds");
}

#[test]
fn test_best_cost_is_history_minimum() {
    let mut tuner = TopicTuner::new(2, 5, 0.1, 12, 9).unwrap();
    tuner.attach_embeddings(three_topics_with_outliers(3)).unwrap();
    tuner.search().unwrap();

    let min = tuner
        .trial_history()
        .iter()
        .map(|r| r.cost)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(tuner.best_cost().unwrap(), min);

    let first_completed = tuner
        .trial_history()
        .iter()
        .find(|r| r.status == TrialStatus::Completed)
        .unwrap();
    assert!(first_completed.improved);

    let improved_costs: Vec<f64> = tuner
        .trial_history()
        .iter()
        .filter(|r| r.improved)
        .map(|r| r.cost)
        .collect();
    assert!(improved_costs.windows(2).all(|w| w[1] < w[0]));
    println!("[PASS] test_best_cost_is_history_minimum");
}

// =========================================================================
// Scenario: unsatisfiable range
// =========================================================================

#[test]
fn test_unsatisfiable_range_still_terminates() {
    init_logging();
    println!("\n=== Bounds [50, 60] on 100 rows, 6 trials ===");
    let mut tuner = TopicTuner::new(50, 60, 0.1, 6, 42).unwrap();
    tuner.attach_embeddings(three_topics_with_outliers(7)).unwrap();

    let best = tuner.search().unwrap();
    let cost = tuner.best_cost().unwrap();
    println!("  - Best params: {best}");
    println!("  - Cost: {cost:.4}");

    assert_eq!(tuner.trial_history().len(), 6);
    assert!(cost >= 0.15, "every trial is out of range, cost = {cost}");
    assert!(tuner.best_label_count().unwrap() < 50);
    println!("[PASS] test_unsatisfiable_range_still_terminates");
}

// =========================================================================
// Determinism and idempotent reads
// =========================================================================

#[test]
fn test_same_seed_same_result() {
    let data = three_topics_with_outliers(11);

    let run = |data: EmbeddingMatrix| {
        let mut tuner = TopicTuner::new(2, 5, 0.1, 8, 1234).unwrap();
        tuner.attach_embeddings(data).unwrap();
        let best = tuner.search().unwrap();
        (best, tuner.labels().unwrap(), tuner.best_cost().unwrap())
    };

    let (best_a, labels_a, cost_a) = run(data.clone());
    let (best_b, labels_b, cost_b) = run(data);

    assert_eq!(best_a, best_b);
    assert_eq!(labels_a, labels_b);
    assert_eq!(cost_a, cost_b);
    println!("[PASS] test_same_seed_same_result");
}

#[test]
fn test_random_backend_is_deterministic() {
    let data = three_topics_with_outliers(5);
    let mut config = TunerConfig::with_bounds(2, 5).max_evals(5).seed(77);
    config.optimizer.kind = OptimizerKind::Random;

    let mut a = TopicTuner::configure(config.clone()).unwrap();
    let mut b = TopicTuner::configure(config).unwrap();
    a.attach_embeddings(data.clone()).unwrap();
    b.attach_embeddings(data).unwrap();

    assert_eq!(a.search().unwrap(), b.search().unwrap());
    let params_a: Vec<_> = a.trial_history().iter().map(|r| r.params).collect();
    let params_b: Vec<_> = b.trial_history().iter().map(|r| r.params).collect();
    assert_eq!(params_a, params_b);
}

#[test]
fn test_labels_are_idempotent() {
    let mut tuner = TopicTuner::new(2, 5, 0.1, 5, 3).unwrap();
    tuner.attach_embeddings(three_topics_with_outliers(2)).unwrap();
    tuner.search().unwrap();

    assert_eq!(tuner.labels().unwrap(), tuner.labels().unwrap());
    assert_eq!(tuner.probabilities().unwrap(), tuner.probabilities().unwrap());
}

#[test]
fn test_rerun_replaces_history() {
    let mut tuner = TopicTuner::new(2, 5, 0.1, 4, 3).unwrap();
    tuner.attach_embeddings(three_topics_with_outliers(2)).unwrap();
    tuner.search().unwrap();
    tuner.search().unwrap();
    assert_eq!(tuner.trial_history().len(), 4);
    assert_eq!(tuner.trial_history()[0].index, 0);
}

#[test]
fn test_attach_resets_results() {
    let mut tuner = TopicTuner::new(2, 5, 0.1, 4, 3).unwrap();
    tuner.attach_embeddings(three_topics_with_outliers(2)).unwrap();
    tuner.search().unwrap();
    assert!(tuner.labels().is_ok());

    tuner.attach_embeddings(three_topics_with_outliers(4)).unwrap();
    assert!(tuner.labels().is_err());
    assert!(tuner.trial_history().is_empty());
}

// =========================================================================
// Projection and inference
// =========================================================================

#[test]
fn test_project_2d_after_search() {
    let mut tuner = TopicTuner::new(2, 5, 0.1, 5, 8).unwrap();
    tuner.attach_embeddings(three_topics_with_outliers(8)).unwrap();
    tuner.search().unwrap();

    let layout = tuner.project_2d().unwrap();
    assert_eq!(layout.n_rows(), 100);
    assert_eq!(layout.n_cols(), 2);
    assert!(layout.as_slice().iter().all(|v| v.is_finite()));
    assert_eq!(layout, tuner.project_2d().unwrap());
    println!("[PASS] test_project_2d_after_search");
}

#[test]
fn test_frozen_pipeline_predicts_training_rows() {
    let data = three_topics_with_outliers(6);
    let mut tuner = TopicTuner::new(2, 5, 0.1, 6, 21).unwrap();
    tuner.attach_embeddings(data.clone()).unwrap();
    tuner.search().unwrap();
    let best = tuner.best_params().unwrap();
    let labels = tuner.labels().unwrap();

    let mut frozen = tuner.into_frozen_pipeline().unwrap();
    assert_eq!(frozen.params(), &best);
    frozen.fit(&data).unwrap();
    assert_eq!(frozen.training_assignment().unwrap().labels, labels);

    let predicted = frozen.predict(&data).unwrap();
    assert_eq!(predicted.len(), 100);
    println!("[PASS] test_frozen_pipeline_predicts_training_rows");
}

// =========================================================================
// Raw documents
// =========================================================================

#[test]
fn test_embed_docs_then_search() {
    let vocab = [
        ["rust", "borrow", "lifetime", "trait", "cargo", "crate"],
        ["soup", "garlic", "onion", "simmer", "broth", "salt"],
        ["goal", "striker", "penalty", "league", "keeper", "match"],
    ];
    let mut rng = ChaCha8Rng::seed_from_u64(19);
    let docs: Vec<String> = (0..60)
        .map(|i| {
            let words = &vocab[i % 3];
            (0..8)
                .map(|_| words[rng.gen_range(0..words.len())])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();

    let mut tuner = TopicTuner::new(2, 5, 0.1, 5, 4).unwrap();
    tuner.embed_docs(&HashingEmbedder::default(), &docs).unwrap();
    assert_eq!(tuner.embeddings().unwrap().n_rows(), 60);

    tuner.search().unwrap();
    assert_eq!(tuner.labels().unwrap().len(), 60);
    println!("[PASS] test_embed_docs_then_search");
}
