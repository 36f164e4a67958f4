use ndarray::{Array1, Array2};
use offer_attribution_core::{
    config::{ParamGrid, TrainerConfig},
    dataset::FeatureTable,
    error::PipelineError,
    model::trainer::train_and_evaluate,
    rng::{RngBank, StageSlot},
};

// ── Test helpers ────────────────────────────────────────────────────────────

/// Two informative columns and one noise column. The label is 1 when
/// x0 > 50, except for a few flipped rows so the problem is not trivial.
fn table(n: usize) -> FeatureTable {
    let mut data = Vec::with_capacity(n * 3);
    let mut target = Vec::with_capacity(n);
    for i in 0..n {
        let x0 = (i * 37 % 100) as f64;
        let x1 = (i % 7) as f64;
        let noise = (i * 13 % 17) as f64;
        data.extend([x0, x1, noise]);
        let label = (x0 > 50.0) ^ (i % 23 == 0);
        target.push(if label { 1.0 } else { 0.0 });
    }
    FeatureTable {
        columns:  vec!["x0".into(), "x1".into(), "noise".into()],
        features: Array2::from_shape_vec((n, 3), data).unwrap(),
        target:   Array1::from(target),
    }
}

fn config() -> TrainerConfig {
    TrainerConfig {
        test_fraction: 0.25,
        cv_folds:      3,
        grid: ParamGrid {
            max_depth:         vec![1, 2, 4],
            min_samples_split: vec![2, 8],
            min_samples_leaf:  vec![2],
        },
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A clear threshold on one column is found, and that column dominates
/// the feature importances.
#[test]
fn learns_threshold_and_ranks_informative_feature_first() {
    let mut rng = RngBank::new(11).for_stage(StageSlot::Trainer);
    let (_, report) = train_and_evaluate(&table(200), &config(), &mut rng).unwrap();

    assert_eq!(report.train_rows + report.test_rows, 200);
    assert_eq!(report.candidates.len(), 6);
    assert!(report.f1 > 0.8, "f1 too low: {}", report.f1);
    assert!(report.accuracy > 0.8, "accuracy too low: {}", report.accuracy);
    assert_eq!(report.feature_importances[0].feature, "x0");

    let total: f64 = report.feature_importances.iter().map(|f| f.importance).sum();
    assert!((total - 1.0).abs() < 1e-9, "importances sum to {total}");
    if let Some(auc) = report.roc_auc {
        assert!((0.0..=1.0).contains(&auc));
    }
}

/// The chosen candidate is the best cross-validated one.
#[test]
fn best_params_have_top_cv_score() {
    let mut rng = RngBank::new(5).for_stage(StageSlot::Trainer);
    let (_, report) = train_and_evaluate(&table(160), &config(), &mut rng).unwrap();
    let top = report.candidates.iter().map(|c| c.cv_f1).fold(f64::MIN, f64::max);
    assert_eq!(report.cv_f1, top);
    assert!(report.candidates.iter().any(|c| c.params == report.best_params));
}

/// Same seed, same table: identical reports. Different seeds split differently.
#[test]
fn training_is_deterministic_per_seed() {
    let data = table(180);
    let run = |seed| {
        let mut rng = RngBank::new(seed).for_stage(StageSlot::Trainer);
        train_and_evaluate(&data, &config(), &mut rng).unwrap().1
    };
    assert_eq!(run(42), run(42));
    let a = run(1);
    let b = run(2);
    assert_eq!(a.train_rows, b.train_rows);
}

/// Too few rows for the requested folds is an error, not a panic.
#[test]
fn tiny_table_is_rejected() {
    let mut rng = RngBank::new(1).for_stage(StageSlot::Trainer);
    let err = train_and_evaluate(&table(4), &config(), &mut rng).unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientData { .. }), "unexpected error: {err}");
}
