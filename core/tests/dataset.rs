mod common;

use offer_attribution_core::{
    attribution::AttributionStage,
    config::PipelineConfig,
    dataset::{build_feature_table, target_label, DatasetStage, NUMERIC_FEATURES},
    pipeline::Pipeline,
    preprocess::PreprocessStage,
    rng::StageSlot,
    stage::RunArtifacts,
    store::PipelineStore,
    view_detection::ViewDetectionStage,
};

// ── Test helpers ────────────────────────────────────────────────────────────

fn run_through_dataset() -> RunArtifacts {
    let store = PipelineStore::in_memory().unwrap();
    store.migrate().unwrap();
    let mut pipeline = Pipeline::new(Some("dataset-test".into()), PipelineConfig::default_test(), &store);
    pipeline.register(StageSlot::Preprocess, Box::new(PreprocessStage));
    pipeline.register(StageSlot::Attribution, Box::new(AttributionStage));
    pipeline.register(StageSlot::ViewDetection, Box::new(ViewDetectionStage));
    pipeline.register(StageSlot::Dataset, Box::new(DatasetStage));
    pipeline.run_from_raw(common::synthetic_tables()).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// One feature row per attributed offer; the target is completed AND viewed.
#[test]
fn feature_table_matches_attributed_rows() {
    let artifacts = run_through_dataset();
    let rows = artifacts.attributed.as_ref().unwrap();
    let table = artifacts.dataset.as_ref().unwrap();

    assert_eq!(rows.len(), common::ATTRIBUTABLE * 2);
    assert_eq!(table.n_rows(), rows.len());
    assert_eq!(table.features.ncols(), table.columns.len());

    for (row, &y) in rows.iter().zip(table.target.iter()) {
        assert_eq!(y > 0.5, target_label(row), "target mismatch for {} / {}", row.person, row.offer_id);
    }
    assert_eq!(table.positives(), 40, "customers with i % 4 == 0 complete both offers after viewing");
}

/// Completed-but-unviewed and viewed-but-uncompleted rows are negatives.
#[test]
fn partial_engagement_is_negative() {
    let artifacts = run_through_dataset();
    let rows = artifacts.attributed.as_ref().unwrap();

    let completed_unviewed = rows.iter().filter(|r| r.is_completed() && !r.viewed).count();
    let viewed_uncompleted = rows.iter().filter(|r| !r.is_completed() && r.viewed).count();
    assert_eq!(completed_unviewed, 16);
    assert_eq!(viewed_uncompleted, 40);
    assert!(rows.iter().filter(|r| target_label(r)).all(|r| r.is_completed() && r.viewed));
}

/// Numeric columns lead, followed by one-hot columns per categorical trait.
#[test]
fn one_hot_columns_are_exclusive() {
    let artifacts = run_through_dataset();
    let table = artifacts.dataset.as_ref().unwrap();

    for (i, name) in NUMERIC_FEATURES.iter().enumerate() {
        assert_eq!(table.columns[i], *name);
    }
    for name in ["gender_F", "gender_M", "gender_O", "offer_type_bogo", "offer_type_discount", "Inc_inc_g1", "Age_age_g1"] {
        assert!(table.column_index(name).is_some(), "missing column {name}; have {:?}", table.columns);
    }
    assert!(table.column_index("offer_type_informational").is_none());

    let gender: Vec<usize> = ["gender_F", "gender_M", "gender_O"]
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    for row in table.features.rows() {
        let hot: f64 = gender.iter().map(|&j| row[j]).sum();
        assert_eq!(hot, 1.0);
    }
}

/// Building twice from the same rows and plan gives the same table.
#[test]
fn feature_table_is_reproducible() {
    let artifacts = run_through_dataset();
    let rows = artifacts.attributed.as_ref().unwrap();
    let plan = artifacts.binning.as_ref().unwrap();
    let again = build_feature_table(rows, plan).unwrap();
    assert_eq!(&again, artifacts.dataset.as_ref().unwrap());
}
