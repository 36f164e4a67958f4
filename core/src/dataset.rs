//! Dataset builder — attributed offers → flat feature/target table.
//!
//! Target: the offer was completed AND viewed. Completion without a view
//! means the offer had no effect on the purchase, so it is a negative.

use crate::{
    binning::{BinningPlan, RowBins},
    error::{PipelineError, PipelineResult},
    rng::StageRng,
    stage::{PipelineStage, RunArtifacts, StageContext, StageOutcome},
    view_detection::AttributedOffer,
};
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;

pub const NUMERIC_FEATURES: [&str; 10] = [
    "age", "income", "membership_days", "reward", "difficulty",
    "duration", "web", "email", "mobile", "social",
];

/// One-hot encoded columns, in output order. Bin columns keep the
/// capitalized prefixes of the binned traits (`Inc_inc_g1`, ...).
pub const CATEGORICAL_FEATURES: [&str; 6] = [
    "gender", "Inc", "Age", "Dur", "offer_type", "member_year",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub columns:  Vec<String>,
    pub features: Array2<f64>,
    pub target:   Array1<f64>,
}

impl FeatureTable {
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn positives(&self) -> usize {
        self.target.iter().filter(|&&y| y > 0.5).count()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

pub fn target_label(row: &AttributedOffer) -> bool {
    row.is_completed() && row.viewed
}

fn numeric_values(row: &AttributedOffer) -> [f64; 10] {
    let [web, email, mobile, social] = row.channels.indicators().map(f64::from);
    [
        f64::from(row.age),
        row.income,
        f64::from(row.membership_days),
        f64::from(row.reward),
        f64::from(row.difficulty),
        f64::from(row.duration),
        web,
        email,
        mobile,
        social,
    ]
}

fn categorical_values(row: &AttributedOffer, bins: RowBins) -> [Option<String>; 6] {
    [
        Some(row.gender.clone()).filter(|g| !g.is_empty()),
        bins.income,
        bins.age,
        bins.membership,
        Some(row.offer_type.as_str().to_string()),
        Some(row.member_year.clone()),
    ]
}

pub fn build_feature_table(rows: &[AttributedOffer], plan: &BinningPlan) -> PipelineResult<FeatureTable> {
    if rows.is_empty() {
        return Err(PipelineError::InsufficientData {
            what:   "feature table",
            needed: 1,
            actual: 0,
        });
    }

    let categorical: Vec<[Option<String>; 6]> = rows
        .iter()
        .map(|r| categorical_values(r, plan.bins_for(r)))
        .collect();

    // Observed categories per column, sorted.
    let mut levels: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); CATEGORICAL_FEATURES.len()];
    for values in &categorical {
        for (set, value) in levels.iter_mut().zip(values) {
            if let Some(v) = value {
                set.insert(v.as_str());
            }
        }
    }

    let mut columns: Vec<String> = NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect();
    let mut offsets = Vec::with_capacity(levels.len());
    for (name, set) in CATEGORICAL_FEATURES.iter().zip(&levels) {
        offsets.push(columns.len());
        columns.extend(set.iter().map(|level| format!("{name}_{level}")));
    }

    let width = columns.len();
    let mut data = Vec::with_capacity(rows.len() * width);
    for (row, values) in rows.iter().zip(&categorical) {
        let mut line = vec![0.0; width];
        line[..NUMERIC_FEATURES.len()].copy_from_slice(&numeric_values(row));
        for ((set, offset), value) in levels.iter().zip(&offsets).zip(values) {
            if let Some(pos) = value.as_deref().and_then(|v| set.iter().position(|l| *l == v)) {
                line[offset + pos] = 1.0;
            }
        }
        data.extend(line);
    }

    let features = Array2::from_shape_vec((rows.len(), width), data).map_err(anyhow::Error::from)?;
    let target = rows.iter().map(|r| if target_label(r) { 1.0 } else { 0.0 }).collect();

    Ok(FeatureTable { columns, features, target })
}

pub struct DatasetStage;

impl PipelineStage for DatasetStage {
    fn name(&self) -> &'static str { "dataset" }

    fn run(
        &mut self,
        ctx: &StageContext<'_>,
        artifacts: &mut RunArtifacts,
        _rng: &mut StageRng,
    ) -> PipelineResult<StageOutcome> {
        let rows = artifacts.attributed.as_ref().ok_or(PipelineError::MissingPrecursor {
            stage:    "dataset",
            artifact: "attributed offers",
        })?;

        let plan = BinningPlan::fit(rows, &ctx.config.binning)?;
        let table = build_feature_table(rows, &plan)?;

        log::info!(
            "dataset: {} rows x {} features, {} positive",
            table.n_rows(),
            table.columns.len(),
            table.positives()
        );
        log::debug!(
            "dataset: income edges {:?}, membership edges {:?}",
            plan.income.edges(),
            plan.membership.edges()
        );

        let outcome = StageOutcome { rows_out: table.n_rows(), rows_dropped: 0 };
        artifacts.binning = Some(plan);
        artifacts.dataset = Some(table);
        Ok(outcome)
    }
}
