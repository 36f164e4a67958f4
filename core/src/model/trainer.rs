use super::{
    cross_validation::{stratified_k_fold, stratified_split, Fold},
    decision_tree::{DecisionTreeClassifier, TreeParams},
    metrics::{accuracy, f1_score, roc_auc},
    scaler::StandardScaler,
};
use crate::{
    config::{ParamGrid, TrainerConfig},
    dataset::FeatureTable,
    error::{PipelineError, PipelineResult},
    rng::StageRng,
    stage::{PipelineStage, RunArtifacts, StageContext, StageOutcome},
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: TreeParams,
    /// Mean F1 over the cross-validation folds.
    pub cv_f1:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature:    String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub best_params:         TreeParams,
    pub cv_f1:               f64,
    pub f1:                  f64,
    pub accuracy:            f64,
    /// None when the held-out rows hold a single class.
    pub roc_auc:             Option<f64>,
    pub train_rows:          usize,
    pub test_rows:           usize,
    /// Descending by importance.
    pub feature_importances: Vec<FeatureImportance>,
    pub candidates:          Vec<CandidateScore>,
}

/// Scaler fitted on the training rows plus the tree fitted after it.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub scaler: StandardScaler,
    pub tree:   DecisionTreeClassifier,
}

impl TrainedModel {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: TreeParams) -> PipelineResult<Self> {
        let scaler = StandardScaler::fit(x);
        let mut tree = DecisionTreeClassifier::new(params);
        tree.fit(&scaler.transform(x), y)?;
        Ok(Self { scaler, tree })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        self.tree.predict(&self.scaler.transform(x))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        self.tree.predict_proba(&self.scaler.transform(x))
    }
}

/// Candidates in grid order: depth, then leaf size, then split size.
pub fn candidates(grid: &ParamGrid) -> Vec<TreeParams> {
    let mut out = Vec::new();
    for &max_depth in &grid.max_depth {
        for &min_samples_leaf in &grid.min_samples_leaf {
            for &min_samples_split in &grid.min_samples_split {
                out.push(TreeParams { max_depth, min_samples_split, min_samples_leaf });
            }
        }
    }
    out
}

fn rows(x: &Array2<f64>, y: &Array1<f64>, idx: &[usize]) -> (Array2<f64>, Array1<f64>) {
    (x.select(Axis(0), idx), y.select(Axis(0), idx))
}

/// Score every candidate on the same folds. The best mean F1 wins;
/// ties keep the candidate listed first.
pub fn grid_search(
    x: &Array2<f64>,
    y: &Array1<f64>,
    grid: &ParamGrid,
    folds: &[Fold],
) -> PipelineResult<(TreeParams, Vec<CandidateScore>)> {
    let mut scores = Vec::new();
    for params in candidates(grid) {
        let mut total = 0.0;
        for fold in folds {
            let (x_tr, y_tr) = rows(x, y, &fold.train);
            let (x_te, y_te) = rows(x, y, &fold.test);
            let model = TrainedModel::fit(&x_tr, &y_tr, params)?;
            total += f1_score(&y_te, &model.predict(&x_te));
        }
        let cv_f1 = total / folds.len().max(1) as f64;
        log::debug!("trainer: {params:?} cv_f1={cv_f1:.4}");
        scores.push(CandidateScore { params, cv_f1 });
    }

    let best = scores
        .iter()
        .fold(None::<&CandidateScore>, |best, c| match best {
            Some(b) if b.cv_f1 >= c.cv_f1 => Some(b),
            _ => Some(c),
        })
        .map(|c| c.params)
        .ok_or_else(|| PipelineError::InvalidConfig("trainer.grid is empty".into()))?;

    Ok((best, scores))
}

/// Holdout split, grid search on the training part, refit, evaluate.
pub fn train_and_evaluate(
    table: &FeatureTable,
    config: &TrainerConfig,
    rng: &mut StageRng,
) -> PipelineResult<(TrainedModel, ModelReport)> {
    let x = &table.features;
    let y = &table.target;

    let split = stratified_split(y, config.test_fraction, rng)?;
    let (x_train, y_train) = rows(x, y, &split.train);
    let (x_test, y_test) = rows(x, y, &split.test);

    if split.train.len() < config.cv_folds {
        return Err(PipelineError::InsufficientData {
            what:   "training rows for cross-validation",
            needed: config.cv_folds,
            actual: split.train.len(),
        });
    }
    let folds = stratified_k_fold(&y_train, config.cv_folds, rng)?;
    let (best_params, candidates) = grid_search(&x_train, &y_train, &config.grid, &folds)?;

    let model = TrainedModel::fit(&x_train, &y_train, best_params)?;
    let predicted = model.predict(&x_test);
    let proba = model.predict_proba(&x_test);

    let mut feature_importances: Vec<FeatureImportance> = table
        .columns
        .iter()
        .zip(model.tree.feature_importances())
        .map(|(feature, &importance)| FeatureImportance { feature: feature.clone(), importance })
        .collect();
    feature_importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    let cv_f1 = candidates
        .iter()
        .find(|c| c.params == best_params)
        .map(|c| c.cv_f1)
        .unwrap_or_default();

    let report = ModelReport {
        best_params,
        cv_f1,
        f1:         f1_score(&y_test, &predicted),
        accuracy:   accuracy(&y_test, &predicted),
        roc_auc:    roc_auc(&y_test, &proba),
        train_rows: split.train.len(),
        test_rows:  split.test.len(),
        feature_importances,
        candidates,
    };
    Ok((model, report))
}

pub struct TrainerStage;

impl PipelineStage for TrainerStage {
    fn name(&self) -> &'static str { "trainer" }

    fn run(
        &mut self,
        ctx: &StageContext<'_>,
        artifacts: &mut RunArtifacts,
        rng: &mut StageRng,
    ) -> PipelineResult<StageOutcome> {
        let table = artifacts.dataset.as_ref().ok_or(PipelineError::MissingPrecursor {
            stage:    "trainer",
            artifact: "feature table",
        })?;

        let (_model, report) = train_and_evaluate(table, &ctx.config.trainer, rng)?;
        ctx.store.insert_model_report(ctx.run_id, &report)?;

        log::info!(
            "trainer: best {:?}, cv_f1={:.4} f1={:.4} accuracy={:.4}",
            report.best_params,
            report.cv_f1,
            report.f1,
            report.accuracy
        );
        if let Some(top) = report.feature_importances.first() {
            log::info!("trainer: top feature {} ({:.3})", top.feature, top.importance);
        }

        let outcome = StageOutcome { rows_out: report.train_rows + report.test_rows, rows_dropped: 0 };
        artifacts.report = Some(report);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_follow_depth_leaf_split_order() {
        let grid = ParamGrid {
            max_depth:         vec![1, 2],
            min_samples_split: vec![2, 6],
            min_samples_leaf:  vec![3],
        };
        let c = candidates(&grid);
        assert_eq!(c.len(), 4);
        assert_eq!(c[0], TreeParams { max_depth: 1, min_samples_split: 2, min_samples_leaf: 3 });
        assert_eq!(c[1], TreeParams { max_depth: 1, min_samples_split: 6, min_samples_leaf: 3 });
        assert_eq!(c[2].max_depth, 2);
    }
}
