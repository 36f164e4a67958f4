use super::PipelineStore;
use crate::{
    error::PipelineResult,
    model::ModelReport,
    summary::{CustomerActivity, GroupRate},
};
use rusqlite::{params, OptionalExtension};

impl PipelineStore {
    // ── Summaries ──────────────────────────────────────────────

    pub fn insert_group_rates(&self, run_id: &str, rates: &[GroupRate]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO group_rate (run_id, scope, dimension, grp, offers, completed, viewed, rate)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for r in rates {
                stmt.execute(params![
                    run_id,
                    r.scope.as_str(),
                    r.dimension,
                    r.group,
                    r.offers as i64,
                    r.completed as i64,
                    r.viewed as i64,
                    r.rate,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Stored rate for one group, if any.
    pub fn group_rate(&self, run_id: &str, scope: &str, dimension: &str, group: &str) -> PipelineResult<Option<f64>> {
        let rate = self
            .conn
            .query_row(
                "SELECT rate FROM group_rate
                 WHERE run_id = ?1 AND scope = ?2 AND dimension = ?3 AND grp = ?4",
                params![run_id, scope, dimension, group],
                |row| row.get(0),
            )
            .optional()?;
        Ok(rate)
    }

    pub fn insert_customer_activity(&self, run_id: &str, activity: &[CustomerActivity]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO customer_activity (run_id, customer_id, class) VALUES (?1, ?2, ?3)",
            )?;
            for a in activity {
                stmt.execute(params![run_id, a.person, a.class.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// (class, customers) pairs, sorted by class name.
    pub fn activity_counts(&self, run_id: &str) -> PipelineResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT class, COUNT(*) FROM customer_activity
             WHERE run_id = ?1 GROUP BY class ORDER BY class ASC",
        )?;
        let counts = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    // ── Model ──────────────────────────────────────────────────

    pub fn insert_model_report(&self, run_id: &str, report: &ModelReport) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO model_report (
                run_id, max_depth, min_split, min_leaf, cv_f1, f1, accuracy,
                roc_auc, train_rows, test_rows, report_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run_id,
                report.best_params.max_depth as i64,
                report.best_params.min_samples_split as i64,
                report.best_params.min_samples_leaf as i64,
                report.cv_f1,
                report.f1,
                report.accuracy,
                report.roc_auc,
                report.train_rows as i64,
                report.test_rows as i64,
                serde_json::to_string(report)?,
            ],
        )?;

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO feature_importance (run_id, rank, feature, importance)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (rank, f) in report.feature_importances.iter().enumerate() {
                stmt.execute(params![run_id, rank as i64 + 1, f.feature, f.importance])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn model_report(&self, run_id: &str) -> PipelineResult<Option<ModelReport>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT report_json FROM model_report WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }

    /// Top `limit` features by importance.
    pub fn top_features(&self, run_id: &str, limit: usize) -> PipelineResult<Vec<(String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT feature, importance FROM feature_importance
             WHERE run_id = ?1 ORDER BY rank ASC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![run_id, limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
