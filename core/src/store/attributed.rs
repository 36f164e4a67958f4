use super::PipelineStore;
use crate::{error::PipelineResult, view_detection::AttributedOffer};
use rusqlite::params;

impl PipelineStore {
    /// Persist the attributed table. The full record is kept as JSON next
    /// to the queryable columns so it can be read back unchanged.
    pub fn insert_attributed_offers(&self, run_id: &str, rows: &[AttributedOffer]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO attributed_offer (
                    run_id, customer_id, offer_id, received_at, deadline, offer_name,
                    completed, completed_at, viewed, view_timing,
                    amount_sum, amount_max, transaction_count,
                    sum_until_completion, count_until_completion, payload
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )?;
            for r in rows {
                stmt.execute(params![
                    run_id,
                    r.person,
                    r.offer_id,
                    r.received_at,
                    r.deadline,
                    r.offer_name,
                    r.status.code(),
                    r.completion_time_code(),
                    if r.viewed { 1i64 } else { 0i64 },
                    r.view_timing.as_str(),
                    r.amount_sum,
                    r.amount_max,
                    r.transaction_count as i64,
                    r.sum_until_completion,
                    r.count_until_completion.map(|c| c as i64),
                    serde_json::to_string(r)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Attributed rows in insertion order.
    pub fn attributed_offers(&self, run_id: &str) -> PipelineResult<Vec<AttributedOffer>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM attributed_offer WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let payloads = stmt
            .query_map(params![run_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let rows = payloads
            .iter()
            .map(|p| serde_json::from_str(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn attributed_count(&self, run_id: &str) -> PipelineResult<i64> {
        self.count("SELECT COUNT(*) FROM attributed_offer WHERE run_id = ?1", run_id)
    }

    pub fn completed_viewed_count(&self, run_id: &str) -> PipelineResult<i64> {
        self.count(
            "SELECT COUNT(*) FROM attributed_offer WHERE run_id = ?1 AND completed = 1 AND viewed = 1",
            run_id,
        )
    }
}
