//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Stages call store methods; they never execute SQL directly.

use crate::error::PipelineResult;
use rusqlite::{params, Connection};
use serde::Serialize;

mod attributed;
mod normalized;
mod report;

pub struct PipelineStore {
    conn: Connection,
}

/// One row of the stage log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageLogEntry {
    pub seq:          i64,
    pub stage:        String,
    pub status:       String,
    pub rows_out:     Option<i64>,
    pub rows_dropped: Option<i64>,
    pub detail:       Option<String>,
}

impl PipelineStore {
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_pipeline.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str, config_json: &str) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, config_json, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                seed as i64,
                version,
                config_json,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn run_seed(&self, run_id: &str) -> PipelineResult<Option<u64>> {
        let mut stmt = self.conn.prepare("SELECT seed FROM run WHERE run_id = ?1")?;
        let seed = stmt
            .query_row(params![run_id], |row| row.get::<_, i64>(0))
            .ok()
            .map(|s| s as u64);
        Ok(seed)
    }

    // ── Stage log ──────────────────────────────────────────────

    pub fn append_stage_log(
        &self,
        run_id: &str,
        seq: usize,
        stage: &str,
        status: &str,
        counts: Option<(usize, usize)>,
        detail: Option<&str>,
    ) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO stage_log (run_id, seq, stage, status, rows_out, rows_dropped, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                seq as i64,
                stage,
                status,
                counts.map(|(out, _)| out as i64),
                counts.map(|(_, dropped)| dropped as i64),
                detail,
            ],
        )?;
        Ok(())
    }

    pub fn stage_log(&self, run_id: &str) -> PipelineResult<Vec<StageLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, stage, status, rows_out, rows_dropped, detail
             FROM stage_log WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(StageLogEntry {
                    seq:          row.get(0)?,
                    stage:        row.get(1)?,
                    status:       row.get(2)?,
                    rows_out:     row.get(3)?,
                    rows_dropped: row.get(4)?,
                    detail:       row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn count(&self, sql: &str, run_id: &str) -> PipelineResult<i64> {
        Ok(self.conn.query_row(sql, params![run_id], |row| row.get(0))?)
    }
}
