use super::PipelineStore;
use crate::{
    error::PipelineResult,
    event::TranscriptEvent,
    preprocess::{Customer, Offer},
};
use rusqlite::params;

impl PipelineStore {
    pub fn insert_offers(&self, run_id: &str, offers: &[Offer]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO offer (
                    run_id, offer_id, offer_type, reward, difficulty, duration,
                    web, email, mobile, social, offer_name
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for o in offers {
                let [web, email, mobile, social] = o.channels.indicators();
                stmt.execute(params![
                    run_id,
                    o.id,
                    o.offer_type.as_str(),
                    o.reward,
                    o.difficulty,
                    o.duration,
                    web,
                    email,
                    mobile,
                    social,
                    o.name,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_customers(&self, run_id: &str, customers: &[Customer]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO customer (
                    run_id, customer_id, gender, age, income, member_since,
                    membership_days, member_year, member_month, member_day
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for c in customers {
                stmt.execute(params![
                    run_id,
                    c.id,
                    c.gender,
                    c.age,
                    c.income,
                    c.member_since.format("%Y-%m-%d").to_string(),
                    c.membership_days,
                    c.member_year,
                    c.member_month,
                    c.member_day,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_events(&self, run_id: &str, events: &[TranscriptEvent]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO transcript_event (
                    run_id, customer_id, event, time, offer_id, amount, reward
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for e in events {
                stmt.execute(params![
                    run_id,
                    e.person,
                    e.kind.as_str(),
                    e.time,
                    e.offer_id,
                    e.amount,
                    e.reward,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn offer_count(&self, run_id: &str) -> PipelineResult<i64> {
        self.count("SELECT COUNT(*) FROM offer WHERE run_id = ?1", run_id)
    }

    pub fn customer_count(&self, run_id: &str) -> PipelineResult<i64> {
        self.count("SELECT COUNT(*) FROM customer WHERE run_id = ?1", run_id)
    }

    pub fn event_count(&self, run_id: &str) -> PipelineResult<i64> {
        self.count("SELECT COUNT(*) FROM transcript_event WHERE run_id = ?1", run_id)
    }
}
