//! Descriptive summaries of the attributed table.
//!
//!   group rates       : offer completion rate (OCR) per group, over all
//!                       attributed rows and over viewed rows only
//!   customer activity : one class per profile from the raw transcript
//!
//! OCR = completed / offers within the group. Rows whose bin is
//! undefined (e.g. an age outside the configured edges) are left out of
//! that dimension only.

use crate::{
    binning::BinningPlan,
    error::{PipelineError, PipelineResult},
    event::EventKind,
    preprocess::NormalizedTables,
    rng::StageRng,
    stage::{PipelineStage, RunArtifacts, StageContext, StageOutcome},
    types::PersonId,
    view_detection::AttributedOffer,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Grouping dimensions, in output order.
pub const DIMENSIONS: [&str; 9] = [
    "offer_name", "difficulty", "duration", "reward", "gender",
    "age_bin", "income_bin", "membership_bin", "member_year",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScope {
    All,
    Viewed,
}

impl RateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All    => "all",
            Self::Viewed => "viewed",
        }
    }
}

static SCOPES: [RateScope; 2] = [RateScope::All, RateScope::Viewed];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRate {
    pub scope:     RateScope,
    pub dimension: String,
    pub group:     String,
    pub offers:    usize,
    pub completed: usize,
    pub viewed:    usize,
    pub rate:      f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityClass {
    ReceivedAndTransacted,
    ReceivedNoTransaction,
    TransactedWithoutOffer,
    Inactive,
}

impl ActivityClass {
    pub fn classify(received: bool, transacted: bool) -> Self {
        match (received, transacted) {
            (true, true)   => Self::ReceivedAndTransacted,
            (true, false)  => Self::ReceivedNoTransaction,
            (false, true)  => Self::TransactedWithoutOffer,
            (false, false) => Self::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceivedAndTransacted  => "received_and_transacted",
            Self::ReceivedNoTransaction  => "received_no_transaction",
            Self::TransactedWithoutOffer => "transacted_without_offer",
            Self::Inactive               => "inactive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerActivity {
    pub person: PersonId,
    pub class:  ActivityClass,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub group_rates: Vec<GroupRate>,
    pub activity:    Vec<CustomerActivity>,
}

impl RunSummary {
    pub fn activity_count(&self, class: ActivityClass) -> usize {
        self.activity.iter().filter(|a| a.class == class).count()
    }

    pub fn rate(&self, scope: RateScope, dimension: &str, group: &str) -> Option<&GroupRate> {
        self.group_rates
            .iter()
            .find(|r| r.scope == scope && r.dimension == dimension && r.group == group)
    }
}

fn group_keys(row: &AttributedOffer, plan: &BinningPlan) -> [Option<String>; 9] {
    let bins = plan.bins_for(row);
    [
        Some(row.offer_name.clone()),
        Some(row.difficulty.to_string()),
        Some(row.duration.to_string()),
        Some(row.reward.to_string()),
        Some(row.gender.clone()),
        bins.age,
        bins.income,
        bins.membership,
        Some(row.member_year.clone()),
    ]
}

#[derive(Default)]
struct Tally {
    offers:    usize,
    completed: usize,
    viewed:    usize,
}

/// OCR per (scope, dimension, group). Groups are sorted within a dimension.
pub fn group_rates(rows: &[AttributedOffer], plan: &BinningPlan) -> Vec<GroupRate> {
    let mut tallies: BTreeMap<(RateScope, usize, String), Tally> = BTreeMap::new();

    for row in rows {
        let scopes = if row.viewed { &SCOPES[..] } else { &SCOPES[..1] };
        for (dim, key) in group_keys(row, plan).into_iter().enumerate() {
            let Some(group) = key else { continue };
            for &scope in scopes {
                let t = tallies.entry((scope, dim, group.clone())).or_default();
                t.offers += 1;
                t.completed += usize::from(row.is_completed());
                t.viewed += usize::from(row.viewed);
            }
        }
    }

    tallies
        .into_iter()
        .map(|((scope, dim, group), t)| GroupRate {
            scope,
            dimension: DIMENSIONS[dim].to_string(),
            group,
            offers:    t.offers,
            completed: t.completed,
            viewed:    t.viewed,
            rate:      if t.offers > 0 { t.completed as f64 / t.offers as f64 } else { 0.0 },
        })
        .collect()
}

/// Classify every profile by whether it received any offer and whether it
/// made any transaction.
pub fn customer_activity(tables: &NormalizedTables) -> Vec<CustomerActivity> {
    let mut received: HashSet<&str> = HashSet::new();
    let mut transacted: HashSet<&str> = HashSet::new();
    for e in &tables.events {
        match e.kind {
            EventKind::OfferReceived => { received.insert(e.person.as_str()); }
            EventKind::Transaction   => { transacted.insert(e.person.as_str()); }
            _ => {}
        }
    }

    tables
        .customers
        .iter()
        .map(|c| CustomerActivity {
            person: c.id.clone(),
            class:  ActivityClass::classify(
                received.contains(c.id.as_str()),
                transacted.contains(c.id.as_str()),
            ),
        })
        .collect()
}

pub struct SummaryStage;

impl PipelineStage for SummaryStage {
    fn name(&self) -> &'static str { "summary" }

    fn run(
        &mut self,
        ctx: &StageContext<'_>,
        artifacts: &mut RunArtifacts,
        _rng: &mut StageRng,
    ) -> PipelineResult<StageOutcome> {
        let rows = artifacts.attributed.as_ref().ok_or(PipelineError::MissingPrecursor {
            stage:    "summary",
            artifact: "attributed offers",
        })?;
        let plan = artifacts.binning.as_ref().ok_or(PipelineError::MissingPrecursor {
            stage:    "summary",
            artifact: "binning plan",
        })?;
        let tables = artifacts.tables.as_ref().ok_or(PipelineError::MissingPrecursor {
            stage:    "summary",
            artifact: "normalized tables",
        })?;

        let summary = RunSummary {
            group_rates: group_rates(rows, plan),
            activity:    customer_activity(tables),
        };
        ctx.store.insert_group_rates(ctx.run_id, &summary.group_rates)?;
        ctx.store.insert_customer_activity(ctx.run_id, &summary.activity)?;

        log::info!(
            "summary: {} group rates; customers {} received+transacted, {} received only, \
             {} transacted only, {} inactive",
            summary.group_rates.len(),
            summary.activity_count(ActivityClass::ReceivedAndTransacted),
            summary.activity_count(ActivityClass::ReceivedNoTransaction),
            summary.activity_count(ActivityClass::TransactedWithoutOffer),
            summary.activity_count(ActivityClass::Inactive),
        );

        let outcome = StageOutcome {
            rows_out:     summary.group_rates.len() + summary.activity.len(),
            rows_dropped: 0,
        };
        artifacts.summary = Some(summary);
        Ok(outcome)
    }
}
