//! Attribution engine, part two — view detection.
//!
//! Two disjoint paths over the attributed windows:
//!   completed     : viewed iff a view lies in [receipt, completion time]
//!   not completed : viewed iff a view lies in [receipt, deadline]
//!
//! Both paths emit the same record type; completed rows come first.
//! Only the earliest qualifying view per window is kept.

use crate::{
    attribution::{CompletionStatus, EventIndex, OfferAttribution},
    error::{PipelineError, PipelineResult},
    preprocess::{ChannelFlags, OfferType},
    rng::StageRng,
    stage::{PipelineStage, RunArtifacts, StageContext, StageOutcome},
    types::{Hours, OfferId, PersonId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewTiming {
    /// Completed window, viewed no later than the completion.
    BeforeCompletion,
    /// Completed window, first seen only after it was already completed.
    AfterCompletion,
    /// Not-completed window, viewed before the deadline.
    WithinWindow,
    NotViewed,
}

impl ViewTiming {
    /// Whether the window counts as viewed. A view after completion does not.
    pub fn viewed(&self) -> bool {
        matches!(self, Self::BeforeCompletion | Self::WithinWindow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeCompletion => "before_completion",
            Self::AfterCompletion  => "after_completion",
            Self::WithinWindow     => "within_window",
            Self::NotViewed        => "not_viewed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "before_completion" => Some(Self::BeforeCompletion),
            "after_completion"  => Some(Self::AfterCompletion),
            "within_window"     => Some(Self::WithinWindow),
            "not_viewed"        => Some(Self::NotViewed),
            _                   => None,
        }
    }
}

/// One row of the final attributed-offer table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedOffer {
    pub person:                 PersonId,
    pub offer_id:               OfferId,
    pub received_at:            Hours,
    pub deadline:               Hours,

    pub offer_type:             OfferType,
    pub offer_name:             String,
    pub reward:                 u32,
    pub difficulty:             u32,
    pub duration:               u32,
    pub channels:               ChannelFlags,

    pub status:                 CompletionStatus,
    pub completed_at:           Option<Hours>,
    pub viewed:                 bool,
    pub view_timing:            ViewTiming,
    pub first_viewed_at:        Option<Hours>,

    pub amount_sum:             f64,
    pub amount_max:             f64,
    pub transaction_count:      usize,
    pub sum_until_completion:   Option<f64>,
    pub count_until_completion: Option<usize>,

    pub gender:                 String,
    pub age:                    u32,
    pub income:                 f64,
    pub membership_days:        u32,
    pub member_year:            String,
}

impl AttributedOffer {
    fn from_attribution(attr: OfferAttribution, view_timing: ViewTiming, first_viewed_at: Option<Hours>) -> Self {
        let OfferAttribution { completion, offer, customer } = attr;
        let until = completion.spend_until_completion;
        Self {
            person:                 completion.window.person,
            offer_id:               completion.window.offer_id,
            received_at:            completion.window.received_at,
            deadline:               completion.window.deadline,

            offer_type:             offer.offer_type,
            offer_name:             offer.name,
            reward:                 offer.reward,
            difficulty:             offer.difficulty,
            duration:               offer.duration,
            channels:               offer.channels,

            status:                 completion.status,
            completed_at:           completion.completed_at,
            viewed:                 view_timing.viewed(),
            view_timing,
            first_viewed_at,

            amount_sum:             completion.spend.total,
            amount_max:             completion.spend.max_single,
            transaction_count:      completion.spend.count,
            sum_until_completion:   until.map(|s| s.total),
            count_until_completion: until.map(|s| s.count),

            gender:                 customer.gender.unwrap_or_default(),
            age:                    customer.age,
            income:                 customer.income.unwrap_or_default(),
            membership_days:        customer.membership_days,
            member_year:            customer.member_year,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CompletionStatus::Completed
    }

    /// Completion time for export: -1 on not-completed rows,
    /// None for a completed row whose completion event fell outside the window.
    pub fn completion_time_code(&self) -> Option<i64> {
        match (self.status, self.completed_at) {
            (CompletionStatus::Completed, at) => at.map(i64::from),
            _ => Some(-1),
        }
    }
}

/// Classify views for every attributed window.
pub fn detect_views(attributions: Vec<OfferAttribution>, index: &EventIndex) -> Vec<AttributedOffer> {
    let (completed, not_completed): (Vec<_>, Vec<_>) = attributions
        .into_iter()
        .partition(|a| a.completion.status == CompletionStatus::Completed);

    let mut out = Vec::with_capacity(completed.len() + not_completed.len());

    for attr in completed {
        let w = &attr.completion.window;
        let (timing, first) = match attr.completion.completed_at {
            Some(done) => match index.first_view(&w.person, &w.offer_id, w.received_at, done) {
                Some(v) => (ViewTiming::BeforeCompletion, Some(v)),
                None => match index.first_view(&w.person, &w.offer_id, done.saturating_add(1), w.deadline) {
                    Some(v) => (ViewTiming::AfterCompletion, Some(v)),
                    None    => (ViewTiming::NotViewed, None),
                },
            },
            None => (ViewTiming::NotViewed, None),
        };
        out.push(AttributedOffer::from_attribution(attr, timing, first));
    }

    for attr in not_completed {
        let w = &attr.completion.window;
        let (timing, first) = match index.first_view(&w.person, &w.offer_id, w.received_at, w.deadline) {
            Some(v) => (ViewTiming::WithinWindow, Some(v)),
            None    => (ViewTiming::NotViewed, None),
        };
        out.push(AttributedOffer::from_attribution(attr, timing, first));
    }

    out
}

pub struct ViewDetectionStage;

impl PipelineStage for ViewDetectionStage {
    fn name(&self) -> &'static str { "view_detection" }

    fn run(
        &mut self,
        ctx: &StageContext<'_>,
        artifacts: &mut RunArtifacts,
        _rng: &mut StageRng,
    ) -> PipelineResult<StageOutcome> {
        let attributions = artifacts.attributions.take().ok_or(PipelineError::MissingPrecursor {
            stage:    "view_detection",
            artifact: "attributed windows",
        })?;
        let index = artifacts.event_index.as_ref().ok_or(PipelineError::MissingPrecursor {
            stage:    "view_detection",
            artifact: "event index",
        })?;

        let rows = detect_views(attributions, index);
        ctx.store.insert_attributed_offers(ctx.run_id, &rows)?;

        let viewed = rows.iter().filter(|r| r.viewed).count();
        log::info!("view_detection: {} rows, {viewed} viewed", rows.len());

        let outcome = StageOutcome { rows_out: rows.len(), rows_dropped: 0 };
        artifacts.attributed = Some(rows);
        Ok(outcome)
    }
}
