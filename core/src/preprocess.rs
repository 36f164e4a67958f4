//! Preprocessor — normalizes the raw offer, profile and event tables.
//!
//!   - Offers:    channel list → four indicator flags, synthesized offer name
//!   - Customers: enrollment date → membership duration and date parts
//!   - Events:    polymorphic payload → offer id / amount / reward columns
//!
//! The reference date for membership duration is injected from config.

use crate::{
    error::{PipelineError, PipelineResult},
    event::{EventKind, EventPayload, TranscriptEvent},
    input::{RawEvent, RawOffer, RawProfile, RawTables},
    rng::StageRng,
    stage::{PipelineStage, RunArtifacts, StageContext, StageOutcome},
    types::{Hours, OfferId, PersonId, HOURS_PER_DAY},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    Bogo,
    Discount,
    Informational,
}

impl OfferType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "bogo"          => Some(Self::Bogo),
            "discount"      => Some(Self::Discount),
            "informational" => Some(Self::Informational),
            _               => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bogo          => "bogo",
            Self::Discount      => "discount",
            Self::Informational => "informational",
        }
    }

    /// First letter of the type name, used in offer names.
    pub fn initial(&self) -> char {
        match self {
            Self::Bogo          => 'b',
            Self::Discount      => 'd',
            Self::Informational => 'i',
        }
    }
}

pub const CHANNELS: [&str; 4] = ["web", "email", "mobile", "social"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFlags {
    pub web:    bool,
    pub email:  bool,
    pub mobile: bool,
    pub social: bool,
}

impl ChannelFlags {
    pub fn from_channels<S: AsRef<str>>(channels: &[S]) -> Self {
        let has = |name: &str| channels.iter().any(|c| c.as_ref() == name);
        Self {
            web:    has("web"),
            email:  has("email"),
            mobile: has("mobile"),
            social: has("social"),
        }
    }

    /// The channel list these flags were expanded from, in canonical order.
    pub fn channels(&self) -> Vec<&'static str> {
        CHANNELS
            .iter()
            .zip(self.indicators())
            .filter(|(_, on)| *on == 1)
            .map(|(name, _)| *name)
            .collect()
    }

    /// 0/1 indicators in web, email, mobile, social order.
    pub fn indicators(&self) -> [u8; 4] {
        [self.web, self.email, self.mobile, self.social].map(u8::from)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id:         OfferId,
    pub offer_type: OfferType,
    pub reward:     u32,
    pub difficulty: u32,
    /// Days.
    pub duration:   u32,
    pub channels:   ChannelFlags,
    /// e.g. `r5/di20/du10/td`
    pub name:       String,
}

impl Offer {
    /// Length of the exposure window in hours.
    pub fn window_hours(&self) -> Hours {
        self.duration.saturating_mul(HOURS_PER_DAY)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id:              PersonId,
    pub gender:          Option<String>,
    pub age:             u32,
    pub income:          Option<f64>,
    pub member_since:    NaiveDate,
    /// Absolute days between enrollment and the reference date.
    pub membership_days: u32,
    pub member_year:     String,
    pub member_month:    String,
    pub member_day:      String,
}

impl Customer {
    /// Both demographic fields the attribution table requires are present.
    pub fn has_demographics(&self) -> bool {
        self.gender.is_some() && self.income.is_some()
    }
}

pub fn offer_name(reward: u32, difficulty: u32, duration: u32, offer_type: OfferType) -> String {
    format!("r{reward}/di{difficulty}/du{duration}/t{}", offer_type.initial())
}

pub fn preprocess_offer(raw: &RawOffer) -> PipelineResult<Offer> {
    let offer_type = OfferType::parse(&raw.offer_type).ok_or_else(|| {
        PipelineError::UnknownOfferType {
            offer_id: raw.id.clone(),
            value:    raw.offer_type.clone(),
        }
    })?;

    Ok(Offer {
        id:         raw.id.clone(),
        offer_type,
        reward:     raw.reward,
        difficulty: raw.difficulty,
        duration:   raw.duration,
        channels:   ChannelFlags::from_channels(&raw.channels),
        name:       offer_name(raw.reward, raw.difficulty, raw.duration, offer_type),
    })
}

pub fn preprocess_profile(raw: &RawProfile, reference_date: NaiveDate) -> PipelineResult<Customer> {
    let text = raw.became_member_on.as_text();
    let member_since = NaiveDate::parse_from_str(&text, "%Y%m%d").map_err(|_| {
        PipelineError::InvalidMemberDate {
            customer_id: raw.id.clone(),
            value:       text.clone(),
        }
    })?;

    let days = (reference_date - member_since).num_days().unsigned_abs();

    Ok(Customer {
        id:              raw.id.clone(),
        gender:          raw.gender.clone().filter(|g| !g.is_empty()),
        age:             raw.age,
        income:          raw.income,
        member_since,
        membership_days: u32::try_from(days).unwrap_or(u32::MAX),
        member_year:     member_since.year().to_string(),
        member_month:    member_since.month().to_string(),
        member_day:      member_since.day().to_string(),
    })
}

pub fn preprocess_event(raw: &RawEvent) -> TranscriptEvent {
    let payload = EventPayload::extract(&raw.value);
    TranscriptEvent {
        person:   raw.person.clone(),
        kind:     EventKind::parse(&raw.event),
        time:     raw.time,
        offer_id: payload.offer_id,
        amount:   payload.amount,
        reward:   payload.reward,
    }
}

/// The three normalized tables every later stage reads.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTables {
    pub offers:    Vec<Offer>,
    pub customers: Vec<Customer>,
    pub events:    Vec<TranscriptEvent>,
}

impl NormalizedTables {
    pub fn from_raw(raw: &RawTables, reference_date: NaiveDate) -> PipelineResult<Self> {
        let offers = raw.offers.iter().map(preprocess_offer).collect::<PipelineResult<Vec<_>>>()?;
        let customers = raw
            .profiles
            .iter()
            .map(|p| preprocess_profile(p, reference_date))
            .collect::<PipelineResult<Vec<_>>>()?;
        let events = raw.events.iter().map(preprocess_event).collect();

        Ok(Self { offers, customers, events })
    }
}

pub struct PreprocessStage;

impl PipelineStage for PreprocessStage {
    fn name(&self) -> &'static str { "preprocess" }

    fn run(
        &mut self,
        ctx: &StageContext<'_>,
        artifacts: &mut RunArtifacts,
        _rng: &mut StageRng,
    ) -> PipelineResult<StageOutcome> {
        let raw = artifacts.raw.take().ok_or(PipelineError::MissingPrecursor {
            stage:    "preprocess",
            artifact: "raw input tables",
        })?;

        let tables = NormalizedTables::from_raw(&raw, ctx.config.reference_date)?;

        ctx.store.insert_offers(ctx.run_id, &tables.offers)?;
        ctx.store.insert_customers(ctx.run_id, &tables.customers)?;
        ctx.store.insert_events(ctx.run_id, &tables.events)?;

        log::info!(
            "preprocess: {} offers, {} customers, {} events (reference date {})",
            tables.offers.len(),
            tables.customers.len(),
            tables.events.len(),
            ctx.config.reference_date
        );

        let rows_out = tables.offers.len() + tables.customers.len() + tables.events.len();
        artifacts.tables = Some(tables);
        Ok(StageOutcome { rows_out, rows_dropped: 0 })
    }
}
