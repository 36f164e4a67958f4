//! Attribution engine, part one — completion detection.
//!
//! For every "offer received" event:
//!   1. open an exposure window [receipt, receipt + duration×24]
//!   2. aggregate the customer's transactions inside the window
//!   3. decide completion by offer type
//!        discount      : sum of spend  >= difficulty
//!        bogo          : max one spend >  difficulty   (strict)
//!        informational : no completion concept
//!   4. resolve the completion time as the earliest "offer completed"
//!      event for (customer, offer) inside the window
//!   5. re-aggregate spend up to that completion time
//!
//! RULE: Only events whose timestamp lies inside a window's inclusive
//! bounds contribute to that window. Input order is never consulted.
//!
//! The bogo/discount asymmetry is business logic and must stay as is.

use crate::{
    error::{PipelineError, PipelineResult},
    event::{EventKind, TranscriptEvent},
    preprocess::{Customer, NormalizedTables, Offer, OfferType},
    rng::StageRng,
    stage::{PipelineStage, RunArtifacts, StageContext, StageOutcome},
    types::{Hours, OfferId, PersonId},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Identity of one exposure window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub person:      PersonId,
    pub received_at: Hours,
    pub offer_id:    OfferId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureWindow {
    pub person:      PersonId,
    pub offer_id:    OfferId,
    pub received_at: Hours,
    pub deadline:    Hours,
}

impl ExposureWindow {
    pub fn open(person: &str, offer: &Offer, received_at: Hours) -> Self {
        Self {
            person:      person.to_string(),
            offer_id:    offer.id.clone(),
            received_at,
            deadline:    received_at.saturating_add(offer.window_hours()),
        }
    }

    pub fn contains(&self, t: Hours) -> bool {
        self.received_at <= t && t <= self.deadline
    }

    pub fn key(&self) -> WindowKey {
        WindowKey {
            person:      self.person.clone(),
            received_at: self.received_at,
            offer_id:    self.offer_id.clone(),
        }
    }
}

/// Spend observed over a time range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendAggregate {
    pub total:      f64,
    pub max_single: f64,
    pub count:      usize,
}

impl SpendAggregate {
    /// Aggregate `(time, amount)` pairs with from <= time <= to.
    /// `transactions` must be sorted by time.
    pub fn over(transactions: &[(Hours, f64)], from: Hours, to: Hours) -> Self {
        let start = transactions.partition_point(|(t, _)| *t < from);
        transactions[start..]
            .iter()
            .take_while(|(t, _)| *t <= to)
            .fold(Self::default(), |mut acc, &(_, amount)| {
                acc.total += amount;
                acc.max_single = acc.max_single.max(amount);
                acc.count += 1;
                acc
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    NotCompleted,
    /// Informational offers have nothing to complete.
    Informational,
}

impl CompletionStatus {
    /// 1 / 0 / -1, the flag value used in exported tables.
    pub fn code(&self) -> i32 {
        match self {
            Self::Completed     => 1,
            Self::NotCompleted  => 0,
            Self::Informational => -1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1  => Some(Self::Completed),
            0  => Some(Self::NotCompleted),
            -1 => Some(Self::Informational),
            _  => None,
        }
    }
}

/// Apply the type-dependent completion rule to a window's spend.
pub fn completion_status(offer_type: OfferType, difficulty: u32, spend: &SpendAggregate) -> CompletionStatus {
    let threshold = f64::from(difficulty);
    let met = match offer_type {
        OfferType::Discount      => spend.total >= threshold,
        OfferType::Bogo          => spend.max_single > threshold,
        OfferType::Informational => return CompletionStatus::Informational,
    };
    if met {
        CompletionStatus::Completed
    } else {
        CompletionStatus::NotCompleted
    }
}

/// Per-customer lookups over the transcript, each list sorted by time.
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    transactions: HashMap<PersonId, Vec<(Hours, f64)>>,
    completions:  HashMap<PersonId, HashMap<OfferId, Vec<Hours>>>,
    views:        HashMap<PersonId, HashMap<OfferId, Vec<Hours>>>,
}

impl EventIndex {
    pub fn build(events: &[TranscriptEvent]) -> Self {
        let mut index = Self::default();

        for e in events {
            match (&e.kind, &e.offer_id, e.amount) {
                (EventKind::Transaction, _, Some(amount)) => {
                    index.transactions.entry(e.person.clone()).or_default().push((e.time, amount));
                }
                (EventKind::OfferCompleted, Some(offer_id), _) => {
                    index.completions
                        .entry(e.person.clone()).or_default()
                        .entry(offer_id.clone()).or_default()
                        .push(e.time);
                }
                (EventKind::OfferViewed, Some(offer_id), _) => {
                    index.views
                        .entry(e.person.clone()).or_default()
                        .entry(offer_id.clone()).or_default()
                        .push(e.time);
                }
                _ => {}
            }
        }

        for txns in index.transactions.values_mut() {
            txns.sort_by_key(|(t, _)| *t);
        }
        for per_offer in index.completions.values_mut().chain(index.views.values_mut()) {
            for times in per_offer.values_mut() {
                times.sort_unstable();
            }
        }
        index
    }

    pub fn transactions(&self, person: &str) -> &[(Hours, f64)] {
        self.transactions.get(person).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Earliest "offer completed" time with from <= t <= to.
    pub fn first_completion(&self, person: &str, offer_id: &str, from: Hours, to: Hours) -> Option<Hours> {
        first_in_range(lookup(&self.completions, person, offer_id), from, to)
    }

    /// Earliest "offer viewed" time with from <= t <= to.
    pub fn first_view(&self, person: &str, offer_id: &str, from: Hours, to: Hours) -> Option<Hours> {
        first_in_range(lookup(&self.views, person, offer_id), from, to)
    }
}

fn lookup<'a>(map: &'a HashMap<PersonId, HashMap<OfferId, Vec<Hours>>>, person: &str, offer_id: &str) -> &'a [Hours] {
    map.get(person)
        .and_then(|per_offer| per_offer.get(offer_id))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn first_in_range(sorted: &[Hours], from: Hours, to: Hours) -> Option<Hours> {
    if from > to {
        return None;
    }
    let idx = sorted.partition_point(|t| *t < from);
    sorted.get(idx).copied().filter(|t| *t <= to)
}

/// Completion facts for one exposure window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowCompletion {
    pub window:                 ExposureWindow,
    pub offer_type:             OfferType,
    pub status:                 CompletionStatus,
    pub spend:                  SpendAggregate,
    pub completed_at:           Option<Hours>,
    pub spend_until_completion: Option<SpendAggregate>,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionDetection {
    pub windows: Vec<WindowCompletion>,
    /// Received events with no offer id or an offer id missing from the catalog.
    pub skipped_received: usize,
    /// Received events repeating an existing (customer, offer, receipt) key.
    pub duplicate_received: usize,
}

/// Evaluate every received offer. Output is ordered by (customer, receipt, offer).
pub fn detect_completions(offers: &[Offer], events: &[TranscriptEvent], index: &EventIndex) -> CompletionDetection {
    let catalog: HashMap<&str, &Offer> = offers.iter().map(|o| (o.id.as_str(), o)).collect();
    let mut seen: HashSet<WindowKey> = HashSet::new();
    let mut out = CompletionDetection::default();

    for e in events.iter().filter(|e| e.kind == EventKind::OfferReceived) {
        let Some(offer) = e.offer_id.as_deref().and_then(|id| catalog.get(id)) else {
            out.skipped_received += 1;
            continue;
        };

        let window = ExposureWindow::open(&e.person, offer, e.time);
        if !seen.insert(window.key()) {
            out.duplicate_received += 1;
            continue;
        }

        let txns = index.transactions(&e.person);
        let spend = SpendAggregate::over(txns, window.received_at, window.deadline);
        let status = completion_status(offer.offer_type, offer.difficulty, &spend);

        let completed_at = match status {
            CompletionStatus::Completed => index.first_completion(
                &window.person, &window.offer_id, window.received_at, window.deadline,
            ),
            _ => None,
        };
        let spend_until_completion =
            completed_at.map(|done| SpendAggregate::over(txns, window.received_at, done));

        out.windows.push(WindowCompletion {
            window,
            offer_type: offer.offer_type,
            status,
            spend,
            completed_at,
            spend_until_completion,
        });
    }

    out.windows.sort_by_cached_key(|w| w.window.key());

    if out.skipped_received > 0 {
        log::warn!(
            "attribution: skipped {} received events without a catalog offer",
            out.skipped_received
        );
    }
    out
}

/// A non-informational window joined with its offer and customer.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferAttribution {
    pub completion: WindowCompletion,
    pub offer:      Offer,
    pub customer:   Customer,
}

#[derive(Debug, Clone, Default)]
pub struct AttributionTable {
    pub rows:                 Vec<OfferAttribution>,
    pub informational:        usize,
    /// Data-quality filter: customer unknown, or gender/income missing.
    pub missing_demographics: usize,
}

/// Join windows with offer and customer records, excluding informational
/// offers and customers without the demographic fields.
pub fn attribute(tables: &NormalizedTables, completions: Vec<WindowCompletion>) -> AttributionTable {
    let catalog: HashMap<&str, &Offer> = tables.offers.iter().map(|o| (o.id.as_str(), o)).collect();
    let customers: HashMap<&str, &Customer> =
        tables.customers.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut table = AttributionTable::default();
    for completion in completions {
        if completion.status == CompletionStatus::Informational {
            table.informational += 1;
            continue;
        }
        let customer = customers
            .get(completion.window.person.as_str())
            .filter(|c| c.has_demographics());
        let (Some(customer), Some(offer)) = (customer, catalog.get(completion.window.offer_id.as_str())) else {
            table.missing_demographics += 1;
            continue;
        };
        table.rows.push(OfferAttribution {
            offer:    (*offer).clone(),
            customer: (*customer).clone(),
            completion,
        });
    }
    table
}

pub struct AttributionStage;

impl PipelineStage for AttributionStage {
    fn name(&self) -> &'static str { "attribution" }

    fn run(
        &mut self,
        _ctx: &StageContext<'_>,
        artifacts: &mut RunArtifacts,
        _rng: &mut StageRng,
    ) -> PipelineResult<StageOutcome> {
        let tables = artifacts.tables.as_ref().ok_or(PipelineError::MissingPrecursor {
            stage:    "attribution",
            artifact: "normalized tables",
        })?;

        let index = EventIndex::build(&tables.events);
        let detection = detect_completions(&tables.offers, &tables.events, &index);
        let window_count = detection.windows.len();
        let table = attribute(tables, detection.windows);

        let completed = table
            .rows
            .iter()
            .filter(|r| r.completion.status == CompletionStatus::Completed)
            .count();
        log::info!(
            "attribution: {window_count} windows, {} attributed ({completed} completed), \
             {} informational excluded, {} dropped by demographic filter",
            table.rows.len(),
            table.informational,
            table.missing_demographics
        );
        log::debug!(
            "attribution: {} duplicate received events collapsed",
            detection.duplicate_received
        );

        let outcome = StageOutcome {
            rows_out:     table.rows.len(),
            rows_dropped: detection.skipped_received + table.informational + table.missing_demographics,
        };
        artifacts.event_index = Some(index);
        artifacts.attributions = Some(table.rows);
        Ok(outcome)
    }
}
