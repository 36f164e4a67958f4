use chrono::NaiveDate;
use offer_attribution_core::{
    attribution::{attribute, detect_completions, EventIndex},
    event::{EventKind, TranscriptEvent},
    preprocess::{offer_name, ChannelFlags, Customer, NormalizedTables, Offer, OfferType},
    view_detection::{detect_views, AttributedOffer, ViewTiming},
};

// ── Test helpers ────────────────────────────────────────────────────────────

fn tables(events: Vec<TranscriptEvent>) -> NormalizedTables {
    let discount = Offer {
        id:         "d".into(),
        offer_type: OfferType::Discount,
        reward:     2,
        difficulty: 10,
        duration:   7,
        channels:   ChannelFlags::from_channels(&["email", "mobile"]),
        name:       offer_name(2, 10, 7, OfferType::Discount),
    };
    let customer = Customer {
        id:              "p".into(),
        gender:          Some("M".into()),
        age:             33,
        income:          Some(48_000.0),
        member_since:    NaiveDate::from_ymd_opt(2018, 7, 26).unwrap(),
        membership_days: 1224,
        member_year:     "2018".into(),
        member_month:    "7".into(),
        member_day:      "26".into(),
    };
    NormalizedTables { offers: vec![discount], customers: vec![customer], events }
}

fn ev(kind: EventKind, time: u32, amount: Option<f64>) -> TranscriptEvent {
    let offer_id = match kind {
        EventKind::Transaction => None,
        _ => Some("d".to_string()),
    };
    TranscriptEvent { person: "p".into(), kind, time, offer_id, amount, reward: None }
}

fn run(events: Vec<TranscriptEvent>) -> Vec<AttributedOffer> {
    let tables = tables(events);
    let index = EventIndex::build(&tables.events);
    let detection = detect_completions(&tables.offers, &tables.events, &index);
    let attributed = attribute(&tables, detection.windows);
    detect_views(attributed.rows, &index)
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Received t=0, viewed t=6, spend 12 at t=12 with a completion at t=12:
/// the view came first, so the offer influenced the purchase.
#[test]
fn view_before_completion_counts() {
    let rows = run(vec![
        ev(EventKind::OfferReceived, 0, None),
        ev(EventKind::OfferViewed, 6, None),
        ev(EventKind::Transaction, 12, Some(12.0)),
        ev(EventKind::OfferCompleted, 12, None),
    ]);
    assert_eq!(rows.len(), 1);
    let r = &rows[0];
    assert!(r.is_completed());
    assert!(r.viewed);
    assert_eq!(r.view_timing, ViewTiming::BeforeCompletion);
    assert_eq!(r.first_viewed_at, Some(6));
    assert_eq!(r.completion_time_code(), Some(12));
}

/// Same purchase, but the offer was only opened at t=24, after completing:
/// completed without being influenced.
#[test]
fn view_after_completion_does_not_count() {
    let rows = run(vec![
        ev(EventKind::OfferReceived, 0, None),
        ev(EventKind::Transaction, 12, Some(12.0)),
        ev(EventKind::OfferCompleted, 12, None),
        ev(EventKind::OfferViewed, 24, None),
    ]);
    let r = &rows[0];
    assert!(r.is_completed());
    assert!(!r.viewed);
    assert_eq!(r.view_timing, ViewTiming::AfterCompletion);
    assert_eq!(r.first_viewed_at, Some(24));
}

/// A view at the completion hour itself is still before completion.
#[test]
fn view_at_completion_time_counts() {
    let rows = run(vec![
        ev(EventKind::OfferReceived, 0, None),
        ev(EventKind::Transaction, 12, Some(12.0)),
        ev(EventKind::OfferCompleted, 12, None),
        ev(EventKind::OfferViewed, 12, None),
    ]);
    assert_eq!(rows[0].view_timing, ViewTiming::BeforeCompletion);
}

/// Not-completed windows are viewed iff a view lies before the deadline.
#[test]
fn not_completed_views_respect_deadline() {
    let within = run(vec![
        ev(EventKind::OfferReceived, 0, None),
        ev(EventKind::OfferViewed, 168, None),
    ]);
    assert!(!within[0].is_completed());
    assert_eq!(within[0].view_timing, ViewTiming::WithinWindow);
    assert!(within[0].viewed);
    assert_eq!(within[0].completion_time_code(), Some(-1));

    let late = run(vec![
        ev(EventKind::OfferReceived, 0, None),
        ev(EventKind::OfferViewed, 169, None),
    ]);
    assert_eq!(late[0].view_timing, ViewTiming::NotViewed);
    assert!(!late[0].viewed);
    assert_eq!(late[0].first_viewed_at, None);
}

/// Completed rows come first, and each window yields exactly one row
/// even when the offer was viewed several times.
#[test]
fn completed_rows_first_and_one_row_per_window() {
    let rows = run(vec![
        ev(EventKind::OfferReceived, 0, None),
        ev(EventKind::OfferViewed, 1, None),
        ev(EventKind::OfferViewed, 2, None),
        ev(EventKind::OfferReceived, 300, None),
        ev(EventKind::OfferViewed, 301, None),
        ev(EventKind::Transaction, 310, Some(25.0)),
        ev(EventKind::OfferCompleted, 310, None),
    ]);
    assert_eq!(rows.len(), 2);
    assert!(rows[0].is_completed());
    assert_eq!(rows[0].received_at, 300);
    assert_eq!(rows[0].first_viewed_at, Some(301));
    assert!(!rows[1].is_completed());
    assert_eq!(rows[1].first_viewed_at, Some(1));
}

/// A completed window with no completion event in range has no completion
/// time, and no view is attributed to it.
#[test]
fn completed_without_event_is_not_viewed() {
    let rows = run(vec![
        ev(EventKind::OfferReceived, 0, None),
        ev(EventKind::OfferViewed, 3, None),
        ev(EventKind::Transaction, 12, Some(12.0)),
    ]);
    assert!(rows[0].is_completed());
    assert_eq!(rows[0].completed_at, None);
    assert_eq!(rows[0].completion_time_code(), None);
    assert_eq!(rows[0].view_timing, ViewTiming::NotViewed);
    assert_eq!(rows[0].sum_until_completion, None);
}
