//! Transcript events — the unordered event log attribution works from.
//!
//! RULE: Timestamp is the only ordering signal. Nothing downstream may
//! rely on the position of an event in the input file.

use crate::types::{Hours, OfferId, PersonId};
use serde_json::Value;

/// The four event kinds the transcript carries.
/// Unknown names are kept verbatim so they survive a store round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    OfferReceived,
    OfferViewed,
    OfferCompleted,
    Transaction,
    Other(String),
}

impl EventKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "offer received"  => Self::OfferReceived,
            "offer viewed"    => Self::OfferViewed,
            "offer completed" => Self::OfferCompleted,
            "transaction"     => Self::Transaction,
            other             => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::OfferReceived  => "offer received",
            Self::OfferViewed    => "offer viewed",
            Self::OfferCompleted => "offer completed",
            Self::Transaction    => "transaction",
            Self::Other(name)    => name,
        }
    }
}

/// The fields attribution needs out of the polymorphic event payload.
/// Whatever is absent (or has the wrong JSON type) is None.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPayload {
    pub offer_id: Option<OfferId>,
    pub amount:   Option<f64>,
    pub reward:   Option<f64>,
}

impl EventPayload {
    /// Pull offer id, amount and reward out of a raw payload.
    ///
    /// The offer id appears as `offer id` on received/viewed events and as
    /// `offer_id` on completed events.
    pub fn extract(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        let offer_id = match map.get("offer id") {
            Some(v) => v.as_str(),
            None    => map.get("offer_id").and_then(Value::as_str),
        }
        .map(str::to_string);

        Self {
            offer_id,
            amount: map.get("amount").and_then(Value::as_f64),
            reward: map.get("reward").and_then(Value::as_f64),
        }
    }
}

/// One normalized transcript row.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    pub person:   PersonId,
    pub kind:     EventKind,
    pub time:     Hours,
    pub offer_id: Option<OfferId>,
    pub amount:   Option<f64>,
    pub reward:   Option<f64>,
}
