//! Synthetic transcript shared by the end-to-end tests.
//!
//! 80 profiled customers, a bogo, a discount and an informational offer.
//! Behaviour cycles with the customer index (i % 4):
//!   0: views both offers, then completes both        → 2 positive rows
//!   1: completes the bogo without viewing anything
//!   2: views both offers, never buys
//!   3: ignores the offers, buys once much later
//! Every tenth customer (i % 10 == 9) lacks gender and income.
//! Three idle profiles and two walk-in buyers never receive an offer.
#![allow(dead_code)]

use offer_attribution_core::input::{RawDate, RawEvent, RawOffer, RawProfile, RawTables};
use serde_json::json;
use std::{fs, path::Path};

pub const BOGO: &str = "bogo-1";
pub const DISCOUNT: &str = "disc-1";
pub const INFO: &str = "info-1";

pub const PROFILED: usize = 80;
/// Customers with demographics: 80 minus the 8 with i % 10 == 9.
pub const ATTRIBUTABLE: usize = 72;

fn offers() -> Vec<RawOffer> {
    let offer = |id: &str, offer_type: &str, reward, difficulty, duration, channels: &[&str]| RawOffer {
        id:         id.into(),
        offer_type: offer_type.into(),
        reward,
        difficulty,
        duration,
        channels:   channels.iter().map(|c| c.to_string()).collect(),
    };
    vec![
        offer(BOGO, "bogo", 5, 5, 7, &["web", "email", "mobile"]),
        offer(DISCOUNT, "discount", 2, 10, 7, &["web", "email"]),
        offer(INFO, "informational", 0, 0, 3, &["email", "social"]),
    ]
}

fn profile(id: String, i: usize) -> RawProfile {
    let complete = i % 10 != 9;
    RawProfile {
        id,
        gender:           complete.then(|| ["F", "M", "O"][i % 3].to_string()),
        age:              20 + (i as u32 * 7) % 70,
        income:           complete.then(|| 30_000.0 + ((i * 1375) % 90_000) as f64),
        became_member_on: RawDate::Number(
            format!("{}{:02}{:02}", 2014 + i % 5, 1 + i % 12, 1 + i % 28).parse().unwrap(),
        ),
    }
}

fn event(person: &str, name: &str, time: u32, value: serde_json::Value) -> RawEvent {
    RawEvent { person: person.into(), event: name.into(), time, value }
}

pub fn customer_id(i: usize) -> String {
    format!("c{i:03}")
}

pub fn synthetic_tables() -> RawTables {
    let mut profiles = Vec::new();
    let mut events = Vec::new();

    for i in 0..PROFILED {
        let id = customer_id(i);
        profiles.push(profile(id.clone(), i));

        events.push(event(&id, "offer received", 0, json!({"offer id": BOGO})));
        events.push(event(&id, "offer received", 168, json!({"offer id": DISCOUNT})));
        match i % 4 {
            0 => {
                events.push(event(&id, "offer viewed", 2, json!({"offer id": BOGO})));
                events.push(event(&id, "transaction", 10, json!({"amount": 8.0})));
                events.push(event(&id, "offer completed", 10, json!({"offer_id": BOGO, "reward": 5})));
                events.push(event(&id, "offer viewed", 170, json!({"offer id": DISCOUNT})));
                events.push(event(&id, "transaction", 200, json!({"amount": 12.0})));
                events.push(event(&id, "offer completed", 200, json!({"offer_id": DISCOUNT, "reward": 2})));
            }
            1 => {
                events.push(event(&id, "transaction", 10, json!({"amount": 8.0})));
                events.push(event(&id, "offer completed", 10, json!({"offer_id": BOGO, "reward": 5})));
            }
            2 => {
                events.push(event(&id, "offer viewed", 2, json!({"offer id": BOGO})));
                events.push(event(&id, "offer viewed", 300, json!({"offer id": DISCOUNT})));
            }
            _ => {
                events.push(event(&id, "offer received", 400, json!({"offer id": INFO})));
                events.push(event(&id, "offer viewed", 401, json!({"offer id": INFO})));
                events.push(event(&id, "transaction", 500, json!({"amount": 3.0})));
            }
        }
    }

    for k in 0..3 {
        profiles.push(profile(format!("idle{k}"), k));
    }
    for k in 0..2 {
        let id = format!("walkin{k}");
        profiles.push(profile(id.clone(), k));
        events.push(event(&id, "transaction", 50, json!({"amount": 4.5})));
    }

    // Input order carries no meaning.
    events.reverse();

    RawTables { offers: offers(), profiles, events }
}

fn write_lines<T: serde::Serialize>(path: &Path, rows: &[T]) {
    let body: Vec<String> = rows.iter().map(|r| serde_json::to_string(r).unwrap()).collect();
    fs::write(path, body.join("\n") + "\n").unwrap();
}

/// Write the three JSON-lines inputs into `dir`.
pub fn write_inputs(dir: &Path, tables: &RawTables) {
    write_lines(&dir.join("portfolio.json"), &tables.offers);
    write_lines(&dir.join("profile.json"), &tables.profiles);
    write_lines(&dir.join("transcript.json"), &tables.events);
}
