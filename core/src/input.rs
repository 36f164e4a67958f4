//! Raw input tables — JSON-lines readers for the three source files.
//!
//! RULE: A missing input file halts the run before any stage executes.
//! Nothing downstream ever runs on an empty stand-in table.

use crate::{
    config::InputPaths,
    error::{PipelineError, PipelineResult},
    types::Hours,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One offer-catalog line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawOffer {
    pub id:         String,
    pub offer_type: String,
    pub reward:     u32,
    pub difficulty: u32,
    /// Days.
    pub duration:   u32,
    #[serde(default)]
    pub channels:   Vec<String>,
}

/// One customer-profile line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawProfile {
    pub id:               String,
    #[serde(default)]
    pub gender:           Option<String>,
    pub age:              u32,
    #[serde(default)]
    pub income:           Option<f64>,
    pub became_member_on: RawDate,
}

/// Enrollment dates arrive as `20170212` or `"20170212"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawDate {
    Number(u64),
    Text(String),
}

impl RawDate {
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s)   => s.trim().to_string(),
        }
    }
}

/// One transcript line. `value` is the polymorphic payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    pub person: String,
    pub event:  String,
    pub time:   Hours,
    #[serde(default)]
    pub value:  Value,
}

#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub offers:   Vec<RawOffer>,
    pub profiles: Vec<RawProfile>,
    pub events:   Vec<RawEvent>,
}

impl RawTables {
    /// Read all three input files. Existence of every file is checked
    /// before any of them is parsed.
    pub fn load(paths: &InputPaths) -> PipelineResult<Self> {
        for path in [&paths.portfolio, &paths.profile, &paths.transcript] {
            if !Path::new(path).is_file() {
                return Err(PipelineError::MissingInput { path: path.clone() });
            }
        }

        let tables = Self {
            offers:   read_json_lines(&paths.portfolio)?,
            profiles: read_json_lines(&paths.profile)?,
            events:   read_json_lines(&paths.transcript)?,
        };
        log::info!(
            "input: loaded {} offers, {} profiles, {} events",
            tables.offers.len(),
            tables.profiles.len(),
            tables.events.len()
        );
        Ok(tables)
    }
}

/// Parse a JSON-lines file into records. Blank lines are skipped.
pub fn read_json_lines<T: DeserializeOwned>(path: &str) -> PipelineResult<Vec<T>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::MissingInput { path: path.to_string() },
        _ => PipelineError::Io { path: path.to_string(), source: e },
    })?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| PipelineError::Io { path: path.to_string(), source: e })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| PipelineError::MalformedRecord {
            path: path.to_string(),
            line: idx + 1,
            source: e,
        })?;
        records.push(record);
    }
    Ok(records)
}
