//! Shared primitive types used across the entire pipeline.

/// Experiment time. One unit = one hour since the experiment started.
pub type Hours = u32;

/// A customer identifier as it appears in the profile and transcript files.
pub type PersonId = String;

/// An offer identifier as it appears in the catalog and event payloads.
pub type OfferId = String;

/// The canonical run identifier.
pub type RunId = String;

/// Hours in one offer-duration day.
pub const HOURS_PER_DAY: Hours = 24;
