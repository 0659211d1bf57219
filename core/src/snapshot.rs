//! Snapshot serialization: the full data model to/from JSON.
//!
//! A snapshot captures every table the desk owns, so a store can be
//! rebuilt elsewhere with identical roster, deficits, rotations, schedules
//! and ledgers. The event log is not part of it.

use crate::{
    allocation::Assignment,
    preference::MonthlyPreference,
    roster::{Engineer, Group},
    rotation::MonthlyRotation,
    store::GenerationRecord,
    types::{EntityId, YearMonth},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub month:       YearMonth,
    pub engineer_id: EntityId,
    pub delta:       f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskSnapshot {
    pub format:      u32,
    pub groups:      Vec<Group>,
    pub engineers:   Vec<Engineer>,
    pub preferences: Vec<MonthlyPreference>,
    pub holidays:    Vec<NaiveDate>,
    pub rotations:   Vec<MonthlyRotation>,
    pub assignments: Vec<Assignment>,
    pub ledger:      Vec<LedgerEntry>,
    pub generations: Vec<GenerationRecord>,
}

impl DeskSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
