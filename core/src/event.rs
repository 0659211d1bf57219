//! The audit log: every state change the desk makes.
//!
//! RULE: Every mutation of roster, preference, rotation or schedule state
//! appends exactly one event, inside the same transaction as the change.

use crate::types::{EntityId, YearMonth};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Variants are appended as features land, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeskEvent {
    // ── Roster ─────────────────────────────────────
    GroupAdded {
        group_id: EntityId,
        name:     String,
    },
    GroupDeleted {
        group_id: EntityId,
    },
    EngineerAdded {
        engineer_id:    EntityId,
        group_id:       EntityId,
        seeded_deficit: f64,
    },
    EngineerDeleted {
        engineer_id: EntityId,
        today:       NaiveDate,
    },
    AssignmentsVacated {
        engineer_id: EntityId,
        dates:       Vec<NaiveDate>,
    },

    // ── Preferences ────────────────────────────────
    PreferenceSubmitted {
        engineer_id: EntityId,
        month:       YearMonth,
        requested:   u32,
        ranked_days: usize,
    },
    PreferenceCleared {
        engineer_id: EntityId,
        month:       YearMonth,
    },

    // ── Rotation ───────────────────────────────────
    RotationPersisted {
        month:       YearMonth,
        month_index: i64,
        groups:      usize,
        engineers:   usize,
    },
    RotationMemberSkipped {
        month:       YearMonth,
        engineer_id: EntityId,
    },

    // ── Schedule ───────────────────────────────────
    ScheduleGenerated {
        month:       YearMonth,
        version:     u32,
        assigned:    usize,
        unfilled:    usize,
        delta_total: f64,
    },
    ScheduleReset {
        month:          YearMonth,
        rolled_back:    usize,
        assignments:    usize,
    },
    GenerationStateDiscarded {
        month: YearMonth,
    },
}

impl DeskEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            DeskEvent::GroupAdded { .. }               => "group_added",
            DeskEvent::GroupDeleted { .. }             => "group_deleted",
            DeskEvent::EngineerAdded { .. }            => "engineer_added",
            DeskEvent::EngineerDeleted { .. }          => "engineer_deleted",
            DeskEvent::AssignmentsVacated { .. }       => "assignments_vacated",
            DeskEvent::PreferenceSubmitted { .. }      => "preference_submitted",
            DeskEvent::PreferenceCleared { .. }        => "preference_cleared",
            DeskEvent::RotationPersisted { .. }        => "rotation_persisted",
            DeskEvent::RotationMemberSkipped { .. }    => "rotation_member_skipped",
            DeskEvent::ScheduleGenerated { .. }        => "schedule_generated",
            DeskEvent::ScheduleReset { .. }            => "schedule_reset",
            DeskEvent::GenerationStateDiscarded { .. } => "generation_state_discarded",
        }
    }
}

/// A persisted event log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub month:      Option<YearMonth>,
    pub event_type: String,
    pub payload:    String, // JSON-serialized DeskEvent
}

impl EventLogEntry {
    pub fn from_event(month: Option<YearMonth>, event: &DeskEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            month,
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<DeskEvent> {
        serde_json::from_str(&self.payload)
    }
}
