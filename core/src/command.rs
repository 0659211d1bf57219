use crate::{
    engine::OnCallDesk,
    error::DeskResult,
    types::YearMonth,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// All operator-issued commands accepted over the runner's JSON surface.
/// Variants may be added, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DeskCommand {
    // ── Roster ────────────────────────────────────
    AddGroup {
        name: String,
    },
    DeleteGroup {
        group_id: String,
    },
    AddEngineer {
        name:     String,
        email:    String,
        group_id: String,
    },
    DeleteEngineer {
        engineer_id: String,
        today:       NaiveDate,
    },
    ListRoster,

    // ── Preferences ───────────────────────────────
    SetPreference {
        engineer_id: String,
        month:       YearMonth,
        requested:   u32,
        dates:       Vec<NaiveDate>,
    },
    ClearPreference {
        engineer_id: String,
        month:       YearMonth,
    },

    // ── Calendar ──────────────────────────────────
    AddHoliday {
        date: NaiveDate,
    },
    RemoveHoliday {
        date: NaiveDate,
    },

    // ── Schedule ──────────────────────────────────
    Rotation {
        month: YearMonth,
    },
    Generate {
        month: YearMonth,
    },
    Reset {
        month: YearMonth,
    },
    DiscardGenerationState {
        month: YearMonth,
    },
    Schedule {
        month: YearMonth,
    },
    Report {
        month: YearMonth,
    },
}

impl DeskCommand {
    /// Run the command against `desk` and return its JSON result.
    pub fn apply(self, desk: &OnCallDesk) -> DeskResult<Value> {
        let value = match self {
            Self::AddGroup { name } => serde_json::to_value(desk.add_group(&name)?)?,
            Self::DeleteGroup { group_id } => {
                desk.delete_group(&group_id)?;
                json!({ "deleted": group_id })
            }
            Self::AddEngineer { name, email, group_id } => {
                serde_json::to_value(desk.add_engineer(&name, &email, &group_id)?)?
            }
            Self::DeleteEngineer { engineer_id, today } => {
                let vacated = desk.delete_engineer(&engineer_id, today)?;
                json!({ "deleted": engineer_id, "vacated": vacated })
            }
            Self::ListRoster => json!({
                "groups": desk.groups()?,
                "engineers": desk.engineers()?,
            }),
            Self::SetPreference { engineer_id, month, requested, dates } => {
                serde_json::to_value(desk.set_preference(&engineer_id, month, requested, dates)?)?
            }
            Self::ClearPreference { engineer_id, month } => {
                json!({ "cleared": desk.clear_preference(&engineer_id, month)? })
            }
            Self::AddHoliday { date } => json!({ "added": desk.add_holiday(date)? }),
            Self::RemoveHoliday { date } => json!({ "removed": desk.remove_holiday(date)? }),
            Self::Rotation { month } => serde_json::to_value(desk.monthly_rotation(month)?)?,
            Self::Generate { month } => serde_json::to_value(desk.generate_schedule(month)?)?,
            Self::Reset { month } => serde_json::to_value(desk.reset_schedule(month)?)?,
            Self::DiscardGenerationState { month } => {
                json!({ "removed": desk.discard_generation_state(month)? })
            }
            Self::Schedule { month } => serde_json::to_value(desk.schedule(month)?)?,
            Self::Report { month } => serde_json::to_value(desk.report(month)?)?,
        };
        Ok(value)
    }
}
