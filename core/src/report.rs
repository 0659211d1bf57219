//! Read-only reporting over a month's assignments and preferences.
//! Nothing here is persisted; the desk rebuilds it on every fetch.

use crate::{
    allocation::Assignment,
    preference::MonthlyPreference,
    roster::Engineer,
    types::{EntityId, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingPreference {
    pub engineer_id: EntityId,
    pub name:        String,
}

/// An engineer who received fewer of their own preferred days than they
/// asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub engineer_id:        EntityId,
    pub name:               String,
    pub requested:          u32,
    pub preferred_received: u32,
    pub shortfall:          u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftCount {
    pub engineer_id: EntityId,
    pub name:        String,
    pub total:       u32,
    pub holidays:    u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub month:               YearMonth,
    pub missing_preferences: Vec<MissingPreference>,
    pub discrepancies:       Vec<Discrepancy>,
    pub shift_counts:        Vec<ShiftCount>,
}

/// Build the report for `month` from the current roster.
/// `engineers` should be in canonical order; output follows it.
pub fn build_report(
    month:       YearMonth,
    engineers:   &[Engineer],
    preferences: &[MonthlyPreference],
    assignments: &[Assignment],
) -> ScheduleReport {
    let prefs: HashMap<&str, &MonthlyPreference> = preferences
        .iter()
        .filter(|p| p.month == month)
        .map(|p| (p.engineer_id.as_str(), p))
        .collect();

    let mut by_engineer: HashMap<&str, Vec<&Assignment>> = HashMap::new();
    for a in assignments.iter().filter(|a| month.contains(a.date)) {
        by_engineer.entry(a.engineer_id.as_str()).or_default().push(a);
    }

    let mut report = ScheduleReport {
        month,
        missing_preferences: Vec::new(),
        discrepancies: Vec::new(),
        shift_counts: Vec::new(),
    };

    for e in engineers {
        let shifts = by_engineer.get(e.engineer_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        report.shift_counts.push(ShiftCount {
            engineer_id: e.engineer_id.clone(),
            name: e.name.clone(),
            total: shifts.len() as u32,
            holidays: shifts.iter().filter(|a| a.kind.is_holiday()).count() as u32,
        });

        match prefs.get(e.engineer_id.as_str()) {
            None => report.missing_preferences.push(MissingPreference {
                engineer_id: e.engineer_id.clone(),
                name: e.name.clone(),
            }),
            Some(p) => {
                let preferred_received = shifts.iter().filter(|a| p.prefers(a.date)).count() as u32;
                if preferred_received < p.requested {
                    report.discrepancies.push(Discrepancy {
                        engineer_id: e.engineer_id.clone(),
                        name: e.name.clone(),
                        requested: p.requested,
                        preferred_received,
                        shortfall: p.requested - preferred_received,
                    });
                }
            }
        }
    }
    report
}
