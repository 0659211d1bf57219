//! Deterministic demo data: a team, its preferences and a few holidays.
//!
//! Same seed, same team. Used by the runner's demo mode and by tests that
//! want a realistic roster without spelling one out.

use crate::{
    engine::OnCallDesk,
    error::DeskResult,
    preference::MonthlyPreference,
    rng::{DeskRng, RngBank, StreamSlot},
    roster::{name_key, Engineer},
    types::YearMonth,
};
use chrono::NaiveDate;
use std::collections::HashSet;

const GROUP_NAMES: &[&str] = &[
    "Platform", "Storage", "Networking", "Payments", "Identity", "Observability",
    "Data", "Edge",
];

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bashir", "Chen", "Dana", "Emeka", "Farah", "Grace", "Hiro", "Ines",
    "Jonas", "Kavya", "Lena", "Mateo", "Nadia", "Omar", "Priya", "Quinn", "Rosa",
    "Sven", "Tariq", "Uma", "Viktor", "Wen", "Yara", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Abara", "Becker", "Costa", "Dubois", "Eriksen", "Fischer", "Garcia", "Haddad",
    "Ito", "Jensen", "Kowalski", "Larsen", "Moreau", "Nakamura", "Okafor", "Petrov",
    "Quist", "Rossi", "Silva", "Tanaka", "Ueda", "Varga", "Weber", "Yilmaz", "Zhang",
];

/// Fabricates demo data from one master seed.
pub struct SyntheticTeam {
    seed: u64,
    bank: RngBank,
}

impl SyntheticTeam {
    pub fn new(seed: u64) -> Self {
        Self { seed, bank: RngBank::new(seed) }
    }

    /// Create `groups` groups of `per_group` engineers each.
    pub fn populate_roster(
        &self,
        desk:      &OnCallDesk,
        groups:    usize,
        per_group: usize,
    ) -> DeskResult<Vec<Engineer>> {
        let mut rng = self.bank.stream(StreamSlot::Roster);
        let mut taken: HashSet<String> = desk
            .engineers()?
            .iter()
            .map(|e| name_key(&e.name))
            .collect();
        let existing_groups = desk.groups()?.len();

        let mut created = Vec::with_capacity(groups * per_group);
        for g in 0..groups {
            let label = GROUP_NAMES[(existing_groups + g) % GROUP_NAMES.len()];
            let group_name = if existing_groups + g < GROUP_NAMES.len() {
                label.to_string()
            } else {
                format!("{label} {}", (existing_groups + g) / GROUP_NAMES.len() + 1)
            };
            let group = desk.add_group(&group_name)?;

            for _ in 0..per_group {
                let (name, email) = unique_name(&mut rng, &mut taken);
                let engineer_id = format!("demo-{:x}-{:03}", self.seed, created.len());
                created.push(desk.add_engineer_with_id(engineer_id, &name, &email, &group.group_id)?);
            }
        }
        log::info!("synthetic: {} engineer(s) in {groups} group(s), seed {}", created.len(), self.seed);
        Ok(created)
    }

    /// Submit preferences for roughly `participation` of the roster.
    pub fn submit_preferences(
        &self,
        desk:          &OnCallDesk,
        month:         YearMonth,
        participation: f64,
    ) -> DeskResult<Vec<MonthlyPreference>> {
        let mut rng = self.bank.stream(StreamSlot::Preferences);
        let limits = &desk.config().preferences;
        let days = month_days(month);

        let mut submitted = Vec::new();
        for engineer in desk.engineers()? {
            if !rng.chance(participation) {
                continue;
            }
            let requested = rng.range_u32(limits.min_requested, limits.max_requested.min(4));
            let wanted = rng.range_u32(requested, requested + 4) as usize;
            let mut dates = days.clone();
            rng.shuffle(&mut dates);
            dates.truncate(wanted);
            submitted.push(desk.set_preference(&engineer.engineer_id, month, requested, dates)?);
        }
        Ok(submitted)
    }

    /// Mark `count` distinct days of `month` as holidays.
    pub fn add_holidays(&self, desk: &OnCallDesk, month: YearMonth, count: usize) -> DeskResult<Vec<NaiveDate>> {
        let mut rng = self.bank.stream(StreamSlot::Holidays);
        let mut days = month_days(month);
        rng.shuffle(&mut days);
        days.truncate(count);
        days.sort_unstable();
        for d in &days {
            desk.add_holiday(*d)?;
        }
        Ok(days)
    }
}

fn unique_name(rng: &mut DeskRng, taken: &mut HashSet<String>) -> (String, String) {
    let mut attempt = 0usize;
    loop {
        let first = rng.pick(FIRST_NAMES).copied().unwrap_or("Alex");
        let last = rng.pick(LAST_NAMES).copied().unwrap_or("Doe");
        let name = if attempt < 32 {
            format!("{first} {last}")
        } else {
            format!("{first} {last} {attempt}")
        };
        if taken.insert(name_key(&name)) {
            let email = format!(
                "{}@example.com",
                name.to_lowercase().replace(' ', ".")
            );
            return (name, email);
        }
        attempt += 1;
    }
}

fn month_days(month: YearMonth) -> Vec<NaiveDate> {
    match month.first_day() {
        Some(first) => first.iter_days().take_while(|d| month.contains(*d)).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_names_never_repeat() {
        let mut rng = DeskRng::new(5, 0);
        let mut taken = HashSet::new();
        let names: Vec<String> = (0..200).map(|_| unique_name(&mut rng, &mut taken).0).collect();
        let distinct: HashSet<String> = names.iter().map(|n| name_key(n)).collect();
        assert_eq!(distinct.len(), names.len());
    }

    #[test]
    fn month_days_cover_the_month() {
        assert_eq!(month_days(YearMonth::new(2024, 2)).len(), 29);
        assert_eq!(month_days(YearMonth::new(2025, 4)).len(), 30);
    }
}
