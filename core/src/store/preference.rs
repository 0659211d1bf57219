//! Store methods for monthly preferences.

use super::ScheduleStore;
use crate::{
    error::DeskResult,
    event::DeskEvent,
    preference::MonthlyPreference,
    types::YearMonth,
};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

impl ScheduleStore {
    /// Replace any earlier submission for the same (engineer, month).
    pub fn upsert_preference(&self, pref: &MonthlyPreference) -> DeskResult<()> {
        self.atomically(|s| {
            s.conn.execute(
                "DELETE FROM monthly_preference WHERE engineer_id = ?1 AND month = ?2",
                params![pref.engineer_id, pref.month],
            )?;
            s.conn.execute(
                "INSERT INTO monthly_preference (engineer_id, month, requested)
                 VALUES (?1, ?2, ?3)",
                params![pref.engineer_id, pref.month, pref.requested],
            )?;
            let mut stmt = s.conn.prepare(
                "INSERT INTO preference_date (engineer_id, month, rank, date)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (i, date) in pref.dates.iter().enumerate() {
                stmt.execute(params![pref.engineer_id, pref.month, (i + 1) as i64, date])?;
            }
            s.append_event(
                Some(pref.month),
                &DeskEvent::PreferenceSubmitted {
                    engineer_id: pref.engineer_id.clone(),
                    month: pref.month,
                    requested: pref.requested,
                    ranked_days: pref.dates.len(),
                },
            )
        })
    }

    /// Returns false when there was nothing to clear.
    pub fn delete_preference(&self, engineer_id: &str, month: YearMonth) -> DeskResult<bool> {
        self.atomically(|s| {
            let removed = s.conn.execute(
                "DELETE FROM monthly_preference WHERE engineer_id = ?1 AND month = ?2",
                params![engineer_id, month],
            )?;
            if removed > 0 {
                s.append_event(
                    Some(month),
                    &DeskEvent::PreferenceCleared { engineer_id: engineer_id.to_string(), month },
                )?;
            }
            Ok(removed > 0)
        })
    }

    pub fn preference(
        &self,
        engineer_id: &str,
        month: YearMonth,
    ) -> DeskResult<Option<MonthlyPreference>> {
        let requested: Option<u32> = self
            .conn
            .query_row(
                "SELECT requested FROM monthly_preference WHERE engineer_id = ?1 AND month = ?2",
                params![engineer_id, month],
                |row| row.get(0),
            )
            .optional()?;
        let Some(requested) = requested else {
            return Ok(None);
        };
        Ok(Some(MonthlyPreference {
            engineer_id: engineer_id.to_string(),
            month,
            requested,
            dates: self.preference_dates(engineer_id, month)?,
        }))
    }

    fn preference_dates(&self, engineer_id: &str, month: YearMonth) -> DeskResult<Vec<NaiveDate>> {
        let mut stmt = self.conn.prepare(
            "SELECT date FROM preference_date
             WHERE engineer_id = ?1 AND month = ?2
             ORDER BY rank ASC",
        )?;
        let rows = stmt.query_map(params![engineer_id, month], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every submission for `month`, ordered by engineer id.
    pub fn preferences_for_month(&self, month: YearMonth) -> DeskResult<Vec<MonthlyPreference>> {
        let ids: Vec<String> = {
            let mut stmt = self.conn.prepare(
                "SELECT engineer_id FROM monthly_preference
                 WHERE month = ?1 ORDER BY engineer_id ASC",
            )?;
            let rows = stmt.query_map(params![month], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut prefs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(p) = self.preference(&id, month)? {
                prefs.push(p);
            }
        }
        Ok(prefs)
    }

    /// Every submission for every month, ordered by (month, engineer id).
    pub fn all_preferences(&self) -> DeskResult<Vec<MonthlyPreference>> {
        let months: Vec<YearMonth> = {
            let mut stmt = self
                .conn
                .prepare("SELECT DISTINCT month FROM monthly_preference ORDER BY month ASC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut all = Vec::new();
        for month in months {
            all.extend(self.preferences_for_month(month)?);
        }
        Ok(all)
    }
}
