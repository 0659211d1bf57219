//! Store methods for the holiday set.

use super::ScheduleStore;
use crate::error::DeskResult;
use chrono::NaiveDate;
use rusqlite::params;
use std::collections::BTreeSet;

impl ScheduleStore {
    /// Returns false if the date was already a holiday.
    pub fn insert_holiday(&self, date: NaiveDate) -> DeskResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO holiday (date) VALUES (?1)",
            params![date],
        )?;
        Ok(inserted > 0)
    }

    /// Returns false if the date was not a holiday.
    pub fn delete_holiday(&self, date: NaiveDate) -> DeskResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM holiday WHERE date = ?1", params![date])?;
        Ok(removed > 0)
    }

    pub fn holidays(&self) -> DeskResult<BTreeSet<NaiveDate>> {
        let mut stmt = self.conn.prepare("SELECT date FROM holiday ORDER BY date ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<BTreeSet<_>, _>>().map_err(Into::into)
    }
}
