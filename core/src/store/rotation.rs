//! Store methods for frozen monthly rotations.

use super::ScheduleStore;
use crate::{
    error::DeskResult,
    event::DeskEvent,
    rotation::MonthlyRotation,
    types::YearMonth,
};
use rusqlite::{params, OptionalExtension};

impl ScheduleStore {
    /// The persisted order for `month`, exactly as first written.
    pub fn monthly_rotation(&self, month: YearMonth) -> DeskResult<Option<MonthlyRotation>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT order_json FROM monthly_rotation WHERE month = ?1",
                params![month],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    /// Persist a rotation. Never overwrites: returns false if `month`
    /// already had one.
    pub fn insert_monthly_rotation(
        &self,
        rotation: &MonthlyRotation,
        event: &DeskEvent,
    ) -> DeskResult<bool> {
        let json = serde_json::to_string(rotation)?;
        self.atomically(|s| {
            let inserted = s.conn.execute(
                "INSERT OR IGNORE INTO monthly_rotation (month, month_index, order_json)
                 VALUES (?1, ?2, ?3)",
                params![rotation.month, rotation.month_index, json],
            )?;
            if inserted > 0 {
                s.append_event(Some(rotation.month), event)?;
            }
            Ok(inserted > 0)
        })
    }

    pub fn monthly_rotations(&self) -> DeskResult<Vec<MonthlyRotation>> {
        let mut stmt = self
            .conn
            .prepare("SELECT order_json FROM monthly_rotation ORDER BY month ASC")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|j| serde_json::from_str(j).map_err(Into::into))
            .collect()
    }
}
