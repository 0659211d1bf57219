//! Store methods for groups, engineers and deficits.

use super::ScheduleStore;
use crate::{
    error::DeskResult,
    event::DeskEvent,
    roster::{name_key, Engineer, Group, Roster},
};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

fn engineer_from_row(row: &Row<'_>) -> rusqlite::Result<Engineer> {
    Ok(Engineer {
        engineer_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        group_id: row.get(3)?,
        member_position: row.get(4)?,
        deficit: row.get(5)?,
    })
}

const ENGINEER_COLUMNS: &str =
    "e.engineer_id, e.name, e.email, e.group_id, e.member_position, e.deficit";

impl ScheduleStore {
    // ── Groups ────────────────────────────────────────────────────

    pub fn group_name_taken(&self, name: &str) -> DeskResult<bool> {
        let taken = self
            .conn
            .query_row(
                "SELECT 1 FROM engineer_group WHERE name_key = ?1",
                params![name_key(name)],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(taken)
    }

    pub fn next_group_position(&self) -> DeskResult<i64> {
        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM engineer_group",
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    pub fn insert_group(&self, group: &Group, event: &DeskEvent) -> DeskResult<()> {
        self.atomically(|s| {
            s.conn.execute(
                "INSERT INTO engineer_group (group_id, name, name_key, position)
                 VALUES (?1, ?2, ?3, ?4)",
                params![group.group_id, group.name, name_key(&group.name), group.position],
            )?;
            s.append_event(None, event)
        })
    }

    pub fn group(&self, group_id: &str) -> DeskResult<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT group_id, name, position FROM engineer_group WHERE group_id = ?1",
                params![group_id],
                |row| {
                    Ok(Group {
                        group_id: row.get(0)?,
                        name: row.get(1)?,
                        position: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(group)
    }

    /// All groups in canonical order.
    pub fn groups(&self) -> DeskResult<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_id, name, position FROM engineer_group ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Group {
                group_id: row.get(0)?,
                name: row.get(1)?,
                position: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn group_member_count(&self, group_id: &str) -> DeskResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM engineer WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn delete_group(&self, group_id: &str, event: &DeskEvent) -> DeskResult<()> {
        self.atomically(|s| {
            s.conn.execute(
                "DELETE FROM engineer_group WHERE group_id = ?1",
                params![group_id],
            )?;
            s.append_event(None, event)
        })
    }

    // ── Engineers ─────────────────────────────────────────────────

    pub fn engineer_name_taken(&self, name: &str) -> DeskResult<bool> {
        let taken = self
            .conn
            .query_row(
                "SELECT 1 FROM engineer WHERE name_key = ?1",
                params![name_key(name)],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(taken)
    }

    pub fn next_member_position(&self, group_id: &str) -> DeskResult<i64> {
        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(member_position) + 1, 0) FROM engineer WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    pub fn insert_engineer(&self, engineer: &Engineer, event: &DeskEvent) -> DeskResult<()> {
        self.atomically(|s| {
            s.conn.execute(
                "INSERT INTO engineer (
                    engineer_id, name, name_key, email, group_id, member_position, deficit
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    engineer.engineer_id,
                    engineer.name,
                    name_key(&engineer.name),
                    engineer.email,
                    engineer.group_id,
                    engineer.member_position,
                    engineer.deficit,
                ],
            )?;
            s.append_event(None, event)
        })
    }

    pub fn engineer(&self, engineer_id: &str) -> DeskResult<Option<Engineer>> {
        let sql = format!("SELECT {ENGINEER_COLUMNS} FROM engineer e WHERE e.engineer_id = ?1");
        let engineer = self
            .conn
            .query_row(&sql, params![engineer_id], engineer_from_row)
            .optional()?;
        Ok(engineer)
    }

    /// All engineers, ordered by group position then member position.
    pub fn engineers(&self) -> DeskResult<Vec<Engineer>> {
        let sql = format!(
            "SELECT {ENGINEER_COLUMNS}
             FROM engineer e
             JOIN engineer_group g ON g.group_id = e.group_id
             ORDER BY g.position ASC, e.member_position ASC, e.engineer_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], engineer_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn roster(&self) -> DeskResult<Roster> {
        Ok(Roster {
            groups: self.groups()?,
            engineers: self.engineers()?,
        })
    }

    pub fn team_average_deficit(&self) -> DeskResult<f64> {
        let mut stmt = self.conn.prepare("SELECT deficit FROM engineer")?;
        let deficits = stmt
            .query_map([], |row| row.get::<_, f64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(crate::roster::average_deficit(deficits.into_iter()))
    }

    pub fn set_deficit(&self, engineer_id: &str, deficit: f64) -> DeskResult<bool> {
        let changed = self.conn.execute(
            "UPDATE engineer SET deficit = ?1 WHERE engineer_id = ?2",
            params![deficit, engineer_id],
        )?;
        Ok(changed > 0)
    }

    /// Remove an engineer with their preferences and every assignment dated
    /// on or after `today`. Returns the vacated dates.
    pub fn delete_engineer(&self, engineer_id: &str, today: NaiveDate) -> DeskResult<Vec<NaiveDate>> {
        self.atomically(|s| {
            let vacated = {
                let mut stmt = s.conn.prepare(
                    "SELECT date FROM assignment
                     WHERE engineer_id = ?1 AND date >= ?2
                     ORDER BY date ASC",
                )?;
                let rows = stmt.query_map(params![engineer_id, today], |row| row.get(0))?;
                rows.collect::<Result<Vec<NaiveDate>, _>>()?
            };
            s.conn.execute(
                "DELETE FROM assignment WHERE engineer_id = ?1 AND date >= ?2",
                params![engineer_id, today],
            )?;
            s.conn.execute(
                "DELETE FROM engineer WHERE engineer_id = ?1",
                params![engineer_id],
            )?;

            s.append_event(
                None,
                &DeskEvent::EngineerDeleted { engineer_id: engineer_id.to_string(), today },
            )?;
            if !vacated.is_empty() {
                s.append_event(
                    None,
                    &DeskEvent::AssignmentsVacated {
                        engineer_id: engineer_id.to_string(),
                        dates: vacated.clone(),
                    },
                )?;
            }
            Ok(vacated)
        })
    }
}
