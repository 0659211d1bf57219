//! Store methods for whole-database snapshot capture and restore.

use super::ScheduleStore;
use crate::{
    error::{DeskError, DeskResult},
    roster::name_key,
    snapshot::{DeskSnapshot, LedgerEntry, SNAPSHOT_FORMAT},
    types::YearMonth,
};
use rusqlite::params;

impl ScheduleStore {
    pub fn capture_snapshot(&self) -> DeskResult<DeskSnapshot> {
        let ledger = {
            let mut stmt = self.conn.prepare(
                "SELECT month, engineer_id, delta FROM deficit_ledger
                 ORDER BY month ASC, engineer_id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(LedgerEntry {
                    month: row.get::<_, YearMonth>(0)?,
                    engineer_id: row.get(1)?,
                    delta: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        Ok(DeskSnapshot {
            format: SNAPSHOT_FORMAT,
            groups: self.groups()?,
            engineers: self.engineers()?,
            preferences: self.all_preferences()?,
            holidays: self.holidays()?.into_iter().collect(),
            rotations: self.monthly_rotations()?,
            assignments: self.all_assignments()?,
            ledger,
            generations: self.generation_records()?,
        })
    }

    /// Load a snapshot into an empty, migrated store.
    pub fn restore_snapshot(&self, snapshot: &DeskSnapshot) -> DeskResult<()> {
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(DeskError::Other(anyhow::anyhow!(
                "unsupported snapshot format {} (expected {SNAPSHOT_FORMAT})",
                snapshot.format
            )));
        }
        if !self.groups()?.is_empty() {
            return Err(DeskError::Other(anyhow::anyhow!(
                "refusing to restore a snapshot over a non-empty roster"
            )));
        }

        self.atomically(|s| {
            for g in &snapshot.groups {
                s.conn.execute(
                    "INSERT INTO engineer_group (group_id, name, name_key, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![g.group_id, g.name, name_key(&g.name), g.position],
                )?;
            }
            for e in &snapshot.engineers {
                s.conn.execute(
                    "INSERT INTO engineer (
                        engineer_id, name, name_key, email, group_id, member_position, deficit
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        e.engineer_id,
                        e.name,
                        name_key(&e.name),
                        e.email,
                        e.group_id,
                        e.member_position,
                        e.deficit,
                    ],
                )?;
            }
            for p in &snapshot.preferences {
                s.upsert_preference(p)?;
            }
            for d in &snapshot.holidays {
                s.insert_holiday(*d)?;
            }
            for r in &snapshot.rotations {
                s.conn.execute(
                    "INSERT INTO monthly_rotation (month, month_index, order_json)
                     VALUES (?1, ?2, ?3)",
                    params![r.month, r.month_index, serde_json::to_string(r)?],
                )?;
            }
            for a in &snapshot.assignments {
                s.conn.execute(
                    "INSERT INTO assignment (date, month, engineer_id, engineer_name, kind)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![a.date, YearMonth::of(a.date), a.engineer_id, a.engineer_name, a.kind],
                )?;
            }
            for l in &snapshot.ledger {
                s.put_ledger_entry(l.month, &l.engineer_id, l.delta)?;
            }
            for g in &snapshot.generations {
                s.conn.execute(
                    "INSERT INTO generation_record (month, version, entry_count, delta_total)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![g.month, g.version, g.entry_count, g.delta_total],
                )?;
            }
            Ok(())
        })
    }
}
