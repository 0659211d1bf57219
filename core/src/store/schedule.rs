//! Store methods for assignments and the per-month deficit ledger.
//!
//! The ledger holds the deficit deltas the latest generation of a month
//! applied, so a regeneration or reset can take exactly those back out.
//! `generation_record` carries a row count and a delta total that the
//! ledger must agree with before anything is rolled back.

use super::ScheduleStore;
use crate::{
    allocation::Assignment,
    error::{DeskError, DeskResult},
    event::DeskEvent,
    roster::settle,
    types::{EntityId, YearMonth},
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest ledger/record disagreement still treated as rounding noise.
const LEDGER_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub month:       YearMonth,
    pub version:     u32,
    pub entry_count: u32,
    pub delta_total: f64,
}

/// Everything one generation writes, applied in a single transaction.
#[derive(Debug, Clone)]
pub struct GenerationCommit {
    pub month:       YearMonth,
    pub assignments: Vec<Assignment>,
    pub deltas:      BTreeMap<EntityId, f64>,
    pub unfilled:    usize,
}

impl ScheduleStore {
    // ── Assignments ───────────────────────────────────────────────

    pub fn assignments_for_month(&self, month: YearMonth) -> DeskResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, engineer_id, engineer_name, kind
             FROM assignment WHERE month = ?1
             ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![month], |row| {
            Ok(Assignment {
                date: row.get(0)?,
                engineer_id: row.get(1)?,
                engineer_name: row.get(2)?,
                kind: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn all_assignments(&self) -> DeskResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, engineer_id, engineer_name, kind FROM assignment ORDER BY date ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Assignment {
                date: row.get(0)?,
                engineer_id: row.get(1)?,
                engineer_name: row.get(2)?,
                kind: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn insert_assignment(&self, month: YearMonth, a: &Assignment) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO assignment (date, month, engineer_id, engineer_name, kind)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![a.date, month, a.engineer_id, a.engineer_name, a.kind],
        )?;
        Ok(())
    }

    // ── Ledger ────────────────────────────────────────────────────

    pub fn generation_record(&self, month: YearMonth) -> DeskResult<Option<GenerationRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT month, version, entry_count, delta_total
                 FROM generation_record WHERE month = ?1",
                params![month],
                |row| {
                    Ok(GenerationRecord {
                        month: row.get(0)?,
                        version: row.get(1)?,
                        entry_count: row.get(2)?,
                        delta_total: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn generation_records(&self) -> DeskResult<Vec<GenerationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT month, version, entry_count, delta_total
             FROM generation_record ORDER BY month ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(GenerationRecord {
                month: row.get(0)?,
                version: row.get(1)?,
                entry_count: row.get(2)?,
                delta_total: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Raw ledger rows for `month`, unverified.
    pub fn ledger(&self, month: YearMonth) -> DeskResult<BTreeMap<EntityId, f64>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id, delta FROM deficit_ledger WHERE month = ?1",
        )?;
        let rows = stmt.query_map(params![month], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        rows.collect::<Result<BTreeMap<_, _>, _>>().map_err(Into::into)
    }

    /// The ledger for `month`, checked against its generation record.
    ///
    /// No record and no rows means the month was never generated (empty
    /// ledger). Any other mismatch is a `StateInconsistency`.
    pub fn verified_ledger(&self, month: YearMonth) -> DeskResult<BTreeMap<EntityId, f64>> {
        let ledger = self.ledger(month)?;
        let record = self.generation_record(month)?;

        let inconsistent = |reason: String| DeskError::StateInconsistency { month, reason };
        match record {
            None if ledger.is_empty() => Ok(ledger),
            None => Err(inconsistent(format!(
                "{} ledger rows but no generation record",
                ledger.len()
            ))),
            Some(r) => {
                if r.entry_count as usize != ledger.len() {
                    return Err(inconsistent(format!(
                        "generation v{} expects {} ledger rows, found {}",
                        r.version,
                        r.entry_count,
                        ledger.len()
                    )));
                }
                let total = settle(ledger.values().sum());
                if (total - r.delta_total).abs() > LEDGER_TOLERANCE {
                    return Err(inconsistent(format!(
                        "ledger total {total} differs from recorded {}",
                        r.delta_total
                    )));
                }
                Ok(ledger)
            }
        }
    }

    /// Add `delta` to an engineer's deficit. Returns false if the engineer
    /// no longer exists.
    fn shift_deficit(&self, engineer_id: &str, delta: f64) -> DeskResult<bool> {
        let current: Option<f64> = self
            .conn
            .query_row(
                "SELECT deficit FROM engineer WHERE engineer_id = ?1",
                params![engineer_id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            Some(d) => self.set_deficit(engineer_id, settle(d + delta)),
            None => Ok(false),
        }
    }

    fn clear_month(&self, month: YearMonth) -> DeskResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM assignment WHERE month = ?1", params![month])?;
        self.conn
            .execute("DELETE FROM deficit_ledger WHERE month = ?1", params![month])?;
        self.conn
            .execute("DELETE FROM generation_record WHERE month = ?1", params![month])?;
        Ok(removed)
    }

    /// Atomically replace `month`'s schedule: undo the previous ledger,
    /// apply the new deltas, write assignments, ledger and record.
    /// Returns the new generation record.
    pub fn commit_generation(&self, commit: &GenerationCommit) -> DeskResult<GenerationRecord> {
        let month = commit.month;
        self.atomically(|s| {
            let previous = s.verified_ledger(month)?;
            let version = s.generation_record(month)?.map(|r| r.version).unwrap_or(0) + 1;
            s.clear_month(month)?;

            // Net per engineer, so each deficit is touched once.
            let mut net: BTreeMap<&str, f64> = BTreeMap::new();
            for (id, delta) in &previous {
                *net.entry(id.as_str()).or_insert(0.0) -= delta;
            }
            for (id, delta) in &commit.deltas {
                *net.entry(id.as_str()).or_insert(0.0) += delta;
            }
            for (id, delta) in net {
                if delta != 0.0 {
                    s.shift_deficit(id, delta)?;
                }
            }

            for a in &commit.assignments {
                s.insert_assignment(month, a)?;
            }
            for (id, delta) in &commit.deltas {
                s.conn.execute(
                    "INSERT INTO deficit_ledger (month, engineer_id, delta) VALUES (?1, ?2, ?3)",
                    params![month, id, delta],
                )?;
            }

            let record = GenerationRecord {
                month,
                version,
                entry_count: commit.deltas.len() as u32,
                delta_total: settle(commit.deltas.values().sum()),
            };
            s.conn.execute(
                "INSERT INTO generation_record (month, version, entry_count, delta_total)
                 VALUES (?1, ?2, ?3, ?4)",
                params![record.month, record.version, record.entry_count, record.delta_total],
            )?;
            s.append_event(
                Some(month),
                &DeskEvent::ScheduleGenerated {
                    month,
                    version,
                    assigned: commit.assignments.len(),
                    unfilled: commit.unfilled,
                    delta_total: record.delta_total,
                },
            )?;
            Ok(record)
        })
    }

    /// Undo `month`'s ledger and delete its schedule.
    /// Returns (engineers rolled back, assignments removed).
    pub fn reset_month(&self, month: YearMonth) -> DeskResult<(usize, usize)> {
        self.atomically(|s| {
            let previous = s.verified_ledger(month)?;
            let mut rolled_back = 0;
            for (id, delta) in &previous {
                if s.shift_deficit(id, -delta)? {
                    rolled_back += 1;
                }
            }
            let assignments = s.clear_month(month)?;
            s.append_event(
                Some(month),
                &DeskEvent::ScheduleReset { month, rolled_back, assignments },
            )?;
            Ok((rolled_back, assignments))
        })
    }

    /// Manual recovery: drop `month`'s schedule and ledger without touching
    /// any deficit.
    pub fn discard_month(&self, month: YearMonth) -> DeskResult<usize> {
        self.atomically(|s| {
            let removed = s.clear_month(month)?;
            s.append_event(Some(month), &DeskEvent::GenerationStateDiscarded { month })?;
            Ok(removed)
        })
    }

    /// Give a newly added engineer a share in every open ledger: one row per
    /// generated month holding that month's average delta across the
    /// current roster, with the month's record updated to match. Rolling a
    /// month back then moves the newcomer with the rest of the team.
    /// Returns the number of months enrolled in.
    pub(crate) fn enrol_in_ledgers(&self, engineer_id: &str) -> DeskResult<usize> {
        self.atomically(|s| {
            let mut enrolled = 0;
            for record in s.generation_records()? {
                let average: Option<f64> = s.conn.query_row(
                    "SELECT AVG(l.delta)
                     FROM deficit_ledger l
                     JOIN engineer e ON e.engineer_id = l.engineer_id
                     WHERE l.month = ?1 AND l.engineer_id != ?2",
                    params![record.month, engineer_id],
                    |row| row.get(0),
                )?;
                let Some(average) = average else { continue };
                let share = settle(average);

                s.put_ledger_entry(record.month, engineer_id, share)?;
                s.conn.execute(
                    "UPDATE generation_record
                     SET entry_count = entry_count + 1, delta_total = ?2
                     WHERE month = ?1",
                    params![record.month, settle(record.delta_total + share)],
                )?;
                enrolled += 1;
            }
            Ok(enrolled)
        })
    }

    /// Overwrite a ledger row directly. Used by snapshot import and by
    /// tests that simulate a damaged ledger.
    pub fn put_ledger_entry(&self, month: YearMonth, engineer_id: &str, delta: f64) -> DeskResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO deficit_ledger (month, engineer_id, delta) VALUES (?1, ?2, ?3)",
            params![month, engineer_id, delta],
        )?;
        Ok(())
    }
}
