//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Everything else calls store methods and never executes SQL directly.

use crate::{
    error::DeskResult,
    event::{DeskEvent, EventLogEntry},
    types::{DayKind, YearMonth},
};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection};

mod calendar;
mod preference;
mod roster;
mod rotation;
mod schedule;
mod snapshot;

pub use schedule::{GenerationCommit, GenerationRecord};

pub struct ScheduleStore {
    conn: Connection,
}

impl ScheduleStore {
    pub fn open(path: &str) -> DeskResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> DeskResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to call repeatedly.
    pub fn migrate(&self) -> DeskResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_roster.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_preferences.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_calendar_rotation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_schedule.sql"))?;
        Ok(())
    }

    /// Run `f` inside one transaction. Any error rolls every write back.
    /// Nested calls join the enclosing transaction.
    pub(crate) fn atomically<T>(&self, f: impl FnOnce(&Self) -> DeskResult<T>) -> DeskResult<T> {
        if !self.conn.is_autocommit() {
            return f(self);
        }
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, month: Option<YearMonth>, event: &DeskEvent) -> DeskResult<()> {
        let entry = EventLogEntry::from_event(month, event)?;
        self.conn.execute(
            "INSERT INTO event_log (month, event_type, payload) VALUES (?1, ?2, ?3)",
            params![entry.month, entry.event_type, entry.payload],
        )?;
        Ok(())
    }

    pub fn events_for_month(&self, month: YearMonth) -> DeskResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, month, event_type, payload
             FROM event_log WHERE month = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![month], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    month: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> DeskResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ── Column conversions ─────────────────────────────────────────────

impl ToSql for YearMonth {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for YearMonth {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for DayKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(match self {
            DayKind::Regular => "regular",
            DayKind::Holiday => "holiday",
        }))
    }
}

impl FromSql for DayKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "regular" => Ok(DayKind::Regular),
            "holiday" => Ok(DayKind::Holiday),
            other => Err(FromSqlError::Other(format!("unknown day kind '{other}'").into())),
        }
    }
}
