use crate::types::{EntityId, YearMonth};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid month: {year}-{month:02} (supported years {min_year}..={max_year})")]
    InvalidMonth {
        year:     i32,
        month:    u32,
        min_year: i32,
        max_year: i32,
    },

    #[error("Rotation for {month} references removed engineer '{engineer_id}'")]
    RotationConflict { month: YearMonth, engineer_id: EntityId },

    #[error("Fairness state for {month} is inconsistent: {reason}. Reset the month manually")]
    StateInconsistency { month: YearMonth, reason: String },

    #[error("Engineer '{id}' not found")]
    EngineerNotFound { id: EntityId },

    #[error("Group '{id}' not found")]
    GroupNotFound { id: EntityId },

    #[error("Engineer '{name}' already exists (case-insensitive)")]
    DuplicateEngineer { name: String },

    #[error("Group '{name}' already exists (case-insensitive)")]
    DuplicateGroup { name: String },

    #[error("Group '{id}' still has {members} member(s)")]
    GroupNotEmpty { id: EntityId, members: usize },

    #[error("Invalid preference: {reason}")]
    InvalidPreference { reason: String },

    #[error("Lock poisoned: {what}")]
    LockPoisoned { what: &'static str },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DeskResult<T> = Result<T, DeskError>;
