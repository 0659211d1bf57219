//! Monthly preference records: requested shift count plus ranked days.

use crate::{
    config::PreferenceConfig,
    error::{DeskError, DeskResult},
    types::{EntityId, YearMonth},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPreference {
    pub engineer_id: EntityId,
    pub month:       YearMonth,
    /// Soft limit on shifts this month.
    pub requested:   u32,
    /// Most preferred first. Rank = index + 1.
    pub dates:       Vec<NaiveDate>,
}

impl MonthlyPreference {
    /// 1-based rank of `date`, if the engineer listed it.
    pub fn rank_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.iter().position(|d| *d == date).map(|i| i + 1)
    }

    pub fn prefers(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// Check count bounds and duplicate dates. Dates outside `month` are
    /// allowed; the allocator ignores them.
    pub fn validate(&self, config: &PreferenceConfig) -> DeskResult<()> {
        if self.requested < config.min_requested || self.requested > config.max_requested {
            return Err(DeskError::InvalidPreference {
                reason: format!(
                    "requested count {} outside {}..={}",
                    self.requested, config.min_requested, config.max_requested
                ),
            });
        }
        let mut seen = HashSet::with_capacity(self.dates.len());
        for d in &self.dates {
            if !seen.insert(*d) {
                return Err(DeskError::InvalidPreference {
                    reason: format!("date {d} listed more than once"),
                });
            }
        }
        Ok(())
    }
}
