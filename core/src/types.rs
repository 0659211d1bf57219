//! Shared primitive types used across the entire scheduler.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stable, unique identifier for an engineer or group.
pub type EntityId = String;

/// A calendar month. Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year:  i32,
    pub month: u32,
}

impl YearMonth {
    /// Build without range checks. Use `calendar::validate_month` before
    /// doing any work with a caller-supplied month.
    pub const fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    /// Months elapsed since `epoch`. Negative before the epoch.
    pub fn months_since(&self, epoch: YearMonth) -> i64 {
        (self.year as i64 - epoch.year as i64) * 12 + (self.month as i64 - epoch.month as i64)
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year = y.parse::<i32>().map_err(|e| format!("bad year in '{s}': {e}"))?;
        let month = m.parse::<u32>().map_err(|e| format!("bad month in '{s}': {e}"))?;
        Ok(Self { year, month })
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> Self {
        ym.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayKind {
    Regular,
    Holiday,
}

impl DayKind {
    pub fn is_holiday(self) -> bool {
        self == DayKind::Holiday
    }
}

/// A calendar date requiring exactly one assigned engineer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnCallDay {
    pub date: NaiveDate,
    pub kind: DayKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_parses_and_displays() {
        let ym: YearMonth = "2025-03".parse().unwrap();
        assert_eq!(ym, YearMonth::new(2025, 3));
        assert_eq!(ym.to_string(), "2025-03");
        assert!("2025".parse::<YearMonth>().is_err());
    }

    #[test]
    fn months_since_crosses_year_boundary() {
        let epoch = YearMonth::new(2024, 11);
        assert_eq!(YearMonth::new(2025, 2).months_since(epoch), 3);
        assert_eq!(YearMonth::new(2024, 10).months_since(epoch), -1);
    }
}
