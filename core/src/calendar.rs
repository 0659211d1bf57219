//! Calendar resolver: turns a month plus the holiday set into on-call days.
//!
//! Every calendar day is on-call eligible; holidays are only tagged.

use crate::{
    config::CalendarConfig,
    error::{DeskError, DeskResult},
    types::{DayKind, OnCallDay, YearMonth},
};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Reject months outside 1..=12 or years outside the configured span.
pub fn validate_month(month: YearMonth, config: &CalendarConfig) -> DeskResult<()> {
    let in_span = (config.min_year..=config.max_year).contains(&month.year);
    if !in_span || !(1..=12).contains(&month.month) {
        return Err(DeskError::InvalidMonth {
            year: month.year,
            month: month.month,
            min_year: config.min_year,
            max_year: config.max_year,
        });
    }
    Ok(())
}

/// Resolve every day of `month`, in chronological order.
pub fn resolve_month(
    month:    YearMonth,
    holidays: &BTreeSet<NaiveDate>,
    config:   &CalendarConfig,
) -> DeskResult<Vec<OnCallDay>> {
    validate_month(month, config)?;
    let first = month.first_day().ok_or(DeskError::InvalidMonth {
        year: month.year,
        month: month.month,
        min_year: config.min_year,
        max_year: config.max_year,
    })?;

    let days = first
        .iter_days()
        .take_while(|d| month.contains(*d))
        .map(|date| OnCallDay {
            date,
            kind: if holidays.contains(&date) { DayKind::Holiday } else { DayKind::Regular },
        })
        .collect();
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CalendarConfig {
        CalendarConfig { min_year: 2000, max_year: 2100 }
    }

    #[test]
    fn february_leap_year_has_29_days() {
        let days = resolve_month(YearMonth::new(2024, 2), &BTreeSet::new(), &cfg()).unwrap();
        assert_eq!(days.len(), 29);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(days[28].date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(days.iter().all(|d| d.kind == DayKind::Regular));
    }

    #[test]
    fn holidays_are_tagged_and_foreign_dates_ignored() {
        let christmas = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        let new_year = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let holidays: BTreeSet<_> = [christmas, new_year].into_iter().collect();

        let days = resolve_month(YearMonth::new(2025, 12), &holidays, &cfg()).unwrap();
        assert_eq!(days.len(), 31);
        let tagged: Vec<_> = days.iter().filter(|d| d.kind.is_holiday()).map(|d| d.date).collect();
        assert_eq!(tagged, vec![christmas]);
    }

    #[test]
    fn out_of_range_months_are_rejected() {
        for bad in [YearMonth::new(2025, 0), YearMonth::new(2025, 13), YearMonth::new(1999, 6)] {
            let err = resolve_month(bad, &BTreeSet::new(), &cfg()).unwrap_err();
            assert!(matches!(err, DeskError::InvalidMonth { .. }), "{bad} accepted");
        }
    }
}
