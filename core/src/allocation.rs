//! Allocation engine: deficit-fairness weighted round-robin.
//!
//! Days are processed in chronological order. For each day every eligible
//! engineer gets a composite score:
//!
//!   rotation   rotation_weight * (n - position) / n
//!   preference preference_weight / rank   (rank <= ranks considered)
//!   deficit    deficit_weight * current deficit
//!   penalty    soft_limit_penalty once shifts >= requested
//!
//! The highest score takes the day. The winner's deficit drops by
//! `paydown_unit`; every other eligible engineer gains `waiting_unit`.
//! Later days see those updated deficits.
//!
//! This module is pure: it reads a snapshot and returns the result. The
//! engine persists it.

use crate::{
    config::ScoringConfig,
    preference::MonthlyPreference,
    roster::settle,
    types::{DayKind, EntityId, OnCallDay},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One engineer as seen by a single generation run.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub engineer_id: EntityId,
    pub name:        String,
    /// Deficit with this month's previous generation already rolled back.
    pub deficit:     f64,
    pub preference:  Option<MonthlyPreference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub date:          NaiveDate,
    pub engineer_id:   EntityId,
    pub engineer_name: String,
    pub kind:          DayKind,
}

#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    pub assignments: Vec<Assignment>,
    /// Days nobody was eligible for.
    pub unfilled:    Vec<NaiveDate>,
    /// Deficit after this run, per engineer.
    pub deficits:    BTreeMap<EntityId, f64>,
    /// Net change this run applied, per engineer. Becomes the ledger.
    pub deltas:      BTreeMap<EntityId, f64>,
}

struct Slot<'a> {
    candidate: &'a Candidate,
    position:  usize,
    assigned:  u32,
    delta:     f64,
}

impl Slot<'_> {
    fn deficit(&self) -> f64 {
        settle(self.candidate.deficit + self.delta)
    }

    fn over_soft_limit(&self) -> bool {
        // No submission, no declared limit.
        self.candidate
            .preference
            .as_ref()
            .is_some_and(|p| self.assigned >= p.requested)
    }
}

/// Composite score of one engineer for one day.
pub fn composite_score(
    scoring:       &ScoringConfig,
    date:          NaiveDate,
    position:      usize,
    team_size:     usize,
    deficit:       f64,
    preference:    Option<&MonthlyPreference>,
    over_limit:    bool,
) -> f64 {
    let n = team_size.max(1) as f64;
    let rotation = scoring.rotation_weight * (n - position as f64) / n;

    let preference = preference
        .and_then(|p| p.rank_of(date))
        .filter(|rank| *rank <= scoring.preference_ranks_considered)
        .map(|rank| scoring.preference_weight / rank as f64)
        .unwrap_or(0.0);

    let deficit = scoring.deficit_weight * deficit;
    let penalty = if over_limit { scoring.soft_limit_penalty } else { 0.0 };

    rotation + preference + deficit - penalty
}

/// Run the allocation for one month.
///
/// `order` is the effective rotation order; candidates missing from it are
/// placed after it by engineer id.
pub fn allocate(
    days:       &[OnCallDay],
    order:      &[EntityId],
    candidates: &[Candidate],
    scoring:    &ScoringConfig,
) -> AllocationResult {
    let mut slots: Vec<Slot> = candidates
        .iter()
        .map(|c| Slot {
            candidate: c,
            position: order
                .iter()
                .position(|id| *id == c.engineer_id)
                .unwrap_or(usize::MAX),
            assigned: 0,
            delta: 0.0,
        })
        .collect();
    slots.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.candidate.engineer_id.cmp(&b.candidate.engineer_id))
    });
    // Dense positions so the rotation term stays in [0, rotation_weight].
    for (i, s) in slots.iter_mut().enumerate() {
        s.position = i;
    }

    let team_size = slots.len();
    let mut result = AllocationResult::default();

    for day in days {
        let eligible: Vec<usize> = (0..slots.len())
            .filter(|&i| slots[i].assigned < scoring.max_shifts_per_month)
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for &i in &eligible {
            let s = &slots[i];
            let score = composite_score(
                scoring,
                day.date,
                s.position,
                team_size,
                s.deficit(),
                s.candidate.preference.as_ref(),
                s.over_soft_limit(),
            );
            best = match best {
                None => Some((i, score)),
                Some((bi, bs)) => match score.partial_cmp(&bs).unwrap_or(Ordering::Equal) {
                    Ordering::Greater => Some((i, score)),
                    Ordering::Less => Some((bi, bs)),
                    // Slots are sorted by rotation then id, so the earlier
                    // index already wins the tie.
                    Ordering::Equal => Some((bi, bs)),
                },
            };
        }

        let Some((winner, score)) = best else {
            log::warn!("{}: no eligible engineer, day left unfilled", day.date);
            result.unfilled.push(day.date);
            continue;
        };

        for &i in &eligible {
            let s = &mut slots[i];
            if i == winner {
                s.assigned += 1;
                s.delta = settle(s.delta - scoring.paydown_unit);
            } else {
                s.delta = settle(s.delta + scoring.waiting_unit);
            }
        }

        let picked = slots[winner].candidate;
        log::debug!(
            "{}: {} (score {score:.3}, {} eligible)",
            day.date,
            picked.engineer_id,
            eligible.len()
        );
        result.assignments.push(Assignment {
            date: day.date,
            engineer_id: picked.engineer_id.clone(),
            engineer_name: picked.name.clone(),
            kind: day.kind,
        });
    }

    for s in &slots {
        let id = s.candidate.engineer_id.clone();
        result.deficits.insert(id.clone(), s.deficit());
        result.deltas.insert(id, s.delta);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeskConfig;
    use crate::types::YearMonth;

    fn day(d: u32) -> OnCallDay {
        OnCallDay {
            date: NaiveDate::from_ymd_opt(2025, 10, d).unwrap(),
            kind: DayKind::Regular,
        }
    }

    fn cand(id: &str, deficit: f64, pref: Option<(u32, &[u32])>) -> Candidate {
        Candidate {
            engineer_id: id.into(),
            name: id.to_uppercase(),
            deficit,
            preference: pref.map(|(requested, days)| MonthlyPreference {
                engineer_id: id.into(),
                month: YearMonth::new(2025, 10),
                requested,
                dates: days.iter().map(|d| day(*d).date).collect(),
            }),
        }
    }

    fn ids(v: &[&str]) -> Vec<EntityId> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn picks(r: &AllocationResult) -> Vec<&str> {
        r.assignments.iter().map(|a| a.engineer_id.as_str()).collect()
    }

    #[test]
    fn round_robin_without_preferences() {
        let scoring = DeskConfig::default_test().scoring;
        let days: Vec<_> = (1..=5).map(day).collect();
        let cands = vec![cand("a", 0.0, None), cand("b", 0.0, None), cand("c", 0.0, None)];

        let r = allocate(&days, &ids(&["a", "b", "c"]), &cands, &scoring);
        assert_eq!(picks(&r), vec!["a", "b", "c", "a", "b"]);
        assert_eq!(r.deficits["a"], -1.25);
        assert_eq!(r.deficits["b"], -1.25);
        assert_eq!(r.deficits["c"], 0.0);
        assert!(r.unfilled.is_empty());
    }

    #[test]
    fn higher_deficit_beats_rotation() {
        let scoring = DeskConfig::default_test().scoring;
        let cands = vec![cand("a", 0.0, None), cand("b", 2.0, None)];
        let r = allocate(&[day(1)], &ids(&["a", "b"]), &cands, &scoring);
        assert_eq!(picks(&r), vec!["b"]);
        assert_eq!(r.deltas["b"], -1.0);
        assert_eq!(r.deltas["a"], 0.25);
    }

    #[test]
    fn preferred_day_wins_and_rank_one_outweighs_rank_two() {
        let scoring = DeskConfig::default_test().scoring;
        let cands = vec![
            cand("a", 0.0, Some((1, &[3, 1]))),
            cand("b", 0.0, Some((1, &[1]))),
        ];
        let r = allocate(&[day(1)], &ids(&["a", "b"]), &cands, &scoring);
        assert_eq!(picks(&r), vec!["b"], "rank 1 should beat rank 2");
    }

    #[test]
    fn soft_limit_yields_to_engineer_under_request() {
        let scoring = DeskConfig::default_test().scoring;
        // a wants one shift and ranks both days; b asks for one and ranks nothing.
        let cands = vec![cand("a", 0.0, Some((1, &[1, 2]))), cand("b", 0.0, Some((1, &[])))];
        let r = allocate(&[day(1), day(2)], &ids(&["a", "b"]), &cands, &scoring);
        assert_eq!(picks(&r), vec!["a", "b"]);
    }

    #[test]
    fn soft_limit_is_overridable_when_nobody_else_is_available() {
        let scoring = DeskConfig::default_test().scoring;
        let cands = vec![cand("a", 0.0, Some((1, &[])))];
        let days: Vec<_> = (1..=3).map(day).collect();
        let r = allocate(&days, &ids(&["a"]), &cands, &scoring);
        assert_eq!(picks(&r), vec!["a", "a", "a"]);
    }

    #[test]
    fn hard_ceiling_leaves_days_unfilled() {
        let mut scoring = DeskConfig::default_test().scoring;
        scoring.max_shifts_per_month = 2;
        let cands = vec![cand("a", 0.0, None)];
        let days: Vec<_> = (1..=3).map(day).collect();
        let r = allocate(&days, &ids(&["a"]), &cands, &scoring);
        assert_eq!(r.assignments.len(), 2);
        assert_eq!(r.unfilled, vec![day(3).date]);
    }

    #[test]
    fn ranks_beyond_cutoff_earn_nothing() {
        let mut scoring = DeskConfig::default_test().scoring;
        scoring.preference_ranks_considered = 1;
        let p = MonthlyPreference {
            engineer_id: "a".into(),
            month: YearMonth::new(2025, 10),
            requested: 2,
            dates: vec![day(1).date, day(2).date],
        };
        let first = composite_score(&scoring, day(1).date, 0, 1, 0.0, Some(&p), false);
        let second = composite_score(&scoring, day(2).date, 0, 1, 0.0, Some(&p), false);
        assert!(first > 10.0);
        assert!((second - scoring.rotation_weight).abs() < 1e-12);
    }

    #[test]
    fn empty_team_leaves_every_day_unfilled() {
        let scoring = DeskConfig::default_test().scoring;
        let days: Vec<_> = (1..=4).map(day).collect();
        let r = allocate(&days, &[], &[], &scoring);
        assert!(r.assignments.is_empty());
        assert_eq!(r.unfilled.len(), 4);
    }
}
