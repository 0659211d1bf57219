//! Schedule generation end to end: rotation, preferences, deficits, the
//! ledger, and recovery from a damaged ledger.

use chrono::NaiveDate;
use oncall_core::{
    config::DeskConfig,
    engine::{GenerationStatus, OnCallDesk},
    error::DeskError,
    roster::Engineer,
    types::{DayKind, YearMonth},
};

// 2025-01 is 300 months after the 2000-01 epoch, so a three-person group
// keeps its canonical order that month.
const JAN: YearMonth = YearMonth { year: 2025, month: 1 };

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).expect("valid date")
}

fn team(desk: &OnCallDesk, names: &[&str]) -> Vec<Engineer> {
    let group = desk.add_group("Platform").expect("add group");
    names
        .iter()
        .map(|n| {
            desk.add_engineer(n, &format!("{}@example.com", n.to_lowercase()), &group.group_id)
                .expect("add engineer")
        })
        .collect()
}

/// Ceiling high enough for three engineers to cover a 31-day month.
fn roomy_desk() -> OnCallDesk {
    let mut config = DeskConfig::default_test();
    config.scoring.max_shifts_per_month = 11;
    OnCallDesk::build_test_with(config).expect("test desk")
}

fn names_of(desk: &OnCallDesk, month: YearMonth) -> Vec<String> {
    desk.schedule(month)
        .expect("schedule")
        .into_iter()
        .map(|a| a.engineer_name)
        .collect()
}

#[test]
fn equal_deficits_cycle_in_rotation_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let desk = roomy_desk();
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);

    let outcome = desk.generate_schedule(JAN).expect("generate");
    assert_eq!(outcome.status, GenerationStatus::Complete);
    assert_eq!(outcome.version, Some(1));
    assert_eq!(outcome.assignments.len(), 31, "every day of January is covered");

    let names: Vec<&str> = outcome.assignments.iter().map(|a| a.engineer_name.as_str()).collect();
    assert_eq!(&names[..6], &["Ada", "Ben", "Cleo", "Ada", "Ben", "Cleo"]);

    let counts: Vec<u32> = outcome.report.shift_counts.iter().map(|c| c.total).collect();
    assert_eq!(counts, vec![11, 10, 10]);

    // Winner pays 1.0 per shift, everyone else earns 0.25 per day waited.
    assert_eq!(outcome.deficits[&e[0].engineer_id], -6.0);
    assert_eq!(outcome.deficits[&e[1].engineer_id], -4.75);
    assert_eq!(outcome.deficits[&e[2].engineer_id], -4.75);
    assert_eq!(desk.engineer(&e[0].engineer_id).unwrap().deficit, -6.0);
}

#[test]
fn regeneration_is_idempotent() {
    let desk = roomy_desk();
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);

    let first = desk.generate_schedule(JAN).expect("first generation");
    let second = desk.generate_schedule(JAN).expect("second generation");

    assert_eq!(second.version, Some(2));
    assert_eq!(first.assignments, second.assignments, "same inputs, same schedule");
    assert_eq!(first.deficits, second.deficits, "regeneration must not double-count");
    for engineer in &e {
        let stored = desk.engineer(&engineer.engineer_id).unwrap().deficit;
        assert_eq!(stored, first.deficits[&engineer.engineer_id]);
    }
}

#[test]
fn reset_rolls_back_every_delta() {
    let desk = roomy_desk();
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.generate_schedule(JAN).expect("generate");

    let summary = desk.reset_schedule(JAN).expect("reset");
    assert_eq!(summary.rolled_back, 3);
    assert_eq!(summary.assignments, 31);

    assert!(desk.schedule(JAN).unwrap().is_empty());
    assert!(desk.store().unwrap().generation_record(JAN).unwrap().is_none());
    for engineer in &e {
        assert_eq!(
            desk.engineer(&engineer.engineer_id).unwrap().deficit,
            0.0,
            "{} should be back at the pre-generation deficit",
            engineer.name
        );
    }
}

#[test]
fn soft_limit_yields_until_nobody_else_is_eligible() {
    // Default ceiling of 8: three engineers cover at most 24 of 31 days.
    let desk = OnCallDesk::build_test().expect("test desk");
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.set_preference(&e[2].engineer_id, JAN, 1, vec![day(2)])
        .expect("set preference");

    let outcome = desk.generate_schedule(JAN).expect("generate");
    assert_eq!(outcome.status, GenerationStatus::Partial);
    assert_eq!(outcome.unfilled, (25..=31).map(day).collect::<Vec<_>>());

    let cleo_days: Vec<NaiveDate> = outcome
        .assignments
        .iter()
        .filter(|a| a.engineer_id == e[2].engineer_id)
        .map(|a| a.date)
        .collect();
    assert_eq!(cleo_days[0], day(2), "rank-1 day goes to Cleo");
    assert!(
        cleo_days[1..].iter().all(|d| *d >= day(18)),
        "Cleo is over the soft limit and only works once Ada and Ben are capped: {cleo_days:?}"
    );
    assert_eq!(cleo_days.len(), 8, "hard ceiling still applies");

    assert!(outcome.report.discrepancies.is_empty(), "Cleo got the one preferred day");
    let missing: Vec<&str> = outcome
        .report
        .missing_preferences
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(missing, vec!["Ada", "Ben"]);
}

#[test]
fn preferred_days_fill_the_request_before_anyone_else_is_considered() {
    let desk = OnCallDesk::build_test().expect("test desk");
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.set_preference(&e[2].engineer_id, JAN, 2, vec![day(1), day(2)])
        .expect("set preference");

    let outcome = desk.generate_schedule(JAN).expect("generate");
    let names: Vec<&str> = outcome.assignments.iter().map(|a| a.engineer_name.as_str()).collect();
    assert_eq!(&names[..4], &["Cleo", "Cleo", "Ada", "Ben"]);

    let cleo_days: Vec<NaiveDate> = outcome
        .assignments
        .iter()
        .filter(|a| a.engineer_id == e[2].engineer_id)
        .map(|a| a.date)
        .collect();
    let mut expected = vec![day(1), day(2)];
    expected.extend((19..=24).map(day));
    assert_eq!(cleo_days, expected, "both preferred days, then only once the others are capped");
    assert!(outcome.report.discrepancies.is_empty());
}

#[test]
fn holidays_are_tagged_and_counted() {
    let desk = roomy_desk();
    team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.add_holiday(day(1)).expect("add holiday");

    let outcome = desk.generate_schedule(JAN).expect("generate");
    assert_eq!(outcome.assignments[0].kind, DayKind::Holiday);
    assert!(outcome.assignments[1..].iter().all(|a| a.kind == DayKind::Regular));
    assert_eq!(outcome.report.shift_counts[0].holidays, 1);
    assert_eq!(outcome.report.shift_counts[1].holidays, 0);
}

#[test]
fn corrupted_ledger_blocks_generation_and_keeps_schedule() {
    let desk = roomy_desk();
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);
    let first = desk.generate_schedule(JAN).expect("generate");

    desk.store()
        .unwrap()
        .put_ledger_entry(JAN, &e[0].engineer_id, 99.0)
        .expect("tamper with ledger");

    let err = desk.generate_schedule(JAN).expect_err("ledger no longer matches its record");
    assert!(matches!(err, DeskError::StateInconsistency { month, .. } if month == JAN), "{err}");
    assert_eq!(desk.schedule(JAN).unwrap(), first.assignments, "failed generation leaves the schedule");
    assert!(matches!(desk.reset_schedule(JAN), Err(DeskError::StateInconsistency { .. })));

    // Manual recovery forgets the ledger without touching deficits.
    desk.discard_generation_state(JAN).expect("discard");
    assert_eq!(desk.engineer(&e[0].engineer_id).unwrap().deficit, -6.0);
    let again = desk.generate_schedule(JAN).expect("generate after discard");
    assert_eq!(again.version, Some(1));
}

#[test]
fn ledger_row_count_mismatch_is_detected() {
    let desk = roomy_desk();
    team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.generate_schedule(JAN).expect("generate");

    desk.store()
        .unwrap()
        .put_ledger_entry(JAN, "ghost", 0.0)
        .expect("add stray ledger row");
    assert!(matches!(
        desk.generate_schedule(JAN),
        Err(DeskError::StateInconsistency { .. })
    ));
}

#[test]
fn invalid_months_are_rejected_before_any_work() {
    let desk = roomy_desk();
    team(&desk, &["Ada"]);

    for bad in [YearMonth::new(2025, 0), YearMonth::new(2025, 13), YearMonth::new(1999, 12)] {
        let err = desk.generate_schedule(bad).expect_err("month out of range");
        assert!(matches!(err, DeskError::InvalidMonth { .. }), "{bad}: {err}");
    }
    assert!(desk.store().unwrap().monthly_rotations().unwrap().is_empty());
}

#[test]
fn empty_roster_generates_nothing() {
    let desk = OnCallDesk::build_test().expect("test desk");
    let outcome = desk.generate_schedule(JAN).expect("generate");

    assert_eq!(outcome.status, GenerationStatus::EmptyRoster);
    assert_eq!(outcome.version, None);
    assert!(outcome.assignments.is_empty());
    assert_eq!(outcome.unfilled.len(), 31);
    assert!(
        desk.store().unwrap().monthly_rotation(JAN).unwrap().is_none(),
        "an empty rotation is never frozen"
    );
}

#[test]
fn newcomer_is_seeded_with_team_average_and_appended() {
    let desk = roomy_desk();
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.generate_schedule(JAN).expect("generate");
    let frozen = desk.monthly_rotation(JAN).expect("rotation").priority_order();

    let dana = desk
        .add_engineer("Dana", "dana@example.com", &e[0].group_id)
        .expect("add Dana");
    let expected = (-6.0 - 4.75 - 4.75) / 3.0;
    assert!((dana.deficit - expected).abs() < 1e-9, "seeded {} vs {expected}", dana.deficit);

    {
        let store = desk.store().unwrap();
        let ledger = store.verified_ledger(JAN).expect("ledger still verifies");
        assert_eq!(ledger.len(), 4, "Dana holds a share of January's ledger");
        assert_eq!(store.generation_record(JAN).unwrap().unwrap().entry_count, 4);
    }

    let outcome = desk.generate_schedule(JAN).expect("regenerate with Dana");
    assert_eq!(outcome.assignments.len(), 31);
    assert_eq!(
        desk.monthly_rotation(JAN).unwrap().priority_order(),
        frozen,
        "the persisted order is not rewritten"
    );
    // Everyone starts the rerun level, so the appended newcomer comes last.
    let counts: Vec<usize> = ["Ada", "Ben", "Cleo", "Dana"]
        .iter()
        .map(|n| names_of(&desk, JAN).iter().filter(|x| x.as_str() == *n).count())
        .collect();
    assert_eq!(counts, vec![8, 8, 8, 7]);
}

#[test]
fn reset_after_a_newcomer_returns_them_to_the_team_average() {
    let desk = roomy_desk();
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.generate_schedule(JAN).expect("generate");
    let dana = desk
        .add_engineer("Dana", "dana@example.com", &e[0].group_id)
        .expect("add Dana");

    let summary = desk.reset_schedule(JAN).expect("reset");
    assert_eq!(summary.rolled_back, 4, "Dana is rolled back with the team");

    let engineers = desk.engineers().unwrap();
    let average = engineers.iter().map(|x| x.deficit).sum::<f64>() / engineers.len() as f64;
    let dana_now = desk.engineer(&dana.engineer_id).unwrap().deficit;
    assert!(
        (dana_now - average).abs() < 1e-9,
        "Dana at {dana_now} after reset, team average {average}"
    );
    for engineer in &engineers {
        assert!(engineer.deficit.abs() < 1e-9, "{} at {}", engineer.name, engineer.deficit);
    }
}

#[test]
fn deleted_engineer_is_skipped_on_regeneration() {
    let desk = roomy_desk();
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.generate_schedule(JAN).expect("generate");
    desk.delete_engineer(&e[1].engineer_id, day(20)).expect("delete Ben");

    let outcome = desk.generate_schedule(JAN).expect("regenerate without Ben");
    assert!(outcome.assignments.iter().all(|a| a.engineer_id != e[1].engineer_id));
    assert_eq!(outcome.assignments.len(), 22, "two engineers, ceiling 11");

    let skipped = desk
        .events_for_month(JAN)
        .unwrap()
        .into_iter()
        .filter(|ev| ev.event_type == "rotation_member_skipped")
        .count();
    assert_eq!(skipped, 1);
}

#[test]
fn missing_member_conflicts_when_skipping_is_disabled() {
    let mut config = DeskConfig::default_test();
    config.scoring.max_shifts_per_month = 11;
    config.rotation.skip_missing_members = false;
    let desk = OnCallDesk::build_test_with(config).expect("test desk");
    let e = team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.generate_schedule(JAN).expect("generate");
    desk.delete_engineer(&e[1].engineer_id, day(20)).expect("delete Ben");
    let before = names_of(&desk, JAN);

    let err = desk.generate_schedule(JAN).expect_err("frozen order names Ben");
    assert!(
        matches!(&err, DeskError::RotationConflict { engineer_id, .. } if *engineer_id == e[1].engineer_id),
        "{err}"
    );
    assert_eq!(names_of(&desk, JAN), before);
}

#[test]
fn generation_is_recorded_in_the_event_log() {
    let desk = roomy_desk();
    team(&desk, &["Ada", "Ben", "Cleo"]);
    desk.generate_schedule(JAN).expect("generate");
    desk.generate_schedule(JAN).expect("regenerate");

    let types: Vec<String> = desk
        .events_for_month(JAN)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        types,
        vec!["rotation_persisted", "schedule_generated", "schedule_generated"]
    );
}
