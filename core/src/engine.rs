//! The on-call desk: wires calendar, rotation, allocation and the store.
//!
//! GENERATION PIPELINE (fixed, documented, never reordered):
//!   1. Validate the month (InvalidMonth, before any work).
//!   2. Take the month lock, then the roster gate (shared).
//!   3. Snapshot under the store lock: holidays → on-call days, roster,
//!      verified ledger, frozen rotation, preferences.
//!   4. Roll the previous ledger out of the snapshot's deficits and run the
//!      allocation with no store lock held.
//!   5. Commit assignments, deficit deltas, ledger and record in one
//!      transaction.
//!
//! RULES:
//!   - At most one generation or reset per month at a time.
//!   - Roster add/delete holds the roster gate exclusively, so no roster
//!     change lands between a generation's snapshot and its commit.
//!   - Different months may compute concurrently; deficits are committed as
//!     relative deltas.
//!   - A failed generation leaves the month's previous schedule untouched.

use crate::{
    allocation::{self, Assignment, Candidate},
    calendar,
    config::DeskConfig,
    error::{DeskError, DeskResult},
    event::{DeskEvent, EventLogEntry},
    preference::MonthlyPreference,
    report::{self, ScheduleReport},
    roster::{Engineer, Group, Roster, settle},
    rotation::{MonthlyRotation, RotationEngine},
    snapshot::DeskSnapshot,
    store::{GenerationCommit, ScheduleStore},
    types::{EntityId, OnCallDay, YearMonth},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Every on-call day has an engineer.
    Complete,
    /// Some days had no eligible engineer.
    Partial,
    /// Nobody on the roster; nothing was written.
    EmptyRoster,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub month:       YearMonth,
    /// None when nothing was committed.
    pub version:     Option<u32>,
    pub status:      GenerationStatus,
    pub assignments: Vec<Assignment>,
    pub unfilled:    Vec<NaiveDate>,
    /// Persisted deficits after the commit.
    pub deficits:    BTreeMap<EntityId, f64>,
    pub report:      ScheduleReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub rolled_back: usize,
    pub assignments: usize,
}

struct GenerationInput {
    days:     Vec<OnCallDay>,
    roster:   Roster,
    previous: BTreeMap<EntityId, f64>,
    order:    Vec<EntityId>,
    prefs:    Vec<MonthlyPreference>,
}

pub struct OnCallDesk {
    config:      DeskConfig,
    store:       Mutex<ScheduleStore>,
    roster_gate: RwLock<()>,
    month_locks: Mutex<HashMap<YearMonth, Arc<Mutex<()>>>>,
}

impl OnCallDesk {
    /// Wrap an already-migrated store.
    pub fn new(config: DeskConfig, store: ScheduleStore) -> Self {
        Self {
            config,
            store: Mutex::new(store),
            roster_gate: RwLock::new(()),
            month_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Migrate `store` and load configuration from `data_dir`.
    pub fn build(store: ScheduleStore, data_dir: &str) -> DeskResult<Self> {
        let config = DeskConfig::load(data_dir)?;
        store.migrate()?;
        Ok(Self::new(config, store))
    }

    /// In-memory desk with default test configuration.
    pub fn build_test() -> DeskResult<Self> {
        Self::build_test_with(DeskConfig::default_test())
    }

    pub fn build_test_with(config: DeskConfig) -> DeskResult<Self> {
        config.validate()?;
        let store = ScheduleStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Direct store access for tooling and tests.
    pub fn store(&self) -> DeskResult<MutexGuard<'_, ScheduleStore>> {
        self.store
            .lock()
            .map_err(|_| DeskError::LockPoisoned { what: "store" })
    }

    fn month_lock(&self, month: YearMonth) -> DeskResult<Arc<Mutex<()>>> {
        let mut locks = self
            .month_locks
            .lock()
            .map_err(|_| DeskError::LockPoisoned { what: "month table" })?;
        Ok(locks.entry(month).or_default().clone())
    }

    // ── Roster ────────────────────────────────────────────────────

    pub fn add_group(&self, name: &str) -> DeskResult<Group> {
        let _gate = self
            .roster_gate
            .write()
            .map_err(|_| DeskError::LockPoisoned { what: "roster" })?;
        let store = self.store()?;
        let name = name.trim();
        if store.group_name_taken(name)? {
            return Err(DeskError::DuplicateGroup { name: name.to_string() });
        }
        let group = Group {
            group_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            position: store.next_group_position()?,
        };
        store.insert_group(
            &group,
            &DeskEvent::GroupAdded { group_id: group.group_id.clone(), name: group.name.clone() },
        )?;
        log::info!("roster: group '{}' added at position {}", group.name, group.position);
        Ok(group)
    }

    /// Only empty groups may be deleted.
    pub fn delete_group(&self, group_id: &str) -> DeskResult<()> {
        let _gate = self
            .roster_gate
            .write()
            .map_err(|_| DeskError::LockPoisoned { what: "roster" })?;
        let store = self.store()?;
        if store.group(group_id)?.is_none() {
            return Err(DeskError::GroupNotFound { id: group_id.to_string() });
        }
        let members = store.group_member_count(group_id)?;
        if members > 0 {
            return Err(DeskError::GroupNotEmpty { id: group_id.to_string(), members });
        }
        store.delete_group(group_id, &DeskEvent::GroupDeleted { group_id: group_id.to_string() })
    }

    /// Add an engineer at the end of `group_id`'s canonical order, seeded
    /// with the current team-average deficit.
    pub fn add_engineer(&self, name: &str, email: &str, group_id: &str) -> DeskResult<Engineer> {
        self.add_engineer_with_id(Uuid::new_v4().to_string(), name, email, group_id)
    }

    pub fn add_engineer_with_id(
        &self,
        engineer_id: EntityId,
        name:        &str,
        email:       &str,
        group_id:    &str,
    ) -> DeskResult<Engineer> {
        let _gate = self
            .roster_gate
            .write()
            .map_err(|_| DeskError::LockPoisoned { what: "roster" })?;
        let store = self.store()?;
        let name = name.trim();
        if store.group(group_id)?.is_none() {
            return Err(DeskError::GroupNotFound { id: group_id.to_string() });
        }
        if store.engineer_name_taken(name)? {
            return Err(DeskError::DuplicateEngineer { name: name.to_string() });
        }

        let engineer = Engineer {
            engineer_id,
            name: name.to_string(),
            email: email.trim().to_string(),
            group_id: group_id.to_string(),
            member_position: store.next_member_position(group_id)?,
            deficit: store.team_average_deficit()?,
        };
        // The seed carries every generated month's deltas, so the newcomer
        // joins those ledgers too and rolls back with everyone else.
        let enrolled = store.atomically(|s| {
            s.insert_engineer(
                &engineer,
                &DeskEvent::EngineerAdded {
                    engineer_id: engineer.engineer_id.clone(),
                    group_id: engineer.group_id.clone(),
                    seeded_deficit: engineer.deficit,
                },
            )?;
            s.enrol_in_ledgers(&engineer.engineer_id)
        })?;
        log::info!(
            "roster: engineer '{}' joined group {} with deficit {:.3} ({enrolled} ledger(s) joined)",
            engineer.name, engineer.group_id, engineer.deficit
        );
        Ok(engineer)
    }

    /// Remove an engineer and vacate their assignments dated on or after
    /// `today`. The vacated days stay empty until the month is regenerated.
    pub fn delete_engineer(&self, engineer_id: &str, today: NaiveDate) -> DeskResult<Vec<NaiveDate>> {
        let _gate = self
            .roster_gate
            .write()
            .map_err(|_| DeskError::LockPoisoned { what: "roster" })?;
        let store = self.store()?;
        if store.engineer(engineer_id)?.is_none() {
            return Err(DeskError::EngineerNotFound { id: engineer_id.to_string() });
        }
        let vacated = store.delete_engineer(engineer_id, today)?;
        log::info!(
            "roster: engineer {engineer_id} deleted, {} future shift(s) vacated",
            vacated.len()
        );
        Ok(vacated)
    }

    pub fn groups(&self) -> DeskResult<Vec<Group>> {
        self.store()?.groups()
    }

    pub fn engineers(&self) -> DeskResult<Vec<Engineer>> {
        self.store()?.engineers()
    }

    pub fn engineer(&self, engineer_id: &str) -> DeskResult<Engineer> {
        self.store()?
            .engineer(engineer_id)?
            .ok_or_else(|| DeskError::EngineerNotFound { id: engineer_id.to_string() })
    }

    // ── Preferences ───────────────────────────────────────────────

    pub fn set_preference(
        &self,
        engineer_id: &str,
        month:       YearMonth,
        requested:   u32,
        dates:       Vec<NaiveDate>,
    ) -> DeskResult<MonthlyPreference> {
        calendar::validate_month(month, &self.config.calendar)?;
        let pref = MonthlyPreference {
            engineer_id: engineer_id.to_string(),
            month,
            requested,
            dates,
        };
        pref.validate(&self.config.preferences)?;

        let store = self.store()?;
        if store.engineer(engineer_id)?.is_none() {
            return Err(DeskError::EngineerNotFound { id: engineer_id.to_string() });
        }
        let outside = pref.dates.iter().filter(|d| !month.contains(**d)).count();
        if outside > 0 {
            log::debug!("preference {engineer_id}/{month}: {outside} date(s) outside the month, ignored");
        }
        store.upsert_preference(&pref)?;
        Ok(pref)
    }

    pub fn clear_preference(&self, engineer_id: &str, month: YearMonth) -> DeskResult<bool> {
        self.store()?.delete_preference(engineer_id, month)
    }

    pub fn preference(&self, engineer_id: &str, month: YearMonth) -> DeskResult<Option<MonthlyPreference>> {
        self.store()?.preference(engineer_id, month)
    }

    pub fn preferences_for_month(&self, month: YearMonth) -> DeskResult<Vec<MonthlyPreference>> {
        self.store()?.preferences_for_month(month)
    }

    // ── Calendar ──────────────────────────────────────────────────

    pub fn add_holiday(&self, date: NaiveDate) -> DeskResult<bool> {
        self.store()?.insert_holiday(date)
    }

    pub fn remove_holiday(&self, date: NaiveDate) -> DeskResult<bool> {
        self.store()?.delete_holiday(date)
    }

    pub fn holidays(&self) -> DeskResult<Vec<NaiveDate>> {
        Ok(self.store()?.holidays()?.into_iter().collect())
    }

    pub fn on_call_days(&self, month: YearMonth) -> DeskResult<Vec<OnCallDay>> {
        calendar::validate_month(month, &self.config.calendar)?;
        let holidays = self.store()?.holidays()?;
        calendar::resolve_month(month, &holidays, &self.config.calendar)
    }

    // ── Rotation ──────────────────────────────────────────────────

    /// The month's frozen priority order, persisting it on first call.
    pub fn monthly_rotation(&self, month: YearMonth) -> DeskResult<MonthlyRotation> {
        calendar::validate_month(month, &self.config.calendar)?;
        let _gate = self
            .roster_gate
            .read()
            .map_err(|_| DeskError::LockPoisoned { what: "roster" })?;
        let store = self.store()?;
        let roster = store.roster()?;
        RotationEngine::new(&self.config.rotation, &store).rotation_for(month, &roster)
    }

    // ── Schedule ──────────────────────────────────────────────────

    /// Generate (or regenerate) the schedule for `month`.
    pub fn generate_schedule(&self, month: YearMonth) -> DeskResult<GenerationOutcome> {
        calendar::validate_month(month, &self.config.calendar)?;
        let month_lock = self.month_lock(month)?;
        let _month_guard = month_lock
            .lock()
            .map_err(|_| DeskError::LockPoisoned { what: "month" })?;
        let _gate = self
            .roster_gate
            .read()
            .map_err(|_| DeskError::LockPoisoned { what: "roster" })?;

        let input = self.snapshot_for_generation(month)?;

        if input.roster.is_empty() {
            log::warn!("generate {month}: roster is empty, {} day(s) left unassigned", input.days.len());
            let report = self.report(month)?;
            return Ok(GenerationOutcome {
                month,
                version: None,
                status: GenerationStatus::EmptyRoster,
                assignments: Vec::new(),
                unfilled: input.days.iter().map(|d| d.date).collect(),
                deficits: BTreeMap::new(),
                report,
            });
        }

        let prefs: HashMap<&str, &MonthlyPreference> = input
            .prefs
            .iter()
            .map(|p| (p.engineer_id.as_str(), p))
            .collect();
        let candidates: Vec<Candidate> = input
            .roster
            .engineers
            .iter()
            .map(|e| Candidate {
                engineer_id: e.engineer_id.clone(),
                name: e.name.clone(),
                deficit: settle(e.deficit - input.previous.get(&e.engineer_id).copied().unwrap_or(0.0)),
                preference: prefs.get(e.engineer_id.as_str()).map(|p| (*p).clone()),
            })
            .collect();

        let result = allocation::allocate(&input.days, &input.order, &candidates, &self.config.scoring);

        let commit = GenerationCommit {
            month,
            assignments: result.assignments.clone(),
            deltas: result.deltas.clone(),
            unfilled: result.unfilled.len(),
        };
        let (record, deficits, report) = {
            let store = self.store()?;
            let record = store.commit_generation(&commit)?;
            let engineers = store.engineers()?;
            let deficits = engineers
                .iter()
                .map(|e| (e.engineer_id.clone(), e.deficit))
                .collect();
            let report = report::build_report(
                month,
                &engineers,
                &store.preferences_for_month(month)?,
                &store.assignments_for_month(month)?,
            );
            (record, deficits, report)
        };

        let status = if result.unfilled.is_empty() {
            GenerationStatus::Complete
        } else {
            log::warn!("generate {month}: {} day(s) left unfilled", result.unfilled.len());
            GenerationStatus::Partial
        };
        log::info!(
            "generate {month}: v{} assigned {} day(s), {} short of preferences, {} without preferences",
            record.version,
            result.assignments.len(),
            report.discrepancies.len(),
            report.missing_preferences.len()
        );

        Ok(GenerationOutcome {
            month,
            version: Some(record.version),
            status,
            assignments: result.assignments,
            unfilled: result.unfilled,
            deficits,
            report,
        })
    }

    fn snapshot_for_generation(&self, month: YearMonth) -> DeskResult<GenerationInput> {
        let store = self.store()?;
        let holidays = store.holidays()?;
        let days = calendar::resolve_month(month, &holidays, &self.config.calendar)?;
        let roster = store.roster()?;
        // Verify before computing anything on top of it.
        let previous = store.verified_ledger(month)?;

        let order = if roster.is_empty() {
            Vec::new()
        } else {
            let effective =
                RotationEngine::new(&self.config.rotation, &store).effective_order(month, &roster)?;
            for engineer_id in effective.skipped {
                store.append_event(
                    Some(month),
                    &DeskEvent::RotationMemberSkipped { month, engineer_id },
                )?;
            }
            effective.order
        };
        let prefs = store.preferences_for_month(month)?;

        Ok(GenerationInput { days, roster, previous, order, prefs })
    }

    /// Undo the month's deficit deltas and delete its schedule.
    pub fn reset_schedule(&self, month: YearMonth) -> DeskResult<ResetSummary> {
        calendar::validate_month(month, &self.config.calendar)?;
        let month_lock = self.month_lock(month)?;
        let _month_guard = month_lock
            .lock()
            .map_err(|_| DeskError::LockPoisoned { what: "month" })?;
        let (rolled_back, assignments) = self.store()?.reset_month(month)?;
        log::info!("reset {month}: {assignments} assignment(s) removed, {rolled_back} deficit(s) rolled back");
        Ok(ResetSummary { rolled_back, assignments })
    }

    /// Manual recovery after a `StateInconsistency`: forget the month's
    /// schedule and ledger, leaving every deficit as it stands.
    pub fn discard_generation_state(&self, month: YearMonth) -> DeskResult<usize> {
        calendar::validate_month(month, &self.config.calendar)?;
        let month_lock = self.month_lock(month)?;
        let _month_guard = month_lock
            .lock()
            .map_err(|_| DeskError::LockPoisoned { what: "month" })?;
        let removed = self.store()?.discard_month(month)?;
        log::warn!("discard {month}: generation state dropped, {removed} assignment(s) removed");
        Ok(removed)
    }

    pub fn schedule(&self, month: YearMonth) -> DeskResult<Vec<Assignment>> {
        self.store()?.assignments_for_month(month)
    }

    pub fn report(&self, month: YearMonth) -> DeskResult<ScheduleReport> {
        let store = self.store()?;
        Ok(report::build_report(
            month,
            &store.engineers()?,
            &store.preferences_for_month(month)?,
            &store.assignments_for_month(month)?,
        ))
    }

    // ── Snapshot / audit ──────────────────────────────────────────

    pub fn export_snapshot(&self) -> DeskResult<DeskSnapshot> {
        let _gate = self
            .roster_gate
            .read()
            .map_err(|_| DeskError::LockPoisoned { what: "roster" })?;
        self.store()?.capture_snapshot()
    }

    pub fn import_snapshot(&self, snapshot: &DeskSnapshot) -> DeskResult<()> {
        let _gate = self
            .roster_gate
            .write()
            .map_err(|_| DeskError::LockPoisoned { what: "roster" })?;
        self.store()?.restore_snapshot(snapshot)
    }

    pub fn events_for_month(&self, month: YearMonth) -> DeskResult<Vec<EventLogEntry>> {
        self.store()?.events_for_month(month)
    }
}
