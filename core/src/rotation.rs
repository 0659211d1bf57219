//! Priority rotation: the month's base ordering of groups and members.
//!
//! Month index = months elapsed since the configured epoch. The canonical
//! group order is left-rotated by `index mod groups`, and each group's
//! member order by `index mod members`.
//!
//! RULES:
//!   - A month's order is computed once, on first use, and persisted.
//!   - A persisted order is returned verbatim forever after, even when the
//!     roster has changed since. Deleted engineers are skipped at read time;
//!     the stored row is never rewritten.

use crate::{
    config::RotationConfig,
    error::{DeskError, DeskResult},
    event::DeskEvent,
    roster::Roster,
    store::ScheduleStore,
    types::{EntityId, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationGroup {
    pub group_id: EntityId,
    pub members:  Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRotation {
    pub month:       YearMonth,
    pub month_index: i64,
    pub groups:      Vec<RotationGroup>,
}

impl MonthlyRotation {
    /// Rotate the canonical order for `month`.
    pub fn compute(
        month:     YearMonth,
        canonical: &[(EntityId, Vec<EntityId>)],
        epoch:     YearMonth,
    ) -> Self {
        let month_index = month.months_since(epoch);
        let mut groups: Vec<RotationGroup> = canonical
            .iter()
            .map(|(group_id, members)| {
                let mut members = members.clone();
                rotate_left_by_index(&mut members, month_index);
                RotationGroup { group_id: group_id.clone(), members }
            })
            .collect();
        rotate_left_by_index(&mut groups, month_index);
        Self { month, month_index, groups }
    }

    /// Flattened priority: group order first, then member order.
    pub fn priority_order(&self) -> Vec<EntityId> {
        self.groups
            .iter()
            .flat_map(|g| g.members.iter().cloned())
            .collect()
    }

    /// Reconcile the frozen order with the current roster.
    ///
    /// Engineers no longer on the roster are dropped in place (or rejected
    /// when `skip_missing` is false). Engineers who joined after the order
    /// was frozen follow everyone else, in canonical order.
    pub fn effective_order(
        &self,
        roster:       &Roster,
        skip_missing: bool,
    ) -> DeskResult<EffectiveOrder> {
        let mut order = Vec::with_capacity(roster.engineers.len());
        let mut skipped = Vec::new();
        let mut placed: HashSet<&str> = HashSet::new();

        for id in self.groups.iter().flat_map(|g| g.members.iter()) {
            if roster.contains(id) {
                if placed.insert(id.as_str()) {
                    order.push(id.clone());
                }
            } else if skip_missing {
                skipped.push(id.clone());
            } else {
                return Err(DeskError::RotationConflict {
                    month: self.month,
                    engineer_id: id.clone(),
                });
            }
        }

        let mut appended = Vec::new();
        for (_, members) in roster.canonical_order() {
            for id in members {
                if !placed.contains(id.as_str()) {
                    appended.push(id);
                }
            }
        }
        order.extend(appended.iter().cloned());

        Ok(EffectiveOrder { order, skipped, appended })
    }
}

/// The order actually used for scoring one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveOrder {
    pub order:    Vec<EntityId>,
    /// Frozen entries whose engineer has been deleted.
    pub skipped:  Vec<EntityId>,
    /// Current engineers missing from the frozen order.
    pub appended: Vec<EntityId>,
}

/// Circular left rotation by `index mod len`, well-defined for negative
/// indices and empty slices.
fn rotate_left_by_index<T>(items: &mut [T], index: i64) {
    if items.is_empty() {
        return;
    }
    let shift = index.rem_euclid(items.len() as i64) as usize;
    items.rotate_left(shift);
}

/// Sole writer of persisted monthly rotations.
pub struct RotationEngine<'a> {
    config: &'a RotationConfig,
    store:  &'a ScheduleStore,
}

impl<'a> RotationEngine<'a> {
    pub fn new(config: &'a RotationConfig, store: &'a ScheduleStore) -> Self {
        Self { config, store }
    }

    /// Return the persisted order for `month`, computing and persisting it
    /// from `roster`'s canonical order on first call.
    pub fn rotation_for(&self, month: YearMonth, roster: &Roster) -> DeskResult<MonthlyRotation> {
        if let Some(stored) = self.store.monthly_rotation(month)? {
            return Ok(stored);
        }

        let rotation = MonthlyRotation::compute(month, &roster.canonical_order(), self.config.epoch());
        // Nothing to freeze yet; the first real roster decides.
        if roster.is_empty() {
            return Ok(rotation);
        }
        let event = DeskEvent::RotationPersisted {
            month,
            month_index: rotation.month_index,
            groups: rotation.groups.len(),
            engineers: rotation.groups.iter().map(|g| g.members.len()).sum(),
        };
        if !self.store.insert_monthly_rotation(&rotation, &event)? {
            // Lost a race with another writer; theirs is the frozen one.
            return self
                .store
                .monthly_rotation(month)?
                .ok_or_else(|| DeskError::StateInconsistency {
                    month,
                    reason: "rotation insert ignored but no row present".into(),
                });
        }
        log::info!(
            "rotation {month}: persisted index {} ({} groups)",
            rotation.month_index,
            rotation.groups.len()
        );
        Ok(rotation)
    }

    /// Persisted order reconciled against the current roster.
    pub fn effective_order(&self, month: YearMonth, roster: &Roster) -> DeskResult<EffectiveOrder> {
        let rotation = self.rotation_for(month, roster)?;
        let effective = rotation.effective_order(roster, self.config.skip_missing_members)?;
        for id in &effective.skipped {
            log::warn!("rotation {month}: skipping removed engineer {id}");
        }
        Ok(effective)
    }
}
