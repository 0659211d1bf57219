//! Roster records: engineers, groups and their canonical order.
//!
//! The canonical order is the order groups were created in, and within a
//! group the order engineers joined it. Rotation derives every month's
//! priority from it.

use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engineer {
    pub engineer_id:     EntityId,
    pub name:            String,
    pub email:           String,
    pub group_id:        EntityId,
    pub member_position: i64,
    pub deficit:         f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: EntityId,
    pub name:     String,
    pub position: i64,
}

/// Point-in-time copy of the roster, read once per generation.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    /// Groups in canonical order.
    pub groups:    Vec<Group>,
    /// Engineers ordered by (group position, member position).
    pub engineers: Vec<Engineer>,
}

impl Roster {
    pub fn is_empty(&self) -> bool {
        self.engineers.is_empty()
    }

    pub fn engineer(&self, engineer_id: &str) -> Option<&Engineer> {
        self.engineers.iter().find(|e| e.engineer_id == engineer_id)
    }

    pub fn contains(&self, engineer_id: &str) -> bool {
        self.engineer(engineer_id).is_some()
    }

    /// Canonical member order of every group, groups in canonical order.
    /// Empty groups are included with no members.
    pub fn canonical_order(&self) -> Vec<(EntityId, Vec<EntityId>)> {
        let mut members: HashMap<&str, Vec<&Engineer>> = HashMap::new();
        for e in &self.engineers {
            members.entry(e.group_id.as_str()).or_default().push(e);
        }
        self.groups
            .iter()
            .map(|g| {
                let mut list = members.remove(g.group_id.as_str()).unwrap_or_default();
                list.sort_by(|a, b| {
                    a.member_position
                        .cmp(&b.member_position)
                        .then_with(|| a.engineer_id.cmp(&b.engineer_id))
                });
                (
                    g.group_id.clone(),
                    list.into_iter().map(|e| e.engineer_id.clone()).collect(),
                )
            })
            .collect()
    }
}

/// Mean of the given deficits, 0.0 when there are none.
/// A newcomer is seeded with this so they start neither ahead nor behind.
pub fn average_deficit(deficits: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = deficits.fold((0.0f64, 0usize), |(s, c), d| (s + d, c + 1));
    if count == 0 {
        0.0
    } else {
        settle(sum / count as f64)
    }
}

/// Snap a deficit onto a fixed grid so that applying a delta and later
/// rolling it back lands on the same f64.
pub fn settle(value: f64) -> f64 {
    const GRID: f64 = 1e9;
    let snapped = (value * GRID).round() / GRID;
    if snapped == 0.0 { 0.0 } else { snapped }
}

/// Case-insensitive uniqueness key for engineer and group names.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eng(id: &str, group: &str, pos: i64, deficit: f64) -> Engineer {
        Engineer {
            engineer_id: id.into(),
            name: id.into(),
            email: String::new(),
            group_id: group.into(),
            member_position: pos,
            deficit,
        }
    }

    #[test]
    fn canonical_order_groups_members_by_position() {
        let roster = Roster {
            groups: vec![
                Group { group_id: "g1".into(), name: "Core".into(), position: 0 },
                Group { group_id: "g2".into(), name: "Edge".into(), position: 1 },
                Group { group_id: "g3".into(), name: "Empty".into(), position: 2 },
            ],
            engineers: vec![
                eng("b", "g1", 1, 0.0),
                eng("c", "g2", 0, 0.0),
                eng("a", "g1", 0, 0.0),
            ],
        };
        let order = roster.canonical_order();
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], ("g1".to_string(), vec!["a".to_string(), "b".to_string()]));
        assert_eq!(order[1].1, vec!["c".to_string()]);
        assert!(order[2].1.is_empty());
    }

    #[test]
    fn average_deficit_of_empty_team_is_zero() {
        assert_eq!(average_deficit(std::iter::empty()), 0.0);
        assert_eq!(average_deficit([1.0, 2.0, 4.5].into_iter()), 2.5);
    }

    #[test]
    fn settle_undoes_float_drift() {
        let base = 1.0 / 3.0;
        let round_trip = settle((base + 0.25 * 7.0) - 0.25 * 7.0);
        assert_eq!(round_trip.to_bits(), settle(base).to_bits());
        assert_eq!(name_key("  Jane Doe "), "jane doe");
    }
}
