//! Milestones: named groups of work units with a deadline.
//!
//! Milestones come either from caller-supplied definitions, which partition the
//! sorted unit list evenly in order, or are derived per category with deadlines
//! spaced a fixed number of days apart.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::candidate::MilestoneSpec;
use crate::unit::{UnitId, WorkUnit};

const SECS_PER_DAY: u64 = 86_400;

/// A named grouping of work units with a deadline and success criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    /// Units grouped under this milestone, in plan order.
    pub units: Vec<UnitId>,
    /// Seconds since UNIX epoch.
    pub deadline: u64,
    pub criteria: Vec<String>,
    /// Units already completed.
    pub completed: BTreeSet<UnitId>,
}

impl Milestone {
    /// Percentage of grouped units completed, in `[0.0, 100.0]`.
    ///
    /// An empty milestone reports `0.0`.
    pub fn progress(&self) -> f64 {
        if self.units.is_empty() {
            return 0.0;
        }
        let done = self
            .units
            .iter()
            .filter(|id| self.completed.contains(id))
            .count();
        done as f64 / self.units.len() as f64 * 100.0
    }

    /// Whether the completed set equals the full unit set.
    pub fn is_complete(&self) -> bool {
        let all: BTreeSet<UnitId> = self.units.iter().copied().collect();
        all == self.completed
    }

    /// Record a completed unit. Ids outside the milestone are ignored.
    pub fn mark_completed(&mut self, id: UnitId) -> bool {
        if self.contains(id) {
            self.completed.insert(id)
        } else {
            false
        }
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains(&id)
    }
}

/// One milestone per definition; the sorted units are split evenly in order,
/// the last milestone absorbing the remainder.
pub fn from_specs(specs: &[MilestoneSpec], sorted: &[WorkUnit]) -> Vec<Milestone> {
    if specs.is_empty() {
        return Vec::new();
    }
    let per = sorted.len() / specs.len();
    let last = specs.len() - 1;

    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let start = i * per;
            let end = if i == last { sorted.len() } else { start + per };
            let criteria = if spec.criteria.is_empty() {
                vec![format!("All {} tasks completed", spec.name)]
            } else {
                spec.criteria.clone()
            };
            Milestone {
                id: format!("milestone-{}", i + 1),
                name: spec.name.clone(),
                units: sorted[start..end].iter().map(|u| u.id).collect(),
                deadline: spec.deadline,
                criteria,
                completed: BTreeSet::new(),
            }
        })
        .collect()
}

/// One milestone per category, in first-seen order, the i-th due
/// `spacing_days * (i + 1)` days after `now`.
pub fn by_category(sorted: &[WorkUnit], now: u64, spacing_days: u64) -> Vec<Milestone> {
    let mut categories: Vec<&str> = Vec::new();
    for unit in sorted {
        if !categories.contains(&unit.category.as_str()) {
            categories.push(&unit.category);
        }
    }

    categories
        .into_iter()
        .enumerate()
        .map(|(i, category)| {
            let offset = spacing_days
                .saturating_mul(i as u64 + 1)
                .saturating_mul(SECS_PER_DAY);
            Milestone {
                id: format!("milestone-{}", i + 1),
                name: format!("{category} complete"),
                units: sorted
                    .iter()
                    .filter(|u| u.category == category)
                    .map(|u| u.id)
                    .collect(),
                deadline: now.saturating_add(offset),
                criteria: vec![format!("All {category} tasks completed")],
                completed: BTreeSet::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Priority;

    fn uid(n: u64) -> UnitId {
        UnitId::new(n).unwrap()
    }

    fn units(categories: &[&str]) -> Vec<WorkUnit> {
        categories
            .iter()
            .enumerate()
            .map(|(i, c)| {
                WorkUnit::new(uid(i as u64 + 1), format!("u{i}"), "", 1.0, Priority::Medium, *c)
            })
            .collect()
    }

    fn spec(name: &str, deadline: u64) -> MilestoneSpec {
        MilestoneSpec {
            name: name.into(),
            deadline,
            criteria: vec![],
        }
    }

    #[test]
    fn explicit_specs_partition_evenly_with_remainder_last() {
        let sorted = units(&["a"; 7]);
        let ms = from_specs(&[spec("m1", 10), spec("m2", 20), spec("m3", 30)], &sorted);
        assert_eq!(ms.len(), 3);
        assert_eq!(ms[0].units, vec![uid(1), uid(2)]);
        assert_eq!(ms[1].units, vec![uid(3), uid(4)]);
        assert_eq!(ms[2].units, vec![uid(5), uid(6), uid(7)]);
        assert_eq!(ms[1].deadline, 20);
        assert_eq!(ms[0].criteria, vec!["All m1 tasks completed".to_string()]);
    }

    #[test]
    fn more_specs_than_units_gives_everything_to_last() {
        let sorted = units(&["a", "a"]);
        let ms = from_specs(&[spec("m1", 1), spec("m2", 2), spec("m3", 3)], &sorted);
        assert!(ms[0].units.is_empty());
        assert!(ms[1].units.is_empty());
        assert_eq!(ms[2].units.len(), 2);
    }

    #[test]
    fn categories_grouped_in_first_seen_order() {
        let sorted = units(&["dev", "test", "dev", "docs"]);
        let now = 1_000;
        let ms = by_category(&sorted, now, 7);
        assert_eq!(ms.len(), 3);
        assert_eq!(ms[0].units, vec![uid(1), uid(3)]);
        assert_eq!(ms[0].deadline, now + 7 * 86_400);
        assert_eq!(ms[1].deadline, now + 14 * 86_400);
        assert_eq!(ms[2].deadline, now + 21 * 86_400);
        assert_eq!(ms[1].criteria, vec!["All test tasks completed".to_string()]);
    }

    #[test]
    fn progress_and_completion() {
        let sorted = units(&["dev", "dev"]);
        let mut m = by_category(&sorted, 0, 7).remove(0);
        assert_eq!(m.progress(), 0.0);
        assert!(!m.is_complete());

        assert!(m.mark_completed(uid(1)));
        assert_eq!(m.progress(), 50.0);
        assert!(!m.contains(uid(99)));
        assert!(!m.mark_completed(uid(99)));

        m.mark_completed(uid(2));
        assert_eq!(m.progress(), 100.0);
        assert!(m.is_complete());
    }
}
