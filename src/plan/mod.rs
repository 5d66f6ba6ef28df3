//! The assembled plan: ordered units, milestones, critical path and reports.
//!
//! A [`Plan`] is built once per request by the
//! [`PlanningEngine`](crate::engine::PlanningEngine). Unit and milestone
//! identities are fixed afterwards; only unit lifecycle fields and milestone
//! completion sets change, through [`Plan::record_completion`].

pub mod budget;
pub mod critical_path;
pub mod timeline;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dependency;
use crate::error::UnitError;
use crate::milestone::Milestone;
use crate::unit::{UnitId, WorkUnit};

pub use budget::{BudgetOptimizer, BudgetReport, BudgetSelector, ExactOptimizer, GreedyOptimizer, Offer, OptimizerKind};
pub use critical_path::CriticalPath;
pub use timeline::{MilestoneMarker, Timeline, TimelineEntry};

// ---------------------------------------------------------------------------
// Cycle repair
// ---------------------------------------------------------------------------

/// What the cycle repair pass did.
///
/// Repair is best-effort: truncating every multi-dependency list to its first
/// entry breaks some cycles but not all (a ring of single dependencies
/// survives), and it may drop legitimate ordering constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub attempted: bool,
    /// The cycle that triggered the repair.
    pub cycle: Vec<UnitId>,
    /// Units whose dependency lists were truncated.
    pub truncated: Vec<UnitId>,
    /// Whether the graph is acyclic after repair.
    pub resolved: bool,
}

/// Truncate every dependency list longer than one entry to its first entry.
pub fn repair_cycles(units: &mut [WorkUnit]) -> RepairReport {
    let cycle = dependency::find_cycle(units).unwrap_or_default();

    let mut truncated = Vec::new();
    for unit in units.iter_mut() {
        if unit.dependencies.len() > 1 {
            unit.dependencies.truncate(1);
            truncated.push(unit.id);
        }
    }

    let resolved = !dependency::has_circular_dependency(units);
    if resolved {
        tracing::warn!(truncated = truncated.len(), "dependency cycle repaired by truncation");
    } else {
        tracing::warn!(
            cycle = ?cycle.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "dependency cycle survived repair, plan will be marked invalid"
        );
    }

    RepairReport {
        attempted: true,
        cycle,
        truncated,
        resolved,
    }
}

/// Sum of estimated hours.
pub fn total_hours(units: &[WorkUnit]) -> f64 {
    units.iter().map(|u| u.estimated_hours).sum()
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Completion summary for a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub completed_units: usize,
    pub total_units: usize,
    pub completed_hours: f64,
    pub total_hours: f64,
    /// Percentage of estimated hours completed.
    pub percent: f64,
}

/// An executable, dependency-ordered project plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    /// Units in topological order.
    pub units: Vec<WorkUnit>,
    pub milestones: Vec<Milestone>,
    /// Sum over retained units.
    pub total_estimated_hours: f64,
    pub critical_path: Vec<UnitId>,
    /// Result of [`Plan::validate`] at assembly time. Beyond acyclicity this
    /// also requires every dependency and milestone reference to resolve and
    /// `total_estimated_hours` to match the retained units.
    pub valid: bool,
    /// Seconds since UNIX epoch.
    pub created_at: u64,
    #[serde(default)]
    pub repair: Option<RepairReport>,
    #[serde(default)]
    pub budget: Option<BudgetReport>,
    /// Echo of the constraints and candidate-source summary.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Plan {
    /// Structural soundness of the plan.
    ///
    /// True when the dependency graph is acyclic and also:
    /// - every dependency names a unit in the plan,
    /// - every milestone references only units in the plan,
    /// - `total_estimated_hours` equals the sum over `units`.
    pub fn validate(&self) -> bool {
        if dependency::check_references(&self.units).is_err() {
            return false;
        }
        if dependency::has_circular_dependency(&self.units) {
            return false;
        }
        let known: HashSet<UnitId> = self.units.iter().map(|u| u.id).collect();
        if self
            .milestones
            .iter()
            .flat_map(|m| m.units.iter())
            .any(|id| !known.contains(id))
        {
            return false;
        }
        (self.total_estimated_hours - total_hours(&self.units)).abs() < 1e-6
    }

    pub fn unit(&self, id: UnitId) -> Option<&WorkUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Position of a unit in the sorted order.
    pub fn position(&self, id: UnitId) -> Option<usize> {
        self.units.iter().position(|u| u.id == id)
    }

    pub fn critical_path_hours(&self) -> f64 {
        let hours: HashMap<UnitId, f64> =
            self.units.iter().map(|u| (u.id, u.estimated_hours)).collect();
        self.critical_path
            .iter()
            .filter_map(|id| hours.get(id))
            .sum()
    }

    /// Complete a unit (starting it first if still pending) and record it on
    /// every milestone that contains it.
    pub fn record_completion(
        &mut self,
        id: UnitId,
        actual_hours: f64,
        at: u64,
    ) -> Result<(), UnitError> {
        let unit = self
            .units
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| UnitError::NotFound {
                unit: id.to_string(),
            })?;
        if unit.status == crate::unit::UnitStatus::Pending {
            unit.start()?;
        }
        unit.complete(actual_hours, at)?;

        for milestone in &mut self.milestones {
            milestone.mark_completed(id);
        }
        Ok(())
    }

    pub fn progress(&self) -> PlanProgress {
        let completed: Vec<&WorkUnit> = self.units.iter().filter(|u| u.is_completed()).collect();
        let completed_hours: f64 = completed.iter().map(|u| u.estimated_hours).sum();
        let total = total_hours(&self.units);
        let percent = if total > 0.0 {
            completed_hours / total * 100.0
        } else {
            0.0
        };
        PlanProgress {
            completed_units: completed.len(),
            total_units: self.units.len(),
            completed_hours,
            total_hours: total,
            percent,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Priority;

    fn uid(n: u64) -> UnitId {
        UnitId::new(n).unwrap()
    }

    fn unit(n: u64, hours: f64, deps: &[u64]) -> WorkUnit {
        WorkUnit::new(uid(n), format!("u{n}"), "", hours, Priority::Medium, "dev")
            .with_dependencies(deps.iter().map(|d| uid(*d)).collect())
    }

    fn plan(units: Vec<WorkUnit>) -> Plan {
        let total = total_hours(&units);
        let milestones = crate::milestone::by_category(&units, 0, 7);
        Plan {
            id: "plan-0".into(),
            goal: "g".into(),
            units,
            milestones,
            total_estimated_hours: total,
            critical_path: vec![],
            valid: true,
            created_at: 0,
            repair: None,
            budget: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn repair_breaks_multi_dependency_cycle() {
        // 1 -> 2 -> 3 -> 1 where 1 also depends on 4 first.
        let mut units = vec![
            unit(1, 1.0, &[4, 3]),
            unit(2, 1.0, &[1]),
            unit(3, 1.0, &[2]),
            unit(4, 1.0, &[]),
        ];
        assert!(dependency::has_circular_dependency(&units));
        let report = repair_cycles(&mut units);
        assert!(report.attempted);
        assert_eq!(report.truncated, vec![uid(1)]);
        assert!(report.resolved);
        assert_eq!(units[0].dependencies, vec![uid(4)]);
    }

    #[test]
    fn repair_cannot_break_single_dependency_ring() {
        let mut units = vec![unit(1, 1.0, &[3]), unit(2, 1.0, &[1]), unit(3, 1.0, &[2])];
        let report = repair_cycles(&mut units);
        assert!(report.attempted);
        assert!(report.truncated.is_empty());
        assert!(!report.resolved);
        assert_eq!(report.cycle.len(), 3);
    }

    #[test]
    fn validate_checks_cycles_references_and_total() {
        let p = plan(vec![unit(1, 1.0, &[]), unit(2, 1.0, &[1])]);
        assert!(p.validate());

        let cyclic = plan(vec![unit(1, 1.0, &[2]), unit(2, 1.0, &[1])]);
        assert!(!cyclic.validate());

        let mut dangling = plan(vec![unit(1, 1.0, &[])]);
        dangling.milestones[0].units.push(uid(42));
        assert!(!dangling.validate());

        let dangling_dep = plan(vec![unit(1, 1.0, &[7])]);
        assert!(!dangling_dep.validate());

        let mut wrong_total = plan(vec![unit(1, 1.0, &[])]);
        wrong_total.total_estimated_hours = 5.0;
        assert!(!wrong_total.validate());
    }

    #[test]
    fn record_completion_updates_units_and_milestones() {
        let mut p = plan(vec![unit(1, 2.0, &[]), unit(2, 2.0, &[1])]);
        p.record_completion(uid(1), 2.5, 100).unwrap();

        let done = p.unit(uid(1)).unwrap();
        assert!(done.is_completed());
        assert_eq!(done.actual_hours, Some(2.5));
        assert!(p.milestones[0].completed.contains(&uid(1)));

        let progress = p.progress();
        assert_eq!(progress.completed_units, 1);
        assert_eq!(progress.total_units, 2);
        assert_eq!(progress.percent, 50.0);

        assert!(matches!(
            p.record_completion(uid(1), 1.0, 200),
            Err(UnitError::InvalidTransition { .. })
        ));
        assert!(matches!(
            p.record_completion(uid(9), 1.0, 200),
            Err(UnitError::NotFound { .. })
        ));
    }

    #[test]
    fn plan_serializes_to_json() {
        let p = plan(vec![unit(1, 2.0, &[])]);
        let json = p.to_json().unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
