//! Planning engine facade: the single entry point for turning a request into
//! a plan.
//!
//! The pipeline runs one direction: decompose, assign dependencies, handle
//! cycles, sort, fit the budget, group into milestones, compute the critical
//! path, validate and finally project a timeline. The engine holds only
//! immutable configuration, so one instance can serve any number of requests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::candidate::{PlanRequest, check_buffer, check_unit_ceiling};
use crate::config::{CyclePolicy, PlannerConfig};
use crate::decompose::Decomposer;
use crate::dependency;
use crate::error::{DependencyError, PlanResult};
use crate::estimate::Estimator;
use crate::milestone;
use crate::plan::budget::optimizer_for;
use crate::plan::critical_path::critical_path;
use crate::plan::timeline::{self, Timeline};
use crate::plan::{Plan, repair_cycles, total_hours};
use crate::unit::{UnitId, UnitIdAllocator, WorkUnit};

/// Float slack when comparing the unconstrained total against the budget.
const EPSILON: f64 = 1e-9;

/// A plan together with its projected timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub timeline: Timeline,
}

/// Converts planning requests into validated plans.
#[derive(Debug, Clone, Default)]
pub struct PlanningEngine {
    config: PlannerConfig,
    estimator: Estimator,
}

impl PlanningEngine {
    pub fn new(config: PlannerConfig) -> Self {
        let estimator = Estimator::new(config.heuristics.clone());
        Self { config, estimator }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Plan against the current wall-clock time.
    pub fn plan(&self, request: &PlanRequest) -> PlanResult<PlanOutcome> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.plan_at(request, now)
    }

    /// Plan with an explicit "now" (seconds since UNIX epoch).
    ///
    /// Output is fully determined by the request, the config and `now`.
    pub fn plan_at(&self, request: &PlanRequest, now: u64) -> PlanResult<PlanOutcome> {
        let constraints = &request.constraints;
        constraints.validate()?;
        request.source.validate()?;

        let max_hours_per_unit = constraints
            .max_hours_per_unit
            .unwrap_or(self.config.max_hours_per_unit);
        let buffer_percent = constraints
            .buffer_percent
            .unwrap_or(self.config.buffer_percent);
        check_unit_ceiling(max_hours_per_unit)?;
        check_buffer(buffer_percent)?;

        // Decompose.
        let mut ids = UnitIdAllocator::new();
        let mut units = Decomposer::new(&self.estimator, max_hours_per_unit, buffer_percent)
            .with_samples(&request.samples)
            .decompose(&request.goal, &request.source, &mut ids)?;

        // Dependencies.
        let assignment = dependency::analyze(&units, request.dependency_map.as_ref())?;
        dependency::apply_assignment(&mut units, &assignment);
        dependency::check_references(&units)?;
        tracing::debug!(
            units = units.len(),
            map_driven = request.dependency_map.is_some(),
            "dependencies assigned"
        );

        // Cycles.
        let mut repair = None;
        if let Some(cycle) = dependency::find_cycle(&units) {
            match self.config.cycle_policy {
                CyclePolicy::Reject => {
                    return Err(DependencyError::CycleDetected {
                        cycle: cycle.iter().map(ToString::to_string).collect(),
                    }
                    .into());
                }
                CyclePolicy::Repair => repair = Some(repair_cycles(&mut units)),
            }
        }

        // Order.
        let order = dependency::topological_sort(&units, &self.config.priority_ranks);
        if !order.is_complete() {
            tracing::debug!(
                unresolved = order.unresolved.len(),
                "units on a cycle appended in decomposition order"
            );
        }
        let mut units = reorder(units, order.order.iter().chain(&order.unresolved));

        // Budget.
        let mut budget = None;
        if let Some(max_total) = constraints.max_total_hours {
            let requested = total_hours(&units);
            if requested > max_total + EPSILON {
                let optimizer = optimizer_for(self.config.optimizer, self.config.exact_unit_limit);
                let report = optimizer.select(&units, max_total, &self.config.priority_ranks);
                let keep: HashSet<UnitId> = report.retained.iter().copied().collect();
                units.retain(|u| keep.contains(&u.id));
                if report.shortfall {
                    tracing::warn!(
                        budget_hours = max_total,
                        achieved_hours = report.achieved_hours,
                        unfit_high = report.unfit_high.len(),
                        "budget cannot hold every high-priority unit"
                    );
                }
                tracing::debug!(
                    strategy = %report.strategy,
                    requested_hours = requested,
                    retained = report.retained.len(),
                    dropped = report.dropped.len(),
                    "budget applied"
                );
                budget = Some(report);
            }
        }

        // Milestones.
        let milestones = if constraints.milestones.is_empty() {
            milestone::by_category(&units, now, self.config.milestone_spacing_days)
        } else {
            milestone::from_specs(&constraints.milestones, &units)
        };

        let critical = critical_path(&units);
        tracing::debug!(
            length = critical.units.len(),
            hours = critical.hours,
            "critical path computed"
        );

        let mut metadata: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        metadata.insert(
            "constraints".into(),
            serde_json::to_value(constraints).unwrap_or(serde_json::Value::Null),
        );
        if !request.source.summary.is_empty() {
            metadata.insert(
                "summary".into(),
                serde_json::Value::Object(request.source.summary.clone().into_iter().collect()),
            );
        }
        metadata.insert("max_hours_per_unit".into(), max_hours_per_unit.into());
        metadata.insert("buffer_percent".into(), buffer_percent.into());

        let mut plan = Plan {
            id: format!("plan-{now}"),
            goal: request.goal.clone(),
            total_estimated_hours: total_hours(&units),
            units,
            milestones,
            critical_path: critical.units,
            valid: false,
            created_at: now,
            repair,
            budget,
            metadata,
        };
        plan.valid = plan.validate();

        let timeline = timeline::project(&plan, now);
        if let Some(deadline) = constraints.deadline {
            let met = timeline.deadline_met(deadline);
            if !met {
                tracing::warn!(
                    deadline,
                    projected_finish = timeline.finish,
                    "plan finishes after the deadline"
                );
            }
            plan.metadata.insert("deadline_met".into(), met.into());
        }

        tracing::info!(
            plan = %plan.id,
            units = plan.units.len(),
            milestones = plan.milestones.len(),
            total_hours = plan.total_estimated_hours,
            valid = plan.valid,
            "plan assembled"
        );

        Ok(PlanOutcome { plan, timeline })
    }
}

/// Rearrange units into the given id order.
fn reorder<'a>(units: Vec<WorkUnit>, order: impl Iterator<Item = &'a UnitId>) -> Vec<WorkUnit> {
    let mut by_id: HashMap<UnitId, WorkUnit> = units.into_iter().map(|u| (u.id, u)).collect();
    order.filter_map(|id| by_id.remove(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Candidate, CandidateSource, Constraints, DependencyMap};
    use crate::error::{ConstraintError, PlanError};
    use crate::unit::Priority;

    fn engine() -> PlanningEngine {
        PlanningEngine::new(PlannerConfig::default())
    }

    #[test]
    fn empty_request_yields_fallback_plan() {
        let request = PlanRequest::new("improve things", CandidateSource::default());
        let outcome = engine().plan_at(&request, 0).unwrap();
        let plan = outcome.plan;
        assert_eq!(plan.units.len(), 4);
        assert!(plan.valid);
        assert!((plan.total_estimated_hours - 11.0).abs() < 1e-9);
        // Four distinct categories, four milestones.
        assert_eq!(plan.milestones.len(), 4);
        // All independent: the timeline is as long as the longest unit.
        assert_eq!(outcome.timeline.makespan_hours, 4.0);
    }

    #[test]
    fn zero_ceiling_fails_fast() {
        let request = PlanRequest::new("g", CandidateSource::default()).with_constraints(
            Constraints {
                max_hours_per_unit: Some(0.0),
                ..Default::default()
            },
        );
        assert!(matches!(
            engine().plan_at(&request, 0),
            Err(PlanError::Constraint(_))
        ));
    }

    #[test]
    fn tiny_ceiling_fails_with_split_limit() {
        let source = CandidateSource::from_candidates(vec![Candidate::new(
            "security",
            "src/auth.rs",
            Priority::High,
        )]);
        let request = PlanRequest::new("g", source).with_constraints(Constraints {
            max_hours_per_unit: Some(1e-300),
            ..Default::default()
        });
        assert!(matches!(
            engine().plan_at(&request, 0),
            Err(PlanError::Constraint(ConstraintError::TooManyParts { .. }))
        ));
    }

    #[test]
    fn unknown_resource_in_map_fails_fast() {
        let source = CandidateSource::from_candidates(vec![Candidate::new(
            "refactor",
            "src/a.rs",
            Priority::Medium,
        )]);
        let mut map = DependencyMap::new();
        map.insert("src/a.rs".into(), vec!["src/missing.rs".into()]);
        let request = PlanRequest::new("g", source).with_dependency_map(map);
        assert!(matches!(
            engine().plan_at(&request, 0),
            Err(PlanError::Dependency(DependencyError::UnknownResource { .. }))
        ));
    }

    #[test]
    fn metadata_echoes_constraints_and_deadline() {
        let source = CandidateSource::from_candidates(vec![Candidate::new(
            "docs",
            "README.md",
            Priority::Low,
        )]);
        let request = PlanRequest::new("g", source).with_constraints(Constraints {
            deadline: Some(60),
            ..Default::default()
        });
        let plan = engine().plan_at(&request, 0).unwrap().plan;
        assert!(plan.metadata.contains_key("constraints"));
        // 1.2h of work cannot finish within a minute.
        assert_eq!(plan.metadata["deadline_met"], serde_json::Value::Bool(false));
        assert_eq!(plan.id, "plan-0");
    }

    #[test]
    fn reorder_follows_given_ids() {
        let a = WorkUnit::new(UnitId::new(1).unwrap(), "a", "", 1.0, Priority::Low, "x");
        let b = WorkUnit::new(UnitId::new(2).unwrap(), "b", "", 1.0, Priority::Low, "x");
        let order = [b.id, a.id];
        let sorted = reorder(vec![a, b], order.iter());
        assert_eq!(sorted[0].name, "b");
        assert_eq!(sorted[1].name, "a");
    }
}
