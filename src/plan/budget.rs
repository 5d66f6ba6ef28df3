//! Budget-constrained selection of work units.
//!
//! Two strategies behind one trait:
//!
//! - [`GreedyOptimizer`] (default, best-effort): units are offered in
//!   `(priority_rank, dependency_count)` order to a [`BudgetSelector`] that
//!   accepts while the running total fits. A high-priority unit that does not
//!   fit may evict already-accepted low-priority units. One pass, no
//!   backtracking, so the result is an approximation, not an optimal knapsack.
//! - [`ExactOptimizer`]: exhaustive subset search for small plans, maximizing
//!   priority-weighted hours under the budget. Falls back to greedy above its
//!   unit limit.
//!
//! Both keep the retained set closed under dependencies: a unit whose
//! dependency was left out is dropped as well.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::unit::{Priority, PriorityRanks, UnitId, WorkUnit};

/// Float slack for budget comparisons.
const EPSILON: f64 = 1e-9;

/// Which optimizer the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Greedy,
    Exact,
}

impl std::fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Greedy => write!(f, "greedy"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

/// Outcome of a budget selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub strategy: String,
    /// `true` when the strategy is a heuristic approximation.
    pub best_effort: bool,
    pub budget_hours: f64,
    /// Unconstrained total.
    pub requested_hours: f64,
    /// Total of retained units.
    pub achieved_hours: f64,
    /// Retained units, in input order.
    pub retained: Vec<UnitId>,
    /// Units left out, in input order.
    pub dropped: Vec<UnitId>,
    /// Low-priority units accepted and then evicted for high-priority ones.
    pub evicted: Vec<UnitId>,
    /// High-priority units that could not be retained.
    pub unfit_high: Vec<UnitId>,
    /// Whether any high-priority unit is missing from the selection.
    pub shortfall: bool,
}

/// A pluggable budget selection strategy.
pub trait BudgetOptimizer {
    fn name(&self) -> &'static str;

    /// Choose units to keep under `budget_hours`. `units` are in plan order.
    fn select(&self, units: &[WorkUnit], budget_hours: f64, ranks: &PriorityRanks) -> BudgetReport;
}

// ---------------------------------------------------------------------------
// BudgetSelector
// ---------------------------------------------------------------------------

/// Result of offering one unit to a [`BudgetSelector`].
#[derive(Debug, Clone, PartialEq)]
pub enum Offer {
    Accepted,
    /// Accepted after evicting the listed low-priority units.
    AcceptedAfterEviction(Vec<UnitId>),
    Rejected,
}

/// Incremental greedy acceptance under a fixed budget.
#[derive(Debug, Clone)]
pub struct BudgetSelector {
    budget_hours: f64,
    accepted: Vec<(UnitId, f64, Priority)>,
    evicted: Vec<UnitId>,
    running: f64,
}

impl BudgetSelector {
    pub fn new(budget_hours: f64) -> Self {
        Self {
            budget_hours,
            accepted: Vec::new(),
            evicted: Vec::new(),
            running: 0.0,
        }
    }

    pub fn running_hours(&self) -> f64 {
        self.running
    }

    pub fn accepted(&self) -> Vec<UnitId> {
        self.accepted.iter().map(|(id, _, _)| *id).collect()
    }

    pub fn evicted(&self) -> &[UnitId] {
        &self.evicted
    }

    fn fits(&self, extra: f64) -> bool {
        self.running + extra <= self.budget_hours + EPSILON
    }

    /// Accept the unit if it fits. A high-priority unit that does not fit
    /// evicts accepted low-priority units, oldest first, but only when doing so
    /// actually makes room.
    pub fn offer(&mut self, unit: &WorkUnit) -> Offer {
        let hours = unit.estimated_hours;
        if self.fits(hours) {
            self.accept(unit);
            return Offer::Accepted;
        }
        if unit.priority != Priority::High {
            return Offer::Rejected;
        }

        let reclaimable: f64 = self
            .accepted
            .iter()
            .filter(|(_, _, p)| *p == Priority::Low)
            .map(|(_, h, _)| h)
            .sum();
        if self.running - reclaimable + hours > self.budget_hours + EPSILON {
            return Offer::Rejected;
        }

        let mut evicted = Vec::new();
        while !self.fits(hours) {
            let Some(pos) = self.accepted.iter().position(|(_, _, p)| *p == Priority::Low) else {
                break;
            };
            let (id, h, _) = self.accepted.remove(pos);
            self.running -= h;
            evicted.push(id);
        }
        tracing::debug!(
            unit = %unit.id,
            evicted = evicted.len(),
            "evicted low-priority units for high-priority unit"
        );
        self.evicted.extend(evicted.iter().copied());
        self.accept(unit);
        Offer::AcceptedAfterEviction(evicted)
    }

    fn accept(&mut self, unit: &WorkUnit) {
        self.accepted
            .push((unit.id, unit.estimated_hours, unit.priority));
        self.running += unit.estimated_hours;
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Drop retained units whose in-set dependencies were not retained, repeatedly.
fn close_under_dependencies(units: &[WorkUnit], retained: &mut HashSet<UnitId>) {
    let known: HashSet<UnitId> = units.iter().map(|u| u.id).collect();
    let mut dependents: HashMap<UnitId, Vec<UnitId>> = HashMap::new();
    for unit in units {
        for dep in unit.dependencies.iter().filter(|d| known.contains(d)) {
            dependents.entry(*dep).or_default().push(unit.id);
        }
    }

    // Dropping a unit orphans its retained dependents in turn.
    let mut orphaned: Vec<UnitId> = units
        .iter()
        .filter(|u| retained.contains(&u.id))
        .filter(|u| {
            u.dependencies
                .iter()
                .any(|d| known.contains(d) && !retained.contains(d))
        })
        .map(|u| u.id)
        .collect();
    while let Some(id) = orphaned.pop() {
        if !retained.remove(&id) {
            continue;
        }
        for next in dependents.get(&id).into_iter().flatten() {
            if retained.contains(next) {
                orphaned.push(*next);
            }
        }
    }
}

fn report(
    strategy: &str,
    best_effort: bool,
    units: &[WorkUnit],
    budget_hours: f64,
    retained: &HashSet<UnitId>,
    evicted: Vec<UnitId>,
) -> BudgetReport {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    let mut unfit_high = Vec::new();
    let mut achieved = 0.0;
    for unit in units {
        if retained.contains(&unit.id) {
            kept.push(unit.id);
            achieved += unit.estimated_hours;
        } else {
            dropped.push(unit.id);
            if unit.priority == Priority::High {
                unfit_high.push(unit.id);
            }
        }
    }
    let evicted: Vec<UnitId> = evicted
        .into_iter()
        .filter(|id| !retained.contains(id))
        .collect();

    BudgetReport {
        strategy: strategy.to_string(),
        best_effort,
        budget_hours,
        requested_hours: units.iter().map(|u| u.estimated_hours).sum(),
        achieved_hours: achieved,
        retained: kept,
        dropped,
        evicted,
        shortfall: !unfit_high.is_empty(),
        unfit_high,
    }
}

// ---------------------------------------------------------------------------
// Greedy
// ---------------------------------------------------------------------------

/// One-pass greedy selection with low-priority eviction.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyOptimizer;

impl BudgetOptimizer for GreedyOptimizer {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn select(&self, units: &[WorkUnit], budget_hours: f64, ranks: &PriorityRanks) -> BudgetReport {
        let mut order: Vec<&WorkUnit> = units.iter().collect();
        // Stable: equal keys keep plan order.
        order.sort_by_key(|u| (ranks.rank(u.priority), u.dependencies.len()));

        let mut selector = BudgetSelector::new(budget_hours);
        for unit in order {
            selector.offer(unit);
        }

        let mut retained: HashSet<UnitId> = selector.accepted().into_iter().collect();
        close_under_dependencies(units, &mut retained);
        report(
            self.name(),
            true,
            units,
            budget_hours,
            &retained,
            selector.evicted().to_vec(),
        )
    }
}

// ---------------------------------------------------------------------------
// Exact
// ---------------------------------------------------------------------------

/// Exhaustive subset search for plans of up to `unit_limit` units.
///
/// Maximizes the sum of `weight(priority) * hours` where the weight is
/// `max_rank - rank + 1`, subject to the budget and dependency closure. Ties
/// prefer more total hours, then the first subset enumerated.
#[derive(Debug, Clone, Copy)]
pub struct ExactOptimizer {
    pub unit_limit: usize,
}

impl Default for ExactOptimizer {
    fn default() -> Self {
        Self { unit_limit: 16 }
    }
}

impl BudgetOptimizer for ExactOptimizer {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn select(&self, units: &[WorkUnit], budget_hours: f64, ranks: &PriorityRanks) -> BudgetReport {
        // Bitmask enumeration is capped well below the width of u64.
        let limit = self.unit_limit.min(24);
        if units.len() > limit {
            tracing::debug!(
                units = units.len(),
                limit,
                "too many units for exact selection, falling back to greedy"
            );
            return GreedyOptimizer.select(units, budget_hours, ranks);
        }

        let n = units.len();
        let max_rank = u32::from(ranks.high.max(ranks.medium).max(ranks.low));
        let weights: Vec<f64> = units
            .iter()
            .map(|u| f64::from(max_rank - u32::from(ranks.rank(u.priority)) + 1) * u.estimated_hours)
            .collect();
        let dep_masks: Vec<u64> = units
            .iter()
            .map(|u| {
                u.dependencies.iter().fold(0u64, |mask, d| {
                    match units.iter().position(|o| o.id == *d) {
                        Some(j) => mask | (1 << j),
                        None => mask,
                    }
                })
            })
            .collect();

        let mut best_mask = 0u64;
        let mut best_value = 0.0;
        let mut best_hours = 0.0;
        for mask in 0u64..(1u64 << n) {
            let mut hours = 0.0;
            let mut value = 0.0;
            let mut feasible = true;
            for i in 0..n {
                if mask & (1 << i) == 0 {
                    continue;
                }
                if dep_masks[i] & !mask != 0 {
                    feasible = false;
                    break;
                }
                hours += units[i].estimated_hours;
                value += weights[i];
            }
            if !feasible || hours > budget_hours + EPSILON {
                continue;
            }
            if value > best_value + EPSILON
                || ((value - best_value).abs() <= EPSILON && hours > best_hours + EPSILON)
            {
                best_mask = mask;
                best_value = value;
                best_hours = hours;
            }
        }

        let retained: HashSet<UnitId> = (0..n)
            .filter(|i| best_mask & (1 << i) != 0)
            .map(|i| units[i].id)
            .collect();
        report(self.name(), false, units, budget_hours, &retained, Vec::new())
    }
}

/// Construct the optimizer for a configured kind.
pub fn optimizer_for(kind: OptimizerKind, exact_unit_limit: usize) -> Box<dyn BudgetOptimizer> {
    match kind {
        OptimizerKind::Greedy => Box::new(GreedyOptimizer),
        OptimizerKind::Exact => Box::new(ExactOptimizer {
            unit_limit: exact_unit_limit,
        }),
    }
}
