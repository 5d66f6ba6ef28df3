//! Critical path: the maximum-duration chain of dependent units.
//!
//! Longest-path dynamic programming over a Kahn ordering of the units: each
//! unit's distance is its own hours plus the largest distance among its
//! dependencies, with a predecessor map to rebuild the path. Runs in linear
//! time and space, whatever the chain length.
//!
//! Ties are broken by plan order, both when choosing a predecessor and when
//! choosing the final unit. That is implementation-defined, not a uniqueness
//! guarantee. Units sitting on a dependency cycle are skipped.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::unit::{UnitId, WorkUnit};

/// Float slack for comparing path lengths.
const EPSILON: f64 = 1e-9;

/// The longest path and its duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalPath {
    pub units: Vec<UnitId>,
    pub hours: f64,
}

/// Compute the critical path over units in plan order.
pub fn critical_path(sorted: &[WorkUnit]) -> CriticalPath {
    let known: HashSet<UnitId> = sorted.iter().map(|u| u.id).collect();
    let by_id: HashMap<UnitId, &WorkUnit> = sorted.iter().map(|u| (u.id, u)).collect();

    let mut in_degree: HashMap<UnitId, usize> = HashMap::with_capacity(sorted.len());
    let mut dependents: HashMap<UnitId, Vec<UnitId>> = HashMap::new();
    for unit in sorted {
        let deps: HashSet<UnitId> = unit
            .dependencies
            .iter()
            .copied()
            .filter(|d| known.contains(d))
            .collect();
        in_degree.insert(unit.id, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(unit.id);
        }
    }

    let mut ready: VecDeque<UnitId> = sorted
        .iter()
        .filter(|u| in_degree[&u.id] == 0)
        .map(|u| u.id)
        .collect();

    let mut dist: HashMap<UnitId, f64> = HashMap::with_capacity(sorted.len());
    let mut pred: HashMap<UnitId, UnitId> = HashMap::new();
    while let Some(id) = ready.pop_front() {
        let unit = by_id[&id];
        let mut best: Option<(UnitId, f64)> = None;
        for dep in &unit.dependencies {
            if let Some(&d) = dist.get(dep) {
                if best.is_none_or(|(_, b)| d > b + EPSILON) {
                    best = Some((*dep, d));
                }
            }
        }
        let base = match best {
            Some((dep, d)) => {
                pred.insert(id, dep);
                d
            }
            None => 0.0,
        };
        dist.insert(id, base + unit.estimated_hours);

        for &next in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(next);
                }
            }
        }
    }

    let mut end: Option<(UnitId, f64)> = None;
    for unit in sorted {
        if let Some(&d) = dist.get(&unit.id) {
            if end.is_none_or(|(_, b)| d > b + EPSILON) {
                end = Some((unit.id, d));
            }
        }
    }

    let Some((last, hours)) = end else {
        return CriticalPath::default();
    };
    let mut units = vec![last];
    let mut cursor = last;
    while let Some(&prev) = pred.get(&cursor) {
        units.push(prev);
        cursor = prev;
    }
    units.reverse();
    CriticalPath { units, hours }
}
