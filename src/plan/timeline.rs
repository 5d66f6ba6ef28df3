//! Gantt-style projection of a plan onto wall-clock time.
//!
//! Every unit starts as soon as all of its dependencies have finished. There
//! is no resource model: independent units run in parallel without limit, so
//! the makespan equals the critical path duration for a valid plan.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Plan;
use crate::unit::UnitId;

const SECS_PER_HOUR: f64 = 3_600.0;

/// Scheduled window of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: UnitId,
    pub name: String,
    /// Hours after the timeline start.
    pub start_hours: f64,
    pub end_hours: f64,
    /// Seconds since UNIX epoch.
    pub start: u64,
    pub end: u64,
}

/// Projected completion of a milestone against its deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneMarker {
    pub id: String,
    pub name: String,
    /// When the last grouped unit finishes.
    pub at: u64,
    pub deadline: u64,
    pub units: usize,
}

impl MilestoneMarker {
    pub fn on_time(&self) -> bool {
        self.at <= self.deadline
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub plan_id: String,
    pub start: u64,
    /// Entries in plan order.
    pub entries: Vec<TimelineEntry>,
    pub markers: Vec<MilestoneMarker>,
    pub finish: u64,
    pub makespan_hours: f64,
}

impl Timeline {
    pub fn entry(&self, id: UnitId) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Whether all work finishes by `deadline`.
    pub fn deadline_met(&self, deadline: u64) -> bool {
        self.finish <= deadline
    }
}

fn offset(now: u64, hours: f64) -> u64 {
    now.saturating_add((hours * SECS_PER_HOUR).round() as u64)
}

/// Lay out the plan's units starting at `now`.
pub fn project(plan: &Plan, now: u64) -> Timeline {
    let mut ends: HashMap<UnitId, f64> = HashMap::with_capacity(plan.units.len());
    let mut entries = Vec::with_capacity(plan.units.len());

    for unit in &plan.units {
        // Dependencies scheduled later (only in an invalid plan) do not delay.
        let start_hours = unit
            .dependencies
            .iter()
            .filter_map(|d| ends.get(d))
            .fold(0.0_f64, |acc, end| acc.max(*end));
        let end_hours = start_hours + unit.estimated_hours;
        ends.insert(unit.id, end_hours);
        entries.push(TimelineEntry {
            id: unit.id,
            name: unit.name.clone(),
            start_hours,
            end_hours,
            start: offset(now, start_hours),
            end: offset(now, end_hours),
        });
    }

    let makespan_hours = entries.iter().fold(0.0_f64, |acc, e| acc.max(e.end_hours));

    let markers = plan
        .milestones
        .iter()
        .map(|m| {
            let done = m
                .units
                .iter()
                .filter_map(|id| ends.get(id))
                .fold(0.0_f64, |acc, end| acc.max(*end));
            MilestoneMarker {
                id: m.id.clone(),
                name: m.name.clone(),
                at: offset(now, done),
                deadline: m.deadline,
                units: m.units.len(),
            }
        })
        .collect();

    Timeline {
        plan_id: plan.id.clone(),
        start: now,
        entries,
        markers,
        finish: offset(now, makespan_hours),
        makespan_hours,
    }
}
