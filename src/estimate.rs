//! Duration estimation for work units.
//!
//! Two strategies, tried in order:
//!
//! 1. **Historical interpolation**: when samples of the same type exist, each
//!    matching sample contributes `(unit_scope / sample_scope) * actual_hours`
//!    and the contributions are averaged.
//! 2. **Heuristic table**: a per-type base duration scaled by a complexity
//!    multiplier. Unknown types use the table's default entry.
//!
//! The buffer percentage is applied afterwards and the result is rounded to one
//! decimal place. Estimation never fails and never returns a non-positive value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::candidate::HistoricalSample;
use crate::unit::Complexity;

/// Smallest estimate the estimator will ever return.
pub const MIN_ESTIMATE_HOURS: f64 = 0.1;

// ---------------------------------------------------------------------------
// HeuristicTable
// ---------------------------------------------------------------------------

/// Tunable type → hours table plus complexity multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicTable {
    /// Base hours per lowercase type name.
    #[serde(default = "default_base_hours")]
    pub base_hours: BTreeMap<String, f64>,
    /// Hours for types missing from `base_hours`.
    #[serde(default = "default_hours")]
    pub default_hours: f64,
    #[serde(default = "default_high_multiplier")]
    pub high_multiplier: f64,
    #[serde(default = "default_medium_multiplier")]
    pub medium_multiplier: f64,
    #[serde(default = "default_low_multiplier")]
    pub low_multiplier: f64,
}

fn default_base_hours() -> BTreeMap<String, f64> {
    [
        ("refactor", 3.0),
        ("test", 2.0),
        ("testing", 2.5),
        ("docs", 1.0),
        ("documentation", 1.5),
        ("logging", 1.5),
        ("security", 4.0),
        ("performance", 3.5),
        ("optimization", 3.5),
        ("migration", 4.0),
        ("feature", 4.0),
        ("bugfix", 2.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
fn default_hours() -> f64 {
    2.0
}
fn default_high_multiplier() -> f64 {
    1.5
}
fn default_medium_multiplier() -> f64 {
    1.0
}
fn default_low_multiplier() -> f64 {
    0.7
}

impl Default for HeuristicTable {
    fn default() -> Self {
        Self {
            base_hours: default_base_hours(),
            default_hours: default_hours(),
            high_multiplier: default_high_multiplier(),
            medium_multiplier: default_medium_multiplier(),
            low_multiplier: default_low_multiplier(),
        }
    }
}

impl HeuristicTable {
    /// Base hours for a type (case-insensitive), falling back to the default.
    pub fn base_for(&self, kind: &str) -> f64 {
        self.base_hours
            .get(&kind.trim().to_ascii_lowercase())
            .copied()
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or(self.default_hours)
    }

    pub fn multiplier(&self, complexity: Complexity) -> f64 {
        match complexity {
            Complexity::High => self.high_multiplier,
            Complexity::Medium => self.medium_multiplier,
            Complexity::Low => self.low_multiplier,
        }
    }
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// What the estimator needs to know about a unit.
#[derive(Debug, Clone, Copy)]
pub struct UnitDescriptor<'a> {
    pub kind: &'a str,
    pub complexity: Complexity,
    /// Magnitude used for historical interpolation.
    pub scope: f64,
}

impl<'a> UnitDescriptor<'a> {
    pub fn new(kind: &'a str) -> Self {
        Self {
            kind,
            complexity: Complexity::Medium,
            scope: 1.0,
        }
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_scope(mut self, scope: f64) -> Self {
        self.scope = scope;
        self
    }
}

/// Stateless estimator over an injected [`HeuristicTable`].
#[derive(Debug, Clone, Default)]
pub struct Estimator {
    table: HeuristicTable,
}

impl Estimator {
    pub fn new(table: HeuristicTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &HeuristicTable {
        &self.table
    }

    /// Estimate hours for a unit, including the buffer.
    pub fn estimate(
        &self,
        unit: &UnitDescriptor<'_>,
        samples: &[HistoricalSample],
        buffer_percent: f64,
    ) -> f64 {
        let raw = self
            .interpolate(unit, samples)
            .unwrap_or_else(|| self.heuristic(unit));

        let buffer = if buffer_percent.is_finite() && buffer_percent > 0.0 {
            buffer_percent
        } else {
            0.0
        };
        let buffered = raw * (1.0 + buffer / 100.0);

        round_tenth(buffered).max(MIN_ESTIMATE_HOURS)
    }

    /// Heuristic estimate without buffer or rounding.
    pub fn heuristic(&self, unit: &UnitDescriptor<'_>) -> f64 {
        self.table.base_for(unit.kind) * self.table.multiplier(unit.complexity)
    }

    /// Average per-sample linear interpolation over samples of the same type.
    ///
    /// Returns `None` when no usable sample matches.
    pub fn interpolate(
        &self,
        unit: &UnitDescriptor<'_>,
        samples: &[HistoricalSample],
    ) -> Option<f64> {
        let unit_scope = if unit.scope.is_finite() && unit.scope > 0.0 {
            unit.scope
        } else {
            1.0
        };

        let estimates: Vec<f64> = samples
            .iter()
            .filter(|s| s.kind.trim().eq_ignore_ascii_case(unit.kind.trim()))
            .filter(|s| s.scope.is_finite() && s.scope > 0.0)
            .filter(|s| s.actual_hours.is_finite() && s.actual_hours > 0.0)
            .map(|s| (unit_scope / s.scope) * s.actual_hours)
            .collect();

        if estimates.is_empty() {
            None
        } else {
            Some(estimates.iter().sum::<f64>() / estimates.len() as f64)
        }
    }
}

fn round_tenth(hours: f64) -> f64 {
    (hours * 10.0).round() / 10.0
}
