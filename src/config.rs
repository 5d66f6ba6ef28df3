//! Planner configuration, persisted as TOML.
//!
//! Every field has a serde default, so a partial file (or an empty one) is a
//! valid config. Per-request [`Constraints`](crate::candidate::Constraints)
//! override the unit ceiling and buffer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::candidate::{check_buffer, check_unit_ceiling};
use crate::error::{ConfigError, ConstraintError};
use crate::estimate::HeuristicTable;
use crate::plan::OptimizerKind;
use crate::unit::PriorityRanks;

/// What to do when the dependency graph contains a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Truncate multi-dependency lists and mark the plan invalid if a cycle
    /// survives.
    #[default]
    Repair,
    /// Fail the request with the detected cycle.
    Reject,
}

impl std::fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repair => write!(f, "repair"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Ceiling above which a unit is split.
    #[serde(default = "default_max_hours_per_unit")]
    pub max_hours_per_unit: f64,
    /// Contingency added to every estimate, in percent.
    #[serde(default = "default_buffer_percent")]
    pub buffer_percent: f64,
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
    #[serde(default)]
    pub optimizer: OptimizerKind,
    /// Largest unit count the exact optimizer will search exhaustively.
    #[serde(default = "default_exact_unit_limit")]
    pub exact_unit_limit: usize,
    /// Days between derived per-category milestone deadlines.
    #[serde(default = "default_milestone_spacing_days")]
    pub milestone_spacing_days: u64,
    #[serde(default)]
    pub priority_ranks: PriorityRanks,
    #[serde(default)]
    pub heuristics: HeuristicTable,
}

fn default_max_hours_per_unit() -> f64 {
    4.0
}
fn default_buffer_percent() -> f64 {
    20.0
}
fn default_exact_unit_limit() -> usize {
    16
}
fn default_milestone_spacing_days() -> u64 {
    7
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_hours_per_unit: default_max_hours_per_unit(),
            buffer_percent: default_buffer_percent(),
            cycle_policy: CyclePolicy::default(),
            optimizer: OptimizerKind::default(),
            exact_unit_limit: default_exact_unit_limit(),
            milestone_spacing_days: default_milestone_spacing_days(),
            priority_ranks: PriorityRanks::default(),
            heuristics: HeuristicTable::default(),
        }
    }
}

impl PlannerConfig {
    /// Reject values the planner cannot work with.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        check_unit_ceiling(self.max_hours_per_unit)?;
        check_buffer(self.buffer_percent)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml().map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PlannerConfig::from_toml("").unwrap();
        assert_eq!(config, PlannerConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = PlannerConfig::from_toml(
            r#"
            max_hours_per_unit = 6.0
            cycle_policy = "reject"
            optimizer = "exact"

            [heuristics]
            default_hours = 3.0
            "#,
        )
        .unwrap();
        assert_eq!(config.max_hours_per_unit, 6.0);
        assert_eq!(config.buffer_percent, 20.0);
        assert_eq!(config.cycle_policy, CyclePolicy::Reject);
        assert_eq!(config.optimizer, OptimizerKind::Exact);
        assert_eq!(config.heuristics.default_hours, 3.0);
        assert_eq!(config.heuristics.base_for("security"), 4.0);
        assert_eq!(config.priority_ranks, PriorityRanks::default());
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        assert!(PlannerConfig::from_toml("cycle_policy = \"ignore\"").is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("planner.toml");

        let mut config = PlannerConfig::default();
        config.buffer_percent = 35.0;
        config.priority_ranks.low = 5;
        config.save(&path).unwrap();

        let loaded = PlannerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlannerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn validate_rejects_bad_ceiling() {
        let config = PlannerConfig {
            max_hours_per_unit: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConstraintError::InvalidUnitCeiling { .. })
        ));
    }
}
