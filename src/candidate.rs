//! Input records consumed from the surrounding system.
//!
//! Analysis agents produce [`Candidate`]s, migration advisors may add an
//! ordered [`Procedure`], and the caller supplies [`Constraints`], an optional
//! resource-level [`DependencyMap`] and optional [`HistoricalSample`]s for
//! estimation calibration. A [`PlanRequest`] bundles all of them and is the
//! JSON document the CLI reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConstraintError;
use crate::unit::{Complexity, Priority};

/// Resource-level adjacency: `resource -> resources it depends on`.
pub type DependencyMap = BTreeMap<String, Vec<String>>;

/// One raw improvement candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Declared type (`refactor`, `test`, `logging`, ...). Also used as category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Location or target, typically a file path.
    pub location: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub complexity: Option<Complexity>,
    /// Caller-supplied magnitude (e.g. files touched). Defaults to 1.
    #[serde(default)]
    pub scope: Option<f64>,
}

impl Candidate {
    pub fn new(kind: impl Into<String>, location: impl Into<String>, priority: Priority) -> Self {
        Self {
            kind: kind.into(),
            location: location.into(),
            priority,
            suggestion: String::new(),
            complexity: None,
            scope: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn with_scope(mut self, scope: f64) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// An externally supplied ordered checklist (e.g. a migration plan).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    /// Declared kind; becomes the category of every step and consumes
    /// candidates of the same type.
    pub kind: String,
    pub steps: Vec<String>,
    /// Total hours the source expects the whole procedure to take.
    #[serde(default)]
    pub budget_hint_hours: Option<f64>,
}

/// A completed piece of work used to calibrate estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSample {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_scope")]
    pub scope: f64,
    pub actual_hours: f64,
}

fn default_scope() -> f64 {
    1.0
}

/// Everything the candidate source hands over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSource {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub procedure: Option<Procedure>,
    /// Free-form summary data, echoed into plan metadata.
    #[serde(default)]
    pub summary: BTreeMap<String, serde_json::Value>,
}

impl CandidateSource {
    pub fn from_candidates(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            ..Default::default()
        }
    }

    pub fn with_procedure(mut self, procedure: Procedure) -> Self {
        self.procedure = Some(procedure);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
            && self
                .procedure
                .as_ref()
                .is_none_or(|p| p.steps.is_empty())
    }

    /// Reject candidates and procedures that cannot be turned into work units.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        for (index, c) in self.candidates.iter().enumerate() {
            if c.kind.trim().is_empty() {
                return Err(ConstraintError::MalformedCandidate {
                    index,
                    message: "empty type".into(),
                });
            }
            if c.location.trim().is_empty() {
                return Err(ConstraintError::MalformedCandidate {
                    index,
                    message: "empty location".into(),
                });
            }
            if let Some(scope) = c.scope {
                if !scope.is_finite() || scope <= 0.0 {
                    return Err(ConstraintError::MalformedCandidate {
                        index,
                        message: format!("scope must be positive, got {scope}"),
                    });
                }
            }
        }

        if let Some(p) = &self.procedure {
            if p.kind.trim().is_empty() {
                return Err(ConstraintError::MalformedProcedure {
                    kind: p.kind.clone(),
                    message: "empty kind".into(),
                });
            }
            if p.steps.iter().any(|s| s.trim().is_empty()) {
                return Err(ConstraintError::MalformedProcedure {
                    kind: p.kind.clone(),
                    message: "empty step name".into(),
                });
            }
            if let Some(hint) = p.budget_hint_hours {
                if !hint.is_finite() || hint <= 0.0 {
                    return Err(ConstraintError::MalformedProcedure {
                        kind: p.kind.clone(),
                        message: format!("budget hint must be positive, got {hint}"),
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Caller-supplied milestone definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneSpec {
    pub name: String,
    /// Seconds since UNIX epoch.
    pub deadline: u64,
    #[serde(default)]
    pub criteria: Vec<String>,
}

/// Planning constraints. Unset unit ceiling and buffer fall back to the
/// [`PlannerConfig`](crate::config::PlannerConfig).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub max_total_hours: Option<f64>,
    /// Seconds since UNIX epoch.
    #[serde(default)]
    pub deadline: Option<u64>,
    #[serde(default)]
    pub milestones: Vec<MilestoneSpec>,
    #[serde(default)]
    pub max_hours_per_unit: Option<f64>,
    #[serde(default)]
    pub buffer_percent: Option<f64>,
}

impl Constraints {
    /// Fail fast on internally contradictory constraints.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if let Some(value) = self.max_hours_per_unit {
            check_unit_ceiling(value)?;
        }
        if let Some(value) = self.buffer_percent {
            check_buffer(value)?;
        }
        if let Some(value) = self.max_total_hours {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConstraintError::InvalidBudget { value });
            }
        }
        if let Some(index) = self
            .milestones
            .iter()
            .position(|m| m.name.trim().is_empty())
        {
            return Err(ConstraintError::EmptyMilestoneName { index });
        }
        Ok(())
    }
}

pub(crate) fn check_unit_ceiling(value: f64) -> Result<(), ConstraintError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConstraintError::InvalidUnitCeiling { value });
    }
    Ok(())
}

pub(crate) fn check_buffer(value: f64) -> Result<(), ConstraintError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConstraintError::InvalidBuffer { value });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PlanRequest
// ---------------------------------------------------------------------------

/// A complete planning request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    #[serde(flatten)]
    pub source: CandidateSource,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub dependency_map: Option<DependencyMap>,
    #[serde(default)]
    pub samples: Vec<HistoricalSample>,
}

impl PlanRequest {
    pub fn new(goal: impl Into<String>, source: CandidateSource) -> Self {
        Self {
            goal: goal.into(),
            source,
            ..Default::default()
        }
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_dependency_map(mut self, map: DependencyMap) -> Self {
        self.dependency_map = Some(map);
        self
    }

    pub fn with_samples(mut self, samples: Vec<HistoricalSample>) -> Self {
        self.samples = samples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_parses_with_defaults() {
        let c: Candidate =
            serde_json::from_str(r#"{"type": "logging", "location": "src/main.rs"}"#).unwrap();
        assert_eq!(c.kind, "logging");
        assert_eq!(c.priority, Priority::Medium);
        assert!(c.complexity.is_none());
        assert!(c.scope.is_none());
    }

    #[test]
    fn request_flattens_source() {
        let json = r#"{
            "goal": "harden service",
            "candidates": [{"type": "security", "location": "src/auth.rs", "priority": "high"}],
            "procedure": {"kind": "migration", "steps": ["a", "b"], "budget_hint_hours": 6.0},
            "constraints": {"max_total_hours": 10.0},
            "samples": [{"type": "security", "actual_hours": 5.0}]
        }"#;
        let req: PlanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.source.candidates.len(), 1);
        assert_eq!(req.source.procedure.as_ref().unwrap().steps.len(), 2);
        assert_eq!(req.constraints.max_total_hours, Some(10.0));
        assert_eq!(req.samples[0].scope, 1.0);
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let c = Constraints {
            max_hours_per_unit: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(ConstraintError::InvalidUnitCeiling { .. })
        ));
    }

    #[test]
    fn negative_buffer_and_budget_rejected() {
        let c = Constraints {
            buffer_percent: Some(-5.0),
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ConstraintError::InvalidBuffer { .. })));

        let c = Constraints {
            max_total_hours: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ConstraintError::InvalidBudget { .. })));
    }

    #[test]
    fn unnamed_milestone_rejected() {
        let c = Constraints {
            milestones: vec![MilestoneSpec {
                name: "  ".into(),
                deadline: 0,
                criteria: vec![],
            }],
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(ConstraintError::EmptyMilestoneName { index: 0 })
        ));
    }

    #[test]
    fn malformed_candidate_reports_index() {
        let source = CandidateSource::from_candidates(vec![
            Candidate::new("test", "tests/a.rs", Priority::Low),
            Candidate::new("", "src/b.rs", Priority::Low),
        ]);
        assert!(matches!(
            source.validate(),
            Err(ConstraintError::MalformedCandidate { index: 1, .. })
        ));
    }

    #[test]
    fn empty_source_detection() {
        assert!(CandidateSource::default().is_empty());
        let with_steps = CandidateSource::default().with_procedure(Procedure {
            kind: "migration".into(),
            steps: vec!["backup".into()],
            budget_hint_hours: None,
        });
        assert!(!with_steps.is_empty());
    }
}
