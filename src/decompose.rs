//! Decomposition of a goal and its candidates into atomic work units.
//!
//! Rules, in priority order:
//!
//! 1. A [`Procedure`] becomes a linear chain of units, one per step. It consumes
//!    every candidate of the same type.
//! 2. Each remaining [`Candidate`] becomes one unit named `"<type> - <location>"`
//!    with an estimated duration and no dependencies.
//! 3. A synthesized unit longer than the per-unit ceiling is replaced by
//!    `ceil(hours / ceiling)` sequential parts of equal length.
//! 4. With no input at all, a fixed four-step generic plan is emitted.
//!
//! Dependencies beyond the chains created here are assigned later by the
//! [`dependency`](crate::dependency) analyzer.

use crate::candidate::{Candidate, CandidateSource, HistoricalSample, Procedure};
use crate::error::ConstraintError;
use crate::estimate::{Estimator, UnitDescriptor};
use crate::unit::{Priority, UnitIdAllocator, WorkUnit};

/// The generic plan used when the candidate source is empty:
/// (name, hours, priority, category).
const FALLBACK_STEPS: [(&str, f64, Priority, &str); 4] = [
    ("Analyze current state", 2.0, Priority::High, "analysis"),
    ("Design solution", 3.0, Priority::High, "design"),
    ("Implement changes", 4.0, Priority::Medium, "dev"),
    ("Test and validate", 2.0, Priority::High, "test"),
];

/// Most parts a single unit may be split into.
pub const MAX_SPLIT_PARTS: usize = 100_000;

/// Turns candidate records into work units.
#[derive(Debug, Clone)]
pub struct Decomposer<'a> {
    estimator: &'a Estimator,
    samples: &'a [HistoricalSample],
    max_hours_per_unit: f64,
    buffer_percent: f64,
}

impl<'a> Decomposer<'a> {
    /// `max_hours_per_unit` must already be validated as positive.
    pub fn new(estimator: &'a Estimator, max_hours_per_unit: f64, buffer_percent: f64) -> Self {
        Self {
            estimator,
            samples: &[],
            max_hours_per_unit,
            buffer_percent,
        }
    }

    pub fn with_samples(mut self, samples: &'a [HistoricalSample]) -> Self {
        self.samples = samples;
        self
    }

    /// Decompose a goal into a flat, ordered list of units.
    pub fn decompose(
        &self,
        goal: &str,
        source: &CandidateSource,
        ids: &mut UnitIdAllocator,
    ) -> Result<Vec<WorkUnit>, ConstraintError> {
        if source.is_empty() {
            tracing::debug!(goal, "no candidates supplied, using generic fallback plan");
            return Ok(fallback_units(goal, ids));
        }

        let mut units = Vec::new();

        let consumed_kind = source
            .procedure
            .as_ref()
            .filter(|p| !p.steps.is_empty())
            .map(|p| {
                units.extend(self.procedure_units(p, ids));
                p.kind.trim().to_ascii_lowercase()
            });

        for candidate in &source.candidates {
            if consumed_kind
                .as_deref()
                .is_some_and(|k| candidate.kind.trim().eq_ignore_ascii_case(k))
            {
                continue;
            }
            let unit = self.candidate_unit(candidate, ids);
            units.extend(self.split(unit, ids)?);
        }

        tracing::debug!(goal, units = units.len(), "decomposition complete");
        Ok(units)
    }

    /// One chained unit per procedural step.
    fn procedure_units(&self, procedure: &Procedure, ids: &mut UnitIdAllocator) -> Vec<WorkUnit> {
        let count = procedure.steps.len();
        let per_step = match procedure.budget_hint_hours {
            Some(hint) => hint / count as f64,
            None => self.estimator.estimate(
                &UnitDescriptor::new(&procedure.kind),
                self.samples,
                self.buffer_percent,
            ),
        };
        let hours = per_step.min(self.max_hours_per_unit);

        let mut units: Vec<WorkUnit> = Vec::with_capacity(count);
        for (i, step) in procedure.steps.iter().enumerate() {
            let priority = if i == 0 { Priority::High } else { Priority::Medium };
            let mut unit = WorkUnit::new(
                ids.next_id(),
                step.trim(),
                format!("Step {} of {} in the {} procedure", i + 1, count, procedure.kind),
                hours,
                priority,
                procedure.kind.trim(),
            );
            if let Some(prev) = units.last() {
                unit.dependencies = vec![prev.id];
            }
            units.push(unit);
        }
        units
    }

    fn candidate_unit(&self, candidate: &Candidate, ids: &mut UnitIdAllocator) -> WorkUnit {
        let mut descriptor = UnitDescriptor::new(&candidate.kind)
            .with_complexity(candidate.complexity.unwrap_or_default());
        if let Some(scope) = candidate.scope {
            descriptor = descriptor.with_scope(scope);
        }
        let hours = self
            .estimator
            .estimate(&descriptor, self.samples, self.buffer_percent);

        WorkUnit::new(
            ids.next_id(),
            format!("{} - {}", candidate.kind.trim(), candidate.location.trim()),
            candidate.suggestion.clone(),
            hours,
            candidate.priority,
            candidate.kind.trim(),
        )
    }

    /// Split a unit exceeding the ceiling into a sequential chain of parts.
    ///
    /// The original unit's id is retired; every part gets a fresh one. Fails
    /// when the ceiling would produce more than [`MAX_SPLIT_PARTS`] parts.
    pub fn split(
        &self,
        unit: WorkUnit,
        ids: &mut UnitIdAllocator,
    ) -> Result<Vec<WorkUnit>, ConstraintError> {
        if unit.estimated_hours <= self.max_hours_per_unit {
            return Ok(vec![unit]);
        }

        let exact = (unit.estimated_hours / self.max_hours_per_unit).ceil();
        if exact.is_nan() || exact > MAX_SPLIT_PARTS as f64 {
            return Err(ConstraintError::TooManyParts {
                unit: unit.name,
                parts: exact,
                limit: MAX_SPLIT_PARTS,
            });
        }
        let parts = exact as usize;
        let hours = unit.estimated_hours / parts as f64;
        tracing::debug!(
            unit = %unit.name,
            hours = unit.estimated_hours,
            parts,
            "splitting oversized unit"
        );

        let mut out: Vec<WorkUnit> = Vec::with_capacity(parts);
        for i in 1..=parts {
            let dependencies = match out.last() {
                Some(prev) => vec![prev.id],
                None => unit.dependencies.clone(),
            };
            out.push(
                WorkUnit::new(
                    ids.next_id(),
                    format!("{} (Part {i}/{parts})", unit.name),
                    unit.description.clone(),
                    hours,
                    unit.priority,
                    unit.category.clone(),
                )
                .with_dependencies(dependencies),
            );
        }
        Ok(out)
    }
}

fn fallback_units(goal: &str, ids: &mut UnitIdAllocator) -> Vec<WorkUnit> {
    FALLBACK_STEPS
        .iter()
        .map(|&(name, hours, priority, category)| {
            WorkUnit::new(
                ids.next_id(),
                name,
                format!("{name} for: {goal}"),
                hours,
                priority,
                category,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitId;

    fn decompose(source: &CandidateSource, ceiling: f64, buffer: f64) -> Vec<WorkUnit> {
        let est = Estimator::default();
        let mut ids = UnitIdAllocator::new();
        Decomposer::new(&est, ceiling, buffer)
            .decompose("goal", source, &mut ids)
            .unwrap()
    }

    #[test]
    fn candidates_become_named_units() {
        let source = CandidateSource::from_candidates(vec![
            Candidate::new("logging", "src/main.rs", Priority::High)
                .with_suggestion("add structured logs"),
        ]);
        let units = decompose(&source, 4.0, 0.0);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "logging - src/main.rs");
        assert_eq!(units[0].description, "add structured logs");
        assert_eq!(units[0].estimated_hours, 1.5);
        assert_eq!(units[0].category, "logging");
        assert!(units[0].dependencies.is_empty());
    }

    #[test]
    fn oversized_unit_splits_into_chain() {
        // security/high = 6h, buffer 50% = 9h, ceiling 4h -> 3 parts of 3h.
        let source = CandidateSource::from_candidates(vec![
            Candidate::new("security", "src/auth.rs", Priority::High)
                .with_complexity(crate::unit::Complexity::High),
        ]);
        let units = decompose(&source, 4.0, 50.0);
        assert_eq!(units.len(), 3);
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.name, format!("security - src/auth.rs (Part {}/3)", i + 1));
            assert!((unit.estimated_hours - 3.0).abs() < 1e-9);
            if i == 0 {
                assert!(unit.dependencies.is_empty());
            } else {
                assert_eq!(unit.dependencies, vec![units[i - 1].id]);
            }
        }
        let total: f64 = units.iter().map(|u| u.estimated_hours).sum();
        assert!((total - 9.0).abs() < 1e-9);
    }

    #[test]
    fn unit_at_ceiling_is_not_split() {
        let source = CandidateSource::from_candidates(vec![Candidate::new(
            "feature",
            "src/api.rs",
            Priority::Medium,
        )]);
        let units = decompose(&source, 4.0, 0.0);
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn procedure_emits_chain_and_consumes_matching_candidates() {
        let steps: Vec<String> = (1..=8).map(|i| format!("step {i}")).collect();
        let source = CandidateSource::from_candidates(vec![
            Candidate::new("migration", "db/schema.sql", Priority::High),
            Candidate::new("docs", "README.md", Priority::Low),
        ])
        .with_procedure(Procedure {
            kind: "migration".into(),
            steps,
            budget_hint_hours: Some(20.0),
        });
        let units = decompose(&source, 4.0, 0.0);

        assert_eq!(units.len(), 9);
        let chain = &units[..8];
        for (i, unit) in chain.iter().enumerate() {
            assert_eq!(unit.category, "migration");
            assert!((unit.estimated_hours - 2.5).abs() < 1e-9);
            if i == 0 {
                assert_eq!(unit.priority, Priority::High);
                assert!(unit.dependencies.is_empty());
            } else {
                assert_eq!(unit.priority, Priority::Medium);
                assert_eq!(unit.dependencies, vec![chain[i - 1].id]);
            }
        }
        assert_eq!(units[8].name, "docs - README.md");
    }

    #[test]
    fn procedure_steps_capped_at_ceiling() {
        let source = CandidateSource::default().with_procedure(Procedure {
            kind: "migration".into(),
            steps: vec!["a".into(), "b".into()],
            budget_hint_hours: Some(20.0),
        });
        let units = decompose(&source, 4.0, 0.0);
        assert!(units.iter().all(|u| u.estimated_hours == 4.0));
    }

    #[test]
    fn empty_source_uses_fallback() {
        let units = decompose(&CandidateSource::default(), 4.0, 0.0);
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Analyze current state",
                "Design solution",
                "Implement changes",
                "Test and validate"
            ]
        );
        let hours: Vec<f64> = units.iter().map(|u| u.estimated_hours).collect();
        assert_eq!(hours, [2.0, 3.0, 4.0, 2.0]);
        assert!(units.iter().all(|u| u.dependencies.is_empty()));
        assert_eq!(units[2].priority, Priority::Medium);
    }

    #[test]
    fn ids_are_sequential_in_decomposition_order() {
        let source = CandidateSource::from_candidates(vec![
            Candidate::new("test", "tests/a.rs", Priority::Low),
            Candidate::new("test", "tests/b.rs", Priority::Low),
        ]);
        let units = decompose(&source, 4.0, 0.0);
        assert_eq!(units[0].id, UnitId::new(1).unwrap());
        assert_eq!(units[1].id, UnitId::new(2).unwrap());
    }

    #[test]
    fn tiny_ceiling_is_rejected_instead_of_allocating() {
        let est = Estimator::default();
        let mut ids = UnitIdAllocator::new();
        let unit = WorkUnit::new(ids.next_id(), "huge", "", 8.0, Priority::High, "dev");
        let err = Decomposer::new(&est, 1e-300, 0.0)
            .split(unit, &mut ids)
            .unwrap_err();
        assert!(matches!(
            err,
            ConstraintError::TooManyParts { limit: MAX_SPLIT_PARTS, .. }
        ));
    }

    #[test]
    fn split_at_the_part_limit_succeeds() {
        let est = Estimator::default();
        let mut ids = UnitIdAllocator::new();
        let hours = MAX_SPLIT_PARTS as f64;
        let unit = WorkUnit::new(ids.next_id(), "big", "", hours, Priority::Low, "dev");
        let parts = Decomposer::new(&est, 1.0, 0.0).split(unit, &mut ids).unwrap();
        assert_eq!(parts.len(), MAX_SPLIT_PARTS);
        assert_eq!(parts[1].dependencies, vec![parts[0].id]);
    }
}
