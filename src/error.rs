//! Rich diagnostic error types for the akh-plan engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly which part of a
//! planning request was rejected and how to fix it.
//!
//! Only *malformed input* is an error. Structural defects that survive cycle
//! repair and infeasible budgets are reported on the [`Plan`](crate::plan::Plan)
//! itself (`valid`, `budget.shortfall`) so callers can decide what to do.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the akh-plan engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Constraint errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConstraintError {
    #[error("max_hours_per_unit must be a positive number, got {value}")]
    #[diagnostic(
        code(akh_plan::constraint::unit_ceiling),
        help(
            "The per-unit ceiling controls how large work units are split. \
             Use a positive number of hours such as 4.0."
        )
    )]
    InvalidUnitCeiling { value: f64 },

    #[error("buffer_percent must be a finite, non-negative number, got {value}")]
    #[diagnostic(
        code(akh_plan::constraint::buffer),
        help("The estimation buffer is a percentage added on top of each estimate, e.g. 20.0.")
    )]
    InvalidBuffer { value: f64 },

    #[error("max_total_hours must be a positive number, got {value}")]
    #[diagnostic(
        code(akh_plan::constraint::budget),
        help("Omit max_total_hours for an unconstrained plan, or give a positive budget.")
    )]
    InvalidBudget { value: f64 },

    #[error("unit \"{unit}\" would split into {parts} parts, more than the limit of {limit}")]
    #[diagnostic(
        code(akh_plan::constraint::split),
        help(
            "The per-unit ceiling is too small for this estimate. \
             Raise max_hours_per_unit so each unit splits into fewer parts."
        )
    )]
    TooManyParts {
        unit: String,
        parts: f64,
        limit: usize,
    },

    #[error("milestone #{index} has an empty name")]
    #[diagnostic(
        code(akh_plan::constraint::milestone_name),
        help("Every explicit milestone definition needs a non-empty name.")
    )]
    EmptyMilestoneName { index: usize },

    #[error("candidate #{index} is malformed: {message}")]
    #[diagnostic(
        code(akh_plan::constraint::candidate),
        help(
            "Candidates need a non-empty type and location; scope, when given, \
             must be a positive number."
        )
    )]
    MalformedCandidate { index: usize, message: String },

    #[error("procedure \"{kind}\" is malformed: {message}")]
    #[diagnostic(
        code(akh_plan::constraint::procedure),
        help("Procedural steps need non-empty names and a positive budget hint, if one is given.")
    )]
    MalformedProcedure { kind: String, message: String },
}

// ---------------------------------------------------------------------------
// Dependency errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DependencyError {
    #[error("dependency map references unknown resource \"{resource}\" (listed under \"{referenced_by}\")")]
    #[diagnostic(
        code(akh_plan::dependency::unknown_resource),
        help(
            "Every resource a map entry depends on must either be a key of the map \
             or be mentioned by at least one work unit. Check for typos in file names."
        )
    )]
    UnknownResource {
        resource: String,
        referenced_by: String,
    },

    #[error("dependency map contains an empty resource identifier")]
    #[diagnostic(
        code(akh_plan::dependency::empty_resource),
        help("Remove empty strings from the dependency map.")
    )]
    EmptyResource,

    #[error("work unit {unit} depends on unknown unit {dependency}")]
    #[diagnostic(
        code(akh_plan::dependency::unknown_unit),
        help("Dependency ids must reference work units in the same plan.")
    )]
    UnknownDependency { unit: String, dependency: String },

    #[error("work unit {unit} depends on itself")]
    #[diagnostic(
        code(akh_plan::dependency::self_dependency),
        help("Remove the unit's own id from its dependency list.")
    )]
    SelfDependency { unit: String },

    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    #[diagnostic(
        code(akh_plan::dependency::cycle),
        help(
            "The cycle policy is `reject`. Break the cycle in the dependency map, \
             or switch to `cycle_policy = \"repair\"` for best-effort truncation."
        )
    )]
    CycleDetected { cycle: Vec<String> },
}

// ---------------------------------------------------------------------------
// Unit lifecycle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum UnitError {
    #[error("work unit {unit} cannot move from {from} to {to}")]
    #[diagnostic(
        code(akh_plan::unit::invalid_transition),
        help("Units move pending -> in_progress -> completed; completed is terminal.")
    )]
    InvalidTransition {
        unit: String,
        from: String,
        to: String,
    },

    #[error("work unit {unit} not found in plan")]
    #[diagnostic(
        code(akh_plan::unit::not_found),
        help("Check the id against `plan.units`; units dropped by the budget are not part of the plan.")
    )]
    NotFound { unit: String },

    #[error("actual duration must be a non-negative number of hours, got {value}")]
    #[diagnostic(
        code(akh_plan::unit::actual_hours),
        help("Record the measured duration in hours.")
    )]
    InvalidActualHours { value: f64 },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read planner config: {path}")]
    #[diagnostic(
        code(akh_plan::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse planner config: {path}: {message}")]
    #[diagnostic(
        code(akh_plan::config::parse),
        help("Check the TOML syntax; `akh-plan config` prints a valid default file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write planner config: {path}")]
    #[diagnostic(
        code(akh_plan::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for top-level planning operations.
pub type PlanResult<T> = std::result::Result<T, PlanError>;

/// Convenience alias for dependency analysis.
pub type DependencyResult<T> = std::result::Result<T, DependencyError>;
