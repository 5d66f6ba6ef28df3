// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # akh-plan
//!
//! A hierarchical task-planning engine: turns a goal plus unordered
//! improvement candidates into a dependency-ordered plan with estimates,
//! milestones, a critical path and a Gantt-style timeline.
//!
//! ## Architecture
//!
//! - **Estimator** (`estimate`): historical interpolation or type/complexity heuristics, plus buffer
//! - **Decomposer** (`decompose`): procedure chains, candidate units, ceiling splits, fallback plan
//! - **Dependency analysis** (`dependency`): heuristic or map-driven edges, cycle detection, Kahn ordering
//! - **Plan assembly** (`plan`, `milestone`): critical path, budget optimizers, timeline projection
//! - **Facade** (`engine`): one call from request to validated plan
//!
//! ## Library usage
//!
//! ```
//! use akh_plan::candidate::{Candidate, CandidateSource, PlanRequest};
//! use akh_plan::config::PlannerConfig;
//! use akh_plan::engine::PlanningEngine;
//! use akh_plan::unit::Priority;
//!
//! let engine = PlanningEngine::new(PlannerConfig::default());
//! let source = CandidateSource::from_candidates(vec![
//!     Candidate::new("logging", "src/server.rs", Priority::High),
//!     Candidate::new("logging", "src/client.rs", Priority::Medium),
//! ]);
//! let outcome = engine.plan_at(&PlanRequest::new("add logging", source), 0).unwrap();
//! assert!(outcome.plan.valid);
//! assert_eq!(outcome.plan.units.len(), 2);
//! ```

pub mod candidate;
pub mod config;
pub mod decompose;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod milestone;
pub mod plan;
pub mod unit;
