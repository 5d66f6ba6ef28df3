//! Work units: the atomic, estimated, dependency-aware pieces of a plan.
//!
//! Every unit is identified by a [`UnitId`] allocated per planning request by a
//! [`UnitIdAllocator`]. Identities never change after decomposition; only the
//! lifecycle fields (`status`, `actual_hours`, `completed_at`) are expected to
//! mutate once a plan has been handed to an execution tracker.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::error::UnitError;

/// Unique identifier for a work unit within one plan.
///
/// Uses `NonZeroU64` so that `Option<UnitId>` is the same size as `UnitId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UnitId(NonZeroU64);

impl UnitId {
    /// Create a `UnitId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(UnitId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Sequential id source, one per planning request.
#[derive(Debug, Clone)]
pub struct UnitIdAllocator {
    next: NonZeroU64,
}

impl UnitIdAllocator {
    pub fn new() -> Self {
        Self {
            next: NonZeroU64::MIN,
        }
    }

    /// Hand out the next id.
    pub fn next_id(&mut self) -> UnitId {
        let id = UnitId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

impl Default for UnitIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Priority & complexity
// ---------------------------------------------------------------------------

/// Scheduling priority of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl Priority {
    /// Parse from a string label.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Rank table used by every priority-aware ordering (topological tie-break,
/// budget selection). Lower rank sorts first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRanks {
    #[serde(default = "default_high_rank")]
    pub high: u8,
    #[serde(default = "default_medium_rank")]
    pub medium: u8,
    #[serde(default = "default_low_rank")]
    pub low: u8,
}

fn default_high_rank() -> u8 {
    0
}
fn default_medium_rank() -> u8 {
    1
}
fn default_low_rank() -> u8 {
    2
}

impl Default for PriorityRanks {
    fn default() -> Self {
        Self {
            high: default_high_rank(),
            medium: default_medium_rank(),
            low: default_low_rank(),
        }
    }
}

impl PriorityRanks {
    pub fn rank(&self, priority: Priority) -> u8 {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// Declared complexity of a candidate, scaling the heuristic estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl Complexity {
    /// Parse from a string label.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of a unit. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkUnit
// ---------------------------------------------------------------------------

/// An atomic, estimated piece of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Unique within the plan.
    pub id: UnitId,
    /// Human-readable name, also the secondary sort key.
    pub name: String,
    /// Free-text description (typically the candidate's suggestion).
    pub description: String,
    /// Estimated duration in hours, always > 0.
    pub estimated_hours: f64,
    /// Units that must complete before this one may start.
    pub dependencies: Vec<UnitId>,
    pub priority: Priority,
    /// Free-form grouping key (`dev`, `test`, `docs`, `migration`, ...).
    pub category: String,
    pub status: UnitStatus,
    /// Measured duration, recorded on completion.
    pub actual_hours: Option<f64>,
    /// Completion time (seconds since UNIX epoch).
    pub completed_at: Option<u64>,
}

impl WorkUnit {
    /// Create a pending unit with no dependencies.
    pub fn new(
        id: UnitId,
        name: impl Into<String>,
        description: impl Into<String>,
        estimated_hours: f64,
        priority: Priority,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            estimated_hours,
            dependencies: Vec::new(),
            priority,
            category: category.into(),
            status: UnitStatus::Pending,
            actual_hours: None,
            completed_at: None,
        }
    }

    /// Builder-style dependency setter.
    pub fn with_dependencies(mut self, dependencies: Vec<UnitId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// pending → in_progress.
    pub fn start(&mut self) -> Result<(), UnitError> {
        match self.status {
            UnitStatus::Pending => {
                self.status = UnitStatus::InProgress;
                Ok(())
            }
            other => Err(self.invalid_transition(other, UnitStatus::InProgress)),
        }
    }

    /// in_progress → completed, recording the measured duration.
    pub fn complete(&mut self, actual_hours: f64, at: u64) -> Result<(), UnitError> {
        if !actual_hours.is_finite() || actual_hours < 0.0 {
            return Err(UnitError::InvalidActualHours {
                value: actual_hours,
            });
        }
        match self.status {
            UnitStatus::InProgress => {
                self.status = UnitStatus::Completed;
                self.actual_hours = Some(actual_hours);
                self.completed_at = Some(at);
                Ok(())
            }
            other => Err(self.invalid_transition(other, UnitStatus::Completed)),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == UnitStatus::Completed
    }

    fn invalid_transition(&self, from: UnitStatus, to: UnitStatus) -> UnitError {
        UnitError::InvalidTransition {
            unit: self.id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(n: u64) -> UnitId {
        UnitId::new(n).unwrap()
    }

    #[test]
    fn unit_id_display() {
        assert_eq!(uid(7).to_string(), "task-7");
        assert!(UnitId::new(0).is_none());
    }

    #[test]
    fn allocator_is_sequential() {
        let mut alloc = UnitIdAllocator::new();
        assert_eq!(alloc.next_id(), uid(1));
        assert_eq!(alloc.next_id(), uid(2));
        assert_eq!(alloc.next_id(), uid(3));
    }

    #[test]
    fn default_allocator_starts_at_one() {
        let mut alloc = UnitIdAllocator::default();
        assert_eq!(alloc.next_id(), uid(1));
    }

    #[test]
    fn priority_labels_roundtrip() {
        for p in [Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(Priority::from_label(&p.to_string()), Some(p));
        }
        assert_eq!(Priority::from_label(" HIGH "), Some(Priority::High));
        assert_eq!(Priority::from_label("urgent"), None);
    }

    #[test]
    fn default_ranks_order_high_first() {
        let ranks = PriorityRanks::default();
        assert!(ranks.rank(Priority::High) < ranks.rank(Priority::Medium));
        assert!(ranks.rank(Priority::Medium) < ranks.rank(Priority::Low));
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut unit = WorkUnit::new(uid(1), "a", "", 2.0, Priority::High, "dev");
        unit.start().unwrap();
        assert_eq!(unit.status, UnitStatus::InProgress);
        unit.complete(2.5, 1_700_000_000).unwrap();
        assert!(unit.is_completed());
        assert_eq!(unit.actual_hours, Some(2.5));
        assert_eq!(unit.completed_at, Some(1_700_000_000));
    }

    #[test]
    fn lifecycle_rejects_skipping_and_restarting() {
        let mut unit = WorkUnit::new(uid(1), "a", "", 2.0, Priority::High, "dev");
        assert!(matches!(
            unit.complete(1.0, 0),
            Err(UnitError::InvalidTransition { .. })
        ));
        unit.start().unwrap();
        assert!(unit.start().is_err());
        unit.complete(1.0, 0).unwrap();
        assert!(unit.start().is_err());
        assert!(unit.complete(1.0, 0).is_err());
    }

    #[test]
    fn negative_actual_hours_rejected() {
        let mut unit = WorkUnit::new(uid(1), "a", "", 2.0, Priority::High, "dev");
        unit.start().unwrap();
        assert!(matches!(
            unit.complete(-1.0, 0),
            Err(UnitError::InvalidActualHours { .. })
        ));
        assert_eq!(unit.status, UnitStatus::InProgress);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&UnitStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
