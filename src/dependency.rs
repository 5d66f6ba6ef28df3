//! Dependency analysis: edge assignment, cycle detection and ordering.
//!
//! Edges are assigned in one of two modes:
//!
//! - **Heuristic** (no map): a unit depends on the unit immediately before it
//!   when both share a category, otherwise it stays parallel-eligible.
//! - **Map-driven**: resources (file names) are extracted from each unit's name
//!   and description, and a unit depends on another when one of its resources
//!   lists one of the other's resources in the [`DependencyMap`].
//!
//! The analyzer never mutates units; it returns a [`DependencyAssignment`]
//! that the caller applies with [`apply_assignment`]. Dependencies declared
//! during decomposition (procedure and split chains) are always kept and come
//! first in each list.
//!
//! Ordering uses Kahn's algorithm with a deterministic `(priority_rank, name)`
//! tie-break over a petgraph DAG; cycle detection is a DFS with an explicit
//! recursion stack.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet};
use std::sync::LazyLock;

use petgraph::Direction;
use petgraph::graph::DiGraph;
use regex::Regex;

use crate::candidate::DependencyMap;
use crate::error::{DependencyError, DependencyResult};
use crate::unit::{PriorityRanks, UnitId, WorkUnit};

/// Resource assigned to test units that mention no file of their own.
pub const SYNTHETIC_TEST_RESOURCE: &str = "tests/test_derived";

/// New dependency lists, keyed by unit.
pub type DependencyAssignment = BTreeMap<UnitId, Vec<UnitId>>;

static RE_RESOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[A-Za-z0-9_\-./]*[A-Za-z0-9_\-]\.(?:rs|py|pyi|js|jsx|ts|tsx|go|java|kt|rb|c|cc|cpp|h|hpp|cs|swift|php|scala|sql|toml|yaml|yml|json|md|sh)\b",
    )
    .unwrap()
});

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Extract resource identifiers (file paths) mentioned in free text.
pub fn extract_resources(text: &str) -> BTreeSet<String> {
    RE_RESOURCE
        .find_iter(text)
        .map(|m| m.as_str().trim_start_matches("./").to_string())
        .collect()
}

fn is_test_category(category: &str) -> bool {
    matches!(
        category.trim().to_ascii_lowercase().as_str(),
        "test" | "tests" | "testing"
    )
}

/// Resources a unit touches, with the synthetic fallback for test units.
pub fn unit_resources(unit: &WorkUnit) -> BTreeSet<String> {
    let mut resources = extract_resources(&unit.name);
    resources.extend(extract_resources(&unit.description));
    if resources.is_empty() && is_test_category(&unit.category) {
        resources.insert(SYNTHETIC_TEST_RESOURCE.to_string());
    }
    resources
}

/// Compute dependencies for `units` (in decomposition order).
pub fn analyze(
    units: &[WorkUnit],
    map: Option<&DependencyMap>,
) -> DependencyResult<DependencyAssignment> {
    match map {
        Some(map) => map_driven(units, map),
        None => Ok(heuristic(units)),
    }
}

fn heuristic(units: &[WorkUnit]) -> DependencyAssignment {
    let mut assignment = DependencyAssignment::new();
    let mut previous: Option<&WorkUnit> = None;

    for unit in units {
        let mut deps = unit.dependencies.clone();
        if let Some(prev) = previous {
            if prev.category == unit.category && !deps.contains(&prev.id) {
                deps.push(prev.id);
            }
        }
        assignment.insert(unit.id, deps);
        previous = Some(unit);
    }
    assignment
}

fn map_driven(units: &[WorkUnit], map: &DependencyMap) -> DependencyResult<DependencyAssignment> {
    let resources: Vec<BTreeSet<String>> = units.iter().map(unit_resources).collect();
    validate_map(map, &resources)?;

    let mut assignment = DependencyAssignment::new();
    for (u, unit) in units.iter().enumerate() {
        let mut deps = unit.dependencies.clone();

        // Resources this unit needs from elsewhere.
        let required: BTreeSet<&str> = resources[u]
            .iter()
            .filter_map(|r| map.get(r))
            .flatten()
            .map(String::as_str)
            .filter(|r| !resources[u].contains(*r))
            .collect();

        if !required.is_empty() {
            for (v, other) in units.iter().enumerate() {
                if u == v || deps.contains(&other.id) {
                    continue;
                }
                if resources[v].iter().any(|r| required.contains(r.as_str())) {
                    deps.push(other.id);
                }
            }
        }
        assignment.insert(unit.id, deps);
    }

    tracing::debug!(
        units = units.len(),
        edges = assignment.values().map(Vec::len).sum::<usize>(),
        "map-driven dependency analysis complete"
    );
    Ok(assignment)
}

/// Every resource a map entry depends on must be a map key or be touched by a unit.
fn validate_map(map: &DependencyMap, resources: &[BTreeSet<String>]) -> DependencyResult<()> {
    let touched: HashSet<&str> = resources.iter().flatten().map(String::as_str).collect();

    for (key, deps) in map {
        if key.trim().is_empty() {
            return Err(DependencyError::EmptyResource);
        }
        for dep in deps {
            if dep.trim().is_empty() {
                return Err(DependencyError::EmptyResource);
            }
            if !map.contains_key(dep) && !touched.contains(dep.as_str()) {
                return Err(DependencyError::UnknownResource {
                    resource: dep.clone(),
                    referenced_by: key.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Replace each unit's dependency list with its entry in `assignment`.
pub fn apply_assignment(units: &mut [WorkUnit], assignment: &DependencyAssignment) {
    for unit in units.iter_mut() {
        if let Some(deps) = assignment.get(&unit.id) {
            unit.dependencies = deps.clone();
        }
    }
}

/// Reject dangling and self-referencing dependency ids.
pub fn check_references(units: &[WorkUnit]) -> DependencyResult<()> {
    let known: HashSet<UnitId> = units.iter().map(|u| u.id).collect();
    for unit in units {
        for dep in &unit.dependencies {
            if *dep == unit.id {
                return Err(DependencyError::SelfDependency {
                    unit: unit.id.to_string(),
                });
            }
            if !known.contains(dep) {
                return Err(DependencyError::UnknownDependency {
                    unit: unit.id.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// petgraph view of the units: an edge `a -> b` means `b` depends on `a`.
///
/// Dependencies on ids outside the unit set are ignored.
pub struct DependencyGraph {
    dag: DiGraph<UnitId, ()>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("node_count", &self.dag.node_count())
            .field("edge_count", &self.dag.edge_count())
            .finish()
    }
}

impl DependencyGraph {
    pub fn build(units: &[WorkUnit]) -> Self {
        let mut dag = DiGraph::with_capacity(units.len(), units.len());
        let mut index = HashMap::with_capacity(units.len());
        for unit in units {
            index.insert(unit.id, dag.add_node(unit.id));
        }
        for unit in units {
            let to = index[&unit.id];
            for dep in &unit.dependencies {
                if let Some(&from) = index.get(dep) {
                    dag.add_edge(from, to, ());
                }
            }
        }
        Self { dag }
    }

    /// First cycle found by DFS, as the ids along the cycle.
    ///
    /// The DFS keeps an explicit stack of `(node, remaining neighbours)` so
    /// arbitrarily long dependency chains do not grow the call stack.
    pub fn find_cycle(&self) -> Option<Vec<UnitId>> {
        let mut marks = vec![Mark::Unvisited; self.dag.node_count()];
        for start in self.dag.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }
            marks[start.index()] = Mark::OnStack;
            let mut stack = vec![(start, self.dag.neighbors_directed(start, Direction::Outgoing))];

            while let Some((node, neighbors)) = stack.last_mut() {
                let node = *node;
                let next = neighbors.next();
                match next {
                    Some(next) => match marks[next.index()] {
                        // Back-edge: `next` is still on the stack.
                        Mark::OnStack => {
                            let pos = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                            return Some(stack[pos..].iter().map(|(n, _)| self.dag[*n]).collect());
                        }
                        Mark::Unvisited => {
                            marks[next.index()] = Mark::OnStack;
                            stack.push((next, self.dag.neighbors_directed(next, Direction::Outgoing)));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[node.index()] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }
        None
    }

    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }
}

/// Whether the units' dependency edges contain a cycle.
pub fn has_circular_dependency(units: &[WorkUnit]) -> bool {
    DependencyGraph::build(units).has_cycle()
}

/// The first cycle found, if any.
pub fn find_cycle(units: &[WorkUnit]) -> Option<Vec<UnitId>> {
    DependencyGraph::build(units).find_cycle()
}

// ---------------------------------------------------------------------------
// Topological sort
// ---------------------------------------------------------------------------

/// Result of [`topological_sort`].
#[derive(Debug, Clone, PartialEq)]
pub struct TopoOrder {
    /// Units in dependency-respecting order.
    pub order: Vec<UnitId>,
    /// Units that could not be ordered because they sit on or behind a cycle,
    /// in their original order. Empty for a DAG.
    pub unresolved: Vec<UnitId>,
}

impl TopoOrder {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Kahn's algorithm; among ready units the smallest `(rank, name, id)` goes next.
pub fn topological_sort(units: &[WorkUnit], ranks: &PriorityRanks) -> TopoOrder {
    let known: HashSet<UnitId> = units.iter().map(|u| u.id).collect();
    let by_id: HashMap<UnitId, &WorkUnit> = units.iter().map(|u| (u.id, u)).collect();

    let mut in_degree: HashMap<UnitId, usize> = HashMap::with_capacity(units.len());
    let mut dependents: HashMap<UnitId, Vec<UnitId>> = HashMap::new();
    for unit in units {
        let deps: BTreeSet<UnitId> = unit
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

    let key = |id: UnitId| {
        let unit = by_id[&id];
        Reverse((ranks.rank(unit.priority), unit.name.clone(), id))
    };

    let mut ready: BinaryHeap<_> = units
        .iter()
        .filter(|u| in_degree[&u.id] == 0)
        .map(|u| key(u.id))
        .collect();

    let mut order = Vec::with_capacity(units.len());
    while let Some(Reverse((_, _, id))) = ready.pop() {
        order.push(id);
        for &next in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(key(next));
                }
            }
        }
    }

    let emitted: HashSet<UnitId> = order.iter().copied().collect();
    let unresolved = units
        .iter()
        .map(|u| u.id)
        .filter(|id| !emitted.contains(id))
        .collect();

    TopoOrder { order, unresolved }
}
