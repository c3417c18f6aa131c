//! Structural legality checks over whole states.
//!
//! The validator is pure and total: it never throws and reports every
//! violation it finds, in deterministic order (task id, then dependency
//! index). It is the single component that reasons about whole-state
//! structure; the executor deliberately defers cycle and dangling-reference
//! detection here so that operation order cannot reject otherwise-valid end
//! states.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::state::{DependencyStatus, Lifecycle, Priority, State, Status};

/// A single structural violation, serialized as `{kind, detail}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum Violation {
    DuplicateTitle { title: String },
    UnknownReference { field: String, id: String },
    InvalidEnumValue { field: String, value: String },
    ParentCycle { path: Vec<String> },
    DependencyCycle { path: Vec<String> },
}

impl Violation {
    /// Stable kind tag, matching the serialized `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Violation::DuplicateTitle { .. } => "DuplicateTitle",
            Violation::UnknownReference { .. } => "UnknownReference",
            Violation::InvalidEnumValue { .. } => "InvalidEnumValue",
            Violation::ParentCycle { .. } => "ParentCycle",
            Violation::DependencyCycle { .. } => "DependencyCycle",
        }
    }
}

/// Check a state against every structural invariant. Empty result means the
/// state is legal.
#[instrument(skip_all, fields(tasks = state.tasks.len(), dependencies = state.dependencies.len()))]
pub fn validate(state: &State) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_duplicate_titles(state, &mut violations);
    check_references(state, &mut violations);
    check_enum_values(state, &mut violations);
    check_parent_cycles(state, &mut violations);
    check_dependency_cycles(state, &mut violations);
    violations
}

fn check_duplicate_titles(state: &State, violations: &mut Vec<Violation>) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for task in state.tasks.values() {
        *counts.entry(task.title.as_str()).or_default() += 1;
    }
    for (title, count) in counts {
        if count > 1 {
            violations.push(Violation::DuplicateTitle {
                title: title.to_string(),
            });
        }
    }
}

fn check_references(state: &State, violations: &mut Vec<Violation>) {
    for (id, task) in &state.tasks {
        if !state.users.contains_key(&task.owner) {
            violations.push(Violation::UnknownReference {
                field: format!("tasks.{id}.owner"),
                id: task.owner.clone(),
            });
        }
        if !state.users.contains_key(&task.created_by) {
            violations.push(Violation::UnknownReference {
                field: format!("tasks.{id}.created_by"),
                id: task.created_by.clone(),
            });
        }
        if let Some(parent) = &task.parent
            && !state.tasks.contains_key(parent)
        {
            violations.push(Violation::UnknownReference {
                field: format!("tasks.{id}.parent"),
                id: parent.clone(),
            });
        }
    }

    for (index, dep) in state.dependencies.iter().enumerate() {
        if !state.tasks.contains_key(&dep.task) {
            violations.push(Violation::UnknownReference {
                field: format!("dependencies[{index}].task"),
                id: dep.task.clone(),
            });
        }
        if !state.tasks.contains_key(&dep.depends_on) {
            violations.push(Violation::UnknownReference {
                field: format!("dependencies[{index}].depends_on"),
                id: dep.depends_on.clone(),
            });
        }
    }
}

fn check_enum_values(state: &State, violations: &mut Vec<Violation>) {
    for (id, task) in &state.tasks {
        if let Priority::Unknown(value) = &task.priority {
            violations.push(invalid_enum(format!("tasks.{id}.priority"), value));
        }
        if let Status::Unknown(value) = &task.status {
            violations.push(invalid_enum(format!("tasks.{id}.status"), value));
        }
        if let Lifecycle::Unknown(value) = &task.state {
            violations.push(invalid_enum(format!("tasks.{id}.state"), value));
        }
        if !(1..=5).contains(&task.impact_size) {
            violations.push(invalid_enum(
                format!("tasks.{id}.impact_size"),
                &task.impact_size.to_string(),
            ));
        }
    }

    for (index, dep) in state.dependencies.iter().enumerate() {
        if let DependencyStatus::Unknown(value) = &dep.status {
            violations.push(invalid_enum(format!("dependencies[{index}].status"), value));
        }
    }
}

fn invalid_enum(field: String, value: &str) -> Violation {
    Violation::InvalidEnumValue {
        field,
        value: value.to_string(),
    }
}

/// The parent relation, restricted to tasks that exist, must form a forest.
/// One ancestor-walk probe per task; nodes proven acyclic are never walked
/// again, and each cycle is reported once, rotated to start at its smallest
/// id.
fn check_parent_cycles(state: &State, violations: &mut Vec<Violation>) {
    let mut cleared: BTreeSet<&str> = BTreeSet::new();
    let mut on_cycle: BTreeSet<&str> = BTreeSet::new();

    for start in state.tasks.keys() {
        if cleared.contains(start.as_str()) || on_cycle.contains(start.as_str()) {
            continue;
        }

        let mut path: Vec<&str> = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut current = start.as_str();
        loop {
            if cleared.contains(current) || on_cycle.contains(current) {
                break;
            }
            if !seen.insert(current) {
                let pos = path.iter().position(|id| *id == current).unwrap_or(0);
                for &id in &path[pos..] {
                    on_cycle.insert(id);
                }
                violations.push(Violation::ParentCycle {
                    path: rotate_min_first(
                        path[pos..].iter().map(|id| (*id).to_string()).collect(),
                    ),
                });
                break;
            }
            path.push(current);
            match state.tasks.get(current).and_then(|task| task.parent.as_deref()) {
                Some(parent) if state.tasks.contains_key(parent) => current = parent,
                _ => break,
            }
        }

        // Nodes that only lead into a cycle are not themselves on one.
        for id in path {
            if !on_cycle.contains(id) {
                cleared.insert(id);
            }
        }
    }
}

/// Only CONFIRMED edges carry a binding scheduling constraint, so only the
/// CONFIRMED subgraph is checked for cycles. Later records win per ordered
/// pair; edges with missing endpoints are already reported as dangling.
fn check_dependency_cycles(state: &State, violations: &mut Vec<Violation>) {
    let mut by_pair: BTreeMap<(&str, &str), &DependencyStatus> = BTreeMap::new();
    for dep in &state.dependencies {
        by_pair.insert((dep.task.as_str(), dep.depends_on.as_str()), &dep.status);
    }

    let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for ((task, depends_on), status) in by_pair {
        if *status != DependencyStatus::Confirmed {
            continue;
        }
        if !state.tasks.contains_key(task) || !state.tasks.contains_key(depends_on) {
            continue;
        }
        edges.entry(task).or_default().push(depends_on);
    }

    let starts: Vec<&str> = edges.keys().copied().collect();
    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();
    for start in starts {
        if !marks.contains_key(start) {
            dfs(start, &edges, &mut marks, &mut Vec::new(), &mut cycles);
        }
    }

    let mut reported: BTreeSet<Vec<String>> = BTreeSet::new();
    for cycle in cycles {
        let normalized = rotate_min_first(cycle);
        if reported.insert(normalized.clone()) {
            violations.push(Violation::DependencyCycle { path: normalized });
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

fn dfs<'a>(
    node: &'a str,
    edges: &BTreeMap<&'a str, Vec<&'a str>>,
    marks: &mut BTreeMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    marks.insert(node, Mark::InProgress);
    path.push(node);
    for &next in edges.get(node).map(Vec::as_slice).unwrap_or(&[]) {
        match marks.get(next) {
            Some(Mark::InProgress) => {
                let pos = path.iter().position(|id| *id == next).unwrap_or(0);
                cycles.push(path[pos..].iter().map(|id| (*id).to_string()).collect());
            }
            Some(Mark::Done) => {}
            None => dfs(next, edges, marks, path, cycles),
        }
    }
    path.pop();
    marks.insert(node, Mark::Done);
}

fn rotate_min_first(mut cycle: Vec<String>) -> Vec<String> {
    let min_pos = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(pos, _)| pos);
    if let Some(pos) = min_pos {
        cycle.rotate_left(pos);
    }
    cycle
}
