//! Title-based comparison of a produced state against a target.
//!
//! Ids are an artifact of how a task was created (caller-assigned or
//! resolved from a temp id); titles are the durable identity the system
//! promises to preserve. Every diff here is therefore expressed in titles,
//! and two states with identical titles, fields, and relations compare equal
//! even when every id differs.
//!
//! The comparator never errors. Its behavior on an illegal state (duplicate
//! titles in particular) is undefined; validate before comparing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::canonical::{CanonicalState, canonicalize};
use crate::state::{State, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub verdict: Verdict,
    /// Titles present only in the expected state.
    pub missing_titles: Vec<String>,
    /// Titles present only in the actual state.
    pub extra_titles: Vec<String>,
    pub field_mismatches: Vec<FieldMismatch>,
    pub parent_diff: RelationDiff<ParentLink>,
    pub dependency_diff: RelationDiff<DependencyLink>,
}

impl ComparisonReport {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub title: String,
    pub field: String,
    pub expected: String,
    pub actual: String,
}

/// Set difference of a relation, in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDiff<T> {
    /// Pairs the expected state has and the actual state lacks.
    pub missing: Vec<T>,
    /// Pairs the actual state has and the expected state lacks.
    pub extra: Vec<T>,
}

impl<T> RelationDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentLink {
    pub child: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyLink {
    pub task: String,
    pub depends_on: String,
    pub status: String,
}

/// Score `actual` against `expected` by task title.
#[instrument(skip_all)]
pub fn compare(expected: &State, actual: &State) -> ComparisonReport {
    let expected = canonicalize(expected);
    let actual = canonicalize(actual);

    let expected_by_title = title_index(&expected);
    let actual_by_title = title_index(&actual);

    let missing_titles: Vec<String> = expected_by_title
        .keys()
        .filter(|title| !actual_by_title.contains_key(*title))
        .map(|title| (*title).to_string())
        .collect();
    let extra_titles: Vec<String> = actual_by_title
        .keys()
        .filter(|title| !expected_by_title.contains_key(*title))
        .map(|title| (*title).to_string())
        .collect();

    let mut field_mismatches = Vec::new();
    for (title, expected_task) in &expected_by_title {
        if let Some(actual_task) = actual_by_title.get(title) {
            diff_fields(title, expected_task, actual_task, &mut field_mismatches);
        }
    }

    let parent_diff = diff_sets(parent_links(&expected), parent_links(&actual));
    let dependency_diff = diff_sets(dependency_links(&expected), dependency_links(&actual));

    let verdict = if missing_titles.is_empty()
        && extra_titles.is_empty()
        && field_mismatches.is_empty()
        && parent_diff.is_empty()
        && dependency_diff.is_empty()
    {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    debug!(?verdict, "comparison finished");

    ComparisonReport {
        verdict,
        missing_titles,
        extra_titles,
        field_mismatches,
        parent_diff,
        dependency_diff,
    }
}

fn title_index<'a>(state: &'a CanonicalState) -> BTreeMap<&'a str, &'a Task> {
    state
        .tasks
        .iter()
        .map(|entry| (entry.task.title.as_str(), &entry.task))
        .collect()
}

fn id_to_title<'a>(state: &'a CanonicalState) -> BTreeMap<&'a str, &'a str> {
    state
        .tasks
        .iter()
        .map(|entry| (entry.id.as_str(), entry.task.title.as_str()))
        .collect()
}

/// Compare every declared task field except `id` (never meaningful across
/// states) and `parent` (diffed as a title-level relation instead).
fn diff_fields(title: &str, expected: &Task, actual: &Task, out: &mut Vec<FieldMismatch>) {
    let fields = [
        (
            "priority",
            expected.priority.as_str().to_string(),
            actual.priority.as_str().to_string(),
        ),
        (
            "status",
            expected.status.as_str().to_string(),
            actual.status.as_str().to_string(),
        ),
        (
            "state",
            expected.state.as_str().to_string(),
            actual.state.as_str().to_string(),
        ),
        ("owner", expected.owner.clone(), actual.owner.clone()),
        (
            "created_by",
            expected.created_by.clone(),
            actual.created_by.clone(),
        ),
        (
            "impact_size",
            expected.impact_size.to_string(),
            actual.impact_size.to_string(),
        ),
        (
            "perceived_owner",
            expected.perceived_owner.clone(),
            actual.perceived_owner.clone(),
        ),
        (
            "main_goal",
            expected.main_goal.clone(),
            actual.main_goal.clone(),
        ),
        (
            "resources",
            expected.resources.clone(),
            actual.resources.clone(),
        ),
    ];
    for (field, expected_value, actual_value) in fields {
        if expected_value != actual_value {
            out.push(FieldMismatch {
                title: title.to_string(),
                field: field.to_string(),
                expected: expected_value,
                actual: actual_value,
            });
        }
    }
}

fn parent_links(state: &CanonicalState) -> BTreeSet<ParentLink> {
    let titles = id_to_title(state);
    state
        .tasks
        .iter()
        .map(|entry| ParentLink {
            child: entry.task.title.clone(),
            // Dangling parent ids pass through untranslated; the validator
            // reports them, the diff stays total.
            parent: entry.task.parent.as_ref().map(|id| {
                titles
                    .get(id.as_str())
                    .map_or_else(|| id.clone(), |title| (*title).to_string())
            }),
        })
        .collect()
}

fn dependency_links(state: &CanonicalState) -> BTreeSet<DependencyLink> {
    let titles = id_to_title(state);
    let title_of = |id: &str| {
        titles
            .get(id)
            .map_or_else(|| id.to_string(), |title| (*title).to_string())
    };
    state
        .dependencies
        .iter()
        .map(|dep| DependencyLink {
            task: title_of(&dep.task),
            depends_on: title_of(&dep.depends_on),
            status: dep.status.as_str().to_string(),
        })
        .collect()
}

fn diff_sets<T: Ord>(expected: BTreeSet<T>, actual: BTreeSet<T>) -> RelationDiff<T>
where
    T: Clone,
{
    RelationDiff {
        missing: expected.difference(&actual).cloned().collect(),
        extra: actual.difference(&expected).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DependencyStatus, Status};
    use crate::test_support::{add_task, dependency, state_with_users};

    fn linked_state(task_id: &str, child_id: &str) -> State {
        let mut state = state_with_users(&[("U1", "Alice")]);
        add_task(&mut state, task_id, "Design API", "U1");
        add_task(&mut state, child_id, "Write docs", "U1");
        if let Some(task) = state.tasks.get_mut(child_id) {
            task.parent = Some(task_id.to_string());
        }
        state
            .dependencies
            .push(dependency(child_id, task_id, DependencyStatus::Confirmed));
        state
    }

    /// States with identical titles, fields, and relations PASS even when
    /// every task id differs.
    #[test]
    fn comparison_is_id_independent() {
        let expected = linked_state("T1", "T2");
        let actual = linked_state("task_77", "task_9");
        let report = compare(&expected, &actual);
        assert!(report.passed(), "report: {report:?}");
    }

    /// Titles present on one side only are reported as missing or extra.
    #[test]
    fn missing_and_extra_titles_are_reported() {
        let mut expected = state_with_users(&[("U1", "Alice")]);
        add_task(&mut expected, "T1", "Design API", "U1");
        let mut actual = state_with_users(&[("U1", "Alice")]);
        add_task(&mut actual, "T9", "Write docs", "U1");

        let report = compare(&expected, &actual);
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.missing_titles, vec!["Design API".to_string()]);
        assert_eq!(report.extra_titles, vec!["Write docs".to_string()]);
    }

    /// Field differences are reported per title with both values.
    #[test]
    fn field_mismatches_carry_both_values() {
        let mut expected = state_with_users(&[("U1", "Alice")]);
        add_task(&mut expected, "T1", "Design API", "U1");
        let mut actual = expected.clone();
        if let Some(task) = actual.tasks.get_mut("T1") {
            task.status = Status::Done;
        }

        let report = compare(&expected, &actual);
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(
            report.field_mismatches,
            vec![FieldMismatch {
                title: "Design API".to_string(),
                field: "status".to_string(),
                expected: "Not started".to_string(),
                actual: "Done".to_string(),
            }]
        );
    }

    /// Parent links are diffed as title pairs, not id pairs.
    #[test]
    fn parent_diff_uses_titles() {
        let expected = linked_state("T1", "T2");
        let mut actual = linked_state("T1", "T2");
        if let Some(task) = actual.tasks.get_mut("T2") {
            task.parent = None;
        }

        let report = compare(&expected, &actual);
        assert_eq!(
            report.parent_diff.missing,
            vec![ParentLink {
                child: "Write docs".to_string(),
                parent: Some("Design API".to_string()),
            }]
        );
        assert_eq!(
            report.parent_diff.extra,
            vec![ParentLink {
                child: "Write docs".to_string(),
                parent: None,
            }]
        );
    }

    /// Dependency triples are diffed as title triples including status.
    #[test]
    fn dependency_diff_uses_title_triples() {
        let expected = linked_state("T1", "T2");
        let mut actual = linked_state("T1", "T2");
        actual.dependencies[0].status = DependencyStatus::Proposed;

        let report = compare(&expected, &actual);
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(
            report.dependency_diff.missing,
            vec![DependencyLink {
                task: "Write docs".to_string(),
                depends_on: "Design API".to_string(),
                status: "CONFIRMED".to_string(),
            }]
        );
        assert_eq!(
            report.dependency_diff.extra,
            vec![DependencyLink {
                task: "Write docs".to_string(),
                depends_on: "Design API".to_string(),
                status: "PROPOSED".to_string(),
            }]
        );
    }

    /// The report serializes with the wire verdict spelling.
    #[test]
    fn verdict_serializes_uppercase() {
        let state = state_with_users(&[("U1", "Alice")]);
        let report = compare(&state, &state);
        let value = serde_json::to_value(&report).expect("json");
        assert_eq!(value["verdict"], "PASS");
    }
}
