//! Ordered application of edit operations against a state.
//!
//! `apply` is the only way a state changes. It clones its input, applies
//! operations strictly in array order against the evolving copy, and records
//! one log entry per executed operation. A failed operation leaves the state
//! exactly as it stood before that operation: every check precedes every
//! mutation.
//!
//! The executor does not reject cycle-forming edits; whole-state reasoning
//! (cycles, dangling reference payloads) belongs to the legality validator,
//! so that operation order cannot matter for otherwise-valid end states.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use crate::core::ids::IdSource;
use crate::core::legality::validate;
use crate::core::types::{
    ApplyOptions, CreateFields, ErrorPolicy, ExecutionLog, OpError, OpOutcome, OpRecord, Operation,
    UpdatePatch,
};
use crate::state::{Dependency, DependencyStatus, Lifecycle, Priority, State, Status, Task};

/// Apply `ops` in order against a copy of `state`.
///
/// Semantic failures are recorded and skipped (or, under
/// [`ErrorPolicy::Strict`], stop the run); the already-applied prefix is
/// always kept. The final state is re-checked by the validator because
/// individually well-formed operations can jointly produce an illegal state;
/// violations surface as warnings here and callers needing the report run
/// [`validate`] themselves.
#[instrument(skip_all, fields(ops = ops.len()))]
pub fn apply<I: IdSource>(
    state: &State,
    ops: &[Operation],
    ids: &mut I,
    options: &ApplyOptions,
) -> (State, ExecutionLog) {
    let mut next = state.clone();
    let mut temp_ids: HashMap<String, String> = HashMap::new();
    let mut log = ExecutionLog::new();

    for (op_index, op) in ops.iter().enumerate() {
        match apply_one(&mut next, op, ids, &mut temp_ids) {
            Ok(()) => {
                debug!(op_index, "operation applied");
                log.push(OpRecord {
                    op_index,
                    outcome: OpOutcome::Applied,
                    error: None,
                });
            }
            Err(error) => {
                debug!(op_index, kind = error.kind(), "operation skipped");
                log.push(OpRecord {
                    op_index,
                    outcome: OpOutcome::Skipped,
                    error: Some(error),
                });
                if options.policy == ErrorPolicy::Strict {
                    break;
                }
            }
        }
    }

    let violations = validate(&next);
    if !violations.is_empty() {
        warn!(
            violations = violations.len(),
            "applied operations left the state illegal"
        );
    }

    (next, log)
}

fn apply_one<I: IdSource>(
    state: &mut State,
    op: &Operation,
    ids: &mut I,
    temp_ids: &mut HashMap<String, String>,
) -> Result<(), OpError> {
    match op {
        Operation::TaskCreate { temp_id, fields } => {
            create_task(state, temp_id, fields, ids, temp_ids)
        }
        Operation::TaskUpdate { id, patch } => update_task(state, id, patch, temp_ids),
        Operation::SetParent { child, parent } => {
            set_parent(state, child, parent.as_deref(), temp_ids)
        }
        Operation::SetDependency {
            task,
            depends_on,
            status,
        } => set_dependency(state, task, depends_on, status, temp_ids),
        Operation::TaskDelete { id } => delete_task(state, id, temp_ids),
    }
}

/// Resolve an operand through the session temp-id table; unbound operands
/// pass through as literal ids.
fn resolve(temp_ids: &HashMap<String, String>, id: &str) -> String {
    temp_ids.get(id).cloned().unwrap_or_else(|| id.to_string())
}

fn create_task<I: IdSource>(
    state: &mut State,
    temp_id: &str,
    fields: &CreateFields,
    ids: &mut I,
    temp_ids: &mut HashMap<String, String>,
) -> Result<(), OpError> {
    if state.tasks.values().any(|task| task.title == fields.title) {
        return Err(OpError::DuplicateTitle {
            title: fields.title.clone(),
        });
    }

    let id = loop {
        let candidate = ids.next_task_id();
        if !state.tasks.contains_key(&candidate) {
            break candidate;
        }
    };

    let parent = fields
        .parent
        .as_ref()
        .map(|parent| resolve(temp_ids, parent));
    state.tasks.insert(
        id.clone(),
        Task {
            title: fields.title.clone(),
            priority: fields.priority.clone(),
            status: fields.status.clone(),
            state: fields.state.clone(),
            owner: fields.owner.clone(),
            created_by: fields.created_by.clone(),
            parent,
            impact_size: fields.impact_size,
            perceived_owner: fields.perceived_owner.clone(),
            main_goal: fields.main_goal.clone(),
            resources: fields.resources.clone(),
        },
    );
    // Rebinding an already-used temp id follows last-write-wins, like the
    // dependency upsert.
    temp_ids.insert(temp_id.to_string(), id);
    Ok(())
}

fn update_task(
    state: &mut State,
    id: &str,
    patch: &UpdatePatch,
    temp_ids: &HashMap<String, String>,
) -> Result<(), OpError> {
    let id = resolve(temp_ids, id);
    let Some(task) = state.tasks.get_mut(&id) else {
        return Err(OpError::UnknownReference {
            field: "id".to_string(),
            id,
        });
    };

    if let Some(Priority::Unknown(value)) = &patch.priority {
        return Err(invalid_enum("priority", value));
    }
    if let Some(Status::Unknown(value)) = &patch.status {
        return Err(invalid_enum("status", value));
    }
    if let Some(Lifecycle::Unknown(value)) = &patch.state {
        return Err(invalid_enum("state", value));
    }

    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    if let Some(priority) = &patch.priority {
        task.priority = priority.clone();
    }
    if let Some(status) = &patch.status {
        task.status = status.clone();
    }
    if let Some(lifecycle) = &patch.state {
        task.state = lifecycle.clone();
    }
    if let Some(owner) = &patch.owner {
        task.owner = owner.clone();
    }
    if let Some(created_by) = &patch.created_by {
        task.created_by = created_by.clone();
    }
    if let Some(impact_size) = patch.impact_size {
        task.impact_size = impact_size;
    }
    if let Some(perceived_owner) = &patch.perceived_owner {
        task.perceived_owner = perceived_owner.clone();
    }
    if let Some(main_goal) = &patch.main_goal {
        task.main_goal = main_goal.clone();
    }
    if let Some(resources) = &patch.resources {
        task.resources = resources.clone();
    }
    Ok(())
}

fn invalid_enum(field: &str, value: &str) -> OpError {
    OpError::InvalidEnumValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn set_parent(
    state: &mut State,
    child: &str,
    parent: Option<&str>,
    temp_ids: &HashMap<String, String>,
) -> Result<(), OpError> {
    let child_id = resolve(temp_ids, child);
    if !state.tasks.contains_key(&child_id) {
        return Err(OpError::UnknownReference {
            field: "child".to_string(),
            id: child_id,
        });
    }

    let parent_id = match parent {
        Some(parent) => {
            let parent_id = resolve(temp_ids, parent);
            if !state.tasks.contains_key(&parent_id) {
                return Err(OpError::UnknownReference {
                    field: "parent".to_string(),
                    id: parent_id,
                });
            }
            Some(parent_id)
        }
        None => None,
    };

    if let Some(task) = state.tasks.get_mut(&child_id) {
        task.parent = parent_id;
    }
    Ok(())
}

fn set_dependency(
    state: &mut State,
    task: &str,
    depends_on: &str,
    status: &DependencyStatus,
    temp_ids: &HashMap<String, String>,
) -> Result<(), OpError> {
    let task_id = resolve(temp_ids, task);
    let depends_on_id = resolve(temp_ids, depends_on);
    if task_id == depends_on_id {
        return Err(OpError::SelfDependency { id: task_id });
    }

    if let Some(existing) = state
        .dependencies
        .iter_mut()
        .find(|dep| dep.task == task_id && dep.depends_on == depends_on_id)
    {
        existing.status = status.clone();
    } else {
        state.dependencies.push(Dependency {
            task: task_id,
            depends_on: depends_on_id,
            status: status.clone(),
        });
    }
    Ok(())
}

fn delete_task(
    state: &mut State,
    id: &str,
    temp_ids: &HashMap<String, String>,
) -> Result<(), OpError> {
    let id = resolve(temp_ids, id);
    if !state.tasks.contains_key(&id) {
        return Err(OpError::UnknownReference {
            field: "id".to_string(),
            id,
        });
    }

    let has_children = state
        .tasks
        .values()
        .any(|task| task.parent.as_deref() == Some(id.as_str()));
    let has_binding_dependency = state.dependencies.iter().any(|dep| {
        matches!(
            dep.status,
            DependencyStatus::Confirmed | DependencyStatus::Proposed
        ) && (dep.task == id || dep.depends_on == id)
    });
    if has_children || has_binding_dependency {
        return Err(OpError::BlockedDelete { id });
    }

    state.tasks.remove(&id);
    // REJECTED/REMOVED records never block, but leaving them dangling would
    // make a fully-successful sequence produce an illegal state.
    state
        .dependencies
        .retain(|dep| dep.task != id && dep.depends_on != id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::canonical::canonicalize;
    use crate::core::ids::SequentialIds;
    use crate::test_support::{add_task, create_op, dependency, state_with_users};

    fn apply_default(state: &State, ops: &[Operation]) -> (State, ExecutionLog) {
        let mut ids = SequentialIds::default();
        apply(state, ops, &mut ids, &ApplyOptions::default())
    }

    /// Applying an empty list returns a canonically equal state.
    #[test]
    fn empty_op_list_is_identity() {
        let mut state = state_with_users(&[("U1", "Alice")]);
        add_task(&mut state, "T1", "Design API", "U1");
        let (next, log) = apply_default(&state, &[]);
        assert!(log.is_empty());
        assert_eq!(canonicalize(&next), canonicalize(&state));
    }

    /// A state built solely from successful operations validates clean.
    #[test]
    fn successful_sequences_produce_legal_states() {
        let state = state_with_users(&[("U1", "Alice")]);
        let ops = vec![
            create_op("tmp_1", "Design API", "U1"),
            create_op("tmp_2", "Write docs", "U1"),
            Operation::SetParent {
                child: "tmp_2".to_string(),
                parent: Some("tmp_1".to_string()),
            },
            Operation::SetDependency {
                task: "tmp_2".to_string(),
                depends_on: "tmp_1".to_string(),
                status: DependencyStatus::Confirmed,
            },
        ];
        let (next, log) = apply_default(&state, &ops);
        assert!(log.iter().all(|record| record.outcome == OpOutcome::Applied));
        assert!(validate(&next).is_empty());
    }

    /// A temp id binds to the generated id and resolves in later operations.
    #[test]
    fn temp_ids_resolve_in_later_operations() {
        let state = state_with_users(&[("U1", "Alice")]);
        let ops = vec![
            create_op("tmp_1", "Design API", "U1"),
            Operation::TaskUpdate {
                id: "tmp_1".to_string(),
                patch: UpdatePatch {
                    status: Some(Status::InProgress),
                    ..UpdatePatch::default()
                },
            },
        ];
        let (next, log) = apply_default(&state, &ops);
        assert!(log.iter().all(|record| record.outcome == OpOutcome::Applied));
        let task = next.tasks.get("task_1").expect("created task");
        assert_eq!(task.status, Status::InProgress);
    }

    /// A temp id used before its TASK_CREATE does not resolve.
    #[test]
    fn temp_id_before_create_is_unknown() {
        let state = state_with_users(&[("U1", "Alice")]);
        let ops = vec![
            Operation::TaskUpdate {
                id: "tmp_1".to_string(),
                patch: UpdatePatch::default(),
            },
            create_op("tmp_1", "Design API", "U1"),
        ];
        let (next, log) = apply_default(&state, &ops);
        assert_eq!(log[0].outcome, OpOutcome::Skipped);
        assert!(matches!(
            log[0].error,
            Some(OpError::UnknownReference { .. })
        ));
        assert_eq!(log[1].outcome, OpOutcome::Applied);
        assert_eq!(next.tasks.len(), 1);
    }

    /// Creating a task whose title already exists fails and changes nothing.
    #[test]
    fn duplicate_title_create_is_skipped() {
        let mut state = state_with_users(&[("U1", "Alice")]);
        add_task(&mut state, "T1", "Design API", "U1");
        let (next, log) = apply_default(&state, &[create_op("tmp_1", "Design API", "U1")]);
        assert_eq!(
            log[0].error,
            Some(OpError::DuplicateTitle {
                title: "Design API".to_string()
            })
        );
        assert_eq!(next, state);
    }

    /// The id source is retried until it yields an id unused in the state.
    #[test]
    fn generated_ids_skip_existing_ones() {
        let mut state = state_with_users(&[("U1", "Alice")]);
        state.tasks.insert(
            "task_1".to_string(),
            crate::test_support::task("Existing", "U1"),
        );
        let (next, _log) = apply_default(&state, &[create_op("tmp_1", "Design API", "U1")]);
        assert!(next.tasks.contains_key("task_2"));
    }

    /// An undeclared enum value in a patch skips the whole operation.
    #[test]
    fn invalid_patch_enum_is_skipped_atomically() {
        let mut state = state_with_users(&[("U1", "Alice")]);
        add_task(&mut state, "T1", "Design API", "U1");
        let ops = vec![Operation::TaskUpdate {
            id: "T1".to_string(),
            patch: UpdatePatch {
                title: Some("Renamed".to_string()),
                priority: Some(Priority::Unknown("Urgent".to_string())),
                ..UpdatePatch::default()
            },
        }];
        let (next, log) = apply_default(&state, &ops);
        assert_eq!(
            log[0].error,
            Some(OpError::InvalidEnumValue {
                field: "priority".to_string(),
                value: "Urgent".to_string(),
            })
        );
        assert_eq!(next, state);
    }

    /// SET_DEPENDENCY on an existing pair replaces the status in place.
    #[test]
    fn set_dependency_upserts_in_place() {
        let mut state = state_with_users(&[("U1", "Alice")]);
        add_task(&mut state, "T1", "Design API", "U1");
        add_task(&mut state, "T2", "Write docs", "U1");
        state
            .dependencies
            .push(dependency("T1", "T2", DependencyStatus::Proposed));
        let ops = vec![Operation::SetDependency {
            task: "T1".to_string(),
            depends_on: "T2".to_string(),
            status: DependencyStatus::Confirmed,
        }];
        let (next, _log) = apply_default(&state, &ops);
        assert_eq!(next.dependencies.len(), 1);
        assert_eq!(next.dependencies[0].status, DependencyStatus::Confirmed);
    }

    /// A task cannot depend on itself, even through a temp id alias.
    #[test]
    fn self_dependency_is_rejected() {
        let state = state_with_users(&[("U1", "Alice")]);
        let ops = vec![
            create_op("tmp_1", "Design API", "U1"),
            Operation::SetDependency {
                task: "tmp_1".to_string(),
                depends_on: "task_1".to_string(),
                status: DependencyStatus::Proposed,
            },
        ];
        let (next, log) = apply_default(&state, &ops);
        assert_eq!(
            log[1].error,
            Some(OpError::SelfDependency {
                id: "task_1".to_string()
            })
        );
        assert!(next.dependencies.is_empty());
    }

    /// Deleting a task with a child fails with BlockedDelete and leaves the
    /// state bit-for-bit unchanged.
    #[test]
    fn delete_with_child_is_blocked() {
        let mut state = state_with_users(&[("U1", "Alice")]);
        add_task(&mut state, "T1", "Design API", "U1");
        add_task(&mut state, "T2", "Write docs", "U1");
        if let Some(task) = state.tasks.get_mut("T2") {
            task.parent = Some("T1".to_string());
        }
        let ops = vec![Operation::TaskDelete {
            id: "T1".to_string(),
        }];
        let (next, log) = apply_default(&state, &ops);
        assert_eq!(
            log[0].error,
            Some(OpError::BlockedDelete {
                id: "T1".to_string()
            })
        );
        assert_eq!(next, state);
    }

    /// PROPOSED dependencies block deletion; REJECTED/REMOVED ones are
    /// pruned along with the task.
    #[test]
    fn delete_honors_dependency_precondition() {
        let mut state = state_with_users(&[("U1", "Alice")]);
        add_task(&mut state, "T1", "Design API", "U1");
        add_task(&mut state, "T2", "Write docs", "U1");
        state
            .dependencies
            .push(dependency("T2", "T1", DependencyStatus::Proposed));

        let ops = vec![Operation::TaskDelete {
            id: "T1".to_string(),
        }];
        let (blocked, log) = apply_default(&state, &ops);
        assert_eq!(log[0].outcome, OpOutcome::Skipped);
        assert_eq!(blocked, state);

        state.dependencies[0].status = DependencyStatus::Rejected;
        let (next, log) = apply_default(&state, &ops);
        assert_eq!(log[0].outcome, OpOutcome::Applied);
        assert!(!next.tasks.contains_key("T1"));
        assert!(next.dependencies.is_empty());
        assert!(validate(&next).is_empty());
    }

    /// Under the default policy, operations after a failure still run.
    #[test]
    fn skip_and_log_continues_after_failures() {
        let state = state_with_users(&[("U1", "Alice")]);
        let ops = vec![
            Operation::TaskDelete {
                id: "missing".to_string(),
            },
            create_op("tmp_1", "Design API", "U1"),
        ];
        let (next, log) = apply_default(&state, &ops);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].outcome, OpOutcome::Skipped);
        assert_eq!(log[1].outcome, OpOutcome::Applied);
        assert_eq!(next.tasks.len(), 1);
    }

    /// Under the strict policy, the first failure stops the run but keeps
    /// the applied prefix.
    #[test]
    fn strict_policy_stops_at_first_failure() {
        let state = state_with_users(&[("U1", "Alice")]);
        let ops = vec![
            create_op("tmp_1", "Design API", "U1"),
            Operation::TaskDelete {
                id: "missing".to_string(),
            },
            create_op("tmp_2", "Write docs", "U1"),
        ];
        let mut ids = SequentialIds::default();
        let options = ApplyOptions {
            policy: ErrorPolicy::Strict,
        };
        let (next, log) = apply(&state, &ops, &mut ids, &options);
        assert_eq!(log.len(), 2);
        assert_eq!(next.tasks.len(), 1);
    }

    /// Created tasks get the documented field defaults.
    #[test]
    fn create_applies_documented_defaults() {
        let state = state_with_users(&[("U1", "Alice")]);
        let ops = vec![Operation::TaskCreate {
            temp_id: "tmp_1".to_string(),
            fields: serde_json::from_str(r#"{"title": "Design API", "owner": "U1", "created_by": "U1"}"#)
                .expect("fields"),
        }];
        let (next, _log) = apply_default(&state, &ops);
        let task = next.tasks.get("task_1").expect("created task");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::NotStarted);
        assert_eq!(task.state, Lifecycle::Draft);
        assert_eq!(task.impact_size, 3);
        assert_eq!(task.parent, None);
    }

    /// The caller's input state is never mutated.
    #[test]
    fn input_state_is_left_untouched() {
        let state = state_with_users(&[("U1", "Alice")]);
        let before = state.clone();
        let _ = apply_default(&state, &[create_op("tmp_1", "Design API", "U1")]);
        assert_eq!(state, before);
    }
}
