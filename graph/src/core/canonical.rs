//! Order-independent normal form for states.
//!
//! Two semantically equal states canonicalize to the same value and therefore
//! serialize identically, regardless of how either was constructed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::{Dependency, DependencyStatus, State, Task, User};

/// Canonical form: users sorted by id, tasks by `(title, id)`, dependencies
/// deduped per ordered pair and sorted by `(task, depends_on)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalState {
    pub users: Vec<UserEntry>,
    pub tasks: Vec<TaskEntry>,
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: String,
    #[serde(flatten)]
    pub task: Task,
}

/// Normalize a state. Pure and total: performs no validation and accepts
/// states the validator would reject. Idempotent through
/// [`CanonicalState::into_state`].
pub fn canonicalize(state: &State) -> CanonicalState {
    let users = state
        .users
        .iter()
        .map(|(id, user)| UserEntry {
            id: id.clone(),
            name: user.name.clone(),
        })
        .collect();

    let mut tasks: Vec<TaskEntry> = state
        .tasks
        .iter()
        .map(|(id, task)| TaskEntry {
            id: id.clone(),
            task: normalize_task(task),
        })
        .collect();
    tasks.sort_by(|a, b| {
        a.task
            .title
            .cmp(&b.task.title)
            .then_with(|| a.id.cmp(&b.id))
    });

    // Later records win per ordered pair, matching SET_DEPENDENCY upserts.
    let mut by_pair: BTreeMap<(String, String), DependencyStatus> = BTreeMap::new();
    for dep in &state.dependencies {
        by_pair.insert((dep.task.clone(), dep.depends_on.clone()), dep.status.clone());
    }
    let dependencies = by_pair
        .into_iter()
        .map(|((task, depends_on), status)| Dependency {
            task,
            depends_on,
            status,
        })
        .collect();

    CanonicalState {
        users,
        tasks,
        dependencies,
    }
}

fn normalize_task(task: &Task) -> Task {
    let mut task = task.clone();
    // An empty-string parent means "unset" in loosely-produced states.
    if task.parent.as_deref() == Some("") {
        task.parent = None;
    }
    task
}

impl CanonicalState {
    /// Rebuild the wire-shaped state. Serializing this is the byte-stable
    /// form of the original state.
    pub fn into_state(self) -> State {
        State {
            users: self
                .users
                .into_iter()
                .map(|entry| (entry.id, User { name: entry.name }))
                .collect(),
            tasks: self
                .tasks
                .into_iter()
                .map(|entry| (entry.id, entry.task))
                .collect(),
            dependencies: self.dependencies,
        }
    }
}
