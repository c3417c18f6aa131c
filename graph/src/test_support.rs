//! Test-only helpers for constructing graph states and operations.

use std::collections::BTreeMap;

use crate::core::types::{CreateFields, Operation};
use crate::state::{
    Dependency, DependencyStatus, Lifecycle, Priority, State, Status, Task, User,
};

/// Create a state with the given `(id, name)` users and nothing else.
pub fn state_with_users(users: &[(&str, &str)]) -> State {
    State {
        users: users
            .iter()
            .map(|(id, name)| {
                (
                    (*id).to_string(),
                    User {
                        name: (*name).to_string(),
                    },
                )
            })
            .collect(),
        tasks: BTreeMap::new(),
        dependencies: Vec::new(),
    }
}

/// Create a deterministic task with default fields, owned and created by
/// `owner`.
pub fn task(title: &str, owner: &str) -> Task {
    Task {
        title: title.to_string(),
        priority: Priority::Medium,
        status: Status::NotStarted,
        state: Lifecycle::Active,
        owner: owner.to_string(),
        created_by: owner.to_string(),
        parent: None,
        impact_size: 3,
        perceived_owner: String::new(),
        main_goal: String::new(),
        resources: String::new(),
    }
}

/// Insert a deterministic task under the given id.
pub fn add_task(state: &mut State, id: &str, title: &str, owner: &str) {
    state.tasks.insert(id.to_string(), task(title, owner));
}

/// Create a dependency record.
pub fn dependency(task: &str, depends_on: &str, status: DependencyStatus) -> Dependency {
    Dependency {
        task: task.to_string(),
        depends_on: depends_on.to_string(),
        status,
    }
}

/// Create a TASK_CREATE operation with deterministic fields.
pub fn create_op(temp_id: &str, title: &str, owner: &str) -> Operation {
    Operation::TaskCreate {
        temp_id: temp_id.to_string(),
        fields: CreateFields {
            title: title.to_string(),
            priority: Priority::Medium,
            status: Status::NotStarted,
            state: Lifecycle::Active,
            owner: owner.to_string(),
            created_by: owner.to_string(),
            parent: None,
            impact_size: 3,
            perceived_owner: String::new(),
            main_goal: String::new(),
            resources: String::new(),
        },
    }
}
