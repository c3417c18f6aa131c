use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A task-graph state: users, tasks keyed by id, and dependency records.
///
/// States are plain values. Mutation goes through [`crate::core::executor::apply`],
/// which returns a new state and never touches its input.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct State {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub name: String,
}

/// A task record. The map key in [`State::tasks`] is the task id; `title` is
/// the human-facing identity and must be unique across a legal state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub state: Lifecycle,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "default_impact_size")]
    pub impact_size: i64,
    #[serde(default)]
    pub perceived_owner: String,
    #[serde(default)]
    pub main_goal: String,
    #[serde(default)]
    pub resources: String,
}

/// "`task` depends on `depends_on`". At most one record exists per ordered
/// pair in executor-produced states; setting the pair again replaces `status`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependency {
    pub task: String,
    pub depends_on: String,
    pub status: DependencyStatus,
}

pub(crate) fn default_impact_size() -> i64 {
    3
}

/// Task priority. The trailing variant preserves undeclared values from
/// externally-produced states so the validator can report them instead of the
/// parser rejecting the whole state.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    #[default]
    #[serde(rename = "Not started")]
    NotStarted,
    #[serde(rename = "In progress")]
    InProgress,
    Blocked,
    Done,
    #[serde(untagged)]
    Unknown(String),
}

/// Task lifecycle state (the wire field is named `state`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lifecycle {
    #[default]
    Draft,
    Active,
    Rejected,
    Archived,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyStatus {
    Proposed,
    Confirmed,
    Rejected,
    Removed,
    #[serde(untagged)]
    Unknown(String),
}

impl Priority {
    /// Wire spelling of the value, including undeclared ones.
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::Unknown(value) => value,
        }
    }
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::NotStarted => "Not started",
            Status::InProgress => "In progress",
            Status::Blocked => "Blocked",
            Status::Done => "Done",
            Status::Unknown(value) => value,
        }
    }
}

impl Lifecycle {
    pub fn as_str(&self) -> &str {
        match self {
            Lifecycle::Draft => "DRAFT",
            Lifecycle::Active => "ACTIVE",
            Lifecycle::Rejected => "REJECTED",
            Lifecycle::Archived => "ARCHIVED",
            Lifecycle::Unknown(value) => value,
        }
    }
}

impl DependencyStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DependencyStatus::Proposed => "PROPOSED",
            DependencyStatus::Confirmed => "CONFIRMED",
            DependencyStatus::Rejected => "REJECTED",
            DependencyStatus::Removed => "REMOVED",
            DependencyStatus::Unknown(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Declared enum values round-trip through their wire spellings.
    #[test]
    fn enums_use_wire_spellings() {
        let status: Status = serde_json::from_str("\"Not started\"").expect("status");
        assert_eq!(status, Status::NotStarted);
        assert_eq!(serde_json::to_string(&status).expect("json"), "\"Not started\"");

        let lifecycle: Lifecycle = serde_json::from_str("\"ARCHIVED\"").expect("lifecycle");
        assert_eq!(lifecycle, Lifecycle::Archived);

        let dep: DependencyStatus = serde_json::from_str("\"CONFIRMED\"").expect("dep status");
        assert_eq!(dep, DependencyStatus::Confirmed);
    }

    /// Undeclared enum values are preserved rather than rejected.
    #[test]
    fn undeclared_enum_values_are_preserved() {
        let priority: Priority = serde_json::from_str("\"Urgent\"").expect("priority");
        assert_eq!(priority, Priority::Unknown("Urgent".to_string()));
        assert_eq!(priority.as_str(), "Urgent");
        assert_eq!(serde_json::to_string(&priority).expect("json"), "\"Urgent\"");
    }

    /// Optional task fields fall back to the documented defaults.
    #[test]
    fn task_fields_default() {
        let task: Task = serde_json::from_str(r#"{"title": "Design API"}"#).expect("task");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::NotStarted);
        assert_eq!(task.state, Lifecycle::Draft);
        assert_eq!(task.parent, None);
        assert_eq!(task.impact_size, 3);
        assert_eq!(task.owner, "");
        assert_eq!(task.resources, "");
    }
}
