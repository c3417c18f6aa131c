//! Shared deterministic types for the executor contract.
//!
//! These types define stable contracts between core components and the wire
//! boundary. They must not depend on external state or I/O and must remain
//! deterministic across runs.

use serde::{Deserialize, Serialize};

use crate::state::{DependencyStatus, Lifecycle, Priority, Status, default_impact_size};

/// One typed edit instruction. The set is closed: unknown `op` tags and
/// missing required fields are rejected where the JSON is decoded, never
/// inside the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Operation {
    /// Allocate a new task id, bind `temp_id` to it for the rest of the
    /// operation list, and insert the task built from `fields`.
    #[serde(rename = "TASK_CREATE")]
    TaskCreate {
        temp_id: String,
        fields: CreateFields,
    },
    /// Merge `patch` into the task addressed by `id` (real or temp).
    #[serde(rename = "TASK_UPDATE")]
    TaskUpdate { id: String, patch: UpdatePatch },
    /// Set or clear (`parent: null`) the parent edge of `child`.
    #[serde(rename = "SET_PARENT")]
    SetParent {
        child: String,
        #[serde(default)]
        parent: Option<String>,
    },
    /// Upsert the dependency record for the ordered pair.
    #[serde(rename = "SET_DEPENDENCY")]
    SetDependency {
        task: String,
        depends_on: String,
        status: DependencyStatus,
    },
    /// Remove a task with no children and no PROPOSED/CONFIRMED dependency
    /// touching it in either direction.
    #[serde(rename = "TASK_DELETE")]
    TaskDelete { id: String },
}

/// TASK_CREATE payload. Only `title` is required; the defaults are the same
/// ones an externally-supplied partial task gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFields {
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

/// TASK_UPDATE payload: absent fields are left untouched. `parent` is not
/// patchable; parent edges change only through SET_PARENT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Lifecycle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perceived_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_goal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<String>,
}

/// Per-operation outcome log. Ops after a structural failure never execute
/// and have no entry.
pub type ExecutionLog = Vec<OpRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpRecord {
    pub op_index: usize,
    pub outcome: OpOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OpError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpOutcome {
    Applied,
    Skipped,
}

/// Why an operation was skipped. `MalformedOperation` is the structural case
/// recorded by the wire boundary; everything after it is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum OpError {
    DuplicateTitle { title: String },
    UnknownReference { field: String, id: String },
    InvalidEnumValue { field: String, value: String },
    SelfDependency { id: String },
    BlockedDelete { id: String },
    MalformedOperation { message: String },
}

impl OpError {
    /// Stable kind tag, matching the serialized `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            OpError::DuplicateTitle { .. } => "DuplicateTitle",
            OpError::UnknownReference { .. } => "UnknownReference",
            OpError::InvalidEnumValue { .. } => "InvalidEnumValue",
            OpError::SelfDependency { .. } => "SelfDependency",
            OpError::BlockedDelete { .. } => "BlockedDelete",
            OpError::MalformedOperation { .. } => "MalformedOperation",
        }
    }
}

/// Executor knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub policy: ErrorPolicy,
}

/// What to do with an operation that fails semantically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Record the failure and keep executing the rest of the list.
    #[default]
    SkipAndLog,
    /// Record the failure and stop; already-applied operations are kept.
    Strict,
}
