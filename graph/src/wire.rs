//! JSON boundary: schema-checked state parsing and tolerant operation-list
//! decoding.
//!
//! This is the crate's only fallible surface. States are checked against an
//! embedded JSON Schema before typed deserialization; operation lists are
//! decoded element-wise so one malformed element still yields the
//! well-formed prefix plus a positioned structural error.

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;

use crate::core::canonical::canonicalize;
use crate::core::executor::apply;
use crate::core::ids::IdSource;
use crate::core::types::{
    ApplyOptions, ExecutionLog, OpError, OpOutcome, OpRecord, Operation,
};
use crate::state::State;

const STATE_SCHEMA: &str = include_str!("../schemas/state/v1.schema.json");

/// Parse and schema-check a state document.
pub fn parse_state(contents: &str) -> Result<State> {
    let value: Value = serde_json::from_str(contents).context("parse state json")?;
    parse_state_value(&value)
}

pub fn parse_state_value(value: &Value) -> Result<State> {
    validate_schema(value)?;
    let state: State = serde_json::from_value(value.clone()).context("deserialize state")?;
    Ok(state)
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(STATE_SCHEMA).context("parse embedded state schema")?;
    let compiled =
        validator_for(&schema).map_err(|err| anyhow!("invalid embedded schema: {err}"))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "state schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Result of decoding an operation list: the well-formed prefix plus the
/// structural error that truncated it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOperations {
    pub ops: Vec<Operation>,
    pub malformed: Option<MalformedOp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedOp {
    pub index: usize,
    pub message: String,
}

pub fn parse_operations(contents: &str) -> Result<ParsedOperations> {
    let value: Value = serde_json::from_str(contents).context("parse operations json")?;
    parse_operations_value(&value)
}

/// Decode an operation list from either accepted form: a bare array or an
/// object with an `ops` array.
pub fn parse_operations_value(value: &Value) -> Result<ParsedOperations> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("ops") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(other) => {
                return Err(anyhow!("\"ops\" must be an array, got {}", json_type(other)));
            }
            None => {
                return Err(anyhow!(
                    "operation list must be an array or an object with an \"ops\" array"
                ));
            }
        },
        other => {
            return Err(anyhow!(
                "operation list must be an array or an object with an \"ops\" array, got {}",
                json_type(other)
            ));
        }
    };

    let mut ops = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value::<Operation>(item.clone()) {
            Ok(op) => ops.push(op),
            Err(err) => {
                return Ok(ParsedOperations {
                    ops,
                    malformed: Some(MalformedOp {
                        index,
                        message: err.to_string(),
                    }),
                });
            }
        }
    }
    Ok(ParsedOperations {
        ops,
        malformed: None,
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse an operation list and apply it.
///
/// The well-formed prefix executes; a malformed element is logged as
/// `Skipped` with kind `MalformedOperation` and everything after it is
/// dropped without a log entry (it never executed).
pub fn apply_value<I: IdSource>(
    state: &State,
    ops: &Value,
    ids: &mut I,
    options: &ApplyOptions,
) -> Result<(State, ExecutionLog)> {
    let parsed = parse_operations_value(ops)?;
    let (next, mut log) = apply(state, &parsed.ops, ids, options);
    if let Some(malformed) = parsed.malformed {
        log.push(OpRecord {
            op_index: malformed.index,
            outcome: OpOutcome::Skipped,
            error: Some(OpError::MalformedOperation {
                message: malformed.message,
            }),
        });
    }
    Ok((next, log))
}

pub fn state_to_value(state: &State) -> Result<Value> {
    serde_json::to_value(state).context("serialize state")
}

/// Canonical (sorted, deduped) serialization of a state in the wire shape.
pub fn canonical_to_value(state: &State) -> Result<Value> {
    serde_json::to_value(canonicalize(state).into_state()).context("serialize canonical state")
}
