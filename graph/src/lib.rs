//! Task-graph mutation, legality checking, and comparison.
//!
//! This crate is the grading core of a task-graph editing harness: it applies
//! model-emitted edit operations to a graph state, checks structural
//! invariants over any state, and scores a produced state against a target
//! by task title, independent of internal ids. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (execution, legality,
//!   canonicalization, comparison). No I/O, never fails, fully testable in
//!   isolation.
//! - **[`wire`]**: The JSON boundary (schema checks, tolerant operation-list
//!   decoding). The only fallible surface.
//!
//! Every call is independent, deterministic, and leaves its inputs
//! untouched, so a batch harness may drive the crate from any number of
//! workers without locking.

pub mod core;
pub mod logging;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod wire;
