//! Caller-owned task id generation.
//!
//! The executor never invents ids on its own; the id strategy is injected so
//! execution stays reproducible in tests and across harness workers.

/// Source of fresh task ids for TASK_CREATE.
pub trait IdSource {
    fn next_task_id(&mut self) -> String;
}

/// Monotonic counter source: `task_1`, `task_2`, ...
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("task_")
    }
}

impl IdSource for SequentialIds {
    fn next_task_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_deterministic() {
        let mut ids = SequentialIds::default();
        assert_eq!(ids.next_task_id(), "task_1");
        assert_eq!(ids.next_task_id(), "task_2");

        let mut custom = SequentialIds::new("node-");
        assert_eq!(custom.next_task_id(), "node-1");
    }
}
