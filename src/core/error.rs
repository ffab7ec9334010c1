use thiserror::Error;

use super::state::{Pid, Ticks};

/// Errors fall into two disjoint classes: input validation failures, rejected
/// before any simulation state is created, and internal simulation faults,
/// which are unreachable for any input that passed validation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("no processes supplied")]
    EmptyProcessSet,
    #[error("process {pid} has a zero burst time")]
    ZeroBurst { pid: Pid },
    #[error("duplicate pid {pid}")]
    DuplicatePid { pid: Pid },
    #[error("round robin quantum must be positive")]
    ZeroQuantum,
    #[error("classification threshold must be positive and finite, got {value}")]
    InvalidThreshold { value: f64 },
    #[error("multi-core run requires at least one core")]
    ZeroCores,
    #[error("simulation exceeded its time bound at t={now} (limit {limit})")]
    TimeBoundExceeded { now: Ticks, limit: Ticks },
}

impl SimError {
    /// True for caller-visible validation failures; false for faults that
    /// indicate a validation gap (a programming-contract violation, not a
    /// retryable condition).
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::TimeBoundExceeded { .. })
    }
}
