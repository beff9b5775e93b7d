//! # Scheduler Error Types

use thiserror::Error;

use crate::worker::RejectReason;

/// Errors that can occur while configuring or driving the pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Bad pool parameters (zero workers, unusable fatigue range).
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The popped idle worker refused the task.
    #[error("worker {worker} rejected the task: {reason}")]
    WorkerUnavailable {
        /// Id of the worker that refused.
        worker: usize,
        /// Why it refused.
        reason: RejectReason,
    },

    /// No worker is left to run tasks.
    #[error("pool has been shut down")]
    ShutDown,

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    /// The batch ran to completion but some task bodies failed.
    #[error("{failed} task(s) failed, first failure: {first}")]
    TaskFailed {
        /// Number of failed tasks.
        failed: usize,
        /// Message of the first recorded failure.
        first: String,
    },
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
