//! # Engine Error Types
//!
//! Everything that can stop a tree from resolving. Lower-layer errors are
//! wrapped as-is.

use lattice_core::MemoryError;
use lattice_scheduler::SchedulerError;
use thiserror::Error;

/// Errors that can occur while evaluating a computation tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The tree is malformed (wrong child count for an operator).
    #[error("malformed computation tree: {0}")]
    Structure(String),

    /// Operand shapes do not fit the operator.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// A vector or matrix operation failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The pool refused or failed a batch.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Unreadable or invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
