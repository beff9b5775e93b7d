//! # Memory Error Types
//!
//! Shape and orientation failures raised by shared vectors and matrices.

use thiserror::Error;

use crate::memory::Orientation;

/// Errors that can occur while reading or mutating shared memory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Element or vector index past the end.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The length that was indexed.
        len: usize,
    },

    /// Two operands that must agree in length do not.
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Length of the receiving operand.
        left: usize,
        /// Length of the other operand.
        right: usize,
    },

    /// An operand carries the wrong orientation for the operation.
    #[error("orientation mismatch: expected {expected}, found {found}")]
    OrientationMismatch {
        /// Orientation the operation requires.
        expected: Orientation,
        /// Orientation the operand actually has.
        found: Orientation,
    },

    /// The operation needs at least one vector.
    #[error("matrix is empty")]
    EmptyMatrix,

    /// Input rows (or stored vectors) are not all the same length.
    #[error("ragged matrix: row {row} has length {found}, expected {expected}")]
    RaggedMatrix {
        /// Offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        found: usize,
    },

    /// Vectors of one matrix disagree on their orientation.
    #[error("matrix vectors disagree on orientation")]
    MixedOrientation,
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
