//! # Lattice Core
//!
//! Shared, lock-guarded numeric memory for the lattice evaluation engine.
//!
//! ## Locking Rules
//!
//! 1. **One lock per vector** - every [`SharedVector`] owns a reader/writer lock
//! 2. **Self before other** - a two-vector operation write-locks (or read-locks) the
//!    receiver first, then read-locks the argument
//! 3. **Swap, don't mutate** - a [`SharedMatrix`] reload installs a fresh vector
//!    sequence; holders of the old sequence keep a consistent snapshot
//!
//! ## Example
//!
//! ```rust,ignore
//! use lattice_core::{Orientation, SharedMatrix, SharedVector};
//!
//! let row = SharedVector::new(vec![1.0, 2.0], Orientation::RowMajor);
//! let rhs = SharedMatrix::new();
//! rhs.load_column_major(&[vec![1.0, 0.0], vec![0.0, 1.0]])?;
//! row.mat_mul_into(&rhs)?;
//! assert_eq!(row.to_vec(), vec![1.0, 2.0]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;

pub use error::{MemoryError, MemoryResult};
pub use memory::{Orientation, RawMatrix, SharedMatrix, SharedVector, VectorView};
