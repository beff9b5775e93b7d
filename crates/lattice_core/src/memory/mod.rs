//! # Shared Memory
//!
//! Vectors and matrices that many row tasks touch at once.
//!
//! ```text
//!   SharedMatrix
//!     └── RwLock<Arc<[Arc<SharedVector>]>>   (swapped wholesale on load)
//!            ├── SharedVector  RwLock<{values, orientation}>
//!            ├── SharedVector  RwLock<{values, orientation}>
//!            └── ...
//! ```
//!
//! A row task clones the `Arc` of the vector it works on and never touches the
//! matrix-level handle again, so a reload cannot tear a running batch.

mod matrix;
mod orientation;
mod vector;

pub use matrix::{SharedMatrix, VectorView};
pub use orientation::Orientation;
pub use vector::SharedVector;

/// Plain row-major numeric matrix, the exchange format at the crate boundary.
pub type RawMatrix = Vec<Vec<f64>>;
