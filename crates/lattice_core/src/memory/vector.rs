//! # Shared Vector
//!
//! A numeric buffer plus orientation tag behind one reader/writer lock.
//!
//! ## Lock Order
//!
//! Any operation that touches two vectors locks the receiver first and the
//! argument second:
//!
//! ```text
//!   add:          self.write  ->  other.read
//!   dot:          self.read   ->  other.read
//!   mat_mul_into: self.read   ->  column.read (each)   then   self.write
//! ```
//!
//! Two threads running `a.add(&b)` and `b.add(&a)` at the same time can still
//! deadlock. Callers that need symmetric cross-updates must order them.

use std::ptr;

use parking_lot::{RwLock, RwLockReadGuard};

use super::matrix::SharedMatrix;
use super::Orientation;
use crate::error::{MemoryError, MemoryResult};

/// Lock-protected contents of a [`SharedVector`].
#[derive(Debug)]
pub(crate) struct VectorData {
    pub(crate) values: Vec<f64>,
    pub(crate) orientation: Orientation,
}

/// A vector that many threads may read and mutate concurrently.
///
/// All methods take `&self`; exclusivity is provided by the internal lock.
/// The buffer length only changes when [`SharedVector::mat_mul_into`] swaps in
/// a freshly computed buffer.
#[derive(Debug)]
pub struct SharedVector {
    data: RwLock<VectorData>,
}

impl SharedVector {
    /// Creates a vector that owns `values`.
    #[must_use]
    pub fn new(values: Vec<f64>, orientation: Orientation) -> Self {
        Self {
            data: RwLock::new(VectorData { values, orientation }),
        }
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::IndexOutOfBounds`] past the end.
    pub fn get(&self, index: usize) -> MemoryResult<f64> {
        let data = self.data.read();
        data.values
            .get(index)
            .copied()
            .ok_or(MemoryError::IndexOutOfBounds {
                index,
                len: data.values.len(),
            })
    }

    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().values.len()
    }

    /// Returns true if the vector has no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().values.is_empty()
    }

    /// Returns the current orientation.
    #[inline]
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.data.read().orientation
    }

    /// Copies the buffer out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.read().values.clone()
    }

    /// Flips the orientation in place. No data moves.
    pub fn transpose(&self) {
        let mut data = self.data.write();
        data.orientation = data.orientation.flipped();
    }

    /// Adds `other` element-wise into `self`.
    ///
    /// # Errors
    ///
    /// Fails if the lengths or the orientations differ. `self` is untouched on
    /// failure.
    pub fn add(&self, other: &SharedVector) -> MemoryResult<()> {
        if ptr::eq(self, other) {
            let mut data = self.data.write();
            for value in &mut data.values {
                *value += *value;
            }
            return Ok(());
        }

        let mut this = self.data.write();
        let that = other.data.read();

        if this.values.len() != that.values.len() {
            return Err(MemoryError::LengthMismatch {
                left: this.values.len(),
                right: that.values.len(),
            });
        }
        if this.orientation != that.orientation {
            return Err(MemoryError::OrientationMismatch {
                expected: this.orientation,
                found: that.orientation,
            });
        }

        for (lhs, rhs) in this.values.iter_mut().zip(&that.values) {
            *lhs += rhs;
        }
        Ok(())
    }

    /// Flips the sign of every element.
    pub fn negate(&self) {
        let mut data = self.data.write();
        for value in &mut data.values {
            *value = -*value;
        }
    }

    /// Scalar product of a row (`self`) with a column (`other`).
    ///
    /// # Errors
    ///
    /// Fails unless `self` is row-major, `other` is column-major and both have
    /// the same length.
    pub fn dot(&self, other: &SharedVector) -> MemoryResult<f64> {
        let this = self.data.read();
        if ptr::eq(self, other) {
            return dot_locked(&this, &this);
        }
        let that = other.data.read();
        dot_locked(&this, &that)
    }

    /// Replaces `self` with `self × matrix`.
    ///
    /// `matrix` must be stored column-major; the result has one element per
    /// column. The products are computed under reader locks and the new
    /// buffer is installed afterwards under a short writer lock, so a writer
    /// racing between the two phases can be overwritten.
    ///
    /// # Errors
    ///
    /// Fails if `matrix` is empty or row-major, if `self` is not row-major, or
    /// if `self.len()` differs from the matrix's row count.
    pub fn mat_mul_into(&self, matrix: &SharedMatrix) -> MemoryResult<()> {
        let columns = matrix.snapshot();
        let first = columns.first().ok_or(MemoryError::EmptyMatrix)?;

        let first_orientation = first.orientation();
        if first_orientation != Orientation::ColumnMajor {
            return Err(MemoryError::OrientationMismatch {
                expected: Orientation::ColumnMajor,
                found: first_orientation,
            });
        }

        let result = {
            let this = self.data.read();
            if this.orientation != Orientation::RowMajor {
                return Err(MemoryError::OrientationMismatch {
                    expected: Orientation::RowMajor,
                    found: this.orientation,
                });
            }

            let mut result = Vec::with_capacity(columns.len());
            for column in columns.iter() {
                let product = if ptr::eq(column.as_ref(), self) {
                    dot_locked(&this, &this)?
                } else {
                    dot_locked(&this, &column.data.read())?
                };
                result.push(product);
            }
            result
        };

        self.data.write().values = result;
        Ok(())
    }

    /// Acquires the reader lock for matrix-wide aggregation.
    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, VectorData> {
        self.data.read()
    }
}

fn dot_locked(row: &VectorData, column: &VectorData) -> MemoryResult<f64> {
    if row.orientation != Orientation::RowMajor {
        return Err(MemoryError::OrientationMismatch {
            expected: Orientation::RowMajor,
            found: row.orientation,
        });
    }
    if column.orientation != Orientation::ColumnMajor {
        return Err(MemoryError::OrientationMismatch {
            expected: Orientation::ColumnMajor,
            found: column.orientation,
        });
    }
    if row.values.len() != column.values.len() {
        return Err(MemoryError::LengthMismatch {
            left: row.values.len(),
            right: column.values.len(),
        });
    }

    Ok(row
        .values
        .iter()
        .zip(&column.values)
        .map(|(a, b)| a * b)
        .sum())
}
