//! # Shared Matrix
//!
//! An ordered set of [`SharedVector`]s that all share one orientation.
//!
//! The vector sequence sits behind an `Arc` that is replaced wholesale on
//! every load, never edited slot by slot. A reader that cloned the old handle
//! keeps a consistent snapshot while a new sequence is installed.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{Orientation, RawMatrix, SharedVector};
use crate::error::{MemoryError, MemoryResult};

/// Immutable list of vectors swapped in by a load.
type Vectors = Arc<[Arc<SharedVector>]>;

/// Read-only view of one vector while its reader lock is held.
#[derive(Clone, Copy, Debug)]
pub struct VectorView<'a> {
    /// The locked buffer.
    pub values: &'a [f64],
    /// Orientation at the time the lock was taken.
    pub orientation: Orientation,
}

/// A matrix whose rows (or columns) can be worked on by independent threads.
#[derive(Debug)]
pub struct SharedMatrix {
    vectors: RwLock<Vectors>,
}

impl SharedMatrix {
    /// Creates an empty matrix.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Creates a row-major matrix from `rows`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::RaggedMatrix`] if the rows differ in length.
    pub fn from_rows(rows: &[Vec<f64>]) -> MemoryResult<Self> {
        let matrix = Self::new();
        matrix.load_row_major(rows)?;
        Ok(matrix)
    }

    /// Replaces the contents with one row vector per input row.
    ///
    /// The input is copied; the matrix never aliases the caller's storage.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::RaggedMatrix`] if the rows differ in length. The
    /// previous contents stay in place on failure.
    pub fn load_row_major(&self, rows: &[Vec<f64>]) -> MemoryResult<()> {
        check_rectangular(rows)?;

        let vectors: Vectors = rows
            .iter()
            .map(|row| Arc::new(SharedVector::new(row.clone(), Orientation::RowMajor)))
            .collect();
        self.install(vectors);
        Ok(())
    }

    /// Replaces the contents with one column vector per input column.
    ///
    /// `rows` is given row-major and transposed during the load. Zero-width
    /// rows produce no column vectors, so the row count is lost and
    /// [`SharedMatrix::shape`] reports `(0, 0)`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::RaggedMatrix`] if the rows differ in length.
    pub fn load_column_major(&self, rows: &[Vec<f64>]) -> MemoryResult<()> {
        let width = check_rectangular(rows)?;

        let vectors: Vectors = (0..width)
            .map(|col| {
                let column = rows.iter().map(|row| row[col]).collect();
                Arc::new(SharedVector::new(column, Orientation::ColumnMajor))
            })
            .collect();
        self.install(vectors);
        Ok(())
    }

    /// Materializes the matrix as plain rows, whatever its storage orientation.
    ///
    /// Every vector is reader-locked for the duration of the copy. An empty
    /// matrix yields an empty result.
    ///
    /// # Errors
    ///
    /// Fails if the vectors disagree on orientation or length, which only
    /// happens when a batch left the matrix half-updated.
    pub fn read_row_major(&self) -> MemoryResult<RawMatrix> {
        self.with_read_locks(|views| {
            let Some(first) = views.first() else {
                return Ok(Vec::new());
            };
            let orientation = first.orientation;
            let width = first.values.len();

            for (row, view) in views.iter().enumerate() {
                if view.orientation != orientation {
                    return Err(MemoryError::MixedOrientation);
                }
                if view.values.len() != width {
                    return Err(MemoryError::RaggedMatrix {
                        row,
                        expected: width,
                        found: view.values.len(),
                    });
                }
            }

            Ok(match orientation {
                Orientation::RowMajor => views.iter().map(|view| view.values.to_vec()).collect(),
                Orientation::ColumnMajor => (0..width)
                    .map(|row| views.iter().map(|view| view.values[row]).collect())
                    .collect(),
            })
        })
    }

    /// Runs `f` while holding the reader lock of every vector.
    ///
    /// Locks are taken in sequence order and released in the same order.
    pub fn with_read_locks<R>(&self, f: impl FnOnce(&[VectorView<'_>]) -> R) -> R {
        let vectors = self.snapshot();
        let guards: Vec<_> = vectors.iter().map(|vector| vector.read_guard()).collect();
        let views: Vec<VectorView<'_>> = guards
            .iter()
            .map(|guard| VectorView {
                values: &guard.values,
                orientation: guard.orientation,
            })
            .collect();
        f(&views)
    }

    /// Returns the vector at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::IndexOutOfBounds`] past the end.
    pub fn get(&self, index: usize) -> MemoryResult<Arc<SharedVector>> {
        let vectors = self.snapshot();
        vectors
            .get(index)
            .cloned()
            .ok_or(MemoryError::IndexOutOfBounds {
                index,
                len: vectors.len(),
            })
    }

    /// Returns the number of stored vectors.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    /// Returns true if no vectors are stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }

    /// Returns the orientation of the stored vectors.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::EmptyMatrix`]; an empty matrix has no orientation.
    pub fn orientation(&self) -> MemoryResult<Orientation> {
        self.snapshot()
            .first()
            .map(|vector| vector.orientation())
            .ok_or(MemoryError::EmptyMatrix)
    }

    /// Returns `(rows, cols)` of the logical row-major view.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.with_read_locks(|views| match views.first() {
            None => (0, 0),
            Some(first) => match first.orientation {
                Orientation::RowMajor => (views.len(), first.values.len()),
                Orientation::ColumnMajor => (first.values.len(), views.len()),
            },
        })
    }

    /// Clones the current vector handle.
    pub(crate) fn snapshot(&self) -> Vectors {
        Arc::clone(&self.vectors.read())
    }

    fn install(&self, vectors: Vectors) {
        *self.vectors.write() = vectors;
    }
}

impl Default for SharedMatrix {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks that every row has the first row's length and returns that length.
fn check_rectangular(rows: &[Vec<f64>]) -> MemoryResult<usize> {
    let width = rows.first().map_or(0, Vec::len);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != width {
            return Err(MemoryError::RaggedMatrix {
                row,
                expected: width,
                found: values.len(),
            });
        }
    }
    Ok(width)
}
