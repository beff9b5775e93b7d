//! Row/column tag carried by every shared vector.

use std::fmt;

/// Whether a vector holds one row or one column of its matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// The vector is a row.
    RowMajor,
    /// The vector is a column.
    ColumnMajor,
}

impl Orientation {
    /// Returns the opposite orientation.
    #[inline]
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::RowMajor => Self::ColumnMajor,
            Self::ColumnMajor => Self::RowMajor,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowMajor => f.write_str("ROW_MAJOR"),
            Self::ColumnMajor => f.write_str("COLUMN_MAJOR"),
        }
    }
}
