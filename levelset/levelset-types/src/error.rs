//! Error types for grid construction.

use thiserror::Error;

/// Result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;

/// Errors that can occur when building grids and fields.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GridError {
    /// At least one grid dimension is zero.
    #[error("invalid grid dimensions: {nx}x{ny}x{nz}")]
    InvalidDimensions {
        /// Voxels along x.
        nx: usize,
        /// Voxels along y.
        ny: usize,
        /// Voxels along z.
        nz: usize,
    },

    /// A spacing component is zero, negative, or not finite.
    #[error("voxel spacing must be positive and finite, got {0} on axis {1}")]
    InvalidSpacing(f64, usize),

    /// The direction (orientation) matrix is not finite or not invertible.
    #[error("direction matrix must be finite and invertible")]
    InvalidDirection,

    /// A value buffer does not match the number of voxels.
    #[error("buffer holds {actual} values but the grid has {expected} voxels")]
    SizeMismatch {
        /// Number of voxels in the grid.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
}
