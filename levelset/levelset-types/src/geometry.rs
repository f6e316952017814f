//! Grid geometry and voxel indexing.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::error::{GridError, GridResult};

/// A discrete voxel position on a grid.
///
/// # Example
///
/// ```
/// use levelset_types::VoxelIndex;
///
/// let index = VoxelIndex::new(1, 2, 3);
/// assert_eq!(index.axis(1), 2);
/// assert_eq!(index.as_tuple(), (1, 2, 3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelIndex {
    /// Column (x axis).
    pub x: usize,
    /// Row (y axis).
    pub y: usize,
    /// Slice (z axis).
    pub z: usize,
}

impl VoxelIndex {
    /// Creates a new voxel index.
    #[must_use]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Returns the index as a tuple.
    #[must_use]
    pub const fn as_tuple(self) -> (usize, usize, usize) {
        (self.x, self.y, self.z)
    }

    /// Returns the component along `axis` (0 = x, 1 = y, anything else = z).
    #[must_use]
    pub const fn axis(self, axis: usize) -> usize {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl From<(usize, usize, usize)> for VoxelIndex {
    fn from((x, y, z): (usize, usize, usize)) -> Self {
        Self::new(x, y, z)
    }
}

/// Geometry of a regular voxel grid.
///
/// Holds the voxel counts, physical spacing, origin and orientation of an
/// image grid. Values are stored x-fastest, so the linear index of
/// `(x, y, z)` is `x + y * nx + z * nx * ny`.
///
/// Two-dimensional images use `nz = 1`; axes of length one contribute
/// nothing to finite differences.
///
/// # Example
///
/// ```
/// use levelset_types::{GridGeometry, VoxelIndex};
///
/// let grid = GridGeometry::isotropic((4, 3, 2), 0.5).unwrap();
/// assert_eq!(grid.len(), 24);
///
/// let linear = grid.linear_index(VoxelIndex::new(1, 2, 1));
/// assert_eq!(linear, 1 + 2 * 4 + 12);
/// assert_eq!(grid.voxel_index(linear), VoxelIndex::new(1, 2, 1));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridGeometry {
    dimensions: (usize, usize, usize),
    spacing: Vector3<f64>,
    origin: Point3<f64>,
    direction: Matrix3<f64>,
}

impl GridGeometry {
    /// Creates a grid with the given dimensions and per-axis spacing.
    ///
    /// The origin is placed at zero and the orientation is the identity.
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension is zero or any spacing component
    /// is not a positive finite number.
    pub fn new(dimensions: (usize, usize, usize), spacing: Vector3<f64>) -> GridResult<Self> {
        let (nx, ny, nz) = dimensions;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(GridError::InvalidDimensions { nx, ny, nz });
        }
        for (axis, &h) in spacing.iter().enumerate() {
            if !h.is_finite() || h <= 0.0 {
                return Err(GridError::InvalidSpacing(h, axis));
            }
        }

        Ok(Self {
            dimensions,
            spacing,
            origin: Point3::origin(),
            direction: Matrix3::identity(),
        })
    }

    /// Creates a grid with the same spacing on every axis.
    ///
    /// # Errors
    ///
    /// Same as [`GridGeometry::new`].
    pub fn isotropic(dimensions: (usize, usize, usize), spacing: f64) -> GridResult<Self> {
        Self::new(dimensions, Vector3::repeat(spacing))
    }

    /// Creates a 2-D grid (`nz = 1`) with unit spacing.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    pub fn planar(nx: usize, ny: usize) -> GridResult<Self> {
        Self::isotropic((nx, ny, 1), 1.0)
    }

    /// Sets the physical position of voxel `(0, 0, 0)`.
    #[must_use]
    pub const fn with_origin(mut self, origin: Point3<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the orientation. Column `a` is the physical direction of index axis `a`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidDirection`] if the matrix has non-finite
    /// entries or is singular.
    pub fn with_direction(mut self, direction: Matrix3<f64>) -> GridResult<Self> {
        if direction.iter().any(|v| !v.is_finite()) || direction.determinant().abs() < 1e-12 {
            return Err(GridError::InvalidDirection);
        }
        self.direction = direction;
        Ok(self)
    }

    /// Voxel counts `(nx, ny, nz)`.
    #[must_use]
    pub const fn dimensions(&self) -> (usize, usize, usize) {
        self.dimensions
    }

    /// Physical spacing between voxel centers along each axis.
    #[must_use]
    pub const fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    /// Physical position of voxel `(0, 0, 0)`.
    #[must_use]
    pub const fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Orientation matrix.
    #[must_use]
    pub const fn direction(&self) -> Matrix3<f64> {
        self.direction
    }

    /// Number of voxels along `axis`.
    #[must_use]
    pub const fn axis_len(&self, axis: usize) -> usize {
        match axis {
            0 => self.dimensions.0,
            1 => self.dimensions.1,
            _ => self.dimensions.2,
        }
    }

    /// Total number of voxels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.dimensions.0 * self.dimensions.1 * self.dimensions.2
    }

    /// Always false for a validated grid.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Axes along which the grid has more than one voxel.
    pub fn active_axes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..3).filter(|&axis| self.axis_len(axis) > 1)
    }

    /// Smallest spacing over the active axes (all axes for a single voxel).
    #[must_use]
    pub fn min_spacing(&self) -> f64 {
        self.active_axes()
            .map(|axis| self.spacing[axis])
            .reduce(f64::min)
            .unwrap_or_else(|| self.spacing.min())
    }

    /// Linear offset between neighbors along `axis`.
    #[must_use]
    pub const fn stride(&self, axis: usize) -> usize {
        match axis {
            0 => 1,
            1 => self.dimensions.0,
            _ => self.dimensions.0 * self.dimensions.1,
        }
    }

    /// Whether `index` lies inside the grid.
    #[must_use]
    pub const fn contains(&self, index: VoxelIndex) -> bool {
        index.x < self.dimensions.0 && index.y < self.dimensions.1 && index.z < self.dimensions.2
    }

    /// Converts a voxel index to a linear offset.
    #[must_use]
    pub const fn linear_index(&self, index: VoxelIndex) -> usize {
        index.x + index.y * self.dimensions.0 + index.z * self.dimensions.0 * self.dimensions.1
    }

    /// Converts a linear offset back to a voxel index.
    #[must_use]
    pub const fn voxel_index(&self, linear: usize) -> VoxelIndex {
        let (nx, ny, _) = self.dimensions;
        VoxelIndex::new(linear % nx, (linear / nx) % ny, linear / (nx * ny))
    }

    /// Linear offset of the neighbor `step` voxels away along `axis`.
    ///
    /// Positions past the border are clamped to the border voxel, which gives
    /// zero-flux (Neumann) behavior in finite differences.
    #[must_use]
    pub fn neighbor(&self, linear: usize, axis: usize, step: isize) -> usize {
        let coord = self.voxel_index(linear).axis(axis);
        let last = self.axis_len(axis) - 1;
        let target = coord.saturating_add_signed(step).min(last);
        if target >= coord {
            linear + (target - coord) * self.stride(axis)
        } else {
            linear - (coord - target) * self.stride(axis)
        }
    }

    /// Linear offsets of the face-connected neighbors that exist inside the grid.
    pub fn face_neighbors(&self, linear: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let index = self.voxel_index(linear);
        (0..3).flat_map(move |axis| {
            let coord = index.axis(axis);
            let stride = self.stride(axis);
            let below = (coord > 0).then(|| (axis, linear - stride));
            let above = (coord + 1 < self.axis_len(axis)).then(|| (axis, linear + stride));
            below.into_iter().chain(above)
        })
    }

    /// Physical position of a voxel center.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn physical_point(&self, index: VoxelIndex) -> Point3<f64> {
        self.continuous_point(Vector3::new(
            index.x as f64,
            index.y as f64,
            index.z as f64,
        ))
    }

    /// Physical position of a continuous (sub-voxel) index.
    #[must_use]
    pub fn continuous_point(&self, index: Vector3<f64>) -> Point3<f64> {
        self.origin + self.direction * index.component_mul(&self.spacing)
    }

    /// Projects a physical-space vector onto the index axes.
    #[must_use]
    pub fn to_index_frame(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.direction.transpose() * vector
    }
}
