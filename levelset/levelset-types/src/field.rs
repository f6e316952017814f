//! Scalar field over a voxel grid.

use nalgebra::{Point3, Vector3};

use crate::error::{GridError, GridResult};
use crate::geometry::{GridGeometry, VoxelIndex};

/// One real value per voxel of a grid.
///
/// Level-set fields follow the negative-inside convention: values below
/// zero are inside the contour, values above zero are outside and the
/// contour itself is the zero crossing.
///
/// # Example
///
/// ```
/// use levelset_types::{GridGeometry, ScalarField, VoxelIndex};
///
/// let grid = GridGeometry::planar(8, 8).unwrap();
/// let field = ScalarField::from_fn(grid, |p| (p.x - 3.5).abs() - 2.0);
///
/// assert!(field.at(VoxelIndex::new(3, 0, 0)).unwrap() < 0.0);
/// assert_eq!(field.to_mask(0.0).iter().filter(|&&inside| inside).count(), 4 * 8);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalarField {
    geometry: GridGeometry,
    values: Vec<f64>,
}

impl ScalarField {
    /// Creates a zero-filled field.
    #[must_use]
    pub fn new(geometry: GridGeometry) -> Self {
        Self::filled(geometry, 0.0)
    }

    /// Creates a field with every voxel set to `value`.
    #[must_use]
    pub fn filled(geometry: GridGeometry, value: f64) -> Self {
        let values = vec![value; geometry.len()];
        Self { geometry, values }
    }

    /// Wraps an existing buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::SizeMismatch`] if the buffer length differs from
    /// the voxel count.
    pub fn from_values(geometry: GridGeometry, values: Vec<f64>) -> GridResult<Self> {
        if values.len() != geometry.len() {
            return Err(GridError::SizeMismatch {
                expected: geometry.len(),
                actual: values.len(),
            });
        }
        Ok(Self { geometry, values })
    }

    /// Samples a function of the physical voxel position.
    #[must_use]
    pub fn from_fn(geometry: GridGeometry, mut f: impl FnMut(Point3<f64>) -> f64) -> Self {
        let values = (0..geometry.len())
            .map(|linear| f(geometry.physical_point(geometry.voxel_index(linear))))
            .collect();
        Self { geometry, values }
    }

    /// Grid the field is defined on.
    #[must_use]
    pub const fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Values in linear (x-fastest) order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the values in linear order.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Number of voxels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the field holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a voxel, or `None` outside the grid.
    #[must_use]
    pub fn at(&self, index: VoxelIndex) -> Option<f64> {
        self.geometry
            .contains(index)
            .then(|| self.values[self.geometry.linear_index(index)])
    }

    /// Sets the value at a voxel. Does nothing outside the grid.
    pub fn set(&mut self, index: VoxelIndex, value: f64) {
        if self.geometry.contains(index) {
            let linear = self.geometry.linear_index(index);
            self.values[linear] = value;
        }
    }

    /// Binary mask of voxels with `value <= threshold`.
    #[must_use]
    pub fn to_mask(&self, threshold: f64) -> Vec<bool> {
        self.values.iter().map(|&v| v <= threshold).collect()
    }

    /// Number of voxels inside the zero level set.
    #[must_use]
    pub fn inside_count(&self) -> usize {
        self.values.iter().filter(|&&v| v <= 0.0).count()
    }

    /// Largest absolute difference to another field on the same grid.
    ///
    /// Returns `None` if the grids differ.
    #[must_use]
    pub fn max_abs_difference(&self, other: &Self) -> Option<f64> {
        (self.geometry == other.geometry).then(|| {
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max)
        })
    }

    /// Sub-voxel points where the field crosses zero, in physical coordinates.
    ///
    /// Each pair of face-adjacent voxels whose values straddle zero
    /// contributes one point, placed by linear interpolation between them.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn zero_crossings(&self) -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for linear in 0..self.values.len() {
            let a = self.values[linear];
            let index = self.geometry.voxel_index(linear);
            for axis in self.geometry.active_axes() {
                if index.axis(axis) + 1 >= self.geometry.axis_len(axis) {
                    continue;
                }
                let b = self.values[linear + self.geometry.stride(axis)];
                if (a <= 0.0) == (b <= 0.0) {
                    continue;
                }
                let t = a / (a - b);
                let mut continuous =
                    Vector3::new(index.x as f64, index.y as f64, index.z as f64);
                continuous[axis] += t;
                points.push(self.geometry.continuous_point(continuous));
            }
        }
        points
    }
}
