//! Feature (speed and advection) providers.

use levelset_types::{GridError, GridGeometry, GridResult, Point3, Vector3, VoxelIndex};

/// Source of image-derived forces for the evolution.
///
/// The engine samples the provider from several worker threads at once,
/// hence the `Sync` bound. [`initialize_iteration`](Self::initialize_iteration)
/// is the only mutating hook and is always called from the orchestrating
/// thread before any sampling of that iteration.
pub trait FeatureProvider: Sync {
    /// Scalar speed `g` at a voxel. Typically in `[0, 1]`, small near edges.
    fn speed(&self, index: VoxelIndex) -> f64;

    /// Advection vector at a voxel, in physical coordinates.
    ///
    /// Returning `None` contributes no advection at that voxel.
    fn advection(&self, _index: VoxelIndex) -> Option<Vector3<f64>> {
        None
    }

    /// Called once at the start of every iteration.
    fn initialize_iteration(&mut self, _iteration: u32) {}

    /// Checks that the provider can be sampled at every voxel of `geometry`.
    ///
    /// Called by the engine before seeding the field.
    ///
    /// # Errors
    ///
    /// Returns a [`GridError`] describing the mismatch.
    fn check_geometry(&self, _geometry: &GridGeometry) -> GridResult<()> {
        Ok(())
    }

    /// Speed of every voxel in linear order.
    ///
    /// Used once, up front, when the propagation weight is zero and the speed
    /// field cannot change during the run.
    fn speed_field(&self, geometry: &GridGeometry) -> Vec<f64> {
        (0..geometry.len())
            .map(|linear| self.speed(geometry.voxel_index(linear)))
            .collect()
    }
}

/// Precomputed speed (and optional advection) buffers.
///
/// Sampling a voxel that lies outside the image's own grid panics; the
/// engine rejects such an image through
/// [`check_geometry`](FeatureProvider::check_geometry) before iterating.
///
/// # Example
///
/// ```
/// use levelset_evolve::{FeatureImage, FeatureProvider};
/// use levelset_types::{GridGeometry, VoxelIndex};
///
/// let grid = GridGeometry::planar(4, 4).unwrap();
/// let features = FeatureImage::uniform(grid, 0.5);
/// assert_eq!(features.speed(VoxelIndex::new(2, 3, 0)), 0.5);
/// assert!(features.advection(VoxelIndex::new(0, 0, 0)).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FeatureImage {
    geometry: GridGeometry,
    speed: Vec<f64>,
    advection: Option<Vec<Vector3<f64>>>,
}

impl FeatureImage {
    /// Wraps a speed buffer in linear (x-fastest) order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::SizeMismatch`] if the buffer does not cover the grid.
    pub fn new(geometry: GridGeometry, speed: Vec<f64>) -> GridResult<Self> {
        check_len(&geometry, speed.len())?;
        Ok(Self {
            geometry,
            speed,
            advection: None,
        })
    }

    /// Same speed everywhere.
    #[must_use]
    pub fn uniform(geometry: GridGeometry, speed: f64) -> Self {
        let speed = vec![speed; geometry.len()];
        Self {
            geometry,
            speed,
            advection: None,
        }
    }

    /// Samples a speed function of the physical voxel position.
    #[must_use]
    pub fn from_fn(
        geometry: GridGeometry,
        mut f: impl FnMut(Point3<f64>) -> f64,
    ) -> Self {
        let speed = (0..geometry.len())
            .map(|linear| f(geometry.physical_point(geometry.voxel_index(linear))))
            .collect();
        Self {
            geometry,
            speed,
            advection: None,
        }
    }

    /// Attaches an advection buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::SizeMismatch`] if the buffer does not cover the grid.
    pub fn with_advection(mut self, advection: Vec<Vector3<f64>>) -> GridResult<Self> {
        check_len(&self.geometry, advection.len())?;
        self.advection = Some(advection);
        Ok(self)
    }

    /// Grid the buffers are defined on.
    #[must_use]
    pub const fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Speed buffer.
    #[must_use]
    pub fn speed_values(&self) -> &[f64] {
        &self.speed
    }
}

fn check_len(geometry: &GridGeometry, actual: usize) -> GridResult<()> {
    if actual == geometry.len() {
        Ok(())
    } else {
        Err(GridError::SizeMismatch {
            expected: geometry.len(),
            actual,
        })
    }
}

impl FeatureProvider for FeatureImage {
    fn speed(&self, index: VoxelIndex) -> f64 {
        self.speed[self.geometry.linear_index(index)]
    }

    fn advection(&self, index: VoxelIndex) -> Option<Vector3<f64>> {
        self.advection
            .as_ref()
            .map(|field| field[self.geometry.linear_index(index)])
    }

    fn check_geometry(&self, geometry: &GridGeometry) -> GridResult<()> {
        if geometry.dimensions() == self.geometry.dimensions() {
            Ok(())
        } else {
            Err(GridError::SizeMismatch {
                expected: geometry.len(),
                actual: self.speed.len(),
            })
        }
    }

    /// Copies the speed buffer. Returns an empty buffer if `geometry` has
    /// different dimensions, which the engine rejects as a size mismatch.
    fn speed_field(&self, geometry: &GridGeometry) -> Vec<f64> {
        if geometry.dimensions() == self.geometry.dimensions() {
            self.speed.clone()
        } else {
            Vec::new()
        }
    }
}
