//! Signed-distance seeding and reinitialization.
//!
//! The level-set function drifts away from a distance function under
//! repeated finite-difference updates. Reinitialization restores it near
//! the contour:
//!
//! 1. Voxels with a face neighbor of opposite sign form layer 0. Their
//!    distance comes from linear interpolation of the zero crossing along
//!    each axis, combined as `1 / sqrt(sum 1/d_axis^2)`.
//! 2. Layer `k` is every unassigned face neighbor of layer `k - 1`. Its
//!    distance solves the upwind eikonal equation using only voxels from
//!    earlier layers.
//! 3. Voxels beyond the last layer are clamped to `+-(layers + 1) * h_min`.
//!
//! Signs are never changed, so the contour does not move.

use levelset_types::{GridError, GridGeometry, GridResult, Point3, ScalarField};
use tracing::debug;

use crate::band::NarrowBand;
use crate::error::{EvolutionError, EvolutionResult};

/// Initial contour used to seed the level-set function.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialContour {
    /// Binary mask in linear order, `true` inside.
    Mask(Vec<bool>),
    /// Any field whose zero crossing is the initial surface (negative inside).
    Field(ScalarField),
}

impl InitialContour {
    /// A sphere (a disc on 2-D grids) in physical coordinates.
    #[must_use]
    pub fn sphere(geometry: &GridGeometry, center: Point3<f64>, radius: f64) -> Self {
        Self::Field(ScalarField::from_fn(geometry.clone(), |p| {
            (p - center).norm() - radius
        }))
    }

    /// Builds the (not yet reinitialized) field on `geometry`.
    pub(crate) fn to_field(&self, geometry: &GridGeometry) -> EvolutionResult<ScalarField> {
        match self {
            Self::Mask(mask) => Ok(mask_to_field(geometry, mask)?),
            Self::Field(field) => {
                if field.geometry() != geometry {
                    return Err(EvolutionError::invalid_config(
                        "initial field is defined on a different grid",
                    ));
                }
                Ok(field.clone())
            }
        }
    }
}

/// Converts a binary mask to a field with values `-0.5` inside and `0.5` outside.
///
/// The zero crossing then sits half way between inside and outside voxels.
///
/// # Errors
///
/// Returns [`GridError::SizeMismatch`] if the mask does not cover the grid.
pub fn mask_to_field(geometry: &GridGeometry, mask: &[bool]) -> GridResult<ScalarField> {
    if mask.len() != geometry.len() {
        return Err(GridError::SizeMismatch {
            expected: geometry.len(),
            actual: mask.len(),
        });
    }
    let values = mask
        .iter()
        .map(|&inside| if inside { -0.5 } else { 0.5 })
        .collect();
    ScalarField::from_values(geometry.clone(), values)
}

/// Rebuilds `band` around the zero crossing of `field` and resets the band
/// values to approximate signed distances.
///
/// `band_half_width` is the number of layers beyond layer 0.
#[allow(clippy::cast_precision_loss)]
pub fn reinitialize(field: &mut ScalarField, band_half_width: usize, band: &mut NarrowBand) {
    let geometry = field.geometry().clone();
    let previous = field.values().to_vec();
    let count = previous.len();

    if band.voxel_count() != count {
        *band = NarrowBand::new(count);
    }
    band.clear();

    let mut distance = vec![f64::INFINITY; count];
    let mut frontier = Vec::new();
    for linear in 0..count {
        if let Some(d) = interface_distance(&geometry, &previous, linear) {
            distance[linear] = d;
            band.insert(linear, 0);
            frontier.push(linear);
        }
    }

    for layer in 1..=band_half_width {
        let tag = u16::try_from(layer).unwrap_or(u16::MAX);
        let mut next = Vec::new();
        for &linear in &frontier {
            for (_, neighbor) in geometry.face_neighbors(linear) {
                if band.insert(neighbor, tag) {
                    next.push(neighbor);
                }
            }
        }
        if next.is_empty() {
            break;
        }

        // Solve the whole layer before writing so it only sees earlier layers.
        let solved: Vec<f64> = next
            .iter()
            .map(|&linear| eikonal_update(&geometry, &distance, linear))
            .collect();
        for (&linear, d) in next.iter().zip(solved) {
            distance[linear] = d;
        }
        frontier = next;
    }

    let far = (band_half_width + 1) as f64 * geometry.min_spacing();
    for ((value, &old), &d) in field
        .values_mut()
        .iter_mut()
        .zip(&previous)
        .zip(&distance)
    {
        let magnitude = d.min(far);
        *value = if old <= 0.0 { -magnitude } else { magnitude };
    }

    debug!(
        band = band.len(),
        interface = band.layer_len(0),
        "Rebuilt narrow band"
    );
}

/// Distance from a voxel to the zero crossing between it and its neighbors,
/// or `None` if no face neighbor has the opposite sign.
fn interface_distance(geometry: &GridGeometry, values: &[f64], linear: usize) -> Option<f64> {
    let spacing = geometry.spacing();
    let a = values[linear];
    let inside = a <= 0.0;

    let mut per_axis = [f64::INFINITY; 3];
    for (axis, neighbor) in geometry.face_neighbors(linear) {
        let b = values[neighbor];
        if (b <= 0.0) != inside {
            let d = a.abs() / (a - b).abs() * spacing[axis];
            per_axis[axis] = per_axis[axis].min(d);
        }
    }

    let mut inverse_sq = 0.0;
    let mut found = false;
    for d in per_axis.into_iter().filter(|d| d.is_finite()) {
        if d <= 0.0 {
            return Some(0.0);
        }
        found = true;
        inverse_sq += 1.0 / (d * d);
    }
    found.then(|| inverse_sq.sqrt().recip())
}

/// Upwind solution of `|grad u| = 1` from already assigned neighbors.
fn eikonal_update(geometry: &GridGeometry, distance: &[f64], linear: usize) -> f64 {
    let spacing = geometry.spacing();

    let mut nearest = [f64::INFINITY; 3];
    for (axis, neighbor) in geometry.face_neighbors(linear) {
        nearest[axis] = nearest[axis].min(distance[neighbor]);
    }

    let mut terms: Vec<(f64, f64)> = (0..3)
        .filter(|&axis| nearest[axis].is_finite())
        .map(|axis| (nearest[axis], spacing[axis]))
        .collect();
    terms.sort_by(|x, y| x.0.total_cmp(&y.0));

    let Some(&(a0, h0)) = terms.first() else {
        return f64::INFINITY;
    };

    // Add axes in order of increasing neighbor distance while they still
    // lie below the current estimate.
    let mut u = a0 + h0;
    let (mut sum_w, mut sum_aw, mut sum_aaw) = (0.0, 0.0, 0.0);
    for (i, &(a, h)) in terms.iter().enumerate() {
        if i > 0 && u <= a {
            break;
        }
        let w = 1.0 / (h * h);
        sum_w += w;
        sum_aw += a * w;
        sum_aaw += a * a * w;

        let discriminant = sum_aw * sum_aw - sum_w * (sum_aaw - 1.0);
        if discriminant < 0.0 {
            break;
        }
        u = (sum_aw + discriminant.sqrt()) / sum_w;
    }
    u
}
