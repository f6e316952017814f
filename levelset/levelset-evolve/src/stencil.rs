//! Finite-difference stencils on the level-set snapshot.
//!
//! All derivatives are in physical units (divided by the axis spacing) and
//! use clamped neighbors at the grid border. Axes with a single voxel get a
//! zero derivative.

use levelset_heaviside::RegularizedStepFunction;
use levelset_types::{GridGeometry, Vector3};

/// Below this squared gradient magnitude the curvature term is zero.
const GRADIENT_FLOOR: f64 = 1e-12;

/// One-sided first differences at a voxel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivatives {
    /// Backward differences `(phi[i] - phi[i-1]) / h`.
    pub backward: Vector3<f64>,
    /// Forward differences `(phi[i+1] - phi[i]) / h`.
    pub forward: Vector3<f64>,
}

impl Derivatives {
    /// Computes the one-sided differences of `values` at `linear`.
    #[must_use]
    pub fn at(geometry: &GridGeometry, values: &[f64], linear: usize) -> Self {
        let spacing = geometry.spacing();
        let center = values[linear];
        let mut backward = Vector3::zeros();
        let mut forward = Vector3::zeros();
        for axis in geometry.active_axes() {
            let h = spacing[axis];
            backward[axis] = (center - values[geometry.neighbor(linear, axis, -1)]) / h;
            forward[axis] = (values[geometry.neighbor(linear, axis, 1)] - center) / h;
        }
        Self { backward, forward }
    }

    /// Central differences.
    #[must_use]
    pub fn central(&self) -> Vector3<f64> {
        (self.backward + self.forward) * 0.5
    }

    /// Upwind gradient magnitudes `(grow, shrink)`.
    ///
    /// `grow` is the Osher–Sethian gradient for a positive speed in
    /// `phi_t + F |grad phi| = 0`, `shrink` the one for a negative speed.
    #[must_use]
    pub fn upwind_magnitudes(&self) -> (f64, f64) {
        let mut grow = 0.0;
        let mut shrink = 0.0;
        for axis in 0..3 {
            let b = self.backward[axis];
            let f = self.forward[axis];
            grow += b.max(0.0).powi(2) + f.min(0.0).powi(2);
            shrink += b.min(0.0).powi(2) + f.max(0.0).powi(2);
        }
        (grow.sqrt(), shrink.sqrt())
    }

    /// `|grad phi|` for a propagation speed, blending the two upwind
    /// magnitudes by the regularized sign of the speed.
    #[must_use]
    pub fn propagation_magnitude(&self, speed: f64, step: &RegularizedStepFunction) -> f64 {
        let (grow, shrink) = self.upwind_magnitudes();
        let weight = step.evaluate(speed);
        weight * grow + (1.0 - weight) * shrink
    }

    /// `v . grad phi` with upwinding per axis.
    ///
    /// `velocity` must already be expressed along the index axes.
    #[must_use]
    pub fn advection_rate(&self, velocity: &Vector3<f64>, step: &RegularizedStepFunction) -> f64 {
        (0..3)
            .map(|axis| {
                let v = velocity[axis];
                let weight = step.evaluate(v);
                v * (weight * self.backward[axis] + (1.0 - weight) * self.forward[axis])
            })
            .sum()
    }
}

/// Mean curvature times gradient magnitude, `kappa * |grad phi|`, from
/// central differences.
///
/// Positive on the outside of a convex contour, so adding it to `phi`
/// shrinks convex shapes.
#[must_use]
pub fn curvature_term(
    geometry: &GridGeometry,
    values: &[f64],
    linear: usize,
    derivatives: &Derivatives,
) -> f64 {
    let spacing = geometry.spacing();
    let first = derivatives.central();
    let norm_sq = first.norm_squared();
    if norm_sq < GRADIENT_FLOOR {
        return 0.0;
    }

    let axes: Vec<usize> = geometry.active_axes().collect();
    let mut second = Vector3::zeros();
    for &axis in &axes {
        second[axis] =
            (derivatives.forward[axis] - derivatives.backward[axis]) / spacing[axis];
    }

    let mut numerator = 0.0;
    for &a in &axes {
        let others: f64 = axes.iter().filter(|&&b| b != a).map(|&b| second[b]).sum();
        numerator += first[a] * first[a] * others;
    }
    for (i, &a) in axes.iter().enumerate() {
        for &b in &axes[i + 1..] {
            let mixed = mixed_derivative(geometry, values, linear, a, b);
            numerator -= 2.0 * first[a] * first[b] * mixed;
        }
    }

    numerator / norm_sq
}

fn mixed_derivative(
    geometry: &GridGeometry,
    values: &[f64],
    linear: usize,
    a: usize,
    b: usize,
) -> f64 {
    let corner = |step_a: isize, step_b: isize| {
        let moved = geometry.neighbor(linear, a, step_a);
        values[geometry.neighbor(moved, b, step_b)]
    };
    let spacing = geometry.spacing();
    (corner(1, 1) - corner(1, -1) - corner(-1, 1) + corner(-1, -1))
        / (4.0 * spacing[a] * spacing[b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use levelset_types::{Point3, ScalarField, VoxelIndex};
    use proptest::prelude::*;

    fn sample(field: &ScalarField, x: usize, y: usize) -> (usize, Derivatives) {
        let grid = field.geometry();
        let linear = grid.linear_index(VoxelIndex::new(x, y, 0));
        (linear, Derivatives::at(grid, field.values(), linear))
    }

    #[test]
    fn plane_has_exact_gradient_and_no_curvature() {
        let grid = GridGeometry::planar(8, 8).unwrap();
        let field = ScalarField::from_fn(grid, |p| 2.0 * p.x + p.y);
        let (linear, d) = sample(&field, 4, 3);

        assert_relative_eq!(d.backward, Vector3::new(2.0, 1.0, 0.0));
        assert_relative_eq!(d.forward, Vector3::new(2.0, 1.0, 0.0));
        let (grow, shrink) = d.upwind_magnitudes();
        assert_relative_eq!(grow, 5.0_f64.sqrt());
        assert_relative_eq!(shrink, 5.0_f64.sqrt());
        assert_relative_eq!(
            curvature_term(field.geometry(), field.values(), linear, &d),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn circle_curvature_is_inverse_radius() {
        let grid = GridGeometry::planar(32, 32).unwrap();
        let center = Point3::new(15.5, 15.5, 0.0);
        let field = ScalarField::from_fn(grid, |p| (p - center).norm() - 10.0);
        let (linear, d) = sample(&field, 25, 15);

        let r = (Point3::new(25.0, 15.0, 0.0) - center).norm();
        let term = curvature_term(field.geometry(), field.values(), linear, &d);
        assert_relative_eq!(term, 1.0 / r, epsilon = 5e-3);
    }

    #[test]
    fn anisotropic_spacing_scales_differences() {
        let grid = GridGeometry::new((6, 6, 1), Vector3::new(0.5, 2.0, 1.0)).unwrap();
        let field = ScalarField::from_fn(grid, |p| p.x + p.y);
        let (_, d) = sample(&field, 2, 2);
        assert_relative_eq!(d.central(), Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn flat_field_has_zero_curvature() {
        let grid = GridGeometry::planar(5, 5).unwrap();
        let field = ScalarField::filled(grid, 1.0);
        let (linear, d) = sample(&field, 0, 0);
        assert_eq!(curvature_term(field.geometry(), field.values(), linear, &d), 0.0);
    }

    #[test]
    fn upwinding_follows_speed_sign() {
        // A V-shaped minimum: backward -1, forward +1.
        let d = Derivatives {
            backward: Vector3::new(-1.0, 0.0, 0.0),
            forward: Vector3::new(1.0, 0.0, 0.0),
        };
        let (grow, shrink) = d.upwind_magnitudes();
        assert_relative_eq!(grow, 0.0);
        assert_relative_eq!(shrink, 2.0_f64.sqrt());

        let step = RegularizedStepFunction::tanh(1e-3).unwrap();
        assert_relative_eq!(d.propagation_magnitude(1.0, &step), 0.0, epsilon = 1e-9);
        assert_relative_eq!(
            d.propagation_magnitude(-1.0, &step),
            2.0_f64.sqrt(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn advection_uses_upwind_side() {
        let d = Derivatives {
            backward: Vector3::new(1.0, 0.0, 0.0),
            forward: Vector3::new(3.0, 0.0, 0.0),
        };
        let step = RegularizedStepFunction::tanh(1e-3).unwrap();
        assert_relative_eq!(
            d.advection_rate(&Vector3::new(2.0, 0.0, 0.0), &step),
            2.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            d.advection_rate(&Vector3::new(-2.0, 0.0, 0.0), &step),
            -6.0,
            epsilon = 1e-9
        );
    }

    fn arb_vector() -> impl Strategy<Value = Vector3<f64>> {
        (-10.0..10.0f64, -10.0..10.0f64, -10.0..10.0f64)
            .prop_map(|(x, y, z)| Vector3::new(x, y, z))
    }

    proptest! {
        #[test]
        fn upwind_magnitudes_bound_the_blend(
            backward in arb_vector(),
            forward in arb_vector(),
            speed in -5.0..5.0f64,
        ) {
            let d = Derivatives { backward, forward };
            let (grow, shrink) = d.upwind_magnitudes();
            prop_assert!(grow >= 0.0);
            prop_assert!(shrink >= 0.0);

            // Each one-sided difference lands in exactly one of the two sums.
            let total = backward.norm_squared() + forward.norm_squared();
            prop_assert!((grow * grow + shrink * shrink - total).abs() <= 1e-9 * (1.0 + total));

            let step = RegularizedStepFunction::tanh(0.5).unwrap();
            let blended = d.propagation_magnitude(speed, &step);
            prop_assert!(blended >= grow.min(shrink) - 1e-12);
            prop_assert!(blended <= grow.max(shrink) + 1e-12);
        }
    }
}
