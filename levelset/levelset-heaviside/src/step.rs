//! Regularized Heaviside step function.

use std::f64::consts::{FRAC_1_PI, PI};
use std::fmt;

use crate::error::{HeavisideError, HeavisideResult};

/// Shape of the smooth transition.
///
/// All variants are symmetric (`H(0) = 0.5`) and their derivatives
/// integrate to one over the real line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepShape {
    /// `0.5 * (1 + tanh(x / eps))`. Exponentially decaying tails.
    Tanh,
    /// `0.5 + atan(x / eps) / pi`. Slowly decaying (algebraic) tails.
    #[default]
    Atan,
    /// Sinusoidal ramp with compact support: exactly 0 below `-eps` and 1 above `eps`.
    Sin,
}

impl StepShape {
    /// Whether the step is exactly 0/1 outside `[-eps, eps]`.
    #[must_use]
    pub const fn has_compact_support(self) -> bool {
        matches!(self, Self::Sin)
    }
}

impl fmt::Display for StepShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tanh => write!(f, "tanh"),
            Self::Atan => write!(f, "atan"),
            Self::Sin => write!(f, "sin"),
        }
    }
}

/// Smooth approximation of the unit step and its derivative (a Dirac impulse).
///
/// The half-width `epsilon` controls how wide the transition is. Its
/// reciprocal is cached alongside it, and [`set_epsilon`](Self::set_epsilon)
/// refuses non-positive values, so a constructed function is always valid.
///
/// Evaluation takes `&self` and the type is `Copy`, so a configured function
/// can be shared freely between worker threads.
///
/// # Example
///
/// ```
/// use levelset_heaviside::{RegularizedStepFunction, StepShape};
///
/// let mut h = RegularizedStepFunction::new(StepShape::Sin, 0.5).unwrap();
/// assert_eq!(h.evaluate(0.0), 0.5);
/// assert_eq!(h.evaluate(-1.0), 0.0);
/// assert_eq!(h.evaluate(1.0), 1.0);
/// assert_eq!(h.evaluate_derivative(2.0), 0.0);
///
/// assert!(h.set_epsilon(0.0).is_err());
/// h.set_epsilon(4.0).unwrap();
/// assert_eq!(h.one_over_epsilon(), 0.25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegularizedStepFunction {
    shape: StepShape,
    epsilon: f64,
    one_over_epsilon: f64,
}

impl Default for RegularizedStepFunction {
    fn default() -> Self {
        Self {
            shape: StepShape::default(),
            epsilon: 1.0,
            one_over_epsilon: 1.0,
        }
    }
}

impl RegularizedStepFunction {
    /// Creates a step function with the given shape and half-width.
    ///
    /// # Errors
    ///
    /// Returns [`HeavisideError::InvalidEpsilon`] if `epsilon` is not a
    /// positive finite number.
    pub fn new(shape: StepShape, epsilon: f64) -> HeavisideResult<Self> {
        let mut function = Self {
            shape,
            ..Self::default()
        };
        function.set_epsilon(epsilon)?;
        Ok(function)
    }

    /// Tanh-shaped step.
    ///
    /// # Errors
    ///
    /// Same as [`RegularizedStepFunction::new`].
    pub fn tanh(epsilon: f64) -> HeavisideResult<Self> {
        Self::new(StepShape::Tanh, epsilon)
    }

    /// Arctangent-shaped step.
    ///
    /// # Errors
    ///
    /// Same as [`RegularizedStepFunction::new`].
    pub fn atan(epsilon: f64) -> HeavisideResult<Self> {
        Self::new(StepShape::Atan, epsilon)
    }

    /// Sinusoidal step with compact support.
    ///
    /// # Errors
    ///
    /// Same as [`RegularizedStepFunction::new`].
    pub fn sin(epsilon: f64) -> HeavisideResult<Self> {
        Self::new(StepShape::Sin, epsilon)
    }

    /// Sets the half-width and caches its reciprocal.
    ///
    /// On error the previous value is kept.
    ///
    /// # Errors
    ///
    /// Returns [`HeavisideError::InvalidEpsilon`] if `epsilon <= 0` or is not finite.
    pub fn set_epsilon(&mut self, epsilon: f64) -> HeavisideResult<()> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(HeavisideError::InvalidEpsilon(epsilon));
        }
        self.epsilon = epsilon;
        self.one_over_epsilon = epsilon.recip();
        Ok(())
    }

    /// Half-width of the transition.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Cached `1 / epsilon`.
    #[must_use]
    pub const fn one_over_epsilon(&self) -> f64 {
        self.one_over_epsilon
    }

    /// Transition shape.
    #[must_use]
    pub const fn shape(&self) -> StepShape {
        self.shape
    }

    /// Smoothed step, in `[0, 1]` and non-decreasing in `x`.
    #[must_use]
    pub fn evaluate(&self, x: f64) -> f64 {
        let t = x * self.one_over_epsilon;
        match self.shape {
            StepShape::Tanh => 0.5 * (1.0 + t.tanh()),
            StepShape::Atan => 0.5 + FRAC_1_PI * t.atan(),
            StepShape::Sin => {
                if t <= -1.0 {
                    0.0
                } else if t >= 1.0 {
                    1.0
                } else {
                    (0.5 * (1.0 + t + (PI * t).sin() * FRAC_1_PI)).clamp(0.0, 1.0)
                }
            }
        }
    }

    /// Derivative of [`evaluate`](Self::evaluate): a non-negative impulse of unit mass.
    #[must_use]
    pub fn evaluate_derivative(&self, x: f64) -> f64 {
        let t = x * self.one_over_epsilon;
        match self.shape {
            StepShape::Tanh => {
                let th = t.tanh();
                0.5 * self.one_over_epsilon * (1.0 - th * th)
            }
            StepShape::Atan => FRAC_1_PI * self.one_over_epsilon / (1.0 + t * t),
            StepShape::Sin => {
                if t.abs() >= 1.0 {
                    0.0
                } else {
                    0.5 * self.one_over_epsilon * (1.0 + (PI * t).cos())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const SHAPES: [StepShape; 3] = [StepShape::Tanh, StepShape::Atan, StepShape::Sin];

    /// Midpoint-rule integral of the derivative over `[-half_width, half_width]`.
    fn integrate_derivative(h: &RegularizedStepFunction, half_width: f64) -> f64 {
        let steps = 200_000;
        let dx = 2.0 * half_width / f64::from(steps);
        (0..steps)
            .map(|i| {
                let x = -half_width + (f64::from(i) + 0.5) * dx;
                h.evaluate_derivative(x) * dx
            })
            .sum()
    }

    #[test]
    fn symmetric_at_zero() {
        for shape in SHAPES {
            let h = RegularizedStepFunction::new(shape, 0.7).unwrap();
            assert_relative_eq!(h.evaluate(0.0), 0.5, epsilon = 1e-15);
        }
    }

    #[test]
    fn limits() {
        for shape in SHAPES {
            let h = RegularizedStepFunction::new(shape, 1.0).unwrap();
            assert!(h.evaluate(-1e6) < 1e-5, "{shape}");
            assert!(h.evaluate(1e6) > 1.0 - 1e-5, "{shape}");
        }
    }

    #[test]
    fn compact_support_is_exact() {
        let h = RegularizedStepFunction::sin(2.0).unwrap();
        assert!(h.shape().has_compact_support());
        assert_eq!(h.evaluate(-2.0), 0.0);
        assert_eq!(h.evaluate(-5.0), 0.0);
        assert_eq!(h.evaluate(2.0), 1.0);
        assert_eq!(h.evaluate_derivative(2.5), 0.0);
        assert_eq!(h.evaluate_derivative(-2.5), 0.0);
    }

    #[test]
    fn derivative_integrates_to_one() {
        for shape in SHAPES {
            for epsilon in [0.1, 1.0] {
                let h = RegularizedStepFunction::new(shape, epsilon).unwrap();
                let mass = integrate_derivative(&h, 100.0);
                assert!((mass - 1.0).abs() < 0.01, "{shape} eps={epsilon}: {mass}");
            }
        }
    }

    #[test]
    fn derivative_matches_finite_difference() {
        for shape in SHAPES {
            let h = RegularizedStepFunction::new(shape, 0.8).unwrap();
            for x in [-0.6, -0.2, 0.0, 0.3, 0.7, 1.5] {
                let d = 1e-6;
                let numeric = (h.evaluate(x + d) - h.evaluate(x - d)) / (2.0 * d);
                assert_relative_eq!(h.evaluate_derivative(x), numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn rejects_non_positive_epsilon() {
        let mut h = RegularizedStepFunction::default();
        assert_eq!(h.set_epsilon(0.0), Err(HeavisideError::InvalidEpsilon(0.0)));
        assert_eq!(h.set_epsilon(-1.0), Err(HeavisideError::InvalidEpsilon(-1.0)));
        assert!(h.set_epsilon(f64::NAN).is_err());
        assert!(h.set_epsilon(f64::INFINITY).is_err());
        // Failed sets keep the previous state.
        assert_relative_eq!(h.epsilon(), 1.0);
        assert_relative_eq!(h.one_over_epsilon(), 1.0);
        assert!(RegularizedStepFunction::tanh(-0.5).is_err());
    }

    #[test]
    fn reciprocal_is_cached() {
        let mut h = RegularizedStepFunction::atan(3.0).unwrap();
        assert_relative_eq!(h.one_over_epsilon(), 1.0 / h.epsilon());
        h.set_epsilon(0.125).unwrap();
        assert_relative_eq!(h.one_over_epsilon(), 8.0);
    }

    proptest! {
        #[test]
        fn evaluate_is_monotonic_and_bounded(
            a in -50.0..50.0f64,
            b in -50.0..50.0f64,
            epsilon in 0.01..10.0f64,
            shape_index in 0usize..3,
        ) {
            let h = RegularizedStepFunction::new(SHAPES[shape_index], epsilon).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(h.evaluate(lo) <= h.evaluate(hi));
            prop_assert!((0.0..=1.0).contains(&h.evaluate(a)));
            prop_assert!(h.evaluate_derivative(a) >= 0.0);
        }
    }
}
