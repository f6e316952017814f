//! Parameters for level-set evolution.

use levelset_convergence::{ConvergenceResult, WindowConvergenceMonitor};
use levelset_heaviside::{HeavisideResult, RegularizedStepFunction, StepShape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EvolutionError, EvolutionResult};

/// Parameters controlling a level-set evolution run.
///
/// The three force weights scale the terms of the update
///
/// ```text
/// dphi/dt = w_c * g * kappa * |grad phi| - w_p * s * g * |grad phi| - w_a * v . grad phi
/// ```
///
/// where `g` is the feature speed, `v` the advection vector and `s = -1`
/// when [`reverse_expansion_direction`](Self::reverse_expansion_direction)
/// is set. With the negative-inside convention a positive propagation
/// weight and speed grow the contour.
///
/// # Example
///
/// ```
/// use levelset_evolve::EvolutionParams;
///
/// let params = EvolutionParams::default()
///     .with_max_iterations(200)
///     .with_curvature_weight(0.2)
///     .with_convergence_tolerance(1e-3);
/// assert!(params.validate().is_ok());
///
/// let nothing_to_do = EvolutionParams::default()
///     .with_propagation_weight(0.0)
///     .with_curvature_weight(0.0)
///     .with_advection_weight(0.0);
/// assert!(nothing_to_do.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvolutionParams {
    /// Shape of the regularized step used to blend sign-dependent terms.
    pub step_shape: StepShape,
    /// Half-width of the step transition, in speed units (must be > 0).
    pub epsilon: f64,
    /// Number of energy values in the convergence window (must be > 0).
    pub window_size: usize,
    /// Iteration cap. Zero gives a no-op run.
    pub max_iterations: u32,
    /// Converged once the windowed trend magnitude drops below this (>= 0).
    pub convergence_tolerance: f64,
    /// Weight of the feature-driven propagation term.
    pub propagation_weight: f64,
    /// Weight of the (speed-modulated) mean curvature term.
    pub curvature_weight: f64,
    /// Weight of the advection term.
    pub advection_weight: f64,
    /// Flip the sign of the propagation term.
    pub reverse_expansion_direction: bool,
    /// Attach sub-voxel zero-crossing points to the output.
    pub interpolate_surface_location: bool,
    /// Narrow band half-width in voxel layers on each side of the contour.
    pub band_half_width: usize,
    /// Rebuild the band every this many iterations.
    pub reinitialization_interval: u32,
    /// Upper bound on the time step.
    pub max_time_step: f64,
    /// Fraction of a voxel the front may travel per iteration, in `(0, 1]`.
    pub courant_number: f64,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            step_shape: StepShape::Tanh,
            epsilon: 0.05,
            window_size: 10,
            max_iterations: 500,
            convergence_tolerance: 1e-3,
            propagation_weight: 1.0,
            curvature_weight: 1.0,
            advection_weight: 0.0,
            reverse_expansion_direction: false,
            interpolate_surface_location: false,
            band_half_width: 4,
            reinitialization_interval: 5,
            max_time_step: 0.25,
            courant_number: 0.5,
        }
    }
}

impl EvolutionParams {
    /// Create parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Short window and narrow band for quick previews.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            window_size: 5,
            max_iterations: 200,
            convergence_tolerance: 5e-3,
            band_half_width: 3,
            reinitialization_interval: 4,
            ..Self::default()
        }
    }

    /// Long window, wide band and tight tolerance for final results.
    #[must_use]
    pub fn precise() -> Self {
        Self {
            window_size: 20,
            max_iterations: 2000,
            convergence_tolerance: 1e-4,
            band_half_width: 6,
            reinitialization_interval: 5,
            courant_number: 0.4,
            ..Self::default()
        }
    }

    /// Sets the step shape.
    #[must_use]
    pub const fn with_step_shape(mut self, shape: StepShape) -> Self {
        self.step_shape = shape;
        self
    }

    /// Sets the step half-width.
    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the convergence window size.
    #[must_use]
    pub const fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the convergence tolerance.
    #[must_use]
    pub const fn with_convergence_tolerance(mut self, tolerance: f64) -> Self {
        self.convergence_tolerance = tolerance;
        self
    }

    /// Sets the propagation weight.
    #[must_use]
    pub const fn with_propagation_weight(mut self, weight: f64) -> Self {
        self.propagation_weight = weight;
        self
    }

    /// Sets the curvature weight.
    #[must_use]
    pub const fn with_curvature_weight(mut self, weight: f64) -> Self {
        self.curvature_weight = weight;
        self
    }

    /// Sets the advection weight.
    #[must_use]
    pub const fn with_advection_weight(mut self, weight: f64) -> Self {
        self.advection_weight = weight;
        self
    }

    /// Flips the propagation direction.
    #[must_use]
    pub const fn with_reverse_expansion_direction(mut self, reverse: bool) -> Self {
        self.reverse_expansion_direction = reverse;
        self
    }

    /// Enables sub-voxel surface points in the output.
    #[must_use]
    pub const fn with_interpolate_surface_location(mut self, enabled: bool) -> Self {
        self.interpolate_surface_location = enabled;
        self
    }

    /// Sets the narrow band half-width in layers.
    #[must_use]
    pub const fn with_band_half_width(mut self, layers: usize) -> Self {
        self.band_half_width = layers;
        self
    }

    /// Sets how often the band is rebuilt.
    #[must_use]
    pub const fn with_reinitialization_interval(mut self, iterations: u32) -> Self {
        self.reinitialization_interval = iterations;
        self
    }

    /// Sets the time step ceiling.
    #[must_use]
    pub const fn with_max_time_step(mut self, time_step: f64) -> Self {
        self.max_time_step = time_step;
        self
    }

    /// Sets the Courant number.
    #[must_use]
    pub const fn with_courant_number(mut self, courant: f64) -> Self {
        self.courant_number = courant;
        self
    }

    /// Sign applied to the propagation term.
    #[must_use]
    pub const fn expansion_sign(&self) -> f64 {
        if self.reverse_expansion_direction {
            -1.0
        } else {
            1.0
        }
    }

    /// Builds the step function described by these parameters.
    ///
    /// # Errors
    ///
    /// Fails if `epsilon` is not a positive finite number.
    pub fn step_function(&self) -> HeavisideResult<RegularizedStepFunction> {
        RegularizedStepFunction::new(self.step_shape, self.epsilon)
    }

    /// Builds an empty convergence monitor with the configured window.
    ///
    /// # Errors
    ///
    /// Fails if `window_size` is zero.
    pub fn convergence_monitor(&self) -> ConvergenceResult<WindowConvergenceMonitor> {
        WindowConvergenceMonitor::new(self.window_size)
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any value is out of range, all three
    /// force weights are zero, or the band is too narrow for the
    /// reinitialization interval.
    pub fn validate(&self) -> EvolutionResult<()> {
        self.step_function()?;
        self.convergence_monitor()?;

        if !self.convergence_tolerance.is_finite() || self.convergence_tolerance < 0.0 {
            return Err(EvolutionError::invalid_config(format!(
                "convergence tolerance must be finite and non-negative, got {}",
                self.convergence_tolerance
            )));
        }

        let weights = [
            self.propagation_weight,
            self.curvature_weight,
            self.advection_weight,
        ];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(EvolutionError::invalid_config("force weights must be finite"));
        }
        if weights.iter().all(|&w| w == 0.0) {
            return Err(EvolutionError::invalid_config(
                "all force weights are zero, nothing to evolve",
            ));
        }

        if !self.max_time_step.is_finite() || self.max_time_step <= 0.0 {
            return Err(EvolutionError::invalid_config(format!(
                "max time step must be positive, got {}",
                self.max_time_step
            )));
        }
        if !(self.courant_number > 0.0 && self.courant_number <= 1.0) {
            return Err(EvolutionError::invalid_config(format!(
                "courant number must be in (0, 1], got {}",
                self.courant_number
            )));
        }

        if self.band_half_width < 2 {
            return Err(EvolutionError::invalid_config(format!(
                "band half-width must be at least 2 layers, got {}",
                self.band_half_width
            )));
        }
        if self.reinitialization_interval == 0 {
            return Err(EvolutionError::invalid_config(
                "reinitialization interval must be greater than zero",
            ));
        }

        // The front moves at most `courant_number` voxels per iteration and
        // must stay inside the band until the next rebuild.
        #[allow(clippy::cast_precision_loss)]
        let band = self.band_half_width as f64;
        if f64::from(self.reinitialization_interval) * self.courant_number >= band {
            return Err(EvolutionError::invalid_config(format!(
                "band of {} layers is too narrow for reinitialization every {} iterations",
                self.band_half_width, self.reinitialization_interval
            )));
        }

        Ok(())
    }
}
