//! The level-set evolution engine.
//!
//! Each iteration:
//! 1. lets the provider prepare (`initialize_iteration`),
//! 2. computes the update rate of every band voxel in parallel from a
//!    read-only snapshot of the field,
//! 3. picks a stable time step and commits all band updates at once,
//! 4. feeds the RMS change to the convergence monitor,
//! 5. rebuilds the band every `reinitialization_interval` iterations.

use std::time::Instant;

use levelset_convergence::WindowConvergenceMonitor;
use levelset_heaviside::RegularizedStepFunction;
use levelset_types::{GridError, GridGeometry, ScalarField};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::band::NarrowBand;
use crate::cancel::CancellationToken;
use crate::distance::{InitialContour, reinitialize};
use crate::error::{EvolutionError, EvolutionResult};
use crate::feature::FeatureProvider;
use crate::params::EvolutionParams;
use crate::result::{EvolutionOutput, IterationRecord, RunMetadata, Termination};
use crate::stencil::{Derivatives, curvature_term};

/// Lifecycle of a [`LevelSetEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Created, no field yet.
    Uninitialized,
    /// Field seeded and band built.
    Initialized,
    /// Inside [`LevelSetEngine::run`].
    Iterating,
    /// Stopped because the convergence criterion was met.
    Converged,
    /// Stopped at `max_iterations`.
    IterationLimitReached,
    /// Stopped by a cancellation token.
    Cancelled,
    /// Stopped by a numerical instability.
    Aborted,
}

impl EngineState {
    /// Termination reason, if the engine has stopped.
    #[must_use]
    pub const fn termination(self) -> Option<Termination> {
        match self {
            Self::Converged => Some(Termination::Converged),
            Self::IterationLimitReached => Some(Termination::IterationLimitReached),
            Self::Cancelled => Some(Termination::Cancelled),
            Self::Aborted => Some(Termination::Aborted),
            Self::Uninitialized | Self::Initialized | Self::Iterating => None,
        }
    }

    /// Whether the engine has stopped.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        self.termination().is_some()
    }
}

impl From<Termination> for EngineState {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Converged => Self::Converged,
            Termination::IterationLimitReached => Self::IterationLimitReached,
            Termination::Cancelled => Self::Cancelled,
            Termination::Aborted => Self::Aborted,
        }
    }
}

/// Narrow-band level-set evolution driven by a [`FeatureProvider`].
///
/// # Example
///
/// ```
/// use levelset_evolve::{EvolutionParams, FeatureImage, InitialContour, LevelSetEngine, Termination};
/// use levelset_types::{GridGeometry, Point3};
///
/// let grid = GridGeometry::planar(24, 24).unwrap();
/// let features = FeatureImage::uniform(grid.clone(), 1.0);
/// let seed = InitialContour::sphere(&grid, Point3::new(12.0, 12.0, 0.0), 4.0);
///
/// let params = EvolutionParams::default().with_max_iterations(9);
/// let mut engine = LevelSetEngine::new(grid, features, params).unwrap();
/// engine.initialize(&seed).unwrap();
/// let termination = engine.run().unwrap();
/// assert_eq!(termination, Termination::IterationLimitReached);
///
/// let output = engine.finalize().unwrap();
/// assert_eq!(output.metadata.iterations_run, 9);
/// assert_eq!(output.log.len(), 9);
/// ```
#[derive(Debug)]
pub struct LevelSetEngine<P> {
    geometry: GridGeometry,
    provider: P,
    params: EvolutionParams,
    step: RegularizedStepFunction,
    monitor: WindowConvergenceMonitor,
    state: EngineState,
    field: Option<ScalarField>,
    band: NarrowBand,
    static_speed: Option<Vec<f64>>,
    iteration: u32,
    log: Vec<IterationRecord>,
    cancellation: Option<CancellationToken>,
}

impl<P: FeatureProvider> LevelSetEngine<P> {
    /// Creates an engine over `geometry`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `params` fail validation.
    pub fn new(geometry: GridGeometry, provider: P, params: EvolutionParams) -> EvolutionResult<Self> {
        params.validate()?;
        let step = params.step_function()?;
        let monitor = params.convergence_monitor()?;
        let band = NarrowBand::new(geometry.len());

        Ok(Self {
            geometry,
            provider,
            params,
            step,
            monitor,
            state: EngineState::Uninitialized,
            field: None,
            band,
            static_speed: None,
            iteration: 0,
            log: Vec::new(),
            cancellation: None,
        })
    }

    /// Attaches a token checked before every iteration.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Seeds the field from `contour` and builds the first band.
    ///
    /// Nothing is modified if this fails.
    ///
    /// # Errors
    ///
    /// Returns [`EvolutionError::AlreadyInitialized`] on a second call, or a
    /// configuration error if the contour or the provider does not match the
    /// grid.
    pub fn initialize(&mut self, contour: &InitialContour) -> EvolutionResult<()> {
        if self.state != EngineState::Uninitialized {
            return Err(EvolutionError::AlreadyInitialized);
        }
        self.provider.check_geometry(&self.geometry)?;

        let mut field = contour.to_field(&self.geometry)?;
        let mut band = NarrowBand::new(self.geometry.len());
        reinitialize(&mut field, self.params.band_half_width, &mut band);

        // Without propagation the speed only modulates curvature and is
        // sampled once for the whole run.
        let static_speed = if self.params.propagation_weight == 0.0 {
            let speed = self.provider.speed_field(&self.geometry);
            if speed.len() != self.geometry.len() {
                return Err(GridError::SizeMismatch {
                    expected: self.geometry.len(),
                    actual: speed.len(),
                }
                .into());
            }
            Some(speed)
        } else {
            None
        };

        if band.is_empty() {
            warn!("Initial contour has no zero crossing; the field will not move");
        }

        self.field = Some(field);
        self.band = band;
        self.static_speed = static_speed;
        self.state = EngineState::Initialized;
        Ok(())
    }

    /// Iterates until convergence, the iteration limit or cancellation.
    ///
    /// Calling `run` again after it has terminated returns the same
    /// termination without iterating.
    ///
    /// # Errors
    ///
    /// Returns [`EvolutionError::NotInitialized`] before
    /// [`initialize`](Self::initialize), or
    /// [`EvolutionError::NumericalInstability`] if an update stays non-finite
    /// after the halved-step retry. In the latter case the engine is left in
    /// [`EngineState::Aborted`] holding the last committed field.
    pub fn run(&mut self) -> EvolutionResult<Termination> {
        if self.state == EngineState::Uninitialized {
            return Err(EvolutionError::NotInitialized);
        }
        if let Some(termination) = self.state.termination() {
            return Ok(termination);
        }

        self.state = EngineState::Iterating;
        info!(
            voxels = self.geometry.len(),
            band = self.band.len(),
            propagation = self.params.propagation_weight,
            curvature = self.params.curvature_weight,
            advection = self.params.advection_weight,
            max_iterations = self.params.max_iterations,
            "Starting level-set evolution"
        );

        let termination = loop {
            if self.iteration >= self.params.max_iterations {
                break Termination::IterationLimitReached;
            }
            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                warn!(iteration = self.iteration, "Evolution cancelled");
                break Termination::Cancelled;
            }

            let record = match self.iterate() {
                Ok(record) => record,
                Err(err) => {
                    self.state = EngineState::Aborted;
                    warn!(iteration = self.iteration, error = %err, "Evolution aborted");
                    return Err(err);
                }
            };

            if self.has_converged(record.convergence_value) {
                break Termination::Converged;
            }
        };

        self.state = termination.into();
        info!(
            iterations = self.iteration,
            convergence_value = self.monitor.convergence_value(),
            outcome = %termination,
            "Level-set evolution finished"
        );
        Ok(termination)
    }

    /// Consumes the engine and returns the final field, metadata and log.
    ///
    /// # Errors
    ///
    /// Returns [`EvolutionError::NotInitialized`] or
    /// [`EvolutionError::NotTerminated`] if the run has not finished.
    pub fn finalize(self) -> EvolutionResult<EvolutionOutput> {
        let termination = match self.state {
            EngineState::Uninitialized => return Err(EvolutionError::NotInitialized),
            state => state.termination().ok_or(EvolutionError::NotTerminated)?,
        };
        let field = self.field.ok_or(EvolutionError::NotInitialized)?;

        let surface = self
            .params
            .interpolate_surface_location
            .then(|| field.zero_crossings());
        let metadata = RunMetadata {
            iterations_run: self.iteration,
            final_convergence_value: self.monitor.convergence_value(),
            converged: termination == Termination::Converged,
            termination,
        };

        Ok(EvolutionOutput {
            field,
            metadata,
            log: self.log,
            surface,
        })
    }

    /// Changes the step function half-width between runs.
    ///
    /// # Errors
    ///
    /// Rejects a non-positive or non-finite `epsilon`; the previous value is kept.
    pub fn set_epsilon(&mut self, epsilon: f64) -> EvolutionResult<()> {
        self.step.set_epsilon(epsilon)?;
        self.params.epsilon = epsilon;
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Number of completed iterations.
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Current field, once initialized.
    #[must_use]
    pub const fn field(&self) -> Option<&ScalarField> {
        self.field.as_ref()
    }

    /// Current narrow band.
    #[must_use]
    pub const fn band(&self) -> &NarrowBand {
        &self.band
    }

    /// Records of the completed iterations.
    #[must_use]
    pub fn iteration_log(&self) -> &[IterationRecord] {
        &self.log
    }

    /// Convergence monitor holding the recent energies.
    #[must_use]
    pub const fn monitor(&self) -> &WindowConvergenceMonitor {
        &self.monitor
    }

    /// The feature provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Parameters of this run.
    #[must_use]
    pub const fn params(&self) -> &EvolutionParams {
        &self.params
    }

    /// Step function used for upwind blending.
    #[must_use]
    pub const fn step_function(&self) -> &RegularizedStepFunction {
        &self.step
    }

    /// Grid of the field.
    #[must_use]
    pub const fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn has_converged(&self, convergence_value: f64) -> bool {
        self.monitor.is_full()
            && self.monitor.len() >= 2
            && convergence_value.abs() < self.params.convergence_tolerance
    }

    /// Runs one iteration and commits it.
    fn iterate(&mut self) -> EvolutionResult<IterationRecord> {
        let started = Instant::now();
        let index = self.iteration;
        self.provider.initialize_iteration(index);

        let field = self.field.as_ref().ok_or(EvolutionError::NotInitialized)?;
        let forces = Forces {
            geometry: &self.geometry,
            provider: &self.provider,
            params: &self.params,
            step: &self.step,
            static_speed: self.static_speed.as_deref(),
        };

        let update = forces.update(field.values(), self.band.indices());
        let update = forces.stabilize(field.values(), self.band.indices(), update, index)?;

        let field = self.field.as_mut().ok_or(EvolutionError::NotInitialized)?;
        let values = field.values_mut();
        let mut sum_sq = 0.0;
        for (&linear, &rate) in self.band.indices().iter().zip(&update.rates) {
            let change = update.time_step * rate;
            values[linear] += change;
            sum_sq += change * change;
        }
        #[allow(clippy::cast_precision_loss)]
        let energy = if update.rates.is_empty() {
            0.0
        } else {
            (sum_sq / update.rates.len() as f64).sqrt()
        };

        self.monitor.add_energy_value(energy);
        let convergence_value = self.monitor.convergence_value();
        self.iteration += 1;

        if self.iteration % self.params.reinitialization_interval == 0 {
            reinitialize(field, self.params.band_half_width, &mut self.band);
        }

        let record = IterationRecord {
            index,
            energy,
            time_step: update.time_step,
            convergence_value,
            elapsed: started.elapsed(),
        };
        debug!(
            iteration = index,
            energy,
            time_step = update.time_step,
            convergence_value,
            "Iteration complete"
        );
        self.log.push(record);
        Ok(record)
    }
}

/// Seeds, runs and finalizes an engine in one call.
///
/// # Example
///
/// ```
/// use levelset_evolve::{EvolutionParams, FeatureImage, InitialContour, evolve};
/// use levelset_types::{GridGeometry, Point3, ScalarField};
///
/// let grid = GridGeometry::planar(32, 32).unwrap();
/// let center = Point3::new(16.0, 16.0, 0.0);
/// let seed = ScalarField::from_fn(grid.clone(), |p| (p - center).norm() - 5.0);
/// let before = seed.inside_count();
///
/// let features = FeatureImage::uniform(grid.clone(), 1.0);
/// let params = EvolutionParams::default()
///     .with_curvature_weight(0.0)
///     .with_max_iterations(8);
/// let output = evolve(grid, features, &InitialContour::Field(seed), &params).unwrap();
/// assert!(output.field.inside_count() > before);
/// ```
///
/// # Errors
///
/// Any error from [`LevelSetEngine::new`], [`LevelSetEngine::initialize`] or
/// [`LevelSetEngine::run`]. On [`EvolutionError::NumericalInstability`] the
/// field of the last stable iteration is dropped with the engine; drive a
/// [`LevelSetEngine`] directly and call [`LevelSetEngine::finalize`] after
/// the error to keep it.
pub fn evolve<P: FeatureProvider>(
    geometry: GridGeometry,
    provider: P,
    contour: &InitialContour,
    params: &EvolutionParams,
) -> EvolutionResult<EvolutionOutput> {
    let mut engine = LevelSetEngine::new(geometry, provider, params.clone())?;
    engine.initialize(contour)?;
    engine.run()?;
    engine.finalize()
}

/// Everything the per-voxel rate depends on, shared read-only by workers.
struct Forces<'a, P> {
    geometry: &'a GridGeometry,
    provider: &'a P,
    params: &'a EvolutionParams,
    step: &'a RegularizedStepFunction,
    static_speed: Option<&'a [f64]>,
}

/// Rates and time step of one attempted iteration.
#[derive(Debug)]
struct Update {
    rates: Vec<f64>,
    time_step: f64,
}

impl Update {
    fn rates_are_finite(&self) -> bool {
        self.rates.iter().all(|rate| rate.is_finite())
    }

    /// Whether committing the update keeps every band value finite.
    fn commits_finite(&self, values: &[f64], band: &[usize]) -> bool {
        self.rates
            .iter()
            .zip(band)
            .all(|(&rate, &linear)| rate.is_finite() && (values[linear] + self.time_step * rate).is_finite())
    }
}

impl<P: FeatureProvider> Forces<'_, P> {
    /// Computes the rate of every band voxel and a stable time step.
    fn update(&self, values: &[f64], band: &[usize]) -> Update {
        let (rates, diffusion): (Vec<f64>, Vec<f64>) = band
            .par_iter()
            .map(|&linear| self.rate(values, linear))
            .unzip();

        let max_rate = rates
            .iter()
            .filter(|r| r.is_finite())
            .fold(0.0_f64, |m, r| m.max(r.abs()));
        let max_diffusion = diffusion
            .iter()
            .filter(|d| d.is_finite())
            .fold(0.0_f64, |m, d| m.max(*d));
        let time_step = self.time_step(max_rate, max_diffusion);

        Update { rates, time_step }
    }

    /// Retries a non-finite update once with half the time step.
    ///
    /// Finite rates are kept and only the step shrinks; non-finite rates are
    /// sampled again first.
    fn stabilize(
        &self,
        values: &[f64],
        band: &[usize],
        mut update: Update,
        iteration: u32,
    ) -> EvolutionResult<Update> {
        if update.commits_finite(values, band) {
            return Ok(update);
        }
        warn!(
            iteration,
            time_step = update.time_step,
            "Non-finite update, retrying with halved time step"
        );

        if !update.rates_are_finite() {
            update = self.update(values, band);
        }
        update.time_step *= 0.5;

        if update.commits_finite(values, band) {
            Ok(update)
        } else {
            Err(EvolutionError::NumericalInstability {
                iteration,
                time_step: update.time_step,
            })
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn time_step(&self, max_rate: f64, max_diffusion: f64) -> f64 {
        let h_min = self.geometry.min_spacing();
        let mut dt = self.params.max_time_step;
        if max_rate > 0.0 {
            dt = dt.min(self.params.courant_number * h_min.min(1.0) / max_rate);
        }
        if max_diffusion > 0.0 {
            let dims = self.geometry.active_axes().count().max(1) as f64;
            dt = dt.min(h_min * h_min / (2.0 * dims * max_diffusion));
        }
        dt
    }

    /// `dphi/dt` at one voxel plus the curvature coefficient `|w_c * g|`.
    fn rate(&self, values: &[f64], linear: usize) -> (f64, f64) {
        let params = self.params;
        let index = self.geometry.voxel_index(linear);
        let derivatives = Derivatives::at(self.geometry, values, linear);
        let speed = match self.static_speed {
            Some(speed) => speed[linear],
            None => self.provider.speed(index),
        };

        let mut rate = 0.0;
        let mut diffusion = 0.0;

        if params.curvature_weight != 0.0 {
            let coefficient = params.curvature_weight * speed;
            rate += coefficient * curvature_term(self.geometry, values, linear, &derivatives);
            diffusion = coefficient.abs();
        }

        if params.propagation_weight != 0.0 {
            let propagation = params.propagation_weight * params.expansion_sign() * speed;
            rate -= propagation * derivatives.propagation_magnitude(propagation, self.step);
        }

        if params.advection_weight != 0.0 {
            if let Some(velocity) = self.provider.advection(index) {
                let velocity = self
                    .geometry
                    .to_index_frame(&(velocity * params.advection_weight));
                rate -= derivatives.advection_rate(&velocity, self.step);
            }
        }

        (rate, diffusion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureImage;
    use levelset_types::{Point3, VoxelIndex};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn grid() -> GridGeometry {
        GridGeometry::planar(32, 32).unwrap()
    }

    fn disc(grid: &GridGeometry, radius: f64) -> InitialContour {
        InitialContour::sphere(grid, Point3::new(16.0, 16.0, 0.0), radius)
    }

    fn engine(params: EvolutionParams) -> LevelSetEngine<FeatureImage> {
        let grid = grid();
        let features = FeatureImage::uniform(grid.clone(), 1.0);
        let mut engine = LevelSetEngine::new(grid.clone(), features, params).unwrap();
        engine.initialize(&disc(&grid, 6.0)).unwrap();
        engine
    }

    struct NanSpeed {
        once: Option<AtomicBool>,
    }

    impl FeatureProvider for NanSpeed {
        fn speed(&self, _index: VoxelIndex) -> f64 {
            match &self.once {
                Some(fired) if fired.swap(true, Ordering::SeqCst) => 1.0,
                _ => f64::NAN,
            }
        }
    }

    #[derive(Default)]
    struct CountingSpeed {
        calls: AtomicUsize,
    }

    impl CountingSpeed {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FeatureProvider for CountingSpeed {
        fn speed(&self, _index: VoxelIndex) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            1.0
        }
    }

    #[test]
    fn invalid_params_rejected_up_front() {
        let params = EvolutionParams::default().with_window_size(0);
        let grid = grid();
        let result = LevelSetEngine::new(grid.clone(), FeatureImage::uniform(grid, 1.0), params);
        assert!(result.unwrap_err().is_config_error());
    }

    #[test]
    fn lifecycle_errors() {
        let grid = grid();
        let features = FeatureImage::uniform(grid.clone(), 1.0);
        let mut engine = LevelSetEngine::new(grid.clone(), features, EvolutionParams::default()).unwrap();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(matches!(engine.run(), Err(EvolutionError::NotInitialized)));

        engine.initialize(&disc(&grid, 5.0)).unwrap();
        assert_eq!(engine.state(), EngineState::Initialized);
        assert!(matches!(
            engine.initialize(&disc(&grid, 5.0)),
            Err(EvolutionError::AlreadyInitialized)
        ));
        assert!(matches!(engine.finalize(), Err(EvolutionError::NotTerminated)));
    }

    #[test]
    fn failed_initialize_leaves_engine_untouched() {
        let grid = grid();
        let features = FeatureImage::uniform(grid.clone(), 1.0);
        let mut engine = LevelSetEngine::new(grid, features, EvolutionParams::default()).unwrap();
        let bad = InitialContour::Mask(vec![true; 5]);
        assert!(engine.initialize(&bad).unwrap_err().is_config_error());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.field().is_none());
    }

    #[test]
    fn static_speed_on_other_grid_rejected() {
        let grid = grid();
        let features = FeatureImage::uniform(GridGeometry::planar(8, 8).unwrap(), 1.0);
        let params = EvolutionParams::default().with_propagation_weight(0.0);
        let mut engine = LevelSetEngine::new(grid.clone(), features, params).unwrap();
        let err = engine.initialize(&disc(&grid, 6.0)).unwrap_err();
        assert!(matches!(err, EvolutionError::Grid(GridError::SizeMismatch { .. })));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn provider_on_other_grid_rejected_for_every_weight() {
        let grid = grid();
        let small = GridGeometry::planar(8, 8).unwrap();
        let settings = [
            EvolutionParams::default(),
            EvolutionParams::default().with_propagation_weight(0.0),
            EvolutionParams::default()
                .with_curvature_weight(0.0)
                .with_advection_weight(1.0),
        ];
        for params in settings {
            let features = FeatureImage::uniform(small.clone(), 1.0);
            let mut engine =
                LevelSetEngine::new(grid.clone(), features, params.with_max_iterations(3)).unwrap();
            let err = engine.initialize(&disc(&grid, 6.0)).unwrap_err();
            assert!(err.is_config_error());
            assert!(matches!(err, EvolutionError::Grid(GridError::SizeMismatch { .. })));
            assert_eq!(engine.state(), EngineState::Uninitialized);
            assert!(matches!(engine.run(), Err(EvolutionError::NotInitialized)));
        }
    }

    #[test]
    fn voxels_outside_band_untouched_between_rebuilds() {
        let params = EvolutionParams::default().with_max_iterations(3);
        assert!(params.max_iterations < params.reinitialization_interval);
        let mut engine = engine(params);
        let before = engine.field().unwrap().values().to_vec();
        let band = engine.band().clone();
        assert!(!band.is_empty());

        engine.run().unwrap();
        assert_eq!(engine.iteration(), 3);

        let after = engine.field().unwrap().values();
        let mut moved_in_band = false;
        for (linear, (old, new)) in before.iter().zip(after).enumerate() {
            if band.contains(linear) {
                moved_in_band |= old != new;
            } else {
                assert_eq!(old.to_bits(), new.to_bits(), "voxel {linear} changed outside the band");
            }
        }
        assert!(moved_in_band);
    }

    #[test]
    fn provider_sampled_once_per_band_voxel() {
        let grid = grid();
        let params = EvolutionParams::default().with_max_iterations(2);
        let mut engine = LevelSetEngine::new(grid.clone(), CountingSpeed::default(), params).unwrap();
        engine.initialize(&disc(&grid, 6.0)).unwrap();
        let band = engine.band().len();

        engine.run().unwrap();
        assert_eq!(engine.provider().calls(), 2 * band);
    }

    #[test]
    fn finite_rates_survive_halved_step() {
        let grid = GridGeometry::planar(4, 1).unwrap();
        let provider = CountingSpeed::default();
        let params = EvolutionParams::default();
        let step = params.step_function().unwrap();
        let forces = Forces {
            geometry: &grid,
            provider: &provider,
            params: &params,
            step: &step,
            static_speed: None,
        };
        let values = [f64::MAX / 1.5, 0.0, 0.0, 0.0];
        let band = [0];
        let update = Update {
            rates: vec![1.0],
            time_step: f64::MAX / 2.0,
        };
        assert!(!update.commits_finite(&values, &band));

        let update = forces.stabilize(&values, &band, update, 7).unwrap();
        assert_eq!(update.rates, vec![1.0]);
        assert_eq!(update.time_step.to_bits(), (f64::MAX / 4.0).to_bits());
        assert_eq!(provider.calls(), 0);

        let hopeless = Update {
            rates: vec![1.0],
            time_step: f64::MAX,
        };
        let err = forces.stabilize(&[f64::MAX; 4], &band, hopeless, 7).unwrap_err();
        assert!(matches!(
            err,
            EvolutionError::NumericalInstability { iteration: 7, .. }
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn positive_speed_grows_and_reverse_shrinks() {
        let params = EvolutionParams::default()
            .with_curvature_weight(0.0)
            .with_max_iterations(10);
        let mut grow = engine(params.clone());
        let before = grow.field().unwrap().inside_count();
        grow.run().unwrap();
        assert!(grow.field().unwrap().inside_count() > before);

        let mut shrink = engine(params.with_reverse_expansion_direction(true));
        shrink.run().unwrap();
        assert!(shrink.field().unwrap().inside_count() < before);
    }

    #[test]
    fn curvature_alone_shrinks_disc() {
        let params = EvolutionParams::default()
            .with_propagation_weight(0.0)
            .with_max_iterations(40);
        let mut engine = engine(params);
        let before = engine.field().unwrap().inside_count();
        engine.run().unwrap();
        assert!(engine.field().unwrap().inside_count() < before);
    }

    #[test]
    fn run_is_idempotent_after_termination() {
        let mut engine = engine(EvolutionParams::default().with_max_iterations(3));
        assert_eq!(engine.run().unwrap(), Termination::IterationLimitReached);
        assert_eq!(engine.run().unwrap(), Termination::IterationLimitReached);
        assert_eq!(engine.iteration(), 3);
        assert_eq!(engine.iteration_log().len(), 3);
    }

    #[test]
    fn log_records_every_iteration() {
        let mut engine = engine(EvolutionParams::default().with_max_iterations(7));
        engine.run().unwrap();
        let output = engine.finalize().unwrap();
        let indices: Vec<u32> = output.log.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
        assert!(output.log.iter().all(|r| r.time_step > 0.0 && r.time_step <= 0.25));
        assert!(output.log.iter().all(|r| r.energy.is_finite()));
        assert!(!output.metadata.converged);
    }

    #[test]
    fn persistent_nan_aborts_with_field_intact() {
        let grid = grid();
        let mut engine =
            LevelSetEngine::new(grid.clone(), NanSpeed { once: None }, EvolutionParams::default())
                .unwrap();
        engine.initialize(&disc(&grid, 6.0)).unwrap();
        let before = engine.field().unwrap().clone();

        let err = engine.run().unwrap_err();
        assert!(err.is_numerical_instability());
        assert!(matches!(
            err,
            EvolutionError::NumericalInstability { iteration: 0, .. }
        ));
        assert_eq!(engine.state(), EngineState::Aborted);
        assert_eq!(engine.field().unwrap(), &before);

        let output = engine.finalize().unwrap();
        assert_eq!(output.metadata.termination, Termination::Aborted);
        assert_eq!(output.metadata.iterations_run, 0);
        assert!(!output.metadata.converged);
    }

    #[test]
    fn single_nan_is_retried() {
        let grid = grid();
        let provider = NanSpeed {
            once: Some(AtomicBool::new(false)),
        };
        let params = EvolutionParams::default().with_max_iterations(4);
        let mut engine = LevelSetEngine::new(grid.clone(), provider, params).unwrap();
        engine.initialize(&disc(&grid, 6.0)).unwrap();

        assert_eq!(engine.run().unwrap(), Termination::IterationLimitReached);
        assert!(engine.field().unwrap().values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn evolve_reports_instability() {
        let grid = grid();
        let err = evolve(
            grid.clone(),
            NanSpeed { once: None },
            &disc(&grid, 6.0),
            &EvolutionParams::default(),
        )
        .unwrap_err();
        assert!(err.is_numerical_instability());
    }

    #[test]
    fn cancelled_before_run() {
        let token = CancellationToken::new();
        let mut engine = engine(EvolutionParams::default()).with_cancellation(token.clone());
        token.cancel();
        assert_eq!(engine.run().unwrap(), Termination::Cancelled);
        let output = engine.finalize().unwrap();
        assert_eq!(output.metadata.iterations_run, 0);
        assert!(!output.metadata.converged);
    }

    #[test]
    fn surface_points_on_request() {
        let params = EvolutionParams::default()
            .with_max_iterations(2)
            .with_interpolate_surface_location(true);
        let mut engine = engine(params);
        engine.run().unwrap();
        let output = engine.finalize().unwrap();
        let surface = output.surface.unwrap();
        assert!(!surface.is_empty());
        let center = Point3::new(16.0, 16.0, 0.0);
        assert!(surface.iter().all(|p| ((p - center).norm() - 6.0).abs() < 1.5));
    }

    #[test]
    fn set_epsilon_validates() {
        let mut engine = engine(EvolutionParams::default());
        assert!(engine.set_epsilon(-1.0).is_err());
        assert!((engine.step_function().epsilon() - 0.05).abs() < 1e-15);
        engine.set_epsilon(0.2).unwrap();
        assert!((engine.params().epsilon - 0.2).abs() < 1e-15);
    }
}
