//! Windowed energy trend estimation.

use std::collections::VecDeque;

use crate::error::{ConvergenceError, ConvergenceResult};

/// Below this absolute window mean the slope is returned unnormalized.
const MEAN_FLOOR: f64 = 1e-12;

/// Tracks the most recent energy values of an iterative process and
/// estimates whether their trend has flattened.
///
/// The window is a FIFO of at most `window_size` values. A running sum is
/// maintained on every insertion and eviction so the mean is O(1).
///
/// # Convergence value
///
/// [`convergence_value`](Self::convergence_value) fits a line by ordinary
/// least squares to the pairs `(i, energy_i)`, `i = 0..n`, oldest first, and
/// returns
///
/// ```text
/// slope / |mean|        if |mean| > 1e-12
/// slope                 otherwise
/// ```
///
/// i.e. the relative change of the energy per iteration. A value near zero
/// means the trace is flat. With fewer than two values the result is `0.0`;
/// callers should also check [`is_full`](Self::is_full) before treating a
/// small value as convergence.
///
/// # Example
///
/// ```
/// use levelset_convergence::WindowConvergenceMonitor;
///
/// let mut monitor = WindowConvergenceMonitor::new(5).unwrap();
/// for energy in [10.0, 8.0, 6.0, 4.0, 2.0] {
///     monitor.add_energy_value(energy);
/// }
///
/// // slope -2, mean 6
/// assert!((monitor.convergence_value() + 2.0 / 6.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowConvergenceMonitor {
    window_size: usize,
    values: VecDeque<f64>,
    total_energy: f64,
}

impl Default for WindowConvergenceMonitor {
    fn default() -> Self {
        Self {
            window_size: 10,
            values: VecDeque::with_capacity(10),
            total_energy: 0.0,
        }
    }
}

impl WindowConvergenceMonitor {
    /// Creates an empty monitor.
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::InvalidWindowSize`] if `window_size` is zero.
    pub fn new(window_size: usize) -> ConvergenceResult<Self> {
        if window_size == 0 {
            return Err(ConvergenceError::InvalidWindowSize(window_size));
        }
        Ok(Self {
            window_size,
            values: VecDeque::with_capacity(window_size),
            total_energy: 0.0,
        })
    }

    /// Appends an energy value, evicting the oldest one if the window is full.
    pub fn add_energy_value(&mut self, value: f64) {
        if self.values.len() == self.window_size {
            if let Some(oldest) = self.values.pop_front() {
                self.total_energy -= oldest;
            }
        }
        self.values.push_back(value);
        self.total_energy += value;
    }

    /// Empties the window and resets the running sum.
    pub fn clear_energy_values(&mut self) {
        self.values.clear();
        self.total_energy = 0.0;
    }

    /// Changes the window capacity.
    ///
    /// Shrinking evicts the oldest values until the window fits.
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::InvalidWindowSize`] if `window_size` is zero.
    pub fn set_window_size(&mut self, window_size: usize) -> ConvergenceResult<()> {
        if window_size == 0 {
            return Err(ConvergenceError::InvalidWindowSize(window_size));
        }
        self.window_size = window_size;
        while self.values.len() > window_size {
            if let Some(oldest) = self.values.pop_front() {
                self.total_energy -= oldest;
            }
        }
        Ok(())
    }

    /// Window capacity.
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of values currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the window holds `window_size` values.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.values.len() == self.window_size
    }

    /// Values in the window, oldest first.
    pub fn energy_values(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Mean of the window, or `0.0` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_energy(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.total_energy / self.values.len() as f64
        }
    }

    /// Least-squares slope of the window normalized by its mean.
    ///
    /// See the type documentation for the exact formula.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn convergence_value(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }

        let count = n as f64;
        let x_mean = (count - 1.0) * 0.5;
        let mean = self.total_energy / count;

        // sum((x - x_mean)^2) for x = 0..n
        let sxx = count * (count * count - 1.0) / 12.0;
        let sxy: f64 = self
            .values
            .iter()
            .enumerate()
            .map(|(i, &y)| (i as f64 - x_mean) * (y - mean))
            .sum();

        let slope = sxy / sxx;
        if mean.abs() > MEAN_FLOOR {
            slope / mean.abs()
        } else {
            slope
        }
    }
}
