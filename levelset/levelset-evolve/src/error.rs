//! Error types for level-set evolution.

use levelset_convergence::ConvergenceError;
use levelset_heaviside::HeavisideError;
use levelset_types::GridError;
use thiserror::Error;

/// Result type for evolution operations.
pub type EvolutionResult<T> = Result<T, EvolutionError>;

/// Errors that can occur while configuring or running an evolution.
///
/// Reaching the iteration limit is not an error; it is reported through
/// [`Termination::IterationLimitReached`](crate::Termination::IterationLimitReached).
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// Invalid parameter combination.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Degenerate grid or mismatched buffer.
    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),

    /// Invalid step function half-width.
    #[error("invalid step function: {0}")]
    StepFunction(#[from] HeavisideError),

    /// Invalid convergence window.
    #[error("invalid convergence monitor: {0}")]
    Convergence(#[from] ConvergenceError),

    /// The update stayed non-finite after retrying with a halved time step.
    #[error("non-finite update at iteration {iteration} after retrying with time step {time_step}")]
    NumericalInstability {
        /// Iteration that failed (zero-based).
        iteration: u32,
        /// Time step used by the failed retry.
        time_step: f64,
    },

    /// `run` or `finalize` called before `initialize`.
    #[error("engine has not been initialized")]
    NotInitialized,

    /// `initialize` called twice.
    #[error("engine has already been initialized")]
    AlreadyInitialized,

    /// `finalize` called before the run terminated.
    #[error("evolution has not terminated")]
    NotTerminated,
}

impl EvolutionError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Check if this is a configuration error (detected before iterating).
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::Grid(_)
                | Self::StepFunction(_)
                | Self::Convergence(_)
        )
    }

    /// Check if this is a numerical instability error.
    #[must_use]
    pub const fn is_numerical_instability(&self) -> bool {
        matches!(self, Self::NumericalInstability { .. })
    }
}
