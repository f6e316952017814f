//! Error types for convergence monitoring.

use thiserror::Error;

/// Result type for convergence monitor operations.
pub type ConvergenceResult<T> = Result<T, ConvergenceError>;

/// Errors that can occur when configuring a convergence monitor.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceError {
    /// The window must hold at least one value.
    #[error("window size must be greater than zero, got {0}")]
    InvalidWindowSize(usize),
}
