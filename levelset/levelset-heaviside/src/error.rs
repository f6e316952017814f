//! Error types for step function configuration.

use thiserror::Error;

/// Result type for step function operations.
pub type HeavisideResult<T> = Result<T, HeavisideError>;

/// Errors that can occur when configuring a step function.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum HeavisideError {
    /// The half-width must be a positive finite number.
    #[error("epsilon must be positive and finite, got {0}")]
    InvalidEpsilon(f64),
}
