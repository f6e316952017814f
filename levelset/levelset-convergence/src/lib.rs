//! Convergence monitoring for iterative level-set evolution.
//!
//! Iterative solvers report one scalar "energy" per iteration. The trace is
//! noisy, so comparing consecutive values is a poor stopping rule. The
//! [`WindowConvergenceMonitor`] keeps the last few values and fits a line to
//! them; the normalized slope tells the caller whether the trace has
//! flattened.
//!
//! The monitor has no internal synchronization. Values computed by parallel
//! workers must be reduced on one thread before they are added.
//!
//! # Example
//!
//! ```
//! use levelset_convergence::WindowConvergenceMonitor;
//!
//! let mut monitor = WindowConvergenceMonitor::new(4).unwrap();
//! for energy in [1.0, 0.5, 0.5, 0.5, 0.5] {
//!     monitor.add_energy_value(energy);
//! }
//!
//! assert!(monitor.is_full());
//! assert!(monitor.convergence_value().abs() < 1e-12);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod window;

pub use error::{ConvergenceError, ConvergenceResult};
pub use window::WindowConvergenceMonitor;
