//! Regularized Heaviside step functions for level-set forces.
//!
//! Region-dependent forces in level-set segmentation switch on the sign of
//! a quantity. A hard sign is discontinuous, so the forces built on it are
//! not differentiable at the contour. This crate provides smooth surrogates:
//!
//! - [`RegularizedStepFunction::evaluate`] - smoothed step `H(x)` in `[0, 1]`
//! - [`RegularizedStepFunction::evaluate_derivative`] - smoothed Dirac impulse `H'(x)`
//!
//! Three transition shapes are available through [`StepShape`]:
//!
//! | Shape | Support | Tails |
//! |-------|---------|-------|
//! | `Tanh` | unbounded | exponential |
//! | `Atan` | unbounded | algebraic |
//! | `Sin` | `[-eps, eps]` | none |
//!
//! # Example
//!
//! ```
//! use levelset_heaviside::RegularizedStepFunction;
//!
//! let h = RegularizedStepFunction::tanh(0.5).unwrap();
//! let inside_weight = h.evaluate(-2.0);
//! let outside_weight = h.evaluate(2.0);
//! assert!(inside_weight < 0.01 && outside_weight > 0.99);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod step;

pub use error::{HeavisideError, HeavisideResult};
pub use step::{RegularizedStepFunction, StepShape};
