//! Level-set active-contour segmentation.
//!
//! This umbrella crate re-exports the levelset-* crates. All of them are
//! pure computation with no I/O; images come in as feature providers and
//! results go out as scalar fields.
//!
//! # Quick Start
//!
//! ```
//! use levelset::prelude::*;
//!
//! let grid = GridGeometry::planar(40, 40).unwrap();
//! let center = Point3::new(20.0, 20.0, 0.0);
//!
//! // Speed drops to zero on a ring of radius 12.
//! let features = FeatureImage::from_fn(grid.clone(), |p| {
//!     if (p - center).norm() < 12.0 { 1.0 } else { 0.0 }
//! });
//! let seed = InitialContour::sphere(&grid, center, 4.0);
//!
//! let params = EvolutionParams::default()
//!     .with_curvature_weight(0.1)
//!     .with_convergence_tolerance(0.0)
//!     .with_max_iterations(60);
//! let output = evolve(grid, features, &seed, &params).unwrap();
//!
//! let mask = output.mask();
//! assert!(mask.iter().filter(|&&inside| inside).count() > 100);
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - `GridGeometry`, `VoxelIndex`, `ScalarField`
//! - [`heaviside`] - Regularized step functions (`Tanh`, `Atan`, `Sin`)
//! - [`convergence`] - Sliding-window convergence monitor
//! - [`evolve`] - Narrow-band evolution engine, feature providers, parameters
//!
//! # Feature Flags
//!
//! - `serde` - Serialize parameters, grid types and run metadata

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

// =============================================================================
// Re-exports
// =============================================================================

/// Grid geometry and scalar fields.
pub use levelset_types as types;

/// Regularized Heaviside step functions.
pub use levelset_heaviside as heaviside;

/// Sliding-window convergence monitoring.
pub use levelset_convergence as convergence;

/// Narrow-band level-set evolution.
pub use levelset_evolve as evolve;

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for level-set segmentation.
///
/// # Usage
///
/// ```
/// use levelset::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use levelset_types::{GridGeometry, Point3, ScalarField, Vector3, VoxelIndex};

    // Leaves
    pub use levelset_convergence::WindowConvergenceMonitor;
    pub use levelset_heaviside::{RegularizedStepFunction, StepShape};

    // Evolution
    pub use levelset_evolve::{
        CancellationToken, EvolutionError, EvolutionOutput, EvolutionParams, FeatureImage,
        FeatureProvider, InitialContour, LevelSetEngine, RunMetadata, Termination, evolve,
    };
}
