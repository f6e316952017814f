//! Narrow-band level-set evolution for active-contour segmentation.
//!
//! A contour is represented implicitly as the zero level set of a scalar
//! field `phi` (negative inside). The field evolves under
//!
//! ```text
//! dphi/dt = w_c * g * kappa * |grad phi| - w_p * s * g * |grad phi| - w_a * v . grad phi
//! ```
//!
//! where `g` and `v` come from a [`FeatureProvider`]. Only voxels in a
//! narrow band around the contour are updated; the band is rebuilt and the
//! field reset to a signed distance every few iterations.
//!
//! # Workflow
//!
//! 1. Build [`EvolutionParams`] and a provider (e.g. [`FeatureImage`]).
//! 2. Create a [`LevelSetEngine`] and [`initialize`](LevelSetEngine::initialize)
//!    it with an [`InitialContour`].
//! 3. [`run`](LevelSetEngine::run) until convergence, the iteration cap or
//!    cancellation.
//! 4. [`finalize`](LevelSetEngine::finalize) into an [`EvolutionOutput`].
//!
//! [`evolve`] does all four in one call.
//!
//! # Threading
//!
//! Per-voxel rates are computed with rayon from a read-only snapshot of the
//! field. Committing updates, rebuilding the band and feeding the
//! convergence monitor happen on the calling thread.
//!
//! # Example
//!
//! ```
//! use levelset_evolve::{EvolutionParams, FeatureImage, InitialContour, evolve};
//! use levelset_types::GridGeometry;
//!
//! let grid = GridGeometry::planar(20, 20).unwrap();
//! let mut mask = vec![false; grid.len()];
//! for y in 8..12 {
//!     for x in 8..12 {
//!         mask[x + 20 * y] = true;
//!     }
//! }
//!
//! let features = FeatureImage::uniform(grid.clone(), 1.0);
//! let params = EvolutionParams::fast().with_max_iterations(4);
//! let output = evolve(grid, features, &InitialContour::Mask(mask), &params).unwrap();
//! assert_eq!(output.metadata.iterations_run, 4);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod band;
mod cancel;
mod distance;
mod engine;
mod error;
mod feature;
mod params;
mod result;
mod stencil;

pub use band::NarrowBand;
pub use cancel::CancellationToken;
pub use distance::{InitialContour, mask_to_field, reinitialize};
pub use engine::{EngineState, LevelSetEngine, evolve};
pub use error::{EvolutionError, EvolutionResult};
pub use feature::{FeatureImage, FeatureProvider};
pub use params::EvolutionParams;
pub use result::{EvolutionOutput, IterationRecord, RunMetadata, Termination};
pub use stencil::{Derivatives, curvature_term};
