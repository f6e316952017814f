//! Grid geometry and scalar field types for level-set evolution.
//!
//! This crate provides the data model shared by the level-set crates:
//!
//! - [`GridGeometry`] - Voxel counts, spacing, origin and orientation of an image grid
//! - [`VoxelIndex`] - Integer voxel position
//! - [`ScalarField`] - One real value per voxel (the level-set function)
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with no I/O. Images are supplied and consumed
//! as plain buffers by the caller.
//!
//! # Example
//!
//! ```
//! use levelset_types::{GridGeometry, ScalarField};
//! use nalgebra::Point3;
//!
//! let grid = GridGeometry::planar(16, 16).unwrap();
//! let center = Point3::new(7.5, 7.5, 0.0);
//!
//! // Signed distance to a circle of radius 4, negative inside
//! let field = ScalarField::from_fn(grid, |p| (p - center).norm() - 4.0);
//!
//! assert!(field.inside_count() > 0);
//! assert!(!field.zero_crossings().is_empty());
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod field;
mod geometry;

pub use error::{GridError, GridResult};
pub use field::ScalarField;
pub use geometry::{GridGeometry, VoxelIndex};

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Point3, Vector3};
