//! Output of an evolution run.

use std::time::Duration;

use levelset_types::{Point3, ScalarField};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Termination {
    /// The windowed energy trend dropped below the tolerance.
    Converged,
    /// `max_iterations` iterations ran without converging.
    IterationLimitReached,
    /// A [`CancellationToken`](crate::CancellationToken) was triggered.
    Cancelled,
    /// The update stayed non-finite after the halved-step retry.
    Aborted,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Converged => "converged",
            Self::IterationLimitReached => "iteration limit reached",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Summary of a finished run.
///
/// Callers should check [`converged`](Self::converged): reaching the
/// iteration limit is reported here, never as an error.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunMetadata {
    /// Number of completed iterations.
    pub iterations_run: u32,
    /// Convergence value after the last iteration (0 if none ran).
    pub final_convergence_value: f64,
    /// Whether the run converged.
    pub converged: bool,
    /// Why the run stopped.
    pub termination: Termination,
}

/// One entry of the iteration log.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub index: u32,
    /// Energy fed to the convergence monitor.
    pub energy: f64,
    /// Time step actually used.
    pub time_step: f64,
    /// Convergence value after adding the energy.
    pub convergence_value: f64,
    /// Wall time of the iteration, including any band rebuild.
    pub elapsed: Duration,
}

/// Final field, metadata and log of a run.
#[derive(Debug, Clone)]
pub struct EvolutionOutput {
    /// Final level-set function (negative inside).
    pub field: ScalarField,
    /// Run summary.
    pub metadata: RunMetadata,
    /// One record per completed iteration.
    pub log: Vec<IterationRecord>,
    /// Sub-voxel zero-crossing points, when surface interpolation was requested.
    pub surface: Option<Vec<Point3<f64>>>,
}

impl EvolutionOutput {
    /// Binary segmentation: `true` where the field is `<= 0`.
    #[must_use]
    pub fn mask(&self) -> Vec<bool> {
        self.field.to_mask(0.0)
    }

    /// Total wall time over all iterations.
    #[must_use]
    pub fn total_elapsed(&self) -> Duration {
        self.log.iter().map(|record| record.elapsed).sum()
    }
}

impl std::fmt::Display for EvolutionOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (nx, ny, nz) = self.field.geometry().dimensions();
        writeln!(f, "Level-Set Evolution:")?;
        writeln!(f, "  Grid: {nx} x {ny} x {nz}")?;
        writeln!(f, "  Iterations: {}", self.metadata.iterations_run)?;
        writeln!(f, "  Termination: {}", self.metadata.termination)?;
        writeln!(
            f,
            "  Final convergence value: {:.3e}",
            self.metadata.final_convergence_value
        )?;
        writeln!(f, "  Inside voxels: {}", self.field.inside_count())?;
        if let Some(surface) = &self.surface {
            writeln!(f, "  Surface points: {}", surface.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelset_types::GridGeometry;

    fn output() -> EvolutionOutput {
        let grid = GridGeometry::planar(3, 1).unwrap();
        let field = ScalarField::from_values(grid, vec![-1.0, 0.0, 1.0]).unwrap();
        EvolutionOutput {
            field,
            metadata: RunMetadata {
                iterations_run: 2,
                final_convergence_value: 1e-4,
                converged: true,
                termination: Termination::Converged,
            },
            log: vec![
                IterationRecord {
                    index: 0,
                    energy: 0.2,
                    time_step: 0.25,
                    convergence_value: 0.0,
                    elapsed: Duration::from_millis(3),
                },
                IterationRecord {
                    index: 1,
                    energy: 0.1,
                    time_step: 0.25,
                    convergence_value: 1e-4,
                    elapsed: Duration::from_millis(2),
                },
            ],
            surface: None,
        }
    }

    #[test]
    fn mask_includes_zero() {
        assert_eq!(output().mask(), vec![true, true, false]);
    }

    #[test]
    fn total_elapsed_sums_log() {
        assert_eq!(output().total_elapsed(), Duration::from_millis(5));
    }

    #[test]
    fn display() {
        let text = output().to_string();
        assert!(text.contains("Iterations: 2"));
        assert!(text.contains("Termination: converged"));
        assert!(text.contains("Inside voxels: 2"));
        assert!(!text.contains("Surface points"));
    }
}
