//! Pairwise potential models evaluated through the permutohedral lattice.
//!
//! Every model implements [`PairwisePotential::apply`]: filter a belief
//! matrix defined on its source points and *accumulate* the resulting
//! pairwise energy into a matrix defined on its target points. The
//! mean-field loop sums the contributions of all registered models each
//! step.
//!
//! - [`PottsPotential`] – Gaussian-kernel Potts model, optionally turned
//!   into a semi-metric model by a [`SemiMetric`] label transform. Built
//!   either over one feature set or bipartite (source set → target set).
//! - [`CompatibilityMatrix`] – dense μ-matrix semi-metric.

mod potts;
mod semimetric;

pub use potts::PottsPotential;
pub use semimetric::{CompatibilityMatrix, SemiMetric};

use crate::lattice::{LatticeStats, LatticeWorkspace};
use crate::matrix::RowMatrix;

pub trait PairwisePotential: Send + Sync {
    /// Rows expected in the belief passed to [`PairwisePotential::apply`].
    fn source_points(&self) -> usize;

    /// Rows of the energy matrix [`PairwisePotential::apply`] writes to.
    fn target_points(&self) -> usize;

    /// Number of labels the model requires, if it constrains them.
    fn labels(&self) -> Option<usize> {
        None
    }

    /// Add this model's pairwise energy for `belief` into `energy`.
    ///
    /// `belief` is `source_points × S`, `energy` is `target_points × S`.
    fn apply(&self, belief: &RowMatrix, energy: &mut RowMatrix, scratch: &mut PotentialScratch);

    /// Size of the lattice backing this model, for run reports.
    fn lattice_stats(&self) -> Option<LatticeStats> {
        None
    }
}

/// Caller-owned buffers reused by [`PairwisePotential::apply`] across calls.
#[derive(Clone, Debug, Default)]
pub struct PotentialScratch {
    pub(crate) workspace: LatticeWorkspace,
    pub(crate) filtered: RowMatrix,
    pub(crate) transformed: Vec<f32>,
}

impl PotentialScratch {
    pub fn new() -> Self {
        Self::default()
    }
}
