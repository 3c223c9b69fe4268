#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod grid;
pub mod image;
pub mod inference;
pub mod matrix;
pub mod params;
pub mod potential;

// Lower-level building blocks, public for callers that drive the lattice
// directly.
pub mod lattice;
pub mod parallel;

// --- High-level re-exports -------------------------------------------------

// Main entry points: CRF, inference session and results.
pub use crate::inference::{
    BipartiteDenseCrf, DenseCrf, InferenceOutcome, MeanField, UnaryPotentials,
};
pub use crate::matrix::RowMatrix;

// Pairwise models and their parameters.
pub use crate::params::{
    BilateralKernelParams, GaussianKernelParams, InferenceParams, Normalization, PairwiseParams,
};
pub use crate::potential::{CompatibilityMatrix, PairwisePotential, PottsPotential, SemiMetric};

pub use crate::diagnostics::InferenceReport;
pub use crate::error::CrfError;
pub use crate::filter::Filter;
pub use crate::lattice::Lattice;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use dense_crf::prelude::*;
///
/// # fn main() -> Result<(), CrfError> {
/// let (w, h) = (320usize, 240usize);
/// let rgb = vec![0u8; w * h * 3];
/// let image = ImageU8::new(w, h, 3, &rgb)?;
///
/// // Two-label probabilities from some per-pixel classifier.
/// let probs = RowMatrix::filled(w * h, 2, 0.5);
/// let mut crf = DenseCrf::from_probabilities(probs)?;
/// crf.add_gaussian_kernel(w, h, &GaussianKernelParams::default())?;
/// crf.add_bilateral_kernel(&image, &BilateralKernelParams::default())?;
///
/// let outcome = crf.run(&InferenceParams::default())?;
/// println!(
///     "labels={:?} total_ms={:.3}",
///     outcome.report.label_histogram, outcome.report.timings.total_ms
/// );
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::ImageU8;
    pub use crate::{
        BilateralKernelParams, CrfError, DenseCrf, GaussianKernelParams, InferenceParams,
        PairwiseParams, RowMatrix,
    };
}
