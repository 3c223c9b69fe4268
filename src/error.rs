//! Error type shared by every fallible constructor and call in the crate.
//!
//! Only malformed inputs are reported here. Numeric hazards (softmax
//! underflow, divide-by-density) are guarded where they occur, and broken
//! internal invariants are debug assertions rather than error values.

use thiserror::Error;

/// Reasons why a lattice, potential, CRF or filter call rejected its input.
#[derive(Debug, Error)]
pub enum CrfError {
    #[error("feature set is empty")]
    EmptyFeatures,

    #[error("feature vectors must have at least one dimension")]
    ZeroFeatureDimension,

    #[error("feature {dim} of point {point} is not finite")]
    NonFiniteFeature { point: usize, dim: usize },

    #[error("feature of point {point} is too large for the lattice (elevated limit {limit})")]
    FeatureOutOfRange { point: usize, limit: f32 },

    #[error("unary energy of label {label} at point {point} is not finite")]
    NonFiniteUnary { point: usize, label: usize },

    #[error("probability {value} of label {label} at point {point} is negative or not finite")]
    InvalidProbability { point: usize, label: usize, value: f32 },

    #[error("feature dimension mismatch (expected {expected}, found {found})")]
    FeatureDimension { expected: usize, found: usize },

    #[error("{context}: expected (rows, cols) = {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("buffer holds {found} values, shape requires {expected}")]
    BufferLength { expected: usize, found: usize },

    #[error("at least one label is required")]
    NoLabels,

    #[error("label count mismatch (expected {expected}, found {found})")]
    LabelCount { expected: usize, found: usize },

    #[error("point range {start}..{end} exceeds the {points} points of the lattice")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        points: usize,
    },

    #[error("relaxation factor must lie in (0, 1], got {0}")]
    InvalidRelax(f32),

    #[error("label {label} of point {point} is outside 0..{labels}")]
    LabelOutOfRange {
        point: usize,
        label: usize,
        labels: usize,
    },

    #[error("pairwise term {index} does not exist ({count} registered)")]
    PotentialIndex { index: usize, count: usize },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl CrfError {
    pub(crate) fn shape(
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Self {
        CrfError::ShapeMismatch {
            context,
            expected,
            found,
        }
    }
}
