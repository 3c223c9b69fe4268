//! Label-compatibility transforms for non-Potts pairwise models.
//!
//! A semi-metric maps the filtered label distribution of a point to a
//! per-label cost, `v_i = Σ_j μ_ij u_j`. The Potts model is the special case
//! where the transform is omitted entirely.
use crate::error::CrfError;
use nalgebra::{DMatrix, DVectorView, DVectorViewMut};

pub trait SemiMetric: Send + Sync {
    /// Transform one row of `S` filtered values into `S` label costs.
    fn apply(&self, input: &[f32], output: &mut [f32]);

    /// Number of labels the transform expects, if fixed.
    fn labels(&self) -> Option<usize> {
        None
    }
}

impl<F> SemiMetric for F
where
    F: Fn(&[f32], &mut [f32]) + Send + Sync,
{
    fn apply(&self, input: &[f32], output: &mut [f32]) {
        self(input, output)
    }
}

/// Dense `S × S` compatibility matrix μ.
#[derive(Clone, Debug, PartialEq)]
pub struct CompatibilityMatrix {
    mu: DMatrix<f32>,
}

impl CompatibilityMatrix {
    pub fn new(mu: DMatrix<f32>) -> Result<Self, CrfError> {
        if mu.nrows() != mu.ncols() {
            return Err(CrfError::shape(
                "compatibility matrix",
                (mu.nrows(), mu.nrows()),
                mu.shape(),
            ));
        }
        if mu.nrows() == 0 {
            return Err(CrfError::NoLabels);
        }
        Ok(Self { mu })
    }

    /// Build μ from a label distance function, e.g. `|a - b|` for ordinal labels.
    pub fn from_fn(
        labels: usize,
        distance: impl Fn(usize, usize) -> f32,
    ) -> Result<Self, CrfError> {
        Self::new(DMatrix::from_fn(labels, labels, distance))
    }

    pub fn matrix(&self) -> &DMatrix<f32> {
        &self.mu
    }
}

impl SemiMetric for CompatibilityMatrix {
    fn apply(&self, input: &[f32], output: &mut [f32]) {
        let n = self.mu.nrows();
        let u = DVectorView::from_slice(input, n);
        let mut v = DVectorViewMut::from_slice(output, n);
        self.mu.mul_to(&u, &mut v);
    }

    fn labels(&self) -> Option<usize> {
        Some(self.mu.nrows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility_matrix_multiplies_rows() {
        let metric = CompatibilityMatrix::from_fn(3, |a, b| (a as f32 - b as f32).abs()).unwrap();
        let mut out = [0.0f32; 3];
        metric.apply(&[1.0, 0.0, 0.0], &mut out);
        assert_eq!(out, [0.0, 1.0, 2.0]);
        assert_eq!(metric.labels(), Some(3));
    }

    #[test]
    fn rejects_non_square_matrix() {
        assert!(CompatibilityMatrix::new(DMatrix::zeros(2, 3)).is_err());
        assert!(matches!(
            CompatibilityMatrix::new(DMatrix::zeros(0, 0)),
            Err(CrfError::NoLabels)
        ));
    }

    #[test]
    fn closures_are_semimetrics() {
        let swap = |input: &[f32], output: &mut [f32]| {
            output[0] = input[1];
            output[1] = input[0];
        };
        let mut out = [0.0; 2];
        SemiMetric::apply(&swap, &[0.25, 0.75], &mut out);
        assert_eq!(out, [0.75, 0.25]);
        assert_eq!(SemiMetric::labels(&swap), None);
    }
}
