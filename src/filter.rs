//! Simplified Gaussian filtering façade over a [`Lattice`].
//!
//! The kernel has unit standard deviation in feature space; other
//! bandwidths are obtained by dividing the features by the desired sigma
//! before building the filter.
use crate::error::CrfError;
use crate::lattice::{Lattice, LatticeWorkspace};
use crate::matrix::RowMatrix;
use std::ops::Range;

#[derive(Clone, Debug)]
pub struct Filter {
    lattice: Lattice,
    source: Range<usize>,
    target: Range<usize>,
}

impl Filter {
    /// Filter values defined on `features` back onto the same points.
    pub fn new(features: &RowMatrix) -> Result<Self, CrfError> {
        let lattice = Lattice::new(features)?;
        let all = 0..features.rows;
        Ok(Self {
            lattice,
            source: all.clone(),
            target: all,
        })
    }

    /// Filter values defined on `source` points onto `target` points.
    pub fn cross(source: &RowMatrix, target: &RowMatrix) -> Result<Self, CrfError> {
        if source.rows == 0 || target.rows == 0 {
            return Err(CrfError::EmptyFeatures);
        }
        let lattice = Lattice::new(&source.vstack(target)?)?;
        Ok(Self {
            lattice,
            source: 0..source.rows,
            target: source.rows..source.rows + target.rows,
        })
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Filter `values` (`source points × C`) into a `target points × C` matrix.
    pub fn filter(&self, values: &RowMatrix) -> Result<RowMatrix, CrfError> {
        let mut out = RowMatrix::new(self.target.len(), values.cols);
        values.ensure_shape("filter input", self.source.len(), values.cols)?;
        self.lattice.compute_with(
            values,
            &mut out,
            self.source.clone(),
            self.target.clone(),
            &mut LatticeWorkspace::new(),
        )?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_filter_maps_source_onto_target() {
        let source = RowMatrix::from_rows(&[[0.0, 0.0], [0.2, 0.1]]).unwrap();
        let target = RowMatrix::from_rows(&[[0.1, 0.0], [40.0, 40.0], [0.0, 0.1]]).unwrap();
        let filter = Filter::cross(&source, &target).unwrap();
        let values = RowMatrix::filled(2, 1, 1.0);
        let out = filter.filter(&values).unwrap();
        assert_eq!(out.shape(), (3, 1));
        assert!(out.get(0, 0) > 0.1);
        assert!(out.get(2, 0) > 0.1);
        assert!(out.get(1, 0).abs() < 1e-6);
    }

    #[test]
    fn cross_filter_rejects_dimension_mismatch() {
        let source = RowMatrix::new(2, 2);
        let target = RowMatrix::new(2, 3);
        assert!(matches!(
            Filter::cross(&source, &target),
            Err(CrfError::FeatureDimension {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn filter_rejects_wrong_row_count() {
        let filter = Filter::new(&RowMatrix::new(3, 2)).unwrap();
        assert!(filter.filter(&RowMatrix::new(2, 1)).is_err());
    }
}
