use super::{PairwisePotential, PotentialScratch, SemiMetric};
use crate::error::CrfError;
use crate::lattice::{Lattice, LatticeStats, LatticeWorkspace};
use crate::matrix::RowMatrix;
use crate::params::{Normalization, PairwiseParams};
use crate::parallel::ParallelOptions;
use log::{debug, warn};
use std::ops::Range;

const NORM_EPS: f32 = f32::EPSILON;

/// Gaussian-kernel pairwise model `w · exp(-|f_i - f_j|² / 2)` with a
/// per-point density normalization.
///
/// Without a transform this is a Potts model: the filtered belief of
/// similar points is *added* to the target energy, rewarding agreement.
/// With a [`SemiMetric`] the filtered belief is mapped to label costs and
/// *subtracted*.
pub struct PottsPotential {
    lattice: Lattice,
    source: Range<usize>,
    target: Range<usize>,
    weight: f32,
    norm: Vec<f32>,
    semi_metric: Option<Box<dyn SemiMetric>>,
}

impl PottsPotential {
    /// Model over a single feature set (`N × D`).
    pub fn new(features: &RowMatrix, params: PairwiseParams) -> Result<Self, CrfError> {
        Self::with_parallel(features, params, ParallelOptions::default())
    }

    pub fn with_parallel(
        features: &RowMatrix,
        params: PairwiseParams,
        parallel: ParallelOptions,
    ) -> Result<Self, CrfError> {
        let lattice = Lattice::with_parallel(features, parallel)?;
        let all = 0..features.rows;
        Ok(Self::from_lattice(lattice, all.clone(), all, params))
    }

    /// Model carrying beliefs of `source` points (`N1 × D`) onto `target`
    /// points (`N2 × D`) through a lattice built over both sets.
    pub fn bipartite(
        source: &RowMatrix,
        target: &RowMatrix,
        params: PairwiseParams,
    ) -> Result<Self, CrfError> {
        if source.rows == 0 || target.rows == 0 {
            return Err(CrfError::EmptyFeatures);
        }
        let lattice = Lattice::new(&source.vstack(target)?)?;
        let n1 = source.rows;
        Ok(Self::from_lattice(
            lattice,
            0..n1,
            n1..n1 + target.rows,
            params,
        ))
    }

    fn from_lattice(
        lattice: Lattice,
        source: Range<usize>,
        target: Range<usize>,
        params: PairwiseParams,
    ) -> Self {
        let norm = normalization(&lattice, &source, &target, params.normalization);
        Self {
            lattice,
            source,
            target,
            weight: params.weight,
            norm,
            semi_metric: None,
        }
    }

    /// Replace the Potts label interaction by a semi-metric transform.
    pub fn with_semi_metric(mut self, semi_metric: impl SemiMetric + 'static) -> Self {
        self.semi_metric = Some(Box::new(semi_metric));
        self
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Per-target-point normalization constants.
    pub fn norm(&self) -> &[f32] {
        &self.norm
    }
}

impl PairwisePotential for PottsPotential {
    fn source_points(&self) -> usize {
        self.source.len()
    }

    fn target_points(&self) -> usize {
        self.target.len()
    }

    fn labels(&self) -> Option<usize> {
        self.semi_metric.as_ref().and_then(|m| m.labels())
    }

    fn apply(&self, belief: &RowMatrix, energy: &mut RowMatrix, scratch: &mut PotentialScratch) {
        debug_assert_eq!(belief.rows, self.source.len());
        debug_assert_eq!(energy.shape(), (self.target.len(), belief.cols));
        let labels = belief.cols;
        let PotentialScratch {
            workspace,
            filtered,
            transformed,
        } = scratch;
        filtered.reset(self.target.len(), labels);
        self.lattice.run(
            belief,
            filtered,
            self.source.clone(),
            self.target.clone(),
            workspace,
        );

        let rows = energy.rows_mut().zip(filtered.rows()).zip(&self.norm);
        match &self.semi_metric {
            None => {
                for ((out, filt), &norm) in rows {
                    let scale = self.weight * norm;
                    for (o, &f) in out.iter_mut().zip(filt) {
                        *o += scale * f;
                    }
                }
            }
            Some(metric) => {
                transformed.clear();
                transformed.resize(labels, 0.0);
                for ((out, filt), &norm) in rows {
                    metric.apply(filt, transformed);
                    let scale = self.weight * norm;
                    for (o, &t) in out.iter_mut().zip(transformed.iter()) {
                        *o -= scale * t;
                    }
                }
            }
        }
    }

    fn lattice_stats(&self) -> Option<LatticeStats> {
        Some(self.lattice.stats())
    }
}

/// Filter an all-ones input from `source` onto `target` and turn the
/// response into normalization constants.
fn normalization(
    lattice: &Lattice,
    source: &Range<usize>,
    target: &Range<usize>,
    mode: Normalization,
) -> Vec<f32> {
    let ones = RowMatrix::filled(source.len(), 1, 1.0);
    let mut response = RowMatrix::new(target.len(), 1);
    lattice.run(
        &ones,
        &mut response,
        source.clone(),
        target.clone(),
        &mut LatticeWorkspace::new(),
    );

    let norm: Vec<f32> = match mode {
        Normalization::PerPoint => response
            .data
            .iter()
            .map(|&r| 1.0 / (r + NORM_EPS))
            .collect(),
        Normalization::Global => {
            let total: f32 = response.data.iter().sum();
            if total <= NORM_EPS {
                warn!(
                    "PottsPotential: degenerate kernel response sum {:.3e}, flooring to {:.3e}",
                    total, NORM_EPS
                );
            }
            let constant = target.len() as f32 / total.max(NORM_EPS);
            vec![constant; target.len()]
        }
    };

    let (lo, hi) = norm
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &n| {
            (lo.min(n), hi.max(n))
        });
    debug!(
        "PottsPotential normalization={:?} points={} norm range [{:.4}, {:.4}]",
        mode,
        norm.len(),
        lo,
        hi
    );
    norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::CompatibilityMatrix;

    fn cluster_features() -> RowMatrix {
        RowMatrix::from_rows(&[[0.0, 0.0], [0.3, 0.1], [0.1, 0.4], [25.0, 25.0]]).unwrap()
    }

    #[test]
    fn normalized_self_filter_is_near_identity() {
        let features = cluster_features();
        let model = PottsPotential::new(&features, PairwiseParams::default()).unwrap();
        let ones = RowMatrix::filled(features.rows, 1, 1.0);
        let filtered = model.lattice().compute(&ones).unwrap();
        for (i, (&f, &n)) in filtered.data.iter().zip(model.norm()).enumerate() {
            assert!((f * n - 1.0).abs() < 1e-4, "point {i}: {}", f * n);
        }
    }

    #[test]
    fn global_normalization_is_constant() {
        let params = PairwiseParams {
            weight: 1.0,
            normalization: Normalization::Global,
        };
        let model = PottsPotential::new(&cluster_features(), params).unwrap();
        let first = model.norm()[0];
        assert!(first > 0.0);
        assert!(model.norm().iter().all(|&n| n == first));
    }

    #[test]
    fn potts_apply_accumulates_scaled_response() {
        let features = cluster_features();
        let model =
            PottsPotential::new(&features, PairwiseParams::default().with_weight(2.0)).unwrap();
        let belief = RowMatrix::filled(4, 2, 0.5);
        let mut energy = RowMatrix::filled(4, 2, 1.0);
        model.apply(&belief, &mut energy, &mut PotentialScratch::new());
        // Uniform belief filtered and normalized is 0.5 everywhere.
        for &e in &energy.data {
            assert!((e - 2.0).abs() < 1e-3, "energy={:?}", energy.data);
        }
    }

    #[test]
    fn semi_metric_output_is_subtracted() {
        let features = cluster_features();
        let metric =
            CompatibilityMatrix::from_fn(2, |a, b| if a == b { 0.0 } else { 1.0 }).unwrap();
        let model = PottsPotential::new(&features, PairwiseParams::default())
            .unwrap()
            .with_semi_metric(metric);
        assert_eq!(model.labels(), Some(2));
        let mut belief = RowMatrix::new(4, 2);
        for row in belief.rows_mut() {
            row[0] = 1.0;
        }
        let mut energy = RowMatrix::new(4, 2);
        model.apply(&belief, &mut energy, &mut PotentialScratch::new());
        for row in energy.rows() {
            assert!(row[0].abs() < 1e-4, "row={row:?}");
            assert!((row[1] + 1.0).abs() < 1e-3, "row={row:?}");
        }
    }

    #[test]
    fn bipartite_model_maps_between_sets() {
        let source = RowMatrix::from_rows(&[[0.0], [0.2]]).unwrap();
        let target = RowMatrix::from_rows(&[[0.1], [0.0], [0.3]]).unwrap();
        let model = PottsPotential::bipartite(&source, &target, PairwiseParams::default()).unwrap();
        assert_eq!(model.source_points(), 2);
        assert_eq!(model.target_points(), 3);
        let mut belief = RowMatrix::new(2, 2);
        belief.row_mut(0).copy_from_slice(&[1.0, 0.0]);
        belief.row_mut(1).copy_from_slice(&[1.0, 0.0]);
        let mut energy = RowMatrix::new(3, 2);
        model.apply(&belief, &mut energy, &mut PotentialScratch::new());
        for row in energy.rows() {
            assert!((row[0] - 1.0).abs() < 1e-3, "row={row:?}");
            assert!(row[1].abs() < 1e-6);
        }
    }
}
