//! Mean-field inference for fully-connected CRFs.
//!
//! Overview
//! - [`DenseCrf`] owns the unary energies of N points over S labels and the
//!   list of pairwise models (see [`crate::potential`]).
//! - [`DenseCrf::start`] opens a [`MeanField`] session whose belief is
//!   initialised to `softmax(-unary)`.
//! - Each [`MeanField::step`] sums `-(unary + additional)` with every
//!   model's pairwise contribution and replaces (or, with `relax < 1`,
//!   blends) the belief with the row-wise softmax of the result.
//! - After a fixed number of steps the belief is decoded per point by
//!   argmax, ties going to the lowest label index.
//!
//! There is no convergence test: the caller chooses the iteration count,
//! and too few iterations simply give a less converged belief.
//!
//! A built `DenseCrf` is immutable during inference, so several sessions
//! may run concurrently over the same models.

mod bipartite;
mod energy;
mod softmax;
mod unary;

pub use bipartite::BipartiteDenseCrf;
pub use unary::UnaryPotentials;

use crate::diagnostics::{elapsed_ms, InferenceReport, TimingBreakdown};
use crate::error::CrfError;
use crate::matrix::RowMatrix;
use crate::params::{validate_relax, InferenceParams, PairwiseParams};
use crate::parallel::ParallelOptions;
use crate::potential::{PairwisePotential, PotentialScratch, PottsPotential, SemiMetric};
use log::debug;
use softmax::exp_and_normalize;
use std::time::Instant;

/// Unary energies plus the pairwise models of a fully-connected CRF.
pub struct DenseCrf {
    unary: UnaryPotentials,
    potentials: Vec<Box<dyn PairwisePotential>>,
}

/// Belief, decoded labels and diagnostics of one [`DenseCrf::run`].
#[derive(Clone, Debug)]
pub struct InferenceOutcome {
    pub belief: RowMatrix,
    pub labels: Vec<usize>,
    pub report: InferenceReport,
}

impl DenseCrf {
    pub fn new(unary: UnaryPotentials) -> Self {
        Self {
            unary,
            potentials: Vec::new(),
        }
    }

    /// Shorthand for [`UnaryPotentials::from_probabilities`] + [`DenseCrf::new`].
    pub fn from_probabilities(probabilities: RowMatrix) -> Result<Self, CrfError> {
        Ok(Self::new(UnaryPotentials::from_probabilities(probabilities)?))
    }

    /// Shorthand for [`UnaryPotentials::from_energies`] + [`DenseCrf::new`].
    pub fn from_energies(energies: RowMatrix) -> Result<Self, CrfError> {
        Ok(Self::new(UnaryPotentials::from_energies(energies)?))
    }

    #[inline]
    pub fn points(&self) -> usize {
        self.unary.points()
    }

    #[inline]
    pub fn labels(&self) -> usize {
        self.unary.labels()
    }

    pub fn unary(&self) -> &UnaryPotentials {
        &self.unary
    }

    /// Number of registered pairwise models.
    pub fn potential_count(&self) -> usize {
        self.potentials.len()
    }

    /// Register a pairwise model defined over this CRF's points.
    pub fn add_potential(
        &mut self,
        potential: impl PairwisePotential + 'static,
    ) -> Result<(), CrfError> {
        let n = self.points();
        if potential.source_points() != n || potential.target_points() != n {
            return Err(CrfError::shape(
                "pairwise potential points",
                (n, n),
                (potential.source_points(), potential.target_points()),
            ));
        }
        check_potential_labels(&potential, self.labels())?;
        self.potentials.push(Box::new(potential));
        Ok(())
    }

    /// Add a Potts model over `features` (`N × D`).
    pub fn add_potts(
        &mut self,
        features: &RowMatrix,
        params: PairwiseParams,
    ) -> Result<(), CrfError> {
        self.check_feature_rows(features)?;
        self.add_potential(PottsPotential::new(features, params)?)
    }

    /// Add a semi-metric model over `features` with the given label transform.
    pub fn add_semi_metric(
        &mut self,
        features: &RowMatrix,
        params: PairwiseParams,
        semi_metric: impl SemiMetric + 'static,
    ) -> Result<(), CrfError> {
        self.check_feature_rows(features)?;
        self.add_potential(PottsPotential::new(features, params)?.with_semi_metric(semi_metric))
    }

    fn check_feature_rows(&self, features: &RowMatrix) -> Result<(), CrfError> {
        if features.rows != self.points() {
            return Err(CrfError::shape(
                "pairwise features",
                (self.points(), features.cols),
                features.shape(),
            ));
        }
        Ok(())
    }

    /// Open a mean-field session initialised from the unary energies.
    pub fn start(&self, params: &InferenceParams) -> Result<MeanField<'_>, CrfError> {
        params.validate()?;
        Ok(MeanField::new(self, params.relax, params.parallel))
    }

    /// Run `params.iterations` steps and return the belief (`N × S`).
    pub fn infer(&self, params: &InferenceParams) -> Result<RowMatrix, CrfError> {
        let mut session = self.start(params)?;
        session.run(params.iterations);
        Ok(session.into_belief())
    }

    /// Run `params.iterations` steps and return the most likely label per point.
    pub fn decode(&self, params: &InferenceParams) -> Result<Vec<usize>, CrfError> {
        let mut session = self.start(params)?;
        session.run(params.iterations);
        Ok(session.decode())
    }

    /// Like [`DenseCrf::decode`], also returning the belief and a timed report.
    pub fn run(&self, params: &InferenceParams) -> Result<InferenceOutcome, CrfError> {
        let total = Instant::now();
        let mut timings = TimingBreakdown::default();

        let start = Instant::now();
        let mut session = self.start(params)?;
        timings.push_since("initialize", start);

        for it in 0..params.iterations {
            let start = Instant::now();
            session.step();
            timings.push_since(format!("iteration {it}"), start);
        }

        let start = Instant::now();
        let labels = session.current_map();
        timings.push_since("decode", start);
        timings.total_ms = elapsed_ms(total);

        let report = InferenceReport {
            points: self.points(),
            labels: self.labels(),
            iterations: session.iterations(),
            relax: params.relax,
            lattices: self
                .potentials
                .iter()
                .filter_map(|p| p.lattice_stats())
                .collect(),
            label_histogram: InferenceReport::label_histogram(self.labels(), &labels),
            timings,
        };
        Ok(InferenceOutcome {
            belief: session.into_belief(),
            labels,
            report,
        })
    }
}

pub(crate) fn check_potential_labels(
    potential: &dyn PairwisePotential,
    labels: usize,
) -> Result<(), CrfError> {
    match potential.labels() {
        Some(found) if found != labels => Err(CrfError::LabelCount {
            expected: labels,
            found,
        }),
        _ => Ok(()),
    }
}

/// One in-progress mean-field run over a [`DenseCrf`].
///
/// Created initialised (`belief = softmax(-unary)`); every [`MeanField::step`]
/// performs one update. Scratch buffers live in the session, so steps don't
/// allocate after the first one.
pub struct MeanField<'a> {
    crf: &'a DenseCrf,
    relax: f32,
    parallel: ParallelOptions,
    belief: RowMatrix,
    next: RowMatrix,
    additional_unary: RowMatrix,
    scratch: PotentialScratch,
    iterations: usize,
}

impl<'a> MeanField<'a> {
    fn new(crf: &'a DenseCrf, relax: f32, parallel: ParallelOptions) -> Self {
        let (n, s) = (crf.points(), crf.labels());
        let mut belief = RowMatrix::new(n, s);
        exp_and_normalize(&mut belief, crf.unary.energies(), -1.0, 1.0, parallel);
        debug!("MeanField::start points={} labels={} relax={}", n, s, relax);
        Self {
            crf,
            relax,
            parallel,
            belief,
            next: RowMatrix::new(n, s),
            additional_unary: RowMatrix::new(n, s),
            scratch: PotentialScratch::new(),
            iterations: 0,
        }
    }

    /// One mean-field update with the session's relaxation factor.
    pub fn step(&mut self) {
        let start = Instant::now();
        let unary = self.crf.unary.energies();
        for ((next, &u), &a) in self
            .next
            .data
            .iter_mut()
            .zip(&unary.data)
            .zip(&self.additional_unary.data)
        {
            *next = -u - a;
        }

        for potential in &self.crf.potentials {
            potential.apply(&self.belief, &mut self.next, &mut self.scratch);
        }

        exp_and_normalize(&mut self.belief, &self.next, 1.0, self.relax, self.parallel);
        self.iterations += 1;
        debug!(
            "MeanField::step iteration={} in {:.3} ms",
            self.iterations,
            elapsed_ms(start)
        );
    }

    /// One update with an explicit relaxation factor in (0, 1].
    pub fn step_with_relax(&mut self, relax: f32) -> Result<(), CrfError> {
        validate_relax(relax)?;
        let configured = std::mem::replace(&mut self.relax, relax);
        self.step();
        self.relax = configured;
        Ok(())
    }

    /// Perform `iterations` updates.
    pub fn run(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.step();
        }
    }

    /// Steps performed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Current per-point label distributions (`N × S`, rows sum to 1).
    pub fn belief(&self) -> &RowMatrix {
        &self.belief
    }

    /// Extra energy added to the unary term of every step; zero by default.
    pub fn additional_unary_mut(&mut self) -> &mut RowMatrix {
        &mut self.additional_unary
    }

    /// Argmax of the current belief without ending the session.
    pub fn current_map(&self) -> Vec<usize> {
        self.belief.argmax_rows()
    }

    /// End the session and return the argmax labels.
    pub fn decode(self) -> Vec<usize> {
        debug!("MeanField::decode after {} iterations", self.iterations);
        self.current_map()
    }

    pub fn into_belief(self) -> RowMatrix {
        self.belief
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_crf(weight: f32) -> DenseCrf {
        let probs =
            RowMatrix::from_rows(&[[0.8, 0.2], [0.7, 0.3], [0.75, 0.25], [0.4, 0.6]]).unwrap();
        let mut crf = DenseCrf::from_probabilities(probs).unwrap();
        let features = RowMatrix::filled(4, 2, 0.0);
        crf.add_potts(&features, PairwiseParams::default().with_weight(weight))
            .unwrap();
        crf
    }

    #[test]
    fn initial_belief_is_unary_softmax() {
        let crf = toy_crf(5.0);
        let session = crf.start(&InferenceParams::default()).unwrap();
        let b = session.belief();
        assert!((b.get(0, 0) - 0.8).abs() < 1e-5);
        assert!((b.get(3, 1) - 0.6).abs() < 1e-5);
        assert_eq!(session.iterations(), 0);
    }

    #[test]
    fn rejects_potential_with_wrong_point_count() {
        let mut crf = toy_crf(1.0);
        let features = RowMatrix::filled(3, 2, 0.0);
        assert!(matches!(
            crf.add_potts(&features, PairwiseParams::default()),
            Err(CrfError::ShapeMismatch { .. })
        ));
        assert_eq!(crf.potential_count(), 1);
    }

    #[test]
    fn rejects_semimetric_with_wrong_label_count() {
        let mut crf = toy_crf(1.0);
        let features = RowMatrix::filled(4, 2, 0.0);
        let metric =
            crate::potential::CompatibilityMatrix::from_fn(3, |a, b| (a != b) as u8 as f32)
                .unwrap();
        assert!(matches!(
            crf.add_semi_metric(&features, PairwiseParams::default(), metric),
            Err(CrfError::LabelCount {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn invalid_relax_is_rejected() {
        let crf = toy_crf(1.0);
        assert!(matches!(
            crf.start(&InferenceParams::default().with_relax(0.0)),
            Err(CrfError::InvalidRelax(_))
        ));
        let mut session = crf.start(&InferenceParams::default()).unwrap();
        assert!(session.step_with_relax(2.0).is_err());
        assert!(session.step_with_relax(0.5).is_ok());
        assert_eq!(session.iterations(), 1);
    }

    #[test]
    fn run_reports_every_stage() {
        let crf = toy_crf(10.0);
        let params = InferenceParams::default().with_iterations(3);
        let outcome = crf.run(&params).unwrap();
        assert_eq!(outcome.labels, vec![0, 0, 0, 0]);
        assert_eq!(outcome.report.iterations, 3);
        assert_eq!(outcome.report.label_histogram, vec![4, 0]);
        assert_eq!(outcome.report.lattices.len(), 1);
        // initialize + 3 iterations + decode
        assert_eq!(outcome.report.timings.stages.len(), 5);
    }
}
