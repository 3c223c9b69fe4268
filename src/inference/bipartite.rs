//! Two coupled CRFs over disjoint point sets sharing one label space.
//!
//! Each set keeps its own unary term and intra-set models. Cross-set models
//! carry the belief of one set onto the other; their contribution enters
//! the receiving CRF through its additional unary term. Set 0 is updated
//! first, so set 1 already sees set 0's new belief within the same step.

use super::{check_potential_labels, DenseCrf, MeanField};
use crate::error::CrfError;
use crate::matrix::RowMatrix;
use crate::params::{InferenceParams, PairwiseParams};
use crate::potential::{PairwisePotential, PottsPotential};
use log::debug;

pub struct BipartiteDenseCrf {
    crfs: [DenseCrf; 2],
    /// `incoming[k]` maps beliefs of set `1 - k` onto set `k`.
    incoming: [Vec<Box<dyn PairwisePotential>>; 2],
}

impl BipartiteDenseCrf {
    /// Couple two CRFs; both must use the same number of labels.
    pub fn new(first: DenseCrf, second: DenseCrf) -> Result<Self, CrfError> {
        if first.labels() != second.labels() {
            return Err(CrfError::LabelCount {
                expected: first.labels(),
                found: second.labels(),
            });
        }
        Ok(Self {
            crfs: [first, second],
            incoming: [Vec::new(), Vec::new()],
        })
    }

    /// CRF of set `k` (0 or 1).
    pub fn crf(&self, k: usize) -> &DenseCrf {
        &self.crfs[k]
    }

    /// Mutable access for registering intra-set models on set `k`.
    pub fn crf_mut(&mut self, k: usize) -> &mut DenseCrf {
        &mut self.crfs[k]
    }

    /// Number of registered cross-set model pairs.
    pub fn coupling_count(&self) -> usize {
        self.incoming[0].len()
    }

    /// Couple the sets with a pair of models: `to_second` carries set-0
    /// beliefs onto set 1 and `to_first` carries set-1 beliefs onto set 0.
    pub fn add_coupling(
        &mut self,
        to_second: impl PairwisePotential + 'static,
        to_first: impl PairwisePotential + 'static,
    ) -> Result<(), CrfError> {
        let (n0, n1) = (self.crfs[0].points(), self.crfs[1].points());
        if to_second.source_points() != n0 || to_second.target_points() != n1 {
            return Err(CrfError::shape(
                "coupling to second set",
                (n0, n1),
                (to_second.source_points(), to_second.target_points()),
            ));
        }
        if to_first.source_points() != n1 || to_first.target_points() != n0 {
            return Err(CrfError::shape(
                "coupling to first set",
                (n1, n0),
                (to_first.source_points(), to_first.target_points()),
            ));
        }
        let labels = self.crfs[0].labels();
        check_potential_labels(&to_second, labels)?;
        check_potential_labels(&to_first, labels)?;
        self.incoming[1].push(Box::new(to_second));
        self.incoming[0].push(Box::new(to_first));
        Ok(())
    }

    /// Couple the sets with Potts models over `first` (`N0 × D`) and
    /// `second` (`N1 × D`) features.
    pub fn add_potts(
        &mut self,
        first: &RowMatrix,
        second: &RowMatrix,
        params: PairwiseParams,
    ) -> Result<(), CrfError> {
        let to_second = PottsPotential::bipartite(first, second, params)?;
        let to_first = PottsPotential::bipartite(second, first, params)?;
        self.add_coupling(to_second, to_first)
    }

    /// Beliefs of both sets after `params.iterations` coupled steps.
    pub fn infer(&self, params: &InferenceParams) -> Result<[RowMatrix; 2], CrfError> {
        let [first, second] = self.run(params)?;
        Ok([first.into_belief(), second.into_belief()])
    }

    /// Argmax labels of both sets after `params.iterations` coupled steps.
    pub fn decode(&self, params: &InferenceParams) -> Result<[Vec<usize>; 2], CrfError> {
        let [first, second] = self.run(params)?;
        Ok([first.decode(), second.decode()])
    }

    fn run(&self, params: &InferenceParams) -> Result<[MeanField<'_>; 2], CrfError> {
        let mut sessions = [self.crfs[0].start(params)?, self.crfs[1].start(params)?];
        for _ in 0..params.iterations {
            for k in 0..2 {
                let (head, tail) = sessions.split_at_mut(1);
                let (this, other) = if k == 0 {
                    (&mut head[0], &tail[0])
                } else {
                    (&mut tail[0], &head[0])
                };
                this.additional_unary.fill(0.0);
                for potential in &self.incoming[k] {
                    potential.apply(&other.belief, &mut this.additional_unary, &mut this.scratch);
                }
                for v in this.additional_unary.data.iter_mut() {
                    *v = -*v;
                }
                this.step();
            }
        }
        debug!(
            "BipartiteDenseCrf::run points=({}, {}) couplings={} iterations={}",
            self.crfs[0].points(),
            self.crfs[1].points(),
            self.coupling_count(),
            params.iterations
        );
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uncertain(n: usize) -> DenseCrf {
        DenseCrf::from_probabilities(RowMatrix::filled(n, 2, 0.5)).unwrap()
    }

    #[test]
    fn confident_set_pulls_the_other() {
        let confident = DenseCrf::from_probabilities(
            RowMatrix::from_rows(&[[0.05, 0.95], [0.95, 0.05]]).unwrap(),
        )
        .unwrap();
        let mut crf = BipartiteDenseCrf::new(confident, uncertain(2)).unwrap();
        let first = RowMatrix::from_rows(&[[0.0], [50.0]]).unwrap();
        let second = RowMatrix::from_rows(&[[0.2], [49.8]]).unwrap();
        crf.add_potts(&first, &second, PairwiseParams::default().with_weight(5.0))
            .unwrap();
        let [a, b] = crf
            .decode(&InferenceParams::default().with_iterations(4))
            .unwrap();
        assert_eq!(a, vec![1, 0]);
        assert_eq!(b, vec![1, 0]);
    }

    #[test]
    fn rejects_mismatched_sets() {
        let three = DenseCrf::from_probabilities(RowMatrix::filled(2, 3, 0.3)).unwrap();
        assert!(matches!(
            BipartiteDenseCrf::new(uncertain(2), three),
            Err(CrfError::LabelCount { .. })
        ));

        let mut crf = BipartiteDenseCrf::new(uncertain(2), uncertain(3)).unwrap();
        let first = RowMatrix::new(2, 1);
        let wrong = RowMatrix::new(2, 1);
        assert!(crf
            .add_potts(&first, &wrong, PairwiseParams::default())
            .is_err());
        assert_eq!(crf.coupling_count(), 0);
    }
}
