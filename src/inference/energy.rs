//! Per-point energies of a fixed labeling, for inspecting a result.
use super::DenseCrf;
use crate::error::CrfError;
use crate::matrix::RowMatrix;
use crate::potential::PotentialScratch;

impl DenseCrf {
    /// Unary energy of each point under `labeling`.
    pub fn unary_energy(&self, labeling: &[usize]) -> Result<Vec<f32>, CrfError> {
        self.check_labeling(labeling)?;
        let energies = self.unary.energies();
        Ok(labeling
            .iter()
            .enumerate()
            .map(|(i, &l)| energies.get(i, l))
            .collect())
    }

    /// Pairwise energy of each point under `labeling`, evaluated as one
    /// pairwise pass over the one-hot belief of the labeling.
    ///
    /// `term` selects a single registered model; `None` sums all of them.
    /// The sign matches the unary term: a point whose neighbours agree with
    /// it gets a lower energy.
    pub fn pairwise_energy(
        &self,
        labeling: &[usize],
        term: Option<usize>,
    ) -> Result<Vec<f32>, CrfError> {
        self.check_labeling(labeling)?;
        if let Some(index) = term {
            if index >= self.potentials.len() {
                return Err(CrfError::PotentialIndex {
                    index,
                    count: self.potentials.len(),
                });
            }
        }

        let (n, s) = (self.points(), self.labels());
        let mut one_hot = RowMatrix::new(n, s);
        for (i, &l) in labeling.iter().enumerate() {
            one_hot.set(i, l, 1.0);
        }

        let mut accumulated = RowMatrix::new(n, s);
        let mut scratch = PotentialScratch::new();
        let selected = self
            .potentials
            .iter()
            .enumerate()
            .filter(|(k, _)| term.map_or(true, |t| t == *k));
        for (_, potential) in selected {
            potential.apply(&one_hot, &mut accumulated, &mut scratch);
        }

        Ok(labeling
            .iter()
            .enumerate()
            .map(|(i, &l)| -accumulated.get(i, l))
            .collect())
    }

    fn check_labeling(&self, labeling: &[usize]) -> Result<(), CrfError> {
        if labeling.len() != self.points() {
            return Err(CrfError::shape(
                "labeling",
                (self.points(), 1),
                (labeling.len(), 1),
            ));
        }
        let labels = self.labels();
        match labeling.iter().position(|&l| l >= labels) {
            Some(point) => Err(CrfError::LabelOutOfRange {
                point,
                label: labeling[point],
                labels,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CrfError;
    use crate::inference::DenseCrf;
    use crate::matrix::RowMatrix;
    use crate::params::PairwiseParams;

    fn two_cluster_crf() -> DenseCrf {
        let probs =
            RowMatrix::from_rows(&[[0.9, 0.1], [0.6, 0.4], [0.2, 0.8], [0.3, 0.7]]).unwrap();
        let mut crf = DenseCrf::from_probabilities(probs).unwrap();
        let features = RowMatrix::from_rows(&[[0.0], [0.1], [40.0], [40.1]]).unwrap();
        crf.add_potts(&features, PairwiseParams::default()).unwrap();
        crf.add_potts(&features, PairwiseParams::default().with_weight(2.0))
            .unwrap();
        crf
    }

    #[test]
    fn unary_energy_reads_selected_entries() {
        let crf = two_cluster_crf();
        let e = crf.unary_energy(&[0, 1, 1, 0]).unwrap();
        assert!((e[0] - (-(0.9f32).ln())).abs() < 1e-6);
        assert!((e[1] - (-(0.4f32).ln())).abs() < 1e-6);
        assert!((e[3] - (-(0.3f32).ln())).abs() < 1e-6);
    }

    #[test]
    fn consistent_labeling_has_lower_pairwise_energy() {
        let crf = two_cluster_crf();
        let smooth = crf.pairwise_energy(&[0, 0, 1, 1], None).unwrap();
        let broken = crf.pairwise_energy(&[0, 1, 1, 0], None).unwrap();
        for i in 0..4 {
            assert!(smooth[i] < broken[i], "point {i}: {smooth:?} vs {broken:?}");
        }
    }

    #[test]
    fn single_term_is_part_of_the_sum() {
        let crf = two_cluster_crf();
        let labeling = [0, 0, 1, 1];
        let all = crf.pairwise_energy(&labeling, None).unwrap();
        let first = crf.pairwise_energy(&labeling, Some(0)).unwrap();
        let second = crf.pairwise_energy(&labeling, Some(1)).unwrap();
        for i in 0..4 {
            assert!((all[i] - first[i] - second[i]).abs() < 1e-4);
            assert!((second[i] - 2.0 * first[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn rejects_bad_labelings() {
        let crf = two_cluster_crf();
        assert!(matches!(
            crf.unary_energy(&[0, 2, 0, 0]),
            Err(CrfError::LabelOutOfRange {
                point: 1,
                label: 2,
                labels: 2
            })
        ));
        assert!(matches!(
            crf.pairwise_energy(&[0, 0], None),
            Err(CrfError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            crf.pairwise_energy(&[0, 0, 0, 0], Some(5)),
            Err(CrfError::PotentialIndex { index: 5, count: 2 })
        ));
    }
}
