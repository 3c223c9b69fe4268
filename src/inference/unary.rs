use crate::error::CrfError;
use crate::matrix::RowMatrix;

/// Probabilities are floored before taking the logarithm.
const PROB_FLOOR: f32 = 1e-12;

/// Per-point, per-label unary energies (`N × S`, lower is better).
#[derive(Clone, Debug, PartialEq)]
pub struct UnaryPotentials {
    energies: RowMatrix,
}

impl UnaryPotentials {
    /// Use `energies` as-is; every entry must be finite.
    pub fn from_energies(energies: RowMatrix) -> Result<Self, CrfError> {
        validate(&energies)?;
        if let Some((point, label)) = find_entry(&energies, |e| !e.is_finite()) {
            return Err(CrfError::NonFiniteUnary { point, label });
        }
        Ok(Self { energies })
    }

    /// Convert label probabilities (or unnormalized scores) to energies
    /// `-ln(max(p, floor))`, once, up front.
    ///
    /// Entries must be finite and non-negative; zeros hit the floor.
    pub fn from_probabilities(mut probabilities: RowMatrix) -> Result<Self, CrfError> {
        validate(&probabilities)?;
        let invalid = |p: f32| !(p.is_finite() && p >= 0.0);
        if let Some((point, label)) = find_entry(&probabilities, invalid) {
            return Err(CrfError::InvalidProbability {
                point,
                label,
                value: probabilities.get(point, label),
            });
        }
        for p in probabilities.data.iter_mut() {
            *p = -p.max(PROB_FLOOR).ln();
        }
        Ok(Self {
            energies: probabilities,
        })
    }

    #[inline]
    pub fn points(&self) -> usize {
        self.energies.rows
    }

    #[inline]
    pub fn labels(&self) -> usize {
        self.energies.cols
    }

    pub fn energies(&self) -> &RowMatrix {
        &self.energies
    }
}

fn validate(m: &RowMatrix) -> Result<(), CrfError> {
    if m.rows == 0 {
        return Err(CrfError::EmptyFeatures);
    }
    if m.cols == 0 {
        return Err(CrfError::NoLabels);
    }
    Ok(())
}

/// `(point, label)` of the first entry matching `bad`.
fn find_entry(m: &RowMatrix, bad: impl Fn(f32) -> bool) -> Option<(usize, usize)> {
    m.data
        .iter()
        .position(|&v| bad(v))
        .map(|i| (i / m.cols, i % m.cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probabilities_become_negative_logs() {
        let probs = RowMatrix::from_rows(&[[1.0, 0.0], [0.5, 0.5]]).unwrap();
        let unary = UnaryPotentials::from_probabilities(probs).unwrap();
        let e = unary.energies();
        assert_eq!(e.get(0, 0), 0.0);
        assert!(e.get(0, 1).is_finite() && e.get(0, 1) > 20.0);
        assert!((e.get(1, 0) - std::f32::consts::LN_2).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_finite_energies() {
        let energies = RowMatrix::from_rows(&[[0.0, 1.0], [f32::NAN, 0.0]]).unwrap();
        assert!(matches!(
            UnaryPotentials::from_energies(energies),
            Err(CrfError::NonFiniteUnary { point: 1, label: 0 })
        ));
        let energies = RowMatrix::from_rows(&[[0.0, f32::INFINITY]]).unwrap();
        assert!(matches!(
            UnaryPotentials::from_energies(energies),
            Err(CrfError::NonFiniteUnary { point: 0, label: 1 })
        ));
    }

    #[test]
    fn rejects_invalid_probabilities() {
        let probs = RowMatrix::from_rows(&[[0.5, 0.5], [1.2, -0.2]]).unwrap();
        assert!(matches!(
            UnaryPotentials::from_probabilities(probs),
            Err(CrfError::InvalidProbability { point: 1, label: 1, .. })
        ));
        let probs = RowMatrix::from_rows(&[[f32::NAN, 0.5]]).unwrap();
        assert!(matches!(
            UnaryPotentials::from_probabilities(probs),
            Err(CrfError::InvalidProbability { point: 0, label: 0, .. })
        ));
    }

    #[test]
    fn rejects_empty_shapes() {
        assert!(matches!(
            UnaryPotentials::from_energies(RowMatrix::new(3, 0)),
            Err(CrfError::NoLabels)
        ));
        assert!(UnaryPotentials::from_energies(RowMatrix::new(0, 2)).is_err());
    }
}
