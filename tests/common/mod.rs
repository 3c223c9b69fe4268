#![allow(dead_code)]

pub mod synthetic_image;

use dense_crf::RowMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `n × d` features drawn uniformly from `[-spread, spread]`.
pub fn random_features(n: usize, d: usize, spread: f32, seed: u64) -> RowMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..n * d).map(|_| rng.gen_range(-spread..spread)).collect();
    RowMatrix::from_vec(n, d, data).unwrap()
}

/// `n × s` rows of positive scores normalized to sum to one.
pub fn random_distributions(n: usize, s: usize, seed: u64) -> RowMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut m = RowMatrix::new(n, s);
    for row in m.rows_mut() {
        for v in row.iter_mut() {
            *v = rng.gen_range(0.05f32..1.0);
        }
        let total: f32 = row.iter().sum();
        row.iter_mut().for_each(|v| *v /= total);
    }
    m
}

pub fn assert_rows_are_distributions(m: &RowMatrix, tol: f32) {
    for (i, row) in m.rows().enumerate() {
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() <= tol, "row {i} sums to {sum}");
        assert!(
            row.iter().all(|&v| (0.0..=1.0 + tol).contains(&v)),
            "row {i} has entries outside [0, 1]: {row:?}"
        );
    }
}
