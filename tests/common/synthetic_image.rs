use dense_crf::RowMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DARK: u8 = 40;
pub const BRIGHT: u8 = 210;

/// Interleaved RGB image whose left half is dark and right half bright.
pub fn two_region_rgb(width: usize, height: usize) -> Vec<u8> {
    assert!(width > 1 && height > 0, "image dimensions must be positive");
    let mut img = vec![0u8; width * height * 3];
    for y in 0..height {
        for x in 0..width {
            let v = if x < width / 2 { DARK } else { BRIGHT };
            let i = (y * width + x) * 3;
            img[i..i + 3].fill(v);
        }
    }
    img
}

/// Ground-truth label of the two-region image.
pub fn two_region_labels(width: usize, height: usize) -> Vec<usize> {
    (0..width * height)
        .map(|i| usize::from(i % width >= width / 2))
        .collect()
}

/// Weakly correct two-label probabilities: the true label gets `confidence`,
/// except for a `flip_rate` fraction of pixels where the labels swap.
pub fn noisy_probabilities(
    truth: &[usize],
    confidence: f32,
    flip_rate: f64,
    seed: u64,
) -> RowMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut probs = RowMatrix::new(truth.len(), 2);
    for (row, &label) in probs.rows_mut().zip(truth) {
        let label = if rng.gen_bool(flip_rate) { 1 - label } else { label };
        row[label] = confidence;
        row[1 - label] = 1.0 - confidence;
    }
    probs
}
