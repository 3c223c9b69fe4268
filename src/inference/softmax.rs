//! Row-wise numerically stable softmax with optional damping.
use crate::matrix::RowMatrix;
use crate::parallel::ParallelOptions;

/// `out[i] ← (1 - relax)·out[i] + relax·softmax(scale · input[i])` per row.
///
/// The row maximum is subtracted before exponentiating, so every row has at
/// least one `exp(0) = 1` term and the normalizer can't underflow to zero.
pub(crate) fn exp_and_normalize(
    out: &mut RowMatrix,
    input: &RowMatrix,
    scale: f32,
    relax: f32,
    parallel: ParallelOptions,
) {
    debug_assert_eq!(out.shape(), input.shape());
    let labels = input.cols;
    if labels == 0 {
        return;
    }

    let update = |src: &[f32], dst: &mut [f32]| {
        let max = src
            .iter()
            .fold(f32::NEG_INFINITY, |m, &v| m.max(scale * v));
        let mut total = 0.0f32;
        for &v in src {
            total += (scale * v - max).exp();
        }
        debug_assert!(
            total > 0.0 && total.is_finite(),
            "softmax row normalizer must be positive and finite, got {total}"
        );
        let inv = 1.0 / total;
        for (d, &v) in dst.iter_mut().zip(src) {
            let p = (scale * v - max).exp() * inv;
            *d = if relax == 1.0 {
                p
            } else {
                (1.0 - relax) * *d + relax * p
            };
        }
    };

    if parallel.should_parallelize(input.rows) {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            out.data
                .par_chunks_mut(labels)
                .zip(input.data.par_chunks(labels))
                .for_each(|(dst, src)| update(src, dst));
            return;
        }
    }
    for (dst, src) in out.rows_mut().zip(input.rows()) {
        update(src, dst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_sums(m: &RowMatrix) -> Vec<f32> {
        m.rows().map(|r| r.iter().sum()).collect()
    }

    #[test]
    fn survives_large_energies() {
        let input = RowMatrix::from_rows(&[[1000.0, 999.0, -1000.0], [-5e4, -5e4, -5e4]]).unwrap();
        let mut out = RowMatrix::new(2, 3);
        exp_and_normalize(&mut out, &input, 1.0, 1.0, ParallelOptions::disabled());
        for s in row_sums(&out) {
            assert!((s - 1.0).abs() < 1e-5);
        }
        assert!(out.get(0, 0) > out.get(0, 1));
        assert!((out.get(1, 0) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn negative_scale_prefers_low_energy() {
        let input = RowMatrix::from_rows(&[[0.1, 2.0]]).unwrap();
        let mut out = RowMatrix::new(1, 2);
        exp_and_normalize(&mut out, &input, -1.0, 1.0, ParallelOptions::disabled());
        assert!(out.get(0, 0) > out.get(0, 1));
    }

    #[test]
    fn relax_blends_with_previous_values() {
        let input = RowMatrix::from_rows(&[[0.0, 0.0]]).unwrap();
        let mut out = RowMatrix::from_rows(&[[1.0, 0.0]]).unwrap();
        exp_and_normalize(&mut out, &input, 1.0, 0.5, ParallelOptions::disabled());
        assert!((out.get(0, 0) - 0.75).abs() < 1e-6);
        assert!((out.get(0, 1) - 0.25).abs() < 1e-6);
    }
}
