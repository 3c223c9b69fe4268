//! Pixel-grid feature builders for per-pixel labeling.
//!
//! Points are pixels in row-major order (`i = y * width + x`), matching the
//! row order of the unary matrix a per-pixel classifier produces.
//!
//! - Gaussian (smoothness) features: `(x / σx, y / σy)`.
//! - Bilateral (appearance) features: `(x / σx, y / σy, c_0 / σc, …)` for
//!   every channel of the image.

use crate::error::CrfError;
use crate::image::ImageView;
use crate::inference::DenseCrf;
use crate::matrix::RowMatrix;
use crate::params::{BilateralKernelParams, GaussianKernelParams};
use log::debug;

/// Position-only features of a `width × height` grid.
pub fn gaussian_features(
    width: usize,
    height: usize,
    sigma_xy: [f32; 2],
) -> Result<RowMatrix, CrfError> {
    if width == 0 || height == 0 {
        return Err(CrfError::EmptyFeatures);
    }
    let (ix, iy) = (1.0 / sigma_xy[0], 1.0 / sigma_xy[1]);
    let mut features = RowMatrix::new(width * height, 2);
    for (i, f) in features.rows_mut().enumerate() {
        let (x, y) = (i % width, i / width);
        f[0] = x as f32 * ix;
        f[1] = y as f32 * iy;
    }
    Ok(features)
}

/// Position + colour features of every pixel of `image`.
pub fn bilateral_features<I>(
    image: &I,
    sigma_xy: [f32; 2],
    sigma_color: f32,
) -> Result<RowMatrix, CrfError>
where
    I: ImageView<Pixel = u8>,
{
    let (w, h, c) = (image.width(), image.height(), image.channels());
    if w == 0 || h == 0 {
        return Err(CrfError::EmptyFeatures);
    }
    if c == 0 {
        return Err(CrfError::ZeroFeatureDimension);
    }
    let (ix, iy, ic) = (1.0 / sigma_xy[0], 1.0 / sigma_xy[1], 1.0 / sigma_color);
    let mut features = RowMatrix::new(w * h, 2 + c);
    let pixels = image
        .rows()
        .enumerate()
        .flat_map(|(y, row)| row.chunks_exact(c).enumerate().map(move |(x, p)| (x, y, p)));
    for (f, (x, y, pixel)) in features.data.chunks_exact_mut(2 + c).zip(pixels) {
        f[0] = x as f32 * ix;
        f[1] = y as f32 * iy;
        for (dst, &v) in f[2..].iter_mut().zip(pixel) {
            *dst = v as f32 * ic;
        }
    }
    Ok(features)
}

impl DenseCrf {
    /// Add a smoothness kernel over a `width × height` pixel grid.
    pub fn add_gaussian_kernel(
        &mut self,
        width: usize,
        height: usize,
        params: &GaussianKernelParams,
    ) -> Result<(), CrfError> {
        let features = gaussian_features(width, height, params.sigma_xy)?;
        debug!(
            "DenseCrf::add_gaussian_kernel {}x{} sigma={:?} w={}",
            width, height, params.sigma_xy, params.pairwise.weight
        );
        self.add_potts(&features, params.pairwise)
    }

    /// Add an appearance kernel over the pixels of `image`.
    pub fn add_bilateral_kernel<I>(
        &mut self,
        image: &I,
        params: &BilateralKernelParams,
    ) -> Result<(), CrfError>
    where
        I: ImageView<Pixel = u8>,
    {
        let features = bilateral_features(image, params.sigma_xy, params.sigma_color)?;
        debug!(
            "DenseCrf::add_bilateral_kernel {}x{}x{} sigma_xy={:?} sigma_color={} w={}",
            image.width(),
            image.height(),
            image.channels(),
            params.sigma_xy,
            params.sigma_color,
            params.pairwise.weight
        );
        self.add_potts(&features, params.pairwise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageU8;

    #[test]
    fn gaussian_features_scale_positions() {
        let f = gaussian_features(3, 2, [2.0, 4.0]).unwrap();
        assert_eq!(f.shape(), (6, 2));
        assert_eq!(f.row(0), &[0.0, 0.0]);
        assert_eq!(f.row(2), &[1.0, 0.0]);
        assert_eq!(f.row(5), &[1.0, 0.25]);
        assert!(gaussian_features(0, 4, [1.0, 1.0]).is_err());
    }

    #[test]
    fn bilateral_features_append_scaled_channels() {
        let data = [10u8, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120];
        let img = ImageU8::new(2, 2, 3, &data).unwrap();
        let f = bilateral_features(&img, [1.0, 2.0], 10.0).unwrap();
        assert_eq!(f.shape(), (4, 5));
        let last = f.row(3);
        assert_eq!(&last[..2], &[1.0, 0.5]);
        assert!((last[2] - 10.0).abs() < 1e-6);
        assert!((last[4] - 12.0).abs() < 1e-6);
    }

    #[test]
    fn kernels_must_match_the_pixel_count() {
        let mut crf = DenseCrf::from_probabilities(RowMatrix::filled(6, 2, 0.5)).unwrap();
        crf.add_gaussian_kernel(3, 2, &GaussianKernelParams::default())
            .unwrap();
        assert!(crf
            .add_gaussian_kernel(4, 2, &GaussianKernelParams::default())
            .is_err());
        let zero_sigma = GaussianKernelParams {
            sigma_xy: [0.0, 3.0],
            ..Default::default()
        };
        assert!(matches!(
            crf.add_gaussian_kernel(3, 2, &zero_sigma),
            Err(CrfError::NonFiniteFeature { .. })
        ));
        assert_eq!(crf.potential_count(), 1);
    }
}
