use crate::error::CrfError;

/// Interleaved 8-bit image borrowed from the caller (e.g. packed RGB).
#[derive(Clone, Debug)]
pub struct ImageU8<'a> {
    pub w: usize,
    pub h: usize,
    pub channels: usize,
    pub stride: usize, // samples between rows
    pub data: &'a [u8],
}

impl<'a> ImageU8<'a> {
    /// Tightly packed view (`stride = w * channels`).
    pub fn new(w: usize, h: usize, channels: usize, data: &'a [u8]) -> Result<Self, CrfError> {
        Self::with_stride(w, h, channels, w * channels, data)
    }

    pub fn with_stride(
        w: usize,
        h: usize,
        channels: usize,
        stride: usize,
        data: &'a [u8],
    ) -> Result<Self, CrfError> {
        if channels == 0 {
            return Err(CrfError::ZeroFeatureDimension);
        }
        if stride < w * channels {
            return Err(CrfError::shape("image stride", (h, w * channels), (h, stride)));
        }
        let needed = if h == 0 { 0 } else { (h - 1) * stride + w * channels };
        if data.len() < needed {
            return Err(CrfError::BufferLength {
                expected: needed,
                found: data.len(),
            });
        }
        Ok(Self {
            w,
            h,
            channels,
            stride,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[y * self.stride + x * self.channels + c]
    }
}

impl<'a> crate::image::traits::ImageView for ImageU8<'a> {
    type Pixel = u8;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn channels(&self) -> usize {
        self.channels
    }
    #[inline]
    fn stride(&self) -> usize {
        self.stride
    }
    #[inline]
    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.w * self.channels]
    }
}
