//! JSON configuration for a complete per-pixel CRF setup.
//!
//! Every field is optional; missing fields take the same defaults as the
//! parameter structs. Reading the JSON from disk is left to the caller.
//!
//! ```
//! let cfg = dense_crf::config::parse_config(r#"{
//!     "inference": { "iterations": 10 },
//!     "bilateral": { "sigmaColor": 20.0 }
//! }"#).unwrap();
//! assert_eq!(cfg.inference.iterations, 10);
//! assert!(cfg.gaussian.is_none());
//! ```

use crate::error::CrfError;
use crate::image::ImageView;
use crate::inference::DenseCrf;
use crate::params::{BilateralKernelParams, GaussianKernelParams, InferenceParams};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrfConfig {
    pub inference: InferenceParams,
    /// Smoothness kernel; skipped when absent.
    pub gaussian: Option<GaussianKernelParams>,
    /// Appearance kernel; skipped when absent.
    pub bilateral: Option<BilateralKernelParams>,
}

pub fn parse_config(json: &str) -> Result<CrfConfig, CrfError> {
    let config: CrfConfig = serde_json::from_str(json)?;
    config.inference.validate()?;
    Ok(config)
}

impl DenseCrf {
    /// Add the kernels `config` enables, over the pixels of `image`.
    pub fn add_configured_kernels<I>(
        &mut self,
        image: &I,
        config: &CrfConfig,
    ) -> Result<(), CrfError>
    where
        I: ImageView<Pixel = u8>,
    {
        if let Some(gaussian) = &config.gaussian {
            self.add_gaussian_kernel(image.width(), image.height(), gaussian)?;
        }
        if let Some(bilateral) = &config.bilateral {
            self.add_bilateral_kernel(image, bilateral)?;
        }
        Ok(())
    }
}
