//! Parameter types configuring pairwise potentials and inference.
//!
//! Defaults follow the usual fully-connected CRF setup for per-pixel
//! labeling: a short mean-field schedule, an appearance-independent
//! smoothness kernel over pixel positions and a bilateral kernel over
//! position and colour.

use crate::error::CrfError;
use crate::parallel::ParallelOptions;
use serde::{Deserialize, Serialize};

/// How the per-point normalization constant of a pairwise model is derived
/// from the filtered all-ones response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Normalization {
    /// `1 / (response_i + ε)` for each point.
    #[default]
    PerPoint,
    /// One constant `N / Σ response_i` shared by every point.
    Global,
}

/// Weight and normalization of one pairwise model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PairwiseParams {
    pub weight: f32,
    pub normalization: Normalization,
}

impl Default for PairwiseParams {
    fn default() -> Self {
        Self {
            weight: 1.0,
            normalization: Normalization::PerPoint,
        }
    }
}

impl PairwiseParams {
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// Mean-field schedule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InferenceParams {
    /// Number of mean-field updates. There is no convergence test.
    pub iterations: usize,
    /// Damping in (0, 1]; 1 replaces the belief outright.
    pub relax: f32,
    pub parallel: ParallelOptions,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            iterations: 5,
            relax: 1.0,
            parallel: ParallelOptions::default(),
        }
    }
}

impl InferenceParams {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_relax(mut self, relax: f32) -> Self {
        self.relax = relax;
        self
    }

    pub fn validate(&self) -> Result<(), CrfError> {
        validate_relax(self.relax)
    }
}

pub(crate) fn validate_relax(relax: f32) -> Result<(), CrfError> {
    if relax > 0.0 && relax <= 1.0 {
        Ok(())
    } else {
        Err(CrfError::InvalidRelax(relax))
    }
}

/// Smoothness kernel over pixel positions only.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GaussianKernelParams {
    /// Spatial standard deviation (px) along x and y.
    pub sigma_xy: [f32; 2],
    pub pairwise: PairwiseParams,
}

impl Default for GaussianKernelParams {
    fn default() -> Self {
        Self {
            sigma_xy: [3.0, 3.0],
            pairwise: PairwiseParams::default().with_weight(3.0),
        }
    }
}

/// Appearance kernel over pixel positions and colour channels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BilateralKernelParams {
    /// Spatial standard deviation (px) along x and y.
    pub sigma_xy: [f32; 2],
    /// Standard deviation applied to every colour channel (intensity units).
    pub sigma_color: f32,
    pub pairwise: PairwiseParams,
}

impl Default for BilateralKernelParams {
    fn default() -> Self {
        Self {
            sigma_xy: [80.0, 80.0],
            sigma_color: 13.0,
            pairwise: PairwiseParams::default().with_weight(10.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relax_must_be_in_unit_interval() {
        assert!(InferenceParams::default().validate().is_ok());
        assert!(InferenceParams::default().with_relax(0.5).validate().is_ok());
        assert!(matches!(
            InferenceParams::default().with_relax(0.0).validate(),
            Err(CrfError::InvalidRelax(_))
        ));
        assert!(InferenceParams::default()
            .with_relax(1.5)
            .validate()
            .is_err());
        assert!(InferenceParams::default()
            .with_relax(f32::NAN)
            .validate()
            .is_err());
    }
}
