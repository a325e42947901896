//! Registration configuration.
//!
//! All sections derive `serde` so a full configuration can be stored next to
//! a dataset and reloaded with [`RegistrationConfig::from_json_file`].
//! Missing fields fall back to their defaults.

use std::path::Path;

use crate::error::ConfigError;

/// SIFT scale-space and keypoint selection parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Double the image resolution before building the first octave.
    pub upsample: bool,
    /// Blur of the first octave base image.
    pub sigma0: f32,
    /// Blur already present in the input image.
    pub input_sigma: f32,
    /// Scales sampled per octave.
    pub scales_per_octave: usize,
    /// Upper bound on the number of octaves.
    pub max_octaves: usize,
    /// DoG contrast threshold (intensities in [0, 1]), divided by `scales_per_octave`.
    pub contrast_threshold: f32,
    /// Principal-curvature ratio above which extrema are treated as edges.
    pub edge_threshold: f32,
    /// Secondary orientation peaks must reach this fraction of the maximum.
    pub orientation_peak_ratio: f32,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            upsample: true,
            sigma0: 1.6,
            input_sigma: 0.5,
            scales_per_octave: 3,
            max_octaves: 8,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            orientation_peak_ratio: 0.8,
        }
    }
}

/// Descriptor matching parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// A correspondence is kept only if its descriptor distance is below
    /// this fraction of the distance to the second-best candidate.
    ///
    /// Lower values demand stronger support for each correspondence.
    pub significance_threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            significance_threshold: 0.6,
        }
    }
}

/// ORSA (a-contrario RANSAC) parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OrsaConfig {
    /// Total number of random samples, reserve included.
    pub max_iters: usize,
    /// Fraction of `max_iters` spent sampling inside the best inlier set.
    pub reserve_fraction: f64,
    /// Upper bound on the inlier threshold in pixels; `0` lets ORSA pick it.
    pub precision_px: f64,
    /// Stop early once enough samples were drawn for `confidence`.
    pub convergence_check: bool,
    /// Confidence used by the convergence check.
    pub confidence: f64,
    /// Sampler seed.
    pub seed: u64,
}

impl Default for OrsaConfig {
    fn default() -> Self {
        Self {
            max_iters: 10_000,
            reserve_fraction: 0.1,
            precision_px: 0.0,
            convergence_check: false,
            confidence: 0.99,
            seed: 0,
        }
    }
}

/// Output rendering parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Value written to warped/mosaic pixels that no source image covers.
    pub background: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { background: 0.0 }
    }
}

/// Complete registration configuration.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub sift: SiftConfig,
    pub matching: MatchConfig,
    pub orsa: OrsaConfig,
    pub render: RenderConfig,
}

impl RegistrationConfig {
    /// Configuration from the two scalar call parameters: ORSA precision
    /// (`0` = automatic) and the match significance threshold.
    pub fn with_call_params(precision_px: f64, significance_threshold: f32) -> Self {
        let mut config = Self::default();
        config.orsa.precision_px = precision_px;
        config.matching.significance_threshold = significance_threshold;
        config
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the configuration as pretty JSON.
    pub fn to_json_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
