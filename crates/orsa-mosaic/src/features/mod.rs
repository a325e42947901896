//! SIFT keypoints, descriptors and ratio-test matching.

mod descriptor;
mod keypoints;
mod matching;
mod scale_space;

use image::GrayImage;

use crate::config::SiftConfig;

pub use descriptor::DESCRIPTOR_LEN;
pub use matching::match_features;

/// Oriented keypoint in input-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Scale (Gaussian sigma) in input pixels.
    pub sigma: f32,
    /// Orientation in radians, `[0, 2pi)`.
    pub angle: f32,
    /// Octave index; `-1` is the upsampled octave.
    pub octave: i32,
    /// Interpolated DoG response.
    pub response: f32,
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: [f32; DESCRIPTOR_LEN],
}

/// Correspondence between `features1[index1]` and `features2[index2]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Match {
    pub index1: usize,
    pub index2: usize,
    pub p1: [f32; 2],
    pub p2: [f32; 2],
    /// Euclidean descriptor distance.
    pub distance: f32,
}

/// Detect SIFT features in a grayscale image.
///
/// Points with several dominant orientations yield one feature per
/// orientation. The output order is deterministic.
pub fn detect_features(gray: &GrayImage, config: &SiftConfig) -> Vec<Feature> {
    let space = scale_space::build_scale_space(gray, config);
    let first_octave = if config.upsample { -1 } else { 0 };

    let mut features = Vec::new();
    for p in keypoints::find_keypoints(&space, config) {
        let delta = space.octaves[p.octave].delta;
        let sigma = space.layer_sigma(p.layer) * delta;
        for angle in keypoints::orientations(&space, &p, config.orientation_peak_ratio) {
            features.push(Feature {
                keypoint: Keypoint {
                    x: p.x * delta,
                    y: p.y * delta,
                    sigma,
                    angle,
                    octave: first_octave + p.octave as i32,
                    response: p.response,
                },
                descriptor: descriptor::compute_descriptor(&space, &p, angle),
            });
        }
    }

    tracing::debug!(
        "detected {} features in {}x{} image ({} octaves)",
        features.len(),
        gray.width(),
        gray.height(),
        space.octaves.len()
    );
    features
}
