//! orsa-mosaic: robust homographic registration of image pairs.
//!
//! The pipeline stages are:
//!
//! 1. **Features** – SIFT keypoints on a difference-of-Gaussian scale space
//!    with 128-d gradient descriptors.
//! 2. **Matching** – nearest / second-nearest ratio test, duplicate removal.
//! 3. **ORSA** – a-contrario RANSAC: the homography with the lowest number
//!    of false alarms, followed by least-squares refinement on its inliers.
//! 4. **Rendering** – inlier/outlier visualisations, both images warped into
//!    a canvas centred on their overlap, and a mosaic.
//!
//! # Public API
//! - [`Registrar`] and [`estimate_homography`] as entry points
//! - [`RegistrationConfig`] for tuning, loadable from JSON
//! - building blocks ([`detect_features`], [`match_features`],
//!   [`orsa_homography`], [`warp_image`], ...) for reuse and benchmarking

mod api;
mod canvas;
mod config;
mod error;
mod features;
mod homography;
mod pipeline;
mod raster;
mod render;
mod warp;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{estimate_homography, OutputBuffers, Registrar, IDENTITY_SENTINEL};
pub use canvas::CanvasLayout;
pub use config::{MatchConfig, OrsaConfig, RegistrationConfig, RenderConfig, SiftConfig};
pub use error::{ConfigError, EstimationFailure, InputError, NumericFailure, RegistrationError};
pub use features::{detect_features, match_features, Feature, Keypoint, Match, DESCRIPTOR_LEN};
pub use homography::{
    estimate_homography_dlt, homography_from_array, homography_project,
    homography_reprojection_error, homography_to_array, intersection_box, orsa_homography,
    refine_on_inliers, OrsaResult, Rect, MIN_MATCHES, SAMPLE_SIZE,
};
pub use pipeline::{Registration, RegistrationStats};
pub use raster::{to_gray, PlanarImage, Raster, MIN_IMAGE_SIDE};
pub use render::render_matches;
pub use warp::{warp_image, warp_pair, WarpedPair};
