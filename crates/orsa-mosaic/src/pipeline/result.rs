use nalgebra::Matrix3;

use crate::canvas::CanvasLayout;
use crate::features::Match;
use crate::homography::homography_to_array;
use crate::raster::PlanarImage;

/// Summary of a registration, serialisable for reports.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegistrationStats {
    /// Homography from image 1 to image 2 (row-major, `H[2][2] == 1`).
    pub homography: [f64; 9],
    pub keypoints1: usize,
    pub keypoints2: usize,
    /// Correspondences after the ratio test and duplicate removal.
    pub matches: usize,
    pub inliers: usize,
    /// log10 NFA of the ORSA model.
    pub log_nfa: f64,
    /// Inlier threshold selected by ORSA (pixels).
    pub precision_px: f64,
    /// Mean transfer error of the inliers under the final homography.
    pub mean_error_px: f64,
    /// 95th percentile of the inlier transfer error.
    pub p95_error_px: f64,
    /// ORSA samples drawn.
    pub iterations: usize,
    pub layout: CanvasLayout,
}

/// Full output of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Maps image 1 pixels to image 2 pixels.
    pub homography: Matrix3<f64>,
    pub matches: Vec<Match>,
    /// Sorted indices into `matches`.
    pub inlier_indices: Vec<usize>,
    /// Inlier visualisation (`layout.match_size`).
    pub inliers: PlanarImage,
    /// Outlier visualisation (`layout.match_size`).
    pub outliers: PlanarImage,
    /// Image 1 in the mosaic frame (`layout.warp_size`).
    pub warped1: PlanarImage,
    /// Image 2 in the mosaic frame (`layout.warp_size`).
    pub warped2: PlanarImage,
    pub mosaic: PlanarImage,
    pub stats: RegistrationStats,
}

impl Registration {
    /// Row-major homography coefficients.
    pub fn homography_array(&self) -> [f64; 9] {
        homography_to_array(&self.homography)
    }
}
