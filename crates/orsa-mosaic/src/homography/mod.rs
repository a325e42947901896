//! Homography estimation: DLT, ORSA and overlap geometry.

mod core;
mod orsa;
pub(crate) mod utils;

pub use self::core::{
    estimate_homography_dlt, homography_from_array, homography_project,
    homography_reprojection_error, homography_to_array,
};
pub use orsa::{orsa_homography, refine_on_inliers, OrsaResult, MIN_MATCHES, SAMPLE_SIZE};
pub use utils::{intersection_box, Rect};

pub(crate) use self::core::{normalize_h22, translation};
