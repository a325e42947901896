//! Top-level orchestrator.

use image::RgbImage;
use nalgebra::Matrix3;

use super::{Registration, RegistrationStats};
use crate::canvas::CanvasLayout;
use crate::config::RegistrationConfig;
use crate::error::{EstimationFailure, InputError, RegistrationError};
use crate::features::{detect_features, match_features, Match};
use crate::homography::utils::{inlier_errors, mean_and_p95};
use crate::homography::{
    homography_to_array, intersection_box, normalize_h22, orsa_homography, refine_on_inliers,
    translation, OrsaResult,
};
use crate::raster::{to_gray, MIN_IMAGE_SIDE};
use crate::render::render_matches;
use crate::warp::warp_pair;

fn check_size(index: u8, img: &RgbImage) -> Result<(), InputError> {
    let (w, h) = img.dimensions();
    if (w as usize) < MIN_IMAGE_SIDE || (h as usize) < MIN_IMAGE_SIDE {
        return Err(InputError::TooSmall {
            index,
            width: w as usize,
            height: h as usize,
            min_side: MIN_IMAGE_SIDE,
        });
    }
    Ok(())
}

fn split_points(matches: &[Match]) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    matches
        .iter()
        .map(|m| {
            (
                [m.p1[0] as f64, m.p1[1] as f64],
                [m.p2[0] as f64, m.p2[1] as f64],
            )
        })
        .unzip()
}

/// Least-squares model on the ORSA inliers, falling back to the ORSA model.
fn final_homography(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    orsa: &OrsaResult,
) -> Result<Matrix3<f64>, RegistrationError> {
    match refine_on_inliers(src, dst, &orsa.inliers).and_then(|h| normalize_h22(&h)) {
        Ok(h) => Ok(h),
        Err(err) => {
            tracing::warn!("refinement on inliers failed ({err}), keeping the ORSA model");
            Ok(normalize_h22(&orsa.h)?)
        }
    }
}

/// Mosaic frame: center the overlap of the two images in the canvas.
fn mosaic_frame(
    size1: [usize; 2],
    size2: [usize; 2],
    layout: &CanvasLayout,
    h: &Matrix3<f64>,
) -> Result<Matrix3<f64>, EstimationFailure> {
    let rect = intersection_box(size1, size2, h).ok_or(EstimationFailure::NoOverlap)?;
    let [xc, yc] = rect.center();
    let xo = layout.warp_size[0] as i64 / 2;
    let yo = layout.warp_size[1] as i64 / 2;
    tracing::debug!(?rect, "overlap of the two images in image 2");
    Ok(translation((xo - xc) as f64, (yo - yc) as f64))
}

/// Register two 8-bit RGB images.
pub(crate) fn register_rgb(
    image1: &RgbImage,
    image2: &RgbImage,
    config: &RegistrationConfig,
) -> Result<Registration, RegistrationError> {
    check_size(1, image1)?;
    check_size(2, image2)?;

    let size1 = [image1.width() as usize, image1.height() as usize];
    let size2 = [image2.width() as usize, image2.height() as usize];
    let layout = CanvasLayout::for_sizes(size1[0], size1[1], size2[0], size2[1]);

    let gray1 = to_gray(image1);
    let gray2 = to_gray(image2);
    let features1 = detect_features(&gray1, &config.sift);
    let features2 = detect_features(&gray2, &config.sift);
    let matches = match_features(&features1, &features2, &config.matching);
    tracing::info!(
        keypoints1 = features1.len(),
        keypoints2 = features2.len(),
        matches = matches.len(),
        "features matched"
    );

    let (src, dst) = split_points(&matches);
    let orsa = orsa_homography(&src, &dst, size1, size2, &config.orsa)?;
    let h = final_homography(&src, &dst, &orsa)?;

    let mut errors = inlier_errors(&h, &src, &dst, &orsa.inliers);
    let (mean_error_px, p95_error_px) = mean_and_p95(&mut errors);
    tracing::info!(
        inliers = orsa.inliers.len(),
        log_nfa = orsa.log_nfa,
        mean_error_px,
        "homography estimated"
    );

    let (inliers, outliers) = render_matches(&gray1, &gray2, &layout, &matches, &orsa.inliers, &h);

    let t = mosaic_frame(size1, size2, &layout, &h)?;
    let pair = warp_pair(
        image1,
        image2,
        &(t * h),
        &t,
        layout.warp_size,
        config.render.background,
    )?;

    let stats = RegistrationStats {
        homography: homography_to_array(&h),
        keypoints1: features1.len(),
        keypoints2: features2.len(),
        matches: matches.len(),
        inliers: orsa.inliers.len(),
        log_nfa: orsa.log_nfa,
        precision_px: orsa.precision_px,
        mean_error_px,
        p95_error_px,
        iterations: orsa.iterations,
        layout,
    };

    Ok(Registration {
        homography: h,
        matches,
        inlier_indices: orsa.inliers,
        inliers,
        outliers,
        warped1: pair.warped1,
        warped2: pair.warped2,
        mosaic: pair.mosaic,
        stats,
    })
}
