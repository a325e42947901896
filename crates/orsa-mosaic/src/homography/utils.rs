//! Overlap geometry and error statistics for an estimated homography.

use std::cmp::Ordering;

use nalgebra::Matrix3;

use super::core::{homogeneous_w, homography_project, homography_reprojection_error};

/// Integer axis-aligned rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Rect {
    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Integer center (truncating division).
    pub fn center(&self) -> [i64; 2] {
        [(self.left + self.right) / 2, (self.top + self.bottom) / 2]
    }
}

/// Bounding box of image 1 mapped by `h`, clipped to image 2.
///
/// Returns `None` when a corner of image 1 maps to or beyond the line at
/// infinity, or when the clipped box is empty.
pub fn intersection_box(size1: [usize; 2], size2: [usize; 2], h: &Matrix3<f64>) -> Option<Rect> {
    let (w1, h1) = (size1[0] as f64, size1[1] as f64);
    let corners = [[0.0, 0.0], [w1, 0.0], [w1, h1], [0.0, h1]];

    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for c in &corners {
        if homogeneous_w(h, c[0], c[1]) <= 0.0 {
            return None;
        }
        let p = homography_project(h, c[0], c[1]);
        if !p[0].is_finite() || !p[1].is_finite() {
            return None;
        }
        for k in 0..2 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }

    let rect = Rect {
        left: (min[0].floor() as i64).max(0),
        top: (min[1].floor() as i64).max(0),
        right: (max[0].ceil() as i64).min(size2[0] as i64),
        bottom: (max[1].ceil() as i64).min(size2[1] as i64),
    };
    (!rect.is_empty()).then_some(rect)
}

/// Mean and P95 of an error slice (sorted in place).
pub(crate) fn mean_and_p95(errors: &mut [f64]) -> (f64, f64) {
    if errors.is_empty() {
        return (0.0, 0.0);
    }
    errors.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mean = errors.iter().sum::<f64>() / errors.len() as f64;
    let idx = ((errors.len() as f64 * 0.95) as usize).min(errors.len() - 1);
    (mean, errors[idx])
}

/// Forward reprojection errors of the selected correspondences.
pub(crate) fn inlier_errors(
    h: &Matrix3<f64>,
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    inliers: &[usize],
) -> Vec<f64> {
    inliers
        .iter()
        .map(|&i| homography_reprojection_error(h, &src[i], &dst[i]))
        .filter(|e| e.is_finite())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homography::core::translation;

    #[test]
    fn translated_overlap_is_clipped_to_image_two() {
        let h = translation(-64.0, 0.0);
        let rect = intersection_box([192, 160], [192, 160], &h).unwrap();
        assert_eq!(
            rect,
            Rect {
                left: 0,
                top: 0,
                right: 128,
                bottom: 160
            }
        );
        assert_eq!(rect.center(), [64, 80]);
    }

    #[test]
    fn disjoint_images_have_no_intersection() {
        let h = translation(500.0, 0.0);
        assert_eq!(intersection_box([100, 100], [100, 100], &h), None);
    }

    #[test]
    fn corners_behind_the_camera_are_rejected() {
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.02, 0.0, 1.0);
        assert_eq!(intersection_box([100, 100], [100, 100], &h), None);
    }

    #[test]
    fn mean_and_p95_handles_empty_and_non_empty_errors() {
        let mut empty = Vec::<f64>::new();
        assert_eq!(mean_and_p95(&mut empty), (0.0, 0.0));

        let mut values = vec![0.4, 0.1, 0.2, 0.3, 0.5];
        let (mean, p95) = mean_and_p95(&mut values);
        assert!((mean - 0.3).abs() < 1e-12);
        assert!((p95 - 0.5).abs() < 1e-12);
    }
}
