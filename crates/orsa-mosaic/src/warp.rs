//! Inverse-mapping homographic warps with bilinear interpolation.

use image::RgbImage;
use nalgebra::Matrix3;

use crate::error::NumericFailure;
use crate::homography::homography_project;
use crate::raster::PlanarImage;

/// Bilinear RGB sample at `(x, y)`; `None` outside `[0, w-1] x [0, h-1]`.
#[inline]
pub(crate) fn bilinear_rgb(img: &RgbImage, x: f64, y: f64) -> Option<[f32; 3]> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || !(x >= 0.0 && y >= 0.0) {
        return None;
    }
    if x > (w - 1) as f64 || y > (h - 1) as f64 {
        return None;
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0.0f32; 3];
    for (c, v) in out.iter_mut().enumerate() {
        *v = (1.0 - fx) * (1.0 - fy) * p00[c] as f32
            + fx * (1.0 - fy) * p10[c] as f32
            + (1.0 - fx) * fy * p01[c] as f32
            + fx * fy * p11[c] as f32;
    }
    Some(out)
}

/// Source position of canvas pixel `(x, y)` under the inverse map, `None`
/// when it lies behind the line at infinity.
#[inline]
fn source_position(h_inv: &Matrix3<f64>, x: usize, y: usize) -> Option<[f64; 2]> {
    let (xf, yf) = (x as f64, y as f64);
    let w = h_inv[(2, 0)] * xf + h_inv[(2, 1)] * yf + h_inv[(2, 2)];
    if w <= 0.0 {
        return None;
    }
    let p = homography_project(h_inv, xf, yf);
    (p[0].is_finite() && p[1].is_finite()).then_some(p)
}

fn invert(h: &Matrix3<f64>) -> Result<Matrix3<f64>, NumericFailure> {
    let inv = h
        .try_inverse()
        .ok_or(NumericFailure::Singular("warp homography"))?;
    // Keep the homogeneous sign convention: w > 0 in front of the camera.
    let inv = if inv[(2, 2)] < 0.0 { -inv } else { inv };
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(NumericFailure::NonFinite);
    }
    Ok(inv)
}

/// Warp `src` into a `size[0] x size[1]` canvas, `h` mapping source pixels
/// to canvas pixels. Canvas pixels with no source sample get `background`.
pub fn warp_image(
    src: &RgbImage,
    h: &Matrix3<f64>,
    size: [usize; 2],
    background: f32,
) -> Result<PlanarImage, NumericFailure> {
    let h_inv = invert(h)?;
    let mut out = PlanarImage::filled(size[0], size[1], background);
    for y in 0..size[1] {
        for x in 0..size[0] {
            let sample = source_position(&h_inv, x, y).and_then(|p| bilinear_rgb(src, p[0], p[1]));
            if let Some(rgb) = sample {
                out.set_rgb(x, y, rgb);
            }
        }
    }
    Ok(out)
}

/// Both warped images and their mosaic.
#[derive(Debug, Clone)]
pub struct WarpedPair {
    pub warped1: PlanarImage,
    pub warped2: PlanarImage,
    /// Average where both images cover a pixel, the single sample where one
    /// does, background elsewhere.
    pub mosaic: PlanarImage,
}

/// Warp two images into a common canvas and composite them.
pub fn warp_pair(
    image1: &RgbImage,
    image2: &RgbImage,
    h1: &Matrix3<f64>,
    h2: &Matrix3<f64>,
    size: [usize; 2],
    background: f32,
) -> Result<WarpedPair, NumericFailure> {
    let h1_inv = invert(h1)?;
    let h2_inv = invert(h2)?;

    let mut warped1 = PlanarImage::filled(size[0], size[1], background);
    let mut warped2 = PlanarImage::filled(size[0], size[1], background);
    let mut mosaic = PlanarImage::filled(size[0], size[1], background);

    for y in 0..size[1] {
        for x in 0..size[0] {
            let s1 = source_position(&h1_inv, x, y).and_then(|p| bilinear_rgb(image1, p[0], p[1]));
            let s2 = source_position(&h2_inv, x, y).and_then(|p| bilinear_rgb(image2, p[0], p[1]));
            if let Some(a) = s1 {
                warped1.set_rgb(x, y, a);
            }
            if let Some(b) = s2 {
                warped2.set_rgb(x, y, b);
            }
            let blended = match (s1, s2) {
                (Some(a), Some(b)) => Some([
                    0.5 * (a[0] + b[0]),
                    0.5 * (a[1] + b[1]),
                    0.5 * (a[2] + b[2]),
                ]),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };
            if let Some(rgb) = blended {
                mosaic.set_rgb(x, y, rgb);
            }
        }
    }

    Ok(WarpedPair {
        warped1,
        warped2,
        mosaic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homography::translation;
    use image::Rgb;

    fn gradient_rgb(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, ((x + y) * 5) as u8]))
    }

    #[test]
    fn identity_warp_reproduces_the_source() {
        let src = gradient_rgb(12, 9);
        let out = warp_image(&src, &Matrix3::identity(), [12, 9], 0.0).unwrap();
        assert_eq!(out, PlanarImage::from_rgb8(&src));
    }

    #[test]
    fn translation_shifts_and_fills_background() {
        let src = gradient_rgb(10, 10);
        let out = warp_image(&src, &translation(3.0, 0.0), [10, 10], -1.0).unwrap();
        assert_eq!(out.get(0, 2, 4), -1.0);
        assert_eq!(out.get(0, 3, 4), 0.0);
        assert_eq!(out.get(0, 9, 4), 60.0);
    }

    #[test]
    fn bilinear_sample_accepts_the_last_row_and_column() {
        let src = gradient_rgb(4, 4);
        assert_eq!(bilinear_rgb(&src, 3.0, 3.0), Some([30.0, 30.0, 30.0]));
        assert_eq!(bilinear_rgb(&src, 1.5, 0.0).map(|p| p[0]), Some(15.0));
        assert_eq!(bilinear_rgb(&src, 3.01, 0.0), None);
        assert_eq!(bilinear_rgb(&src, -0.01, 0.0), None);
    }

    #[test]
    fn mosaic_averages_the_overlap() {
        let a = RgbImage::from_pixel(8, 8, Rgb([100, 100, 100]));
        let b = RgbImage::from_pixel(8, 8, Rgb([200, 0, 50]));
        let h1 = translation(-4.0, 0.0);
        let pair = warp_pair(&a, &b, &h1, &Matrix3::identity(), [8, 8], 0.0).unwrap();
        // Image 1 covers x <= 3 only, image 2 everything.
        assert_eq!(pair.mosaic.get(0, 2, 2), 150.0);
        assert_eq!(pair.mosaic.get(1, 2, 2), 50.0);
        assert_eq!(pair.mosaic.get(0, 6, 2), 200.0);
        assert_eq!(pair.warped1.get(0, 6, 2), 0.0);
        assert_eq!(pair.warped2.get(2, 6, 2), 50.0);
    }

    #[test]
    fn singular_homography_is_rejected() {
        let src = gradient_rgb(8, 8);
        assert!(warp_image(&src, &Matrix3::zeros(), [8, 8], 0.0).is_err());
    }
}
