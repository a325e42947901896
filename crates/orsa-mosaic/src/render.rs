//! Side-by-side match visualisations.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use nalgebra::Matrix3;

use crate::canvas::CanvasLayout;
use crate::features::Match;
use crate::homography::homography_project;
use crate::raster::PlanarImage;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// Placement of the two zoomed images on a match canvas.
#[derive(Debug, Clone, Copy)]
struct SideBySide {
    zoom: f32,
    offset1: [f32; 2],
    offset2: [f32; 2],
}

impl SideBySide {
    fn new(layout: &CanvasLayout, size1: [u32; 2], size2: [u32; 2]) -> Self {
        let z = layout.match_zoom;
        let h = layout.match_size[1] as f32;
        let dy = |hi: u32| ((h - hi as f32 * z) * 0.5).floor().max(0.0);
        Self {
            zoom: z,
            offset1: [0.0, dy(size1[1])],
            offset2: [(size1[0] as f32 * z).floor(), dy(size2[1])],
        }
    }

    /// Segment endpoints snap to pixel centres so both ends are drawn exactly.
    fn to_canvas(offset: [f32; 2], zoom: f32, p: [f32; 2]) -> (f32, f32) {
        (
            (offset[0] + zoom * p[0]).round(),
            (offset[1] + zoom * p[1]).round(),
        )
    }

    fn to_canvas1(&self, p: [f32; 2]) -> (f32, f32) {
        Self::to_canvas(self.offset1, self.zoom, p)
    }

    fn to_canvas2(&self, p: [f32; 2]) -> (f32, f32) {
        Self::to_canvas(self.offset2, self.zoom, p)
    }
}

fn zoomed_rgb(gray: &GrayImage, zoom: f32) -> Option<RgbImage> {
    let w = (gray.width() as f32 * zoom) as u32;
    let h = (gray.height() as f32 * zoom) as u32;
    if w == 0 || h == 0 {
        return None;
    }
    let scaled = imageops::resize(gray, w, h, FilterType::Triangle);
    Some(DynamicImage::ImageLuma8(scaled).into_rgb8())
}

/// White canvas with both grayscale images and the blue separator.
fn base_canvas(
    gray1: &GrayImage,
    gray2: &GrayImage,
    layout: &CanvasLayout,
    place: &SideBySide,
) -> RgbImage {
    let [w, h] = layout.match_size;
    let mut canvas = RgbImage::from_pixel(w as u32, h as u32, WHITE);
    if let Some(img) = zoomed_rgb(gray1, place.zoom) {
        imageops::overlay(&mut canvas, &img, place.offset1[0] as i64, place.offset1[1] as i64);
    }
    if let Some(img) = zoomed_rgb(gray2, place.zoom) {
        imageops::overlay(&mut canvas, &img, place.offset2[0] as i64, place.offset2[1] as i64);
    }
    if h > 0 {
        let x = place.offset2[0];
        draw_line_segment_mut(&mut canvas, (x, 0.0), (x, (h - 1) as f32), BLUE);
    }
    canvas
}

/// Inlier and outlier canvases.
///
/// Inliers are green segments between the two observations. Outliers are red
/// segments, plus a yellow segment from the position predicted by `h` to the
/// observation in image 2.
pub fn render_matches(
    gray1: &GrayImage,
    gray2: &GrayImage,
    layout: &CanvasLayout,
    matches: &[Match],
    inliers: &[usize],
    h: &Matrix3<f64>,
) -> (PlanarImage, PlanarImage) {
    let place = SideBySide::new(
        layout,
        [gray1.width(), gray1.height()],
        [gray2.width(), gray2.height()],
    );
    let mut inlier_canvas = base_canvas(gray1, gray2, layout, &place);
    let mut outlier_canvas = inlier_canvas.clone();

    let mut is_inlier = vec![false; matches.len()];
    for &i in inliers {
        if let Some(flag) = is_inlier.get_mut(i) {
            *flag = true;
        }
    }

    for (m, &inlier) in matches.iter().zip(&is_inlier) {
        let a = place.to_canvas1(m.p1);
        let b = place.to_canvas2(m.p2);
        if inlier {
            draw_line_segment_mut(&mut inlier_canvas, a, b, GREEN);
            continue;
        }
        draw_line_segment_mut(&mut outlier_canvas, a, b, RED);
        let q = homography_project(h, m.p1[0] as f64, m.p1[1] as f64);
        if q[0].is_finite() && q[1].is_finite() {
            let predicted = place.to_canvas2([q[0] as f32, q[1] as f32]);
            draw_line_segment_mut(&mut outlier_canvas, predicted, b, YELLOW);
        }
    }

    (
        PlanarImage::from_rgb8(&inlier_canvas),
        PlanarImage::from_rgb8(&outlier_canvas),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn matches() -> Vec<Match> {
        vec![
            Match {
                index1: 0,
                index2: 0,
                p1: [10.0, 10.0],
                p2: [10.0, 10.0],
                distance: 0.1,
            },
            Match {
                index1: 1,
                index2: 1,
                p1: [30.0, 20.0],
                p2: [5.0, 35.0],
                distance: 0.2,
            },
        ]
    }

    #[test]
    fn canvases_follow_the_layout() {
        let g1 = GrayImage::from_pixel(40, 40, Luma([128]));
        let g2 = GrayImage::from_pixel(40, 40, Luma([128]));
        let layout = CanvasLayout::for_sizes(40, 40, 40, 40);
        let (inl, outl) =
            render_matches(&g1, &g2, &layout, &matches(), &[0], &Matrix3::identity());
        assert_eq!((inl.width, inl.height), (40, 20));
        assert_eq!(inl.data.len(), layout.match_len());
        assert_eq!(outl.data.len(), layout.match_len());

        // Separator at x = w1 * z = 20.
        let sep = [inl.get(0, 20, 3), inl.get(1, 20, 3), inl.get(2, 20, 3)];
        assert_eq!(sep, [0.0, 0.0, 255.0]);
        // Gray image content.
        assert_eq!(inl.get(0, 3, 10), 128.0);
    }

    #[test]
    fn inliers_and_outliers_use_their_colours() {
        let g1 = GrayImage::from_pixel(40, 40, Luma([128]));
        let g2 = GrayImage::from_pixel(40, 40, Luma([128]));
        let layout = CanvasLayout::for_sizes(40, 40, 40, 40);
        let (inl, outl) =
            render_matches(&g1, &g2, &layout, &matches(), &[0], &Matrix3::identity());

        // Inlier segment from (5, 5) to (25, 5) on the inlier canvas only.
        let green = [inl.get(0, 12, 5), inl.get(1, 12, 5), inl.get(2, 12, 5)];
        assert_eq!(green, [0.0, 255.0, 0.0]);
        assert_eq!(outl.get(1, 12, 5), 128.0);

        // Outlier 1 starts at (15, 10) in red.
        assert_eq!([outl.get(0, 15, 10), outl.get(1, 15, 10)], [255.0, 0.0]);
        // Its prediction (30, 20) in image 2 lands at (35, 10) and the
        // observation (5, 35) at (22.5, 17.5), drawn from (23, 18).
        let yellow = [255.0, 255.0, 0.0];
        for (x, y) in [(35, 10), (23, 18)] {
            assert_eq!([outl.get(0, x, y), outl.get(1, x, y), outl.get(2, x, y)], yellow);
        }
    }
}
