//! Synthetic scenes shared by the unit tests.

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Mid-gray background covered with random bright and dark Gaussian blobs.
///
/// Blob sigmas lie in `[2, 6]` px, which gives SIFT plenty of well-localised
/// extrema at the first few octaves.
pub(crate) fn textured_scene(w: u32, h: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut acc = vec![128.0f32; (w * h) as usize];
    let blobs = (w * h / 270).max(10);

    for _ in 0..blobs {
        let cx = rng.gen_range(0.0..w as f32);
        let cy = rng.gen_range(0.0..h as f32);
        let sigma: f32 = rng.gen_range(2.0..6.0);
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let amp = sign * rng.gen_range(40.0..100.0f32);

        let r = (3.0 * sigma).ceil() as i32;
        let inv = -1.0 / (2.0 * sigma * sigma);
        let y_lo = (cy as i32 - r).max(0);
        let y_hi = (cy as i32 + r + 1).min(h as i32);
        let x_lo = (cx as i32 - r).max(0);
        let x_hi = (cx as i32 + r + 1).min(w as i32);
        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                acc[(y as u32 * w + x as u32) as usize] += amp * (d2 * inv).exp();
            }
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        Luma([acc[(y * w + x) as usize].round().clamp(0.0, 255.0) as u8])
    })
}

pub(crate) fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(gray.clone()).into_rgb8()
}

/// Interleaved f32 samples of a horizontal crop `[x0, x0 + w)`.
pub(crate) fn crop_samples(gray: &GrayImage, x0: u32, w: u32) -> Vec<f32> {
    let h = gray.height();
    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in x0..x0 + w {
            out.push(gray.get_pixel(x, y)[0] as f32);
        }
    }
    out
}
