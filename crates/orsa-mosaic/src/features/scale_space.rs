//! Gaussian and difference-of-Gaussian pyramids.

use image::{GrayImage, ImageBuffer, Luma};

use crate::config::SiftConfig;

pub(crate) type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Octaves stop once the base image side drops below this.
const MIN_OCTAVE_SIDE: u32 = 16;

pub(crate) struct Octave {
    /// `S + 3` progressively blurred images.
    pub gaussians: Vec<FloatImage>,
    /// `S + 2` differences of consecutive Gaussians.
    pub dogs: Vec<FloatImage>,
    /// Size of one octave pixel in input pixels.
    pub delta: f32,
}

pub(crate) struct ScaleSpace {
    pub octaves: Vec<Octave>,
    pub scales_per_octave: usize,
    pub sigma0: f32,
}

impl ScaleSpace {
    /// Blur level (in octave pixels) of Gaussian layer `s`, fractional `s` allowed.
    pub fn layer_sigma(&self, s: f32) -> f32 {
        self.sigma0 * 2f32.powf(s / self.scales_per_octave as f32)
    }
}

/// Convert to `[0, 1]` intensities.
pub(crate) fn to_float(gray: &GrayImage) -> FloatImage {
    let (w, h) = gray.dimensions();
    let data = gray.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    // Same dimensions and sample count as `gray`.
    FloatImage::from_raw(w, h, data).unwrap_or_else(|| FloatImage::new(w, h))
}

/// Sampled Gaussian truncated at `4 * sigma`, normalised to unit sum.
///
/// `imageproc::filter::gaussian_blur_f32` cuts its kernel at `2 * sigma`,
/// which loses about an eighth of the blur per layer and breaks the scale
/// relation between octaves.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (4.0 * sigma).ceil().max(1.0) as i32;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|v| *v /= sum);
    kernel
}

fn blur(img: &FloatImage, sigma: f32) -> FloatImage {
    if sigma <= 1e-3 {
        return img.clone();
    }
    imageproc::filter::separable_filter_equal(img, &gaussian_kernel(sigma))
}

/// Bilinear 2x upsampling, output pixel `(x, y)` samples input `(x/2, y/2)`.
fn upsample2x(img: &FloatImage) -> FloatImage {
    let (w, h) = img.dimensions();
    let src = img.as_raw();
    let (wu, hu) = (w as usize, h as usize);
    FloatImage::from_fn(2 * w, 2 * h, |x, y| {
        let fx = x as f32 * 0.5;
        let fy = y as f32 * 0.5;
        let x0 = (fx.floor() as usize).min(wu - 1);
        let y0 = (fy.floor() as usize).min(hu - 1);
        let x1 = (x0 + 1).min(wu - 1);
        let y1 = (y0 + 1).min(hu - 1);
        let ax = fx - x0 as f32;
        let ay = fy - y0 as f32;
        let top = (1.0 - ax) * src[y0 * wu + x0] + ax * src[y0 * wu + x1];
        let bot = (1.0 - ax) * src[y1 * wu + x0] + ax * src[y1 * wu + x1];
        Luma([(1.0 - ay) * top + ay * bot])
    })
}

/// Keep every second pixel.
fn downsample2x(img: &FloatImage) -> FloatImage {
    let (w, h) = img.dimensions();
    FloatImage::from_fn((w / 2).max(1), (h / 2).max(1), |x, y| {
        *img.get_pixel((2 * x).min(w - 1), (2 * y).min(h - 1))
    })
}

fn subtract(a: &FloatImage, b: &FloatImage) -> FloatImage {
    let (w, h) = a.dimensions();
    let data = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(x, y)| x - y)
        .collect();
    FloatImage::from_raw(w, h, data).unwrap_or_else(|| FloatImage::new(w, h))
}

/// Build the pyramid for `gray`. Empty when the image is too small for a
/// single octave.
pub(crate) fn build_scale_space(gray: &GrayImage, config: &SiftConfig) -> ScaleSpace {
    let s = config.scales_per_octave.max(1);
    let sigma0 = config.sigma0;
    let mut space = ScaleSpace {
        octaves: Vec::new(),
        scales_per_octave: s,
        sigma0,
    };
    if gray.width() == 0 || gray.height() == 0 {
        return space;
    }

    let mut base = to_float(gray);
    let mut delta = 1.0f32;
    if config.upsample {
        base = upsample2x(&base);
        delta = 0.5;
    }

    // Bring the assumed camera blur up to sigma0 in working pixels.
    let sigma_in = config.input_sigma / delta;
    let sigma_diff = (sigma0 * sigma0 - sigma_in * sigma_in).max(0.0).sqrt();
    base = blur(&base, sigma_diff);

    let k = 2f32.powf(1.0 / s as f32);
    let increment = (k * k - 1.0).sqrt();

    while space.octaves.len() < config.max_octaves
        && base.width().min(base.height()) >= MIN_OCTAVE_SIDE
    {
        let mut gaussians = Vec::with_capacity(s + 3);
        gaussians.push(base);
        let mut sigma = sigma0;
        for _ in 1..s + 3 {
            let next = match gaussians.last() {
                Some(prev) => blur(prev, sigma * increment),
                None => break,
            };
            gaussians.push(next);
            sigma *= k;
        }

        let dogs = gaussians
            .windows(2)
            .map(|pair| subtract(&pair[1], &pair[0]))
            .collect();

        base = downsample2x(&gaussians[s]);
        space.octaves.push(Octave {
            gaussians,
            dogs,
            delta,
        });
        delta *= 2.0;
    }

    tracing::trace!(
        octaves = space.octaves.len(),
        upsample = config.upsample,
        "built scale space"
    );
    space
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octave_count_and_layer_shapes() {
        let gray = GrayImage::from_fn(64, 40, |x, y| Luma([((x * 7 + y * 3) % 255) as u8]));
        let space = build_scale_space(&gray, &SiftConfig::default());

        // Upsampled base 128x80: 80, 40, 20 >= 16, then 10 stops.
        assert_eq!(space.octaves.len(), 3);
        let first = &space.octaves[0];
        assert_eq!(first.gaussians.len(), 6);
        assert_eq!(first.dogs.len(), 5);
        assert_eq!(first.gaussians[0].dimensions(), (128, 80));
        assert_eq!(space.octaves[1].gaussians[0].dimensions(), (64, 40));
        assert_eq!(first.delta, 0.5);
        assert_eq!(space.octaves[2].delta, 2.0);
    }

    #[test]
    fn tiny_image_without_upsampling_has_no_octave() {
        let gray = GrayImage::new(12, 12);
        let config = SiftConfig {
            upsample: false,
            ..SiftConfig::default()
        };
        assert!(build_scale_space(&gray, &config).octaves.is_empty());
    }

    #[test]
    fn upsampling_interpolates_between_pixels() {
        let img = FloatImage::from_raw(2, 1, vec![0.0, 1.0]).unwrap();
        let up = upsample2x(&img);
        assert_eq!(up.dimensions(), (4, 2));
        let row: Vec<f32> = (0..4).map(|x| up.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn kernel_carries_the_requested_variance() {
        for sigma in [0.6f32, 1.2, 2.5] {
            let kernel = gaussian_kernel(sigma);
            let r = (kernel.len() / 2) as f32;
            let sum: f32 = kernel.iter().sum();
            let var: f32 = kernel
                .iter()
                .enumerate()
                .map(|(i, v)| v * (i as f32 - r).powi(2))
                .sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!((var.sqrt() - sigma).abs() < 0.02 * sigma, "sigma {sigma}: {}", var.sqrt());
        }
    }

    #[test]
    fn same_scale_layers_agree_across_octaves() {
        // Octave o layer S and octave o+1 layer 0 represent the same blur.
        let gray = GrayImage::from_fn(96, 96, |x, y| {
            let d2 = (x as f32 - 48.0).powi(2) + (y as f32 - 48.0).powi(2);
            Luma([(40.0 + 180.0 * (-d2 / 50.0).exp()) as u8])
        });
        let config = SiftConfig::default();
        let space = build_scale_space(&gray, &config);
        let s = config.scales_per_octave;
        let fine = &space.octaves[1].dogs[s];
        let coarse = &space.octaves[2].dogs[0];
        let a = fine.get_pixel(48, 48)[0];
        let b = coarse.get_pixel(24, 24)[0];
        assert!(a < 0.0 && b < 0.0);
        assert!((a - b).abs() < 0.03 * b.abs(), "fine {a}, coarse {b}");
    }

    #[test]
    fn flat_image_has_zero_dog() {
        let gray = GrayImage::from_pixel(40, 40, Luma([90]));
        let space = build_scale_space(&gray, &SiftConfig::default());
        for octave in &space.octaves {
            for dog in &octave.dogs {
                assert!(dog.as_raw().iter().all(|v| v.abs() < 1e-5));
            }
        }
    }
}
