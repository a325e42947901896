//! Caller-facing rasters and conversion to the 8-bit working images.

use image::{GrayImage, Rgb, RgbImage};

use crate::error::InputError;

/// Smallest accepted image side in pixels.
pub const MIN_IMAGE_SIDE: usize = 8;

/// Borrowed interleaved floating-point raster (`H x W x C`, row-major).
///
/// Samples are on a 0..255 scale. `channels` must be 1 or 3.
#[derive(Debug, Clone, Copy)]
pub struct Raster<'a> {
    pub data: &'a [f32],
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl<'a> Raster<'a> {
    pub fn new(data: &'a [f32], width: usize, height: usize, channels: usize) -> Self {
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// Check dimensions, channel count and sample count. `index` is 1 or 2
    /// and only used in the error.
    pub fn validate(&self, index: u8) -> Result<(), InputError> {
        if self.width < MIN_IMAGE_SIDE || self.height < MIN_IMAGE_SIDE {
            return Err(InputError::TooSmall {
                index,
                width: self.width,
                height: self.height,
                min_side: MIN_IMAGE_SIDE,
            });
        }
        if self.channels != 1 && self.channels != 3 {
            return Err(InputError::Channels {
                index,
                channels: self.channels,
            });
        }
        let expected = self.width * self.height * self.channels;
        if self.data.len() != expected {
            return Err(InputError::DataLength {
                index,
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Truncate samples to 8 bits; grayscale rasters are replicated to RGB.
    ///
    /// The raster must have passed [`Raster::validate`].
    pub fn to_rgb8(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width as u32, self.height as u32);
        for (i, px) in out.pixels_mut().enumerate() {
            *px = if self.channels == 1 {
                let v = to_u8(self.data[i]);
                Rgb([v, v, v])
            } else {
                let s = &self.data[3 * i..3 * i + 3];
                Rgb([to_u8(s[0]), to_u8(s[1]), to_u8(s[2])])
            };
        }
        out
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    // `as` saturates and maps NaN to 0.
    v as u8
}

/// Luminance conversion used for feature detection.
pub fn to_gray(rgb: &RgbImage) -> GrayImage {
    image::imageops::grayscale(rgb)
}

/// Owned channel-planar RGB raster (`3 x H x W`), the output format.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarImage {
    pub width: usize,
    pub height: usize,
    /// Channel planes R, G, B, each `width * height` samples.
    pub data: Vec<f32>,
}

impl PlanarImage {
    /// Image filled with a constant value.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; 3 * width * height],
        }
    }

    /// Number of samples in a planar buffer of the given size.
    pub fn len_for(width: usize, height: usize) -> usize {
        3 * width * height
    }

    #[inline]
    pub fn get(&self, channel: usize, x: usize, y: usize) -> f32 {
        self.data[channel * self.width * self.height + y * self.width + x]
    }

    #[inline]
    pub fn set_rgb(&mut self, x: usize, y: usize, rgb: [f32; 3]) {
        let plane = self.width * self.height;
        let idx = y * self.width + x;
        self.data[idx] = rgb[0];
        self.data[plane + idx] = rgb[1];
        self.data[2 * plane + idx] = rgb[2];
    }

    pub fn from_rgb8(img: &RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let mut out = Self::filled(w as usize, h as usize, 0.0);
        for (x, y, px) in img.enumerate_pixels() {
            out.set_rgb(
                x as usize,
                y as usize,
                [px[0] as f32, px[1] as f32, px[2] as f32],
            );
        }
        out
    }

    /// Round and clamp to an 8-bit RGB image, e.g. for saving.
    pub fn to_rgb8(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width as u32, self.height as u32);
        for (x, y, px) in out.enumerate_pixels_mut() {
            let (x, y) = (x as usize, y as usize);
            let q = |c: usize| self.get(c, x, y).round().clamp(0.0, 255.0) as u8;
            *px = Rgb([q(0), q(1), q(2)]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_shapes() {
        let data = vec![0.0f32; 16 * 16];
        assert!(Raster::new(&data, 16, 16, 1).validate(1).is_ok());
        assert_eq!(
            Raster::new(&data, 16, 16, 3).validate(2),
            Err(InputError::DataLength {
                index: 2,
                expected: 768,
                got: 256
            })
        );
        assert!(matches!(
            Raster::new(&data, 16, 16, 2).validate(1),
            Err(InputError::Channels { channels: 2, .. })
        ));
        assert!(matches!(
            Raster::new(&data[..16], 4, 4, 1).validate(1),
            Err(InputError::TooSmall { .. })
        ));
    }

    #[test]
    fn gray_raster_is_truncated_and_replicated() {
        let mut data = vec![0.0f32; 8 * 8];
        data[9] = 200.7;
        data[10] = 300.0;
        data[11] = f32::NAN;
        let rgb = Raster::new(&data, 8, 8, 1).to_rgb8();
        assert_eq!(rgb.get_pixel(1, 1).0, [200, 200, 200]);
        assert_eq!(rgb.get_pixel(2, 1).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(3, 1).0, [0, 0, 0]);
    }

    #[test]
    fn color_raster_keeps_channel_order() {
        let mut data = vec![0.0f32; 8 * 8 * 3];
        data[3 * 10..3 * 10 + 3].copy_from_slice(&[10.0, 20.0, 30.0]);
        let rgb = Raster::new(&data, 8, 8, 3).to_rgb8();
        assert_eq!(rgb.get_pixel(2, 1).0, [10, 20, 30]);
    }

    #[test]
    fn planar_layout_is_channel_major() {
        let mut img = PlanarImage::filled(4, 2, 0.0);
        img.set_rgb(3, 1, [1.0, 2.0, 3.0]);
        assert_eq!(img.data[7], 1.0);
        assert_eq!(img.data[8 + 7], 2.0);
        assert_eq!(img.data[16 + 7], 3.0);
        assert_eq!(img.to_rgb8().get_pixel(3, 1).0, [1, 2, 3]);
    }
}
