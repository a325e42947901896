//! High-level registration API.
//!
//! [`Registrar`] is the primary entry point and returns owned outputs.
//! [`estimate_homography`] writes into caller-allocated buffers whose sizes
//! follow [`CanvasLayout`].

use image::RgbImage;

use crate::canvas::CanvasLayout;
use crate::config::RegistrationConfig;
use crate::error::{InputError, RegistrationError};
use crate::pipeline::{self, Registration, RegistrationStats};
use crate::raster::{PlanarImage, Raster};

/// Written into the homography buffer when registration fails.
pub const IDENTITY_SENTINEL: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Registers image pairs with a fixed configuration.
///
/// # Examples
///
/// ```no_run
/// use orsa_mosaic::{Registrar, RegistrationConfig};
///
/// let a = image::open("a.png").unwrap().to_rgb8();
/// let b = image::open("b.png").unwrap().to_rgb8();
/// let registrar = Registrar::new(RegistrationConfig::default());
/// let reg = registrar.register_rgb(&a, &b).unwrap();
/// println!("H = {:?}", reg.homography_array());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registrar {
    config: RegistrationConfig,
}

impl Registrar {
    pub fn new(config: RegistrationConfig) -> Self {
        Self { config }
    }

    /// Registrar with the two per-call parameters set and defaults elsewhere.
    ///
    /// `precision_px == 0` lets ORSA choose the inlier threshold.
    pub fn with_call_params(precision_px: f64, significance_threshold: f32) -> Self {
        Self::new(RegistrationConfig::with_call_params(
            precision_px,
            significance_threshold,
        ))
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Register two caller rasters (0..255 samples, 1 or 3 channels).
    pub fn register(
        &self,
        image1: Raster<'_>,
        image2: Raster<'_>,
    ) -> Result<Registration, RegistrationError> {
        image1.validate(1)?;
        image2.validate(2)?;
        pipeline::register_rgb(&image1.to_rgb8(), &image2.to_rgb8(), &self.config)
    }

    /// Register two 8-bit RGB images.
    pub fn register_rgb(
        &self,
        image1: &RgbImage,
        image2: &RgbImage,
    ) -> Result<Registration, RegistrationError> {
        pipeline::register_rgb(image1, image2, &self.config)
    }
}

/// Caller-allocated outputs of [`estimate_homography`].
///
/// Raster buffers are planar `3 x H x W` and optional; `None` skips that
/// output. Present buffers must hold exactly [`CanvasLayout::match_len`]
/// (inliers, outliers) or [`CanvasLayout::warp_len`] (warped images, mosaic)
/// samples.
#[derive(Debug)]
pub struct OutputBuffers<'a> {
    pub homography: &'a mut [f64; 9],
    pub inliers: Option<&'a mut [f32]>,
    pub outliers: Option<&'a mut [f32]>,
    pub warped1: Option<&'a mut [f32]>,
    pub warped2: Option<&'a mut [f32]>,
    pub mosaic: Option<&'a mut [f32]>,
}

impl<'a> OutputBuffers<'a> {
    /// Only the homography is requested.
    pub fn homography_only(homography: &'a mut [f64; 9]) -> Self {
        Self {
            homography,
            inliers: None,
            outliers: None,
            warped1: None,
            warped2: None,
            mosaic: None,
        }
    }

    fn check_lengths(&self, layout: &CanvasLayout) -> Result<(), InputError> {
        let checks: [(&'static str, &Option<&'a mut [f32]>, usize); 5] = [
            ("inliers", &self.inliers, layout.match_len()),
            ("outliers", &self.outliers, layout.match_len()),
            ("warped1", &self.warped1, layout.warp_len()),
            ("warped2", &self.warped2, layout.warp_len()),
            ("mosaic", &self.mosaic, layout.warp_len()),
        ];
        for (name, buf, expected) in checks {
            if let Some(buf) = buf {
                if buf.len() != expected {
                    return Err(InputError::OutputLength {
                        name,
                        expected,
                        got: buf.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn copy_into(dst: Option<&mut [f32]>, src: &PlanarImage) {
    if let Some(dst) = dst {
        dst.copy_from_slice(&src.data);
    }
}

/// Register `image1` onto `image2` and write the results into `outputs`.
///
/// On success every requested buffer is overwritten and the statistics are
/// returned. On failure the homography buffer holds [`IDENTITY_SENTINEL`] and
/// the raster buffers are left untouched.
pub fn estimate_homography(
    image1: Raster<'_>,
    image2: Raster<'_>,
    config: &RegistrationConfig,
    mut outputs: OutputBuffers<'_>,
) -> Result<RegistrationStats, RegistrationError> {
    let result = image1
        .validate(1)
        .and_then(|_| image2.validate(2))
        .and_then(|_| {
            let layout =
                CanvasLayout::for_sizes(image1.width, image1.height, image2.width, image2.height);
            outputs.check_lengths(&layout)
        })
        .map_err(RegistrationError::from)
        .and_then(|_| Registrar::new(config.clone()).register(image1, image2));

    let reg = match result {
        Ok(reg) => reg,
        Err(err) => {
            *outputs.homography = IDENTITY_SENTINEL;
            tracing::warn!("registration failed: {err}");
            return Err(err);
        }
    };

    *outputs.homography = reg.homography_array();
    copy_into(outputs.inliers, &reg.inliers);
    copy_into(outputs.outliers, &reg.outliers);
    copy_into(outputs.warped1, &reg.warped1);
    copy_into(outputs.warped2, &reg.warped2);
    copy_into(outputs.mosaic, &reg.mosaic);
    Ok(reg.stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EstimationFailure;
    use crate::test_utils::{crop_samples, textured_scene};

    #[test]
    fn buffer_api_fills_every_requested_output() {
        let scene = textured_scene(256, 160, 42);
        let d1 = crop_samples(&scene, 0, 192);
        let d2 = crop_samples(&scene, 64, 192);
        let layout = CanvasLayout::for_sizes(192, 160, 192, 160);

        let mut h = [0.0f64; 9];
        let mut inliers = vec![-1.0f32; layout.match_len()];
        let mut mosaic = vec![-1.0f32; layout.warp_len()];
        let outputs = OutputBuffers {
            inliers: Some(inliers.as_mut_slice()),
            mosaic: Some(mosaic.as_mut_slice()),
            ..OutputBuffers::homography_only(&mut h)
        };
        let stats = estimate_homography(
            Raster::new(&d1, 192, 160, 1),
            Raster::new(&d2, 192, 160, 1),
            &RegistrationConfig::default(),
            outputs,
        )
        .unwrap();

        assert!((h[2] + 64.0).abs() < 0.5, "{h:?}");
        assert_eq!(h[8], 1.0);
        assert_eq!(stats.homography, h);
        assert!(inliers.iter().all(|v| (0.0..=255.0).contains(v)));
        assert!(mosaic.iter().all(|v| (0.0..=255.0).contains(v)));
    }

    #[test]
    fn wrong_buffer_size_is_rejected_before_any_work() {
        let data = vec![0.0f32; 32 * 32];
        let layout = CanvasLayout::for_sizes(32, 32, 32, 32);
        let mut h = [5.0f64; 9];
        let mut mosaic = vec![-1.0f32; layout.warp_len() - 3];
        let outputs = OutputBuffers {
            mosaic: Some(mosaic.as_mut_slice()),
            ..OutputBuffers::homography_only(&mut h)
        };
        let err = estimate_homography(
            Raster::new(&data, 32, 32, 1),
            Raster::new(&data, 32, 32, 1),
            &RegistrationConfig::default(),
            outputs,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::Input(InputError::OutputLength { name: "mosaic", .. })
        ));
        assert_eq!(h, IDENTITY_SENTINEL);
        assert!(mosaic.iter().all(|&v| v == -1.0));
    }

    #[test]
    fn failure_writes_sentinel_and_leaves_rasters_untouched() {
        let data = vec![100.0f32; 48 * 48 * 3];
        let layout = CanvasLayout::for_sizes(48, 48, 48, 48);
        let mut h = [0.0f64; 9];
        let mut warped1 = vec![7.0f32; layout.warp_len()];
        let outputs = OutputBuffers {
            warped1: Some(warped1.as_mut_slice()),
            ..OutputBuffers::homography_only(&mut h)
        };
        let err = estimate_homography(
            Raster::new(&data, 48, 48, 3),
            Raster::new(&data, 48, 48, 3),
            &RegistrationConfig::default(),
            outputs,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::Estimation(EstimationFailure::TooFewMatches { .. })
        ));
        assert_eq!(h, IDENTITY_SENTINEL);
        assert!(warped1.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let scene = textured_scene(224, 128, 5);
        let d1 = crop_samples(&scene, 0, 176);
        let d2 = crop_samples(&scene, 48, 176);
        let registrar = Registrar::default();
        let run = || {
            registrar
                .register(Raster::new(&d1, 176, 128, 1), Raster::new(&d2, 176, 128, 1))
                .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.homography_array(), b.homography_array());
        assert_eq!(a.inlier_indices, b.inlier_indices);
        assert_eq!(a.mosaic, b.mosaic);
        assert_eq!(a.stats, b.stats);
    }
}
