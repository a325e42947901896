//! 4x4x8 gradient-orientation descriptor.

use std::f32::consts::PI;

use super::keypoints::ScaleSpacePoint;
use super::scale_space::ScaleSpace;

/// Spatial cells per side.
const GRID: usize = 4;
/// Orientation bins per cell.
const ORI_BINS: usize = 8;
/// Descriptor length.
pub const DESCRIPTOR_LEN: usize = GRID * GRID * ORI_BINS;
/// Cell side in units of the keypoint scale.
const CELL_SCALE: f32 = 3.0;
const CLAMP: f32 = 0.2;

/// Accumulate `v` into the histogram with trilinear weights.
fn add_trilinear(hist: &mut [f32; DESCRIPTOR_LEN], rbin: f32, cbin: f32, obin: f32, v: f32) {
    let r0 = rbin.floor();
    let c0 = cbin.floor();
    let o0 = obin.floor();
    let (dr, dc, dobin) = (rbin - r0, cbin - c0, obin - o0);
    let (r0, c0, o0) = (r0 as i32, c0 as i32, o0 as i32);

    for (ri, wr) in [(r0, 1.0 - dr), (r0 + 1, dr)] {
        if ri < 0 || ri >= GRID as i32 {
            continue;
        }
        for (ci, wc) in [(c0, 1.0 - dc), (c0 + 1, dc)] {
            if ci < 0 || ci >= GRID as i32 {
                continue;
            }
            for (oi, wo) in [(o0, 1.0 - dobin), (o0 + 1, dobin)] {
                let oi = oi.rem_euclid(ORI_BINS as i32) as usize;
                let idx = (ri as usize * GRID + ci as usize) * ORI_BINS + oi;
                hist[idx] += v * wr * wc * wo;
            }
        }
    }
}

fn normalize(hist: &mut [f32; DESCRIPTOR_LEN]) {
    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        hist.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Descriptor of `p` relative to orientation `angle` (radians).
pub(crate) fn compute_descriptor(
    space: &ScaleSpace,
    p: &ScaleSpacePoint,
    angle: f32,
) -> [f32; DESCRIPTOR_LEN] {
    let octave = &space.octaves[p.octave];
    let layer = (p.layer.round() as usize).min(octave.gaussians.len() - 1);
    let img = &octave.gaussians[layer];
    let (w, h) = img.dimensions();
    let (w, h) = (w as i32, h as i32);
    let raw = img.as_raw();
    let at = |x: i32, y: i32| raw[(y * w + x) as usize];

    let hist_width = CELL_SCALE * space.layer_sigma(p.layer);
    let radius = (hist_width * std::f32::consts::SQRT_2 * (GRID as f32 + 1.0) * 0.5).round() as i32;
    let radius = radius.min(((w * w + h * h) as f32).sqrt() as i32);
    let (cos_t, sin_t) = (angle.cos() / hist_width, angle.sin() / hist_width);
    let exp_scale = -1.0 / (0.5 * (GRID * GRID) as f32);
    let bins_per_rad = ORI_BINS as f32 / (2.0 * PI);
    let (px, py) = (p.x.round() as i32, p.y.round() as i32);
    let half = GRID as f32 / 2.0 - 0.5;

    let mut hist = [0.0f32; DESCRIPTOR_LEN];
    for i in -radius..=radius {
        let y = py + i;
        if y <= 0 || y >= h - 1 {
            continue;
        }
        for j in -radius..=radius {
            let x = px + j;
            if x <= 0 || x >= w - 1 {
                continue;
            }
            let c_rot = j as f32 * cos_t + i as f32 * sin_t;
            let r_rot = -(j as f32) * sin_t + i as f32 * cos_t;
            let rbin = r_rot + half;
            let cbin = c_rot + half;
            if rbin <= -1.0 || rbin >= GRID as f32 || cbin <= -1.0 || cbin >= GRID as f32 {
                continue;
            }

            let gx = at(x + 1, y) - at(x - 1, y);
            let gy = at(x, y + 1) - at(x, y - 1);
            let mag = (gx * gx + gy * gy).sqrt();
            let theta = (gy.atan2(gx) - angle).rem_euclid(2.0 * PI);
            let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            add_trilinear(&mut hist, rbin, cbin, theta * bins_per_rad, mag * weight);
        }
    }

    normalize(&mut hist);
    hist.iter_mut().for_each(|v| *v = v.min(CLAMP));
    normalize(&mut hist);
    hist
}
