//! DoG extrema, sub-pixel refinement and orientation assignment.

use std::f32::consts::PI;

use nalgebra::{Matrix3, Vector3};

use super::scale_space::{FloatImage, ScaleSpace};
use crate::config::SiftConfig;

/// Pixels ignored along each octave border.
const BORDER: i32 = 5;
const MAX_REFINE_STEPS: usize = 5;
const ORIENTATION_BINS: usize = 36;
/// Orientation window sigma relative to the keypoint scale.
const ORIENTATION_SIGMA_FACTOR: f32 = 1.5;
const ORIENTATION_SMOOTHING_PASSES: usize = 6;

/// Refined extremum in octave coordinates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScaleSpacePoint {
    pub octave: usize,
    /// Fractional DoG layer.
    pub layer: f32,
    pub x: f32,
    pub y: f32,
    /// Interpolated DoG value.
    pub response: f32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    octave: usize,
    layer: usize,
    x: i32,
    y: i32,
}

#[inline]
fn at(img: &FloatImage, x: i32, y: i32) -> f32 {
    img.as_raw()[y as usize * img.width() as usize + x as usize]
}

fn is_extremum(dogs: &[FloatImage], layer: usize, x: i32, y: i32) -> bool {
    let v = at(&dogs[layer], x, y);
    let is_max = v > 0.0;
    for (k, dog) in dogs[layer - 1..=layer + 1].iter().enumerate() {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if k == 1 && dx == 0 && dy == 0 {
                    continue;
                }
                let n = at(dog, x + dx, y + dy);
                if (is_max && n >= v) || (!is_max && n <= v) {
                    return false;
                }
            }
        }
    }
    true
}

fn find_candidates(space: &ScaleSpace, threshold: f32) -> Vec<Candidate> {
    let s = space.scales_per_octave;
    let mut out = Vec::new();
    for (octave_idx, octave) in space.octaves.iter().enumerate() {
        let (w, h) = octave.dogs[0].dimensions();
        let (w, h) = (w as i32, h as i32);
        if w <= 2 * BORDER || h <= 2 * BORDER {
            continue;
        }
        for layer in 1..=s {
            for y in BORDER..h - BORDER {
                for x in BORDER..w - BORDER {
                    if at(&octave.dogs[layer], x, y).abs() > threshold
                        && is_extremum(&octave.dogs, layer, x, y)
                    {
                        out.push(Candidate {
                            octave: octave_idx,
                            layer,
                            x,
                            y,
                        });
                    }
                }
            }
        }
    }
    out
}

/// Hessian, gradient and value of the DoG at a discrete point.
fn derivatives(dogs: &[FloatImage], c: &Candidate) -> (Matrix3<f32>, Vector3<f32>, f32) {
    let (x, y) = (c.x, c.y);
    let cur = &dogs[c.layer];
    let prev = &dogs[c.layer - 1];
    let next = &dogs[c.layer + 1];

    let v = at(cur, x, y);
    let dxx = at(cur, x + 1, y) + at(cur, x - 1, y) - 2.0 * v;
    let dyy = at(cur, x, y + 1) + at(cur, x, y - 1) - 2.0 * v;
    let dss = at(next, x, y) + at(prev, x, y) - 2.0 * v;
    let dxy = (at(cur, x + 1, y + 1) - at(cur, x - 1, y + 1) - at(cur, x + 1, y - 1)
        + at(cur, x - 1, y - 1))
        * 0.25;
    let dxs = (at(next, x + 1, y) - at(next, x - 1, y) - at(prev, x + 1, y) + at(prev, x - 1, y))
        * 0.25;
    let dys = (at(next, x, y + 1) - at(next, x, y - 1) - at(prev, x, y + 1) + at(prev, x, y - 1))
        * 0.25;

    let hessian = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
    let gradient = Vector3::new(
        (at(cur, x + 1, y) - at(cur, x - 1, y)) * 0.5,
        (at(cur, x, y + 1) - at(cur, x, y - 1)) * 0.5,
        (at(next, x, y) - at(prev, x, y)) * 0.5,
    );
    (hessian, gradient, v)
}

/// Quadratic fit around a candidate, moving to a neighbour while the offset
/// exceeds half a sample. Applies the contrast and edge tests.
fn refine(space: &ScaleSpace, mut c: Candidate, config: &SiftConfig) -> Option<ScaleSpacePoint> {
    let s = space.scales_per_octave;
    let octave = &space.octaves[c.octave];
    let (w, h) = octave.dogs[0].dimensions();
    let (w, h) = (w as i32, h as i32);

    let mut steps = 0;
    let (hessian, gradient, value, offset) = loop {
        let (hessian, gradient, value) = derivatives(&octave.dogs, &c);
        let offset = -hessian.try_inverse()? * gradient;
        if offset.iter().all(|o| o.abs() <= 0.5) {
            break (hessian, gradient, value, offset);
        }

        steps += 1;
        if steps >= MAX_REFINE_STEPS {
            return None;
        }
        let shift = |o: f32| (o > 0.5) as i32 - (o < -0.5) as i32;
        c.x += shift(offset.x);
        c.y += shift(offset.y);
        let layer = c.layer as i32 + shift(offset.z);
        if layer < 1
            || layer > s as i32
            || c.x < BORDER
            || c.x >= w - BORDER
            || c.y < BORDER
            || c.y >= h - BORDER
        {
            return None;
        }
        c.layer = layer as usize;
    };

    let response = value + 0.5 * gradient.dot(&offset);
    if response.abs() * (s as f32) < config.contrast_threshold {
        return None;
    }

    let (dxx, dyy, dxy) = (hessian[(0, 0)], hessian[(1, 1)], hessian[(0, 1)]);
    let tr = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    let r = config.edge_threshold;
    if det <= 0.0 || tr * tr * r >= (r + 1.0) * (r + 1.0) * det {
        return None;
    }

    Some(ScaleSpacePoint {
        octave: c.octave,
        layer: c.layer as f32 + offset.z,
        x: c.x as f32 + offset.x,
        y: c.y as f32 + offset.y,
        response,
    })
}

/// Refined, contrast- and edge-filtered DoG extrema.
pub(crate) fn find_keypoints(space: &ScaleSpace, config: &SiftConfig) -> Vec<ScaleSpacePoint> {
    let s = space.scales_per_octave as f32;
    let candidates = find_candidates(space, 0.5 * config.contrast_threshold / s);
    let n_candidates = candidates.len();
    let points: Vec<ScaleSpacePoint> = candidates
        .into_iter()
        .filter_map(|c| refine(space, c, config))
        .collect();
    tracing::trace!(
        candidates = n_candidates,
        kept = points.len(),
        "refined DoG extrema"
    );
    points
}

fn wrap_angle(a: f32) -> f32 {
    a.rem_euclid(2.0 * PI)
}

/// Dominant gradient orientations (radians in `[0, 2pi)`) around a point.
///
/// One angle per histogram peak reaching `peak_ratio` of the maximum.
pub(crate) fn orientations(space: &ScaleSpace, p: &ScaleSpacePoint, peak_ratio: f32) -> Vec<f32> {
    let octave = &space.octaves[p.octave];
    let layer = (p.layer.round() as usize).min(octave.gaussians.len() - 1);
    let img = &octave.gaussians[layer];
    let (w, h) = img.dimensions();
    let (w, h) = (w as i32, h as i32);

    let sigma = ORIENTATION_SIGMA_FACTOR * space.layer_sigma(p.layer);
    let radius = (3.0 * sigma).round() as i32;
    let exp_scale = -1.0 / (2.0 * sigma * sigma);
    let (px, py) = (p.x.round() as i32, p.y.round() as i32);

    let mut hist = [0.0f32; ORIENTATION_BINS];
    for dy in -radius..=radius {
        let y = py + dy;
        if y <= 0 || y >= h - 1 {
            continue;
        }
        for dx in -radius..=radius {
            let x = px + dx;
            if x <= 0 || x >= w - 1 {
                continue;
            }
            let gx = at(img, x + 1, y) - at(img, x - 1, y);
            let gy = at(img, x, y + 1) - at(img, x, y - 1);
            let weight = (((dx * dx + dy * dy) as f32) * exp_scale).exp();
            let angle = wrap_angle(gy.atan2(gx));
            let bin = ((angle * ORIENTATION_BINS as f32 / (2.0 * PI)) as usize) % ORIENTATION_BINS;
            hist[bin] += weight * (gx * gx + gy * gy).sqrt();
        }
    }

    for _ in 0..ORIENTATION_SMOOTHING_PASSES {
        let prev = hist;
        for i in 0..ORIENTATION_BINS {
            let l = prev[(i + ORIENTATION_BINS - 1) % ORIENTATION_BINS];
            let r = prev[(i + 1) % ORIENTATION_BINS];
            hist[i] = (l + prev[i] + r) / 3.0;
        }
    }

    let max = hist.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let mut angles = Vec::new();
    for i in 0..ORIENTATION_BINS {
        let c = hist[i];
        let l = hist[(i + ORIENTATION_BINS - 1) % ORIENTATION_BINS];
        let r = hist[(i + 1) % ORIENTATION_BINS];
        if c > l && c > r && c >= peak_ratio * max {
            let denom = l - 2.0 * c + r;
            let offset = if denom.abs() > f32::EPSILON {
                0.5 * (l - r) / denom
            } else {
                0.0
            };
            let bin = i as f32 + 0.5 + offset;
            angles.push(wrap_angle(bin * 2.0 * PI / ORIENTATION_BINS as f32));
        }
    }
    angles
}
