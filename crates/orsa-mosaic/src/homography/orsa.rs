//! ORSA: a-contrario RANSAC for homographies.
//!
//! Each minimal sample yields a candidate model. Residuals are sorted and
//! every prefix of size `k` is scored by its number of false alarms (NFA):
//! the expected number of models at least as good under a background model
//! of uniformly distributed correspondences. The model with the lowest NFA
//! wins and is meaningful when `log10 NFA < 0`. No inlier threshold is
//! needed; the optional `precision_px` only caps the admissible residual.

use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::OrsaConfig;
use crate::error::{EstimationFailure, NumericFailure};

use super::core::{estimate_homography_dlt, homogeneous_w, transfer_error_sq};

/// Correspondences in a minimal sample.
pub const SAMPLE_SIZE: usize = 4;
/// ORSA needs at least one correspondence beyond the minimal sample.
pub const MIN_MATCHES: usize = SAMPLE_SIZE + 1;

/// Outcome of a meaningful ORSA run.
#[derive(Debug, Clone)]
pub struct OrsaResult {
    /// Best minimal-sample model, `dst ~ H * src`.
    pub h: Matrix3<f64>,
    /// Sorted indices of the correspondences supporting `h`.
    pub inliers: Vec<usize>,
    /// log10 of the NFA of `h`.
    pub log_nfa: f64,
    /// Inlier threshold selected by ORSA (pixels).
    pub precision_px: f64,
    /// Number of samples drawn.
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy)]
struct Residual {
    err_sq: f64,
    /// Image (0 or 1) in which `err_sq` was measured.
    side: usize,
    index: usize,
}

/// Log-probability tables for a fixed number of correspondences.
struct NfaTables {
    loge0: f64,
    /// `log10(pi / area)` for image 1 and image 2.
    logalpha0: [f64; 2],
    /// `log10 C(n, k)` for `k = 0..=n`.
    logc_n: Vec<f64>,
    /// `log10 C(k, SAMPLE_SIZE)` for `k = 0..=n`.
    logc_k: Vec<f64>,
}

impl NfaTables {
    fn new(n: usize, size1: [usize; 2], size2: [usize; 2]) -> Self {
        let area = |s: [usize; 2]| (s[0].max(1) * s[1].max(1)) as f64;
        let mut logc_n = vec![0.0; n + 1];
        for k in 1..=n {
            logc_n[k] = logc_n[k - 1] + (((n - k + 1) as f64) / k as f64).log10();
        }
        let mut logc_k = vec![0.0; n + 1];
        for (k, v) in logc_k.iter_mut().enumerate().skip(SAMPLE_SIZE) {
            *v = (1..=SAMPLE_SIZE)
                .map(|i| ((k - SAMPLE_SIZE + i) as f64 / i as f64).log10())
                .sum();
        }
        Self {
            loge0: ((n - SAMPLE_SIZE) as f64).log10(),
            logalpha0: [
                (std::f64::consts::PI / area(size1)).log10(),
                (std::f64::consts::PI / area(size2)).log10(),
            ],
            logc_n,
            logc_k,
        }
    }

    /// Sort `residuals` and return `(log_nfa, k, err_sq)` of the best prefix.
    fn best_nfa(&self, residuals: &mut [Residual], max_err_sq: f64) -> (f64, usize, f64) {
        residuals.sort_by(|a, b| a.err_sq.total_cmp(&b.err_sq));
        let mut best = (f64::INFINITY, 0usize, 0.0f64);
        for (i, r) in residuals.iter().enumerate().skip(SAMPLE_SIZE) {
            if r.err_sq > max_err_sq {
                break;
            }
            let k = i + 1;
            // A point lands within distance e of its prediction with
            // probability pi * e^2 / area.
            let logalpha = self.logalpha0[r.side] + (r.err_sq + f64::EPSILON).log10();
            let log_nfa = self.loge0
                + logalpha * (k - SAMPLE_SIZE) as f64
                + self.logc_n[k]
                + self.logc_k[k];
            if log_nfa < best.0 {
                best = (log_nfa, k, r.err_sq);
            }
        }
        best
    }
}

/// Symmetric transfer residual: the larger of the forward error (measured
/// in image 2) and the backward error (measured in image 1).
fn residual(
    h: &Matrix3<f64>,
    h_inv: &Matrix3<f64>,
    src: &[f64; 2],
    dst: &[f64; 2],
    index: usize,
) -> Residual {
    let fwd = transfer_error_sq(h, src, dst);
    let bwd = transfer_error_sq(h_inv, dst, src);
    if fwd >= bwd {
        Residual {
            err_sq: fwd,
            side: 1,
            index,
        }
    } else {
        Residual {
            err_sq: bwd,
            side: 0,
            index,
        }
    }
}

fn collinear(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> bool {
    let u = [b[0] - a[0], b[1] - a[1]];
    let v = [c[0] - a[0], c[1] - a[1]];
    let cross = u[0] * v[1] - u[1] * v[0];
    let scale = (u[0] * u[0] + u[1] * u[1]).sqrt() * (v[0] * v[0] + v[1] * v[1]).sqrt();
    scale < 1e-12 || cross.abs() <= 1e-3 * scale
}

fn has_collinear_triple(p: &[[f64; 2]; SAMPLE_SIZE]) -> bool {
    collinear(&p[0], &p[1], &p[2])
        || collinear(&p[0], &p[1], &p[3])
        || collinear(&p[0], &p[2], &p[3])
        || collinear(&p[1], &p[2], &p[3])
}

/// Fit a candidate to a minimal sample, rejecting degenerate configurations.
///
/// Returns the model and its inverse.
fn fit_minimal(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    sample: &[usize],
) -> Option<(Matrix3<f64>, Matrix3<f64>)> {
    let mut s = [[0.0; 2]; SAMPLE_SIZE];
    let mut d = [[0.0; 2]; SAMPLE_SIZE];
    for (j, &i) in sample.iter().enumerate() {
        s[j] = src[i];
        d[j] = dst[i];
    }
    if has_collinear_triple(&s) || has_collinear_triple(&d) {
        return None;
    }

    let h = estimate_homography_dlt(&s, &d).ok()?;

    // A sample straddling the line at infinity cannot come from a real view.
    let w = s.map(|p| homogeneous_w(&h, p[0], p[1]));
    if !(w.iter().all(|&v| v > 0.0) || w.iter().all(|&v| v < 0.0)) {
        return None;
    }

    let h_inv = h.try_inverse()?;
    Some((h, h_inv))
}

/// Samples needed to draw one all-inlier minimal sample with `confidence`.
fn iterations_needed(n_inliers: usize, n: usize, confidence: f64) -> usize {
    let p = (n_inliers as f64 / n as f64).powi(SAMPLE_SIZE as i32);
    if p >= 1.0 {
        return 1;
    }
    if p <= 0.0 {
        return usize::MAX;
    }
    let needed = ((1.0 - confidence).ln() / (1.0 - p).ln()).ceil();
    if !needed.is_finite() {
        return usize::MAX;
    }
    (needed as usize).max(1)
}

/// Run ORSA on correspondences `src[i] <-> dst[i]`.
///
/// `size1` and `size2` are `[width, height]` of the images holding `src` and
/// `dst`; they define the background probability of a correspondence.
pub fn orsa_homography(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    size1: [usize; 2],
    size2: [usize; 2],
    config: &OrsaConfig,
) -> Result<OrsaResult, EstimationFailure> {
    debug_assert_eq!(src.len(), dst.len());
    let n = src.len().min(dst.len());
    if n < MIN_MATCHES {
        return Err(EstimationFailure::TooFewMatches {
            needed: MIN_MATCHES,
            got: n,
        });
    }

    let tables = NfaTables::new(n, size1, size2);
    let max_err_sq = if config.precision_px > 0.0 {
        config.precision_px * config.precision_px
    } else {
        f64::INFINITY
    };

    let reserve = ((config.max_iters as f64 * config.reserve_fraction.clamp(0.0, 1.0)).round()
        as usize)
        .min(config.max_iters);
    let mut n_iter = config.max_iters - reserve;
    let mut reserve_left = reserve;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut pool: Vec<usize> = (0..n).collect();
    let mut residuals: Vec<Residual> = Vec::with_capacity(n);
    let mut sample = [0usize; SAMPLE_SIZE];

    let mut best_log_nfa = f64::INFINITY;
    let mut best_h = Matrix3::identity();
    let mut best_inliers: Vec<usize> = Vec::new();
    let mut best_err_sq = 0.0;

    let mut iter = 0usize;
    while iter < n_iter {
        iter += 1;

        let picked = rand::seq::index::sample(&mut rng, pool.len(), SAMPLE_SIZE);
        for (slot, i) in sample.iter_mut().zip(picked.iter()) {
            *slot = pool[i];
        }

        if let Some((h, h_inv)) = fit_minimal(src, dst, &sample) {
            residuals.clear();
            residuals.extend((0..n).map(|i| residual(&h, &h_inv, &src[i], &dst[i], i)));
            let (log_nfa, k, err_sq) = tables.best_nfa(&mut residuals, max_err_sq);
            if log_nfa < best_log_nfa {
                best_log_nfa = log_nfa;
                best_h = h;
                best_err_sq = err_sq;
                best_inliers = residuals[..k].iter().map(|r| r.index).collect();
                tracing::trace!(iter, log_nfa, k, "ORSA improved model");

                if log_nfa < 0.0 && config.convergence_check {
                    let needed = iterations_needed(k, n, config.confidence);
                    n_iter = n_iter.min(iter.saturating_add(needed));
                }
            }
        }

        // Spend the reserve refining inside the current best support.
        if iter == n_iter && reserve_left > 0 && best_log_nfa < 0.0 {
            pool = best_inliers.clone();
            n_iter += reserve_left;
            reserve_left = 0;
        }
    }

    if best_log_nfa >= 0.0 {
        return Err(EstimationFailure::NotMeaningful {
            log_nfa: best_log_nfa,
        });
    }

    best_inliers.sort_unstable();
    tracing::debug!(
        "ORSA: {}/{} inliers, log10 NFA {:.2}, precision {:.3}px after {} samples",
        best_inliers.len(),
        n,
        best_log_nfa,
        best_err_sq.sqrt(),
        iter
    );

    Ok(OrsaResult {
        h: best_h,
        inliers: best_inliers,
        log_nfa: best_log_nfa,
        precision_px: best_err_sq.sqrt(),
        iterations: iter,
    })
}

/// Least-squares re-estimation of the ORSA model on all its inliers.
pub fn refine_on_inliers(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    inliers: &[usize],
) -> Result<Matrix3<f64>, NumericFailure> {
    let s: Vec<[f64; 2]> = inliers.iter().map(|&i| src[i]).collect();
    let d: Vec<[f64; 2]> = inliers.iter().map(|&i| dst[i]).collect();
    estimate_homography_dlt(&s, &d)
}
