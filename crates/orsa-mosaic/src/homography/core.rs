//! Homography projection and DLT estimation with Hartley normalization.

use nalgebra::{DMatrix, Matrix3, Vector3};

use crate::error::NumericFailure;

/// Project a point through a homography: `H * [x, y, 1]^T -> [u, v]`.
///
/// Returns NaNs when the point maps to the line at infinity.
pub fn homography_project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Third homogeneous coordinate of `H * [x, y, 1]^T`.
#[inline]
pub(crate) fn homogeneous_w(h: &Matrix3<f64>, x: f64, y: f64) -> f64 {
    h[(2, 0)] * x + h[(2, 1)] * y + h[(2, 2)]
}

/// Squared transfer error `||project(H, src) - dst||^2` (infinite when the
/// projection is undefined).
pub(crate) fn transfer_error_sq(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = homography_project(h, src[0], src[1]);
    let dx = p[0] - dst[0];
    let dy = p[1] - dst[1];
    let e = dx * dx + dy * dy;
    if e.is_finite() {
        e
    } else {
        f64::INFINITY
    }
}

/// Reprojection error `||project(H, src) - dst||`.
pub fn homography_reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    transfer_error_sq(h, src, dst).sqrt()
}

/// Isotropic conditioning of a point set: centroid at the origin, mean
/// distance `sqrt(2)`.
#[derive(Debug, Clone, Copy)]
struct Conditioning {
    centre: [f64; 2],
    scale: f64,
}

impl Conditioning {
    fn of(pts: &[[f64; 2]]) -> Result<Self, NumericFailure> {
        let n = pts.len() as f64;
        let (sx, sy) = pts
            .iter()
            .fold((0.0, 0.0), |(ax, ay), p| (ax + p[0], ay + p[1]));
        let centre = [sx / n, sy / n];
        let spread = pts
            .iter()
            .map(|p| (p[0] - centre[0]).hypot(p[1] - centre[1]))
            .sum::<f64>()
            / n;
        if !spread.is_finite() || spread <= 1e-15 {
            return Err(NumericFailure::Singular("coincident points"));
        }
        Ok(Self {
            centre,
            scale: std::f64::consts::SQRT_2 / spread,
        })
    }

    fn apply(&self, p: &[f64; 2]) -> [f64; 2] {
        [
            self.scale * (p[0] - self.centre[0]),
            self.scale * (p[1] - self.centre[1]),
        ]
    }

    fn matrix(&self) -> Matrix3<f64> {
        let s = self.scale;
        Matrix3::new(
            s, 0.0, -s * self.centre[0], //
            0.0, s, -s * self.centre[1], //
            0.0, 0.0, 1.0,
        )
    }

    fn inverse_matrix(&self) -> Matrix3<f64> {
        let r = 1.0 / self.scale;
        Matrix3::new(
            r, 0.0, self.centre[0], //
            0.0, r, self.centre[1], //
            0.0, 0.0, 1.0,
        )
    }
}

/// The two linear constraints one correspondence puts on the row-major
/// coefficients of `H`.
fn dlt_rows(s: [f64; 2], d: [f64; 2]) -> [[f64; 9]; 2] {
    let [x, y] = s;
    let [u, v] = d;
    [
        [0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v],
        [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
    ]
}

/// Estimate the homography `dst ~ H * src` from at least 4 correspondences.
///
/// Least-squares over all points when more than 4 are given. The result is
/// scaled so that `H[2][2] == 1` whenever that entry is not ~0.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, NumericFailure> {
    if src.len() != dst.len() {
        return Err(NumericFailure::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < 4 {
        return Err(NumericFailure::TooFewPoints { needed: 4, got: n });
    }

    let cond_src = Conditioning::of(src)?;
    let cond_dst = Conditioning::of(dst)?;

    let mut coeffs = Vec::with_capacity(18 * n);
    for (s, d) in src.iter().zip(dst) {
        for row in dlt_rows(cond_src.apply(s), cond_dst.apply(d)) {
            coeffs.extend_from_slice(&row);
        }
    }
    let a = DMatrix::from_row_slice(2 * n, 9, &coeffs);

    // h spans the (least-squares) null space of A.
    let eig = nalgebra::SymmetricEigen::new(a.transpose() * &a);
    let smallest = eig.eigenvalues.iamin();
    let h_cond = Matrix3::from_row_iterator(eig.eigenvectors.column(smallest).iter().copied());

    let h = cond_dst.inverse_matrix() * h_cond * cond_src.matrix();
    if h.iter().any(|v| !v.is_finite()) {
        return Err(NumericFailure::NonFinite);
    }
    Ok(normalize_h22(&h).unwrap_or(h))
}

/// Scale `h` so that `H[2][2] == 1`.
pub(crate) fn normalize_h22(h: &Matrix3<f64>) -> Result<Matrix3<f64>, NumericFailure> {
    let s = h[(2, 2)];
    if !s.is_finite() || s.abs() < 1e-12 {
        return Err(NumericFailure::Singular("H[2][2] is zero"));
    }
    let out = h / s;
    if out.iter().any(|v| !v.is_finite()) {
        return Err(NumericFailure::NonFinite);
    }
    Ok(out)
}

/// Row-major coefficients.
pub fn homography_to_array(h: &Matrix3<f64>) -> [f64; 9] {
    [
        h[(0, 0)],
        h[(0, 1)],
        h[(0, 2)],
        h[(1, 0)],
        h[(1, 1)],
        h[(1, 2)],
        h[(2, 0)],
        h[(2, 1)],
        h[(2, 2)],
    ]
}

/// Inverse of [`homography_to_array`].
pub fn homography_from_array(c: &[f64; 9]) -> Matrix3<f64> {
    Matrix3::new(c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7], c[8])
}

/// Pure translation by `(dx, dy)`.
pub(crate) fn translation(dx: f64, dy: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0)
}
