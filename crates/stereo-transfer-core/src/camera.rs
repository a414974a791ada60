//! Pinhole camera with OpenCV-compatible lens distortion.
//!
//! Distortion coefficients use the OpenCV layout
//! `(k1, k2, p1, p2[, k3[, k4, k5, k6[, s1, s2, s3, s4]]])`. Normalized
//! image coordinates `(x, y)` are distorted as
//!
//! ```text
//! r2 = x^2 + y^2
//! radial = (1 + k1 r2 + k2 r2^2 + k3 r2^3) / (1 + k4 r2 + k5 r2^2 + k6 r2^3)
//! xd = x radial + 2 p1 x y + p2 (r2 + 2 x^2) + s1 r2 + s2 r2^2
//! yd = y radial + p1 (r2 + 2 y^2) + 2 p2 x y + s3 r2 + s4 r2^2
//! ```

use nalgebra::{Matrix3, Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};

/// Camera model validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraModelError {
    #[error("unsupported distortion coefficient count {0} (expected 0, 4, 5, 8 or 12)")]
    UnsupportedDistortion(usize),
    #[error("distortion coefficients must be finite")]
    NonFiniteDistortion,
    #[error("camera matrix must have positive finite focal lengths")]
    InvalidFocalLength,
    #[error("camera matrix must have a finite principal point and bottom row [0, 0, 1]")]
    InvalidCameraMatrix,
}

/// Focal lengths, principal point and skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub skew: f64,
}

impl Intrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        Self::from_parts(fx, fy, cx, cy, 0.0)
    }

    fn from_parts(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        skew: f64,
    ) -> Result<Self, CameraModelError> {
        if !(fx.is_finite() && fy.is_finite()) || fx <= 0.0 || fy <= 0.0 {
            return Err(CameraModelError::InvalidFocalLength);
        }
        if !(cx.is_finite() && cy.is_finite() && skew.is_finite()) {
            return Err(CameraModelError::InvalidCameraMatrix);
        }
        Ok(Self {
            fx,
            fy,
            cx,
            cy,
            skew,
        })
    }

    /// Parse a 3x3 camera matrix `[[fx, s, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn from_matrix(k: &Matrix3<f64>) -> Result<Self, CameraModelError> {
        let bottom_ok = k[(1, 0)] == 0.0
            && k[(2, 0)] == 0.0
            && k[(2, 1)] == 0.0
            && (k[(2, 2)] - 1.0).abs() < 1e-12;
        if !bottom_ok {
            return Err(CameraModelError::InvalidCameraMatrix);
        }
        Self::from_parts(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)], k[(0, 1)])
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Pixel -> normalized image coordinates (no distortion handling).
    #[inline]
    pub fn normalize(&self, pixel: Point2<f64>) -> Vector2<f64> {
        let y = (pixel.y - self.cy) / self.fy;
        let x = (pixel.x - self.cx - self.skew * y) / self.fx;
        Vector2::new(x, y)
    }

    /// Normalized image coordinates -> pixel (no distortion handling).
    #[inline]
    pub fn denormalize(&self, n: Vector2<f64>) -> Point2<f64> {
        Point2::new(
            self.fx * n.x + self.skew * n.y + self.cx,
            self.fy * n.y + self.cy,
        )
    }
}

/// Termination criteria for iterative undistortion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UndistortCriteria {
    /// Upper bound on fixed-point iterations.
    pub max_iters: u32,
    /// Stop once the residual of the re-distorted estimate drops below this
    /// value (normalized units).
    pub eps: f64,
}

impl Default for UndistortCriteria {
    fn default() -> Self {
        Self {
            max_iters: 20,
            eps: 1e-12,
        }
    }
}

/// OpenCV lens distortion coefficients.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Distortion {
    k: [f64; 6],
    p: [f64; 2],
    s: [f64; 4],
    count: usize,
}

impl Distortion {
    /// No distortion (empty coefficient vector).
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from an OpenCV coefficient vector of length 0, 4, 5, 8 or 12.
    pub fn from_opencv(coeffs: &[f64]) -> Result<Self, CameraModelError> {
        if !matches!(coeffs.len(), 0 | 4 | 5 | 8 | 12) {
            return Err(CameraModelError::UnsupportedDistortion(coeffs.len()));
        }
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(CameraModelError::NonFiniteDistortion);
        }
        let at = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Ok(Self {
            k: [at(0), at(1), at(4), at(5), at(6), at(7)],
            p: [at(2), at(3)],
            s: [at(8), at(9), at(10), at(11)],
            count: coeffs.len(),
        })
    }

    /// Coefficients in OpenCV order, with the length they were created with.
    pub fn to_opencv(&self) -> Vec<f64> {
        let [k1, k2, k3, k4, k5, k6] = self.k;
        let [p1, p2] = self.p;
        let [s1, s2, s3, s4] = self.s;
        let all = [k1, k2, p1, p2, k3, k4, k5, k6, s1, s2, s3, s4];
        all[..self.count].to_vec()
    }

    pub fn is_identity(&self) -> bool {
        self.k.iter().chain(&self.p).chain(&self.s).all(|c| *c == 0.0)
    }

    #[inline]
    fn radial_and_delta(&self, x: f64, y: f64) -> (f64, f64, f64, f64) {
        let [k1, k2, k3, k4, k5, k6] = self.k;
        let [p1, p2] = self.p;
        let [s1, s2, s3, s4] = self.s;
        let r2 = x * x + y * y;
        let num = 1.0 + ((k3 * r2 + k2) * r2 + k1) * r2;
        let den = 1.0 + ((k6 * r2 + k5) * r2 + k4) * r2;
        let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x) + (s2 * r2 + s1) * r2;
        let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y + (s4 * r2 + s3) * r2;
        (num, den, dx, dy)
    }

    /// Apply the distortion to normalized, undistorted coordinates.
    pub fn distort(&self, n: Vector2<f64>) -> Vector2<f64> {
        let (num, den, dx, dy) = self.radial_and_delta(n.x, n.y);
        let radial = num / den;
        Vector2::new(n.x * radial + dx, n.y * radial + dy)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    ///
    /// Returns the input unchanged when the iteration would flip the sign of
    /// the radial factor (points far outside the calibrated field of view).
    pub fn undistort(&self, distorted: Vector2<f64>, criteria: &UndistortCriteria) -> Vector2<f64> {
        if self.is_identity() {
            return distorted;
        }
        let (x0, y0) = (distorted.x, distorted.y);
        let (mut x, mut y) = (x0, y0);
        for _ in 0..criteria.max_iters {
            let (num, den, dx, dy) = self.radial_and_delta(x, y);
            let inv_radial = den / num;
            if inv_radial < 0.0 {
                return distorted;
            }
            x = (x0 - dx) * inv_radial;
            y = (y0 - dy) * inv_radial;

            let residual = self.distort(Vector2::new(x, y)) - distorted;
            if residual.norm() < criteria.eps {
                break;
            }
        }
        Vector2::new(x, y)
    }
}

impl TryFrom<Vec<f64>> for Distortion {
    type Error = CameraModelError;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_opencv(&v)
    }
}

impl From<Distortion> for Vec<f64> {
    fn from(d: Distortion) -> Self {
        d.to_opencv()
    }
}

/// Calibrated camera: intrinsics plus lens distortion.
///
/// Immutable after calibration; shared by every transfer operation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
}

impl CameraModel {
    pub fn new(intrinsics: Intrinsics, distortion: Distortion) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Pinhole camera without distortion.
    pub fn pinhole(intrinsics: Intrinsics) -> Self {
        Self::new(intrinsics, Distortion::none())
    }

    /// Raw pixel -> undistorted normalized coordinates.
    pub fn undistort_normalized(
        &self,
        pixel: Point2<f64>,
        criteria: &UndistortCriteria,
    ) -> Vector2<f64> {
        let distorted = self.intrinsics.normalize(pixel);
        self.distortion.undistort(distorted, criteria)
    }

    /// Raw pixel -> undistorted pixel with the same camera matrix.
    pub fn undistort_pixel(&self, pixel: Point2<f64>, criteria: &UndistortCriteria) -> Point2<f64> {
        self.intrinsics
            .denormalize(self.undistort_normalized(pixel, criteria))
    }

    /// Back-project a raw pixel to the 3D point at depth `z` along the optical axis.
    pub fn back_project(
        &self,
        pixel: Point2<f64>,
        z: f64,
        criteria: &UndistortCriteria,
    ) -> Point3<f64> {
        let n = self.undistort_normalized(pixel, criteria);
        Point3::new(n.x * z, n.y * z, z)
    }

    /// Project a point expressed in this camera's frame to raw pixels.
    ///
    /// Returns `None` for points on or behind the image plane.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if !(p.z.is_finite() && p.z > f64::EPSILON) {
            return None;
        }
        let n = Vector2::new(p.x / p.z, p.y / p.z);
        Some(self.intrinsics.denormalize(self.distortion.distort(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_camera() -> CameraModel {
        CameraModel::new(
            Intrinsics::new(1200.0, 1190.0, 640.0, 360.0).expect("intrinsics"),
            Distortion::from_opencv(&[-0.21, 0.08, 0.0012, -0.0007, -0.015]).expect("dist"),
        )
    }

    #[test]
    fn distortion_round_trips_through_opencv_layout() {
        let coeffs = [0.1, -0.2, 0.001, 0.002, 0.03, 0.01, -0.02, 0.005];
        let d = Distortion::from_opencv(&coeffs).expect("dist");
        assert_eq!(d.to_opencv(), coeffs.to_vec());
        assert!(matches!(
            Distortion::from_opencv(&[0.0; 14]),
            Err(CameraModelError::UnsupportedDistortion(14))
        ));
    }

    #[test]
    fn undistort_inverts_distort() {
        let cam = test_camera();
        let criteria = UndistortCriteria::default();
        for n in [
            Vector2::new(0.0, 0.0),
            Vector2::new(0.2, -0.1),
            Vector2::new(-0.35, 0.25),
        ] {
            let d = cam.distortion.distort(n);
            let back = cam.distortion.undistort(d, &criteria);
            assert_relative_eq!(back, n, epsilon = 1e-9);
        }
    }

    #[test]
    fn project_then_back_project_recovers_point() {
        let cam = test_camera();
        let criteria = UndistortCriteria::default();
        let p = Point3::new(0.05, -0.03, 0.45);
        let px = cam.project(&p).expect("in front");
        let back = cam.back_project(px, p.z, &criteria);
        assert_relative_eq!(back, p, epsilon = 1e-9);
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        let cam = test_camera();
        assert!(cam.project(&Point3::new(0.0, 0.0, -1.0)).is_none());
        assert!(cam.project(&Point3::new(0.1, 0.0, 0.0)).is_none());
    }

    #[test]
    fn camera_matrix_round_trips() {
        let k = Matrix3::new(900.0, 0.5, 320.0, 0.0, 905.0, 240.0, 0.0, 0.0, 1.0);
        let intr = Intrinsics::from_matrix(&k).expect("valid");
        assert_eq!(intr.matrix(), k);
        let bad = Matrix3::new(900.0, 0.0, 320.0, 0.0, 905.0, 240.0, 0.0, 1.0, 1.0);
        assert_eq!(
            Intrinsics::from_matrix(&bad),
            Err(CameraModelError::InvalidCameraMatrix)
        );
    }
}
