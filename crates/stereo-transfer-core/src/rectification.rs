//! Output of stereo rectification: per-camera rotation and projection.

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Point2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraModel, UndistortCriteria};
use crate::spaces::{CameraRole, ImageSize, StereoPair};

/// Rectification rotation `R_i` and new projection matrix `P_i` of one camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectifyingProjection {
    pub rotation: Matrix3<f64>,
    pub projection: Matrix3x4<f64>,
}

impl RectifyingProjection {
    pub fn new(rotation: Matrix3<f64>, projection: Matrix3x4<f64>) -> Self {
        Self {
            rotation,
            projection,
        }
    }

    /// Map undistorted normalized coordinates of the raw camera into
    /// rectified pixels: `P[:, :3] * R * (x, y, 1)`, then dehomogenize.
    ///
    /// Returns `None` when the point maps to infinity.
    pub fn rectify_normalized(&self, x: f64, y: f64) -> Option<Point2<f64>> {
        let m = self.projection.fixed_view::<3, 3>(0, 0) * self.rotation;
        let h = m * Vector3::new(x, y, 1.0);
        if !h.z.is_finite() || h.z.abs() < f64::EPSILON {
            return None;
        }
        let p = Point2::new(h.x / h.z, h.y / h.z);
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }

    /// Undistort raw pixels of `camera` and map them into this rectified view.
    ///
    /// Output is index-aligned with `raw`; points that cannot be mapped are `None`.
    pub fn undistort_rectify(
        &self,
        camera: &CameraModel,
        raw: &[Point2<f64>],
        criteria: &UndistortCriteria,
    ) -> Vec<Option<Point2<f64>>> {
        raw.iter()
            .map(|&p| {
                let n = camera.undistort_normalized(p, criteria);
                self.rectify_normalized(n.x, n.y)
            })
            .collect()
    }

    /// Focal length of the rectified view (`P[0][0]`).
    #[inline]
    pub fn focal_length(&self) -> f64 {
        self.projection[(0, 0)]
    }
}

/// Rectification of the whole rig.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StereoRectification {
    pub cameras: StereoPair<RectifyingProjection>,
    /// Disparity-to-depth reprojection matrix.
    pub q: Matrix4<f64>,
    /// Size of the rectified images.
    pub image_size: ImageSize,
}

impl StereoRectification {
    pub fn camera(&self, role: CameraRole) -> &RectifyingProjection {
        &self.cameras[role]
    }

    /// Depth along the rectified left optical axis for a disparity, via `Q`.
    ///
    /// Uses the left principal point as the reprojected pixel, so only the
    /// `Z / W` ratio matters. Returns `None` for non-positive or non-finite
    /// disparities.
    pub fn depth_from_disparity(&self, disparity: f64) -> Option<f64> {
        if !(disparity.is_finite() && disparity > 0.0) {
            return None;
        }
        let p = &self.cameras.left.projection;
        let h = self.q * Vector4::new(p[(0, 2)], p[(1, 2)], disparity, 1.0);
        if h.w.abs() < f64::EPSILON {
            return None;
        }
        let z = (h.z / h.w).abs();
        z.is_finite().then_some(z)
    }
}
