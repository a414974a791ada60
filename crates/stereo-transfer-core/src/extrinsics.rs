//! Rigid transform between the two cameras and the derived epipolar matrices.

use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::camera::Intrinsics;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExtrinsicsError {
    #[error("stereo extrinsics contain non-finite values")]
    NonFinite,
    #[error("camera matrix is not invertible")]
    SingularCameraMatrix,
}

/// `R`, `T` taking points from camera A's frame into camera B's frame
/// (`X_b = R X_a + T`), plus the essential and fundamental matrices.
///
/// The fundamental matrix satisfies `x_b^T F x_a = 0` for corresponding
/// pixels in homogeneous coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StereoExtrinsics {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    pub essential: Matrix3<f64>,
    pub fundamental: Matrix3<f64>,
    /// RMS reprojection error reported by the stereo solver.
    #[serde(default)]
    pub rms: Option<f64>,
}

/// Cross-product matrix `[t]x`.
pub fn skew(t: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -t.z, t.y, //
        t.z, 0.0, -t.x, //
        -t.y, t.x, 0.0,
    )
}

impl StereoExtrinsics {
    /// Bundle a solver result as-is.
    pub fn new(
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
        essential: Matrix3<f64>,
        fundamental: Matrix3<f64>,
    ) -> Result<Self, ExtrinsicsError> {
        let finite = rotation.iter().all(|v| v.is_finite())
            && translation.iter().all(|v| v.is_finite())
            && essential.iter().all(|v| v.is_finite())
            && fundamental.iter().all(|v| v.is_finite());
        if !finite {
            return Err(ExtrinsicsError::NonFinite);
        }
        Ok(Self {
            rotation,
            translation,
            essential,
            fundamental,
            rms: None,
        })
    }

    /// Derive `E = [T]x R` and `F = K_b^-T E K_a^-1` from `R`, `T` and both camera matrices.
    ///
    /// `F` is scaled so that `F[2][2] = 1` when that entry is not ~0, as OpenCV does.
    pub fn from_rt(
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
        camera_a: &Intrinsics,
        camera_b: &Intrinsics,
    ) -> Result<Self, ExtrinsicsError> {
        let essential = skew(&translation) * rotation;
        let ka_inv = camera_a
            .matrix()
            .try_inverse()
            .ok_or(ExtrinsicsError::SingularCameraMatrix)?;
        let kb_inv = camera_b
            .matrix()
            .try_inverse()
            .ok_or(ExtrinsicsError::SingularCameraMatrix)?;
        let mut fundamental = kb_inv.transpose() * essential * ka_inv;
        let scale = fundamental[(2, 2)];
        if scale.abs() > f64::EPSILON {
            fundamental /= scale;
        }
        Self::new(rotation, translation, essential, fundamental)
    }

    pub fn with_rms(mut self, rms: f64) -> Self {
        self.rms = Some(rms);
        self
    }

    /// Express a point given in camera A's frame in camera B's frame.
    #[inline]
    pub fn transform(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    /// Extrinsics for the opposite direction (B -> A): `R^T`, `-R^T T`, `E^T`, `F^T`.
    pub fn inverse(&self) -> Self {
        let rt = self.rotation.transpose();
        Self {
            rotation: rt,
            translation: -(rt * self.translation),
            essential: self.essential.transpose(),
            fundamental: self.fundamental.transpose(),
            rms: self.rms,
        }
    }

    /// Length of the baseline in the units of `T`.
    pub fn baseline(&self) -> f64 {
        self.translation.norm()
    }

    /// `true` when `R` is orthonormal with determinant +1 within `tol`.
    pub fn has_proper_rotation(&self, tol: f64) -> bool {
        let r = &self.rotation;
        let orthogonality = (r.transpose() * r - Matrix3::identity()).abs().max();
        orthogonality < tol && (r.determinant() - 1.0).abs() < tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector2};

    fn rig() -> (Intrinsics, Intrinsics, StereoExtrinsics) {
        let ka = Intrinsics::new(800.0, 800.0, 320.0, 240.0).expect("ka");
        let kb = Intrinsics::new(950.0, 940.0, 640.0, 360.0).expect("kb");
        let r = *Rotation3::from_euler_angles(0.01, -0.05, 0.02).matrix();
        let t = Vector3::new(-0.12, 0.003, 0.01);
        let ext = StereoExtrinsics::from_rt(r, t, &ka, &kb).expect("extrinsics");
        (ka, kb, ext)
    }

    #[test]
    fn fundamental_matrix_satisfies_epipolar_constraint() {
        let (ka, kb, ext) = rig();
        let p_a = Point3::new(0.1, -0.05, 0.8);
        let p_b = ext.transform(&p_a);
        let xa = ka.denormalize(Vector2::new(p_a.x / p_a.z, p_a.y / p_a.z));
        let xb = kb.denormalize(Vector2::new(p_b.x / p_b.z, p_b.y / p_b.z));
        let residual = Vector3::new(xb.x, xb.y, 1.0)
            .dot(&(ext.fundamental * Vector3::new(xa.x, xa.y, 1.0)));
        assert!(residual.abs() < 1e-6, "residual {residual}");
    }

    #[test]
    fn inverse_composes_to_identity() {
        let (_, _, ext) = rig();
        let inv = ext.inverse();
        let p = Point3::new(0.3, 0.2, 1.5);
        assert_relative_eq!(inv.transform(&ext.transform(&p)), p, epsilon = 1e-12);
        assert!(inv.has_proper_rotation(1e-9));
        assert_relative_eq!(inv.baseline(), ext.baseline(), epsilon = 1e-12);
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut t = Vector3::zeros();
        t.x = f64::NAN;
        let res =
            StereoExtrinsics::new(Matrix3::identity(), t, Matrix3::zeros(), Matrix3::zeros());
        assert_eq!(res, Err(ExtrinsicsError::NonFinite));
    }
}
