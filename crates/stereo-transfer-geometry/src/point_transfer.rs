//! Depth-assisted transfer of a single pixel from one raw view to the other.

use stereo_transfer_core::{
    CameraModel, PixelPoint, RawSpace, StereoExtrinsics, StereoRectification, UndistortCriteria,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PointTransferError {
    #[error("assumed depth must be positive and finite, got {0}")]
    InvalidDepth(f64),
    #[error("point lands on or behind the target camera (z = {z})")]
    BehindTargetCamera { z: f64 },
    #[error("source pixel is not finite")]
    NonFinitePixel,
}

/// Move a raw pixel of camera A into camera B's raw view.
///
/// The pixel is undistorted, back-projected to the plane `Z = depth` in A's
/// frame, moved with `X_b = R X_a + T` and projected with B's intrinsics and
/// distortion. The result is exact only when `depth` is the true depth of the
/// scene point behind the pixel.
///
/// For the B -> A direction pass `camera_b`, `camera_a` and `extrinsics.inverse()`.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(camera_a, camera_b, extrinsics, criteria),
        fields(x = pixel.x, y = pixel.y)
    )
)]
pub fn transfer_point<A: RawSpace>(
    pixel: PixelPoint<A>,
    camera_a: &CameraModel,
    camera_b: &CameraModel,
    extrinsics: &StereoExtrinsics,
    depth: f64,
    criteria: &UndistortCriteria,
) -> Result<PixelPoint<A::Counterpart>, PointTransferError> {
    if !(depth.is_finite() && depth > 0.0) {
        return Err(PointTransferError::InvalidDepth(depth));
    }
    if !pixel.is_finite() {
        return Err(PointTransferError::NonFinitePixel);
    }
    let p_a = camera_a.back_project(pixel.coords(), depth, criteria);
    let p_b = extrinsics.transform(&p_a);
    let projected = camera_b
        .project(&p_b)
        .ok_or(PointTransferError::BehindTargetCamera { z: p_b.z })?;
    let out = PixelPoint::from_point(projected);
    if !out.is_finite() {
        return Err(PointTransferError::BehindTargetCamera { z: p_b.z });
    }
    Ok(out)
}

/// [`transfer_point`] with the depth derived from a rectified disparity through `Q`.
pub fn transfer_point_with_disparity<A: RawSpace>(
    pixel: PixelPoint<A>,
    camera_a: &CameraModel,
    camera_b: &CameraModel,
    extrinsics: &StereoExtrinsics,
    rectification: &StereoRectification,
    disparity: f64,
    criteria: &UndistortCriteria,
) -> Result<PixelPoint<A::Counterpart>, PointTransferError> {
    let depth = rectification
        .depth_from_disparity(disparity)
        .ok_or(PointTransferError::InvalidDepth(disparity))?;
    transfer_point(pixel, camera_a, camera_b, extrinsics, depth, criteria)
}
