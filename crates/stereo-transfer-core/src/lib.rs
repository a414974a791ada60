//! Core data model for two-camera rigs.
//!
//! Camera roles, pixel spaces carried in the type of every point and box,
//! the OpenCV-compatible camera model, stereo extrinsics, rectification
//! output and dense disparity maps. Nothing here detects boards or solves
//! calibrations; those results come in from outside and are consumed as
//! immutable values.

mod camera;
mod disparity;
mod extrinsics;
mod logger;
mod rectification;
mod reprojection;
mod spaces;

pub use camera::{CameraModel, CameraModelError, Distortion, Intrinsics, UndistortCriteria};
pub use disparity::{
    median, DisparityMap, DisparityMapError, PixelRect, RegionStats, SGBM_DISPARITY_SCALE,
};
pub use extrinsics::{skew, ExtrinsicsError, StereoExtrinsics};
pub use rectification::{RectifyingProjection, StereoRectification};
pub use reprojection::{mean_reprojection_error, view_reprojection_error, ViewObservation};
pub use spaces::{
    BBox, CameraRole, ImageSize, PixelPoint, PixelSpace, RawLeft, RawRight, RawSpace,
    RectifiedLeft, RectifiedRight, RectifiedSpace, StereoPair,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
