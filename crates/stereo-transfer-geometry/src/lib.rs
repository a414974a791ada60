//! Moving observations between the two views of a calibrated stereo rig.
//!
//! - [`transfer_point`]: raw pixel of one camera to the other, at an assumed depth.
//! - [`epipolar_line`]: line in the other view that a pixel's match must lie on.
//! - [`warp_bbox_raw_to_rectified`]: raw box to the rectified view of the same camera.
//! - [`transfer_bbox`]: rectified-left box to rectified-right using a disparity map.
//!
//! All functions are pure. Failures are typed errors, never zero-sized boxes.

mod bbox_warp;
mod disparity_transfer;
mod epipolar;
mod point_transfer;

pub use bbox_warp::{sample_grid, warp_bbox_raw_to_rectified, WarpError, WarpParams};
pub use disparity_transfer::{
    transfer_bbox, transfer_bbox_detailed, transfer_bbox_for_frame, BoxTransfer, CornerDisparity,
    DisparityTransferError, DisparityTransferParams,
};
pub use epipolar::{
    epipolar_line, epipolar_line_from, mean_epipolar_distance, EpipolarLine, VERTICAL_EPS,
};
pub use point_transfer::{transfer_point, transfer_point_with_disparity, PointTransferError};
