//! Raw left box -> rectified left box -> rectified right box.

use serde::Serialize;
use stereo_transfer_core::{
    BBox, CameraModel, CameraRole, DisparityMap, RawLeft, RectifiedLeft, RectifiedRight,
    StereoRectification,
};
use stereo_transfer_geometry::{
    transfer_bbox_detailed, warp_bbox_raw_to_rectified, BoxTransfer, DisparityTransferError,
    DisparityTransferParams, WarpError, WarpParams,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::io::TransferConfig;

/// Pipeline stage that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Warp,
    Disparity,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("raw to rectified warp failed: {0}")]
    Warp(#[from] WarpError),
    #[error("disparity transfer failed: {0}")]
    Disparity(#[from] DisparityTransferError),
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Warp(_) => PipelineStage::Warp,
            PipelineError::Disparity(_) => PipelineStage::Disparity,
        }
    }
}

/// Boxes produced by every stage of a successful run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RawBoxTransferResult {
    pub raw_left: BBox<RawLeft>,
    pub rectified_left: BBox<RectifiedLeft>,
    pub rectified_right: BBox<RectifiedRight>,
    pub transfer: BoxTransfer,
}

/// Moves detector boxes from the raw left image into the rectified right image.
///
/// Holds the left camera and the rig rectification; the disparity map is
/// passed per call since it belongs to a single frame pair.
#[derive(Clone, Debug)]
pub struct RawBoxTransfer<'a> {
    camera: &'a CameraModel,
    rectification: &'a StereoRectification,
    warp: WarpParams,
    disparity: DisparityTransferParams,
    clip_to_image: bool,
}

impl<'a> RawBoxTransfer<'a> {
    pub fn new(
        camera: &'a CameraModel,
        rectification: &'a StereoRectification,
        config: &TransferConfig,
    ) -> Self {
        Self {
            camera,
            rectification,
            warp: config.warp,
            disparity: config.disparity,
            clip_to_image: config.clip_to_image,
        }
    }

    /// First stage only.
    pub fn to_rectified_left(
        &self,
        bbox: &BBox<RawLeft>,
    ) -> Result<BBox<RectifiedLeft>, WarpError> {
        let bounds = self.clip_to_image.then_some(self.rectification.image_size);
        warp_bbox_raw_to_rectified(
            bbox,
            self.camera,
            self.rectification.camera(CameraRole::Left),
            bounds,
            &self.warp,
        )
    }

    /// Both stages against the disparity map of the current frame pair.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, disparity)))]
    pub fn run(
        &self,
        bbox: &BBox<RawLeft>,
        disparity: &DisparityMap,
    ) -> Result<RawBoxTransferResult, PipelineError> {
        let rectified_left = self.to_rectified_left(bbox)?;
        let transfer = transfer_bbox_detailed(&rectified_left, disparity, &self.disparity)?;
        log::debug!(
            "{bbox:?} -> {rectified_left:?} -> {:?} (box disparity {:.2})",
            transfer.bbox,
            transfer.box_disparity
        );
        Ok(RawBoxTransferResult {
            raw_left: *bbox,
            rectified_left,
            rectified_right: transfer.bbox,
            transfer,
        })
    }

    /// [`RawBoxTransfer::run`] after checking the map belongs to `frame_index`.
    pub fn run_for_frame(
        &self,
        bbox: &BBox<RawLeft>,
        disparity: &DisparityMap,
        frame_index: u64,
    ) -> Result<RawBoxTransferResult, PipelineError> {
        if disparity.frame_index() != Some(frame_index) {
            return Err(DisparityTransferError::StaleDisparity {
                expected: frame_index,
                found: disparity.frame_index(),
            }
            .into());
        }
        self.run(bbox, disparity)
    }

    /// Run every box of a frame; failures are kept per box.
    pub fn run_all(
        &self,
        boxes: &[BBox<RawLeft>],
        disparity: &DisparityMap,
    ) -> Vec<Result<RawBoxTransferResult, PipelineError>> {
        boxes
            .iter()
            .map(|b| {
                let res = self.run(b, disparity);
                if let Err(err) = &res {
                    log::warn!("no transfer for {b:?}: {err}");
                }
                res
            })
            .collect()
    }
}
