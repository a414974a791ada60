//! Rectified-left bounding box -> rectified-right bounding box via disparity.
//!
//! Each box corner is shifted by the median disparity of a small window
//! around it, which follows depth changes across the object better than one
//! global value. Corners whose window holds no valid disparity fall back to
//! the median over the whole box. Rows are not touched: rectified views share
//! their epipolar lines.

use serde::{Deserialize, Serialize};
use stereo_transfer_core::{BBox, DisparityMap, PixelRect, RectifiedLeft, RectifiedRight};

#[cfg(feature = "tracing")]
use tracing::instrument;

fn default_min_valid_fraction() -> f64 {
    0.05
}

fn default_corner_window() -> usize {
    9
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisparityTransferParams {
    /// Minimum share of valid disparities inside the box.
    #[serde(default = "default_min_valid_fraction")]
    pub min_valid_fraction: f64,
    /// Side of the square window sampled around each corner (odd sizes are centered).
    #[serde(default = "default_corner_window")]
    pub corner_window: usize,
}

impl Default for DisparityTransferParams {
    fn default() -> Self {
        Self {
            min_valid_fraction: default_min_valid_fraction(),
            corner_window: default_corner_window(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DisparityTransferError {
    #[error("box does not overlap the disparity map")]
    EmptyRegion,
    #[error(
        "only {:.1}% of the box has valid disparity, need {:.1}%",
        .valid_fraction * 100.0,
        .required * 100.0
    )]
    InsufficientDisparityCoverage { valid_fraction: f64, required: f64 },
    #[error("transferred box is degenerate (x range {x_min}..{x_max})")]
    DegenerateBox { x_min: f64, x_max: f64 },
    #[error("disparity map belongs to frame {found:?}, expected frame {expected}")]
    StaleDisparity { expected: u64, found: Option<u64> },
}

/// Disparity used for one corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerDisparity {
    /// Corner in the rectified left view (integer pixel after clamping).
    pub x: f64,
    pub y: f64,
    pub disparity: f64,
    /// `true` when the corner window was empty and the box median was used.
    pub fallback: bool,
}

/// Transferred box plus the disparities that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxTransfer {
    pub bbox: BBox<RectifiedRight>,
    /// Median disparity over the clamped input box.
    pub box_disparity: f64,
    pub valid_fraction: f64,
    /// Top-left, top-right, bottom-left, bottom-right.
    pub corners: [CornerDisparity; 4],
}

/// Round half to even.
#[inline]
fn round_px(v: f64) -> i64 {
    v.round_ties_even() as i64
}

/// Transfer a rectified-left box into the rectified-right view.
pub fn transfer_bbox(
    bbox: &BBox<RectifiedLeft>,
    disparity: &DisparityMap,
    params: &DisparityTransferParams,
) -> Result<BBox<RectifiedRight>, DisparityTransferError> {
    transfer_bbox_detailed(bbox, disparity, params).map(|t| t.bbox)
}

/// [`transfer_bbox`] after checking that `disparity` was computed for `frame_index`.
///
/// A map without a frame tag is rejected as well.
pub fn transfer_bbox_for_frame(
    bbox: &BBox<RectifiedLeft>,
    disparity: &DisparityMap,
    frame_index: u64,
    params: &DisparityTransferParams,
) -> Result<BBox<RectifiedRight>, DisparityTransferError> {
    if disparity.frame_index() != Some(frame_index) {
        return Err(DisparityTransferError::StaleDisparity {
            expected: frame_index,
            found: disparity.frame_index(),
        });
    }
    transfer_bbox(bbox, disparity, params)
}

/// Transfer a box and report the per-corner disparities.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(disparity, params),
        fields(map_width = disparity.width(), map_height = disparity.height())
    )
)]
pub fn transfer_bbox_detailed(
    bbox: &BBox<RectifiedLeft>,
    disparity: &DisparityMap,
    params: &DisparityTransferParams,
) -> Result<BoxTransfer, DisparityTransferError> {
    let finite = [bbox.x, bbox.y, bbox.width, bbox.height]
        .iter()
        .all(|v| v.is_finite());
    if !finite {
        return Err(DisparityTransferError::EmptyRegion);
    }
    let roi = disparity
        .clamp_rect(
            round_px(bbox.x),
            round_px(bbox.y),
            round_px(bbox.x_max()),
            round_px(bbox.y_max()),
        )
        .ok_or(DisparityTransferError::EmptyRegion)?;

    let stats = disparity.region_stats(&roi);
    let valid_fraction = stats.valid_fraction();
    let box_disparity = match stats.median {
        Some(d) if stats.valid as f64 >= params.min_valid_fraction * stats.total as f64 => d,
        _ => {
            log::debug!(
                "box {bbox:?}: {}/{} valid disparities, rejected",
                stats.valid,
                stats.total
            );
            return Err(DisparityTransferError::InsufficientDisparityCoverage {
                valid_fraction,
                required: params.min_valid_fraction,
            });
        }
    };

    let corners = corner_disparities(disparity, &roi, box_disparity, params.corner_window);

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for c in &corners {
        let x_right = c.x - c.disparity;
        x_min = x_min.min(x_right);
        x_max = x_max.max(x_right);
    }
    let x0 = round_px(x_min).max(0);
    let x1 = round_px(x_max).min(disparity.width() as i64);
    if x1 <= x0 {
        return Err(DisparityTransferError::DegenerateBox {
            x_min: x0 as f64,
            x_max: x1 as f64,
        });
    }

    Ok(BoxTransfer {
        bbox: BBox::from_extents(x0 as f64, roi.y0 as f64, x1 as f64, roi.y1 as f64),
        box_disparity,
        valid_fraction,
        corners,
    })
}

fn corner_disparities(
    disparity: &DisparityMap,
    roi: &PixelRect,
    fallback: f64,
    window: usize,
) -> [CornerDisparity; 4] {
    let half = (window / 2) as i64;
    let extent = BBox::<RectifiedLeft>::from_extents(
        roi.x0 as f64,
        roi.y0 as f64,
        roi.x1 as f64,
        roi.y1 as f64,
    );
    extent.corners().map(|corner| {
        let (cx, cy) = (corner.x as i64, corner.y as i64);
        let local = disparity
            .clamp_rect(cx - half, cy - half, cx + half + 1, cy + half + 1)
            .and_then(|w| disparity.region_stats(&w).median);
        CornerDisparity {
            x: corner.x,
            y: corner.y,
            disparity: local.unwrap_or(fallback),
            fallback: local.is_none(),
        }
    })
}
