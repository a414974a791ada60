//! Raw (distorted) bounding box -> rectified bounding box of the same camera.
//!
//! Lens distortion bends straight box edges, so mapping the four corners
//! alone underestimates the rectified extent. The box is sampled on a
//! regular grid that includes its border, every sample is undistorted and
//! rectified, and the integer box enclosing the results is returned.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use stereo_transfer_core::{
    BBox, CameraModel, ImageSize, RawSpace, RectifyingProjection, UndistortCriteria,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

fn default_samples_x() -> usize {
    10
}

fn default_samples_y() -> usize {
    6
}

/// Sampling grid of the warp.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarpParams {
    /// Samples along x, both edges included.
    #[serde(default = "default_samples_x")]
    pub samples_x: usize,
    /// Samples along y, both edges included.
    #[serde(default = "default_samples_y")]
    pub samples_y: usize,
    #[serde(default)]
    pub undistort: UndistortCriteria,
}

impl Default for WarpParams {
    fn default() -> Self {
        Self {
            samples_x: default_samples_x(),
            samples_y: default_samples_y(),
            undistort: UndistortCriteria::default(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WarpError {
    #[error("sampling grid must be at least 2x2, got {samples_x}x{samples_y}")]
    InvalidGrid { samples_x: usize, samples_y: usize },
    #[error("input box is degenerate")]
    DegenerateInput,
    #[error("sample ({x:.2}, {y:.2}) has no rectified image")]
    NonFiniteSample { x: f64, y: f64 },
    #[error("warped box is degenerate ({width}x{height})")]
    DegenerateBox { width: f64, height: f64 },
}

/// `n` evenly spaced values from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(move |i| if i + 1 == n { end } else { start + step * i as f64 })
}

/// Grid samples of `bbox`, row by row.
///
/// Both edges are always sampled, so each axis needs at least two samples.
pub fn sample_grid<S: RawSpace>(
    bbox: &BBox<S>,
    samples_x: usize,
    samples_y: usize,
) -> Result<Vec<Point2<f64>>, WarpError> {
    if samples_x < 2 || samples_y < 2 {
        return Err(WarpError::InvalidGrid {
            samples_x,
            samples_y,
        });
    }
    let mut out = Vec::with_capacity(samples_x * samples_y);
    for y in linspace(bbox.y, bbox.y_max(), samples_y) {
        out.extend(linspace(bbox.x, bbox.x_max(), samples_x).map(|x| Point2::new(x, y)));
    }
    Ok(out)
}

/// Warp a raw box into the rectified view of the same camera.
///
/// `camera` is the raw camera, `rectifying` its rectification rotation and
/// new projection. With `bounds`, the result is clipped to the rectified
/// image first. A result with non-positive width or height is reported as
/// [`WarpError::DegenerateBox`], never returned.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(camera, rectifying, params),
        fields(x = bbox.x, y = bbox.y, width = bbox.width, height = bbox.height)
    )
)]
pub fn warp_bbox_raw_to_rectified<S: RawSpace>(
    bbox: &BBox<S>,
    camera: &CameraModel,
    rectifying: &RectifyingProjection,
    bounds: Option<ImageSize>,
    params: &WarpParams,
) -> Result<BBox<S::Rectified>, WarpError> {
    let samples = sample_grid(bbox, params.samples_x, params.samples_y)?;
    if bbox.is_degenerate() {
        return Err(WarpError::DegenerateInput);
    }

    let mapped = rectifying.undistort_rectify(camera, &samples, &params.undistort);

    let (mut x_min, mut y_min) = (f64::INFINITY, f64::INFINITY);
    let (mut x_max, mut y_max) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (raw, rect) in samples.iter().zip(mapped) {
        let p = rect.ok_or(WarpError::NonFiniteSample { x: raw.x, y: raw.y })?;
        x_min = x_min.min(p.x);
        y_min = y_min.min(p.y);
        x_max = x_max.max(p.x);
        y_max = y_max.max(p.y);
    }

    let (mut x0, mut y0) = (x_min.floor(), y_min.floor());
    let (mut x1, mut y1) = (x_max.ceil(), y_max.ceil());
    if let Some(size) = bounds {
        x0 = x0.max(0.0);
        y0 = y0.max(0.0);
        x1 = x1.min(size.width as f64);
        y1 = y1.min(size.height as f64);
    }

    let (width, height) = (x1 - x0, y1 - y0);
    if !(width > 0.0 && height > 0.0) {
        log::debug!("warped box collapsed to {width}x{height}");
        return Err(WarpError::DegenerateBox { width, height });
    }
    Ok(BBox::new(x0, y0, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Matrix3x4};
    use stereo_transfer_core::{Distortion, Intrinsics, RawLeft};

    fn identity_rectifier(k: &Intrinsics) -> RectifyingProjection {
        let m = k.matrix();
        let mut p = Matrix3x4::zeros();
        p.fixed_view_mut::<3, 3>(0, 0).copy_from(&m);
        RectifyingProjection::new(Matrix3::identity(), p)
    }

    #[test]
    fn linspace_includes_both_ends() {
        let v: Vec<f64> = linspace(2.0, 4.0, 5).collect();
        assert_eq!(v, vec![2.0, 2.5, 3.0, 3.5, 4.0]);
        let grid = sample_grid(&BBox::<RawLeft>::new(0.0, 0.0, 9.0, 5.0), 10, 6).expect("grid");
        assert_eq!(grid.len(), 60);
        assert_eq!(grid[0], Point2::new(0.0, 0.0));
        assert_eq!(grid[59], Point2::new(9.0, 5.0));
    }

    #[test]
    fn sample_grid_without_both_edges_is_an_error() {
        let bbox = BBox::<RawLeft>::new(0.0, 0.0, 9.0, 5.0);
        assert_eq!(
            sample_grid(&bbox, 0, 6),
            Err(WarpError::InvalidGrid {
                samples_x: 0,
                samples_y: 6
            })
        );
        assert_eq!(
            sample_grid(&bbox, 4, 1),
            Err(WarpError::InvalidGrid {
                samples_x: 4,
                samples_y: 1
            })
        );
        assert_eq!(sample_grid(&bbox, 2, 2).expect("corners").len(), 4);
    }

    #[test]
    fn pinhole_identity_rounds_outward() {
        let k = Intrinsics::new(900.0, 900.0, 640.0, 360.0).expect("k");
        let camera = CameraModel::pinhole(k);
        let bbox = BBox::<RawLeft>::new(100.4, 50.6, 200.2, 80.1);
        let out = warp_bbox_raw_to_rectified(
            &bbox,
            &camera,
            &identity_rectifier(&k),
            None,
            &WarpParams::default(),
        )
        .expect("warp");
        assert_eq!(out.x, 100.0);
        assert_eq!(out.y, 50.0);
        assert_eq!(out.x_max(), 301.0);
        assert_eq!(out.y_max(), 131.0);
    }

    #[test]
    fn barrel_distortion_grows_the_box() {
        let k = Intrinsics::new(900.0, 900.0, 640.0, 360.0).expect("k");
        let camera = CameraModel::new(
            k,
            Distortion::from_opencv(&[-0.3, 0.1, 0.0, 0.0]).expect("dist"),
        );
        let bbox = BBox::<RawLeft>::new(900.0, 500.0, 200.0, 150.0);
        let out = warp_bbox_raw_to_rectified(
            &bbox,
            &camera,
            &identity_rectifier(&k),
            None,
            &WarpParams::default(),
        )
        .expect("warp");
        assert!(out.x_max() > bbox.x_max());
        assert!(out.y_max() > bbox.y_max());
    }

    #[test]
    fn pincushion_edges_bulge_past_the_corners() {
        // Positive k1 pulls the corners further inward than the edge
        // midpoints, so only a dense grid sees the full extent.
        let k = Intrinsics::new(900.0, 900.0, 640.0, 360.0).expect("k");
        let camera = CameraModel::new(
            k,
            Distortion::from_opencv(&[0.3, 0.0, 0.0, 0.0]).expect("dist"),
        );
        let rectifier = identity_rectifier(&k);
        let bbox = BBox::<RawLeft>::new(440.0, 100.0, 400.0, 520.0);
        let corners_only = WarpParams {
            samples_x: 2,
            samples_y: 2,
            ..WarpParams::default()
        };

        let corners = warp_bbox_raw_to_rectified(&bbox, &camera, &rectifier, None, &corners_only)
            .expect("corners");
        let grid =
            warp_bbox_raw_to_rectified(&bbox, &camera, &rectifier, None, &WarpParams::default())
                .expect("grid");

        assert!(grid.y < corners.y);
        assert!(grid.y_max() > corners.y_max());
        assert!(grid.height > corners.height);
        assert!(grid.width >= corners.width);
    }

    #[test]
    fn box_clipped_away_is_degenerate() {
        let k = Intrinsics::new(900.0, 900.0, 640.0, 360.0).expect("k");
        let camera = CameraModel::pinhole(k);
        let bbox = BBox::<RawLeft>::new(2000.0, 100.0, 50.0, 50.0);
        let err = warp_bbox_raw_to_rectified(
            &bbox,
            &camera,
            &identity_rectifier(&k),
            Some(ImageSize::new(1280, 720)),
            &WarpParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WarpError::DegenerateBox { .. }));
    }

    #[test]
    fn tiny_grid_is_rejected() {
        let k = Intrinsics::new(900.0, 900.0, 640.0, 360.0).expect("k");
        let params = WarpParams {
            samples_x: 1,
            ..WarpParams::default()
        };
        let err = warp_bbox_raw_to_rectified(
            &BBox::<RawLeft>::new(0.0, 0.0, 10.0, 10.0),
            &CameraModel::pinhole(k),
            &identity_rectifier(&k),
            None,
            &params,
        )
        .unwrap_err();
        assert_eq!(
            err,
            WarpError::InvalidGrid {
                samples_x: 1,
                samples_y: 6
            }
        );
    }
}
