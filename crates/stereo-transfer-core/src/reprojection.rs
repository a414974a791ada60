//! Reprojection error of a calibrated camera over a set of board views.

use nalgebra::{Isometry3, Point2, Point3};

use crate::camera::CameraModel;

/// One board view: board pose in the camera frame and aligned 3D/2D points.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewObservation {
    /// Board-to-camera transform.
    pub pose: Isometry3<f64>,
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

/// Mean pixel error of one view: `||observed - projected||_2 / n`.
///
/// `None` when the view is empty, misaligned or a point projects behind the camera.
pub fn view_reprojection_error(camera: &CameraModel, view: &ViewObservation) -> Option<f64> {
    let n = view.object_points.len();
    if n == 0 || n != view.image_points.len() {
        return None;
    }
    let mut sq = 0.0;
    for (obj, img) in view.object_points.iter().zip(&view.image_points) {
        let projected = camera.project(&(view.pose * obj))?;
        sq += (img - projected).norm_squared();
    }
    Some(sq.sqrt() / n as f64)
}

/// Mean of [`view_reprojection_error`] over all views.
pub fn mean_reprojection_error(camera: &CameraModel, views: &[ViewObservation]) -> Option<f64> {
    if views.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for view in views {
        total += view_reprojection_error(camera, view)?;
    }
    Some(total / views.len() as f64)
}
