//! Cross-camera correspondence of ChArUco observations.
//!
//! Two cameras see the board independently; only corners identified in both
//! views can feed the stereo solver. The matcher intersects the identity sets,
//! orders the survivors by ascending id and emits, aligned by that order, the
//! pixels of each camera and the board-space point of each id.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use stereo_transfer_core::{CameraRole, StereoPair};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::board::CharucoBoard;
use crate::observations::MarkerObservations;

fn default_min_shared_markers() -> usize {
    4
}

fn default_min_corner_fraction() -> f64 {
    0.125
}

/// Acceptance thresholds for stereo and single-view correspondence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceParams {
    /// Minimum number of ids seen by both cameras for a frame pair to be used.
    #[serde(default = "default_min_shared_markers")]
    pub min_shared_markers: usize,
    /// A single view is accepted when it has more than
    /// `floor(inner_corner_count * min_corner_fraction)` corners.
    #[serde(default = "default_min_corner_fraction")]
    pub min_corner_fraction: f64,
}

impl Default for CorrespondenceParams {
    fn default() -> Self {
        Self {
            min_shared_markers: default_min_shared_markers(),
            min_corner_fraction: default_min_corner_fraction(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrespondenceError {
    #[error("only {shared} marker ids seen by both cameras, need at least {required}")]
    InsufficientCorrespondence { shared: usize, required: usize },
    #[error("view has {found} corners, need at least {required}")]
    TooFewCorners { found: usize, required: usize },
    #[error("corner id {id} is not on the board")]
    UnknownCorner { id: u32 },
}

/// Aligned triples for one accepted frame pair.
///
/// `ids[i]`, `image_points.left[i]`, `image_points.right[i]` and
/// `object_points[i]` all describe the same board corner.
#[derive(Clone, Debug, PartialEq)]
pub struct StereoCorrespondence {
    pub ids: Vec<u32>,
    pub image_points: StereoPair<Vec<Point2<f64>>>,
    pub object_points: Vec<Point3<f64>>,
}

impl StereoCorrespondence {
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Image points of one camera.
    pub fn points(&self, role: CameraRole) -> &[Point2<f64>] {
        &self.image_points[role]
    }
}

/// Aligned image/object points of a single camera view.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewPoints {
    pub ids: Vec<u32>,
    pub image_points: Vec<Point2<f64>>,
    pub object_points: Vec<Point3<f64>>,
}

/// Intersect the two observation sets of one frame pair.
///
/// Fails with [`CorrespondenceError::InsufficientCorrespondence`] when fewer
/// than `params.min_shared_markers` ids are shared (an empty set on either
/// side always fails), and with [`CorrespondenceError::UnknownCorner`] when a
/// shared id has no board-space point.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(board, observations, params),
        fields(left = observations.left.len(), right = observations.right.len())
    )
)]
pub fn match_frame(
    board: &CharucoBoard,
    observations: StereoPair<&MarkerObservations>,
    params: &CorrespondenceParams,
) -> Result<StereoCorrespondence, CorrespondenceError> {
    let ids = observations.left.shared_ids(observations.right);
    let required = params.min_shared_markers.max(1);
    if ids.len() < required {
        return Err(CorrespondenceError::InsufficientCorrespondence {
            shared: ids.len(),
            required,
        });
    }

    let object_points = board_points(board, &ids)?;
    // Both sets contain every shared id by construction.
    let image_points = observations.map(|set| ids.iter().filter_map(|&id| set.get(id)).collect());

    Ok(StereoCorrespondence {
        ids,
        image_points,
        object_points,
    })
}

/// Aligned points of one camera view, accepted only when the view holds
/// enough corners for mono calibration.
pub fn single_view_points(
    board: &CharucoBoard,
    observations: &MarkerObservations,
    params: &CorrespondenceParams,
) -> Result<ViewPoints, CorrespondenceError> {
    let required = board.min_corners_for_view(params.min_corner_fraction);
    if observations.len() < required {
        return Err(CorrespondenceError::TooFewCorners {
            found: observations.len(),
            required,
        });
    }
    let ids: Vec<u32> = observations.ids().collect();
    let object_points = board_points(board, &ids)?;
    let image_points = observations.iter().map(|(_, p)| p).collect();
    Ok(ViewPoints {
        ids,
        image_points,
        object_points,
    })
}

fn board_points(
    board: &CharucoBoard,
    ids: &[u32],
) -> Result<Vec<Point3<f64>>, CorrespondenceError> {
    ids.iter()
        .map(|&id| {
            board
                .object_point(id)
                .ok_or(CorrespondenceError::UnknownCorner { id })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::CharucoBoardSpec;

    fn board() -> CharucoBoard {
        CharucoBoard::new(CharucoBoardSpec::default()).expect("board")
    }

    fn obs(ids: &[u32], offset: f64) -> MarkerObservations {
        MarkerObservations::from_pairs(
            ids.iter()
                .map(|&id| (id, Point2::new(id as f64 * 10.0 + offset, 5.0))),
        )
        .expect("observations")
    }

    #[test]
    fn matches_shared_ids_in_ascending_order() {
        let left = obs(&[1, 2, 3, 4, 5], 0.0);
        let right = obs(&[7, 6, 5, 4, 3], 100.0);
        let params = CorrespondenceParams {
            min_shared_markers: 3,
            ..CorrespondenceParams::default()
        };
        let m = match_frame(&board(), StereoPair::new(&left, &right), &params).expect("match");
        assert_eq!(m.ids, vec![3, 4, 5]);
        assert_eq!(m.points(CameraRole::Left)[0], Point2::new(30.0, 5.0));
        assert_eq!(m.points(CameraRole::Right)[2], Point2::new(150.0, 5.0));
        assert_eq!(m.object_points[1], board().object_point(4).expect("id 4"));
    }

    #[test]
    fn below_threshold_fails() {
        let left = obs(&[1, 2, 3, 4, 5], 0.0);
        let right = obs(&[3, 4, 5, 6, 7], 0.0);
        let err =
            match_frame(&board(), StereoPair::new(&left, &right), &CorrespondenceParams::default())
                .unwrap_err();
        assert_eq!(
            err,
            CorrespondenceError::InsufficientCorrespondence {
                shared: 3,
                required: 4
            }
        );
    }

    #[test]
    fn empty_side_always_fails() {
        let left = obs(&[1, 2, 3], 0.0);
        let right = MarkerObservations::new();
        let params = CorrespondenceParams {
            min_shared_markers: 0,
            ..CorrespondenceParams::default()
        };
        assert!(matches!(
            match_frame(&board(), StereoPair::new(&left, &right), &params),
            Err(CorrespondenceError::InsufficientCorrespondence { shared: 0, .. })
        ));
    }

    #[test]
    fn ids_off_the_board_are_reported() {
        let left = obs(&[1, 2, 3, 40], 0.0);
        let right = obs(&[1, 2, 3, 40], 0.0);
        let err =
            match_frame(&board(), StereoPair::new(&left, &right), &CorrespondenceParams::default())
                .unwrap_err();
        assert_eq!(err, CorrespondenceError::UnknownCorner { id: 40 });
    }

    #[test]
    fn single_view_needs_more_than_an_eighth_of_the_corners() {
        let params = CorrespondenceParams::default();
        let err = single_view_points(&board(), &obs(&[0, 1, 2], 0.0), &params).unwrap_err();
        assert_eq!(err, CorrespondenceError::TooFewCorners { found: 3, required: 4 });
        let view = single_view_points(&board(), &obs(&[8, 0, 1, 2], 0.0), &params).expect("view");
        assert_eq!(view.ids, vec![0, 1, 2, 8]);
        assert_eq!(view.image_points.len(), view.object_points.len());
    }
}
