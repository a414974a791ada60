//! Multi-frame accumulation of stereo correspondences.

use nalgebra::{Point2, Point3};
use stereo_transfer_core::{CameraRole, StereoPair};

use crate::board::CharucoBoard;
use crate::correspondence::{
    match_frame, CorrespondenceError, CorrespondenceParams, StereoCorrespondence,
};
use crate::observations::MarkerObservations;

/// Outcome of feeding one frame pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Accepted { shared: usize },
    Skipped(CorrespondenceError),
}

/// Per-frame aligned arrays for the external stereo solver.
///
/// Frames without enough shared ids are skipped and counted; a skipped frame
/// never aborts the run.
#[derive(Clone, Debug)]
pub struct StereoObservationSet {
    board: CharucoBoard,
    params: CorrespondenceParams,
    frames: Vec<StereoCorrespondence>,
    frame_indices: Vec<usize>,
    seen: usize,
}

impl StereoObservationSet {
    pub fn new(board: CharucoBoard, params: CorrespondenceParams) -> Self {
        Self {
            board,
            params,
            frames: Vec::new(),
            frame_indices: Vec::new(),
            seen: 0,
        }
    }

    /// Match one frame pair and keep it when it has enough shared ids.
    pub fn push_frame(
        &mut self,
        left: &MarkerObservations,
        right: &MarkerObservations,
    ) -> FrameOutcome {
        let index = self.seen;
        self.seen += 1;
        match match_frame(&self.board, StereoPair::new(left, right), &self.params) {
            Ok(frame) => {
                let shared = frame.len();
                log::debug!("frame {index}: {shared} shared corners");
                self.frames.push(frame);
                self.frame_indices.push(index);
                FrameOutcome::Accepted { shared }
            }
            Err(err) => {
                log::warn!("frame {index} skipped: {err}");
                FrameOutcome::Skipped(err)
            }
        }
    }

    pub fn board(&self) -> &CharucoBoard {
        &self.board
    }

    /// Accepted frames in input order.
    pub fn frames(&self) -> &[StereoCorrespondence] {
        &self.frames
    }

    /// Input index of every accepted frame.
    pub fn accepted_indices(&self) -> &[usize] {
        &self.frame_indices
    }

    pub fn accepted(&self) -> usize {
        self.frames.len()
    }

    pub fn skipped(&self) -> usize {
        self.seen - self.frames.len()
    }

    /// Total number of matched corners across accepted frames.
    pub fn total_points(&self) -> usize {
        self.frames.iter().map(StereoCorrespondence::len).sum()
    }

    /// Board-space points per accepted frame.
    pub fn object_points(&self) -> Vec<Vec<Point3<f64>>> {
        self.frames.iter().map(|f| f.object_points.clone()).collect()
    }

    /// Image points of one camera per accepted frame.
    pub fn image_points(&self, role: CameraRole) -> Vec<Vec<Point2<f64>>> {
        self.frames
            .iter()
            .map(|f| f.image_points[role].clone())
            .collect()
    }
}
