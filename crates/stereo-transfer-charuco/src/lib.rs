//! ChArUco board layout and cross-camera correspondence.
//!
//! Board detection itself happens elsewhere; this crate starts from the
//! per-camera `id -> pixel` observations a detector produces and turns them
//! into the aligned 2D/2D/3D triples a stereo solver consumes.

mod accumulate;
mod board;
mod correspondence;
mod observations;

pub use accumulate::{FrameOutcome, StereoObservationSet};
pub use board::{CharucoBoard, CharucoBoardError, CharucoBoardSpec};
pub use correspondence::{
    match_frame, single_view_points, CorrespondenceError, CorrespondenceParams,
    StereoCorrespondence, ViewPoints,
};
pub use observations::{MarkerObservation, MarkerObservations, ObservationError};
