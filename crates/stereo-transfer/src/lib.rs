//! High-level facade for the `stereo-transfer-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core data model, ChArUco correspondence and transfer geometry,
//! - JSON persistence of calibration artifacts and of the run configuration,
//! - the raw-box to rectified-right-box pipeline,
//! - (feature `image`) loading of fixed-point disparity PNGs.
//!
//! ## Quickstart
//!
//! ```no_run
//! use stereo_transfer::io::{JsonDocument, RectificationDoc, CameraCalibrationDoc, TransferConfig};
//! use stereo_transfer::pipeline::RawBoxTransfer;
//! use stereo_transfer::core::BBox;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let camera = CameraCalibrationDoc::load_json("left.json")?.to_camera_model()?;
//! let rect = RectificationDoc::load_json("rectification.json")?.to_rectification();
//! let disparity = stereo_transfer::disparity_io::load_sgbm_png("disparity.png")?;
//! let config = TransferConfig::default();
//!
//! let pipeline = RawBoxTransfer::new(&camera, &rect, &config);
//! let out = pipeline.run(&BBox::new(656.0, 526.0, 400.0, 192.0), &disparity)?;
//! println!("{:?}", out.rectified_right);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `stereo_transfer::core`: camera roles, typed pixel spaces, camera model, extrinsics,
//!   rectification, disparity maps.
//! - `stereo_transfer::charuco`: board layout and cross-camera correspondence.
//! - `stereo_transfer::geometry`: point, epipolar and box transfer.
//! - `stereo_transfer::io`: JSON documents.
//! - `stereo_transfer::pipeline`: chained box transfer.

pub use stereo_transfer_charuco as charuco;
pub use stereo_transfer_core as core;
pub use stereo_transfer_geometry as geometry;

pub use stereo_transfer_core::{
    BBox, CameraModel, CameraRole, DisparityMap, PixelPoint, RawLeft, RawRight, RectifiedLeft,
    RectifiedRight, StereoExtrinsics, StereoPair, StereoRectification,
};

pub mod io;
pub mod pipeline;

#[cfg(feature = "image")]
pub mod disparity_io;
