//! JSON persistence of calibration artifacts and the run configuration.
//!
//! Field names follow the documents the calibration tooling writes:
//! `camera_matrix`, `dist_coefs`, `rotation_matrix`, `translation_vector`,
//! `essential_matrix`, `fundamental_matrix`. Matrices are read from either
//! nested row lists (`[[..], [..]]`) or flat row-major lists, and always
//! written nested.

use std::{fs, path::Path};

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Vector3};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use stereo_transfer_charuco::{
    CharucoBoard, CharucoBoardError, CharucoBoardSpec, CorrespondenceParams, MarkerObservations,
};
use stereo_transfer_core::{
    CameraModel, CameraModelError, Distortion, ExtrinsicsError, ImageSize, Intrinsics,
    RectifyingProjection, StereoExtrinsics, StereoPair, StereoRectification, UndistortCriteria,
};
use stereo_transfer_geometry::{DisparityTransferParams, WarpParams};

#[derive(thiserror::Error, Debug)]
pub enum StereoIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Camera(#[from] CameraModelError),
    #[error(transparent)]
    Extrinsics(#[from] ExtrinsicsError),
    #[error(transparent)]
    Board(#[from] CharucoBoardError),
}

/// Load/store a serde document as pretty JSON.
pub trait JsonDocument: Serialize + DeserializeOwned {
    /// Load a JSON document from disk.
    fn load_json(path: impl AsRef<Path>) -> Result<Self, StereoIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this document to disk as pretty JSON.
    fn write_json(&self, path: impl AsRef<Path>) -> Result<(), StereoIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Array in either of the two accepted shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArrayShape {
    Nested(Vec<Vec<f64>>),
    Flat(Vec<f64>),
}

impl ArrayShape {
    fn into_row_major(self) -> Vec<f64> {
        match self {
            ArrayShape::Nested(rows) => rows.into_iter().flatten().collect(),
            ArrayShape::Flat(values) => values,
        }
    }
}

/// `R x C` matrix as a list of rows.
mod rows {
    use super::ArrayShape;
    use nalgebra::SMatrix;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, const R: usize, const C: usize>(
        m: &SMatrix<f64, R, C>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let rows: Vec<Vec<f64>> = (0..R)
            .map(|i| (0..C).map(|j| m[(i, j)]).collect())
            .collect();
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const R: usize, const C: usize>(
        deserializer: D,
    ) -> Result<SMatrix<f64, R, C>, D::Error> {
        let values = ArrayShape::deserialize(deserializer)?.into_row_major();
        if values.len() != R * C {
            return Err(serde::de::Error::custom(format!(
                "expected a {R}x{C} matrix, got {} values",
                values.len()
            )));
        }
        Ok(SMatrix::from_row_slice(&values))
    }
}

/// Distortion coefficients written as a single row (`[[k1, k2, ...]]`).
mod coeffs {
    use super::ArrayShape;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        [values].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Ok(ArrayShape::deserialize(deserializer)?.into_row_major())
    }
}

/// Intrinsic calibration of one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibrationDoc {
    #[serde(with = "rows")]
    pub camera_matrix: Matrix3<f64>,
    #[serde(with = "coeffs")]
    pub dist_coefs: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rms: Option<f64>,
}

impl JsonDocument for CameraCalibrationDoc {}

impl CameraCalibrationDoc {
    pub fn from_camera_model(camera: &CameraModel, rms: Option<f64>) -> Self {
        Self {
            camera_matrix: camera.intrinsics.matrix(),
            dist_coefs: camera.distortion.to_opencv(),
            rms,
        }
    }

    /// Validate the document into a camera model.
    pub fn to_camera_model(&self) -> Result<CameraModel, StereoIoError> {
        let intrinsics = Intrinsics::from_matrix(&self.camera_matrix)?;
        let distortion = Distortion::from_opencv(&self.dist_coefs)?;
        Ok(CameraModel::new(intrinsics, distortion))
    }
}

/// Stereo calibration result relating camera A to camera B.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoCalibrationDoc {
    #[serde(with = "rows")]
    pub rotation_matrix: Matrix3<f64>,
    #[serde(with = "rows")]
    pub translation_vector: Vector3<f64>,
    #[serde(with = "rows")]
    pub essential_matrix: Matrix3<f64>,
    #[serde(with = "rows")]
    pub fundamental_matrix: Matrix3<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stereo_rms_reprojection_error: Option<f64>,
}

impl JsonDocument for StereoCalibrationDoc {}

impl StereoCalibrationDoc {
    pub fn from_extrinsics(extrinsics: &StereoExtrinsics) -> Self {
        Self {
            rotation_matrix: extrinsics.rotation,
            translation_vector: extrinsics.translation,
            essential_matrix: extrinsics.essential,
            fundamental_matrix: extrinsics.fundamental,
            stereo_rms_reprojection_error: extrinsics.rms,
        }
    }

    pub fn to_extrinsics(&self) -> Result<StereoExtrinsics, StereoIoError> {
        let mut ext = StereoExtrinsics::new(
            self.rotation_matrix,
            self.translation_vector,
            self.essential_matrix,
            self.fundamental_matrix,
        )?;
        ext.rms = self.stereo_rms_reprojection_error;
        Ok(ext)
    }
}

/// Rectification output: per-camera `R_i`, `P_i`, the `Q` matrix and the rectified size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectificationDoc {
    #[serde(with = "rows")]
    pub r1: Matrix3<f64>,
    #[serde(with = "rows")]
    pub r2: Matrix3<f64>,
    #[serde(with = "rows")]
    pub p1: Matrix3x4<f64>,
    #[serde(with = "rows")]
    pub p2: Matrix3x4<f64>,
    #[serde(with = "rows")]
    pub q: Matrix4<f64>,
    pub image_size: ImageSize,
}

impl JsonDocument for RectificationDoc {}

impl RectificationDoc {
    pub fn from_rectification(rect: &StereoRectification) -> Self {
        Self {
            r1: rect.cameras.left.rotation,
            r2: rect.cameras.right.rotation,
            p1: rect.cameras.left.projection,
            p2: rect.cameras.right.projection,
            q: rect.q,
            image_size: rect.image_size,
        }
    }

    pub fn to_rectification(&self) -> StereoRectification {
        StereoRectification {
            cameras: StereoPair::new(
                RectifyingProjection::new(self.r1, self.p1),
                RectifyingProjection::new(self.r2, self.p2),
            ),
            q: self.q,
            image_size: self.image_size,
        }
    }
}

fn default_assumed_depth() -> f64 {
    0.45
}

fn default_clip_to_image() -> bool {
    true
}

/// Tunables for a transfer run. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default)]
    pub board: CharucoBoardSpec,
    #[serde(default)]
    pub correspondence: CorrespondenceParams,
    #[serde(default)]
    pub warp: WarpParams,
    #[serde(default)]
    pub disparity: DisparityTransferParams,
    /// Scene depth assumed by point transfer, in calibration units.
    #[serde(default = "default_assumed_depth")]
    pub assumed_depth: f64,
    #[serde(default)]
    pub undistort: UndistortCriteria,
    /// Clip warped boxes to the rectified image size.
    #[serde(default = "default_clip_to_image")]
    pub clip_to_image: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            board: CharucoBoardSpec::default(),
            correspondence: CorrespondenceParams::default(),
            warp: WarpParams::default(),
            disparity: DisparityTransferParams::default(),
            assumed_depth: default_assumed_depth(),
            undistort: UndistortCriteria::default(),
            clip_to_image: default_clip_to_image(),
        }
    }
}

impl JsonDocument for TransferConfig {}

/// Per-camera marker detections, a JSON list of `{"id", "x", "y"}`.
impl JsonDocument for MarkerObservations {}

impl TransferConfig {
    /// Build a validated board from the config.
    pub fn build_board(&self) -> Result<CharucoBoard, StereoIoError> {
        Ok(CharucoBoard::new(self.board.clone())?)
    }
}

/// Both cameras, their extrinsics and optionally the rectification.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoRig {
    pub cameras: StereoPair<CameraModel>,
    pub extrinsics: StereoExtrinsics,
    pub rectification: Option<StereoRectification>,
}

impl StereoRig {
    /// Load a rig from the per-camera, stereo and (optional) rectification documents.
    pub fn load(
        left: impl AsRef<Path>,
        right: impl AsRef<Path>,
        stereo: impl AsRef<Path>,
        rectification: Option<&Path>,
    ) -> Result<Self, StereoIoError> {
        let cameras = StereoPair::new(
            CameraCalibrationDoc::load_json(left)?.to_camera_model()?,
            CameraCalibrationDoc::load_json(right)?.to_camera_model()?,
        );
        let extrinsics = StereoCalibrationDoc::load_json(stereo)?.to_extrinsics()?;
        let rectification = rectification
            .map(|p| RectificationDoc::load_json(p).map(|doc| doc.to_rectification()))
            .transpose()?;
        log::debug!(
            "loaded rig: baseline {:.4}, rectification {}",
            extrinsics.baseline(),
            if rectification.is_some() { "yes" } else { "no" }
        );
        Ok(Self {
            cameras,
            extrinsics,
            rectification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn camera_doc_reads_nested_and_flat_shapes() {
        let nested = r#"{
            "camera_matrix": [[1710.5, 0.0, 652.1], [0.0, 1705.2, 371.9], [0.0, 0.0, 1.0]],
            "dist_coefs": [[-0.09, 0.21, 0.0004, -0.0011, -0.3]],
            "rms": 0.31
        }"#;
        let flat = r#"{
            "camera_matrix": [1710.5, 0.0, 652.1, 0.0, 1705.2, 371.9, 0.0, 0.0, 1.0],
            "dist_coefs": [-0.09, 0.21, 0.0004, -0.0011, -0.3]
        }"#;
        let a: CameraCalibrationDoc = serde_json::from_str(nested).expect("nested");
        let b: CameraCalibrationDoc = serde_json::from_str(flat).expect("flat");
        assert_eq!(a.camera_matrix, b.camera_matrix);
        assert_eq!(a.dist_coefs, b.dist_coefs);
        assert_eq!(a.rms, Some(0.31));
        let cam = a.to_camera_model().expect("camera");
        assert_relative_eq!(cam.intrinsics.cx, 652.1);
        assert_relative_eq!(cam.intrinsics.fy, 1705.2);
    }

    #[test]
    fn camera_doc_writes_nested_rows() {
        let doc = CameraCalibrationDoc {
            camera_matrix: Matrix3::new(800.0, 0.0, 320.0, 0.0, 790.0, 240.0, 0.0, 0.0, 1.0),
            dist_coefs: vec![0.1, -0.2, 0.0, 0.0],
            rms: None,
        };
        let v = serde_json::to_value(&doc).expect("json");
        assert_eq!(v["camera_matrix"][1][2], 240.0);
        assert_eq!(v["dist_coefs"][0][1], -0.2);
        assert!(v.get("rms").is_none());
    }

    #[test]
    fn wrong_matrix_size_is_an_error() {
        let bad = r#"{"camera_matrix": [[1.0, 0.0], [0.0, 1.0]], "dist_coefs": []}"#;
        let err = serde_json::from_str::<CameraCalibrationDoc>(bad).unwrap_err();
        assert!(err.to_string().contains("3x3"), "{err}");
    }

    #[test]
    fn unsupported_distortion_is_reported() {
        let doc = CameraCalibrationDoc {
            camera_matrix: Matrix3::new(800.0, 0.0, 320.0, 0.0, 790.0, 240.0, 0.0, 0.0, 1.0),
            dist_coefs: vec![0.1, -0.2, 0.0],
            rms: None,
        };
        assert!(matches!(
            doc.to_camera_model(),
            Err(StereoIoError::Camera(CameraModelError::UnsupportedDistortion(3)))
        ));
    }

    #[test]
    fn stereo_doc_translation_is_a_column() {
        let ka = Intrinsics::new(800.0, 800.0, 320.0, 240.0).expect("ka");
        let ext = StereoExtrinsics::from_rt(
            Matrix3::identity(),
            Vector3::new(-0.06, 0.001, 0.002),
            &ka,
            &ka,
        )
        .expect("extrinsics")
        .with_rms(0.42);
        let doc = StereoCalibrationDoc::from_extrinsics(&ext);
        let v = serde_json::to_value(&doc).expect("json");
        assert_eq!(v["translation_vector"][0][0], -0.06);
        assert_eq!(v["translation_vector"].as_array().map(Vec::len), Some(3));
        assert_eq!(v["stereo_rms_reprojection_error"], 0.42);

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("stereo.json");
        doc.write_json(&path).expect("write");
        let back = StereoCalibrationDoc::load_json(&path)
            .expect("load")
            .to_extrinsics()
            .expect("extrinsics");
        assert_relative_eq!(back.rotation, ext.rotation, epsilon = 1e-12);
        assert_relative_eq!(back.translation, ext.translation, epsilon = 1e-12);
        assert_relative_eq!(back.fundamental, ext.fundamental, max_relative = 1e-12);
        assert_eq!(back.rms, Some(0.42));
    }

    #[test]
    fn rig_loads_from_separate_documents() {
        let ka = Intrinsics::new(800.0, 800.0, 320.0, 240.0).expect("ka");
        let kb = Intrinsics::new(810.0, 805.0, 330.0, 250.0).expect("kb");
        let left = CameraModel::pinhole(ka);
        let right = CameraModel::new(
            kb,
            Distortion::from_opencv(&[-0.1, 0.02, 0.0, 0.0, 0.0]).expect("dist"),
        );
        let t = Vector3::new(-0.1, 0.0, 0.0);
        let ext = StereoExtrinsics::from_rt(Matrix3::identity(), t, &ka, &kb).expect("extrinsics");
        let mut p = Matrix3x4::zeros();
        p.fixed_view_mut::<3, 3>(0, 0).copy_from(&ka.matrix());
        let rect = StereoRectification {
            cameras: StereoPair::new(
                RectifyingProjection::new(Matrix3::identity(), p),
                RectifyingProjection::new(Matrix3::identity(), p),
            ),
            q: Matrix4::identity(),
            image_size: ImageSize::new(640, 480),
        };

        let dir = tempdir().expect("tempdir");
        let path = |name: &str| dir.path().join(name);
        CameraCalibrationDoc::from_camera_model(&left, None)
            .write_json(path("left.json"))
            .expect("left");
        CameraCalibrationDoc::from_camera_model(&right, Some(0.3))
            .write_json(path("right.json"))
            .expect("right");
        StereoCalibrationDoc::from_extrinsics(&ext)
            .write_json(path("stereo.json"))
            .expect("stereo");
        RectificationDoc::from_rectification(&rect)
            .write_json(path("rect.json"))
            .expect("rect");

        let rig = StereoRig::load(
            path("left.json"),
            path("right.json"),
            path("stereo.json"),
            Some(path("rect.json").as_path()),
        )
        .expect("rig");
        assert_eq!(rig.cameras.left, left);
        assert_eq!(rig.cameras.right.distortion.to_opencv().len(), 5);
        assert_relative_eq!(rig.extrinsics.baseline(), 0.1, epsilon = 1e-12);
        assert_eq!(rig.rectification.map(|r| r.image_size), Some(rect.image_size));

        let without = StereoRig::load(
            path("left.json"),
            path("right.json"),
            path("stereo.json"),
            None,
        )
        .expect("rig");
        assert!(without.rectification.is_none());
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: TransferConfig =
            serde_json::from_str(r#"{"disparity": {"corner_window": 5}}"#).expect("config");
        assert_eq!(cfg.disparity.corner_window, 5);
        assert_eq!(cfg.disparity.min_valid_fraction, 0.05);
        assert_eq!(cfg.correspondence.min_shared_markers, 4);
        assert_eq!(cfg.warp.samples_x, 10);
        assert_eq!(cfg.warp.samples_y, 6);
        assert_eq!(cfg.assumed_depth, 0.45);
        assert!(cfg.clip_to_image);
        assert_eq!(cfg.build_board().expect("board").inner_corner_count(), 24);
    }
}
