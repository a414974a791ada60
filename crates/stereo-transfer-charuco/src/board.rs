//! Board specification and board-space layout for ChArUco targets.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

fn default_dictionary() -> String {
    "DICT_6X6_50".to_string()
}

/// Static ChArUco board specification.
///
/// `squares_x`/`squares_y` are **square counts** (not inner corner counts).
/// Lengths are in the unit the calibration should be expressed in (meters
/// for the default board).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharucoBoardSpec {
    pub squares_x: u32,
    pub squares_y: u32,
    pub square_length: f64,
    pub marker_length: f64,
    /// Predefined ArUco dictionary name, e.g. `DICT_6X6_50`.
    #[serde(default = "default_dictionary")]
    pub dictionary: String,
}

impl Default for CharucoBoardSpec {
    /// 7x5 squares, 29.8 mm squares with 20.8 mm markers from `DICT_6X6_50`.
    fn default() -> Self {
        Self {
            squares_x: 7,
            squares_y: 5,
            square_length: 0.0298,
            marker_length: 0.0208,
            dictionary: default_dictionary(),
        }
    }
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CharucoBoardError {
    #[error("squares_x and squares_y must be >= 2")]
    InvalidSize,
    #[error("square_length must be > 0")]
    InvalidSquareLength,
    #[error("marker_length must be in (0, square_length)")]
    InvalidMarkerLength,
    #[error("unknown dictionary name {0:?}")]
    UnknownDictionary(String),
    #[error("board needs {needed} markers, dictionary has {available}")]
    NotEnoughDictionaryCodes { needed: usize, available: usize },
}

/// Number of codes in a predefined dictionary, parsed from its `DICT_*_N` name.
fn dictionary_capacity(name: &str) -> Option<usize> {
    let rest = name.strip_prefix("DICT_")?;
    let (_, count) = rest.rsplit_once('_')?;
    count.parse().ok()
}

/// Validated board with layout helpers.
#[derive(Clone, Debug, PartialEq)]
pub struct CharucoBoard {
    spec: CharucoBoardSpec,
}

impl CharucoBoard {
    /// Validate and create a board from a spec.
    pub fn new(spec: CharucoBoardSpec) -> Result<Self, CharucoBoardError> {
        if spec.squares_x < 2 || spec.squares_y < 2 {
            return Err(CharucoBoardError::InvalidSize);
        }
        if !spec.square_length.is_finite() || spec.square_length <= 0.0 {
            return Err(CharucoBoardError::InvalidSquareLength);
        }
        if !spec.marker_length.is_finite()
            || spec.marker_length <= 0.0
            || spec.marker_length >= spec.square_length
        {
            return Err(CharucoBoardError::InvalidMarkerLength);
        }
        let available = dictionary_capacity(&spec.dictionary)
            .ok_or_else(|| CharucoBoardError::UnknownDictionary(spec.dictionary.clone()))?;
        let needed = (spec.squares_x as usize * spec.squares_y as usize) / 2;
        if available < needed {
            return Err(CharucoBoardError::NotEnoughDictionaryCodes { needed, available });
        }
        Ok(Self { spec })
    }

    #[inline]
    pub fn spec(&self) -> &CharucoBoardSpec {
        &self.spec
    }

    /// Inner corners per row.
    #[inline]
    pub fn inner_cols(&self) -> u32 {
        self.spec.squares_x - 1
    }

    /// Inner corners per column.
    #[inline]
    pub fn inner_rows(&self) -> u32 {
        self.spec.squares_y - 1
    }

    /// Total number of ChArUco corner ids on the board.
    #[inline]
    pub fn inner_corner_count(&self) -> usize {
        self.inner_cols() as usize * self.inner_rows() as usize
    }

    /// Markers placed on the white squares.
    #[inline]
    pub fn marker_count(&self) -> usize {
        (self.spec.squares_x as usize * self.spec.squares_y as usize) / 2
    }

    /// Board-space point of a ChArUco corner id.
    ///
    /// Ids run row-major over inner corners; the origin is the top-left board
    /// corner and the board lies in `z = 0`. Returns `None` for ids outside the board.
    pub fn object_point(&self, id: u32) -> Option<Point3<f64>> {
        let cols = self.inner_cols();
        if id as usize >= self.inner_corner_count() {
            return None;
        }
        let i = (id % cols) as f64 + 1.0;
        let j = (id / cols) as f64 + 1.0;
        Some(Point3::new(
            i * self.spec.square_length,
            j * self.spec.square_length,
            0.0,
        ))
    }

    /// Minimum corner count for a single view to count as "board found":
    /// strictly more than `floor(inner_corner_count * fraction)`.
    pub fn min_corners_for_view(&self, fraction: f64) -> usize {
        let threshold = (self.inner_corner_count() as f64 * fraction.clamp(0.0, 1.0)).floor();
        threshold as usize + 1
    }
}
