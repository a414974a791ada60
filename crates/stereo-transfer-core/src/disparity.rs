//! Dense disparity map of one rectified frame pair.

use serde::{Deserialize, Serialize};

/// Fixed-point scale of disparities produced by semi-global block matching.
pub const SGBM_DISPARITY_SCALE: f32 = 16.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DisparityMapError {
    #[error("disparity buffer has {got} entries, expected {expected} ({width}x{height})")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },
    #[error("disparity map dimensions must be non-zero")]
    Empty,
}

/// Half-open integer pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelRect {
    #[inline]
    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }
}

/// Valid-entry statistics of a region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionStats {
    pub total: usize,
    pub valid: usize,
    /// Median of valid entries, `None` when there are none.
    pub median: Option<f64>,
}

impl RegionStats {
    pub fn valid_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.valid as f64 / self.total as f64
        }
    }
}

/// Per-pixel horizontal offsets between the rectified left and right views.
///
/// Row-major, invalid entries stored as NaN. A map belongs to exactly one
/// frame pair; `frame_index` lets callers check that.
#[derive(Clone, Debug, PartialEq)]
pub struct DisparityMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
    frame_index: Option<u64>,
}

impl DisparityMap {
    /// Wrap float disparities. Non-finite and non-positive entries are marked invalid.
    pub fn new(width: usize, height: usize, mut data: Vec<f32>) -> Result<Self, DisparityMapError> {
        check_size(width, height, data.len())?;
        for d in data.iter_mut() {
            if !(d.is_finite() && *d > 0.0) {
                *d = f32::NAN;
            }
        }
        Ok(Self {
            width,
            height,
            data,
            frame_index: None,
        })
    }

    /// Decode 16.4 fixed-point block-matching output (`raw / 16`, `<= 0` invalid).
    pub fn from_fixed_point(
        width: usize,
        height: usize,
        raw: &[i16],
    ) -> Result<Self, DisparityMapError> {
        check_size(width, height, raw.len())?;
        let data = raw
            .iter()
            .map(|&v| {
                if v > 0 {
                    v as f32 / SGBM_DISPARITY_SCALE
                } else {
                    f32::NAN
                }
            })
            .collect();
        Ok(Self {
            width,
            height,
            data,
            frame_index: None,
        })
    }

    /// Tag the map with the index of the frame pair it was computed from.
    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = Some(frame_index);
        self
    }

    #[inline]
    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Valid disparity at `(x, y)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let d = self.data[y * self.width + x];
        (!d.is_nan()).then_some(d)
    }

    /// Clamp a half-open rectangle given in signed pixel coordinates to the map.
    ///
    /// Returns `None` when nothing of it remains.
    pub fn clamp_rect(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> Option<PixelRect> {
        let clamp = |v: i64, hi: usize| v.clamp(0, hi as i64) as usize;
        let rect = PixelRect {
            x0: clamp(x0, self.width),
            y0: clamp(y0, self.height),
            x1: clamp(x1, self.width),
            y1: clamp(y1, self.height),
        };
        (rect.x1 > rect.x0 && rect.y1 > rect.y0).then_some(rect)
    }

    /// Valid entries inside `rect` (which must lie within the map).
    pub fn valid_values(&self, rect: &PixelRect) -> Vec<f32> {
        let x1 = rect.x1.min(self.width);
        let y1 = rect.y1.min(self.height);
        let mut out = Vec::with_capacity(rect.area());
        for y in rect.y0..y1 {
            let row = &self.data[y * self.width..(y + 1) * self.width];
            out.extend(row[rect.x0.min(x1)..x1].iter().copied().filter(|d| !d.is_nan()));
        }
        out
    }

    /// Count and median of valid entries inside `rect`.
    pub fn region_stats(&self, rect: &PixelRect) -> RegionStats {
        let mut values = self.valid_values(rect);
        RegionStats {
            total: rect.area(),
            valid: values.len(),
            median: median(&mut values),
        }
    }
}

fn check_size(width: usize, height: usize, got: usize) -> Result<(), DisparityMapError> {
    if width == 0 || height == 0 {
        return Err(DisparityMapError::Empty);
    }
    let expected = width * height;
    if got != expected {
        return Err(DisparityMapError::SizeMismatch {
            width,
            height,
            expected,
            got,
        });
    }
    Ok(())
}

/// Median of NaN-free values; even counts average the two middle entries.
pub fn median(values: &mut [f32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f32::total_cmp);
    let n = values.len();
    let mid = n / 2;
    if n % 2 == 1 {
        Some(values[mid] as f64)
    } else {
        Some((values[mid - 1] as f64 + values[mid] as f64) * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_point_decoding_marks_non_positive_invalid() {
        let map = DisparityMap::from_fixed_point(3, 1, &[160, 0, -16]).expect("map");
        assert_eq!(map.get(0, 0), Some(10.0));
        assert_eq!(map.get(1, 0), None);
        assert_eq!(map.get(2, 0), None);
        assert_eq!(map.get(3, 0), None);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let err = DisparityMap::new(4, 4, vec![1.0; 15]).unwrap_err();
        assert!(matches!(err, DisparityMapError::SizeMismatch { got: 15, .. }));
        assert_eq!(DisparityMap::new(0, 4, vec![]), Err(DisparityMapError::Empty));
    }

    #[test]
    fn clamp_rect_rejects_regions_outside_map() {
        let map = DisparityMap::new(10, 8, vec![1.0; 80]).expect("map");
        assert_eq!(
            map.clamp_rect(-5, -5, 3, 4),
            Some(PixelRect {
                x0: 0,
                y0: 0,
                x1: 3,
                y1: 4
            })
        );
        assert_eq!(map.clamp_rect(12, 0, 20, 8), None);
        assert_eq!(map.clamp_rect(2, 2, 2, 6), None);
    }

    #[test]
    fn region_stats_ignore_invalid_entries() {
        let data = vec![4.0, f32::NAN, 2.0, 0.0, 8.0, 6.0];
        let map = DisparityMap::new(3, 2, data).expect("map");
        let stats = map.region_stats(&PixelRect {
            x0: 0,
            y0: 0,
            x1: 3,
            y1: 2,
        });
        assert_eq!(stats.total, 6);
        assert_eq!(stats.valid, 4);
        assert_eq!(stats.median, Some(5.0));
        assert!((stats.valid_fraction() - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn median_handles_odd_and_empty() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut []), None);
    }
}
