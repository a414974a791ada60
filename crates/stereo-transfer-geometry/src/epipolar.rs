//! Epipolar lines for visual and numeric calibration checks.

use std::fmt;
use std::marker::PhantomData;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use stereo_transfer_core::{ImageSize, PixelPoint, PixelSpace, RawSpace, StereoExtrinsics};

/// Below this magnitude of `b` the line is treated as vertical.
pub const VERTICAL_EPS: f64 = 1e-9;

/// Line `a x + b y + c = 0` in the pixel space `S`, with `a^2 + b^2 = 1`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EpipolarLine<S: PixelSpace> {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S: PixelSpace> fmt::Debug for EpipolarLine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{:.6} x + {:.6} y + {:.3} = 0]",
            S::NAME,
            self.a,
            self.b,
            self.c
        )
    }
}

impl<S: PixelSpace> EpipolarLine<S> {
    /// Normalize raw coefficients. `None` when `a` and `b` both vanish.
    pub fn from_coefficients(a: f64, b: f64, c: f64) -> Option<Self> {
        let n = a.hypot(b);
        if !(n.is_finite() && n > f64::EPSILON && c.is_finite()) {
            return None;
        }
        Some(Self {
            a: a / n,
            b: b / n,
            c: c / n,
            space: PhantomData,
        })
    }

    #[inline]
    pub fn is_vertical(&self) -> bool {
        self.b.abs() < VERTICAL_EPS
    }

    /// `y` on the line at column `x`; `None` for (near-)vertical lines.
    pub fn y_at(&self, x: f64) -> Option<f64> {
        if self.is_vertical() {
            return None;
        }
        Some(-(self.a * x + self.c) / self.b)
    }

    /// `x` on the line at row `y`; `None` for (near-)horizontal lines.
    pub fn x_at(&self, y: f64) -> Option<f64> {
        if self.a.abs() < VERTICAL_EPS {
            return None;
        }
        Some(-(self.b * y + self.c) / self.a)
    }

    /// Perpendicular pixel distance of `p` to the line.
    #[inline]
    pub fn distance(&self, p: &PixelPoint<S>) -> f64 {
        (self.a * p.x + self.b * p.y + self.c).abs()
    }

    /// End points for drawing the line across an image.
    ///
    /// Regular lines are evaluated at `x = 0` and `x = width - 1`; vertical
    /// lines run from `y = 0` to `y = height - 1` at `x = -c / a`.
    pub fn segment_across(&self, size: ImageSize) -> (PixelPoint<S>, PixelPoint<S>) {
        let x_last = size.width.saturating_sub(1) as f64;
        let y_last = size.height.saturating_sub(1) as f64;
        match (self.y_at(0.0), self.y_at(x_last)) {
            (Some(y0), Some(y1)) => (PixelPoint::new(0.0, y0), PixelPoint::new(x_last, y1)),
            _ => {
                let x = -self.c / self.a;
                (PixelPoint::new(x, 0.0), PixelPoint::new(x, y_last))
            }
        }
    }
}

/// Epipolar line in camera B induced by pixel `pixel` of camera A: `l = F x_a`.
///
/// `fundamental` must satisfy `x_b^T F x_a = 0`. Returns `None` when the
/// pixel sits on the epipole and no line is defined.
pub fn epipolar_line<A: RawSpace>(
    pixel: PixelPoint<A>,
    fundamental: &Matrix3<f64>,
) -> Option<EpipolarLine<A::Counterpart>> {
    let l = fundamental * Vector3::new(pixel.x, pixel.y, 1.0);
    EpipolarLine::from_coefficients(l.x, l.y, l.z)
}

/// [`epipolar_line`] using the fundamental matrix of `extrinsics`.
pub fn epipolar_line_from<A: RawSpace>(
    pixel: PixelPoint<A>,
    extrinsics: &StereoExtrinsics,
) -> Option<EpipolarLine<A::Counterpart>> {
    epipolar_line(pixel, &extrinsics.fundamental)
}

/// Mean distance of matched B pixels to the epipolar lines of their A pixels.
///
/// `None` for empty input or when a line is undefined.
pub fn mean_epipolar_distance<A: RawSpace>(
    pairs: &[(PixelPoint<A>, PixelPoint<A::Counterpart>)],
    fundamental: &Matrix3<f64>,
) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for (pa, pb) in pairs {
        total += epipolar_line(*pa, fundamental)?.distance(pb);
    }
    Some(total / pairs.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stereo_transfer_core::{RawLeft, RawRight};

    #[test]
    fn coefficients_are_normalized() {
        let l = EpipolarLine::<RawRight>::from_coefficients(3.0, 4.0, 10.0).expect("line");
        assert_relative_eq!(l.a * l.a + l.b * l.b, 1.0, epsilon = 1e-12);
        assert_relative_eq!(l.c, 2.0, epsilon = 1e-12);
        assert!(EpipolarLine::<RawRight>::from_coefficients(0.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn slanted_line_round_trips_between_rows_and_columns() {
        let l = EpipolarLine::<RawRight>::from_coefficients(1.0, -2.0, 40.0).expect("line");
        let x = l.x_at(70.0).expect("x");
        assert_relative_eq!(x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(l.y_at(x).expect("y"), 70.0, epsilon = 1e-9);
    }

    #[test]
    fn vertical_line_has_no_y_but_a_segment() {
        let l = EpipolarLine::<RawRight>::from_coefficients(2.0, 0.0, -200.0).expect("line");
        assert!(l.is_vertical());
        assert_eq!(l.y_at(5.0), None);
        assert_relative_eq!(l.x_at(5.0).expect("x"), 100.0, epsilon = 1e-12);
        assert_relative_eq!(l.x_at(-40.0).expect("x"), 100.0, epsilon = 1e-12);
        let (p0, p1) = l.segment_across(ImageSize::new(640, 480));
        assert_relative_eq!(p0.x, 100.0);
        assert_relative_eq!(p1.x, 100.0);
        assert_relative_eq!(p0.y, 0.0);
        assert_relative_eq!(p1.y, 479.0);
    }

    #[test]
    fn horizontal_rig_gives_horizontal_lines() {
        // Pure x translation, identical cameras: F = [[0,0,0],[0,0,-t],[0,t,0]] up to scale.
        let f = Matrix3::new(0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0);
        let l = epipolar_line(PixelPoint::<RawLeft>::new(300.0, 123.0), &f).expect("line");
        assert_relative_eq!(l.y_at(0.0).expect("y"), 123.0, epsilon = 1e-9);
        assert_relative_eq!(l.y_at(900.0).expect("y"), 123.0, epsilon = 1e-9);
        assert_eq!(l.x_at(123.0), None);
        let (p0, p1) = l.segment_across(ImageSize::new(1280, 720));
        assert_relative_eq!(p0.x, 0.0);
        assert_relative_eq!(p1.x, 1279.0);
        assert_relative_eq!(l.distance(&PixelPoint::new(17.0, 126.0)), 3.0, epsilon = 1e-9);
    }
}
