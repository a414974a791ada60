//! Camera roles and coordinate-space-tagged pixel geometry.
//!
//! Every point and box carries the pixel space it lives in as a type
//! parameter. Moving a value from one space to another is only possible
//! through a transfer operation; there is no implicit conversion.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Which camera of the rig an observation belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraRole {
    /// Camera A; the disparity reference view after rectification.
    Left,
    /// Camera B.
    Right,
}

impl CameraRole {
    /// The other camera of the pair.
    #[inline]
    pub fn other(self) -> Self {
        match self {
            CameraRole::Left => CameraRole::Right,
            CameraRole::Right => CameraRole::Left,
        }
    }
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraRole::Left => f.write_str("left"),
            CameraRole::Right => f.write_str("right"),
        }
    }
}

/// Two values, one per camera, indexed by [`CameraRole`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StereoPair<T> {
    pub left: T,
    pub right: T,
}

impl<T> StereoPair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn get(&self, role: CameraRole) -> &T {
        match role {
            CameraRole::Left => &self.left,
            CameraRole::Right => &self.right,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, role: CameraRole) -> &mut T {
        match role {
            CameraRole::Left => &mut self.left,
            CameraRole::Right => &mut self.right,
        }
    }

    pub fn as_ref(&self) -> StereoPair<&T> {
        StereoPair {
            left: &self.left,
            right: &self.right,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> StereoPair<U> {
        StereoPair {
            left: f(self.left),
            right: f(self.right),
        }
    }

    /// Swap the roles of the two values.
    pub fn swapped(self) -> Self {
        Self {
            left: self.right,
            right: self.left,
        }
    }
}

impl<T> Index<CameraRole> for StereoPair<T> {
    type Output = T;

    fn index(&self, role: CameraRole) -> &T {
        self.get(role)
    }
}

impl<T> IndexMut<CameraRole> for StereoPair<T> {
    fn index_mut(&mut self, role: CameraRole) -> &mut T {
        self.get_mut(role)
    }
}

/// Marker trait for a named pixel coordinate space.
pub trait PixelSpace: Copy + fmt::Debug + Eq + Send + Sync + 'static {
    /// Camera the space belongs to.
    const ROLE: CameraRole;
    /// `true` for the rectified image of the camera, `false` for the raw (distorted) one.
    const RECTIFIED: bool;
    /// Human-readable name used in logs and reports.
    const NAME: &'static str;
}

/// Raw (distorted) pixel space of one camera.
pub trait RawSpace: PixelSpace {
    /// Rectified space of the same camera.
    type Rectified: RectifiedSpace<Raw = Self>;
    /// Raw space of the other camera.
    type Counterpart: RawSpace<Counterpart = Self>;
}

/// Rectified pixel space of one camera.
pub trait RectifiedSpace: PixelSpace {
    /// Raw space of the same camera.
    type Raw: RawSpace<Rectified = Self>;
}

macro_rules! pixel_space {
    ($(#[$meta:meta])* $name:ident, $role:expr, $rectified:expr, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {}

        impl PixelSpace for $name {
            const ROLE: CameraRole = $role;
            const RECTIFIED: bool = $rectified;
            const NAME: &'static str = $label;
        }
    };
}

pixel_space!(
    /// Raw image of the left camera (camera A).
    RawLeft,
    CameraRole::Left,
    false,
    "raw_left"
);
pixel_space!(
    /// Raw image of the right camera (camera B).
    RawRight,
    CameraRole::Right,
    false,
    "raw_right"
);
pixel_space!(
    /// Rectified image of the left camera.
    RectifiedLeft,
    CameraRole::Left,
    true,
    "rectified_left"
);
pixel_space!(
    /// Rectified image of the right camera.
    RectifiedRight,
    CameraRole::Right,
    true,
    "rectified_right"
);

impl RawSpace for RawLeft {
    type Rectified = RectifiedLeft;
    type Counterpart = RawRight;
}

impl RawSpace for RawRight {
    type Rectified = RectifiedRight;
    type Counterpart = RawLeft;
}

impl RectifiedSpace for RectifiedLeft {
    type Raw = RawLeft;
}

impl RectifiedSpace for RectifiedRight {
    type Raw = RawRight;
}

/// Sub-pixel image coordinate in the space `S`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PixelPoint<S: PixelSpace> {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S: PixelSpace> PixelPoint<S> {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    #[inline]
    pub fn from_point(p: Point2<f64>) -> Self {
        Self::new(p.x, p.y)
    }

    /// Untyped coordinates, for feeding numeric routines.
    #[inline]
    pub fn coords(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another point in the same space.
    #[inline]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl<S: PixelSpace> fmt::Debug for PixelPoint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:.3}, {:.3})", S::NAME, self.x, self.y)
    }
}

/// Axis-aligned box `(x, y, width, height)` in the space `S`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct BBox<S: PixelSpace> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S: PixelSpace> BBox<S> {
    #[inline]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    /// Box spanning `[x0, x1] x [y0, y1]`.
    #[inline]
    pub fn from_extents(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    #[inline]
    pub fn x_max(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn y_max(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// `true` when the box has non-positive width or height, or any non-finite field.
    pub fn is_degenerate(&self) -> bool {
        !(self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    /// Corners in the order top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [PixelPoint<S>; 4] {
        [
            PixelPoint::new(self.x, self.y),
            PixelPoint::new(self.x_max(), self.y),
            PixelPoint::new(self.x, self.y_max()),
            PixelPoint::new(self.x_max(), self.y_max()),
        ]
    }

    pub fn contains(&self, p: &PixelPoint<S>) -> bool {
        p.x >= self.x && p.x <= self.x_max() && p.y >= self.y && p.y <= self.y_max()
    }
}

impl<S: PixelSpace> fmt::Debug for BBox<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[x={:.2}, y={:.2}, w={:.2}, h={:.2}]",
            S::NAME,
            self.x,
            self.y,
            self.width,
            self.height
        )
    }
}

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
