//! 2D vector math for joint positions and arm boundaries
//!
//! All coordinates are pixel coordinates in an image domain with the origin
//! in the upper left corner and y growing downwards.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Vectors shorter than this are treated as zero length
const MIN_LENGTH: f32 = 0.0001;

/// A point (or vector) in 2D pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(self, other: Point) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 3D cross product
    #[inline]
    pub fn cross(self, other: Point) -> f32 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance_to(self, other: Point) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or zero if the vector is degenerate
    #[inline]
    pub fn normalize(self) -> Point {
        let len = self.length();
        if len > MIN_LENGTH {
            Point::new(self.x / len, self.y / len)
        } else {
            Point::ZERO
        }
    }

    /// Normal on the left side when walking along the vector in a y-down image
    #[inline]
    pub fn left_normal(self) -> Point {
        Point::new(self.y, -self.x)
    }

    /// Normal on the right side when walking along the vector in a y-down image
    #[inline]
    pub fn right_normal(self) -> Point {
        Point::new(-self.y, self.x)
    }

    /// Linear interpolation, `t = 0` gives `self`, `t = 1` gives `other`
    #[inline]
    pub fn lerp(self, other: Point, t: f32) -> Point {
        self + (other - self) * t
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Signed angle in radians rotating `self` onto `other`
    pub fn angle_to(self, other: Point) -> f32 {
        self.cross(other).atan2(self.dot(other))
    }

    /// Rotate counter-clockwise (in a y-up frame) by `angle` radians
    pub fn rotate(self, angle: f32) -> Point {
        let (sin, cos) = angle.sin_cos();
        Point::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

impl Add for Point {
    type Output = Point;

    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    #[inline]
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;

    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    #[inline]
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Point;

    #[inline]
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Round a coordinate to the nearest cell index by adding one half and
/// truncating. Returns `None` when the result falls outside `0..limit`
/// or the coordinate is not finite.
#[inline]
pub fn round_coord(v: f32, limit: usize) -> Option<usize> {
    let r = v + 0.5;
    // Negated comparison so NaN is rejected too
    if !(r >= 0.0) || r >= limit as f32 {
        return None;
    }
    Some(r as usize)
}
