//! Exact fixed-point geometry types for board-scale coordinates
//!
//! All positions are stored as integer nanometers and all angles as integer
//! microdegrees, so that coordinate arithmetic is exact and serialization
//! round-trips losslessly. Floating point only enters for rotations that are
//! not multiples of 90 degrees.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// A length in integer nanometers
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Length(i64);

impl Length {
    pub const ZERO: Length = Length(0);

    /// Create a length from nanometers
    pub const fn from_nm(nm: i64) -> Self {
        Length(nm)
    }

    /// Create a length from millimeters (rounded to the nearest nanometer)
    pub fn from_mm(mm: f64) -> Self {
        Length((mm * 1_000_000.0).round() as i64)
    }

    /// Raw value in nanometers
    pub const fn to_nm(self) -> i64 {
        self.0
    }

    pub fn to_mm(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub const fn abs(self) -> Self {
        Length(self.0.abs())
    }

    /// Snap to the nearest multiple of `interval` (round half away from zero)
    pub fn snapped_to(self, interval: Length) -> Self {
        if interval.0 <= 0 {
            return self;
        }
        let i = interval.0;
        let rem = self.0.rem_euclid(i);
        if rem * 2 >= i {
            Length(self.0 + (i - rem))
        } else {
            Length(self.0 - rem)
        }
    }
}

impl Add for Length {
    type Output = Length;
    fn add(self, rhs: Length) -> Length {
        Length(self.0 + rhs.0)
    }
}

impl Sub for Length {
    type Output = Length;
    fn sub(self, rhs: Length) -> Length {
        Length(self.0 - rhs.0)
    }
}

impl Neg for Length {
    type Output = Length;
    fn neg(self) -> Length {
        Length(-self.0)
    }
}

impl Mul<i64> for Length {
    type Output = Length;
    fn mul(self, rhs: i64) -> Length {
        Length(self.0 * rhs)
    }
}

impl Div<i64> for Length {
    type Output = Length;
    fn div(self, rhs: i64) -> Length {
        Length(self.0 / rhs)
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Length) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Length {
    fn sub_assign(&mut self, rhs: Length) {
        self.0 -= rhs.0;
    }
}

/// A point on a schematic or board sheet
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Point {
    pub x: Length,
    pub y: Length,
}

impl Point {
    pub const ORIGIN: Point = Point {
        x: Length::ZERO,
        y: Length::ZERO,
    };

    pub const fn new(x: Length, y: Length) -> Self {
        Point { x, y }
    }

    pub fn from_mm(x: f64, y: f64) -> Self {
        Point {
            x: Length::from_mm(x),
            y: Length::from_mm(y),
        }
    }

    /// Midpoint of two points (used as the derived position of a net line)
    pub fn midpoint(self, other: Point) -> Point {
        Point {
            x: Length((self.x.0 + other.x.0) / 2),
            y: Length((self.y.0 + other.y.0) / 2),
        }
    }

    /// Squared euclidean distance, in nm^2 (i128 to avoid overflow)
    pub fn distance_squared(self, other: Point) -> i128 {
        let dx = (self.x.0 - other.x.0) as i128;
        let dy = (self.y.0 - other.y.0) as i128;
        dx * dx + dy * dy
    }

    /// Snap both coordinates to the given grid interval
    pub fn mapped_to_grid(self, interval: Length) -> Point {
        Point {
            x: self.x.snapped_to(interval),
            y: self.y.snapped_to(interval),
        }
    }

    /// Rotate counterclockwise around `center`.
    ///
    /// Multiples of 90 degrees are computed exactly; other angles go through
    /// f64 and are rounded to the nearest nanometer.
    pub fn rotated(self, angle: Angle, center: Point) -> Point {
        let dx = self.x.0 - center.x.0;
        let dy = self.y.0 - center.y.0;
        let (rx, ry) = match angle.to_microdeg() {
            0 => (dx, dy),
            90_000_000 => (-dy, dx),
            180_000_000 => (-dx, -dy),
            270_000_000 => (dy, -dx),
            _ => {
                let rad = angle.to_rad();
                let (sin, cos) = rad.sin_cos();
                let rx = cos * dx as f64 - sin * dy as f64;
                let ry = sin * dx as f64 + cos * dy as f64;
                (rx.round() as i64, ry.round() as i64)
            }
        };
        Point {
            x: Length(center.x.0 + rx),
            y: Length(center.y.0 + ry),
        }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// A rotation angle in integer microdegrees, normalized to `[0, 360)` degrees
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Angle(i32);

impl Angle {
    pub const ZERO: Angle = Angle(0);

    pub fn from_microdeg(microdeg: i32) -> Self {
        Angle(microdeg.rem_euclid(360_000_000))
    }

    pub fn from_deg(deg: f64) -> Self {
        Self::from_microdeg((deg * 1_000_000.0).round() as i32)
    }

    pub const fn deg_90() -> Self {
        Angle(90_000_000)
    }

    pub const fn deg_180() -> Self {
        Angle(180_000_000)
    }

    pub const fn deg_270() -> Self {
        Angle(270_000_000)
    }

    pub const fn to_microdeg(self) -> i32 {
        self.0
    }

    pub fn to_deg(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn to_rad(self) -> f64 {
        self.to_deg().to_radians()
    }

    pub fn is_multiple_of_90(self) -> bool {
        self.0 % 90_000_000 == 0
    }
}

impl Add for Angle {
    type Output = Angle;
    fn add(self, rhs: Angle) -> Angle {
        Angle((self.0 as i64 + rhs.0 as i64).rem_euclid(360_000_000) as i32)
    }
}

impl Neg for Angle {
    type Output = Angle;
    fn neg(self) -> Angle {
        Angle((-(self.0 as i64)).rem_euclid(360_000_000) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_snapping() {
        let grid = Length::from_mm(2.54);
        assert_eq!(Length::from_mm(2.6).snapped_to(grid), Length::from_mm(2.54));
        assert_eq!(Length::from_mm(3.9).snapped_to(grid), Length::from_mm(5.08));
        assert_eq!(Length::from_mm(-0.4).snapped_to(grid), Length::ZERO);
        assert_eq!(
            Length::from_mm(-1.5).snapped_to(grid),
            Length::from_mm(-2.54)
        );
        // zero interval leaves the value untouched
        assert_eq!(Length::from_nm(7).snapped_to(Length::ZERO), Length::from_nm(7));
    }

    #[test]
    fn test_point_midpoint() {
        let a = Point::from_mm(0.0, 0.0);
        let b = Point::from_mm(10.0, 4.0);
        assert_eq!(a.midpoint(b), Point::from_mm(5.0, 2.0));
    }

    #[test]
    fn test_rotation_exact_for_right_angles() {
        let center = Point::from_mm(10.0, 10.0);
        let p = Point::from_mm(12.0, 10.0);
        assert_eq!(p.rotated(Angle::deg_90(), center), Point::from_mm(10.0, 12.0));
        assert_eq!(p.rotated(Angle::deg_180(), center), Point::from_mm(8.0, 10.0));
        assert_eq!(p.rotated(Angle::deg_270(), center), Point::from_mm(10.0, 8.0));
        assert_eq!(p.rotated(Angle::ZERO, center), p);
    }

    #[test]
    fn test_angle_normalization() {
        assert_eq!(Angle::from_deg(-90.0), Angle::deg_270());
        assert_eq!(Angle::deg_270() + Angle::deg_180(), Angle::deg_90());
        assert_eq!(-Angle::deg_90(), Angle::deg_270());
    }

    #[test]
    fn test_grid_mapping() {
        let grid = Length::from_mm(1.27);
        let p = Point::from_mm(1.9, -0.4);
        assert_eq!(p.mapped_to_grid(grid), Point::from_mm(1.27, 0.0));
    }
}
