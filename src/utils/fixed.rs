//! Fixed-point world coordinates.
//!
//! World positions are stored as integers with [`FRACTIONAL_BITS`] bits of
//! fraction, giving a uniform resolution of about 2.3e-10 units over a range of
//! roughly ±2.1e9 units. Differences between positions are exact and are only
//! converted to `f64` once they are small and local, which is where all the
//! floating point physics happens.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

/// Number of fractional bits in a [`FixedCoordinate`].
pub const FRACTIONAL_BITS: u32 = 32;

const ONE_RAW: i64 = 1 << FRACTIONAL_BITS;
const SCALE: f64 = ONE_RAW as f64;

/// A deterministic fixed-point scalar used for world-space coordinates.
///
/// Arithmetic saturates at the ends of the range instead of wrapping.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixedCoordinate(i64);

impl FixedCoordinate {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(ONE_RAW);
    pub const MIN: Self = Self(i64::MIN);
    pub const MAX: Self = Self(i64::MAX);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub const fn from_int(value: i32) -> Self {
        Self((value as i64) << FRACTIONAL_BITS)
    }

    /// Rounds to the nearest representable coordinate.
    pub fn from_f64(value: f64) -> Self {
        Self((value * SCALE).round() as i64)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE
    }

    pub fn min(self, other: Self) -> Self {
        Ord::min(self, other)
    }

    pub fn max(self, other: Self) -> Self {
        Ord::max(self, other)
    }

    /// Exact midpoint, rounded toward negative infinity.
    pub fn midpoint(self, other: Self) -> Self {
        Self((self.0 >> 1) + (other.0 >> 1) + (self.0 & other.0 & 1))
    }
}

impl fmt::Debug for FixedCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl fmt::Display for FixedCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl Add for FixedCoordinate {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for FixedCoordinate {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for FixedCoordinate {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl AddAssign for FixedCoordinate {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl SubAssign for FixedCoordinate {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

/// A point in world space.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: FixedCoordinate,
    pub y: FixedCoordinate,
    pub z: FixedCoordinate,
}

impl Position {
    pub const ORIGIN: Self = Self {
        x: FixedCoordinate::ZERO,
        y: FixedCoordinate::ZERO,
        z: FixedCoordinate::ZERO,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: FixedCoordinate::from_f64(x),
            y: FixedCoordinate::from_f64(y),
            z: FixedCoordinate::from_f64(z),
        }
    }

    pub fn from_fixed(x: FixedCoordinate, y: FixedCoordinate, z: FixedCoordinate) -> Self {
        Self { x, y, z }
    }

    pub fn from_dvec3(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    /// Lossy conversion for consumers that only need rendering precision.
    pub fn to_dvec3(self) -> DVec3 {
        DVec3::new(self.x.to_f64(), self.y.to_f64(), self.z.to_f64())
    }

    pub fn min(self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            z: self.z.min(other.z),
        }
    }

    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: self.x.midpoint(other.x),
            y: self.y.midpoint(other.y),
            z: self.z.midpoint(other.z),
        }
    }

    /// Component-wise `self <= other`.
    pub fn all_le(self, other: Self) -> bool {
        self.x <= other.x && self.y <= other.y && self.z <= other.z
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The exact difference is taken in fixed point before converting.
impl Sub for Position {
    type Output = DVec3;

    fn sub(self, rhs: Self) -> DVec3 {
        DVec3::new(
            (self.x - rhs.x).to_f64(),
            (self.y - rhs.y).to_f64(),
            (self.z - rhs.z).to_f64(),
        )
    }
}

impl Add<DVec3> for Position {
    type Output = Position;

    fn add(self, rhs: DVec3) -> Position {
        Position {
            x: self.x + FixedCoordinate::from_f64(rhs.x),
            y: self.y + FixedCoordinate::from_f64(rhs.y),
            z: self.z + FixedCoordinate::from_f64(rhs.z),
        }
    }
}

impl Sub<DVec3> for Position {
    type Output = Position;

    fn sub(self, rhs: DVec3) -> Position {
        self + (-rhs)
    }
}

impl AddAssign<DVec3> for Position {
    fn add_assign(&mut self, rhs: DVec3) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_saturates_at_the_edge_of_the_world() {
        assert_eq!(FixedCoordinate::MAX + FixedCoordinate::ONE, FixedCoordinate::MAX);
        assert_eq!(FixedCoordinate::MIN - FixedCoordinate::ONE, FixedCoordinate::MIN);
        assert_eq!(-FixedCoordinate::MIN, FixedCoordinate::MAX);

        let mut edge = FixedCoordinate::MAX;
        edge += FixedCoordinate::ONE;
        assert_eq!(edge, FixedCoordinate::MAX);
        edge -= FixedCoordinate::MAX;
        edge -= FixedCoordinate::MAX;
        edge -= FixedCoordinate::MAX;
        assert_eq!(edge, FixedCoordinate::MIN);

        let far = Position::new(2.1e9, -2.1e9, 0.0);
        let pushed = far + DVec3::new(1.0e9, -1.0e9, 0.0);
        assert_eq!(pushed.x, FixedCoordinate::MAX);
        assert_eq!(pushed.y, FixedCoordinate::MIN);
        let back = pushed - DVec3::new(1.0e9, 0.0, 0.0);
        assert_eq!(back.x, FixedCoordinate::MAX - FixedCoordinate::from_f64(1.0e9));
        assert_eq!(back.y, FixedCoordinate::MIN);
    }

    #[test]
    fn far_positions_keep_small_offsets() {
        let far = Position::new(1.0e9, -2.0e9, 5.0e8);
        let nudged = far + DVec3::new(1.0e-6, 0.0, -1.0e-6);
        let delta = nudged - far;
        assert!((delta.x - 1.0e-6).abs() < 1e-9);
        assert!((delta.z + 1.0e-6).abs() < 1e-9);
        assert_eq!(delta.y, 0.0);
    }

    #[test]
    fn fixed_addition_is_exact_and_associative() {
        let a = FixedCoordinate::from_f64(0.1);
        let b = FixedCoordinate::from_f64(0.2);
        let c = FixedCoordinate::from_f64(0.3);
        assert_eq!((a + b) + c, a + (b + c));
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn midpoint_is_between_operands() {
        let a = FixedCoordinate::from_int(-3);
        let b = FixedCoordinate::from_int(5);
        assert_eq!(a.midpoint(b), FixedCoordinate::from_int(1));
        let p = Position::new(0.0, 2.0, 4.0).midpoint(Position::new(2.0, 2.0, 0.0));
        assert_eq!(p, Position::new(1.0, 2.0, 2.0));
    }
}
