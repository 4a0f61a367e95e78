//! Axis-aligned bounding volumes in fixed-point world space.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::fixed::Position;

/// Axis-aligned box; `min <= max` component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Position,
    pub max: Position,
}

impl Bounds {
    pub fn new(min: Position, max: Position) -> Self {
        debug_assert!(min.all_le(max), "inverted bounds {min:?} > {max:?}");
        Self { min, max }
    }

    pub fn from_point(point: Position) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Box centred on `center` reaching `half_extents` in every direction.
    pub fn around(center: Position, half_extents: DVec3) -> Self {
        let half = half_extents.abs();
        Self::new(center - half, center + half)
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.min.all_le(other.min) && other.max.all_le(self.max)
    }

    pub fn contains_point(&self, point: Position) -> bool {
        self.min.all_le(point) && point.all_le(self.max)
    }

    pub fn dimensions(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Position {
        self.min.midpoint(self.max)
    }

    pub fn expanded(&self, margin: f64) -> Bounds {
        let m = DVec3::splat(margin.max(0.0));
        Bounds::new(self.min - m, self.max + m)
    }

    /// Sum of the three edge lengths; a cheap monotone proxy for surface area.
    pub fn combination_cost(&self) -> f64 {
        let d = self.dimensions();
        d.x + d.y + d.z
    }

    /// Entry parameter of `ray` into this box, if it hits at `t >= 0`.
    pub fn intersects_ray(&self, ray: &Ray) -> Option<f64> {
        let lo = self.min - ray.origin;
        let hi = self.max - ray.origin;
        let mut t_enter = 0.0_f64;
        let mut t_exit = f64::INFINITY;

        for axis in 0..3 {
            let d = ray.direction[axis];
            if d.abs() < 1e-300 {
                if lo[axis] > 0.0 || hi[axis] < 0.0 {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (mut t0, mut t1) = (lo[axis] * inv, hi[axis] * inv);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }
        Some(t_enter)
    }
}

/// Half-line in world space. `direction` need not be normalised; ray
/// parameters are expressed in multiples of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Position,
    pub direction: DVec3,
}

impl Ray {
    pub fn new(origin: Position, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    pub fn point_at(&self, t: f64) -> Position {
        self.origin + self.direction * t
    }
}
