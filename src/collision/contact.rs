use glam::DVec3;

use crate::{
    core::part::{Part, PartId},
    utils::{allocator::Arena, fixed::Position},
};

use super::narrowphase::{intersect_parts, NarrowPhaseSettings};

/// Overlap found between two parts during one tick.
///
/// `exit_vector` points from `part_a` into `part_b`; moving `part_a` by
/// `-exit_vector` (or `part_b` by `+exit_vector`) separates them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colission {
    pub part_a: PartId,
    pub part_b: PartId,
    pub contact: Position,
    pub exit_vector: DVec3,
}

impl Colission {
    pub fn depth(&self) -> f64 {
        self.exit_vector.length()
    }

    /// Unit exit direction, zero for a degenerate overlap.
    pub fn normal(&self) -> DVec3 {
        self.exit_vector.normalize_or_zero()
    }

    /// The same overlap seen from `part_b`.
    pub fn flipped(&self) -> Colission {
        Colission {
            part_a: self.part_b,
            part_b: self.part_a,
            contact: self.contact,
            exit_vector: -self.exit_vector,
        }
    }
}

/// Narrow phase for one broad phase candidate pair. Stale ids yield `None`.
pub fn detect(
    parts: &Arena<Part>,
    part_a: PartId,
    part_b: PartId,
    settings: &NarrowPhaseSettings,
) -> Option<Colission> {
    let a = parts.get(part_a)?;
    let b = parts.get(part_b)?;
    intersect_parts(a, b, settings).map(|hit| Colission {
        part_a,
        part_b,
        contact: hit.contact_point,
        exit_vector: hit.exit_vector,
    })
}

/// Colissions of the last tick, split by the layers they came from.
#[derive(Debug, Clone, Default)]
pub struct ColissionSet {
    /// Between two free parts.
    pub free: Vec<Colission>,
    /// Between a free part (`part_a`) and a terrain part (`part_b`).
    pub terrain: Vec<Colission>,
}

impl ColissionSet {
    pub fn len(&self) -> usize {
        self.free.len() + self.terrain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty() && self.terrain.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Colission> + '_ {
        self.free.iter().chain(self.terrain.iter())
    }

    pub fn clear(&mut self) {
        self.free.clear();
        self.terrain.clear();
    }

    /// Colissions involving `part`, oriented so that `part` is `part_a`.
    pub fn involving(&self, part: PartId) -> impl Iterator<Item = Colission> + '_ {
        self.iter().filter_map(move |c| {
            if c.part_a == part {
                Some(*c)
            } else if c.part_b == part {
                Some(c.flipped())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{shape::Shape, types::{GlobalCFrame, PartProperties}};

    fn cube(parts: &mut Arena<Part>, x: f64) -> PartId {
        parts.insert_with(|id| {
            let mut part = Part::new(
                Shape::cuboid(1.0, 1.0, 1.0),
                GlobalCFrame::from_position(Position::new(x, 0.0, 0.0)),
                PartProperties::default(),
            );
            part.id = id;
            part
        })
    }

    #[test]
    fn detection_is_antisymmetric() {
        let mut parts = Arena::new();
        let a = cube(&mut parts, 0.0);
        let b = cube(&mut parts, 0.8);
        let settings = NarrowPhaseSettings::default();
        let ab = detect(&parts, a, b, &settings).expect("overlap");
        let ba = detect(&parts, b, a, &settings).expect("overlap");
        assert!((ab.exit_vector + ba.exit_vector).length() < 1e-6);
        assert!((ab.depth() - 0.2).abs() < 1e-6);
        assert!(ab.normal().x > 0.999);
    }

    #[test]
    fn set_orients_colissions_towards_the_asked_part() {
        let mut parts = Arena::new();
        let a = cube(&mut parts, 0.0);
        let b = cube(&mut parts, 0.9);
        let mut set = ColissionSet::default();
        set.free
            .extend(detect(&parts, a, b, &NarrowPhaseSettings::default()));
        let seen_from_b: Vec<_> = set.involving(b).collect();
        assert_eq!(seen_from_b.len(), 1);
        assert_eq!(seen_from_b[0].part_a, b);
        assert!(seen_from_b[0].exit_vector.x < 0.0);
    }
}
