//! Tick-local collector of forces, impulses and position corrections.
//!
//! The shared phase of a tick may not touch the physicals, so every stage
//! writes its effects here, keyed by the motorized root of the tree it acts
//! on. Impulses are also folded into a velocity overlay so later stages of
//! the same tick observe them. The exclusive phase applies the whole lot.

use std::collections::HashMap;

use glam::{DMat3, DVec3};

use crate::{
    core::physical::{root_and_center, Physical, PhysicalId},
    utils::{allocator::Arena, fixed::Position, math::angular_velocity_to_quat},
};

/// Everything a tick wants to do to one motorized tree.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyDelta {
    /// Force through the centre of mass.
    pub force: DVec3,
    /// Moment about the centre of mass.
    pub moment: DVec3,
    /// Velocity change already caused by impulses this tick.
    pub velocity: DVec3,
    pub angular_velocity: DVec3,
    /// Direct displacement of the centre of mass.
    pub translation: DVec3,
    /// Direct rotation about the centre of mass, as a rotation vector.
    pub rotation: DVec3,
}

impl BodyDelta {
    fn merge(&mut self, other: &BodyDelta) {
        self.force += other.force;
        self.moment += other.moment;
        self.velocity += other.velocity;
        self.angular_velocity += other.angular_velocity;
        self.translation += other.translation;
        self.rotation += other.rotation;
    }
}

/// Response data of one tree root, resolved once per call.
struct Target {
    root: PhysicalId,
    center: Position,
    inverse_mass: f64,
    inverse_inertia: DMat3,
}

fn resolve(physicals: &Arena<Physical>, id: PhysicalId) -> Option<Target> {
    let (root, center) = root_and_center(physicals, id)?;
    let motorized = root.as_motorized()?;
    if motorized.anchored {
        return None;
    }
    Some(Target {
        root: root.id,
        center,
        inverse_mass: motorized.inverse_mass(),
        inverse_inertia: motorized.inverse_inertia(root.cframe()),
    })
}

#[derive(Debug, Clone, Default)]
pub struct ForceAccumulator {
    deltas: HashMap<PhysicalId, BodyDelta>,
}

impl ForceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Pending effects on the tree rooted at `root`.
    pub fn delta(&self, root: PhysicalId) -> Option<&BodyDelta> {
        self.deltas.get(&root)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PhysicalId, &BodyDelta)> + '_ {
        self.deltas.iter().map(|(id, delta)| (*id, delta))
    }

    /// Force applied at a world point of the physical `id`. Anchored trees ignore it.
    pub fn add_force(&mut self, physicals: &Arena<Physical>, id: PhysicalId, point: Position, force: DVec3) {
        let Some(target) = resolve(physicals, id) else {
            return;
        };
        let delta = self.deltas.entry(target.root).or_default();
        delta.force += force;
        delta.moment += (point - target.center).cross(force);
    }

    /// Force through the centre of mass of `id`'s tree.
    pub fn add_central_force(&mut self, physicals: &Arena<Physical>, id: PhysicalId, force: DVec3) {
        if let Some(target) = resolve(physicals, id) {
            self.deltas.entry(target.root).or_default().force += force;
        }
    }

    pub fn add_moment(&mut self, physicals: &Arena<Physical>, id: PhysicalId, moment: DVec3) {
        if let Some(target) = resolve(physicals, id) {
            self.deltas.entry(target.root).or_default().moment += moment;
        }
    }

    /// Instant momentum change at a world point, visible to later queries.
    pub fn add_impulse(
        &mut self,
        physicals: &Arena<Physical>,
        id: PhysicalId,
        point: Position,
        impulse: DVec3,
    ) {
        let Some(target) = resolve(physicals, id) else {
            return;
        };
        let arm = point - target.center;
        let delta = self.deltas.entry(target.root).or_default();
        delta.velocity += impulse * target.inverse_mass;
        delta.angular_velocity += target.inverse_inertia * arm.cross(impulse);
    }

    /// Position-level counterpart of an impulse: displaces the tree directly.
    pub fn add_drag(&mut self, physicals: &Arena<Physical>, id: PhysicalId, point: Position, drag: DVec3) {
        let Some(target) = resolve(physicals, id) else {
            return;
        };
        let arm = point - target.center;
        let delta = self.deltas.entry(target.root).or_default();
        delta.translation += drag * target.inverse_mass;
        delta.rotation += target.inverse_inertia * arm.cross(drag);
    }

    /// World velocity of a point of `id`, including this tick's impulses so far.
    pub fn velocity_of_point(&self, physicals: &Arena<Physical>, id: PhysicalId, point: Position) -> DVec3 {
        let Some(physical) = physicals.get(id) else {
            return DVec3::ZERO;
        };
        let base = physical.velocity_of_point(point);
        match (self.deltas.get(&physical.root()), root_and_center(physicals, id)) {
            (Some(delta), Some((_, center))) => {
                base + delta.velocity + delta.angular_velocity.cross(point - center)
            }
            _ => base,
        }
    }

    /// Acceleration of a point of `id` under the forces gathered so far.
    pub fn acceleration_of_point(&self, physicals: &Arena<Physical>, id: PhysicalId, point: Position) -> DVec3 {
        let Some(target) = resolve(physicals, id) else {
            return DVec3::ZERO;
        };
        let Some(delta) = self.deltas.get(&target.root) else {
            return DVec3::ZERO;
        };
        let arm = point - target.center;
        let angular_acceleration = target.inverse_inertia * delta.moment;
        delta.force * target.inverse_mass + angular_acceleration.cross(arm)
    }

    pub fn merge(&mut self, other: ForceAccumulator) {
        for (id, delta) in other.deltas {
            self.deltas.entry(id).or_default().merge(&delta);
        }
    }

    /// Hands every delta to its motorized root. Roots that vanished are skipped.
    pub fn apply(self, physicals: &mut Arena<Physical>) {
        for (root_id, delta) in self.deltas {
            let Some(root) = physicals.get_mut(root_id) else {
                continue;
            };
            // Deltas are measured about the centre of mass of the whole tree.
            let center = root.tree_center_of_mass();
            if delta.rotation != DVec3::ZERO {
                root.cframe = root
                    .cframe
                    .rotated_around(center, angular_velocity_to_quat(delta.rotation, 1.0));
            }
            root.cframe = root.cframe.translated(delta.translation);
            let Some(motorized) = root.as_motorized_mut() else {
                continue;
            };
            motorized.force += delta.force;
            motorized.moment += delta.moment;
            motorized.motion.velocity += delta.velocity;
            motorized.motion.angular_velocity += delta.angular_velocity;
        }
    }
}
