use std::fmt::Debug;

use glam::DVec3;

use crate::{
    config::DEFAULT_GRAVITY,
    core::{part::Part, physical::Physical},
    utils::allocator::{Arena, EntityId},
};

use super::accumulator::ForceAccumulator;

pub type ExternalForceId = EntityId;

/// Read-only view of the world handed to force sources during a tick.
#[derive(Clone, Copy)]
pub struct ForceContext<'a> {
    pub parts: &'a Arena<Part>,
    pub physicals: &'a Arena<Physical>,
    pub delta_t: f64,
}

/// A force source acting on the whole world once per tick.
pub trait ExternalForce: Debug + Send + Sync {
    fn apply(&self, ctx: &ForceContext<'_>, acc: &mut ForceAccumulator);
}

/// Uniform gravity pulling every free tree through its centre of mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalGravity {
    pub gravity: DVec3,
}

impl DirectionalGravity {
    pub fn new(gravity: DVec3) -> Self {
        Self { gravity }
    }
}

impl Default for DirectionalGravity {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY)
    }
}

impl ExternalForce for DirectionalGravity {
    fn apply(&self, ctx: &ForceContext<'_>, acc: &mut ForceAccumulator) {
        for (id, physical) in ctx.physicals.iter() {
            let Some(motorized) = physical.as_motorized() else {
                continue;
            };
            if motorized.anchored {
                continue;
            }
            acc.add_central_force(ctx.physicals, id, self.gravity * motorized.totals().mass);
        }
    }
}

/// Velocity proportional damping, a cheap stand-in for air resistance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearDrag {
    pub coefficient: f64,
}

impl ExternalForce for LinearDrag {
    fn apply(&self, ctx: &ForceContext<'_>, acc: &mut ForceAccumulator) {
        for (id, physical) in ctx.physicals.iter() {
            let Some(motorized) = physical.as_motorized() else {
                continue;
            };
            if motorized.anchored {
                continue;
            }
            acc.add_central_force(ctx.physicals, id, -motorized.motion.velocity * self.coefficient);
            acc.add_moment(ctx.physicals, id, -motorized.motion.angular_velocity * self.coefficient);
        }
    }
}

/// Registered external forces, addressed by the id handed out on insertion.
#[derive(Debug, Default)]
pub struct ForceRegistry {
    forces: Arena<Box<dyn ExternalForce>>,
}

impl ForceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: ExternalForce + 'static>(&mut self, force: F) -> ExternalForceId {
        self.forces.insert(Box::new(force))
    }

    pub fn remove(&mut self, id: ExternalForceId) -> Option<Box<dyn ExternalForce>> {
        self.forces.remove(id)
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn apply_all(&self, ctx: &ForceContext<'_>, acc: &mut ForceAccumulator) {
        for force in self.forces.values() {
            force.apply(ctx, acc);
        }
    }
}
