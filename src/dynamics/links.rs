//! Soft connectors between two parts: springs, elastics, magnets and
//! orientation aligners. They only ever produce forces; nothing is enforced.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::{
    core::{part::PartId, types::CFrame},
    utils::{allocator::EntityId, math::rotation_to_vector},
};

use super::{accumulator::ForceAccumulator, forces::ForceContext};

pub type LinkId = EntityId;

/// Where a link grabs a part, in the part's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkEnd {
    pub part: PartId,
    pub attachment: CFrame,
}

impl LinkEnd {
    pub fn new(part: PartId, offset: DVec3) -> Self {
        Self {
            part,
            attachment: CFrame::from_position(offset),
        }
    }

    pub fn at_center(part: PartId) -> Self {
        Self::new(part, DVec3::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LinkKind {
    /// Hooke's law in both directions.
    Spring { rest_length: f64, stiffness: f64 },
    /// Like a spring, but only pulls: slack below the rest length.
    Elastic { rest_length: f64, stiffness: f64 },
    /// Attraction falling off with the squared distance.
    Magnetic { strength: f64 },
    /// Torque turning the two attachment frames towards each other.
    Alignment { strength: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftLink {
    pub a: LinkEnd,
    pub b: LinkEnd,
    pub kind: LinkKind,
}

impl SoftLink {
    pub fn new(a: LinkEnd, b: LinkEnd, kind: LinkKind) -> Self {
        Self { a, b, kind }
    }

    pub fn spring(a: LinkEnd, b: LinkEnd, rest_length: f64, stiffness: f64) -> Self {
        Self::new(a, b, LinkKind::Spring { rest_length, stiffness })
    }

    pub fn elastic(a: LinkEnd, b: LinkEnd, rest_length: f64, stiffness: f64) -> Self {
        Self::new(a, b, LinkKind::Elastic { rest_length, stiffness })
    }

    pub fn magnetic(a: LinkEnd, b: LinkEnd, strength: f64) -> Self {
        Self::new(a, b, LinkKind::Magnetic { strength })
    }

    pub fn alignment(a: LinkEnd, b: LinkEnd, strength: f64) -> Self {
        Self::new(a, b, LinkKind::Alignment { strength })
    }

    /// Force on end `a` along the line `a -> b`; `b` receives the opposite.
    /// Positive values pull the ends together.
    fn pull(&self, distance: f64) -> f64 {
        match self.kind {
            LinkKind::Spring { rest_length, stiffness } => stiffness * (distance - rest_length),
            LinkKind::Elastic { rest_length, stiffness } => {
                stiffness * (distance - rest_length).max(0.0)
            }
            LinkKind::Magnetic { strength } => strength / (distance * distance).max(1e-12),
            LinkKind::Alignment { .. } => 0.0,
        }
    }

    pub fn apply(&self, ctx: &ForceContext<'_>, acc: &mut ForceAccumulator) {
        let (Some(part_a), Some(part_b)) = (ctx.parts.get(self.a.part), ctx.parts.get(self.b.part)) else {
            return;
        };
        let (Some(phys_a), Some(phys_b)) = (part_a.physical(), part_b.physical()) else {
            return;
        };
        let frame_a = part_a.cframe().local_to_global_cframe(&self.a.attachment);
        let frame_b = part_b.cframe().local_to_global_cframe(&self.b.attachment);

        if let LinkKind::Alignment { strength } = self.kind {
            let offset: DQuat = frame_b.rotation * frame_a.rotation.inverse();
            let moment = rotation_to_vector(offset) * strength;
            acc.add_moment(ctx.physicals, phys_a, moment);
            acc.add_moment(ctx.physicals, phys_b, -moment);
            return;
        }

        let delta = frame_b.position - frame_a.position;
        let distance = delta.length();
        if distance < 1e-12 {
            return;
        }
        let force = delta / distance * self.pull(distance);
        acc.add_force(ctx.physicals, phys_a, frame_a.position, force);
        acc.add_force(ctx.physicals, phys_b, frame_b.position, -force);
    }
}
