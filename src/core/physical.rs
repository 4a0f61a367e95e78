//! Rigid aggregates of parts and the articulated trees they form.
//!
//! Every part in a world belongs to exactly one [`Physical`]. Physicals form
//! trees: the root is motorized (it owns the velocity state the integrator
//! advances) and every other node is connected to its parent through a hard
//! constraint. Each node keeps a `root` back pointer and a cached world
//! motion refreshed by [`propagate_tree`].

use glam::{DMat3, DVec3};

use crate::{
    error::{PhysicsError, Result},
    utils::{
        allocator::{Arena, EntityId},
        fixed::Position,
        math::{point_response_matrix, rotate_inertia},
    },
};

use super::{
    constraints::HardConstraint,
    part::{Part, PartId},
    types::{CFrame, GlobalCFrame, MassProperties, Motion},
};

pub type PhysicalId = EntityId;

/// A part rigidly fixed in a physical's frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachedPart {
    pub part: PartId,
    pub attachment: CFrame,
}

/// Joint between a connected physical and its parent.
#[derive(Debug)]
pub struct HardPhysicalConnection {
    /// Joint frame in the parent physical's frame.
    pub attach_on_parent: CFrame,
    pub constraint: Box<dyn HardConstraint>,
    /// Joint frame in the child physical's frame.
    pub attach_on_child: CFrame,
}

impl HardPhysicalConnection {
    pub fn new(
        attach_on_parent: CFrame,
        constraint: Box<dyn HardConstraint>,
        attach_on_child: CFrame,
    ) -> Self {
        Self {
            attach_on_parent,
            constraint,
            attach_on_child,
        }
    }

    /// Child frame expressed in the parent frame.
    pub fn relative_cframe(&self) -> CFrame {
        self.attach_on_parent
            .combine(&self.constraint.relative_cframe())
            .combine(&self.attach_on_child.inverse())
    }

    /// Motion of the child frame's origin relative to a stationary parent,
    /// expressed in the parent frame.
    pub fn relative_motion(&self) -> Motion {
        let joint = self.constraint.relative_motion();
        let velocity = self.attach_on_parent.local_to_relative(joint.velocity);
        let angular_velocity = self.attach_on_parent.local_to_relative(joint.angular_velocity);
        let joint_out = self.attach_on_parent.combine(&self.constraint.relative_cframe());
        let arm = joint_out.local_to_relative(self.attach_on_child.inverse().position);
        Motion::new(velocity + angular_velocity.cross(arm), angular_velocity)
    }
}

/// Root of a physical tree. Velocities are those of the tree's centre of mass.
#[derive(Debug, Clone, Default)]
pub struct MotorizedPhysical {
    pub motion: Motion,
    pub anchored: bool,
    /// Mass of the whole tree, expressed in the root's frame.
    pub(crate) totals: MassProperties,
    pub(crate) force: DVec3,
    pub(crate) moment: DVec3,
}

impl MotorizedPhysical {
    pub fn totals(&self) -> &MassProperties {
        &self.totals
    }

    pub fn inverse_mass(&self) -> f64 {
        if self.anchored || self.totals.mass <= 0.0 {
            0.0
        } else {
            1.0 / self.totals.mass
        }
    }

    /// World-space inverse inertia for a root oriented as `root_cframe`.
    pub fn inverse_inertia(&self, root_cframe: &GlobalCFrame) -> DMat3 {
        if self.anchored || self.totals.mass <= 0.0 {
            return DMat3::ZERO;
        }
        let world = rotate_inertia(self.totals.inertia, root_cframe.rotation);
        if world.determinant().abs() < 1e-300 {
            DMat3::ZERO
        } else {
            world.inverse()
        }
    }

    /// Accumulates a force for the next integration; `offset` is taken from the centre of mass.
    pub fn apply_force(&mut self, offset: DVec3, force: DVec3) {
        self.force += force;
        self.moment += offset.cross(force);
    }

    pub fn apply_moment(&mut self, moment: DVec3) {
        self.moment += moment;
    }

    /// Changes the velocity state immediately.
    pub fn apply_impulse(&mut self, root_cframe: &GlobalCFrame, offset: DVec3, impulse: DVec3) {
        self.motion.velocity += impulse * self.inverse_mass();
        self.motion.angular_velocity += self.inverse_inertia(root_cframe) * offset.cross(impulse);
    }

    pub fn pending_force(&self) -> (DVec3, DVec3) {
        (self.force, self.moment)
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = DVec3::ZERO;
        self.moment = DVec3::ZERO;
    }
}

#[derive(Debug)]
pub struct ConnectedPhysical {
    pub parent: PhysicalId,
    pub connection: HardPhysicalConnection,
}

#[derive(Debug)]
pub enum PhysicalKind {
    Motorized(MotorizedPhysical),
    Connected(ConnectedPhysical),
}

/// A set of parts that do not move relative to each other.
#[derive(Debug)]
pub struct Physical {
    pub id: PhysicalId,
    pub(crate) parts: Vec<AttachedPart>,
    pub(crate) mass: MassProperties,
    pub(crate) cframe: GlobalCFrame,
    pub(crate) children: Vec<PhysicalId>,
    pub(crate) root: PhysicalId,
    /// World motion of the frame origin, refreshed on propagation.
    pub(crate) motion: Motion,
    pub(crate) kind: PhysicalKind,
}

impl Physical {
    /// A root physical holding only `part`, framed on the part itself.
    pub fn single_part(id: PhysicalId, part: &Part, anchored: bool) -> Self {
        let mass = part.local_mass_properties();
        Self {
            id,
            parts: vec![AttachedPart {
                part: part.id,
                attachment: CFrame::IDENTITY,
            }],
            mass,
            cframe: part.cframe,
            children: Vec::new(),
            root: id,
            motion: Motion::ZERO,
            kind: PhysicalKind::Motorized(MotorizedPhysical {
                totals: mass,
                anchored,
                ..MotorizedPhysical::default()
            }),
        }
    }

    pub fn parts(&self) -> &[AttachedPart] {
        &self.parts
    }

    pub fn main_part(&self) -> Option<PartId> {
        self.parts.first().map(|p| p.part)
    }

    pub fn contains_part(&self, part: PartId) -> bool {
        self.parts.iter().any(|p| p.part == part)
    }

    pub fn attachment_of(&self, part: PartId) -> Option<CFrame> {
        self.parts
            .iter()
            .find(|p| p.part == part)
            .map(|p| p.attachment)
    }

    pub fn children(&self) -> &[PhysicalId] {
        &self.children
    }

    pub fn root(&self) -> PhysicalId {
        self.root
    }

    pub fn cframe(&self) -> &GlobalCFrame {
        &self.cframe
    }

    /// Mass of this physical's own parts, in its frame.
    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub fn kind(&self) -> &PhysicalKind {
        &self.kind
    }

    pub fn is_motorized(&self) -> bool {
        matches!(self.kind, PhysicalKind::Motorized(_))
    }

    pub fn as_motorized(&self) -> Option<&MotorizedPhysical> {
        match &self.kind {
            PhysicalKind::Motorized(m) => Some(m),
            PhysicalKind::Connected(_) => None,
        }
    }

    pub fn as_motorized_mut(&mut self) -> Option<&mut MotorizedPhysical> {
        match &mut self.kind {
            PhysicalKind::Motorized(m) => Some(m),
            PhysicalKind::Connected(_) => None,
        }
    }

    pub fn as_connected(&self) -> Option<&ConnectedPhysical> {
        match &self.kind {
            PhysicalKind::Connected(c) => Some(c),
            PhysicalKind::Motorized(_) => None,
        }
    }

    pub fn parent(&self) -> Option<PhysicalId> {
        self.as_connected().map(|c| c.parent)
    }

    pub fn is_anchored(&self) -> bool {
        self.as_motorized().is_some_and(|m| m.anchored)
    }

    pub fn center_of_mass(&self) -> Position {
        self.cframe.local_to_global(self.mass.center_of_mass)
    }

    /// World centre of mass of the whole tree when called on its root, of
    /// this physical alone otherwise.
    pub fn tree_center_of_mass(&self) -> Position {
        match &self.kind {
            PhysicalKind::Motorized(m) => self.cframe.local_to_global(m.totals.center_of_mass),
            PhysicalKind::Connected(_) => self.center_of_mass(),
        }
    }

    /// World-space velocity of a point rigidly attached to this physical.
    pub fn velocity_of_point(&self, point: Position) -> DVec3 {
        self.motion.velocity_of_point(point - self.cframe.position)
    }

    /// Recomputes this physical's own mass from its parts.
    pub fn refresh_mass(&mut self, parts: &Arena<Part>) {
        let transformed: Vec<MassProperties> = self
            .parts
            .iter()
            .filter_map(|attached| {
                parts
                    .get(attached.part)
                    .map(|p| p.local_mass_properties().transformed(&attached.attachment))
            })
            .collect();
        self.mass = MassProperties::combine(transformed.iter());
    }

    /// Places every part of this physical according to its current frame.
    pub fn place_parts(&self, parts: &mut Arena<Part>) {
        for attached in &self.parts {
            if let Some(part) = parts.get_mut(attached.part) {
                part.cframe = self.cframe.local_to_global_cframe(&attached.attachment);
            }
        }
    }
}

/// Every physical of the tree rooted at `root`, parents before children.
pub fn tree_members(physicals: &Arena<Physical>, root: PhysicalId) -> Vec<PhysicalId> {
    let mut members = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(physical) = physicals.get(id) {
            members.push(id);
            stack.extend(physical.children.iter().rev().copied());
        }
    }
    members
}

/// Every part of the tree rooted at `root`.
pub fn tree_parts(physicals: &Arena<Physical>, root: PhysicalId) -> Vec<PartId> {
    tree_members(physicals, root)
        .into_iter()
        .filter_map(|id| physicals.get(id))
        .flat_map(|p| p.parts.iter().map(|a| a.part))
        .collect()
}

/// Recomputes the motorized root's total mass properties in its own frame.
pub fn refresh_tree_mass(physicals: &mut Arena<Physical>, root: PhysicalId) -> Result<()> {
    let root_cframe = physicals
        .get(root)
        .ok_or_else(|| PhysicsError::not_found("physical", root))?
        .cframe;
    let members: Vec<MassProperties> = tree_members(physicals, root)
        .into_iter()
        .filter_map(|id| physicals.get(id))
        .map(|p| {
            let relative = root_cframe.global_to_local_cframe(&p.cframe);
            p.mass.transformed(&relative)
        })
        .collect();
    let totals = MassProperties::combine(members.iter());
    let motorized = physicals
        .get_mut(root)
        .and_then(Physical::as_motorized_mut)
        .ok_or_else(|| PhysicsError::InvalidOperation(format!("{root} is not a motorized physical")))?;
    motorized.totals = totals;
    Ok(())
}

/// Positions every connected physical from its joint, refreshes cached
/// motions and places all parts of the tree.
pub fn propagate_tree(
    physicals: &mut Arena<Physical>,
    parts: &mut Arena<Part>,
    root: PhysicalId,
) -> Result<()> {
    let root_physical = physicals
        .get_mut(root)
        .ok_or_else(|| PhysicsError::not_found("physical", root))?;
    let root_motion = match &root_physical.kind {
        PhysicalKind::Motorized(m) => {
            let com = root_physical.cframe.local_to_global(m.totals.center_of_mass);
            m.motion.translated(root_physical.cframe.position - com)
        }
        PhysicalKind::Connected(_) => {
            return Err(PhysicsError::InvalidOperation(format!(
                "{root} is not the root of its tree"
            )))
        }
    };
    root_physical.motion = root_motion;
    root_physical.root = root;

    for id in tree_members(physicals, root) {
        let Some(physical) = physicals.get(id) else {
            continue;
        };
        let (cframe, motion) = (physical.cframe, physical.motion);
        for child_id in physical.children.clone() {
            let Some(child) = physicals.get_mut(child_id) else {
                continue;
            };
            if let PhysicalKind::Connected(connected) = &child.kind {
                let relative = connected.connection.relative_cframe();
                let relative_motion = connected.connection.relative_motion();
                child.cframe = cframe.local_to_global_cframe(&relative);
                let offset = child.cframe.position - cframe.position;
                child.motion = Motion::new(
                    motion.velocity_of_point(offset)
                        + cframe.local_to_relative(relative_motion.velocity),
                    motion.angular_velocity
                        + cframe.local_to_relative(relative_motion.angular_velocity),
                );
            }
            child.root = root;
        }
        if let Some(physical) = physicals.get(id) {
            physical.place_parts(parts);
        }
    }
    Ok(())
}

/// The root of `id`'s tree together with the root's world centre of mass.
pub fn root_and_center(physicals: &Arena<Physical>, id: PhysicalId) -> Option<(&Physical, Position)> {
    let physical = physicals.get(id)?;
    let root = physicals.get(physical.root)?;
    let motorized = root.as_motorized()?;
    Some((root, root.cframe.local_to_global(motorized.totals.center_of_mass)))
}

/// Inverse of the effective mass felt when pushing the tree of `id` at
/// `point` along the unit `direction`. Zero for anchored trees.
pub fn inverse_inertia_of_point_in_direction(
    physicals: &Arena<Physical>,
    id: PhysicalId,
    point: Position,
    direction: DVec3,
) -> f64 {
    let Some((root, com)) = root_and_center(physicals, id) else {
        return 0.0;
    };
    let Some(motorized) = root.as_motorized() else {
        return 0.0;
    };
    let arm = point - com;
    let response = point_response_matrix(
        motorized.inverse_mass(),
        motorized.inverse_inertia(&root.cframe),
        arm,
        arm,
    );
    direction.dot(response * direction).max(0.0)
}

/// Effective mass at `point` along `direction`; infinite for anchored trees.
pub fn inertia_of_point_in_direction(
    physicals: &Arena<Physical>,
    id: PhysicalId,
    point: Position,
    direction: DVec3,
) -> f64 {
    let inverse = inverse_inertia_of_point_in_direction(physicals, id, point, direction);
    if inverse <= 0.0 {
        f64::INFINITY
    } else {
        1.0 / inverse
    }
}
