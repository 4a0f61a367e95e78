//! Soft point-to-point constraints solved together as one dense system.
//!
//! For `n` ball constraints the system is `3n x 3n`. Block `(i, j)` is the
//! change of constraint `i`'s gap per unit correction on constraint `j`,
//! summed over every body both constraints touch. The same factorisation is
//! solved three times: against the position gap (applied as a drag), the
//! velocity gap (impulses) and the acceleration gap (forces).

use glam::DVec3;

use crate::{
    core::physical::{root_and_center, Physical, PhysicalId},
    error::{PhysicsError, Result},
    utils::{
        allocator::{Arena, EntityId},
        fixed::Position,
        linalg::DenseMatrix,
        math::point_response_matrix,
    },
};

use super::accumulator::ForceAccumulator;

pub type ConstraintGroupId = EntityId;

/// Pins a point of one physical to a point of another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallConstraint {
    pub a: PhysicalId,
    /// Attachment point in `a`'s frame.
    pub attach_a: DVec3,
    pub b: PhysicalId,
    pub attach_b: DVec3,
}

impl BallConstraint {
    pub fn new(a: PhysicalId, attach_a: DVec3, b: PhysicalId, attach_b: DVec3) -> Self {
        Self {
            a,
            attach_a,
            b,
            attach_b,
        }
    }
}

/// One end of a constraint resolved against the current world state.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    physical: PhysicalId,
    root: PhysicalId,
    point: Position,
    arm: DVec3,
    inverse_mass: f64,
    inverse_inertia: glam::DMat3,
}

impl Anchor {
    fn resolve(physicals: &Arena<Physical>, physical: PhysicalId, attach: DVec3) -> Result<Anchor> {
        let owner = physicals
            .get(physical)
            .ok_or_else(|| PhysicsError::not_found("physical", physical))?;
        let (root, center) = root_and_center(physicals, physical)
            .ok_or_else(|| PhysicsError::not_found("root physical", owner.root()))?;
        let motorized = root
            .as_motorized()
            .ok_or_else(|| PhysicsError::InvalidOperation(format!("{} is not motorized", root.id)))?;
        let point = owner.cframe().local_to_global(attach);
        Ok(Anchor {
            physical,
            root: root.id,
            point,
            arm: point - center,
            inverse_mass: motorized.inverse_mass(),
            inverse_inertia: motorized.inverse_inertia(root.cframe()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintGroup {
    pub constraints: Vec<BallConstraint>,
}

impl ConstraintGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraints(constraints: Vec<BallConstraint>) -> Self {
        Self { constraints }
    }

    pub fn add(&mut self, constraint: BallConstraint) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Computes and accumulates the corrections for this tick. A singular
    /// system leaves `acc` untouched.
    pub fn solve(&self, physicals: &Arena<Physical>, acc: &mut ForceAccumulator) -> Result<()> {
        if self.constraints.is_empty() {
            return Ok(());
        }
        let anchors: Vec<(Anchor, Anchor)> = self
            .constraints
            .iter()
            .map(|c| {
                Ok((
                    Anchor::resolve(physicals, c.a, c.attach_a)?,
                    Anchor::resolve(physicals, c.b, c.attach_b)?,
                ))
            })
            .collect::<Result<_>>()?;

        let n = anchors.len();
        let mut matrix = DenseMatrix::zeros(3 * n);
        for (i, (ai, bi)) in anchors.iter().enumerate() {
            for (j, (aj, bj)) in anchors.iter().enumerate() {
                // Gap is b - a; a correction pushes b forward and a back.
                for (end_i, sign_i) in [(ai, -1.0), (bi, 1.0)] {
                    for (end_j, sign_j) in [(aj, -1.0), (bj, 1.0)] {
                        if end_i.root != end_j.root {
                            continue;
                        }
                        let response = point_response_matrix(
                            end_i.inverse_mass,
                            end_i.inverse_inertia,
                            end_i.arm,
                            end_j.arm,
                        );
                        matrix.add_block(i, j, response * (sign_i * sign_j));
                    }
                }
            }
        }
        let lu = matrix.factorize()?;

        let position_gap: Vec<DVec3> = anchors.iter().map(|(a, b)| a.point - b.point).collect();
        let velocity_gap: Vec<DVec3> = anchors
            .iter()
            .map(|(a, b)| {
                acc.velocity_of_point(physicals, a.physical, a.point)
                    - acc.velocity_of_point(physicals, b.physical, b.point)
            })
            .collect();
        let acceleration_gap: Vec<DVec3> = anchors
            .iter()
            .map(|(a, b)| {
                acc.acceleration_of_point(physicals, a.physical, a.point)
                    - acc.acceleration_of_point(physicals, b.physical, b.point)
            })
            .collect();

        let drags = lu.solve_vec3(&position_gap);
        let impulses = lu.solve_vec3(&velocity_gap);
        let forces = lu.solve_vec3(&acceleration_gap);

        for (k, (a, b)) in anchors.iter().enumerate() {
            acc.add_drag(physicals, a.physical, a.point, -drags[k]);
            acc.add_drag(physicals, b.physical, b.point, drags[k]);
            acc.add_impulse(physicals, a.physical, a.point, -impulses[k]);
            acc.add_impulse(physicals, b.physical, b.point, impulses[k]);
            acc.add_force(physicals, a.physical, a.point, -forces[k]);
            acc.add_force(physicals, b.physical, b.point, forces[k]);
        }
        Ok(())
    }
}
