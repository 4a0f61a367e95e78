use crate::{
    core::{
        part::Part,
        physical::{propagate_tree, refresh_tree_mass, tree_members, Physical, PhysicalId, PhysicalKind},
    },
    error::{PhysicsError, Result},
    utils::{allocator::Arena, fixed::Position, math::angular_velocity_to_quat},
};

/// Advances motorized trees by one fixed step.
///
/// Velocities are integrated from the accumulated force and moment first,
/// then the root frame is rotated about the centre of mass by the exact
/// exponential of `ω dt` and translated by `v dt`. Hard constraints advance
/// afterwards, and the root is shifted so the tree's centre of mass stays
/// where the integration put it even when the joints moved mass around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    pub delta_t: f64,
}

impl Integrator {
    pub fn new(delta_t: f64) -> Self {
        Self { delta_t }
    }

    pub fn step_tree(
        &self,
        physicals: &mut Arena<Physical>,
        parts: &mut Arena<Part>,
        root: PhysicalId,
    ) -> Result<()> {
        let dt = self.delta_t;
        let target_center = self.integrate_root(physicals, root)?;

        self.advance_constraints(physicals, root);
        propagate_tree(physicals, parts, root)?;
        refresh_tree_mass(physicals, root)?;

        if let Some(target) = target_center {
            let root_physical = physicals
                .get_mut(root)
                .ok_or_else(|| PhysicsError::not_found("physical", root))?;
            let drift = target - root_physical.tree_center_of_mass();
            if drift.length_squared() > 0.0 {
                root_physical.cframe = root_physical.cframe.translated(drift);
            }
        }
        propagate_tree(physicals, parts, root)?;
        log::trace!("integrated tree {root} over {dt}s");
        Ok(())
    }

    /// Integrates the root's velocity and frame. Returns the new world
    /// centre of mass, `None` for anchored trees.
    fn integrate_root(
        &self,
        physicals: &mut Arena<Physical>,
        root: PhysicalId,
    ) -> Result<Option<Position>> {
        let dt = self.delta_t;
        let physical = physicals
            .get_mut(root)
            .ok_or_else(|| PhysicsError::not_found("physical", root))?;
        let cframe = physical.cframe;
        let PhysicalKind::Motorized(motorized) = &mut physical.kind else {
            return Err(PhysicsError::InvalidOperation(format!(
                "{root} is not the root of its tree"
            )));
        };
        if motorized.anchored {
            motorized.clear_forces();
            return Ok(None);
        }

        let linear_acceleration = motorized.force * motorized.inverse_mass();
        let angular_acceleration = motorized.inverse_inertia(&cframe) * motorized.moment;
        motorized.motion.velocity += linear_acceleration * dt;
        motorized.motion.angular_velocity += angular_acceleration * dt;
        motorized.clear_forces();

        let motion = motorized.motion;
        let center = cframe.local_to_global(motorized.totals.center_of_mass);
        let rotation = angular_velocity_to_quat(motion.angular_velocity, dt);
        physical.cframe = cframe
            .rotated_around(center, rotation)
            .translated(motion.velocity * dt);
        Ok(Some(center + motion.velocity * dt))
    }

    fn advance_constraints(&self, physicals: &mut Arena<Physical>, root: PhysicalId) {
        for id in tree_members(physicals, root) {
            if let Some(PhysicalKind::Connected(connected)) = physicals.get_mut(id).map(|p| &mut p.kind) {
                connected.connection.constraint.update(self.delta_t);
            }
        }
    }
}
