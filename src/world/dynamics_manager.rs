use log::warn;

use crate::{
    core::{part::PartId, physical::PhysicalId, types::CFrame},
    dynamics::{
        accumulator::ForceAccumulator,
        constraint_group::{ConstraintGroup, ConstraintGroupId},
        forces::{ExternalForce, ExternalForceId, ForceContext, ForceRegistry},
        links::{LinkId, SoftLink},
    },
    error::{PhysicsError, Result},
    utils::allocator::Arena,
};

/// Registries of everything that produces forces besides colissions.
#[derive(Debug, Default)]
pub struct DynamicsManager {
    pub(crate) forces: ForceRegistry,
    pub(crate) links: Arena<SoftLink>,
    pub(crate) constraint_groups: Arena<ConstraintGroup>,
}

impl DynamicsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_external_force<F: ExternalForce + 'static>(&mut self, force: F) -> ExternalForceId {
        self.forces.add(force)
    }

    pub fn remove_external_force(&mut self, id: ExternalForceId) -> Result<Box<dyn ExternalForce>> {
        self.forces
            .remove(id)
            .ok_or_else(|| PhysicsError::not_found("external force", id))
    }

    pub fn add_link(&mut self, link: SoftLink) -> LinkId {
        self.links.insert(link)
    }

    pub fn remove_link(&mut self, id: LinkId) -> Result<SoftLink> {
        self.links
            .remove(id)
            .ok_or_else(|| PhysicsError::not_found("link", id))
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn link(&self, id: LinkId) -> Option<&SoftLink> {
        self.links.get(id)
    }

    pub fn add_constraint_group(&mut self, group: ConstraintGroup) -> ConstraintGroupId {
        self.constraint_groups.insert(group)
    }

    pub fn remove_constraint_group(&mut self, id: ConstraintGroupId) -> Result<ConstraintGroup> {
        self.constraint_groups
            .remove(id)
            .ok_or_else(|| PhysicsError::not_found("constraint group", id))
    }

    pub fn constraint_group_mut(&mut self, id: ConstraintGroupId) -> Result<&mut ConstraintGroup> {
        self.constraint_groups
            .get_mut(id)
            .ok_or_else(|| PhysicsError::not_found("constraint group", id))
    }

    pub(crate) fn apply_forces(&self, ctx: &ForceContext<'_>, acc: &mut ForceAccumulator) {
        self.forces.apply_all(ctx, acc);
    }

    pub(crate) fn apply_links(&self, ctx: &ForceContext<'_>, acc: &mut ForceAccumulator) {
        for link in self.links.values() {
            link.apply(ctx, acc);
        }
    }

    /// Solves every constraint group. A group that cannot be solved this
    /// tick is logged and skipped; the others still run.
    pub(crate) fn solve_constraint_groups(&self, ctx: &ForceContext<'_>, acc: &mut ForceAccumulator) {
        for (id, group) in self.constraint_groups.iter() {
            if let Err(err) = group.solve(ctx.physicals, acc) {
                warn!("skipping constraint group {id} this tick: {err}");
            }
        }
    }

    /// Drops every link holding `part`.
    pub(crate) fn forget_part(&mut self, part: PartId) {
        let stale: Vec<LinkId> = self
            .links
            .iter()
            .filter(|(_, link)| link.a.part == part || link.b.part == part)
            .map(|(id, _)| id)
            .collect();
        for id in stale {
            self.links.remove(id);
        }
    }

    /// Drops every ball constraint holding `physical`.
    pub(crate) fn forget_physical(&mut self, physical: PhysicalId) {
        for (_, group) in self.constraint_groups.iter_mut() {
            group
                .constraints
                .retain(|c| c.a != physical && c.b != physical);
        }
    }

    /// Re-targets constraints after `old` was merged into `new`, where
    /// `old_in_new` is the old frame expressed in the new one.
    pub(crate) fn remap_physical(&mut self, old: PhysicalId, new: PhysicalId, old_in_new: &CFrame) {
        for (_, group) in self.constraint_groups.iter_mut() {
            for constraint in &mut group.constraints {
                if constraint.a == old {
                    constraint.a = new;
                    constraint.attach_a = old_in_new.local_to_global(constraint.attach_a);
                }
                if constraint.b == old {
                    constraint.b = new;
                    constraint.attach_b = old_in_new.local_to_global(constraint.attach_b);
                }
            }
        }
    }
}
