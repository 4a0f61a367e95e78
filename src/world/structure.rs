//! Structural operations: adding and removing parts, attaching them into
//! physicals and physical trees, and moving them around between ticks.
//!
//! Every operation here leaves the stored bounds of each part in its layer
//! equal to the part's current bounds, and keeps every motorized tree in a
//! single group of its layer. The pattern throughout is to capture a stored
//! bounds before mutating and refresh the group through it afterwards.

use glam::DVec3;
use log::debug;

use crate::{
    core::{
        constraints::HardConstraint,
        part::{Part, PartId},
        physical::{
            propagate_tree, refresh_tree_mass, tree_parts, AttachedPart, ConnectedPhysical,
            HardPhysicalConnection, MotorizedPhysical, Physical, PhysicalId, PhysicalKind,
        },
        types::{CFrame, GlobalCFrame, Motion},
    },
    error::{PhysicsError, Result},
    utils::{bounds::Bounds, fixed::Position},
};

use super::PhysicsWorld;

impl PhysicsWorld {
    pub(crate) fn part_ref(&self, id: PartId) -> Result<&Part> {
        self.parts.get(id).ok_or_else(|| PhysicsError::not_found("part", id))
    }

    fn physical_ref(&self, id: PhysicalId) -> Result<&Physical> {
        self.physicals
            .get(id)
            .ok_or_else(|| PhysicsError::not_found("physical", id))
    }

    fn physical_mut(&mut self, id: PhysicalId) -> Result<&mut Physical> {
        self.physicals
            .get_mut(id)
            .ok_or_else(|| PhysicsError::not_found("physical", id))
    }

    /// The physical directly holding `part`.
    pub fn physical_of(&self, part: PartId) -> Result<PhysicalId> {
        self.part_ref(part)?
            .physical()
            .ok_or_else(|| PhysicsError::InvalidOperation(format!("part {part} has no physical")))
    }

    /// The motorized root of the tree holding `part`.
    pub fn root_of(&self, part: PartId) -> Result<PhysicalId> {
        let physical = self.physical_of(part)?;
        Ok(self.physical_ref(physical)?.root())
    }

    /// Adds a free part. It gets a physical of its own.
    pub fn add_part(&mut self, part: Part) -> PartId {
        self.insert_part(part, false)
    }

    /// Adds a static part. Terrain is anchored and only tested against free parts.
    pub fn add_terrain_part(&mut self, part: Part) -> PartId {
        self.insert_part(part, true)
    }

    fn insert_part(&mut self, part: Part, terrain: bool) -> PartId {
        let part = Part {
            physical: None,
            is_terrain: terrain,
            ..part
        };
        let bounds = part.bounds();
        let physical_id = self
            .physicals
            .insert_with(|id| Physical::single_part(id, &part, terrain));
        let id = self.parts.insert_with(|id| Part {
            id,
            physical: Some(physical_id),
            ..part
        });
        if let Some(physical) = self.physicals.get_mut(physical_id) {
            for attached in &mut physical.parts {
                attached.part = id;
            }
        }
        self.collision.layer_mut(terrain).add(id, bounds);
        debug!(
            "added {} part {id} with physical {physical_id}",
            if terrain { "terrain" } else { "free" }
        );
        self.validate_if_enabled();
        id
    }

    /// Removes a part from the world, its physical and its layer. Links
    /// holding the part are dropped with it.
    pub fn remove_part(&mut self, id: PartId) -> Result<Part> {
        let part = self.part_ref(id)?;
        let (bounds, terrain) = (part.bounds(), part.is_terrain());
        self.collision.layer_mut(terrain).remove(&id, &bounds)?;
        self.dynamics.forget_part(id);
        self.take_part_from_physical(id)?;
        let part = self
            .parts
            .remove(id)
            .ok_or_else(|| PhysicsError::not_found("part", id))?;
        debug!("removed part {id}");
        self.validate_if_enabled();
        Ok(part)
    }

    /// Rigidly attaches `part` to the physical of `to`, placed at
    /// `attachment` in `to`'s frame. The whole physical `part` belongs to
    /// comes along, together with any physicals hanging off it.
    pub fn attach_part(&mut self, part: PartId, to: PartId, attachment: CFrame) -> Result<()> {
        if part == to {
            return Err(PhysicsError::InvalidOperation(format!("cannot attach part {part} to itself")));
        }
        let (part_bounds, terrain) = self.layer_check(part, to)?;
        let to_bounds = self.part_ref(to)?.bounds();
        let source = self.physical_of(part)?;
        let destination = self.physical_of(to)?;
        let to_attachment = self
            .physical_ref(destination)?
            .attachment_of(to)
            .ok_or_else(|| PhysicsError::not_found("attachment of part", to))?;
        let part_in_destination = to_attachment.combine(&attachment);

        if source == destination {
            let physical = self
                .physicals
                .get_mut(destination)
                .ok_or_else(|| PhysicsError::not_found("physical", destination))?;
            for attached in &mut physical.parts {
                if attached.part == part {
                    attached.attachment = part_in_destination;
                }
            }
            physical.refresh_mass(&self.parts);
            let root = physical.root;
            self.rebuild_tree(root)?;
        } else {
            let source_root = self.physical_ref(source)?.root();
            let destination_root = self.physical_ref(destination)?.root();
            if source_root == destination_root {
                return Err(PhysicsError::InvalidOperation(format!(
                    "parts {part} and {to} already share a physical tree"
                )));
            }
            if source != source_root {
                self.split_off_tree(source)?;
                self.rebuild_tree(source_root)?;
            }
            self.collision
                .layer_mut(terrain)
                .merge_groups(&to, &to_bounds, &part, &part_bounds)?;

            let part_in_source = self
                .physical_ref(source)?
                .attachment_of(part)
                .ok_or_else(|| PhysicsError::not_found("attachment of part", part))?;
            let source_in_destination = part_in_destination.combine(&part_in_source.inverse());
            self.merge_physical_into(source, destination, &source_in_destination)?;
            self.rebuild_tree(destination_root)?;
        }

        self.collision
            .refresh_group(&self.parts, to, terrain, &to_bounds)?;
        debug!("attached part {part} to part {to}");
        self.validate_if_enabled();
        Ok(())
    }

    /// Takes `part` out of its physical and gives it a physical of its own,
    /// keeping the velocity it had as a member.
    pub fn detach_part(&mut self, part: PartId) -> Result<PhysicalId> {
        let physical_id = self.physical_of(part)?;
        let physical = self.physical_ref(physical_id)?;
        if physical.parts.len() == 1 && physical.children.is_empty() && physical.is_motorized() {
            return Ok(physical_id);
        }
        let anchored = self.physical_ref(physical.root)?.is_anchored();
        let origin_motion = physical.motion;
        let origin = physical.cframe.position;

        let part_ref = self.part_ref(part)?;
        let (bounds, terrain) = (part_ref.bounds(), part_ref.is_terrain());
        let motion = origin_motion.translated(part_ref.center_of_mass() - origin);
        self.collision
            .layer_mut(terrain)
            .move_out_of_group(part, bounds)?;
        self.take_part_from_physical(part)?;

        let detached = self
            .parts
            .get(part)
            .ok_or_else(|| PhysicsError::not_found("part", part))?;
        let new_id = self
            .physicals
            .insert_with(|id| Physical::single_part(id, detached, anchored));
        if let Some(p) = self.parts.get_mut(part) {
            p.physical = Some(new_id);
        }
        if let Some(motorized) = self.physicals.get_mut(new_id).and_then(Physical::as_motorized_mut) {
            motorized.motion = motion;
        }
        propagate_tree(&mut self.physicals, &mut self.parts, new_id)?;
        debug!("detached part {part} into physical {new_id}");
        self.validate_if_enabled();
        Ok(new_id)
    }

    /// Hangs the physical of `child` below the physical of `parent` through
    /// a hard constraint. The attachment frames are given in the frames of
    /// the two parts. Returns the now connected physical.
    pub fn attach_with_constraint(
        &mut self,
        child: PartId,
        parent: PartId,
        attach_on_parent: CFrame,
        constraint: Box<dyn HardConstraint>,
        attach_on_child: CFrame,
    ) -> Result<PhysicalId> {
        if child == parent {
            return Err(PhysicsError::InvalidOperation(format!("cannot constrain part {child} to itself")));
        }
        let (child_bounds, terrain) = self.layer_check(child, parent)?;
        let parent_bounds = self.part_ref(parent)?.bounds();
        let child_physical = self.physical_of(child)?;
        let parent_physical = self.physical_of(parent)?;
        let child_root = self.physical_ref(child_physical)?.root();
        let parent_root = self.physical_ref(parent_physical)?.root();
        if child_root == parent_root {
            return Err(PhysicsError::InvalidOperation(format!(
                "parts {child} and {parent} already share a physical tree"
            )));
        }
        if child_physical != child_root {
            self.split_off_tree(child_physical)?;
            self.rebuild_tree(child_root)?;
        }
        self.collision
            .layer_mut(terrain)
            .merge_groups(&parent, &parent_bounds, &child, &child_bounds)?;

        let on_parent = self
            .physical_ref(parent_physical)?
            .attachment_of(parent)
            .ok_or_else(|| PhysicsError::not_found("attachment of part", parent))?
            .combine(&attach_on_parent);
        let on_child = self
            .physical_ref(child_physical)?
            .attachment_of(child)
            .ok_or_else(|| PhysicsError::not_found("attachment of part", child))?
            .combine(&attach_on_child);

        let child_anchored = self.physical_ref(child_physical)?.is_anchored();
        let physical = self.physical_mut(child_physical)?;
        physical.kind = PhysicalKind::Connected(ConnectedPhysical {
            parent: parent_physical,
            connection: HardPhysicalConnection::new(on_parent, constraint, on_child),
        });
        physical.root = parent_root;
        self.physical_mut(parent_physical)?.children.push(child_physical);
        if child_anchored {
            if let Some(root) = self.physical_mut(parent_root)?.as_motorized_mut() {
                root.anchored = true;
                root.motion = Motion::ZERO;
            }
        }
        self.rebuild_tree(parent_root)?;

        self.collision
            .refresh_group(&self.parts, parent, terrain, &parent_bounds)?;
        debug!("constrained physical {child_physical} below {parent_physical}");
        self.validate_if_enabled();
        Ok(child_physical)
    }

    /// Moves the tree holding `part` so that the part ends up at `cframe`.
    pub fn set_part_cframe(&mut self, part: PartId, cframe: GlobalCFrame) -> Result<()> {
        let part_ref = self.part_ref(part)?;
        let (stored, terrain) = (part_ref.bounds(), part_ref.is_terrain());
        let current = *part_ref.cframe();
        let root = self.root_of(part)?;
        let root_physical = self.physical_mut(root)?;
        let part_in_root = root_physical.cframe.global_to_local_cframe(&current);
        root_physical.cframe = cframe.local_to_global_cframe(&part_in_root.inverse());
        propagate_tree(&mut self.physicals, &mut self.parts, root)?;

        self.collision
            .refresh_group(&self.parts, part, terrain, &stored)?;
        self.validate_if_enabled();
        Ok(())
    }

    /// Sets the velocity of the tree's centre of mass and its angular velocity.
    pub fn set_motion(&mut self, part: PartId, motion: Motion) -> Result<()> {
        let root = self.root_of(part)?;
        let motorized = self
            .physical_mut(root)?
            .as_motorized_mut()
            .ok_or_else(|| PhysicsError::InvalidOperation(format!("{root} is not motorized")))?;
        if motorized.anchored && motion != Motion::ZERO {
            return Err(PhysicsError::InvalidOperation(format!("physical {root} is anchored")));
        }
        motorized.motion = motion;
        propagate_tree(&mut self.physicals, &mut self.parts, root)
    }

    /// Motion of the centre of mass of the tree holding `part`.
    pub fn motion_of(&self, part: PartId) -> Result<Motion> {
        let root = self.root_of(part)?;
        self.physical_ref(root)?
            .as_motorized()
            .map(|m| m.motion)
            .ok_or_else(|| PhysicsError::InvalidOperation(format!("{root} is not motorized")))
    }

    /// Anchors or frees the tree holding `part`. Terrain cannot be freed.
    pub fn set_anchored(&mut self, part: PartId, anchored: bool) -> Result<()> {
        if !anchored && self.part_ref(part)?.is_terrain() {
            return Err(PhysicsError::InvalidOperation(format!(
                "terrain part {part} must stay anchored"
            )));
        }
        let root = self.root_of(part)?;
        if let Some(motorized) = self.physical_mut(root)?.as_motorized_mut() {
            motorized.anchored = anchored;
            if anchored {
                motorized.motion = Motion::ZERO;
                motorized.clear_forces();
            }
        }
        propagate_tree(&mut self.physicals, &mut self.parts, root)?;
        debug!("physical {root} anchored: {anchored}");
        Ok(())
    }

    /// Moves the whole tree holding `part` between the free and terrain
    /// layers. Trees moved to terrain get anchored.
    pub fn set_terrain(&mut self, part: PartId, terrain: bool) -> Result<()> {
        let part_ref = self.part_ref(part)?;
        if part_ref.is_terrain() == terrain {
            return Ok(());
        }
        let stored = part_ref.bounds();
        let root = self.root_of(part)?;
        self.collision.transfer_group(part, &stored, terrain)?;
        for id in tree_parts(&self.physicals, root) {
            if let Some(p) = self.parts.get_mut(id) {
                p.is_terrain = terrain;
            }
        }
        if terrain {
            self.set_anchored(part, true)?;
        }
        debug!("moved tree {root} to the {} layer", if terrain { "terrain" } else { "free" });
        self.validate_if_enabled();
        Ok(())
    }

    /// Queues a force at world `point` for the next tick.
    pub fn apply_force(&mut self, part: PartId, point: Position, force: DVec3) -> Result<()> {
        let root = self.root_of(part)?;
        let root_physical = self.physical_mut(root)?;
        let center = root_physical.tree_center_of_mass();
        if let Some(motorized) = root_physical.as_motorized_mut() {
            motorized.apply_force(point - center, force);
        }
        Ok(())
    }

    /// Changes the velocity of the tree holding `part` right away.
    pub fn apply_impulse(&mut self, part: PartId, point: Position, impulse: DVec3) -> Result<()> {
        let root = self.root_of(part)?;
        let root_physical = self.physical_mut(root)?;
        let center = root_physical.tree_center_of_mass();
        let cframe = root_physical.cframe;
        if let Some(motorized) = root_physical.as_motorized_mut() {
            motorized.apply_impulse(&cframe, point - center, impulse);
        }
        propagate_tree(&mut self.physicals, &mut self.parts, root)
    }

    pub fn are_in_same_group(&self, a: PartId, b: PartId) -> Result<bool> {
        let (a_ref, b_ref) = (self.part_ref(a)?, self.part_ref(b)?);
        if a_ref.is_terrain() != b_ref.is_terrain() {
            return Ok(false);
        }
        self.collision
            .layer(a_ref.is_terrain())
            .are_in_same_group(&a, &a_ref.bounds(), &b, &b_ref.bounds())
    }

    /// Both parts must live in the same layer. Returns the first part's
    /// bounds and the layer.
    fn layer_check(&self, part: PartId, other: PartId) -> Result<(Bounds, bool)> {
        let (a, b) = (self.part_ref(part)?, self.part_ref(other)?);
        if a.is_terrain() != b.is_terrain() {
            return Err(PhysicsError::InvalidOperation(format!(
                "parts {part} and {other} are in different layers"
            )));
        }
        Ok((a.bounds(), a.is_terrain()))
    }

    /// Removes `part` from its physical's part list. A physical left empty
    /// is dissolved; otherwise its tree's mass is recomputed.
    fn take_part_from_physical(&mut self, part: PartId) -> Result<()> {
        let physical_id = self.physical_of(part)?;
        let physical = self
            .physicals
            .get_mut(physical_id)
            .ok_or_else(|| PhysicsError::not_found("physical", physical_id))?;
        physical.parts.retain(|a| a.part != part);
        let now_empty = physical.parts.is_empty();
        if !now_empty {
            physical.refresh_mass(&self.parts);
        }
        let root = physical.root;
        if let Some(p) = self.parts.get_mut(part) {
            p.physical = None;
        }
        if now_empty {
            self.dissolve_physical(physical_id)
        } else {
            self.rebuild_tree(root)
        }
    }

    /// Deletes a physical that holds no parts. Its children become trees of
    /// their own.
    fn dissolve_physical(&mut self, id: PhysicalId) -> Result<()> {
        let children = self.physical_ref(id)?.children.clone();
        for child in children {
            self.split_off_tree(child)?;
        }
        let physical = self
            .physicals
            .remove(id)
            .ok_or_else(|| PhysicsError::not_found("physical", id))?;
        self.dynamics.forget_physical(id);
        if let Some(parent) = physical.parent() {
            self.physical_mut(parent)?.children.retain(|&c| c != id);
            self.rebuild_tree(physical.root)?;
        }
        debug!("dissolved physical {id}");
        Ok(())
    }

    /// Cuts the connected physical `child` loose from its parent, making it
    /// the motorized root of its own subtree and its own group. The old root
    /// is left for the caller to rebuild.
    fn split_off_tree(&mut self, child: PhysicalId) -> Result<()> {
        let physical = self.physical_ref(child)?;
        let Some(parent) = physical.parent() else {
            return Ok(());
        };
        let anchored = self.physical_ref(physical.root)?.is_anchored();
        let origin_motion = physical.motion;

        let members: Vec<(PartId, Bounds)> = tree_parts(&self.physicals, child)
            .into_iter()
            .filter_map(|id| self.parts.get(id).map(|p| (id, p.bounds())))
            .collect();
        if let Some(terrain) = members
            .first()
            .and_then(|(id, _)| self.parts.get(*id))
            .map(Part::is_terrain)
        {
            self.collision.layer_mut(terrain).split_group(members)?;
        }

        self.physical_mut(parent)?.children.retain(|&c| c != child);
        let physical = self.physical_mut(child)?;
        physical.kind = PhysicalKind::Motorized(MotorizedPhysical {
            anchored,
            ..MotorizedPhysical::default()
        });
        physical.root = child;
        self.restart_tree(child, origin_motion)?;
        debug!("split physical {child} off its parent {parent}");
        Ok(())
    }

    /// Moves every part and child of `source` into `destination`, where
    /// `source_in_destination` places the source frame in the destination
    /// frame. `source` must be a root; it is deleted.
    fn merge_physical_into(
        &mut self,
        source: PhysicalId,
        destination: PhysicalId,
        source_in_destination: &CFrame,
    ) -> Result<()> {
        let source_physical = self
            .physicals
            .remove(source)
            .ok_or_else(|| PhysicsError::not_found("physical", source))?;
        let source_anchored = source_physical.is_anchored();
        let Physical { parts, children, .. } = source_physical;

        for attached in &parts {
            if let Some(part) = self.parts.get_mut(attached.part) {
                part.physical = Some(destination);
            }
        }
        for &child in &children {
            if let Some(PhysicalKind::Connected(connected)) = self.physicals.get_mut(child).map(|p| &mut p.kind) {
                connected.parent = destination;
                connected.connection.attach_on_parent =
                    source_in_destination.combine(&connected.connection.attach_on_parent);
            }
        }

        let target = self
            .physicals
            .get_mut(destination)
            .ok_or_else(|| PhysicsError::not_found("physical", destination))?;
        target.parts.extend(parts.into_iter().map(|attached| AttachedPart {
            part: attached.part,
            attachment: source_in_destination.combine(&attached.attachment),
        }));
        target.children.extend(children);
        target.refresh_mass(&self.parts);
        let root = target.root;

        if source_anchored {
            if let Some(motorized) = self.physical_mut(root)?.as_motorized_mut() {
                motorized.anchored = true;
                motorized.motion = Motion::ZERO;
            }
        }
        self.dynamics.remap_physical(source, destination, source_in_destination);
        debug!("merged physical {source} into {destination}");
        Ok(())
    }

    /// Recomputes the tree's mass and keeps the current motion of the
    /// root's frame origin.
    pub(crate) fn rebuild_tree(&mut self, root: PhysicalId) -> Result<()> {
        let origin_motion = self.physical_ref(root)?.motion;
        self.restart_tree(root, origin_motion)
    }

    fn restart_tree(&mut self, root: PhysicalId, origin_motion: Motion) -> Result<()> {
        refresh_tree_mass(&mut self.physicals, root)?;
        let physical = self.physical_mut(root)?;
        let offset = physical.tree_center_of_mass() - physical.cframe.position;
        if let Some(motorized) = physical.as_motorized_mut() {
            motorized.motion = if motorized.anchored {
                Motion::ZERO
            } else {
                origin_motion.translated(offset)
            };
        }
        propagate_tree(&mut self.physicals, &mut self.parts, root)
    }
}
