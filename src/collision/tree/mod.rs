//! Bounds tree: the spatial index over every part's bounding box.
//!
//! Trunks hold up to [`BRANCH_FACTOR`] slots; each slot caches the bounds of
//! what it points to (a leaf object or another trunk). Trunks live in an
//! [`Arena`] and are referred to by generation checked ids, so restructuring
//! never leaves a dangling reference behind.
//!
//! A slot may be flagged as a *group head*. Every leaf is at or below exactly
//! one group head, and heads never nest. Everything below a head belongs to
//! one rigid body: general restructuring never moves slots across a head, and
//! the broad phase never pairs two leaves under the same head.

mod groups;
mod iter;
mod optimize;
mod pairs;

use std::fmt;

use thiserror::Error;

use crate::{
    config::BRANCH_FACTOR,
    error::{PhysicsError, Result},
    utils::{
        allocator::{Arena, EntityId},
        bounds::Bounds,
    },
};

pub use iter::{FilteredIter, TreeIter};

pub type TrunkId = EntityId;

/// Objects stored in a [`BoundsTree`]: small handles convertible to an id for diagnostics.
pub trait TreeItem: Copy + PartialEq + fmt::Debug + Into<EntityId> {}

impl<T: Copy + PartialEq + fmt::Debug + Into<EntityId>> TreeItem for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeNode<T> {
    Leaf(T),
    Trunk(TrunkId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TreeSlot<T> {
    pub bounds: Bounds,
    pub node: TreeNode<T>,
    pub is_group_head: bool,
}

impl<T> TreeSlot<T> {
    fn leaf(object: T, bounds: Bounds, is_group_head: bool) -> Self {
        Self {
            bounds,
            node: TreeNode::Leaf(object),
            is_group_head,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TreeTrunk<T> {
    pub slots: Vec<TreeSlot<T>>,
}

impl<T> TreeTrunk<T> {
    fn new() -> Self {
        Self {
            slots: Vec::with_capacity(BRANCH_FACTOR),
        }
    }

    fn bounds(&self) -> Option<Bounds> {
        self.slots
            .iter()
            .map(|s| s.bounds)
            .reduce(|a, b| a.union(&b))
    }
}

/// Route from the root trunk to a slot: `(trunk, slot index)` per level.
pub(crate) type SlotPath = Vec<(TrunkId, usize)>;

/// A broken structural invariant, reported by [`BoundsTree::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("bounds tree invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Shape statistics, for debugging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub objects: usize,
    pub trunks: usize,
    pub groups: usize,
    pub max_depth: usize,
}

pub struct BoundsTree<T> {
    pub(crate) trunks: Arena<TreeTrunk<T>>,
    pub(crate) root: TrunkId,
    len: usize,
}

impl<T: TreeItem> Default for BoundsTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TreeItem> fmt::Debug for BoundsTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundsTree")
            .field("len", &self.len)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: TreeItem> BoundsTree<T> {
    pub fn new() -> Self {
        let mut trunks = Arena::new();
        let root = trunks.insert(TreeTrunk::new());
        Self {
            trunks,
            root,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Union of everything in the tree.
    pub fn bounds(&self) -> Option<Bounds> {
        self.trunk(self.root).bounds()
    }

    pub fn clear(&mut self) {
        self.trunks.clear();
        self.root = self.trunks.insert(TreeTrunk::new());
        self.len = 0;
    }

    pub(crate) fn trunk(&self, id: TrunkId) -> &TreeTrunk<T> {
        match self.trunks.get(id) {
            Some(trunk) => trunk,
            None => panic!("bounds tree references freed trunk {id}"),
        }
    }

    pub(crate) fn trunk_mut(&mut self, id: TrunkId) -> &mut TreeTrunk<T> {
        match self.trunks.get_mut(id) {
            Some(trunk) => trunk,
            None => panic!("bounds tree references freed trunk {id}"),
        }
    }

    pub(crate) fn slot(&self, at: (TrunkId, usize)) -> &TreeSlot<T> {
        &self.trunk(at.0).slots[at.1]
    }

    fn slot_mut(&mut self, at: (TrunkId, usize)) -> &mut TreeSlot<T> {
        &mut self.trunk_mut(at.0).slots[at.1]
    }

    /// Adds `object` as a new group of its own.
    pub fn add(&mut self, object: T, bounds: Bounds) {
        let root = self.root;
        self.place(root, TreeSlot::leaf(object, bounds, true));
        self.len += 1;
        self.validate_if_enabled();
    }

    /// Pushes `slot` into the subtree below `trunk_id`, descending toward the
    /// child with the cheapest union. Bounds on the way down are expanded.
    /// Leaves and group heads are never entered: the new slot is paired with
    /// them in a fresh trunk instead.
    pub(crate) fn place(&mut self, trunk_id: TrunkId, slot: TreeSlot<T>) {
        let mut current = trunk_id;
        loop {
            let trunk = self.trunk_mut(current);
            if trunk.slots.len() < BRANCH_FACTOR {
                trunk.slots.push(slot);
                return;
            }

            let best = trunk
                .slots
                .iter()
                .enumerate()
                .map(|(i, s)| (i, s.bounds.union(&slot.bounds).combination_cost()))
                .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
                .0;
            let chosen = &mut trunk.slots[best];
            chosen.bounds = chosen.bounds.union(&slot.bounds);

            match chosen.node {
                TreeNode::Trunk(next) if !chosen.is_group_head => current = next,
                _ => {
                    let displaced = *chosen;
                    let merged_bounds = chosen.bounds;
                    let mut wrapper = TreeTrunk::new();
                    wrapper.slots.push(displaced);
                    wrapper.slots.push(slot);
                    let wrapper_id = self.trunks.insert(wrapper);
                    *self.slot_mut((current, best)) = TreeSlot {
                        bounds: merged_bounds,
                        node: TreeNode::Trunk(wrapper_id),
                        is_group_head: false,
                    };
                    return;
                }
            }
        }
    }

    /// Locates `object` by descending only into slots whose bounds contain `bounds`.
    pub(crate) fn find_path(&self, object: &T, bounds: &Bounds) -> Option<SlotPath> {
        let mut path: SlotPath = Vec::new();
        // (trunk, next slot to try)
        let mut stack = vec![(self.root, 0usize)];
        while let Some(top) = stack.last_mut() {
            let (trunk_id, index) = *top;
            let trunk = self.trunk(trunk_id);
            if index >= trunk.slots.len() {
                stack.pop();
                path.pop();
                continue;
            }
            top.1 += 1;
            let slot = &trunk.slots[index];
            if !slot.bounds.contains(bounds) {
                continue;
            }
            match slot.node {
                TreeNode::Leaf(candidate) if candidate == *object => {
                    path.push((trunk_id, index));
                    return Some(path);
                }
                TreeNode::Leaf(_) => {}
                TreeNode::Trunk(child) => {
                    path.push((trunk_id, index));
                    stack.push((child, 0));
                }
            }
        }
        None
    }

    pub(crate) fn require_path(&self, object: &T, bounds: &Bounds) -> Result<SlotPath> {
        self.find_path(object, bounds)
            .ok_or_else(|| PhysicsError::not_found("tree object", (*object).into()))
    }

    pub fn contains(&self, object: &T, bounds: &Bounds) -> bool {
        self.find_path(object, bounds).is_some()
    }

    /// Stored bounds of `object`, found by a full scan.
    pub fn find_bounds(&self, object: &T) -> Option<Bounds> {
        self.iter().find(|(o, _)| o == object).map(|(_, b)| b)
    }

    pub fn remove(&mut self, object: &T, bounds: &Bounds) -> Result<()> {
        let path = self.require_path(object, bounds)?;
        self.detach_slot(&path);
        self.len -= 1;
        self.validate_if_enabled();
        Ok(())
    }

    /// Removes the slot at the end of `path` from its trunk, collapses
    /// trunks left with a single child and recomputes the bounds above.
    pub(crate) fn detach_slot(&mut self, path: &[(TrunkId, usize)]) -> TreeSlot<T> {
        let (&(trunk_id, index), ancestors) = match path.split_last() {
            Some(split) => split,
            None => panic!("cannot detach the root trunk"),
        };
        let removed = self.trunk_mut(trunk_id).slots.swap_remove(index);

        let mut child = trunk_id;
        for &(parent_id, parent_index) in ancestors.iter().rev() {
            let remaining = self.trunk(child).slots.len();
            if remaining <= 1 {
                let only = self.trunks.remove(child).and_then(|t| t.slots.into_iter().next());
                let parent_slot = self.slot_mut((parent_id, parent_index));
                match only {
                    Some(only) => {
                        let is_group_head = parent_slot.is_group_head || only.is_group_head;
                        *parent_slot = TreeSlot {
                            is_group_head,
                            ..only
                        };
                    }
                    None => {
                        // An emptied trunk disappears from its parent too; its
                        // parent's slot order shifts but no deeper level remains.
                        self.trunk_mut(parent_id).slots.swap_remove(parent_index);
                    }
                }
            } else if let Some(bounds) = self.trunk(child).bounds() {
                self.slot_mut((parent_id, parent_index)).bounds = bounds;
            }
            child = parent_id;
        }
        removed
    }

    /// Recomputes the cached bounds of every slot along `path` from the leaf up.
    pub(crate) fn refresh_path(&mut self, path: &[(TrunkId, usize)]) {
        for &(trunk_id, index) in path.iter().rev() {
            if let TreeNode::Trunk(child) = self.slot((trunk_id, index)).node {
                if let Some(bounds) = self.trunk(child).bounds() {
                    self.slot_mut((trunk_id, index)).bounds = bounds;
                }
            }
        }
    }

    /// Replaces the stored bounds of `object` (found under `old_bounds`).
    pub fn update_object_bounds(
        &mut self,
        object: &T,
        old_bounds: &Bounds,
        new_bounds: Bounds,
    ) -> Result<()> {
        let path = self.require_path(object, old_bounds)?;
        if let Some(&last) = path.last() {
            self.slot_mut(last).bounds = new_bounds;
        }
        self.refresh_path(&path);
        self.validate_if_enabled();
        Ok(())
    }

    /// Recomputes every stored bounds bottom-up; `bounds_of` supplies each object's current box.
    pub fn refresh_bounds(&mut self, mut bounds_of: impl FnMut(&T) -> Bounds) {
        let root = self.root;
        self.refresh_trunk(root, &mut bounds_of);
        self.validate_if_enabled();
    }

    pub(crate) fn refresh_trunk(
        &mut self,
        trunk_id: TrunkId,
        bounds_of: &mut impl FnMut(&T) -> Bounds,
    ) -> Option<Bounds> {
        let count = self.trunk(trunk_id).slots.len();
        for index in 0..count {
            let bounds = match self.slot((trunk_id, index)).node {
                TreeNode::Leaf(object) => Some(bounds_of(&object)),
                TreeNode::Trunk(child) => self.refresh_trunk(child, bounds_of),
            };
            if let Some(bounds) = bounds {
                self.slot_mut((trunk_id, index)).bounds = bounds;
            }
        }
        self.trunk(trunk_id).bounds()
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            trunks: self.trunks.len(),
            ..TreeStats::default()
        };
        let mut stack = vec![(self.root, 1usize)];
        while let Some((trunk_id, depth)) = stack.pop() {
            stats.max_depth = stats.max_depth.max(depth);
            for slot in &self.trunk(trunk_id).slots {
                if slot.is_group_head {
                    stats.groups += 1;
                }
                match slot.node {
                    TreeNode::Leaf(_) => stats.objects += 1,
                    TreeNode::Trunk(child) => stack.push((child, depth + 1)),
                }
            }
        }
        stats
    }

    /// Checks every structural invariant of the tree.
    pub fn validate(&self) -> std::result::Result<(), InvariantViolation> {
        let violation = |msg: String| Err(InvariantViolation(msg));
        let mut seen_objects: Vec<T> = Vec::with_capacity(self.len);
        let mut reachable_trunks = 1usize;
        // (trunk, inside a group)
        let mut stack = vec![(self.root, false)];

        while let Some((trunk_id, in_group)) = stack.pop() {
            let trunk = match self.trunks.get(trunk_id) {
                Some(trunk) => trunk,
                None => return violation(format!("dangling trunk {trunk_id}")),
            };
            if trunk.slots.len() > BRANCH_FACTOR {
                return violation(format!("trunk {trunk_id} has {} slots", trunk.slots.len()));
            }
            if trunk_id != self.root && trunk.slots.len() < 2 {
                return violation(format!(
                    "non-root trunk {trunk_id} has {} slots",
                    trunk.slots.len()
                ));
            }
            for slot in &trunk.slots {
                if in_group && slot.is_group_head {
                    return violation(format!("nested group head below trunk {trunk_id}"));
                }
                let grouped = in_group || slot.is_group_head;
                match slot.node {
                    TreeNode::Leaf(object) => {
                        if !grouped {
                            return violation(format!("orphaned leaf {object:?}"));
                        }
                        if seen_objects.contains(&object) {
                            return violation(format!("duplicate object {object:?}"));
                        }
                        seen_objects.push(object);
                    }
                    TreeNode::Trunk(child) => {
                        let child_bounds = self.trunks.get(child).and_then(TreeTrunk::bounds);
                        if child_bounds != Some(slot.bounds) {
                            return violation(format!(
                                "slot bounds {:?} differ from union {:?} of trunk {child}",
                                slot.bounds, child_bounds
                            ));
                        }
                        reachable_trunks += 1;
                        stack.push((child, grouped));
                    }
                }
            }
        }

        if seen_objects.len() != self.len {
            return violation(format!(
                "{} leaves reachable but len is {}",
                seen_objects.len(),
                self.len
            ));
        }
        if reachable_trunks != self.trunks.len() {
            return violation(format!(
                "{} trunks allocated but {} reachable",
                self.trunks.len(),
                reachable_trunks
            ));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn validate_if_enabled(&self) {
        #[cfg(feature = "validation")]
        if let Err(violation) = self.validate() {
            panic!("{violation}");
        }
    }

    pub(crate) fn adjust_len(&mut self, added: usize, removed: usize) {
        self.len = self.len + added - removed;
    }
}
