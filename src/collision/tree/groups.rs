//! Group operations: the only way slots ever cross a group head.

use crate::{error::Result, utils::bounds::Bounds};

use super::{BoundsTree, SlotPath, TreeItem, TreeNode, TreeSlot, TreeTrunk, TrunkId};

impl<T: TreeItem> BoundsTree<T> {
    /// Depth in `path` of the group head covering the slot at its end.
    fn group_head_depth(&self, path: &SlotPath) -> usize {
        path.iter()
            .position(|&at| self.slot(at).is_group_head)
            .unwrap_or_else(|| panic!("orphaned tree slot at {:?}", path.last()))
    }

    /// Turns the group head at `at` into a trunk if it is a lone leaf and
    /// returns the trunk.
    fn head_trunk(&mut self, at: (TrunkId, usize)) -> TrunkId {
        let head = *self.slot(at);
        match head.node {
            TreeNode::Trunk(trunk) => trunk,
            TreeNode::Leaf(_) => {
                let mut trunk = TreeTrunk::new();
                trunk.slots.push(TreeSlot {
                    is_group_head: false,
                    ..head
                });
                let trunk_id = self.trunks.insert(trunk);
                let slot = &mut self.trunk_mut(at.0).slots[at.1];
                slot.node = TreeNode::Trunk(trunk_id);
                trunk_id
            }
        }
    }

    /// Places `content` inside the group headed at the end of `head_path`.
    fn insert_into_group(&mut self, head_path: &[(TrunkId, usize)], content: TreeSlot<T>) {
        let Some(&head_at) = head_path.last() else {
            return;
        };
        let trunk = self.head_trunk(head_at);
        self.place(trunk, content);
        self.refresh_path(head_path);
    }

    /// Adds `object` to the group of `representative`.
    pub fn add_to_group(
        &mut self,
        object: T,
        bounds: Bounds,
        representative: &T,
        representative_bounds: &Bounds,
    ) -> Result<()> {
        let path = self.require_path(representative, representative_bounds)?;
        let head_depth = self.group_head_depth(&path);
        self.insert_into_group(&path[..=head_depth], TreeSlot::leaf(object, bounds, false));
        self.adjust_len(1, 0);
        self.validate_if_enabled();
        Ok(())
    }

    pub fn are_in_same_group(
        &self,
        first: &T,
        first_bounds: &Bounds,
        second: &T,
        second_bounds: &Bounds,
    ) -> Result<bool> {
        let a = self.require_path(first, first_bounds)?;
        let b = self.require_path(second, second_bounds)?;
        let head_a = a[self.group_head_depth(&a)];
        let head_b = b[self.group_head_depth(&b)];
        Ok(head_a == head_b)
    }

    /// Joins the groups of two representatives into one.
    pub fn merge_groups(
        &mut self,
        first: &T,
        first_bounds: &Bounds,
        second: &T,
        second_bounds: &Bounds,
    ) -> Result<()> {
        let path_a = self.require_path(first, first_bounds)?;
        let path_b = self.require_path(second, second_bounds)?;
        let head_b_depth = self.group_head_depth(&path_b);
        if path_a[self.group_head_depth(&path_a)] == path_b[head_b_depth] {
            return Ok(());
        }

        let moved = self.detach_slot(&path_b[..=head_b_depth]);
        // Detaching may have collapsed trunks on the way to `first`.
        let path_a = self.require_path(first, first_bounds)?;
        let head_a_depth = self.group_head_depth(&path_a);
        self.insert_into_group(
            &path_a[..=head_a_depth],
            TreeSlot {
                is_group_head: false,
                ..moved
            },
        );
        self.validate_if_enabled();
        Ok(())
    }

    /// Every member of `representative`'s group with its stored bounds.
    pub fn group_members(&self, representative: &T, bounds: &Bounds) -> Result<Vec<(T, Bounds)>> {
        let path = self.require_path(representative, bounds)?;
        let head = *self.slot(path[self.group_head_depth(&path)]);
        let mut members = Vec::new();
        self.collect_leaves(&head, &mut members);
        Ok(members)
    }

    fn collect_leaves(&self, slot: &TreeSlot<T>, out: &mut Vec<(T, Bounds)>) {
        let mut stack = vec![*slot];
        while let Some(slot) = stack.pop() {
            match slot.node {
                TreeNode::Leaf(object) => out.push((object, slot.bounds)),
                TreeNode::Trunk(trunk) => stack.extend(self.trunk(trunk).slots.iter().copied()),
            }
        }
    }

    fn free_subtree(&mut self, slot: &TreeSlot<T>) {
        let mut stack = vec![*slot];
        while let Some(slot) = stack.pop() {
            if let TreeNode::Trunk(trunk) = slot.node {
                if let Some(trunk) = self.trunks.remove(trunk) {
                    stack.extend(trunk.slots);
                }
            }
        }
    }

    /// Inserts `members` as one new group.
    pub fn add_group(&mut self, members: Vec<(T, Bounds)>) {
        let count = members.len();
        let Some(head) = self.build_group(members) else {
            return;
        };
        let root = self.root;
        self.place(root, head);
        self.adjust_len(count, 0);
        self.validate_if_enabled();
    }

    fn build_group(&mut self, members: Vec<(T, Bounds)>) -> Option<TreeSlot<T>> {
        match members.len() {
            0 => None,
            1 => {
                let (object, bounds) = members[0];
                Some(TreeSlot::leaf(object, bounds, true))
            }
            _ => {
                let trunk = self.trunks.insert(TreeTrunk::new());
                for (object, bounds) in members {
                    self.place(trunk, TreeSlot::leaf(object, bounds, false));
                }
                let bounds = self.trunk(trunk).bounds()?;
                Some(TreeSlot {
                    bounds,
                    node: TreeNode::Trunk(trunk),
                    is_group_head: true,
                })
            }
        }
    }

    /// Removes the whole group of `representative` and returns its members.
    pub fn remove_group(&mut self, representative: &T, bounds: &Bounds) -> Result<Vec<(T, Bounds)>> {
        let path = self.require_path(representative, bounds)?;
        let head_depth = self.group_head_depth(&path);
        let head = self.detach_slot(&path[..=head_depth]);
        let mut members = Vec::new();
        self.collect_leaves(&head, &mut members);
        self.free_subtree(&head);
        self.adjust_len(0, members.len());
        self.validate_if_enabled();
        Ok(members)
    }

    /// Moves the group of `representative` into `destination`, keeping it one group.
    pub fn transfer_group(
        &mut self,
        destination: &mut BoundsTree<T>,
        representative: &T,
        bounds: &Bounds,
    ) -> Result<()> {
        let members = self.remove_group(representative, bounds)?;
        destination.add_group(members);
        Ok(())
    }

    /// Takes the given objects out of whatever groups they are in and makes
    /// them one new group.
    pub fn split_group(&mut self, objects: impl IntoIterator<Item = (T, Bounds)>) -> Result<()> {
        let objects: Vec<(T, Bounds)> = objects.into_iter().collect();
        for (object, bounds) in &objects {
            self.require_path(object, bounds)?;
        }
        let mut members = Vec::new();
        for (object, bounds) in objects {
            let path = self.require_path(&object, &bounds)?;
            let slot = self.detach_slot(&path);
            members.push((object, slot.bounds));
        }
        let count = members.len();
        if let Some(head) = self.build_group(members) {
            let root = self.root;
            self.place(root, head);
        }
        // Detached leaves were re-added, the object count is unchanged.
        self.adjust_len(count, count);
        self.validate_if_enabled();
        Ok(())
    }

    /// Makes `object` a group of its own.
    pub fn move_out_of_group(&mut self, object: T, bounds: Bounds) -> Result<()> {
        self.split_group(std::iter::once((object, bounds)))
    }

    /// Recomputes the stored bounds of every member of `representative`'s group.
    pub fn update_group_bounds(
        &mut self,
        representative: &T,
        representative_bounds: &Bounds,
        mut bounds_of: impl FnMut(&T) -> Bounds,
    ) -> Result<()> {
        let path = self.require_path(representative, representative_bounds)?;
        let head_depth = self.group_head_depth(&path);
        let head_at = path[head_depth];
        match self.slot(head_at).node {
            TreeNode::Leaf(object) => {
                let bounds = bounds_of(&object);
                self.trunk_mut(head_at.0).slots[head_at.1].bounds = bounds;
            }
            TreeNode::Trunk(trunk) => {
                self.refresh_trunk(trunk, &mut bounds_of);
            }
        }
        self.refresh_path(&path[..=head_depth]);
        self.validate_if_enabled();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{cube, id};
    use super::*;

    fn filled_tree(count: u32) -> BoundsTree<crate::utils::allocator::EntityId> {
        let mut tree = BoundsTree::new();
        for i in 0..count {
            tree.add(id(i), cube(i as f64 * 2.0, 0.0, 0.0, 0.5));
        }
        tree
    }

    #[test]
    fn add_to_group_links_objects() {
        let mut tree = filled_tree(20);
        let rep = cube(0.0, 0.0, 0.0, 0.5);
        tree.add_to_group(id(100), cube(1.0, 0.0, 0.0, 0.5), &id(0), &rep)
            .unwrap();
        tree.add_to_group(id(101), cube(40.0, 0.0, 0.0, 0.5), &id(0), &rep)
            .unwrap();
        tree.validate().unwrap();
        assert!(tree
            .are_in_same_group(&id(0), &rep, &id(101), &cube(40.0, 0.0, 0.0, 0.5))
            .unwrap());
        assert!(!tree
            .are_in_same_group(&id(0), &rep, &id(1), &cube(2.0, 0.0, 0.0, 0.5))
            .unwrap());
        assert_eq!(tree.group_members(&id(0), &rep).unwrap().len(), 3);
    }

    #[test]
    fn removing_group_representative_keeps_the_rest_reachable() {
        let mut tree = filled_tree(10);
        let rep = cube(0.0, 0.0, 0.0, 0.5);
        let other = cube(0.5, 0.0, 0.0, 0.5);
        tree.add_to_group(id(50), other, &id(0), &rep).unwrap();
        tree.remove(&id(0), &rep).unwrap();
        tree.validate().unwrap();
        assert!(tree.contains(&id(50), &other));
        assert_eq!(tree.group_members(&id(50), &other).unwrap().len(), 1);
    }

    #[test]
    fn merge_then_split_restores_separate_groups() {
        let mut tree = filled_tree(30);
        let b = |i: u32| cube(i as f64 * 2.0, 0.0, 0.0, 0.5);
        for i in 1..12 {
            tree.merge_groups(&id(0), &b(0), &id(i), &b(i)).unwrap();
            tree.validate().unwrap();
        }
        assert_eq!(tree.group_members(&id(5), &b(5)).unwrap().len(), 12);
        assert_eq!(tree.len(), 30);

        tree.split_group((6..12).map(|i| (id(i), b(i)))).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.len(), 30);
        assert!(tree.are_in_same_group(&id(6), &b(6), &id(11), &b(11)).unwrap());
        assert!(!tree.are_in_same_group(&id(0), &b(0), &id(6), &b(6)).unwrap());

        tree.move_out_of_group(id(3), b(3)).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.group_members(&id(3), &b(3)).unwrap().len(), 1);
        assert_eq!(tree.group_members(&id(0), &b(0)).unwrap().len(), 5);
    }

    #[test]
    fn groups_transfer_between_trees_intact() {
        let mut free = filled_tree(12);
        let mut terrain = BoundsTree::new();
        let b = |i: u32| cube(i as f64 * 2.0, 0.0, 0.0, 0.5);
        free.merge_groups(&id(2), &b(2), &id(3), &b(3)).unwrap();
        free.transfer_group(&mut terrain, &id(3), &b(3)).unwrap();
        free.validate().unwrap();
        terrain.validate().unwrap();
        assert_eq!(free.len(), 10);
        assert_eq!(terrain.len(), 2);
        assert!(terrain.are_in_same_group(&id(2), &b(2), &id(3), &b(3)).unwrap());
    }

    #[test]
    fn group_bounds_follow_moved_members() {
        let mut tree = filled_tree(16);
        let b = |i: u32| cube(i as f64 * 2.0, 0.0, 0.0, 0.5);
        tree.merge_groups(&id(0), &b(0), &id(1), &b(1)).unwrap();
        tree.update_group_bounds(&id(0), &b(0), |o| cube(o.index() as f64 * 2.0, 10.0, 0.0, 0.5))
            .unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.find_bounds(&id(1)), Some(cube(2.0, 10.0, 0.0, 0.5)));
    }
}
