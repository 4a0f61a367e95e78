//! Broad phase: pairs of leaves with intersecting bounds.

use super::{BoundsTree, TreeItem, TreeNode, TreeSlot, TrunkId};

enum Work<T> {
    /// All pairs between different children of this trunk, and below them.
    Within(TrunkId),
    /// All pairs between the two subtrees.
    Between(TreeSlot<T>, TreeSlot<T>),
}

impl<T: TreeItem> BoundsTree<T> {
    /// Calls `on_pair` for every two objects of different groups whose bounds intersect.
    pub fn for_each_colission(&self, mut on_pair: impl FnMut(T, T)) {
        let mut stack = vec![Work::Within(self.root)];
        while let Some(work) = stack.pop() {
            match work {
                Work::Within(trunk_id) => {
                    let slots = &self.trunk(trunk_id).slots;
                    for (i, a) in slots.iter().enumerate() {
                        if let TreeNode::Trunk(child) = a.node {
                            // Nothing under a group head may collide with itself.
                            if !a.is_group_head {
                                stack.push(Work::Within(child));
                            }
                        }
                        for b in &slots[i + 1..] {
                            if a.bounds.intersects(&b.bounds) {
                                stack.push(Work::Between(*a, *b));
                            }
                        }
                    }
                }
                Work::Between(a, b) => {
                    between(self, self, a, b, &mut stack, &mut on_pair);
                }
            }
        }
    }

    /// Calls `on_pair(mine, theirs)` for every intersecting pair across two trees.
    pub fn for_each_colission_between(&self, other: &BoundsTree<T>, mut on_pair: impl FnMut(T, T)) {
        let mut stack = Vec::new();
        for a in &self.trunk(self.root).slots {
            for b in &other.trunk(other.root).slots {
                if a.bounds.intersects(&b.bounds) {
                    stack.push(Work::Between(*a, *b));
                }
            }
        }
        while let Some(work) = stack.pop() {
            if let Work::Between(a, b) = work {
                between(self, other, a, b, &mut stack, &mut on_pair);
            }
        }
    }

    pub fn colission_pairs(&self) -> Vec<(T, T)> {
        let mut pairs = Vec::new();
        self.for_each_colission(|a, b| pairs.push((a, b)));
        pairs
    }
}

/// Expands one intersecting pair of subtrees; `a` lives in `tree_a`, `b` in `tree_b`.
fn between<T: TreeItem>(
    tree_a: &BoundsTree<T>,
    tree_b: &BoundsTree<T>,
    a: TreeSlot<T>,
    b: TreeSlot<T>,
    stack: &mut Vec<Work<T>>,
    on_pair: &mut impl FnMut(T, T),
) {
    match (a.node, b.node) {
        (TreeNode::Leaf(x), TreeNode::Leaf(y)) => on_pair(x, y),
        (TreeNode::Trunk(ta), TreeNode::Trunk(tb)) => {
            // Split the larger side so both shrink at a similar rate.
            if a.bounds.combination_cost() >= b.bounds.combination_cost() {
                push_children(tree_a, ta, &b, stack, false);
            } else {
                push_children(tree_b, tb, &a, stack, true);
            }
        }
        (TreeNode::Trunk(ta), TreeNode::Leaf(_)) => push_children(tree_a, ta, &b, stack, false),
        (TreeNode::Leaf(_), TreeNode::Trunk(tb)) => push_children(tree_b, tb, &a, stack, true),
    }
}

/// Pairs every child of `trunk` that touches `other` with `other`. With
/// `flipped`, the children belong to the second side of the pair.
fn push_children<T: TreeItem>(
    tree: &BoundsTree<T>,
    trunk: TrunkId,
    other: &TreeSlot<T>,
    stack: &mut Vec<Work<T>>,
    flipped: bool,
) {
    for child in &tree.trunk(trunk).slots {
        if child.bounds.intersects(&other.bounds) {
            stack.push(if flipped {
                Work::Between(*other, *child)
            } else {
                Work::Between(*child, *other)
            });
        }
    }
}
