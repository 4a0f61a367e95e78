//! Periodic restructuring of the bounds tree.

use crate::{config::BRANCH_FACTOR, utils::bounds::Bounds};

use super::{BoundsTree, TreeItem, TreeNode, TreeSlot, TrunkId};

/// Sibling sets up to this size try every split; larger ones sweep along
/// each axis instead of enumerating up to 2^15 masks.
const EXHAUSTIVE_SPLIT_LIMIT: usize = 10;

/// Cost of the two trunks described by `mask`, bit `i` set meaning slot `i`
/// goes to the second one.
fn split_cost<T>(combined: &[TreeSlot<T>], mask: u32) -> f64 {
    let mut sides: [Option<Bounds>; 2] = [None, None];
    for (i, slot) in combined.iter().enumerate() {
        let side = &mut sides[usize::from(mask & (1 << i) != 0)];
        *side = Some(side.map_or(slot.bounds, |b| b.union(&slot.bounds)));
    }
    sides.iter().flatten().map(Bounds::combination_cost).sum()
}

fn is_valid_split(n: usize, mask: u32) -> bool {
    let in_second = mask.count_ones() as usize;
    (2..=BRANCH_FACTOR).contains(&in_second) && (2..=BRANCH_FACTOR).contains(&(n - in_second))
}

fn keep_cheaper(best: &mut Option<(u32, f64)>, mask: u32, cost: f64) {
    match best {
        Some((_, best_cost)) if cost >= *best_cost => {}
        _ => *best = Some((mask, cost)),
    }
}

/// Best split of `combined` into two trunks of 2..=BRANCH_FACTOR slots each,
/// as a bit mask of the slots going to the second trunk.
fn best_split<T>(combined: &[TreeSlot<T>]) -> Option<(u32, f64)> {
    let n = combined.len();
    if n < 4 {
        return None;
    }
    if n > EXHAUSTIVE_SPLIT_LIMIT {
        return sweep_split(combined);
    }
    let mut best = None;
    // Slot 0 always stays in the first trunk so mirrored splits are not tried twice.
    for mask in (0..(1u32 << (n - 1))).map(|m| m << 1) {
        if is_valid_split(n, mask) {
            keep_cheaper(&mut best, mask, split_cost(combined, mask));
        }
    }
    best
}

/// Sorts the slots by centre along each axis and tries every cut point.
fn sweep_split<T>(combined: &[TreeSlot<T>]) -> Option<(u32, f64)> {
    let n = combined.len();
    let mut order: Vec<usize> = (0..n).collect();
    let mut best = None;
    for axis in 0..3 {
        order.sort_by(|&a, &b| {
            let ca = combined[a].bounds.center().to_dvec3()[axis];
            let cb = combined[b].bounds.center().to_dvec3()[axis];
            ca.total_cmp(&cb)
        });
        for cut in 2..=(n - 2) {
            let mask = order[cut..].iter().fold(0u32, |m, &i| m | (1 << i));
            if is_valid_split(n, mask) {
                keep_cheaper(&mut best, mask, split_cost(combined, mask));
            }
        }
    }
    best
}

impl<T: TreeItem> BoundsTree<T> {
    /// Reshuffles the children of intersecting sibling trunks to minimise
    /// their combined cost. Group heads move as a whole and are never
    /// opened from outside, so no group is ever split.
    pub fn improve_structure(&mut self) {
        let mut improved = 0usize;
        let mut stack = vec![self.root];
        while let Some(trunk_id) = stack.pop() {
            improved += self.improve_trunk(trunk_id);
            for slot in &self.trunk(trunk_id).slots {
                if let TreeNode::Trunk(child) = slot.node {
                    stack.push(child);
                }
            }
        }
        log::debug!("improve_structure: rebalanced {improved} sibling pairs");
        self.validate_if_enabled();
    }

    /// Returns the number of sibling pairs that were rearranged.
    fn improve_trunk(&mut self, trunk_id: TrunkId) -> usize {
        let mut improved = 0;
        let count = self.trunk(trunk_id).slots.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let (a, b) = {
                    let slots = &self.trunk(trunk_id).slots;
                    (slots[i], slots[j])
                };
                let (TreeNode::Trunk(ta), TreeNode::Trunk(tb)) = (a.node, b.node) else {
                    continue;
                };
                if a.is_group_head || b.is_group_head || !a.bounds.intersects(&b.bounds) {
                    continue;
                }
                if self.rebalance_pair(trunk_id, (i, ta), (j, tb)) {
                    improved += 1;
                }
            }
        }
        improved
    }

    fn rebalance_pair(
        &mut self,
        parent: TrunkId,
        (slot_a, trunk_a): (usize, TrunkId),
        (slot_b, trunk_b): (usize, TrunkId),
    ) -> bool {
        let combined: Vec<TreeSlot<T>> = self
            .trunk(trunk_a)
            .slots
            .iter()
            .chain(self.trunk(trunk_b).slots.iter())
            .copied()
            .collect();
        let in_b = (self.trunk(trunk_a).slots.len()..combined.len()).fold(0u32, |m, i| m | (1 << i));
        let current = split_cost(&combined, in_b);
        let Some((mask, cost)) = best_split(&combined) else {
            return false;
        };
        if cost >= current - current.abs() * 1e-9 {
            return false;
        }

        let (mut first, mut second) = (Vec::new(), Vec::new());
        for (i, slot) in combined.into_iter().enumerate() {
            if mask & (1 << i) != 0 {
                second.push(slot);
            } else {
                first.push(slot);
            }
        }
        let bounds_of = |slots: &[TreeSlot<T>]| -> Option<Bounds> {
            slots.iter().map(|s| s.bounds).reduce(|a, b| a.union(&b))
        };
        let (Some(bounds_a), Some(bounds_b)) = (bounds_of(&first), bounds_of(&second)) else {
            return false;
        };
        self.trunk_mut(trunk_a).slots = first;
        self.trunk_mut(trunk_b).slots = second;
        let parent = self.trunk_mut(parent);
        parent.slots[slot_a].bounds = bounds_a;
        parent.slots[slot_b].bounds = bounds_b;
        true
    }
}
