use crate::utils::bounds::Bounds;

use super::{BoundsTree, TreeItem, TreeNode, TrunkId};

/// Depth-first walk over the leaves whose bounds, and whose ancestors'
/// bounds, satisfy `filter`. Subtrees failing the filter are skipped whole.
pub struct FilteredIter<'a, T, F> {
    tree: &'a BoundsTree<T>,
    stack: Vec<(TrunkId, usize)>,
    filter: F,
}

/// Unfiltered walk over every object.
pub type TreeIter<'a, T> = FilteredIter<'a, T, fn(&Bounds) -> bool>;

fn accept_all(_: &Bounds) -> bool {
    true
}

impl<'a, T: TreeItem, F: FnMut(&Bounds) -> bool> Iterator for FilteredIter<'a, T, F> {
    type Item = (T, Bounds);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let (trunk_id, index) = *top;
            let slots = &self.tree.trunk(trunk_id).slots;
            if index >= slots.len() {
                self.stack.pop();
                continue;
            }
            top.1 += 1;
            let slot = slots[index];
            if !(self.filter)(&slot.bounds) {
                continue;
            }
            match slot.node {
                TreeNode::Leaf(object) => return Some((object, slot.bounds)),
                TreeNode::Trunk(child) => self.stack.push((child, 0)),
            }
        }
    }
}

impl<T: TreeItem> BoundsTree<T> {
    pub fn iter(&self) -> TreeIter<'_, T> {
        self.iter_filtered(accept_all as fn(&Bounds) -> bool)
    }

    pub fn iter_filtered<F: FnMut(&Bounds) -> bool>(&self, filter: F) -> FilteredIter<'_, T, F> {
        FilteredIter {
            tree: self,
            stack: vec![(self.root, 0)],
            filter,
        }
    }

    /// Objects whose bounds intersect `region`.
    pub fn iter_intersecting(&self, region: Bounds) -> FilteredIter<'_, T, impl FnMut(&Bounds) -> bool> {
        self.iter_filtered(move |b: &Bounds| b.intersects(&region))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{cube, id};
    use super::*;

    #[test]
    fn filtered_iteration_matches_brute_force() {
        let mut tree = BoundsTree::new();
        let mut all = Vec::new();
        for i in 0..200u32 {
            let b = cube((i % 17) as f64 * 1.5, (i % 7) as f64, (i / 17) as f64 * 1.5, 0.6);
            tree.add(id(i), b);
            all.push((id(i), b));
        }
        assert_eq!(tree.iter().count(), 200);

        let region = cube(5.0, 2.0, 5.0, 3.0);
        let mut expected: Vec<_> = all
            .iter()
            .filter(|(_, b)| b.intersects(&region))
            .map(|(o, _)| *o)
            .collect();
        let mut found: Vec<_> = tree.iter_intersecting(region).map(|(o, _)| o).collect();
        expected.sort();
        found.sort();
        assert_eq!(found, expected);
    }
}
