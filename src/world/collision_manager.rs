#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    collision::{
        contact::{detect, Colission, ColissionSet},
        narrowphase::NarrowPhaseSettings,
        tree::BoundsTree,
    },
    config::WorldConfig,
    core::part::{Part, PartId},
    utils::{allocator::Arena, bounds::Bounds, fixed::Position},
};

/// Which pair of layers a broad phase candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairLayer {
    Free,
    /// First part free, second part terrain.
    Terrain,
}

/// The two spatial layers of a world and the collision pipeline over them.
///
/// Free parts can move and collide with everything. Terrain parts never
/// move on their own and are only tested against free parts.
#[derive(Debug)]
pub struct CollisionManager {
    pub(crate) free: BoundsTree<PartId>,
    pub(crate) terrain: BoundsTree<PartId>,
    pub(crate) settings: NarrowPhaseSettings,
    parallel: bool,
}

impl Default for CollisionManager {
    fn default() -> Self {
        Self::new(&WorldConfig::default())
    }
}

fn current_bounds(parts: &Arena<Part>, id: &PartId) -> Bounds {
    parts
        .get(*id)
        .map_or_else(|| Bounds::from_point(Position::ORIGIN), Part::bounds)
}

impl CollisionManager {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            free: BoundsTree::new(),
            terrain: BoundsTree::new(),
            settings: NarrowPhaseSettings::from(config),
            parallel: config.parallel_narrow_phase,
        }
    }

    pub fn free_tree(&self) -> &BoundsTree<PartId> {
        &self.free
    }

    pub fn terrain_tree(&self) -> &BoundsTree<PartId> {
        &self.terrain
    }

    pub(crate) fn layer(&self, terrain: bool) -> &BoundsTree<PartId> {
        if terrain {
            &self.terrain
        } else {
            &self.free
        }
    }

    pub(crate) fn layer_mut(&mut self, terrain: bool) -> &mut BoundsTree<PartId> {
        if terrain {
            &mut self.terrain
        } else {
            &mut self.free
        }
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    /// Pairs whose bounds overlap. Parts of one physical tree are never paired.
    pub fn candidate_pairs(&self) -> Vec<(PartId, PartId, PairLayer)> {
        let mut pairs = Vec::new();
        self.free
            .for_each_colission(|a, b| pairs.push((a, b, PairLayer::Free)));
        self.free
            .for_each_colission_between(&self.terrain, |a, b| pairs.push((a, b, PairLayer::Terrain)));
        pairs
    }

    /// Exact tests for every candidate, in parallel when enabled.
    pub fn narrow_phase(&self, parts: &Arena<Part>, candidates: &[(PartId, PartId, PairLayer)]) -> ColissionSet {
        let test = |&(a, b, layer): &(PartId, PartId, PairLayer)| -> Option<(Colission, PairLayer)> {
            detect(parts, a, b, &self.settings).map(|c| (c, layer))
        };

        #[cfg(feature = "parallel")]
        let found: Vec<(Colission, PairLayer)> = if self.parallel {
            candidates.par_iter().filter_map(test).collect()
        } else {
            candidates.iter().filter_map(test).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let found: Vec<(Colission, PairLayer)> = candidates.iter().filter_map(test).collect();

        let mut set = ColissionSet::default();
        for (colission, layer) in found {
            match layer {
                PairLayer::Free => set.free.push(colission),
                PairLayer::Terrain => set.terrain.push(colission),
            }
        }
        set
    }

    /// Re-reads every free part's bounds.
    pub(crate) fn refresh_free_bounds(&mut self, parts: &Arena<Part>) {
        self.free.refresh_bounds(|id| current_bounds(parts, id));
    }

    /// Re-reads the bounds of the group containing `part`, whose stored
    /// bounds are `stored`.
    pub(crate) fn refresh_group(
        &mut self,
        parts: &Arena<Part>,
        part: PartId,
        terrain: bool,
        stored: &Bounds,
    ) -> crate::error::Result<()> {
        self.layer_mut(terrain)
            .update_group_bounds(&part, stored, |id| current_bounds(parts, id))
    }

    /// Moves the group of `part` to the other layer.
    pub(crate) fn transfer_group(&mut self, part: PartId, stored: &Bounds, to_terrain: bool) -> crate::error::Result<()> {
        let (from, to) = if to_terrain {
            (&mut self.free, &mut self.terrain)
        } else {
            (&mut self.terrain, &mut self.free)
        };
        from.transfer_group(to, &part, stored)
    }

    pub(crate) fn improve_structure(&mut self) {
        self.free.improve_structure();
        self.terrain.improve_structure();
    }
}
