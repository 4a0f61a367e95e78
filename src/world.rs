//! The simulated world: parts, physicals, their spatial index and the tick.
//!
//! A tick is split in two halves so that a caller holding a shared lock can
//! run the expensive read-only half while other readers keep going:
//! [`PhysicsWorld::compute_tick`] only reads the world and produces a
//! [`TickPlan`]; [`PhysicsWorld::apply_tick`] consumes it under exclusive
//! access. [`PhysicsWorld::tick`] runs both back to back.

pub mod collision_manager;
pub mod dynamics_manager;
mod structure;

use std::time::Instant;

use glam::DVec3;

use crate::{
    collision::{
        contact::{Colission, ColissionSet},
        queries::{parts_in_bounds, parts_in_frustum, parts_outside, Frustum, Raycast, RaycastHit, RaycastQuery},
        tree::{InvariantViolation, TreeStats},
    },
    config::WorldConfig,
    core::{
        part::{Part, PartId},
        physical::{inertia_of_point_in_direction, tree_parts, Physical, PhysicalId},
    },
    dynamics::{
        accumulator::ForceAccumulator,
        constraint_group::{ConstraintGroup, ConstraintGroupId},
        forces::{ExternalForce, ExternalForceId, ForceContext},
        integrator::Integrator,
        links::{LinkId, SoftLink},
        response::{handle_colission, ResponseReport},
    },
    error::{PhysicsError, Result},
    utils::{
        allocator::Arena,
        bounds::Bounds,
        fixed::Position,
        logging::{warn_if_tick_budget_exceeded, ScopedTimer},
        profiling::{PhaseTimer, TickProfile},
    },
};

pub use collision_manager::{CollisionManager, PairLayer};
pub use dynamics_manager::DynamicsManager;

/// Kinds of vectors reported to a [`DebugHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugVector {
    ExitVector,
    DepthForce,
    NormalImpulse,
    FrictionImpulse,
    FrictionForce,
}

/// Receives the vectors produced while handling colissions, e.g. to draw them.
pub trait DebugHook: Send + Sync {
    fn vector(&self, kind: DebugVector, origin: Position, vector: DVec3);
}

/// Output of the read-only half of a tick.
#[derive(Debug, Default)]
pub struct TickPlan {
    pub accumulator: ForceAccumulator,
    pub colissions: ColissionSet,
    profile: TickProfile,
}

/// Central simulation container.
pub struct PhysicsWorld {
    pub(crate) parts: Arena<Part>,
    pub(crate) physicals: Arena<Physical>,
    pub(crate) collision: CollisionManager,
    pub(crate) dynamics: DynamicsManager,
    config: WorldConfig,
    integrator: Integrator,
    age: u64,
    colissions: ColissionSet,
    profile: TickProfile,
    debug_hook: Option<Box<dyn DebugHook>>,
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("parts", &self.parts.len())
            .field("physicals", &self.physicals.len())
            .field("age", &self.age)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::build(WorldConfig::default(), None)
    }
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    pub fn with_debug_hook(config: WorldConfig, hook: Box<dyn DebugHook>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Some(hook)))
    }

    fn build(config: WorldConfig, debug_hook: Option<Box<dyn DebugHook>>) -> Self {
        Self {
            parts: Arena::new(),
            physicals: Arena::new(),
            collision: CollisionManager::new(&config),
            dynamics: DynamicsManager::new(),
            integrator: Integrator::new(config.delta_t),
            config,
            age: 0,
            colissions: ColissionSet::default(),
            profile: TickProfile::default(),
            debug_hook,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn delta_t(&self) -> f64 {
        self.config.delta_t
    }

    /// Number of completed ticks.
    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.config.parallel_narrow_phase = enabled;
        self.collision.set_parallel(enabled);
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    pub fn physical(&self, id: PhysicalId) -> Option<&Physical> {
        self.physicals.get(id)
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> + '_ {
        self.parts.values()
    }

    pub fn physicals(&self) -> impl Iterator<Item = &Physical> + '_ {
        self.physicals.values()
    }

    /// Roots of every physical tree.
    pub fn motorized_physicals(&self) -> impl Iterator<Item = &Physical> + '_ {
        self.physicals.values().filter(|p| p.is_motorized())
    }

    /// Every part of the tree `part` belongs to.
    pub fn parts_of_tree(&self, part: PartId) -> Result<Vec<PartId>> {
        let root = self.root_of(part)?;
        Ok(tree_parts(&self.physicals, root))
    }

    pub fn colissions(&self) -> &ColissionSet {
        &self.colissions
    }

    /// Phase timings of the last tick.
    pub fn profile(&self) -> &TickProfile {
        &self.profile
    }

    pub fn collision_manager(&self) -> &CollisionManager {
        &self.collision
    }

    pub fn dynamics_manager(&self) -> &DynamicsManager {
        &self.dynamics
    }

    pub fn tree_stats(&self) -> (TreeStats, TreeStats) {
        (self.collision.free.stats(), self.collision.terrain.stats())
    }

    // Registries.

    pub fn add_external_force<F: ExternalForce + 'static>(&mut self, force: F) -> ExternalForceId {
        self.dynamics.add_external_force(force)
    }

    pub fn remove_external_force(&mut self, id: ExternalForceId) -> Result<Box<dyn ExternalForce>> {
        self.dynamics.remove_external_force(id)
    }

    pub fn add_link(&mut self, link: SoftLink) -> Result<LinkId> {
        self.part_ref(link.a.part)?;
        self.part_ref(link.b.part)?;
        Ok(self.dynamics.add_link(link))
    }

    pub fn remove_link(&mut self, id: LinkId) -> Result<SoftLink> {
        self.dynamics.remove_link(id)
    }

    pub fn add_constraint_group(&mut self, group: ConstraintGroup) -> Result<ConstraintGroupId> {
        for constraint in &group.constraints {
            for physical in [constraint.a, constraint.b] {
                if !self.physicals.contains(physical) {
                    return Err(PhysicsError::not_found("physical", physical));
                }
            }
        }
        Ok(self.dynamics.add_constraint_group(group))
    }

    pub fn remove_constraint_group(&mut self, id: ConstraintGroupId) -> Result<ConstraintGroup> {
        self.dynamics.remove_constraint_group(id)
    }

    // Queries.

    pub fn point_velocity(&self, part: PartId, point: Position) -> Result<DVec3> {
        let physical = self.physical_of(part)?;
        self.physicals
            .get(physical)
            .map(|p| p.velocity_of_point(point))
            .ok_or_else(|| PhysicsError::not_found("physical", physical))
    }

    /// Effective mass felt when pushing `part`'s tree at `point` along `direction`.
    pub fn inertia_of_point_in_direction(&self, part: PartId, point: Position, direction: DVec3) -> Result<f64> {
        let physical = self.physical_of(part)?;
        Ok(inertia_of_point_in_direction(
            &self.physicals,
            physical,
            point,
            direction.normalize_or_zero(),
        ))
    }

    pub fn parts_in_bounds(&self, region: Bounds) -> Vec<PartId> {
        parts_in_bounds(&self.collision.free, region)
            .chain(parts_in_bounds(&self.collision.terrain, region))
            .collect()
    }

    pub fn parts_in_frustum(&self, frustum: &Frustum) -> Vec<PartId> {
        parts_in_frustum(&self.collision.free, frustum)
            .chain(parts_in_frustum(&self.collision.terrain, frustum))
            .collect()
    }

    /// Free parts that left `region`, e.g. everything that fell off the world.
    pub fn free_parts_outside(&self, region: Bounds) -> Vec<PartId> {
        parts_outside(&self.collision.free, region).collect()
    }

    pub fn raycast(&self, query: &RaycastQuery) -> Option<RaycastHit> {
        let free = Raycast::closest(query, &self.collision.free, &self.parts);
        let terrain = Raycast::closest(query, &self.collision.terrain, &self.parts);
        match (free, terrain) {
            (Some(a), Some(b)) => Some(if a.distance <= b.distance { a } else { b }),
            (a, b) => a.or(b),
        }
    }

    pub fn raycast_all(&self, query: &RaycastQuery) -> Vec<RaycastHit> {
        let mut hits = Raycast::cast(query, &self.collision.free, &self.parts);
        hits.extend(Raycast::cast(query, &self.collision.terrain, &self.parts));
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    // Tick.

    /// Advances the world by one fixed step.
    pub fn tick(&mut self) {
        let plan = self.compute_tick();
        self.apply_tick(plan);
    }

    /// Read-only half of a tick: forces, broad and narrow phase, response
    /// and constraint groups. The world is left untouched.
    pub fn compute_tick(&self) -> TickPlan {
        let start = Instant::now();
        let mut profile = TickProfile {
            part_count: self.parts.len(),
            ..TickProfile::default()
        };
        let ctx = ForceContext {
            parts: &self.parts,
            physicals: &self.physicals,
            delta_t: self.config.delta_t,
        };
        let mut acc = ForceAccumulator::new();

        {
            let _timer = ScopedTimer::new("tick::external_forces");
            let _phase = PhaseTimer::new(&mut profile.external_forces);
            self.dynamics.apply_forces(&ctx, &mut acc);
            self.dynamics.apply_links(&ctx, &mut acc);
        }

        let candidates = {
            let _timer = ScopedTimer::new("tick::broad_phase");
            let _phase = PhaseTimer::new(&mut profile.broad_phase);
            self.collision.candidate_pairs()
        };
        profile.candidate_pairs = candidates.len();

        let colissions = {
            let _timer = ScopedTimer::new("tick::narrow_phase");
            let _phase = PhaseTimer::new(&mut profile.narrow_phase);
            self.collision.narrow_phase(&self.parts, &candidates)
        };
        profile.colission_count = colissions.len();

        {
            let _timer = ScopedTimer::new("tick::response");
            let _phase = PhaseTimer::new(&mut profile.response);
            for colission in colissions.iter() {
                let report = handle_colission(&self.parts, &self.physicals, &mut acc, colission, &self.config);
                if let (Some(hook), Some(report)) = (&self.debug_hook, report) {
                    report_vectors(hook.as_ref(), colission, &report);
                }
            }
        }

        {
            let _timer = ScopedTimer::new("tick::constraints");
            let _phase = PhaseTimer::new(&mut profile.constraints);
            self.dynamics.solve_constraint_groups(&ctx, &mut acc);
        }

        profile.total = start.elapsed();
        TickPlan {
            accumulator: acc,
            colissions,
            profile,
        }
    }

    /// Exclusive half of a tick: applies the plan, integrates every tree and
    /// brings the spatial index up to date.
    pub fn apply_tick(&mut self, plan: TickPlan) {
        let start = Instant::now();
        let TickPlan {
            accumulator,
            colissions,
            mut profile,
        } = plan;

        {
            let _timer = ScopedTimer::new("tick::integrate");
            let _phase = PhaseTimer::new(&mut profile.integration);
            accumulator.apply(&mut self.physicals);
            let roots: Vec<PhysicalId> = self
                .physicals
                .iter()
                .filter(|(_, p)| p.is_motorized())
                .map(|(id, _)| id)
                .collect();
            for root in roots {
                if let Err(err) = self.integrator.step_tree(&mut self.physicals, &mut self.parts, root) {
                    invariant_broken(&err);
                }
            }
        }

        {
            let _timer = ScopedTimer::new("tick::refresh");
            let _phase = PhaseTimer::new(&mut profile.refresh);
            self.collision.refresh_free_bounds(&self.parts);
            if self.terrain_has_joints() {
                let parts = &self.parts;
                self.collision
                    .terrain
                    .refresh_bounds(|id| parts.get(*id).map_or_else(|| Bounds::from_point(Position::ORIGIN), Part::bounds));
            }
            self.age += 1;
            let interval = self.config.improve_structure_interval;
            if interval > 0 && self.age % interval == 0 {
                self.collision.improve_structure();
            }
        }

        self.colissions = colissions;
        profile.total += start.elapsed();
        profile.report();
        warn_if_tick_budget_exceeded(profile.total, self.config.delta_t);
        self.profile = profile;
    }

    fn terrain_has_joints(&self) -> bool {
        self.physicals.values().any(|p| {
            !p.children().is_empty()
                && p.main_part()
                    .and_then(|id| self.parts.get(id))
                    .is_some_and(Part::is_terrain)
        })
    }

    /// Checks the spatial index and the physical trees against each other.
    pub fn validate(&self) -> std::result::Result<(), InvariantViolation> {
        self.collision.free.validate()?;
        self.collision.terrain.validate()?;
        let violation = |msg: String| Err(InvariantViolation(msg));

        for (id, part) in self.parts.iter() {
            let Some(physical) = part.physical().and_then(|p| self.physicals.get(p)) else {
                return violation(format!("part {id} has no physical"));
            };
            if !physical.contains_part(id) {
                return violation(format!("physical {} does not list part {id}", physical.id));
            }
            let layer = self.collision.layer(part.is_terrain());
            if layer.find_bounds(&id) != Some(part.bounds()) {
                return violation(format!("part {id} has stale or missing bounds in its layer"));
            }
        }

        for (id, physical) in self.physicals.iter() {
            let Some(root) = self.physicals.get(physical.root()) else {
                return violation(format!("physical {id} points at a missing root"));
            };
            if !root.is_motorized() {
                return violation(format!("root {} of physical {id} is not motorized", root.id));
            }
            if physical.is_motorized() {
                let parts = tree_parts(&self.physicals, id);
                let Some(&first) = parts.first() else {
                    return violation(format!("physical tree {id} has no parts"));
                };
                let Some(first_part) = self.parts.get(first) else {
                    return violation(format!("physical tree {id} holds missing part {first}"));
                };
                let layer = self.collision.layer(first_part.is_terrain());
                for other in &parts[1..] {
                    let Some(other_part) = self.parts.get(*other) else {
                        return violation(format!("physical tree {id} holds missing part {other}"));
                    };
                    let same = layer
                        .are_in_same_group(&first, &first_part.bounds(), other, &other_part.bounds())
                        .unwrap_or(false);
                    if !same {
                        return violation(format!("parts {first} and {other} of tree {id} are in different groups"));
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn validate_if_enabled(&self) {
        #[cfg(feature = "validation")]
        if let Err(violation) = self.validate() {
            panic!("{violation}");
        }
    }
}

fn report_vectors(hook: &dyn DebugHook, colission: &Colission, report: &ResponseReport) {
    let at = colission.contact;
    hook.vector(DebugVector::ExitVector, at, colission.exit_vector);
    hook.vector(DebugVector::DepthForce, at, report.depth_force);
    if report.normal_impulse != DVec3::ZERO {
        hook.vector(DebugVector::NormalImpulse, at, report.normal_impulse);
    }
    if report.friction_impulse != DVec3::ZERO {
        hook.vector(DebugVector::FrictionImpulse, at, report.friction_impulse);
    }
    if report.friction_force != DVec3::ZERO {
        hook.vector(DebugVector::FrictionForce, at, report.friction_force);
    }
}

/// Errors that can only come from a corrupted world structure.
fn invariant_broken(err: &PhysicsError) {
    if cfg!(feature = "validation") {
        panic!("world invariant broken during tick: {err}");
    }
    log::warn!("world invariant broken during tick: {err}");
}
