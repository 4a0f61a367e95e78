//! Rigid Core – rigid-body physics simulation core for Rust.
//!
//! Parts (convex shapes with material properties) are grouped into rigid
//! physicals, physicals are joined into articulated trees, and a world
//! advances everything in fixed steps: a bounds tree broad phase, a GJK/EPA
//! narrow phase, impulse based collision response with friction and soft
//! constraint groups, then integration. Positions are fixed point so large
//! worlds keep uniform precision.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{DMat3, DQuat, DVec3};

pub use collision::{
    contact::{Colission, ColissionSet},
    queries::{Frustum, Raycast, RaycastHit, RaycastQuery},
    tree::{BoundsTree, TreeStats},
};
pub use config::WorldConfig;
pub use core::{
    constraints::{
        FixedConstraint, HardConstraint, MotorConstraint, SinusoidalMotorConstraint,
        SinusoidalPistonConstraint,
    },
    part::{Part, PartId},
    physical::{Physical, PhysicalId},
    shape::Shape,
    types::{CFrame, GlobalCFrame, MassProperties, Motion, PartProperties},
};
pub use dynamics::{
    constraint_group::{BallConstraint, ConstraintGroup, ConstraintGroupId},
    forces::{DirectionalGravity, ExternalForce, ExternalForceId, ForceContext, LinearDrag},
    links::{LinkEnd, LinkId, SoftLink},
    ForceAccumulator,
};
pub use engine::PhysicsEngine;
pub use error::{PhysicsError, Result};
pub use utils::{
    allocator::{Arena, EntityId},
    bounds::{Bounds, Ray},
    fixed::{FixedCoordinate, Position},
    profiling::TickProfile,
};
pub use world::{DebugHook, DebugVector, PhysicsWorld, TickPlan};
