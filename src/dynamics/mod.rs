//! Simulation dynamics: force accumulation, external forces, soft links,
//! collision response, constraint groups and integration.

pub mod accumulator;
pub mod constraint_group;
pub mod forces;
pub mod integrator;
pub mod links;
pub mod response;

pub use accumulator::{BodyDelta, ForceAccumulator};
pub use constraint_group::{BallConstraint, ConstraintGroup, ConstraintGroupId};
pub use forces::{
    DirectionalGravity, ExternalForce, ExternalForceId, ForceContext, ForceRegistry, LinearDrag,
};
pub use integrator::Integrator;
pub use links::{LinkEnd, LinkId, LinkKind, SoftLink};
pub use response::{handle_colission, ResponseReport};
