//! Core types describing parts, physicals and the data they share.

pub mod constraints;
pub mod part;
pub mod physical;
pub mod shape;
pub mod types;

pub use constraints::{
    FixedConstraint, HardConstraint, MotorConstraint, SinusoidalMotorConstraint,
    SinusoidalPistonConstraint,
};
pub use part::{Part, PartId};
pub use physical::{
    AttachedPart, ConnectedPhysical, HardPhysicalConnection, MotorizedPhysical, Physical,
    PhysicalId, PhysicalKind,
};
pub use shape::{Polyhedron, Shape, ShapeClass};
pub use types::{CFrame, GlobalCFrame, MassProperties, MixingMode, Motion, PartProperties};
