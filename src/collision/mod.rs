//! Collision detection: bounds tree broad phase, GJK/EPA narrow phase, colission records, queries.

pub mod contact;
pub mod narrowphase;
pub mod queries;
pub mod tree;

pub use contact::{Colission, ColissionSet};
pub use narrowphase::{GJKAlgorithm, Intersection, NarrowPhaseSettings, PartIntersection, PlacedShape};
pub use queries::{Frustum, Plane, Raycast, RaycastHit, RaycastQuery};
pub use tree::{BoundsTree, TreeStats};
