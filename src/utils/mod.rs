//! Utility helpers: fixed-point coordinates, bounds, arenas, math, logging.

pub mod allocator;
pub mod bounds;
pub mod fixed;
pub mod linalg;
pub mod logging;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, EntityId, GenerationalId};
pub use bounds::{Bounds, Ray};
pub use fixed::{FixedCoordinate, Position};
pub use math::*;
