//! Error types for the simulation core.

use thiserror::Error;

use crate::utils::allocator::EntityId;

/// Failures surfaced by fallible world, tree and registry operations.
///
/// Invariant violations inside the bounds tree and misuse of the world lock
/// are not represented here: they are programmer errors and panic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// The object is not stored where the caller said it would be.
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: EntityId },
    /// A shape description cannot describe a solid convex body.
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A dense constraint system had no unique solution.
    #[error("singular {size}x{size} constraint system")]
    SingularSystem { size: usize },
    /// The request contradicts the current world structure.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl PhysicsError {
    pub fn not_found(what: &'static str, id: EntityId) -> Self {
        Self::NotFound { what, id }
    }
}

/// Convenient Result type alias for fallible core operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
