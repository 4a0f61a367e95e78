//! Global configuration constants and tunable world settings.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::{
    core::types::MixingMode,
    error::{PhysicsError, Result},
};

/// Default gravity used by [`crate::dynamics::forces::DirectionalGravity::default`] (Y-up).
pub const DEFAULT_GRAVITY: DVec3 = DVec3::new(0.0, -9.81, 0.0);

/// Default simulated time advanced by one tick (in seconds).
pub const DEFAULT_DELTA_T: f64 = 1.0 / 100.0;

/// Maximum number of children of one bounds tree trunk.
pub const BRANCH_FACTOR: usize = 8;

pub const DEFAULT_GJK_MAX_ITERATIONS: usize = 64;
pub const DEFAULT_EPA_MAX_ITERATIONS: usize = 64;

/// EPA stops once a new support point moves the boundary by less than this
/// fraction of the current distance.
pub const DEFAULT_EPA_TOLERANCE: f64 = 1e-6;

/// Empirical stiffness of the penetration-resisting force.
pub const DEFAULT_DEPTH_FORCE_MULTIPLIER: f64 = 2000.0;

/// Colissions with `|exit|² <= ratio * r²` are ignored (`r` = smaller part radius).
pub const DEFAULT_MIN_COLISSION_DEPTH_RATIO: f64 = 1e-8;

/// Sliding speed, as a fraction of the smaller part radius, above which
/// dynamic friction is fully applied.
pub const DEFAULT_DYNAMIC_FRICTION_SATURATION: f64 = 0.01;

/// Number of ticks between bounds tree structure optimisation passes.
pub const DEFAULT_IMPROVE_STRUCTURE_INTERVAL: u64 = 50;

/// Tunable parameters of a [`crate::world::PhysicsWorld`].
///
/// The collision response constants are empirical, not physical, and are
/// expected to be tuned per application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub delta_t: f64,
    pub depth_force_multiplier: f64,
    pub friction_mixing: MixingMode,
    pub restitution_mixing: MixingMode,
    pub min_colission_depth_ratio: f64,
    pub dynamic_friction_saturation: f64,
    pub improve_structure_interval: u64,
    pub gjk_max_iterations: usize,
    pub epa_max_iterations: usize,
    pub epa_tolerance: f64,
    pub parallel_narrow_phase: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            delta_t: DEFAULT_DELTA_T,
            depth_force_multiplier: DEFAULT_DEPTH_FORCE_MULTIPLIER,
            friction_mixing: MixingMode::Multiply,
            restitution_mixing: MixingMode::Multiply,
            min_colission_depth_ratio: DEFAULT_MIN_COLISSION_DEPTH_RATIO,
            dynamic_friction_saturation: DEFAULT_DYNAMIC_FRICTION_SATURATION,
            improve_structure_interval: DEFAULT_IMPROVE_STRUCTURE_INTERVAL,
            gjk_max_iterations: DEFAULT_GJK_MAX_ITERATIONS,
            epa_max_iterations: DEFAULT_EPA_MAX_ITERATIONS,
            epa_tolerance: DEFAULT_EPA_TOLERANCE,
            parallel_narrow_phase: cfg!(feature = "parallel"),
        }
    }
}

impl WorldConfig {
    pub fn with_delta_t(delta_t: f64) -> Self {
        Self {
            delta_t,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.delta_t.is_finite() && self.delta_t > 0.0) {
            return Err(PhysicsError::InvalidConfiguration(format!(
                "delta_t must be positive, got {}",
                self.delta_t
            )));
        }
        if self.depth_force_multiplier < 0.0 || self.dynamic_friction_saturation <= 0.0 {
            return Err(PhysicsError::InvalidConfiguration(
                "collision response constants must be positive".into(),
            ));
        }
        if self.gjk_max_iterations == 0 || self.epa_max_iterations == 0 {
            return Err(PhysicsError::InvalidConfiguration(
                "GJK/EPA iteration caps must be non-zero".into(),
            ));
        }
        if !(self.epa_tolerance.is_finite() && self.epa_tolerance > 0.0) {
            return Err(PhysicsError::InvalidConfiguration(
                "epa_tolerance must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(WorldConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_delta_t() {
        let err = WorldConfig::with_delta_t(0.0).validate().unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidConfiguration(_)));
    }
}
