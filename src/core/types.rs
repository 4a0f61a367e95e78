use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::utils::{
    fixed::Position,
    math::{rotate_inertia, shift_inertia},
};

/// Relative coordinate frame: translation and rotation in `f64` space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CFrame {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Default for CFrame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl CFrame {
    pub const IDENTITY: Self = Self {
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: DVec3) -> Self {
        Self {
            position,
            rotation: DQuat::IDENTITY,
        }
    }

    pub fn from_rotation(rotation: DQuat) -> Self {
        Self {
            position: DVec3::ZERO,
            rotation,
        }
    }

    pub fn local_to_global(&self, local: DVec3) -> DVec3 {
        self.position + self.rotation * local
    }

    pub fn global_to_local(&self, global: DVec3) -> DVec3 {
        self.rotation.inverse() * (global - self.position)
    }

    /// Rotates a direction out of this frame.
    pub fn local_to_relative(&self, local: DVec3) -> DVec3 {
        self.rotation * local
    }

    pub fn relative_to_local(&self, relative: DVec3) -> DVec3 {
        self.rotation.inverse() * relative
    }

    /// `other` expressed in this frame's parent space.
    pub fn combine(&self, other: &CFrame) -> CFrame {
        CFrame {
            position: self.local_to_global(other.position),
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn inverse(&self) -> CFrame {
        let rotation = self.rotation.inverse();
        CFrame {
            position: rotation * -self.position,
            rotation,
        }
    }
}

/// Coordinate frame anchored in fixed-point world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalCFrame {
    pub position: Position,
    pub rotation: DQuat,
}

impl Default for GlobalCFrame {
    fn default() -> Self {
        Self {
            position: Position::ORIGIN,
            rotation: DQuat::IDENTITY,
        }
    }
}

impl GlobalCFrame {
    pub fn new(position: Position, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Position) -> Self {
        Self {
            position,
            rotation: DQuat::IDENTITY,
        }
    }

    pub fn local_to_global(&self, local: DVec3) -> Position {
        self.position + self.rotation * local
    }

    pub fn global_to_local(&self, global: Position) -> DVec3 {
        self.rotation.inverse() * (global - self.position)
    }

    pub fn local_to_relative(&self, local: DVec3) -> DVec3 {
        self.rotation * local
    }

    pub fn relative_to_local(&self, relative: DVec3) -> DVec3 {
        self.rotation.inverse() * relative
    }

    pub fn local_to_global_cframe(&self, local: &CFrame) -> GlobalCFrame {
        GlobalCFrame {
            position: self.local_to_global(local.position),
            rotation: (self.rotation * local.rotation).normalize(),
        }
    }

    pub fn global_to_local_cframe(&self, global: &GlobalCFrame) -> CFrame {
        let inverse = self.rotation.inverse();
        CFrame {
            position: inverse * (global.position - self.position),
            rotation: (inverse * global.rotation).normalize(),
        }
    }

    pub fn translated(&self, offset: DVec3) -> GlobalCFrame {
        GlobalCFrame {
            position: self.position + offset,
            rotation: self.rotation,
        }
    }

    /// Applies `rotation` about the world point `center`.
    pub fn rotated_around(&self, center: Position, rotation: DQuat) -> GlobalCFrame {
        let arm = self.position - center;
        GlobalCFrame {
            position: center + rotation * arm,
            rotation: (rotation * self.rotation).normalize(),
        }
    }
}

/// Linear and angular velocity, the linear part taken at some reference point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Motion {
    pub velocity: DVec3,
    pub angular_velocity: DVec3,
}

impl Motion {
    pub const ZERO: Self = Self {
        velocity: DVec3::ZERO,
        angular_velocity: DVec3::ZERO,
    };

    pub fn new(velocity: DVec3, angular_velocity: DVec3) -> Self {
        Self {
            velocity,
            angular_velocity,
        }
    }

    /// Velocity of a point at `offset` from the reference point.
    pub fn velocity_of_point(&self, offset: DVec3) -> DVec3 {
        self.velocity + self.angular_velocity.cross(offset)
    }

    /// The same rigid motion with its reference point moved by `offset`.
    pub fn translated(&self, offset: DVec3) -> Motion {
        Motion {
            velocity: self.velocity_of_point(offset),
            angular_velocity: self.angular_velocity,
        }
    }
}

/// Mass, centre of mass and inertia (about the centre of mass) of a body,
/// expressed in the body's own frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f64,
    pub center_of_mass: DVec3,
    pub inertia: DMat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self::ZERO
    }
}

impl MassProperties {
    pub const ZERO: Self = Self {
        mass: 0.0,
        center_of_mass: DVec3::ZERO,
        inertia: DMat3::ZERO,
    };

    /// Same body seen from a parent frame in which it sits at `placement`.
    pub fn transformed(&self, placement: &CFrame) -> MassProperties {
        MassProperties {
            mass: self.mass,
            center_of_mass: placement.local_to_global(self.center_of_mass),
            inertia: rotate_inertia(self.inertia, placement.rotation),
        }
    }

    /// Combines bodies that are all expressed in the same frame.
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a MassProperties> + Clone) -> MassProperties {
        let mass: f64 = parts.clone().into_iter().map(|p| p.mass).sum();
        if mass <= 0.0 {
            return MassProperties::ZERO;
        }
        let center_of_mass = parts
            .clone()
            .into_iter()
            .fold(DVec3::ZERO, |acc, p| acc + p.center_of_mass * p.mass)
            / mass;
        let inertia = parts.into_iter().fold(DMat3::ZERO, |acc, p| {
            acc + shift_inertia(p.inertia, p.mass, p.center_of_mass - center_of_mass)
        });
        MassProperties {
            mass,
            center_of_mass,
            inertia,
        }
    }
}

/// Material and surface properties of a part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartProperties {
    pub density: f64,
    pub friction: f64,
    /// Restitution.
    pub bounciness: f64,
    /// Surface velocity in the part's local frame, as on a conveyor belt.
    pub conveyor_effect: DVec3,
}

impl Default for PartProperties {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.7,
            bounciness: 0.3,
            conveyor_effect: DVec3::ZERO,
        }
    }
}

impl PartProperties {
    pub fn new(density: f64, friction: f64, bounciness: f64) -> Self {
        Self {
            density,
            friction,
            bounciness,
            conveyor_effect: DVec3::ZERO,
        }
    }

    pub fn frictionless(density: f64) -> Self {
        Self::new(density, 0.0, 0.0)
    }
}

/// How two coefficients of touching materials are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MixingMode {
    #[default]
    Multiply,
    Average,
    Min,
    Max,
    GeometricMean,
}

impl MixingMode {
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            MixingMode::Multiply => a * b,
            MixingMode::Average => 0.5 * (a + b),
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a.abs() * b.abs()).sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mixing_modes_combine_expected_values() {
        assert_relative_eq!(MixingMode::Multiply.combine(0.6, 0.5), 0.3);
        assert_relative_eq!(MixingMode::Average.combine(0.6, 0.2), 0.4);
        assert_relative_eq!(MixingMode::Min.combine(0.6, 0.2), 0.2);
        assert_relative_eq!(MixingMode::Max.combine(0.6, 0.2), 0.6);
        assert_relative_eq!(
            MixingMode::GeometricMean.combine(0.6, 0.2),
            (0.6_f64 * 0.2).sqrt()
        );
    }

    #[test]
    fn cframe_inverse_undoes_combine() {
        let a = CFrame::new(
            DVec3::new(1.0, 2.0, 3.0),
            DQuat::from_rotation_y(0.7) * DQuat::from_rotation_x(-0.2),
        );
        let identity = a.combine(&a.inverse());
        assert!(identity.position.length() < 1e-12);
        assert!(identity.rotation.angle_between(DQuat::IDENTITY) < 1e-9);
    }

    #[test]
    fn global_cframe_round_trips_local_frames() {
        let base = GlobalCFrame::new(Position::new(1.0e6, 0.0, -3.0), DQuat::from_rotation_z(1.0));
        let local = CFrame::new(DVec3::new(0.5, -0.25, 2.0), DQuat::from_rotation_x(0.3));
        let back = base.global_to_local_cframe(&base.local_to_global_cframe(&local));
        assert!((back.position - local.position).length() < 1e-6);
        assert!(back.rotation.angle_between(local.rotation) < 1e-9);
    }

    #[test]
    fn combining_two_offset_masses_uses_parallel_axis() {
        let point = MassProperties {
            mass: 1.0,
            center_of_mass: DVec3::ZERO,
            inertia: DMat3::ZERO,
        };
        let left = point.transformed(&CFrame::from_position(DVec3::new(-1.0, 0.0, 0.0)));
        let right = point.transformed(&CFrame::from_position(DVec3::new(1.0, 0.0, 0.0)));
        let both = MassProperties::combine([&left, &right]);
        assert_relative_eq!(both.mass, 2.0);
        assert!(both.center_of_mass.length() < 1e-12);
        assert_relative_eq!(both.inertia.y_axis.y, 2.0);
        assert_relative_eq!(both.inertia.x_axis.x, 0.0);
    }
}
