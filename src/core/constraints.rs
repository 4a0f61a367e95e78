//! Hard constraints: joints that prescribe how a connected physical moves
//! relative to its parent.
//!
//! A constraint maps the attachment frame on the parent to the attachment
//! frame on the child. All current implementations act about or along the
//! local Z axis of the parent attachment.

use std::{f64::consts::TAU, fmt::Debug};

use glam::{DQuat, DVec3};

use super::types::{CFrame, Motion};

pub trait HardConstraint: Debug + Send + Sync {
    /// Advances the constraint's internal state by one tick.
    fn update(&mut self, delta_t: f64);

    /// Child attachment frame relative to the parent attachment frame.
    fn relative_cframe(&self) -> CFrame;

    /// Motion of the child attachment frame, expressed in the parent attachment frame.
    fn relative_motion(&self) -> Motion;

    /// Relative degrees of freedom the joint permits.
    fn degrees_of_freedom(&self) -> usize;
}

/// Welds two physicals together.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedConstraint;

impl HardConstraint for FixedConstraint {
    fn update(&mut self, _delta_t: f64) {}

    fn relative_cframe(&self) -> CFrame {
        CFrame::IDENTITY
    }

    fn relative_motion(&self) -> Motion {
        Motion::ZERO
    }

    fn degrees_of_freedom(&self) -> usize {
        0
    }
}

/// Spins the child at a constant angular speed (rad/s) about Z.
#[derive(Debug, Clone, Copy)]
pub struct MotorConstraint {
    pub speed: f64,
    angle: f64,
}

impl MotorConstraint {
    pub fn new(speed: f64) -> Self {
        Self { speed, angle: 0.0 }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }
}

impl HardConstraint for MotorConstraint {
    fn update(&mut self, delta_t: f64) {
        self.angle = (self.angle + self.speed * delta_t).rem_euclid(TAU);
    }

    fn relative_cframe(&self) -> CFrame {
        CFrame::from_rotation(DQuat::from_rotation_z(self.angle))
    }

    fn relative_motion(&self) -> Motion {
        Motion::new(DVec3::ZERO, DVec3::new(0.0, 0.0, self.speed))
    }

    fn degrees_of_freedom(&self) -> usize {
        1
    }
}

/// Shared oscillator state of the sinusoidal constraints.
#[derive(Debug, Clone, Copy)]
struct Oscillator {
    min: f64,
    max: f64,
    period: f64,
    time: f64,
}

impl Oscillator {
    fn new(min: f64, max: f64, period: f64) -> Self {
        Self {
            min,
            max,
            period: period.abs().max(f64::EPSILON),
            time: 0.0,
        }
    }

    fn advance(&mut self, delta_t: f64) {
        self.time = (self.time + delta_t).rem_euclid(self.period);
    }

    fn phase(&self) -> f64 {
        TAU * self.time / self.period
    }

    fn value(&self) -> f64 {
        let mid = (self.min + self.max) * 0.5;
        let amplitude = (self.max - self.min) * 0.5;
        mid + amplitude * self.phase().sin()
    }

    fn rate(&self) -> f64 {
        let amplitude = (self.max - self.min) * 0.5;
        amplitude * TAU / self.period * self.phase().cos()
    }
}

/// Swings the child back and forth between two angles about Z.
#[derive(Debug, Clone, Copy)]
pub struct SinusoidalMotorConstraint {
    oscillator: Oscillator,
}

impl SinusoidalMotorConstraint {
    pub fn new(min_angle: f64, max_angle: f64, period: f64) -> Self {
        Self {
            oscillator: Oscillator::new(min_angle, max_angle, period),
        }
    }

    pub fn angle(&self) -> f64 {
        self.oscillator.value()
    }
}

impl HardConstraint for SinusoidalMotorConstraint {
    fn update(&mut self, delta_t: f64) {
        self.oscillator.advance(delta_t);
    }

    fn relative_cframe(&self) -> CFrame {
        CFrame::from_rotation(DQuat::from_rotation_z(self.oscillator.value()))
    }

    fn relative_motion(&self) -> Motion {
        Motion::new(DVec3::ZERO, DVec3::new(0.0, 0.0, self.oscillator.rate()))
    }

    fn degrees_of_freedom(&self) -> usize {
        1
    }
}

/// Slides the child along Z between two extensions.
#[derive(Debug, Clone, Copy)]
pub struct SinusoidalPistonConstraint {
    oscillator: Oscillator,
}

impl SinusoidalPistonConstraint {
    pub fn new(min_length: f64, max_length: f64, period: f64) -> Self {
        Self {
            oscillator: Oscillator::new(min_length, max_length, period),
        }
    }

    pub fn length(&self) -> f64 {
        self.oscillator.value()
    }
}

impl HardConstraint for SinusoidalPistonConstraint {
    fn update(&mut self, delta_t: f64) {
        self.oscillator.advance(delta_t);
    }

    fn relative_cframe(&self) -> CFrame {
        CFrame::from_position(DVec3::new(0.0, 0.0, self.oscillator.value()))
    }

    fn relative_motion(&self) -> Motion {
        Motion::new(DVec3::new(0.0, 0.0, self.oscillator.rate()), DVec3::ZERO)
    }

    fn degrees_of_freedom(&self) -> usize {
        1
    }
}
