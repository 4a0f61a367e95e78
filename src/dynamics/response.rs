//! Turns colissions into impulses and forces.

use glam::DVec3;

use crate::{
    collision::contact::Colission,
    config::WorldConfig,
    core::{
        part::Part,
        physical::{inertia_of_point_in_direction, Physical, PhysicalId},
    },
    utils::{allocator::Arena, fixed::Position},
};

use super::accumulator::ForceAccumulator;

/// What the response did for one colission, for the debug hook.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResponseReport {
    pub depth_force: DVec3,
    pub normal_impulse: DVec3,
    pub friction_impulse: DVec3,
    pub friction_force: DVec3,
}

/// Harmonic combination; infinite inertias act as immovable.
fn combine_inertia(a: f64, b: f64) -> f64 {
    1.0 / (1.0 / a + 1.0 / b)
}

struct Side<'a> {
    part: &'a Part,
    physical: PhysicalId,
}

impl Side<'_> {
    fn inertia_along(&self, physicals: &Arena<Physical>, point: Position, direction: DVec3) -> f64 {
        inertia_of_point_in_direction(physicals, self.physical, point, direction)
    }

    /// Velocity of the material at `point`, seen through the conveyor surface.
    fn contact_velocity(&self, physicals: &Arena<Physical>, acc: &ForceAccumulator, point: Position) -> DVec3 {
        acc.velocity_of_point(physicals, self.physical, point) - self.part.conveyor_velocity()
    }
}

/// Applies the depth force, restitution impulse, Coulomb friction impulse
/// and smoothed dynamic friction of one colission to both bodies.
///
/// The exit vector points from `part_a` into `part_b`, so `part_a` is pushed
/// along `-exit_vector`. Returns `None` when nothing was applied.
pub fn handle_colission(
    parts: &Arena<Part>,
    physicals: &Arena<Physical>,
    acc: &mut ForceAccumulator,
    colission: &Colission,
    config: &WorldConfig,
) -> Option<ResponseReport> {
    let part_a = parts.get(colission.part_a)?;
    let part_b = parts.get(colission.part_b)?;
    let a = Side {
        part: part_a,
        physical: part_a.physical()?,
    };
    let b = Side {
        part: part_b,
        physical: part_b.physical()?,
    };

    let exit = colission.exit_vector;
    let exit_sq = exit.length_squared();
    let size_order = part_a.max_radius().min(part_b.max_radius());
    if exit_sq <= config.min_colission_depth_ratio * size_order * size_order {
        return None;
    }
    let normal = exit / exit_sq.sqrt();
    let point = colission.contact;

    let combined_inertia = combine_inertia(
        a.inertia_along(physicals, point, normal),
        b.inertia_along(physicals, point, normal),
    );
    if !combined_inertia.is_finite() {
        // Both sides immovable.
        return None;
    }

    let mut report = ResponseReport {
        depth_force: -exit * (config.depth_force_multiplier * combined_inertia),
        ..ResponseReport::default()
    };
    acc.add_force(physicals, a.physical, point, report.depth_force);
    acc.add_force(physicals, b.physical, point, -report.depth_force);

    let friction = config
        .friction_mixing
        .combine(part_a.properties.friction, part_b.properties.friction);
    let bounciness = config
        .restitution_mixing
        .combine(part_a.properties.bounciness, part_b.properties.bounciness);

    let mut relative_velocity =
        a.contact_velocity(physicals, acc, point) - b.contact_velocity(physicals, acc, point);
    let closing_speed = relative_velocity.dot(exit);
    let is_impact = closing_speed > 0.0;
    if is_impact {
        let desired_change = -exit * (closing_speed / exit_sq) * (1.0 + bounciness);
        report.normal_impulse = desired_change * combined_inertia;
        acc.add_impulse(physicals, a.physical, point, report.normal_impulse);
        acc.add_impulse(physicals, b.physical, point, -report.normal_impulse);
        relative_velocity += desired_change;
    }

    let sliding_velocity = exit.cross(relative_velocity).cross(exit) / exit_sq;
    let sliding_speed = sliding_velocity.length();
    if sliding_speed < 1e-12 || friction <= 0.0 {
        return Some(report);
    }
    let sliding_direction = sliding_velocity / sliding_speed;

    if is_impact {
        let tangential_inertia = combine_inertia(
            a.inertia_along(physicals, point, sliding_direction),
            b.inertia_along(physicals, point, sliding_direction),
        );
        let stop_impulse = -sliding_velocity * tangential_inertia;
        let max_impulse = -sliding_direction * report.normal_impulse.length() * friction;
        report.friction_impulse = if stop_impulse.is_finite()
            && stop_impulse.length_squared() < max_impulse.length_squared()
        {
            stop_impulse
        } else {
            max_impulse
        };
        acc.add_impulse(physicals, a.physical, point, report.friction_impulse);
        acc.add_impulse(physicals, b.physical, point, -report.friction_impulse);
    }

    // Full strength above the saturation speed, fading linearly to zero below it.
    let friction_force = report.depth_force.length() * friction;
    let saturation = size_order * config.dynamic_friction_saturation;
    let effect = (sliding_speed / saturation).min(1.0);
    report.friction_force = -sliding_direction * friction_force * effect;
    acc.add_force(physicals, a.physical, point, report.friction_force);
    acc.add_force(physicals, b.physical, point, -report.friction_force);

    Some(report)
}
