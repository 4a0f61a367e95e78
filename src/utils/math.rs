//! Additional math helpers layered on top of `glam`.

use glam::{DMat3, DQuat, DVec3};

/// Exponential map: rotation produced by angular velocity `angular` over `dt`.
pub fn angular_velocity_to_quat(angular: DVec3, dt: f64) -> DQuat {
    rotation_from_vector(angular * dt)
}

/// Rotation about `v`'s direction by `|v|` radians.
pub fn rotation_from_vector(v: DVec3) -> DQuat {
    let angle = v.length();
    if angle < 1e-12 {
        return DQuat::IDENTITY;
    }
    DQuat::from_axis_angle(v / angle, angle)
}

/// Logarithmic map, inverse of [`rotation_from_vector`].
pub fn rotation_to_vector(q: DQuat) -> DVec3 {
    let q = if q.w < 0.0 { -q } else { q };
    let (axis, angle) = q.to_axis_angle();
    if angle.abs() < 1e-12 {
        DVec3::ZERO
    } else {
        axis * angle
    }
}

/// Matrix form of `v × _`.
pub fn skew(v: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, v.z, -v.y),
        DVec3::new(-v.z, 0.0, v.x),
        DVec3::new(v.y, -v.x, 0.0),
    )
}

/// `R * I * R^T`, an inertia tensor expressed in a rotated frame.
pub fn rotate_inertia(inertia: DMat3, rotation: DQuat) -> DMat3 {
    let r = DMat3::from_quat(rotation);
    r * inertia * r.transpose()
}

/// Parallel axis theorem: inertia about a point displaced by `offset` from
/// the centre of mass.
pub fn shift_inertia(inertia: DMat3, mass: f64, offset: DVec3) -> DMat3 {
    let d2 = offset.length_squared();
    let outer = DMat3::from_cols(offset * offset.x, offset * offset.y, offset * offset.z);
    inertia + (DMat3::IDENTITY * d2 - outer) * mass
}

/// Acceleration of point `r_i` of a rigid body per unit force applied at `r_j`
/// (both relative to the centre of mass):
/// `a = F/m + (I⁻¹ (r_j × F)) × r_i`.
pub fn point_response_matrix(
    inverse_mass: f64,
    inverse_inertia: DMat3,
    r_i: DVec3,
    r_j: DVec3,
) -> DMat3 {
    DMat3::IDENTITY * inverse_mass - skew(r_i) * inverse_inertia * skew(r_j)
}

/// Some unit vector perpendicular to `v`.
pub fn any_perpendicular(v: DVec3) -> DVec3 {
    let helper = if v.x.abs() < 0.6 { DVec3::X } else { DVec3::Y };
    v.cross(helper).normalize_or_zero()
}

/// Solid box of full dimensions `size`, unit density.
pub fn box_inertia(size: DVec3, mass: f64) -> DMat3 {
    let s2 = size * size;
    DMat3::from_diagonal(DVec3::new(s2.y + s2.z, s2.x + s2.z, s2.x + s2.y) * (mass / 12.0))
}

/// Solid ellipsoid with semi-axes `radii`.
pub fn ellipsoid_inertia(radii: DVec3, mass: f64) -> DMat3 {
    let r2 = radii * radii;
    DMat3::from_diagonal(DVec3::new(r2.y + r2.z, r2.x + r2.z, r2.x + r2.y) * (mass / 5.0))
}

/// Solid elliptic cylinder along Z with semi-axes `rx`, `ry` and length `h`.
pub fn cylinder_inertia(rx: f64, ry: f64, h: f64, mass: f64) -> DMat3 {
    DMat3::from_diagonal(DVec3::new(
        mass * (ry * ry / 4.0 + h * h / 12.0),
        mass * (rx * rx / 4.0 + h * h / 12.0),
        mass * (rx * rx + ry * ry) / 4.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotation_vector_round_trips() {
        let v = DVec3::new(0.3, -0.2, 0.9);
        let back = rotation_to_vector(rotation_from_vector(v));
        assert_relative_eq!(back.x, v.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, v.z, epsilon = 1e-12);
    }

    #[test]
    fn skew_matches_cross_product() {
        let a = DVec3::new(1.0, 2.0, 3.0);
        let b = DVec3::new(-4.0, 0.5, 2.0);
        let diff = skew(a) * b - a.cross(b);
        assert!(diff.length() < 1e-12);
    }

    #[test]
    fn response_matrix_of_point_mass_is_isotropic() {
        let m = point_response_matrix(0.5, DMat3::IDENTITY, DVec3::ZERO, DVec3::ZERO);
        assert_relative_eq!(m.x_axis.x, 0.5);
        assert_relative_eq!(m.y_axis.x, 0.0);
    }
}
