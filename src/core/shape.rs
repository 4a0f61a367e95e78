//! Convex collision geometry.
//!
//! A [`Shape`] is a [`ShapeClass`] (a canonical unit-sized geometry) stretched
//! by a per-axis scale. Canonical forms:
//! - `Box`: the cube `[-0.5, 0.5]³`
//! - `Sphere`: diameter 1, centred on the origin
//! - `Cylinder`: diameter 1 in X/Y, length 1 along Z, centred on the origin
//! - `Polyhedron`: the vertices given at construction
//!
//! Everything here works in the shape's local frame; callers place it with a
//! CFrame.

use std::{f64::consts::PI, sync::Arc};

use glam::{DMat3, DQuat, DVec3};

use crate::{
    error::{PhysicsError, Result},
    utils::{
        bounds::Bounds,
        math::{box_inertia, cylinder_inertia, ellipsoid_inertia},
    },
};

use super::types::GlobalCFrame;

/// Closed, outward or inward wound triangle mesh of a convex solid.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyhedron {
    vertices: Vec<DVec3>,
    triangles: Vec<[u32; 3]>,
    volume: f64,
    center_of_mass: DVec3,
    /// Unit density second moment `∫ r rᵀ dV` about the centre of mass.
    covariance: DMat3,
}

impl Polyhedron {
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        if vertices.len() < 4 || triangles.len() < 4 {
            return Err(PhysicsError::InvalidShape(format!(
                "polyhedron needs at least 4 vertices and 4 triangles, got {} and {}",
                vertices.len(),
                triangles.len()
            )));
        }
        if let Some(bad) = triangles
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertices.len())
        {
            return Err(PhysicsError::InvalidShape(format!(
                "triangle index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }

        let mut volume = 0.0;
        let mut weighted_center = DVec3::ZERO;
        let mut covariance = DMat3::ZERO;
        for tri in &triangles {
            let [a, b, c] = tri.map(|i| vertices[i as usize]);
            let v = a.dot(b.cross(c)) / 6.0;
            let sum = a + b + c;
            volume += v;
            weighted_center += sum * (v / 4.0);
            covariance += (outer(a) + outer(b) + outer(c) + outer(sum)) * (v / 20.0);
        }

        if volume.abs() < 1e-12 {
            return Err(PhysicsError::InvalidShape(
                "polyhedron encloses no volume".into(),
            ));
        }
        let center_of_mass = weighted_center / volume;
        covariance -= outer(center_of_mass) * volume;
        if volume < 0.0 {
            volume = -volume;
            covariance = covariance * -1.0;
        }

        Ok(Self {
            vertices,
            triangles,
            volume,
            center_of_mass,
            covariance,
        })
    }

    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn center_of_mass(&self) -> DVec3 {
        self.center_of_mass
    }
}

fn outer(v: DVec3) -> DMat3 {
    DMat3::from_cols(v * v.x, v * v.y, v * v.z)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeClass {
    Box,
    Sphere,
    Cylinder,
    Polyhedron(Arc<Polyhedron>),
}

/// Immutable convex geometry: a class stretched by `scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub class: ShapeClass,
    pub scale: DVec3,
}

impl Shape {
    pub fn new(class: ShapeClass, scale: DVec3) -> Self {
        Self { class, scale }
    }

    pub fn cuboid(width: f64, height: f64, depth: f64) -> Self {
        Self::new(ShapeClass::Box, DVec3::new(width, height, depth))
    }

    pub fn sphere(radius: f64) -> Self {
        Self::new(ShapeClass::Sphere, DVec3::splat(radius * 2.0))
    }

    /// Cylinder along the local Z axis.
    pub fn cylinder(radius: f64, length: f64) -> Self {
        Self::new(
            ShapeClass::Cylinder,
            DVec3::new(radius * 2.0, radius * 2.0, length),
        )
    }

    pub fn polyhedron(polyhedron: Arc<Polyhedron>) -> Self {
        Self::new(ShapeClass::Polyhedron(polyhedron), DVec3::ONE)
    }

    pub fn with_scale(&self, scale: DVec3) -> Self {
        Self::new(self.class.clone(), scale)
    }

    pub fn volume(&self) -> f64 {
        let product = self.scale.x * self.scale.y * self.scale.z;
        match &self.class {
            ShapeClass::Box => product,
            ShapeClass::Sphere => PI / 6.0 * product,
            ShapeClass::Cylinder => PI / 4.0 * product,
            ShapeClass::Polyhedron(poly) => poly.volume * product,
        }
    }

    pub fn center_of_mass(&self) -> DVec3 {
        match &self.class {
            ShapeClass::Polyhedron(poly) => poly.center_of_mass * self.scale,
            _ => DVec3::ZERO,
        }
    }

    /// Inertia tensor about the centre of mass for the given density.
    pub fn inertia(&self, density: f64) -> DMat3 {
        let mass = self.volume() * density;
        let s = self.scale;
        match &self.class {
            ShapeClass::Box => box_inertia(s, mass),
            ShapeClass::Sphere => ellipsoid_inertia(s * 0.5, mass),
            ShapeClass::Cylinder => cylinder_inertia(s.x * 0.5, s.y * 0.5, s.z, mass),
            ShapeClass::Polyhedron(poly) => {
                let stretch = DMat3::from_diagonal(s);
                let covariance =
                    stretch * poly.covariance * stretch * (s.x * s.y * s.z * density);
                let trace = covariance.x_axis.x + covariance.y_axis.y + covariance.z_axis.z;
                DMat3::IDENTITY * trace - covariance
            }
        }
    }

    /// Radius of the smallest origin-centred sphere containing the shape.
    pub fn max_radius(&self) -> f64 {
        let s = self.scale.abs();
        match &self.class {
            ShapeClass::Box => (s * 0.5).length(),
            ShapeClass::Sphere => s.max_element() * 0.5,
            ShapeClass::Cylinder => DVec3::new(s.x.max(s.y) * 0.5, 0.0, s.z * 0.5).length(),
            ShapeClass::Polyhedron(poly) => poly
                .vertices
                .iter()
                .map(|v| (*v * s).length())
                .fold(0.0, f64::max),
        }
    }

    /// Support point: the point of the shape furthest along `direction`.
    pub fn furthest_in_direction(&self, direction: DVec3) -> DVec3 {
        let s = self.scale;
        match &self.class {
            ShapeClass::Box => {
                let half = s * 0.5;
                DVec3::new(
                    half.x.copysign(direction.x),
                    half.y.copysign(direction.y),
                    half.z.copysign(direction.z),
                )
            }
            ShapeClass::Sphere => {
                let radii = s * 0.5;
                let stretched = radii * direction;
                let len = stretched.length();
                if len < 1e-300 {
                    DVec3::new(radii.x, 0.0, 0.0)
                } else {
                    radii * stretched / len
                }
            }
            ShapeClass::Cylinder => {
                let (rx, ry) = (s.x * 0.5, s.y * 0.5);
                let lateral_len = ((rx * direction.x).powi(2) + (ry * direction.y).powi(2)).sqrt();
                let (x, y) = if lateral_len < 1e-300 {
                    (0.0, 0.0)
                } else {
                    (
                        rx * rx * direction.x / lateral_len,
                        ry * ry * direction.y / lateral_len,
                    )
                };
                DVec3::new(x, y, (s.z * 0.5).copysign(direction.z))
            }
            ShapeClass::Polyhedron(poly) => {
                let mut best = DVec3::ZERO;
                let mut best_dot = f64::NEG_INFINITY;
                for v in &poly.vertices {
                    let p = *v * s;
                    let dot = p.dot(direction);
                    if dot > best_dot {
                        best_dot = dot;
                        best = p;
                    }
                }
                best
            }
        }
    }

    /// Extents `(min, max)` of the shape rotated by `rotation`, relative to its origin.
    pub fn rotated_extents(&self, rotation: DQuat) -> (DVec3, DVec3) {
        if let ShapeClass::Box = self.class {
            let half = self.scale.abs() * 0.5;
            let m = DMat3::from_quat(rotation);
            let abs = DMat3::from_cols(m.x_axis.abs(), m.y_axis.abs(), m.z_axis.abs());
            let reach = abs * half;
            return (-reach, reach);
        }

        let inverse = rotation.inverse();
        let mut min = DVec3::ZERO;
        let mut max = DVec3::ZERO;
        for (axis, unit) in [DVec3::X, DVec3::Y, DVec3::Z].into_iter().enumerate() {
            max[axis] = (rotation * self.furthest_in_direction(inverse * unit))[axis];
            min[axis] = (rotation * self.furthest_in_direction(inverse * -unit))[axis];
        }
        (min, max)
    }

    /// World-space bounds of the shape placed at `cframe`.
    pub fn bounds(&self, cframe: &GlobalCFrame) -> Bounds {
        let (min, max) = self.rotated_extents(cframe.rotation);
        Bounds::new(cframe.position + min, cframe.position + max)
    }

    pub fn contains_point(&self, local: DVec3) -> bool {
        let s = self.scale.abs();
        match &self.class {
            ShapeClass::Box => (local.abs() - s * 0.5).max_element() <= 0.0,
            ShapeClass::Sphere => (local / (s * 0.5)).length_squared() <= 1.0,
            ShapeClass::Cylinder => {
                let radial = DVec3::new(local.x * 2.0 / s.x, local.y * 2.0 / s.y, 0.0);
                radial.length_squared() <= 1.0 && local.z.abs() <= s.z * 0.5
            }
            ShapeClass::Polyhedron(poly) => {
                let inside = poly.center_of_mass * self.scale;
                poly.triangles.iter().all(|tri| {
                    let [a, b, c] = tri.map(|i| poly.vertices[i as usize] * self.scale);
                    let normal = (b - a).cross(c - a);
                    normal.dot(local - a) * normal.dot(inside - a) >= 0.0
                })
            }
        }
    }

    /// Smallest `t >= 0` at which `origin + t * direction` (local frame) enters the shape.
    pub fn intersect_ray(&self, origin: DVec3, direction: DVec3) -> Option<f64> {
        let s = self.scale.abs();
        match &self.class {
            ShapeClass::Box => slab(origin, direction, -s * 0.5, s * 0.5),
            ShapeClass::Sphere => {
                let inv = (s * 0.5).recip();
                unit_sphere_hit(origin * inv, direction * inv)
            }
            ShapeClass::Cylinder => {
                let inv = DVec3::new(2.0 / s.x, 2.0 / s.y, 1.0);
                let (o, d) = (origin * inv, direction * inv);
                let (z_enter, z_exit) = slab_axis(o.z, d.z, -s.z * 0.5, s.z * 0.5)?;
                let (c_enter, c_exit) = unit_circle_span(o, d)?;
                let enter = z_enter.max(c_enter).max(0.0);
                (enter <= z_exit.min(c_exit)).then_some(enter)
            }
            ShapeClass::Polyhedron(poly) => poly
                .triangles
                .iter()
                .filter_map(|tri| {
                    let [a, b, c] = tri.map(|i| poly.vertices[i as usize] * self.scale);
                    ray_triangle(origin, direction, a, b, c)
                })
                .fold(None, |best: Option<f64>, t| Some(best.map_or(t, |b| b.min(t)))),
        }
    }
}

fn slab_axis(origin: f64, direction: f64, lo: f64, hi: f64) -> Option<(f64, f64)> {
    if direction.abs() < 1e-300 {
        return (origin >= lo && origin <= hi).then_some((f64::NEG_INFINITY, f64::INFINITY));
    }
    let (t0, t1) = ((lo - origin) / direction, (hi - origin) / direction);
    Some((t0.min(t1), t0.max(t1)))
}

fn slab(origin: DVec3, direction: DVec3, lo: DVec3, hi: DVec3) -> Option<f64> {
    let mut enter = 0.0_f64;
    let mut exit = f64::INFINITY;
    for axis in 0..3 {
        let (t0, t1) = slab_axis(origin[axis], direction[axis], lo[axis], hi[axis])?;
        enter = enter.max(t0);
        exit = exit.min(t1);
        if enter > exit {
            return None;
        }
    }
    Some(enter)
}

fn unit_sphere_hit(origin: DVec3, direction: DVec3) -> Option<f64> {
    let a = direction.length_squared();
    let b = origin.dot(direction);
    let c = origin.length_squared() - 1.0;
    if c <= 0.0 {
        return Some(0.0);
    }
    let disc = b * b - a * c;
    if disc < 0.0 || a == 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / a;
    (t >= 0.0).then_some(t)
}

/// Parameter span inside the infinite unit cylinder around Z.
fn unit_circle_span(origin: DVec3, direction: DVec3) -> Option<(f64, f64)> {
    let a = direction.x * direction.x + direction.y * direction.y;
    let b = origin.x * direction.x + origin.y * direction.y;
    let c = origin.x * origin.x + origin.y * origin.y - 1.0;
    if a < 1e-300 {
        return (c <= 0.0).then_some((f64::NEG_INFINITY, f64::INFINITY));
    }
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    Some(((-b - root) / a, (-b + root) / a))
}

/// Möller–Trumbore, double sided.
fn ray_triangle(origin: DVec3, direction: DVec3, a: DVec3, b: DVec3, c: DVec3) -> Option<f64> {
    let ab = b - a;
    let ac = c - a;
    let p = direction.cross(ac);
    let det = ab.dot(p);
    if det.abs() < 1e-14 {
        return None;
    }
    let inv_det = 1.0 / det;
    let to_origin = origin - a;
    let u = to_origin.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = to_origin.cross(ab);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = ac.dot(q) * inv_det;
    (t >= 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube_polyhedron() -> Polyhedron {
        let vertices = (0..8)
            .map(|i| {
                DVec3::new(
                    if i & 1 == 0 { -0.5 } else { 0.5 },
                    if i & 2 == 0 { -0.5 } else { 0.5 },
                    if i & 4 == 0 { -0.5 } else { 0.5 },
                )
            })
            .collect();
        let triangles = vec![
            [0, 2, 1], [1, 2, 3], [4, 5, 6], [5, 7, 6],
            [0, 1, 4], [1, 5, 4], [2, 6, 3], [3, 6, 7],
            [0, 4, 2], [2, 4, 6], [1, 3, 5], [3, 7, 5],
        ];
        Polyhedron::new(vertices, triangles).expect("closed cube")
    }

    #[test]
    fn polyhedron_cube_matches_box_mass_properties() {
        let poly = Shape::polyhedron(Arc::new(unit_cube_polyhedron())).with_scale(DVec3::new(2.0, 1.0, 3.0));
        let cuboid = Shape::cuboid(2.0, 1.0, 3.0);
        assert_relative_eq!(poly.volume(), cuboid.volume(), epsilon = 1e-12);
        assert!(poly.center_of_mass().length() < 1e-12);
        let (a, b) = (poly.inertia(2.5), cuboid.inertia(2.5));
        for (ca, cb) in [(a.x_axis, b.x_axis), (a.y_axis, b.y_axis), (a.z_axis, b.z_axis)] {
            assert!((ca - cb).length() < 1e-9, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn rejects_out_of_range_triangles() {
        let vertices = vec![DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::Z];
        let err = Polyhedron::new(vertices, vec![[0, 1, 9]; 4]).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidShape(_)));
    }

    #[test]
    fn support_points_lie_on_surface() {
        let sphere = Shape::sphere(2.0);
        let p = sphere.furthest_in_direction(DVec3::new(0.0, 3.0, 0.0));
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);

        let cylinder = Shape::cylinder(1.0, 4.0);
        let p = cylinder.furthest_in_direction(DVec3::new(1.0, 0.0, 1.0));
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn rotated_box_bounds_grow() {
        let cube = Shape::cuboid(1.0, 1.0, 1.0);
        let (min, max) = cube.rotated_extents(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_4));
        assert_relative_eq!(max.x, 0.5 * 2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(min.z, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn rays_hit_each_class_at_the_surface() {
        let origin = DVec3::new(-5.0, 0.0, 0.0);
        let dir = DVec3::X;
        let poly = Shape::polyhedron(Arc::new(unit_cube_polyhedron()));
        let cases = [
            (Shape::cuboid(1.0, 1.0, 1.0), 4.5),
            (Shape::sphere(1.0), 4.0),
            (Shape::cylinder(0.5, 1.0), 4.5),
            (poly, 4.5),
        ];
        for (shape, expected) in cases {
            let t = shape.intersect_ray(origin, dir).expect("ray aims at the shape");
            assert_relative_eq!(t, expected, epsilon = 1e-9);
            assert!(shape.intersect_ray(origin, -dir).is_none());
        }
    }
}
