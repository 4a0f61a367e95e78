//! Exact convex-convex intersection: GJK to detect overlap, EPA to measure it.
//!
//! Both shapes are expressed in one shared frame, normally centred on the
//! first part, so all arithmetic stays small and local. The exit vector
//! points from the first shape into the second: translating the first shape
//! by `-exit_vector` separates the pair.

use glam::DVec3;
use log::warn;

use crate::{
    config::WorldConfig,
    core::{part::Part, shape::Shape, types::CFrame},
    utils::fixed::Position,
};

/// Iteration caps and tolerance of one narrow phase query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarrowPhaseSettings {
    pub gjk_max_iterations: usize,
    pub epa_max_iterations: usize,
    pub epa_tolerance: f64,
}

impl Default for NarrowPhaseSettings {
    fn default() -> Self {
        Self::from(&WorldConfig::default())
    }
}

impl From<&WorldConfig> for NarrowPhaseSettings {
    fn from(config: &WorldConfig) -> Self {
        Self {
            gjk_max_iterations: config.gjk_max_iterations,
            epa_max_iterations: config.epa_max_iterations,
            epa_tolerance: config.epa_tolerance,
        }
    }
}

/// A shape placed in the shared query frame.
#[derive(Debug, Clone, Copy)]
pub struct PlacedShape<'a> {
    pub shape: &'a Shape,
    pub cframe: CFrame,
}

impl<'a> PlacedShape<'a> {
    pub fn new(shape: &'a Shape, cframe: CFrame) -> Self {
        Self { shape, cframe }
    }

    pub fn support(&self, direction: DVec3) -> DVec3 {
        let local = self.cframe.relative_to_local(direction);
        self.cframe
            .local_to_global(self.shape.furthest_in_direction(local))
    }
}

/// Overlap of two shapes, in the shared query frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub contact_point: DVec3,
    pub exit_vector: DVec3,
}

/// Overlap of two parts, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartIntersection {
    pub contact_point: Position,
    pub exit_vector: DVec3,
}

/// Point of the Minkowski difference `A - B` with the shape points it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SupportPoint {
    point: DVec3,
    on_a: DVec3,
    on_b: DVec3,
}

fn support(a: &PlacedShape<'_>, b: &PlacedShape<'_>, direction: DVec3) -> SupportPoint {
    let on_a = a.support(direction);
    let on_b = b.support(-direction);
    SupportPoint {
        point: on_a - on_b,
        on_a,
        on_b,
    }
}

/// Runs the full query for two parts of the world.
pub fn intersect_parts(
    first: &Part,
    second: &Part,
    settings: &NarrowPhaseSettings,
) -> Option<PartIntersection> {
    let offset = second.position() - first.position();
    let reach = first.max_radius() + second.max_radius();
    if offset.length_squared() > reach * reach {
        return None;
    }

    let a = PlacedShape::new(&first.shape, CFrame::from_rotation(first.cframe().rotation));
    let b = PlacedShape::new(
        &second.shape,
        CFrame::new(offset, second.cframe().rotation),
    );
    GJKAlgorithm::intersect(&a, &b, offset, settings).map(|hit| PartIntersection {
        contact_point: first.position() + hit.contact_point,
        exit_vector: hit.exit_vector,
    })
}

/// Gilbert-Johnson-Keerthi overlap test.
pub struct GJKAlgorithm;

/// Simplex of up to four support points; `a` is always the newest.
struct Simplex {
    a: SupportPoint,
    b: SupportPoint,
    c: SupportPoint,
    d: SupportPoint,
    dimension: usize,
}

impl Simplex {
    /// New point `a` against the segment `b c`.
    fn update_triangle(&mut self, search: &mut DVec3) {
        let (a, b, c) = (self.a.point, self.b.point, self.c.point);
        let normal = (b - a).cross(c - a);
        let to_origin = -a;

        self.dimension = 2;
        if (b - a).cross(normal).dot(to_origin) > 0.0 {
            self.c = self.a;
            *search = (b - a).cross(to_origin).cross(b - a);
            return;
        }
        if normal.cross(c - a).dot(to_origin) > 0.0 {
            self.b = self.a;
            *search = (c - a).cross(to_origin).cross(c - a);
            return;
        }

        self.dimension = 3;
        if normal.dot(to_origin) > 0.0 {
            self.d = self.c;
            self.c = self.b;
            self.b = self.a;
            *search = normal;
        } else {
            self.d = self.b;
            self.b = self.a;
            *search = -normal;
        }
    }

    /// New point `a` against the triangle `b c d`; true once the origin is enclosed.
    fn update_tetrahedron(&mut self, search: &mut DVec3) -> bool {
        let (a, b, c, d) = (self.a.point, self.b.point, self.c.point, self.d.point);
        let abc = (b - a).cross(c - a);
        let acd = (c - a).cross(d - a);
        let adb = (d - a).cross(b - a);
        let to_origin = -a;

        self.dimension = 3;
        if abc.dot(to_origin) > 0.0 {
            self.d = self.c;
            self.c = self.b;
            self.b = self.a;
            *search = abc;
            return false;
        }
        if acd.dot(to_origin) > 0.0 {
            self.b = self.a;
            *search = acd;
            return false;
        }
        if adb.dot(to_origin) > 0.0 {
            self.c = self.d;
            self.d = self.b;
            self.b = self.a;
            *search = adb;
            return false;
        }
        true
    }
}

impl GJKAlgorithm {
    const EPSILON: f64 = 1e-30;

    /// Exact overlap of two convex shapes, `None` when they are apart.
    pub fn intersect(
        a: &PlacedShape<'_>,
        b: &PlacedShape<'_>,
        hint: DVec3,
        settings: &NarrowPhaseSettings,
    ) -> Option<Intersection> {
        let tetrahedron = Self::enclose_origin(a, b, hint, settings.gjk_max_iterations)?;
        EPAAlgorithm::compute_penetration(a, b, tetrahedron, settings)
    }

    /// A tetrahedron of support points containing the origin, if the shapes overlap.
    fn enclose_origin(
        a: &PlacedShape<'_>,
        b: &PlacedShape<'_>,
        hint: DVec3,
        max_iterations: usize,
    ) -> Option<[SupportPoint; 4]> {
        let mut search = if hint.length_squared() > Self::EPSILON {
            hint
        } else {
            DVec3::X
        };

        let first = support(a, b, search);
        search = -first.point;
        let second = support(a, b, search);
        if second.point.dot(search) < 0.0 {
            return None;
        }

        let edge = first.point - second.point;
        search = edge.cross(-second.point).cross(edge);
        if search.length_squared() < Self::EPSILON {
            // Origin on the segment: any perpendicular will do.
            search = edge.cross(DVec3::X);
            if search.length_squared() < Self::EPSILON {
                search = edge.cross(DVec3::Z);
            }
        }

        let mut simplex = Simplex {
            a: second,
            b: second,
            c: first,
            d: first,
            dimension: 2,
        };

        for _ in 0..max_iterations {
            simplex.a = support(a, b, search);
            if simplex.a.point.dot(search) < 0.0 {
                return None;
            }

            simplex.dimension += 1;
            if simplex.dimension == 3 {
                simplex.update_triangle(&mut search);
            } else if simplex.update_tetrahedron(&mut search) {
                return Some([simplex.a, simplex.b, simplex.c, simplex.d]);
            }
        }

        warn!("GJK hit its {max_iterations} iteration cap, treating pair as separated");
        None
    }
}

/// Expanding polytope algorithm for the exit vector.
struct EPAAlgorithm;

#[derive(Debug, Clone, Copy)]
struct Face {
    indices: [usize; 3],
    normal: DVec3,
    distance: f64,
}

impl EPAAlgorithm {
    fn compute_penetration(
        a: &PlacedShape<'_>,
        b: &PlacedShape<'_>,
        tetrahedron: [SupportPoint; 4],
        settings: &NarrowPhaseSettings,
    ) -> Option<Intersection> {
        let mut polytope: Vec<SupportPoint> = tetrahedron.to_vec();
        // Stays inside the polytope as it only ever grows.
        let interior = tetrahedron.iter().map(|p| p.point).sum::<DVec3>() / 4.0;
        let mut faces = Self::build_initial_faces(&polytope, interior);
        if faces.len() < 4 {
            // Flat simplex: the origin lies on its plane, the shapes only touch.
            return None;
        }

        for _ in 0..settings.epa_max_iterations {
            let closest = Self::find_closest_face(&faces)?;
            let candidate = support(a, b, closest.normal);
            let gap = candidate.point.dot(closest.normal) - closest.distance;
            if gap <= settings.epa_tolerance * closest.distance.abs().max(1e-9) {
                return Some(Self::contact(&polytope, &closest));
            }
            Self::expand_polytope(&mut polytope, &mut faces, candidate, interior);
            if faces.is_empty() {
                return Some(Self::contact(&polytope, &closest));
            }
        }

        warn!(
            "EPA hit its {} iteration cap, using the closest face found",
            settings.epa_max_iterations
        );
        Self::find_closest_face(&faces).map(|face| Self::contact(&polytope, &face))
    }

    fn make_face(polytope: &[SupportPoint], indices: [usize; 3], interior: DVec3) -> Option<Face> {
        let [i, j, k] = indices;
        let (p0, p1, p2) = (polytope[i].point, polytope[j].point, polytope[k].point);
        let normal = (p1 - p0).cross(p2 - p0).normalize_or_zero();
        if normal == DVec3::ZERO {
            return None;
        }
        // Wind every face outward.
        let (normal, indices) = if normal.dot(p0 - interior) < 0.0 {
            (-normal, [i, k, j])
        } else {
            (normal, indices)
        };
        Some(Face {
            indices,
            normal,
            distance: normal.dot(p0),
        })
    }

    fn build_initial_faces(polytope: &[SupportPoint], interior: DVec3) -> Vec<Face> {
        [[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 3, 2]]
            .into_iter()
            .filter_map(|indices| Self::make_face(polytope, indices, interior))
            .collect()
    }

    fn find_closest_face(faces: &[Face]) -> Option<Face> {
        faces
            .iter()
            .copied()
            .min_by(|x, y| x.distance.total_cmp(&y.distance))
    }

    fn expand_polytope(
        polytope: &mut Vec<SupportPoint>,
        faces: &mut Vec<Face>,
        support: SupportPoint,
        interior: DVec3,
    ) {
        let new_index = polytope.len();
        polytope.push(support);

        // Edges bordering the hole left by the faces the new point can see.
        let mut loose_edges: Vec<(usize, usize)> = Vec::new();
        faces.retain(|face| {
            let visible = face
                .normal
                .dot(support.point - polytope[face.indices[0]].point)
                > 0.0;
            if visible {
                for n in 0..3 {
                    let edge = (face.indices[n], face.indices[(n + 1) % 3]);
                    match loose_edges
                        .iter()
                        .position(|&(from, to)| from == edge.1 && to == edge.0)
                    {
                        Some(shared) => {
                            loose_edges.swap_remove(shared);
                        }
                        None => loose_edges.push(edge),
                    }
                }
            }
            !visible
        });

        faces.extend(
            loose_edges
                .into_iter()
                .filter_map(|(from, to)| Self::make_face(polytope, [from, to, new_index], interior)),
        );
    }

    fn contact(polytope: &[SupportPoint], face: &Face) -> Intersection {
        let [p0, p1, p2] = face.indices.map(|i| polytope[i]);
        let projected = face.normal * face.distance;
        let (u, v, w) = barycentric(projected, p0.point, p1.point, p2.point);
        let on_a = p0.on_a * u + p1.on_a * v + p2.on_a * w;
        let on_b = p0.on_b * u + p1.on_b * v + p2.on_b * w;
        Intersection {
            contact_point: (on_a + on_b) * 0.5,
            exit_vector: projected,
        }
    }
}

fn barycentric(p: DVec3, a: DVec3, b: DVec3, c: DVec3) -> (f64, f64, f64) {
    let (v0, v1, v2) = (b - a, c - a, p - a);
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-300 {
        return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    (1.0 - v - w, v, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DQuat;

    fn query(a: &Shape, a_at: CFrame, b: &Shape, b_at: CFrame) -> Option<Intersection> {
        let settings = NarrowPhaseSettings::default();
        GJKAlgorithm::intersect(
            &PlacedShape::new(a, a_at),
            &PlacedShape::new(b, b_at),
            b_at.position - a_at.position,
            &settings,
        )
    }

    #[test]
    fn overlapping_cubes_exit_along_shallow_axis() {
        let cube = Shape::cuboid(1.0, 1.0, 1.0);
        let hit = query(
            &cube,
            CFrame::IDENTITY,
            &cube,
            CFrame::from_position(DVec3::new(0.9, 0.2, -0.1)),
        )
        .expect("cubes overlap");
        assert_relative_eq!(hit.exit_vector.x, 0.1, epsilon = 1e-6);
        assert!(hit.exit_vector.y.abs() < 1e-6 && hit.exit_vector.z.abs() < 1e-6);
        assert!(hit.contact_point.x > 0.35 && hit.contact_point.x < 0.55);
    }

    #[test]
    fn separated_shapes_do_not_collide() {
        let sphere = Shape::sphere(0.5);
        let cube = Shape::cuboid(1.0, 1.0, 1.0);
        assert!(query(
            &sphere,
            CFrame::IDENTITY,
            &cube,
            CFrame::new(DVec3::new(1.2, 0.3, 0.0), DQuat::from_rotation_z(0.3))
        )
        .is_none());
    }

    #[test]
    fn sphere_pair_depth_matches_geometry() {
        let sphere = Shape::sphere(1.0);
        let hit = query(
            &sphere,
            CFrame::IDENTITY,
            &sphere,
            CFrame::from_position(DVec3::new(0.0, 1.5, 0.0)),
        )
        .expect("spheres overlap");
        assert_relative_eq!(hit.exit_vector.length(), 0.5, epsilon = 1e-2);
        assert!(hit.exit_vector.normalize().y > 0.99);
    }
}
