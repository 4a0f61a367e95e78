//! Spatial queries over the bounds tree: rays, frustums and regions.

use glam::DVec3;

use crate::{
    core::{
        part::{Part, PartId},
        types::GlobalCFrame,
    },
    utils::{
        allocator::Arena,
        bounds::{Bounds, Ray},
        fixed::Position,
    },
};

use super::tree::BoundsTree;

/// Result of a ray cast against parts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub part: PartId,
    pub point: Position,
    /// Ray parameter of the hit, in multiples of the ray direction.
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastQuery {
    pub ray: Ray,
    pub max_distance: f64,
}

impl RaycastQuery {
    pub fn new(origin: Position, direction: DVec3) -> Self {
        Self {
            ray: Ray::new(origin, direction),
            max_distance: f64::INFINITY,
        }
    }

    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }
}

pub struct Raycast;

impl Raycast {
    /// Every part the ray passes through, nearest first.
    pub fn cast(query: &RaycastQuery, tree: &BoundsTree<PartId>, parts: &Arena<Part>) -> Vec<RaycastHit> {
        let mut hits: Vec<RaycastHit> = Self::candidates(query, tree)
            .filter_map(|id| Self::exact(query, id, parts))
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    pub fn closest(
        query: &RaycastQuery,
        tree: &BoundsTree<PartId>,
        parts: &Arena<Part>,
    ) -> Option<RaycastHit> {
        Self::candidates(query, tree)
            .filter_map(|id| Self::exact(query, id, parts))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Parts whose bounds the ray enters within range.
    fn candidates<'a>(
        query: &'a RaycastQuery,
        tree: &'a BoundsTree<PartId>,
    ) -> impl Iterator<Item = PartId> + 'a {
        tree.iter_filtered(move |b: &Bounds| {
            b.intersects_ray(&query.ray)
                .is_some_and(|t| t <= query.max_distance)
        })
        .map(|(id, _)| id)
    }

    fn exact(query: &RaycastQuery, id: PartId, parts: &Arena<Part>) -> Option<RaycastHit> {
        let part = parts.get(id)?;
        let distance = part.intersect_ray(&query.ray)?;
        (distance <= query.max_distance).then(|| RaycastHit {
            part: id,
            point: query.ray.point_at(distance),
            distance,
        })
    }
}

/// Half-space `normal · (p - point) >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub point: Position,
    pub normal: DVec3,
}

impl Plane {
    pub fn new(point: Position, normal: DVec3) -> Self {
        Self {
            point,
            normal: normal.normalize_or_zero(),
        }
    }

    pub fn signed_distance(&self, p: Position) -> f64 {
        self.normal.dot(p - self.point)
    }

    /// True when some corner of `bounds` lies on the inner side.
    pub fn touches(&self, bounds: &Bounds) -> bool {
        let lo = bounds.min - self.point;
        let hi = bounds.max - self.point;
        let corner = DVec3::select(self.normal.cmpge(DVec3::ZERO), hi, lo);
        self.normal.dot(corner) >= 0.0
    }
}

/// Convex view volume bounded by inward facing planes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    pub planes: Vec<Plane>,
}

impl Frustum {
    pub fn from_planes(planes: Vec<Plane>) -> Self {
        Self { planes }
    }

    /// Perspective view from `eye`, looking down its local -Z with +Y up.
    /// `fov_y` is the full vertical opening angle in radians.
    pub fn perspective(eye: &GlobalCFrame, fov_y: f64, aspect: f64, near: f64, far: f64) -> Self {
        let forward = eye.local_to_relative(-DVec3::Z);
        let up = eye.local_to_relative(DVec3::Y);
        let right = eye.local_to_relative(DVec3::X);
        let half_v = (fov_y * 0.5).tan();
        let half_h = half_v * aspect;

        // Each side plane contains the eye and one edge of the image rectangle.
        let left_edge = forward - right * half_h;
        let right_edge = forward + right * half_h;
        let bottom_edge = forward - up * half_v;
        let top_edge = forward + up * half_v;

        let origin = eye.position;
        Self::from_planes(vec![
            Plane::new(origin + forward * near, forward),
            Plane::new(origin + forward * far, -forward),
            Plane::new(origin, left_edge.cross(up)),
            Plane::new(origin, up.cross(right_edge)),
            Plane::new(origin, right.cross(bottom_edge)),
            Plane::new(origin, top_edge.cross(right)),
        ])
    }

    /// Conservative: may accept boxes near the frustum's corners.
    pub fn intersects(&self, bounds: &Bounds) -> bool {
        self.planes.iter().all(|plane| plane.touches(bounds))
    }

    pub fn contains_point(&self, point: Position) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(point) >= 0.0)
    }
}

/// Parts whose bounds intersect `region`.
pub fn parts_in_bounds(tree: &BoundsTree<PartId>, region: Bounds) -> impl Iterator<Item = PartId> + '_ {
    tree.iter_intersecting(region).map(|(id, _)| id)
}

pub fn parts_in_frustum<'a>(
    tree: &'a BoundsTree<PartId>,
    frustum: &'a Frustum,
) -> impl Iterator<Item = PartId> + 'a {
    tree.iter_filtered(move |b: &Bounds| frustum.intersects(b))
        .map(|(id, _)| id)
}

/// Parts not entirely inside `region`, for sweeping out objects that fell
/// out of the world. Subtrees fully inside are skipped.
pub fn parts_outside(tree: &BoundsTree<PartId>, region: Bounds) -> impl Iterator<Item = PartId> + '_ {
    tree.iter_filtered(move |b: &Bounds| !region.contains(b))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{shape::Shape, types::PartProperties};
    use approx::assert_relative_eq;
    use glam::DQuat;

    fn scene() -> (Arena<Part>, BoundsTree<PartId>) {
        let mut parts = Arena::new();
        let mut tree = BoundsTree::new();
        for i in 0..10 {
            let id = parts.insert_with(|id| {
                let mut part = Part::new(
                    Shape::cuboid(1.0, 1.0, 1.0),
                    GlobalCFrame::from_position(Position::new(i as f64 * 3.0, 0.0, 0.0)),
                    PartProperties::default(),
                );
                part.id = id;
                part
            });
            tree.add(id, parts.get(id).map(Part::bounds).unwrap());
        }
        (parts, tree)
    }

    #[test]
    fn ray_reports_nearest_surface() {
        let (parts, tree) = scene();
        let query = RaycastQuery::new(Position::new(-10.0, 0.0, 0.0), DVec3::X);
        let hit = Raycast::closest(&query, &tree, &parts).expect("ray hits the first cube");
        assert_relative_eq!(hit.distance, 9.5, epsilon = 1e-9);
        assert_eq!(Raycast::cast(&query, &tree, &parts).len(), 10);

        let short = query.with_max_distance(15.0);
        assert_eq!(Raycast::cast(&short, &tree, &parts).len(), 2);
    }

    #[test]
    fn frustum_sees_only_what_is_in_front() {
        let (_, tree) = scene();
        // Looking down +X from the left of the row.
        let eye = GlobalCFrame::new(
            Position::new(-5.0, 0.0, 0.0),
            DQuat::from_rotation_y(-std::f64::consts::FRAC_PI_2),
        );
        let frustum = Frustum::perspective(&eye, 0.5, 1.0, 0.1, 12.0);
        assert!(frustum.contains_point(Position::new(0.0, 0.0, 0.0)));
        assert!(!frustum.contains_point(Position::new(-6.0, 0.0, 0.0)));
        let seen = parts_in_frustum(&tree, &frustum).count();
        assert!((2..=3).contains(&seen), "saw {seen}");
    }

    #[test]
    fn region_queries_partition_the_scene() {
        let (_, tree) = scene();
        let region = Bounds::new(Position::new(-1.0, -1.0, -1.0), Position::new(10.0, 1.0, 1.0));
        let inside = parts_in_bounds(&tree, region).count();
        let outside = parts_outside(&tree, region).count();
        assert_eq!(inside, 4);
        assert_eq!(outside, 6);
    }
}
