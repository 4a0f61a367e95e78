use approx::assert_relative_eq;
use rigid_core::*;

fn cube_at(x: f64, y: f64, z: f64) -> Part {
    Part::new(
        Shape::cuboid(1.0, 1.0, 1.0),
        GlobalCFrame::from_position(Position::new(x, y, z)),
        PartProperties::default(),
    )
}

fn row_of_cubes(world: &mut PhysicsWorld) -> Vec<PartId> {
    (0..5).map(|i| world.add_part(cube_at(i as f64 * 3.0, 0.0, 0.0))).collect()
}

#[test]
fn raycast_returns_the_closest_exact_hit() {
    let mut world = PhysicsWorld::default();
    let cubes = row_of_cubes(&mut world);
    let query = RaycastQuery::new(Position::new(-10.0, 0.0, 0.0), DVec3::X);

    let hit = world.raycast(&query).expect("ray runs along the row");
    assert_eq!(hit.part, cubes[0]);
    assert_relative_eq!(hit.distance, 9.5, epsilon = 1e-9);
    assert_relative_eq!(hit.point.to_dvec3().x, -0.5, epsilon = 1e-9);

    let all = world.raycast_all(&query);
    assert_eq!(all.iter().map(|h| h.part).collect::<Vec<_>>(), cubes);
}

#[test]
fn raycast_respects_max_distance_and_misses() {
    let mut world = PhysicsWorld::default();
    row_of_cubes(&mut world);

    let short = RaycastQuery::new(Position::new(-10.0, 0.0, 0.0), DVec3::X).with_max_distance(5.0);
    assert!(world.raycast(&short).is_none());

    let above = RaycastQuery::new(Position::new(-10.0, 2.0, 0.0), DVec3::X);
    assert!(world.raycast_all(&above).is_empty());
}

#[test]
fn raycast_sees_terrain_too() {
    let mut world = PhysicsWorld::default();
    let ground = world.add_terrain_part(Part::new(
        Shape::cuboid(10.0, 1.0, 10.0),
        GlobalCFrame::from_position(Position::new(0.0, -0.5, 0.0)),
        PartProperties::default(),
    ));
    let floating = world.add_part(cube_at(0.0, 5.0, 0.0));

    let down = RaycastQuery::new(Position::new(0.0, 10.0, 0.0), -DVec3::Y);
    let hits = world.raycast_all(&down);
    assert_eq!(hits.iter().map(|h| h.part).collect::<Vec<_>>(), vec![floating, ground]);
    assert_relative_eq!(hits[1].distance, 10.0, epsilon = 1e-9);
}

#[test]
fn frustum_selects_parts_in_view() {
    let mut world = PhysicsWorld::default();
    let ahead = world.add_part(cube_at(0.0, 0.0, -10.0));
    let behind = world.add_part(cube_at(0.0, 0.0, 10.0));
    let aside = world.add_part(cube_at(50.0, 0.0, -10.0));
    let too_far = world.add_part(cube_at(0.0, 0.0, -500.0));

    let eye = GlobalCFrame::from_position(Position::ORIGIN);
    let frustum = Frustum::perspective(&eye, std::f64::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
    let visible = world.parts_in_frustum(&frustum);
    assert_eq!(visible, vec![ahead]);
    for hidden in [behind, aside, too_far] {
        assert!(!visible.contains(&hidden));
    }
    assert!(frustum.contains_point(Position::new(0.0, 0.0, -10.0)));
    assert!(!frustum.contains_point(Position::new(0.0, 0.0, 10.0)));
}

#[test]
fn bounds_queries_cover_both_layers() {
    let mut world = PhysicsWorld::default();
    let cubes = row_of_cubes(&mut world);
    let rock = world.add_terrain_part(cube_at(3.0, 3.0, 0.0));

    let mut found = world.parts_in_bounds(Bounds::around(Position::new(3.0, 1.5, 0.0), DVec3::new(1.0, 2.0, 1.0)));
    found.sort_by_key(|id| id.index());
    let mut expected = vec![cubes[1], rock];
    expected.sort_by_key(|id| id.index());
    assert_eq!(found, expected);

    assert_eq!(world.parts().count(), 6);
    assert_eq!(world.physicals().count(), 6);
    assert_eq!(world.motorized_physicals().count(), 6);
}
