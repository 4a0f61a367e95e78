use approx::assert_relative_eq;
use rigid_core::{
    collision::narrowphase::{intersect_parts, GJKAlgorithm, NarrowPhaseSettings, PlacedShape},
    CFrame, DQuat, DVec3, GlobalCFrame, Part, PartProperties, Position, Shape,
};

fn part(shape: Shape, cframe: GlobalCFrame) -> Part {
    Part::new(shape, cframe, PartProperties::default())
}

fn cube_at(x: f64, y: f64, z: f64) -> Part {
    part(
        Shape::cuboid(1.0, 1.0, 1.0),
        GlobalCFrame::from_position(Position::new(x, y, z)),
    )
}

#[test]
fn touching_parts_have_no_meaningful_overlap() {
    let settings = NarrowPhaseSettings::default();
    let hit = intersect_parts(&cube_at(0.0, 0.0, 0.0), &cube_at(1.0, 0.0, 0.0), &settings)
        .expect("touching cubes are reported");
    assert!(hit.exit_vector.length() < 1e-6, "exit {}", hit.exit_vector);
    assert!(intersect_parts(&cube_at(0.0, 0.0, 0.0), &cube_at(1.001, 0.0, 0.0), &settings).is_none());
}

#[test]
fn exit_vector_shrinks_with_the_overlap() {
    let settings = NarrowPhaseSettings::default();
    let base = cube_at(0.0, 0.0, 0.0);
    for overlap in [1e-2, 1e-3, 1e-4, 1e-5, 1e-6] {
        let hit = intersect_parts(&base, &cube_at(1.0 - overlap, 0.0, 0.0), &settings)
            .unwrap_or_else(|| panic!("cubes overlapping by {overlap} are reported"));
        assert_relative_eq!(hit.exit_vector.length(), overlap, max_relative = 1e-3);
        assert!(hit.exit_vector.x > 0.0, "exit {} for overlap {overlap}", hit.exit_vector);
    }
}

#[test]
fn sphere_on_a_cube_converges_to_its_depth() {
    let settings = NarrowPhaseSettings::default();
    let base = cube_at(0.0, 0.0, 0.0);
    for overlap in [1e-2, 1e-3, 1e-4] {
        let ball = part(
            Shape::sphere(0.5),
            GlobalCFrame::from_position(Position::new(0.0, 1.0 - overlap, 0.0)),
        );
        let hit = intersect_parts(&base, &ball, &settings)
            .unwrap_or_else(|| panic!("sphere sunk by {overlap} is reported"));
        assert_relative_eq!(hit.exit_vector.length(), overlap, max_relative = 5e-2);
        assert!(hit.exit_vector.normalize().y > 0.99, "exit {} for overlap {overlap}", hit.exit_vector);
    }
}

#[test]
fn shallow_overlap_reports_its_depth() {
    let settings = NarrowPhaseSettings::default();
    let hit = intersect_parts(&cube_at(0.0, 0.0, 0.0), &cube_at(0.99, 0.0, 0.0), &settings)
        .expect("parts overlap");
    assert_relative_eq!(hit.exit_vector.x, 0.01, epsilon = 1e-4);
    assert!(hit.exit_vector.y.abs() < 1e-4 && hit.exit_vector.z.abs() < 1e-4);
}

#[test]
fn swapping_parts_reverses_the_exit_vector() {
    let settings = NarrowPhaseSettings::default();
    let a = cube_at(0.0, 0.0, 0.0);
    let b = part(
        Shape::sphere(0.6),
        GlobalCFrame::from_position(Position::new(0.3, 0.9, 0.1)),
    );
    let ab = intersect_parts(&a, &b, &settings).expect("parts overlap");
    let ba = intersect_parts(&b, &a, &settings).expect("parts overlap");
    assert_relative_eq!(ab.exit_vector.length(), ba.exit_vector.length(), epsilon = 1e-3);
    assert!((ab.exit_vector + ba.exit_vector).length() < 1e-3);
    assert!(ab.exit_vector.y > 0.0, "exit points from the cube into the sphere");
}

#[test]
fn edge_resting_on_a_slab_is_pushed_straight_up() {
    let settings = NarrowPhaseSettings::default();
    let tilted = part(
        Shape::cuboid(1.0, 1.0, 1.0),
        GlobalCFrame::new(
            Position::new(0.0, std::f64::consts::FRAC_1_SQRT_2 - 0.05, 0.0),
            DQuat::from_rotation_z(std::f64::consts::FRAC_PI_4),
        ),
    );
    let slab = part(
        Shape::cuboid(10.0, 1.0, 10.0),
        GlobalCFrame::from_position(Position::new(0.0, -0.5, 0.0)),
    );
    let hit = intersect_parts(&tilted, &slab, &settings).expect("edge dips into the slab");
    assert_relative_eq!(hit.exit_vector.y, -0.05, epsilon = 1e-3);
    assert!(hit.exit_vector.x.abs() < 1e-3);
    let contact = hit.contact_point.to_dvec3();
    assert!(contact.x.abs() < 1e-2, "contact at {contact}");
    assert!((-0.06..0.01).contains(&contact.y), "contact at {contact}");
}

#[test]
fn far_apart_parts_are_rejected_early() {
    let settings = NarrowPhaseSettings::default();
    let near = cube_at(0.0, 0.0, 0.0);
    let far = cube_at(1.0e6, 0.0, 0.0);
    assert!(intersect_parts(&near, &far, &settings).is_none());
}

#[test]
fn gjk_handles_rotated_shapes_directly() {
    let settings = NarrowPhaseSettings::default();
    let cuboid = Shape::cuboid(2.0, 0.2, 0.2);
    let a = PlacedShape::new(&cuboid, CFrame::IDENTITY);
    let crossing = PlacedShape::new(
        &cuboid,
        CFrame::new(DVec3::new(0.0, 0.0, 0.0), DQuat::from_rotation_y(std::f64::consts::FRAC_PI_2)),
    );
    let hit = GJKAlgorithm::intersect(&a, &crossing, DVec3::X, &settings).expect("rods cross");
    assert_relative_eq!(hit.exit_vector.length(), 0.2, epsilon = 1e-3);

    let apart = PlacedShape::new(&cuboid, CFrame::from_position(DVec3::new(0.0, 0.5, 0.0)));
    assert!(GJKAlgorithm::intersect(&a, &apart, DVec3::X, &settings).is_none());
}
