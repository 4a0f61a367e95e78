use approx::assert_relative_eq;
use rigid_core::*;

fn sphere_at(x: f64) -> Part {
    Part::new(
        Shape::sphere(0.5),
        GlobalCFrame::from_position(Position::new(x, 0.0, 0.0)),
        PartProperties::default(),
    )
}

fn cube_at(x: f64, y: f64, z: f64) -> Part {
    Part::new(
        Shape::cuboid(1.0, 1.0, 1.0),
        GlobalCFrame::from_position(Position::new(x, y, z)),
        PartProperties::default(),
    )
}

#[test]
fn motor_spins_child_around_anchored_base() {
    let mut world = PhysicsWorld::default();
    let base = world.add_part(cube_at(0.0, 0.0, 0.0));
    world.set_anchored(base, true).unwrap();
    let arm = world.add_part(cube_at(0.0, 5.0, 0.0));
    world
        .attach_with_constraint(
            arm,
            base,
            CFrame::IDENTITY,
            Box::new(MotorConstraint::new(1.0)),
            CFrame::from_position(DVec3::new(-3.0, 0.0, 0.0)),
        )
        .unwrap();
    let start = world.part(arm).unwrap().position().to_dvec3();
    assert_relative_eq!(start.x, 3.0, epsilon = 1e-9);

    for _ in 0..50 {
        world.tick();
    }
    let theta: f64 = 0.5;
    let at = world.part(arm).unwrap().position().to_dvec3();
    assert_relative_eq!(at.x, 3.0 * theta.cos(), epsilon = 1e-6);
    assert_relative_eq!(at.y, 3.0 * theta.sin(), epsilon = 1e-6);
    assert_eq!(world.part(base).unwrap().position(), Position::ORIGIN);
    world.validate().unwrap();
}

#[test]
fn piston_keeps_child_within_its_stroke() {
    let mut world = PhysicsWorld::default();
    let base = world.add_part(cube_at(0.0, 0.0, 0.0));
    world.set_anchored(base, true).unwrap();
    let slider = world.add_part(cube_at(0.0, 0.0, 10.0));
    world
        .attach_with_constraint(
            slider,
            base,
            CFrame::IDENTITY,
            Box::new(SinusoidalPistonConstraint::new(2.0, 4.0, 1.0)),
            CFrame::IDENTITY,
        )
        .unwrap();

    for tick in 1..=60 {
        world.tick();
        let z = world.part(slider).unwrap().position().to_dvec3().z;
        let expected = 3.0 + (std::f64::consts::TAU * tick as f64 * 0.01).sin();
        assert_relative_eq!(z, expected, epsilon = 1e-6);
    }
}

#[test]
fn detaching_a_constrained_parent_frees_its_child() {
    let mut world = PhysicsWorld::default();
    let base = world.add_part(cube_at(0.0, 0.0, 0.0));
    let arm = world.add_part(cube_at(0.0, 0.0, 0.0));
    let child = world
        .attach_with_constraint(
            arm,
            base,
            CFrame::from_position(DVec3::new(2.0, 0.0, 0.0)),
            Box::new(FixedConstraint),
            CFrame::IDENTITY,
        )
        .unwrap();
    assert!(world.are_in_same_group(base, arm).unwrap());

    world.remove_part(base).unwrap();
    let physical = world.physical(child).unwrap();
    assert!(physical.is_motorized());
    assert_eq!(world.root_of(arm).unwrap(), child);
    world.validate().unwrap();
}

#[test]
fn cycles_are_rejected() {
    let mut world = PhysicsWorld::default();
    let base = world.add_part(cube_at(0.0, 0.0, 0.0));
    let arm = world.add_part(cube_at(2.0, 0.0, 0.0));
    world
        .attach_with_constraint(arm, base, CFrame::IDENTITY, Box::new(FixedConstraint), CFrame::IDENTITY)
        .unwrap();
    let err = world
        .attach_with_constraint(base, arm, CFrame::IDENTITY, Box::new(FixedConstraint), CFrame::IDENTITY)
        .unwrap_err();
    assert!(matches!(err, PhysicsError::InvalidOperation(_)));
}

#[test]
fn ball_constraint_group_pulls_attachments_together() {
    let mut world = PhysicsWorld::default();
    let a = world.add_part(sphere_at(0.0));
    let b = world.add_part(sphere_at(1.2));
    let group = ConstraintGroup::with_constraints(vec![BallConstraint::new(
        world.physical_of(a).unwrap(),
        DVec3::new(0.5, 0.0, 0.0),
        world.physical_of(b).unwrap(),
        DVec3::new(-0.5, 0.0, 0.0),
    )]);
    world.add_constraint_group(group).unwrap();

    world.tick();
    let xa = world.part(a).unwrap().position().to_dvec3().x;
    let xb = world.part(b).unwrap().position().to_dvec3().x;
    assert_relative_eq!(xa, 0.1, epsilon = 1e-6);
    assert_relative_eq!(xb, 1.1, epsilon = 1e-6);
}

#[test]
fn constraint_group_on_missing_physical_is_rejected() {
    let mut world = PhysicsWorld::default();
    let a = world.add_part(sphere_at(0.0));
    let group = ConstraintGroup::with_constraints(vec![BallConstraint::new(
        world.physical_of(a).unwrap(),
        DVec3::ZERO,
        PhysicalId::from_index(999),
        DVec3::ZERO,
    )]);
    assert!(matches!(
        world.add_constraint_group(group),
        Err(PhysicsError::NotFound { .. })
    ));
}

#[test]
fn spring_link_draws_parts_together() {
    let mut world = PhysicsWorld::default();
    let a = world.add_part(cube_at(0.0, 0.0, 0.0));
    let b = world.add_part(cube_at(6.0, 0.0, 0.0));
    let link = world
        .add_link(SoftLink::spring(LinkEnd::at_center(a), LinkEnd::at_center(b), 2.0, 2.0))
        .unwrap();

    for _ in 0..30 {
        world.tick();
    }
    let gap = world.part(b).unwrap().position() - world.part(a).unwrap().position();
    assert!(gap.x < 6.0 && gap.x > 2.0, "gap {gap}");
    assert_relative_eq!(world.motion_of(a).unwrap().velocity.x, -world.motion_of(b).unwrap().velocity.x, epsilon = 1e-9);

    world.remove_link(link).unwrap();
    assert!(matches!(world.remove_link(link), Err(PhysicsError::NotFound { .. })));
}

fn tree_mass_and_center(world: &PhysicsWorld, part: PartId) -> (f64, DVec3, DVec3) {
    let root = world.physical(world.root_of(part).unwrap()).unwrap();
    let mass = root.as_motorized().unwrap().totals().mass;
    let center = root.tree_center_of_mass();
    let velocity = world.point_velocity(part, center).unwrap();
    (mass, center.to_dvec3(), velocity)
}

#[test]
fn ball_constraint_pulls_an_articulated_tree_without_moving_the_system() {
    let mut world = PhysicsWorld::default();
    let base = world.add_part(sphere_at(0.0));
    let arm = world.add_part(sphere_at(5.0));
    world
        .attach_with_constraint(
            arm,
            base,
            CFrame::from_position(DVec3::new(1.0, 0.0, 0.0)),
            Box::new(FixedConstraint),
            CFrame::IDENTITY,
        )
        .unwrap();
    let free = world.add_part(sphere_at(3.2));
    let arm_physical = world.physical_of(arm).unwrap();
    assert_ne!(arm_physical, world.root_of(arm).unwrap());

    // Off the line between the centres, so closing the gap also turns the tree.
    let (on_arm, on_free) = (DVec3::new(0.5, 0.1, 0.0), DVec3::new(-1.0, 0.1, 0.0));
    world
        .add_constraint_group(ConstraintGroup::with_constraints(vec![BallConstraint::new(
            arm_physical,
            on_arm,
            world.physical_of(free).unwrap(),
            on_free,
        )]))
        .unwrap();
    let gap = |world: &PhysicsWorld| {
        let a = world.part(arm).unwrap().cframe().local_to_global(on_arm);
        let b = world.part(free).unwrap().cframe().local_to_global(on_free);
        (b - a).length()
    };
    let system_center = |world: &PhysicsWorld| {
        let (m1, c1, _) = tree_mass_and_center(world, base);
        let (m2, c2, _) = tree_mass_and_center(world, free);
        (c1 * m1 + c2 * m2) / (m1 + m2)
    };
    assert_relative_eq!(gap(&world), 0.7, epsilon = 1e-9);
    let start = system_center(&world);

    world.tick();
    assert!(gap(&world) < 0.05, "gap after one tick {}", gap(&world));
    assert!((system_center(&world) - start).length() < 1e-9);
    let turned = world.part(base).unwrap().cframe().rotation;
    assert!(turned.to_axis_angle().1.abs() > 1e-4, "the tree should turn");

    for _ in 0..10 {
        world.tick();
    }
    assert!(gap(&world) < 1e-4, "gap after eleven ticks {}", gap(&world));
    assert!((system_center(&world) - start).length() < 1e-9);

    let (m1, _, v1) = tree_mass_and_center(&world, base);
    let (m2, _, v2) = tree_mass_and_center(&world, free);
    assert!((v1 * m1 + v2 * m2).length() < 1e-9, "momentum {}", v1 * m1 + v2 * m2);
    world.validate().unwrap();
}
