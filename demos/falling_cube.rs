use rigid_core::*;

fn main() -> Result<()> {
    let mut world = PhysicsWorld::new(WorldConfig::default())?;
    world.add_external_force(DirectionalGravity::default());

    world.add_terrain_part(Part::new(
        Shape::cuboid(20.0, 1.0, 20.0),
        GlobalCFrame::from_position(Position::new(0.0, -0.5, 0.0)),
        PartProperties::default(),
    ));
    let cube = world.add_part(Part::new(
        Shape::cuboid(1.0, 1.0, 1.0),
        GlobalCFrame::new(Position::new(0.0, 3.0, 0.0), DQuat::from_rotation_z(0.3)),
        PartProperties::default(),
    ));
    let ball = world.add_part(Part::new(
        Shape::sphere(0.4),
        GlobalCFrame::from_position(Position::new(0.2, 5.0, 0.0)),
        PartProperties::new(2.0, 0.3, 0.6),
    ));

    for _ in 0..300 {
        world.tick();
        if world.age() % 50 == 0 {
            let cube_at = world.part(cube).map(Part::position).unwrap_or(Position::ORIGIN);
            let ball_at = world.part(ball).map(Part::position).unwrap_or(Position::ORIGIN);
            println!(
                "tick {:>3}: cube {:?}, ball {:?}, {} colissions",
                world.age(),
                cube_at.to_dvec3(),
                ball_at.to_dvec3(),
                world.colissions().len()
            );
        }
    }

    let down = RaycastQuery::new(Position::new(0.0, 10.0, 0.0), -DVec3::Y);
    if let Some(hit) = world.raycast(&down) {
        println!("first part below the sky: {:?} at {:?}", hit.part, hit.point.to_dvec3());
    }
    println!("{:?}", world.profile());
    Ok(())
}
