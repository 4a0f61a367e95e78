use std::{sync::Arc, thread, time::Duration};

use rigid_core::*;

fn main() -> Result<()> {
    let engine = Arc::new(PhysicsEngine::with_config(WorldConfig::default())?);
    engine.sync_modification(|world| {
        world.add_external_force(DirectionalGravity::default());
        world.add_terrain_part(Part::new(
            Shape::cuboid(40.0, 1.0, 40.0),
            GlobalCFrame::from_position(Position::new(0.0, -0.5, 0.0)),
            PartProperties::default(),
        ));
    });

    let simulation = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..200 {
                engine.tick();
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    // Spawners never block the simulation: if a tick holds the lock the
    // new part is queued and added right after that tick.
    let spawner = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..20 {
                engine.async_modification(move |world| {
                    let x = (i % 5) as f64 * 2.0 - 4.0;
                    world.add_part(Part::new(
                        Shape::cuboid(1.0, 1.0, 1.0),
                        GlobalCFrame::from_position(Position::new(x, 2.0 + (i / 5) as f64 * 1.5, 0.0)),
                        PartProperties::default(),
                    ));
                });
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    let observer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..10 {
                engine.async_read_only_operation(|world| {
                    println!("age {}: {} parts, {} colissions", world.age(), world.part_count(), world.colissions().len());
                });
                thread::sleep(Duration::from_millis(20));
            }
        })
    };

    for handle in [simulation, spawner, observer] {
        if handle.join().is_err() {
            eprintln!("a demo thread panicked");
        }
    }

    // Flush anything still queued.
    engine.tick();
    let (parts, age) = engine.sync_read_only_operation(|world| (world.part_count(), world.age()));
    println!("finished at age {age} with {parts} parts");
    Ok(())
}
