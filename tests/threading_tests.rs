use rigid_core::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc,
};
use std::thread;

fn cube_at(x: f64, y: f64) -> Part {
    Part::new(
        Shape::cuboid(1.0, 1.0, 1.0),
        GlobalCFrame::from_position(Position::new(x, y, 0.0)),
        PartProperties::default(),
    )
}

#[test]
fn world_and_engine_are_send_and_sync() {
    fn assert_sync_send<T: Sync + Send>() {}
    assert_sync_send::<PhysicsWorld>();
    assert_sync_send::<PhysicsEngine>();
}

#[test]
fn engine_shared_across_threads() {
    let engine = Arc::new(PhysicsEngine::default());

    let mut handles = vec![];
    for i in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            engine.sync_modification(|world| world.add_part(cube_at(i as f64 * 3.0, 10.0)));
            engine.tick();
            engine.sync_read_only_operation(|world| world.part_count())
        }));
    }
    for handle in handles {
        assert!(handle.join().unwrap() >= 1);
    }

    engine.sync_read_only_operation(|world| {
        assert_eq!(world.part_count(), 4);
        assert_eq!(world.age(), 4);
        world.validate().unwrap();
    });
}

#[test]
fn modification_blocked_by_another_thread_is_queued_and_runs_once() {
    let engine = Arc::new(PhysicsEngine::default());
    let runs = Arc::new(AtomicUsize::new(0));
    let (locked_tx, locked_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            engine.sync_read_only_operation(|_| {
                locked_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            });
        })
    };

    locked_rx.recv().unwrap();
    let counter = Arc::clone(&runs);
    engine.async_modification(move |world| {
        counter.fetch_add(1, Ordering::SeqCst);
        world.add_part(cube_at(0.0, 0.0));
    });
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(engine.pending_operations(), (1, 0));

    release_tx.send(()).unwrap();
    reader.join().unwrap();

    engine.tick();
    engine.tick();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(engine.pending_operations(), (0, 0));
    assert_eq!(engine.sync_read_only_operation(PhysicsWorld::part_count), 1);
}

#[test]
fn async_read_runs_immediately_when_world_is_free() {
    let engine = PhysicsEngine::default();
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let store = Arc::clone(&seen);
    engine.async_read_only_operation(move |world| {
        store.store(world.part_count(), Ordering::SeqCst);
    });
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(engine.pending_operations(), (0, 0));
}

#[test]
fn readers_run_alongside_each_other() {
    let engine = Arc::new(PhysicsEngine::default());
    engine.sync_modification(|world| world.add_part(cube_at(0.0, 5.0)));
    let (inside_tx, inside_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let first = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            engine.sync_read_only_operation(|_| {
                inside_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        })
    };
    inside_rx.recv().unwrap();
    // A second shared reader does not wait for the first.
    assert_eq!(engine.sync_read_only_operation(PhysicsWorld::part_count), 1);
    release_tx.send(()).unwrap();
    first.join().unwrap();
}
