use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rigid_core::{
    collision::narrowphase::{intersect_parts, NarrowPhaseSettings},
    *,
};
use std::hint::black_box;

fn cube_at(x: f64, y: f64, z: f64) -> Part {
    Part::new(
        Shape::cuboid(1.0, 1.0, 1.0),
        GlobalCFrame::from_position(Position::new(x, y, z)),
        PartProperties::default(),
    )
}

fn prepare_world(part_count: usize) -> PhysicsWorld {
    let mut world = PhysicsWorld::default();
    world.add_external_force(DirectionalGravity::default());
    world.add_terrain_part(Part::new(
        Shape::cuboid(200.0, 1.0, 200.0),
        GlobalCFrame::from_position(Position::new(0.0, -0.5, 0.0)),
        PartProperties::default(),
    ));
    let side = (part_count as f64).sqrt().ceil() as usize;
    for i in 0..part_count {
        let (row, column) = (i / side, i % side);
        world.add_part(cube_at(column as f64 * 1.5, 0.45 + (i % 3) as f64, row as f64 * 1.5));
    }
    world
}

fn bench_world_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_tick");
    for &count in &[64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            let mut world = prepare_world(count);
            world.set_parallel_enabled(false);
            b.iter(|| world.tick())
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &count, |b, &count| {
            let mut world = prepare_world(count);
            world.set_parallel_enabled(true);
            b.iter(|| world.tick())
        });
    }
    group.finish();
}

fn bench_broad_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase");
    for &count in &[256u32, 1024, 4096] {
        let mut tree = BoundsTree::new();
        for i in 0..count {
            let center = Position::new(
                ((i * 37) % 97) as f64 * 0.9,
                ((i * 11) % 13) as f64 * 0.9,
                ((i * 5) % 89) as f64 * 0.9,
            );
            tree.add(EntityId::from_index(i), Bounds::around(center, DVec3::splat(0.5)));
        }
        tree.improve_structure();
        group.bench_with_input(BenchmarkId::new("pairs", count), &tree, |b, tree| {
            b.iter(|| black_box(tree.colission_pairs()))
        });
    }
    group.finish();
}

fn bench_narrow_phase(c: &mut Criterion) {
    let settings = NarrowPhaseSettings::default();
    let a = cube_at(0.0, 0.0, 0.0);
    let overlapping = cube_at(0.8, 0.3, 0.1);
    let sphere = Part::new(
        Shape::sphere(0.5),
        GlobalCFrame::from_position(Position::new(0.2, 0.9, 0.0)),
        PartProperties::default(),
    );

    let mut group = c.benchmark_group("narrow_phase");
    group.bench_function("cube_cube", |b| {
        b.iter(|| black_box(intersect_parts(black_box(&a), black_box(&overlapping), &settings)))
    });
    group.bench_function("cube_sphere", |b| {
        b.iter(|| black_box(intersect_parts(black_box(&a), black_box(&sphere), &settings)))
    });
    group.finish();
}

criterion_group!(benches, bench_world_tick, bench_broad_phase, bench_narrow_phase);
criterion_main!(benches);
