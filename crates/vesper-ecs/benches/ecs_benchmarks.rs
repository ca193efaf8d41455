//! Benchmarks for the storage operations the core is designed around:
//! bulk insert, set/remove churn, the smallest-column view join, and the
//! in-place column sort.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use vesper_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A world with `n` positioned entities, every eighth of which also has a
/// velocity. The minority column is what the view join should drive from.
fn setup_world(n: usize) -> (World, Vec<Entity>) {
    let mut world = World::new();
    let mut entities = Vec::with_capacity(n);
    for i in 0..n {
        let e = world
            .entity()
            .set(Position {
                x: i as f32,
                y: -(i as f32),
            })
            .entity();
        if i % 8 == 0 {
            world.entity_mut(e).set(Velocity { dx: 1.0, dy: 0.5 });
        }
        entities.push(e);
    }
    (world, entities)
}

/// Deterministic value scramble so sort inputs are unordered but repeatable.
fn scrambled(i: usize) -> f32 {
    ((i as u32).wrapping_mul(2_654_435_761) >> 8) as f32
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for n in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut world = World::new();
                for i in 0..n {
                    world.entity().set(Position {
                        x: i as f32,
                        y: 0.0,
                    });
                }
                black_box(world.entity_count())
            });
        });
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    // Alternating set/remove keeps the column dense while exercising the
    // swap-remove bookkeeping.
    c.bench_function("churn/set_remove_1000", |b| {
        let (mut world, entities) = setup_world(1_000);
        b.iter(|| {
            for &e in &entities {
                world.entity_mut(e).remove::<Position>();
                world.entity_mut(e).set(Position { x: 1.0, y: 1.0 });
            }
            black_box(world.entity_count())
        });
    });
}

fn bench_view_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_join");
    for n in [1_000usize, 10_000] {
        let (world, _entities) = setup_world(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &world, |b, world| {
            b.iter(|| {
                let mut sum = 0.0f32;
                world
                    .view::<(Position, Velocity)>()
                    .each(|_, (position, velocity)| {
                        sum += position.x * velocity.dx;
                    });
                black_box(sum)
            });
        });
    }
    group.finish();
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");
    for n in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            // A sorted column short-circuits, so each iteration needs a
            // freshly scrambled world.
            b.iter_batched(
                || {
                    let mut world = World::new();
                    for i in 0..n {
                        world.entity().set(Position {
                            x: scrambled(i),
                            y: 0.0,
                        });
                    }
                    world
                },
                |mut world| {
                    world.sort_by::<Position>(|a, b| a.x < b.x);
                    black_box(world.entity_count())
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_churn, bench_view_join, bench_sort);
criterion_main!(benches);
