//! Ambient field and spatial grid benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;
use shard_kernel::{AmbientConfig, SpatialHashGrid, VoxelSimulation};

fn bench_field_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("ambient_update");

    for side in [32u32, 96, 160] {
        group.bench_with_input(BenchmarkId::from_parameter(side), &side, |b, &side| {
            let config = AmbientConfig {
                side,
                activation_chance: 0.05,
                ..AmbientConfig::default()
            };
            let Ok(mut sim) = VoxelSimulation::new(config) else {
                return;
            };
            sim.trigger_explosion(Vec3::new(0.0, 4.0, 0.0), Vec3::Y);
            for _ in 0..30 {
                sim.update();
            }
            b.iter(|| {
                sim.update();
                black_box(sim.stats())
            });
        });
    }

    group.finish();
}

fn bench_grid_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_rebuild");

    for count in [1_000u32, 10_000, 25_600] {
        let mut rng = fastrand::Rng::with_seed(7);
        let points: Vec<Vec3> = (0..count)
            .map(|_| Vec3::new(rng.f32() * 40.0, rng.f32() * 8.0, rng.f32() * 40.0))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            let Ok(mut grid) = SpatialHashGrid::new(0.5) else {
                return;
            };
            let mut out = Vec::new();
            b.iter(|| {
                grid.clear();
                for (i, p) in points.iter().enumerate() {
                    grid.insert(i as u32, p.x, p.y, p.z);
                }
                let mut hits = 0usize;
                for p in points.iter().step_by(16) {
                    grid.get_nearby_into(p.x, p.y, p.z, &mut out);
                    hits += out.len();
                }
                black_box(hits)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_field_update, bench_grid_rebuild);
criterion_main!(benches);
