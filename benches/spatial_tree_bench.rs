//! Spatial tree benchmarks: rebuild cost and the per-frame query paths.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glam::{Mat4, Vec3};

use prism::prelude::{AabbTree, BoundingBox, Frustum, IntersectAlways, Ray};

/// `count` unit spheres spread over a cube of side 200.
fn scattered_tree(count: u32) -> AabbTree<u32> {
    let side = (count as f32).cbrt().ceil().max(1.0) as u32;
    let spacing = 200.0 / side as f32;
    let mut tree = AabbTree::new();
    for id in 0..count {
        let cell = Vec3::new(
            (id % side) as f32,
            ((id / side) % side) as f32,
            (id / (side * side)) as f32,
        );
        tree.add(id, BoundingBox::from_sphere(cell * spacing - Vec3::splat(100.0), 1.0));
    }
    tree
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_tree_optimize");

    for count in [1_000u32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || scattered_tree(count),
                |mut tree| {
                    tree.optimize();
                    black_box(tree)
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_tree_query");
    let mut tree = scattered_tree(10_000);
    tree.optimize();

    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 150.0), Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh_gl(60f32.to_radians(), 16.0 / 9.0, 0.1, 120.0);
    let frustum = Frustum::from_matrix(projection * view);
    let ray = Ray::new(Vec3::new(-150.0, 0.5, 0.5), Vec3::X, 300.0);
    let region = BoundingBox::new(Vec3::splat(-20.0), Vec3::splat(20.0));

    let mut found = Vec::with_capacity(10_000);

    group.bench_function("frustum", |b| {
        b.iter(|| {
            found.clear();
            tree.query(black_box(&frustum), &mut found);
            black_box(found.len())
        });
    });

    group.bench_function("ray", |b| {
        b.iter(|| {
            found.clear();
            tree.query(black_box(&ray), &mut found);
            black_box(found.len())
        });
    });

    group.bench_function("box", |b| {
        b.iter(|| {
            found.clear();
            tree.query(black_box(&region), &mut found);
            black_box(found.len())
        });
    });

    group.bench_function("everything", |b| {
        b.iter(|| {
            found.clear();
            tree.query(&IntersectAlways, &mut found);
            black_box(found.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_optimize, bench_queries);
criterion_main!(benches);
