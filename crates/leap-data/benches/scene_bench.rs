use criterion::{criterion_group, criterion_main, Criterion};
use leap_core::math::{AngleUnit, Vec3};
use leap_data::{NodeId, SceneGraph};
use std::hint::black_box;

/// A root with `width` chains of `depth` nodes each.
fn build_forest(width: usize, depth: usize) -> (SceneGraph, NodeId, Vec<NodeId>) {
    let mut scene = SceneGraph::new();
    let root = scene.spawn("root").unwrap();
    let mut leaves = Vec::with_capacity(width);
    for _ in 0..width {
        let mut parent = root;
        for _ in 0..depth {
            parent = scene.spawn_child(parent, "node").unwrap();
            scene
                .transform_mut(parent)
                .unwrap()
                .set_local_position(Vec3::new(0.0, 1.0, 0.0));
        }
        leaves.push(parent);
    }
    (scene, root, leaves)
}

fn bench_world_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scene Transforms");
    let (mut scene, root, leaves) = build_forest(100, 20);

    group.bench_function("Refresh after root rotation", |b| {
        b.iter(|| {
            scene
                .transform_mut(root)
                .unwrap()
                .rotate_euler(Vec3::new(0.0, 1.0, 0.0), AngleUnit::Degrees);
            black_box(scene.refresh_world_transforms());
        });
    });

    group.bench_function("Cached leaf reads", |b| {
        scene.refresh_world_transforms();
        b.iter(|| {
            for &leaf in &leaves {
                black_box(scene.world_position(leaf).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_world_transforms);
criterion_main!(benches);
