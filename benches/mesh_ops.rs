//! Benchmarks for mesh operations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mender::prelude::*;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn grid(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    // Create grid vertices
    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }

    // Create triangles
    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    (vertices, faces)
}

/// Grid triangles in random order with random winding: lots of faces that
/// only fit after duplicating vertices.
fn scrambled_grid(n: usize, seed: u64) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let (vertices, mut faces) = grid(n);
    let mut rng = StdRng::seed_from_u64(seed);
    for i in (1..faces.len()).rev() {
        let j = rng.random_range(0..=i);
        faces.swap(i, j);
    }
    for face in &mut faces {
        if rng.random_bool(0.3) {
            face.swap(1, 2);
        }
    }
    (vertices, faces)
}

fn bench_mesh_construction(c: &mut Criterion) {
    let (vertices, faces) = grid(50);
    c.bench_function("build_grid_50x50", |b| {
        b.iter(|| {
            let (mesh, _): (HalfEdgeMesh, _) = build_from_triangles(&vertices, &faces).unwrap();
            mesh
        });
    });

    let (vertices, faces) = scrambled_grid(50, 42);
    c.bench_function("build_scrambled_grid_50x50", |b| {
        b.iter(|| {
            let (mesh, _): (HalfEdgeMesh, _) = build_from_triangles(&vertices, &faces).unwrap();
            mesh
        });
    });
}

fn bench_mesh_traversal(c: &mut Criterion) {
    let (vertices, faces) = grid(50);
    let (mesh, _): (HalfEdgeMesh, _) = build_from_triangles(&vertices, &faces).unwrap();

    c.bench_function("vertex_neighbors_all", |b| {
        b.iter(|| {
            let mut count = 0;
            for v in mesh.vertex_ids() {
                count += mesh.vertex_neighbors(v).count();
            }
            count
        });
    });

    c.bench_function("non_manifold_vertices", |b| {
        b.iter(|| black_box(mesh.non_manifold_vertices()));
    });
}

criterion_group!(benches, bench_mesh_construction, bench_mesh_traversal);
criterion_main!(benches);
