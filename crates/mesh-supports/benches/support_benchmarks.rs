//! Benchmarks for mesh-supports stages.
//!
//! Run with: cargo bench -p mesh-supports
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-supports -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-supports -- --baseline main

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mesh_supports::{
    Bvh, ClearanceRule, DirectionSet, Mesh, NormalStrategy, PointGrid, PointRadius, RayParams,
    SupportConfig, Vertex, estimate_widths, generate_supports, poisson_filter,
    subdivide_long_edges, vertex_normals,
};
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Closed box spanning `[0, sx] x [0, sy] x [0, sz]` (12 triangles).
fn create_box(sx: f64, sy: f64, sz: f64) -> Mesh {
    let mut mesh = Mesh::new();

    let verts = [
        [0.0, 0.0, 0.0],
        [sx, 0.0, 0.0],
        [sx, sy, 0.0],
        [0.0, sy, 0.0],
        [0.0, 0.0, sz],
        [sx, 0.0, sz],
        [sx, sy, sz],
        [0.0, sy, sz],
    ];
    for v in &verts {
        mesh.vertices.push(Vertex::from_coords(v[0], v[1], v[2]));
    }

    mesh.faces = vec![
        [0, 2, 1],
        [0, 3, 2], // bottom
        [4, 5, 6],
        [4, 6, 7], // top
        [0, 1, 5],
        [0, 5, 4], // front
        [3, 7, 6],
        [3, 6, 2], // back
        [0, 4, 7],
        [0, 7, 3], // left
        [1, 2, 6],
        [1, 6, 5], // right
    ];

    mesh
}

/// Thin plate subdivided to roughly `edge` spacing.
fn create_plate(edge: f64) -> Mesh {
    subdivide_long_edges(&create_box(20.0, 20.0, 1.5), edge).mesh
}

fn random_candidates(count: usize, seed: u64) -> Vec<PointRadius> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let p = Point3::new(
                rng.random::<f64>() * 50.0,
                rng.random::<f64>() * 50.0,
                rng.random::<f64>() * 2.0,
            );
            PointRadius::new(p, 0.2 + rng.random::<f64>() * 0.8)
        })
        .collect()
}

// =============================================================================
// Stage Benchmarks
// =============================================================================

fn bench_subdivision(c: &mut Criterion) {
    let mut group = c.benchmark_group("Subdivision");
    let cube = create_box(10.0, 10.0, 10.0);

    for edge in [2.0, 1.0, 0.5] {
        group.bench_with_input(BenchmarkId::new("cube", edge), &edge, |b, &edge| {
            b.iter(|| subdivide_long_edges(black_box(&cube), edge))
        });
    }

    group.finish();
}

fn bench_width_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("WidthEstimation");
    group.sample_size(20);

    for edge in [2.0, 1.0] {
        let plate = create_plate(edge);
        let positions = plate.positions();
        let normals = vertex_normals(&plate, NormalStrategy::AreaWeighted);
        let bvh = Bvh::new(&plate);
        let params = RayParams::default();
        let directions = params.directions();

        group.throughput(Throughput::Elements(positions.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("plate_vertices", positions.len()),
            &positions,
            |b, positions| {
                b.iter(|| estimate_widths(black_box(positions), &normals, &bvh, &directions, &params))
            },
        );
    }

    group.finish();
}

fn bench_bvh_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("BvhBuild");
    let plate = create_plate(0.5);

    group.throughput(Throughput::Elements(plate.face_count() as u64));
    group.bench_function("plate", |b| b.iter(|| Bvh::new(black_box(&plate))));

    group.finish();
}

fn bench_directions(c: &mut Criterion) {
    c.bench_function("fibonacci_directions_200", |b| {
        b.iter(|| DirectionSet::fibonacci(black_box(120.0), 200))
    });
}

fn bench_poisson(c: &mut Criterion) {
    let mut group = c.benchmark_group("PoissonFilter");

    for count in [1_000usize, 10_000] {
        let candidates = random_candidates(count, 5);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("random", count), &candidates, |b, candidates| {
            b.iter(|| {
                poisson_filter(
                    candidates.clone(),
                    &PointGrid::default(),
                    ClearanceRule::QueryRadius,
                )
            })
        });
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");
    group.sample_size(10);

    let plate = create_box(20.0, 20.0, 1.5);
    let config = SupportConfig::default();
    group.bench_function("plate_default", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(1);
            generate_supports(black_box(&plate), &PointGrid::default(), &config, &mut rng)
        })
    });

    let fast = SupportConfig::preset_fast();
    group.bench_function("plate_fast", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(1);
            generate_supports(black_box(&plate), &PointGrid::default(), &fast, &mut rng)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_subdivision,
    bench_width_estimation,
    bench_bvh_build,
    bench_directions,
    bench_poisson,
    bench_full_pipeline,
);

criterion_main!(benches);
