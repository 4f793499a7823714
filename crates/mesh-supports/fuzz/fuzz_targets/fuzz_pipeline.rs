#![no_main]

use libfuzzer_sys::fuzz_target;
use mesh_supports::{Mesh, PointGrid, SupportConfig, generate_supports};
use nalgebra::Point3;
use rand::SeedableRng;
use rand::rngs::StdRng;

// Each triangle takes nine bytes, one per coordinate, on a 0.25 mm lattice.
fuzz_target!(|data: &[u8]| {
    let mut positions = Vec::new();
    let mut faces = Vec::new();
    for chunk in data.chunks_exact(9).take(64) {
        let base = positions.len() as u32;
        for corner in chunk.chunks_exact(3) {
            positions.push(Point3::new(
                f64::from(corner[0]) * 0.25,
                f64::from(corner[1]) * 0.25,
                f64::from(corner[2]) * 0.25,
            ));
        }
        faces.push([base, base + 1, base + 2]);
    }
    let mesh = Mesh::from_parts(positions, faces);

    let mut config = SupportConfig::preset_fast();
    config.preprocess.max_edge_length = 8.0;
    let mut rng = StdRng::seed_from_u64(0);

    let report = generate_supports(&mesh, &PointGrid::default(), &config, &mut rng)
        .expect("valid mesh and config");
    assert!(report.points.len() <= report.candidates_generated);
});
