//! Thin-part detection and support point placement for triangle meshes.
//!
//! This crate measures the local width (shape diameter) of a surface by
//! firing cones of rays into the body from every vertex, and places support
//! points on thin, downward facing regions for additive manufacturing.
//!
//! # Features
//!
//! - **Preprocessing**: Quadric-bounded short-edge collapse, crack-free
//!   long-edge subdivision
//! - **Width estimation**: Fibonacci-spiral ray cones, BVH ray casting, angle
//!   and deviation filters, parallel over vertices
//! - **Sampling**: Area-proportional candidate placement with unbiased
//!   stochastic rounding
//! - **Thinning**: Greedy Poisson-disk filter against accepted and
//!   previously placed points
//! - **File I/O**: Binary and ASCII STL
//!
//! # Units and Scale
//!
//! **This library assumes millimeter (mm) units.** Default edge lengths,
//! widths and radii are tuned for parts a few centimeters across. Scale the
//! parameters together with the mesh when working in other units.
//!
//! # Coordinate System
//!
//! Right-handed, with **+Z up** (the build direction). Face winding is
//! counter-clockwise when viewed from outside, so normals point outward.
//! Supports are only placed where the surface faces down.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_supports::{Mesh, PointGrid, SupportConfig, generate_supports};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let mesh = Mesh::load("part.stl").unwrap();
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! let report = generate_supports(&mesh, &PointGrid::default(), &SupportConfig::default(), &mut rng)
//!     .unwrap();
//! println!("{}", report);
//! for p in &report.points {
//!     println!("{:.3} {:.3} {:.3} r={:.3}", p.position.x, p.position.y, p.position.z, p.radius);
//! }
//! ```
//!
//! # Running Stages Separately
//!
//! ```
//! use mesh_supports::{
//!     Bvh, DirectionSet, Mesh, NormalStrategy, RayParams, Vertex, estimate_widths,
//!     subdivide_long_edges, vertex_normals,
//! };
//!
//! let mut mesh = Mesh::new();
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(3.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(0.0, 3.0, 0.0));
//! mesh.faces.push([0, 2, 1]);
//!
//! let refined = subdivide_long_edges(&mesh, 1.0).mesh;
//! let normals = vertex_normals(&refined, NormalStrategy::AreaWeighted);
//! let bvh = Bvh::new(&refined);
//! let directions = DirectionSet::fibonacci(120.0, 30);
//!
//! let widths = estimate_widths(&refined.positions(), &normals, &bvh, &directions, &RayParams::default());
//! assert_eq!(widths.len(), refined.vertex_count());
//! ```
//!
//! # Error Handling
//!
//! The pipeline entry points and file I/O return `SupportResult<T>`, which is
//! `Result<T, SupportError>`. Stages that merely find nothing (a vertex whose
//! rays miss, a triangle without valid widths) return `None` or no points.
//!
//! ```
//! use mesh_supports::{ErrorCode, SupportConfig};
//!
//! let mut config = SupportConfig::default();
//! config.rays.cone_angle_deg = 400.0;
//!
//! let err = config.validate().unwrap_err();
//! assert_eq!(err.code(), ErrorCode::InvalidParameter);
//! ```

mod error;
mod pipeline;
pub mod tracing_ext;
mod types;

pub mod bvh;
pub mod collapse;
pub mod directions;
pub mod grid;
pub mod io;
pub mod normals;
pub mod poisson;
pub mod preprocess;
pub mod sampling;
pub mod subdivide;
pub mod width;

pub use error::{ErrorCode, SupportError, SupportResult};
pub use types::{Mesh, PointRadius, Triangle, Vertex};

pub use bvh::{Bvh, RayCaster, RayHit};
pub use collapse::{CollapseResult, collapse_short_edges};
pub use directions::{Direction, DirectionSet};
pub use grid::{ClearanceRule, PointGrid};
pub use io::{load_stl, save_stl};
pub use normals::{NormalStrategy, vertex_normals};
pub use pipeline::{SupportConfig, SupportReport, generate_supports, sample_tiny_parts};
pub use poisson::poisson_filter;
pub use preprocess::{PreprocessParams, PreprocessResult, preprocess};
pub use sampling::{
    MAX_POINTS_PER_TRIANGLE, SampleParams, generate_support_points, stochastic_round,
};
pub use subdivide::{EdgeRegistry, EdgeRun, SubdivideResult, subdivide_long_edges};
pub use width::{RayParams, WidthStats, estimate_width, estimate_widths};

pub use tracing_ext::{OperationTimer, log_mesh_stats, log_stage_result};

// Convenience methods on Mesh
impl Mesh {
    /// Load a mesh from an STL file.
    pub fn load(path: impl AsRef<std::path::Path>) -> SupportResult<Self> {
        io::load_stl(path.as_ref())
    }

    /// Save the mesh as binary STL.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> SupportResult<()> {
        io::save_stl(self, path.as_ref())
    }

    /// Split edges longer than `max_edge_length` without opening cracks.
    pub fn subdivide_long_edges(&self, max_edge_length: f64) -> SubdivideResult {
        subdivide::subdivide_long_edges(self, max_edge_length)
    }

    /// Collapse edges shorter than `min_edge_length` in place.
    pub fn collapse_short_edges(&mut self, min_edge_length: f64, max_error: f64) -> CollapseResult {
        collapse::collapse_short_edges(self, min_edge_length, max_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_convenience_methods() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(2.5, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 2.5, 0.0));
        mesh.faces.push([0, 1, 2]);

        let result = mesh.subdivide_long_edges(1.0);
        assert!(result.final_triangles > 1);

        let mut refined = result.mesh;
        let collapse = refined.collapse_short_edges(0.0, 0.01);
        assert_eq!(collapse.collapses_performed, 0);
    }
}
