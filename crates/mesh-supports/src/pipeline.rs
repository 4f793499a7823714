//! End-to-end support generation.
//!
//! [`generate_supports`] chains the stages of this crate with one
//! [`SupportConfig`]:
//!
//! 1. preprocess the mesh (collapse short edges, subdivide long ones)
//! 2. estimate vertex normals
//! 3. build the ray index and the probing directions
//! 4. estimate per-vertex widths (parallel)
//! 5. scatter candidates over thin, downward facing triangles
//! 6. thin the candidates against each other and an external grid
//!
//! # Example
//!
//! ```
//! use mesh_supports::{Mesh, PointGrid, SupportConfig, Vertex, generate_supports};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let mut mesh = Mesh::new();
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
//! mesh.faces.push([0, 2, 1]);
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let report = generate_supports(&mesh, &PointGrid::default(), &SupportConfig::default(), &mut rng)
//!     .unwrap();
//!
//! // A lone triangle has nothing above it, so no width is measured.
//! assert_eq!(report.vertices_measured, 0);
//! assert!(report.points.is_empty());
//! ```

use std::f64::consts::PI;

use nalgebra::Point3;
use rand::Rng;
use tracing::{debug, info};

use crate::bvh::Bvh;
use crate::error::{SupportError, SupportResult};
use crate::grid::{ClearanceRule, PointGrid};
use crate::normals::{NormalStrategy, vertex_normals};
use crate::poisson::poisson_filter;
use crate::preprocess::{PreprocessParams, preprocess};
use crate::sampling::{SampleParams, generate_support_points};
use crate::tracing_ext::{OperationTimer, log_mesh_stats, log_stage_result};
use crate::width::{RayParams, WidthStats, estimate_widths};
use crate::{Mesh, PointRadius};

/// Every parameter of the support pipeline.
///
/// Missing fields fall back to their defaults when deserialized.
#[derive(Debug, Clone, Default)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(default))]
pub struct SupportConfig {
    /// Mesh preparation.
    pub preprocess: PreprocessParams,
    /// Vertex normal estimation.
    pub normal_strategy: NormalStrategy,
    /// Ray probing.
    pub rays: RayParams,
    /// Candidate sampling.
    pub sample: SampleParams,
    /// Minimum distance rule for the Poisson filter.
    pub clearance: ClearanceRule,
}

impl SupportConfig {
    /// Quick preview: coarse mesh, few rays, no filtering.
    pub fn preset_fast() -> Self {
        Self {
            preprocess: PreprocessParams {
                max_edge_length: 2.0,
                ..Default::default()
            },
            rays: RayParams::fast(),
            ..Default::default()
        }
    }

    /// Fine resin printing: dense vertices, many rays, small supports.
    pub fn preset_sla() -> Self {
        Self {
            preprocess: PreprocessParams::fine(),
            rays: RayParams::precise(),
            sample: SampleParams::for_sla(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON string.
    #[cfg(feature = "pipeline-config")]
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize to JSON string.
    #[cfg(feature = "pipeline-config")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check that every value lies in its valid range.
    pub fn validate(&self) -> SupportResult<()> {
        let pre = &self.preprocess;
        non_negative("preprocess.min_edge_length", pre.min_edge_length)?;
        non_negative("preprocess.max_error", pre.max_error)?;
        positive("preprocess.max_edge_length", pre.max_edge_length)?;
        if pre.min_edge_length >= pre.max_edge_length {
            return Err(SupportError::invalid_parameter(
                "preprocess.min_edge_length",
                format!(
                    "{} must be smaller than max_edge_length {}",
                    pre.min_edge_length, pre.max_edge_length
                ),
            ));
        }

        let rays = &self.rays;
        if rays.sample_count == 0 {
            return Err(SupportError::invalid_parameter(
                "rays.sample_count",
                "at least one direction is needed",
            ));
        }
        if !(rays.cone_angle_deg > 1.0 && rays.cone_angle_deg < 180.0) {
            return Err(SupportError::invalid_parameter(
                "rays.cone_angle_deg",
                format!("{} must lie in (1, 180)", rays.cone_angle_deg),
            ));
        }
        if !(0.0..=PI).contains(&rays.allowed_angle) {
            return Err(SupportError::invalid_parameter(
                "rays.allowed_angle",
                format!("{} must lie in [0, pi]", rays.allowed_angle),
            ));
        }
        non_negative("rays.deviation_multiplier", rays.deviation_multiplier)?;
        non_negative("rays.safe_move", rays.safe_move)?;
        finite("rays.normal_z_max", rays.normal_z_max)?;

        let sample = &self.sample;
        non_negative("sample.min_width", sample.min_width)?;
        positive("sample.max_width", sample.max_width)?;
        if sample.min_width >= sample.max_width {
            return Err(SupportError::invalid_parameter(
                "sample.min_width",
                format!(
                    "{} must be smaller than max_width {}",
                    sample.min_width, sample.max_width
                ),
            ));
        }
        positive("sample.min_radius", sample.min_radius)?;
        positive("sample.max_radius", sample.max_radius)?;
        positive("sample.area_multiplier", sample.area_multiplier)?;
        finite("sample.normal_z_max", sample.normal_z_max)?;

        Ok(())
    }
}

fn finite(name: &'static str, value: f64) -> SupportResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SupportError::invalid_parameter(
            name,
            format!("{} is not finite", value),
        ))
    }
}

fn non_negative(name: &'static str, value: f64) -> SupportResult<()> {
    finite(name, value)?;
    if value < 0.0 {
        return Err(SupportError::invalid_parameter(
            name,
            format!("{} must not be negative", value),
        ));
    }
    Ok(())
}

fn positive(name: &'static str, value: f64) -> SupportResult<()> {
    finite(name, value)?;
    if value <= 0.0 {
        return Err(SupportError::invalid_parameter(
            name,
            format!("{} must be positive", value),
        ));
    }
    Ok(())
}

/// Outcome of [`generate_supports`].
#[derive(Debug, Clone)]
pub struct SupportReport {
    /// Accepted support points with the radius each one covers.
    pub points: Vec<PointRadius>,
    /// Triangles of the preprocessed mesh.
    pub preprocessed_triangles: usize,
    /// Vertices of the preprocessed mesh.
    pub preprocessed_vertices: usize,
    /// Edge collapses performed during preprocessing.
    pub collapses_performed: usize,
    /// Vertices inserted by subdivision.
    pub vertices_inserted: usize,
    /// Probing directions per vertex.
    pub directions: usize,
    /// Vertices whose width was estimated.
    pub vertices_probed: usize,
    /// Vertices with a determined width.
    pub vertices_measured: usize,
    /// Candidates before Poisson filtering.
    pub candidates_generated: usize,
    /// Width summary over the probed vertices.
    pub width_stats: WidthStats,
}

impl SupportReport {
    fn empty() -> Self {
        Self {
            points: Vec::new(),
            preprocessed_triangles: 0,
            preprocessed_vertices: 0,
            collapses_performed: 0,
            vertices_inserted: 0,
            directions: 0,
            vertices_probed: 0,
            vertices_measured: 0,
            candidates_generated: 0,
            width_stats: WidthStats::from_widths(&[]),
        }
    }

    /// Positions of the accepted points.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Candidates removed by the Poisson filter.
    pub fn candidates_rejected(&self) -> usize {
        self.candidates_generated - self.points.len()
    }
}

impl std::fmt::Display for SupportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Support Report:")?;
        writeln!(
            f,
            "  Mesh: {} triangles, {} vertices after preprocessing ({} collapses, {} inserted)",
            self.preprocessed_triangles,
            self.preprocessed_vertices,
            self.collapses_performed,
            self.vertices_inserted
        )?;
        writeln!(f, "  Directions: {}", self.directions)?;
        writeln!(f, "  Widths: {}", self.width_stats)?;
        write!(
            f,
            "  Supports: {} accepted of {} candidates",
            self.points.len(),
            self.candidates_generated
        )
    }
}

/// Run the full pipeline and return accepted points with their radii.
///
/// `grid` holds supports placed earlier, which new points must keep clear
/// of. All randomness comes from `rng`, so a seeded generator reproduces the
/// result exactly.
///
/// # Errors
///
/// Returns [`SupportError::InvalidParameter`] for an out-of-range config and
/// [`SupportError::InvalidVertexIndex`] when a face references a missing
/// vertex. An empty mesh is not an error.
pub fn generate_supports<R: Rng + ?Sized>(
    mesh: &Mesh,
    grid: &PointGrid,
    config: &SupportConfig,
    rng: &mut R,
) -> SupportResult<SupportReport> {
    config.validate()?;
    mesh.validate_indices()?;

    if mesh.faces.is_empty() {
        debug!("Mesh has no faces, no supports generated");
        return Ok(SupportReport::empty());
    }

    let _timer =
        OperationTimer::with_context("generate_supports", mesh.face_count(), mesh.vertex_count());
    log_mesh_stats(mesh, "support input");

    let prepared = preprocess(mesh, &config.preprocess);
    let work = prepared.mesh;
    log_mesh_stats(&work, "after preprocessing");

    let positions = work.positions();
    let normals = vertex_normals(&work, config.normal_strategy);
    let bvh = Bvh::new(&work);
    let directions = config.rays.directions();

    let widths = estimate_widths(&positions, &normals, &bvh, &directions, &config.rays);
    let width_stats = WidthStats::from_widths(&widths);
    log_stage_result(
        "width",
        width_stats.measured,
        width_stats.probed - width_stats.measured,
    );

    let candidates =
        generate_support_points(&work.faces, &positions, &widths, &config.sample, rng);
    let candidates_generated = candidates.len();

    let points = poisson_filter(candidates, grid, config.clearance);
    log_stage_result("poisson", points.len(), candidates_generated - points.len());

    info!(
        supports = points.len(),
        candidates = candidates_generated,
        measured = width_stats.measured,
        "Support generation complete"
    );

    Ok(SupportReport {
        points,
        preprocessed_triangles: work.face_count(),
        preprocessed_vertices: work.vertex_count(),
        collapses_performed: prepared.collapse.collapses_performed,
        vertices_inserted: prepared.vertices_inserted,
        directions: directions.len(),
        vertices_probed: width_stats.probed,
        vertices_measured: width_stats.measured,
        candidates_generated,
        width_stats,
    })
}

/// Support positions for thin parts of `mesh`.
///
/// Same as [`generate_supports`] with the radii dropped.
pub fn sample_tiny_parts<R: Rng + ?Sized>(
    mesh: &Mesh,
    grid: &PointGrid,
    config: &SupportConfig,
    rng: &mut R,
) -> SupportResult<Vec<Point3<f64>>> {
    generate_supports(mesh, grid, config, rng).map(|report| report.positions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;
    use crate::error::ErrorCode;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Closed box spanning `[0, sx] x [0, sy] x [0, sz]` with outward normals.
    fn make_box(sx: f64, sy: f64, sz: f64) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices = vec![
            Vertex::from_coords(0.0, 0.0, 0.0),
            Vertex::from_coords(sx, 0.0, 0.0),
            Vertex::from_coords(sx, sy, 0.0),
            Vertex::from_coords(0.0, sy, 0.0),
            Vertex::from_coords(0.0, 0.0, sz),
            Vertex::from_coords(sx, 0.0, sz),
            Vertex::from_coords(sx, sy, sz),
            Vertex::from_coords(0.0, sy, sz),
        ];
        mesh.faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        mesh
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SupportConfig::default().validate().is_ok());
        assert!(SupportConfig::preset_fast().validate().is_ok());
        assert!(SupportConfig::preset_sla().validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = SupportConfig::default();
        config.rays.cone_angle_deg = 180.0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameter);
        assert!(err.to_string().contains("rays.cone_angle_deg"));

        let mut config = SupportConfig::default();
        config.sample.max_width = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = SupportConfig::default();
        config.preprocess.min_edge_length = 2.0;
        assert!(config.validate().is_err());

        let mut config = SupportConfig::default();
        config.rays.sample_count = 0;
        assert!(config.validate().is_err());

        let mut config = SupportConfig::default();
        config.sample.min_radius = -0.1;
        assert!(config.validate().is_err());

        // A zero radius would make the coverage area vanish.
        for (min_radius, max_radius) in [(0.0, 1.0), (0.2, 0.0)] {
            let mut config = SupportConfig::default();
            config.sample.min_radius = min_radius;
            config.sample.max_radius = max_radius;
            let err = config.validate().unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidParameter);
        }
        let mut config = SupportConfig::default();
        config.sample.min_radius = 0.0;
        assert!(config.validate().unwrap_err().to_string().contains("sample.min_radius"));
    }

    #[test]
    fn test_empty_mesh_gives_empty_report() {
        let mut rng = StdRng::seed_from_u64(0);
        let report = generate_supports(
            &Mesh::new(),
            &PointGrid::default(),
            &SupportConfig::default(),
            &mut rng,
        )
        .unwrap();
        assert!(report.points.is_empty());
        assert_eq!(report.vertices_probed, 0);
        assert_eq!(report.candidates_rejected(), 0);
    }

    #[test]
    fn test_invalid_index_is_reported() {
        let mut mesh = make_box(1.0, 1.0, 1.0);
        mesh.faces.push([0, 1, 42]);
        let mut rng = StdRng::seed_from_u64(0);
        let err = generate_supports(&mesh, &PointGrid::default(), &SupportConfig::default(), &mut rng)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidVertexIndex);
    }

    #[test]
    fn test_thin_plate_gets_supports_on_bottom() {
        let mesh = make_box(6.0, 6.0, 1.0);
        let mut rng = StdRng::seed_from_u64(11);
        let config = SupportConfig::default();

        let report = generate_supports(&mesh, &PointGrid::default(), &config, &mut rng).unwrap();

        assert!(report.vertices_measured > 0);
        assert!(report.candidates_generated >= report.points.len());
        assert!(!report.points.is_empty());
        for p in &report.points {
            assert!(p.position.z.abs() < 1e-9, "support at z = {}", p.position.z);
            assert!(p.radius >= config.sample.min_radius - 1e-12);
            assert!(p.radius <= config.sample.max_radius + 1e-12);
        }
        assert!(report.to_string().contains("accepted"));
    }

    #[test]
    fn test_thick_block_gets_none() {
        // Every width exceeds the default limit of 2.
        let mesh = make_box(5.0, 5.0, 5.0);
        let mut rng = StdRng::seed_from_u64(5);
        let report =
            generate_supports(&mesh, &PointGrid::default(), &SupportConfig::default(), &mut rng)
                .unwrap();
        assert!(report.points.is_empty());
    }

    #[test]
    fn test_external_grid_blocks_region() {
        let mesh = make_box(6.0, 6.0, 1.0);
        let config = SupportConfig {
            clearance: ClearanceRule::Sum,
            ..Default::default()
        };
        let mut blocker = PointGrid::new(1.0);
        blocker.insert(Point3::new(3.0, 3.0, 0.0), 100.0);

        let mut rng = StdRng::seed_from_u64(11);
        let report = generate_supports(&mesh, &blocker, &config, &mut rng).unwrap();
        assert!(report.points.is_empty());
    }

    #[test]
    fn test_tiny_parts_matches_report_positions() {
        let mesh = make_box(6.0, 6.0, 1.0);
        let config = SupportConfig::default();
        let grid = PointGrid::default();

        let report = generate_supports(&mesh, &grid, &config, &mut StdRng::seed_from_u64(3)).unwrap();
        let positions =
            sample_tiny_parts(&mesh, &grid, &config, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(positions, report.positions());
    }

    #[cfg(feature = "pipeline-config")]
    #[test]
    fn test_config_json_round_trip() {
        let config = SupportConfig::preset_sla();
        let json = config.to_json().unwrap();
        let parsed = SupportConfig::from_json(&json).unwrap();
        assert_eq!(parsed.rays.sample_count, config.rays.sample_count);
        assert_eq!(parsed.sample.max_radius, config.sample.max_radius);
        assert_eq!(parsed.clearance, config.clearance);

        let partial = SupportConfig::from_json(r#"{"clearance": "sum", "rays": {"safe_move": 0.2}}"#)
            .unwrap();
        assert_eq!(partial.clearance, ClearanceRule::Sum);
        assert_eq!(partial.rays.safe_move, 0.2);
        assert_eq!(partial.rays.sample_count, RayParams::default().sample_count);
    }
}
