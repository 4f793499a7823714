//! Mesh preparation before width estimation.
//!
//! Short edges are collapsed first, then long edges are subdivided, so that
//! vertices (where widths are measured) are spread evenly over the surface.

use tracing::info;

use crate::collapse::{CollapseResult, collapse_short_edges};
use crate::subdivide::subdivide_long_edges;
use crate::tracing_ext::OperationTimer;
use crate::Mesh;

/// Parameters for mesh preparation.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(default))]
pub struct PreprocessParams {
    /// Edges shorter than this are collapsed. Zero disables collapsing.
    pub min_edge_length: f64,

    /// Largest surface deviation a collapse may introduce.
    pub max_error: f64,

    /// Edges longer than this are subdivided.
    pub max_edge_length: f64,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            min_edge_length: 0.1,
            max_error: 0.01,
            max_edge_length: 1.0,
        }
    }
}

impl PreprocessParams {
    /// Denser vertex spacing for small parts.
    pub fn fine() -> Self {
        Self {
            min_edge_length: 0.05,
            max_error: 0.005,
            max_edge_length: 0.5,
        }
    }

    /// Only subdivide; never collapse.
    pub fn subdivide_only(max_edge_length: f64) -> Self {
        Self {
            min_edge_length: 0.0,
            max_edge_length,
            ..Default::default()
        }
    }
}

/// Result of mesh preparation.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// The prepared mesh.
    pub mesh: Mesh,
    /// Statistics of the collapse step.
    pub collapse: CollapseResult,
    /// Triangles entering subdivision.
    pub triangles_before_subdivision: usize,
    /// Triangles after subdivision.
    pub final_triangles: usize,
    /// Vertices added by subdivision.
    pub vertices_inserted: usize,
    /// Triangle splits performed by subdivision.
    pub splits_performed: usize,
}

impl std::fmt::Display for PreprocessResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Preprocessing:")?;
        writeln!(
            f,
            "  Collapsed {} short edges ({} refused by error, {} by topology)",
            self.collapse.collapses_performed,
            self.collapse.rejected_by_error,
            self.collapse.rejected_by_topology
        )?;
        write!(
            f,
            "  Subdivided {} -> {} triangles ({} vertices inserted)",
            self.triangles_before_subdivision, self.final_triangles, self.vertices_inserted
        )
    }
}

/// Collapse short edges, then subdivide long ones.
///
/// # Example
/// ```
/// use mesh_supports::{Mesh, PreprocessParams, Vertex, preprocess};
///
/// let mut mesh = Mesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(4.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 4.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// let result = preprocess(&mesh, &PreprocessParams::default());
/// assert!(result.final_triangles > 1);
/// ```
pub fn preprocess(mesh: &Mesh, params: &PreprocessParams) -> PreprocessResult {
    let _timer = OperationTimer::with_context("preprocess", mesh.face_count(), mesh.vertex_count());

    let mut collapsed = mesh.clone();
    let collapse = collapse_short_edges(&mut collapsed, params.min_edge_length, params.max_error);
    let subdivided = subdivide_long_edges(&collapsed, params.max_edge_length);

    info!(
        collapses = collapse.collapses_performed,
        vertices_inserted = subdivided.vertices_inserted,
        final_triangles = subdivided.final_triangles,
        "Preprocessing complete"
    );

    PreprocessResult {
        triangles_before_subdivision: subdivided.original_triangles,
        final_triangles: subdivided.final_triangles,
        vertices_inserted: subdivided.vertices_inserted,
        splits_performed: subdivided.splits_performed,
        mesh: subdivided.mesh,
        collapse,
    }
}
