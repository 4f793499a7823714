//! Tracing helpers for the support pipeline.
//!
//! Nothing is printed unless the application installs a subscriber:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//! ```
//!
//! Targets:
//! - `mesh_supports::timing`: stage durations (INFO)
//! - `mesh_supports::stages`: produced and discarded counts per stage (INFO)
//! - `mesh_supports::mesh_state`: mesh size (DEBUG) and area (TRACE)
//!
//! Contract violations that degrade to an empty result log at WARN from the
//! module that detects them.

use std::time::Instant;

use tracing::span::EnteredSpan;
use tracing::{debug, info, trace};

/// Enters a span for one pipeline operation and logs its duration when
/// dropped.
///
/// ```rust,ignore
/// let _timer = OperationTimer::with_context("preprocess", faces, vertices);
/// // work logged inside the `support_operation` span
/// ```
#[must_use = "the timer logs when dropped; bind it to a named variable"]
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    _span: EnteredSpan,
}

impl OperationTimer {
    pub fn new(name: &'static str) -> Self {
        debug!(target: "mesh_supports::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            _span: tracing::info_span!("support_operation", operation = name).entered(),
        }
    }

    /// Timer whose span also records the input mesh size.
    pub fn with_context(name: &'static str, face_count: usize, vertex_count: usize) -> Self {
        debug!(
            target: "mesh_supports::timing",
            operation = name,
            faces = face_count,
            vertices = vertex_count,
            "Starting operation"
        );
        let span = tracing::info_span!(
            "support_operation",
            operation = name,
            faces = face_count,
            vertices = vertex_count
        );
        Self {
            name,
            start: Instant::now(),
            _span: span.entered(),
        }
    }

    /// Milliseconds since the timer was created.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1e3
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "mesh_supports::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Operation completed"
        );
    }
}

/// Log vertex and face counts plus the bounding box extent.
pub fn log_mesh_stats(mesh: &crate::Mesh, context: &str) {
    let extent = mesh
        .bounds()
        .map(|(lo, hi)| hi - lo)
        .unwrap_or_else(nalgebra::Vector3::zeros);

    debug!(
        target: "mesh_supports::mesh_state",
        context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        extent = format!("{:.2} x {:.2} x {:.2}", extent.x, extent.y, extent.z),
        "Mesh state"
    );
    trace!(
        target: "mesh_supports::mesh_state",
        context,
        surface_area = format!("{:.4}", mesh.surface_area()),
        "Mesh surface"
    );
}

/// Log how many items a stage kept and how many it dropped.
pub fn log_stage_result(stage: &str, produced: usize, discarded: usize) {
    info!(
        target: "mesh_supports::stages",
        stage,
        produced,
        discarded,
        "Stage completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mesh, Vertex};

    #[test]
    fn test_operation_timer_measures_time() {
        let timer = OperationTimer::new("sleep");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);

        let timer = OperationTimer::with_context("empty", 0, 0);
        assert!(timer.elapsed_ms() >= 0.0);
    }

    #[test]
    fn test_logging_helpers_accept_any_mesh() {
        log_mesh_stats(&Mesh::new(), "empty");

        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        log_mesh_stats(&mesh, "triangle");

        log_stage_result("poisson", 3, 1);
    }
}
