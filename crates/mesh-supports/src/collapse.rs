//! Removal of short edges by error-bounded edge collapse.
//!
//! Every edge shorter than the threshold is a collapse candidate, shortest
//! first. The merged vertex is placed where the summed plane quadrics of both
//! endpoints are smallest; the square root of that error is the geometric
//! deviation checked against `max_error`. Collapses that would pinch the
//! surface or fold a neighboring face over are refused.

use hashbrown::HashSet;
use nalgebra::{Point3, Vector3};
use tracing::{debug, info};

use crate::Mesh;

/// Upper bound on collapse passes. Each pass reconsiders edges that became
/// short because a neighbor moved.
const MAX_PASSES: usize = 8;

/// Statistics from short edge collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseResult {
    /// Triangle count before collapsing.
    pub original_triangles: usize,
    /// Triangle count after collapsing.
    pub final_triangles: usize,
    /// Vertex count before collapsing.
    pub original_vertices: usize,
    /// Vertex count after compaction.
    pub final_vertices: usize,
    /// Number of edges collapsed.
    pub collapses_performed: usize,
    /// Candidates refused because the deviation would exceed `max_error`.
    pub rejected_by_error: usize,
    /// Candidates refused because the surface would pinch or fold.
    pub rejected_by_topology: usize,
    /// Number of passes run.
    pub passes: usize,
}

/// Quadric error matrix (4x4 symmetric matrix stored as 10 values).
#[derive(Debug, Clone, Copy, Default)]
struct Quadric {
    // Symmetric 4x4 matrix stored as upper triangle:
    // [a b c d]
    // [  e f g]
    // [    h i]
    // [      j]
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    g: f64,
    h: f64,
    i: f64,
    j: f64,
}

impl Quadric {
    /// Quadric of the plane `ax + by + cz + d = 0` with unit normal.
    fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            a: a * a,
            b: a * b,
            c: a * c,
            d: a * d,
            e: b * b,
            f: b * c,
            g: b * d,
            h: c * c,
            i: c * d,
            j: d * d,
        }
    }

    fn add(&mut self, other: &Quadric) {
        self.a += other.a;
        self.b += other.b;
        self.c += other.c;
        self.d += other.d;
        self.e += other.e;
        self.f += other.f;
        self.g += other.g;
        self.h += other.h;
        self.i += other.i;
        self.j += other.j;
    }

    /// Sum of squared distances from `p` to the accumulated planes.
    fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let (x, y, z) = (p.x, p.y, p.z);
        self.a * x * x
            + 2.0 * self.b * x * y
            + 2.0 * self.c * x * z
            + 2.0 * self.d * x
            + self.e * y * y
            + 2.0 * self.f * y * z
            + 2.0 * self.g * y
            + self.h * z * z
            + 2.0 * self.i * z
            + self.j
    }

    /// Point minimizing the error, or None if the matrix is singular.
    fn optimal_point(&self) -> Option<Point3<f64>> {
        let det = self.a * (self.e * self.h - self.f * self.f)
            - self.b * (self.b * self.h - self.f * self.c)
            + self.c * (self.b * self.f - self.e * self.c);

        if det.abs() < 1e-10 {
            return None;
        }

        let inv_det = 1.0 / det;

        let m00 = (self.e * self.h - self.f * self.f) * inv_det;
        let m01 = (self.c * self.f - self.b * self.h) * inv_det;
        let m02 = (self.b * self.f - self.c * self.e) * inv_det;
        let m11 = (self.a * self.h - self.c * self.c) * inv_det;
        let m12 = (self.b * self.c - self.a * self.f) * inv_det;
        let m22 = (self.a * self.e - self.b * self.b) * inv_det;

        Some(Point3::new(
            m00 * (-self.d) + m01 * (-self.g) + m02 * (-self.i),
            m01 * (-self.d) + m11 * (-self.g) + m12 * (-self.i),
            m02 * (-self.d) + m12 * (-self.g) + m22 * (-self.i),
        ))
    }
}

/// Mutable working state of a collapse run.
struct Collapser {
    positions: Vec<Point3<f64>>,
    faces: Vec<Option<[u32; 3]>>,
    vertex_faces: Vec<Vec<usize>>,
    quadrics: Vec<Quadric>,
    removed: Vec<bool>,
}

enum Verdict {
    Collapse(Point3<f64>),
    TooMuchError,
    BadTopology,
}

impl Collapser {
    fn new(mesh: &Mesh) -> Self {
        let positions: Vec<Point3<f64>> = mesh.positions();
        let mut vertex_faces = vec![Vec::new(); positions.len()];
        let mut quadrics = vec![Quadric::default(); positions.len()];

        for (fi, face) in mesh.faces.iter().enumerate() {
            for &vi in face {
                vertex_faces[vi as usize].push(fi);
            }

            let p0 = positions[face[0] as usize];
            let normal = (positions[face[1] as usize] - p0).cross(&(positions[face[2] as usize] - p0));
            let Some(n) = normal.try_normalize(1e-12) else {
                continue;
            };
            let q = Quadric::from_plane(n.x, n.y, n.z, -n.dot(&p0.coords));
            for &vi in face {
                quadrics[vi as usize].add(&q);
            }
        }

        Self {
            removed: vec![false; positions.len()],
            faces: mesh.faces.iter().copied().map(Some).collect(),
            positions,
            vertex_faces,
            quadrics,
        }
    }

    fn live_faces(&self, v: u32) -> impl Iterator<Item = (usize, [u32; 3])> + '_ {
        self.vertex_faces[v as usize]
            .iter()
            .filter_map(|&fi| self.faces[fi].map(|f| (fi, f)))
    }

    fn neighbors(&self, v: u32) -> HashSet<u32> {
        self.live_faces(v)
            .flat_map(|(_, f)| f)
            .filter(|&u| u != v)
            .collect()
    }

    fn length(&self, a: u32, b: u32) -> f64 {
        (self.positions[b as usize] - self.positions[a as usize]).norm()
    }

    /// Unique live edges shorter than `min_length`, shortest first.
    fn short_edges(&self, min_length: f64) -> Vec<(u32, u32)> {
        let mut seen = HashSet::new();
        let mut edges: Vec<((u32, u32), f64)> = Vec::new();
        for face in self.faces.iter().flatten() {
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                let key = if a < b { (a, b) } else { (b, a) };
                if !seen.insert(key) {
                    continue;
                }
                let length = self.length(key.0, key.1);
                if length < min_length {
                    edges.push((key, length));
                }
            }
        }
        edges.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
        edges.into_iter().map(|(key, _)| key).collect()
    }

    fn evaluate(&self, a: u32, b: u32, max_error: f64) -> Verdict {
        let na = self.neighbors(a);
        let nb = self.neighbors(b);
        if !na.contains(&b) {
            return Verdict::BadTopology;
        }

        // More than two shared neighbors pinches the surface; fewer than three
        // remaining neighbors collapses a closed piece to a sliver.
        let common = na.intersection(&nb).filter(|&&v| v != a && v != b).count();
        let merged = na.union(&nb).filter(|&&v| v != a && v != b).count();
        if common > 2 || merged < 3 {
            return Verdict::BadTopology;
        }

        let mut quadric = self.quadrics[a as usize];
        quadric.add(&self.quadrics[b as usize]);

        let pa = self.positions[a as usize];
        let pb = self.positions[b as usize];
        let midpoint = Point3::from((pa.coords + pb.coords) * 0.5);
        let reach = (pb - pa).norm();

        let optimal = quadric
            .optimal_point()
            .filter(|p| (p - midpoint).norm() <= reach);
        let (target, error) = [Some(midpoint), optimal, Some(pa), Some(pb)]
            .into_iter()
            .flatten()
            .map(|p| (p, quadric.evaluate(&p).max(0.0)))
            .fold((midpoint, f64::INFINITY), |best, cand| {
                if cand.1 < best.1 { cand } else { best }
            });

        if error.sqrt() > max_error {
            return Verdict::TooMuchError;
        }
        if self.folds_over(a, b, &target) {
            return Verdict::BadTopology;
        }
        Verdict::Collapse(target)
    }

    /// Whether moving `a` and `b` to `target` flips or flattens a face that
    /// survives the collapse.
    fn folds_over(&self, a: u32, b: u32, target: &Point3<f64>) -> bool {
        let moved = |v: u32| {
            if v == a || v == b {
                *target
            } else {
                self.positions[v as usize]
            }
        };
        self.live_faces(a).chain(self.live_faces(b)).any(|(_, f)| {
            if f.contains(&a) && f.contains(&b) {
                return false;
            }
            let p = f.map(|v| self.positions[v as usize]);
            let q = f.map(&moved);
            let before: Vector3<f64> = (p[1] - p[0]).cross(&(p[2] - p[0]));
            let after: Vector3<f64> = (q[1] - q[0]).cross(&(q[2] - q[0]));
            after.dot(&before) <= 0.0
        })
    }

    /// Merge `b` into `a` at `target`.
    fn collapse(&mut self, a: u32, b: u32, target: Point3<f64>) {
        let b_faces = std::mem::take(&mut self.vertex_faces[b as usize]);
        for fi in b_faces {
            let Some(face) = self.faces[fi].as_mut() else {
                continue;
            };
            if face.contains(&a) {
                self.faces[fi] = None;
            } else {
                for v in face.iter_mut() {
                    if *v == b {
                        *v = a;
                    }
                }
                self.vertex_faces[a as usize].push(fi);
            }
        }

        let qb = self.quadrics[b as usize];
        self.quadrics[a as usize].add(&qb);
        self.positions[a as usize] = target;
        self.removed[b as usize] = true;
    }
}

/// Collapse edges shorter than `min_edge_length` in place.
///
/// A collapse is refused when the merged vertex would deviate more than
/// `max_error` from the original surface, or when it would make the mesh
/// non-manifold or fold a face over. Degenerate faces are dropped and
/// unreferenced vertices removed afterwards, so vertex indices change.
///
/// A non-positive or non-finite `min_edge_length` leaves the mesh untouched.
pub fn collapse_short_edges(mesh: &mut Mesh, min_edge_length: f64, max_error: f64) -> CollapseResult {
    let mut result = CollapseResult {
        original_triangles: mesh.faces.len(),
        final_triangles: mesh.faces.len(),
        original_vertices: mesh.vertices.len(),
        final_vertices: mesh.vertices.len(),
        ..Default::default()
    };

    if !(min_edge_length.is_finite() && min_edge_length > 0.0) || mesh.faces.is_empty() {
        return result;
    }

    let mut state = Collapser::new(mesh);

    for pass in 0..MAX_PASSES {
        let candidates = state.short_edges(min_edge_length);
        if candidates.is_empty() {
            break;
        }
        result.passes = pass + 1;

        let mut collapsed = 0;
        for (a, b) in candidates {
            if state.removed[a as usize] || state.removed[b as usize] {
                continue;
            }
            // An earlier collapse may have moved an endpoint.
            if state.length(a, b) >= min_edge_length {
                continue;
            }
            match state.evaluate(a, b, max_error) {
                Verdict::Collapse(target) => {
                    state.collapse(a, b, target);
                    collapsed += 1;
                }
                Verdict::TooMuchError => result.rejected_by_error += 1,
                Verdict::BadTopology => result.rejected_by_topology += 1,
            }
        }

        debug!(pass, collapsed, "Collapse pass complete");
        result.collapses_performed += collapsed;
        if collapsed == 0 {
            break;
        }
    }

    if result.collapses_performed > 0 {
        rebuild(mesh, &state);
    }
    result.final_triangles = mesh.faces.len();
    result.final_vertices = mesh.vertices.len();

    info!(
        collapses = result.collapses_performed,
        rejected_by_error = result.rejected_by_error,
        rejected_by_topology = result.rejected_by_topology,
        final_triangles = result.final_triangles,
        "Short edge collapse complete"
    );

    result
}

/// Write the surviving faces back and compact the vertex array.
fn rebuild(mesh: &mut Mesh, state: &Collapser) {
    let mut remap = vec![u32::MAX; state.positions.len()];
    let mut vertices = Vec::with_capacity(mesh.vertices.len());
    let mut faces = Vec::with_capacity(mesh.faces.len());

    for face in state.faces.iter().flatten() {
        if face[0] == face[1] || face[1] == face[2] || face[2] == face[0] {
            continue;
        }
        let mut mapped = [0u32; 3];
        for (slot, &v) in mapped.iter_mut().zip(face) {
            if remap[v as usize] == u32::MAX {
                remap[v as usize] = vertices.len() as u32;
                let mut vertex = mesh.vertices[v as usize].clone();
                if vertex.position != state.positions[v as usize] {
                    vertex.position = state.positions[v as usize];
                    vertex.normal = None;
                }
                vertices.push(vertex);
            }
            *slot = remap[v as usize];
        }
        faces.push(mapped);
    }

    mesh.vertices = vertices;
    mesh.faces = faces;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;

    /// Hexagonal fan whose center is split into two vertices `gap` apart,
    /// lifted to heights `z1` and `z2`.
    fn make_split_fan(gap: f64, z1: f64, z2: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for k in 0..6 {
            let angle = f64::from(k) * std::f64::consts::PI / 3.0;
            mesh.vertices
                .push(Vertex::from_coords(angle.cos(), angle.sin(), 0.0)); // r0..r5
        }
        mesh.vertices.push(Vertex::from_coords(-gap / 2.0, 0.0, z1)); // 6: c1
        mesh.vertices.push(Vertex::from_coords(gap / 2.0, 0.0, z2)); // 7: c2

        mesh.faces.push([7, 0, 1]);
        mesh.faces.push([7, 5, 0]);
        mesh.faces.push([6, 2, 3]);
        mesh.faces.push([6, 3, 4]);
        mesh.faces.push([7, 1, 6]);
        mesh.faces.push([6, 1, 2]);
        mesh.faces.push([6, 4, 5]);
        mesh.faces.push([6, 5, 7]);
        mesh
    }

    fn min_edge(mesh: &Mesh) -> f64 {
        mesh.triangles()
            .flat_map(|t| t.edge_lengths())
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_quadric_from_plane() {
        // Plane z = 0
        let q = Quadric::from_plane(0.0, 0.0, 1.0, 0.0);
        assert!(q.evaluate(&Point3::new(3.0, -2.0, 0.0)).abs() < 1e-12);
        assert!((q.evaluate(&Point3::new(0.0, 0.0, 2.0)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_quadric_optimal_point() {
        let mut q = Quadric::from_plane(1.0, 0.0, 0.0, -1.0);
        q.add(&Quadric::from_plane(0.0, 1.0, 0.0, -2.0));
        q.add(&Quadric::from_plane(0.0, 0.0, 1.0, -3.0));
        let p = q.optimal_point().unwrap();
        assert!((p - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-9);

        // A single plane is singular.
        assert!(Quadric::from_plane(0.0, 0.0, 1.0, 0.0).optimal_point().is_none());
    }

    #[test]
    fn test_single_short_edge_removed() {
        let mut mesh = make_split_fan(0.01, 0.0, 0.0);
        let area = mesh.surface_area();

        let result = collapse_short_edges(&mut mesh, 0.1, 0.01);

        assert_eq!(result.collapses_performed, 1);
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertex_count(), 7);
        assert!(min_edge(&mesh) >= 0.1);
        assert!(mesh.validate_indices().is_ok());
        // Flat fan keeps its area.
        assert!((mesh.surface_area() - area).abs() < 1e-9);
        for tri in mesh.triangles() {
            assert!(tri.normal().unwrap().z > 0.0);
        }
    }

    #[test]
    fn test_zero_max_error_rejects_curved_collapse() {
        let mut mesh = make_split_fan(0.01, 0.3, 0.31);
        let before = mesh.clone();

        let result = collapse_short_edges(&mut mesh, 0.1, 0.0);
        assert_eq!(result.collapses_performed, 0);
        assert!(result.rejected_by_error > 0);
        assert_eq!(mesh.faces, before.faces);

        let result = collapse_short_edges(&mut mesh, 0.1, 1.0);
        assert_eq!(result.collapses_performed, 1);
        assert_eq!(mesh.face_count(), 6);
    }

    #[test]
    fn test_zero_min_length_is_noop() {
        let mut mesh = make_split_fan(0.01, 0.0, 0.0);
        let faces = mesh.faces.clone();
        let result = collapse_short_edges(&mut mesh, 0.0, 1.0);

        assert_eq!(result.collapses_performed, 0);
        assert_eq!(result.passes, 0);
        assert_eq!(mesh.faces, faces);
        assert_eq!(result.final_triangles, result.original_triangles);
    }

    #[test]
    fn test_tetrahedron_edge_not_collapsed() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.01, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
        mesh.faces.push([0, 2, 1]);
        mesh.faces.push([0, 1, 3]);
        mesh.faces.push([1, 2, 3]);
        mesh.faces.push([0, 3, 2]);

        let result = collapse_short_edges(&mut mesh, 0.1, 10.0);
        assert_eq!(result.collapses_performed, 0);
        assert!(result.rejected_by_topology > 0);
        assert_eq!(mesh.face_count(), 4);
    }

    #[test]
    fn test_unreferenced_vertices_compacted() {
        let mut mesh = make_split_fan(0.01, 0.0, 0.0);
        mesh.vertices.push(Vertex::from_coords(50.0, 50.0, 50.0));

        collapse_short_edges(&mut mesh, 0.1, 0.01);
        assert_eq!(mesh.vertex_count(), 7);
        assert!(mesh.vertices.iter().all(|v| v.position.x < 10.0));
    }
}
