//! Adaptive subdivision of long triangle edges.
//!
//! Every triangle is split along its longest edge until no edge exceeds the
//! requested maximum length. Each long edge receives `floor(length / max)`
//! evenly spaced interior vertices the first time any triangle touches it.
//! The vertices are recorded in an [`EdgeRegistry`] so the neighboring
//! triangle, which walks the same edge in the opposite direction, reuses them
//! instead of inserting its own. That keeps the result free of T-junctions.
//!
//! Splitting is driven by an explicit work queue: a triangle is split in two,
//! one half is queued and the other is refined in place.

use std::collections::VecDeque;

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::{Mesh, Vertex};

/// Interior vertices inserted along one edge.
///
/// The run lists vertex indices `first, first ± 1, …` (`count` of them) in the
/// order they are met when walking the edge from the endpoint it was looked
/// up from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRun {
    /// Index of the interior vertex closest to the starting endpoint.
    pub first: u32,
    /// Number of interior vertices.
    pub count: u32,
    /// Whether indices increase while walking away from the starting endpoint.
    pub ascending: bool,
}

impl EdgeRun {
    /// Index of the `k`-th interior vertex.
    #[inline]
    pub fn vertex(&self, k: u32) -> u32 {
        if self.ascending {
            self.first + k
        } else {
            self.first - k
        }
    }

    /// The same vertices walked from the other endpoint.
    #[inline]
    pub fn reversed(&self) -> Self {
        Self {
            first: self.vertex(self.count - 1),
            count: self.count,
            ascending: !self.ascending,
        }
    }

    /// A contiguous sub-run starting at position `start`.
    #[inline]
    fn slice(&self, start: u32, count: u32) -> Self {
        Self {
            first: self.vertex(start),
            count,
            ascending: self.ascending,
        }
    }
}

/// Canonical edge to inserted vertex lookup.
///
/// Keys are `(min, max)` vertex pairs and the stored run is ordered from `min`
/// to `max`. Lookups and registrations take a directed edge and translate, so
/// callers never deal with the canonical orientation.
#[derive(Debug, Default)]
pub struct EdgeRegistry {
    runs: HashMap<(u32, u32), EdgeRun>,
}

impl EdgeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interior vertices of the edge `from -> to`, ordered from `from`.
    pub fn get(&self, from: u32, to: u32) -> Option<EdgeRun> {
        if from < to {
            self.runs.get(&(from, to)).copied()
        } else {
            self.runs.get(&(to, from)).map(EdgeRun::reversed)
        }
    }

    /// Record the interior vertices of `from -> to`, ordered from `from`.
    ///
    /// An existing entry for the same edge is kept; empty runs are ignored.
    pub fn register(&mut self, from: u32, to: u32, run: EdgeRun) {
        if run.count == 0 {
            return;
        }
        let (key, run) = if from < to {
            ((from, to), run)
        } else {
            ((to, from), run.reversed())
        };
        self.runs.entry(key).or_insert(run);
    }

    /// Number of registered edges.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no edge has been registered.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Result of long edge subdivision.
#[derive(Debug, Clone)]
pub struct SubdivideResult {
    /// The subdivided mesh. Original vertices keep their indices.
    pub mesh: Mesh,
    /// Triangle count before subdivision.
    pub original_triangles: usize,
    /// Triangle count after subdivision.
    pub final_triangles: usize,
    /// Number of vertices appended along divided edges.
    pub vertices_inserted: usize,
    /// Number of triangle splits performed.
    pub splits_performed: usize,
}

impl SubdivideResult {
    fn unchanged(mesh: &Mesh) -> Self {
        Self {
            mesh: mesh.clone(),
            original_triangles: mesh.faces.len(),
            final_triangles: mesh.faces.len(),
            vertices_inserted: 0,
            splits_performed: 0,
        }
    }
}

/// Upper bound on `longest edge / max_edge_length`.
const MAX_EDGE_DIVISIONS: f64 = 1e6;

/// Subdivide every triangle until no edge is longer than `max_edge_length`.
///
/// Triangles already within bound are copied unchanged, so a fine mesh comes
/// back identical. A `max_edge_length` that is not finite and positive leaves
/// the mesh untouched, as does one so small that an edge would need more than
/// a million divisions.
///
/// # Example
/// ```
/// use mesh_supports::{Mesh, Vertex, subdivide_long_edges};
///
/// let mut mesh = Mesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// let result = subdivide_long_edges(&mesh, 0.4);
/// for tri in result.mesh.triangles() {
///     assert!(tri.max_edge_length() <= 0.4);
/// }
/// ```
pub fn subdivide_long_edges(mesh: &Mesh, max_edge_length: f64) -> SubdivideResult {
    let original_triangles = mesh.faces.len();

    if !(max_edge_length.is_finite() && max_edge_length > 0.0) {
        warn!(
            max_edge_length,
            "Maximum edge length must be finite and positive, skipping subdivision"
        );
        return SubdivideResult::unchanged(mesh);
    }

    let longest = mesh
        .triangles()
        .map(|t| t.max_edge_length())
        .fold(0.0, f64::max);
    let divisions = longest / max_edge_length;
    if !(divisions <= MAX_EDGE_DIVISIONS) {
        warn!(
            longest,
            max_edge_length,
            limit = MAX_EDGE_DIVISIONS,
            "Edge would need too many divisions, skipping subdivision"
        );
        return SubdivideResult::unchanged(mesh);
    }

    let mut vertices = mesh.vertices.clone();
    let mut faces: Vec<[u32; 3]> = Vec::with_capacity(original_triangles);
    let mut registry = EdgeRegistry::new();
    let mut queue: VecDeque<[u32; 3]> = VecDeque::new();
    let mut splits_performed = 0;

    for &face in &mesh.faces {
        if !may_exceed(&vertices, face, max_edge_length) {
            faces.push(face);
            continue;
        }

        let mut current = face;
        loop {
            match longest_edge_over(&vertices, current, max_edge_length) {
                Some((edge, length)) => {
                    let (kept, deferred) = split_triangle(
                        current,
                        edge,
                        length,
                        max_edge_length,
                        &mut vertices,
                        &mut registry,
                    );
                    queue.push_back(deferred);
                    current = kept;
                    splits_performed += 1;
                }
                None => {
                    faces.push(current);
                    match queue.pop_front() {
                        Some(next) => current = next,
                        None => break,
                    }
                }
            }
        }
    }

    let vertices_inserted = vertices.len() - mesh.vertices.len();
    debug!(
        registered_edges = registry.len(),
        splits = splits_performed,
        "Edge registry complete"
    );
    info!(
        original_triangles,
        final_triangles = faces.len(),
        vertices_inserted,
        max_edge_length,
        "Long edge subdivision complete"
    );

    SubdivideResult {
        final_triangles: faces.len(),
        mesh: Mesh { vertices, faces },
        original_triangles,
        vertices_inserted,
        splits_performed,
    }
}

/// Cheap test whether any edge might be longer than `max_length`.
///
/// The sum of absolute coordinate differences never underestimates the
/// Euclidean length, so `false` is conclusive.
fn may_exceed(vertices: &[Vertex], face: [u32; 3], max_length: f64) -> bool {
    (0..3).any(|i| {
        let d = vertices[face[(i + 1) % 3] as usize].position - vertices[face[i] as usize].position;
        d.x.abs() + d.y.abs() + d.z.abs() > max_length
    })
}

/// Euclidean edge length, always measured from the lower index so that both
/// triangles sharing the edge get the identical value.
#[inline]
fn edge_length(vertices: &[Vertex], a: u32, b: u32) -> f64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    (vertices[hi as usize].position - vertices[lo as usize].position).norm()
}

/// The longest edge of `face` if it exceeds `max_length`.
///
/// Edge `i` runs from corner `i` to corner `(i + 1) % 3`.
fn longest_edge_over(vertices: &[Vertex], face: [u32; 3], max_length: f64) -> Option<(usize, f64)> {
    let mut best = (0, edge_length(vertices, face[0], face[1]));
    for i in 1..3 {
        let length = edge_length(vertices, face[i], face[(i + 1) % 3]);
        if length > best.1 {
            best = (i, length);
        }
    }
    // Non-finite lengths come from broken input and are left alone.
    (best.1.is_finite() && best.1 > max_length).then_some(best)
}

/// Split `face` across `edge`, inserting or reusing the edge's interior vertices.
///
/// Returns the two halves, both with the winding of the input.
fn split_triangle(
    face: [u32; 3],
    edge: usize,
    length: f64,
    max_length: f64,
    vertices: &mut Vec<Vertex>,
    registry: &mut EdgeRegistry,
) -> ([u32; 3], [u32; 3]) {
    let a = face[edge];
    let b = face[(edge + 1) % 3];
    let apex = face[(edge + 2) % 3];

    let run = match registry.get(a, b) {
        Some(run) => run,
        None => {
            let count = (length / max_length).floor() as u32;
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            let canonical = insert_edge_vertices(vertices, lo, hi, count);
            registry.register(lo, hi, canonical);
            if a == lo { canonical } else { canonical.reversed() }
        }
    };

    // The middle vertex is chosen in canonical order so that both neighbors
    // split at the same place.
    let canonical_mid = (run.count - 1) / 2;
    let k = if a < b {
        canonical_mid
    } else {
        run.count - 1 - canonical_mid
    };
    let mid = run.vertex(k);

    registry.register(a, mid, run.slice(0, k));
    registry.register(mid, b, run.slice(k + 1, run.count - k - 1));

    ([a, mid, apex], [mid, b, apex])
}

/// Append `count` evenly spaced vertices between `from` and `to`.
fn insert_edge_vertices(vertices: &mut Vec<Vertex>, from: u32, to: u32, count: u32) -> EdgeRun {
    let first = vertices.len() as u32;
    let start = vertices[from as usize].position;
    let dir = vertices[to as usize].position - start;
    let segments = f64::from(count + 1);

    for i in 1..=count {
        vertices.push(Vertex::new(start + dir * (f64::from(i) / segments)));
    }

    EdgeRun {
        first,
        count,
        ascending: true,
    }
}
