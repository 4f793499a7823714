//! Core mesh data types.

use nalgebra::{Point3, Vector3};

use crate::error::{SupportError, SupportResult};

/// A mesh vertex.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Position in millimeters, +Z up.
    pub position: Point3<f64>,

    /// Unit normal once estimated; preprocessing clears it on moved vertices.
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// Indexed triangle mesh.
///
/// Faces wind counter-clockwise seen from outside, so the right-hand normal
/// points away from the body. Width probing relies on this orientation.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,

    /// Vertex index triples.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Build a mesh from bare positions and faces.
    pub fn from_parts(positions: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices: positions.into_iter().map(Vertex::new).collect(),
            faces,
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True when there is nothing to probe: no vertices or no faces.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() || self.vertices.is_empty()
    }

    /// Vertex positions in index order.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Corner-wise minimum and maximum over all vertices.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut iter = self.vertices.iter().map(|v| v.position);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p))))
    }

    /// Check that every face references an existing vertex.
    pub fn validate_indices(&self) -> SupportResult<()> {
        let vertex_count = self.vertices.len();
        for (face_index, face) in self.faces.iter().enumerate() {
            if let Some(&vertex_index) = face.iter().find(|&&vi| vi as usize >= vertex_count) {
                return Err(SupportError::InvalidVertexIndex {
                    face_index,
                    vertex_index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    fn resolve(&self, [a, b, c]: [u32; 3]) -> Triangle {
        let at = |i: u32| self.vertices[i as usize].position;
        Triangle::new(at(a), at(b), at(c))
    }

    /// Face geometry in face order. Indices must be valid.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&face| self.resolve(face))
    }

    /// Geometry of one face, if the face exists.
    pub fn triangle(&self, face_idx: usize) -> Option<Triangle> {
        self.faces.get(face_idx).map(|&face| self.resolve(face))
    }

    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|t| t.area()).sum()
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Three corner positions of a face.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// `(v1 - v0) x (v2 - v0)`: the face normal scaled by twice the area.
    #[inline]
    pub fn scaled_normal(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit face normal, `None` when the corners are collinear.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        self.scaled_normal().try_normalize(f64::EPSILON)
    }

    #[inline]
    pub fn area(&self) -> f64 {
        0.5 * self.scaled_normal().norm()
    }

    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        self.interpolate(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    }

    /// Lengths of `v0-v1`, `v1-v2` and `v2-v0`.
    #[inline]
    pub fn edge_lengths(&self) -> [f64; 3] {
        [
            nalgebra::distance(&self.v0, &self.v1),
            nalgebra::distance(&self.v1, &self.v2),
            nalgebra::distance(&self.v2, &self.v0),
        ]
    }

    #[inline]
    pub fn max_edge_length(&self) -> f64 {
        self.edge_lengths().into_iter().fold(0.0, f64::max)
    }

    /// Point at barycentric weights `(a, b, c)` on `(v0, v1, v2)`.
    #[inline]
    pub fn interpolate(&self, a: f64, b: f64, c: f64) -> Point3<f64> {
        Point3::from(self.v0.coords * a + self.v1.coords * b + self.v2.coords * c)
    }
}

/// A candidate or accepted support point with the radius it covers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PointRadius {
    pub position: Point3<f64>,
    pub radius: f64,
}

impl PointRadius {
    #[inline]
    pub fn new(position: Point3<f64>, radius: f64) -> Self {
        Self { position, radius }
    }
}
