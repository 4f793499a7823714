//! Per-vertex normal estimation.

use nalgebra::Vector3;

use crate::Mesh;

/// How face normals are blended into a vertex normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(rename_all = "snake_case"))]
pub enum NormalStrategy {
    /// Weight each face by its area.
    #[default]
    AreaWeighted,
    /// Weight each face by the corner angle at the vertex.
    AngleWeighted,
    /// Every incident face counts equally.
    Uniform,
}

/// Estimate a unit normal for every vertex.
///
/// Vertices without incident non-degenerate faces get a zero vector, which
/// downstream stages treat as "no orientation".
pub fn vertex_normals(mesh: &Mesh, strategy: NormalStrategy) -> Vec<Vector3<f64>> {
    let mut normals = vec![Vector3::zeros(); mesh.vertices.len()];

    for face in &mesh.faces {
        let p = face.map(|i| mesh.vertices[i as usize].position);
        let cross = (p[1] - p[0]).cross(&(p[2] - p[0]));
        let len = cross.norm();
        if len <= f64::EPSILON {
            continue;
        }

        match strategy {
            // The cross product magnitude is twice the area.
            NormalStrategy::AreaWeighted => {
                for &vi in face {
                    normals[vi as usize] += cross;
                }
            }
            NormalStrategy::Uniform => {
                let unit = cross / len;
                for &vi in face {
                    normals[vi as usize] += unit;
                }
            }
            NormalStrategy::AngleWeighted => {
                let unit = cross / len;
                for corner in 0..3 {
                    let a = p[(corner + 1) % 3] - p[corner];
                    let b = p[(corner + 2) % 3] - p[corner];
                    normals[face[corner] as usize] += unit * a.angle(&b);
                }
            }
        }
    }

    for normal in &mut normals {
        let len = normal.norm();
        if len > f64::EPSILON {
            *normal /= len;
        } else {
            *normal = Vector3::zeros();
        }
    }

    normals
}

impl Mesh {
    /// Store estimated normals on the vertices.
    ///
    /// Vertices without a usable normal are reset to `None`.
    pub fn compute_vertex_normals(&mut self, strategy: NormalStrategy) {
        let normals = vertex_normals(self, strategy);
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = (normal != Vector3::zeros()).then_some(normal);
        }
    }
}
