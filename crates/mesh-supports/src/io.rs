//! STL reading and writing.
//!
//! Supports binary and ASCII STL on input; output is always binary. Identical
//! corner coordinates are merged on load, so a closed STL surface comes back
//! as a shared-vertex mesh.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{SupportError, SupportResult};
use crate::{Mesh, Vertex};

/// Load a mesh from a binary or ASCII STL file.
///
/// Faces that repeat a vertex are dropped.
///
/// # Errors
///
/// [`SupportError::IoRead`] when the file cannot be opened,
/// [`SupportError::ParseError`] when the contents are not valid STL or hold
/// non-finite coordinates.
pub fn load_stl(path: &Path) -> SupportResult<Mesh> {
    info!("Loading mesh from {:?}", path);

    let file = File::open(path).map_err(|e| SupportError::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);

    let stl = stl_io::read_stl(&mut reader).map_err(|e| SupportError::ParseError {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    debug!(
        "STL contains {} vertices, {} triangles",
        stl.vertices.len(),
        stl.faces.len()
    );

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    for (index, v) in stl.vertices.iter().enumerate() {
        let [x, y, z] = v.0.map(f64::from);
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(SupportError::ParseError {
                path: path.to_path_buf(),
                details: format!("vertex {} has a non-finite coordinate", index),
            });
        }
        mesh.vertices.push(Vertex::from_coords(x, y, z));
    }

    let mut degenerate = 0usize;
    for face in &stl.faces {
        let [i0, i1, i2] = face.vertices.map(|i| i as u32);
        if i0 != i1 && i1 != i2 && i0 != i2 {
            mesh.faces.push([i0, i1, i2]);
        } else {
            degenerate += 1;
        }
    }
    if degenerate > 0 {
        debug!(degenerate, "Dropped faces with repeated vertices");
    }

    if let Some((min, max)) = mesh.bounds() {
        let dims = max - min;
        info!(
            "Loaded mesh: {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        );
        debug!(
            "Dimensions: {:.1} x {:.1} x {:.1}",
            dims.x, dims.y, dims.z
        );

        let max_dim = dims.x.max(dims.y).max(dims.z);
        if max_dim < 0.1 {
            warn!(
                "Mesh largest dimension is {:.6} - may need scaling",
                max_dim
            );
        }
    } else {
        warn!("STL file {:?} holds no triangles", path);
    }

    mesh.validate_indices()?;
    Ok(mesh)
}

/// Save a mesh as binary STL.
///
/// Facet normals are written from the triangle geometry; degenerate
/// triangles get a zero normal.
pub fn save_stl(mesh: &Mesh, path: &Path) -> SupportResult<()> {
    info!("Saving mesh to {:?}", path);
    mesh.validate_indices()?;

    let file = File::create(path).map_err(|e| SupportError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    let to_f32 = |p: nalgebra::Point3<f64>| [p.x as f32, p.y as f32, p.z as f32];
    let triangles: Vec<stl_io::Triangle> = mesh
        .triangles()
        .map(|tri| {
            let n = tri.normal().unwrap_or_else(nalgebra::Vector3::zeros);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [
                    stl_io::Vertex::new(to_f32(tri.v0)),
                    stl_io::Vertex::new(to_f32(tri.v1)),
                    stl_io::Vertex::new(to_f32(tri.v2)),
                ],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| SupportError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    writer.flush().map_err(|e| SupportError::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!("Saved {} triangles to {:?}", mesh.face_count(), path);
    Ok(())
}
