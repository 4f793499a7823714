//! Local width (shape diameter) estimation.
//!
//! For each vertex a bundle of rays is fired into the body, opposite to the
//! vertex normal, and the distances to the first hits are combined into one
//! width value. Vertices whose normal points up too steeply are not probed.
//!
//! # Algorithm
//!
//! 1. Rotate the [`DirectionSet`] so its +Z axis maps onto the inverted normal.
//! 2. Offset the ray origin a small distance into the body to avoid hitting the
//!    vertex's own faces.
//! 3. Cast every rotated direction; optionally drop hits whose face normal
//!    deviates too far from the firing direction.
//! 4. Drop distances far from the mean (optional) and return the weighted mean
//!    of the remainder plus the origin offset.

use std::f64::consts::PI;

use nalgebra::{Point3, Rotation3, Vector3};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::bvh::RayCaster;
use crate::directions::DirectionSet;

/// Smallest number of vertices handled by one parallel task.
const PARALLEL_MIN_LEN: usize = 64;

/// Parameters for ray probing.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(default))]
pub struct RayParams {
    /// Number of spiral samples requested from the direction generator.
    pub sample_count: usize,

    /// Apex angle of the probing cone, in degrees.
    pub cone_angle_deg: f64,

    /// Largest accepted angle between firing direction and hit face normal,
    /// in radians.
    pub allowed_angle: f64,

    /// Enable the hit face angle check.
    pub angle_filter: bool,

    /// Enable rejection of distances far from the mean.
    pub deviation_filter: bool,

    /// Rejection threshold in standard deviations.
    pub deviation_multiplier: f64,

    /// Distance the ray origin is moved into the body.
    pub safe_move: f64,

    /// Vertices whose unit normal has a larger z component are not probed.
    pub normal_z_max: f64,
}

impl Default for RayParams {
    fn default() -> Self {
        Self {
            sample_count: 60,
            cone_angle_deg: 120.0,
            allowed_angle: PI / 3.0,
            angle_filter: true,
            deviation_filter: true,
            deviation_multiplier: 1.5,
            safe_move: 0.1,
            normal_z_max: 0.0,
        }
    }
}

impl RayParams {
    /// Fewer rays and no filtering, for quick previews.
    pub fn fast() -> Self {
        Self {
            sample_count: 16,
            angle_filter: false,
            deviation_filter: false,
            ..Default::default()
        }
    }

    /// Dense rays with tighter outlier rejection.
    pub fn precise() -> Self {
        Self {
            sample_count: 200,
            deviation_multiplier: 1.0,
            safe_move: 0.05,
            ..Default::default()
        }
    }

    /// Build the direction set described by these parameters.
    pub fn directions(&self) -> DirectionSet {
        DirectionSet::fibonacci(self.cone_angle_deg, self.sample_count)
    }
}

/// Summary of a batch of width estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthStats {
    /// Number of vertices probed.
    pub probed: usize,
    /// Number of vertices with a determined width.
    pub measured: usize,
    /// Smallest width, or infinity when nothing was measured.
    pub min: f64,
    /// Largest width, or zero when nothing was measured.
    pub max: f64,
    /// Mean width, or zero when nothing was measured.
    pub mean: f64,
}

impl WidthStats {
    /// Summarize per-vertex widths.
    pub fn from_widths(widths: &[Option<f64>]) -> Self {
        let mut stats = Self {
            probed: widths.len(),
            measured: 0,
            min: f64::INFINITY,
            max: 0.0,
            mean: 0.0,
        };
        let mut sum = 0.0;
        for w in widths.iter().flatten() {
            stats.measured += 1;
            stats.min = stats.min.min(*w);
            stats.max = stats.max.max(*w);
            sum += w;
        }
        if stats.measured > 0 {
            stats.mean = sum / stats.measured as f64;
        }
        stats
    }
}

impl std::fmt::Display for WidthStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} vertices measured", self.measured, self.probed)?;
        if self.measured > 0 {
            write!(
                f,
                ", width min {:.3} / mean {:.3} / max {:.3}",
                self.min, self.mean, self.max
            )?;
        }
        Ok(())
    }
}

/// Estimate the width at every vertex, in parallel.
///
/// Returns one entry per point; `None` marks vertices that were skipped or
/// whose rays found nothing usable. Empty input, an empty direction set or a
/// length mismatch between `points` and `normals` yields an empty vector.
pub fn estimate_widths<R: RayCaster + ?Sized>(
    points: &[Point3<f64>],
    normals: &[Vector3<f64>],
    index: &R,
    directions: &DirectionSet,
    params: &RayParams,
) -> Vec<Option<f64>> {
    if points.is_empty() || directions.is_empty() || points.len() != normals.len() {
        warn!(
            points = points.len(),
            normals = normals.len(),
            directions = directions.len(),
            "Width estimation needs matching non-empty points and normals and at least one direction"
        );
        return Vec::new();
    }

    let widths: Vec<Option<f64>> = points
        .par_iter()
        .zip(normals.par_iter())
        .with_min_len(PARALLEL_MIN_LEN)
        .map(|(point, normal)| estimate_width(point, normal, index, directions, params))
        .collect();

    info!(stats = %WidthStats::from_widths(&widths), "Width estimation complete");

    widths
}

/// Estimate the width at a single point.
///
/// Returns `None` when the normal is degenerate or points up more steeply than
/// `params.normal_z_max`, or when no ray produced an accepted hit.
pub fn estimate_width<R: RayCaster + ?Sized>(
    point: &Point3<f64>,
    normal: &Vector3<f64>,
    index: &R,
    directions: &DirectionSet,
    params: &RayParams,
) -> Option<f64> {
    let normal = normal.try_normalize(f64::EPSILON)?;
    if normal.z > params.normal_z_max {
        return None;
    }

    let firing = -normal;
    let origin = point + firing * params.safe_move;
    let rotation = Rotation3::rotation_between(&Vector3::z(), &firing)
        .unwrap_or_else(|| Rotation3::from_axis_angle(&Vector3::x_axis(), PI));

    let mut hits = Vec::with_capacity(directions.len());
    for d in directions {
        let ray = rotation * d.dir;
        let Some(hit) = index.first_hit(&origin, &ray) else {
            continue;
        };

        if params.angle_filter {
            let cos = firing.dot(&index.hit_normal(hit.face)).clamp(-1.0, 1.0);
            if cos.acos() > params.allowed_angle {
                continue;
            }
        }

        hits.push((hit.distance, d.weight));
    }

    aggregate_hits(&hits, params)
}

/// Combine `(distance, weight)` pairs into a width.
fn aggregate_hits(hits: &[(f64, f64)], params: &RayParams) -> Option<f64> {
    match hits {
        [] => return None,
        [(distance, _)] => return Some(*distance),
        _ => {}
    }

    let n = hits.len() as f64;
    let (sum, sq_sum) = hits
        .iter()
        .fold((0.0, 0.0), |(s, sq), &(d, _)| (s + d, sq + d * d));
    let mean = sum / n;
    let deviation = (sq_sum / n - mean * mean).max(0.0).sqrt();
    let threshold = deviation * params.deviation_multiplier;

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for &(distance, weight) in hits {
        if params.deviation_filter && (distance - mean).abs() > threshold {
            continue;
        }
        weighted_sum += distance * weight;
        weight_sum += weight;
    }

    let width = if weight_sum > 0.0 {
        weighted_sum / weight_sum
    } else {
        mean
    };
    Some(width + params.safe_move)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bvh, Mesh, Vertex};

    /// Two large horizontal squares at z = 0 and z = 1.
    ///
    /// With `outward` set, the normals face away from the slab between them.
    fn make_slab(outward: bool) -> Mesh {
        let mut mesh = Mesh::new();
        for z in [0.0, 1.0] {
            mesh.vertices.push(Vertex::from_coords(-50.0, -50.0, z));
            mesh.vertices.push(Vertex::from_coords(50.0, -50.0, z));
            mesh.vertices.push(Vertex::from_coords(50.0, 50.0, z));
            mesh.vertices.push(Vertex::from_coords(-50.0, 50.0, z));
        }
        // Bottom faces down, top faces up.
        mesh.faces.push([0, 2, 1]);
        mesh.faces.push([0, 3, 2]);
        if outward {
            mesh.faces.push([4, 5, 6]);
            mesh.faces.push([4, 6, 7]);
        } else {
            mesh.faces.push([4, 6, 5]);
            mesh.faces.push([4, 7, 6]);
        }
        mesh
    }

    fn bottom_point() -> (Point3<f64>, Vector3<f64>) {
        (Point3::new(0.3, -0.2, 0.0), Vector3::new(0.0, 0.0, -1.0))
    }

    #[test]
    fn test_single_direction_returns_raw_distance() {
        let bvh = Bvh::new(&make_slab(true));
        let (p, n) = bottom_point();
        let params = RayParams::default();

        let w = estimate_width(&p, &n, &bvh, &DirectionSet::axis_only(), &params).unwrap();
        assert!((w - (1.0 - params.safe_move)).abs() < 1e-9, "width {}", w);
    }

    #[test]
    fn test_cone_width_close_to_thickness() {
        let bvh = Bvh::new(&make_slab(true));
        let (p, n) = bottom_point();
        let params = RayParams {
            cone_angle_deg: 20.0,
            sample_count: 50,
            ..Default::default()
        };
        let dirs = params.directions();
        assert!(dirs.len() > 1);

        let w = estimate_width(&p, &n, &bvh, &dirs, &params).unwrap();
        assert!(w >= 1.0 - 1e-9 && w < 1.02, "width {}", w);
    }

    #[test]
    fn test_upward_normal_not_probed() {
        let bvh = Bvh::new(&make_slab(true));
        let p = Point3::new(0.0, 0.0, 1.0);
        let up = Vector3::new(0.0, 0.0, 1.0);
        let dirs = DirectionSet::axis_only();

        assert!(estimate_width(&p, &up, &bvh, &dirs, &RayParams::default()).is_none());
        assert!(
            estimate_width(&p, &Vector3::zeros(), &bvh, &dirs, &RayParams::default()).is_none()
        );
    }

    #[test]
    fn test_antiparallel_firing_direction() {
        // Firing straight down needs the fallback rotation.
        let bvh = Bvh::new(&make_slab(true));
        let p = Point3::new(0.0, 0.0, 1.0);
        let up = Vector3::new(0.0, 0.0, 1.0);
        let params = RayParams {
            normal_z_max: 1.0,
            ..Default::default()
        };

        let w = estimate_width(&p, &up, &bvh, &DirectionSet::axis_only(), &params).unwrap();
        assert!((w - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_angle_filter_rejects_back_faces() {
        let bvh = Bvh::new(&make_slab(false));
        let (p, n) = bottom_point();
        let dirs = DirectionSet::axis_only();

        let filtered = RayParams::default();
        assert!(estimate_width(&p, &n, &bvh, &dirs, &filtered).is_none());

        let unfiltered = RayParams {
            angle_filter: false,
            ..Default::default()
        };
        assert!(estimate_width(&p, &n, &bvh, &dirs, &unfiltered).is_some());
    }

    #[test]
    fn test_no_hit_is_none() {
        let bvh = Bvh::new(&make_slab(true));
        // Below the slab, firing downward into empty space.
        let p = Point3::new(0.0, 0.0, -5.0);
        let n = Vector3::new(0.0, 0.0, 1.0);
        let params = RayParams {
            normal_z_max: 1.0,
            ..Default::default()
        };
        assert!(estimate_width(&p, &n, &bvh, &params.directions(), &params).is_none());
    }

    #[test]
    fn test_deviation_filter_drops_outlier() {
        let hits = [(1.0, 1.0), (1.0, 1.0), (1.0, 1.0), (1.0, 1.0), (10.0, 1.0)];

        let params = RayParams {
            deviation_multiplier: 1.5,
            safe_move: 0.1,
            ..Default::default()
        };
        let w = aggregate_hits(&hits, &params).unwrap();
        assert!((w - 1.1).abs() < 1e-12);

        let params = RayParams {
            deviation_filter: false,
            safe_move: 0.1,
            ..Default::default()
        };
        let w = aggregate_hits(&hits, &params).unwrap();
        assert!((w - 2.9).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_weights_and_fallback() {
        let params = RayParams {
            deviation_filter: false,
            safe_move: 0.25,
            ..Default::default()
        };
        let w = aggregate_hits(&[(1.0, 3.0), (2.0, 1.0)], &params).unwrap();
        assert!((w - 1.5).abs() < 1e-12);

        // Zero weights fall back to the plain mean, still offset by safe_move.
        let w = aggregate_hits(&[(1.0, 0.0), (2.0, 0.0)], &params).unwrap();
        assert!((w - 1.75).abs() < 1e-12);

        assert!(aggregate_hits(&[], &params).is_none());
    }

    #[test]
    fn test_estimate_widths_contract() {
        let mesh = make_slab(true);
        let bvh = Bvh::new(&mesh);
        let params = RayParams::default();
        let dirs = params.directions();
        let (p, n) = bottom_point();

        assert!(estimate_widths(&[], &[], &bvh, &dirs, &params).is_empty());
        assert!(estimate_widths(&[p], &[], &bvh, &dirs, &params).is_empty());
        assert!(estimate_widths(&[p], &[n], &bvh, &DirectionSet::default(), &params).is_empty());

        // Enough points to span several parallel chunks; order is preserved.
        let points: Vec<_> = (0..300)
            .map(|i| {
                if i % 2 == 0 {
                    p
                } else {
                    Point3::new(0.0, 0.0, 1.0)
                }
            })
            .collect();
        let normals: Vec<_> = (0..300)
            .map(|i| if i % 2 == 0 { n } else { Vector3::z() })
            .collect();
        let widths = estimate_widths(&points, &normals, &bvh, &dirs, &params);
        assert_eq!(widths.len(), 300);
        for (i, w) in widths.iter().enumerate() {
            assert_eq!(w.is_some(), i % 2 == 0, "vertex {}", i);
        }
    }

    #[test]
    fn test_width_stats() {
        let stats = WidthStats::from_widths(&[Some(1.0), None, Some(3.0)]);
        assert_eq!(stats.probed, 3);
        assert_eq!(stats.measured, 2);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.mean, 2.0);
        assert!(stats.to_string().contains("2/3"));

        let empty = WidthStats::from_widths(&[None]);
        assert_eq!(empty.measured, 0);
        assert_eq!(empty.to_string(), "0/1 vertices measured");
    }
}
