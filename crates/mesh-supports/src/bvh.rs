//! Ray casting against a triangle mesh.
//!
//! [`RayCaster`] is the query seam used by the width estimator. [`Bvh`] is the
//! bundled implementation: a binary bounding volume hierarchy with median
//! splits on the longest axis and Möller–Trumbore triangle tests.

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::{Mesh, Triangle};

/// The nearest intersection along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit. Equals the distance for unit directions.
    pub distance: f64,
    /// Index of the face that was hit.
    pub face: usize,
}

/// Nearest ray/triangle intersection queries.
///
/// Implementations must be shareable across threads since widths are
/// estimated in parallel.
pub trait RayCaster: Sync {
    /// First intersection in front of `origin` along `direction`.
    fn first_hit(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<RayHit>;

    /// Unit normal of a face returned by [`RayCaster::first_hit`].
    fn hit_normal(&self, face: usize) -> Vector3<f64>;
}

/// Axis-aligned bounding box for spatial acceleration.
#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl Aabb {
    fn from_triangle(tri: &Triangle) -> Self {
        Self {
            min: tri.v0.inf(&tri.v1).inf(&tri.v2),
            max: tri.v0.sup(&tri.v1).sup(&tri.v2),
        }
    }

    fn merge(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Expand by epsilon for numerical robustness.
    fn expand(&self, epsilon: f64) -> Self {
        let pad = Vector3::repeat(epsilon);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Slab test. Returns (t_near, t_far) or None if the ray misses.
    fn ray_intersect(&self, origin: &Point3<f64>, dir_inv: &Vector3<f64>) -> Option<(f64, f64)> {
        let t1 = (self.min.x - origin.x) * dir_inv.x;
        let t2 = (self.max.x - origin.x) * dir_inv.x;
        let t3 = (self.min.y - origin.y) * dir_inv.y;
        let t4 = (self.max.y - origin.y) * dir_inv.y;
        let t5 = (self.min.z - origin.z) * dir_inv.z;
        let t6 = (self.max.z - origin.z) * dir_inv.z;

        let t_min = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
        let t_max = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }
}

#[derive(Debug)]
enum BvhNode {
    Leaf {
        aabb: Aabb,
        face_idx: usize,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn build(triangles: &[Triangle], indices: &mut [usize], epsilon: f64) -> Option<Self> {
        match indices {
            [] => return None,
            [idx] => {
                return Some(BvhNode::Leaf {
                    aabb: Aabb::from_triangle(&triangles[*idx]).expand(epsilon),
                    face_idx: *idx,
                });
            }
            _ => {}
        }

        let combined = indices[1..]
            .iter()
            .fold(Aabb::from_triangle(&triangles[indices[0]]), |acc, &idx| {
                acc.merge(&Aabb::from_triangle(&triangles[idx]))
            })
            .expand(epsilon);

        // Longest axis
        let extent = combined.max - combined.min;
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        indices.sort_by(|&a, &b| {
            let ca = triangles[a].centroid()[axis];
            let cb = triangles[b].centroid()[axis];
            ca.total_cmp(&cb)
        });

        let mid = indices.len() / 2;
        let (left_indices, right_indices) = indices.split_at_mut(mid);

        let left = BvhNode::build(triangles, left_indices, epsilon);
        let right = BvhNode::build(triangles, right_indices, epsilon);

        match (left, right) {
            (Some(l), Some(r)) => Some(BvhNode::Internal {
                aabb: combined,
                left: Box::new(l),
                right: Box::new(r),
            }),
            (Some(n), None) | (None, Some(n)) => Some(n),
            (None, None) => None,
        }
    }

    fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } => aabb,
            BvhNode::Internal { aabb, .. } => aabb,
        }
    }

    fn depth(&self) -> usize {
        match self {
            BvhNode::Leaf { .. } => 1,
            BvhNode::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Bounding volume hierarchy over the faces of a mesh.
///
/// # Example
/// ```
/// use mesh_supports::{Bvh, Mesh, RayCaster, Vertex};
/// use nalgebra::{Point3, Vector3};
///
/// let mut mesh = Mesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// let bvh = Bvh::new(&mesh);
/// let hit = bvh
///     .first_hit(&Point3::new(0.2, 0.2, 1.0), &Vector3::new(0.0, 0.0, -1.0))
///     .unwrap();
/// assert!((hit.distance - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct Bvh {
    triangles: Vec<Triangle>,
    normals: Vec<Vector3<f64>>,
    root: Option<BvhNode>,
    epsilon: f64,
}

impl Bvh {
    /// Default tolerance for parallel rays and self intersections.
    pub const DEFAULT_EPSILON: f64 = 1e-10;

    /// Build a hierarchy over all faces of `mesh`.
    pub fn new(mesh: &Mesh) -> Self {
        Self::with_epsilon(mesh, Self::DEFAULT_EPSILON)
    }

    /// Build with a custom intersection tolerance.
    pub fn with_epsilon(mesh: &Mesh, epsilon: f64) -> Self {
        let triangles: Vec<Triangle> = mesh.triangles().collect();
        let normals = triangles
            .iter()
            .map(|tri| tri.normal().unwrap_or_else(Vector3::zeros))
            .collect();

        let mut indices: Vec<usize> = (0..triangles.len()).collect();
        let root = BvhNode::build(&triangles, &mut indices, epsilon);

        debug!(
            faces = triangles.len(),
            depth = root.as_ref().map_or(0, BvhNode::depth),
            "Built BVH"
        );

        Self {
            triangles,
            normals,
            root,
            epsilon,
        }
    }

    /// Number of indexed faces.
    pub fn face_count(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the hierarchy contains no faces.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl RayCaster for Bvh {
    fn first_hit(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<RayHit> {
        let root = self.root.as_ref()?;
        let dir_inv = direction.map(|c| 1.0 / c);
        trace_ray(
            root,
            origin,
            direction,
            &dir_inv,
            &self.triangles,
            f64::INFINITY,
            self.epsilon,
        )
        .map(|(distance, face)| RayHit { distance, face })
    }

    fn hit_normal(&self, face: usize) -> Vector3<f64> {
        self.normals[face]
    }
}

/// Möller–Trumbore ray-triangle intersection.
/// Returns the ray parameter `t` of the intersection, if any.
fn ray_triangle_intersect(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    tri: &Triangle,
    epsilon: f64,
) -> Option<f64> {
    let edge1 = tri.v1 - tri.v0;
    let edge2 = tri.v2 - tri.v0;

    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);

    // Ray is parallel to triangle
    if a.abs() < epsilon {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - tri.v0;
    let u = f * s.dot(&h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);

    if t > epsilon { Some(t) } else { None }
}

/// Closest intersection below `max_dist` within `node`.
fn trace_ray(
    node: &BvhNode,
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    dir_inv: &Vector3<f64>,
    triangles: &[Triangle],
    max_dist: f64,
    epsilon: f64,
) -> Option<(f64, usize)> {
    match node.aabb().ray_intersect(origin, dir_inv) {
        Some((t_near, _)) if t_near <= max_dist => {}
        _ => return None,
    }

    match node {
        BvhNode::Leaf { face_idx, .. } => {
            ray_triangle_intersect(origin, direction, &triangles[*face_idx], epsilon)
                .filter(|&t| t <= max_dist)
                .map(|t| (t, *face_idx))
        }
        BvhNode::Internal { left, right, .. } => {
            let hit_left = trace_ray(left, origin, direction, dir_inv, triangles, max_dist, epsilon);
            let max_dist_right = hit_left.map_or(max_dist, |(t, _)| t);
            let hit_right = trace_ray(
                right,
                origin,
                direction,
                dir_inv,
                triangles,
                max_dist_right,
                epsilon,
            );

            match (hit_left, hit_right) {
                (Some(l), Some(r)) => Some(if l.0 <= r.0 { l } else { r }),
                (Some(h), None) | (None, Some(h)) => Some(h),
                (None, None) => None,
            }
        }
    }
}
