//! Probe directions around the +Z axis.
//!
//! Directions are laid out on a golden-angle (Fibonacci) spiral over the upper
//! hemisphere and clipped to a cone. Each direction is weighted by its z
//! component so rays close to the cone axis count more.

use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};

use crate::Mesh;

/// A unit probe direction and its aggregation weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    /// Unit vector; +Z is the cone axis.
    pub dir: Vector3<f64>,
    /// Weight used when averaging hit distances.
    pub weight: f64,
}

/// An ordered set of probe directions, built once and shared by all vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionSet {
    directions: Vec<Direction>,
}

impl DirectionSet {
    /// A set holding only the cone axis with weight 1.
    pub fn axis_only() -> Self {
        Self {
            directions: vec![Direction {
                dir: Vector3::z(),
                weight: 1.0,
            }],
        }
    }

    /// Spiral samples inside a cone with apex angle `cone_angle_deg`.
    ///
    /// Sample `i` of `count` sits at height `z = 1 - i / (count - 1)` and
    /// azimuth `i` times the golden angle. Sampling stops at the first height
    /// below `cos(cone_angle_deg / 2)`, so fewer than `count` directions are
    /// returned for any cone narrower than a hemisphere.
    ///
    /// A `count` of 0 or 1 yields [`DirectionSet::axis_only`]. Otherwise the
    /// angle must lie strictly between 1 and 180 degrees; anything else gives an
    /// empty set.
    ///
    /// # Example
    /// ```
    /// use mesh_supports::DirectionSet;
    ///
    /// let set = DirectionSet::fibonacci(120.0, 60);
    /// assert!(!set.is_empty());
    /// assert!(set.len() < 60);
    /// assert_eq!(set.as_slice()[0].weight, 1.0);
    /// ```
    pub fn fibonacci(cone_angle_deg: f64, count: usize) -> Self {
        if count <= 1 {
            return Self::axis_only();
        }
        if !(cone_angle_deg > 1.0 && cone_angle_deg < 180.0) {
            warn!(
                cone_angle_deg,
                "Cone angle must lie strictly between 1 and 180 degrees, no directions generated"
            );
            return Self::default();
        }

        let min_z = (cone_angle_deg / 2.0).to_radians().cos();
        let golden_angle = PI * (3.0 - 5f64.sqrt());
        let last = (count - 1) as f64;

        let mut directions = Vec::with_capacity(count);
        for i in 0..count {
            let z = 1.0 - i as f64 / last;
            if z < min_z {
                break;
            }
            let radius = (1.0 - z * z).max(0.0).sqrt();
            let theta = golden_angle * i as f64;
            directions.push(Direction {
                dir: Vector3::new(theta.cos() * radius, theta.sin() * radius, z),
                weight: z,
            });
        }

        debug!(
            requested = count,
            generated = directions.len(),
            cone_angle_deg,
            "Generated probe directions"
        );

        Self { directions }
    }

    /// Number of directions.
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// Whether the set holds no directions.
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// The directions in generation order (decreasing z).
    pub fn as_slice(&self) -> &[Direction] {
        &self.directions
    }

    /// Iterate over the directions.
    pub fn iter(&self) -> std::slice::Iter<'_, Direction> {
        self.directions.iter()
    }

    /// Render the set as a mesh for visual inspection.
    ///
    /// Every direction becomes two thin crossed triangles with their tip three
    /// units out along the direction and their base at the unit sphere.
    pub fn to_mesh(&self) -> Mesh {
        const HALF_WIDTH: f64 = 0.05;
        const TIP_LENGTH: f64 = 3.0;

        let mut positions = Vec::with_capacity(5 * self.len());
        let mut faces = Vec::with_capacity(2 * self.len());

        for d in &self.directions {
            let base = Point3::from(d.dir);
            let tip = positions.len() as u32;
            positions.push(Point3::from(d.dir * TIP_LENGTH));
            positions.push(base + Vector3::new(HALF_WIDTH, 0.0, 0.0));
            positions.push(base + Vector3::new(-HALF_WIDTH, 0.0, 0.0));
            positions.push(base + Vector3::new(0.0, HALF_WIDTH, 0.0));
            positions.push(base + Vector3::new(0.0, -HALF_WIDTH, 0.0));
            faces.push([tip, tip + 1, tip + 2]);
            faces.push([tip, tip + 3, tip + 4]);
        }

        Mesh::from_parts(positions, faces)
    }
}

impl<'a> IntoIterator for &'a DirectionSet {
    type Item = &'a Direction;
    type IntoIter = std::slice::Iter<'a, Direction>;

    fn into_iter(self) -> Self::IntoIter {
        self.directions.iter()
    }
}
