//! Uniform-cell spatial hash of placed support points.

use hashbrown::HashMap;
use nalgebra::Point3;

use crate::PointRadius;

/// Lower bound for the cell edge length.
pub const MIN_CELL_SIZE: f64 = 1e-6;

/// How the radii of two points combine into the minimum allowed distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(rename_all = "snake_case"))]
pub enum ClearanceRule {
    /// Only the radius of the point being tested counts.
    #[default]
    QueryRadius,
    /// Sum of both radii: the covered discs may not overlap.
    Sum,
    /// The larger of the two radii.
    Max,
}

impl ClearanceRule {
    /// Minimum distance between a query with radius `query` and a stored
    /// point with radius `stored`.
    #[inline]
    pub fn clearance(self, query: f64, stored: f64) -> f64 {
        match self {
            ClearanceRule::QueryRadius => query,
            ClearanceRule::Sum => query + stored,
            ClearanceRule::Max => query.max(stored),
        }
    }
}

/// Spatial hash answering "is any stored point too close to this one".
///
/// # Example
/// ```
/// use mesh_supports::{ClearanceRule, PointGrid};
/// use nalgebra::Point3;
///
/// let mut grid = PointGrid::new(1.0);
/// grid.insert(Point3::new(0.0, 0.0, 0.0), 0.5);
///
/// assert!(grid.collides_with(&Point3::new(0.4, 0.0, 0.0), 0.5, ClearanceRule::QueryRadius));
/// assert!(!grid.collides_with(&Point3::new(0.6, 0.0, 0.0), 0.5, ClearanceRule::QueryRadius));
/// assert!(grid.collides_with(&Point3::new(0.9, 0.0, 0.0), 0.5, ClearanceRule::Sum));
/// ```
#[derive(Debug, Clone)]
pub struct PointGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64, i64), Vec<PointRadius>>,
    len: usize,
    max_radius: f64,
}

impl PointGrid {
    /// Create an empty grid with the given cell edge length.
    ///
    /// The cell size is clamped to at least [`MIN_CELL_SIZE`]; a non-finite
    /// value falls back to 1.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() {
            cell_size.max(MIN_CELL_SIZE)
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            len: 0,
            max_radius: 0.0,
        }
    }

    /// Build a grid holding `points`.
    pub fn from_points(cell_size: f64, points: impl IntoIterator<Item = PointRadius>) -> Self {
        let mut grid = Self::new(cell_size);
        for point in points {
            grid.insert_point(point);
        }
        grid
    }

    /// Store a point with the radius it covers.
    pub fn insert(&mut self, position: Point3<f64>, radius: f64) {
        self.insert_point(PointRadius::new(position, radius));
    }

    /// Store a point-radius pair.
    pub fn insert_point(&mut self, point: PointRadius) {
        if point.radius > self.max_radius {
            self.max_radius = point.radius;
        }
        let cell = self.cell_of(&point.position);
        self.cells.entry(cell).or_default().push(point);
        self.len += 1;
    }

    /// Whether any stored point lies strictly closer than the clearance given
    /// by `rule` for a query at `position` with `radius`.
    pub fn collides_with(&self, position: &Point3<f64>, radius: f64, rule: ClearanceRule) -> bool {
        if self.len == 0 {
            return false;
        }

        let reach = rule.clearance(radius, self.max_radius);
        if reach.is_nan() || reach <= 0.0 {
            return false;
        }

        let hits = |candidates: &[PointRadius]| {
            candidates.iter().any(|stored| {
                let clearance = rule.clearance(radius, stored.radius);
                (stored.position - position).norm_squared() < clearance * clearance
            })
        };

        let lo = self.cell_of(&(position - nalgebra::Vector3::repeat(reach)));
        let hi = self.cell_of(&(position + nalgebra::Vector3::repeat(reach)));
        let span = [(lo.0, hi.0), (lo.1, hi.1), (lo.2, hi.2)]
            .iter()
            .fold(1u128, |acc, &(a, b)| {
                acc.saturating_mul((i128::from(b) - i128::from(a) + 1).max(0) as u128)
            });

        // A query wider than the occupied area is cheaper as a full scan.
        if span > self.cells.len() as u128 {
            return self.cells.values().any(|cell| hits(cell.as_slice()));
        }

        for x in lo.0..=hi.0 {
            for y in lo.1..=hi.1 {
                for z in lo.2..=hi.2 {
                    if let Some(cell) = self.cells.get(&(x, y, z))
                        && hits(cell.as_slice())
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the grid holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Edge length of a cell.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Largest radius stored so far.
    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// Iterate over stored points in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &PointRadius> + '_ {
        self.cells.values().flatten()
    }

    fn cell_of(&self, pos: &Point3<f64>) -> (i64, i64, i64) {
        (
            (pos.x / self.cell_size).floor() as i64,
            (pos.y / self.cell_size).floor() as i64,
            (pos.z / self.cell_size).floor() as i64,
        )
    }
}

impl Default for PointGrid {
    fn default() -> Self {
        Self::new(1.0)
    }
}
