//! Greedy Poisson-disk thinning of support candidates.

use tracing::debug;

use crate::grid::{ClearanceRule, MIN_CELL_SIZE, PointGrid};
use crate::PointRadius;

/// Keep a subset of `candidates` in which no two points are too close.
///
/// Candidates are visited by ascending radius, so the thinnest regions, which
/// need supports most densely, claim space first. A candidate is dropped when
/// it collides with an already accepted candidate or with a point in
/// `external`. The sort is stable, so equal radii keep their input order.
///
/// # Example
/// ```
/// use mesh_supports::{ClearanceRule, PointGrid, PointRadius, poisson_filter};
/// use nalgebra::Point3;
///
/// let candidates = vec![
///     PointRadius::new(Point3::new(0.0, 0.0, 0.0), 1.0),
///     PointRadius::new(Point3::new(0.5, 0.0, 0.0), 1.0),
///     PointRadius::new(Point3::new(3.0, 0.0, 0.0), 1.0),
/// ];
/// let kept = poisson_filter(candidates, &PointGrid::default(), ClearanceRule::QueryRadius);
/// assert_eq!(kept.len(), 2);
/// ```
pub fn poisson_filter(
    mut candidates: Vec<PointRadius>,
    external: &PointGrid,
    rule: ClearanceRule,
) -> Vec<PointRadius> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates.sort_by(|a, b| a.radius.total_cmp(&b.radius));
    let max_radius = candidates
        .iter()
        .map(|c| c.radius)
        .fold(MIN_CELL_SIZE, f64::max);

    let mut local = PointGrid::new(max_radius);
    let mut accepted = Vec::with_capacity(candidates.len());
    let mut rejected_local = 0usize;
    let mut rejected_external = 0usize;

    for candidate in candidates {
        if local.collides_with(&candidate.position, candidate.radius, rule) {
            rejected_local += 1;
            continue;
        }
        if external.collides_with(&candidate.position, candidate.radius, rule) {
            rejected_external += 1;
            continue;
        }
        local.insert_point(candidate);
        accepted.push(candidate);
    }

    debug!(
        accepted = accepted.len(),
        rejected_local,
        rejected_external,
        cell_size = local.cell_size(),
        "Poisson filter complete"
    );

    accepted
}
