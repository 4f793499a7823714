//! Area-proportional stochastic placement of support candidates.
//!
//! Vertex widths are mapped to support radii. Every triangle whose three
//! vertices are thin enough receives a number of random points proportional to
//! its area divided by the area one support covers.

use std::f64::consts::PI;

use nalgebra::Point3;
use rand::Rng;
use tracing::{debug, warn};

use crate::{PointRadius, Triangle};

/// Parameters for support candidate sampling.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(feature = "pipeline-config", serde(default))]
pub struct SampleParams {
    /// Width mapped to `min_radius`.
    pub min_width: f64,

    /// Width mapped to `max_radius`. Triangles with a wider vertex get no
    /// supports.
    pub max_width: f64,

    /// Support radius at `min_width`.
    pub min_radius: f64,

    /// Support radius at `max_width`.
    pub max_radius: f64,

    /// Scales the expected number of points per triangle.
    pub area_multiplier: f64,

    /// Triangles whose unit normal has a larger z component get no supports.
    pub normal_z_max: f64,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            min_width: 0.0,
            max_width: 2.0,
            min_radius: 0.2,
            max_radius: 1.0,
            area_multiplier: 1.0,
            normal_z_max: 0.0,
        }
    }
}

impl SampleParams {
    /// Denser sampling for fine resin prints.
    pub fn for_sla() -> Self {
        Self {
            max_width: 1.5,
            min_radius: 0.1,
            max_radius: 0.6,
            area_multiplier: 1.5,
            ..Default::default()
        }
    }

    /// Set the width limit, keeping other defaults.
    pub fn with_max_width(max_width: f64) -> Self {
        Self {
            max_width,
            ..Default::default()
        }
    }

    /// Linear map from width to support radius.
    ///
    /// A zero or inverted width range maps every width to `min_radius`.
    pub fn radius_for_width(&self, width: f64) -> f64 {
        let width_range = self.max_width - self.min_width;
        if width_range.is_nan() || width_range <= 0.0 {
            return self.min_radius;
        }
        (width - self.min_width) / width_range * (self.max_radius - self.min_radius)
            + self.min_radius
    }
}

/// Largest expected candidate count accepted for a single triangle.
pub const MAX_POINTS_PER_TRIANGLE: f64 = 1e6;

/// Round `expected` down, then up by one with probability equal to its
/// fractional part.
///
/// Exactly one uniform value is drawn from `rng`.
pub fn stochastic_round<R: Rng + ?Sized>(expected: f64, rng: &mut R) -> usize {
    let whole = expected.trunc();
    let fraction = expected - whole;
    let draw: f64 = rng.random();
    let count = whole as usize;
    if draw < fraction {
        count.saturating_add(1)
    } else {
        count
    }
}

/// Scatter support candidates over triangles with known widths.
///
/// `widths` holds one entry per vertex. Triangles are visited in order and
/// skipped as a whole when any vertex width is unknown, negative or larger
/// than `params.max_width`, or when the face points up more steeply than
/// `params.normal_z_max`. Random values are drawn in a fixed order so a
/// seeded generator reproduces the same candidates.
///
/// Returns an empty vector when `widths` and `vertices` differ in length or a
/// face references a missing vertex. A triangle whose expected point count is
/// not finite or exceeds [`MAX_POINTS_PER_TRIANGLE`] is skipped.
pub fn generate_support_points<R: Rng + ?Sized>(
    faces: &[[u32; 3]],
    vertices: &[Point3<f64>],
    widths: &[Option<f64>],
    params: &SampleParams,
    rng: &mut R,
) -> Vec<PointRadius> {
    if widths.len() != vertices.len() {
        warn!(
            widths = widths.len(),
            vertices = vertices.len(),
            "Width count does not match vertex count, no supports sampled"
        );
        return Vec::new();
    }
    if let Some((face_index, face)) = faces
        .iter()
        .enumerate()
        .find(|(_, face)| face.iter().any(|&vi| vi as usize >= vertices.len()))
    {
        warn!(
            face_index,
            face = ?face,
            vertices = vertices.len(),
            "Face references a missing vertex, no supports sampled"
        );
        return Vec::new();
    }

    let mut points = Vec::new();
    let mut triangles_sampled = 0usize;

    'faces: for face in faces {
        let mut radii = [0.0; 3];
        for (radius, &vi) in radii.iter_mut().zip(face) {
            match widths[vi as usize] {
                Some(w) if (0.0..=params.max_width).contains(&w) => {
                    *radius = params.radius_for_width(w);
                }
                _ => continue 'faces,
            }
        }

        let coverage = radii.iter().map(|r| r * r * PI).sum::<f64>() / 3.0;
        if coverage.is_nan() || coverage <= 0.0 {
            continue;
        }

        let tri = Triangle::new(
            vertices[face[0] as usize],
            vertices[face[1] as usize],
            vertices[face[2] as usize],
        );
        let expected = tri.area() / coverage * params.area_multiplier;
        if !(expected <= MAX_POINTS_PER_TRIANGLE) {
            warn!(
                expected,
                coverage,
                "Expected support count out of range, triangle skipped"
            );
            continue;
        }
        let count = stochastic_round(expected, rng);
        if count == 0 {
            continue;
        }

        match tri.normal() {
            Some(n) if n.z <= params.normal_z_max => {}
            _ => continue,
        }

        triangles_sampled += 1;
        points.reserve(count);
        for _ in 0..count {
            let mut u: f64 = rng.random();
            let mut v: f64 = rng.random();
            if u + v > 1.0 {
                u = 1.0 - u;
                v = 1.0 - v;
            }
            let w = 1.0 - u - v;
            points.push(PointRadius {
                position: tri.interpolate(u, v, w),
                radius: u * radii[0] + v * radii[1] + w * radii[2],
            });
        }
    }

    debug!(
        triangles = faces.len(),
        triangles_sampled,
        candidates = points.len(),
        "Support candidates sampled"
    );

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Right triangle with legs of 2 facing straight down.
    fn downward_triangle() -> (Vec<[u32; 3]>, Vec<Point3<f64>>) {
        (
            vec![[0, 1, 2]],
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 2.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
        )
    }

    fn params_for_expected(expected: f64) -> SampleParams {
        // Constant radius 1 covers PI per point; triangle area is 2.
        SampleParams {
            min_width: 0.0,
            max_width: 2.0,
            min_radius: 1.0,
            max_radius: 1.0,
            area_multiplier: expected * PI / 2.0,
            normal_z_max: 0.0,
        }
    }

    #[test]
    fn test_radius_mapping() {
        let params = SampleParams::default();
        assert_eq!(params.radius_for_width(0.0), 0.2);
        assert!((params.radius_for_width(2.0) - 1.0).abs() < 1e-12);
        assert!((params.radius_for_width(1.0) - 0.6).abs() < 1e-12);

        let degenerate = SampleParams {
            min_width: 1.0,
            max_width: 1.0,
            ..Default::default()
        };
        assert_eq!(degenerate.radius_for_width(1.0), 0.2);
    }

    #[test]
    fn test_stochastic_round_is_unbiased() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(stochastic_round(3.0, &mut rng), 3);
        assert_eq!(stochastic_round(0.0, &mut rng), 0);

        let trials = 20_000;
        let total: usize = (0..trials).map(|_| stochastic_round(0.3, &mut rng)).sum();
        let mean = total as f64 / trials as f64;
        assert!((mean - 0.3).abs() < 0.02, "mean {}", mean);
    }

    #[test]
    fn test_points_inside_triangle_with_interpolated_radius() {
        let (faces, vertices) = downward_triangle();
        let widths = vec![Some(0.0), Some(1.0), Some(2.0)];
        let params = SampleParams {
            area_multiplier: 20.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(42);

        let points = generate_support_points(&faces, &vertices, &widths, &params, &mut rng);
        assert!(!points.is_empty());
        for p in &points {
            let (x, y) = (p.position.x, p.position.y);
            assert!(x >= -1e-12 && y >= -1e-12 && x + y <= 2.0 + 1e-12);
            assert_eq!(p.position.z, 0.0);
            assert!(p.radius >= 0.2 - 1e-12 && p.radius <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_count_follows_expected() {
        let (faces, vertices) = downward_triangle();
        let widths = vec![Some(1.0); 3];
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..50 {
            let points = generate_support_points(
                &faces,
                &vertices,
                &widths,
                &params_for_expected(2.5),
                &mut rng,
            );
            assert!(points.len() == 2 || points.len() == 3, "got {}", points.len());
        }
    }

    #[test]
    fn test_triangle_rejections() {
        let (faces, vertices) = downward_triangle();
        let params = params_for_expected(4.0);
        let mut rng = StdRng::seed_from_u64(3);

        for widths in [
            vec![Some(1.0), None, Some(1.0)],
            vec![Some(1.0), Some(-0.5), Some(1.0)],
            vec![Some(1.0), Some(1.0), Some(2.5)],
        ] {
            assert!(generate_support_points(&faces, &vertices, &widths, &params, &mut rng).is_empty());
        }

        // Upward facing copy is skipped.
        let upward = vec![[0, 2, 1]];
        let widths = vec![Some(1.0); 3];
        assert!(generate_support_points(&upward, &vertices, &widths, &params, &mut rng).is_empty());

        // Length mismatch.
        assert!(generate_support_points(&faces, &vertices, &widths[..2], &params, &mut rng).is_empty());
    }

    #[test]
    fn test_missing_vertex_gives_empty_result() {
        let (_, vertices) = downward_triangle();
        let widths = vec![Some(1.0); 3];
        let mut rng = StdRng::seed_from_u64(3);
        let faces = vec![[0, 1, 2], [0, 1, 7]];
        assert!(
            generate_support_points(&faces, &vertices, &widths, &params_for_expected(4.0), &mut rng)
                .is_empty()
        );
    }

    #[test]
    fn test_oversized_expected_count_skips_triangle() {
        let (faces, vertices) = downward_triangle();
        let params = SampleParams {
            min_radius: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);

        let tiny = vec![Some(1e-12); 3];
        assert!(generate_support_points(&faces, &vertices, &tiny, &params, &mut rng).is_empty());

        let huge = SampleParams {
            area_multiplier: f64::INFINITY,
            ..Default::default()
        };
        let widths = vec![Some(1.0); 3];
        assert!(generate_support_points(&faces, &vertices, &widths, &huge, &mut rng).is_empty());
    }

    #[test]
    fn test_stochastic_round_saturates() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(stochastic_round(1e300, &mut rng), usize::MAX);
    }

    #[test]
    fn test_zero_radius_skips_triangle() {
        let (faces, vertices) = downward_triangle();
        let params = SampleParams {
            min_radius: 0.0,
            max_radius: 0.0,
            ..Default::default()
        };
        let widths = vec![Some(1.0); 3];
        let mut rng = StdRng::seed_from_u64(3);
        assert!(generate_support_points(&faces, &vertices, &widths, &params, &mut rng).is_empty());
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let (faces, vertices) = downward_triangle();
        let widths = vec![Some(0.3), Some(0.9), Some(1.7)];
        let params = SampleParams {
            area_multiplier: 10.0,
            ..Default::default()
        };

        let a = generate_support_points(
            &faces,
            &vertices,
            &widths,
            &params,
            &mut StdRng::seed_from_u64(99),
        );
        let b = generate_support_points(
            &faces,
            &vertices,
            &widths,
            &params,
            &mut StdRng::seed_from_u64(99),
        );
        assert_eq!(a, b);
    }
}
