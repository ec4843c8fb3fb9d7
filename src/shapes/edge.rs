use crate::collision::aabb::AABB;
use crate::common::settings::POLYGON_RADIUS;
use crate::math::{Real, Scalar, Transform, Vec2};

use super::{MassData, RayCastInput, RayCastOutput};

/// A line segment. Edges have no volume and only collide with circles and polygons.
///
/// The optional ghost vertices describe the neighbouring segments of a chain so
/// that objects sliding along connected edges do not catch on internal corners.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    pub vertices: [Vec2; 2],
    pub vertex0: Option<Vec2>,
    pub vertex3: Option<Vec2>,
    pub radius: Real,
}

impl Edge {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        Self {
            vertices: [v1, v2],
            vertex0: None,
            vertex3: None,
            radius: POLYGON_RADIUS,
        }
    }

    /// Adds the ghost vertices of the preceding and following segments.
    pub fn with_ghosts(mut self, vertex0: Option<Vec2>, vertex3: Option<Vec2>) -> Self {
        self.vertex0 = vertex0;
        self.vertex3 = vertex3;
        self
    }

    pub fn vertex1(&self) -> Vec2 {
        self.vertices[0]
    }

    pub fn vertex2(&self) -> Vec2 {
        self.vertices[1]
    }

    /// Calculates the length of the edge.
    pub fn length(&self) -> Real {
        self.vertices[0].distance(self.vertices[1])
    }

    /// Edges never contain points.
    pub fn test_point(&self, _xf: &Transform, _p: Vec2) -> bool {
        false
    }

    /// Intersects the ray with the segment. Both sides report a hit; the normal
    /// faces the ray origin.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Put the ray into the edge's frame of reference.
        let p1 = xf.q.apply_inverse(input.p1 - xf.p);
        let p2 = xf.q.apply_inverse(input.p2 - xf.p);
        let d = p2 - p1;

        let [v1, v2] = self.vertices;
        let e = v2 - v1;
        let normal = Vec2::new(e.y, -e.x).normalize();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        // dot(normal, p1 - v1) + t * dot(normal, d) = 0
        let numerator = normal.dot(v1 - p1);
        let denominator = normal.dot(d);
        if denominator == Real::ZERO {
            return None;
        }

        let t = numerator / denominator;
        if t < Real::ZERO || input.max_fraction < t {
            return None;
        }

        let q = p1 + d * t;

        // q = v1 + s * r
        // s = dot(q - v1, r) / dot(r, r)
        let r = v2 - v1;
        let rr = r.dot(r);
        if rr == Real::ZERO {
            return None;
        }
        let s = (q - v1).dot(r) / rr;
        if !(Real::ZERO..=Real::ONE).contains(&s) {
            return None;
        }

        let normal = if numerator > Real::ZERO { -normal } else { normal };
        Some(RayCastOutput {
            fraction: t,
            normal: xf.q.apply(normal),
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        let v1 = xf.apply(self.vertices[0]);
        let v2 = xf.apply(self.vertices[1]);
        let r = Vec2::new(self.radius, self.radius);
        AABB::new(v1.min(v2) - r, v1.max(v2) + r)
    }

    /// Edges are massless; the reported center is the midpoint.
    pub fn compute_mass(&self, _density: Real) -> MassData {
        MassData {
            mass: Real::ZERO,
            center: (self.vertices[0] + self.vertices[1]) * Real::HALF,
            inertia: Real::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    const EPSILON: Real = 1e-5;

    #[test]
    fn test_edge_length() {
        let edge = Edge::new(Vec2::new(1.0, 2.0), Vec2::new(4.0, 6.0)); // Difference (3, 4), length 5
        assert_abs_diff_eq!(edge.length(), 5.0, epsilon = EPSILON);
    }

    #[test]
    fn test_edge_ray_cast_from_both_sides() {
        let edge = Edge::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let xf = Transform::identity();

        let from_above = RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(0.0, -2.0),
            max_fraction: 1.0,
        };
        let hit = edge.ray_cast(&from_above, &xf).unwrap();
        assert_abs_diff_eq!(hit.fraction, 0.5, epsilon = EPSILON);
        assert_abs_diff_eq!(hit.normal.y, 1.0, epsilon = EPSILON);

        let from_below = RayCastInput {
            p1: Vec2::new(0.5, -1.0),
            p2: Vec2::new(0.5, 1.0),
            max_fraction: 1.0,
        };
        let hit = edge.ray_cast(&from_below, &xf).unwrap();
        assert_abs_diff_eq!(hit.fraction, 0.5, epsilon = EPSILON);
        assert_abs_diff_eq!(hit.normal.y, -1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_edge_ray_cast_misses_past_end() {
        let edge = Edge::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let input = RayCastInput {
            p1: Vec2::new(2.0, 1.0),
            p2: Vec2::new(2.0, -1.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&input, &Transform::identity()).is_none());
    }

    #[test]
    fn test_edge_mass_is_zero() {
        let edge = Edge::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0));
        let md = edge.compute_mass(10.0);
        assert_eq!(md.mass, 0.0);
        assert_eq!(md.center, Vec2::new(1.0, 0.0));
    }
}
