use crate::collision::aabb::AABB;
use crate::math::{Real, Scalar, Transform, Vec2, PI};

use super::{MassData, RayCastInput, RayCastOutput};

/// A solid circle, optionally offset from the body origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Circle {
    pub radius: Real,
    /// Center in body coordinates.
    pub position: Vec2,
}

impl Circle {
    pub fn new(radius: Real) -> Self {
        debug_assert!(radius >= Real::ZERO, "Circle radius cannot be negative");
        Self {
            radius,
            position: Vec2::ZERO,
        }
    }

    /// A circle whose center is offset from the body origin.
    pub fn with_position(radius: Real, position: Vec2) -> Self {
        Self {
            radius,
            position,
        }
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let center = xf.apply(self.position);
        (p - center).magnitude_squared() <= self.radius * self.radius
    }

    /// Collision Detection in Interactive 3D Environments by Gino van den Bergen,
    /// section 3.1.2: x = s + a * r, norm(x) = radius.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.apply(self.position);
        let s = input.p1 - position;
        let b = s.magnitude_squared() - self.radius * self.radius;

        // Solve quadratic equation.
        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.magnitude_squared();
        let sigma = c * c - rr * b;

        // Negative discriminant or a degenerate segment.
        if sigma < Real::ZERO || rr < Real::EPSILON {
            return None;
        }

        // Find the point of intersection of the line with the circle.
        let mut a = -(c + sigma.sqrt());

        // Is the intersection point on the segment?
        if (Real::ZERO..=input.max_fraction * rr).contains(&a) {
            a /= rr;
            return Some(RayCastOutput {
                fraction: a,
                normal: (s + r * a).normalize(),
            });
        }
        None
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        let p = xf.apply(self.position);
        let extent = Vec2::new(self.radius, self.radius);
        AABB::new(p - extent, p + extent)
    }

    /// Mass properties; the inertia is about the body origin.
    pub fn compute_mass(&self, density: Real) -> MassData {
        let mass = density * PI * self.radius * self.radius;
        MassData {
            mass,
            center: self.position,
            inertia: mass * (Real::HALF * self.radius * self.radius + self.position.magnitude_squared()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_circle_new() {
        let c = Circle::new(5.0);
        assert_eq!(c.radius, 5.0);
        assert_eq!(c.position, Vec2::ZERO);
    }

    #[test]
    fn test_circle_test_point() {
        let c = Circle::with_position(1.0, Vec2::new(1.0, 0.0));
        let xf = Transform::new(Vec2::new(2.0, 0.0), 0.0);
        assert!(c.test_point(&xf, Vec2::new(3.5, 0.0)));
        assert!(!c.test_point(&xf, Vec2::new(1.5, 0.0)));
    }

    #[test]
    fn test_circle_ray_cast_hits_front() {
        let c = Circle::new(1.0);
        let input = RayCastInput {
            p1: Vec2::new(-3.0, 0.0),
            p2: Vec2::new(3.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = c.ray_cast(&input, &Transform::identity()).unwrap();
        assert_abs_diff_eq!(hit.fraction, 2.0 / 6.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_circle_ray_cast_misses() {
        let c = Circle::new(1.0);
        let input = RayCastInput {
            p1: Vec2::new(-3.0, 2.0),
            p2: Vec2::new(3.0, 2.0),
            max_fraction: 1.0,
        };
        assert!(c.ray_cast(&input, &Transform::identity()).is_none());

        // Too short to reach the circle.
        let short = RayCastInput {
            p1: Vec2::new(-3.0, 0.0),
            p2: Vec2::new(3.0, 0.0),
            max_fraction: 0.2,
        };
        assert!(c.ray_cast(&short, &Transform::identity()).is_none());
    }

    #[test]
    fn test_circle_mass() {
        let c = Circle::new(0.5);
        let md = c.compute_mass(1.0);
        assert_abs_diff_eq!(md.mass, PI * 0.25, epsilon = 1e-5);
        assert_abs_diff_eq!(md.inertia, md.mass * 0.125, epsilon = 1e-5);
    }

    #[test]
    fn test_circle_aabb() {
        let c = Circle::new(2.0);
        let aabb = c.compute_aabb(&Transform::new(Vec2::new(1.0, 1.0), 0.3));
        assert_eq!(aabb.min, Vec2::new(-1.0, -1.0));
        assert_eq!(aabb.max, Vec2::new(3.0, 3.0));
    }
}
