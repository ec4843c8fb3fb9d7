pub mod chain;
pub mod circle;
pub mod edge;
pub mod polygon;

// Re-export the specific shape types
pub use chain::Chain;
pub use circle::Circle;
pub use edge::Edge;
pub use polygon::Polygon;

use crate::collision::aabb::AABB;
use crate::collision::distance::DistanceProxy;
use crate::math::{Real, Transform, Vec2};

/// Mass properties of a shape, computed from its geometry and a density.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassData {
    pub mass: Real,
    /// Centroid relative to the body origin.
    pub center: Vec2,
    /// Rotational inertia about the body origin.
    pub inertia: Real,
}

/// Ray-cast input data. The ray extends from `p1` to `p1 + max_fraction * (p2 - p1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: Real,
}

/// Ray-cast output data. The hit point is `p1 + fraction * (p2 - p1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: Real,
}

/// Shape kinds, ordered so that contact creation can canonicalise pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeType {
    Circle,
    Edge,
    Polygon,
    Chain,
}

/// Enum representing the geometric shape of a fixture.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    Circle(Circle),
    Edge(Edge),
    Polygon(Polygon),
    Chain(Chain),
}

impl Shape {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// Skin radius. For circles this is the circle radius.
    pub fn radius(&self) -> Real {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Edge(e) => e.radius,
            Shape::Polygon(p) => p.radius,
            Shape::Chain(c) => c.radius,
        }
    }

    /// Number of child primitives; only chains have more than one.
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(c) => c.child_count(),
            _ => 1,
        }
    }

    /// Test a point for containment in this shape. Only works for convex shapes.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(c) => c.test_point(xf, p),
            Shape::Edge(e) => e.test_point(xf, p),
            Shape::Polygon(poly) => poly.test_point(xf, p),
            Shape::Chain(c) => c.test_point(xf, p),
        }
    }

    /// Cast a ray against a child shape.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform, child: usize) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.ray_cast(input, xf),
            Shape::Edge(e) => e.ray_cast(input, xf),
            Shape::Polygon(p) => p.ray_cast(input, xf),
            Shape::Chain(c) => c.ray_cast(input, xf, child),
        }
    }

    /// Bounding box of a child shape under the given transform.
    pub fn compute_aabb(&self, xf: &Transform, child: usize) -> AABB {
        match self {
            Shape::Circle(c) => c.compute_aabb(xf),
            Shape::Edge(e) => e.compute_aabb(xf),
            Shape::Polygon(p) => p.compute_aabb(xf),
            Shape::Chain(c) => c.compute_aabb(xf, child),
        }
    }

    pub fn compute_mass(&self, density: Real) -> MassData {
        match self {
            Shape::Circle(c) => c.compute_mass(density),
            Shape::Edge(e) => e.compute_mass(density),
            Shape::Polygon(p) => p.compute_mass(density),
            Shape::Chain(c) => c.compute_mass(density),
        }
    }

    /// Borrowed vertex view of a child for GJK.
    pub fn distance_proxy(&self, child: usize) -> DistanceProxy<'_> {
        match self {
            Shape::Circle(c) => DistanceProxy::new(std::slice::from_ref(&c.position), c.radius),
            Shape::Edge(e) => DistanceProxy::new(&e.vertices, e.radius),
            Shape::Polygon(p) => DistanceProxy::new(&p.vertices, p.radius),
            Shape::Chain(c) => {
                debug_assert!(child < c.child_count());
                DistanceProxy::new(&c.vertices[child..child + 2], c.radius)
            }
        }
    }
}

impl From<Circle> for Shape {
    fn from(circle: Circle) -> Self {
        Shape::Circle(circle)
    }
}

impl From<Edge> for Shape {
    fn from(edge: Edge) -> Self {
        Shape::Edge(edge)
    }
}

impl From<Polygon> for Shape {
    fn from(polygon: Polygon) -> Self {
        Shape::Polygon(polygon)
    }
}

impl From<Chain> for Shape {
    fn from(chain: Chain) -> Self {
        Shape::Chain(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_dispatch() {
        let circle: Shape = Circle::new(0.5).into();
        assert_eq!(circle.shape_type(), ShapeType::Circle);
        assert_eq!(circle.child_count(), 1);
        assert_eq!(circle.radius(), 0.5);
        assert_eq!(circle.distance_proxy(0).vertex_count(), 1);

        let chain: Shape = Chain::new_chain(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0)])
            .unwrap()
            .into();
        assert_eq!(chain.child_count(), 2);
        let proxy = chain.distance_proxy(1);
        assert_eq!(proxy.vertex(0), Vec2::new(1.0, 0.0));
        assert_eq!(proxy.vertex(1), Vec2::new(2.0, 1.0));
        assert_eq!(chain.compute_mass(1.0).mass, 0.0);
    }

    #[test]
    fn test_shape_type_order() {
        assert!(ShapeType::Circle < ShapeType::Edge);
        assert!(ShapeType::Edge < ShapeType::Polygon);
        assert!(ShapeType::Polygon < ShapeType::Chain);
    }
}
