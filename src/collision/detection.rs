//! Narrow-phase dispatch over shape pairs.

use crate::math::{Real, Scalar, Transform};
use crate::shapes::{Shape, ShapeType};

use super::collide_circle::{collide_circles, collide_polygon_and_circle};
use super::collide_edge::{collide_edge_and_circle, collide_edge_and_polygon};
use super::collide_polygon::collide_polygons;
use super::distance::{distance, DistanceInput, SimplexCache};
use super::manifold::Manifold;

/// Decides which fixture of a pair plays the role of shape A.
///
/// Returns `None` for pairs that never collide (edges and chains against
/// each other), `Some(false)` when `(type_a, type_b)` is already in collider
/// order and `Some(true)` when the pair must be swapped.
pub fn pair_order(type_a: ShapeType, type_b: ShapeType) -> Option<bool> {
    use ShapeType::*;
    let is_primary = |a: ShapeType, b: ShapeType| {
        matches!(
            (a, b),
            (Circle, Circle)
                | (Polygon, Circle)
                | (Polygon, Polygon)
                | (Edge, Circle)
                | (Edge, Polygon)
                | (Chain, Circle)
                | (Chain, Polygon)
        )
    };
    if is_primary(type_a, type_b) {
        Some(false)
    } else if is_primary(type_b, type_a) {
        Some(true)
    } else {
        None
    }
}

/// Computes the manifold between child `child_a` of `shape_a` and child
/// `child_b` of `shape_b`. The shapes must already be in [`pair_order`].
pub fn evaluate(
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    _child_b: usize,
    xf_b: &Transform,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_and_polygon(a, xf_a, b, xf_b),
        (Shape::Chain(chain), Shape::Circle(b)) => {
            collide_edge_and_circle(&chain.child_edge(child_a), xf_a, b, xf_b)
        }
        (Shape::Chain(chain), Shape::Polygon(b)) => {
            collide_edge_and_polygon(&chain.child_edge(child_a), xf_a, b, xf_b)
        }
        _ => {
            debug_assert!(
                false,
                "unsupported shape pair {:?} vs {:?}",
                shape_a.shape_type(),
                shape_b.shape_type()
            );
            Manifold::default()
        }
    }
}

/// Determine if two generic shapes overlap.
pub fn test_overlap(
    shape_a: &Shape,
    child_a: usize,
    shape_b: &Shape,
    child_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: shape_a.distance_proxy(child_a),
        proxy_b: shape_b.distance_proxy(child_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&input, &mut cache);
    output.distance < Real::from_f32(10.0) * Real::EPSILON
}
