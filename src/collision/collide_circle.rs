use crate::math::{Real, Scalar, Transform, Vec2};
use crate::shapes::{Circle, Polygon};

use super::manifold::{ContactId, Manifold, ManifoldType};

/// Circle against circle. An empty manifold means no contact.
pub fn collide_circles(circle_a: &Circle, xf_a: &Transform, circle_b: &Circle, xf_b: &Transform) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.position);
    let p_b = xf_b.apply(circle_b.position);

    let dist_sqr = p_a.distance_squared(p_b);
    let radius = circle_a.radius + circle_b.radius;
    if dist_sqr > radius * radius {
        return manifold;
    }

    manifold.manifold_type = ManifoldType::Circles;
    manifold.local_point = circle_a.position;
    manifold.local_normal = Vec2::ZERO;
    manifold.point_count = 1;

    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactId::default();
    manifold
}

/// Polygon A against circle B.
pub fn collide_polygon_and_circle(polygon_a: &Polygon, xf_a: &Transform, circle_b: &Circle, xf_b: &Transform) -> Manifold {
    let mut manifold = Manifold::default();

    // Compute circle position in the frame of the polygon.
    let c = xf_b.apply(circle_b.position);
    let c_local = xf_a.apply_inverse(c);

    // Find the min separating edge.
    let mut normal_index = 0;
    let mut separation = -Real::MAX;
    let radius = polygon_a.radius + circle_b.radius;
    let vertices = &polygon_a.vertices;
    let normals = &polygon_a.normals;

    for (i, (&v, &n)) in vertices.iter().zip(normals).enumerate() {
        let s = n.dot(c_local - v);
        if s > radius {
            // Early out.
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    // Vertices that subtend the incident face.
    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < vertices.len() { vert_index1 + 1 } else { 0 };
    let v1 = vertices[vert_index1];
    let v2 = vertices[vert_index2];

    manifold.manifold_type = ManifoldType::FaceA;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactId::default();

    // If the center is inside the polygon ...
    if separation < Real::EPSILON {
        manifold.local_normal = normals[normal_index];
        manifold.local_point = (v1 + v2) * Real::HALF;
        return manifold;
    }

    // Compute barycentric coordinates
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= Real::ZERO {
        if c_local.distance_squared(v1) > radius * radius {
            return Manifold::default();
        }
        manifold.local_normal = (c_local - v1).normalize();
        manifold.local_point = v1;
    } else if u2 <= Real::ZERO {
        if c_local.distance_squared(v2) > radius * radius {
            return Manifold::default();
        }
        manifold.local_normal = (c_local - v2).normalize();
        manifold.local_point = v2;
    } else {
        let face_center = (v1 + v2) * Real::HALF;
        let s = (c_local - face_center).dot(normals[vert_index1]);
        if s > radius {
            return Manifold::default();
        }
        manifold.local_normal = normals[vert_index1];
        manifold.local_point = face_center;
    }
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: Real = 1e-5;

    #[test]
    fn test_collide_circles_no_collision() {
        let a = Circle::new(1.0);
        let b = Circle::new(1.0);
        let xf_b = Transform::new(Vec2::new(3.0, 0.0), 0.0);
        let m = collide_circles(&a, &Transform::identity(), &b, &xf_b);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_collide_circles_colliding() {
        let a = Circle::with_position(1.0, Vec2::new(0.5, 0.0));
        let b = Circle::new(1.0);
        let xf_b = Transform::new(Vec2::new(2.0, 0.0), 0.0);
        let m = collide_circles(&a, &Transform::identity(), &b, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::Circles);
        assert_eq!(m.local_point, Vec2::new(0.5, 0.0));
        assert_eq!(m.points[0].local_point, Vec2::ZERO);
    }

    #[test]
    fn test_collide_polygon_and_circle_face() {
        let square = Polygon::new_box(1.0, 1.0);
        let circle = Circle::new(0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 1.3), 0.0);
        let m = collide_polygon_and_circle(&square, &Transform::identity(), &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::FaceA);
        assert!((m.local_normal.y - 1.0).abs() < EPSILON);
        assert!((m.local_point.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_collide_polygon_and_circle_vertex_region() {
        let square = Polygon::new_box(1.0, 1.0);
        let circle = Circle::new(0.5);

        let near = Transform::new(Vec2::new(1.3, 1.3), 0.0);
        let m = collide_polygon_and_circle(&square, &Transform::identity(), &circle, &near);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.local_point, Vec2::new(1.0, 1.0));
        let expected = (0.5 as Real).sqrt();
        assert!((m.local_normal.x - expected).abs() < EPSILON);

        // Inside both face slabs but beyond the corner radius.
        let far = Transform::new(Vec2::new(1.4, 1.4), 0.0);
        let m = collide_polygon_and_circle(&square, &Transform::identity(), &circle, &far);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_collide_polygon_and_circle_center_inside() {
        let square = Polygon::new_box(1.0, 1.0);
        let circle = Circle::new(0.25);
        let xf_b = Transform::new(Vec2::new(0.9, 0.0), 0.0);
        let m = collide_polygon_and_circle(&square, &Transform::identity(), &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.local_normal, Vec2::new(1.0, 0.0));
    }
}
