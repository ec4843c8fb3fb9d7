use crate::common::settings::{LINEAR_SLOP, MAX_MANIFOLD_POINTS};
use crate::math::{Real, Scalar, Transform};
use crate::shapes::Polygon;

use super::manifold::{clip_segment_to_line, ClipVertex, ContactFeatureType, ContactId, Manifold, ManifoldType};

/// Find the max separation between `poly1` and `poly2` using edge normals from `poly1`.
fn find_max_separation(poly1: &Polygon, xf1: &Transform, poly2: &Polygon, xf2: &Transform) -> (usize, Real) {
    let xf = xf2.mul_t(*xf1);

    let mut best_index = 0;
    let mut max_separation = -Real::MAX;
    for (i, (&v1, &n1)) in poly1.vertices.iter().zip(&poly1.normals).enumerate() {
        // Get poly1 normal in frame2.
        let n = xf.q.apply(n1);
        let v1 = xf.apply(v1);

        // Find deepest point for normal i.
        let si = poly2
            .vertices
            .iter()
            .map(|&v2| n.dot(v2 - v1))
            .fold(Real::MAX, Real::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

fn find_incident_edge(poly1: &Polygon, xf1: &Transform, edge1: usize, poly2: &Polygon, xf2: &Transform) -> [ClipVertex; 2] {
    let normals1 = &poly1.normals;
    let vertices2 = &poly2.vertices;
    let normals2 = &poly2.normals;
    debug_assert!(edge1 < poly1.vertex_count());

    // Get the normal of the reference edge in poly2's frame.
    let normal1 = xf2.q.apply_inverse(xf1.q.apply(normals1[edge1]));

    // Find the incident edge on poly2.
    let mut index = 0;
    let mut min_dot = Real::MAX;
    for (i, n2) in normals2.iter().enumerate() {
        let dot = normal1.dot(*n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    // Build the clip vertices for the incident edge.
    let i1 = index;
    let i2 = if i1 + 1 < vertices2.len() { i1 + 1 } else { 0 };

    let id = |index_b: usize| ContactId {
        index_a: edge1 as u8,
        index_b: index_b as u8,
        type_a: ContactFeatureType::Face,
        type_b: ContactFeatureType::Vertex,
    };
    [
        ClipVertex {
            v: xf2.apply(vertices2[i1]),
            id: id(i1),
        },
        ClipVertex {
            v: xf2.apply(vertices2[i2]),
            id: id(i2),
        },
    ]
}

/// Polygon against polygon.
///
/// Find edge normal of max separation on A, then on B. The edge with the
/// larger separation (biased toward A) is the reference face; the most
/// anti-parallel edge on the other polygon is the incident face. The incident
/// edge is clipped against the reference face side planes and points behind
/// the reference face are kept.
pub fn collide_polygons(poly_a: &Polygon, xf_a: &Transform, poly_b: &Polygon, xf_b: &Transform) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    let k_tol = Real::from_f32(0.1) * LINEAR_SLOP;

    let (poly1, poly2, xf1, xf2, edge1, flip) = if separation_b > separation_a + k_tol {
        manifold.manifold_type = ManifoldType::FaceB;
        (poly_b, poly_a, xf_b, xf_a, edge_b, true)
    } else {
        manifold.manifold_type = ManifoldType::FaceA;
        (poly_a, poly_b, xf_a, xf_b, edge_a, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let count1 = poly1.vertex_count();
    let iv1 = edge1;
    let iv2 = if edge1 + 1 < count1 { edge1 + 1 } else { 0 };

    let v11 = poly1.vertices[iv1];
    let v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalize();
    let local_normal = local_tangent.cross_scalar(Real::ONE);
    let plane_point = (v11 + v12) * Real::HALF;

    let tangent = xf1.q.apply(local_tangent);
    let normal = tangent.cross_scalar(Real::ONE);

    let v11 = xf1.apply(v11);
    let v12 = xf1.apply(v12);

    // Face offset.
    let front_offset = normal.dot(v11);

    // Side offsets, extended by polytope skin thickness.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // Clip incident edge against extruded edge1 side edges.
    let (clip_points1, np) = clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1 as u8);
    if np < 2 {
        return manifold;
    }

    // Clip to negative box side 1
    let (clip_points2, np) = clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2 as u8);
    if np < 2 {
        return manifold;
    }

    // Now clip_points2 contains the clipped points.
    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for cp in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(cp.v) - front_offset;
        if separation <= total_radius {
            let mp = &mut manifold.points[point_count];
            mp.local_point = xf2.apply_inverse(cp.v);
            mp.id = if flip { cp.id.swapped() } else { cp.id };
            point_count += 1;
        }
    }

    manifold.point_count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::WorldManifold;
    use crate::math::Vec2;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_separated_boxes() {
        let a = Polygon::new_box(1.0, 1.0);
        let b = Polygon::new_box(1.0, 1.0);
        let xf_b = Transform::new(Vec2::new(3.0, 0.0), 0.0);
        assert_eq!(collide_polygons(&a, &Transform::identity(), &b, &xf_b).point_count, 0);
    }

    #[test]
    fn test_box_resting_on_box_has_two_points() {
        let ground = Polygon::new_box(5.0, 0.5);
        let crate_box = Polygon::new_box(0.5, 0.5);
        let xf_a = Transform::identity();
        let xf_b = Transform::new(Vec2::new(0.0, 0.99), 0.0);
        let m = collide_polygons(&ground, &xf_a, &crate_box, &xf_b);
        assert_eq!(m.point_count, 2);
        assert_eq!(m.manifold_type, ManifoldType::FaceA);
        assert_abs_diff_eq!(m.local_normal.y, 1.0, epsilon = 1e-5);

        let wm = WorldManifold::new(&m, &xf_a, ground.radius, &xf_b, crate_box.radius);
        assert_abs_diff_eq!(wm.normal.y, 1.0, epsilon = 1e-5);
        for s in wm.separations {
            // Core overlap of 0.01 plus both skins.
            assert_abs_diff_eq!(s, -0.01 - 2.0 * crate_box.radius, epsilon = 1e-4);
        }
        assert_ne!(m.points[0].id.key(), m.points[1].id.key());
    }

    #[test]
    fn test_reference_face_flips_to_b() {
        // B's face is clearly the better separating axis.
        let small = Polygon::new_box(0.5, 0.5);
        let rotated = Transform::new(Vec2::ZERO, 0.25 * crate::math::PI);
        let ground = Polygon::new_box(5.0, 0.5);
        let xf_b = Transform::new(Vec2::new(0.0, -1.2), 0.0);
        let m = collide_polygons(&small, &rotated, &ground, &xf_b);
        assert!(m.point_count >= 1);
        assert_eq!(m.manifold_type, ManifoldType::FaceB);

        let wm = WorldManifold::new(&m, &rotated, small.radius, &xf_b, ground.radius);
        // Normal points from A (above) to B (below).
        assert!(wm.normal.y < -0.99);
    }
}
