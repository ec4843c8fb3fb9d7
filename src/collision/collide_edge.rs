//! Edge contacts. Ghost vertices on the edge are used to discard collisions
//! that belong to a neighbouring segment, so shapes slide smoothly over chains.

use crate::common::settings::{ANGULAR_SLOP, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::math::{Real, Scalar, Transform, Vec2};
use crate::shapes::{Circle, Edge, Polygon};

use super::manifold::{clip_segment_to_line, ClipVertex, ContactFeatureType, ContactId, Manifold, ManifoldType};

/// Edge A against circle B. Compute contact points between an edge and a
/// circle, taking the Voronoi regions of the edge into account.
pub fn collide_edge_and_circle(edge_a: &Edge, xf_a: &Transform, circle_b: &Circle, xf_b: &Transform) -> Manifold {
    let mut manifold = Manifold::default();

    // Compute circle in frame of edge
    let q = xf_a.apply_inverse(xf_b.apply(circle_b.position));

    let a = edge_a.vertices[0];
    let b = edge_a.vertices[1];
    let e = b - a;

    // Barycentric coordinates
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = edge_a.radius + circle_b.radius;

    let mut cf = ContactId {
        index_b: 0,
        type_b: ContactFeatureType::Vertex,
        ..Default::default()
    };

    // Region A
    if v <= Real::ZERO {
        let p = a;
        let d = q - p;
        if d.dot(d) > radius * radius {
            return manifold;
        }

        // Is there an edge connected to A?
        if let Some(a1) = edge_a.vertex0 {
            let b1 = a;
            let e1 = b1 - a1;
            let u1 = e1.dot(b1 - q);

            // Is the circle in Region AB of the previous edge?
            if u1 > Real::ZERO {
                return manifold;
            }
        }

        cf.index_a = 0;
        cf.type_a = ContactFeatureType::Vertex;
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0].id = cf;
        manifold.points[0].local_point = circle_b.position;
        return manifold;
    }

    // Region B
    if u <= Real::ZERO {
        let p = b;
        let d = q - p;
        if d.dot(d) > radius * radius {
            return manifold;
        }

        // Is there an edge connected to B?
        if let Some(b2) = edge_a.vertex3 {
            let a2 = b;
            let e2 = b2 - a2;
            let v2 = e2.dot(q - a2);

            // Is the circle in Region AB of the next edge?
            if v2 > Real::ZERO {
                return manifold;
            }
        }

        cf.index_a = 1;
        cf.type_a = ContactFeatureType::Vertex;
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0].id = cf;
        manifold.points[0].local_point = circle_b.position;
        return manifold;
    }

    // Region AB
    let den = e.dot(e);
    debug_assert!(den > Real::ZERO);
    let p = (a * u + b * v) * (Real::ONE / den);
    let d = q - p;
    if d.dot(d) > radius * radius {
        return manifold;
    }

    let mut n = Vec2::new(-e.y, e.x);
    if n.dot(q - a) < Real::ZERO {
        n = -n;
    }
    n.normalize_mut();

    cf.index_a = 0;
    cf.type_a = ContactFeatureType::Face;
    manifold.point_count = 1;
    manifold.manifold_type = ManifoldType::FaceA;
    manifold.local_normal = n;
    manifold.local_point = a;
    manifold.points[0].id = cf;
    manifold.points[0].local_point = circle_b.position;
    manifold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisType {
    Unknown,
    EdgeA,
    EdgeB,
}

/// This structure is used to keep track of the best separating axis.
#[derive(Debug, Clone, Copy)]
struct EpAxis {
    axis_type: AxisType,
    index: usize,
    separation: Real,
}

/// This holds polygon B expressed in frame A.
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

/// Reference face used for clipping
#[derive(Debug, Default)]
struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    v2: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: Real,
    side_normal2: Vec2,
    side_offset2: Real,
}

/// This class collides an edge and a polygon, taking into account edge adjacency.
struct EpCollider {
    polygon_b: TempPolygon,
    xf: Transform,
    v1: Vec2,
    v2: Vec2,
    normal: Vec2,
    lower_limit: Vec2,
    upper_limit: Vec2,
    radius: Real,
    front: bool,
}

impl EpCollider {
    // Algorithm:
    // 1. Classify v1 and v2
    // 2. Classify polygon centroid as front or back
    // 3. Flip normal if necessary
    // 4. Initialize normal range to [-pi, pi] about face normal
    // 5. Adjust normal range according to adjacent edges
    // 6. Visit each separating axes, only accept axes within the range
    // 7. Return if _any_ axis indicates separation
    // 8. Clip
    fn new(edge_a: &Edge, xf_a: &Transform, polygon_b: &Polygon, xf_b: &Transform) -> Self {
        let xf = xf_a.mul_t(*xf_b);
        let centroid_b = xf.apply(polygon_b.centroid);

        let v1 = edge_a.vertices[0];
        let v2 = edge_a.vertices[1];

        let edge1 = (v2 - v1).normalize();
        let normal1 = Vec2::new(edge1.y, -edge1.x);
        let offset1 = normal1.dot(centroid_b - v1);

        let mut normal0 = Vec2::ZERO;
        let mut normal2 = Vec2::ZERO;
        let mut offset0 = Real::ZERO;
        let mut offset2 = Real::ZERO;
        let mut convex1 = false;
        let mut convex2 = false;

        // Is there a preceding edge?
        if let Some(v0) = edge_a.vertex0 {
            let edge0 = (v1 - v0).normalize();
            normal0 = Vec2::new(edge0.y, -edge0.x);
            convex1 = edge0.cross(edge1) >= Real::ZERO;
            offset0 = normal0.dot(centroid_b - v0);
        }

        // Is there a following edge?
        if let Some(v3) = edge_a.vertex3 {
            let edge2 = (v3 - v2).normalize();
            normal2 = Vec2::new(edge2.y, -edge2.x);
            convex2 = edge1.cross(edge2) > Real::ZERO;
            offset2 = normal2.dot(centroid_b - v2);
        }

        // Determine front or back collision. Determine collision normal limits.
        let has_vertex0 = edge_a.vertex0.is_some();
        let has_vertex3 = edge_a.vertex3.is_some();
        let (front, lower, upper) = match (has_vertex0, has_vertex3) {
            (true, true) => {
                if convex1 && convex2 {
                    let front = offset0 >= Real::ZERO || offset1 >= Real::ZERO || offset2 >= Real::ZERO;
                    if front {
                        (front, normal0, normal2)
                    } else {
                        (front, -normal1, -normal1)
                    }
                } else if convex1 {
                    let front = offset0 >= Real::ZERO || (offset1 >= Real::ZERO && offset2 >= Real::ZERO);
                    if front {
                        (front, normal0, normal1)
                    } else {
                        (front, -normal2, -normal1)
                    }
                } else if convex2 {
                    let front = offset2 >= Real::ZERO || (offset0 >= Real::ZERO && offset1 >= Real::ZERO);
                    if front {
                        (front, normal1, normal2)
                    } else {
                        (front, -normal1, -normal0)
                    }
                } else {
                    let front = offset0 >= Real::ZERO && offset1 >= Real::ZERO && offset2 >= Real::ZERO;
                    if front {
                        (front, normal1, normal1)
                    } else {
                        (front, -normal2, -normal0)
                    }
                }
            }
            (true, false) => {
                if convex1 {
                    let front = offset0 >= Real::ZERO || offset1 >= Real::ZERO;
                    if front {
                        (front, normal0, -normal1)
                    } else {
                        (front, normal1, -normal1)
                    }
                } else {
                    let front = offset0 >= Real::ZERO && offset1 >= Real::ZERO;
                    if front {
                        (front, normal1, -normal1)
                    } else {
                        (front, normal1, -normal0)
                    }
                }
            }
            (false, true) => {
                if convex2 {
                    let front = offset1 >= Real::ZERO || offset2 >= Real::ZERO;
                    if front {
                        (front, -normal1, normal2)
                    } else {
                        (front, -normal1, normal1)
                    }
                } else {
                    let front = offset1 >= Real::ZERO && offset2 >= Real::ZERO;
                    if front {
                        (front, -normal1, normal1)
                    } else {
                        (front, -normal2, normal1)
                    }
                }
            }
            (false, false) => {
                let front = offset1 >= Real::ZERO;
                if front {
                    (front, -normal1, -normal1)
                } else {
                    (front, normal1, normal1)
                }
            }
        };
        let normal = if front { normal1 } else { -normal1 };

        // Get polygon B in frame A
        let mut temp = TempPolygon {
            vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            count: polygon_b.vertex_count(),
        };
        for (i, (&v, &n)) in polygon_b.vertices.iter().zip(&polygon_b.normals).enumerate() {
            temp.vertices[i] = xf.apply(v);
            temp.normals[i] = xf.q.apply(n);
        }

        EpCollider {
            polygon_b: temp,
            xf,
            v1,
            v2,
            normal,
            lower_limit: lower,
            upper_limit: upper,
            radius: Real::TWO * POLYGON_RADIUS,
            front,
        }
    }

    fn collide(&self, polygon_b: &Polygon) -> Manifold {
        let mut manifold = Manifold::default();

        let edge_axis = self.compute_edge_separation();

        // If no valid normal can be found than this edge should not collide.
        if edge_axis.axis_type == AxisType::Unknown {
            return manifold;
        }
        if edge_axis.separation > self.radius {
            return manifold;
        }

        let polygon_axis = self.compute_polygon_separation();
        if polygon_axis.axis_type != AxisType::Unknown && polygon_axis.separation > self.radius {
            return manifold;
        }

        // Use hysteresis for jitter reduction.
        let k_relative_tol = Real::from_f32(0.98);
        let k_absolute_tol = Real::from_f32(0.001);

        let primary_axis = if polygon_axis.axis_type == AxisType::Unknown {
            edge_axis
        } else if polygon_axis.separation > k_relative_tol * edge_axis.separation + k_absolute_tol {
            polygon_axis
        } else {
            edge_axis
        };

        let count = self.polygon_b.count;
        let mut ie = [ClipVertex::default(); 2];
        let mut rf = ReferenceFace::default();
        if primary_axis.axis_type == AxisType::EdgeA {
            manifold.manifold_type = ManifoldType::FaceA;

            // Search for the polygon normal that is most anti-parallel to the edge normal.
            let mut best_index = 0;
            let mut best_value = self.normal.dot(self.polygon_b.normals[0]);
            for i in 1..count {
                let value = self.normal.dot(self.polygon_b.normals[i]);
                if value < best_value {
                    best_value = value;
                    best_index = i;
                }
            }

            let i1 = best_index;
            let i2 = if i1 + 1 < count { i1 + 1 } else { 0 };

            for (clip, index) in ie.iter_mut().zip([i1, i2]) {
                clip.v = self.polygon_b.vertices[index];
                clip.id = ContactId {
                    index_a: 0,
                    index_b: index as u8,
                    type_a: ContactFeatureType::Face,
                    type_b: ContactFeatureType::Vertex,
                };
            }

            if self.front {
                rf.i1 = 0;
                rf.i2 = 1;
                rf.v1 = self.v1;
                rf.v2 = self.v2;
                rf.normal = self.normal;
            } else {
                rf.i1 = 1;
                rf.i2 = 0;
                rf.v1 = self.v2;
                rf.v2 = self.v1;
                rf.normal = self.normal;
            }
        } else {
            manifold.manifold_type = ManifoldType::FaceB;

            for (clip, v) in ie.iter_mut().zip([self.v1, self.v2]) {
                clip.v = v;
                clip.id = ContactId {
                    index_a: 0,
                    index_b: primary_axis.index as u8,
                    type_a: ContactFeatureType::Vertex,
                    type_b: ContactFeatureType::Face,
                };
            }

            rf.i1 = primary_axis.index;
            rf.i2 = if rf.i1 + 1 < count { rf.i1 + 1 } else { 0 };
            rf.v1 = self.polygon_b.vertices[rf.i1];
            rf.v2 = self.polygon_b.vertices[rf.i2];
            rf.normal = self.polygon_b.normals[rf.i1];
        }

        rf.side_normal1 = Vec2::new(rf.normal.y, -rf.normal.x);
        rf.side_normal2 = -rf.side_normal1;
        rf.side_offset1 = rf.side_normal1.dot(rf.v1);
        rf.side_offset2 = rf.side_normal2.dot(rf.v2);

        // Clip incident edge against extruded edge1 side edges.
        let (clip_points1, np) = clip_segment_to_line(&ie, rf.side_normal1, rf.side_offset1, rf.i1 as u8);
        if np < MAX_MANIFOLD_POINTS {
            return manifold;
        }

        // Clip to negative box side 1
        let (clip_points2, np) = clip_segment_to_line(&clip_points1, rf.side_normal2, rf.side_offset2, rf.i2 as u8);
        if np < MAX_MANIFOLD_POINTS {
            return manifold;
        }

        // Now clip_points2 contains the clipped points.
        if primary_axis.axis_type == AxisType::EdgeA {
            manifold.local_normal = rf.normal;
            manifold.local_point = rf.v1;
        } else {
            manifold.local_normal = polygon_b.normals[rf.i1];
            manifold.local_point = polygon_b.vertices[rf.i1];
        }

        let mut point_count = 0;
        for cp in clip_points2.iter() {
            let separation = rf.normal.dot(cp.v - rf.v1);
            if separation <= self.radius {
                let mp = &mut manifold.points[point_count];
                if primary_axis.axis_type == AxisType::EdgeA {
                    mp.local_point = self.xf.apply_inverse(cp.v);
                    mp.id = cp.id;
                } else {
                    mp.local_point = cp.v;
                    mp.id = cp.id.swapped();
                }
                point_count += 1;
            }
        }

        manifold.point_count = point_count;
        manifold
    }

    fn compute_edge_separation(&self) -> EpAxis {
        let separation = self.polygon_b.vertices[..self.polygon_b.count]
            .iter()
            .map(|&v| self.normal.dot(v - self.v1))
            .fold(Real::MAX, Real::min);
        EpAxis {
            axis_type: AxisType::EdgeA,
            index: if self.front { 0 } else { 1 },
            separation,
        }
    }

    fn compute_polygon_separation(&self) -> EpAxis {
        let mut axis = EpAxis {
            axis_type: AxisType::Unknown,
            index: 0,
            separation: -Real::MAX,
        };

        let perp = Vec2::new(-self.normal.y, self.normal.x);

        for i in 0..self.polygon_b.count {
            let n = -self.polygon_b.normals[i];

            let s1 = n.dot(self.polygon_b.vertices[i] - self.v1);
            let s2 = n.dot(self.polygon_b.vertices[i] - self.v2);
            let s = s1.min(s2);

            if s > self.radius {
                // No collision
                return EpAxis {
                    axis_type: AxisType::EdgeB,
                    index: i,
                    separation: s,
                };
            }

            // Adjacency
            if n.dot(perp) >= Real::ZERO {
                if (n - self.upper_limit).dot(self.normal) < -ANGULAR_SLOP {
                    continue;
                }
            } else if (n - self.lower_limit).dot(self.normal) < -ANGULAR_SLOP {
                continue;
            }

            if s > axis.separation {
                axis.axis_type = AxisType::EdgeB;
                axis.index = i;
                axis.separation = s;
            }
        }

        axis
    }
}

/// Edge A against polygon B, with ghost-vertex smoothing.
pub fn collide_edge_and_polygon(edge_a: &Edge, xf_a: &Transform, polygon_b: &Polygon, xf_b: &Transform) -> Manifold {
    EpCollider::new(edge_a, xf_a, polygon_b, xf_b).collide(polygon_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::WorldManifold;
    use approx::assert_abs_diff_eq;

    fn ground() -> Edge {
        Edge::new(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0))
    }

    #[test]
    fn test_circle_on_edge_face() {
        let circle = Circle::new(0.5);
        let xf_b = Transform::new(Vec2::new(1.0, 0.49), 0.0);
        let m = collide_edge_and_circle(&ground(), &Transform::identity(), &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::FaceA);
        assert_abs_diff_eq!(m.local_normal.y, 1.0, epsilon = 1e-6);
        assert_eq!(m.points[0].id.type_a, ContactFeatureType::Face);
    }

    #[test]
    fn test_circle_below_edge_gets_downward_normal() {
        let circle = Circle::new(0.5);
        let xf_b = Transform::new(Vec2::new(1.0, -0.49), 0.0);
        let m = collide_edge_and_circle(&ground(), &Transform::identity(), &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_abs_diff_eq!(m.local_normal.y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_circle_at_vertex_region() {
        let circle = Circle::new(0.5);
        let xf_b = Transform::new(Vec2::new(10.3, 0.1), 0.0);
        let m = collide_edge_and_circle(&ground(), &Transform::identity(), &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::Circles);
        assert_eq!(m.local_point, Vec2::new(10.0, 0.0));
        assert_eq!(m.points[0].id.index_a, 1);
    }

    #[test]
    fn test_circle_vertex_contact_owned_by_next_edge() {
        // The next segment continues to the right, so the circle over its face
        // must not also collide with this edge's end vertex.
        let edge = ground().with_ghosts(None, Some(Vec2::new(20.0, 0.0)));
        let circle = Circle::new(0.5);
        let xf_b = Transform::new(Vec2::new(10.3, 0.1), 0.0);
        let m = collide_edge_and_circle(&edge, &Transform::identity(), &circle, &xf_b);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_box_resting_on_edge() {
        let b = Polygon::new_box(0.5, 0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 0.5), 0.0);
        let m = collide_edge_and_polygon(&ground(), &Transform::identity(), &b, &xf_b);
        assert_eq!(m.point_count, 2);

        let wm = WorldManifold::new(&m, &Transform::identity(), POLYGON_RADIUS, &xf_b, b.radius);
        assert_abs_diff_eq!(wm.normal.y, 1.0, epsilon = 1e-5);
        for s in wm.separations {
            assert_abs_diff_eq!(s, -2.0 * POLYGON_RADIUS, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_box_far_from_edge() {
        let b = Polygon::new_box(0.5, 0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 2.0), 0.0);
        let m = collide_edge_and_polygon(&ground(), &Transform::identity(), &b, &xf_b);
        assert_eq!(m.point_count, 0);
    }
}
