use crate::collision::aabb::AABB;
use crate::common::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::common::{PhysicsError, Result};
use crate::math::{Real, Scalar, Transform, Vec2};

use super::{MassData, RayCastInput, RayCastOutput};

/// A solid convex polygon with counter-clockwise winding.
///
/// Vertices, normals and centroid are only built by the constructors, so a
/// polygon always holds a valid hull.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PolygonPoints"))]
pub struct Polygon {
    pub(crate) vertices: Vec<Vec2>,
    /// Outward edge normals; `normals[i]` belongs to the edge `vertices[i] -> vertices[i + 1]`.
    pub(crate) normals: Vec<Vec2>,
    pub(crate) centroid: Vec2,
    pub radius: Real,
}

/// Deserialized form of a [`Polygon`]; the hull is rebuilt from the points.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct PolygonPoints {
    vertices: Vec<Vec2>,
    radius: Real,
}

#[cfg(feature = "serde")]
impl TryFrom<PolygonPoints> for Polygon {
    type Error = PhysicsError;

    fn try_from(points: PolygonPoints) -> Result<Self> {
        let mut polygon = Polygon::new(&points.vertices)?;
        polygon.radius = points.radius;
        Ok(polygon)
    }
}

impl Polygon {
    /// Creates the convex hull of the given points.
    ///
    /// Points closer than half the linear slop are welded. Fails if fewer than 3
    /// points remain, if more than [`MAX_POLYGON_VERTICES`] are given, or if the
    /// points are collinear.
    pub fn new(points: &[Vec2]) -> Result<Self> {
        let invalid = || PhysicsError::InvalidPolygon {
            got: points.len(),
            max: MAX_POLYGON_VERTICES,
        };
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return Err(invalid());
        }

        // Perform welding and copy vertices into local buffer.
        let weld_tolerance = Real::HALF * LINEAR_SLOP;
        let mut ps: Vec<Vec2> = Vec::with_capacity(points.len());
        for &v in points {
            let unique = ps
                .iter()
                .all(|p| v.distance_squared(*p) >= weld_tolerance * weld_tolerance);
            if unique {
                ps.push(v);
            }
        }
        if ps.len() < 3 {
            return Err(invalid());
        }

        let hull = convex_hull(&ps);
        if hull.len() < 3 {
            return Err(invalid());
        }

        let vertices: Vec<Vec2> = hull.iter().map(|&i| ps[i]).collect();
        Ok(Self::from_hull(vertices))
    }

    /// Builds the polygon from vertices already known to be a CCW convex hull.
    fn from_hull(vertices: Vec<Vec2>) -> Self {
        let n = vertices.len();
        let normals = (0..n)
            .map(|i| {
                let edge = vertices[(i + 1) % n] - vertices[i];
                debug_assert!(edge.magnitude_squared() > Real::EPSILON * Real::EPSILON);
                edge.cross_scalar(Real::ONE).normalize()
            })
            .collect();
        let centroid = compute_centroid(&vertices);
        Polygon {
            vertices,
            normals,
            centroid,
            radius: POLYGON_RADIUS,
        }
    }

    /// An axis-aligned box centered on the body origin.
    pub fn new_box(half_width: Real, half_height: Real) -> Self {
        Polygon {
            vertices: vec![
                Vec2::new(-half_width, -half_height),
                Vec2::new(half_width, -half_height),
                Vec2::new(half_width, half_height),
                Vec2::new(-half_width, half_height),
            ],
            normals: vec![
                Vec2::new(Real::ZERO, -Real::ONE),
                Vec2::new(Real::ONE, Real::ZERO),
                Vec2::new(Real::ZERO, Real::ONE),
                Vec2::new(-Real::ONE, Real::ZERO),
            ],
            centroid: Vec2::ZERO,
            radius: POLYGON_RADIUS,
        }
    }

    /// A box with its center at `center` and rotated by `angle`, in body coordinates.
    pub fn new_oriented_box(half_width: Real, half_height: Real, center: Vec2, angle: Real) -> Self {
        let mut polygon = Self::new_box(half_width, half_height);
        let xf = Transform::new(center, angle);
        for v in polygon.vertices.iter_mut() {
            *v = xf.apply(*v);
        }
        for n in polygon.normals.iter_mut() {
            *n = xf.q.apply(*n);
        }
        polygon.centroid = center;
        polygon
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Hull vertices in counter-clockwise order.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    /// Calculates the area of the polygon using the Shoelace formula.
    pub fn area(&self) -> Real {
        let n = self.vertices.len();
        let mut area = Real::ZERO;
        for i in 0..n {
            area += self.vertices[i].cross(self.vertices[(i + 1) % n]);
        }
        Real::HALF * area.abs()
    }

    /// Validates convexity: every vertex lies behind every other edge.
    pub fn is_convex(&self) -> bool {
        let n = self.vertices.len();
        for i in 0..n {
            let p = self.vertices[i];
            let e = self.vertices[(i + 1) % n] - p;
            for (j, &v) in self.vertices.iter().enumerate() {
                if j == i || j == (i + 1) % n {
                    continue;
                }
                if e.cross(v - p) < Real::ZERO {
                    return false;
                }
            }
        }
        true
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let local = xf.apply_inverse(p);
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(&v, &n)| n.dot(local - v) <= Real::ZERO)
    }

    /// Clips the ray against each face plane.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Put the ray into the polygon's frame of reference.
        let p1 = xf.q.apply_inverse(input.p1 - xf.p);
        let p2 = xf.q.apply_inverse(input.p2 - xf.p);
        let d = p2 - p1;

        let mut lower: Real = Real::ZERO;
        let mut upper = input.max_fraction;
        let mut index = None;

        for (i, (&v, &n)) in self.vertices.iter().zip(&self.normals).enumerate() {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = n.dot(v - p1);
            let denominator = n.dot(d);

            if denominator == Real::ZERO {
                if numerator < Real::ZERO {
                    return None;
                }
            } else if denominator < Real::ZERO && numerator < lower * denominator {
                // The segment enters this half-space.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > Real::ZERO && numerator < upper * denominator {
                // The segment exits this half-space.
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            fraction: lower,
            normal: xf.q.apply(self.normals[i]),
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        let first = xf.apply(self.vertices[0]);
        let (lower, upper) = self.vertices[1..]
            .iter()
            .map(|&v| xf.apply(v))
            .fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let r = Vec2::new(self.radius, self.radius);
        AABB::new(lower - r, upper + r)
    }

    /// Mass, centroid and rotational inertia about the body origin.
    pub fn compute_mass(&self, density: Real) -> MassData {
        // Triangles fan out from the first vertex to keep the integrals well conditioned.
        let s = self.vertices[0];
        let n = self.vertices.len();
        let inv3 = Real::ONE / Real::from_f32(3.0);

        let mut center = Vec2::ZERO;
        let mut area = Real::ZERO;
        let mut inertia = Real::ZERO;

        for i in 0..n {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[(i + 1) % n] - s;
            let d = e1.cross(e2);

            let triangle_area = Real::HALF * d;
            area += triangle_area;
            center += (e1 + e2) * (triangle_area * inv3);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (Real::from_f32(0.25) * inv3 * d) * (int_x2 + int_y2);
        }

        let mass = density * area;
        debug_assert!(area > Real::EPSILON);
        center = center * (Real::ONE / area);
        let world_center = center + s;

        // Inertia relative to the reference point, shifted to the body origin.
        let mut inertia = density * inertia;
        inertia += mass * (world_center.dot(world_center) - center.dot(center));

        MassData {
            mass,
            center: world_center,
            inertia,
        }
    }
}

/// Gift wrapping; returns indices into `ps` in CCW order.
fn convex_hull(ps: &[Vec2]) -> Vec<usize> {
    // Find the right most point on the hull.
    let mut i0 = 0;
    let mut x0 = ps[0].x;
    for (i, p) in ps.iter().enumerate().skip(1) {
        if p.x > x0 || (p.x == x0 && p.y < ps[i0].y) {
            i0 = i;
            x0 = p.x;
        }
    }

    let mut hull = Vec::with_capacity(ps.len());
    let mut ih = i0;
    loop {
        if hull.len() > ps.len() {
            // Degenerate input that never closes the loop.
            return Vec::new();
        }
        hull.push(ih);

        let mut ie = 0;
        for j in 1..ps.len() {
            if ie == ih {
                ie = j;
                continue;
            }
            let r = ps[ie] - ps[ih];
            let v = ps[j] - ps[ih];
            let c = r.cross(v);
            if c < Real::ZERO {
                ie = j;
            }
            // Collinearity check
            if c == Real::ZERO && v.magnitude_squared() > r.magnitude_squared() {
                ie = j;
            }
        }

        ih = ie;
        if ie == i0 {
            break;
        }
    }
    hull
}

fn compute_centroid(vertices: &[Vec2]) -> Vec2 {
    let n = vertices.len();
    let s = vertices[0];
    let inv3 = Real::ONE / Real::from_f32(3.0);
    let mut c = Vec2::ZERO;
    let mut area = Real::ZERO;
    for i in 0..n {
        let p1 = Vec2::ZERO;
        let p2 = vertices[i] - s;
        let p3 = vertices[(i + 1) % n] - s;
        let triangle_area = Real::HALF * (p2 - p1).cross(p3 - p1);
        area += triangle_area;
        c += (p1 + p2 + p3) * (triangle_area * inv3);
    }
    c * (Real::ONE / area) + s
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    const EPSILON: Real = 1e-5;

    fn unit_square() -> Vec<Vec2> {
        vec![
            Vec2::new(-0.5, -0.5),
            Vec2::new(0.5, -0.5),
            Vec2::new(0.5, 0.5),
            Vec2::new(-0.5, 0.5),
        ]
    }

    #[test]
    fn test_polygon_new() {
        let polygon = Polygon::new(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]).unwrap();
        assert_eq!(polygon.vertex_count(), 3);
        assert!(polygon.is_convex());
    }

    #[test]
    fn test_polygon_new_too_few_vertices() {
        let err = Polygon::new(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)]).unwrap_err();
        assert_eq!(err, PhysicsError::InvalidPolygon { got: 2, max: 8 });
    }

    #[test]
    fn test_polygon_welds_and_rejects_collinear() {
        let pts = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        assert!(Polygon::new(&pts).is_err());

        let welded = [Vec2::new(0.0, 0.0), Vec2::new(0.0001, 0.0), Vec2::new(1.0, 0.0)];
        assert!(Polygon::new(&welded).is_err());
    }

    #[test]
    fn test_polygon_hull_reorders_ccw_and_drops_interior() {
        let pts = [
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(0.0, 0.0), // interior
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let polygon = Polygon::new(&pts).unwrap();
        assert_eq!(polygon.vertex_count(), 4);
        assert!(polygon.is_convex());
        assert_abs_diff_eq!(polygon.area(), 4.0, epsilon = EPSILON);
        assert_eq!(polygon.vertices().len(), polygon.normals().len());
        for (v, n) in polygon.vertices().iter().zip(polygon.normals()) {
            // Normals point away from the center.
            assert!(n.dot(*v) > 0.0);
        }
    }

    #[test]
    fn test_polygon_read_accessors() {
        let polygon = Polygon::new_oriented_box(1.0, 0.5, Vec2::new(2.0, 3.0), 0.0);
        assert_eq!(polygon.centroid(), Vec2::new(2.0, 3.0));
        assert_eq!(polygon.vertices()[0], Vec2::new(1.0, 2.5));
        assert_eq!(polygon.vertices()[2], Vec2::new(3.0, 3.5));
        assert_eq!(polygon.normals()[1], Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_polygon_area_square() {
        let polygon = Polygon::new(&unit_square()).unwrap();
        assert_abs_diff_eq!(polygon.area(), 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_polygon_centroid_square_offset() {
        let offset = Vec2::new(10.0, -5.0);
        let pts: Vec<Vec2> = unit_square().into_iter().map(|v| v + offset).collect();
        let polygon = Polygon::new(&pts).unwrap();
        assert_abs_diff_eq!(polygon.centroid.x, offset.x, epsilon = 1e-4);
        assert_abs_diff_eq!(polygon.centroid.y, offset.y, epsilon = 1e-4);
    }

    #[test]
    fn test_polygon_centroid_triangle() {
        let polygon = Polygon::new(&[Vec2::new(0.0, 0.0), Vec2::new(3.0, 0.0), Vec2::new(0.0, 3.0)]).unwrap();
        assert_abs_diff_eq!(polygon.centroid.x, 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(polygon.centroid.y, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_polygon_inertia_square_centered() {
        let polygon = Polygon::new_box(0.5, 0.5);
        let md = polygon.compute_mass(1.0);
        assert_abs_diff_eq!(md.mass, 1.0, epsilon = EPSILON);
        // Inertia of rectangle (w=1, h=1) about centroid = mass * (w^2 + h^2) / 12
        assert_abs_diff_eq!(md.inertia, 1.0 / 6.0, epsilon = EPSILON);
    }

    #[test]
    fn test_polygon_inertia_square_offset() {
        // Inertia is reported about the body origin: parallel axis term included.
        let polygon = Polygon::new_oriented_box(0.5, 0.5, Vec2::new(10.0, 0.0), 0.0);
        let md = polygon.compute_mass(2.0);
        assert_abs_diff_eq!(md.mass, 2.0, epsilon = EPSILON);
        assert_abs_diff_eq!(md.center.x, 10.0, epsilon = 1e-4);
        let about_center = md.inertia - md.mass * md.center.dot(md.center);
        assert_abs_diff_eq!(about_center, 2.0 / 6.0, epsilon = 1e-3);
    }

    #[test]
    fn test_polygon_test_point() {
        let polygon = Polygon::new_box(1.0, 1.0);
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        assert!(polygon.test_point(&xf, Vec2::new(5.5, 0.5)));
        assert!(!polygon.test_point(&xf, Vec2::new(3.5, 0.0)));
    }

    #[test]
    fn test_polygon_ray_cast() {
        let polygon = Polygon::new_box(1.0, 1.0);
        let input = RayCastInput {
            p1: Vec2::new(-5.0, 0.0),
            p2: Vec2::new(5.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = polygon.ray_cast(&input, &Transform::identity()).unwrap();
        assert_abs_diff_eq!(hit.fraction, 0.4, epsilon = EPSILON);
        assert_abs_diff_eq!(hit.normal.x, -1.0, epsilon = EPSILON);

        // Starting inside never reports a hit.
        let inside = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(5.0, 0.0),
            max_fraction: 1.0,
        };
        assert!(polygon.ray_cast(&inside, &Transform::identity()).is_none());
    }

    #[test]
    fn test_polygon_aabb_includes_skin() {
        let polygon = Polygon::new_box(1.0, 2.0);
        let aabb = polygon.compute_aabb(&Transform::identity());
        assert_abs_diff_eq!(aabb.min.x, -1.0 - POLYGON_RADIUS, epsilon = EPSILON);
        assert_abs_diff_eq!(aabb.max.y, 2.0 + POLYGON_RADIUS, epsilon = EPSILON);
    }
}
