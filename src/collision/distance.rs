//! Closest points between convex proxies (GJK) and GJK-based shape casting.

use crate::common::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::math::{Real, Scalar, Transform, Vec2};

/// GJK gives up after this many iterations.
pub const MAX_DISTANCE_ITERATIONS: usize = 20;

/// A convex vertex set with a skin radius, borrowed from a shape child.
#[derive(Debug, Clone, Copy)]
pub struct DistanceProxy<'a> {
    vertices: &'a [Vec2],
    pub radius: Real,
}

impl<'a> DistanceProxy<'a> {
    pub fn new(vertices: &'a [Vec2], radius: Real) -> Self {
        debug_assert!(!vertices.is_empty() && vertices.len() <= MAX_POLYGON_VERTICES);
        Self { vertices, radius }
    }

    pub fn vertices(&self) -> &'a [Vec2] {
        self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    /// Index of the vertex furthest along `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }
}

/// Warm-start state for [`distance`]. Set `count` to zero on the first call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimplexCache {
    /// Length or area of the cached simplex.
    pub metric: Real,
    pub count: u16,
    /// Vertices on shape A.
    pub index_a: [u8; 3],
    /// Vertices on shape B.
    pub index_b: [u8; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub proxy_b: DistanceProxy<'a>,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub use_radii: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on shape A.
    pub point_a: Vec2,
    /// Closest point on shape B.
    pub point_b: Vec2,
    pub distance: Real,
    /// Number of GJK iterations used.
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ShapeCastInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub proxy_b: DistanceProxy<'a>,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub translation_b: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeCastOutput {
    pub point: Vec2,
    pub normal: Vec2,
    /// Fraction of `translation_b` travelled before contact.
    pub lambda: Real,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point in proxy A.
    w_a: Vec2,
    /// Support point in proxy B.
    w_b: Vec2,
    /// `w_b - w_a`
    w: Vec2,
    /// Barycentric coordinate for the closest point.
    a: Real,
    index_a: usize,
    index_b: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy<'_>,
        xf_a: &Transform,
        proxy_b: &DistanceProxy<'_>,
        xf_b: &Transform,
    ) -> Self {
        debug_assert!(cache.count <= 3);
        let mut simplex = Simplex {
            count: cache.count as usize,
            ..Default::default()
        };

        // Copy data from cache.
        for i in 0..simplex.count {
            let v = &mut simplex.v[i];
            v.index_a = cache.index_a[i] as usize;
            v.index_b = cache.index_b[i] as usize;
            v.w_a = xf_a.apply(proxy_a.vertex(v.index_a));
            v.w_b = xf_b.apply(proxy_b.vertex(v.index_b));
            v.w = v.w_b - v.w_a;
            // Invalid
            v.a = Real::ZERO;
        }

        // Compute the new simplex metric, if it is substantially different than
        // old metric then flush the simplex.
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < Real::HALF * metric1 || Real::TWO * metric1 < metric2 || metric2 < Real::EPSILON {
                // Reset the simplex.
                simplex.count = 0;
            }
        }

        // If the cache is empty or invalid ...
        if simplex.count == 0 {
            let v = &mut simplex.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.apply(proxy_a.vertex(0));
            v.w_b = xf_b.apply(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            v.a = Real::ONE;
            simplex.count = 1;
        }

        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count as u16;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a as u8;
            cache.index_b[i] = self.v[i].index_b as u8;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = e12.cross(-self.v[0].w);
                if sgn > Real::ZERO {
                    // Origin is left of e12.
                    Vec2::scalar_cross(Real::ONE, e12)
                } else {
                    // Origin is right of e12.
                    e12.cross_scalar(Real::ONE)
                }
            }
            _ => {
                debug_assert!(false, "invalid simplex count {}", self.count);
                Vec2::ZERO
            }
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].w * self.v[0].a + self.v[1].w * self.v[1].a,
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        let [v1, v2, v3] = &self.v;
        match self.count {
            1 => (v1.w_a, v1.w_b),
            2 => (
                v1.w_a * v1.a + v2.w_a * v2.a,
                v1.w_b * v1.a + v2.w_b * v2.a,
            ),
            _ => {
                let p = v1.w_a * v1.a + v2.w_a * v2.a + v3.w_a * v3.a;
                (p, p)
            }
        }
    }

    fn metric(&self) -> Real {
        match self.count {
            2 => self.v[0].w.distance(self.v[1].w),
            3 => (self.v[1].w - self.v[0].w).cross(self.v[2].w - self.v[0].w),
            _ => Real::ZERO,
        }
    }

    // Solve a line segment using barycentric coordinates.
    //
    // p = a1 * w1 + a2 * w2
    // a1 + a2 = 1
    //
    // The vector from the origin to the closest point on the line is
    // perpendicular to the line.
    // e12 = w2 - w1
    // dot(p, e) = 0
    // a1 * dot(w1, e) + a2 * dot(w2, e) = 0
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= Real::ZERO {
            // a2 <= 0, so we clamp it to 0
            self.v[0].a = Real::ONE;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= Real::ZERO {
            // a1 <= 0, so we clamp it to 0
            self.v[1].a = Real::ONE;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // Must be in e12 region.
        let inv_d12 = Real::ONE / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    // Possible regions:
    // - points[2]
    // - edge points[0]-points[2]
    // - edge points[1]-points[2]
    // - inside the triangle
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        // Edge12
        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        // Edge13
        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        // Edge23
        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        // Triangle123
        let n123 = e12.cross(e13);
        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= Real::ZERO && d13_2 <= Real::ZERO {
            self.v[0].a = Real::ONE;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > Real::ZERO && d12_2 > Real::ZERO && d123_3 <= Real::ZERO {
            let inv_d12 = Real::ONE / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > Real::ZERO && d13_2 > Real::ZERO && d123_2 <= Real::ZERO {
            let inv_d13 = Real::ONE / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= Real::ZERO && d23_2 <= Real::ZERO {
            self.v[1].a = Real::ONE;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= Real::ZERO && d23_1 <= Real::ZERO {
            self.v[2].a = Real::ONE;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > Real::ZERO && d23_2 > Real::ZERO && d123_1 <= Real::ZERO {
            let inv_d23 = Real::ONE / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Must be in triangle123
        let inv_d123 = Real::ONE / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }

    fn solve(&mut self) {
        match self.count {
            2 => self.solve2(),
            3 => self.solve3(),
            _ => {}
        }
    }
}

/// Computes the closest points between two shapes. Supports any combination
/// of circles, polygons and edges. On the first call set `cache.count` to zero.
pub fn distance(input: &DistanceInput<'_>, cache: &mut SimplexCache) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    // Initialize the simplex.
    let mut simplex = Simplex::read_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);

    // These store the vertices of the last simplex so that we can check for duplicates and prevent cycling.
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    // Main iteration loop.
    let mut iter = 0;
    while iter < MAX_DISTANCE_ITERATIONS {
        // Copy simplex so we can identify duplicates.
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        simplex.solve();

        // If we have 3 points, then the origin is in the corresponding triangle.
        if simplex.count == 3 {
            break;
        }

        // Get search direction.
        let d = simplex.search_direction();

        // Ensure the search direction is numerically fit.
        if d.magnitude_squared() < Real::EPSILON * Real::EPSILON {
            // The origin is probably contained by a line segment
            // or triangle. Thus the shapes are overlapped.
            break;
        }

        // Compute a tentative new simplex vertex using support points.
        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = proxy_a.support(xf_a.q.apply_inverse(-d));
        vertex.w_a = xf_a.apply(proxy_a.vertex(vertex.index_a));
        vertex.index_b = proxy_b.support(xf_b.q.apply_inverse(d));
        vertex.w_b = xf_b.apply(proxy_b.vertex(vertex.index_b));
        vertex.w = vertex.w_b - vertex.w_a;

        // Iteration count is equated to the number of support point calls.
        iter += 1;

        // Check for duplicate support points. This is the main termination criteria.
        let (index_a, index_b) = (vertex.index_a, vertex.index_b);
        let duplicate = (0..save_count).any(|i| index_a == save_a[i] && index_b == save_b[i]);
        if duplicate {
            // If we found a duplicate support point we must exit to avoid cycling.
            break;
        }

        // New vertex is ok and needed.
        simplex.count += 1;
    }

    // Prepare output.
    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = point_a.distance(point_b);

    // Cache the simplex.
    simplex.write_cache(cache);

    // Apply radii if requested.
    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;

        if dist > r_a + r_b && dist > Real::EPSILON {
            // Shapes are still no overlapped.
            // Move the witness points to the outer surface.
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalize();
            point_a += normal * r_a;
            point_b -= normal * r_b;
        } else {
            // Shapes are overlapped when radii are considered.
            // Move the witness points to the middle.
            let p = (point_a + point_b) * Real::HALF;
            point_a = p;
            point_b = p;
            dist = Real::ZERO;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

/// GJK-raycast: sweeps proxy B along `translation_b` against proxy A.
///
/// Returns `None` when there is no contact within the translation, or when the
/// proxies are initially overlapping.
///
/// Algorithm by Gino van den Bergen, "Smooth Mesh Contacts with GJK" in
/// Game Physics Pearls, 2010.
pub fn shape_cast(input: &ShapeCastInput<'_>) -> Option<ShapeCastOutput> {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let radius_a = proxy_a.radius.max(POLYGON_RADIUS);
    let radius_b = proxy_b.radius.max(POLYGON_RADIUS);
    let radius = radius_a + radius_b;

    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let r = input.translation_b;
    let mut n = Vec2::ZERO;
    let mut lambda: Real = Real::ZERO;

    // Initial simplex
    let mut simplex = Simplex::default();

    // Get support point in -r direction
    let index_a = proxy_a.support(xf_a.q.apply_inverse(-r));
    let w_a = xf_a.apply(proxy_a.vertex(index_a));
    let index_b = proxy_b.support(xf_b.q.apply_inverse(r));
    let w_b = xf_b.apply(proxy_b.vertex(index_b));
    let mut v = w_a - w_b;

    // Sigma is the target distance between polygons
    let sigma = POLYGON_RADIUS.max(radius - POLYGON_RADIUS);
    let tolerance = Real::HALF * LINEAR_SLOP;

    // Main iteration loop.
    let mut iter = 0;
    while iter < MAX_DISTANCE_ITERATIONS && v.magnitude() > sigma + tolerance {
        debug_assert!(simplex.count < 3);

        // Support in direction -v (A - B)
        let index_a = proxy_a.support(xf_a.q.apply_inverse(-v));
        let w_a = xf_a.apply(proxy_a.vertex(index_a));
        let index_b = proxy_b.support(xf_b.q.apply_inverse(v));
        let w_b = xf_b.apply(proxy_b.vertex(index_b));
        let p = w_a - w_b;

        // -v is a normal at p
        v = v.normalize();

        // Intersect ray with plane
        let vp = v.dot(p);
        let vr = v.dot(r);
        if vp - sigma > lambda * vr {
            if vr <= Real::ZERO {
                // miss
                return None;
            }

            lambda = (vp - sigma) / vr;
            if lambda > Real::ONE {
                // miss
                return None;
            }

            n = -v;
            simplex.count = 0;
        }

        // Reverse simplex since it works with B - A.
        // Shift by lambda * r because we want the closest point to the current clip point.
        // Note that the support point p is not shifted because we want the plane equation
        // to be formed in unshifted space.
        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = index_b;
        vertex.w_a = w_b + r * lambda;
        vertex.index_b = index_a;
        vertex.w_b = w_a;
        vertex.w = vertex.w_b - vertex.w_a;
        vertex.a = Real::ONE;
        simplex.count += 1;

        simplex.solve();

        // If we have 3 points, then the origin is in the corresponding triangle.
        if simplex.count == 3 {
            // Overlap
            return None;
        }

        // Get search direction.
        v = simplex.closest_point();

        // Iteration count is equated to the number of support point calls.
        iter += 1;
    }

    if iter == 0 {
        // Initial overlap
        return None;
    }

    // Prepare output
    let (_point_b, point_a) = simplex.witness_points();

    if v.magnitude_squared() > Real::ZERO {
        n = (-v).normalize();
    }

    Some(ShapeCastOutput {
        point: point_a + n * radius_a,
        normal: n,
        lambda,
        iterations: iter,
    })
}
