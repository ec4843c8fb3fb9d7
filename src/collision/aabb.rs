// Defines an Axis-Aligned Bounding Box

use crate::math::{Real, Scalar, Vec2};
use crate::shapes::{RayCastInput, RayCastOutput};

/// An Axis-Aligned Bounding Box defined by its minimum and maximum corner points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB {
    pub min: Vec2,
    pub max: Vec2,
}

impl AABB {
    /// Creates a new AABB.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        // Ensure min coordinates are <= max coordinates
        AABB {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Verify that the bounds are sorted and finite.
    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= Real::ZERO && d.y >= Real::ZERO && self.min.is_valid() && self.max.is_valid()
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * Real::HALF
    }

    /// Half-widths.
    pub fn extents(&self) -> Vec2 {
        (self.max - self.min) * Real::HALF
    }

    pub fn perimeter(&self) -> Real {
        let wx = self.max.x - self.min.x;
        let wy = self.max.y - self.min.y;
        Real::TWO * (wx + wy)
    }

    /// Grows the box by `margin` on every side.
    pub fn expanded(&self, margin: Real) -> AABB {
        let r = Vec2::new(margin, margin);
        AABB {
            min: self.min - r,
            max: self.max + r,
        }
    }

    /// Checks if this AABB overlaps with another AABB. Touching boxes overlap.
    pub fn overlaps(&self, other: &AABB) -> bool {
        // Check for separation on each axis
        let d1 = other.min - self.max;
        let d2 = self.min - other.max;
        !(d1.x > Real::ZERO || d1.y > Real::ZERO || d2.x > Real::ZERO || d2.y > Real::ZERO)
    }

    /// Does this box fully contain `other`?
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// Merges another AABB into this one, expanding this AABB to contain both.
    pub fn merge(&mut self, other: &AABB) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// The smallest box containing both.
    pub fn combine(a: &AABB, b: &AABB) -> AABB {
        let mut out = *a;
        out.merge(b);
        out
    }

    /// Creates an AABB that encompasses a set of points.
    pub fn from_points(points: &[Vec2]) -> Option<Self> {
        let (&first, rest) = points.split_first()?;
        let (min_pt, max_pt) = rest
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Some(AABB::new(min_pt, max_pt))
    }

    /// Slab test. Rays starting inside the box do not report a hit.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = -Real::MAX;
        let mut tmax = Real::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let abs_d = d.abs();
        let mut normal = Vec2::ZERO;

        let axes = [
            (p.x, d.x, abs_d.x, self.min.x, self.max.x, Vec2::new(Real::ONE, Real::ZERO)),
            (p.y, d.y, abs_d.y, self.min.y, self.max.y, Vec2::new(Real::ZERO, Real::ONE)),
        ];
        for (pi, di, abs_di, lo, hi, axis) in axes {
            if abs_di < Real::EPSILON {
                // Parallel.
                if pi < lo || hi < pi {
                    return None;
                }
            } else {
                let inv_d = Real::ONE / di;
                let mut t1 = (lo - pi) * inv_d;
                let mut t2 = (hi - pi) * inv_d;

                // Sign of the normal vector.
                let mut s = -Real::ONE;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = Real::ONE;
                }

                // Push the min up
                if t1 > tmin {
                    normal = axis * s;
                    tmin = t1;
                }

                // Pull the max down
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        // Does the ray start inside the box?
        // Does the ray intersect beyond the max fraction?
        if tmin < Real::ZERO || input.max_fraction < tmin {
            return None;
        }

        Some(RayCastOutput {
            fraction: tmin,
            normal,
        })
    }
}
