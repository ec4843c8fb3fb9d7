//! Small dense matrices used by the block contact solver and the joints.

use super::scalar::{Real, Scalar};
use super::vec2::{Vec2, Vec3};

/// A 2x2 matrix stored as two columns.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat22 {
    pub ex: Vec2,
    pub ey: Vec2,
}

impl Mat22 {
    pub const ZERO: Mat22 = Mat22 {
        ex: Vec2::ZERO,
        ey: Vec2::ZERO,
    };

    pub fn new(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    /// Matrix product with a column vector.
    #[inline]
    pub fn mul_vec(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }

    /// The inverse, or the zero matrix when singular.
    pub fn inverse(&self) -> Mat22 {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != Real::ZERO {
            det = Real::ONE / det;
        }
        Mat22 {
            ex: Vec2::new(det * d, -det * c),
            ey: Vec2::new(-det * b, det * a),
        }
    }

    /// Solves `A * x = b`. Cheaper than computing the inverse.
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != Real::ZERO {
            det = Real::ONE / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }
}

/// A 3x3 matrix stored as three columns.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat33 {
    pub ex: Vec3,
    pub ey: Vec3,
    pub ez: Vec3,
}

impl Mat33 {
    pub const ZERO: Mat33 = Mat33 {
        ex: Vec3::ZERO,
        ey: Vec3::ZERO,
        ez: Vec3::ZERO,
    };

    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        self.ex * v.x + self.ey * v.y + self.ez * v.z
    }

    /// Upper-left 2x2 block times a 2D vector.
    pub fn mul_vec22(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }

    /// Solves `A * x = b` for the full 3x3 system.
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != Real::ZERO {
            det = Real::ONE / det;
        }
        Vec3::new(
            det * b.dot(self.ey.cross(self.ez)),
            det * self.ex.dot(b.cross(self.ez)),
            det * self.ex.dot(self.ey.cross(b)),
        )
    }

    /// Solves `A * x = b` using only the upper-left 2x2 block.
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != Real::ZERO {
            det = Real::ONE / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// Inverse of the upper-left 2x2 block, zero elsewhere.
    pub fn inverse22(&self) -> Mat33 {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != Real::ZERO {
            det = Real::ONE / det;
        }
        Mat33 {
            ex: Vec3::new(det * d, -det * c, Real::ZERO),
            ey: Vec3::new(-det * b, det * a, Real::ZERO),
            ez: Vec3::ZERO,
        }
    }

    /// Inverse of a symmetric matrix, zero when singular.
    pub fn sym_inverse33(&self) -> Mat33 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != Real::ZERO {
            det = Real::ONE / det;
        }

        let (a11, a12, a13) = (self.ex.x, self.ey.x, self.ez.x);
        let (a22, a23) = (self.ey.y, self.ez.y);
        let a33 = self.ez.z;

        let ex = Vec3::new(
            det * (a22 * a33 - a23 * a23),
            det * (a13 * a23 - a12 * a33),
            det * (a12 * a23 - a13 * a22),
        );
        let ey = Vec3::new(ex.y, det * (a11 * a33 - a13 * a13), det * (a13 * a12 - a11 * a23));
        let ez = Vec3::new(ex.z, ey.z, det * (a11 * a22 - a12 * a12));
        Mat33 { ex, ey, ez }
    }
}

/// Determinant of a 2x2 matrix given by columns, for tests and diagnostics.
pub fn det22(ex: Vec2, ey: Vec2) -> Real {
    ex.x * ey.y - ey.x * ex.y
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: Real = 1e-5;

    #[test]
    fn test_mat22_solve_matches_inverse() {
        let m = Mat22::new(Vec2::new(4.0, 1.0), Vec2::new(2.0, 3.0));
        let b = Vec2::new(1.0, -2.0);
        let x = m.solve(b);
        let y = m.inverse().mul_vec(b);
        assert!((x.x - y.x).abs() < EPSILON);
        assert!((x.y - y.y).abs() < EPSILON);
        let back = m.mul_vec(x);
        assert!((back.x - b.x).abs() < EPSILON);
        assert!((back.y - b.y).abs() < EPSILON);
    }

    #[test]
    fn test_mat22_singular_is_zero() {
        let m = Mat22::new(Vec2::new(1.0, 2.0), Vec2::new(2.0, 4.0));
        assert_eq!(det22(m.ex, m.ey), 0.0);
        assert_eq!(m.inverse(), Mat22::ZERO);
    }

    #[test]
    fn test_mat33_solve33() {
        let m = Mat33 {
            ex: Vec3::new(3.0, 1.0, 0.5),
            ey: Vec3::new(1.0, 4.0, 0.2),
            ez: Vec3::new(0.5, 0.2, 2.0),
        };
        let b = Vec3::new(1.0, 2.0, 3.0);
        let x = m.solve33(b);
        let back = m.mul_vec(x);
        assert!((back - b).dot(back - b) < EPSILON);

        let inv = m.sym_inverse33();
        let y = inv.mul_vec(b);
        assert!((y - x).dot(y - x) < EPSILON);
    }
}
