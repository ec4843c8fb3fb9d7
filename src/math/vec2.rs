use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use super::scalar::{Real, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2 {
    pub x: Real,
    pub y: Real,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: Real::ZERO, y: Real::ZERO };
    pub const UP: Vec2 = Vec2 { x: Real::ZERO, y: Real::ONE };
    pub const RIGHT: Vec2 = Vec2 { x: Real::ONE, y: Real::ZERO };

    /// Creates a new Vec2.
    pub const fn new(x: Real, y: Real) -> Self {
        Self { x, y }
    }

    /// Calculates the dot product of two vectors.
    #[inline]
    pub fn dot(self, other: Self) -> Real {
        self.x * other.x + self.y * other.y
    }

    /// Calculates the squared magnitude (length) of the vector.
    /// Useful for comparisons as it avoids a square root.
    #[inline]
    pub fn magnitude_squared(self) -> Real {
        self.dot(self)
    }

    /// Calculates the magnitude (length) of the vector.
    #[inline]
    pub fn magnitude(self) -> Real {
        self.magnitude_squared().sqrt()
    }

    /// Returns a normalized version of the vector (unit vector).
    /// If the magnitude is below epsilon, it returns a zero vector.
    pub fn normalize(self) -> Self {
        let mut v = self;
        v.normalize_mut();
        v
    }

    /// Normalizes in place and returns the original length.
    /// Vectors shorter than epsilon are left untouched and 0 is returned.
    pub fn normalize_mut(&mut self) -> Real {
        let length = self.magnitude();
        if length < Real::EPSILON {
            return Real::ZERO;
        }
        let inv_length = Real::ONE / length;
        self.x *= inv_length;
        self.y *= inv_length;
        length
    }

    /// Calculates the squared distance between two vector points.
    #[inline]
    pub fn distance_squared(self, other: Self) -> Real {
        (self - other).magnitude_squared()
    }

    /// Calculates the distance between two vector points.
    #[inline]
    pub fn distance(self, other: Self) -> Real {
        (self - other).magnitude()
    }

    /// Returns a vector perpendicular to this vector (90-degree counter-clockwise rotation).
    #[inline]
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Computes the 2D cross product (scalar). Equivalent to z-component of 3D cross product.
    #[inline]
    pub fn cross(self, other: Vec2) -> Real {
        self.x * other.y - self.y * other.x
    }

    /// Cross product of this vector with a scalar `s` on the z axis: `v x s`.
    #[inline]
    pub fn cross_scalar(self, s: Real) -> Vec2 {
        Vec2::new(s * self.y, -s * self.x)
    }

    /// Cross product of a scalar on the z axis with a vector: `s x v`.
    #[inline]
    pub fn scalar_cross(s: Real, v: Vec2) -> Vec2 {
        Vec2::new(-s * v.y, s * v.x)
    }

    /// Component-wise absolute value.
    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    /// Component-wise minimum.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// True when neither component is infinite or NaN.
    pub fn is_valid(self) -> bool {
        Scalar::is_valid(self.x) && Scalar::is_valid(self.y)
    }
}

// Implement Add trait
impl Add for Vec2 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

// Implement Sub trait
impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

// Scalar multiplication (Vec2 * Real)
impl Mul<Real> for Vec2 {
    type Output = Self;

    fn mul(self, scalar: Real) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

// Scalar multiplication (Real * Vec2)
impl Mul<Vec2> for Real {
    type Output = Vec2;

    fn mul(self, vec: Vec2) -> Vec2 {
        vec * self
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl MulAssign<Real> for Vec2 {
    fn mul_assign(&mut self, rhs: Real) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

// Division by zero follows IEEE semantics (infinity or NaN).
impl Div<Real> for Vec2 {
    type Output = Self;

    fn div(self, rhs: Real) -> Self::Output {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// A 3D column vector, used by the 3x3 joint solvers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: Real,
    pub y: Real,
    pub z: Real,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: Real::ZERO, y: Real::ZERO, z: Real::ZERO };

    pub const fn new(x: Real, y: Real, z: Real) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> Real {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// The x and y components.
    pub fn xy(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<Real> for Vec3 {
    type Output = Self;

    fn mul(self, s: Real) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, o: Self) {
        self.x += o.x;
        self.y += o.y;
        self.z += o.z;
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: Real = 1e-6;

    #[test]
    fn test_vec2_new() {
        let v = Vec2::new(1.0, 2.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
    }

    #[test]
    fn test_vec2_add_sub() {
        let v1 = Vec2::new(1.0, 2.0);
        let v2 = Vec2::new(3.0, 4.0);
        assert_eq!(v1 + v2, Vec2::new(4.0, 6.0));
        assert_eq!(v2 - v1, Vec2::new(2.0, 2.0));
    }

    #[test]
    fn test_vec2_scalar_mul() {
        let v = Vec2::new(1.0, 2.0);
        assert_eq!(v * 3.0, Vec2::new(3.0, 6.0));
        assert_eq!(3.0 * v, Vec2::new(3.0, 6.0));
    }

    #[test]
    fn test_vec2_dot_and_magnitude() {
        let v = Vec2::new(3.0, 4.0);
        assert!((v.dot(Vec2::new(1.0, 2.0)) - 11.0).abs() < EPSILON);
        assert!((v.magnitude_squared() - 25.0).abs() < EPSILON);
        assert!((v.magnitude() - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2::new(3.0, 4.0);
        let n = v.normalize();
        assert!((n.magnitude() - 1.0).abs() < EPSILON);
        assert!((n.x - 0.6).abs() < EPSILON);
        assert!((n.y - 0.8).abs() < EPSILON);

        let mut zero = Vec2::ZERO;
        assert_eq!(zero.normalize_mut(), 0.0);
        assert_eq!(zero, Vec2::ZERO);
    }

    #[test]
    fn test_vec2_normalize_mut_returns_length() {
        let mut v = Vec2::new(0.0, -2.0);
        let len = v.normalize_mut();
        assert!((len - 2.0).abs() < EPSILON);
        assert_eq!(v, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_vec2_perpendicular() {
        let v = Vec2::new(3.0, 4.0);
        let perp = v.perpendicular();
        assert_eq!(perp, Vec2::new(-4.0, 3.0));
        assert!(v.dot(perp).abs() < EPSILON);
    }

    #[test]
    fn test_vec2_cross_variants() {
        let v = Vec2::new(1.0, 0.0);
        assert_eq!(v.cross(Vec2::new(0.0, 1.0)), 1.0);
        // v x s rotates clockwise, s x v counter-clockwise
        assert_eq!(v.cross_scalar(1.0), Vec2::new(0.0, -1.0));
        assert_eq!(Vec2::scalar_cross(1.0, v), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_vec2_min_max_abs() {
        let a = Vec2::new(-1.0, 5.0);
        let b = Vec2::new(2.0, -3.0);
        assert_eq!(a.min(b), Vec2::new(-1.0, -3.0));
        assert_eq!(a.max(b), Vec2::new(2.0, 5.0));
        assert_eq!(a.abs(), Vec2::new(1.0, 5.0));
    }

    #[test]
    fn test_vec3_cross() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
    }
}
