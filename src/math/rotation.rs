use super::scalar::{Real, Scalar};
use super::vec2::Vec2;

/// A rotation stored as its sine and cosine so repeated use avoids trigonometry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rot {
    pub s: Real,
    pub c: Real,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Rot = Rot { s: Real::ZERO, c: Real::ONE };

    /// Creates a rotation from an angle in radians.
    pub fn new(angle: Real) -> Self {
        Self {
            s: angle.sin(),
            c: angle.cos(),
        }
    }

    /// Resets to the given angle in radians.
    pub fn set(&mut self, angle: Real) {
        self.s = angle.sin();
        self.c = angle.cos();
    }

    /// The angle in radians, in `(-pi, pi]`.
    pub fn angle(self) -> Real {
        self.s.atan2(self.c)
    }

    pub fn x_axis(self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    pub fn y_axis(self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotates a vector.
    #[inline]
    pub fn apply(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotates a vector.
    #[inline]
    pub fn apply_inverse(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Composition `self * other`.
    pub fn mul(self, other: Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// Composition `transpose(self) * other`.
    pub fn mul_t(self, other: Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}
