use super::rotation::Rot;
use super::scalar::Real;
use super::vec2::Vec2;

/// A rigid frame: translation `p` and rotation `q`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    /// Creates a new transform from a position and an angle in radians.
    pub fn new(position: Vec2, angle: Real) -> Self {
        Self {
            p: position,
            q: Rot::new(angle),
        }
    }

    /// Creates an identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self {
            p: Vec2::ZERO,
            q: Rot::IDENTITY,
        }
    }

    /// Sets position and angle.
    pub fn set(&mut self, position: Vec2, angle: Real) {
        self.p = position;
        self.q.set(angle);
    }

    /// Applies the transform (rotation then translation) to a point.
    #[inline]
    pub fn apply(self, point: Vec2) -> Vec2 {
        self.q.apply(point) + self.p
    }

    /// Applies the inverse transform (inverse translation then inverse rotation) to a point.
    #[inline]
    pub fn apply_inverse(self, point: Vec2) -> Vec2 {
        self.q.apply_inverse(point - self.p)
    }

    /// Composition `self * other`: maps `other`'s frame into this frame's parent.
    pub fn mul(self, other: Transform) -> Transform {
        Transform {
            p: self.q.apply(other.p) + self.p,
            q: self.q.mul(other.q),
        }
    }

    /// Composition `inverse(self) * other`: expresses `other` relative to `self`.
    pub fn mul_t(self, other: Transform) -> Transform {
        Transform {
            p: self.q.apply_inverse(other.p - self.p),
            q: self.q.mul_t(other.q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::scalar::PI;
    const EPSILON: Real = 1e-5;

    #[test]
    fn test_transform_identity() {
        let t = Transform::identity();
        let p = Vec2::new(5.0, -3.0);
        assert_eq!(t.apply(p), p);
        assert_eq!(t.apply_inverse(p), p);
    }

    #[test]
    fn test_transform_apply_translation() {
        let t = Transform::new(Vec2::new(10.0, 5.0), 0.0);
        let tp = t.apply(Vec2::new(1.0, 2.0));
        assert!((tp.x - 11.0).abs() < EPSILON);
        assert!((tp.y - 7.0).abs() < EPSILON);
    }

    #[test]
    fn test_transform_apply_combined() {
        // Rotation of (1,0) -> (0,1), then translation to (10, 6)
        let t = Transform::new(Vec2::new(10.0, 5.0), PI / 2.0);
        let tp = t.apply(Vec2::new(1.0, 0.0));
        assert!((tp.x - 10.0).abs() < EPSILON);
        assert!((tp.y - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_transform_apply_inverse_combined() {
        let t = Transform::new(Vec2::new(10.0, 5.0), PI / 4.0);
        let p_local = Vec2::new(1.0, 1.0);
        let p_local_again = t.apply_inverse(t.apply(p_local));
        assert!((p_local_again.x - p_local.x).abs() < EPSILON);
        assert!((p_local_again.y - p_local.y).abs() < EPSILON);
    }

    #[test]
    fn test_transform_mul_t_is_relative_frame() {
        let a = Transform::new(Vec2::new(1.0, 2.0), 0.5);
        let b = Transform::new(Vec2::new(-3.0, 4.0), -0.25);
        let rel = a.mul_t(b);
        let point = Vec2::new(0.3, -0.7);
        let via_rel = a.apply(rel.apply(point));
        let direct = b.apply(point);
        assert!((via_rel.x - direct.x).abs() < EPSILON);
        assert!((via_rel.y - direct.y).abs() < EPSILON);
        assert!((a.mul(rel).q.angle() - b.q.angle()).abs() < EPSILON);
    }
}
