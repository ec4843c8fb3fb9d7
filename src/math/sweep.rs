use super::scalar::{Real, Scalar, PI};
use super::transform::Transform;
use super::vec2::Vec2;

/// Motion of a body over one (sub-)step, used by continuous collision.
///
/// Shapes are defined relative to the body origin, which need not coincide with
/// the center of mass, so the sweep interpolates the center and shifts back by
/// `local_center` when producing a transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sweep {
    /// Center of mass in body coordinates.
    pub local_center: Vec2,
    /// World center at `alpha0`.
    pub c0: Vec2,
    /// World center at the end of the step.
    pub c: Vec2,
    /// World angle at `alpha0`.
    pub a0: Real,
    /// World angle at the end of the step.
    pub a: Real,
    /// Fraction of the current step in `[0, 1)` that `c0`/`a0` correspond to.
    pub alpha0: Real,
}

impl Sweep {
    /// Interpolated transform at `beta` in `[0, 1]`, where 0 means `alpha0`.
    pub fn get_transform(&self, beta: Real) -> Transform {
        let center = self.c0 * (Real::ONE - beta) + self.c * beta;
        let angle = (Real::ONE - beta) * self.a0 + beta * self.a;
        let mut xf = Transform::new(center, angle);
        xf.p -= xf.q.apply(self.local_center);
        xf
    }

    /// Moves the start of the sweep forward to `alpha`.
    pub fn advance(&mut self, alpha: Real) {
        debug_assert!(self.alpha0 < Real::ONE);
        let beta = (alpha - self.alpha0) / (Real::ONE - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wraps `a0` into `[0, 2pi)` and shifts `a` by the same amount.
    pub fn normalize(&mut self) {
        let two_pi = Real::TWO * PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn moving_sweep() -> Sweep {
        Sweep {
            local_center: Vec2::new(0.5, 0.0),
            c0: Vec2::new(0.0, 0.0),
            c: Vec2::new(4.0, 2.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        }
    }

    #[test]
    fn test_get_transform_end_points() {
        let sweep = moving_sweep();
        let start = sweep.get_transform(0.0);
        // Origin sits at center minus rotated local center.
        assert_abs_diff_eq!(start.p.x, -0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(start.p.y, 0.0, epsilon = 1e-6);

        let end = sweep.get_transform(1.0);
        let expected = Transform::new(Vec2::new(4.0, 2.0), 1.0);
        let shifted = expected.p - expected.q.apply(sweep.local_center);
        assert_abs_diff_eq!(end.p.x, shifted.x, epsilon = 1e-5);
        assert_abs_diff_eq!(end.p.y, shifted.y, epsilon = 1e-5);
        assert_abs_diff_eq!(end.q.angle(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_advance_then_transform_reproduces_state() {
        let mut sweep = moving_sweep();
        let mid = sweep.get_transform(0.25);
        sweep.advance(0.25);
        assert_eq!(sweep.alpha0, 0.25);
        let after = sweep.get_transform(0.0);
        assert_abs_diff_eq!(after.p.x, mid.p.x, epsilon = 1e-5);
        assert_abs_diff_eq!(after.p.y, mid.p.y, epsilon = 1e-5);
        assert_abs_diff_eq!(after.q.angle(), mid.q.angle(), epsilon = 1e-5);

        // The end of the sweep is unchanged by advancing.
        let end = sweep.get_transform(1.0);
        let original_end = moving_sweep().get_transform(1.0);
        assert_abs_diff_eq!(end.p.x, original_end.p.x, epsilon = 1e-5);
        assert_abs_diff_eq!(end.p.y, original_end.p.y, epsilon = 1e-5);
    }

    #[test]
    fn test_normalize_wraps_both_angles() {
        let mut sweep = Sweep {
            a0: 7.0,
            a: 7.5,
            ..Sweep::default()
        };
        sweep.normalize();
        assert!(sweep.a0 >= 0.0 && sweep.a0 < 2.0 * PI);
        assert_abs_diff_eq!(sweep.a - sweep.a0, 0.5, epsilon = 1e-5);
    }
}
