//! The numeric contract every algorithm in the crate is written against.
//!
//! The concrete type is picked at build time through [`Real`]: `f32` by default,
//! `f64` with the `f64` cargo feature. Any deterministic replacement (e.g. a
//! fixed-point type) has to provide the same operations.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Arithmetic, comparison, square root, trigonometry and limits.
pub trait Scalar:
    Copy
    + Debug
    + Default
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    const ZERO: Self;
    const ONE: Self;
    const HALF: Self;
    const TWO: Self;
    /// Smallest value such that `1 + EPSILON != 1`.
    const EPSILON: Self;
    /// Largest finite value.
    const MAX: Self;
    const PI: Self;

    /// Converts a tuning constant into this scalar type.
    fn from_f32(value: f32) -> Self;
    fn sqrt(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn atan2(self, x: Self) -> Self;
    fn abs(self) -> Self;
    fn floor(self) -> Self;
    fn min(self, other: Self) -> Self;
    fn max(self, other: Self) -> Self;
    /// Neither infinite nor NaN.
    fn is_valid(self) -> bool;

    /// Clamps `self` into `[low, high]`.
    fn clamp_to(self, low: Self, high: Self) -> Self {
        self.max(low).min(high)
    }
}

macro_rules! impl_scalar_for_float {
    ($t:ident) => {
        impl Scalar for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const HALF: Self = 0.5;
            const TWO: Self = 2.0;
            const EPSILON: Self = $t::EPSILON;
            const MAX: Self = $t::MAX;
            const PI: Self = std::$t::consts::PI;

            #[inline]
            fn from_f32(value: f32) -> Self {
                value as $t
            }
            #[inline]
            fn sqrt(self) -> Self {
                $t::sqrt(self)
            }
            #[inline]
            fn sin(self) -> Self {
                $t::sin(self)
            }
            #[inline]
            fn cos(self) -> Self {
                $t::cos(self)
            }
            #[inline]
            fn atan2(self, x: Self) -> Self {
                $t::atan2(self, x)
            }
            #[inline]
            fn abs(self) -> Self {
                $t::abs(self)
            }
            #[inline]
            fn floor(self) -> Self {
                $t::floor(self)
            }
            #[inline]
            fn min(self, other: Self) -> Self {
                $t::min(self, other)
            }
            #[inline]
            fn max(self, other: Self) -> Self {
                $t::max(self, other)
            }
            #[inline]
            fn is_valid(self) -> bool {
                self.is_finite()
            }
        }
    };
}

impl_scalar_for_float!(f32);
impl_scalar_for_float!(f64);

/// The scalar type used throughout the engine.
#[cfg(not(feature = "f64"))]
pub type Real = f32;

/// The scalar type used throughout the engine.
#[cfg(feature = "f64")]
pub type Real = f64;

pub const PI: Real = <Real as Scalar>::PI;

#[cfg(test)]
mod tests {
    use super::*;

    fn hypot<S: Scalar>(a: S, b: S) -> S {
        (a * a + b * b).sqrt()
    }

    #[test]
    fn test_contract_is_usable_generically() {
        assert!((hypot(3.0f32, 4.0) - 5.0).abs() < 1e-6);
        assert!((hypot(3.0f64, 4.0) - 5.0).abs() < 1e-12);
    }

    fn lerp<S: Scalar>(a: S, b: S, t: S) -> S {
        (S::ONE - t) * a + t * b
    }

    #[test]
    fn test_named_constants() {
        assert_eq!(Real::HALF * Real::TWO, Real::ONE);
        assert_eq!(Real::from_f32(0.25), 0.25);
        assert_eq!(lerp(2.0f32, 4.0, f32::HALF), 3.0);
        assert_eq!(lerp(2.0f64, 4.0, f64::HALF), 3.0);
    }

    #[test]
    fn test_clamp_to() {
        assert_eq!(Scalar::clamp_to(2.0 as Real, 0.0, 1.0), 1.0);
        assert_eq!(Scalar::clamp_to(-2.0 as Real, 0.0, 1.0), 0.0);
        assert_eq!(Scalar::clamp_to(0.5 as Real, 0.0, 1.0), 0.5);
    }

    #[test]
    fn test_is_valid() {
        assert!(Scalar::is_valid(1.0 as Real));
        assert!(!Scalar::is_valid(Real::INFINITY));
        assert!(!Scalar::is_valid(Real::NAN));
    }
}
