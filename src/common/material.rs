//! Defines physical material properties.

use crate::math::{Real, Scalar};

/// Surface and bulk properties of a fixture.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    /// Coefficient of restitution (bounciness), usually in [0, 1].
    /// 0 = perfectly inelastic (no bounce), 1 = perfectly elastic.
    pub restitution: Real,
    /// Coefficient of friction, usually in [0, 1].
    pub friction: Real,
    /// Density in kg/m^2. Zero density gives a fixture no mass.
    pub density: Real,
}

impl Material {
    /// Creates a new material with the given restitution, friction and density.
    pub fn new(restitution: Real, friction: Real, density: Real) -> Self {
        Material {
            restitution: restitution.max(Real::ZERO),
            friction: friction.max(Real::ZERO),
            density: density.max(Real::ZERO),
        }
    }
}

impl Default for Material {
    /// No bounce, light friction, massless.
    fn default() -> Self {
        Material {
            restitution: Real::ZERO,
            friction: Real::from_f32(0.2),
            density: Real::ZERO,
        }
    }
}

/// Friction mixing law: the geometric mean, so a slippery surface dominates.
pub fn mix_friction(friction_a: Real, friction_b: Real) -> Real {
    (friction_a * friction_b).sqrt()
}

/// Restitution mixing law: anything bouncing on anything else bounces.
pub fn mix_restitution(restitution_a: Real, restitution_b: Real) -> Real {
    restitution_a.max(restitution_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_new_clamps_negative() {
        let m = Material::new(-1.0, -0.5, -3.0);
        assert_eq!(m.restitution, 0.0);
        assert_eq!(m.friction, 0.0);
        assert_eq!(m.density, 0.0);
    }

    #[test]
    fn test_mixing() {
        assert!((mix_friction(0.4, 0.9) - 0.6).abs() < 1e-6);
        assert_eq!(mix_friction(0.0, 1.0), 0.0);
        assert_eq!(mix_restitution(0.1, 0.7), 0.7);
    }
}
