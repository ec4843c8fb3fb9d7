use crate::common::settings::{MAX_ROTATION, MAX_ROTATION_SQUARED, MAX_TRANSLATION, MAX_TRANSLATION_SQUARED};
use crate::constraints::{Position, Velocity};
use crate::math::{Real, Scalar, Vec2};
use crate::objects::{BodyType, RigidBody};

/// Integrates the velocity of one island body using Semi-Implicit Euler.
///
/// Gravity (scaled by the body's gravity scale) and the accumulated force and
/// torque are applied first, then damping. Only dynamic bodies respond to
/// forces; kinematic velocities are left as set by the user.
pub fn integrate_velocity(body: &RigidBody, velocity: &mut Velocity, gravity: Vec2, h: Real) {
    if body.body_type != BodyType::Dynamic {
        return;
    }

    // --- Linear Motion --- //
    // v = v + h * (g * scale + F / m)
    velocity.v += (gravity * body.gravity_scale + body.force * body.inv_mass) * h;

    // --- Angular Motion --- //
    // w = w + h * T / I
    velocity.w += h * body.inv_inertia * body.torque;

    // Apply damping.
    // ODE: dv/dt + c * v = 0
    // Solution: v(t) = v0 * exp(-c * t)
    // Time step: v(t + dt) = v0 * exp(-c * (t + dt)) = v0 * exp(-c * t) * exp(-c * dt) = v * exp(-c * dt)
    // v2 = exp(-c * dt) * v1
    // Pade approximation:
    // v2 = v1 * 1 / (1 + c * dt)
    velocity.v *= Real::ONE / (Real::ONE + h * body.linear_damping);
    velocity.w *= Real::ONE / (Real::ONE + h * body.angular_damping);
}

/// Advances a solver position by its velocity, clamping motion that would
/// exceed `MAX_TRANSLATION` or `MAX_ROTATION` in one step.
pub fn integrate_position(position: &mut Position, velocity: &mut Velocity, h: Real) {
    let translation = velocity.v * h;
    if translation.dot(translation) > MAX_TRANSLATION_SQUARED {
        let ratio = MAX_TRANSLATION / translation.magnitude();
        velocity.v *= ratio;
    }

    let rotation = h * velocity.w;
    if rotation * rotation > MAX_ROTATION_SQUARED {
        let ratio = MAX_ROTATION / rotation.abs();
        velocity.w *= ratio;
    }

    // Integrate
    position.c += velocity.v * h;
    position.a += h * velocity.w;
}
