use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Mat22, Real, Rot, Scalar, Vec2, PI};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, SolverData};

/// Mouse joint definition. Body A is usually ground and only used for
/// bookkeeping; the target point starts on body B.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The initial world target point.
    pub target: Vec2,
    /// Maximum constraint force, usually some multiple of the body weight.
    pub max_force: Real,
    /// Response speed in Hertz.
    pub frequency_hz: Real,
    /// Damping ratio. 0 = no damping, 1 = critical damping.
    pub damping_ratio: Real,
}

impl MouseJointDef {
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, target: Vec2) -> Self {
        MouseJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            target,
            max_force: Real::ZERO,
            frequency_hz: Real::from_f32(5.0),
            damping_ratio: Real::from_f32(0.7),
        }
    }
}

/// Makes a point on a body track a world target with a soft constraint. The
/// maximum force keeps the reaction believable when the target is far away.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseJoint {
    base: JointBase,
    local_anchor_b: Vec2,
    target_a: Vec2,
    frequency_hz: Real,
    damping_ratio: Real,
    beta: Real,

    // Solver shared
    impulse: Vec2,
    max_force: Real,
    gamma: Real,

    // Solver temp
    r_b: Vec2,
    mass: Mat22,
    c: Vec2,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef, body_b: &RigidBody) -> Self {
        debug_assert!(def.target.is_valid());
        debug_assert!(def.max_force >= Real::ZERO && def.frequency_hz >= Real::ZERO && def.damping_ratio >= Real::ZERO);
        MouseJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            local_anchor_b: body_b.xf.apply_inverse(def.target),
            target_a: def.target,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            beta: Real::ZERO,
            impulse: Vec2::ZERO,
            max_force: def.max_force,
            gamma: Real::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat22::ZERO,
            c: Vec2::ZERO,
        }
    }

    pub fn target(&self) -> Vec2 {
        self.target_a
    }

    /// Moves the target. The world wakes body B when this is called through
    /// `PhysicsWorld::joint_mut`.
    pub fn set_target(&mut self, target: Vec2) {
        self.target_a = target;
    }

    pub fn max_force(&self) -> Real {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: Real) {
        self.max_force = force;
    }

    pub fn frequency(&self) -> Real {
        self.frequency_hz
    }

    pub fn set_frequency(&mut self, hz: Real) {
        self.frequency_hz = hz;
    }

    pub fn damping_ratio(&self) -> Real {
        self.damping_ratio
    }

    pub fn set_damping_ratio(&mut self, ratio: Real) {
        self.damping_ratio = ratio;
    }

    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.target_a -= new_origin;
    }
}

impl Constraint for MouseJoint {
    fn base(&self) -> &JointBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut JointBase {
        &mut self.base
    }

    fn init_velocity_constraints(&mut self, data: &mut SolverData<'_>, bodies: &Arena<RigidBody>) {
        self.base.prepare(bodies);
        let mass = bodies.get(self.base.body_b).map_or(Real::ZERO, |body| body.mass);
        let b = &self.base;
        let ib = b.index_b;

        let c_b = data.positions[ib].c;
        let a_b = data.positions[ib].a;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        let q_b = Rot::new(a_b);
        let (m_b, i_b) = (b.inv_mass_b, b.inv_i_b);

        // Frequency
        let omega = Real::TWO * PI * self.frequency_hz;

        // Damping coefficient
        let d = Real::TWO * mass * self.damping_ratio * omega;

        // Spring stiffness
        let k = mass * (omega * omega);

        // magic formulas
        // gamma has units of inverse mass.
        // beta has units of inverse time.
        let h = data.step.dt;
        debug_assert!(d + h * k > Real::EPSILON);
        self.gamma = h * (d + h * k);
        if self.gamma != Real::ZERO {
            self.gamma = Real::ONE / self.gamma;
        }
        self.beta = h * k * self.gamma;

        // Compute the effective mass matrix.
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center_b);

        // K    = [(1/m1 + 1/m2) * eye(2) - skew(r1) * invI1 * skew(r1) - skew(r2) * invI2 * skew(r2)]
        //      = [1/m1+1/m2     0    ] + invI1 * [r1.y*r1.y -r1.x*r1.y] + invI2 * [r1.y*r1.y -r1.x*r1.y]
        //        [    0     1/m1+1/m2]           [-r1.x*r1.y r1.x*r1.x]           [-r1.x*r1.y r1.x*r1.x]
        let r_b = self.r_b;
        let k11 = m_b + i_b * r_b.y * r_b.y + self.gamma;
        let k12 = -i_b * r_b.x * r_b.y;
        let k22 = m_b + i_b * r_b.x * r_b.x + self.gamma;
        self.mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        self.c = (c_b + self.r_b - self.target_a) * self.beta;

        // Cheat with some damping
        w_b *= Real::from_f32(0.98);

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            v_b += self.impulse * m_b;
            w_b += i_b * self.r_b.cross(self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }

        data.velocities[ib].v = v_b;
        data.velocities[ib].w = w_b;
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let b = &self.base;
        let ib = b.index_b;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        // Cdot = v + cross(w, r)
        let cdot = v_b + Vec2::scalar_cross(w_b, self.r_b);
        let mut impulse = self.mass.mul_vec(-(cdot + self.c + self.impulse * self.gamma));

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.magnitude_squared() > max_impulse * max_impulse {
            self.impulse = self.impulse * (max_impulse / self.impulse.magnitude());
        }
        impulse = self.impulse - old_impulse;

        v_b += impulse * b.inv_mass_b;
        w_b += b.inv_i_b * self.r_b.cross(impulse);

        data.velocities[ib].v = v_b;
        data.velocities[ib].w = w_b;
    }

    fn solve_position_constraints(&mut self, _data: &mut SolverData<'_>) -> bool {
        true
    }

    fn anchor_a(&self, _body_a: &RigidBody) -> Vec2 {
        self.target_a
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.world_point(self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        self.impulse * inv_dt
    }

    fn reaction_torque(&self, _inv_dt: Real) -> Real {
        Real::ZERO
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("MouseJointDef");
        log::info!(target: DUMP_TARGET, "      target: {},", dump_vec(self.target_a));
        log::info!(target: DUMP_TARGET, "      max_force: {:.9e},", self.max_force);
        log::info!(target: DUMP_TARGET, "      frequency_hz: {:.9e},", self.frequency_hz);
        log::info!(target: DUMP_TARGET, "      damping_ratio: {:.9e},", self.damping_ratio);
        self.base.dump_end(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::Rig;
    use crate::objects::BodyDef;
    use approx::assert_abs_diff_eq;

    const EPSILON: Real = 1e-4;

    fn drag(target: Vec2, max_force: Real) -> (Rig, MouseJoint) {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::ZERO));
        let mut def = MouseJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::ZERO);
        def.max_force = max_force;
        let mut joint = MouseJoint::new(&def, &rig.bodies[rig.b]);
        joint.set_target(target);
        (rig, joint)
    }

    #[test]
    fn test_defaults() {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::new(1.0, 1.0)));
        let def = MouseJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::new(1.5, 1.0));
        assert_eq!(def.frequency_hz, 5.0);
        assert_eq!(def.damping_ratio, 0.7);
        let joint = MouseJoint::new(&def, &rig.bodies[rig.b]);
        assert_eq!(joint.local_anchor_b, Vec2::new(0.5, 0.0));
        assert_eq!(joint.anchor_a(&rig.bodies[rig.a]), Vec2::new(1.5, 1.0));
    }

    #[test]
    fn test_pulls_toward_target() {
        let (mut rig, mut joint) = drag(Vec2::new(1.0, 0.0), 1000.0);
        rig.solve_velocity(&mut joint, 8);
        let v = rig.velocities[1].v;
        assert!(v.x > 0.0);
        assert_abs_diff_eq!(v.y, 0.0, epsilon = EPSILON);
        assert!(rig.solve_position(&mut joint, 1));
    }

    #[test]
    fn test_impulse_is_clamped_by_max_force() {
        let (mut rig, mut joint) = drag(Vec2::new(100.0, 0.0), 6.0);
        rig.solve_velocity(&mut joint, 8);
        let max_impulse = Rig::step().dt * 6.0;
        assert_abs_diff_eq!(rig.velocities[1].v.x, max_impulse, epsilon = EPSILON);
        assert_abs_diff_eq!(joint.reaction_force(60.0).x, 6.0, epsilon = 1e-3);
    }
}
