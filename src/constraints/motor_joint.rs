use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Mat22, Real, Rot, Scalar, Vec2};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, SolverData};

/// Motor joint definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    /// Position of body B minus the position of body A, in body A's frame.
    pub linear_offset: Vec2,
    /// Body B angle minus body A angle, in radians.
    pub angular_offset: Real,
    /// The maximum motor force in N.
    pub max_force: Real,
    /// The maximum motor torque in N-m.
    pub max_torque: Real,
    /// Position correction factor in the range [0,1].
    pub correction_factor: Real,
}

impl MotorJointDef {
    /// Initialize the bodies and offsets using the current transforms.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody) -> Self {
        MotorJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            linear_offset: body_a.local_point(body_b.position()),
            angular_offset: body_b.angle() - body_a.angle(),
            max_force: Real::ONE,
            max_torque: Real::ONE,
            correction_factor: Real::from_f32(0.3),
        }
    }
}

/// Controls the relative motion between two bodies. Typically used to drive
/// a dynamic body relative to the ground.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorJoint {
    base: JointBase,

    // Solver shared
    linear_offset: Vec2,
    angular_offset: Real,
    linear_impulse: Vec2,
    angular_impulse: Real,
    max_force: Real,
    max_torque: Real,
    correction_factor: Real,

    // Solver temp
    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: Real,
    linear_mass: Mat22,
    angular_mass: Real,
}

impl MotorJoint {
    pub(crate) fn new(def: &MotorJointDef) -> Self {
        MotorJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            linear_offset: def.linear_offset,
            angular_offset: def.angular_offset,
            linear_impulse: Vec2::ZERO,
            angular_impulse: Real::ZERO,
            max_force: def.max_force,
            max_torque: def.max_torque,
            correction_factor: def.correction_factor,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_error: Vec2::ZERO,
            angular_error: Real::ZERO,
            linear_mass: Mat22::ZERO,
            angular_mass: Real::ZERO,
        }
    }

    pub fn linear_offset(&self) -> Vec2 {
        self.linear_offset
    }

    /// Sets the target linear offset, in frame A, in meters.
    pub fn set_linear_offset(&mut self, offset: Vec2) {
        self.linear_offset = offset;
    }

    pub fn angular_offset(&self) -> Real {
        self.angular_offset
    }

    /// Sets the target angular offset, in radians.
    pub fn set_angular_offset(&mut self, offset: Real) {
        self.angular_offset = offset;
    }

    pub fn max_force(&self) -> Real {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: Real) {
        debug_assert!(force.is_valid() && force >= Real::ZERO);
        self.max_force = force;
    }

    pub fn max_torque(&self) -> Real {
        self.max_torque
    }

    pub fn set_max_torque(&mut self, torque: Real) {
        debug_assert!(torque.is_valid() && torque >= Real::ZERO);
        self.max_torque = torque;
    }

    pub fn correction_factor(&self) -> Real {
        self.correction_factor
    }

    pub fn set_correction_factor(&mut self, factor: Real) {
        debug_assert!(factor.is_valid() && (Real::ZERO..=Real::ONE).contains(&factor));
        self.correction_factor = factor;
    }
}

impl Constraint for MotorJoint {
    fn base(&self) -> &JointBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut JointBase {
        &mut self.base
    }

    fn init_velocity_constraints(&mut self, data: &mut SolverData<'_>, bodies: &Arena<RigidBody>) {
        self.base.prepare(bodies);
        let b = &self.base;
        let (ia, ib) = (b.index_a, b.index_b);
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        let c_a = data.positions[ia].c;
        let a_a = data.positions[ia].a;
        let mut v_a = data.velocities[ia].v;
        let mut w_a = data.velocities[ia].w;

        let c_b = data.positions[ib].c;
        let a_b = data.positions[ib].a;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        let (q_a, q_b) = (Rot::new(a_a), Rot::new(a_b));

        // Compute the effective mass matrix.
        self.r_a = q_a.apply(-b.local_center_a);
        self.r_b = q_b.apply(-b.local_center_b);
        let (r_a, r_b) = (self.r_a, self.r_b);

        let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
        let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
        let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;
        self.linear_mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        self.angular_mass = i_a + i_b;
        if self.angular_mass > Real::ZERO {
            self.angular_mass = Real::ONE / self.angular_mass;
        }

        self.linear_error = c_b + r_b - c_a - r_a - q_a.apply(self.linear_offset);
        self.angular_error = a_b - a_a - self.angular_offset;

        if data.step.warm_starting {
            // Scale impulses to support a variable time step.
            self.linear_impulse *= data.step.dt_ratio;
            self.angular_impulse *= data.step.dt_ratio;

            let p = self.linear_impulse;
            v_a -= p * m_a;
            w_a -= i_a * (r_a.cross(p) + self.angular_impulse);
            v_b += p * m_b;
            w_b += i_b * (r_b.cross(p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = Real::ZERO;
        }

        data.velocities[ia].v = v_a;
        data.velocities[ia].w = w_a;
        data.velocities[ib].v = v_b;
        data.velocities[ib].w = w_b;
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let b = &self.base;
        let (ia, ib) = (b.index_a, b.index_b);
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let (r_a, r_b) = (self.r_a, self.r_b);

        let mut v_a = data.velocities[ia].v;
        let mut w_a = data.velocities[ia].w;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        let h = data.step.dt;
        let inv_h = data.step.inv_dt;

        // Solve angular friction
        {
            let cdot = w_b - w_a + inv_h * self.correction_factor * self.angular_error;
            let mut impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old_impulse + impulse).clamp_to(-max_impulse, max_impulse);
            impulse = self.angular_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve linear friction
        {
            let cdot = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a)
                + self.linear_error * (inv_h * self.correction_factor);

            let mut impulse = -self.linear_mass.mul_vec(cdot);
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.magnitude_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize() * max_impulse;
            }

            impulse = self.linear_impulse - old_impulse;

            v_a -= impulse * m_a;
            w_a -= i_a * r_a.cross(impulse);
            v_b += impulse * m_b;
            w_b += i_b * r_b.cross(impulse);
        }

        data.velocities[ia].v = v_a;
        data.velocities[ia].w = w_a;
        data.velocities[ib].v = v_b;
        data.velocities[ib].w = w_b;
    }

    fn solve_position_constraints(&mut self, _data: &mut SolverData<'_>) -> bool {
        true
    }

    fn anchor_a(&self, body_a: &RigidBody) -> Vec2 {
        body_a.position()
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.position()
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        self.linear_impulse * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.angular_impulse
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("MotorJointDef");
        log::info!(target: DUMP_TARGET, "      linear_offset: {},", dump_vec(self.linear_offset));
        log::info!(target: DUMP_TARGET, "      angular_offset: {:.9e},", self.angular_offset);
        log::info!(target: DUMP_TARGET, "      max_force: {:.9e},", self.max_force);
        log::info!(target: DUMP_TARGET, "      max_torque: {:.9e},", self.max_torque);
        log::info!(target: DUMP_TARGET, "      correction_factor: {:.9e},", self.correction_factor);
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

    #[test]
    fn test_def_captures_current_offsets() {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::new(2.0, -1.0)));
        let def = MotorJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b]);
        assert_eq!(def.linear_offset, Vec2::new(2.0, -1.0));
        assert_eq!(def.angular_offset, 0.0);
        assert_eq!(def.correction_factor, 0.3);
    }

    #[test]
    fn test_at_offset_holds_still() {
        let mut rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::new(2.0, 0.0)));
        let mut def = MotorJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b]);
        def.max_force = 1000.0;
        def.max_torque = 1000.0;
        let mut joint = MotorJoint::new(&def);
        rig.velocities[1].v = Vec2::new(0.5, 0.5);
        rig.solve_velocity(&mut joint, 4);
        assert_abs_diff_eq!(rig.velocities[1].v.x, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(rig.velocities[1].v.y, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_drives_toward_offset() {
        let mut rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::ZERO));
        let mut def = MotorJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b]);
        def.max_force = 5000.0;
        def.max_torque = 5000.0;
        let mut joint = MotorJoint::new(&def);
        joint.set_linear_offset(Vec2::new(1.0, 0.0));
        joint.set_angular_offset(0.5);

        rig.solve_velocity(&mut joint, 4);
        // Velocity closes the correction_factor share of the error in one step.
        assert_abs_diff_eq!(rig.velocities[1].v.x, 60.0 * 0.3, epsilon = 1e-3);
        assert_abs_diff_eq!(rig.velocities[1].w, 60.0 * 0.3 * 0.5, epsilon = 1e-3);
    }
}
