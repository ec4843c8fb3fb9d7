use crate::common::settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION};
use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Mat22, Mat33, Real, Rot, Scalar, Vec2, Vec3};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, LimitState, SolverData};

/// Revolute joint definition. This requires defining an anchor point where
/// the bodies are joined. Local anchors let the initial configuration
/// violate the constraint slightly.
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The local anchor point relative to body A's origin.
    pub local_anchor_a: Vec2,
    /// The local anchor point relative to body B's origin.
    pub local_anchor_b: Vec2,
    /// Body B angle minus body A angle in the reference state (radians).
    pub reference_angle: Real,
    pub enable_limit: bool,
    pub lower_angle: Real,
    pub upper_angle: Real,
    pub enable_motor: bool,
    /// Desired motor speed in radians per second.
    pub motor_speed: Real,
    /// Maximum motor torque used to achieve the desired motor speed, in N*m.
    pub max_motor_torque: Real,
}

impl RevoluteJointDef {
    /// Initialize the bodies, anchors, and reference angle using a world anchor point.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor: Vec2) -> Self {
        RevoluteJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            reference_angle: body_b.angle() - body_a.angle(),
            enable_limit: false,
            lower_angle: Real::ZERO,
            upper_angle: Real::ZERO,
            enable_motor: false,
            motor_speed: Real::ZERO,
            max_motor_torque: Real::ZERO,
        }
    }
}

/// A revolute joint constrains two bodies to share a common point while they
/// are free to rotate about the point. The relative rotation about the shared
/// point is the joint angle. Optionally limited and motorised.
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    base: JointBase,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    reference_angle: Real,

    // Solver shared
    impulse: Vec3,
    motor_impulse: Real,
    enable_motor: bool,
    max_motor_torque: Real,
    motor_speed: Real,
    enable_limit: bool,
    lower_angle: Real,
    upper_angle: Real,

    // Solver temp
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
    motor_mass: Real,
    limit_state: LimitState,
}

impl RevoluteJoint {
    pub(crate) fn new(def: &RevoluteJointDef) -> Self {
        RevoluteJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            impulse: Vec3::ZERO,
            motor_impulse: Real::ZERO,
            enable_motor: def.enable_motor,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat33::ZERO,
            motor_mass: Real::ZERO,
            limit_state: LimitState::Inactive,
        }
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn reference_angle(&self) -> Real {
        self.reference_angle
    }

    /// Current joint angle in radians.
    pub fn joint_angle(&self, body_a: &RigidBody, body_b: &RigidBody) -> Real {
        body_b.sweep.a - body_a.sweep.a - self.reference_angle
    }

    /// Current joint angular speed in radians per second.
    pub fn joint_speed(&self, body_a: &RigidBody, body_b: &RigidBody) -> Real {
        body_b.angular_velocity - body_a.angular_velocity
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.impulse.z = Real::ZERO;
        }
    }

    pub fn lower_limit(&self) -> Real {
        self.lower_angle
    }

    pub fn upper_limit(&self) -> Real {
        self.upper_angle
    }

    pub fn set_limits(&mut self, lower: Real, upper: Real) {
        debug_assert!(lower <= upper);
        if lower != self.lower_angle || upper != self.upper_angle {
            self.impulse.z = Real::ZERO;
            self.lower_angle = lower;
            self.upper_angle = upper;
        }
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    pub fn motor_speed(&self) -> Real {
        self.motor_speed
    }

    pub fn set_motor_speed(&mut self, speed: Real) {
        self.motor_speed = speed;
    }

    pub fn max_motor_torque(&self) -> Real {
        self.max_motor_torque
    }

    pub fn set_max_motor_torque(&mut self, torque: Real) {
        self.max_motor_torque = torque;
    }

    /// Current motor torque given the inverse time step, in N*m.
    pub fn motor_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.motor_impulse
    }
}

impl Constraint for RevoluteJoint {
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

        let a_a = data.positions[ia].a;
        let mut v_a = data.velocities[ia].v;
        let mut w_a = data.velocities[ia].w;
        let a_b = data.positions[ib].a;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        let (q_a, q_b) = (Rot::new(a_a), Rot::new(a_b));
        self.r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let (r_a, r_b) = (self.r_a, self.r_b);

        // J = [-I -r1_skew I r2_skew]
        //     [ 0       -1 0       1]
        // r_skew = [-ry; rx]
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let fixed_rotation = i_a + i_b == Real::ZERO;

        self.mass.ex.x = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        self.mass.ey.x = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        self.mass.ez.x = -r_a.y * i_a - r_b.y * i_b;
        self.mass.ex.y = self.mass.ey.x;
        self.mass.ey.y = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        self.mass.ez.y = r_a.x * i_a + r_b.x * i_b;
        self.mass.ex.z = self.mass.ez.x;
        self.mass.ey.z = self.mass.ez.y;
        self.mass.ez.z = i_a + i_b;

        self.motor_mass = i_a + i_b;
        if self.motor_mass > Real::ZERO {
            self.motor_mass = Real::ONE / self.motor_mass;
        }

        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = Real::ZERO;
        }

        if self.enable_limit && !fixed_rotation {
            let joint_angle = a_b - a_a - self.reference_angle;
            if (self.upper_angle - self.lower_angle).abs() < Real::TWO * ANGULAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_angle <= self.lower_angle {
                if self.limit_state != LimitState::AtLower {
                    self.impulse.z = Real::ZERO;
                }
                self.limit_state = LimitState::AtLower;
            } else if joint_angle >= self.upper_angle {
                if self.limit_state != LimitState::AtUpper {
                    self.impulse.z = Real::ZERO;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = Real::ZERO;
            }
        } else {
            self.limit_state = LimitState::Inactive;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step.
            self.impulse = self.impulse * data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let p = Vec2::new(self.impulse.x, self.impulse.y);
            v_a -= p * m_a;
            w_a -= i_a * (r_a.cross(p) + self.motor_impulse + self.impulse.z);
            v_b += p * m_b;
            w_b += i_b * (r_b.cross(p) + self.motor_impulse + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
            self.motor_impulse = Real::ZERO;
        }

        data.velocities[ia].v = v_a;
        data.velocities[ia].w = w_a;
        data.velocities[ib].v = v_b;
        data.velocities[ib].w = w_b;
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let b = &self.base;
        let (ia, ib) = (b.index_a, b.index_b);
        let mut v_a = data.velocities[ia].v;
        let mut w_a = data.velocities[ia].w;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);
        let (r_a, r_b) = (self.r_a, self.r_b);
        let fixed_rotation = i_a + i_b == Real::ZERO;

        // Solve motor constraint.
        if self.enable_motor && self.limit_state != LimitState::Equal && !fixed_rotation {
            let cdot = w_b - w_a - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp_to(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve limit constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let cdot1 = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let mut impulse = -self.mass.solve33(cdot);

            match self.limit_state {
                LimitState::Equal => {
                    self.impulse += impulse;
                }
                LimitState::AtLower | LimitState::AtUpper => {
                    let new_impulse = self.impulse.z + impulse.z;
                    let violated = if self.limit_state == LimitState::AtLower {
                        new_impulse < Real::ZERO
                    } else {
                        new_impulse > Real::ZERO
                    };
                    if violated {
                        let rhs = -cdot1 + Vec2::new(self.mass.ez.x, self.mass.ez.y) * self.impulse.z;
                        let reduced = self.mass.solve22(rhs);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = Real::ZERO;
                    } else {
                        self.impulse += impulse;
                    }
                }
                LimitState::Inactive => {}
            }

            let p = Vec2::new(impulse.x, impulse.y);
            v_a -= p * m_a;
            w_a -= i_a * (r_a.cross(p) + impulse.z);
            v_b += p * m_b;
            w_b += i_b * (r_b.cross(p) + impulse.z);
        } else {
            // Solve point to point constraint
            let cdot = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);
            let impulse = self.mass.solve22(-cdot);

            self.impulse.x += impulse.x;
            self.impulse.y += impulse.y;

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

    fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool {
        let b = &self.base;
        let (ia, ib) = (b.index_a, b.index_b);
        let mut c_a = data.positions[ia].c;
        let mut a_a = data.positions[ia].a;
        let mut c_b = data.positions[ib].c;
        let mut a_b = data.positions[ib].a;

        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        let mut angular_error = Real::ZERO;
        let fixed_rotation = i_a + i_b == Real::ZERO;

        // Solve angular limit constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let angle = a_b - a_a - self.reference_angle;
            let mut limit_impulse = Real::ZERO;

            match self.limit_state {
                LimitState::Equal => {
                    // Prevent large angular corrections
                    let c = (angle - self.lower_angle).clamp_to(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
                    limit_impulse = -self.motor_mass * c;
                    angular_error = c.abs();
                }
                LimitState::AtLower => {
                    let c = angle - self.lower_angle;
                    angular_error = -c;
                    // Prevent large angular corrections and allow some slop.
                    let c = (c + ANGULAR_SLOP).clamp_to(-MAX_ANGULAR_CORRECTION, Real::ZERO);
                    limit_impulse = -self.motor_mass * c;
                }
                LimitState::AtUpper => {
                    let c = angle - self.upper_angle;
                    angular_error = c;
                    let c = (c - ANGULAR_SLOP).clamp_to(Real::ZERO, MAX_ANGULAR_CORRECTION);
                    limit_impulse = -self.motor_mass * c;
                }
                LimitState::Inactive => {}
            }

            a_a -= i_a * limit_impulse;
            a_b += i_b * limit_impulse;
        }

        // Solve point to point constraint.
        let position_error;
        {
            let (q_a, q_b) = (Rot::new(a_a), Rot::new(a_b));
            let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
            let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);

            let c = c_b + r_b - c_a - r_a;
            position_error = c.magnitude();

            let mut k = Mat22::ZERO;
            k.ex.x = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
            k.ex.y = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
            k.ey.x = k.ex.y;
            k.ey.y = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;

            let impulse = -k.solve(c);

            c_a -= impulse * m_a;
            a_a -= i_a * r_a.cross(impulse);
            c_b += impulse * m_b;
            a_b += i_b * r_b.cross(impulse);
        }

        data.positions[ia].c = c_a;
        data.positions[ia].a = a_a;
        data.positions[ib].c = c_b;
        data.positions[ib].a = a_b;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    fn anchor_a(&self, body_a: &RigidBody) -> Vec2 {
        body_a.world_point(self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.world_point(self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        Vec2::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.impulse.z
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("RevoluteJointDef");
        log::info!(target: DUMP_TARGET, "      local_anchor_a: {},", dump_vec(self.local_anchor_a));
        log::info!(target: DUMP_TARGET, "      local_anchor_b: {},", dump_vec(self.local_anchor_b));
        log::info!(target: DUMP_TARGET, "      reference_angle: {:.9e},", self.reference_angle);
        log::info!(target: DUMP_TARGET, "      enable_limit: {},", self.enable_limit);
        log::info!(target: DUMP_TARGET, "      lower_angle: {:.9e},", self.lower_angle);
        log::info!(target: DUMP_TARGET, "      upper_angle: {:.9e},", self.upper_angle);
        log::info!(target: DUMP_TARGET, "      enable_motor: {},", self.enable_motor);
        log::info!(target: DUMP_TARGET, "      motor_speed: {:.9e},", self.motor_speed);
        log::info!(target: DUMP_TARGET, "      max_motor_torque: {:.9e},", self.max_motor_torque);
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

    fn pinned_pair() -> (Rig, RevoluteJoint) {
        let rig = Rig::new(&BodyDef::dynamic(Vec2::new(0.0, 0.0)), &BodyDef::dynamic(Vec2::new(2.0, 0.0)));
        let def = RevoluteJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::new(1.0, 0.0));
        (rig, RevoluteJoint::new(&def))
    }

    #[test]
    fn test_revolute_joint_new() {
        let (rig, joint) = pinned_pair();
        assert_eq!(joint.base().body_a(), rig.a);
        assert_eq!(joint.base().body_b(), rig.b);
        assert_eq!(joint.local_anchor_a(), Vec2::new(1.0, 0.0));
        assert_eq!(joint.local_anchor_b(), Vec2::new(-1.0, 0.0));
        assert_eq!(joint.reference_angle(), 0.0);
    }

    #[test]
    fn test_velocity_solve_removes_relative_anchor_velocity() {
        let (mut rig, mut joint) = pinned_pair();
        rig.velocities[0].v = Vec2::new(0.0, 1.0);
        rig.velocities[1].v = Vec2::new(0.0, -1.0);
        rig.solve_velocity(&mut joint, 10);

        let (va, wa) = (rig.velocities[0].v, rig.velocities[0].w);
        let (vb, wb) = (rig.velocities[1].v, rig.velocities[1].w);
        let anchor_va = va + Vec2::scalar_cross(wa, Vec2::new(1.0, 0.0));
        let anchor_vb = vb + Vec2::scalar_cross(wb, Vec2::new(-1.0, 0.0));
        assert_abs_diff_eq!(anchor_va.x, anchor_vb.x, epsilon = EPSILON);
        assert_abs_diff_eq!(anchor_va.y, anchor_vb.y, epsilon = EPSILON);
        // Equal and opposite momenta stay balanced.
        assert_abs_diff_eq!(va.y + vb.y, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_position_solve_closes_gap() {
        let (mut rig, mut joint) = pinned_pair();
        rig.positions[1].c = Vec2::new(3.0, 0.5);
        rig.solve_velocity(&mut joint, 1);
        assert!(rig.solve_position(&mut joint, 20));

        let anchor_a = rig.positions[0].c + Rot::new(rig.positions[0].a).apply(Vec2::new(1.0, 0.0));
        let anchor_b = rig.positions[1].c + Rot::new(rig.positions[1].a).apply(Vec2::new(-1.0, 0.0));
        assert!(anchor_a.distance(anchor_b) <= LINEAR_SLOP);
    }

    #[test]
    fn test_motor_respects_max_torque() {
        let (mut rig, mut joint) = pinned_pair();
        joint.enable_motor(true);
        joint.set_motor_speed(10.0);
        joint.set_max_motor_torque(6.0);
        rig.solve_velocity(&mut joint, 8);

        let max_impulse = Rig::step().dt * 6.0;
        assert!(joint.motor_impulse.abs() <= max_impulse + 1e-6);
        assert_abs_diff_eq!(joint.motor_torque(60.0), 6.0, epsilon = 1e-3);
        assert!(rig.velocities[1].w > rig.velocities[0].w);
    }

    #[test]
    fn test_limit_state_selection() {
        let (mut rig, mut joint) = pinned_pair();
        joint.enable_limit(true);
        joint.set_limits(0.1, 0.5);
        rig.solve_velocity(&mut joint, 0);
        assert_eq!(joint.limit_state, LimitState::AtLower);

        joint.set_limits(-0.5, -0.1);
        rig.solve_velocity(&mut joint, 0);
        assert_eq!(joint.limit_state, LimitState::AtUpper);

        joint.set_limits(-0.5, 0.5);
        rig.solve_velocity(&mut joint, 0);
        assert_eq!(joint.limit_state, LimitState::Inactive);

        joint.set_limits(0.0, 0.0);
        rig.solve_velocity(&mut joint, 0);
        assert_eq!(joint.limit_state, LimitState::Equal);
    }

    #[test]
    fn test_joint_angle_and_reaction() {
        let (mut rig, joint) = pinned_pair();
        rig.bodies[rig.b].sweep.a = 0.3;
        let (a, b) = (&rig.bodies[rig.a], &rig.bodies[rig.b]);
        assert_abs_diff_eq!(joint.joint_angle(a, b), 0.3, epsilon = EPSILON);
        assert_eq!(joint.reaction_force(60.0), Vec2::ZERO);
        assert_eq!(joint.anchor_a(a), Vec2::new(1.0, 0.0));
    }
}
