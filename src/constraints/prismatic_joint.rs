use crate::common::settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_LINEAR_CORRECTION};
use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Mat22, Mat33, Real, Rot, Scalar, Vec2, Vec3};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, LimitState, SolverData};

/// Prismatic joint definition. This requires defining a line of motion using
/// an axis and an anchor point.
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// The local translation unit axis in body A.
    pub local_axis_a: Vec2,
    /// Body B angle minus body A angle in the reference state (radians).
    pub reference_angle: Real,
    pub enable_limit: bool,
    /// Lower translation limit, usually in meters.
    pub lower_translation: Real,
    pub upper_translation: Real,
    pub enable_motor: bool,
    /// Maximum motor force, usually in N.
    pub max_motor_force: Real,
    /// Desired motor speed in meters per second.
    pub motor_speed: Real,
}

impl PrismaticJointDef {
    /// Initialize the bodies, anchors, axis, and reference angle using the
    /// world anchor and unit world axis.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor: Vec2, axis: Vec2) -> Self {
        PrismaticJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            local_axis_a: body_a.local_vector(axis),
            reference_angle: body_b.angle() - body_a.angle(),
            enable_limit: false,
            lower_translation: Real::ZERO,
            upper_translation: Real::ZERO,
            enable_motor: false,
            max_motor_force: Real::ZERO,
            motor_speed: Real::ZERO,
        }
    }
}

/// A prismatic joint provides one degree of freedom: translation along an
/// axis fixed in body A. Relative rotation is prevented.
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJoint {
    base: JointBase,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    reference_angle: Real,

    // Solver shared
    impulse: Vec3,
    motor_impulse: Real,
    lower_translation: Real,
    upper_translation: Real,
    max_motor_force: Real,
    motor_speed: Real,
    enable_limit: bool,
    enable_motor: bool,
    limit_state: LimitState,

    // Solver temp
    axis: Vec2,
    perp: Vec2,
    s1: Real,
    s2: Real,
    a1: Real,
    a2: Real,
    k: Mat33,
    motor_mass: Real,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> Self {
        let local_x_axis_a = def.local_axis_a.normalize();
        PrismaticJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: Vec2::scalar_cross(Real::ONE, local_x_axis_a),
            reference_angle: def.reference_angle,
            impulse: Vec3::ZERO,
            motor_impulse: Real::ZERO,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            enable_limit: def.enable_limit,
            enable_motor: def.enable_motor,
            limit_state: LimitState::Inactive,
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: Real::ZERO,
            s2: Real::ZERO,
            a1: Real::ZERO,
            a2: Real::ZERO,
            k: Mat33::ZERO,
            motor_mass: Real::ZERO,
        }
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    pub fn reference_angle(&self) -> Real {
        self.reference_angle
    }

    /// Current joint translation, usually in meters.
    pub fn joint_translation(&self, body_a: &RigidBody, body_b: &RigidBody) -> Real {
        let p_a = body_a.world_point(self.local_anchor_a);
        let p_b = body_b.world_point(self.local_anchor_b);
        let axis = body_a.world_vector(self.local_x_axis_a);
        (p_b - p_a).dot(axis)
    }

    /// Current joint translation speed, usually in meters per second.
    pub fn joint_speed(&self, body_a: &RigidBody, body_b: &RigidBody) -> Real {
        let r_a = body_a.xf.q.apply(self.local_anchor_a - body_a.sweep.local_center);
        let r_b = body_b.xf.q.apply(self.local_anchor_b - body_b.sweep.local_center);
        let p1 = body_a.sweep.c + r_a;
        let p2 = body_b.sweep.c + r_b;
        let d = p2 - p1;
        let axis = body_a.xf.q.apply(self.local_x_axis_a);

        let (v_a, v_b) = (body_a.linear_velocity, body_b.linear_velocity);
        let (w_a, w_b) = (body_a.angular_velocity, body_b.angular_velocity);

        d.dot(Vec2::scalar_cross(w_a, axis))
            + axis.dot(v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a))
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
        self.lower_translation
    }

    pub fn upper_limit(&self) -> Real {
        self.upper_translation
    }

    pub fn set_limits(&mut self, lower: Real, upper: Real) {
        debug_assert!(lower <= upper);
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower;
            self.upper_translation = upper;
            self.impulse.z = Real::ZERO;
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

    pub fn max_motor_force(&self) -> Real {
        self.max_motor_force
    }

    pub fn set_max_motor_force(&mut self, force: Real) {
        self.max_motor_force = force;
    }

    /// Current motor force given the inverse time step, usually in N.
    pub fn motor_force(&self, inv_dt: Real) -> Real {
        inv_dt * self.motor_impulse
    }
}

impl Constraint for PrismaticJoint {
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

        let c_a = data.positions[ia].c;
        let a_a = data.positions[ia].a;
        let mut v_a = data.velocities[ia].v;
        let mut w_a = data.velocities[ia].w;

        let c_b = data.positions[ib].c;
        let a_b = data.positions[ib].a;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        let (q_a, q_b) = (Rot::new(a_a), Rot::new(a_b));

        // Compute the effective masses.
        let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let d = (c_b - c_a) + r_b - r_a;

        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        // Compute motor Jacobian and effective mass.
        self.axis = q_a.apply(self.local_x_axis_a);
        self.a1 = (d + r_a).cross(self.axis);
        self.a2 = r_b.cross(self.axis);

        self.motor_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.motor_mass > Real::ZERO {
            self.motor_mass = Real::ONE / self.motor_mass;
        }

        // Prismatic constraint.
        {
            self.perp = q_a.apply(self.local_y_axis_a);

            self.s1 = (d + r_a).cross(self.perp);
            self.s2 = r_b.cross(self.perp);

            let (s1, s2, a1, a2) = (self.s1, self.s2, self.a1, self.a2);
            let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
            let k12 = i_a * s1 + i_b * s2;
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let mut k22 = i_a + i_b;
            if k22 == Real::ZERO {
                // For bodies with fixed rotation.
                k22 = Real::ONE;
            }
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

            self.k.ex = Vec3::new(k11, k12, k13);
            self.k.ey = Vec3::new(k12, k22, k23);
            self.k.ez = Vec3::new(k13, k23, k33);
        }

        // Compute motor and limit terms.
        if self.enable_limit {
            let joint_translation = self.axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < Real::TWO * LINEAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_translation <= self.lower_translation {
                if self.limit_state != LimitState::AtLower {
                    self.limit_state = LimitState::AtLower;
                    self.impulse.z = Real::ZERO;
                }
            } else if joint_translation >= self.upper_translation {
                if self.limit_state != LimitState::AtUpper {
                    self.limit_state = LimitState::AtUpper;
                    self.impulse.z = Real::ZERO;
                }
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = Real::ZERO;
            }
        } else {
            self.limit_state = LimitState::Inactive;
            self.impulse.z = Real::ZERO;
        }

        if !self.enable_motor {
            self.motor_impulse = Real::ZERO;
        }

        if data.step.warm_starting {
            // Account for variable time step.
            self.impulse = self.impulse * data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let axial = self.motor_impulse + self.impulse.z;
            let p = self.perp * self.impulse.x + self.axis * axial;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial * self.a2;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
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

        // Solve linear motor constraint.
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = self.axis.dot(v_b - v_a) + self.a2 * w_b - self.a1 * w_a;
            let mut impulse = self.motor_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (self.motor_impulse + impulse).clamp_to(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            let p = self.axis * impulse;
            let l_a = impulse * self.a1;
            let l_b = impulse * self.a2;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        }

        let cdot1 = Vec2::new(self.perp.dot(v_b - v_a) + self.s2 * w_b - self.s1 * w_a, w_b - w_a);

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            // Solve prismatic and limit constraint in block form.
            let cdot2 = self.axis.dot(v_b - v_a) + self.a2 * w_b - self.a1 * w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let f1 = self.impulse;
            let df = self.k.solve33(-cdot);
            self.impulse += df;

            if self.limit_state == LimitState::AtLower {
                self.impulse.z = self.impulse.z.max(Real::ZERO);
            } else if self.limit_state == LimitState::AtUpper {
                self.impulse.z = self.impulse.z.min(Real::ZERO);
            }

            // f2(1:2) = invK(1:2,1:2) * (-Cdot(1:2) - K(1:2,3) * (f2(3) - f1(3))) + f1(1:2)
            let rhs = -cdot1 - Vec2::new(self.k.ez.x, self.k.ez.y) * (self.impulse.z - f1.z);
            let f2r = self.k.solve22(rhs) + Vec2::new(f1.x, f1.y);
            self.impulse.x = f2r.x;
            self.impulse.y = f2r.y;

            let df = self.impulse - f1;

            let p = self.perp * df.x + self.axis * df.z;
            let l_a = df.x * self.s1 + df.y + df.z * self.a1;
            let l_b = df.x * self.s2 + df.y + df.z * self.a2;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        } else {
            // Limit is inactive, just solve the prismatic constraint in block form.
            let df = self.k.solve22(-cdot1);
            self.impulse.x += df.x;
            self.impulse.y += df.y;

            let p = self.perp * df.x;
            let l_a = df.x * self.s1 + df.y;
            let l_b = df.x * self.s2 + df.y;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
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

        let (q_a, q_b) = (Rot::new(a_a), Rot::new(a_b));
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        // Compute fresh Jacobians
        let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let d = c_b + r_b - c_a - r_a;

        let axis = q_a.apply(self.local_x_axis_a);
        let a1 = (d + r_a).cross(axis);
        let a2 = r_b.cross(axis);
        let perp = q_a.apply(self.local_y_axis_a);

        let s1 = (d + r_a).cross(perp);
        let s2 = r_b.cross(perp);

        let c1 = Vec2::new(perp.dot(d), a_b - a_a - self.reference_angle);

        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = Real::ZERO;
        if self.enable_limit {
            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < Real::TWO * LINEAR_SLOP {
                // Prevent large angular corrections
                c2 = translation.clamp_to(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max(translation.abs());
                active = true;
            } else if translation <= self.lower_translation {
                // Prevent large linear corrections and allow some slop.
                c2 = (translation - self.lower_translation + LINEAR_SLOP).clamp_to(-MAX_LINEAR_CORRECTION, Real::ZERO);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation - LINEAR_SLOP).clamp_to(Real::ZERO, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let mut k22 = i_a + i_b;
        if k22 == Real::ZERO {
            // For fixed rotation
            k22 = Real::ONE;
        }

        let impulse = if active {
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

            let k = Mat33 {
                ex: Vec3::new(k11, k12, k13),
                ey: Vec3::new(k12, k22, k23),
                ez: Vec3::new(k13, k23, k33),
            };
            let c = Vec3::new(c1.x, c1.y, c2);
            k.solve33(-c)
        } else {
            let k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let impulse1 = k.solve(-c1);
            Vec3::new(impulse1.x, impulse1.y, Real::ZERO)
        };

        let p = perp * impulse.x + axis * impulse.z;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        c_a -= p * m_a;
        a_a -= i_a * l_a;
        c_b += p * m_b;
        a_b += i_b * l_b;

        data.positions[ia].c = c_a;
        data.positions[ia].a = a_a;
        data.positions[ib].c = c_b;
        data.positions[ib].a = a_b;

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    fn anchor_a(&self, body_a: &RigidBody) -> Vec2 {
        body_a.world_point(self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.world_point(self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        (self.perp * self.impulse.x + self.axis * (self.motor_impulse + self.impulse.z)) * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.impulse.y
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("PrismaticJointDef");
        log::info!(target: DUMP_TARGET, "      local_anchor_a: {},", dump_vec(self.local_anchor_a));
        log::info!(target: DUMP_TARGET, "      local_anchor_b: {},", dump_vec(self.local_anchor_b));
        log::info!(target: DUMP_TARGET, "      local_axis_a: {},", dump_vec(self.local_x_axis_a));
        log::info!(target: DUMP_TARGET, "      reference_angle: {:.9e},", self.reference_angle);
        log::info!(target: DUMP_TARGET, "      enable_limit: {},", self.enable_limit);
        log::info!(target: DUMP_TARGET, "      lower_translation: {:.9e},", self.lower_translation);
        log::info!(target: DUMP_TARGET, "      upper_translation: {:.9e},", self.upper_translation);
        log::info!(target: DUMP_TARGET, "      enable_motor: {},", self.enable_motor);
        log::info!(target: DUMP_TARGET, "      motor_speed: {:.9e},", self.motor_speed);
        log::info!(target: DUMP_TARGET, "      max_motor_force: {:.9e},", self.max_motor_force);
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

    fn slider() -> (Rig, PrismaticJoint) {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::new(1.0, 0.0)));
        let def = PrismaticJointDef::new(
            &rig.bodies[rig.a],
            &rig.bodies[rig.b],
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 0.0),
        );
        (rig, PrismaticJoint::new(&def))
    }

    #[test]
    fn test_axis_is_normalised() {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::ZERO));
        let def = PrismaticJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::ZERO, Vec2::new(0.0, 3.0));
        let joint = PrismaticJoint::new(&def);
        assert_abs_diff_eq!(joint.local_axis_a().y, 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(joint.local_y_axis_a.x, -1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_only_axial_velocity_survives() {
        let (mut rig, mut joint) = slider();
        rig.velocities[1].v = Vec2::new(2.0, 3.0);
        rig.velocities[1].w = 1.5;
        rig.solve_velocity(&mut joint, 10);

        assert_abs_diff_eq!(rig.velocities[1].v.x, 2.0, epsilon = EPSILON);
        assert_abs_diff_eq!(rig.velocities[1].v.y, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(rig.velocities[1].w, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_upper_limit_stops_motion() {
        let (mut rig, mut joint) = slider();
        joint.enable_limit(true);
        joint.set_limits(-1.0, 0.0);
        rig.velocities[1].v = Vec2::new(2.0, 0.0);
        rig.solve_velocity(&mut joint, 10);
        assert_eq!(joint.limit_state, LimitState::AtUpper);
        assert!(rig.velocities[1].v.x <= EPSILON);
    }

    #[test]
    fn test_motor_drives_translation() {
        let (mut rig, mut joint) = slider();
        joint.enable_motor(true);
        joint.set_motor_speed(1.0);
        joint.set_max_motor_force(1000.0);
        rig.solve_velocity(&mut joint, 10);
        assert_abs_diff_eq!(rig.velocities[1].v.x, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_position_solve_removes_perpendicular_offset() {
        let (mut rig, mut joint) = slider();
        rig.positions[1].c = Vec2::new(1.5, 0.2);
        rig.positions[1].a = 0.05;
        rig.solve_velocity(&mut joint, 1);
        assert!(rig.solve_position(&mut joint, 20));
        assert_abs_diff_eq!(rig.positions[1].c.y, 0.0, epsilon = LINEAR_SLOP);
        assert_abs_diff_eq!(rig.positions[1].a, 0.0, epsilon = ANGULAR_SLOP);
    }

    #[test]
    fn test_joint_translation() {
        let (mut rig, joint) = slider();
        rig.bodies[rig.b].xf.p = Vec2::new(1.75, 0.0);
        let (a, b) = (&rig.bodies[rig.a], &rig.bodies[rig.b]);
        assert_abs_diff_eq!(joint.joint_translation(a, b), 0.75, epsilon = EPSILON);
    }
}
