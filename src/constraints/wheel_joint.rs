use crate::common::settings::LINEAR_SLOP;
use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Real, Rot, Scalar, Vec2, PI};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, SolverData};

/// Wheel joint definition. This requires defining a line of motion using an
/// axis and an anchor point.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// The local translation axis in body A.
    pub local_axis_a: Vec2,
    pub enable_motor: bool,
    /// The maximum motor torque, usually in N-m.
    pub max_motor_torque: Real,
    /// The desired motor speed in radians per second.
    pub motor_speed: Real,
    /// Suspension frequency, zero indicates no suspension.
    pub frequency_hz: Real,
    /// Suspension damping ratio, one indicates critical damping.
    pub damping_ratio: Real,
}

impl WheelJointDef {
    /// Initialize the bodies, anchors, and axis using a world anchor and
    /// world axis.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor: Vec2, axis: Vec2) -> Self {
        WheelJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            local_axis_a: body_a.local_vector(axis),
            enable_motor: false,
            max_motor_torque: Real::ZERO,
            motor_speed: Real::ZERO,
            frequency_hz: Real::TWO,
            damping_ratio: Real::from_f32(0.7),
        }
    }
}

/// A wheel joint provides two degrees of freedom: translation along an axis
/// fixed in body A and rotation in the plane. A line constraint with a
/// rotational motor and a linear spring/damper, designed for vehicle
/// suspensions.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelJoint {
    base: JointBase,
    frequency_hz: Real,
    damping_ratio: Real,

    // Solver shared
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,

    impulse: Real,
    motor_impulse: Real,
    spring_impulse: Real,

    max_motor_torque: Real,
    motor_speed: Real,
    enable_motor: bool,

    // Solver temp
    ax: Vec2,
    ay: Vec2,
    s_ax: Real,
    s_bx: Real,
    s_ay: Real,
    s_by: Real,

    mass: Real,
    motor_mass: Real,
    spring_mass: Real,

    bias: Real,
    gamma: Real,
}

impl WheelJoint {
    pub(crate) fn new(def: &WheelJointDef) -> Self {
        let local_x_axis_a = def.local_axis_a.normalize();
        WheelJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: Vec2::scalar_cross(Real::ONE, local_x_axis_a),
            impulse: Real::ZERO,
            motor_impulse: Real::ZERO,
            spring_impulse: Real::ZERO,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            enable_motor: def.enable_motor,
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: Real::ZERO,
            s_bx: Real::ZERO,
            s_ay: Real::ZERO,
            s_by: Real::ZERO,
            mass: Real::ZERO,
            motor_mass: Real::ZERO,
            spring_mass: Real::ZERO,
            bias: Real::ZERO,
            gamma: Real::ZERO,
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

    /// Current suspension translation along the axis.
    pub fn joint_translation(&self, body_a: &RigidBody, body_b: &RigidBody) -> Real {
        let p_a = body_a.world_point(self.local_anchor_a);
        let p_b = body_b.world_point(self.local_anchor_b);
        let axis = body_a.world_vector(self.local_x_axis_a);
        (p_b - p_a).dot(axis)
    }

    /// Current relative angular speed of the wheel.
    pub fn joint_speed(&self, body_a: &RigidBody, body_b: &RigidBody) -> Real {
        body_b.angular_velocity - body_a.angular_velocity
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

    pub fn motor_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.motor_impulse
    }

    pub fn spring_frequency(&self) -> Real {
        self.frequency_hz
    }

    pub fn set_spring_frequency(&mut self, hz: Real) {
        self.frequency_hz = hz;
    }

    pub fn spring_damping_ratio(&self) -> Real {
        self.damping_ratio
    }

    pub fn set_spring_damping_ratio(&mut self, ratio: Real) {
        self.damping_ratio = ratio;
    }
}

impl Constraint for WheelJoint {
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

        // Compute the effective masses.
        let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let d = c_b + r_b - c_a - r_a;

        // Point to line constraint
        {
            self.ay = q_a.apply(self.local_y_axis_a);
            self.s_ay = (d + r_a).cross(self.ay);
            self.s_by = r_b.cross(self.ay);

            self.mass = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
            if self.mass > Real::ZERO {
                self.mass = Real::ONE / self.mass;
            }
        }

        // Spring constraint
        self.spring_mass = Real::ZERO;
        self.bias = Real::ZERO;
        self.gamma = Real::ZERO;
        if self.frequency_hz > Real::ZERO {
            self.ax = q_a.apply(self.local_x_axis_a);
            self.s_ax = (d + r_a).cross(self.ax);
            self.s_bx = r_b.cross(self.ax);

            let inv_mass = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
            if inv_mass > Real::ZERO {
                self.spring_mass = Real::ONE / inv_mass;

                let c = d.dot(self.ax);

                // Frequency
                let omega = Real::TWO * PI * self.frequency_hz;

                // Damping coefficient
                let damp = Real::TWO * self.spring_mass * self.damping_ratio * omega;

                // Spring stiffness
                let k = self.spring_mass * omega * omega;

                // magic formulas
                let h = data.step.dt;
                self.gamma = h * (damp + h * k);
                if self.gamma > Real::ZERO {
                    self.gamma = Real::ONE / self.gamma;
                }

                self.bias = c * h * k * self.gamma;

                self.spring_mass = inv_mass + self.gamma;
                if self.spring_mass > Real::ZERO {
                    self.spring_mass = Real::ONE / self.spring_mass;
                }
            }
        } else {
            self.spring_impulse = Real::ZERO;
        }

        // Rotational motor
        if self.enable_motor {
            self.motor_mass = i_a + i_b;
            if self.motor_mass > Real::ZERO {
                self.motor_mass = Real::ONE / self.motor_mass;
            }
        } else {
            self.motor_mass = Real::ZERO;
            self.motor_impulse = Real::ZERO;
        }

        if data.step.warm_starting {
            // Account for variable time step.
            self.impulse *= data.step.dt_ratio;
            self.spring_impulse *= data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let p = self.ay * self.impulse + self.ax * self.spring_impulse;
            let l_a = self.impulse * self.s_ay + self.spring_impulse * self.s_ax + self.motor_impulse;
            let l_b = self.impulse * self.s_by + self.spring_impulse * self.s_bx + self.motor_impulse;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        } else {
            self.impulse = Real::ZERO;
            self.spring_impulse = Real::ZERO;
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
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        let mut v_a = data.velocities[ia].v;
        let mut w_a = data.velocities[ia].w;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        // Solve spring constraint
        {
            let cdot = self.ax.dot(v_b - v_a) + self.s_bx * w_b - self.s_ax * w_a;
            let impulse = -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = self.ax * impulse;
            let l_a = impulse * self.s_ax;
            let l_b = impulse * self.s_bx;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        }

        // Solve rotational motor constraint
        {
            let cdot = w_b - w_a - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;

            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp_to(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve point to line constraint
        {
            let cdot = self.ay.dot(v_b - v_a) + self.s_by * w_b - self.s_ay * w_a;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;

            let p = self.ay * impulse;
            let l_a = impulse * self.s_ay;
            let l_b = impulse * self.s_by;

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
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        let mut c_a = data.positions[ia].c;
        let mut a_a = data.positions[ia].a;
        let mut c_b = data.positions[ib].c;
        let mut a_b = data.positions[ib].a;

        let (q_a, q_b) = (Rot::new(a_a), Rot::new(a_b));

        let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let d = (c_b - c_a) + r_b - r_a;

        let ay = q_a.apply(self.local_y_axis_a);

        let s_ay = (d + r_a).cross(ay);
        let s_by = r_b.cross(ay);

        let c = d.dot(ay);

        let k = m_a + m_b + i_a * s_ay * s_ay + i_b * s_by * s_by;

        let impulse = if k != Real::ZERO { -c / k } else { Real::ZERO };

        let p = ay * impulse;
        let l_a = impulse * s_ay;
        let l_b = impulse * s_by;

        c_a -= p * m_a;
        a_a -= i_a * l_a;
        c_b += p * m_b;
        a_b += i_b * l_b;

        data.positions[ia].c = c_a;
        data.positions[ia].a = a_a;
        data.positions[ib].c = c_b;
        data.positions[ib].a = a_b;

        c.abs() <= LINEAR_SLOP
    }

    fn anchor_a(&self, body_a: &RigidBody) -> Vec2 {
        body_a.world_point(self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.world_point(self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        (self.ay * self.impulse + self.ax * self.spring_impulse) * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.motor_impulse
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("WheelJointDef");
        log::info!(target: DUMP_TARGET, "      local_anchor_a: {},", dump_vec(self.local_anchor_a));
        log::info!(target: DUMP_TARGET, "      local_anchor_b: {},", dump_vec(self.local_anchor_b));
        log::info!(target: DUMP_TARGET, "      local_axis_a: {},", dump_vec(self.local_x_axis_a));
        log::info!(target: DUMP_TARGET, "      enable_motor: {},", self.enable_motor);
        log::info!(target: DUMP_TARGET, "      motor_speed: {:.9e},", self.motor_speed);
        log::info!(target: DUMP_TARGET, "      max_motor_torque: {:.9e},", self.max_motor_torque);
        log::info!(target: DUMP_TARGET, "      frequency_hz: {:.9e},", self.frequency_hz);
        log::info!(target: DUMP_TARGET, "      damping_ratio: {:.9e},", self.damping_ratio);
        self.base.dump_end(index);
    }
}
