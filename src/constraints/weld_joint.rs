use crate::common::settings::{ANGULAR_SLOP, LINEAR_SLOP};
use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Mat33, Real, Rot, Scalar, Vec2, Vec3, PI};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, SolverData};

/// Weld joint definition. Local anchors let the initial configuration
/// violate the constraint slightly.
#[derive(Debug, Clone, PartialEq)]
pub struct WeldJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Body B angle minus body A angle in the reference state (radians).
    pub reference_angle: Real,
    /// Angular mass-spring-damper frequency in Hertz. Zero is rigid.
    pub frequency_hz: Real,
    pub damping_ratio: Real,
}

impl WeldJointDef {
    /// Initialize the bodies, anchors, and reference angle using a world
    /// anchor point.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor: Vec2) -> Self {
        WeldJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            reference_angle: body_b.angle() - body_a.angle(),
            frequency_hz: Real::ZERO,
            damping_ratio: Real::ZERO,
        }
    }
}

/// Glues two bodies together. With a positive frequency the angular part
/// becomes a soft spring.
#[derive(Debug, Clone, PartialEq)]
pub struct WeldJoint {
    base: JointBase,
    frequency_hz: Real,
    damping_ratio: Real,
    bias: Real,

    // Solver shared
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    reference_angle: Real,
    gamma: Real,
    impulse: Vec3,

    // Solver temp
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
}

/// J = [-I -r1_skew I r2_skew]
///     [ 0       -1 0       1]
fn effective_mass(r_a: Vec2, r_b: Vec2, (m_a, m_b): (Real, Real), (i_a, i_b): (Real, Real)) -> Mat33 {
    let ex = Vec3::new(
        m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b,
        -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
        -r_a.y * i_a - r_b.y * i_b,
    );
    let ey = Vec3::new(ex.y, m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b, r_a.x * i_a + r_b.x * i_b);
    let ez = Vec3::new(ex.z, ey.z, i_a + i_b);
    Mat33 { ex, ey, ez }
}

impl WeldJoint {
    pub(crate) fn new(def: &WeldJointDef) -> Self {
        WeldJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            bias: Real::ZERO,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            gamma: Real::ZERO,
            impulse: Vec3::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat33::ZERO,
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
}

impl Constraint for WeldJoint {
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

        let a_a = data.positions[ia].a;
        let mut v_a = data.velocities[ia].v;
        let mut w_a = data.velocities[ia].w;

        let a_b = data.positions[ib].a;
        let mut v_b = data.velocities[ib].v;
        let mut w_b = data.velocities[ib].w;

        let (q_a, q_b) = (Rot::new(a_a), Rot::new(a_b));

        self.r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center_b);

        let k = effective_mass(self.r_a, self.r_b, (m_a, m_b), (i_a, i_b));

        if self.frequency_hz > Real::ZERO {
            self.mass = k.inverse22();

            let mut inv_m = i_a + i_b;
            let m = if inv_m > Real::ZERO { Real::ONE / inv_m } else { Real::ZERO };

            let c = a_b - a_a - self.reference_angle;

            // Frequency
            let omega = Real::TWO * PI * self.frequency_hz;

            // Damping coefficient
            let d = Real::TWO * m * self.damping_ratio * omega;

            // Spring stiffness
            let stiffness = m * omega * omega;

            // magic formulas
            let h = data.step.dt;
            self.gamma = h * (d + h * stiffness);
            self.gamma = if self.gamma != Real::ZERO { Real::ONE / self.gamma } else { Real::ZERO };
            self.bias = c * h * stiffness * self.gamma;

            inv_m += self.gamma;
            self.mass.ez.z = if inv_m != Real::ZERO { Real::ONE / inv_m } else { Real::ZERO };
        } else if k.ez.z == Real::ZERO {
            self.mass = k.inverse22();
            self.gamma = Real::ZERO;
            self.bias = Real::ZERO;
        } else {
            self.mass = k.sym_inverse33();
            self.gamma = Real::ZERO;
            self.bias = Real::ZERO;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step.
            self.impulse = self.impulse * data.step.dt_ratio;

            let p = self.impulse.xy();
            v_a -= p * m_a;
            w_a -= i_a * (self.r_a.cross(p) + self.impulse.z);
            v_b += p * m_b;
            w_b += i_b * (self.r_b.cross(p) + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
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

        if self.frequency_hz > Real::ZERO {
            let cdot2 = w_b - w_a;

            let impulse2 = -self.mass.ez.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            w_a -= i_a * impulse2;
            w_b += i_b * impulse2;

            let cdot1 = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);

            let impulse1 = -self.mass.mul_vec22(cdot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            let p = impulse1;

            v_a -= p * m_a;
            w_a -= i_a * r_a.cross(p);
            v_b += p * m_b;
            w_b += i_b * r_b.cross(p);
        } else {
            let cdot1 = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let impulse = -self.mass.mul_vec(cdot);
            self.impulse += impulse;

            let p = impulse.xy();

            v_a -= p * m_a;
            w_a -= i_a * (r_a.cross(p) + impulse.z);
            v_b += p * m_b;
            w_b += i_b * (r_b.cross(p) + impulse.z);
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

        let k = effective_mass(r_a, r_b, (m_a, m_b), (i_a, i_b));

        let position_error;
        let angular_error;

        if self.frequency_hz > Real::ZERO {
            let c1 = c_b + r_b - c_a - r_a;

            position_error = c1.magnitude();
            angular_error = Real::ZERO;

            let p = -k.solve22(c1);

            c_a -= p * m_a;
            a_a -= i_a * r_a.cross(p);
            c_b += p * m_b;
            a_b += i_b * r_b.cross(p);
        } else {
            let c1 = c_b + r_b - c_a - r_a;
            let c2 = a_b - a_a - self.reference_angle;

            position_error = c1.magnitude();
            angular_error = c2.abs();

            let c = Vec3::new(c1.x, c1.y, c2);

            let impulse = if k.ez.z > Real::ZERO {
                -k.solve33(c)
            } else {
                let impulse2 = -k.solve22(c1);
                Vec3::new(impulse2.x, impulse2.y, Real::ZERO)
            };

            let p = impulse.xy();

            c_a -= p * m_a;
            a_a -= i_a * (r_a.cross(p) + impulse.z);
            c_b += p * m_b;
            a_b += i_b * (r_b.cross(p) + impulse.z);
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
        self.impulse.xy() * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.impulse.z
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("WeldJointDef");
        log::info!(target: DUMP_TARGET, "      local_anchor_a: {},", dump_vec(self.local_anchor_a));
        log::info!(target: DUMP_TARGET, "      local_anchor_b: {},", dump_vec(self.local_anchor_b));
        log::info!(target: DUMP_TARGET, "      reference_angle: {:.9e},", self.reference_angle);
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

    fn welded() -> (Rig, WeldJoint) {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::new(1.0, 0.0)));
        let def = WeldJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::new(0.5, 0.0));
        (rig, WeldJoint::new(&def))
    }

    #[test]
    fn test_rigid_weld_stops_body() {
        let (mut rig, mut joint) = welded();
        rig.velocities[1].v = Vec2::new(1.0, -2.0);
        rig.velocities[1].w = 0.5;
        rig.solve_velocity(&mut joint, 1);
        let (v, w) = (rig.velocities[1].v, rig.velocities[1].w);
        assert_abs_diff_eq!(v.x, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(v.y, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(w, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_rigid_weld_position_correction() {
        let (mut rig, mut joint) = welded();
        rig.positions[1].c = Vec2::new(1.1, 0.05);
        rig.positions[1].a = 0.05;
        rig.solve_velocity(&mut joint, 1);
        assert!(rig.solve_position(&mut joint, 10));
        assert_abs_diff_eq!(rig.positions[1].a, 0.0, epsilon = ANGULAR_SLOP);
        assert_abs_diff_eq!(rig.positions[1].c.x, 1.0, epsilon = 2.0 * LINEAR_SLOP);
        assert_abs_diff_eq!(rig.positions[1].c.y, 0.0, epsilon = 2.0 * LINEAR_SLOP);
    }

    #[test]
    fn test_soft_weld_lets_angle_spring() {
        let (mut rig, mut joint) = welded();
        joint.set_frequency(1.0);
        joint.set_damping_ratio(0.1);
        rig.velocities[1].w = 2.0;
        rig.solve_velocity(&mut joint, 8);
        let w = rig.velocities[1].w;
        // The angular spring only slows the rotation.
        assert!(w > 0.0 && w < 2.0);
    }

    #[test]
    fn test_reaction_force_opposes_motion() {
        let (mut rig, mut joint) = welded();
        rig.velocities[1].v = Vec2::new(0.0, -1.0);
        rig.solve_velocity(&mut joint, 4);
        assert!(joint.reaction_force(60.0).y > 0.0);
    }
}
