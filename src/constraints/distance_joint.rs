use crate::common::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};
use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Real, Rot, Scalar, Vec2, PI};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, SolverData};

/// Distance joint definition. Uses local anchor points so the initial
/// configuration may violate the constraint slightly. Do not use a zero or
/// short length.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// The natural length between the anchor points.
    pub length: Real,
    /// Mass-spring-damper frequency in Hertz. Zero gives a rigid rod.
    pub frequency_hz: Real,
    /// Damping ratio. 0 = no damping, 1 = critical damping.
    pub damping_ratio: Real,
}

impl DistanceJointDef {
    /// Initialize the bodies, anchors, and length using world space anchors.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        DistanceJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            local_anchor_a: body_a.local_point(anchor_a),
            local_anchor_b: body_b.local_point(anchor_b),
            length: (anchor_b - anchor_a).magnitude(),
            frequency_hz: Real::ZERO,
            damping_ratio: Real::ZERO,
        }
    }
}

/// Keeps two anchor points at a fixed distance, as if connected by a massless
/// rigid rod. With a positive frequency the rod becomes a soft spring.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceJoint {
    base: JointBase,
    frequency_hz: Real,
    damping_ratio: Real,
    bias: Real,

    // Solver shared
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    gamma: Real,
    impulse: Real,
    length: Real,

    // Solver temp
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: Real,
}

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> Self {
        DistanceJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            bias: Real::ZERO,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            gamma: Real::ZERO,
            impulse: Real::ZERO,
            length: def.length,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Real::ZERO,
        }
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn length(&self) -> Real {
        self.length
    }

    pub fn set_length(&mut self, length: Real) {
        self.length = length;
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

impl Constraint for DistanceJoint {
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
        let (m_a, m_b, i_a, i_b) = (b.inv_mass_a, b.inv_mass_b, b.inv_i_a, b.inv_i_b);

        self.r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        self.u = c_b + self.r_b - c_a - self.r_a;

        // Handle singularity.
        let length = self.u.magnitude();
        if length > LINEAR_SLOP {
            self.u = self.u * (Real::ONE / length);
        } else {
            self.u = Vec2::ZERO;
        }

        let cr_au = self.r_a.cross(self.u);
        let cr_bu = self.r_b.cross(self.u);
        let mut inv_mass = m_a + i_a * cr_au * cr_au + m_b + i_b * cr_bu * cr_bu;

        // Compute the effective mass matrix.
        self.mass = if inv_mass != Real::ZERO { Real::ONE / inv_mass } else { Real::ZERO };

        if self.frequency_hz > Real::ZERO {
            let c = length - self.length;

            // Frequency
            let omega = Real::TWO * PI * self.frequency_hz;

            // Damping coefficient
            let d = Real::TWO * self.mass * self.damping_ratio * omega;

            // Spring stiffness
            let k = self.mass * omega * omega;

            // magic formulas
            let h = data.step.dt;
            self.gamma = h * (d + h * k);
            self.gamma = if self.gamma != Real::ZERO { Real::ONE / self.gamma } else { Real::ZERO };
            self.bias = c * h * k * self.gamma;

            inv_mass += self.gamma;
            self.mass = if inv_mass != Real::ZERO { Real::ONE / inv_mass } else { Real::ZERO };
        } else {
            self.gamma = Real::ZERO;
            self.bias = Real::ZERO;
        }

        if data.step.warm_starting {
            // Scale the impulse to support a variable time step.
            self.impulse *= data.step.dt_ratio;

            let p = self.u * self.impulse;
            v_a -= p * m_a;
            w_a -= i_a * self.r_a.cross(p);
            v_b += p * m_b;
            w_b += i_b * self.r_b.cross(p);
        } else {
            self.impulse = Real::ZERO;
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

        // Cdot = dot(u, v + cross(w, r))
        let vp_a = v_a + Vec2::scalar_cross(w_a, self.r_a);
        let vp_b = v_b + Vec2::scalar_cross(w_b, self.r_b);
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = self.u * impulse;
        v_a -= p * b.inv_mass_a;
        w_a -= b.inv_i_a * self.r_a.cross(p);
        v_b += p * b.inv_mass_b;
        w_b += b.inv_i_b * self.r_b.cross(p);

        data.velocities[ia].v = v_a;
        data.velocities[ia].w = w_a;
        data.velocities[ib].v = v_b;
        data.velocities[ib].w = w_b;
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool {
        if self.frequency_hz > Real::ZERO {
            // There is no position correction for soft distance constraints.
            return true;
        }

        let b = &self.base;
        let (ia, ib) = (b.index_a, b.index_b);
        let mut c_a = data.positions[ia].c;
        let mut a_a = data.positions[ia].a;
        let mut c_b = data.positions[ib].c;
        let mut a_b = data.positions[ib].a;

        let (q_a, q_b) = (Rot::new(a_a), Rot::new(a_b));

        let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let mut u = c_b + r_b - c_a - r_a;

        let length = u.normalize_mut();
        let c = (length - self.length).clamp_to(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = u * impulse;

        c_a -= p * b.inv_mass_a;
        a_a -= b.inv_i_a * r_a.cross(p);
        c_b += p * b.inv_mass_b;
        a_b += b.inv_i_b * r_b.cross(p);

        data.positions[ia].c = c_a;
        data.positions[ia].a = a_a;
        data.positions[ib].c = c_b;
        data.positions[ib].a = a_b;

        c.abs() < LINEAR_SLOP
    }

    fn anchor_a(&self, body_a: &RigidBody) -> Vec2 {
        body_a.world_point(self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.world_point(self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        self.u * (inv_dt * self.impulse)
    }

    fn reaction_torque(&self, _inv_dt: Real) -> Real {
        Real::ZERO
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("DistanceJointDef");
        log::info!(target: DUMP_TARGET, "      local_anchor_a: {},", dump_vec(self.local_anchor_a));
        log::info!(target: DUMP_TARGET, "      local_anchor_b: {},", dump_vec(self.local_anchor_b));
        log::info!(target: DUMP_TARGET, "      length: {:.9e},", self.length);
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

    fn rod() -> (Rig, DistanceJoint) {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::new(0.0, -2.0)));
        let def = DistanceJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::ZERO, Vec2::new(0.0, -2.0));
        (rig, DistanceJoint::new(&def))
    }

    #[test]
    fn test_def_measures_length() {
        let (_, joint) = rod();
        assert_abs_diff_eq!(joint.length(), 2.0, epsilon = EPSILON);
        assert_eq!(joint.local_anchor_b(), Vec2::ZERO);
    }

    #[test]
    fn test_rigid_rod_removes_axial_velocity() {
        let (mut rig, mut joint) = rod();
        rig.velocities[1].v = Vec2::new(1.0, -3.0);
        rig.solve_velocity(&mut joint, 4);
        assert_abs_diff_eq!(rig.velocities[1].v.y, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(rig.velocities[1].v.x, 1.0, epsilon = EPSILON);
        // Pulling outward produces a reaction toward the anchor.
        assert!(joint.reaction_force(60.0).y > 0.0);
    }

    #[test]
    fn test_position_solve_restores_length() {
        let (mut rig, mut joint) = rod();
        rig.positions[1].c = Vec2::new(0.0, -2.1);
        rig.solve_velocity(&mut joint, 1);
        assert!(rig.solve_position(&mut joint, 10));
        assert_abs_diff_eq!(rig.positions[1].c.y, -2.0, epsilon = LINEAR_SLOP);
    }

    #[test]
    fn test_soft_joint_skips_position_correction() {
        let (mut rig, mut joint) = rod();
        joint.set_frequency(4.0);
        joint.set_damping_ratio(0.5);
        rig.positions[1].c = Vec2::new(0.0, -2.5);
        rig.solve_velocity(&mut joint, 1);
        assert!(rig.solve_position(&mut joint, 1));
        assert_eq!(rig.positions[1].c, Vec2::new(0.0, -2.5));
        // The stretched spring pulls the body back up.
        assert!(rig.velocities[1].v.y > 0.0);
    }
}
