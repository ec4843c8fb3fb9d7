use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Mat22, Real, Rot, Scalar, Vec2};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, SolverData};

/// Friction joint definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// The maximum friction force in N.
    pub max_force: Real,
    /// The maximum friction torque in N-m.
    pub max_torque: Real,
}

impl FrictionJointDef {
    /// Initialize the bodies and anchors using a world anchor point.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody, anchor: Vec2) -> Self {
        FrictionJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            max_force: Real::ZERO,
            max_torque: Real::ZERO,
        }
    }
}

/// Top-down friction. Provides 2D translational friction and angular
/// friction, each capped by its maximum.
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionJoint {
    base: JointBase,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,

    // Solver shared
    linear_impulse: Vec2,
    angular_impulse: Real,
    max_force: Real,
    max_torque: Real,

    // Solver temp
    r_a: Vec2,
    r_b: Vec2,
    linear_mass: Mat22,
    angular_mass: Real,
}

impl FrictionJoint {
    pub(crate) fn new(def: &FrictionJointDef) -> Self {
        FrictionJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            linear_impulse: Vec2::ZERO,
            angular_impulse: Real::ZERO,
            max_force: def.max_force,
            max_torque: def.max_torque,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_mass: Mat22::ZERO,
            angular_mass: Real::ZERO,
        }
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
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
}

impl Constraint for FrictionJoint {
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

        // Compute the effective mass matrix.
        self.r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        let (r_a, r_b) = (self.r_a, self.r_b);

        let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
        let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
        let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;
        self.linear_mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        self.angular_mass = i_a + i_b;
        if self.angular_mass > Real::ZERO {
            self.angular_mass = Real::ONE / self.angular_mass;
        }

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

        // Solve angular friction
        {
            let cdot = w_b - w_a;
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
            let cdot = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);

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
        body_a.world_point(self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.world_point(self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        self.linear_impulse * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.angular_impulse
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("FrictionJointDef");
        log::info!(target: DUMP_TARGET, "      local_anchor_a: {},", dump_vec(self.local_anchor_a));
        log::info!(target: DUMP_TARGET, "      local_anchor_b: {},", dump_vec(self.local_anchor_b));
        log::info!(target: DUMP_TARGET, "      max_force: {:.9e},", self.max_force);
        log::info!(target: DUMP_TARGET, "      max_torque: {:.9e},", self.max_torque);
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

    fn puck(max_force: Real, max_torque: Real) -> (Rig, FrictionJoint) {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::new(3.0, 1.0)));
        let mut def = FrictionJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::new(3.0, 1.0));
        def.max_force = max_force;
        def.max_torque = max_torque;
        (rig, FrictionJoint::new(&def))
    }

    #[test]
    fn test_strong_friction_stops_body() {
        let (mut rig, mut joint) = puck(1000.0, 1000.0);
        rig.velocities[1].v = Vec2::new(1.0, 1.0);
        rig.velocities[1].w = -1.0;
        rig.solve_velocity(&mut joint, 4);
        assert_abs_diff_eq!(rig.velocities[1].v.x, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(rig.velocities[1].v.y, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(rig.velocities[1].w, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_weak_friction_only_slows_body() {
        let (mut rig, mut joint) = puck(6.0, 3.0);
        rig.velocities[1].v = Vec2::new(3.0, 4.0);
        rig.velocities[1].w = 2.0;
        rig.solve_velocity(&mut joint, 4);

        // |dv| is capped at dt * max_force = 0.1 along the direction of motion.
        let v = rig.velocities[1].v;
        assert_abs_diff_eq!(v.x, 3.0 - 0.06, epsilon = EPSILON);
        assert_abs_diff_eq!(v.y, 4.0 - 0.08, epsilon = EPSILON);
        assert_abs_diff_eq!(rig.velocities[1].w, 2.0 - 0.05, epsilon = EPSILON);
        assert_abs_diff_eq!(joint.reaction_torque(60.0), -3.0, epsilon = 1e-3);
    }
}
