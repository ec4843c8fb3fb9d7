use crate::common::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};
use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Real, Rot, Scalar, Vec2};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, LimitState, SolverData};

/// Rope joint definition. Needs local anchor points and a maximum length.
#[derive(Debug, Clone, PartialEq)]
pub struct RopeJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// The maximum length of the rope. Must be larger than `LINEAR_SLOP`.
    pub max_length: Real,
}

impl RopeJointDef {
    /// Anchors default to `(-1, 0)` on body A and `(1, 0)` on body B with
    /// a zero maximum length.
    pub fn new(body_a: &RigidBody, body_b: &RigidBody) -> Self {
        RopeJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::new(-Real::ONE, Real::ZERO),
            local_anchor_b: Vec2::new(Real::ONE, Real::ZERO),
            max_length: Real::ZERO,
        }
    }

    pub fn with_anchors(mut self, local_anchor_a: Vec2, local_anchor_b: Vec2) -> Self {
        self.local_anchor_a = local_anchor_a;
        self.local_anchor_b = local_anchor_b;
        self
    }

    pub fn with_max_length(mut self, max_length: Real) -> Self {
        self.max_length = max_length;
        self
    }
}

/// Enforces an upper bound on the distance between two anchor points. The
/// rope goes slack below the bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RopeJoint {
    base: JointBase,

    // Solver shared
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    max_length: Real,
    length: Real,
    impulse: Real,

    // Solver temp
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: Real,
    state: LimitState,
}

impl RopeJoint {
    pub(crate) fn new(def: &RopeJointDef) -> Self {
        RopeJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_length: def.max_length,
            length: Real::ZERO,
            impulse: Real::ZERO,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Real::ZERO,
            state: LimitState::Inactive,
        }
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn max_length(&self) -> Real {
        self.max_length
    }

    pub fn set_max_length(&mut self, length: Real) {
        self.max_length = length;
    }

    /// `AtUpper` while the rope is taut.
    pub fn limit_state(&self) -> LimitState {
        self.state
    }
}

impl Constraint for RopeJoint {
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

        self.r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        self.r_b = q_b.apply(self.local_anchor_b - b.local_center_b);
        self.u = c_b + self.r_b - c_a - self.r_a;

        self.length = self.u.magnitude();

        let c = self.length - self.max_length;
        self.state = if c > Real::ZERO { LimitState::AtUpper } else { LimitState::Inactive };

        if self.length > LINEAR_SLOP {
            self.u = self.u * (Real::ONE / self.length);
        } else {
            self.u = Vec2::ZERO;
            self.mass = Real::ZERO;
            self.impulse = Real::ZERO;
            return;
        }

        // Compute effective mass.
        let cr_a = self.r_a.cross(self.u);
        let cr_b = self.r_b.cross(self.u);
        let inv_mass = m_a + i_a * cr_a * cr_a + m_b + i_b * cr_b * cr_b;

        self.mass = if inv_mass != Real::ZERO { Real::ONE / inv_mass } else { Real::ZERO };

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
        let c = self.length - self.max_length;
        let mut cdot = self.u.dot(vp_b - vp_a);

        // Predictive constraint.
        if c < Real::ZERO {
            cdot += data.step.inv_dt * c;
        }

        let mut impulse = -self.mass * cdot;
        let old_impulse = self.impulse;
        self.impulse = (self.impulse + impulse).min(Real::ZERO);
        impulse = self.impulse - old_impulse;

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
        let c = (length - self.max_length).clamp_to(Real::ZERO, MAX_LINEAR_CORRECTION);

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

        length - self.max_length < LINEAR_SLOP
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
        self.base.dump_begin("RopeJointDef");
        log::info!(target: DUMP_TARGET, "      local_anchor_a: {},", dump_vec(self.local_anchor_a));
        log::info!(target: DUMP_TARGET, "      local_anchor_b: {},", dump_vec(self.local_anchor_b));
        log::info!(target: DUMP_TARGET, "      max_length: {:.9e},", self.max_length);
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

    fn rope(body_y: Real) -> (Rig, RopeJoint) {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::new(0.0, body_y)));
        let def = RopeJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b])
            .with_anchors(Vec2::ZERO, Vec2::ZERO)
            .with_max_length(2.0);
        (rig, RopeJoint::new(&def))
    }

    #[test]
    fn test_default_anchors() {
        let rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::ZERO));
        let def = RopeJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b]);
        assert_eq!(def.local_anchor_a, Vec2::new(-1.0, 0.0));
        assert_eq!(def.local_anchor_b, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_slack_rope_allows_motion() {
        let (mut rig, mut joint) = rope(-1.0);
        rig.velocities[1].v = Vec2::new(0.0, -3.0);
        rig.solve_velocity(&mut joint, 8);
        assert_eq!(joint.limit_state(), LimitState::Inactive);
        assert_abs_diff_eq!(rig.velocities[1].v.y, -3.0, epsilon = EPSILON);
    }

    #[test]
    fn test_slack_rope_predicts_tension() {
        // One step at -90 m/s would overshoot the 1m of slack.
        let (mut rig, mut joint) = rope(-1.0);
        rig.velocities[1].v = Vec2::new(0.0, -90.0);
        rig.solve_velocity(&mut joint, 8);
        assert_abs_diff_eq!(rig.velocities[1].v.y, -60.0, epsilon = 1e-3);
    }

    #[test]
    fn test_taut_rope_stops_outward_motion() {
        let (mut rig, mut joint) = rope(-2.1);
        rig.velocities[1].v = Vec2::new(0.0, -3.0);
        rig.solve_velocity(&mut joint, 8);
        assert_eq!(joint.limit_state(), LimitState::AtUpper);
        assert!(rig.velocities[1].v.y >= -EPSILON);

        assert!(rig.solve_position(&mut joint, 5));
        assert!(rig.positions[1].c.y > -2.0 - LINEAR_SLOP);
    }
}
