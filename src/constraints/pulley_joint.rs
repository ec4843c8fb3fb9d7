use crate::common::settings::LINEAR_SLOP;
use crate::common::{Arena, DUMP_TARGET};
use crate::math::{Real, Rot, Scalar, Vec2};
use crate::objects::{BodyHandle, RigidBody};

use super::{dump_vec, Constraint, JointBase, SolverData};

/// Pulley joint definition. Two ground anchors, two dynamic body anchor
/// points, and a pulley ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct PulleyJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The first ground anchor in world coordinates. This point never moves.
    pub ground_anchor_a: Vec2,
    /// The second ground anchor in world coordinates. This point never moves.
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// The reference length for the segment attached to body A.
    pub length_a: Real,
    /// The reference length for the segment attached to body B.
    pub length_b: Real,
    pub ratio: Real,
}

impl PulleyJointDef {
    /// Initialize the bodies, anchors, lengths and ratio using world
    /// coordinates.
    pub fn new(
        body_a: &RigidBody,
        body_b: &RigidBody,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: Real,
    ) -> Self {
        debug_assert!(ratio > Real::EPSILON);
        PulleyJointDef {
            body_a: body_a.handle(),
            body_b: body_b.handle(),
            collide_connected: true,
            user_data: 0,
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a: body_a.local_point(anchor_a),
            local_anchor_b: body_b.local_point(anchor_b),
            length_a: (anchor_a - ground_anchor_a).magnitude(),
            length_b: (anchor_b - ground_anchor_b).magnitude(),
            ratio,
        }
    }
}

/// The pulley connects two bodies to ground and to each other so that
/// `length_a + ratio * length_b` stays constant. The supporting ground lengths
/// should not reach zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PulleyJoint {
    base: JointBase,
    ground_anchor_a: Vec2,
    ground_anchor_b: Vec2,
    length_a: Real,
    length_b: Real,

    // Solver shared
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    constant: Real,
    ratio: Real,
    impulse: Real,

    // Solver temp
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: Real,
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> Self {
        debug_assert!(def.ratio != Real::ZERO);
        PulleyJoint {
            base: JointBase::new(def.body_a, def.body_b, def.collide_connected, def.user_data),
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            length_a: def.length_a,
            length_b: def.length_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            constant: def.length_a + def.ratio * def.length_b,
            ratio: def.ratio,
            impulse: Real::ZERO,
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Real::ZERO,
        }
    }

    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    /// Reference length of the segment attached to body A.
    pub fn length_a(&self) -> Real {
        self.length_a
    }

    pub fn length_b(&self) -> Real {
        self.length_b
    }

    pub fn ratio(&self) -> Real {
        self.ratio
    }

    /// Current length of the segment attached to body A.
    pub fn current_length_a(&self, body_a: &RigidBody) -> Real {
        (body_a.world_point(self.local_anchor_a) - self.ground_anchor_a).magnitude()
    }

    pub fn current_length_b(&self, body_b: &RigidBody) -> Real {
        (body_b.world_point(self.local_anchor_b) - self.ground_anchor_b).magnitude()
    }

    /// Moves the ground anchors along with a world origin shift.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.ground_anchor_a -= new_origin;
        self.ground_anchor_b -= new_origin;
    }
}

/// Normalises `u` in place when the rope segment is long enough to have a
/// meaningful direction; zero otherwise. Returns the segment length.
fn rope_direction(u: &mut Vec2) -> Real {
    let length = u.magnitude();
    if length > Real::from_f32(10.0) * LINEAR_SLOP {
        *u = *u * (Real::ONE / length);
    } else {
        *u = Vec2::ZERO;
    }
    length
}

impl Constraint for PulleyJoint {
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

        // Get the pulley axes.
        self.u_a = c_a + self.r_a - self.ground_anchor_a;
        self.u_b = c_b + self.r_b - self.ground_anchor_b;
        rope_direction(&mut self.u_a);
        rope_direction(&mut self.u_b);

        // Compute effective mass.
        let ru_a = self.r_a.cross(self.u_a);
        let ru_b = self.r_b.cross(self.u_b);

        let m_a_eff = m_a + i_a * ru_a * ru_a;
        let m_b_eff = m_b + i_b * ru_b * ru_b;

        self.mass = m_a_eff + self.ratio * self.ratio * m_b_eff;
        if self.mass > Real::ZERO {
            self.mass = Real::ONE / self.mass;
        }

        if data.step.warm_starting {
            // Scale impulses to support variable time steps.
            self.impulse *= data.step.dt_ratio;

            // Warm starting.
            let p_a = self.u_a * -self.impulse;
            let p_b = self.u_b * (-self.ratio * self.impulse);

            v_a += p_a * m_a;
            w_a += i_a * self.r_a.cross(p_a);
            v_b += p_b * m_b;
            w_b += i_b * self.r_b.cross(p_b);
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

        let vp_a = v_a + Vec2::scalar_cross(w_a, self.r_a);
        let vp_b = v_b + Vec2::scalar_cross(w_b, self.r_b);

        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = self.u_a * -impulse;
        let p_b = self.u_b * (-self.ratio * impulse);
        v_a += p_a * b.inv_mass_a;
        w_a += b.inv_i_a * self.r_a.cross(p_a);
        v_b += p_b * b.inv_mass_b;
        w_b += b.inv_i_b * self.r_b.cross(p_b);

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

        let r_a = q_a.apply(self.local_anchor_a - b.local_center_a);
        let r_b = q_b.apply(self.local_anchor_b - b.local_center_b);

        // Get the pulley axes.
        let mut u_a = c_a + r_a - self.ground_anchor_a;
        let mut u_b = c_b + r_b - self.ground_anchor_b;
        let length_a = rope_direction(&mut u_a);
        let length_b = rope_direction(&mut u_b);

        // Compute effective mass.
        let ru_a = r_a.cross(u_a);
        let ru_b = r_b.cross(u_b);

        let m_a_eff = m_a + i_a * ru_a * ru_a;
        let m_b_eff = m_b + i_b * ru_b * ru_b;

        let mut mass = m_a_eff + self.ratio * self.ratio * m_b_eff;
        if mass > Real::ZERO {
            mass = Real::ONE / mass;
        }

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;

        let p_a = u_a * -impulse;
        let p_b = u_b * (-self.ratio * impulse);

        c_a += p_a * m_a;
        a_a += i_a * r_a.cross(p_a);
        c_b += p_b * m_b;
        a_b += i_b * r_b.cross(p_b);

        data.positions[ia].c = c_a;
        data.positions[ia].a = a_a;
        data.positions[ib].c = c_b;
        data.positions[ib].a = a_b;

        linear_error < LINEAR_SLOP
    }

    fn anchor_a(&self, body_a: &RigidBody) -> Vec2 {
        body_a.world_point(self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.world_point(self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        self.u_b * (inv_dt * self.impulse)
    }

    fn reaction_torque(&self, _inv_dt: Real) -> Real {
        Real::ZERO
    }

    fn dump(&self, index: usize) {
        self.base.dump_begin("PulleyJointDef");
        log::info!(target: DUMP_TARGET, "      ground_anchor_a: {},", dump_vec(self.ground_anchor_a));
        log::info!(target: DUMP_TARGET, "      ground_anchor_b: {},", dump_vec(self.ground_anchor_b));
        log::info!(target: DUMP_TARGET, "      local_anchor_a: {},", dump_vec(self.local_anchor_a));
        log::info!(target: DUMP_TARGET, "      local_anchor_b: {},", dump_vec(self.local_anchor_b));
        log::info!(target: DUMP_TARGET, "      length_a: {:.9e},", self.length_a);
        log::info!(target: DUMP_TARGET, "      length_b: {:.9e},", self.length_b);
        log::info!(target: DUMP_TARGET, "      ratio: {:.9e},", self.ratio);
        self.base.dump_end(index);
    }
}
