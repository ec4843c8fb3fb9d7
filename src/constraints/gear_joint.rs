use crate::common::{Arena, PhysicsError, Result, DUMP_TARGET};
use crate::math::{Real, Rot, Scalar, Vec2};
use crate::objects::{BodyHandle, RigidBody};

use super::{Constraint, Joint, JointBase, JointHandle, JointType, SolverData};

/// Gear joint definition. The two joints must be revolute or prismatic and
/// each must attach a dynamic body to some other body (usually ground).
#[derive(Debug, Clone, PartialEq)]
pub struct GearJointDef {
    pub joint1: JointHandle,
    pub joint2: JointHandle,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The gear ratio.
    pub ratio: Real,
}

impl GearJointDef {
    pub fn new(joint1: JointHandle, joint2: JointHandle, ratio: Real) -> Self {
        GearJointDef {
            joint1,
            joint2,
            collide_connected: false,
            user_data: 0,
            ratio,
        }
    }
}

/// Anchor data pulled from a coupled revolute or prismatic joint.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coupling {
    kind: JointType,
    /// The joint's first body: ground side.
    ground: BodyHandle,
    /// The joint's second body: the geared body.
    body: BodyHandle,
    local_anchor_ground: Vec2,
    local_anchor_body: Vec2,
    reference_angle: Real,
    local_axis_ground: Vec2,
}

impl Coupling {
    fn from_joint(joint: &Joint) -> Result<Self> {
        match joint {
            Joint::Revolute(j) => Ok(Coupling {
                kind: JointType::Revolute,
                ground: j.base().body_a(),
                body: j.base().body_b(),
                local_anchor_ground: j.local_anchor_a(),
                local_anchor_body: j.local_anchor_b(),
                reference_angle: j.reference_angle(),
                local_axis_ground: Vec2::ZERO,
            }),
            Joint::Prismatic(j) => Ok(Coupling {
                kind: JointType::Prismatic,
                ground: j.base().body_a(),
                body: j.base().body_b(),
                local_anchor_ground: j.local_anchor_a(),
                local_anchor_body: j.local_anchor_b(),
                reference_angle: j.reference_angle(),
                local_axis_ground: j.local_axis_a(),
            }),
            _ => Err(PhysicsError::InvalidGearTarget),
        }
    }

    /// Joint coordinate: angle for revolute, translation for prismatic.
    fn coordinate(&self, body: &RigidBody, ground: &RigidBody) -> Real {
        if self.kind == JointType::Revolute {
            body.sweep.a - ground.sweep.a - self.reference_angle
        } else {
            let (xf_body, xf_ground) = (body.xf, ground.xf);
            let p_ground = self.local_anchor_ground;
            let p_body = xf_ground
                .q
                .apply_inverse(xf_body.q.apply(self.local_anchor_body) + (xf_body.p - xf_ground.p));
            (p_body - p_ground).dot(self.local_axis_ground)
        }
    }
}

/// Island snapshot of the two ground-side bodies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct GroundSnapshot {
    index: usize,
    local_center: Vec2,
    inv_mass: Real,
    inv_i: Real,
}

impl GroundSnapshot {
    fn take(body: &RigidBody) -> Self {
        GroundSnapshot {
            index: body.island_index,
            local_center: body.sweep.local_center,
            inv_mass: body.inv_mass,
            inv_i: body.inv_inertia,
        }
    }
}

/// Jacobian of one side of the gear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct GearJacobian {
    linear: Vec2,
    angular_body: Real,
    angular_ground: Real,
}

/// A gear joint connects two revolute and/or prismatic joints so that
/// `coordinate1 + ratio * coordinate2 = constant`. Body A and B are the second
/// bodies of joint 1 and joint 2; bodies C and D are their first bodies.
/// Destroying either coupled joint destroys the gear with it.
#[derive(Debug, Clone, PartialEq)]
pub struct GearJoint {
    base: JointBase,
    joint1: JointHandle,
    joint2: JointHandle,
    body_c: BodyHandle,
    body_d: BodyHandle,
    coupling_a: Coupling,
    coupling_b: Coupling,
    constant: Real,
    ratio: Real,

    // Solver shared
    impulse: Real,

    // Solver temp
    snapshot_c: GroundSnapshot,
    snapshot_d: GroundSnapshot,
    jac_ac: GearJacobian,
    jac_bd: GearJacobian,
    mass: Real,
}

impl GearJoint {
    pub(crate) fn new(
        def: &GearJointDef,
        handle1: JointHandle,
        joint1: &Joint,
        handle2: JointHandle,
        joint2: &Joint,
        bodies: &Arena<RigidBody>,
    ) -> Result<Self> {
        let coupling_a = Coupling::from_joint(joint1)?;
        let coupling_b = Coupling::from_joint(joint2)?;

        let body = |h: BodyHandle| bodies.get(h).ok_or(PhysicsError::InvalidHandle("body"));
        let coordinate_a = coupling_a.coordinate(body(coupling_a.body)?, body(coupling_a.ground)?);
        let coordinate_b = coupling_b.coordinate(body(coupling_b.body)?, body(coupling_b.ground)?);

        Ok(GearJoint {
            base: JointBase::new(coupling_a.body, coupling_b.body, def.collide_connected, def.user_data),
            joint1: handle1,
            joint2: handle2,
            body_c: coupling_a.ground,
            body_d: coupling_b.ground,
            coupling_a,
            coupling_b,
            constant: coordinate_a + def.ratio * coordinate_b,
            ratio: def.ratio,
            impulse: Real::ZERO,
            snapshot_c: GroundSnapshot::default(),
            snapshot_d: GroundSnapshot::default(),
            jac_ac: GearJacobian::default(),
            jac_bd: GearJacobian::default(),
            mass: Real::ZERO,
        })
    }

    pub fn joint1(&self) -> JointHandle {
        self.joint1
    }

    pub fn joint2(&self) -> JointHandle {
        self.joint2
    }

    /// Ground-side body of the first joint.
    pub fn body_c(&self) -> BodyHandle {
        self.body_c
    }

    /// Ground-side body of the second joint.
    pub fn body_d(&self) -> BodyHandle {
        self.body_d
    }

    pub fn ratio(&self) -> Real {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: Real) {
        debug_assert!(ratio.is_valid());
        self.ratio = ratio;
    }

    /// Builds the Jacobian and effective mass contribution of one coupling.
    /// `scale` is 1 for the first joint and the ratio for the second.
    #[allow(clippy::too_many_arguments)]
    fn jacobian(
        coupling: &Coupling,
        scale: Real,
        q_body: Rot,
        q_ground: Rot,
        center_body: Vec2,
        center_ground: Vec2,
        (m_body, i_body): (Real, Real),
        (m_ground, i_ground): (Real, Real),
    ) -> (GearJacobian, Real) {
        if coupling.kind == JointType::Revolute {
            let jac = GearJacobian {
                linear: Vec2::ZERO,
                angular_body: scale,
                angular_ground: scale,
            };
            (jac, scale * scale * (i_body + i_ground))
        } else {
            let u = q_ground.apply(coupling.local_axis_ground);
            let r_ground = q_ground.apply(coupling.local_anchor_ground - center_ground);
            let r_body = q_body.apply(coupling.local_anchor_body - center_body);
            let jac = GearJacobian {
                linear: u * scale,
                angular_body: scale * r_body.cross(u),
                angular_ground: scale * r_ground.cross(u),
            };
            let mass = scale * scale * (m_ground + m_body)
                + i_ground * jac.angular_ground * jac.angular_ground
                + i_body * jac.angular_body * jac.angular_body;
            (jac, mass)
        }
    }

    fn apply_impulse(&self, impulse: Real, data: &mut SolverData<'_>) {
        let b = &self.base;
        let (c, d) = (&self.snapshot_c, &self.snapshot_d);

        data.velocities[b.index_a].v += self.jac_ac.linear * (b.inv_mass_a * impulse);
        data.velocities[b.index_a].w += b.inv_i_a * impulse * self.jac_ac.angular_body;
        data.velocities[b.index_b].v += self.jac_bd.linear * (b.inv_mass_b * impulse);
        data.velocities[b.index_b].w += b.inv_i_b * impulse * self.jac_bd.angular_body;
        data.velocities[c.index].v -= self.jac_ac.linear * (c.inv_mass * impulse);
        data.velocities[c.index].w -= c.inv_i * impulse * self.jac_ac.angular_ground;
        data.velocities[d.index].v -= self.jac_bd.linear * (d.inv_mass * impulse);
        data.velocities[d.index].w -= d.inv_i * impulse * self.jac_bd.angular_ground;
    }
}

impl Constraint for GearJoint {
    fn base(&self) -> &JointBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut JointBase {
        &mut self.base
    }

    fn init_velocity_constraints(&mut self, data: &mut SolverData<'_>, bodies: &Arena<RigidBody>) {
        self.base.prepare(bodies);
        self.snapshot_c = GroundSnapshot::take(&bodies[self.body_c]);
        self.snapshot_d = GroundSnapshot::take(&bodies[self.body_d]);

        let b = &self.base;
        let (c, d) = (self.snapshot_c, self.snapshot_d);

        let q_a = Rot::new(data.positions[b.index_a].a);
        let q_b = Rot::new(data.positions[b.index_b].a);
        let q_c = Rot::new(data.positions[c.index].a);
        let q_d = Rot::new(data.positions[d.index].a);

        let (jac_ac, mass_ac) = Self::jacobian(
            &self.coupling_a,
            Real::ONE,
            q_a,
            q_c,
            b.local_center_a,
            c.local_center,
            (b.inv_mass_a, b.inv_i_a),
            (c.inv_mass, c.inv_i),
        );
        let (jac_bd, mass_bd) = Self::jacobian(
            &self.coupling_b,
            self.ratio,
            q_b,
            q_d,
            b.local_center_b,
            d.local_center,
            (b.inv_mass_b, b.inv_i_b),
            (d.inv_mass, d.inv_i),
        );
        self.jac_ac = jac_ac;
        self.jac_bd = jac_bd;

        let mass = mass_ac + mass_bd;
        self.mass = if mass > Real::ZERO { Real::ONE / mass } else { Real::ZERO };

        if data.step.warm_starting {
            self.apply_impulse(self.impulse, data);
        } else {
            self.impulse = Real::ZERO;
        }
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        let b = &self.base;
        let (c, d) = (&self.snapshot_c, &self.snapshot_d);
        let (va, vb) = (data.velocities[b.index_a], data.velocities[b.index_b]);
        let (vc, vd) = (data.velocities[c.index], data.velocities[d.index]);

        let mut cdot = self.jac_ac.linear.dot(va.v - vc.v) + self.jac_bd.linear.dot(vb.v - vd.v);
        cdot += (self.jac_ac.angular_body * va.w - self.jac_ac.angular_ground * vc.w)
            + (self.jac_bd.angular_body * vb.w - self.jac_bd.angular_ground * vd.w);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;
        self.apply_impulse(impulse, data);
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool {
        let b = &self.base;
        let (c, d) = (self.snapshot_c, self.snapshot_d);
        let (pa, pb) = (data.positions[b.index_a], data.positions[b.index_b]);
        let (pc, pd) = (data.positions[c.index], data.positions[d.index]);
        let (q_a, q_b, q_c, q_d) = (Rot::new(pa.a), Rot::new(pb.a), Rot::new(pc.a), Rot::new(pd.a));

        let (jac_ac, mass_ac) = Self::jacobian(
            &self.coupling_a,
            Real::ONE,
            q_a,
            q_c,
            b.local_center_a,
            c.local_center,
            (b.inv_mass_a, b.inv_i_a),
            (c.inv_mass, c.inv_i),
        );
        let (jac_bd, mass_bd) = Self::jacobian(
            &self.coupling_b,
            self.ratio,
            q_b,
            q_d,
            b.local_center_b,
            d.local_center,
            (b.inv_mass_b, b.inv_i_b),
            (d.inv_mass, d.inv_i),
        );

        let coordinate = |coupling: &Coupling, body: (Vec2, Real, Rot, Vec2), ground: (Vec2, Real, Rot, Vec2)| {
            let (c_body, a_body, q_body, lc_body) = body;
            let (c_ground, a_ground, q_ground, lc_ground) = ground;
            if coupling.kind == JointType::Revolute {
                a_body - a_ground - coupling.reference_angle
            } else {
                let r_body = q_body.apply(coupling.local_anchor_body - lc_body);
                let p_ground = coupling.local_anchor_ground - lc_ground;
                let p_body = q_ground.apply_inverse(r_body + (c_body - c_ground));
                (p_body - p_ground).dot(coupling.local_axis_ground)
            }
        };
        let coordinate_a = coordinate(
            &self.coupling_a,
            (pa.c, pa.a, q_a, b.local_center_a),
            (pc.c, pc.a, q_c, c.local_center),
        );
        let coordinate_b = coordinate(
            &self.coupling_b,
            (pb.c, pb.a, q_b, b.local_center_b),
            (pd.c, pd.a, q_d, d.local_center),
        );

        let position_error = (coordinate_a + self.ratio * coordinate_b) - self.constant;

        let mass = mass_ac + mass_bd;
        let impulse = if mass > Real::ZERO { -position_error / mass } else { Real::ZERO };

        data.positions[b.index_a].c += jac_ac.linear * (b.inv_mass_a * impulse);
        data.positions[b.index_a].a += b.inv_i_a * impulse * jac_ac.angular_body;
        data.positions[b.index_b].c += jac_bd.linear * (b.inv_mass_b * impulse);
        data.positions[b.index_b].a += b.inv_i_b * impulse * jac_bd.angular_body;
        data.positions[c.index].c -= jac_ac.linear * (c.inv_mass * impulse);
        data.positions[c.index].a -= c.inv_i * impulse * jac_ac.angular_ground;
        data.positions[d.index].c -= jac_bd.linear * (d.inv_mass * impulse);
        data.positions[d.index].a -= d.inv_i * impulse * jac_bd.angular_ground;

        // The gear never blocks convergence; the coupled joints do the limiting.
        true
    }

    fn anchor_a(&self, body_a: &RigidBody) -> Vec2 {
        body_a.world_point(self.coupling_a.local_anchor_body)
    }

    fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.world_point(self.coupling_b.local_anchor_body)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vec2 {
        self.jac_ac.linear * (inv_dt * self.impulse)
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.impulse * self.jac_ac.angular_body
    }

    fn dump(&self, index: usize) {
        log::info!(target: DUMP_TARGET, "  let jd = GearJointDef {{");
        log::info!(target: DUMP_TARGET, "      joint1: joints[&{}],", self.joint1.index());
        log::info!(target: DUMP_TARGET, "      joint2: joints[&{}],", self.joint2.index());
        log::info!(target: DUMP_TARGET, "      collide_connected: {},", self.base.collide_connected);
        log::info!(target: DUMP_TARGET, "      user_data: {},", self.base.user_data);
        log::info!(target: DUMP_TARGET, "      ratio: {:.9e},", self.ratio);
        self.base.dump_end(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::Rig;
    use crate::constraints::{
        DistanceJoint, DistanceJointDef, Position, PrismaticJoint, PrismaticJointDef, RevoluteJoint,
        RevoluteJointDef, Velocity,
    };
    use crate::objects::{BodyDef, BodyType};
    use approx::assert_abs_diff_eq;

    const EPSILON: Real = 1e-4;

    /// Ground plus two dynamic bodies; returns the rig and the third body.
    fn three_bodies(pos_c: Vec2) -> (Rig, BodyHandle) {
        let mut rig = Rig::new(&BodyDef::default(), &BodyDef::dynamic(Vec2::ZERO));
        let c = rig.bodies.insert_with(|h| RigidBody::new(h, &BodyDef::dynamic(pos_c)));
        let body = &mut rig.bodies[c];
        assert_eq!(body.body_type, BodyType::Dynamic);
        body.inertia = 1.0;
        body.inv_inertia = 1.0;
        body.island_index = 2;
        rig.positions.push(Position {
            c: body.sweep.c,
            a: body.sweep.a,
        });
        rig.velocities.push(Velocity::default());
        (rig, c)
    }

    fn joints() -> Arena<Joint> {
        Arena::new()
    }

    #[test]
    fn test_rejects_non_gear_targets() {
        let (rig, c) = three_bodies(Vec2::new(2.0, 0.0));
        let mut arena = joints();
        let def = DistanceJointDef::new(&rig.bodies[rig.a], &rig.bodies[c], Vec2::ZERO, Vec2::new(2.0, 0.0));
        let j1 = arena.insert(Joint::Distance(DistanceJoint::new(&def)));
        let gear = GearJointDef::new(j1, j1, 1.0);
        let result = GearJoint::new(&gear, j1, &arena[j1], j1, &arena[j1], &rig.bodies);
        assert_eq!(result.err(), Some(PhysicsError::InvalidGearTarget));
    }

    #[test]
    fn test_gear_couples_two_wheels() {
        let (mut rig, c) = three_bodies(Vec2::new(2.0, 0.0));
        let mut arena = joints();
        let def1 = RevoluteJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::ZERO);
        let def2 = RevoluteJointDef::new(&rig.bodies[rig.a], &rig.bodies[c], Vec2::new(2.0, 0.0));
        let j1 = arena.insert(Joint::Revolute(RevoluteJoint::new(&def1)));
        let j2 = arena.insert(Joint::Revolute(RevoluteJoint::new(&def2)));

        let gear_def = GearJointDef::new(j1, j2, 2.0);
        let mut gear = GearJoint::new(&gear_def, j1, &arena[j1], j2, &arena[j2], &rig.bodies).unwrap();
        assert_eq!(gear.base().body_a(), rig.b);
        assert_eq!(gear.base().body_b(), c);
        assert_eq!(gear.body_c(), rig.a);
        assert_eq!(gear.body_d(), rig.a);
        assert_eq!(gear.joint2(), j2);

        rig.velocities[1].w = 3.0;
        rig.solve_velocity(&mut gear, 5);
        let (w1, w2) = (rig.velocities[1].w, rig.velocities[2].w);
        assert_abs_diff_eq!(w1 + 2.0 * w2, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(w1, 2.4, epsilon = EPSILON);
    }

    #[test]
    fn test_gear_couples_rotation_to_translation() {
        let (mut rig, c) = three_bodies(Vec2::new(2.0, 0.0));
        let mut arena = joints();
        let def1 = RevoluteJointDef::new(&rig.bodies[rig.a], &rig.bodies[rig.b], Vec2::ZERO);
        let def2 = PrismaticJointDef::new(&rig.bodies[rig.a], &rig.bodies[c], Vec2::new(2.0, 0.0), Vec2::new(1.0, 0.0));
        let j1 = arena.insert(Joint::Revolute(RevoluteJoint::new(&def1)));
        let j2 = arena.insert(Joint::Prismatic(PrismaticJoint::new(&def2)));

        let gear_def = GearJointDef::new(j1, j2, 1.0);
        let mut gear = GearJoint::new(&gear_def, j1, &arena[j1], j2, &arena[j2], &rig.bodies).unwrap();

        rig.velocities[1].w = 1.0;
        rig.solve_velocity(&mut gear, 5);
        let (w1, v2) = (rig.velocities[1].w, rig.velocities[2].v.x);
        assert_abs_diff_eq!(w1 + v2, 0.0, epsilon = EPSILON);

        // Rotating the wheel drags the slider along its axis.
        rig.positions[1].a = 0.1;
        assert!(rig.solve_position(&mut gear, 1));
        let coordinate_a = rig.positions[1].a;
        let coordinate_b = rig.positions[2].c.x - 2.0;
        assert_abs_diff_eq!(coordinate_a + coordinate_b, 0.0, epsilon = EPSILON);
    }
}
