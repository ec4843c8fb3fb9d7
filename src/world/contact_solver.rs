//! Sequential-impulse solver for contact manifolds.

use crate::collision::{Manifold, ManifoldType, WorldManifold};
use crate::common::settings::{
    BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE, VELOCITY_THRESHOLD,
};
use crate::common::Arena;
use crate::constraints::{Position, TimeStep, Velocity};
use crate::math::{Mat22, Real, Rot, Scalar, Transform, Vec2};
use crate::objects::{ContactHandle, Fixture, RigidBody};

use super::contact::{Contact, ContactImpulse};

#[derive(Debug, Clone, Copy, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: Real,
    tangent_impulse: Real,
    normal_mass: Real,
    tangent_mass: Real,
    velocity_bias: Real,
}

#[derive(Debug, Clone)]
struct ContactVelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    normal_mass: Mat22,
    k: Mat22,
    index_a: usize,
    index_b: usize,
    inv_mass_a: Real,
    inv_mass_b: Real,
    inv_i_a: Real,
    inv_i_b: Real,
    friction: Real,
    restitution: Real,
    tangent_speed: Real,
    point_count: usize,
    contact: ContactHandle,
}

#[derive(Debug, Clone)]
struct ContactPositionConstraint {
    /// Local points, normal and type of the manifold as of solver creation.
    manifold: Manifold,
    index_a: usize,
    index_b: usize,
    inv_mass_a: Real,
    inv_mass_b: Real,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: Real,
    inv_i_b: Real,
    radius_a: Real,
    radius_b: Real,
}

/// World-space normal, point and separation of one manifold point for the
/// current solver positions.
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: Real,
}

impl PositionSolverManifold {
    fn new(pc: &ContactPositionConstraint, xf_a: &Transform, xf_b: &Transform, index: usize) -> Self {
        let m = &pc.manifold;
        debug_assert!(m.point_count > 0);
        let radii = pc.radius_a + pc.radius_b;

        match m.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(m.local_point);
                let point_b = xf_b.apply(m.points[0].local_point);
                let mut normal = point_b - point_a;
                normal.normalize_mut();
                PositionSolverManifold {
                    normal,
                    point: (point_a + point_b) * Real::HALF,
                    separation: (point_b - point_a).dot(normal) - radii,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.apply(m.local_normal);
                let plane_point = xf_a.apply(m.local_point);
                let clip_point = xf_b.apply(m.points[index].local_point);
                PositionSolverManifold {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - radii,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.apply(m.local_normal);
                let plane_point = xf_b.apply(m.local_point);
                let clip_point = xf_a.apply(m.points[index].local_point);
                // Ensure normal points from A to B.
                PositionSolverManifold {
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - radii,
                }
            }
        }
    }
}

/// Body transform rebuilt from a solver position.
fn solver_transform(c: Vec2, a: Real, local_center: Vec2) -> Transform {
    let q = Rot::new(a);
    Transform {
        p: c - q.apply(local_center),
        q,
    }
}

/// Total enumeration of the two-point LCP `vn = K * x + b`, `vn >= 0`,
/// `x >= 0`, `vn_i * x_i = 0`. Returns the new total impulse, or `None` when
/// no case applies. This is hit sometimes, but it doesn't seem to matter.
fn solve_block(k: &Mat22, normal_mass: &Mat22, point_masses: (Real, Real), b: Vec2) -> Option<Vec2> {
    // Case 1: vn = 0
    //
    // 0 = A * x + b'
    //
    // Solve for x:
    //
    // x = - inv(A) * b'
    let x = -normal_mass.mul_vec(b);
    if x.x >= Real::ZERO && x.y >= Real::ZERO {
        return Some(x);
    }

    // Case 2: vn1 = 0 and x2 = 0
    //
    //   0 = a11 * x1 + a12 * 0 + b1'
    // vn2 = a21 * x1 + a22 * 0 + b2'
    let x = Vec2::new(-point_masses.0 * b.x, Real::ZERO);
    let vn2 = k.ex.y * x.x + b.y;
    if x.x >= Real::ZERO && vn2 >= Real::ZERO {
        return Some(x);
    }

    // Case 3: vn2 = 0 and x1 = 0
    //
    // vn1 = a11 * 0 + a12 * x2 + b1'
    //   0 = a21 * 0 + a22 * x2 + b2'
    let x = Vec2::new(Real::ZERO, -point_masses.1 * b.y);
    let vn1 = k.ey.x * x.y + b.x;
    if x.y >= Real::ZERO && vn1 >= Real::ZERO {
        return Some(x);
    }

    // Case 4: x1 = 0 and x2 = 0
    //
    // vn1 = b1
    // vn2 = b2
    if b.x >= Real::ZERO && b.y >= Real::ZERO {
        return Some(Vec2::ZERO);
    }

    None
}

/// Solves the touching contacts of one island.
pub(crate) struct ContactSolver {
    velocity_constraints: Vec<ContactVelocityConstraint>,
    position_constraints: Vec<ContactPositionConstraint>,
}

impl ContactSolver {
    /// Snapshots the manifolds and body mass data. Bodies must already carry
    /// their island indices. Stored impulses are scaled by the step ratio
    /// when warm starting.
    pub(crate) fn new(
        step: TimeStep,
        handles: &[ContactHandle],
        contacts: &Arena<Contact>,
        fixtures: &Arena<Fixture>,
        bodies: &Arena<RigidBody>,
    ) -> Self {
        let mut velocity_constraints = Vec::with_capacity(handles.len());
        let mut position_constraints = Vec::with_capacity(handles.len());

        for &handle in handles {
            let contact = &contacts[handle];
            let radius_a = fixtures[contact.fixture_a].shape().radius();
            let radius_b = fixtures[contact.fixture_b].shape().radius();
            let body_a = &bodies[contact.body_a];
            let body_b = &bodies[contact.body_b];
            let manifold = contact.manifold;

            let point_count = manifold.point_count;
            debug_assert!(point_count > 0);

            let mut vc = ContactVelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                normal: Vec2::ZERO,
                normal_mass: Mat22::ZERO,
                k: Mat22::ZERO,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                friction: contact.friction,
                restitution: contact.restitution,
                tangent_speed: contact.tangent_speed,
                point_count,
                contact: handle,
            };

            for (vcp, cp) in vc.points.iter_mut().zip(manifold.points()) {
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * cp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * cp.tangent_impulse;
                }
            }

            velocity_constraints.push(vc);
            position_constraints.push(ContactPositionConstraint {
                manifold,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                radius_a,
                radius_b,
            });
        }

        ContactSolver {
            velocity_constraints,
            position_constraints,
        }
    }

    /// Computes anchors, effective masses, restitution bias and the block
    /// solver matrix from the current solver state.
    pub(crate) fn initialize_velocity_constraints(&mut self, positions: &[Position], velocities: &[Velocity]) {
        for (vc, pc) in self.velocity_constraints.iter_mut().zip(&self.position_constraints) {
            let (ia, ib) = (vc.index_a, vc.index_b);
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let c_a = positions[ia].c;
            let v_a = velocities[ia].v;
            let w_a = velocities[ia].w;

            let c_b = positions[ib].c;
            let v_b = velocities[ib].v;
            let w_b = velocities[ib].w;

            let xf_a = solver_transform(c_a, positions[ia].a, pc.local_center_a);
            let xf_b = solver_transform(c_b, positions[ib].a, pc.local_center_b);

            let world_manifold = WorldManifold::new(&pc.manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = world_manifold.normal;
            let normal = vc.normal;
            let tangent = normal.cross_scalar(Real::ONE);

            for (vcp, &point) in vc.points[..vc.point_count].iter_mut().zip(&world_manifold.points) {
                vcp.r_a = point - c_a;
                vcp.r_b = point - c_b;

                let rn_a = vcp.r_a.cross(normal);
                let rn_b = vcp.r_b.cross(normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > Real::ZERO { Real::ONE / k_normal } else { Real::ZERO };

                let rt_a = vcp.r_a.cross(tangent);
                let rt_b = vcp.r_b.cross(tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > Real::ZERO { Real::ONE / k_tangent } else { Real::ZERO };

                // Setup a velocity bias for restitution.
                vcp.velocity_bias = Real::ZERO;
                let v_rel = normal.dot(v_b + Vec2::scalar_cross(w_b, vcp.r_b) - v_a - Vec2::scalar_cross(w_a, vcp.r_a));
                if v_rel < -VELOCITY_THRESHOLD {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // If we have two points, then prepare the block solver.
            if vc.point_count == 2 {
                let (p1, p2) = (&vc.points[0], &vc.points[1]);
                let rn1_a = p1.r_a.cross(normal);
                let rn1_b = p1.r_b.cross(normal);
                let rn2_a = p2.r_a.cross(normal);
                let rn2_b = p2.r_b.cross(normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                // Ensure a reasonable condition number for the block solver.
                let max_condition_number = Real::from_f32(1000.0);
                if k11 * k11 < max_condition_number * (k11 * k22 - k12 * k12) {
                    // K is safe to invert.
                    vc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // The constraints are redundant, just use one.
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Applies the scaled impulses carried over from the previous step.
    pub(crate) fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let (ia, ib) = (vc.index_a, vc.index_b);
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let mut v_a = velocities[ia].v;
            let mut w_a = velocities[ia].w;
            let mut v_b = velocities[ib].v;
            let mut w_b = velocities[ib].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(Real::ONE);

            for vcp in &vc.points[..vc.point_count] {
                let p = normal * vcp.normal_impulse + tangent * vcp.tangent_impulse;
                w_a -= i_a * vcp.r_a.cross(p);
                v_a -= p * m_a;
                w_b += i_b * vcp.r_b.cross(p);
                v_b += p * m_b;
            }

            velocities[ia] = Velocity { v: v_a, w: w_a };
            velocities[ib] = Velocity { v: v_b, w: w_b };
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let (ia, ib) = (vc.index_a, vc.index_b);
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let mut v_a = velocities[ia].v;
            let mut w_a = velocities[ia].w;
            let mut v_b = velocities[ib].v;
            let mut w_b = velocities[ib].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(Real::ONE);
            let friction = vc.friction;

            debug_assert!(vc.point_count == 1 || vc.point_count == 2);

            // Solve tangent constraints first because non-penetration is more
            // important than friction.
            for vcp in &mut vc.points[..vc.point_count] {
                // Relative velocity at contact
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b) - v_a - Vec2::scalar_cross(w_a, vcp.r_a);

                // Compute tangent force
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let mut lambda = vcp.tangent_mass * (-vt);

                // Clamp the accumulated force
                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp_to(-max_friction, max_friction);
                lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                // Apply contact impulse
                let p = tangent * lambda;

                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            }

            if vc.point_count == 1 {
                let vcp = &mut vc.points[0];

                // Relative velocity at contact
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b) - v_a - Vec2::scalar_cross(w_a, vcp.r_a);

                // Compute normal impulse
                let vn = dv.dot(normal);
                let mut lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                // Clamp the accumulated impulse
                let new_impulse = (vcp.normal_impulse + lambda).max(Real::ZERO);
                lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                // Apply contact impulse
                let p = normal * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            } else {
                // Block solver developed in collaboration with Dirk Gregorius (back in 01/07 on Box2D_Lite).
                // Build the mini LCP for this contact patch
                //
                // vn = A * x + b, vn >= 0, x >= 0 and vn_i * x_i = 0 with i = 1..2
                //
                // A = J * W * JT and J = ( -n, -r1 x n, n, r2 x n )
                // b = vn0 - velocityBias
                //
                // The system is solved using the "Total enumeration method" (s. Murty). The complementary constraint vn_i * x_i
                // implies that we must have in any solution either vn_i = 0 or x_i = 0. So for the 2D contact problem the cases
                // vn1 = 0 and vn2 = 0, x1 = 0 and x2 = 0, x1 = 0 and vn2 = 0, x2 = 0 and vn1 = 0 need to be tested. The first valid
                // solution that satisfies the problem is chosen.
                //
                // In order to account of the accumulated impulse 'a' (because of the iterative nature of the solver which only requires
                // that the accumulated impulse is clamped and not the incremental impulse) we change the impulse variable (x_i).
                //
                // Substitute:
                //
                // x = a + d
                //
                // a := old total impulse
                // x := new total impulse
                // d := incremental impulse
                //
                // For the current iteration we extend the formula for the incremental impulse
                // to compute the new total impulse:
                //
                // vn = A * d + b
                //    = A * (x - a) + b
                //    = A * x + b - A * a
                //    = A * x + b'
                // b' = b - A * a;

                let [cp1, cp2] = &mut vc.points;

                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= Real::ZERO && a.y >= Real::ZERO);

                // Relative velocity at contact
                let dv1 = v_b + Vec2::scalar_cross(w_b, cp1.r_b) - v_a - Vec2::scalar_cross(w_a, cp1.r_a);
                let dv2 = v_b + Vec2::scalar_cross(w_b, cp2.r_b) - v_a - Vec2::scalar_cross(w_a, cp2.r_a);

                // Compute normal velocity
                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                // Compute b'
                let b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias) - vc.k.mul_vec(a);

                if let Some(x) = solve_block(&vc.k, &vc.normal_mass, (cp1.normal_mass, cp2.normal_mass), b) {
                    // Resubstitute for the incremental impulse
                    let d = x - a;

                    // Apply incremental impulse
                    let p1 = normal * d.x;
                    let p2 = normal * d.y;
                    v_a -= (p1 + p2) * m_a;
                    w_a -= i_a * (cp1.r_a.cross(p1) + cp2.r_a.cross(p2));

                    v_b += (p1 + p2) * m_b;
                    w_b += i_b * (cp1.r_b.cross(p1) + cp2.r_b.cross(p2));

                    // Accumulate
                    cp1.normal_impulse = x.x;
                    cp2.normal_impulse = x.y;
                }
            }

            velocities[ia] = Velocity { v: v_a, w: w_a };
            velocities[ib] = Velocity { v: v_b, w: w_b };
        }
    }

    /// Writes the accumulated impulses back into the contact manifolds for
    /// warm starting the next step.
    pub(crate) fn store_impulses(&self, contacts: &mut Arena<Contact>) {
        for vc in &self.velocity_constraints {
            let Some(contact) = contacts.get_mut(vc.contact) else {
                continue;
            };
            for (mp, vcp) in contact.manifold.points.iter_mut().zip(&vc.points[..vc.point_count]) {
                mp.normal_impulse = vcp.normal_impulse;
                mp.tangent_impulse = vcp.tangent_impulse;
            }
        }
    }

    /// Accumulated impulses of every solved contact, in solver order.
    pub(crate) fn impulses(&self) -> impl Iterator<Item = (ContactHandle, ContactImpulse)> + '_ {
        self.velocity_constraints.iter().map(|vc| {
            let mut impulse = ContactImpulse {
                count: vc.point_count,
                ..ContactImpulse::default()
            };
            for (j, vcp) in vc.points[..vc.point_count].iter().enumerate() {
                impulse.normal_impulses[j] = vcp.normal_impulse;
                impulse.tangent_impulses[j] = vcp.tangent_impulse;
            }
            (vc.contact, impulse)
        })
    }

    /// Sequential solver. Returns true when the deepest penetration is
    /// within three times the linear slop.
    pub(crate) fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let min_separation = self.solve_positions(positions, BAUMGARTE, |pc| {
            (pc.inv_mass_a, pc.inv_i_a, pc.inv_mass_b, pc.inv_i_b)
        });

        // We can't expect min_separation >= -LINEAR_SLOP because we don't
        // push the separation above -LINEAR_SLOP.
        min_separation >= -Real::from_f32(3.0) * LINEAR_SLOP
    }

    /// Sequential position solver for time of impact. Only the two TOI
    /// bodies move; everything else is treated as static.
    pub(crate) fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let is_toi_body = |index: usize| index == toi_index_a || index == toi_index_b;
        let min_separation = self.solve_positions(positions, TOI_BAUMGARTE, |pc| {
            let (mut m_a, mut i_a, mut m_b, mut i_b) = (Real::ZERO, Real::ZERO, Real::ZERO, Real::ZERO);
            if is_toi_body(pc.index_a) {
                m_a = pc.inv_mass_a;
                i_a = pc.inv_i_a;
            }
            if is_toi_body(pc.index_b) {
                m_b = pc.inv_mass_b;
                i_b = pc.inv_i_b;
            }
            (m_a, i_a, m_b, i_b)
        });

        // We can't expect min_separation >= -LINEAR_SLOP because we don't
        // push the separation above -LINEAR_SLOP.
        min_separation >= -Real::from_f32(1.5) * LINEAR_SLOP
    }

    /// Pushes every manifold point apart along its normal and returns the
    /// minimum separation seen before correction.
    fn solve_positions(
        &self,
        positions: &mut [Position],
        baumgarte: Real,
        masses: impl Fn(&ContactPositionConstraint) -> (Real, Real, Real, Real),
    ) -> Real {
        let mut min_separation: Real = Real::ZERO;

        for pc in &self.position_constraints {
            let (ia, ib) = (pc.index_a, pc.index_b);
            let (m_a, i_a, m_b, i_b) = masses(pc);

            let mut c_a = positions[ia].c;
            let mut a_a = positions[ia].a;
            let mut c_b = positions[ib].c;
            let mut a_b = positions[ib].a;

            // Solve normal constraints
            for j in 0..pc.manifold.point_count {
                let xf_a = solver_transform(c_a, a_a, pc.local_center_a);
                let xf_b = solver_transform(c_b, a_b, pc.local_center_b);

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);
                let normal = psm.normal;

                let r_a = psm.point - c_a;
                let r_b = psm.point - c_b;

                // Track max constraint error.
                min_separation = min_separation.min(psm.separation);

                // Prevent large corrections and allow slop.
                let c = (baumgarte * (psm.separation + LINEAR_SLOP)).clamp_to(-MAX_LINEAR_CORRECTION, Real::ZERO);

                // Compute the effective mass.
                let rn_a = r_a.cross(normal);
                let rn_b = r_b.cross(normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                // Compute normal impulse
                let impulse = if k > Real::ZERO { -c / k } else { Real::ZERO };

                let p = normal * impulse;

                c_a -= p * m_a;
                a_a -= i_a * r_a.cross(p);

                c_b += p * m_b;
                a_b += i_b * r_b.cross(p);
            }

            positions[ia] = Position { c: c_a, a: a_a };
            positions[ib] = Position { c: c_b, a: a_b };
        }

        min_separation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{BodyDef, BodyHandle, FixtureDef, FixtureProxyKey};
    use crate::shapes::{Circle, Polygon};
    use approx::assert_abs_diff_eq;

    const EPSILON: Real = 1e-4;

    struct Scene {
        bodies: Arena<RigidBody>,
        fixtures: Arena<Fixture>,
        contacts: Arena<Contact>,
        handle: ContactHandle,
        body: BodyHandle,
        positions: Vec<Position>,
        velocities: Vec<Velocity>,
    }

    fn step(warm_starting: bool) -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting,
        }
    }

    /// A unit-mass dynamic body of shape `shape_b` over a static ground box
    /// whose top face is at y = 0.
    fn scene(shape_b: FixtureDef, y: Real) -> Scene {
        let mut bodies = Arena::new();
        let ground = bodies.insert_with(|h| RigidBody::new(h, &BodyDef::default()));
        let body = bodies.insert_with(|h| RigidBody::new(h, &BodyDef::dynamic(Vec2::new(0.0, y))));
        bodies[ground].island_index = 0;
        bodies[body].island_index = 1;
        bodies[body].inv_inertia = 1.0;

        let mut fixtures = Arena::new();
        let ground_def = FixtureDef::new(Polygon::new_oriented_box(5.0, 0.5, Vec2::new(0.0, -0.5), 0.0));
        let fa = fixtures.insert(Fixture::new(ground, &ground_def));
        let fb = fixtures.insert(Fixture::new(body, &shape_b));

        let key = |fixture| FixtureProxyKey { fixture, child_index: 0 };
        let mut contacts = Arena::new();
        let handle = contacts.insert(Contact::new(key(fa), &fixtures[fa], key(fb), &fixtures[fb]));
        contacts[handle].update(&fixtures, &mut bodies, None);

        let positions = vec![
            Position {
                c: bodies[ground].sweep.c,
                a: 0.0,
            },
            Position {
                c: bodies[body].sweep.c,
                a: 0.0,
            },
        ];
        let velocities = vec![Velocity::default(); 2];
        Scene {
            bodies,
            fixtures,
            contacts,
            handle,
            body,
            positions,
            velocities,
        }
    }

    fn solver(s: &Scene, warm_starting: bool) -> ContactSolver {
        let mut solver = ContactSolver::new(step(warm_starting), &[s.handle], &s.contacts, &s.fixtures, &s.bodies);
        solver.initialize_velocity_constraints(&s.positions, &s.velocities);
        solver
    }

    #[test]
    fn test_single_point_stops_approach() {
        let mut s = scene(FixtureDef::new(Circle::new(0.5)), 0.49);
        assert_eq!(s.contacts[s.handle].manifold().point_count, 1);
        s.velocities[1].v = Vec2::new(0.0, -0.5);

        let mut solver = solver(&s, false);
        solver.warm_start(&mut s.velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut s.velocities);
        }
        assert_abs_diff_eq!(s.velocities[1].v.y, 0.0, epsilon = EPSILON);

        solver.store_impulses(&mut s.contacts);
        assert_abs_diff_eq!(s.contacts[s.handle].manifold().points[0].normal_impulse, 0.5, epsilon = EPSILON);
    }

    #[test]
    fn test_restitution_bias_bounces() {
        let mut s = scene(FixtureDef::new(Circle::new(0.5)), 0.49);
        s.contacts[s.handle].set_restitution(0.5);
        s.velocities[1].v = Vec2::new(0.0, -4.0);

        let mut solver = solver(&s, false);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut s.velocities);
        }
        assert_abs_diff_eq!(s.velocities[1].v.y, 2.0, epsilon = EPSILON);
    }

    #[test]
    fn test_friction_is_bounded_by_normal_impulse() {
        let mut s = scene(FixtureDef::new(Circle::new(0.5)), 0.49);
        s.bodies[s.body].inv_inertia = 0.0;
        s.velocities[1].v = Vec2::new(3.0, -1.0);

        let mut solver = solver(&s, false);
        solver.solve_velocity_constraints(&mut s.velocities);

        // Friction runs before the normal pass, so the first iteration has
        // nothing to push against.
        assert_abs_diff_eq!(s.velocities[1].v.x, 3.0, epsilon = EPSILON);
        solver.solve_velocity_constraints(&mut s.velocities);
        assert_abs_diff_eq!(s.velocities[1].v.x, 3.0 - 0.2, epsilon = EPSILON);
    }

    #[test]
    fn test_block_solver_resting_box() {
        let mut s = scene(FixtureDef::new(Polygon::new_box(0.5, 0.5)), 0.49);
        assert_eq!(s.contacts[s.handle].manifold().point_count, 2);
        s.velocities[1].v = Vec2::new(0.0, -1.0);

        let mut solver = solver(&s, false);
        for _ in 0..4 {
            solver.solve_velocity_constraints(&mut s.velocities);
        }
        assert_abs_diff_eq!(s.velocities[1].v.y, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(s.velocities[1].w, 0.0, epsilon = EPSILON);

        let impulses: Vec<_> = solver.impulses().collect();
        assert_eq!(impulses.len(), 1);
        assert_eq!(impulses[0].1.count, 2);
        assert_abs_diff_eq!(impulses[0].1.normal_impulses[0], 0.5, epsilon = EPSILON);
        assert_abs_diff_eq!(impulses[0].1.normal_impulses[1], 0.5, epsilon = EPSILON);
    }

    #[test]
    fn test_warm_start_applies_stored_impulse() {
        let mut s = scene(FixtureDef::new(Circle::new(0.5)), 0.49);
        s.contacts[s.handle].manifold.points[0].normal_impulse = 0.25;

        let cold = solver(&s, false);
        cold.warm_start(&mut s.velocities);
        assert_eq!(s.velocities[1].v, Vec2::ZERO);

        let warm = solver(&s, true);
        warm.warm_start(&mut s.velocities);
        assert_abs_diff_eq!(s.velocities[1].v.y, 0.25, epsilon = EPSILON);
    }

    #[test]
    fn test_position_solver_resolves_penetration() {
        let mut s = scene(FixtureDef::new(Circle::new(0.5)), 0.3);
        let solver = solver(&s, false);

        assert!(!solver.solve_position_constraints(&mut s.positions));
        let mut converged = false;
        for _ in 0..20 {
            converged = solver.solve_position_constraints(&mut s.positions);
        }
        assert!(converged);
        // Ground is static.
        assert_eq!(s.positions[0].c, Vec2::new(0.0, 0.0));
        assert!(s.positions[1].c.y > 0.5 - 3.0 * LINEAR_SLOP);
    }

    #[test]
    fn test_toi_position_solver_moves_only_toi_bodies() {
        let mut s = scene(FixtureDef::new(Circle::new(0.5)), 0.3);
        let solver = solver(&s, false);

        // Neither island index is a TOI body, so nothing moves.
        let before = s.positions.clone();
        solver.solve_toi_position_constraints(&mut s.positions, 5, 6);
        assert_eq!(s.positions[1].c, before[1].c);

        solver.solve_toi_position_constraints(&mut s.positions, 0, 1);
        assert!(s.positions[1].c.y > before[1].c.y);
    }
}
