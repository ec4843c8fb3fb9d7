use crate::common::settings::*;
use crate::common::{Arena, Handle};
use crate::constraints::{Joint, JointHandle};
use crate::math::{Real, Rot, Scalar, Sweep, Transform, Vec2};
use crate::shapes::MassData;
use crate::world::contact::Contact;

use super::fixture::Fixture;

pub type BodyHandle = Handle<RigidBody>;
pub type FixtureHandle = Handle<Fixture>;
pub type ContactHandle = Handle<Contact>;

/// Static: zero mass, zero velocity, may be moved manually.
/// Kinematic: zero mass, non-zero velocity set by user, moved by the solver.
/// Dynamic: positive mass, velocity determined by forces, moved by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyType {
    #[default]
    Static,
    Kinematic,
    Dynamic,
}

/// Holds all the data needed to construct a rigid body. Reusable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyDef {
    pub body_type: BodyType,
    /// World position of the body origin.
    pub position: Vec2,
    /// World angle in radians.
    pub angle: Real,
    /// Linear velocity of the body origin in world coordinates.
    pub linear_velocity: Vec2,
    pub angular_velocity: Real,
    pub linear_damping: Real,
    pub angular_damping: Real,
    /// Set to false if this body should never fall asleep.
    pub allow_sleep: bool,
    pub awake: bool,
    /// Should this body be prevented from rotating? Useful for characters.
    pub fixed_rotation: bool,
    /// Fast moving body that should be prevented from tunneling through
    /// other moving bodies. Increases processing time.
    pub bullet: bool,
    pub active: bool,
    pub gravity_scale: Real,
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        BodyDef {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: Real::ZERO,
            linear_velocity: Vec2::ZERO,
            angular_velocity: Real::ZERO,
            linear_damping: Real::ZERO,
            angular_damping: Real::ZERO,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            active: true,
            gravity_scale: Real::ONE,
            user_data: 0,
        }
    }
}

impl BodyDef {
    /// A dynamic body definition at `position`.
    pub fn dynamic(position: Vec2) -> Self {
        BodyDef {
            body_type: BodyType::Dynamic,
            position,
            ..Default::default()
        }
    }
}

/// Connects a body to a joint and the other body of that joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointEdge {
    pub other: BodyHandle,
    pub joint: JointHandle,
}

/// A rigid body owned by a [`crate::world::PhysicsWorld`].
///
/// The transform tracks the body origin; the sweep tracks the center of mass.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub(crate) handle: BodyHandle,
    pub(crate) body_type: BodyType,

    pub(crate) island_flag: bool,
    pub(crate) awake: bool,
    pub(crate) auto_sleep: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) active: bool,

    pub(crate) island_index: usize,

    // Primary state
    pub(crate) xf: Transform,
    pub(crate) sweep: Sweep,
    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: Real,

    // Accumulators for forces/torques applied during a time step
    pub(crate) force: Vec2,
    pub(crate) torque: Real,

    pub(crate) fixtures: Vec<FixtureHandle>,
    pub(crate) joints: Vec<JointEdge>,
    pub(crate) contacts: Vec<ContactHandle>,

    pub(crate) mass: Real,
    pub(crate) inv_mass: Real,
    /// Rotational inertia about the center of mass.
    pub(crate) inertia: Real,
    pub(crate) inv_inertia: Real,

    pub(crate) linear_damping: Real,
    pub(crate) angular_damping: Real,
    pub(crate) gravity_scale: Real,

    pub(crate) sleep_time: Real,

    pub user_data: u64,
}

impl RigidBody {
    pub(crate) fn new(handle: BodyHandle, def: &BodyDef) -> Self {
        debug_assert!(def.position.is_valid());
        debug_assert!(def.linear_velocity.is_valid());
        debug_assert!(def.angular_velocity.is_valid());
        debug_assert!(def.angular_damping >= Real::ZERO && def.linear_damping >= Real::ZERO);

        let xf = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: xf.p,
            c: xf.p,
            a0: def.angle,
            a: def.angle,
            alpha0: Real::ZERO,
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (Real::ONE, Real::ONE)
        } else {
            (Real::ZERO, Real::ZERO)
        };

        RigidBody {
            handle,
            body_type: def.body_type,
            island_flag: false,
            awake: def.awake,
            auto_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            active: def.active,
            island_index: 0,
            xf,
            sweep,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::ZERO,
            torque: Real::ZERO,
            fixtures: Vec::new(),
            joints: Vec::new(),
            contacts: Vec::new(),
            mass,
            inv_mass,
            inertia: Real::ZERO,
            inv_inertia: Real::ZERO,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: Real::ZERO,
            user_data: def.user_data,
        }
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// The body transform for the body's origin.
    pub fn transform(&self) -> Transform {
        self.xf
    }

    /// World position of the body origin.
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    /// Current world rotation angle in radians.
    pub fn angle(&self) -> Real {
        self.sweep.a
    }

    /// World position of the center of mass.
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Local position of the center of mass.
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    /// Linear velocity of the center of mass.
    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(v) > Real::ZERO {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    /// Angular velocity in radians/second.
    pub fn angular_velocity(&self) -> Real {
        self.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, w: Real) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > Real::ZERO {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    /// Apply a force at a world point. If the force is not applied at the
    /// center of mass, it will generate a torque and affect the angular velocity.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        // Don't accumulate a force if the body is sleeping.
        if self.awake {
            self.force += force;
            self.torque += (point - self.sweep.c).cross(force);
        }
    }

    /// Apply a force to the center of mass.
    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.force += force;
        }
    }

    /// Apply a torque. This affects the angular velocity without affecting
    /// the linear velocity of the center of mass.
    pub fn apply_torque(&mut self, torque: Real, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.torque += torque;
        }
    }

    /// Apply an impulse at a point. This immediately modifies the velocity.
    /// It also modifies the angular velocity if the point of application is
    /// not at the center of mass.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.linear_velocity += impulse * self.inv_mass;
            self.angular_velocity += self.inv_inertia * (point - self.sweep.c).cross(impulse);
        }
    }

    pub fn apply_linear_impulse_to_center(&mut self, impulse: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.linear_velocity += impulse * self.inv_mass;
        }
    }

    pub fn apply_angular_impulse(&mut self, impulse: Real, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.angular_velocity += self.inv_inertia * impulse;
        }
    }

    /// Resets the force and torque accumulators.
    pub fn clear_accumulators(&mut self) {
        self.force = Vec2::ZERO;
        self.torque = Real::ZERO;
    }

    /// Total mass of the body in kilograms.
    pub fn mass(&self) -> Real {
        self.mass
    }

    /// Rotational inertia about the body origin.
    pub fn inertia(&self) -> Real {
        self.inertia + self.mass * self.sweep.local_center.dot(self.sweep.local_center)
    }

    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    /// Overrides the mass properties computed from the fixtures. Ignored for
    /// non-dynamic bodies. Does not wake the body.
    pub fn set_mass_data(&mut self, mass_data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.inv_mass = Real::ZERO;
        self.inertia = Real::ZERO;
        self.inv_inertia = Real::ZERO;

        self.mass = if mass_data.mass <= Real::ZERO { Real::ONE } else { mass_data.mass };
        self.inv_mass = Real::ONE / self.mass;

        if mass_data.inertia > Real::ZERO && !self.fixed_rotation {
            self.inertia = mass_data.inertia - self.mass * mass_data.center.dot(mass_data.center);
            debug_assert!(self.inertia > Real::ZERO);
            self.inv_inertia = Real::ONE / self.inertia;
        }

        self.shift_center(mass_data.center);
    }

    /// Recomputes mass, center of mass and inertia from the attached fixtures'
    /// densities and shapes.
    pub(crate) fn reset_mass_data(&mut self, fixtures: &Arena<Fixture>) {
        self.mass = Real::ZERO;
        self.inv_mass = Real::ZERO;
        self.inertia = Real::ZERO;
        self.inv_inertia = Real::ZERO;
        self.sweep.local_center = Vec2::ZERO;

        // Static and kinematic bodies have zero mass.
        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        // Accumulate mass over all fixtures.
        let mut local_center = Vec2::ZERO;
        for fixture in self.fixtures.iter().filter_map(|&f| fixtures.get(f)) {
            if fixture.density() == Real::ZERO {
                continue;
            }
            let mass_data = fixture.mass_data();
            self.mass += mass_data.mass;
            local_center += mass_data.center * mass_data.mass;
            self.inertia += mass_data.inertia;
        }

        if self.mass > Real::ZERO {
            self.inv_mass = Real::ONE / self.mass;
            local_center = local_center * self.inv_mass;
        } else {
            // Force all dynamic bodies to have a positive mass.
            self.mass = Real::ONE;
            self.inv_mass = Real::ONE;
        }

        if self.inertia > Real::ZERO && !self.fixed_rotation {
            // Center the inertia about the center of mass.
            self.inertia -= self.mass * local_center.dot(local_center);
            debug_assert!(self.inertia > Real::ZERO);
            self.inv_inertia = Real::ONE / self.inertia;
        } else {
            self.inertia = Real::ZERO;
            self.inv_inertia = Real::ZERO;
        }

        self.shift_center(local_center);
    }

    /// Moves the center of mass, keeping the origin fixed, and updates the
    /// center of mass velocity.
    fn shift_center(&mut self, local_center: Vec2) {
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf.apply(local_center);
        self.sweep.c0 = self.sweep.c;

        self.linear_velocity += Vec2::scalar_cross(self.angular_velocity, self.sweep.c - old_center);
    }

    /// World coordinates of a point given in body coordinates.
    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.apply(local_point)
    }

    /// World coordinates of a vector given in body coordinates.
    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q.apply(local_vector)
    }

    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.apply_inverse(world_point)
    }

    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.apply_inverse(world_vector)
    }

    /// World velocity of a world point attached to this body.
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity + Vec2::scalar_cross(self.angular_velocity, world_point - self.sweep.c)
    }

    pub fn linear_velocity_from_local_point(&self, local_point: Vec2) -> Vec2 {
        self.linear_velocity_from_world_point(self.world_point(local_point))
    }

    pub fn linear_damping(&self) -> Real {
        self.linear_damping
    }

    pub fn set_linear_damping(&mut self, linear_damping: Real) {
        self.linear_damping = linear_damping;
    }

    pub fn angular_damping(&self) -> Real {
        self.angular_damping
    }

    pub fn set_angular_damping(&mut self, angular_damping: Real) {
        self.angular_damping = angular_damping;
    }

    pub fn gravity_scale(&self) -> Real {
        self.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: Real) {
        self.gravity_scale = scale;
    }

    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    /// Treat this body like a bullet for continuous collision detection.
    pub fn set_bullet(&mut self, flag: bool) {
        self.bullet = flag;
    }

    pub fn is_sleeping_allowed(&self) -> bool {
        self.auto_sleep
    }

    /// Disabling sleep wakes the body.
    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        self.auto_sleep = flag;
        if !flag {
            self.set_awake(true);
        }
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Waking resets the sleep timer. Putting a body to sleep zeroes its
    /// velocity and clears its accumulated force and torque.
    pub fn set_awake(&mut self, flag: bool) {
        if flag {
            if !self.awake {
                self.awake = true;
                self.sleep_time = Real::ZERO;
            }
        } else {
            self.awake = false;
            self.sleep_time = Real::ZERO;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = Real::ZERO;
            self.clear_accumulators();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }

    pub fn joints(&self) -> &[JointEdge] {
        &self.joints
    }

    pub fn contacts(&self) -> &[ContactHandle] {
        &self.contacts
    }

    /// Rebuilds the transform from the end of the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q = Rot::new(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.apply(self.sweep.local_center);
    }

    /// Moves the whole sweep to `alpha` and rebuilds the transform there.
    pub(crate) fn advance(&mut self, alpha: Real) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Rejects pairs where neither body is dynamic or a joint between them
    /// disables collision.
    pub(crate) fn should_collide(&self, other: &RigidBody, joints: &Arena<Joint>) -> bool {
        if self.body_type != BodyType::Dynamic && other.body_type != BodyType::Dynamic {
            return false;
        }
        for edge in &self.joints {
            if edge.other == other.handle {
                if let Some(joint) = joints.get(edge.joint) {
                    if !joint.collide_connected() {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Updates the sleep timer for one island step and returns it. Moving
    /// bodies reset the timer.
    pub(crate) fn update_sleep_time(&mut self, dt: Real) -> Real {
        const LIN_TOL_SQR: Real = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
        const ANG_TOL_SQR: Real = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

        if !self.auto_sleep
            || self.angular_velocity * self.angular_velocity > ANG_TOL_SQR
            || self.linear_velocity.dot(self.linear_velocity) > LIN_TOL_SQR
        {
            self.sleep_time = Real::ZERO;
        } else {
            self.sleep_time += dt;
        }
        self.sleep_time
    }

    /// Emits a reconstruction script for this body and its fixtures.
    pub(crate) fn dump(&self, fixtures: &Arena<Fixture>) {
        use crate::common::DUMP_TARGET as TARGET;
        let index = self.handle.index();

        log::info!(target: TARGET, "{{");
        log::info!(target: TARGET, "  let mut bd = BodyDef::default();");
        log::info!(target: TARGET, "  bd.body_type = BodyType::{:?};", self.body_type);
        log::info!(target: TARGET, "  bd.position = Vec2::new({:.9e}, {:.9e});", self.xf.p.x, self.xf.p.y);
        log::info!(target: TARGET, "  bd.angle = {:.9e};", self.sweep.a);
        log::info!(
            target: TARGET,
            "  bd.linear_velocity = Vec2::new({:.9e}, {:.9e});",
            self.linear_velocity.x,
            self.linear_velocity.y
        );
        log::info!(target: TARGET, "  bd.angular_velocity = {:.9e};", self.angular_velocity);
        log::info!(target: TARGET, "  bd.linear_damping = {:.9e};", self.linear_damping);
        log::info!(target: TARGET, "  bd.angular_damping = {:.9e};", self.angular_damping);
        log::info!(target: TARGET, "  bd.allow_sleep = {};", self.auto_sleep);
        log::info!(target: TARGET, "  bd.awake = {};", self.awake);
        log::info!(target: TARGET, "  bd.fixed_rotation = {};", self.fixed_rotation);
        log::info!(target: TARGET, "  bd.bullet = {};", self.bullet);
        log::info!(target: TARGET, "  bd.active = {};", self.active);
        log::info!(target: TARGET, "  bd.gravity_scale = {:.9e};", self.gravity_scale);
        log::info!(target: TARGET, "  bodies.insert({}, world.create_body(&bd)?);", index);
        for &handle in &self.fixtures {
            if let Some(fixture) = fixtures.get(handle) {
                log::info!(target: TARGET, "  {{");
                fixture.dump(index);
                log::info!(target: TARGET, "  }}");
            }
        }
        log::info!(target: TARGET, "}}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Material;
    use crate::objects::fixture::FixtureDef;
    use crate::shapes::{Circle, Polygon};
    use approx::assert_abs_diff_eq;

    const EPSILON: Real = 1e-5;

    fn body(def: &BodyDef) -> (Arena<RigidBody>, BodyHandle) {
        let mut bodies = Arena::new();
        let handle = bodies.insert_with(|h| RigidBody::new(h, def));
        (bodies, handle)
    }

    fn attach(bodies: &mut Arena<RigidBody>, fixtures: &mut Arena<Fixture>, body: BodyHandle, def: FixtureDef) {
        let f = fixtures.insert(Fixture::new(body, &def));
        bodies[body].fixtures.push(f);
    }

    #[test]
    fn test_new_dynamic_body_defaults() {
        let (bodies, h) = body(&BodyDef::dynamic(Vec2::new(1.0, 2.0)));
        let b = &bodies[h];
        assert_eq!(b.handle(), h);
        assert_eq!(b.mass(), 1.0);
        assert_eq!(b.position(), Vec2::new(1.0, 2.0));
        assert_eq!(b.world_center(), Vec2::new(1.0, 2.0));
        assert!(b.is_awake());
    }

    #[test]
    fn test_reset_mass_data_from_fixtures() {
        let (mut bodies, h) = body(&BodyDef::dynamic(Vec2::ZERO));
        let mut fixtures = Arena::new();
        let shape = Polygon::new_oriented_box(1.0, 1.0, Vec2::new(1.0, 0.0), 0.0);
        attach(
            &mut bodies,
            &mut fixtures,
            h,
            FixtureDef::new(shape).with_material(Material::new(0.0, 0.2, 2.0)),
        );
        bodies[h].reset_mass_data(&fixtures);

        let b = &bodies[h];
        assert_abs_diff_eq!(b.mass(), 8.0, epsilon = EPSILON);
        assert_abs_diff_eq!(b.local_center().x, 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(b.world_center().x, 1.0, epsilon = EPSILON);
        // Box inertia about its center: m * (w^2 + h^2) / 12 with w = h = 2.
        assert_abs_diff_eq!(b.inertia, 8.0 * 8.0 / 12.0, epsilon = 1e-4);
        // About the origin adds the parallel-axis term.
        assert_abs_diff_eq!(b.inertia(), 8.0 * 8.0 / 12.0 + 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_zero_density_dynamic_body_gets_unit_mass() {
        let (mut bodies, h) = body(&BodyDef::dynamic(Vec2::ZERO));
        let mut fixtures = Arena::new();
        attach(&mut bodies, &mut fixtures, h, FixtureDef::new(Circle::new(1.0)));
        bodies[h].reset_mass_data(&fixtures);
        assert_eq!(bodies[h].mass(), 1.0);
        assert_eq!(bodies[h].inv_inertia, 0.0);
    }

    #[test]
    fn test_apply_force_at_point_generates_torque() {
        let (mut bodies, h) = body(&BodyDef::dynamic(Vec2::ZERO));
        let b = &mut bodies[h];
        b.apply_force(Vec2::new(0.0, 10.0), Vec2::new(2.0, 0.0), true);
        assert_eq!(b.force, Vec2::new(0.0, 10.0));
        assert_abs_diff_eq!(b.torque, 20.0, epsilon = EPSILON);

        b.clear_accumulators();
        assert_eq!(b.force, Vec2::ZERO);
        assert_eq!(b.torque, 0.0);
    }

    #[test]
    fn test_forces_ignored_on_static_body() {
        let (mut bodies, h) = body(&BodyDef::default());
        let b = &mut bodies[h];
        b.apply_force_to_center(Vec2::new(5.0, 0.0), true);
        b.apply_linear_impulse_to_center(Vec2::new(5.0, 0.0), true);
        b.set_linear_velocity(Vec2::new(1.0, 0.0));
        assert_eq!(b.force, Vec2::ZERO);
        assert_eq!(b.linear_velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_sleeping_body_ignores_force_without_wake() {
        let (mut bodies, h) = body(&BodyDef::dynamic(Vec2::ZERO));
        let b = &mut bodies[h];
        b.set_linear_velocity(Vec2::new(1.0, 1.0));
        b.set_awake(false);
        assert_eq!(b.linear_velocity(), Vec2::ZERO);

        b.apply_force_to_center(Vec2::new(1.0, 0.0), false);
        assert_eq!(b.force, Vec2::ZERO);
        b.apply_force_to_center(Vec2::new(1.0, 0.0), true);
        assert!(b.is_awake());
        assert_eq!(b.force, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_linear_impulse_off_center() {
        let (mut bodies, h) = body(&BodyDef::dynamic(Vec2::ZERO));
        let b = &mut bodies[h];
        b.inv_inertia = 2.0;
        b.apply_linear_impulse(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0), true);
        assert_abs_diff_eq!(b.linear_velocity().y, 1.0, epsilon = EPSILON);
        assert_abs_diff_eq!(b.angular_velocity(), 2.0, epsilon = EPSILON);
    }

    #[test]
    fn test_local_world_round_trip() {
        let mut def = BodyDef::dynamic(Vec2::new(3.0, -1.0));
        def.angle = 0.7;
        let (bodies, h) = body(&def);
        let b = &bodies[h];
        let p = Vec2::new(0.25, 4.0);
        let back = b.local_point(b.world_point(p));
        assert_abs_diff_eq!(back.x, p.x, epsilon = EPSILON);
        assert_abs_diff_eq!(back.y, p.y, epsilon = EPSILON);
    }

    #[test]
    fn test_advance_moves_sweep_and_transform() {
        let (mut bodies, h) = body(&BodyDef::dynamic(Vec2::ZERO));
        let b = &mut bodies[h];
        b.sweep.c = Vec2::new(4.0, 0.0);
        b.advance(0.5);
        assert_abs_diff_eq!(b.sweep.c0.x, 2.0, epsilon = EPSILON);
        assert_abs_diff_eq!(b.position().x, 2.0, epsilon = EPSILON);
        assert_eq!(b.sweep.alpha0, 0.5);
    }

    #[test]
    fn test_sleep_timer() {
        let (mut bodies, h) = body(&BodyDef::dynamic(Vec2::ZERO));
        let b = &mut bodies[h];
        assert_abs_diff_eq!(b.update_sleep_time(0.25), 0.25, epsilon = EPSILON);
        b.linear_velocity = Vec2::new(1.0, 0.0);
        assert_eq!(b.update_sleep_time(0.25), 0.0);
    }
}
