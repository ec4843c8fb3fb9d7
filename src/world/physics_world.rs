//! The world: owns every body, fixture, joint and contact, and advances them
//! through discrete and continuous steps.

use std::time::Instant;

use log::{debug, trace, warn};

use crate::collision::{time_of_impact, BroadPhase, SpatialGrid, ToiInput, ToiState, ToiStats, WorldManifold, AABB};
use crate::common::settings::{MAX_SUB_STEPS, MAX_TOI_CONTACTS};
use crate::common::{Arena, Color, DebugDraw, DrawFlags, PhysicsError, Result, DUMP_TARGET};
use crate::constraints::{Joint, JointDef, JointHandle, TimeStep};
use crate::math::{Real, Rot, Scalar, Transform, Vec2};
use crate::objects::{
    BodyDef, BodyHandle, BodyType, ContactHandle, Filter, Fixture, FixtureDef, FixtureHandle, FixtureProxyKey,
    JointEdge, RigidBody,
};
use crate::shapes::{RayCastInput, Shape};

use super::contact::{Contact, ContactFilter, ContactListener};
use super::contact_manager::ContactManager;
use super::island::{elapsed_ms, Island, IslandContext};

pub use crate::common::settings::DEFAULT_CELL_SIZE;

/// Runtime parameters of one call to [`PhysicsWorld::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepConfig {
    /// Iterations of the velocity constraint solver.
    pub velocity_iterations: usize,
    /// Iterations of the position constraint solver.
    pub position_iterations: usize,
    /// Seed the solver with last step's impulses.
    pub warm_starting: bool,
    /// Sweep fast bodies to their time of impact.
    pub continuous_physics: bool,
    /// Stop after the first TOI event, leaving the rest of the step for the
    /// next call. Useful for debugging continuous collision.
    pub sub_stepping: bool,
    pub allow_sleeping: bool,
}

impl Default for StepConfig {
    fn default() -> Self {
        StepConfig {
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            allow_sleeping: true,
        }
    }
}

/// Wall time spent in each phase of the last step, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Profile {
    pub step: f64,
    pub collide: f64,
    pub solve: f64,
    pub solve_init: f64,
    pub solve_velocity: f64,
    pub solve_position: f64,
    pub broadphase: f64,
    pub solve_toi: f64,
}

pub struct PhysicsWorld {
    bodies: Arena<RigidBody>,
    fixtures: Arena<Fixture>,
    joints: Arena<Joint>,
    contact_manager: ContactManager,

    gravity: Vec2,

    locked: bool,
    new_fixture: bool,
    auto_clear_forces: bool,

    // Used by sub-stepping: false while a TOI sub-step is pending.
    step_complete: bool,

    // This is used to compute the time step ratio to support a variable time step.
    inv_dt0: Real,

    profile: Profile,
    toi_stats: ToiStats,
    island: Island,
}

/// Moves the proxies of a body's fixtures to cover its motion over the last step.
fn synchronize_fixtures(
    body: &RigidBody,
    fixtures: &mut Arena<Fixture>,
    broad_phase: &mut dyn BroadPhase<FixtureProxyKey>,
) {
    let q = Rot::new(body.sweep.a0);
    let xf1 = Transform {
        p: body.sweep.c0 - q.apply(body.sweep.local_center),
        q,
    };
    for &handle in &body.fixtures {
        fixtures[handle].synchronize(broad_phase, &xf1, &body.xf);
    }
}

impl PhysicsWorld {
    /// Creates an empty world backed by a [`SpatialGrid`] broad phase.
    pub fn new(gravity: Vec2) -> Self {
        Self::with_broad_phase(gravity, Box::new(SpatialGrid::new(DEFAULT_CELL_SIZE)))
    }

    pub fn with_broad_phase(gravity: Vec2, broad_phase: Box<dyn BroadPhase<FixtureProxyKey>>) -> Self {
        PhysicsWorld {
            bodies: Arena::new(),
            fixtures: Arena::new(),
            joints: Arena::new(),
            contact_manager: ContactManager::new(broad_phase),
            gravity,
            locked: false,
            new_fixture: false,
            auto_clear_forces: true,
            step_complete: true,
            inv_dt0: Real::ZERO,
            profile: Profile::default(),
            toi_stats: ToiStats::default(),
            island: Island::default(),
        }
    }

    fn check_unlocked(&self, operation: &str) -> Result<()> {
        if self.locked {
            warn!("{} rejected: the world is locked", operation);
            return Err(PhysicsError::WorldLocked);
        }
        Ok(())
    }

    /// Register a contact event listener. Replaces any previous listener.
    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.contact_manager.listener = Some(listener);
    }

    /// Register a contact filter to provide specific control over collision.
    /// Otherwise the fixtures' filter data decides.
    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.contact_manager.filter = Some(filter);
    }

    // Bodies

    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle> {
        self.check_unlocked("create_body")?;
        let handle = self.bodies.insert_with(|h| RigidBody::new(h, def));
        trace!("created {:?} body {:?}", def.body_type, handle);
        Ok(handle)
    }

    /// Destroys a body together with its joints, contacts and fixtures.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<()> {
        self.check_unlocked("destroy_body")?;
        let body = self.bodies.get(handle).ok_or(PhysicsError::InvalidHandle("body"))?;

        // Delete the attached joints.
        let joints: Vec<JointHandle> = body.joints.iter().map(|edge| edge.joint).collect();
        for joint in joints {
            // Gear joints may already be gone with the joint they coupled.
            if self.joints.contains(joint) {
                self.destroy_joint(joint)?;
            }
        }

        // Delete the attached contacts.
        let contacts = self.bodies[handle].contacts.clone();
        for contact in contacts {
            self.contact_manager.destroy(contact, &mut self.bodies, &self.fixtures);
        }

        // Delete the attached fixtures. This destroys broad-phase proxies.
        let fixtures = std::mem::take(&mut self.bodies[handle].fixtures);
        for fixture in fixtures {
            if let Some(mut fixture) = self.fixtures.remove(fixture) {
                fixture.destroy_proxies(self.contact_manager.broad_phase.as_mut());
            }
        }

        self.bodies.remove(handle);
        trace!("destroyed body {:?}", handle);
        Ok(())
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.bodies.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Teleports a body. Contacts are updated on the next step.
    pub fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: Real) -> Result<()> {
        self.check_unlocked("set_transform")?;
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidHandle("body"))?;

        body.xf = Transform::new(position, angle);
        body.sweep.c = body.xf.apply(body.sweep.local_center);
        body.sweep.a = angle;
        body.sweep.c0 = body.sweep.c;
        body.sweep.a0 = angle;

        let xf = body.xf;
        for &fixture in &body.fixtures {
            self.fixtures[fixture].synchronize(self.contact_manager.broad_phase.as_mut(), &xf, &xf);
        }
        self.contact_manager
            .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
        Ok(())
    }

    /// Changes the body type, rebuilding mass and contacts.
    pub fn set_body_type(&mut self, handle: BodyHandle, body_type: BodyType) -> Result<()> {
        self.check_unlocked("set_body_type")?;
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidHandle("body"))?;
        if body.body_type == body_type {
            return Ok(());
        }

        body.body_type = body_type;
        body.reset_mass_data(&self.fixtures);

        if body_type == BodyType::Static {
            body.linear_velocity = Vec2::ZERO;
            body.angular_velocity = Real::ZERO;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c0 = body.sweep.c;
            synchronize_fixtures(body, &mut self.fixtures, self.contact_manager.broad_phase.as_mut());
        }

        body.set_awake(true);
        body.force = Vec2::ZERO;
        body.torque = Real::ZERO;

        // Delete the attached contacts.
        let contacts = body.contacts.clone();
        for contact in contacts {
            self.contact_manager.destroy(contact, &mut self.bodies, &self.fixtures);
        }

        // Touch the proxies so that new contacts will be created (when appropriate).
        for &fixture in &self.bodies[handle].fixtures {
            self.fixtures[fixture].touch_proxies(self.contact_manager.broad_phase.as_mut());
        }
        Ok(())
    }

    /// An inactive body is not simulated and cannot be collided with or
    /// woken up. Its fixtures leave the broad phase and its contacts are
    /// destroyed; joints stay attached.
    pub fn set_active(&mut self, handle: BodyHandle, flag: bool) -> Result<()> {
        self.check_unlocked("set_active")?;
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidHandle("body"))?;
        if body.active == flag {
            return Ok(());
        }
        body.active = flag;

        let xf = body.xf;
        let fixtures = body.fixtures.clone();
        if flag {
            // Create all proxies. Contacts are created the next time step.
            for fixture in fixtures {
                self.fixtures[fixture].create_proxies(fixture, self.contact_manager.broad_phase.as_mut(), &xf);
            }
            self.new_fixture = true;
        } else {
            // Destroy all proxies.
            for fixture in fixtures {
                self.fixtures[fixture].destroy_proxies(self.contact_manager.broad_phase.as_mut());
            }

            // Destroy the attached contacts.
            let contacts = self.bodies[handle].contacts.clone();
            for contact in contacts {
                self.contact_manager.destroy(contact, &mut self.bodies, &self.fixtures);
            }
        }
        Ok(())
    }

    pub fn set_fixed_rotation(&mut self, handle: BodyHandle, flag: bool) -> Result<()> {
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidHandle("body"))?;
        if body.fixed_rotation == flag {
            return Ok(());
        }
        body.fixed_rotation = flag;
        body.angular_velocity = Real::ZERO;
        body.reset_mass_data(&self.fixtures);
        Ok(())
    }

    /// Recomputes mass, center of mass and inertia from the body's fixtures,
    /// discarding any value set through `RigidBody::set_mass_data`.
    pub fn reset_mass_data(&mut self, handle: BodyHandle) -> Result<()> {
        self.check_unlocked("reset_mass_data")?;
        let body = self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidHandle("body"))?;
        body.reset_mass_data(&self.fixtures);
        Ok(())
    }

    // Fixtures

    /// Attaches a shape to a body. A fixture with positive density updates
    /// the body mass.
    pub fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> Result<FixtureHandle> {
        self.check_unlocked("create_fixture")?;
        let density = def.material.density;
        if !density.is_valid() || density < Real::ZERO {
            return Err(PhysicsError::InvalidDensity(density as f64));
        }
        let owner = self.bodies.get(body).ok_or(PhysicsError::InvalidHandle("body"))?;
        let (active, xf) = (owner.active, owner.xf);

        let handle = self.fixtures.insert(Fixture::new(body, def));
        if active {
            self.fixtures[handle].create_proxies(handle, self.contact_manager.broad_phase.as_mut(), &xf);
        }

        let owner = &mut self.bodies[body];
        owner.fixtures.push(handle);

        // Adjust mass properties if needed.
        if density > Real::ZERO {
            owner.reset_mass_data(&self.fixtures);
        }

        // New contacts are found at the beginning of the next time step.
        self.new_fixture = true;
        Ok(handle)
    }

    /// Detaches a fixture, destroying its contacts and updating the body mass.
    pub fn destroy_fixture(&mut self, handle: FixtureHandle) -> Result<()> {
        self.check_unlocked("destroy_fixture")?;
        let body = self.fixtures.get(handle).ok_or(PhysicsError::InvalidHandle("fixture"))?.body;

        // Destroy any contacts associated with the fixture.
        let contacts: Vec<ContactHandle> = self.bodies[body]
            .contacts
            .iter()
            .copied()
            .filter(|&c| {
                let contact = &self.contact_manager.contacts[c];
                contact.fixture_a == handle || contact.fixture_b == handle
            })
            .collect();
        for contact in contacts {
            self.contact_manager.destroy(contact, &mut self.bodies, &self.fixtures);
        }

        if let Some(mut fixture) = self.fixtures.remove(handle) {
            fixture.destroy_proxies(self.contact_manager.broad_phase.as_mut());
        }

        let owner = &mut self.bodies[body];
        owner.fixtures.retain(|&f| f != handle);
        owner.reset_mass_data(&self.fixtures);
        Ok(())
    }

    pub fn fixture(&self, handle: FixtureHandle) -> Option<&Fixture> {
        self.fixtures.get(handle)
    }

    /// Mutable access for material changes. Use [`PhysicsWorld::set_sensor`]
    /// and [`PhysicsWorld::set_filter`] for changes that affect contacts.
    pub fn fixture_mut(&mut self, handle: FixtureHandle) -> Option<&mut Fixture> {
        self.fixtures.get_mut(handle)
    }

    /// Sensors detect overlap but never generate a collision response. The
    /// body is woken only when the flag actually changes.
    pub fn set_sensor(&mut self, handle: FixtureHandle, flag: bool) -> Result<()> {
        let fixture = self.fixtures.get_mut(handle).ok_or(PhysicsError::InvalidHandle("fixture"))?;
        if fixture.is_sensor != flag {
            fixture.is_sensor = flag;
            self.bodies[fixture.body].set_awake(true);
        }
        Ok(())
    }

    /// Replaces the collision filter. Existing contacts are re-filtered on the
    /// next step and new pairs are found.
    pub fn set_filter(&mut self, handle: FixtureHandle, filter: Filter) -> Result<()> {
        let fixture = self.fixtures.get_mut(handle).ok_or(PhysicsError::InvalidHandle("fixture"))?;
        fixture.filter = filter;

        // Flag associated contacts for filtering.
        for &contact in &self.bodies[fixture.body].contacts {
            let contact = &mut self.contact_manager.contacts[contact];
            if contact.fixture_a == handle || contact.fixture_b == handle {
                contact.flag_for_filtering();
            }
        }

        // Touch each proxy so that new pairs may be created.
        fixture.touch_proxies(self.contact_manager.broad_phase.as_mut());
        Ok(())
    }

    // Joints

    /// Creates a joint. Contacts between the two bodies are re-filtered when
    /// the joint disables their collision.
    pub fn create_joint(&mut self, def: impl Into<JointDef>) -> Result<JointHandle> {
        self.check_unlocked("create_joint")?;
        let def = def.into();
        let joint = Joint::create(&def, &self.bodies, &self.joints)?;
        let (body_a, body_b) = (joint.body_a(), joint.body_b());
        let collide_connected = joint.collide_connected();
        let joint_type = joint.joint_type();

        let handle = self.joints.insert(joint);

        // Connect to the bodies' joint lists.
        self.bodies[body_a].joints.push(JointEdge {
            other: body_b,
            joint: handle,
        });
        self.bodies[body_b].joints.push(JointEdge {
            other: body_a,
            joint: handle,
        });

        // If the joint prevents collisions, then flag any contacts for filtering.
        if !collide_connected {
            self.flag_contacts_between(body_a, body_b);
        }

        trace!("created {:?} joint {:?}", joint_type, handle);
        Ok(handle)
    }

    /// Destroys a joint and every gear joint that couples it.
    pub fn destroy_joint(&mut self, handle: JointHandle) -> Result<()> {
        self.check_unlocked("destroy_joint")?;
        let joint = self.joints.remove(handle).ok_or(PhysicsError::InvalidHandle("joint"))?;
        let (body_a, body_b) = (joint.body_a(), joint.body_b());

        // Disconnect from island graph and wake up the bodies.
        for body in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.joints.retain(|edge| edge.joint != handle);
                body.set_awake(true);
            }
        }

        // If the joint prevented collisions, then flag any contacts for filtering.
        if !joint.collide_connected() && self.bodies.contains(body_a) && self.bodies.contains(body_b) {
            self.flag_contacts_between(body_a, body_b);
        }

        let gears: Vec<JointHandle> = self
            .joints
            .iter()
            .filter_map(|(h, j)| match j {
                Joint::Gear(gear) if gear.joint1() == handle || gear.joint2() == handle => Some(h),
                _ => None,
            })
            .collect();
        for gear in gears {
            debug!("destroying gear joint {:?} coupled to {:?}", gear, handle);
            self.destroy_joint(gear)?;
        }
        trace!("destroyed joint {:?}", handle);
        Ok(())
    }

    fn flag_contacts_between(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        for &contact in &self.bodies[body_b].contacts {
            let contact = &mut self.contact_manager.contacts[contact];
            if contact.body_a == body_a || contact.body_b == body_a {
                contact.flag_for_filtering();
            }
        }
    }

    pub fn joint(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle)
    }

    /// Mutable access to a joint. Both attached bodies are woken so that
    /// motor, limit and target changes take effect.
    pub fn joint_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        let joint = self.joints.get_mut(handle)?;
        for body in [joint.body_a(), joint.body_b()] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.set_awake(true);
            }
        }
        Some(joint)
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointHandle, &Joint)> {
        self.joints.iter()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    // Contacts

    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contact_manager.contacts.get(handle)
    }

    /// Every live contact, touching or not.
    pub fn contacts(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> {
        self.contact_manager.contacts.iter()
    }

    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    /// The contact manifold in world coordinates.
    pub fn world_manifold(&self, handle: ContactHandle) -> Option<WorldManifold> {
        let contact = self.contact_manager.contacts.get(handle)?;
        let fixture_a = self.fixtures.get(contact.fixture_a)?;
        let fixture_b = self.fixtures.get(contact.fixture_b)?;
        let body_a = self.bodies.get(contact.body_a)?;
        let body_b = self.bodies.get(contact.body_b)?;
        Some(WorldManifold::new(
            &contact.manifold,
            &body_a.xf,
            fixture_a.shape().radius(),
            &body_b.xf,
            fixture_b.shape().radius(),
        ))
    }

    // Global state

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether forces are cleared after every step. On by default.
    pub fn set_auto_clear_forces(&mut self, flag: bool) {
        self.auto_clear_forces = flag;
    }

    pub fn auto_clear_forces(&self) -> bool {
        self.auto_clear_forces
    }

    /// Manually clear the force buffer on all bodies.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = Real::ZERO;
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    /// Phase timings of the last step.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Time of impact counters accumulated since the world was created.
    pub fn toi_stats(&self) -> &ToiStats {
        &self.toi_stats
    }

    // Stepping

    /// Take a time step. This performs collision detection, integration and
    /// constraint solution.
    pub fn step(&mut self, dt: Real, config: &StepConfig) {
        let step_timer = Instant::now();
        self.profile = Profile::default();

        // If new fixtures were added, we need to find the new contacts.
        if self.new_fixture {
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
            self.new_fixture = false;
        }

        self.locked = true;

        let step = TimeStep {
            dt,
            inv_dt: if dt > Real::ZERO { Real::ONE / dt } else { Real::ZERO },
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations: config.velocity_iterations,
            position_iterations: config.position_iterations,
            warm_starting: config.warm_starting,
        };

        // Update contacts. This is where some contacts are destroyed.
        let timer = Instant::now();
        self.contact_manager.collide(&mut self.bodies, &self.fixtures, &self.joints);
        self.profile.collide = elapsed_ms(timer);

        // Integrate velocities, solve velocity constraints, and integrate positions.
        if self.step_complete && step.dt > Real::ZERO {
            let timer = Instant::now();
            self.solve(&step, config.allow_sleeping);
            self.profile.solve = elapsed_ms(timer);
        }

        // Handle TOI events.
        if config.continuous_physics && step.dt > Real::ZERO {
            let timer = Instant::now();
            self.solve_toi(&step, config.sub_stepping);
            self.profile.solve_toi = elapsed_ms(timer);
        }

        if step.dt > Real::ZERO {
            self.inv_dt0 = step.inv_dt;
        }

        if self.auto_clear_forces {
            self.clear_forces();
        }

        self.locked = false;
        self.profile.step = elapsed_ms(step_timer);
        debug!(
            "step dt={} bodies={} contacts={} joints={} took {:.3}ms",
            dt,
            self.bodies.len(),
            self.contact_manager.contacts.len(),
            self.joints.len(),
            self.profile.step
        );
    }

    /// Builds islands of awake bodies and solves each one.
    fn solve(&mut self, step: &TimeStep, allow_sleep: bool) {
        // Clear all the island flags.
        for (_, body) in self.bodies.iter_mut() {
            body.island_flag = false;
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.island_flag = false;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.as_constraint_mut().base_mut().island_flag = false;
        }

        let mut islands = 0;
        let mut sleeping = 0;
        let mut stack: Vec<BodyHandle> = Vec::with_capacity(self.bodies.len());
        for seed in self.bodies.handles() {
            {
                let body = &self.bodies[seed];
                if body.island_flag || !body.awake || !body.active {
                    continue;
                }
                // The seed can be dynamic or kinematic.
                if body.body_type == BodyType::Static {
                    continue;
                }
            }

            // Reset island and stack.
            self.island.clear();
            stack.clear();
            stack.push(seed);
            self.bodies[seed].island_flag = true;

            // Perform a depth first search (DFS) on the constraint graph.
            while let Some(handle) = stack.pop() {
                let body = &mut self.bodies[handle];
                debug_assert!(body.active);
                self.island.add_body(handle, body);

                // Make sure the body is awake.
                body.set_awake(true);

                // To keep islands as small as possible, we don't
                // propagate islands across static bodies.
                if body.body_type == BodyType::Static {
                    continue;
                }

                // Search all contacts connected to this body.
                for i in 0..self.bodies[handle].contacts.len() {
                    let contact_handle = self.bodies[handle].contacts[i];
                    let contact = &mut self.contact_manager.contacts[contact_handle];

                    // Has this contact already been added to an island?
                    if contact.island_flag {
                        continue;
                    }

                    // Is this contact solid and touching?
                    if !contact.enabled || !contact.touching {
                        continue;
                    }

                    // Skip sensors.
                    if self.fixtures[contact.fixture_a].is_sensor || self.fixtures[contact.fixture_b].is_sensor {
                        continue;
                    }

                    self.island.add_contact(contact_handle);
                    contact.island_flag = true;

                    let other = if contact.body_a == handle {
                        contact.body_b
                    } else {
                        contact.body_a
                    };

                    // Was the other body already added to this island?
                    if self.bodies[other].island_flag {
                        continue;
                    }

                    stack.push(other);
                    self.bodies[other].island_flag = true;
                }

                // Search all joints connect to this body.
                for i in 0..self.bodies[handle].joints.len() {
                    let edge = self.bodies[handle].joints[i];
                    let joint = &mut self.joints[edge.joint];
                    if joint.base().island_flag {
                        continue;
                    }

                    // Don't simulate joints connected to inactive bodies.
                    if !self.bodies[edge.other].active {
                        continue;
                    }

                    self.island.add_joint(edge.joint);
                    joint.as_constraint_mut().base_mut().island_flag = true;

                    if self.bodies[edge.other].island_flag {
                        continue;
                    }

                    stack.push(edge.other);
                    self.bodies[edge.other].island_flag = true;
                }
            }

            let mut ctx = IslandContext {
                bodies: &mut self.bodies,
                fixtures: &self.fixtures,
                contacts: &mut self.contact_manager.contacts,
                joints: &mut self.joints,
                listener: self.contact_manager.listener.as_deref_mut(),
            };
            if self
                .island
                .solve(&mut self.profile, step, self.gravity, allow_sleep, &mut ctx)
            {
                sleeping += 1;
            }
            islands += 1;

            // Post solve cleanup: allow static bodies to participate in other islands.
            for &handle in &self.island.bodies {
                let body = &mut self.bodies[handle];
                if body.body_type == BodyType::Static {
                    body.island_flag = false;
                }
            }
        }
        trace!("solved {} islands, {} fell asleep", islands, sleeping);

        let timer = Instant::now();
        // Synchronize fixtures, check for out of range bodies.
        for (_, body) in self.bodies.iter() {
            // If a body was not in an island then it did not move.
            if !body.island_flag || body.body_type == BodyType::Static {
                continue;
            }

            // Update fixtures (for broad-phase).
            synchronize_fixtures(body, &mut self.fixtures, self.contact_manager.broad_phase.as_mut());
        }

        // Look for new contacts.
        self.contact_manager
            .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
        self.profile.broadphase = elapsed_ms(timer);
    }

    /// Finds the earliest time of impact among the contacts that need
    /// continuous collision, and returns it with the contact.
    fn find_min_toi(&mut self) -> Option<(ContactHandle, Real)> {
        let mut min_contact = None;
        let mut min_alpha = Real::ONE;

        for handle in self.contact_manager.contacts.handles() {
            let contact = &self.contact_manager.contacts[handle];

            // Is this contact disabled?
            if !contact.enabled {
                continue;
            }

            // Prevent excessive sub-stepping.
            if contact.toi_count > MAX_SUB_STEPS {
                continue;
            }

            let alpha = if contact.toi_flag {
                // This contact has a valid cached TOI.
                contact.toi
            } else {
                let fixture_a = &self.fixtures[contact.fixture_a];
                let fixture_b = &self.fixtures[contact.fixture_b];

                // Is there a sensor?
                if fixture_a.is_sensor || fixture_b.is_sensor {
                    continue;
                }

                let body_a = &self.bodies[contact.body_a];
                let body_b = &self.bodies[contact.body_b];
                let (type_a, type_b) = (body_a.body_type, body_b.body_type);
                debug_assert!(type_a == BodyType::Dynamic || type_b == BodyType::Dynamic);

                let active_a = body_a.awake && type_a != BodyType::Static;
                let active_b = body_b.awake && type_b != BodyType::Static;

                // Is at least one body active (awake and dynamic or kinematic)?
                if !active_a && !active_b {
                    continue;
                }

                let collide_a = body_a.bullet || type_a != BodyType::Dynamic;
                let collide_b = body_b.bullet || type_b != BodyType::Dynamic;

                // Are these two non-bullet dynamic bodies?
                if !collide_a && !collide_b {
                    continue;
                }

                // Put the sweeps onto the same time interval.
                let (alpha_a, alpha_b) = (body_a.sweep.alpha0, body_b.sweep.alpha0);
                let alpha0 = if alpha_a < alpha_b {
                    self.bodies[contact.body_a].sweep.advance(alpha_b);
                    alpha_b
                } else if alpha_b < alpha_a {
                    self.bodies[contact.body_b].sweep.advance(alpha_a);
                    alpha_a
                } else {
                    alpha_a
                };
                debug_assert!(alpha0 < Real::ONE);

                // Compute the time of impact in interval [0, min_toi].
                let input = ToiInput {
                    proxy_a: fixture_a.shape().distance_proxy(contact.child_a),
                    proxy_b: fixture_b.shape().distance_proxy(contact.child_b),
                    sweep_a: self.bodies[contact.body_a].sweep,
                    sweep_b: self.bodies[contact.body_b].sweep,
                    t_max: Real::ONE,
                };
                let output = time_of_impact(&input, Some(&mut self.toi_stats));
                if output.state == ToiState::Failed {
                    debug!("time of impact failed for contact {:?}", handle);
                }

                // Beta is the fraction of the remaining portion of the step.
                let alpha = if output.state == ToiState::Touching {
                    (alpha0 + (Real::ONE - alpha0) * output.time).min(Real::ONE)
                } else {
                    Real::ONE
                };

                let contact = &mut self.contact_manager.contacts[handle];
                contact.toi = alpha;
                contact.toi_flag = true;
                alpha
            };

            if alpha < min_alpha {
                // This is the minimum TOI found so far.
                min_contact = Some(handle);
                min_alpha = alpha;
            }
        }

        min_contact
            .filter(|_| min_alpha <= Real::ONE - Real::from_f32(10.0) * Real::EPSILON)
            .map(|handle| (handle, min_alpha))
    }

    /// Find TOI contacts and solve them.
    fn solve_toi(&mut self, step: &TimeStep, sub_stepping: bool) {
        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.island_flag = false;
                body.sweep.alpha0 = Real::ZERO;
            }
            for (_, contact) in self.contact_manager.contacts.iter_mut() {
                // Invalidate TOI.
                contact.toi_flag = false;
                contact.island_flag = false;
                contact.toi_count = 0;
                contact.toi = Real::ONE;
            }
        }

        // Find TOI events and solve them.
        loop {
            let Some((min_contact, min_alpha)) = self.find_min_toi() else {
                // No more TOI events. Done!
                self.step_complete = true;
                break;
            };

            // Advance the bodies to the TOI.
            let (handle_a, handle_b) = {
                let contact = &self.contact_manager.contacts[min_contact];
                (contact.body_a, contact.body_b)
            };
            let backup_a = self.bodies[handle_a].sweep;
            let backup_b = self.bodies[handle_b].sweep;
            self.bodies[handle_a].advance(min_alpha);
            self.bodies[handle_b].advance(min_alpha);

            // The TOI contact likely has some new contact points.
            let contact = &mut self.contact_manager.contacts[min_contact];
            contact.update(
                &self.fixtures,
                &mut self.bodies,
                self.contact_manager.listener.as_deref_mut(),
            );
            contact.toi_flag = false;
            contact.toi_count += 1;

            // Is the contact solid?
            if !contact.enabled || !contact.touching {
                // Restore the sweeps.
                contact.enabled = false;
                for (handle, backup) in [(handle_a, backup_a), (handle_b, backup_b)] {
                    let body = &mut self.bodies[handle];
                    body.sweep = backup;
                    body.synchronize_transform();
                }
                continue;
            }

            self.bodies[handle_a].set_awake(true);
            self.bodies[handle_b].set_awake(true);

            // Build the island
            self.island.clear();
            self.island.add_body(handle_a, &mut self.bodies[handle_a]);
            self.island.add_body(handle_b, &mut self.bodies[handle_b]);
            self.island.add_contact(min_contact);

            self.bodies[handle_a].island_flag = true;
            self.bodies[handle_b].island_flag = true;
            self.contact_manager.contacts[min_contact].island_flag = true;

            // Get contacts on body A and body B.
            for handle in [handle_a, handle_b] {
                if self.bodies[handle].body_type != BodyType::Dynamic {
                    continue;
                }
                self.add_toi_neighbours(handle, min_alpha);
            }

            let dt = (Real::ONE - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: Real::ONE / dt,
                dt_ratio: Real::ONE,
                position_iterations: 20,
                velocity_iterations: step.velocity_iterations,
                warm_starting: false,
            };
            let toi_index_a = self.bodies[handle_a].island_index;
            let toi_index_b = self.bodies[handle_b].island_index;
            let mut ctx = IslandContext {
                bodies: &mut self.bodies,
                fixtures: &self.fixtures,
                contacts: &mut self.contact_manager.contacts,
                joints: &mut self.joints,
                listener: self.contact_manager.listener.as_deref_mut(),
            };
            self.island.solve_toi(&sub_step, toi_index_a, toi_index_b, &mut ctx);

            // Reset island flags and synchronize broad-phase proxies.
            for &handle in &self.island.bodies {
                let body = &mut self.bodies[handle];
                body.island_flag = false;

                if body.body_type != BodyType::Dynamic {
                    continue;
                }

                synchronize_fixtures(body, &mut self.fixtures, self.contact_manager.broad_phase.as_mut());

                // Invalidate all contact TOIs on this displaced body.
                for &contact in &body.contacts {
                    let contact = &mut self.contact_manager.contacts[contact];
                    contact.toi_flag = false;
                    contact.island_flag = false;
                }
            }

            // Commit fixture proxy movements to the broad-phase so that new
            // contacts are created. Also, some contacts can be destroyed.
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);

            if sub_stepping {
                self.step_complete = false;
                break;
            }
        }
    }

    /// Pulls the static, kinematic and bullet neighbours of a TOI body into
    /// the island, advancing them to `min_alpha`.
    fn add_toi_neighbours(&mut self, handle: BodyHandle, min_alpha: Real) {
        let bullet = self.bodies[handle].bullet;
        for i in 0..self.bodies[handle].contacts.len() {
            if self.island.bodies.len() == 2 * MAX_TOI_CONTACTS || self.island.contacts.len() == MAX_TOI_CONTACTS {
                break;
            }

            let contact_handle = self.bodies[handle].contacts[i];
            let contact = &self.contact_manager.contacts[contact_handle];

            // Has this contact already been added to the island?
            if contact.island_flag {
                continue;
            }

            // Only add static, kinematic, or bullet bodies.
            let other = if contact.body_a == handle {
                contact.body_b
            } else {
                contact.body_a
            };
            let other_body = &self.bodies[other];
            if other_body.body_type == BodyType::Dynamic && !bullet && !other_body.bullet {
                continue;
            }

            // Skip sensors.
            if self.fixtures[contact.fixture_a].is_sensor || self.fixtures[contact.fixture_b].is_sensor {
                continue;
            }

            // Tentatively advance the body to the TOI.
            let backup = other_body.sweep;
            if !other_body.island_flag {
                self.bodies[other].advance(min_alpha);
            }

            // Update the contact points.
            let contact = &mut self.contact_manager.contacts[contact_handle];
            contact.update(
                &self.fixtures,
                &mut self.bodies,
                self.contact_manager.listener.as_deref_mut(),
            );

            // Was the contact disabled by the user, or are there no contact points?
            if !contact.enabled || !contact.touching {
                let other_body = &mut self.bodies[other];
                other_body.sweep = backup;
                other_body.synchronize_transform();
                continue;
            }

            // Add the contact to the island.
            contact.island_flag = true;
            self.island.add_contact(contact_handle);

            // Has the other body already been added to the island?
            let other_body = &mut self.bodies[other];
            if other_body.island_flag {
                continue;
            }

            // Add the other body to the island.
            other_body.island_flag = true;
            if other_body.body_type != BodyType::Static {
                other_body.set_awake(true);
            }
            self.island.add_body(other, other_body);
        }
    }

    // Queries

    /// Visits every fixture whose fat AABB overlaps `aabb` until the callback
    /// returns false.
    pub fn query_aabb(&self, aabb: &AABB, mut callback: impl FnMut(FixtureHandle) -> bool) {
        let broad_phase = self.contact_manager.broad_phase.as_ref();
        broad_phase.query(aabb, &mut |proxy_id| callback(broad_phase.user_data(proxy_id).fixture));
    }

    /// Ray-casts from `p1` to `p2` against every fixture. The callback receives
    /// the fixture, hit point, normal and fraction and returns how to go on:
    /// -1 ignores the fixture, 0 terminates, a fraction clips the ray and 1
    /// continues unclipped.
    pub fn ray_cast(
        &self,
        p1: Vec2,
        p2: Vec2,
        mut callback: impl FnMut(FixtureHandle, Vec2, Vec2, Real) -> Real,
    ) {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: Real::ONE,
        };
        let broad_phase = self.contact_manager.broad_phase.as_ref();
        broad_phase.ray_cast(&input, &mut |sub_input, proxy_id| {
            let key = broad_phase.user_data(proxy_id);
            let Some(fixture) = self.fixtures.get(key.fixture) else {
                return sub_input.max_fraction;
            };
            let xf = self.bodies[fixture.body].xf;
            match fixture.ray_cast(sub_input, &xf, key.child_index) {
                Some(output) => {
                    let fraction = output.fraction;
                    let point = sub_input.p1 + (sub_input.p2 - sub_input.p1) * fraction;
                    callback(key.fixture, point, output.normal, fraction)
                }
                None => sub_input.max_fraction,
            }
        });
    }

    // Debug output

    /// Feeds the world's geometry to a debug renderer.
    pub fn draw_debug(&self, draw: &mut dyn DebugDraw, flags: DrawFlags) {
        if flags.shapes {
            for (_, body) in self.bodies.iter() {
                let color = if !body.active {
                    Color::rgb(0.5, 0.5, 0.3)
                } else if body.body_type == BodyType::Static {
                    Color::rgb(0.5, 0.9, 0.5)
                } else if body.body_type == BodyType::Kinematic {
                    Color::rgb(0.5, 0.5, 0.9)
                } else if !body.awake {
                    Color::rgb(0.6, 0.6, 0.6)
                } else {
                    Color::rgb(0.9, 0.7, 0.7)
                };
                for &fixture in &body.fixtures {
                    draw_shape(draw, self.fixtures[fixture].shape(), &body.xf, color);
                }
            }
        }

        if flags.joints {
            for (_, joint) in self.joints.iter() {
                self.draw_joint(draw, joint);
            }
        }

        if flags.aabbs {
            let color = Color::rgb(0.9, 0.3, 0.9);
            let broad_phase = self.contact_manager.broad_phase.as_ref();
            for (_, body) in self.bodies.iter() {
                if !body.active {
                    continue;
                }
                for &fixture in &body.fixtures {
                    for proxy in self.fixtures[fixture].proxies() {
                        let aabb = broad_phase.fat_aabb(proxy.proxy_id);
                        let vs = [
                            aabb.min,
                            Vec2::new(aabb.max.x, aabb.min.y),
                            aabb.max,
                            Vec2::new(aabb.min.x, aabb.max.y),
                        ];
                        draw.draw_polygon(&vs, color);
                    }
                }
            }
        }

        if flags.center_of_mass {
            for (_, body) in self.bodies.iter() {
                let mut xf = body.xf;
                xf.p = body.world_center();
                draw.draw_transform(xf);
            }
        }

        if flags.contact_points {
            let color = Color::rgb(0.3, 0.95, 0.3);
            for (handle, contact) in self.contact_manager.contacts.iter() {
                if !contact.touching {
                    continue;
                }
                let Some(world_manifold) = self.world_manifold(handle) else {
                    continue;
                };
                for point in &world_manifold.points[..contact.manifold.point_count] {
                    draw.draw_point(*point, Real::from_f32(4.0), color);
                }
            }
        }
    }

    fn draw_joint(&self, draw: &mut dyn DebugDraw, joint: &Joint) {
        let (Some(body_a), Some(body_b)) = (self.bodies.get(joint.body_a()), self.bodies.get(joint.body_b())) else {
            return;
        };
        let x1 = body_a.xf.p;
        let x2 = body_b.xf.p;
        let p1 = joint.as_constraint().anchor_a(body_a);
        let p2 = joint.as_constraint().anchor_b(body_b);
        let color = Color::rgb(0.5, 0.8, 0.8);

        match joint {
            Joint::Distance(_) => draw.draw_segment(p1, p2, color),
            Joint::Pulley(pulley) => {
                let s1 = pulley.ground_anchor_a();
                let s2 = pulley.ground_anchor_b();
                draw.draw_segment(s1, p1, color);
                draw.draw_segment(s2, p2, color);
                draw.draw_segment(s1, s2, color);
            }
            // Don't draw the mouse joint.
            Joint::Mouse(_) => {}
            _ => {
                draw.draw_segment(x1, p1, color);
                draw.draw_segment(p1, p2, color);
                draw.draw_segment(x2, p2, color);
            }
        }
    }

    /// Emits a script that rebuilds the world through the `log` crate at
    /// target `rigid2d::dump`. Does nothing while the world is locked.
    pub fn dump(&self) {
        if self.locked {
            return;
        }

        log::info!(
            target: DUMP_TARGET,
            "let gravity = Vec2::new({:.9e}, {:.9e});",
            self.gravity.x,
            self.gravity.y
        );
        log::info!(target: DUMP_TARGET, "let mut world = PhysicsWorld::new(gravity);");
        log::info!(target: DUMP_TARGET, "let mut bodies = HashMap::new();");
        log::info!(target: DUMP_TARGET, "let mut joints = HashMap::new();");
        for (_, body) in self.bodies.iter() {
            body.dump(&self.fixtures);
        }

        // Gear joints refer to other joints, so they come last.
        let gears_last = self
            .joints
            .iter()
            .filter(|(_, j)| !matches!(j, Joint::Gear(_)))
            .chain(self.joints.iter().filter(|(_, j)| matches!(j, Joint::Gear(_))));
        for (handle, joint) in gears_last {
            log::info!(target: DUMP_TARGET, "{{");
            joint.as_constraint().dump(handle.index());
            log::info!(target: DUMP_TARGET, "}}");
        }
    }
}

fn draw_shape(draw: &mut dyn DebugDraw, shape: &Shape, xf: &Transform, color: Color) {
    match shape {
        Shape::Circle(circle) => {
            let center = xf.apply(circle.position);
            let axis = xf.q.apply(Vec2::RIGHT);
            draw.draw_solid_circle(center, circle.radius, axis, color);
        }
        Shape::Edge(edge) => {
            draw.draw_segment(xf.apply(edge.vertices[0]), xf.apply(edge.vertices[1]), color);
        }
        Shape::Chain(chain) => {
            let Some((&first, rest)) = chain.vertices.split_first() else {
                return;
            };
            let mut v1 = xf.apply(first);
            for &v in rest {
                let v2 = xf.apply(v);
                draw.draw_segment(v1, v2, color);
                draw.draw_circle(v1, Real::from_f32(0.05), color);
                v1 = v2;
            }
        }
        Shape::Polygon(polygon) => {
            let vertices: Vec<Vec2> = polygon.vertices.iter().map(|&v| xf.apply(v)).collect();
            draw.draw_solid_polygon(&vertices, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{GearJointDef, JointType, RevoluteJointDef};
    use crate::shapes::{Circle, Edge, Polygon};
    use approx::assert_abs_diff_eq;

    const EPSILON: Real = 1e-4;
    const DT: Real = 1.0 / 60.0;

    fn world_with_ground() -> (PhysicsWorld, BodyHandle) {
        let mut world = PhysicsWorld::new(Vec2::new(0.0, -10.0));
        let ground = world.create_body(&BodyDef::default()).unwrap();
        world
            .create_fixture(ground, &FixtureDef::new(Edge::new(Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0))))
            .unwrap();
        (world, ground)
    }

    fn dynamic_box(world: &mut PhysicsWorld, position: Vec2) -> (BodyHandle, FixtureHandle) {
        let body = world.create_body(&BodyDef::dynamic(position)).unwrap();
        let fixture = world
            .create_fixture(body, &FixtureDef::new(Polygon::new_box(0.5, 0.5)).with_density(1.0))
            .unwrap();
        (body, fixture)
    }

    #[test]
    fn test_create_fixture_updates_mass() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        assert_abs_diff_eq!(world.body(body).unwrap().mass(), 1.0, epsilon = EPSILON);
        assert_eq!(world.proxy_count(), 1);
    }

    #[test]
    fn test_invalid_density_rejected() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let body = world.create_body(&BodyDef::dynamic(Vec2::ZERO)).unwrap();
        let mut def = FixtureDef::new(Circle::new(1.0));
        def.material.density = Real::NAN;
        assert!(matches!(
            world.create_fixture(body, &def),
            Err(PhysicsError::InvalidDensity(_))
        ));
        def.material.density = -1.0;
        assert!(world.create_fixture(body, &def).is_err());
        assert!(world.body(body).unwrap().fixtures().is_empty());
    }

    #[test]
    fn test_locked_world_rejects_edits() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        world.locked = true;
        assert_eq!(world.create_body(&BodyDef::default()), Err(PhysicsError::WorldLocked));
        world.locked = false;
        assert!(world.create_body(&BodyDef::default()).is_ok());
    }

    #[test]
    fn test_stale_handles_are_rejected() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let (body, fixture) = dynamic_box(&mut world, Vec2::ZERO);
        world.destroy_body(body).unwrap();
        assert!(world.body(body).is_none());
        assert!(world.fixture(fixture).is_none());
        assert_eq!(world.destroy_body(body), Err(PhysicsError::InvalidHandle("body")));
        assert_eq!(world.proxy_count(), 0);
    }

    #[test]
    fn test_step_creates_and_destroys_contacts() {
        let (mut world, ground) = world_with_ground();
        let (body, _) = dynamic_box(&mut world, Vec2::new(0.0, 0.5));
        world.step(DT, &StepConfig::default());
        assert_eq!(world.contact_count(), 1);
        let (handle, contact) = world.contacts().next().unwrap();
        assert!(contact.is_touching());
        assert!(world.world_manifold(handle).is_some());

        world.destroy_body(body).unwrap();
        assert_eq!(world.contact_count(), 0);
        assert!(world.body(ground).unwrap().contacts().is_empty());
    }

    #[test]
    fn test_zero_dt_does_not_move_bodies() {
        let mut world = PhysicsWorld::new(Vec2::new(0.0, -10.0));
        let (body, _) = dynamic_box(&mut world, Vec2::new(0.0, 5.0));
        world.step(0.0, &StepConfig::default());
        assert_eq!(world.body(body).unwrap().position(), Vec2::new(0.0, 5.0));
    }

    #[test]
    fn test_forces_cleared_after_step() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        world
            .body_mut(body)
            .unwrap()
            .apply_force_to_center(Vec2::new(60.0, 0.0), true);
        world.step(DT, &StepConfig::default());
        // v = F/m * dt
        assert_abs_diff_eq!(world.body(body).unwrap().linear_velocity().x, 1.0, epsilon = EPSILON);
        world.step(DT, &StepConfig::default());
        assert_abs_diff_eq!(world.body(body).unwrap().linear_velocity().x, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_set_transform_moves_proxies() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        world.set_transform(body, Vec2::new(10.0, 0.0), 0.5).unwrap();
        let b = world.body(body).unwrap();
        assert_eq!(b.position(), Vec2::new(10.0, 0.0));
        assert_abs_diff_eq!(b.angle(), 0.5, epsilon = EPSILON);

        let mut found = Vec::new();
        world.query_aabb(&AABB::new(Vec2::new(9.0, -1.0), Vec2::new(11.0, 1.0)), |f| {
            found.push(f);
            true
        });
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_set_body_type_to_static_zeroes_velocity() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        world.body_mut(body).unwrap().set_linear_velocity(Vec2::new(3.0, 0.0));
        world.set_body_type(body, BodyType::Static).unwrap();
        let b = world.body(body).unwrap();
        assert_eq!(b.body_type(), BodyType::Static);
        assert_eq!(b.linear_velocity(), Vec2::ZERO);
        assert_eq!(b.mass(), 0.0);
    }

    #[test]
    fn test_inactive_body_leaves_broad_phase() {
        let (mut world, _) = world_with_ground();
        let (body, _) = dynamic_box(&mut world, Vec2::new(0.0, 0.5));
        world.step(DT, &StepConfig::default());
        assert_eq!(world.contact_count(), 1);

        world.set_active(body, false).unwrap();
        assert_eq!(world.contact_count(), 0);
        assert_eq!(world.proxy_count(), 1);
        let before = world.body(body).unwrap().position();
        world.step(DT, &StepConfig::default());
        assert_eq!(world.body(body).unwrap().position(), before);

        world.set_active(body, true).unwrap();
        assert_eq!(world.proxy_count(), 2);
        world.step(DT, &StepConfig::default());
        assert_eq!(world.contact_count(), 1);
    }

    #[test]
    fn test_set_filter_drops_contact() {
        let (mut world, _) = world_with_ground();
        let (_, fixture) = dynamic_box(&mut world, Vec2::new(0.0, 0.5));
        world.step(DT, &StepConfig::default());
        assert_eq!(world.contact_count(), 1);

        let filter = Filter {
            mask_bits: 0,
            ..Filter::default()
        };
        world.set_filter(fixture, filter).unwrap();
        world.step(DT, &StepConfig::default());
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn test_set_sensor_wakes_only_on_change() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let (body, fixture) = dynamic_box(&mut world, Vec2::ZERO);
        world.body_mut(body).unwrap().set_awake(false);

        world.set_sensor(fixture, false).unwrap();
        assert!(!world.body(body).unwrap().is_awake());

        world.set_sensor(fixture, true).unwrap();
        assert!(world.body(body).unwrap().is_awake());
        assert!(world.fixture(fixture).unwrap().is_sensor());
    }

    #[test]
    fn test_joint_disables_collision_between_bodies() {
        let (mut world, ground) = world_with_ground();
        let (body, _) = dynamic_box(&mut world, Vec2::new(0.0, 0.5));
        world.step(DT, &StepConfig::default());
        assert_eq!(world.contact_count(), 1);

        let joint = world
            .create_joint(RevoluteJointDef::new(
                world.body(ground).unwrap(),
                world.body(body).unwrap(),
                Vec2::new(0.0, 0.5),
            ))
            .unwrap();
        assert_eq!(world.joint(joint).unwrap().joint_type(), JointType::Revolute);
        assert_eq!(world.body(body).unwrap().joints().len(), 1);

        world.step(DT, &StepConfig::default());
        assert_eq!(world.contact_count(), 0);

        world.destroy_joint(joint).unwrap();
        assert!(world.body(body).unwrap().joints().is_empty());
        assert!(world.body(ground).unwrap().joints().is_empty());
    }

    #[test]
    fn test_self_joint_rejected() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let (body, _) = dynamic_box(&mut world, Vec2::ZERO);
        let b = world.body(body).unwrap();
        let def = RevoluteJointDef::new(b, b, Vec2::ZERO);
        assert_eq!(world.create_joint(def), Err(PhysicsError::SelfJoint));
    }

    #[test]
    fn test_destroying_joint_cascades_to_gear() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let ground = world.create_body(&BodyDef::default()).unwrap();
        let (a, _) = dynamic_box(&mut world, Vec2::new(-2.0, 0.0));
        let (b, _) = dynamic_box(&mut world, Vec2::new(2.0, 0.0));
        let g = world.body(ground).unwrap();
        let def1 = RevoluteJointDef::new(g, world.body(a).unwrap(), Vec2::new(-2.0, 0.0));
        let def2 = RevoluteJointDef::new(g, world.body(b).unwrap(), Vec2::new(2.0, 0.0));
        let j1 = world.create_joint(def1).unwrap();
        let j2 = world.create_joint(def2).unwrap();
        let gear = world.create_joint(GearJointDef::new(j1, j2, 2.0)).unwrap();
        assert_eq!(world.joint_count(), 3);

        world.destroy_joint(j1).unwrap();
        assert!(world.joint(gear).is_none());
        assert_eq!(world.joint_count(), 1);
        assert!(world.body(a).unwrap().joints().is_empty());
        assert_eq!(world.body(b).unwrap().joints().len(), 1);
    }

    #[test]
    fn test_ray_cast_reports_closest_hit() {
        let (mut world, _) = world_with_ground();
        dynamic_box(&mut world, Vec2::new(0.0, 3.0));
        let (_, upper) = dynamic_box(&mut world, Vec2::new(0.0, 6.0));

        let mut closest = None;
        world.ray_cast(Vec2::new(0.0, 10.0), Vec2::new(0.0, 1.0), |fixture, point, normal, fraction| {
            closest = Some((fixture, point, normal));
            fraction
        });
        let (fixture, point, normal) = closest.unwrap();
        assert_eq!(fixture, upper);
        assert_abs_diff_eq!(point.y, 6.5, epsilon = 1e-3);
        assert_abs_diff_eq!(normal.y, 1.0, epsilon = EPSILON);
    }

    #[derive(Default)]
    struct Recorder {
        polygons: usize,
        circles: usize,
        segments: usize,
        transforms: usize,
    }

    impl DebugDraw for Recorder {
        fn draw_polygon(&mut self, _: &[Vec2], _: Color) {
            self.polygons += 1;
        }
        fn draw_solid_polygon(&mut self, _: &[Vec2], _: Color) {
            self.polygons += 1;
        }
        fn draw_circle(&mut self, _: Vec2, _: Real, _: Color) {
            self.circles += 1;
        }
        fn draw_solid_circle(&mut self, _: Vec2, _: Real, _: Vec2, _: Color) {
            self.circles += 1;
        }
        fn draw_segment(&mut self, _: Vec2, _: Vec2, _: Color) {
            self.segments += 1;
        }
        fn draw_transform(&mut self, _: Transform) {
            self.transforms += 1;
        }
        fn draw_point(&mut self, _: Vec2, _: Real, _: Color) {}
    }

    #[test]
    fn test_draw_debug_visits_shapes() {
        let (mut world, _) = world_with_ground();
        dynamic_box(&mut world, Vec2::new(0.0, 3.0));
        let ball = world.create_body(&BodyDef::dynamic(Vec2::new(2.0, 3.0))).unwrap();
        world.create_fixture(ball, &FixtureDef::new(Circle::new(0.5))).unwrap();

        let mut recorder = Recorder::default();
        let flags = DrawFlags {
            aabbs: true,
            center_of_mass: true,
            ..DrawFlags::default()
        };
        world.draw_debug(&mut recorder, flags);
        // One box plus three AABBs.
        assert_eq!(recorder.polygons, 4);
        assert_eq!(recorder.circles, 1);
        assert_eq!(recorder.segments, 1);
        assert_eq!(recorder.transforms, 3);
    }

    #[test]
    fn test_dump_skipped_while_locked() {
        let (mut world, _) = world_with_ground();
        world.locked = true;
        world.dump();
        world.locked = false;
        world.dump();
    }
}
