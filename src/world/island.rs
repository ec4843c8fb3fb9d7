//! Islands: groups of awake bodies connected through touching contacts and
//! joints, solved together and put to sleep together.

use std::time::Instant;

use crate::common::settings::TIME_TO_SLEEP;
use crate::common::Arena;
use crate::constraints::{Joint, JointHandle, Position, SolverData, TimeStep, Velocity};
use crate::integration::{integrate_position, integrate_velocity};
use crate::math::{Real, Vec2};
use crate::objects::{BodyHandle, BodyType, ContactHandle, Fixture, RigidBody};

use super::contact::{Contact, ContactListener};
use super::contact_solver::ContactSolver;
use super::physics_world::Profile;

/// Milliseconds since `start`.
pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// World state an island needs while solving. Borrowed field by field so the
/// world keeps ownership of its arenas.
pub(crate) struct IslandContext<'a> {
    pub bodies: &'a mut Arena<RigidBody>,
    pub fixtures: &'a Arena<Fixture>,
    pub contacts: &'a mut Arena<Contact>,
    pub joints: &'a mut Arena<Joint>,
    pub listener: Option<&'a mut (dyn ContactListener + 'static)>,
}

/// A reusable island buffer. Body island indices point into the solver
/// position and velocity arrays.
#[derive(Debug, Default)]
pub(crate) struct Island {
    pub(crate) bodies: Vec<BodyHandle>,
    pub(crate) contacts: Vec<ContactHandle>,
    pub(crate) joints: Vec<JointHandle>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    pub(crate) fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    pub(crate) fn add_body(&mut self, handle: BodyHandle, body: &mut RigidBody) {
        body.island_index = self.bodies.len();
        self.bodies.push(handle);
    }

    pub(crate) fn add_contact(&mut self, handle: ContactHandle) {
        self.contacts.push(handle);
    }

    pub(crate) fn add_joint(&mut self, handle: JointHandle) {
        self.joints.push(handle);
    }

    /// Loads the solver state of every body from its sweep.
    fn load_state(&mut self, bodies: &Arena<RigidBody>) {
        self.positions.clear();
        self.velocities.clear();
        for &handle in &self.bodies {
            let body = &bodies[handle];
            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(Velocity {
                v: body.linear_velocity,
                w: body.angular_velocity,
            });
        }
    }

    /// Discrete step of the island: integrate velocities, solve velocity
    /// constraints, integrate positions, solve position constraints and
    /// update sleep timers. Returns true when the island fell asleep.
    pub(crate) fn solve(
        &mut self,
        profile: &mut Profile,
        step: &TimeStep,
        gravity: Vec2,
        allow_sleep: bool,
        ctx: &mut IslandContext<'_>,
    ) -> bool {
        let timer = Instant::now();
        let h = step.dt;

        self.load_state(ctx.bodies);

        // Integrate velocities.
        for (i, &handle) in self.bodies.iter().enumerate() {
            let body = &mut ctx.bodies[handle];

            // Store positions for continuous collision.
            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;

            integrate_velocity(body, &mut self.velocities[i], gravity, h);
        }

        // Initialize velocity constraints.
        let mut contact_solver = ContactSolver::new(*step, &self.contacts, ctx.contacts, ctx.fixtures, ctx.bodies);
        contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        if step.warm_starting {
            contact_solver.warm_start(&mut self.velocities);
        }

        let mut data = SolverData {
            step: *step,
            positions: &mut self.positions,
            velocities: &mut self.velocities,
        };

        for &handle in &self.joints {
            ctx.joints[handle]
                .as_constraint_mut()
                .init_velocity_constraints(&mut data, ctx.bodies);
        }

        profile.solve_init += elapsed_ms(timer);

        // Solve velocity constraints.
        let timer = Instant::now();
        for _ in 0..step.velocity_iterations {
            for &handle in &self.joints {
                ctx.joints[handle].as_constraint_mut().solve_velocity_constraints(&mut data);
            }
            contact_solver.solve_velocity_constraints(data.velocities);
        }

        // Store impulses for warm starting.
        contact_solver.store_impulses(ctx.contacts);
        profile.solve_velocity += elapsed_ms(timer);

        // Integrate positions.
        for (position, velocity) in data.positions.iter_mut().zip(data.velocities.iter_mut()) {
            integrate_position(position, velocity, h);
        }

        // Solve position constraints.
        let timer = Instant::now();
        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(data.positions);

            let mut joints_okay = true;
            for &handle in &self.joints {
                let joint_okay = ctx.joints[handle]
                    .as_constraint_mut()
                    .solve_position_constraints(&mut data);
                joints_okay = joints_okay && joint_okay;
            }

            if contacts_okay && joints_okay {
                // Exit early if the position errors are small.
                position_solved = true;
                break;
            }
        }

        // Copy state buffers back to the bodies.
        self.store_state(ctx.bodies);
        profile.solve_position += elapsed_ms(timer);

        self.report(&contact_solver, ctx);

        if !allow_sleep {
            return false;
        }

        let mut min_sleep_time = Real::MAX;
        for &handle in &self.bodies {
            let body = &mut ctx.bodies[handle];
            if body.body_type == BodyType::Static {
                continue;
            }
            min_sleep_time = min_sleep_time.min(body.update_sleep_time(h));
        }

        if min_sleep_time >= TIME_TO_SLEEP && position_solved {
            for &handle in &self.bodies {
                ctx.bodies[handle].set_awake(false);
            }
            return true;
        }
        false
    }

    /// Resolves one time of impact between the bodies at island indices
    /// `toi_index_a` and `toi_index_b`, then integrates the whole island over
    /// the remaining sub-step. Impulses are not stored: TOI impulses can be
    /// quite large and would spoil warm starting.
    pub(crate) fn solve_toi(
        &mut self,
        sub_step: &TimeStep,
        toi_index_a: usize,
        toi_index_b: usize,
        ctx: &mut IslandContext<'_>,
    ) {
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        self.load_state(ctx.bodies);

        let mut contact_solver = ContactSolver::new(*sub_step, &self.contacts, ctx.contacts, ctx.fixtures, ctx.bodies);

        // Solve position constraints.
        for _ in 0..sub_step.position_iterations {
            if contact_solver.solve_toi_position_constraints(&mut self.positions, toi_index_a, toi_index_b) {
                break;
            }
        }

        // Leap of faith to new safe state.
        for index in [toi_index_a, toi_index_b] {
            let body = &mut ctx.bodies[self.bodies[index]];
            body.sweep.c0 = self.positions[index].c;
            body.sweep.a0 = self.positions[index].a;
        }

        // No warm starting is needed for TOI events because warm starting
        // impulses were applied in the discrete solver.
        contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);

        // Solve velocity constraints.
        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        // Integrate positions.
        for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            integrate_position(position, velocity, sub_step.dt);
        }
        self.store_state(ctx.bodies);

        self.report(&contact_solver, ctx);
    }

    /// Writes solver state back into the bodies and rebuilds their transforms.
    fn store_state(&self, bodies: &mut Arena<RigidBody>) {
        for (i, &handle) in self.bodies.iter().enumerate() {
            let body = &mut bodies[handle];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }
    }

    fn report(&self, contact_solver: &ContactSolver, ctx: &mut IslandContext<'_>) {
        let contacts = &*ctx.contacts;
        let Some(listener) = ctx.listener.as_deref_mut() else {
            return;
        };
        for (handle, impulse) in contact_solver.impulses() {
            if let Some(contact) = contacts.get(handle) {
                listener.post_solve(contact, &impulse);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{Constraint, RevoluteJoint, RevoluteJointDef};
    use crate::objects::BodyDef;
    use approx::assert_abs_diff_eq;

    const EPSILON: Real = 1e-4;

    fn step() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    struct Arenas {
        bodies: Arena<RigidBody>,
        fixtures: Arena<Fixture>,
        contacts: Arena<Contact>,
        joints: Arena<Joint>,
    }

    impl Arenas {
        fn new() -> Self {
            Arenas {
                bodies: Arena::new(),
                fixtures: Arena::new(),
                contacts: Arena::new(),
                joints: Arena::new(),
            }
        }

        fn body(&mut self, def: &BodyDef) -> BodyHandle {
            self.bodies.insert_with(|h| RigidBody::new(h, def))
        }

        fn ctx(&mut self) -> IslandContext<'_> {
            IslandContext {
                bodies: &mut self.bodies,
                fixtures: &self.fixtures,
                contacts: &mut self.contacts,
                joints: &mut self.joints,
                listener: None,
            }
        }
    }

    #[test]
    fn test_add_body_assigns_island_index() {
        let mut arenas = Arenas::new();
        let a = arenas.body(&BodyDef::dynamic(Vec2::ZERO));
        let b = arenas.body(&BodyDef::dynamic(Vec2::ZERO));
        let mut island = Island::default();
        island.add_body(b, &mut arenas.bodies[b]);
        island.add_body(a, &mut arenas.bodies[a]);
        assert_eq!(arenas.bodies[b].island_index, 0);
        assert_eq!(arenas.bodies[a].island_index, 1);

        island.clear();
        assert!(island.bodies.is_empty());
    }

    #[test]
    fn test_solve_free_fall() {
        let mut arenas = Arenas::new();
        let a = arenas.body(&BodyDef::dynamic(Vec2::ZERO));
        let mut island = Island::default();
        island.add_body(a, &mut arenas.bodies[a]);

        let mut profile = Profile::default();
        let slept = island.solve(&mut profile, &step(), Vec2::new(0.0, -10.0), true, &mut arenas.ctx());

        assert!(!slept);
        let body = &arenas.bodies[a];
        assert_abs_diff_eq!(body.linear_velocity().y, -10.0 / 60.0, epsilon = EPSILON);
        assert_abs_diff_eq!(body.position().y, -10.0 / 3600.0, epsilon = EPSILON);
        assert_eq!(body.sweep.c0, Vec2::ZERO);
    }

    #[test]
    fn test_resting_island_falls_asleep() {
        let mut arenas = Arenas::new();
        let a = arenas.body(&BodyDef::dynamic(Vec2::ZERO));
        let mut island = Island::default();
        island.add_body(a, &mut arenas.bodies[a]);

        let mut profile = Profile::default();
        let mut slept = false;
        for _ in 0..40 {
            slept = island.solve(&mut profile, &step(), Vec2::ZERO, true, &mut arenas.ctx());
            if slept {
                break;
            }
        }
        assert!(slept);
        assert!(!arenas.bodies[a].is_awake());
    }

    #[test]
    fn test_sleep_disabled() {
        let mut arenas = Arenas::new();
        let a = arenas.body(&BodyDef::dynamic(Vec2::ZERO));
        let mut island = Island::default();
        island.add_body(a, &mut arenas.bodies[a]);

        let mut profile = Profile::default();
        for _ in 0..60 {
            assert!(!island.solve(&mut profile, &step(), Vec2::ZERO, false, &mut arenas.ctx()));
        }
        assert!(arenas.bodies[a].is_awake());
    }

    #[test]
    fn test_solve_joint_island() {
        let mut arenas = Arenas::new();
        let ground = arenas.body(&BodyDef::default());
        let bob = arenas.body(&BodyDef::dynamic(Vec2::new(1.0, 0.0)));
        arenas.bodies[bob].inertia = 1.0;
        arenas.bodies[bob].inv_inertia = 1.0;
        let def = RevoluteJointDef::new(&arenas.bodies[ground], &arenas.bodies[bob], Vec2::ZERO);
        let joint = arenas.joints.insert(Joint::Revolute(RevoluteJoint::new(&def)));

        let mut island = Island::default();
        island.add_body(ground, &mut arenas.bodies[ground]);
        island.add_body(bob, &mut arenas.bodies[bob]);
        island.add_joint(joint);

        let mut profile = Profile::default();
        for _ in 0..60 {
            island.solve(&mut profile, &step(), Vec2::new(0.0, -10.0), false, &mut arenas.ctx());
        }

        // The pendulum swings but stays on its unit circle.
        let anchor = arenas.joints[joint].as_constraint().anchor_b(&arenas.bodies[bob]);
        assert_abs_diff_eq!(anchor.x, 0.0, epsilon = 1e-2);
        assert_abs_diff_eq!(anchor.y, 0.0, epsilon = 1e-2);
        assert_abs_diff_eq!(arenas.bodies[bob].position().magnitude(), 1.0, epsilon = 1e-2);
        assert!(arenas.bodies[bob].position().y < -0.1);
        assert!(profile.solve_init >= 0.0);
    }
}
