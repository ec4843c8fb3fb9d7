//! Contacts between fixture children that the broad phase found overlapping,
//! plus the user callbacks that observe them.

use crate::collision::{evaluate, test_overlap, Manifold};
use crate::common::settings::MAX_MANIFOLD_POINTS;
use crate::common::material::{mix_friction, mix_restitution};
use crate::common::Arena;
use crate::math::{Real, Scalar};
use crate::objects::{BodyHandle, Fixture, FixtureHandle, FixtureProxyKey, RigidBody};

/// Manages the contact between two fixture children. A contact exists for
/// each overlapping fat AABB pair, so it may exist without any contact points.
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) fixture_a: FixtureHandle,
    pub(crate) fixture_b: FixtureHandle,
    pub(crate) child_a: usize,
    pub(crate) child_b: usize,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,

    pub(crate) manifold: Manifold,

    pub(crate) island_flag: bool,
    pub(crate) touching: bool,
    pub(crate) enabled: bool,
    /// The filter must be re-run before the next narrow phase.
    pub(crate) filter_flag: bool,
    /// `toi` holds a valid time of impact for this sub-step.
    pub(crate) toi_flag: bool,

    pub(crate) toi_count: usize,
    pub(crate) toi: Real,

    pub(crate) friction: Real,
    pub(crate) restitution: Real,
    pub(crate) tangent_speed: Real,
}

impl Contact {
    /// Fixtures must already be in collider order.
    pub(crate) fn new(key_a: FixtureProxyKey, fixture_a: &Fixture, key_b: FixtureProxyKey, fixture_b: &Fixture) -> Self {
        Contact {
            fixture_a: key_a.fixture,
            fixture_b: key_b.fixture,
            child_a: key_a.child_index,
            child_b: key_b.child_index,
            body_a: fixture_a.body(),
            body_b: fixture_b.body(),
            manifold: Manifold::default(),
            island_flag: false,
            touching: false,
            enabled: true,
            filter_flag: false,
            toi_flag: false,
            toi_count: 0,
            toi: Real::ZERO,
            friction: mix_friction(fixture_a.friction(), fixture_b.friction()),
            restitution: mix_restitution(fixture_a.restitution(), fixture_b.restitution()),
            tangent_speed: Real::ZERO,
        }
    }

    pub fn fixture_a(&self) -> FixtureHandle {
        self.fixture_a
    }

    pub fn fixture_b(&self) -> FixtureHandle {
        self.fixture_b
    }

    pub fn child_index_a(&self) -> usize {
        self.child_a
    }

    pub fn child_index_b(&self) -> usize {
        self.child_b
    }

    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// The local manifold. Use `PhysicsWorld::world_manifold` for world
    /// points and normal.
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// True when the shapes overlap (sensors) or the manifold has points.
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    /// Disable this contact for the current step only. Meant for `pre_solve`;
    /// the flag is reset at the next narrow-phase update.
    pub fn set_enabled(&mut self, flag: bool) {
        self.enabled = flag;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn friction(&self) -> Real {
        self.friction
    }

    /// Override the mixed friction. Persists for the life of the contact.
    pub fn set_friction(&mut self, friction: Real) {
        self.friction = friction;
    }

    pub fn restitution(&self) -> Real {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: Real) {
        self.restitution = restitution;
    }

    pub fn tangent_speed(&self) -> Real {
        self.tangent_speed
    }

    /// Desired tangent speed for a conveyor belt behavior, in meters per second.
    pub fn set_tangent_speed(&mut self, speed: Real) {
        self.tangent_speed = speed;
    }

    /// Flag this contact for filtering. Filtering will occur the next time step.
    pub(crate) fn flag_for_filtering(&mut self) {
        self.filter_flag = true;
    }

    /// Re-evaluates the manifold, matching impulses of persisting points by
    /// contact id and reporting touch transitions to the listener.
    pub(crate) fn update(
        &mut self,
        fixtures: &Arena<Fixture>,
        bodies: &mut Arena<RigidBody>,
        listener: Option<&mut (dyn ContactListener + 'static)>,
    ) {
        let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(self.fixture_a), fixtures.get(self.fixture_b)) else {
            debug_assert!(false, "contact outlived one of its fixtures");
            return;
        };

        let old_manifold = self.manifold;

        // Re-enable this contact.
        self.enabled = true;

        let was_touching = self.touching;
        let sensor = fixture_a.is_sensor() || fixture_b.is_sensor();

        let xf_a = bodies[self.body_a].xf;
        let xf_b = bodies[self.body_b].xf;

        let touching = if sensor {
            self.manifold.point_count = 0;
            test_overlap(
                fixture_a.shape(),
                self.child_a,
                fixture_b.shape(),
                self.child_b,
                &xf_a,
                &xf_b,
            )
        } else {
            self.manifold = evaluate(
                fixture_a.shape(),
                self.child_a,
                &xf_a,
                fixture_b.shape(),
                self.child_b,
                &xf_b,
            );
            let touching = self.manifold.point_count > 0;

            // Match old contact ids to new contact ids and copy the
            // stored impulses to warm start the solver.
            for mp2 in self.manifold.points_mut() {
                mp2.normal_impulse = Real::ZERO;
                mp2.tangent_impulse = Real::ZERO;
                let key = mp2.id.key();
                if let Some(mp1) = old_manifold.points().iter().find(|mp1| mp1.id.key() == key) {
                    mp2.normal_impulse = mp1.normal_impulse;
                    mp2.tangent_impulse = mp1.tangent_impulse;
                }
            }

            if touching != was_touching {
                bodies[self.body_a].set_awake(true);
                bodies[self.body_b].set_awake(true);
            }
            touching
        };

        self.touching = touching;

        if let Some(listener) = listener {
            if !was_touching && touching {
                listener.begin_contact(self);
            }
            if was_touching && !touching {
                listener.end_contact(self);
            }
            if !sensor && touching {
                listener.pre_solve(self, &old_manifold);
            }
        }
    }
}

/// Contact impulses for reporting. Impulses are used instead of forces
/// because sub-step forces may approach infinity for rigid body collisions.
/// These match up one-to-one with the manifold points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [Real; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [Real; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Receives contact events during a step. All methods default to no-ops.
///
/// Bodies and fixtures cannot be created or destroyed from inside these
/// callbacks; the world only hands out the contact itself.
pub trait ContactListener {
    /// Called when two fixtures begin to touch.
    fn begin_contact(&mut self, _contact: &Contact) {}

    /// Called when two fixtures cease to touch. Also called when a touching
    /// contact is destroyed, including through body or fixture removal.
    fn end_contact(&mut self, _contact: &Contact) {}

    /// Called after a contact is updated and before it goes to the solver.
    /// Disabling the contact here skips it for the current step. Not called
    /// for sensors.
    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {}

    /// Inspect the impulses applied by the solver. Only called for contacts
    /// that are touching, solid and awake.
    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

/// Decides whether two fixtures may form a contact. The default honours the
/// fixtures' [`crate::objects::Filter`] data.
pub trait ContactFilter {
    fn should_collide(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        fixture_a.filter().should_collide(fixture_b.filter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Material;
    use crate::math::Vec2;
    use crate::objects::{BodyDef, FixtureDef};
    use crate::shapes::{Circle, Polygon};
    use approx::assert_abs_diff_eq;

    #[derive(Default)]
    struct Recorder {
        begins: usize,
        ends: usize,
        pre_solves: usize,
    }

    impl ContactListener for Recorder {
        fn begin_contact(&mut self, _contact: &Contact) {
            self.begins += 1;
        }

        fn end_contact(&mut self, _contact: &Contact) {
            self.ends += 1;
        }

        fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {
            self.pre_solves += 1;
        }
    }

    struct Scene {
        bodies: Arena<RigidBody>,
        fixtures: Arena<Fixture>,
        contact: Contact,
        b: BodyHandle,
    }

    fn scene(def_a: FixtureDef, def_b: FixtureDef, y_b: Real) -> Scene {
        let mut bodies = Arena::new();
        let a = bodies.insert_with(|h| RigidBody::new(h, &BodyDef::default()));
        let b = bodies.insert_with(|h| RigidBody::new(h, &BodyDef::dynamic(Vec2::new(0.0, y_b))));
        let mut fixtures = Arena::new();
        let fa = fixtures.insert(Fixture::new(a, &def_a));
        let fb = fixtures.insert(Fixture::new(b, &def_b));
        let key = |fixture| FixtureProxyKey { fixture, child_index: 0 };
        let contact = Contact::new(key(fa), &fixtures[fa], key(fb), &fixtures[fb]);
        Scene {
            bodies,
            fixtures,
            contact,
            b,
        }
    }

    #[test]
    fn test_new_contact_mixes_materials() {
        let ground = FixtureDef::new(Polygon::new_box(5.0, 0.5)).with_material(Material::new(0.0, 0.4, 0.0));
        let ball = FixtureDef::new(Circle::new(0.5)).with_material(Material::new(0.5, 0.9, 1.0));
        let s = scene(ground, ball, 3.0);
        assert_abs_diff_eq!(s.contact.friction(), 0.6, epsilon = 1e-6);
        assert_eq!(s.contact.restitution(), 0.5);
        assert!(!s.contact.is_touching());
        assert!(s.contact.is_enabled());
    }

    #[test]
    fn test_update_reports_touch_transitions() {
        let mut s = scene(
            FixtureDef::new(Polygon::new_box(5.0, 0.5)),
            FixtureDef::new(Circle::new(0.5)),
            0.9,
        );
        let mut recorder = Recorder::default();

        s.contact.update(&s.fixtures, &mut s.bodies, Some(&mut recorder));
        assert!(s.contact.is_touching());
        assert_eq!(s.contact.manifold().point_count, 1);
        assert_eq!((recorder.begins, recorder.ends, recorder.pre_solves), (1, 0, 1));

        // Move the ball away.
        s.bodies[s.b].xf.p = Vec2::new(0.0, 5.0);
        s.contact.update(&s.fixtures, &mut s.bodies, Some(&mut recorder));
        assert!(!s.contact.is_touching());
        assert_eq!((recorder.begins, recorder.ends, recorder.pre_solves), (1, 1, 1));
    }

    #[test]
    fn test_update_keeps_impulses_of_persisting_points() {
        let mut s = scene(
            FixtureDef::new(Polygon::new_box(5.0, 0.5)),
            FixtureDef::new(Circle::new(0.5)),
            0.9,
        );
        s.contact.update(&s.fixtures, &mut s.bodies, None);
        s.contact.manifold.points[0].normal_impulse = 2.5;
        s.contact.manifold.points[0].tangent_impulse = -0.5;

        s.bodies[s.b].xf.p = Vec2::new(0.1, 0.95);
        s.contact.update(&s.fixtures, &mut s.bodies, None);
        assert_eq!(s.contact.manifold().points()[0].normal_impulse, 2.5);
        assert_eq!(s.contact.manifold().points()[0].tangent_impulse, -0.5);
    }

    #[test]
    fn test_sensor_contact_has_no_points() {
        let mut s = scene(
            FixtureDef::new(Polygon::new_box(5.0, 0.5)).sensor(),
            FixtureDef::new(Circle::new(0.5)),
            0.9,
        );
        let mut recorder = Recorder::default();
        s.contact.update(&s.fixtures, &mut s.bodies, Some(&mut recorder));
        assert!(s.contact.is_touching());
        assert_eq!(s.contact.manifold().point_count, 0);
        assert_eq!((recorder.begins, recorder.pre_solves), (1, 0));
    }

    #[test]
    fn test_update_re_enables_contact() {
        let mut s = scene(
            FixtureDef::new(Polygon::new_box(5.0, 0.5)),
            FixtureDef::new(Circle::new(0.5)),
            0.9,
        );
        s.contact.set_enabled(false);
        s.contact.update(&s.fixtures, &mut s.bodies, None);
        assert!(s.contact.is_enabled());
    }

    #[test]
    fn test_default_filter_uses_fixture_filters() {
        struct Plain;
        impl ContactFilter for Plain {}

        let mut bodies = Arena::new();
        let a = bodies.insert_with(|h| RigidBody::new(h, &BodyDef::default()));
        let mut filter = crate::objects::Filter::default();
        filter.group_index = -1;
        let f1 = Fixture::new(a, &FixtureDef::new(Circle::new(1.0)).with_filter(filter));
        let f2 = Fixture::new(a, &FixtureDef::new(Circle::new(1.0)).with_filter(filter));
        let f3 = Fixture::new(a, &FixtureDef::new(Circle::new(1.0)));
        assert!(!Plain.should_collide(&f1, &f2));
        assert!(Plain.should_collide(&f1, &f3));
    }
}
