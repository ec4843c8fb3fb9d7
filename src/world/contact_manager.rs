//! Owns the broad phase and the contact arena. Turns broad-phase pairs into
//! contacts and retires contacts whose fat AABBs stopped overlapping.

use log::trace;

use crate::collision::{pair_order, BroadPhase};
use crate::common::Arena;
use crate::constraints::Joint;
use crate::objects::{BodyType, ContactHandle, Fixture, FixtureProxyKey, RigidBody};

use super::contact::{Contact, ContactFilter, ContactListener};

pub(crate) struct ContactManager {
    pub(crate) broad_phase: Box<dyn BroadPhase<FixtureProxyKey>>,
    pub(crate) contacts: Arena<Contact>,
    pub(crate) filter: Option<Box<dyn ContactFilter>>,
    pub(crate) listener: Option<Box<dyn ContactListener>>,
}

impl ContactManager {
    pub(crate) fn new(broad_phase: Box<dyn BroadPhase<FixtureProxyKey>>) -> Self {
        ContactManager {
            broad_phase,
            contacts: Arena::new(),
            filter: None,
            listener: None,
        }
    }

    /// Runs the installed contact filter, or the fixtures' own filter data
    /// when none is installed.
    fn filter_accepts(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        match self.filter.as_deref_mut() {
            Some(filter) => filter.should_collide(fixture_a, fixture_b),
            None => fixture_a.filter().should_collide(fixture_b.filter()),
        }
    }

    /// Commits proxy movements and creates contacts for new pairs.
    pub(crate) fn find_new_contacts(
        &mut self,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        joints: &Arena<Joint>,
    ) {
        let pairs = self.broad_phase.update_pairs();
        for (key_a, key_b) in pairs {
            self.add_pair(key_a, key_b, bodies, fixtures, joints);
        }
    }

    fn add_pair(
        &mut self,
        key_a: FixtureProxyKey,
        key_b: FixtureProxyKey,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        joints: &Arena<Joint>,
    ) {
        let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(key_a.fixture), fixtures.get(key_b.fixture)) else {
            return;
        };
        let body_a = fixture_a.body();
        let body_b = fixture_b.body();

        // Are the fixtures on the same body?
        if body_a == body_b {
            return;
        }

        // Does a contact already exist?
        let exists = bodies[body_b].contacts.iter().any(|&handle| {
            let c = &self.contacts[handle];
            let same = |a: FixtureProxyKey, b: FixtureProxyKey| {
                c.fixture_a == a.fixture
                    && c.child_a == a.child_index
                    && c.fixture_b == b.fixture
                    && c.child_b == b.child_index
            };
            same(key_a, key_b) || same(key_b, key_a)
        });
        if exists {
            return;
        }

        // Does a joint override collision? Is at least one body dynamic?
        if !bodies[body_b].should_collide(&bodies[body_a], joints) {
            return;
        }

        // Check user filtering.
        if !self.filter_accepts(fixture_a, fixture_b) {
            return;
        }

        // Edges and chains never collide with each other.
        let Some(swap) = pair_order(fixture_a.shape().shape_type(), fixture_b.shape().shape_type()) else {
            return;
        };
        let contact = if swap {
            Contact::new(key_b, fixture_b, key_a, fixture_a)
        } else {
            Contact::new(key_a, fixture_a, key_b, fixture_b)
        };
        let sensor = fixture_a.is_sensor() || fixture_b.is_sensor();

        let handle = self.contacts.insert(contact);
        trace!("contact {:?} created between {:?} and {:?}", handle, key_a, key_b);

        // Connect to the bodies.
        bodies[body_a].contacts.push(handle);
        bodies[body_b].contacts.push(handle);

        // Wake up the bodies.
        if !sensor {
            bodies[body_a].set_awake(true);
            bodies[body_b].set_awake(true);
        }
    }

    /// Removes a contact, reporting the end of touch and waking the bodies if
    /// the contact had points.
    pub(crate) fn destroy(&mut self, handle: ContactHandle, bodies: &mut Arena<RigidBody>, fixtures: &Arena<Fixture>) {
        let Some(contact) = self.contacts.remove(handle) else {
            return;
        };

        if contact.touching {
            if let Some(listener) = self.listener.as_deref_mut() {
                listener.end_contact(&contact);
            }
        }

        let sensor = [contact.fixture_a, contact.fixture_b]
            .into_iter()
            .any(|f| fixtures.get(f).map_or(false, Fixture::is_sensor));

        for body in [contact.body_a, contact.body_b] {
            if let Some(body) = bodies.get_mut(body) {
                body.contacts.retain(|&c| c != handle);
                if contact.manifold.point_count > 0 && !sensor {
                    body.set_awake(true);
                }
            }
        }
        trace!("contact {:?} destroyed", handle);
    }

    /// This is the top level collision call for the time step. Here all the
    /// narrow phase collision is processed for the world contact list.
    pub(crate) fn collide(&mut self, bodies: &mut Arena<RigidBody>, fixtures: &Arena<Fixture>, joints: &Arena<Joint>) {
        // Update awake contacts.
        for handle in self.contacts.handles() {
            let contact = &self.contacts[handle];
            let (Some(fixture_a), Some(fixture_b)) = (fixtures.get(contact.fixture_a), fixtures.get(contact.fixture_b))
            else {
                self.destroy(handle, bodies, fixtures);
                continue;
            };
            let (child_a, child_b) = (contact.child_a, contact.child_b);
            let body_a = &bodies[contact.body_a];
            let body_b = &bodies[contact.body_b];

            // Is this contact flagged for filtering?
            if contact.filter_flag {
                // Should these bodies collide?
                if !body_b.should_collide(body_a, joints) || !self.filter_accepts(fixture_a, fixture_b) {
                    self.destroy(handle, bodies, fixtures);
                    continue;
                }

                // Clear the filtering flag.
                self.contacts[handle].filter_flag = false;
            }

            let body_a = &bodies[self.contacts[handle].body_a];
            let body_b = &bodies[self.contacts[handle].body_b];
            let active_a = body_a.awake && body_a.body_type != BodyType::Static;
            let active_b = body_b.awake && body_b.body_type != BodyType::Static;

            // At least one body must be awake and it must be dynamic or kinematic.
            if !active_a && !active_b {
                continue;
            }

            let (Some(proxy_a), Some(proxy_b)) = (fixture_a.proxies().get(child_a), fixture_b.proxies().get(child_b))
            else {
                self.destroy(handle, bodies, fixtures);
                continue;
            };

            // Here we destroy contacts that cease to overlap in the broad-phase.
            if !self.broad_phase.test_overlap(proxy_a.proxy_id, proxy_b.proxy_id) {
                self.destroy(handle, bodies, fixtures);
                continue;
            }

            // The contact persists.
            self.contacts[handle].update(fixtures, bodies, self.listener.as_deref_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::SpatialGrid;
    use crate::math::Vec2;
    use crate::objects::{BodyDef, BodyHandle, Filter, FixtureDef, FixtureHandle};
    use crate::shapes::{Circle, Edge, Polygon};

    struct Scene {
        manager: ContactManager,
        bodies: Arena<RigidBody>,
        fixtures: Arena<Fixture>,
        joints: Arena<Joint>,
    }

    impl Scene {
        fn new() -> Self {
            Scene {
                manager: ContactManager::new(Box::new(SpatialGrid::new(2.0))),
                bodies: Arena::new(),
                fixtures: Arena::new(),
                joints: Arena::new(),
            }
        }

        fn body(&mut self, def: &BodyDef) -> BodyHandle {
            self.bodies.insert_with(|h| RigidBody::new(h, def))
        }

        fn fixture(&mut self, body: BodyHandle, def: FixtureDef) -> FixtureHandle {
            let handle = self.fixtures.insert(Fixture::new(body, &def));
            let xf = self.bodies[body].xf;
            self.fixtures[handle].create_proxies(handle, self.manager.broad_phase.as_mut(), &xf);
            self.bodies[body].fixtures.push(handle);
            handle
        }

        fn find(&mut self) {
            self.manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
        }

        fn collide(&mut self) {
            self.manager.collide(&mut self.bodies, &self.fixtures, &self.joints);
        }
    }

    #[test]
    fn test_new_pair_creates_ordered_contact() {
        let mut s = Scene::new();
        let ball = s.body(&BodyDef::dynamic(Vec2::new(0.0, 0.9)));
        let ground = s.body(&BodyDef::default());
        let ball_fixture = s.fixture(ball, FixtureDef::new(Circle::new(0.5)));
        let ground_fixture = s.fixture(ground, FixtureDef::new(Polygon::new_box(5.0, 0.5)));
        s.find();

        assert_eq!(s.manager.contacts.len(), 1);
        let (handle, contact) = s.manager.contacts.iter().next().map(|(h, c)| (h, c.clone())).unwrap();
        // Polygon before circle.
        assert_eq!(contact.fixture_a(), ground_fixture);
        assert_eq!(contact.fixture_b(), ball_fixture);
        assert_eq!(s.bodies[ball].contacts(), &[handle]);
        assert_eq!(s.bodies[ground].contacts(), &[handle]);

        // Reporting the pair again does not duplicate the contact.
        let fixtures: Vec<_> = s.bodies[ball].fixtures().to_vec();
        s.fixtures[fixtures[0]].touch_proxies(s.manager.broad_phase.as_mut());
        s.find();
        assert_eq!(s.manager.contacts.len(), 1);

        s.collide();
        assert!(s.manager.contacts[handle].is_touching());
    }

    #[test]
    fn test_static_pairs_and_same_body_are_skipped() {
        let mut s = Scene::new();
        let a = s.body(&BodyDef::default());
        let b = s.body(&BodyDef::default());
        s.fixture(a, FixtureDef::new(Circle::new(1.0)));
        s.fixture(a, FixtureDef::new(Circle::new(1.0)));
        s.fixture(b, FixtureDef::new(Circle::new(1.0)));
        s.find();
        assert!(s.manager.contacts.is_empty());
    }

    #[test]
    fn test_filter_and_edge_pairs_rejected() {
        let mut s = Scene::new();
        let a = s.body(&BodyDef::dynamic(Vec2::ZERO));
        let b = s.body(&BodyDef::dynamic(Vec2::ZERO));
        let c = s.body(&BodyDef::dynamic(Vec2::ZERO));
        let mut filter = Filter::default();
        filter.group_index = -2;
        s.fixture(a, FixtureDef::new(Circle::new(1.0)).with_filter(filter));
        s.fixture(b, FixtureDef::new(Circle::new(1.0)).with_filter(filter));
        s.fixture(c, FixtureDef::new(Edge::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0))));
        s.find();
        // Only the circles against the edge remain.
        assert_eq!(s.manager.contacts.len(), 2);
        assert!(s.manager.contacts.iter().all(|(_, contact)| contact.body_a() == c));
    }

    #[test]
    fn test_collide_destroys_separated_contact() {
        let mut s = Scene::new();
        let ball = s.body(&BodyDef::dynamic(Vec2::new(0.0, 0.9)));
        let ground = s.body(&BodyDef::default());
        s.fixture(ball, FixtureDef::new(Circle::new(0.5)));
        s.fixture(ground, FixtureDef::new(Polygon::new_box(5.0, 0.5)));
        s.find();
        s.collide();
        assert_eq!(s.manager.contacts.len(), 1);

        // Teleport the ball far away and move its proxy.
        s.bodies[ball].xf.p = Vec2::new(0.0, 50.0);
        let xf = s.bodies[ball].xf;
        let f = s.bodies[ball].fixtures()[0];
        s.fixtures[f].synchronize(s.manager.broad_phase.as_mut(), &xf, &xf);
        s.collide();

        assert!(s.manager.contacts.is_empty());
        assert!(s.bodies[ball].contacts().is_empty());
        assert!(s.bodies[ground].contacts().is_empty());
    }

    #[test]
    fn test_flagged_contact_is_refiltered() {
        let mut s = Scene::new();
        let ball = s.body(&BodyDef::dynamic(Vec2::new(0.0, 0.9)));
        let ground = s.body(&BodyDef::default());
        let f = s.fixture(ball, FixtureDef::new(Circle::new(0.5)));
        s.fixture(ground, FixtureDef::new(Polygon::new_box(5.0, 0.5)));
        s.find();
        let handle = s.manager.contacts.handles()[0];

        s.fixtures[f].filter.mask_bits = 0;
        s.manager.contacts[handle].flag_for_filtering();
        s.collide();
        assert!(!s.manager.contacts.contains(handle));
    }
}
