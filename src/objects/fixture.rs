//! Fixtures attach a shape to a body and carry the contact material,
//! collision filter and broad-phase proxies.

use crate::collision::{BroadPhase, ProxyId, AABB};
use crate::common::Material;
use crate::math::{Real, Scalar, Transform, Vec2};
use crate::shapes::{MassData, RayCastInput, RayCastOutput, Shape};

use super::rigid_body::{BodyHandle, FixtureHandle};

/// Contact filtering data.
///
/// Fixtures sharing a non-zero group index always collide (positive) or never
/// collide (negative). Otherwise the category and mask bits decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    /// The default filtering rule applied when no contact filter is installed.
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Broad-phase user data: identifies one child of one fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureProxyKey {
    pub fixture: FixtureHandle,
    pub child_index: usize,
}

/// A fixture child registered in the broad phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureProxy {
    /// Tight AABB covering the child over the last step's sweep.
    pub aabb: AABB,
    pub child_index: usize,
    pub proxy_id: ProxyId,
}

/// Holds all the data needed to construct a fixture. Reusable.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDef {
    pub shape: Shape,
    pub material: Material,
    pub filter: Filter,
    /// A sensor collects contact information but never generates a response.
    pub is_sensor: bool,
    pub user_data: u64,
}

impl FixtureDef {
    pub fn new(shape: impl Into<Shape>) -> Self {
        FixtureDef {
            shape: shape.into(),
            material: Material::default(),
            filter: Filter::default(),
            is_sensor: false,
            user_data: 0,
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_density(mut self, density: Real) -> Self {
        self.material.density = density;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// A shape attached to a body, owned by the world.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub(crate) body: BodyHandle,
    pub(crate) shape: Shape,
    pub(crate) material: Material,
    pub(crate) filter: Filter,
    pub(crate) is_sensor: bool,
    pub(crate) proxies: Vec<FixtureProxy>,
    pub user_data: u64,
}

impl Fixture {
    pub(crate) fn new(body: BodyHandle, def: &FixtureDef) -> Self {
        debug_assert!(def.material.density >= Real::ZERO);
        Fixture {
            body,
            shape: def.shape.clone(),
            material: def.material,
            filter: def.filter,
            is_sensor: def.is_sensor,
            proxies: Vec::with_capacity(def.shape.child_count()),
            user_data: def.user_data,
        }
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn density(&self) -> Real {
        self.material.density
    }

    /// Takes effect on the next mass reset of the body.
    pub fn set_density(&mut self, density: Real) {
        debug_assert!(density.is_valid() && density >= Real::ZERO);
        self.material.density = density;
    }

    pub fn friction(&self) -> Real {
        self.material.friction
    }

    /// Existing contacts keep their mixed friction.
    pub fn set_friction(&mut self, friction: Real) {
        self.material.friction = friction;
    }

    pub fn restitution(&self) -> Real {
        self.material.restitution
    }

    /// Existing contacts keep their mixed restitution.
    pub fn set_restitution(&mut self, restitution: Real) {
        self.material.restitution = restitution;
    }

    pub fn proxies(&self) -> &[FixtureProxy] {
        &self.proxies
    }

    /// Test a world point for containment, given the body transform.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        self.shape.test_point(xf, p)
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform, child_index: usize) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf, child_index)
    }

    /// Mass data of the shape at this fixture's density.
    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.material.density)
    }

    /// The AABB of a child as of the last synchronisation. `None` while the
    /// body is inactive.
    pub fn aabb(&self, child_index: usize) -> Option<AABB> {
        self.proxies.get(child_index).map(|p| p.aabb)
    }

    pub(crate) fn create_proxies(
        &mut self,
        handle: FixtureHandle,
        broad_phase: &mut dyn BroadPhase<FixtureProxyKey>,
        xf: &Transform,
    ) {
        debug_assert!(self.proxies.is_empty());
        for child_index in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child_index);
            let proxy_id = broad_phase.create_proxy(
                aabb,
                FixtureProxyKey {
                    fixture: handle,
                    child_index,
                },
            );
            self.proxies.push(FixtureProxy {
                aabb,
                child_index,
                proxy_id,
            });
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut dyn BroadPhase<FixtureProxyKey>) {
        for proxy in self.proxies.drain(..) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Moves the proxies to cover the swept shape between two transforms
    /// (may miss some rotation effect).
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut dyn BroadPhase<FixtureProxyKey>,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        for proxy in &mut self.proxies {
            let aabb1 = self.shape.compute_aabb(xf1, proxy.child_index);
            let aabb2 = self.shape.compute_aabb(xf2, proxy.child_index);
            proxy.aabb = AABB::combine(&aabb1, &aabb2);
            let displacement = xf2.p - xf1.p;
            broad_phase.move_proxy(proxy.proxy_id, proxy.aabb, displacement);
        }
    }

    /// Forces pair re-evaluation for every proxy on the next broad-phase update.
    pub(crate) fn touch_proxies(&self, broad_phase: &mut dyn BroadPhase<FixtureProxyKey>) {
        for proxy in &self.proxies {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }

    /// Emits a reconstruction script for this fixture.
    pub fn dump(&self, body_index: usize) {
        use crate::common::DUMP_TARGET as TARGET;
        match &self.shape {
            Shape::Circle(s) => {
                log::info!(
                    target: TARGET,
                    "    let shape = Circle::with_position({:.9e}, Vec2::new({:.9e}, {:.9e}));",
                    s.radius,
                    s.position.x,
                    s.position.y
                );
            }
            Shape::Edge(s) => {
                log::info!(
                    target: TARGET,
                    "    let shape = Edge::new(Vec2::new({:.9e}, {:.9e}), Vec2::new({:.9e}, {:.9e}))",
                    s.vertices[0].x,
                    s.vertices[0].y,
                    s.vertices[1].x,
                    s.vertices[1].y
                );
                log::info!(
                    target: TARGET,
                    "        .with_ghosts({:?}, {:?});",
                    s.vertex0.map(|v| (v.x, v.y)),
                    s.vertex3.map(|v| (v.x, v.y))
                );
            }
            Shape::Polygon(s) => {
                log::info!(target: TARGET, "    let vs = [");
                for v in &s.vertices {
                    log::info!(target: TARGET, "        Vec2::new({:.9e}, {:.9e}),", v.x, v.y);
                }
                log::info!(target: TARGET, "    ];");
                log::info!(target: TARGET, "    let shape = Polygon::new(&vs)?;");
            }
            Shape::Chain(s) => {
                log::info!(target: TARGET, "    let vs = [");
                for v in &s.vertices {
                    log::info!(target: TARGET, "        Vec2::new({:.9e}, {:.9e}),", v.x, v.y);
                }
                log::info!(target: TARGET, "    ];");
                log::info!(target: TARGET, "    let mut shape = Chain::new_chain(&vs)?;");
                if let Some(v) = s.prev_vertex {
                    log::info!(target: TARGET, "    shape.set_prev_vertex(Vec2::new({:.9e}, {:.9e}));", v.x, v.y);
                }
                if let Some(v) = s.next_vertex {
                    log::info!(target: TARGET, "    shape.set_next_vertex(Vec2::new({:.9e}, {:.9e}));", v.x, v.y);
                }
            }
        }

        log::info!(target: TARGET, "    let mut fd = FixtureDef::new(shape);");
        log::info!(target: TARGET, "    fd.material.friction = {:.9e};", self.material.friction);
        log::info!(target: TARGET, "    fd.material.restitution = {:.9e};", self.material.restitution);
        log::info!(target: TARGET, "    fd.material.density = {:.9e};", self.material.density);
        log::info!(target: TARGET, "    fd.is_sensor = {};", self.is_sensor);
        log::info!(target: TARGET, "    fd.filter.category_bits = {};", self.filter.category_bits);
        log::info!(target: TARGET, "    fd.filter.mask_bits = {};", self.filter.mask_bits);
        log::info!(target: TARGET, "    fd.filter.group_index = {};", self.filter.group_index);
        log::info!(target: TARGET, "    world.create_fixture(bodies[&{}], &fd)?;", body_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::SpatialGrid;
    use crate::common::Arena;
    use crate::objects::RigidBody;
    use crate::shapes::{Chain, Circle, Polygon};

    fn dummy_body() -> BodyHandle {
        let mut arena: Arena<RigidBody> = Arena::new();
        arena.insert_with(|h| RigidBody::new(h, &Default::default()))
    }

    #[test]
    fn test_default_filter() {
        let a = Filter::default();
        let b = Filter::default();
        assert!(a.should_collide(&b));

        let no_mask = Filter {
            mask_bits: 0,
            ..Default::default()
        };
        assert!(!a.should_collide(&no_mask));
    }

    #[test]
    fn test_group_index_overrides_bits() {
        let friends = Filter {
            group_index: 3,
            mask_bits: 0,
            ..Default::default()
        };
        assert!(friends.should_collide(&friends));

        let foes = Filter {
            group_index: -2,
            ..Default::default()
        };
        assert!(!foes.should_collide(&foes));
        // Different groups fall back to the bits.
        assert!(foes.should_collide(&Filter::default()));
    }

    #[test]
    fn test_fixture_def_builders() {
        let def = FixtureDef::new(Circle::new(0.5)).with_density(3.0).sensor();
        assert_eq!(def.material.density, 3.0);
        assert_eq!(def.material.friction, 0.2);
        assert!(def.is_sensor);
    }

    #[test]
    fn test_proxies_follow_child_count() {
        let body = dummy_body();
        let mut grid: SpatialGrid<FixtureProxyKey> = SpatialGrid::new(2.0);
        let chain = Chain::new_chain(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0)]).unwrap();
        let mut fixtures: Arena<Fixture> = Arena::new();
        let handle = fixtures.insert(Fixture::new(body, &FixtureDef::new(chain)));
        let xf = Transform::identity();

        fixtures[handle].create_proxies(handle, &mut grid, &xf);
        assert_eq!(fixtures[handle].proxies().len(), 2);
        assert_eq!(grid.proxy_count(), 2);
        let key = grid.user_data(fixtures[handle].proxies()[1].proxy_id);
        assert_eq!(key.fixture, handle);
        assert_eq!(key.child_index, 1);

        fixtures[handle].destroy_proxies(&mut grid);
        assert!(fixtures[handle].proxies().is_empty());
        assert_eq!(grid.proxy_count(), 0);
    }

    #[test]
    fn test_synchronize_covers_both_poses() {
        let body = dummy_body();
        let mut grid: SpatialGrid<FixtureProxyKey> = SpatialGrid::new(2.0);
        let mut fixtures: Arena<Fixture> = Arena::new();
        let handle = fixtures.insert(Fixture::new(body, &FixtureDef::new(Polygon::new_box(0.5, 0.5))));
        let xf1 = Transform::identity();
        let xf2 = Transform::new(Vec2::new(3.0, 0.0), 0.0);

        let fixture = &mut fixtures[handle];
        fixture.create_proxies(handle, &mut grid, &xf1);
        fixture.synchronize(&mut grid, &xf1, &xf2);

        let aabb = fixture.aabb(0).unwrap();
        assert!(aabb.min.x <= -0.5);
        assert!(aabb.max.x >= 3.5);
        assert!(grid.fat_aabb(fixture.proxies()[0].proxy_id).contains(&aabb));
    }
}
