//! A 2D rigid-body physics core: narrow-phase collision, continuous
//! collision through time of impact, and an iterative contact and joint
//! solver, driven by a [`PhysicsWorld`].
//!
//! ```no_run
//! use rigid2d::{BodyDef, FixtureDef, PhysicsWorld, Polygon, StepConfig, Vec2};
//!
//! # fn main() -> rigid2d::Result<()> {
//! let mut world = PhysicsWorld::new(Vec2::new(0.0, -10.0));
//! let ground = world.create_body(&BodyDef::default())?;
//! world.create_fixture(ground, &FixtureDef::new(Polygon::new_box(50.0, 1.0)))?;
//!
//! let body = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 4.0)))?;
//! world.create_fixture(body, &FixtureDef::new(Polygon::new_box(1.0, 1.0)).with_density(1.0))?;
//!
//! let config = StepConfig::default();
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, &config);
//! }
//! # Ok(())
//! # }
//! ```

pub mod collision;
pub mod common;
pub mod constraints;
pub mod integration;
pub mod math;
pub mod objects;
pub mod shapes;
pub mod world;

// Re-export key types for easier use
pub use collision::{BroadPhase, SpatialGrid, AABB};
pub use common::{Color, DebugDraw, DrawFlags, Material, PhysicsError, Result};
pub use constraints::{Constraint, Joint, JointDef, JointHandle, JointType};
pub use math::{Real, Rot, Transform, Vec2};
pub use objects::{BodyDef, BodyHandle, BodyType, Filter, Fixture, FixtureDef, FixtureHandle, RigidBody};
pub use shapes::{Chain, Circle, Edge, Polygon, Shape};
pub use world::{Contact, ContactFilter, ContactImpulse, ContactListener, PhysicsWorld, Profile, StepConfig};
