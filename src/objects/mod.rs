pub mod fixture;
pub mod rigid_body;

pub use fixture::{Filter, Fixture, FixtureDef, FixtureProxy, FixtureProxyKey};
pub use rigid_body::{BodyDef, BodyHandle, BodyType, ContactHandle, FixtureHandle, JointEdge, RigidBody};
