pub mod contact;
pub(crate) mod contact_manager;
pub(crate) mod contact_solver;
pub(crate) mod island;
pub mod physics_world;

pub use contact::{Contact, ContactFilter, ContactImpulse, ContactListener};
pub use physics_world::{PhysicsWorld, Profile, StepConfig, DEFAULT_CELL_SIZE};
