pub mod arena;
pub mod draw;
pub mod error;
pub mod material;
pub mod settings;

pub use arena::{Arena, Handle};
pub use draw::{Color, DebugDraw, DrawFlags};
pub use error::{PhysicsError, Result};
pub use material::Material;

/// `log` target for world, body, fixture and joint dump scripts.
pub const DUMP_TARGET: &str = "rigid2d::dump";
