pub mod mat;
pub mod rotation;
pub mod scalar;
pub mod sweep;
pub mod transform;
pub mod vec2;

pub use mat::{Mat22, Mat33};
pub use rotation::Rot;
pub use scalar::{Real, Scalar, PI};
pub use sweep::Sweep;
pub use transform::Transform;
pub use vec2::{Vec2, Vec3};
