//! Debug drawing capability. Purely observational: nothing drawn feeds back
//! into the simulation.

use crate::math::{Real, Transform, Vec2};

/// RGBA color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

/// What [`crate::world::PhysicsWorld::draw_debug`] should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawFlags {
    pub shapes: bool,
    pub joints: bool,
    pub aabbs: bool,
    pub center_of_mass: bool,
    pub contact_points: bool,
}

impl Default for DrawFlags {
    fn default() -> Self {
        Self {
            shapes: true,
            joints: true,
            aabbs: false,
            center_of_mass: false,
            contact_points: false,
        }
    }
}

/// Implemented by a renderer (or a test recorder) to receive world-space geometry.
pub trait DebugDraw {
    /// Draw a closed polygon provided in CCW order.
    fn draw_polygon(&mut self, vertices: &[Vec2], color: Color);

    /// Draw a solid closed polygon provided in CCW order.
    fn draw_solid_polygon(&mut self, vertices: &[Vec2], color: Color);

    fn draw_circle(&mut self, center: Vec2, radius: Real, color: Color);

    /// Draw a solid circle; `axis` marks the body's rotation.
    fn draw_solid_circle(&mut self, center: Vec2, radius: Real, axis: Vec2, color: Color);

    fn draw_segment(&mut self, p1: Vec2, p2: Vec2, color: Color);

    /// Draw a transform. Choose your own length scale.
    fn draw_transform(&mut self, xf: Transform);

    fn draw_point(&mut self, p: Vec2, size: Real, color: Color);
}
