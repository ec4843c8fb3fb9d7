//! Global tuning constants based on meters-kilograms-seconds (MKS) units.
//!
//! These are startup configuration. They are never changed while a step runs.
//! This table is the only place that writes `Real` values as float literals;
//! a different [`Real`] has to provide its own values here.

use crate::math::{Real, PI};

// Collision

/// The maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// The maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Fattening applied to broad-phase AABBs so small moves do not trigger updates.
pub const AABB_EXTENSION: Real = 0.1;

/// Dimensionless multiplier predicting future position from the displacement.
pub const AABB_MULTIPLIER: Real = 2.0;

/// A small length used as a collision and constraint tolerance. Numerically
/// significant but visually insignificant.
pub const LINEAR_SLOP: Real = 0.005;

/// A small angle used as a collision and constraint tolerance.
pub const ANGULAR_SLOP: Real = 2.0 / 180.0 * PI;

/// The radius of the polygon/edge skin. Smaller values give continuous collision
/// an insufficient buffer; larger ones create artifacts at vertices.
pub const POLYGON_RADIUS: Real = 2.0 * LINEAR_SLOP;

/// Maximum number of sub-steps per contact in continuous physics simulation.
pub const MAX_SUB_STEPS: usize = 8;

// Dynamics

/// Maximum number of contacts handled when solving a TOI impact.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Collisions with a relative normal speed below this are treated as inelastic.
pub const VELOCITY_THRESHOLD: Real = 1.0;

/// The maximum linear position correction used when solving constraints.
pub const MAX_LINEAR_CORRECTION: Real = 0.2;

/// The maximum angular position correction used when solving constraints.
pub const MAX_ANGULAR_CORRECTION: Real = 8.0 / 180.0 * PI;

/// The maximum translation of a body per step.
pub const MAX_TRANSLATION: Real = 2.0;
pub const MAX_TRANSLATION_SQUARED: Real = MAX_TRANSLATION * MAX_TRANSLATION;

/// The maximum rotation of a body per step.
pub const MAX_ROTATION: Real = 0.5 * PI;
pub const MAX_ROTATION_SQUARED: Real = MAX_ROTATION * MAX_ROTATION;

/// How fast overlap is resolved. 1 would remove it in one step but overshoots.
pub const BAUMGARTE: Real = 0.2;
pub const TOI_BAUMGARTE: Real = 0.75;

// Sleep

/// The time that a body must be still before it will go to sleep.
pub const TIME_TO_SLEEP: Real = 0.5;

/// A body cannot sleep if its linear velocity is above this tolerance.
pub const LINEAR_SLEEP_TOLERANCE: Real = 0.01;

/// A body cannot sleep if its angular velocity is above this tolerance.
pub const ANGULAR_SLEEP_TOLERANCE: Real = 2.0 / 180.0 * PI;

// Broad phase

/// Cell size of the default broad phase, in meters.
pub const DEFAULT_CELL_SIZE: Real = 4.0;
