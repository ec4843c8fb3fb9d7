pub mod aabb;
pub mod broad_phase;
pub mod collide_circle;
pub mod collide_edge;
pub mod collide_polygon;
pub mod detection;
pub mod distance;
pub mod manifold;
pub mod spatial_grid;
pub mod toi;

// Re-export key types
pub use aabb::AABB;
pub use broad_phase::{BroadPhase, ProxyId};
pub use collide_circle::{collide_circles, collide_polygon_and_circle};
pub use collide_edge::{collide_edge_and_circle, collide_edge_and_polygon};
pub use collide_polygon::collide_polygons;
pub use detection::{evaluate, pair_order, test_overlap};
pub use distance::{
    distance, shape_cast, DistanceInput, DistanceOutput, DistanceProxy, ShapeCastInput, ShapeCastOutput, SimplexCache,
};
pub use manifold::{
    clip_segment_to_line, get_point_states, ClipVertex, ContactFeatureType, ContactId, Manifold, ManifoldPoint,
    ManifoldType, PointState, WorldManifold,
};
pub use spatial_grid::SpatialGrid;
pub use toi::{time_of_impact, ToiInput, ToiOutput, ToiState, ToiStats};
