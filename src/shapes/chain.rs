use crate::collision::aabb::AABB;
use crate::common::settings::{LINEAR_SLOP, POLYGON_RADIUS};
use crate::common::{PhysicsError, Result};
use crate::math::{Real, Transform, Vec2};

use super::{Edge, MassData, RayCastInput, RayCastOutput};

/// A free-form sequence of line segments. Each segment is a child shape with
/// ghost vertices taken from its neighbours. Chains have no mass and should
/// only be attached to static bodies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chain {
    /// For loops, the first vertex is repeated at the end.
    pub vertices: Vec<Vec2>,
    pub prev_vertex: Option<Vec2>,
    pub next_vertex: Option<Vec2>,
    pub radius: Real,
}

impl Chain {
    /// A closed loop. The connection between the last and first vertex is
    /// created automatically.
    pub fn new_loop(vertices: &[Vec2]) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(PhysicsError::InvalidChain {
                got: vertices.len(),
                min: 3,
            });
        }
        check_spacing(vertices)?;

        let n = vertices.len();
        let mut vs = Vec::with_capacity(n + 1);
        vs.extend_from_slice(vertices);
        vs.push(vertices[0]);
        Ok(Self {
            vertices: vs,
            prev_vertex: Some(vertices[n - 1]),
            next_vertex: Some(vertices[1]),
            radius: POLYGON_RADIUS,
        })
    }

    /// An open chain without ghost vertices at its ends.
    pub fn new_chain(vertices: &[Vec2]) -> Result<Self> {
        if vertices.len() < 2 {
            return Err(PhysicsError::InvalidChain {
                got: vertices.len(),
                min: 2,
            });
        }
        check_spacing(vertices)?;

        Ok(Self {
            vertices: vertices.to_vec(),
            prev_vertex: None,
            next_vertex: None,
            radius: POLYGON_RADIUS,
        })
    }

    /// Establishes connectivity to a vertex that precedes the first vertex.
    pub fn set_prev_vertex(&mut self, prev_vertex: Vec2) {
        self.prev_vertex = Some(prev_vertex);
    }

    /// Establishes connectivity to a vertex that follows the last vertex.
    pub fn set_next_vertex(&mut self, next_vertex: Vec2) {
        self.next_vertex = Some(next_vertex);
    }

    /// One child per segment.
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The segment `index` as a standalone edge with its ghost vertices.
    pub fn child_edge(&self, index: usize) -> Edge {
        debug_assert!(index < self.child_count());
        let vertex0 = if index > 0 {
            Some(self.vertices[index - 1])
        } else {
            self.prev_vertex
        };
        let vertex3 = if index + 2 < self.vertices.len() {
            Some(self.vertices[index + 2])
        } else {
            self.next_vertex
        };
        let mut edge = Edge::new(self.vertices[index], self.vertices[index + 1]).with_ghosts(vertex0, vertex3);
        edge.radius = self.radius;
        edge
    }

    pub fn test_point(&self, _xf: &Transform, _p: Vec2) -> bool {
        false
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform, child: usize) -> Option<RayCastOutput> {
        self.child_edge(child).ray_cast(input, xf)
    }

    pub fn compute_aabb(&self, xf: &Transform, child: usize) -> AABB {
        let v1 = xf.apply(self.vertices[child]);
        let v2 = xf.apply(self.vertices[child + 1]);
        AABB::new(v1.min(v2), v1.max(v2))
    }

    /// Chains have no volume and therefore no mass.
    pub fn compute_mass(&self, _density: Real) -> MassData {
        MassData::default()
    }
}

fn check_spacing(vertices: &[Vec2]) -> Result<()> {
    for (i, pair) in vertices.windows(2).enumerate() {
        if pair[0].distance_squared(pair[1]) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(PhysicsError::ChainVerticesTooClose(i, i + 1));
        }
    }
    Ok(())
}
