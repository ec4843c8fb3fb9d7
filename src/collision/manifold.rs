use crate::common::settings::MAX_MANIFOLD_POINTS;
use crate::math::{Real, Scalar, Transform, Vec2};

/// Whether a contact feature is a vertex or a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContactFeatureType {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// The features that intersect to form a contact point. Used to match points
/// between steps for warm starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactId {
    /// Feature index on shape A.
    pub index_a: u8,
    /// Feature index on shape B.
    pub index_b: u8,
    pub type_a: ContactFeatureType,
    pub type_b: ContactFeatureType,
}

impl ContactId {
    /// Packs the feature into a single comparable key.
    pub fn key(&self) -> u32 {
        (self.index_a as u32)
            | (self.index_b as u32) << 8
            | (self.type_a as u32) << 16
            | (self.type_b as u32) << 24
    }

    /// The same feature with shapes A and B exchanged.
    pub fn swapped(self) -> Self {
        ContactId {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// A manifold point is a contact point belonging to a contact manifold.
///
/// The local point usage depends on the manifold type:
/// - Circles: the local center of circle B
/// - FaceA: the local center of circle B or the clip point of polygon B
/// - FaceB: the clip point of polygon A
///
/// This structure is stored across time steps, so we keep it small.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    /// The non-penetration impulse.
    pub normal_impulse: Real,
    /// The friction impulse.
    pub tangent_impulse: Real,
    pub id: ContactId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact points in local coordinates, with the normal and reference point
/// interpreted according to `manifold_type`:
/// - Circles: `local_point` is the center of circle A, `local_normal` unused
/// - FaceA: the center of face A and its normal
/// - FaceB: the center of face B and its normal
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub manifold_type: ManifoldType,
    pub point_count: usize,
}

impl Manifold {
    /// The live points.
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }
}

/// World-space view of a manifold, used by the solver and by listeners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldManifold {
    /// World vector pointing from A to B.
    pub normal: Vec2,
    /// World contact points (midway between the two surfaces).
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// A negative value indicates overlap.
    pub separations: [Real; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluate the manifold with supplied transforms. This assumes modest
    /// motion from the original state and does not change the point count or
    /// impulses. The radii must come from the shapes that generated the manifold.
    pub fn new(manifold: &Manifold, xf_a: &Transform, radius_a: Real, xf_b: &Transform, radius_b: Real) -> Self {
        let mut wm = WorldManifold::default();
        if manifold.point_count == 0 {
            return wm;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                wm.normal = Vec2::new(Real::ONE, Real::ZERO);
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if point_a.distance_squared(point_b) > Real::EPSILON * Real::EPSILON {
                    wm.normal = (point_b - point_a).normalize();
                }

                let c_a = point_a + wm.normal * radius_a;
                let c_b = point_b - wm.normal * radius_b;
                wm.points[0] = (c_a + c_b) * Real::HALF;
                wm.separations[0] = (c_b - c_a).dot(wm.normal);
            }
            ManifoldType::FaceA => {
                wm.normal = xf_a.q.apply(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b.apply(mp.local_point);
                    let c_a = clip_point + wm.normal * (radius_a - (clip_point - plane_point).dot(wm.normal));
                    let c_b = clip_point - wm.normal * radius_b;
                    wm.points[i] = (c_a + c_b) * Real::HALF;
                    wm.separations[i] = (c_b - c_a).dot(wm.normal);
                }
            }
            ManifoldType::FaceB => {
                wm.normal = xf_b.q.apply(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a.apply(mp.local_point);
                    let c_b = clip_point + wm.normal * (radius_b - (clip_point - plane_point).dot(wm.normal));
                    let c_a = clip_point - wm.normal * radius_a;
                    wm.points[i] = (c_a + c_b) * Real::HALF;
                    wm.separations[i] = (c_a - c_b).dot(wm.normal);
                }

                // Ensure normal points from A to B.
                wm.normal = -wm.normal;
            }
        }
        wm
    }
}

/// This is used for determining the state of contact points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointState {
    /// Point does not exist
    #[default]
    Null,
    /// Point was added in the update
    Add,
    /// Point persisted across the update
    Persist,
    /// Point was removed in the update
    Remove,
}

/// Compute the point states given two manifolds. The states pertain to the
/// transition from `manifold1` to `manifold2`: `state1` is either Persist or
/// Remove, `state2` is either Add or Persist.
pub fn get_point_states(
    manifold1: &Manifold,
    manifold2: &Manifold,
) -> ([PointState; MAX_MANIFOLD_POINTS], [PointState; MAX_MANIFOLD_POINTS]) {
    let mut state1 = [PointState::Null; MAX_MANIFOLD_POINTS];
    let mut state2 = [PointState::Null; MAX_MANIFOLD_POINTS];

    // Detect persists and removes.
    for (i, p1) in manifold1.points().iter().enumerate() {
        let key = p1.id.key();
        state1[i] = if manifold2.points().iter().any(|p2| p2.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Remove
        };
    }

    // Detect persists and adds.
    for (i, p2) in manifold2.points().iter().enumerate() {
        let key = p2.id.key();
        state2[i] = if manifold1.points().iter().any(|p1| p1.id.key() == key) {
            PointState::Persist
        } else {
            PointState::Add
        };
    }

    (state1, state2)
}

/// Used for computing contact manifolds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactId,
}

/// Sutherland-Hodgman clipping of a segment against the half-space
/// `dot(normal, v) <= offset`. Returns the clipped points and how many are valid.
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: Real,
    vertex_index_a: u8,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    // Start with no output points
    let mut count = 0;

    // Calculate the distance of end points to the line
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // If the points are behind the plane
    if distance0 <= Real::ZERO {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= Real::ZERO {
        v_out[count] = v_in[1];
        count += 1;
    }

    // If the points are on different sides of the plane
    if distance0 * distance1 < Real::ZERO {
        // Find intersection point of edge and plane
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + (v_in[1].v - v_in[0].v) * interp;

        // VertexA is hitting edgeB.
        v_out[count].id = ContactId {
            index_a: vertex_index_a,
            index_b: v_in[0].id.index_b,
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Face,
        };
        count += 1;
    }

    (v_out, count)
}
