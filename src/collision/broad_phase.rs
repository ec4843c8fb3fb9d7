use crate::math::{Real, Vec2};
use crate::shapes::RayCastInput;

use super::aabb::AABB;

/// Identifier of a proxy inside a broad phase. Stable until the proxy is destroyed.
pub type ProxyId = usize;

/// Coarse overlap detection over fattened AABBs.
///
/// Each proxy carries user data of type `T` (the world stores the owning
/// fixture and child index). Proxies that moved or were touched since the last
/// [`BroadPhase::update_pairs`] are re-tested against everything they overlap.
pub trait BroadPhase<T: Copy> {
    /// Create a proxy with an initial AABB. Pairs are not reported until
    /// `update_pairs` is called.
    fn create_proxy(&mut self, aabb: AABB, user_data: T) -> ProxyId;

    /// Destroy a proxy. It is up to the client to remove any pairs.
    fn destroy_proxy(&mut self, proxy_id: ProxyId);

    /// Call as many times as you like, then when you are done call
    /// `update_pairs` to finalize the proxy pairs (for your time step).
    /// Returns true when the fat AABB had to be rebuilt.
    fn move_proxy(&mut self, proxy_id: ProxyId, aabb: AABB, displacement: Vec2) -> bool;

    /// Call to trigger a re-processing of its pairs on the next call to `update_pairs`.
    fn touch_proxy(&mut self, proxy_id: ProxyId);

    /// The fat AABB of a proxy.
    fn fat_aabb(&self, proxy_id: ProxyId) -> AABB;

    fn user_data(&self, proxy_id: ProxyId) -> T;

    /// Test overlap of fat AABBs.
    fn test_overlap(&self, proxy_id_a: ProxyId, proxy_id_b: ProxyId) -> bool {
        self.fat_aabb(proxy_id_a).overlaps(&self.fat_aabb(proxy_id_b))
    }

    /// Drains the move buffer and returns the user data of every new
    /// potentially overlapping pair, without duplicates.
    fn update_pairs(&mut self) -> Vec<(T, T)>;

    /// Visits proxies whose fat AABB overlaps `aabb` until the callback returns false.
    fn query(&self, aabb: &AABB, callback: &mut dyn FnMut(ProxyId) -> bool);

    /// Visits proxies whose fat AABB intersects the ray. The callback returns the
    /// new max fraction: 0 terminates, a positive value clips the ray, and
    /// the input fraction (or a negative value) continues unchanged.
    fn ray_cast(&self, input: &RayCastInput, callback: &mut dyn FnMut(&RayCastInput, ProxyId) -> Real);

    /// Number of live proxies.
    fn proxy_count(&self) -> usize;
}
