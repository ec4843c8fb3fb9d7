// Implements a hashed uniform spatial grid for broadphase collision detection.

use std::collections::HashMap;

use log::trace;

use crate::collision::aabb::AABB;
use crate::collision::broad_phase::{BroadPhase, ProxyId};
use crate::common::settings::{AABB_EXTENSION, AABB_MULTIPLIER};
use crate::math::{Real, Scalar, Vec2};
use crate::shapes::RayCastInput;

/// Inclusive range of cells covered by a fat AABB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min_col: i32,
    min_row: i32,
    max_col: i32,
    max_row: i32,
}

impl CellRange {
    fn cells(self) -> impl Iterator<Item = (i32, i32)> {
        (self.min_row..=self.max_row).flat_map(move |row| (self.min_col..=self.max_col).map(move |col| (col, row)))
    }
}

#[derive(Debug, Clone)]
struct GridProxy<T> {
    aabb: AABB,
    user_data: T,
    range: CellRange,
}

/// A uniform grid of square cells hashed by `(col, row)`, so the world has no bounds.
///
/// Proxies are stored with fattened AABBs; small motions inside the fat AABB
/// do not touch the grid.
#[derive(Debug)]
pub struct SpatialGrid<T> {
    cell_size: Real,
    inv_cell_size: Real, // 1.0 / cell_size, cached for performance
    cells: HashMap<(i32, i32), Vec<ProxyId>>,
    proxies: Vec<Option<GridProxy<T>>>,
    free_list: Vec<ProxyId>,
    proxy_count: usize,

    // Proxies that moved since the last pair update.
    move_buffer: Vec<ProxyId>,
}

impl<T: Copy> SpatialGrid<T> {
    /// Creates a new SpatialGrid.
    ///
    /// # Arguments
    /// * `cell_size` - The desired size (width/height) for each grid cell.
    pub fn new(cell_size: Real) -> Self {
        debug_assert!(cell_size > Real::ZERO, "Cell size must be positive");
        trace!("creating spatial grid with cell size {}", cell_size);
        SpatialGrid {
            cell_size,
            inv_cell_size: Real::ONE / cell_size,
            cells: HashMap::new(),
            proxies: Vec::new(),
            free_list: Vec::new(),
            proxy_count: 0,
            move_buffer: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> Real {
        self.cell_size
    }

    // --- Helper Methods ---

    /// Converts world coordinates to grid cell indices (col, row).
    #[inline]
    fn get_cell_indices(&self, point: Vec2) -> (i32, i32) {
        let col = (point.x * self.inv_cell_size).floor() as i32;
        let row = (point.y * self.inv_cell_size).floor() as i32;
        (col, row)
    }

    /// Determines the range of grid cells overlapped by an AABB.
    fn get_cell_range(&self, aabb: &AABB) -> CellRange {
        let (min_col, min_row) = self.get_cell_indices(aabb.min);
        let (max_col, max_row) = self.get_cell_indices(aabb.max);
        CellRange {
            min_col,
            min_row,
            max_col,
            max_row,
        }
    }

    fn proxy(&self, proxy_id: ProxyId) -> &GridProxy<T> {
        match self.proxies.get(proxy_id).and_then(Option::as_ref) {
            Some(proxy) => proxy,
            None => panic!("invalid broad-phase proxy {}", proxy_id),
        }
    }

    fn insert_cells(&mut self, proxy_id: ProxyId, range: CellRange) {
        for cell in range.cells() {
            self.cells.entry(cell).or_default().push(proxy_id);
        }
    }

    fn remove_cells(&mut self, proxy_id: ProxyId, range: CellRange) {
        for cell in range.cells() {
            if let Some(ids) = self.cells.get_mut(&cell) {
                ids.retain(|&id| id != proxy_id);
                if ids.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
    }

    /// Sorted, de-duplicated ids of proxies sharing a cell with `aabb`.
    fn candidates(&self, aabb: &AABB) -> Vec<ProxyId> {
        let mut ids: Vec<ProxyId> = self
            .get_cell_range(aabb)
            .cells()
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn buffer_move(&mut self, proxy_id: ProxyId) {
        self.move_buffer.push(proxy_id);
    }

    fn unbuffer_move(&mut self, proxy_id: ProxyId) {
        self.move_buffer.retain(|&id| id != proxy_id);
    }
}

impl<T: Copy> BroadPhase<T> for SpatialGrid<T> {
    fn create_proxy(&mut self, aabb: AABB, user_data: T) -> ProxyId {
        let fat = aabb.expanded(AABB_EXTENSION);
        let range = self.get_cell_range(&fat);
        let proxy = GridProxy {
            aabb: fat,
            user_data,
            range,
        };

        let proxy_id = match self.free_list.pop() {
            Some(id) => {
                self.proxies[id] = Some(proxy);
                id
            }
            None => {
                self.proxies.push(Some(proxy));
                self.proxies.len() - 1
            }
        };
        self.proxy_count += 1;
        self.insert_cells(proxy_id, range);
        self.buffer_move(proxy_id);
        proxy_id
    }

    fn destroy_proxy(&mut self, proxy_id: ProxyId) {
        let Some(proxy) = self.proxies.get_mut(proxy_id).and_then(Option::take) else {
            debug_assert!(false, "destroying unknown proxy {}", proxy_id);
            return;
        };
        self.remove_cells(proxy_id, proxy.range);
        self.unbuffer_move(proxy_id);
        self.free_list.push(proxy_id);
        self.proxy_count -= 1;
    }

    fn move_proxy(&mut self, proxy_id: ProxyId, aabb: AABB, displacement: Vec2) -> bool {
        let old = self.proxy(proxy_id).clone();
        if old.aabb.contains(&aabb) {
            return false;
        }

        // Extend AABB.
        let mut b = aabb.expanded(AABB_EXTENSION);

        // Predict AABB displacement.
        let d = displacement * AABB_MULTIPLIER;
        if d.x < Real::ZERO {
            b.min.x += d.x;
        } else {
            b.max.x += d.x;
        }
        if d.y < Real::ZERO {
            b.min.y += d.y;
        } else {
            b.max.y += d.y;
        }

        let range = self.get_cell_range(&b);
        if range != old.range {
            self.remove_cells(proxy_id, old.range);
            self.insert_cells(proxy_id, range);
        }
        if let Some(proxy) = self.proxies[proxy_id].as_mut() {
            proxy.aabb = b;
            proxy.range = range;
        }

        self.buffer_move(proxy_id);
        true
    }

    fn touch_proxy(&mut self, proxy_id: ProxyId) {
        self.buffer_move(proxy_id);
    }

    fn fat_aabb(&self, proxy_id: ProxyId) -> AABB {
        self.proxy(proxy_id).aabb
    }

    fn user_data(&self, proxy_id: ProxyId) -> T {
        self.proxy(proxy_id).user_data
    }

    fn update_pairs(&mut self) -> Vec<(T, T)> {
        let mut moved = std::mem::take(&mut self.move_buffer);
        moved.sort_unstable();
        moved.dedup();

        // Perform collision queries for every moved proxy against the grid.
        let mut pairs: Vec<(ProxyId, ProxyId)> = Vec::new();
        for &query_id in &moved {
            let Some(query) = self.proxies.get(query_id).and_then(Option::as_ref) else {
                continue;
            };
            let fat = query.aabb;
            for other in self.candidates(&fat) {
                // A proxy cannot form a pair with itself.
                if other == query_id {
                    continue;
                }
                if self.proxy(other).aabb.overlaps(&fat) {
                    pairs.push((query_id.min(other), query_id.max(other)));
                }
            }
        }

        // Both proxies may have moved; keep each pair once.
        pairs.sort_unstable();
        pairs.dedup();

        pairs
            .into_iter()
            .map(|(a, b)| (self.user_data(a), self.user_data(b)))
            .collect()
    }

    fn query(&self, aabb: &AABB, callback: &mut dyn FnMut(ProxyId) -> bool) {
        for id in self.candidates(aabb) {
            if self.proxy(id).aabb.overlaps(aabb) && !callback(id) {
                return;
            }
        }
    }

    fn ray_cast(&self, input: &RayCastInput, callback: &mut dyn FnMut(&RayCastInput, ProxyId) -> Real) {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = (p2 - p1).normalize();
        if r.magnitude_squared() == Real::ZERO {
            return;
        }

        // v is perpendicular to the segment.
        let v = Vec2::scalar_cross(Real::ONE, r);
        let abs_v = v.abs();

        let mut max_fraction = input.max_fraction;

        // Build a bounding box for the segment.
        let t = p1 + (p2 - p1) * max_fraction;
        let segment_aabb = AABB::new(p1.min(t), p1.max(t));

        for id in self.candidates(&segment_aabb) {
            let aabb = self.proxy(id).aabb;
            let t = p1 + (p2 - p1) * max_fraction;
            let clipped = AABB::new(p1.min(t), p1.max(t));
            if !aabb.overlaps(&clipped) {
                continue;
            }

            // Separating axis for segment (Gino, p80).
            // |dot(v, p1 - c)| > dot(|v|, h)
            let c = aabb.center();
            let h = aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > Real::ZERO {
                continue;
            }

            let sub_input = RayCastInput {
                p1,
                p2,
                max_fraction,
            };
            let value = callback(&sub_input, id);

            if value == Real::ZERO {
                // The client has terminated the ray cast.
                return;
            }

            if value > Real::ZERO {
                // Update segment bounding box.
                max_fraction = value;
            }
        }
    }

    fn proxy_count(&self) -> usize {
        self.proxy_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(x0: Real, y0: Real, x1: Real, y1: Real) -> AABB {
        AABB::new(Vec2::new(x0, y0), Vec2::new(x1, y1))
    }

    #[test]
    fn test_grid_new() {
        let grid: SpatialGrid<u32> = SpatialGrid::new(2.0);
        assert_eq!(grid.cell_size(), 2.0);
        assert_eq!(grid.inv_cell_size, 0.5);
        assert_eq!(grid.proxy_count(), 0);
    }

    #[test]
    fn test_get_cell_indices() {
        let grid: SpatialGrid<u32> = SpatialGrid::new(5.0);

        // Points and expected cell (col, row)
        let points = vec![
            (Vec2::new(-10.0, -10.0), (-2, -2)),
            (Vec2::new(-5.1, -5.1), (-2, -2)),
            (Vec2::new(-5.0, -5.0), (-1, -1)),
            (Vec2::new(0.0, 0.0), (0, 0)),
            (Vec2::new(9.9, 9.9), (1, 1)),
            (Vec2::new(10.0, 10.0), (2, 2)),
        ];

        for (point, expected) in points {
            assert_eq!(grid.get_cell_indices(point), expected, "Point {:?}", point);
        }
    }

    #[test]
    fn test_create_and_destroy() {
        let mut grid = SpatialGrid::new(1.0);
        let a = grid.create_proxy(aabb(0.0, 0.0, 1.0, 1.0), 10u32);
        let b = grid.create_proxy(aabb(5.0, 5.0, 6.0, 6.0), 20u32);
        assert_eq!(grid.proxy_count(), 2);
        assert_eq!(grid.user_data(b), 20);

        let fat = grid.fat_aabb(a);
        assert_eq!(fat.min, Vec2::new(-AABB_EXTENSION, -AABB_EXTENSION));

        grid.destroy_proxy(a);
        assert_eq!(grid.proxy_count(), 1);

        // The freed slot is reused.
        let c = grid.create_proxy(aabb(0.0, 0.0, 1.0, 1.0), 30u32);
        assert_eq!(c, a);
        assert_eq!(grid.user_data(c), 30);
    }

    #[test]
    fn test_update_pairs_reports_new_overlaps_once() {
        let mut grid = SpatialGrid::new(5.0);
        grid.create_proxy(aabb(1.0, 1.0, 2.0, 2.0), 0u32);
        grid.create_proxy(aabb(1.5, 1.5, 3.0, 3.0), 1u32);
        grid.create_proxy(aabb(4.0, 4.0, 6.0, 6.0), 2u32); // spans four cells
        grid.create_proxy(aabb(5.5, 5.5, 7.0, 7.0), 3u32);
        grid.create_proxy(aabb(20.0, 20.0, 21.0, 21.0), 4u32);

        let mut pairs = grid.update_pairs();
        pairs.sort();
        assert_eq!(pairs, vec![(0, 1), (2, 3)]);

        // Nothing moved, nothing reported.
        assert!(grid.update_pairs().is_empty());
    }

    #[test]
    fn test_move_proxy_inside_fat_aabb_is_ignored() {
        let mut grid = SpatialGrid::new(1.0);
        let a = grid.create_proxy(aabb(0.0, 0.0, 1.0, 1.0), 0u32);
        let b = grid.create_proxy(aabb(3.0, 0.0, 4.0, 1.0), 1u32);
        grid.update_pairs();

        assert!(!grid.move_proxy(a, aabb(0.05, 0.0, 1.05, 1.0), Vec2::new(0.05, 0.0)));
        assert!(grid.update_pairs().is_empty());

        assert!(grid.move_proxy(a, aabb(2.5, 0.0, 3.5, 1.0), Vec2::new(2.5, 0.0)));
        // Displacement is predicted along the motion.
        assert!(grid.fat_aabb(a).max.x > 3.5 + AABB_EXTENSION);
        assert!(grid.test_overlap(a, b));
        assert_eq!(grid.update_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn test_query_and_early_exit() {
        let mut grid = SpatialGrid::new(2.0);
        for i in 0..5 {
            let x = i as Real * 3.0;
            grid.create_proxy(aabb(x, 0.0, x + 1.0, 1.0), i as u32);
        }
        let mut hits = Vec::new();
        grid.query(&aabb(2.5, 0.0, 7.5, 1.0), &mut |id| {
            hits.push(grid.user_data(id));
            true
        });
        assert_eq!(hits, vec![1, 2]);

        let mut count = 0;
        grid.query(&aabb(-10.0, -10.0, 100.0, 10.0), &mut |_| {
            count += 1;
            false
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_ray_cast_visits_crossed_proxies() {
        let mut grid = SpatialGrid::new(2.0);
        grid.create_proxy(aabb(2.0, -1.0, 3.0, 1.0), 0u32);
        grid.create_proxy(aabb(6.0, -1.0, 7.0, 1.0), 1u32);
        grid.create_proxy(aabb(4.0, 5.0, 5.0, 6.0), 2u32);

        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let mut visited = Vec::new();
        grid.ray_cast(&input, &mut |sub, id| {
            visited.push(id);
            sub.max_fraction
        });
        assert_eq!(visited, vec![0, 1]);

        // Clipping at the first hit stops the second one.
        let mut visited = Vec::new();
        grid.ray_cast(&input, &mut |_, id| {
            visited.push(id);
            0.25
        });
        assert_eq!(visited, vec![0]);
    }
}
