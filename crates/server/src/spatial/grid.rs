//! Spatial hash grid.
//!
//! Items are stored in a flat Vec with a HashMap index for O(1) lookup.
//! The grid buckets are rebuilt lazily before a query once an insert or
//! update has made them dirty. Removal never dirties the grid: stale ids
//! in a bucket are filtered out by the index lookup.

use fixedbitset::FixedBitSet;
use glam::Vec2;
use std::collections::HashMap;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Square bounds around a centre.
    #[inline]
    pub fn from_center(center: Vec2, half: f32) -> Self {
        Self::from_half_extents(center, Vec2::splat(half))
    }

    #[inline]
    pub fn from_half_extents(center: Vec2, half: Vec2) -> Self {
        Self {
            min_x: center.x - half.x,
            min_y: center.y - half.y,
            max_x: center.x + half.x,
            max_y: center.y + half.y,
        }
    }

    /// Check if two bounds intersect. Touching edges count.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.min_x > self.max_x
            || other.max_x < self.min_x
            || other.min_y > self.max_y
            || other.max_y < self.min_y)
    }

    #[inline]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    /// Nearest point inside the bounds.
    #[inline]
    pub fn clamp(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.min_x, self.max_x),
            point.y.clamp(self.min_y, self.max_y),
        )
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

#[derive(Debug, Clone, Copy)]
struct GridItem {
    id: u32,
    bound: Bounds,
}

/// Uniform grid index keyed by entity id.
pub struct SpatialGrid {
    items: Vec<GridItem>,
    id_to_index: HashMap<u32, usize>,
    bounds: Bounds,
    dirty: bool,
    buckets: Vec<Vec<u32>>,
    columns: usize,
    cell_w: f32,
    cell_h: f32,
    /// Slots already reported by the current query.
    seen: FixedBitSet,
}

impl SpatialGrid {
    /// Create a grid of `columns` x `columns` buckets covering `bounds`.
    pub fn new(bounds: Bounds, columns: usize) -> Self {
        let columns = columns.max(1);
        Self {
            items: Vec::with_capacity(1024),
            id_to_index: HashMap::with_capacity(1024),
            bounds,
            dirty: false,
            buckets: vec![Vec::new(); columns * columns],
            columns,
            cell_w: (bounds.width() / columns as f32).max(f32::MIN_POSITIVE),
            cell_h: (bounds.height() / columns as f32).max(f32::MIN_POSITIVE),
            seen: FixedBitSet::with_capacity(1024),
        }
    }

    /// Bucket column/row range covering `bound`, clamped to the grid.
    #[inline]
    fn span(&self, bound: &Bounds) -> (usize, usize, usize, usize) {
        let last = (self.columns - 1) as f32;
        let gx = |x: f32| ((x - self.bounds.min_x) / self.cell_w).floor().clamp(0.0, last) as usize;
        let gy = |y: f32| ((y - self.bounds.min_y) / self.cell_h).floor().clamp(0.0, last) as usize;
        (gx(bound.min_x), gx(bound.max_x), gy(bound.min_y), gy(bound.max_y))
    }

    /// Item bounds with the centre clamped into the world, so entities
    /// outside it stay indexed at the nearest edge.
    #[inline]
    fn item_bounds(&self, center: Vec2, radius: f32) -> Bounds {
        Bounds::from_center(self.bounds.clamp(center), radius.max(0.0))
    }

    /// Insert or replace an item.
    pub fn insert(&mut self, id: u32, center: Vec2, radius: f32) {
        let item = GridItem {
            id,
            bound: self.item_bounds(center, radius),
        };
        if let Some(&idx) = self.id_to_index.get(&id) {
            self.items[idx] = item;
        } else {
            self.id_to_index.insert(id, self.items.len());
            self.items.push(item);
        }
        self.dirty = true;
    }

    /// Remove an item. Unknown ids are ignored.
    pub fn remove(&mut self, id: u32) {
        if let Some(idx) = self.id_to_index.remove(&id) {
            self.items.swap_remove(idx);
            if idx < self.items.len() {
                let swapped_id = self.items[idx].id;
                self.id_to_index.insert(swapped_id, idx);
            }
        }
    }

    /// Move or resize an existing item.
    pub fn update(&mut self, id: u32, center: Vec2, radius: f32) {
        let bound = self.item_bounds(center, radius);
        if let Some(&idx) = self.id_to_index.get(&id) {
            self.items[idx].bound = bound;
            self.dirty = true;
        }
    }

    fn rebuild(&mut self) {
        if !self.dirty {
            return;
        }
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for i in 0..self.items.len() {
            let item = self.items[i];
            let (min_gx, max_gx, min_gy, max_gy) = self.span(&item.bound);
            for gy in min_gy..=max_gy {
                let row = gy * self.columns;
                for gx in min_gx..=max_gx {
                    self.buckets[row + gx].push(item.id);
                }
            }
        }
        self.dirty = false;
    }

    /// Ids of items whose bounds intersect `region`. Unordered; callers
    /// re-test exact geometry.
    pub fn query_region(&mut self, region: &Bounds) -> Vec<u32> {
        self.rebuild();
        let (min_gx, max_gx, min_gy, max_gy) = self.span(region);

        self.seen.clear();
        self.seen.grow(self.items.len());
        let mut result = Vec::with_capacity(32);

        for gy in min_gy..=max_gy {
            let row = gy * self.columns;
            for gx in min_gx..=max_gx {
                for &id in &self.buckets[row + gx] {
                    let Some(&idx) = self.id_to_index.get(&id) else {
                        continue;
                    };
                    if self.seen.put(idx) {
                        continue;
                    }
                    if self.items[idx].bound.intersects(region) {
                        result.push(id);
                    }
                }
            }
        }
        result
    }

    /// Ids of items whose bounds intersect the square around a circle.
    pub fn query_radius(&mut self, center: Vec2, radius: f32) -> Vec<u32> {
        self.query_region(&Bounds::from_center(center, radius))
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.id_to_index.contains_key(&id)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

}

impl std::fmt::Debug for SpatialGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialGrid")
            .field("items", &self.items.len())
            .field("bounds", &self.bounds)
            .field("columns", &self.columns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SpatialGrid {
        SpatialGrid::new(Bounds::new(0.0, 0.0, 1000.0, 1000.0), 16)
    }

    #[test]
    fn test_bounds_intersects() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::new(5.0, 5.0, 15.0, 15.0);
        let c = Bounds::new(20.0, 20.0, 30.0, 30.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_insert_and_query() {
        let mut g = grid();
        g.insert(1, Vec2::new(100.0, 100.0), 10.0);
        g.insert(2, Vec2::new(500.0, 500.0), 10.0);
        g.insert(3, Vec2::new(900.0, 100.0), 10.0);

        let found = g.query_radius(Vec2::new(100.0, 100.0), 20.0);
        assert_eq!(found, vec![1]);

        let mut all = g.query_region(&Bounds::new(0.0, 0.0, 1000.0, 1000.0));
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn test_large_item_reported_once() {
        let mut g = grid();
        g.insert(7, Vec2::new(500.0, 500.0), 300.0);
        let found = g.query_region(&Bounds::new(0.0, 0.0, 1000.0, 1000.0));
        assert_eq!(found, vec![7]);
    }

    #[test]
    fn test_remove_hides_item_without_rebuild() {
        let mut g = grid();
        g.insert(1, Vec2::new(100.0, 100.0), 10.0);
        g.insert(2, Vec2::new(110.0, 100.0), 10.0);
        assert_eq!(g.query_radius(Vec2::new(100.0, 100.0), 30.0).len(), 2);
        g.remove(1);
        assert_eq!(g.query_radius(Vec2::new(100.0, 100.0), 30.0), vec![2]);
        assert!(!g.contains(1));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_update_moves_item() {
        let mut g = grid();
        g.insert(1, Vec2::new(100.0, 100.0), 10.0);
        g.update(1, Vec2::new(800.0, 800.0), 10.0);
        assert!(g.query_radius(Vec2::new(100.0, 100.0), 20.0).is_empty());
        assert_eq!(g.query_radius(Vec2::new(800.0, 800.0), 20.0), vec![1]);
    }

    #[test]
    fn test_out_of_bounds_is_clamped_not_dropped() {
        let mut g = grid();
        g.insert(9, Vec2::new(-500.0, 2000.0), 5.0);
        assert!(g.contains(9));
        let found = g.query_radius(Vec2::new(0.0, 1000.0), 10.0);
        assert_eq!(found, vec![9]);
    }
}
