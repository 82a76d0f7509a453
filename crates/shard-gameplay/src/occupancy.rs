//! Occupancy grids and structural connectivity.
//!
//! An enemy's voxels live in a cubic grid flattened x-fastest
//! (`x + y * size + z * size²`). Each slot holds the render-instance index of
//! the voxel occupying it, or [`EMPTY`]. Slots are never compacted: destroying
//! a voxel clears its slot and leaves the instance index unused.

use std::collections::VecDeque;

use glam::UVec3;

/// Sentinel for an unoccupied slot.
pub const EMPTY: u32 = u32::MAX;

/// Flat index of `(x, y, z)` in a cube of edge `size`.
#[inline]
#[must_use]
pub const fn flat_index(size: usize, x: usize, y: usize, z: usize) -> usize {
    x + y * size + z * size * size
}

/// Inverse of [`flat_index`].
#[inline]
#[must_use]
pub const fn unflatten(size: usize, index: usize) -> (usize, usize, usize) {
    (index % size, (index / size) % size, index / (size * size))
}

/// Face-adjacent neighbours of `index` that lie inside the cube.
#[inline]
pub fn neighbors6(size: usize, index: usize) -> Neighbors6 {
    let (x, y, z) = unflatten(size, index);
    let mut out = Neighbors6 {
        n: 0,
        v: [0; 6],
    };
    let mut push = |i: usize| {
        out.v[out.n] = i;
        out.n += 1;
    };
    if x > 0 {
        push(index - 1);
    }
    if x + 1 < size {
        push(index + 1);
    }
    if y > 0 {
        push(index - size);
    }
    if y + 1 < size {
        push(index + size);
    }
    if z > 0 {
        push(index - size * size);
    }
    if z + 1 < size {
        push(index + size * size);
    }
    out
}

/// Up to six neighbour indices without allocating.
#[derive(Debug, Clone, Copy)]
pub struct Neighbors6 {
    n: usize,
    v: [usize; 6],
}

impl Neighbors6 {
    /// The neighbour indices.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.v[..self.n].iter()
    }
}

/// Splits the occupied cells of a cube into 6-connected components.
///
/// Components are returned in discovery order: the scan visits seeds in flat
/// index order, so the component containing the lowest occupied index comes
/// first. Each component lists its cells in BFS order.
pub fn connected_components(size: usize, occupied: impl Fn(usize) -> bool) -> Vec<Vec<usize>> {
    let total = size * size * size;
    let mut visited = vec![false; total];
    let mut queue = VecDeque::new();
    let mut components = Vec::new();

    for seed in 0..total {
        if visited[seed] || !occupied(seed) {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut component = Vec::new();
        while let Some(i) = queue.pop_front() {
            component.push(i);
            for &n in neighbors6(size, i).iter() {
                if !visited[n] && occupied(n) {
                    visited[n] = true;
                    queue.push_back(n);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Position of the largest component; ties keep the first discovered.
#[must_use]
pub fn largest_component(components: &[Vec<usize>]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, c) in components.iter().enumerate() {
        match best {
            Some((_, len)) if c.len() <= len => {},
            _ => best = Some((i, c.len())),
        }
    }
    best.map(|(i, _)| i)
}

/// Cell → render-instance map for one enemy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    size: usize,
    slots: Vec<u32>,
    live: usize,
}

impl OccupancyGrid {
    /// Creates an empty grid of edge `size`.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            slots: vec![EMPTY; size * size * size],
            live: 0,
        }
    }

    /// Edge length.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Total slot count (`size³`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the grid has zero slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Occupied slot count.
    #[must_use]
    pub const fn live(&self) -> usize {
        self.live
    }

    /// Instance stored at `index`, if occupied.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u32> {
        match self.slots.get(index) {
            Some(&slot) if slot != EMPTY => Some(slot),
            _ => None,
        }
    }

    /// True if `index` holds a voxel.
    #[inline]
    #[must_use]
    pub fn is_occupied(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Stores `instance` at `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, instance: u32) {
        if let Some(slot) = self.slots.get_mut(index) {
            if *slot == EMPTY {
                self.live += 1;
            }
            *slot = instance;
        }
    }

    /// Empties `index`, returning the instance that was there.
    pub fn clear(&mut self, index: usize) -> Option<u32> {
        let slot = self.slots.get_mut(index)?;
        if *slot == EMPTY {
            return None;
        }
        let instance = *slot;
        *slot = EMPTY;
        self.live -= 1;
        Some(instance)
    }

    /// Iterates `(cell index, instance)` over occupied slots in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, &s)| s != EMPTY)
            .map(|(i, &s)| (i, s))
    }

    /// Grid coordinates of `index`.
    #[must_use]
    pub fn coords(&self, index: usize) -> UVec3 {
        let (x, y, z) = unflatten(self.size, index);
        UVec3::new(x as u32, y as u32, z as u32)
    }

    /// 6-connected components of the occupied slots.
    #[must_use]
    pub fn components(&self) -> Vec<Vec<usize>> {
        connected_components(self.size, |i| self.is_occupied(i))
    }

    /// Inclusive min/max cell coordinates of the occupied slots.
    #[must_use]
    pub fn cell_bounds(&self) -> Option<(UVec3, UVec3)> {
        let mut bounds: Option<(UVec3, UVec3)> = None;
        for (i, _) in self.occupied() {
            let c = self.coords(i);
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(c), hi.max(c)),
                None => (c, c),
            });
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_index_roundtrip() {
        let size = 5;
        let i = flat_index(size, 1, 2, 3);
        assert_eq!(i, 1 + 2 * 5 + 3 * 25);
        assert_eq!(unflatten(size, i), (1, 2, 3));
    }

    #[test]
    fn test_corner_has_three_neighbours() {
        assert_eq!(neighbors6(4, 0).iter().count(), 3);
        assert_eq!(neighbors6(4, flat_index(4, 1, 1, 1)).iter().count(), 6);
    }

    #[test]
    fn test_set_clear_tracks_live() {
        let mut grid = OccupancyGrid::new(3);
        grid.set(4, 0);
        grid.set(5, 1);
        grid.set(5, 2);
        assert_eq!(grid.live(), 2);
        assert_eq!(grid.get(5), Some(2));
        assert_eq!(grid.clear(4), Some(0));
        assert_eq!(grid.clear(4), None);
        assert_eq!(grid.live(), 1);
        assert_eq!(grid.get(99), None);
    }

    #[test]
    fn test_components_split_by_gap() {
        let mut grid = OccupancyGrid::new(5);
        for (n, x) in [0usize, 1, 3, 4].into_iter().enumerate() {
            grid.set(flat_index(5, x, 0, 0), n as u32);
        }
        let comps = grid.components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].len(), 2);
        assert_eq!(comps[1].len(), 2);
        // Equal sizes: the first discovered wins.
        assert_eq!(largest_component(&comps), Some(0));
    }

    #[test]
    fn test_diagonal_cells_are_not_connected() {
        let mut grid = OccupancyGrid::new(3);
        grid.set(flat_index(3, 0, 0, 0), 0);
        grid.set(flat_index(3, 1, 1, 0), 1);
        assert_eq!(grid.components().len(), 2);
    }

    #[test]
    fn test_largest_component_prefers_bigger() {
        let comps = vec![vec![0], vec![1, 2, 3], vec![4, 5, 6]];
        assert_eq!(largest_component(&comps), Some(1));
        assert_eq!(largest_component(&[]), None);
    }

    #[test]
    fn test_cell_bounds() {
        let mut grid = OccupancyGrid::new(4);
        assert!(grid.cell_bounds().is_none());
        grid.set(flat_index(4, 1, 3, 0), 0);
        grid.set(flat_index(4, 2, 0, 2), 1);
        assert_eq!(
            grid.cell_bounds(),
            Some((UVec3::new(1, 0, 0), UVec3::new(2, 3, 2)))
        );
    }
}
