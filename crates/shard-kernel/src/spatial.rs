//! Uniform 3D spatial hash grid for neighbourhood queries.
//!
//! The grid is a per-frame index: callers `clear()` it and re-insert every
//! entity each tick. There is no removal API. A query returns every id stored
//! in the 3×3×3 block of cells around the query point's cell, so any entity
//! within one `cell_size` of the query point is guaranteed to be returned.
//!
//! # Example
//!
//! ```
//! use shard_kernel::spatial::SpatialHashGrid;
//!
//! let mut grid = SpatialHashGrid::new(1.0).expect("valid cell size");
//! grid.insert(7, 1.5, 0.0, 0.0);
//! assert_eq!(grid.get_nearby(0.0, 0.0, 0.0), vec![7]);
//! ```

use ahash::AHashMap;
use glam::IVec3;
use shard_common::{ShardError, ShardResult};

/// Uniform-cell spatial hash over `u32` entity indices.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    /// Edge length of a cell in world units.
    cell_size: f32,
    /// Cached reciprocal of `cell_size`.
    inv_cell_size: f32,
    /// Quantized cell key to the ids bucketed there.
    cells: AHashMap<IVec3, Vec<u32>>,
    /// Number of insertions since the last clear.
    len: usize,
}

impl SpatialHashGrid {
    /// Creates an empty grid with the given cell size.
    pub fn new(cell_size: f32) -> ShardResult<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(ShardError::invalid(
                "cell_size",
                format!("must be positive and finite, got {cell_size}"),
            ));
        }
        Ok(Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: AHashMap::new(),
            len: 0,
        })
    }

    /// Returns the cell edge length.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Quantizes a world position to its cell key.
    #[inline]
    #[must_use]
    pub fn cell_of(&self, x: f32, y: f32, z: f32) -> IVec3 {
        IVec3::new(
            (x * self.inv_cell_size).floor() as i32,
            (y * self.inv_cell_size).floor() as i32,
            (z * self.inv_cell_size).floor() as i32,
        )
    }

    /// Removes every entry.
    ///
    /// Buckets that were populated since the previous clear keep their
    /// allocation; buckets left empty for a whole frame are dropped so the map
    /// does not grow without bound as entities roam.
    pub fn clear(&mut self) {
        self.cells.retain(|_, bucket| {
            let keep = !bucket.is_empty();
            bucket.clear();
            keep
        });
        self.len = 0;
    }

    /// Buckets `id` into the cell containing `(x, y, z)`.
    ///
    /// Inserting the same id twice yields it twice from queries.
    pub fn insert(&mut self, id: u32, x: f32, y: f32, z: f32) {
        let key = self.cell_of(x, y, z);
        self.cells.entry(key).or_default().push(id);
        self.len += 1;
    }

    /// Returns every id in the 27 cells around the query point's cell.
    #[must_use]
    pub fn get_nearby(&self, x: f32, y: f32, z: f32) -> Vec<u32> {
        let mut out = Vec::new();
        self.get_nearby_into(x, y, z, &mut out);
        out
    }

    /// Allocation-free variant of [`get_nearby`](Self::get_nearby).
    ///
    /// `out` is cleared before results are written.
    pub fn get_nearby_into(&self, x: f32, y: f32, z: f32, out: &mut Vec<u32>) {
        out.clear();
        // Keep every neighbour key representable; far-off coordinates saturate.
        let center = self
            .cell_of(x, y, z)
            .clamp(IVec3::splat(i32::MIN + 1), IVec3::splat(i32::MAX - 1));
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if let Some(bucket) = self.cells.get(&(center + IVec3::new(dx, dy, dz))) {
                        out.extend_from_slice(bucket);
                    }
                }
            }
        }
    }

    /// Number of insertions since the last clear.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been inserted since the last clear.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of cells currently holding at least one id.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.values().filter(|b| !b.is_empty()).count()
    }
}
