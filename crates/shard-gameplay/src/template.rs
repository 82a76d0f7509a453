//! Procedural voxel templates.
//!
//! A template is a boolean occupancy cube, generated once per spawn and then
//! copied into an enemy's occupancy grid. Two procedural archetypes exist:
//! - **Blob**: a sphere whose radius is perturbed by 3D Perlin noise
//! - **Walker**: a humanoid silhouette built from box predicates (legs,
//!   torso, arms, head) with small random proportions
//!
//! Procedural templates are reduced to their largest 6-connected component so
//! every spawned enemy starts as one structural piece.

use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::occupancy::{connected_components, flat_index, largest_component, unflatten};

/// Default template edge length.
pub const DEFAULT_RESOLUTION: usize = 12;

/// Blob radius as a fraction of the edge length.
const BLOB_RADIUS: f32 = 0.42;
/// Noise amplitude relative to the blob radius.
const BLOB_ROUGHNESS: f32 = 0.3;
/// Noise frequency across the blob.
const BLOB_FREQUENCY: f64 = 1.7;

/// Enemy body plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// Noisy sphere.
    Blob,
    /// Humanoid silhouette.
    Walker,
}

impl Archetype {
    /// Picks an archetype; `blob_weight` is the probability of [`Archetype::Blob`].
    pub fn choose(blob_weight: f32, rng: &mut fastrand::Rng) -> Self {
        if rng.f32() < blob_weight {
            Self::Blob
        } else {
            Self::Walker
        }
    }
}

/// Boolean occupancy cube, flattened x-fastest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelTemplate {
    size: usize,
    cells: Vec<bool>,
}

impl VoxelTemplate {
    /// Builds a template by evaluating `f(x, y, z)` for every cell.
    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize, usize) -> bool) -> Self {
        let mut cells = vec![false; size * size * size];
        for (i, cell) in cells.iter_mut().enumerate() {
            let (x, y, z) = unflatten(size, i);
            *cell = f(x, y, z);
        }
        Self { size, cells }
    }

    /// A completely filled cube.
    #[must_use]
    pub fn solid(size: usize) -> Self {
        Self::from_fn(size, |_, _, _| true)
    }

    /// A straight run of `length` voxels along x through the middle of the cube.
    #[must_use]
    pub fn beam(length: usize) -> Self {
        let mid = length / 2;
        Self::from_fn(length, |_, y, z| y == mid && z == mid)
    }

    /// Perlin-perturbed sphere.
    #[must_use]
    pub fn blob(size: usize, seed: u32) -> Self {
        let perlin = Perlin::new(seed);
        let center = (size as f32 - 1.0) * 0.5;
        let radius = size as f32 * BLOB_RADIUS;
        let mut template = Self::from_fn(size, |x, y, z| {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let dz = z as f32 - center;
            let dist = (dx * dx + dy * dy + dz * dz).sqrt();
            let inv = if dist > 0.0 { 1.0 / dist } else { 0.0 };
            let sample = perlin.get([
                f64::from(dx * inv) * BLOB_FREQUENCY + 0.31,
                f64::from(dy * inv) * BLOB_FREQUENCY + 0.57,
                f64::from(dz * inv) * BLOB_FREQUENCY + 0.13,
            ]) as f32;
            dist <= radius * (1.0 + BLOB_ROUGHNESS * sample)
        });
        template.retain_largest_component();
        template
    }

    /// Humanoid silhouette with slightly randomized proportions.
    #[must_use]
    pub fn walker(size: usize, rng: &mut fastrand::Rng) -> Self {
        let span = (size.max(2) - 1) as f32;
        let leg_gap = 0.13 + rng.f32() * 0.05;
        let leg_height = 0.36 + rng.f32() * 0.08;
        let torso_half = 0.22 + rng.f32() * 0.06;
        let arm_low = 0.45 + rng.f32() * 0.08;

        let mut template = Self::from_fn(size, |x, y, z| {
            let u = x as f32 / span;
            let v = y as f32 / span;
            let w = z as f32 / span;
            let dx = (u - 0.5).abs();
            let dz = (w - 0.5).abs();

            let legs = v < leg_height && (dx - leg_gap).abs() < 0.09 && dz < 0.1;
            let torso = (0.35..=0.75).contains(&v) && dx <= torso_half && dz <= 0.18;
            let arms = (arm_low..=0.7).contains(&v)
                && dx > torso_half
                && dx <= torso_half + 0.16
                && dz <= 0.1;
            let head = v > 0.75 && v <= 0.95 && dx <= 0.13 && dz <= 0.13;
            legs || torso || arms || head
        });
        template.retain_largest_component();
        template
    }

    /// Generates a procedural template of the given archetype.
    #[must_use]
    pub fn generate(archetype: Archetype, size: usize, rng: &mut fastrand::Rng) -> Self {
        match archetype {
            Archetype::Blob => Self::blob(size, rng.u32(..)),
            Archetype::Walker => Self::walker(size, rng),
        }
    }

    /// Clears every cell outside the largest 6-connected component.
    pub fn retain_largest_component(&mut self) {
        let components = connected_components(self.size, |i| self.cells[i]);
        if components.len() <= 1 {
            return;
        }
        let Some(keep) = largest_component(&components) else {
            return;
        };
        for (n, component) in components.iter().enumerate() {
            if n != keep {
                for &i in component {
                    self.cells[i] = false;
                }
            }
        }
    }

    /// Edge length.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Whether `(x, y, z)` is filled. Out-of-range coordinates are empty.
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.size && y < self.size && z < self.size
            && self.cells[flat_index(self.size, x, y, z)]
    }

    /// Whether the cell at flat `index` is filled.
    #[must_use]
    pub fn is_set(&self, index: usize) -> bool {
        self.cells.get(index).copied().unwrap_or(false)
    }

    /// Number of filled cells.
    #[must_use]
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// True if no cell is filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }

    /// Flat indices of the filled cells in ascending order.
    pub fn filled(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(|(i, _)| i)
    }
}
