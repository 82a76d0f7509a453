//! Pooled spark and debris particles.
//!
//! The pool has a fixed total capacity split into two static sub-ranges:
//! - a small **spark** range for short-lived impact sparks
//! - a much larger **debris** range for voxel chunks that fall, bounce and
//!   settle into piles on a shared quantized height map
//!
//! All storage is allocated up front. Spawn requests that exceed the free
//! capacity of a sub-range are silently truncated. Debris slots are handed
//! out monotonically and never reused until [`ParticlePool::reset`]; expired
//! debris is parked far off-scene with zero scale instead of being compacted.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use shard_common::ColorTag;
//! use shard_kernel::pool::{ParticlePool, PoolConfig};
//!
//! let mut pool = ParticlePool::new(PoolConfig::default());
//! pool.spawn_sparks(Vec3::new(0.0, 2.0, 0.0), Vec3::Y, 8);
//! pool.spawn_debris(&[Vec3::new(0.0, 3.0, 0.0)], Vec3::ZERO, ColorTag::Teal);
//! pool.update(1.0 / 60.0);
//! assert_eq!(pool.active_sparks(), 8);
//! ```

use ahash::AHashMap;
use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Vec3};
use serde::{Deserialize, Serialize};
use shard_common::ColorTag;
use tracing::{debug, trace};

/// Where expired debris is parked.
pub const OFFSCREEN: Vec3 = Vec3::new(0.0, -10_000.0, 0.0);

/// Spark colour (RGBA, alpha is scaled by remaining life).
pub const SPARK_COLOR: [f32; 4] = [1.0, 0.9, 0.5, 1.0];

/// Configuration for a [`ParticlePool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of spark slots.
    pub spark_capacity: usize,
    /// Number of debris slots.
    pub debris_capacity: usize,
    /// Edge length of a debris chunk; also the height-map cell size and stack step.
    pub voxel_pitch: f32,
    /// Downward acceleration applied to debris.
    pub gravity: f32,
    /// Downward acceleration applied to sparks.
    pub spark_gravity: f32,
    /// Spark speed range (min, max).
    pub spark_speed: (f32, f32),
    /// Spark lifetime range in seconds (min, max).
    pub spark_lifetime: (f32, f32),
    /// How far spark directions may stray from the impact normal.
    pub spark_spread: f32,
    /// Debris lifetime in seconds.
    pub debris_lifetime: f32,
    /// Magnitude of the random velocity added to each debris chunk.
    pub debris_scatter: f32,
    /// Vertical speed below which a landing chunk settles instead of bouncing.
    pub settle_speed: f32,
    /// Fraction of vertical speed kept on a bounce.
    pub restitution: f32,
    /// Fraction of planar speed kept on a bounce.
    pub friction: f32,
    /// Height of the ground plane.
    pub ground_height: f32,
    /// RNG seed.
    pub seed: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            spark_capacity: 256,
            debris_capacity: 4096,
            voxel_pitch: 0.5,
            gravity: 9.8,
            spark_gravity: 4.9,
            spark_speed: (4.0, 12.0),
            spark_lifetime: (0.2, 0.6),
            spark_spread: 0.8,
            debris_lifetime: 12.0,
            debris_scatter: 2.5,
            settle_speed: 1.5,
            restitution: 0.35,
            friction: 0.6,
            ground_height: 0.0,
            seed: 0x5EED_0001,
        }
    }
}

/// Lifecycle of one debris slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebrisState {
    /// Never handed out since the last reset.
    #[default]
    Unused,
    /// Falling or bouncing.
    Falling,
    /// Resting on the height map.
    Settled,
    /// Past its lifetime; parked off-scene.
    Expired,
}

/// GPU-friendly particle instance.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    /// World position.
    pub position: [f32; 3],
    /// Uniform scale (0 hides the instance).
    pub scale: f32,
    /// Colour with alpha.
    pub color: [f32; 4],
}

impl ParticleInstance {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Fixed-capacity spark + debris pool.
#[derive(Debug)]
pub struct ParticlePool {
    config: PoolConfig,
    /// Positions for sparks `[0, spark_capacity)` then debris.
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    ages: Vec<f32>,
    max_ages: Vec<f32>,
    /// Per-debris lifecycle, indexed from 0 within the debris range.
    debris_state: Vec<DebrisState>,
    debris_color: Vec<ColorTag>,
    /// Next debris slot to hand out.
    next_debris: usize,
    /// Rotating start point for the free-spark search.
    spark_cursor: usize,
    /// Planar cell to current top-of-stack height.
    height_map: AHashMap<IVec2, f32>,
    rng: fastrand::Rng,
}

impl ParticlePool {
    /// Creates a pool with all storage allocated.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let total = config.spark_capacity + config.debris_capacity;
        let mut pool = Self {
            positions: vec![OFFSCREEN; total],
            velocities: vec![Vec3::ZERO; total],
            ages: vec![0.0; total],
            max_ages: vec![0.0; total],
            debris_state: vec![DebrisState::Unused; config.debris_capacity],
            debris_color: vec![ColorTag::default(); config.debris_capacity],
            next_debris: 0,
            spark_cursor: 0,
            height_map: AHashMap::new(),
            rng: fastrand::Rng::with_seed(config.seed),
            config,
        };
        pool.expire_all_sparks();
        pool
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn expire_all_sparks(&mut self) {
        for i in 0..self.config.spark_capacity {
            self.ages[i] = 1.0;
            self.max_ages[i] = 0.0;
            self.positions[i] = OFFSCREEN;
        }
    }

    #[inline]
    fn spark_alive(&self, i: usize) -> bool {
        self.ages[i] <= self.max_ages[i]
    }

    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.rng.f32() * (hi - lo)
    }

    fn random_unit(&mut self) -> Vec3 {
        let z = self.range(-1.0, 1.0);
        let theta = self.range(0.0, std::f32::consts::TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * theta.cos(), r * theta.sin(), z)
    }

    /// Emits up to `count` sparks at `origin`, sprayed around `normal`.
    ///
    /// Returns the number actually emitted; requests beyond the free spark
    /// slots are dropped.
    pub fn spawn_sparks(&mut self, origin: Vec3, normal: Vec3, count: usize) -> usize {
        let cap = self.config.spark_capacity;
        let base = normal.normalize_or_zero();
        let mut emitted = 0;
        let mut scanned = 0;

        while emitted < count && scanned < cap {
            let slot = (self.spark_cursor + scanned) % cap;
            scanned += 1;
            if self.spark_alive(slot) {
                continue;
            }

            let jitter = self.random_unit();
            let spread = self.config.spark_spread;
            let dir = (base + jitter * spread).try_normalize().unwrap_or(jitter);
            let (smin, smax) = self.config.spark_speed;
            let speed = self.range(smin, smax);
            let (lmin, lmax) = self.config.spark_lifetime;
            let life = self.range(lmin, lmax);

            self.positions[slot] = origin;
            self.velocities[slot] = dir * speed;
            self.ages[slot] = 0.0;
            self.max_ages[slot] = life;
            emitted += 1;
        }

        if cap > 0 {
            self.spark_cursor = (self.spark_cursor + scanned) % cap;
        }
        if emitted < count {
            debug!("Spark pool saturated: emitted {emitted} of {count}");
        }
        emitted
    }

    /// Emits one debris chunk per position, inheriting `source_velocity`.
    ///
    /// Returns the number actually emitted; positions beyond the remaining
    /// debris capacity are dropped.
    pub fn spawn_debris(
        &mut self,
        positions: &[Vec3],
        source_velocity: Vec3,
        color: ColorTag,
    ) -> usize {
        let remaining = self.debris_remaining();
        let take = positions.len().min(remaining);
        let scatter = self.config.debris_scatter;

        for &p in &positions[..take] {
            let local = self.next_debris;
            let slot = self.config.spark_capacity + local;
            self.next_debris += 1;

            let kick = Vec3::new(
                self.range(-1.0, 1.0),
                self.range(0.0, 1.0),
                self.range(-1.0, 1.0),
            ) * scatter;

            self.positions[slot] = p;
            self.velocities[slot] = source_velocity + kick;
            self.ages[slot] = 0.0;
            self.max_ages[slot] = self.config.debris_lifetime;
            self.debris_state[local] = DebrisState::Falling;
            self.debris_color[local] = color;
        }

        if take < positions.len() {
            debug!(
                "Debris pool exhausted: dropped {} of {} chunks",
                positions.len() - take,
                positions.len()
            );
        }
        take
    }

    /// Height-map cell for a planar position.
    #[inline]
    fn column_of(&self, x: f32, z: f32) -> IVec2 {
        let inv = 1.0 / self.config.voxel_pitch;
        IVec2::new((x * inv).floor() as i32, (z * inv).floor() as i32)
    }

    /// Current top-of-stack height at a planar position.
    #[must_use]
    pub fn stack_height(&self, x: f32, z: f32) -> f32 {
        self.height_map
            .get(&self.column_of(x, z))
            .copied()
            .unwrap_or(self.config.ground_height)
    }

    /// Advances every spark and debris chunk by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let sparks = self.config.spark_capacity;
        let spark_gravity = Vec3::new(0.0, -self.config.spark_gravity, 0.0);
        for i in 0..sparks {
            if !self.spark_alive(i) {
                continue;
            }
            self.velocities[i] += spark_gravity * dt;
            self.positions[i] += self.velocities[i] * dt;
            self.ages[i] += dt;
        }

        let gravity = Vec3::new(0.0, -self.config.gravity, 0.0);
        let half = self.config.voxel_pitch * 0.5;
        for local in 0..self.next_debris {
            let slot = sparks + local;
            match self.debris_state[local] {
                DebrisState::Unused | DebrisState::Expired => continue,
                DebrisState::Settled | DebrisState::Falling => {},
            }

            self.ages[slot] += dt;
            if self.ages[slot] > self.max_ages[slot] {
                self.positions[slot] = OFFSCREEN;
                self.velocities[slot] = Vec3::ZERO;
                self.debris_state[local] = DebrisState::Expired;
                continue;
            }
            if self.debris_state[local] == DebrisState::Settled {
                continue;
            }

            self.velocities[slot] += gravity * dt;
            self.positions[slot] += self.velocities[slot] * dt;

            let p = self.positions[slot];
            let column = self.column_of(p.x, p.z);
            let floor = self
                .height_map
                .get(&column)
                .copied()
                .unwrap_or(self.config.ground_height);
            let rest = floor + half;
            if p.y > rest {
                continue;
            }

            let v = self.velocities[slot];
            if v.y <= 0.0 && -v.y < self.config.settle_speed {
                self.positions[slot].y = rest;
                self.velocities[slot] = Vec3::ZERO;
                self.debris_state[local] = DebrisState::Settled;
                self.height_map.insert(column, floor + self.config.voxel_pitch);
                trace!("Debris {local} settled at {rest:.3} in column {column}");
            } else {
                self.positions[slot].y = rest;
                self.velocities[slot] = Vec3::new(
                    v.x * self.config.friction,
                    v.y.abs() * self.config.restitution,
                    v.z * self.config.friction,
                );
            }
        }
    }

    /// Returns every slot to its initial state and flattens the height map.
    pub fn reset(&mut self) {
        self.expire_all_sparks();
        let sparks = self.config.spark_capacity;
        for local in 0..self.config.debris_capacity {
            let slot = sparks + local;
            self.positions[slot] = OFFSCREEN;
            self.velocities[slot] = Vec3::ZERO;
            self.ages[slot] = 0.0;
            self.max_ages[slot] = 0.0;
            self.debris_state[local] = DebrisState::Unused;
        }
        self.next_debris = 0;
        self.spark_cursor = 0;
        self.height_map.clear();
        debug!("Particle pool reset");
    }

    /// Number of sparks still alive.
    #[must_use]
    pub fn active_sparks(&self) -> usize {
        (0..self.config.spark_capacity)
            .filter(|&i| self.spark_alive(i))
            .count()
    }

    /// Number of debris chunks that are falling or settled.
    #[must_use]
    pub fn live_debris(&self) -> usize {
        self.debris_state[..self.next_debris]
            .iter()
            .filter(|s| matches!(s, DebrisState::Falling | DebrisState::Settled))
            .count()
    }

    /// Number of debris chunks resting on the height map.
    #[must_use]
    pub fn settled_debris(&self) -> usize {
        self.debris_state[..self.next_debris]
            .iter()
            .filter(|s| **s == DebrisState::Settled)
            .count()
    }

    /// Debris slots not yet handed out.
    #[must_use]
    pub fn debris_remaining(&self) -> usize {
        self.config.debris_capacity - self.next_debris
    }

    /// Lifecycle state of debris slot `index` (0-based within the debris range).
    #[must_use]
    pub fn debris_state(&self, index: usize) -> Option<DebrisState> {
        self.debris_state.get(index).copied()
    }

    /// Position of debris slot `index` (0-based within the debris range).
    #[must_use]
    pub fn debris_position(&self, index: usize) -> Option<Vec3> {
        if index < self.config.debris_capacity {
            Some(self.positions[self.config.spark_capacity + index])
        } else {
            None
        }
    }

    /// Appends one instance per live spark to `out`.
    pub fn write_spark_instances(&self, out: &mut Vec<ParticleInstance>) {
        for i in 0..self.config.spark_capacity {
            if !self.spark_alive(i) {
                continue;
            }
            let life = (1.0 - self.ages[i] / self.max_ages[i].max(f32::EPSILON)).clamp(0.0, 1.0);
            let mut color = SPARK_COLOR;
            color[3] *= life;
            out.push(ParticleInstance {
                position: self.positions[i].to_array(),
                scale: 1.0,
                color,
            });
        }
    }

    /// Appends one instance per handed-out debris slot to `out`.
    ///
    /// Expired chunks are included with zero scale so instance indices stay
    /// stable across frames.
    pub fn write_debris_instances(&self, out: &mut Vec<ParticleInstance>) {
        let sparks = self.config.spark_capacity;
        for local in 0..self.next_debris {
            let slot = sparks + local;
            let [r, g, b] = self.debris_color[local].rgb();
            let scale = match self.debris_state[local] {
                DebrisState::Falling | DebrisState::Settled => self.config.voxel_pitch,
                DebrisState::Unused | DebrisState::Expired => 0.0,
            };
            out.push(ParticleInstance {
                position: self.positions[slot].to_array(),
                scale,
                color: [r, g, b, 1.0],
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 120.0;

    fn still_pool() -> ParticlePool {
        ParticlePool::new(PoolConfig {
            spark_capacity: 8,
            debris_capacity: 16,
            debris_scatter: 0.0,
            ..Default::default()
        })
    }

    fn run_until_settled(pool: &mut ParticlePool, index: usize) {
        for _ in 0..2_000 {
            pool.update(DT);
            if pool.debris_state(index) == Some(DebrisState::Settled) {
                return;
            }
        }
        panic!("debris {index} never settled");
    }

    #[test]
    fn test_spark_count_capped_at_capacity() {
        let mut pool = still_pool();
        assert_eq!(pool.spawn_sparks(Vec3::ZERO, Vec3::Y, 20), 8);
        assert_eq!(pool.active_sparks(), 8);
        assert_eq!(pool.spawn_sparks(Vec3::ZERO, Vec3::Y, 4), 0);
    }

    #[test]
    fn test_sparks_expire_and_free_slots() {
        let mut pool = still_pool();
        pool.spawn_sparks(Vec3::ZERO, Vec3::Y, 8);
        let max_life = pool.config().spark_lifetime.1;
        let steps = (max_life / DT) as usize + 2;
        for _ in 0..steps {
            pool.update(DT);
        }
        assert_eq!(pool.active_sparks(), 0);
        assert_eq!(pool.spawn_sparks(Vec3::ZERO, Vec3::Y, 3), 3);
    }

    #[test]
    fn test_sparks_lean_toward_normal() {
        let mut pool = ParticlePool::new(PoolConfig {
            spark_spread: 0.3,
            ..Default::default()
        });
        pool.spawn_sparks(Vec3::ZERO, Vec3::Y, 64);
        pool.update(0.01);
        let mut out = Vec::new();
        pool.write_spark_instances(&mut out);
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|p| p.position[1] > 0.0));
    }

    #[test]
    fn test_debris_capped_at_capacity() {
        let mut pool = still_pool();
        let positions = vec![Vec3::new(0.0, 1.0, 0.0); 20];
        assert_eq!(pool.spawn_debris(&positions, Vec3::ZERO, ColorTag::Amber), 16);
        assert_eq!(pool.debris_remaining(), 0);
        assert_eq!(pool.spawn_debris(&positions, Vec3::ZERO, ColorTag::Amber), 0);
    }

    #[test]
    fn test_debris_settles_on_ground() {
        let mut pool = still_pool();
        pool.spawn_debris(&[Vec3::new(0.25, 3.0, 0.25)], Vec3::ZERO, ColorTag::Teal);
        run_until_settled(&mut pool, 0);

        let p = pool.debris_position(0).expect("slot");
        assert!((p.y - 0.25).abs() < 1e-6);
        assert!((pool.stack_height(0.25, 0.25) - 0.5).abs() < 1e-6);
        assert_eq!(pool.settled_debris(), 1);
    }

    #[test]
    fn test_second_chunk_stacks_one_pitch_higher() {
        let mut pool = still_pool();
        pool.spawn_debris(&[Vec3::new(0.25, 3.0, 0.25)], Vec3::ZERO, ColorTag::Teal);
        run_until_settled(&mut pool, 0);

        pool.spawn_debris(&[Vec3::new(0.25, 3.0, 0.25)], Vec3::ZERO, ColorTag::Teal);
        run_until_settled(&mut pool, 1);

        let first = pool.debris_position(0).expect("slot").y;
        let second = pool.debris_position(1).expect("slot").y;
        assert!((second - first - pool.config().voxel_pitch).abs() < 1e-6);
    }

    #[test]
    fn test_fast_debris_bounces_before_settling() {
        let mut pool = still_pool();
        pool.spawn_debris(&[Vec3::new(0.25, 0.3, 0.25)], Vec3::new(0.0, -8.0, 0.0), ColorTag::Lime);
        pool.update(DT);
        pool.update(DT);
        assert_eq!(pool.debris_state(0), Some(DebrisState::Falling));
    }

    #[test]
    fn test_expired_debris_parked_offscreen() {
        let mut pool = ParticlePool::new(PoolConfig {
            debris_capacity: 4,
            debris_lifetime: 0.05,
            debris_scatter: 0.0,
            ..Default::default()
        });
        pool.spawn_debris(&[Vec3::new(0.0, 5.0, 0.0)], Vec3::ZERO, ColorTag::Violet);
        for _ in 0..10 {
            pool.update(DT);
        }
        assert_eq!(pool.debris_state(0), Some(DebrisState::Expired));
        assert_eq!(pool.debris_position(0), Some(OFFSCREEN));

        let mut out = Vec::new();
        pool.write_debris_instances(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].scale, 0.0);

        // Expired slots are not handed out again before a reset.
        assert_eq!(pool.debris_remaining(), 3);
    }

    #[test]
    fn test_reset_reclaims_everything() {
        let mut pool = still_pool();
        pool.spawn_sparks(Vec3::ZERO, Vec3::Y, 4);
        pool.spawn_debris(&[Vec3::new(0.25, 0.5, 0.25); 3], Vec3::ZERO, ColorTag::Crimson);
        run_until_settled(&mut pool, 0);

        pool.reset();
        assert_eq!(pool.active_sparks(), 0);
        assert_eq!(pool.live_debris(), 0);
        assert_eq!(pool.debris_remaining(), 16);
        assert_eq!(pool.stack_height(0.25, 0.25), 0.0);
    }

    #[test]
    fn test_particle_instance_size() {
        assert_eq!(ParticleInstance::SIZE, 32);
    }
}
