//! Destructible voxel enemies.
//!
//! Each enemy is a cubic occupancy grid of voxels rendered as one instanced
//! batch and simulated as one rotation-locked rigid body with a coarse box
//! collider. Enemies walk toward the world origin; projectiles knock voxels
//! off them with [`EnemyShapes::apply_damage`], and any piece that loses its
//! connection to the main body is discarded with the hit.
//!
//! ## Frames
//!
//! Voxel `(x, y, z)` of a grid of edge `g` sits at local position
//! `((x, y, z) - (g - 1) / 2) * pitch`, i.e. the grid is centred on the body
//! translation. Rotations are locked, so world = translation + local.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use shard_common::{
    planar_distance, segment_aabb_enter_t, Aabb, BodyHandle, ColorTag, EnemyId, RenderHandle,
    ShardError, ShardResult,
};
use tracing::{debug, info, trace};

use crate::backend::{PhysicsWorld, SceneBackend};
use crate::events::{EventBus, GameEvent};
use crate::occupancy::{largest_component, unflatten, OccupancyGrid};
use crate::template::{Archetype, VoxelTemplate, DEFAULT_RESOLUTION};

/// Enemy spawning and behaviour configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    /// Template edge length for procedural spawns.
    pub resolution: usize,
    /// Voxel edge length in world units.
    pub voxel_pitch: f32,
    /// Distance from the origin at which enemies spawn.
    pub spawn_radius: f32,
    /// Spawn height of the body translation.
    pub spawn_height: f32,
    /// Planar distance from the origin at which an enemy is removed.
    pub despawn_distance: f32,
    /// Voxels with `d² <= r² * scorch_multiplier` survive a hit but are darkened.
    pub scorch_multiplier: f32,
    /// Planar walking speed.
    pub speed: f32,
    /// Probability a procedural spawn is a blob.
    pub blob_weight: f32,
    /// Maximum simultaneous enemies; further spawns are skipped.
    pub max_enemies: usize,
    /// Seed for archetype, colour and placement choices.
    pub seed: u64,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            voxel_pitch: 0.5,
            spawn_radius: 60.0,
            spawn_height: 8.0,
            despawn_distance: 2.0,
            scorch_multiplier: 2.25,
            speed: 3.0,
            blob_weight: 0.5,
            max_enemies: 24,
            seed: 0x5eed,
        }
    }
}

impl EnemyConfig {
    /// Checks construction-time invariants.
    pub fn validate(&self) -> ShardResult<()> {
        if self.resolution == 0 {
            return Err(ShardError::invalid("resolution", "must be greater than zero"));
        }
        if !self.voxel_pitch.is_finite() || self.voxel_pitch <= 0.0 {
            return Err(ShardError::invalid(
                "voxel_pitch",
                format!("must be positive, got {}", self.voxel_pitch),
            ));
        }
        if self.scorch_multiplier < 1.0 {
            return Err(ShardError::invalid(
                "scorch_multiplier",
                format!("must be at least 1, got {}", self.scorch_multiplier),
            ));
        }
        Ok(())
    }
}

/// Local-space centre of the voxel at flat `cell` in a grid of edge `size`.
#[inline]
#[must_use]
pub fn local_center(size: usize, pitch: f32, cell: usize) -> Vec3 {
    let (x, y, z) = unflatten(size, cell);
    let half = (size as f32 - 1.0) * 0.5;
    (Vec3::new(x as f32, y as f32, z as f32) - Vec3::splat(half)) * pitch
}

/// One live enemy.
#[derive(Debug, Clone)]
pub struct EnemyObject {
    id: EnemyId,
    render: RenderHandle,
    body: BodyHandle,
    archetype: Archetype,
    health: i32,
    max_health: i32,
    color: ColorTag,
    grid: OccupancyGrid,
    /// Grid cell of render instance `i`.
    instance_cells: Vec<usize>,
    /// Local centre of render instance `i`.
    instance_local: Vec<Vec3>,
    /// Local bounds of the live voxels, padded to voxel faces.
    local_bounds: Aabb,
}

impl EnemyObject {
    /// Enemy ID.
    #[must_use]
    pub const fn id(&self) -> EnemyId {
        self.id
    }

    /// Render batch.
    #[must_use]
    pub const fn render(&self) -> RenderHandle {
        self.render
    }

    /// Rigid body.
    #[must_use]
    pub const fn body(&self) -> BodyHandle {
        self.body
    }

    /// Body plan.
    #[must_use]
    pub const fn archetype(&self) -> Archetype {
        self.archetype
    }

    /// Live voxel count.
    #[must_use]
    pub const fn health(&self) -> i32 {
        self.health
    }

    /// Voxel count at spawn.
    #[must_use]
    pub const fn max_health(&self) -> i32 {
        self.max_health
    }

    /// Palette entry.
    #[must_use]
    pub const fn color(&self) -> ColorTag {
        self.color
    }

    /// Occupancy grid.
    #[must_use]
    pub const fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Local bounds of the live voxels.
    #[must_use]
    pub const fn local_bounds(&self) -> Aabb {
        self.local_bounds
    }

    /// Local centres of the live voxels, in instance order.
    pub fn live_local_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.live_instances().map(|i| self.instance_local[i as usize])
    }

    /// Render-instance indices of the live voxels, in instance order.
    fn live_instances(&self) -> impl Iterator<Item = u32> + '_ {
        self.instance_cells
            .iter()
            .enumerate()
            .filter(|&(i, &cell)| self.grid.get(cell) == Some(i as u32))
            .map(|(i, _)| i as u32)
    }
}

/// Nearest voxel crossed by a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Position of the enemy in the manager.
    pub enemy_index: usize,
    /// Enemy ID.
    pub enemy: EnemyId,
    /// Render instance of the voxel hit.
    pub instance: u32,
    /// Segment parameter in `[0, 1]`.
    pub t: f32,
    /// World-space entry point.
    pub point: Vec3,
}

/// Owns every live enemy and the collaborators they are rendered and
/// simulated through.
pub struct EnemyShapes<S: SceneBackend, P: PhysicsWorld> {
    config: EnemyConfig,
    enemies: Vec<EnemyObject>,
    scene: S,
    physics: P,
    rng: fastrand::Rng,
    events: EventBus,
}

impl<S: SceneBackend, P: PhysicsWorld> EnemyShapes<S, P> {
    /// Creates an empty manager.
    pub fn new(config: EnemyConfig, scene: S, physics: P) -> ShardResult<Self> {
        config.validate()?;
        let rng = fastrand::Rng::with_seed(config.seed);
        Ok(Self {
            config,
            enemies: Vec::new(),
            scene,
            physics,
            rng,
            events: EventBus::default(),
        })
    }

    /// Routes events to `bus` instead of the private default bus.
    pub fn attach_events(&mut self, bus: EventBus) {
        self.events = bus;
    }

    /// Event bus events are published on.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &EnemyConfig {
        &self.config
    }

    /// Current walking speed.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.config.speed
    }

    /// Sets the walking speed for every enemy from the next update on.
    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = speed.max(0.0);
    }

    /// Current blob probability.
    #[must_use]
    pub const fn blob_weight(&self) -> f32 {
        self.config.blob_weight
    }

    /// Sets the blob probability for future spawns.
    pub fn set_blob_weight(&mut self, weight: f32) {
        self.config.blob_weight = weight.clamp(0.0, 1.0);
    }

    /// Number of live enemies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    /// True if no enemy is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }

    /// Enemy at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&EnemyObject> {
        self.enemies.get(index)
    }

    /// Position of the enemy with `id`. [`EnemyId::NULL`] never matches.
    #[must_use]
    pub fn index_of(&self, id: EnemyId) -> Option<usize> {
        if !id.is_valid() {
            return None;
        }
        self.enemies.iter().position(|e| e.id == id)
    }

    /// Iterates live enemies.
    pub fn iter(&self) -> impl Iterator<Item = &EnemyObject> {
        self.enemies.iter()
    }

    /// Scene backend.
    #[must_use]
    pub const fn scene(&self) -> &S {
        &self.scene
    }

    /// Physics world.
    #[must_use]
    pub const fn physics(&self) -> &P {
        &self.physics
    }

    /// Mutable physics world, for stepping.
    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    /// World translation of an enemy's body.
    #[must_use]
    pub fn translation(&self, index: usize) -> Option<Vec3> {
        self.enemies
            .get(index)
            .map(|e| self.physics.translation(e.body))
    }

    /// World positions of an enemy's live voxels.
    #[must_use]
    pub fn world_voxels(&self, index: usize) -> Vec<Vec3> {
        let Some(enemy) = self.enemies.get(index) else {
            return Vec::new();
        };
        let origin = self.physics.translation(enemy.body);
        enemy.live_local_positions().map(|p| origin + p).collect()
    }

    /// Spawns a procedural enemy on the spawn circle.
    pub fn spawn_tick(&mut self) -> Option<EnemyId> {
        if self.enemies.len() >= self.config.max_enemies {
            debug!("Spawn skipped: {} enemies alive", self.enemies.len());
            return None;
        }
        let archetype = Archetype::choose(self.config.blob_weight, &mut self.rng);
        let template = VoxelTemplate::generate(archetype, self.config.resolution, &mut self.rng);
        let angle = self.rng.f32() * std::f32::consts::TAU;
        let position = Vec3::new(
            angle.cos() * self.config.spawn_radius,
            self.config.spawn_height,
            angle.sin() * self.config.spawn_radius,
        );
        self.spawn_template(&template, archetype, position)
    }

    /// Instantiates `template` with its grid centred at `position`.
    ///
    /// Returns `None` for an empty template.
    pub fn spawn_template(
        &mut self,
        template: &VoxelTemplate,
        archetype: Archetype,
        position: Vec3,
    ) -> Option<EnemyId> {
        if template.is_empty() {
            debug!("Spawn skipped: empty {archetype:?} template");
            return None;
        }
        let size = template.size();
        let pitch = self.config.voxel_pitch;
        let color = ColorTag::ALL[self.rng.usize(..ColorTag::ALL.len())];
        let count = template.count();

        let render = self.scene.create_batch(count);
        let mut grid = OccupancyGrid::new(size);
        let mut instance_cells = Vec::with_capacity(count);
        let mut instance_local = Vec::with_capacity(count);
        for (instance, cell) in template.filled().enumerate() {
            let local = local_center(size, pitch, cell);
            grid.set(cell, instance as u32);
            instance_cells.push(cell);
            instance_local.push(local);
            self.scene.set_instance(render, instance as u32, local, 1.0);
            self.scene.set_instance_color(render, instance as u32, color.rgb());
        }
        self.scene.set_batch_translation(render, position);

        let local_bounds = bounds_of(&grid, pitch);
        let body = self.physics.create_body(position);
        self.physics
            .set_box_collider(body, local_bounds.half_extents(), local_bounds.center());
        self.physics.lock_rotations(body);

        let id = EnemyId::allocate();
        let health = count as i32;
        self.enemies.push(EnemyObject {
            id,
            render,
            body,
            archetype,
            health,
            max_health: health,
            color,
            grid,
            instance_cells,
            instance_local,
            local_bounds,
        });
        self.events.publish(GameEvent::EnemySpawned {
            enemy: id,
            archetype,
            voxels: count as u32,
        });
        debug!("Spawned {archetype:?} enemy {} with {count} voxels at {position}", id.raw());
        Some(id)
    }

    /// Steers every enemy toward the origin and removes those that arrived.
    ///
    /// Returns the IDs of the removed enemies.
    pub fn update(&mut self) -> Vec<EnemyId> {
        let speed = self.config.speed;
        let mut arrived = Vec::new();

        for (index, enemy) in self.enemies.iter().enumerate() {
            let t = self.physics.translation(enemy.body);
            if planar_distance(t) < self.config.despawn_distance {
                arrived.push(index);
                continue;
            }
            let heading = Vec3::new(-t.x, 0.0, -t.z).normalize_or_zero();
            let vy = self.physics.linear_velocity(enemy.body).y;
            self.physics
                .set_linear_velocity(enemy.body, heading * speed + Vec3::new(0.0, vy, 0.0));
            self.physics.set_angular_velocity(enemy.body, Vec3::ZERO);
            self.scene.set_batch_translation(enemy.render, t);
        }

        let mut removed = Vec::with_capacity(arrived.len());
        for &index in arrived.iter().rev() {
            let enemy = self.remove(index);
            self.events
                .publish(GameEvent::EnemyReachedOrigin { enemy: enemy.id });
            info!("Enemy {} reached the origin", enemy.id.raw());
            removed.push(enemy.id);
        }
        removed.reverse();
        removed
    }

    /// Destroys voxels within `radius` of `world_point` on enemy `index`.
    ///
    /// Surviving voxels within the scorch range are darkened. Pieces cut off
    /// from the largest remaining component are destroyed too. Returns the
    /// world positions of every destroyed voxel; when the enemy's health
    /// reaches zero it is removed and every voxel it still had is included.
    pub fn apply_damage(&mut self, index: usize, world_point: Vec3, radius: f32) -> Vec<Vec3> {
        let scorch_multiplier = self.config.scorch_multiplier;
        let Some(enemy) = self.enemies.get_mut(index) else {
            trace!("Damage ignored: no enemy at index {index}");
            return Vec::new();
        };
        if enemy.health <= 0 || enemy.grid.live() == 0 {
            return Vec::new();
        }

        let origin = self.physics.translation(enemy.body);
        let local_point = world_point - origin;
        let r2 = radius * radius;
        let scorch2 = r2 * scorch_multiplier;
        let scorched = enemy.color.scorched();

        let mut destroyed = Vec::new();
        for instance in 0..enemy.instance_cells.len() {
            let cell = enemy.instance_cells[instance];
            if enemy.grid.get(cell) != Some(instance as u32) {
                continue;
            }
            let local = enemy.instance_local[instance];
            let d2 = local.distance_squared(local_point);
            if d2 <= r2 {
                enemy.grid.clear(cell);
                self.scene.set_instance(enemy.render, instance as u32, local, 0.0);
                destroyed.push(origin + local);
            } else if d2 <= scorch2 {
                self.scene
                    .set_instance_color(enemy.render, instance as u32, scorched);
            }
        }
        enemy.health -= destroyed.len() as i32;
        let id = enemy.id;

        if enemy.health <= 0 {
            let remaining: Vec<u32> = enemy.live_instances().collect();
            for instance in remaining {
                destroyed.push(origin + enemy.instance_local[instance as usize]);
            }
            self.remove(index);
            self.events.publish(GameEvent::EnemyDestroyed {
                enemy: id,
                count: destroyed.len() as u32,
            });
            info!("Enemy {} destroyed", id.raw());
            return destroyed;
        }

        let direct = destroyed.len();
        let components = enemy.grid.components();
        if components.len() > 1 {
            let keep = largest_component(&components).unwrap_or(0);
            for (n, component) in components.iter().enumerate() {
                if n == keep {
                    continue;
                }
                for &cell in component {
                    if let Some(instance) = enemy.grid.clear(cell) {
                        let local = enemy.instance_local[instance as usize];
                        self.scene.set_instance(enemy.render, instance, local, 0.0);
                        destroyed.push(origin + local);
                    }
                }
            }
            enemy.health -= (destroyed.len() - direct) as i32;
            debug!(
                "Enemy {}: {} voxels hit, {} detached",
                id.raw(),
                direct,
                destroyed.len() - direct
            );
        }

        if !destroyed.is_empty() {
            self.recompute_bounds(index);
            self.events.publish(GameEvent::VoxelsDestroyed {
                enemy: id,
                count: destroyed.len() as u32,
            });
        }
        destroyed
    }

    /// Rebuilds an enemy's bounds and collider from its live voxels.
    ///
    /// If the lowest voxel rose, the body is lifted by the same amount.
    pub fn recompute_bounds(&mut self, index: usize) {
        let pitch = self.config.voxel_pitch;
        let Some(enemy) = self.enemies.get_mut(index) else {
            return;
        };
        if enemy.grid.live() == 0 {
            return;
        }
        let previous = enemy.local_bounds;
        let bounds = bounds_of(&enemy.grid, pitch);
        enemy.local_bounds = bounds;

        self.physics
            .set_box_collider(enemy.body, bounds.half_extents(), bounds.center());
        let rise = bounds.min.y - previous.min.y;
        if rise > 0.0 {
            let t = self.physics.translation(enemy.body);
            self.physics
                .set_translation(enemy.body, t + Vec3::new(0.0, rise, 0.0));
        }
        self.physics.wake(enemy.body);
    }

    /// Nearest voxel crossed by the segment `start → end`, over all enemies.
    #[must_use]
    pub fn raycast_segment(&self, start: Vec3, end: Vec3) -> Option<SegmentHit> {
        let half = self.config.voxel_pitch * 0.5;
        let mut best: Option<SegmentHit> = None;

        for (enemy_index, enemy) in self.enemies.iter().enumerate() {
            let origin = self.physics.translation(enemy.body);
            let Some(t_enter) =
                segment_aabb_enter_t(start, end, &enemy.local_bounds.translated(origin))
            else {
                continue;
            };
            if best.is_some_and(|b| b.t < t_enter) {
                continue;
            }
            for instance in enemy.live_instances() {
                let center = origin + enemy.instance_local[instance as usize];
                let Some(t) = segment_aabb_enter_t(start, end, &Aabb::cube(center, half)) else {
                    continue;
                };
                if best.map_or(true, |b| t < b.t) {
                    best = Some(SegmentHit {
                        enemy_index,
                        enemy: enemy.id,
                        instance,
                        t,
                        point: start + (end - start) * t,
                    });
                }
            }
        }
        best
    }

    /// Removes every enemy.
    pub fn clear(&mut self) {
        while !self.enemies.is_empty() {
            self.remove(self.enemies.len() - 1);
        }
    }

    fn remove(&mut self, index: usize) -> EnemyObject {
        let enemy = self.enemies.remove(index);
        self.scene.remove_batch(enemy.render);
        self.physics.remove_body(enemy.body);
        enemy
    }
}

impl<S: SceneBackend, P: PhysicsWorld> std::fmt::Debug for EnemyShapes<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnemyShapes")
            .field("enemies", &self.enemies.len())
            .field("speed", &self.config.speed)
            .field("blob_weight", &self.config.blob_weight)
            .finish()
    }
}

/// Local bounds of the occupied cells, padded out to the voxel faces.
fn bounds_of(grid: &OccupancyGrid, pitch: f32) -> Aabb {
    let Some((lo, hi)) = grid.cell_bounds() else {
        return Aabb::empty();
    };
    let half = (grid.size() as f32 - 1.0) * 0.5;
    let to_local = |c: glam::UVec3| (c.as_vec3() - Vec3::splat(half)) * pitch;
    let pad = Vec3::splat(pitch * 0.5);
    Aabb::new(to_local(lo) - pad, to_local(hi) + pad)
}
