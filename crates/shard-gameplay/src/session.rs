//! Arcade session: one frame of the whole simulation.
//!
//! [`ArcadeSession`] owns the enemy manager, the projectile set, the particle
//! pool, the ambient field, a spawn scheduler and the shared event bus, and
//! runs them in a fixed order every tick:
//!
//! 1. fire input
//! 2. projectiles advance, hits damage enemies and feed particles/field
//! 3. scheduled spawns
//! 4. enemies steer toward the origin
//! 5. physics step
//! 6. ambient field tick (uses last tick's repulsion)
//! 7. particle pool tick

use glam::Vec3;
use serde::{Deserialize, Serialize};
use shard_common::ShardResult;
use shard_kernel::{
    AmbientConfig, AmbientStats, CpuBackend, ParticlePool, PoolConfig, VoxelSimulation,
};
use tracing::{debug, info, warn};

use crate::backend::{HeadlessScene, KinematicWorld, PhysicsWorld, SceneBackend};
use crate::enemy::{EnemyConfig, EnemyShapes};
use crate::events::{EventBus, GameEvent};
use crate::projectile::{ImpactReport, ProjectileConfig, ProjectileInteraction};

/// Shortest allowed spawn interval in seconds.
const MIN_SPAWN_INTERVAL: f32 = 0.05;

/// Upper bound on spawns reported by a single scheduler tick.
pub const MAX_SPAWNS_PER_TICK: u32 = 64;

/// Difficulty scalars, adjustable between frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Difficulty {
    /// Enemy walking speed.
    pub enemy_speed: f32,
    /// Probability a spawn is a blob.
    pub blob_weight: f32,
    /// Seconds between spawns.
    pub spawn_interval: f32,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self {
            enemy_speed: 3.0,
            blob_weight: 0.5,
            spawn_interval: 2.5,
        }
    }
}

/// Fixed-interval spawn accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnScheduler {
    interval: f32,
    elapsed: f32,
}

impl SpawnScheduler {
    /// Creates a scheduler; the first spawn is due after one interval.
    #[must_use]
    pub fn new(interval: f32) -> Self {
        Self {
            interval: interval.max(MIN_SPAWN_INTERVAL),
            elapsed: 0.0,
        }
    }

    /// Seconds between spawns.
    #[must_use]
    pub const fn interval(&self) -> f32 {
        self.interval
    }

    /// Changes the interval without losing accumulated time.
    pub fn set_interval(&mut self, interval: f32) {
        self.interval = interval.max(MIN_SPAWN_INTERVAL);
    }

    /// Advances time and returns how many spawns are due, at most
    /// [`MAX_SPAWNS_PER_TICK`]. Negative or non-finite steps are ignored.
    pub fn tick(&mut self, dt: f32) -> u32 {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
        }
        if self.elapsed < self.interval {
            return 0;
        }
        let due = (self.elapsed / self.interval).floor();
        self.elapsed %= self.interval;
        due.min(MAX_SPAWNS_PER_TICK as f32) as u32
    }

    /// Forgets accumulated time.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }
}

/// Everything a session is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Event bus capacity.
    pub event_capacity: usize,
    /// Enemy settings.
    pub enemies: EnemyConfig,
    /// Projectile settings.
    pub projectiles: ProjectileConfig,
    /// Particle pool settings.
    pub particles: PoolConfig,
    /// Ambient field settings.
    pub ambient: AmbientConfig,
    /// Starting difficulty.
    pub difficulty: Difficulty,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            enemies: EnemyConfig::default(),
            projectiles: ProjectileConfig::default(),
            particles: PoolConfig::default(),
            ambient: AmbientConfig::default(),
            difficulty: Difficulty::default(),
        }
    }
}

/// Per-frame input.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Fire along this direction if set.
    pub fire: Option<Vec3>,
}

/// What happened during one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// A shot was fired this frame.
    pub fired: bool,
    /// Projectile impacts.
    pub impacts: Vec<ImpactReport>,
    /// Voxels destroyed across all impacts.
    pub voxels_destroyed: usize,
    /// Enemies finished off this frame.
    pub enemies_destroyed: usize,
    /// Enemies removed for reaching the origin.
    pub enemies_reached_origin: usize,
    /// Enemies spawned this frame.
    pub enemies_spawned: usize,
    /// Enemies alive after the frame.
    pub enemies_alive: usize,
    /// Projectiles in flight after the frame.
    pub projectiles_live: usize,
    /// Ambient field counts after the frame.
    pub ambient: AmbientStats,
}

/// Owns and drives the whole simulation.
pub struct ArcadeSession<S: SceneBackend = HeadlessScene, P: PhysicsWorld = KinematicWorld> {
    enemies: EnemyShapes<S, P>,
    projectiles: ProjectileInteraction,
    pool: ParticlePool,
    field: VoxelSimulation<CpuBackend>,
    scheduler: SpawnScheduler,
    difficulty: Difficulty,
    events: EventBus,
    frame: u64,
}

impl ArcadeSession<HeadlessScene, KinematicWorld> {
    /// Creates a session on the headless collaborators.
    pub fn headless(config: SessionConfig) -> ShardResult<Self> {
        let physics = KinematicWorld::new(config.particles.gravity, config.particles.ground_height);
        Self::new(config, HeadlessScene::new(), physics)
    }
}

impl<S: SceneBackend, P: PhysicsWorld> ArcadeSession<S, P> {
    /// Creates a session rendering through `scene` and simulating through `physics`.
    ///
    /// Debris chunks take the enemy voxel pitch, whatever the particle
    /// settings say.
    pub fn new(mut config: SessionConfig, scene: S, physics: P) -> ShardResult<Self> {
        let pitch = config.enemies.voxel_pitch;
        if (config.particles.voxel_pitch - pitch).abs() > f32::EPSILON {
            warn!(
                "Particle voxel pitch {} overridden by enemy voxel pitch {pitch}",
                config.particles.voxel_pitch
            );
            config.particles.voxel_pitch = pitch;
        }
        let events = EventBus::new(config.event_capacity.max(1));
        let mut enemies = EnemyShapes::new(config.enemies, scene, physics)?;
        enemies.attach_events(events.clone());
        let mut projectiles = ProjectileInteraction::new(config.projectiles);
        projectiles.attach_events(events.clone());
        let field = VoxelSimulation::new(config.ambient)?;
        let pool = ParticlePool::new(config.particles);

        let mut session = Self {
            enemies,
            projectiles,
            pool,
            field,
            scheduler: SpawnScheduler::new(config.difficulty.spawn_interval),
            difficulty: config.difficulty,
            events,
            frame: 0,
        };
        session.set_difficulty(config.difficulty);
        info!("Arcade session ready");
        Ok(session)
    }

    /// Runs one frame.
    pub fn tick(&mut self, dt: f32, input: &FrameInput) -> FrameReport {
        self.frame += 1;
        let fired = input.fire.is_some_and(|dir| self.projectiles.fire(dir));

        let impacts = self
            .projectiles
            .update(dt, &mut self.enemies, &mut self.pool, &mut self.field);

        let mut spawned = 0;
        for _ in 0..self.scheduler.tick(dt) {
            if self.enemies.spawn_tick().is_some() {
                spawned += 1;
            }
        }

        let reached = self.enemies.update();
        self.enemies.physics_mut().step(dt);
        self.field.update();
        self.pool.update(dt);

        let report = FrameReport {
            frame: self.frame,
            fired,
            voxels_destroyed: impacts.iter().map(|i| i.voxels_destroyed).sum(),
            enemies_destroyed: impacts.iter().filter(|i| i.enemy_destroyed).count(),
            impacts,
            enemies_reached_origin: reached.len(),
            enemies_spawned: spawned,
            enemies_alive: self.enemies.len(),
            projectiles_live: self.projectiles.projectiles().len(),
            ambient: self.field.stats(),
        };
        if report.voxels_destroyed > 0 || report.enemies_reached_origin > 0 {
            debug!(
                "Frame {}: {} voxels destroyed, {} enemies destroyed, {} reached origin",
                report.frame,
                report.voxels_destroyed,
                report.enemies_destroyed,
                report.enemies_reached_origin
            );
        }
        report
    }

    /// Applies new difficulty scalars from the next frame on.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.enemies.set_speed(difficulty.enemy_speed);
        self.enemies.set_blob_weight(difficulty.blob_weight);
        self.scheduler.set_interval(difficulty.spawn_interval);
        self.difficulty = difficulty;
    }

    /// Current difficulty.
    #[must_use]
    pub const fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Clears enemies, projectiles, particles and the ambient field.
    pub fn reset(&mut self) {
        self.enemies.clear();
        self.projectiles.clear();
        self.pool.reset();
        self.field.reset();
        self.scheduler.reset();
        self.frame = 0;
        let _ = self.events.drain();
        info!("Arcade session reset");
    }

    /// Takes every pending event.
    pub fn drain_events(&self) -> Vec<GameEvent> {
        self.events.drain()
    }

    /// Frames run since creation or the last reset.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Enemy manager.
    #[must_use]
    pub const fn enemies(&self) -> &EnemyShapes<S, P> {
        &self.enemies
    }

    /// Mutable enemy manager, for scripted spawns.
    pub fn enemies_mut(&mut self) -> &mut EnemyShapes<S, P> {
        &mut self.enemies
    }

    /// Projectile set.
    #[must_use]
    pub const fn projectiles(&self) -> &ProjectileInteraction {
        &self.projectiles
    }

    /// Particle pool.
    #[must_use]
    pub const fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    /// Ambient field.
    #[must_use]
    pub const fn field(&self) -> &VoxelSimulation {
        &self.field
    }
}

impl<S: SceneBackend, P: PhysicsWorld> std::fmt::Debug for ArcadeSession<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcadeSession")
            .field("frame", &self.frame)
            .field("enemies", &self.enemies)
            .field("difficulty", &self.difficulty)
            .finish()
    }
}
