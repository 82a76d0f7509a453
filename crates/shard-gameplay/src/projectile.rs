//! Projectiles and impact fan-out.
//!
//! Projectiles are fast, so hit detection is swept: every tick the segment
//! from the previous to the current position is tested against every live
//! voxel, and the nearest crossing wins. A hit blows a sphere of voxels off
//! the enemy and forwards the result to the debris pool, the spark pool and
//! the ambient field.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use shard_common::EnemyId;
use shard_kernel::{FieldBackend, ParticlePool, VoxelSimulation};
use tracing::{debug, trace};

use crate::backend::{PhysicsWorld, SceneBackend};
use crate::enemy::EnemyShapes;
use crate::events::{EventBus, GameEvent};

/// Projectile tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    /// Muzzle speed.
    pub speed: f32,
    /// Minimum time between shots in seconds.
    pub cooldown: f32,
    /// Distance in front of the view position where projectiles appear.
    pub muzzle_offset: f32,
    /// Damage radius around the hit point.
    pub blast_radius: f32,
    /// Projectiles farther than this from the origin are discarded.
    pub max_range: f32,
    /// Fraction of the projectile velocity inherited by debris.
    pub debris_velocity_fraction: f32,
    /// Sparks emitted per hit.
    pub spark_count: usize,
    /// Where shots originate.
    pub view_position: Vec3,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            speed: 80.0,
            cooldown: 0.12,
            muzzle_offset: 1.0,
            blast_radius: 1.2,
            max_range: 150.0,
            debris_velocity_fraction: 0.1,
            spark_count: 16,
            view_position: Vec3::new(0.0, 1.6, 0.0),
        }
    }
}

/// One projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    /// Current position.
    pub position: Vec3,
    /// Position at the start of the last tick.
    pub previous: Vec3,
    /// Velocity.
    pub velocity: Vec3,
}

/// What one projectile did when it hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactReport {
    /// Enemy that was hit.
    pub enemy: EnemyId,
    /// World-space hit point.
    pub point: Vec3,
    /// Voxels destroyed, including detached pieces.
    pub voxels_destroyed: usize,
    /// Debris chunks actually spawned (may be fewer if the pool is full).
    pub debris_spawned: usize,
    /// Whether the hit finished the enemy off.
    pub enemy_destroyed: bool,
}

/// Owns projectiles and routes their impacts.
#[derive(Debug)]
pub struct ProjectileInteraction {
    config: ProjectileConfig,
    projectiles: Vec<Projectile>,
    cooldown: f32,
    events: EventBus,
}

impl ProjectileInteraction {
    /// Creates an empty projectile set.
    #[must_use]
    pub fn new(config: ProjectileConfig) -> Self {
        Self {
            config,
            projectiles: Vec::new(),
            cooldown: 0.0,
            events: EventBus::default(),
        }
    }

    /// Routes events to `bus`.
    pub fn attach_events(&mut self, bus: EventBus) {
        self.events = bus;
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &ProjectileConfig {
        &self.config
    }

    /// Projectiles in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Seconds until the next shot is allowed.
    #[must_use]
    pub const fn cooldown_remaining(&self) -> f32 {
        self.cooldown
    }

    /// Fires along `direction`. Returns `false` if still cooling down or the
    /// direction has no length.
    pub fn fire(&mut self, direction: Vec3) -> bool {
        if self.cooldown > 0.0 {
            return false;
        }
        let Some(dir) = direction.try_normalize() else {
            return false;
        };
        let origin = self.config.view_position + dir * self.config.muzzle_offset;
        self.projectiles.push(Projectile {
            position: origin,
            previous: origin,
            velocity: dir * self.config.speed,
        });
        self.cooldown = self.config.cooldown;
        self.events.publish(GameEvent::ProjectileFired {
            origin,
            direction: dir,
        });
        trace!("Fired projectile from {origin} toward {dir}");
        true
    }

    /// Advances projectiles, resolves hits and fans impacts out to the
    /// particle pool and the ambient field.
    pub fn update<S, P, B>(
        &mut self,
        dt: f32,
        enemies: &mut EnemyShapes<S, P>,
        pool: &mut ParticlePool,
        field: &mut VoxelSimulation<B>,
    ) -> Vec<ImpactReport>
    where
        S: SceneBackend,
        P: PhysicsWorld,
        B: FieldBackend,
    {
        self.cooldown = (self.cooldown - dt).max(0.0);
        let config = &self.config;
        let mut reports = Vec::new();

        self.projectiles.retain_mut(|p| {
            p.previous = p.position;
            p.position += p.velocity * dt;

            let Some(hit) = enemies.raycast_segment(p.previous, p.position) else {
                return p.position.length() <= config.max_range;
            };

            let color = enemies
                .get(hit.enemy_index)
                .map(|e| e.color())
                .unwrap_or_default();
            let destroyed = enemies.apply_damage(hit.enemy_index, hit.point, config.blast_radius);
            let direction = p.velocity.normalize_or_zero();

            let debris_spawned = pool.spawn_debris(
                &destroyed,
                p.velocity * config.debris_velocity_fraction,
                color,
            );
            pool.spawn_sparks(hit.point, -direction, config.spark_count);
            field.trigger_explosion(hit.point, direction);

            let enemy_destroyed = enemies.index_of(hit.enemy).is_none();
            debug!(
                "Projectile hit enemy {} at {}: {} voxels",
                hit.enemy.raw(),
                hit.point,
                destroyed.len()
            );
            reports.push(ImpactReport {
                enemy: hit.enemy,
                point: hit.point,
                voxels_destroyed: destroyed.len(),
                debris_spawned,
                enemy_destroyed,
            });
            false
        });

        reports
    }

    /// Discards every projectile and resets the cooldown.
    pub fn clear(&mut self) {
        self.projectiles.clear();
        self.cooldown = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessScene, KinematicWorld};
    use crate::enemy::EnemyConfig;
    use crate::template::{Archetype, VoxelTemplate};
    use shard_kernel::{AmbientConfig, PoolConfig};

    struct Rig {
        shots: ProjectileInteraction,
        enemies: EnemyShapes<HeadlessScene, KinematicWorld>,
        pool: ParticlePool,
        field: VoxelSimulation,
    }

    fn rig() -> Rig {
        Rig {
            shots: ProjectileInteraction::new(ProjectileConfig::default()),
            enemies: EnemyShapes::new(
                EnemyConfig::default(),
                HeadlessScene::new(),
                KinematicWorld::default(),
            )
            .expect("enemies"),
            pool: ParticlePool::new(PoolConfig::default()),
            field: VoxelSimulation::new(AmbientConfig {
                side: 4,
                ..AmbientConfig::default()
            })
            .expect("field"),
        }
    }

    impl Rig {
        fn step(&mut self, dt: f32) -> Vec<ImpactReport> {
            self.shots
                .update(dt, &mut self.enemies, &mut self.pool, &mut self.field)
        }
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let mut r = rig();
        assert!(r.shots.fire(Vec3::Z));
        assert!(!r.shots.fire(Vec3::Z));
        r.step(0.2);
        assert!(r.shots.fire(Vec3::Z));
        assert_eq!(r.shots.projectiles().len(), 2);
    }

    #[test]
    fn test_zero_direction_is_ignored() {
        let mut r = rig();
        assert!(!r.shots.fire(Vec3::ZERO));
        assert!(r.shots.projectiles().is_empty());
        assert_eq!(r.shots.cooldown_remaining(), 0.0);
    }

    #[test]
    fn test_spawns_at_muzzle() {
        let mut r = rig();
        r.shots.fire(Vec3::new(0.0, 0.0, 2.0));
        let p = r.shots.projectiles()[0];
        assert_eq!(p.position, Vec3::new(0.0, 1.6, 1.0));
        assert_eq!(p.velocity, Vec3::new(0.0, 0.0, 80.0));
    }

    #[test]
    fn test_removed_beyond_range() {
        let mut r = rig();
        r.shots.fire(Vec3::X);
        for _ in 0..120 {
            r.step(1.0 / 60.0);
        }
        assert!(r.shots.projectiles().is_empty());
    }

    #[test]
    fn test_fast_projectile_hits_thin_target() {
        let mut r = rig();
        // One voxel thick wall; at 8 units per tick the shot jumps right over it.
        let wall = VoxelTemplate::from_fn(6, |_, _, z| z == 0);
        let id = r
            .enemies
            .spawn_template(&wall, Archetype::Walker, Vec3::new(0.0, 1.6, 20.0))
            .expect("wall");

        r.shots.fire(Vec3::Z);
        let mut reports = Vec::new();
        for _ in 0..10 {
            reports.extend(r.step(0.1));
        }
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].enemy, id);
        assert!(reports[0].voxels_destroyed > 0);
        assert_eq!(reports[0].debris_spawned, reports[0].voxels_destroyed);
        assert!(r.shots.projectiles().is_empty());
        assert!(r.pool.active_sparks() > 0);
        assert_eq!(r.field.generation(), 1);
    }
}
