//! Headless run loop.
//!
//! Drives an [`ArcadeSession`] at a fixed tick rate with a scripted gunner
//! that aims at the nearest enemy, tallies what happened and produces a
//! [`RunSummary`].

use anyhow::{Context, Result};
use glam::Vec3;
use serde::Serialize;
use std::fs;
use std::time::Instant;
use tracing::{debug, info};

use shard_gameplay::{
    ArcadeSession, EnemyShapes, FrameInput, FrameReport, GameEvent, PhysicsWorld, SceneBackend,
};
use shard_kernel::AmbientStats;

use crate::config::EngineConfig;

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Frames simulated.
    pub frames: u64,
    /// Simulated seconds.
    pub simulated_seconds: f32,
    /// Wall-clock milliseconds spent simulating.
    pub wall_ms: u128,
    /// Shots that actually left the muzzle.
    pub shots_fired: u64,
    /// Projectile impacts.
    pub hits: u64,
    /// Voxels removed from enemies.
    pub voxels_destroyed: u64,
    /// Enemies spawned.
    pub enemies_spawned: u64,
    /// Enemies reduced to nothing.
    pub enemies_destroyed: u64,
    /// Enemies that walked into the origin.
    pub enemies_reached_origin: u64,
    /// Enemies alive when the run ended.
    pub enemies_alive: usize,
    /// Debris chunks still in the pool when the run ended.
    pub debris_live: usize,
    /// Ambient field census at the end.
    pub ambient: AmbientStats,
    /// Events drained from the bus.
    pub events: EventTally,
}

/// Event counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventTally {
    /// `EnemySpawned`
    pub spawned: u64,
    /// `VoxelsDestroyed`
    pub voxels_destroyed: u64,
    /// `EnemyDestroyed`
    pub enemy_destroyed: u64,
    /// `EnemyReachedOrigin`
    pub reached_origin: u64,
    /// `ProjectileFired`
    pub fired: u64,
}

impl EventTally {
    fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::EnemySpawned { .. } => self.spawned += 1,
            GameEvent::VoxelsDestroyed { .. } => self.voxels_destroyed += 1,
            GameEvent::EnemyDestroyed { .. } => self.enemy_destroyed += 1,
            GameEvent::EnemyReachedOrigin { .. } => self.reached_origin += 1,
            GameEvent::ProjectileFired { .. } => self.fired += 1,
        }
    }
}

impl RunSummary {
    fn record(&mut self, report: &FrameReport) {
        self.frames = report.frame;
        self.shots_fired += u64::from(report.fired);
        self.hits += report.impacts.len() as u64;
        self.voxels_destroyed += report.voxels_destroyed as u64;
        self.enemies_spawned += report.enemies_spawned as u64;
        self.enemies_destroyed += report.enemies_destroyed as u64;
        self.enemies_reached_origin += report.enemies_reached_origin as u64;
        self.enemies_alive = report.enemies_alive;
        self.ambient = report.ambient;
    }
}

/// Fires on a fixed interval at whatever enemy is closest.
#[derive(Debug, Clone)]
struct Gunner {
    interval: f32,
    timer: f32,
}

impl Gunner {
    fn new(interval: f32) -> Self {
        Self {
            interval: interval.max(f32::EPSILON),
            timer: 0.0,
        }
    }

    fn aim<S, P>(&mut self, dt: f32, view: Vec3, enemies: &EnemyShapes<S, P>) -> Option<Vec3>
    where
        S: SceneBackend,
        P: PhysicsWorld,
    {
        self.timer -= dt;
        if self.timer > 0.0 {
            return None;
        }
        let target = nearest_enemy_center(view, enemies)?;
        self.timer = self.interval;
        Some(target - view)
    }
}

/// Centre of the live bounds of the enemy closest to `view`.
fn nearest_enemy_center<S, P>(view: Vec3, enemies: &EnemyShapes<S, P>) -> Option<Vec3>
where
    S: SceneBackend,
    P: PhysicsWorld,
{
    enemies
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.local_bounds().is_empty())
        .filter_map(|(i, e)| {
            enemies
                .translation(i)
                .map(|t| t + e.local_bounds().center())
        })
        .min_by(|a, b| a.distance_squared(view).total_cmp(&b.distance_squared(view)))
}

/// Runs the headless simulation described by `config`.
pub fn run(config: &EngineConfig) -> Result<RunSummary> {
    let mut session =
        ArcadeSession::headless(config.session.clone()).context("Failed to build session")?;
    let dt = config.dt();
    let view = session.projectiles().config().view_position;
    let mut gunner = config.auto_fire.then(|| Gunner::new(config.fire_interval));
    let log_every = ((config.log_interval / dt).round() as u64).max(1);

    info!(
        "Running {} frames at {} Hz (auto fire: {})",
        config.frames, config.tick_rate, config.auto_fire
    );

    let started = Instant::now();
    let mut summary = RunSummary::default();

    for _ in 0..config.frames {
        let fire = gunner
            .as_mut()
            .and_then(|g| g.aim(dt, view, session.enemies()));
        let report = session.tick(dt, &FrameInput { fire });
        summary.record(&report);

        for event in session.drain_events() {
            summary.events.record(&event);
        }

        if report.frame % log_every == 0 {
            info!(
                "Frame {}: {} alive, {} voxels destroyed, {} enemies destroyed, {} reached origin",
                report.frame,
                report.enemies_alive,
                summary.voxels_destroyed,
                summary.enemies_destroyed,
                summary.enemies_reached_origin
            );
            debug!(
                "Ambient field: {} dormant, {} active, {} frozen",
                report.ambient.dormant, report.ambient.active, report.ambient.frozen
            );
        }
    }

    summary.simulated_seconds = summary.frames as f32 * dt;
    summary.wall_ms = started.elapsed().as_millis();
    summary.debris_live = session.pool().live_debris();

    info!(
        "Run finished: {} shots, {} hits, {} enemies destroyed in {} ms",
        summary.shots_fired, summary.hits, summary.enemies_destroyed, summary.wall_ms
    );
    Ok(summary)
}

/// Writes `summary` as pretty JSON to the configured path, or stdout.
pub fn write_summary(config: &EngineConfig, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    match &config.summary_path {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {path}"))?;
            info!("Wrote run summary to {path}");
        },
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_gameplay::{Archetype, VoxelTemplate};
    use tempfile::TempDir;

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig {
            frames: 240,
            ..EngineConfig::default()
        };
        config.session.ambient.side = 16;
        config.session.difficulty.spawn_interval = 0.5;
        config.session.enemies.spawn_radius = 20.0;
        config
    }

    #[test]
    fn test_gunner_waits_for_target() {
        let session = ArcadeSession::headless(small_config().session).expect("session");
        let mut gunner = Gunner::new(0.25);
        assert!(gunner.aim(0.1, Vec3::ZERO, session.enemies()).is_none());
    }

    #[test]
    fn test_gunner_aims_at_nearest() {
        let mut session = ArcadeSession::headless(small_config().session).expect("session");
        let view = Vec3::new(0.0, 1.6, 0.0);
        let far = Vec3::new(0.0, 1.6, 30.0);
        let near = Vec3::new(10.0, 1.6, 0.0);
        for at in [far, near] {
            session
                .enemies_mut()
                .spawn_template(&VoxelTemplate::solid(4), Archetype::Blob, at)
                .expect("spawn");
        }

        let mut gunner = Gunner::new(0.25);
        let dir = gunner
            .aim(1.0 / 60.0, view, session.enemies())
            .expect("target");
        assert!(dir.x > 9.0);
        assert!(dir.z.abs() < 1.0);
        // Cooling down now.
        assert!(gunner.aim(1.0 / 60.0, view, session.enemies()).is_none());
    }

    #[test]
    fn test_run_counts_frames_and_spawns() {
        let config = EngineConfig {
            auto_fire: false,
            ..small_config()
        };
        let summary = run(&config).expect("run");
        assert_eq!(summary.frames, 240);
        assert!((summary.simulated_seconds - 4.0).abs() < 1e-3);
        assert_eq!(summary.shots_fired, 0);
        assert_eq!(summary.hits, 0);
        assert!(summary.enemies_spawned > 0);
        assert_eq!(summary.events.spawned, summary.enemies_spawned);
    }

    #[test]
    fn test_run_with_auto_fire_destroys_voxels() {
        let summary = run(&small_config()).expect("run");
        assert!(summary.shots_fired > 0);
        assert_eq!(summary.events.fired, summary.shots_fired);
        assert!(summary.hits > 0);
        assert!(summary.voxels_destroyed > 0);
    }

    #[test]
    fn test_write_summary_to_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("summary.json");
        let config = EngineConfig {
            summary_path: Some(path.display().to_string()),
            ..EngineConfig::default()
        };
        let summary = RunSummary {
            frames: 7,
            hits: 2,
            ..RunSummary::default()
        };

        write_summary(&config, &summary).expect("write");
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(written["frames"], 7);
        assert_eq!(written["hits"], 2);
        assert!(written["ambient"]["dormant"].is_number());
    }
}
