//! Runner configuration.
//!
//! Everything the headless runner needs: loop parameters, the scripted
//! gunner, output, and the full session configuration. Loaded from and saved
//! to TOML.

use serde::{Deserialize, Serialize};
use shard_common::{ConfigError, ShardResult};
use shard_gameplay::SessionConfig;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Default config file name.
pub const CONFIG_FILE: &str = "shardstorm.toml";

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Loop ===
    /// Frames to simulate.
    pub frames: u64,
    /// Fixed ticks per simulated second.
    pub tick_rate: u32,
    /// Seconds of simulated time between progress log lines.
    pub log_interval: f32,

    // === Scripted gunner ===
    /// Fire at the nearest enemy automatically.
    pub auto_fire: bool,
    /// Seconds between scripted shots.
    pub fire_interval: f32,

    // === Output ===
    /// Where to write the JSON run summary; stdout if unset.
    pub summary_path: Option<String>,

    // === Simulation ===
    /// Session configuration.
    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames: 3600,
            tick_rate: 60,
            log_interval: 5.0,

            auto_fire: true,
            fire_interval: 0.25,

            summary_path: None,

            session: SessionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads from `path`, falling back to defaults when the file is missing
    /// or malformed.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to load config file: {e}");
                Self::default()
            },
        }
    }

    /// Loads from `path`, surfacing IO and parse errors.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> ShardResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Writes the configuration as TOML, creating parent directories.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ShardResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamps every value into its usable range.
    pub fn validate(&mut self) {
        // Loop
        self.frames = self.frames.clamp(1, 10_000_000);
        self.tick_rate = self.tick_rate.clamp(10, 240);
        self.log_interval = self.log_interval.clamp(0.1, 3600.0);
        self.fire_interval = self.fire_interval.clamp(0.01, 60.0);

        let s = &mut self.session;
        s.event_capacity = s.event_capacity.clamp(16, 1 << 16);

        // Enemies
        s.enemies.resolution = s.enemies.resolution.clamp(2, 32);
        s.enemies.voxel_pitch = s.enemies.voxel_pitch.clamp(0.05, 4.0);
        s.enemies.scorch_multiplier = s.enemies.scorch_multiplier.clamp(1.0, 16.0);
        s.enemies.max_enemies = s.enemies.max_enemies.clamp(1, 256);

        // Projectiles
        s.projectiles.speed = s.projectiles.speed.clamp(1.0, 1000.0);
        s.projectiles.blast_radius = s.projectiles.blast_radius.clamp(0.0, 10.0);
        s.projectiles.cooldown = s.projectiles.cooldown.clamp(0.0, 10.0);

        // Particles
        s.particles.spark_capacity = s.particles.spark_capacity.clamp(1, 1 << 16);
        s.particles.debris_capacity = s.particles.debris_capacity.clamp(1, 1 << 20);
        s.particles.voxel_pitch = s.particles.voxel_pitch.clamp(0.05, 4.0);

        // Ambient field
        s.ambient.side = s.ambient.side.clamp(1, 512);
        s.ambient.interaction_radius = s.ambient.interaction_radius.clamp(0.01, 10.0);
        s.ambient.freeze_age = s.ambient.freeze_age.max(1);
        s.ambient.activation_chance = s.ambient.activation_chance.clamp(0.0, 1.0);
        s.ambient.dt = s.ambient.dt.clamp(1.0 / 480.0, 0.1);

        // Difficulty
        s.difficulty.enemy_speed = s.difficulty.enemy_speed.clamp(0.0, 100.0);
        s.difficulty.blob_weight = s.difficulty.blob_weight.clamp(0.0, 1.0);
        s.difficulty.spawn_interval = s.difficulty.spawn_interval.clamp(0.05, 600.0);
    }

    /// Seconds per tick.
    #[must_use]
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}
