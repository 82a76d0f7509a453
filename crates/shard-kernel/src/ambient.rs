//! Ambient voxel field.
//!
//! A fixed `side × side` field of elements that sit dormant until an
//! explosion is staged, then stream toward the epicentre a few at a time,
//! fall, bounce, push each other apart and eventually freeze in place.
//!
//! Per tick the field runs the two kernels from [`crate::compute`] through a
//! [`FieldBackend`], reads the positions back, and rebuilds a
//! [`SpatialHashGrid`] to compute the repulsion force consumed by the *next*
//! tick's velocity pass.

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shard_common::{ShardError, ShardResult};
use tracing::{debug, info};

use crate::compute::{
    AmbientState, CpuBackend, FieldBackend, FieldSnapshot, StagedExplosion, TickUniforms,
};
use crate::spatial::SpatialHashGrid;

/// Separations below this are treated as coincident and produce no force.
const MIN_SEPARATION: f32 = 1e-5;

/// Ambient field configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    /// Elements per side; the field holds `side²` elements.
    pub side: u32,
    /// Fixed timestep per tick in seconds.
    pub dt: f32,
    /// Downward acceleration.
    pub gravity: f32,
    /// Ground plane height.
    pub ground: f32,
    /// Vertical speed kept on a ground bounce.
    pub restitution: f32,
    /// Planar speed kept on a ground bounce.
    pub friction: f32,
    /// Ticks an element stays active before freezing.
    pub freeze_age: u32,
    /// Per-tick activation probability of a dormant element.
    pub activation_chance: f32,
    /// Half-size of the cube around the epicentre activations land in.
    pub spawn_jitter: f32,
    /// Weight of the explosion direction in the launch direction.
    pub direction_weight: f32,
    /// Weight of the random scatter in the launch direction.
    pub scatter: f32,
    /// Launch speed range (min, max).
    pub launch_speed: (f32, f32),
    /// Repulsion cut-off distance; also the spatial grid cell size.
    pub interaction_radius: f32,
    /// Repulsion strength at zero separation.
    pub repulsion: f32,
    /// Where dormant elements are parked.
    pub parking: Vec3,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            side: 160,
            dt: 1.0 / 60.0,
            gravity: 9.8,
            ground: 0.0,
            restitution: 0.4,
            friction: 0.85,
            freeze_age: 600,
            activation_chance: 0.002,
            spawn_jitter: 0.6,
            direction_weight: 1.0,
            scatter: 0.8,
            launch_speed: (3.0, 9.0),
            interaction_radius: 0.5,
            repulsion: 12.0,
            parking: Vec3::new(0.0, -100.0, 0.0),
        }
    }
}

impl AmbientConfig {
    /// Number of elements in the field.
    #[must_use]
    pub const fn element_count(&self) -> usize {
        (self.side as usize) * (self.side as usize)
    }

    /// Checks the values the simulation cannot run without.
    pub fn validate(&self) -> ShardResult<()> {
        if self.side == 0 {
            return Err(ShardError::invalid("side", "must be greater than zero"));
        }
        if !self.interaction_radius.is_finite() || self.interaction_radius <= 0.0 {
            return Err(ShardError::invalid(
                "interaction_radius",
                format!("must be positive, got {}", self.interaction_radius),
            ));
        }
        if self.freeze_age == 0 {
            return Err(ShardError::invalid("freeze_age", "must be greater than zero"));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ShardError::invalid("dt", format!("must be positive, got {}", self.dt)));
        }
        if self.launch_speed.0 > self.launch_speed.1 {
            return Err(ShardError::invalid("launch_speed", "min exceeds max"));
        }
        Ok(())
    }
}

/// Lifecycle counts across the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AmbientStats {
    /// Parked elements.
    pub dormant: usize,
    /// Simulated elements.
    pub active: usize,
    /// Elements past their age cap.
    pub frozen: usize,
}

/// The ambient field simulation.
pub struct VoxelSimulation<B: FieldBackend = CpuBackend> {
    config: AmbientConfig,
    backend: B,
    grid: SpatialHashGrid,
    snapshot: FieldSnapshot,
    /// Repulsion computed at the end of the last tick.
    forces: Vec<Vec3>,
    /// Explosion visible to the kernels.
    current: Option<StagedExplosion>,
    /// Explosion staged this tick; promoted after the next update.
    pending: Option<StagedExplosion>,
    generation: u32,
    tick: u32,
}

impl VoxelSimulation<CpuBackend> {
    /// Creates a field on the CPU backend.
    pub fn new(config: AmbientConfig) -> ShardResult<Self> {
        config.validate()?;
        let backend = CpuBackend::new(config.side, config.parking);
        Self::with_backend(config, backend)
    }
}

impl<B: FieldBackend> VoxelSimulation<B> {
    /// Creates a field running on `backend`, which must hold `side²` elements.
    pub fn with_backend(config: AmbientConfig, mut backend: B) -> ShardResult<Self> {
        config.validate()?;
        let count = config.element_count();
        if backend.len() != count {
            return Err(ShardError::invalid(
                "backend",
                format!("holds {} elements, config needs {count}", backend.len()),
            ));
        }
        let grid = SpatialHashGrid::new(config.interaction_radius)?;
        let mut snapshot = FieldSnapshot::default();
        backend.read_back(&mut snapshot);

        info!(
            "Ambient field ready: {}x{} elements, radius {}",
            config.side, config.side, config.interaction_radius
        );

        Ok(Self {
            config,
            backend,
            grid,
            snapshot,
            forces: vec![Vec3::ZERO; count],
            current: None,
            pending: None,
            generation: 0,
            tick: 0,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &AmbientConfig {
        &self.config
    }

    /// Returns the compute backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Ticks simulated since construction or the last reset.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    /// Number of explosions staged since construction or the last reset.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Element positions as of the last readback.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.snapshot.positions
    }

    /// Element states as of the last readback.
    #[must_use]
    pub fn states(&self) -> &[AmbientState] {
        &self.snapshot.states
    }

    /// Repulsion forces the next tick will apply.
    #[must_use]
    pub fn pending_forces(&self) -> &[Vec3] {
        &self.forces
    }

    /// Stages an explosion. Dormant elements start streaming toward it from
    /// the next tick on.
    pub fn trigger_explosion(&mut self, point: Vec3, direction: Vec3) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(StagedExplosion {
            point,
            direction,
            generation: self.generation,
        });
        debug!("Staged ambient explosion {} at {point}", self.generation);
    }

    /// Advances the field by one tick.
    pub fn update(&mut self) {
        let uniforms = self.uniforms();
        self.backend.upload_forces(&self.forces);
        self.backend.dispatch(&uniforms);
        self.backend.read_back(&mut self.snapshot);
        self.accumulate_forces();

        if let Some(staged) = self.pending.take() {
            self.current = Some(staged);
        }
        self.tick = self.tick.wrapping_add(1);
    }

    /// Returns every element to dormant and forgets all explosions.
    pub fn reset(&mut self) {
        self.backend.reset(self.config.parking);
        self.backend.read_back(&mut self.snapshot);
        self.forces.fill(Vec3::ZERO);
        self.grid.clear();
        self.current = None;
        self.pending = None;
        self.generation = 0;
        self.tick = 0;
        debug!("Ambient field reset");
    }

    /// Counts elements by lifecycle state.
    #[must_use]
    pub fn stats(&self) -> AmbientStats {
        let mut stats = AmbientStats::default();
        for state in &self.snapshot.states {
            match state {
                AmbientState::Dormant => stats.dormant += 1,
                AmbientState::Active { .. } => stats.active += 1,
                AmbientState::Frozen => stats.frozen += 1,
            }
        }
        stats
    }

    fn uniforms(&self) -> TickUniforms {
        let c = &self.config;
        TickUniforms {
            tick: self.tick,
            dt: c.dt,
            gravity: c.gravity,
            ground: c.ground,
            restitution: c.restitution,
            friction: c.friction,
            freeze_age: c.freeze_age,
            activation_chance: c.activation_chance,
            spawn_jitter: c.spawn_jitter,
            direction_weight: c.direction_weight,
            scatter: c.scatter,
            launch_speed: c.launch_speed,
            explosion: self.current,
        }
    }

    /// Rebuilds the grid from the readback and sums pairwise repulsion for
    /// every active element. The sum runs in parallel; each worker keeps its
    /// own neighbour buffer.
    fn accumulate_forces(&mut self) {
        let Self {
            config,
            grid,
            snapshot,
            forces,
            ..
        } = self;
        let radius = config.interaction_radius;
        let strength = config.repulsion;

        grid.clear();
        for (i, (p, state)) in snapshot.positions.iter().zip(&snapshot.states).enumerate() {
            if !state.is_dormant() {
                grid.insert(i as u32, p.x, p.y, p.z);
            }
        }

        let grid = &*grid;
        let snapshot = &*snapshot;
        forces
            .par_iter_mut()
            .enumerate()
            .for_each_init(Vec::new, |neighbours, (i, force)| {
                *force = Vec3::ZERO;
                if !snapshot.states[i].is_active() {
                    return;
                }
                let p = snapshot.positions[i];
                grid.get_nearby_into(p.x, p.y, p.z, neighbours);
                for &j in neighbours.iter() {
                    if j as usize == i {
                        continue;
                    }
                    let delta = p - snapshot.positions[j as usize];
                    let dist = delta.length();
                    if dist < radius && dist > MIN_SEPARATION {
                        *force += delta / dist * strength * (1.0 - dist / radius);
                    }
                }
            });
    }
}

impl<B: FieldBackend> std::fmt::Debug for VoxelSimulation<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoxelSimulation")
            .field("side", &self.config.side)
            .field("tick", &self.tick)
            .field("generation", &self.generation)
            .field("stats", &self.stats())
            .finish()
    }
}
