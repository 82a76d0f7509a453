//! Data-parallel kernels for the ambient voxel field.
//!
//! Each tick runs two passes over every element:
//! - the **position pass** integrates active elements and teleports dormant
//!   elements that were selected for activation to the staged epicentre
//! - the **velocity pass** applies gravity, the previous tick's repulsion
//!   force and ground response, and owns every lifecycle transition
//!
//! Both passes read the same pre-tick lifecycle state, and activation is a
//! pure function of (element coordinate, explosion generation, tick), so the
//! two passes agree on which elements activate without sharing scratch state.
//! Each kernel is a pure per-element function that a GPU backend can run
//! unchanged; [`CpuBackend`] dispatches them as `rayon` parallel loops.

use glam::{UVec2, Vec3};
use rayon::prelude::*;
use tracing::trace;

/// Lifecycle of one ambient element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbientState {
    /// Parked, waiting for an explosion to pull it in.
    #[default]
    Dormant,
    /// Simulated; `age` counts ticks since activation (starts at 1).
    Active {
        /// Ticks since activation.
        age: u32,
    },
    /// Past its age cap; no longer moves.
    Frozen,
}

impl AmbientState {
    /// True for [`AmbientState::Active`].
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// True for [`AmbientState::Dormant`].
    #[must_use]
    pub const fn is_dormant(self) -> bool {
        matches!(self, Self::Dormant)
    }
}

/// The explosion dormant elements are drawn toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagedExplosion {
    /// Epicentre in world space.
    pub point: Vec3,
    /// Direction blended into the launch velocity.
    pub direction: Vec3,
    /// Incremented on every trigger; part of the activation hash.
    pub generation: u32,
}

/// Per-tick constants shared by every element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickUniforms {
    /// Tick number being computed.
    pub tick: u32,
    /// Timestep in seconds.
    pub dt: f32,
    /// Downward acceleration.
    pub gravity: f32,
    /// Ground plane height.
    pub ground: f32,
    /// Fraction of vertical speed kept on a ground bounce.
    pub restitution: f32,
    /// Fraction of planar speed kept on a ground bounce.
    pub friction: f32,
    /// Age (ticks) after which an element freezes.
    pub freeze_age: u32,
    /// Probability per tick that a dormant element activates.
    pub activation_chance: f32,
    /// Half-size of the cube around the epicentre that activations land in.
    pub spawn_jitter: f32,
    /// Weight of the staged direction in the launch direction.
    pub direction_weight: f32,
    /// Weight of the random component in the launch direction.
    pub scatter: f32,
    /// Launch speed range (min, max).
    pub launch_speed: (f32, f32),
    /// Explosion visible to this tick, if any.
    pub explosion: Option<StagedExplosion>,
}

/// Integer avalanche hash (lowbias32).
#[inline]
#[must_use]
pub const fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// Hash of an element coordinate, explosion generation, tick and salt.
#[inline]
#[must_use]
pub const fn element_hash(coord: UVec2, generation: u32, tick: u32, salt: u32) -> u32 {
    let h = hash_u32(tick.wrapping_mul(0x9e37_79b9) ^ salt);
    let h = hash_u32(h ^ generation.wrapping_mul(0x85eb_ca6b));
    let h = hash_u32(h ^ coord.y.wrapping_mul(0xc2b2_ae35));
    hash_u32(h ^ coord.x)
}

/// Maps a hash to `[0, 1)`.
#[inline]
#[must_use]
pub fn unit_float(h: u32) -> f32 {
    (h >> 8) as f32 / (1u32 << 24) as f32
}

/// Maps a hash to `[-1, 1)`.
#[inline]
fn signed_float(h: u32) -> f32 {
    unit_float(h) * 2.0 - 1.0
}

const SALT_ACTIVATE: u32 = 0x01;
const SALT_OFFSET: u32 = 0x10;
const SALT_SCATTER: u32 = 0x20;
const SALT_SPEED: u32 = 0x30;

/// Whether a dormant element at `coord` activates this tick.
#[inline]
#[must_use]
pub fn selected_for_activation(coord: UVec2, u: &TickUniforms) -> Option<StagedExplosion> {
    let explosion = u.explosion?;
    let roll = unit_float(element_hash(coord, explosion.generation, u.tick, SALT_ACTIVATE));
    (roll < u.activation_chance).then_some(explosion)
}

fn hashed_vec(coord: UVec2, generation: u32, tick: u32, salt: u32) -> Vec3 {
    Vec3::new(
        signed_float(element_hash(coord, generation, tick, salt)),
        signed_float(element_hash(coord, generation, tick, salt + 1)),
        signed_float(element_hash(coord, generation, tick, salt + 2)),
    )
}

/// Position pass for one element. Returns the new position.
#[inline]
#[must_use]
pub fn position_kernel(
    coord: UVec2,
    position: Vec3,
    velocity: Vec3,
    state: AmbientState,
    u: &TickUniforms,
) -> Vec3 {
    match state {
        AmbientState::Active { .. } => {
            let mut p = position + velocity * u.dt;
            if p.y < u.ground {
                p.y = u.ground;
            }
            p
        },
        AmbientState::Dormant => match selected_for_activation(coord, u) {
            Some(explosion) => {
                let jitter = hashed_vec(coord, explosion.generation, u.tick, SALT_OFFSET);
                explosion.point + jitter * u.spawn_jitter
            },
            None => position,
        },
        AmbientState::Frozen => position,
    }
}

/// Velocity pass for one element. Returns the new velocity and state.
///
/// `position` is the output of the position pass for this tick; `force` is
/// the repulsion computed at the end of the previous tick.
#[inline]
#[must_use]
pub fn velocity_kernel(
    coord: UVec2,
    position: Vec3,
    velocity: Vec3,
    state: AmbientState,
    force: Vec3,
    u: &TickUniforms,
) -> (Vec3, AmbientState) {
    match state {
        AmbientState::Active { age } => {
            let mut v = velocity + (Vec3::new(0.0, -u.gravity, 0.0) + force) * u.dt;
            if position.y <= u.ground && v.y < 0.0 {
                v.y = -v.y * u.restitution;
                v.x *= u.friction;
                v.z *= u.friction;
            }
            let age = age + 1;
            if age > u.freeze_age {
                (Vec3::ZERO, AmbientState::Frozen)
            } else {
                (v, AmbientState::Active { age })
            }
        },
        AmbientState::Dormant => match selected_for_activation(coord, u) {
            Some(explosion) => {
                let g = explosion.generation;
                let scatter = hashed_vec(coord, g, u.tick, SALT_SCATTER);
                let dir = (explosion.direction.normalize_or_zero() * u.direction_weight
                    + scatter * u.scatter)
                    .try_normalize()
                    .unwrap_or(Vec3::Y);
                let t = unit_float(element_hash(coord, g, u.tick, SALT_SPEED));
                let (lo, hi) = u.launch_speed;
                (dir * (lo + (hi - lo) * t), AmbientState::Active { age: 1 })
            },
            None => (velocity, AmbientState::Dormant),
        },
        AmbientState::Frozen => (Vec3::ZERO, AmbientState::Frozen),
    }
}

/// Grid coordinate of flat element `index` in a field `side` elements wide.
#[inline]
#[must_use]
pub fn element_coord(side: u32, index: usize) -> UVec2 {
    let side = side.max(1) as usize;
    UVec2::new((index % side) as u32, (index / side) as u32)
}

/// Host-visible copy of the field produced by a readback.
#[derive(Debug, Clone, Default)]
pub struct FieldSnapshot {
    /// Element positions.
    pub positions: Vec<Vec3>,
    /// Element lifecycle states.
    pub states: Vec<AmbientState>,
}

/// Compute backend that owns the field buffers and runs the kernels.
///
/// Everything the simulation needs from the backend goes through this trait,
/// so a GPU implementation only has to provide these four calls. `read_back`
/// is the one blocking device-to-host boundary per tick.
pub trait FieldBackend {
    /// Number of elements.
    fn len(&self) -> usize;

    /// True if the field has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the force buffer read by the next dispatch.
    fn upload_forces(&mut self, forces: &[Vec3]);

    /// Runs the position pass then the velocity pass over every element.
    fn dispatch(&mut self, uniforms: &TickUniforms);

    /// Copies positions and states into `out`.
    fn read_back(&mut self, out: &mut FieldSnapshot);

    /// Returns every element to dormant at `parking`.
    fn reset(&mut self, parking: Vec3);
}

/// Plain-loop implementation of [`FieldBackend`].
#[derive(Debug, Clone)]
pub struct CpuBackend {
    side: u32,
    positions: Vec<Vec3>,
    /// Position-pass output; swapped with `positions` after each dispatch.
    next_positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    states: Vec<AmbientState>,
    forces: Vec<Vec3>,
}

impl CpuBackend {
    /// Creates a `side × side` field with every element dormant at `parking`.
    #[must_use]
    pub fn new(side: u32, parking: Vec3) -> Self {
        let len = (side as usize) * (side as usize);
        Self {
            side,
            positions: vec![parking; len],
            next_positions: vec![parking; len],
            velocities: vec![Vec3::ZERO; len],
            states: vec![AmbientState::Dormant; len],
            forces: vec![Vec3::ZERO; len],
        }
    }

    /// Velocities, for inspection.
    #[must_use]
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }
}

impl FieldBackend for CpuBackend {
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn upload_forces(&mut self, forces: &[Vec3]) {
        let n = forces.len().min(self.forces.len());
        self.forces[..n].copy_from_slice(&forces[..n]);
    }

    fn dispatch(&mut self, uniforms: &TickUniforms) {
        let side = self.side;
        let positions = &self.positions;
        let velocities = &self.velocities;
        let states = &self.states;
        self.next_positions
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, next)| {
                *next = position_kernel(
                    element_coord(side, i),
                    positions[i],
                    velocities[i],
                    states[i],
                    uniforms,
                );
            });

        let next_positions = &self.next_positions;
        let forces = &self.forces;
        self.velocities
            .par_iter_mut()
            .zip(self.states.par_iter_mut())
            .enumerate()
            .for_each(|(i, (velocity, state))| {
                let (v, s) = velocity_kernel(
                    element_coord(side, i),
                    next_positions[i],
                    *velocity,
                    *state,
                    forces[i],
                    uniforms,
                );
                *velocity = v;
                *state = s;
            });

        std::mem::swap(&mut self.positions, &mut self.next_positions);
        trace!("CPU field dispatch for tick {}", uniforms.tick);
    }

    fn read_back(&mut self, out: &mut FieldSnapshot) {
        out.positions.clear();
        out.positions.extend_from_slice(&self.positions);
        out.states.clear();
        out.states.extend_from_slice(&self.states);
    }

    fn reset(&mut self, parking: Vec3) {
        self.positions.fill(parking);
        self.next_positions.fill(parking);
        self.velocities.fill(Vec3::ZERO);
        self.states.fill(AmbientState::Dormant);
        self.forces.fill(Vec3::ZERO);
    }
}
