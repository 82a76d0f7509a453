//! # Shard Gameplay
//!
//! CPU-side entity layer for Shardstorm.
//!
//! This crate provides:
//! - Procedural voxel templates (blob and walker archetypes)
//! - Occupancy grids with 6-connectivity analysis
//! - Destructible enemies that walk toward the origin
//! - Swept projectiles that blast voxels off enemies
//! - Scene and physics collaborator traits with headless implementations
//! - Event bus for score and UI consumers
//! - The per-frame session orchestrator

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod enemy;
pub mod events;
pub mod occupancy;
pub mod projectile;
pub mod session;
pub mod template;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::enemy::*;
    pub use crate::events::*;
    pub use crate::occupancy::*;
    pub use crate::projectile::*;
    pub use crate::session::*;
    pub use crate::template::*;
}

pub use prelude::*;
