//! # Shard Kernel
//!
//! Data-parallel simulation kernels for Shardstorm.
//!
//! This crate holds the systems that operate on large flat arrays of
//! homogeneous elements:
//! - [`spatial::SpatialHashGrid`]: per-frame uniform spatial index
//! - [`pool::ParticlePool`]: fixed-capacity spark and debris pool
//! - [`ambient::VoxelSimulation`]: the ambient voxel field
//!
//! ## Compute seam
//!
//! The ambient field runs two pure per-element kernels (position, velocity)
//! behind the [`compute::FieldBackend`] trait. The CPU backend dispatches them
//! as loops; a GPU backend can run the same kernels as compute passes. The
//! readback after each dispatch is the only synchronous boundary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ambient;
pub mod compute;
pub mod pool;
pub mod spatial;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ambient::*;
    pub use crate::compute::*;
    pub use crate::pool::*;
    pub use crate::spatial::*;
}

pub use prelude::*;
