//! # Shard Common
//!
//! Common types, utilities, and shared abstractions for Shardstorm.
//!
//! This crate provides foundational types used across all Shardstorm subsystems:
//! - ID types (EnemyId, RenderHandle, BodyHandle)
//! - Colour tags shared by enemies and debris
//! - Axis-aligned bounds and swept segment tests
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod color;
pub mod error;
pub mod geom;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::color::*;
    pub use crate::error::*;
    pub use crate::geom::*;
    pub use crate::ids::*;
}

pub use prelude::*;
