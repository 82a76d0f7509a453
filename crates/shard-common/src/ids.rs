//! ID types for enemies and collaborator resources.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for enemy IDs.
static ENEMY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a voxel enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u64);

impl EnemyId {
    /// Allocates a new unique enemy ID.
    #[must_use]
    pub fn allocate() -> Self {
        Self(ENEMY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an enemy ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid enemy ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) enemy ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Handle to a batch-rendered geometry object owned by the scene backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderHandle(u32);

impl RenderHandle {
    /// Creates a render handle from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Handle to a rigid body owned by the physics world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyHandle(u32);

impl BodyHandle {
    /// Creates a body handle from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}
