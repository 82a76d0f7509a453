//! Colour tags carried by enemies and inherited by their debris.

use serde::{Deserialize, Serialize};

/// Brightness multiplier applied to voxels inside the scorch radius.
pub const SCORCH_FACTOR: f32 = 0.35;

/// Palette entry for an enemy and its debris.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColorTag {
    /// Red.
    #[default]
    Crimson = 0,
    /// Orange-yellow.
    Amber = 1,
    /// Blue-green.
    Teal = 2,
    /// Purple.
    Violet = 3,
    /// Pale green.
    Lime = 4,
}

impl ColorTag {
    /// All palette entries in order.
    pub const ALL: [Self; 5] = [
        Self::Crimson,
        Self::Amber,
        Self::Teal,
        Self::Violet,
        Self::Lime,
    ];

    /// Linear RGB for this tag.
    #[must_use]
    pub const fn rgb(self) -> [f32; 3] {
        match self {
            Self::Crimson => [0.86, 0.16, 0.22],
            Self::Amber => [0.98, 0.68, 0.12],
            Self::Teal => [0.10, 0.72, 0.70],
            Self::Violet => [0.58, 0.30, 0.90],
            Self::Lime => [0.62, 0.92, 0.34],
        }
    }

    /// Darkened RGB used for scorched (damaged but surviving) voxels.
    #[must_use]
    pub fn scorched(self) -> [f32; 3] {
        let [r, g, b] = self.rgb();
        [r * SCORCH_FACTOR, g * SCORCH_FACTOR, b * SCORCH_FACTOR]
    }
}
