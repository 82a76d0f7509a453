//! Small geometry helpers: axis-aligned bounds and swept segment tests.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a cube centred on `center`.
    #[must_use]
    pub fn cube(center: Vec3, half: f32) -> Self {
        Self {
            min: center - Vec3::splat(half),
            max: center + Vec3::splat(half),
        }
    }

    /// An inverted box standing in for "no voxels".
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// True if no point has been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Centre point.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half extents along each axis.
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Returns a copy moved by `offset`.
    #[must_use]
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}

/// Compute the parametric `t` at which segment `[p0, p1]` first enters `bounds`.
///
/// Returns `None` when no intersection occurs. `t` is in `[0, 1]`; a segment
/// starting inside the box reports `t = 0`.
#[inline]
#[must_use]
pub fn segment_aabb_enter_t(p0: Vec3, p1: Vec3, bounds: &Aabb) -> Option<f32> {
    let d = p1 - p0;
    let mut tmin = 0.0f32;
    let mut tmax = 1.0f32;
    for axis in 0..3 {
        let s = p0[axis];
        let dir = d[axis];
        let lo = bounds.min[axis];
        let hi = bounds.max[axis];
        if dir.abs() < 1e-9 {
            if s < lo || s > hi {
                return None;
            }
        } else {
            let inv = 1.0 / dir;
            let mut t0 = (lo - s) * inv;
            let mut t1 = (hi - s) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            tmin = tmin.max(t0);
            tmax = tmax.min(t1);
            if tmin > tmax {
                return None;
            }
        }
    }
    Some(tmin)
}

/// Planar (XZ) distance from `p` to the world origin.
#[inline]
#[must_use]
pub fn planar_distance(p: Vec3) -> f32 {
    (p.x * p.x + p.z * p.z).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_hits_box_front_face() {
        let b = Aabb::cube(Vec3::ZERO, 1.0);
        let t = segment_aabb_enter_t(Vec3::new(-3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0), &b);
        let t = t.expect("segment crosses the box");
        assert!((t - 2.0 / 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_segment_misses_box() {
        let b = Aabb::cube(Vec3::ZERO, 1.0);
        let hit = segment_aabb_enter_t(Vec3::new(-3.0, 2.5, 0.0), Vec3::new(3.0, 2.5, 0.0), &b);
        assert!(hit.is_none());
    }

    #[test]
    fn test_segment_stopping_short() {
        let b = Aabb::cube(Vec3::ZERO, 1.0);
        let hit = segment_aabb_enter_t(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(-2.0, 0.0, 0.0), &b);
        assert!(hit.is_none());
    }

    #[test]
    fn test_segment_starting_inside() {
        let b = Aabb::cube(Vec3::ZERO, 1.0);
        let hit = segment_aabb_enter_t(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), &b);
        assert_eq!(hit, Some(0.0));
    }

    #[test]
    fn test_aabb_empty_and_extents() {
        assert!(Aabb::empty().is_empty());
        let b = Aabb::new(Vec3::new(-1.5, -0.5, -0.5), Vec3::new(1.5, 2.5, 0.5));
        assert!(!b.is_empty());
        assert_eq!(b.min, Vec3::new(-1.5, -0.5, -0.5));
        assert_eq!(b.max, Vec3::new(1.5, 2.5, 0.5));
        assert_eq!(b.center(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(b.half_extents(), Vec3::new(1.5, 1.5, 0.5));
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        assert!((planar_distance(Vec3::new(3.0, 100.0, 4.0)) - 5.0).abs() < 1e-6);
    }
}
