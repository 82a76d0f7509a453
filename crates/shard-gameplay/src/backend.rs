//! Rendering and rigid-body collaborators.
//!
//! Enemies never talk to a renderer or a physics engine directly. They go
//! through the two narrow traits below, which a host application implements
//! over its scene graph and physics library. Headless implementations are
//! provided so the whole simulation runs without either.

use ahash::AHashMap;
use glam::Vec3;
use shard_common::{BodyHandle, RenderHandle};
use tracing::trace;

/// Batched instance rendering.
///
/// One batch per enemy; each instance is one voxel positioned in the batch's
/// local frame. Hiding a voxel is done by setting its scale to zero.
pub trait SceneBackend {
    /// Allocates a batch with `instance_count` instances.
    fn create_batch(&mut self, instance_count: usize) -> RenderHandle;

    /// Releases a batch. Unknown handles are ignored.
    fn remove_batch(&mut self, handle: RenderHandle);

    /// Sets the local position and uniform scale of one instance.
    fn set_instance(&mut self, handle: RenderHandle, index: u32, local_position: Vec3, scale: f32);

    /// Sets the colour of one instance.
    fn set_instance_color(&mut self, handle: RenderHandle, index: u32, rgb: [f32; 3]);

    /// Moves the whole batch.
    fn set_batch_translation(&mut self, handle: RenderHandle, position: Vec3);
}

/// Rigid-body world with one box collider per body.
///
/// Getters on unknown bodies return zero vectors; setters ignore them.
pub trait PhysicsWorld {
    /// Creates a dynamic body at `position`.
    fn create_body(&mut self, position: Vec3) -> BodyHandle;

    /// Destroys a body and its collider.
    fn remove_body(&mut self, body: BodyHandle);

    /// Replaces the body's collider with a box.
    fn set_box_collider(&mut self, body: BodyHandle, half_extents: Vec3, offset: Vec3);

    /// Prevents the body from rotating.
    fn lock_rotations(&mut self, body: BodyHandle);

    /// Current linear velocity.
    fn linear_velocity(&self, body: BodyHandle) -> Vec3;

    /// Sets the linear velocity.
    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec3);

    /// Sets the angular velocity.
    fn set_angular_velocity(&mut self, body: BodyHandle, velocity: Vec3);

    /// Current translation.
    fn translation(&self, body: BodyHandle) -> Vec3;

    /// Teleports the body.
    fn set_translation(&mut self, body: BodyHandle, position: Vec3);

    /// Wakes a sleeping body.
    fn wake(&mut self, body: BodyHandle);

    /// Advances the world by `dt` seconds.
    fn step(&mut self, dt: f32);
}

/// Recorded state of one instance in a [`HeadlessScene`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceRecord {
    /// Local position.
    pub position: Vec3,
    /// Uniform scale; zero means hidden.
    pub scale: f32,
    /// Colour.
    pub color: [f32; 3],
}

impl Default for InstanceRecord {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: 0.0,
            color: [1.0; 3],
        }
    }
}

/// Recorded state of one batch in a [`HeadlessScene`].
#[derive(Debug, Clone, Default)]
pub struct HeadlessBatch {
    /// Batch translation.
    pub translation: Vec3,
    /// Per-instance state.
    pub instances: Vec<InstanceRecord>,
}

impl HeadlessBatch {
    /// Instances with non-zero scale.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.instances.iter().filter(|i| i.scale > 0.0).count()
    }
}

/// Scene backend that just records what it is told.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    batches: AHashMap<RenderHandle, HeadlessBatch>,
    next_id: u32,
}

impl HeadlessScene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a batch.
    #[must_use]
    pub fn batch(&self, handle: RenderHandle) -> Option<&HeadlessBatch> {
        self.batches.get(&handle)
    }

    /// Number of live batches.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    fn instance_mut(&mut self, handle: RenderHandle, index: u32) -> Option<&mut InstanceRecord> {
        self.batches
            .get_mut(&handle)
            .and_then(|b| b.instances.get_mut(index as usize))
    }
}

impl SceneBackend for HeadlessScene {
    fn create_batch(&mut self, instance_count: usize) -> RenderHandle {
        let handle = RenderHandle::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.batches.insert(
            handle,
            HeadlessBatch {
                translation: Vec3::ZERO,
                instances: vec![InstanceRecord::default(); instance_count],
            },
        );
        handle
    }

    fn remove_batch(&mut self, handle: RenderHandle) {
        self.batches.remove(&handle);
    }

    fn set_instance(&mut self, handle: RenderHandle, index: u32, local_position: Vec3, scale: f32) {
        if let Some(instance) = self.instance_mut(handle, index) {
            instance.position = local_position;
            instance.scale = scale;
        }
    }

    fn set_instance_color(&mut self, handle: RenderHandle, index: u32, rgb: [f32; 3]) {
        if let Some(instance) = self.instance_mut(handle, index) {
            instance.color = rgb;
        }
    }

    fn set_batch_translation(&mut self, handle: RenderHandle, position: Vec3) {
        if let Some(batch) = self.batches.get_mut(&handle) {
            batch.translation = position;
        }
    }
}

/// Body state in a [`KinematicWorld`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicBody {
    /// Translation.
    pub translation: Vec3,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity (recorded only; bodies never rotate).
    pub angular_velocity: Vec3,
    /// Collider half extents.
    pub half_extents: Vec3,
    /// Collider offset from the translation.
    pub offset: Vec3,
    /// Rotation lock flag.
    pub rotations_locked: bool,
    /// Asleep bodies are not integrated.
    pub sleeping: bool,
}

/// Velocities below this let a grounded body fall asleep.
const SLEEP_SPEED: f32 = 1e-3;

/// Minimal physics: gravity, linear motion and a ground plane under each
/// body's box collider. Bodies do not collide with each other.
#[derive(Debug)]
pub struct KinematicWorld {
    bodies: AHashMap<BodyHandle, KinematicBody>,
    next_id: u32,
    gravity: f32,
    ground: f32,
}

impl Default for KinematicWorld {
    fn default() -> Self {
        Self::new(9.8, 0.0)
    }
}

impl KinematicWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new(gravity: f32, ground: f32) -> Self {
        Self {
            bodies: AHashMap::new(),
            next_id: 0,
            gravity,
            ground,
        }
    }

    /// Looks up a body.
    #[must_use]
    pub fn body(&self, body: BodyHandle) -> Option<&KinematicBody> {
        self.bodies.get(&body)
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Ground plane height.
    #[must_use]
    pub const fn ground(&self) -> f32 {
        self.ground
    }
}

impl PhysicsWorld for KinematicWorld {
    fn create_body(&mut self, position: Vec3) -> BodyHandle {
        let handle = BodyHandle::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.bodies.insert(
            handle,
            KinematicBody {
                translation: position,
                linear_velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                half_extents: Vec3::ZERO,
                offset: Vec3::ZERO,
                rotations_locked: false,
                sleeping: false,
            },
        );
        handle
    }

    fn remove_body(&mut self, body: BodyHandle) {
        self.bodies.remove(&body);
    }

    fn set_box_collider(&mut self, body: BodyHandle, half_extents: Vec3, offset: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.half_extents = half_extents;
            b.offset = offset;
        }
    }

    fn lock_rotations(&mut self, body: BodyHandle) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.rotations_locked = true;
            b.angular_velocity = Vec3::ZERO;
        }
    }

    fn linear_velocity(&self, body: BodyHandle) -> Vec3 {
        self.bodies.get(&body).map_or(Vec3::ZERO, |b| b.linear_velocity)
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.linear_velocity = velocity;
            if velocity.length_squared() > SLEEP_SPEED * SLEEP_SPEED {
                b.sleeping = false;
            }
        }
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            if !b.rotations_locked {
                b.angular_velocity = velocity;
            }
        }
    }

    fn translation(&self, body: BodyHandle) -> Vec3 {
        self.bodies.get(&body).map_or(Vec3::ZERO, |b| b.translation)
    }

    fn set_translation(&mut self, body: BodyHandle, position: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.translation = position;
        }
    }

    fn wake(&mut self, body: BodyHandle) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.sleeping = false;
        }
    }

    fn step(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            if body.sleeping {
                continue;
            }
            body.linear_velocity.y -= self.gravity * dt;
            body.translation += body.linear_velocity * dt;

            let bottom = body.translation.y + body.offset.y - body.half_extents.y;
            if bottom <= self.ground {
                body.translation.y += self.ground - bottom;
                if body.linear_velocity.y < 0.0 {
                    body.linear_velocity.y = 0.0;
                }
                if body.linear_velocity.length_squared() < SLEEP_SPEED * SLEEP_SPEED {
                    body.sleeping = true;
                }
            }
        }
        trace!("Kinematic step over {} bodies", self.bodies.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_scene_records_instances() {
        let mut scene = HeadlessScene::new();
        let h = scene.create_batch(3);
        scene.set_instance(h, 1, Vec3::ONE, 1.0);
        scene.set_instance_color(h, 1, [0.5, 0.5, 0.5]);
        scene.set_instance(h, 7, Vec3::ONE, 1.0);
        scene.set_batch_translation(h, Vec3::X);

        let batch = scene.batch(h).expect("batch");
        assert_eq!(batch.visible_count(), 1);
        assert_eq!(batch.instances[1].color, [0.5, 0.5, 0.5]);
        assert_eq!(batch.translation, Vec3::X);

        scene.remove_batch(h);
        assert_eq!(scene.batch_count(), 0);
    }

    #[test]
    fn test_body_falls_to_ground() {
        let mut world = KinematicWorld::default();
        let b = world.create_body(Vec3::new(0.0, 5.0, 0.0));
        world.set_box_collider(b, Vec3::splat(1.0), Vec3::ZERO);
        for _ in 0..300 {
            world.step(1.0 / 60.0);
        }
        assert!((world.translation(b).y - 1.0).abs() < 1e-4);
        assert!(world.body(b).expect("body").sleeping);

        world.wake(b);
        assert!(!world.body(b).expect("body").sleeping);
    }

    #[test]
    fn test_collider_offset_shifts_rest_height() {
        let mut world = KinematicWorld::default();
        let b = world.create_body(Vec3::new(0.0, 3.0, 0.0));
        world.set_box_collider(b, Vec3::splat(0.5), Vec3::new(0.0, 1.0, 0.0));
        for _ in 0..300 {
            world.step(1.0 / 60.0);
        }
        assert!((world.translation(b).y + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_locked_rotations_ignore_spin() {
        let mut world = KinematicWorld::default();
        let b = world.create_body(Vec3::ZERO);
        world.lock_rotations(b);
        world.set_angular_velocity(b, Vec3::ONE);
        assert_eq!(world.body(b).expect("body").angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_unknown_body_is_harmless() {
        let mut world = KinematicWorld::default();
        let ghost = BodyHandle::new(42);
        world.set_linear_velocity(ghost, Vec3::ONE);
        assert_eq!(world.linear_velocity(ghost), Vec3::ZERO);
        assert_eq!(world.translation(ghost), Vec3::ZERO);
    }

    #[test]
    fn test_moving_body_stays_awake_on_ground() {
        let mut world = KinematicWorld::default();
        let b = world.create_body(Vec3::new(0.0, 0.5, 0.0));
        world.set_box_collider(b, Vec3::splat(0.5), Vec3::ZERO);
        world.set_linear_velocity(b, Vec3::new(2.0, 0.0, 0.0));
        for _ in 0..60 {
            world.step(1.0 / 60.0);
        }
        let t = world.translation(b);
        assert!((t.x - 2.0).abs() < 1e-3);
        assert!((t.y - 0.5).abs() < 1e-4);
    }
}
