//! Damage, connectivity and health behaviour of voxel enemies.

use glam::Vec3;
use proptest::prelude::*;
use shard_gameplay::{
    largest_component, local_center, Archetype, EnemyConfig, EnemyShapes, GameEvent,
    HeadlessScene, KinematicWorld, VoxelTemplate,
};

type Shapes = EnemyShapes<HeadlessScene, KinematicWorld>;

fn shapes() -> Shapes {
    EnemyShapes::new(
        EnemyConfig::default(),
        HeadlessScene::new(),
        KinematicWorld::default(),
    )
    .expect("shapes")
}

fn spawn(s: &mut Shapes, template: &VoxelTemplate) {
    s.spawn_template(template, Archetype::Blob, Vec3::new(0.0, 4.0, 0.0))
        .expect("spawned");
}

#[test]
fn test_interior_blast_destroys_exactly_the_ball() {
    let mut s = shapes();
    spawn(&mut s, &VoxelTemplate::solid(7));
    let center = s.world_voxels(0)[171]; // cell (3, 3, 3)
    assert!((center - Vec3::new(0.0, 4.0, 0.0)).length() < 1e-6);

    // Centre plus its six face neighbours at d = 0.5; diagonals sit at 0.71.
    let destroyed = s.apply_damage(0, center, 0.6);
    assert_eq!(destroyed.len(), 7);
    assert_eq!(s.get(0).expect("enemy").health(), 343 - 7);
}

#[test]
fn test_beam_split_keeps_larger_side() {
    let mut s = shapes();
    spawn(&mut s, &VoxelTemplate::beam(10));
    let fifth = s.world_voxels(0)[5];

    let destroyed = s.apply_damage(0, fifth, 0.01);
    assert_eq!(destroyed.len(), 5);

    let enemy = s.get(0).expect("enemy");
    assert_eq!(enemy.health(), 5);
    assert_eq!(enemy.grid().live(), 5);
    // Survivors are the x = 0..5 side.
    for p in s.world_voxels(0) {
        assert!(p.x < fifth.x);
    }
}

#[test]
fn test_equal_split_keeps_first_discovered() {
    let mut s = shapes();
    spawn(&mut s, &VoxelTemplate::beam(9));
    let middle = s.world_voxels(0)[4];

    let destroyed = s.apply_damage(0, middle, 0.01);
    assert_eq!(destroyed.len(), 5);
    let survivors = s.world_voxels(0);
    assert_eq!(survivors.len(), 4);
    assert!(survivors.iter().all(|p| p.x < middle.x));
}

#[test]
fn test_lethal_blast_returns_every_voxel_and_removes_enemy() {
    let mut s = shapes();
    spawn(&mut s, &VoxelTemplate::solid(3));
    let before = s.world_voxels(0);
    let id = s.get(0).expect("enemy").id();

    let destroyed = s.apply_damage(0, Vec3::new(0.0, 4.0, 0.0), 100.0);
    assert_eq!(destroyed.len(), 27);
    for p in &before {
        assert!(destroyed.iter().any(|d| (*d - *p).length() < 1e-6));
    }
    assert!(s.is_empty());
    assert_eq!(s.scene().batch_count(), 0);
    assert_eq!(s.physics().body_count(), 0);
    assert!(s
        .events()
        .drain()
        .contains(&GameEvent::EnemyDestroyed { enemy: id, count: 27 }));
}

#[test]
fn test_zero_radius_between_centres_is_harmless() {
    let mut s = shapes();
    spawn(&mut s, &VoxelTemplate::solid(4));
    s.events().drain();

    let destroyed = s.apply_damage(0, Vec3::new(0.1, 4.05, -0.07), 0.0);
    assert!(destroyed.is_empty());
    assert_eq!(s.get(0).expect("enemy").health(), 64);
    assert!(s.events().drain().is_empty());
}

#[test]
fn test_damage_on_removed_index_is_noop() {
    let mut s = shapes();
    spawn(&mut s, &VoxelTemplate::solid(2));
    s.apply_damage(0, Vec3::new(0.0, 4.0, 0.0), 100.0);
    assert!(s.apply_damage(0, Vec3::new(0.0, 4.0, 0.0), 100.0).is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_voxel_in_radius_is_destroyed(
        offset in (-1.5f32..1.5, -1.5f32..1.5, -1.5f32..1.5),
        radius in 0.0f32..1.0,
    ) {
        let mut s = shapes();
        spawn(&mut s, &VoxelTemplate::solid(6));
        let point = Vec3::new(offset.0, 4.0 + offset.1, offset.2);
        let origin = s.translation(0).expect("translation");
        let local_point = point - origin;
        let pitch = s.config().voxel_pitch;
        let before = s.world_voxels(0);

        // Carve the ball out of a copy of the grid, in the same local frame
        // the enemy uses, then see what the connectivity pass must drop.
        let mut expected = s.get(0).expect("enemy").grid().clone();
        let in_radius: Vec<usize> = expected
            .occupied()
            .map(|(cell, _)| cell)
            .filter(|&cell| {
                local_center(6, pitch, cell).distance_squared(local_point) <= radius * radius
            })
            .collect();
        for &cell in &in_radius {
            expected.clear(cell);
        }
        let components = expected.components();
        let detached = largest_component(&components)
            .map_or(0, |keep| expected.live() - components[keep].len());

        let destroyed = s.apply_damage(0, point, radius);
        for &cell in &in_radius {
            let p = origin + local_center(6, pitch, cell);
            prop_assert!(destroyed.iter().any(|d| (*d - p).length() < 1e-5));
        }

        match s.get(0) {
            Some(enemy) => {
                if components.len() <= 1 {
                    prop_assert_eq!(destroyed.len(), in_radius.len());
                }
                prop_assert_eq!(destroyed.len(), in_radius.len() + detached);
                prop_assert_eq!(enemy.health() as usize, enemy.grid().live());
                prop_assert_eq!(enemy.health() as usize + destroyed.len(), before.len());
                prop_assert_eq!(enemy.grid().components().len(), 1);
            },
            None => {
                prop_assert_eq!(expected.live(), 0);
                prop_assert_eq!(destroyed.len(), before.len());
            },
        }
    }
}
