//! End-to-end frames through the arcade session.

use glam::Vec3;
use shard_gameplay::{
    Archetype, ArcadeSession, Difficulty, FrameInput, GameEvent, SessionConfig, VoxelTemplate,
};
use shard_kernel::AmbientConfig;

const DT: f32 = 1.0 / 60.0;

fn config() -> SessionConfig {
    SessionConfig {
        ambient: AmbientConfig {
            side: 16,
            activation_chance: 1.0,
            ..AmbientConfig::default()
        },
        difficulty: Difficulty {
            spawn_interval: 1000.0,
            ..Difficulty::default()
        },
        ..SessionConfig::default()
    }
}

#[test]
fn test_shot_breaks_enemy_into_debris_and_wakes_field() {
    let mut session = ArcadeSession::headless(config()).expect("session");
    let target = Vec3::new(0.0, 1.6, 15.0);
    let id = session
        .enemies_mut()
        .spawn_template(&VoxelTemplate::solid(6), Archetype::Blob, target)
        .expect("spawn");

    let first = session.tick(DT, &FrameInput { fire: Some(Vec3::Z) });
    assert!(first.fired);

    let mut hit_frame = None;
    for _ in 0..30 {
        let report = session.tick(DT, &FrameInput::default());
        if report.voxels_destroyed > 0 {
            hit_frame = Some(report);
            break;
        }
    }
    let report = hit_frame.expect("projectile should hit within half a second");
    assert_eq!(report.impacts.len(), 1);
    assert_eq!(report.impacts[0].enemy, id);
    assert!(session.pool().live_debris() > 0);
    assert!(session.pool().active_sparks() > 0);

    // The explosion was staged during this frame's projectile pass and
    // promoted at the end of the field tick, so nothing is active yet.
    assert_eq!(report.ambient.active, 0);
    let next = session.tick(DT, &FrameInput::default());
    assert_eq!(next.ambient.active, 256);

    let events = session.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::VoxelsDestroyed { enemy, .. } if *enemy == id)));
}

#[test]
fn test_enemy_walks_in_and_despawns() {
    let mut config = config();
    config.difficulty.enemy_speed = 20.0;
    let mut session = ArcadeSession::headless(config).expect("session");
    let id = session
        .enemies_mut()
        .spawn_template(&VoxelTemplate::solid(2), Archetype::Walker, Vec3::new(10.0, 0.5, 0.0))
        .expect("spawn");

    let mut reached = 0;
    for _ in 0..120 {
        reached += session.tick(DT, &FrameInput::default()).enemies_reached_origin;
    }
    assert_eq!(reached, 1);
    assert!(session.enemies().is_empty());
    assert!(session
        .drain_events()
        .contains(&GameEvent::EnemyReachedOrigin { enemy: id }));
}

#[test]
fn test_cooldown_limits_fire_rate() {
    let mut session = ArcadeSession::headless(config()).expect("session");
    let mut fired = 0;
    for _ in 0..60 {
        if session.tick(DT, &FrameInput { fire: Some(Vec3::X) }).fired {
            fired += 1;
        }
    }
    // One second at a 0.12 s cooldown.
    assert!((8..=9).contains(&fired), "fired = {fired}");
}
