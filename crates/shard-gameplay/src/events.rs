//! Event bus for score and UI consumers.

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use shard_common::EnemyId;

use crate::template::Archetype;

/// Events published by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Enemy spawned
    EnemySpawned {
        /// Enemy ID
        enemy: EnemyId,
        /// Body plan
        archetype: Archetype,
        /// Starting voxel count
        voxels: u32,
    },
    /// Voxels were knocked off a surviving enemy
    VoxelsDestroyed {
        /// Enemy ID
        enemy: EnemyId,
        /// Voxels removed by the hit and the connectivity cascade
        count: u32,
    },
    /// Enemy lost its last voxel
    EnemyDestroyed {
        /// Enemy ID
        enemy: EnemyId,
        /// Voxels removed by the final hit
        count: u32,
    },
    /// Enemy got within the despawn distance of the origin
    EnemyReachedOrigin {
        /// Enemy ID
        enemy: EnemyId,
    },
    /// A projectile left the muzzle
    ProjectileFired {
        /// Spawn position
        origin: Vec3,
        /// Unit direction
        direction: Vec3,
    },
}

/// Bounded event bus. Cloning yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<GameEvent>,
    /// Receiver for collecting events
    receiver: Receiver<GameEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Publishes an event. Dropped if the bus is full.
    pub fn publish(&self, event: GameEvent) {
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<GameEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        let enemy = EnemyId::from_raw(3);
        bus.publish(GameEvent::EnemyReachedOrigin { enemy });
        bus.publish(GameEvent::VoxelsDestroyed { enemy, count: 4 });
        assert_eq!(bus.pending_count(), 2);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], GameEvent::VoxelsDestroyed { enemy, count: 4 });
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops() {
        let bus = EventBus::new(2);
        for _ in 0..5 {
            bus.publish(GameEvent::EnemyReachedOrigin {
                enemy: EnemyId::NULL,
            });
        }
        assert_eq!(bus.drain().len(), 2);
    }

    #[test]
    fn test_clones_share_channel() {
        let bus = EventBus::new(4);
        let other = bus.clone();
        other.publish(GameEvent::EnemyDestroyed {
            enemy: EnemyId::from_raw(1),
            count: 9,
        });
        assert_eq!(bus.drain().len(), 1);
    }
}
