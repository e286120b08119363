//! Per-tick simulation events.
//!
//! Events emitted during a tick accumulate in the queue; the transport (or
//! any other observer) drains it exactly once per tick boundary and sees a
//! complete, consistent batch. Debug visibility is a `trace!` on emit, not
//! logic baked into any consumer.

use log::trace;

use crate::game::GamePhase;
use crate::physics::BodyId;
use crate::player::PlayerId;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    AddPlayer { player: PlayerId },
    RemovePlayer { player: PlayerId },
    PlayerIdleChange { player: PlayerId },
    PlayerSetShip { player: PlayerId, ship_index: usize },
    PlayerSpawn { player: PlayerId },
    PlayerDespawn { player: PlayerId },
    SetHost { player: PlayerId },
    RemoveHost,
    SettingsChange,
    PhaseChange { phase: GamePhase },
    SetMap { map_index: usize },
    AddBullet { bullet: BodyId, owner: Option<PlayerId> },
    RemoveBullet { bullet: BodyId },
    DealDamage {
        target: PlayerId,
        attacker: Option<PlayerId>,
        amount: f32,
    },
    PlayerKill { killer: PlayerId, victim: PlayerId },
    ReloadStart { player: PlayerId },
    ReloadEnd { player: PlayerId },
}

/// Collects one tick's events for a single drain.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: GameEvent) {
        trace!("event: {:?}", event);
        self.events.push(event);
    }

    /// Takes every queued event, leaving the queue empty for the next tick.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = EventQueue::new();
        queue.emit(GameEvent::AddPlayer { player: 1 });
        queue.emit(GameEvent::PlayerSpawn { player: 1 });

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_events_keep_emission_order() {
        let mut queue = EventQueue::new();
        queue.emit(GameEvent::AddBullet {
            bullet: 10,
            owner: Some(1),
        });
        queue.emit(GameEvent::RemoveBullet { bullet: 10 });

        let drained = queue.drain();
        assert_eq!(
            drained[0],
            GameEvent::AddBullet {
                bullet: 10,
                owner: Some(1)
            }
        );
        assert_eq!(drained[1], GameEvent::RemoveBullet { bullet: 10 });
    }
}
