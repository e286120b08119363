//! Wire protocol shared by server and client.
//!
//! Packets are bincode-encoded. The transport owns byte layout; the
//! contract that matters here is semantic: every position-bearing packet is
//! tagged with the simulation tick it was captured at, so receivers can
//! discard stale or reordered data instead of rewinding entities.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::game::{GamePhase, GameSimulation};
use crate::player::{PlayerId, PlayerInputs};

pub const PROTOCOL_VERSION: u32 = 1;

/// Input state as sent over the wire, one-to-one with [`PlayerInputs`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NetInputs {
    pub movement_angle: f32,
    pub movement_amount: f32,
    pub aim_rotation: f32,
    pub use_weapon: bool,
    pub use_tactical: bool,
    pub do_reload: bool,
    pub spawn: bool,
}

impl From<NetInputs> for PlayerInputs {
    fn from(net: NetInputs) -> Self {
        Self {
            movement_angle: net.movement_angle,
            movement_amount: net.movement_amount,
            aim_rotation: net.aim_rotation,
            use_weapon: net.use_weapon,
            use_tactical: net.use_tactical,
            do_reload: net.do_reload,
            spawn: net.spawn,
        }
    }
}

impl From<PlayerInputs> for NetInputs {
    fn from(inputs: PlayerInputs) -> Self {
        Self {
            movement_angle: inputs.movement_angle,
            movement_amount: inputs.movement_amount,
            aim_rotation: inputs.aim_rotation,
            use_weapon: inputs.use_weapon,
            use_tactical: inputs.use_tactical,
            do_reload: inputs.do_reload,
            spawn: inputs.spawn,
        }
    }
}

/// One player's authoritative state at a given tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub rotation: f32,
    pub health: f32,
    pub weapon_ammo: u32,
    pub spawned: bool,
}

/// Captures a snapshot for every player in the simulation.
pub fn snapshot_players(game: &GameSimulation) -> Vec<PlayerSnapshot> {
    game.players
        .values()
        .filter_map(|player| {
            let body = game.physics.body(player.ship.body)?;
            Some(PlayerSnapshot {
                id: player.id,
                x: body.position.x,
                y: body.position.y,
                vx: body.velocity.x,
                vy: body.velocity.y,
                rotation: player.ship.rotation,
                health: player.ship.health,
                weapon_ammo: player.ship.weapon_ammo,
                spawned: player.spawned,
            })
        })
        .collect()
}

/// Discrete state changes streamed alongside snapshots.
///
/// Bullet spawns are the one delta filtered per recipient: the shooter
/// predicted its own shot locally and must not receive an echo of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StateDelta {
    PlayerJoined {
        id: PlayerId,
        name: String,
        ship_index: u32,
    },
    PlayerLeft {
        id: PlayerId,
    },
    PlayerShip {
        id: PlayerId,
        ship_index: u32,
    },
    PlayerSpawned {
        id: PlayerId,
    },
    PlayerDespawned {
        id: PlayerId,
    },
    BulletSpawned {
        owner: Option<PlayerId>,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        radius: f32,
    },
    DamageDealt {
        target: PlayerId,
        attacker: Option<PlayerId>,
        amount: f32,
    },
    PlayerKilled {
        killer: PlayerId,
        victim: PlayerId,
    },
    ScoreUpdate {
        id: PlayerId,
        kills: u32,
        assists: u32,
        deaths: u32,
    },
    PhaseChanged {
        phase: GamePhase,
        countdown: u32,
    },
    MapChanged {
        index: u32,
    },
    HostChanged {
        id: Option<PlayerId>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    Connected {
        client_id: PlayerId,
        map_index: u32,
        tick: u64,
    },
    Disconnect,
    Disconnected {
        reason: String,
    },
    Input {
        sequence: u32,
        timestamp: u64,
        /// Client-measured round trip, fed into lag compensation.
        ping_ms: f32,
        inputs: NetInputs,
    },
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
    Snapshot {
        tick: u64,
        last_processed_input: HashMap<PlayerId, u32>,
        players: Vec<PlayerSnapshot>,
    },
    Deltas {
        tick: u64,
        deltas: Vec<StateDelta>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameOptions;

    #[test]
    fn test_packet_roundtrip_input() {
        let packet = Packet::Input {
            sequence: 42,
            timestamp: 123456789,
            ping_ms: 80.0,
            inputs: NetInputs {
                movement_angle: 1.5,
                movement_amount: 1.0,
                aim_rotation: -0.5,
                use_weapon: true,
                use_tactical: false,
                do_reload: false,
                spawn: true,
            },
        };

        let bytes = bincode::serialize(&packet).expect("serialize");
        let decoded: Packet = bincode::deserialize(&bytes).expect("deserialize");
        match decoded {
            Packet::Input {
                sequence,
                ping_ms,
                inputs,
                ..
            } => {
                assert_eq!(sequence, 42);
                assert_eq!(ping_ms, 80.0);
                assert!(inputs.use_weapon);
                assert!(inputs.spawn);
            }
            _ => panic!("wrong packet variant after roundtrip"),
        }
    }

    #[test]
    fn test_packet_roundtrip_snapshot() {
        let mut last_processed = HashMap::new();
        last_processed.insert(1, 10);
        let packet = Packet::Snapshot {
            tick: 99,
            last_processed_input: last_processed,
            players: vec![PlayerSnapshot {
                id: 1,
                x: 10.0,
                y: 20.0,
                vx: 1.0,
                vy: -1.0,
                rotation: 0.5,
                health: 80.0,
                weapon_ammo: 12,
                spawned: true,
            }],
        };

        let bytes = bincode::serialize(&packet).expect("serialize");
        let decoded: Packet = bincode::deserialize(&bytes).expect("deserialize");
        match decoded {
            Packet::Snapshot { tick, players, .. } => {
                assert_eq!(tick, 99);
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].x, 10.0);
                assert!(players[0].spawned);
            }
            _ => panic!("wrong packet variant after roundtrip"),
        }
    }

    #[test]
    fn test_inputs_wire_conversion_roundtrip() {
        let inputs = PlayerInputs {
            movement_angle: 0.3,
            movement_amount: 0.7,
            aim_rotation: 2.0,
            use_weapon: true,
            use_tactical: true,
            do_reload: false,
            spawn: false,
        };
        let roundtripped: PlayerInputs = PlayerInputs::from(NetInputs::from(inputs));
        assert_eq!(roundtripped, inputs);
    }

    #[test]
    fn test_snapshot_players_reflects_simulation() {
        let mut game = GameSimulation::new(GameOptions::authoritative());
        game.add_player(1, "one").expect("add");
        game.spawn_player(1).expect("spawn");

        let snaps = snapshot_players(&game);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].id, 1);
        assert!(snaps[0].spawned);
        assert_eq!(snaps[0].health, game.players[&1].ship.health);
    }

    #[test]
    fn test_malformed_packet_rejected() {
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: "pilot".to_string(),
        };
        let bytes = bincode::serialize(&packet).expect("serialize");

        let truncated: Result<Packet, _> = bincode::deserialize(&bytes[..bytes.len() / 2]);
        assert!(truncated.is_err());

        let empty: Result<Packet, _> = bincode::deserialize(&[]);
        assert!(empty.is_err());
    }
}
