//! Deterministic arena-shooter simulation shared by server and client.
//!
//! Both peers run the exact same update path out of this crate: the server
//! as the authority, each client as a predictor. That shared code is the
//! correctness anchor of the whole netcode scheme, since reconciliation only
//! has to correct for divergent *inputs*, never divergent *rules*.
//!
//! Nothing in here does I/O, reads a clock, or rolls dice. Given the same
//! players, inputs, and tick count, two fresh [`game::GameSimulation`]s
//! produce bit-identical state.

pub mod bullet;
pub mod events;
pub mod game;
pub mod map;
pub mod math;
pub mod physics;
pub mod player;
pub mod protocol;
pub mod ship;

pub use bullet::{Bullet, BulletPool, BulletSpawn, BULLET_ID_BASE};
pub use events::{EventQueue, GameEvent};
pub use game::{
    GameError, GameOptions, GamePhase, GameSettings, GameSimulation, RESPAWN_TIMEOUT_MS,
    SPAWN_INVINCIBILITY_MS, TICKS_PER_SECOND, TICK_MS,
};
pub use map::{map_catalog, GameMap};
pub use math::{forgiving_equal, radian_difference, tick_down, Vector2, FORGIVING_TOLERANCE};
pub use physics::{BodyId, CollisionFilter, PhysicsBody, PhysicsWorld, RectWall, SegmentWall};
pub use player::{
    sanitize_name, Player, PlayerId, PlayerInputs, PlayerScore, PositionState,
    MAX_POSITION_STATES,
};
pub use protocol::{
    snapshot_players, NetInputs, Packet, PlayerSnapshot, StateDelta, PROTOCOL_VERSION,
};
pub use ship::{ship_classes, Ship, ShipClass, ShipStats, ShipStatsPatch};
