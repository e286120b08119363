//! Merging authoritative server state into the locally-predicted simulation.
//!
//! The local player is special: the client already simulated its movement,
//! so a server update that merely confirms the prediction must change
//! nothing, or every packet would visibly stutter the ship. Corrections
//! only land when prediction and authority actually disagree beyond
//! tolerance. Remote players have no local prediction and take server state
//! directly, guarded against out-of-order packets.

use std::collections::HashMap;

use log::{debug, info};
use shared::math::tick_down;
use shared::protocol::{PlayerSnapshot, StateDelta};
use shared::{
    forgiving_equal, BulletSpawn, GameSimulation, PlayerId, FORGIVING_TOLERANCE,
    RESPAWN_TIMEOUT_MS, TICK_MS,
};

pub struct Reconciler {
    /// Last tick whose movement data was applied, per remote player.
    last_movement_ticks: HashMap<PlayerId, u64>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            last_movement_ticks: HashMap::new(),
        }
    }

    pub fn forget(&mut self, id: PlayerId) {
        self.last_movement_ticks.remove(&id);
    }

    /// Applies one authoritative snapshot. Movement for the local player
    /// goes through tolerance reconciliation; everyone else is applied
    /// directly with stale-tick rejection.
    pub fn apply_snapshot(
        &mut self,
        game: &mut GameSimulation,
        local_id: Option<PlayerId>,
        tick: u64,
        players: &[PlayerSnapshot],
    ) {
        for snap in players {
            apply_status_fields(game, snap);

            if Some(snap.id) == local_id {
                reconcile_local_movement(game, snap);
            } else {
                self.apply_remote_movement(game, tick, snap);
            }
        }
    }

    fn apply_remote_movement(
        &mut self,
        game: &mut GameSimulation,
        tick: u64,
        snap: &PlayerSnapshot,
    ) {
        // Out-of-order delivery must never rewind a remote player.
        let last = self.last_movement_ticks.get(&snap.id).copied().unwrap_or(0);
        if tick <= last {
            debug!("stale movement for player {} (tick {} <= {})", snap.id, tick, last);
            return;
        }

        let Some(player) = game.players.get_mut(&snap.id) else {
            return;
        };
        player.ship.rotation = snap.rotation;
        player.ship.target_rotation = snap.rotation;
        let body_id = player.ship.body;
        if let Some(body) = game.physics.body_mut(body_id) {
            body.position.set(snap.x, snap.y);
            body.velocity.set(snap.vx, snap.vy);
        }
        self.last_movement_ticks.insert(snap.id, tick);
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Health, ammo, and spawn state are server-owned on every player,
/// including the local one; the client never predicts damage.
fn apply_status_fields(game: &mut GameSimulation, snap: &PlayerSnapshot) {
    let Some(player) = game.players.get_mut(&snap.id) else {
        return;
    };
    player.ship.health = snap.health;
    player.ship.weapon_ammo = snap.weapon_ammo;

    if player.spawned != snap.spawned {
        player.spawned = snap.spawned;
        let body_id = player.ship.body;
        if let Some(body) = game.physics.body_mut(body_id) {
            body.collision.enabled = snap.spawned;
        }
    }
}

/// Tolerance-based correction for the player this client controls.
fn reconcile_local_movement(game: &mut GameSimulation, snap: &PlayerSnapshot) {
    let Some(player) = game.players.get(&snap.id) else {
        return;
    };

    // The server's report describes the past: it left the server one
    // round trip ago. Compare against what we predicted back then.
    let lookback = player.ping_ms / TICK_MS;
    let Some(historical) = player.lookback_state(lookback) else {
        // No prediction history yet (just joined); adopt server state.
        let body_id = player.ship.body;
        if let Some(body) = game.physics.body_mut(body_id) {
            body.position.set(snap.x, snap.y);
            body.velocity.set(snap.vx, snap.vy);
        }
        return;
    };

    let predicted_x = historical.x + historical.vx;
    let predicted_y = historical.y + historical.vy;

    if forgiving_equal(predicted_x, snap.x, FORGIVING_TOLERANCE)
        && forgiving_equal(predicted_y, snap.y, FORGIVING_TOLERANCE)
    {
        // Prediction confirmed: discard the correction so the ship keeps
        // moving smoothly.
        return;
    }

    debug!(
        "correction for player {}: predicted ({:.1}, {:.1}) server ({:.1}, {:.1})",
        snap.id, predicted_x, predicted_y, snap.x, snap.y
    );

    // Snap to the authoritative position, backed off by one tick of the
    // current velocity: the next integration step re-adds it, landing the
    // ship on the server position instead of one tick past it.
    let body_id = player.ship.body;
    if let Some(body) = game.physics.body_mut(body_id) {
        let (vx, vy) = (body.velocity.x, body.velocity.y);
        body.position.set(snap.x - vx, snap.y - vy);
    }
}

/// Applies one server delta to the mirrored simulation.
pub fn apply_delta(
    game: &mut GameSimulation,
    reconciler: &mut Reconciler,
    local_id: Option<PlayerId>,
    delta: &StateDelta,
) {
    match delta {
        StateDelta::PlayerJoined {
            id,
            name,
            ship_index,
        } => {
            if !game.players.contains_key(id) {
                if game.add_player(*id, name).is_ok() {
                    game.set_player_ship(*id, *ship_index as usize).ok();
                }
            }
        }
        StateDelta::PlayerLeft { id } => {
            game.remove_player(*id).ok();
            reconciler.forget(*id);
        }
        StateDelta::PlayerShip { id, ship_index } => {
            game.set_player_ship(*id, *ship_index as usize).ok();
        }
        StateDelta::PlayerSpawned { id } => {
            let already = game.players.get(id).map(|p| p.spawned).unwrap_or(true);
            if !already {
                game.spawn_player(*id).ok();
            }
        }
        StateDelta::PlayerDespawned { id } => {
            if let Some(player) = game.players.get_mut(id) {
                player.spawned = false;
                player.spawn_timeout_ms = RESPAWN_TIMEOUT_MS;
                let body_id = player.ship.body;
                if let Some(body) = game.physics.body_mut(body_id) {
                    body.collision.enabled = false;
                    body.velocity.set(0.0, 0.0);
                }
            }
        }
        StateDelta::BulletSpawned {
            owner,
            x,
            y,
            vx,
            vy,
            radius,
        } => {
            // Only remote shots arrive here; our own were predicted and
            // filtered out server-side. Drop any echo that slips through
            // (e.g. right after a reconnect).
            if local_id.is_some() && *owner == local_id {
                return;
            }
            let spawn = BulletSpawn {
                x: *x,
                y: *y,
                vx: *vx,
                vy: *vy,
                radius: *radius,
                damage: 0.0,
                lifespan_ms: 5000.0,
                owner: *owner,
            };
            game.bullets.acquire(&mut game.physics, spawn);
        }
        StateDelta::DamageDealt { target, amount, .. } => {
            if let Some(player) = game.players.get_mut(target) {
                player.ship.health = tick_down(player.ship.health, *amount);
            }
        }
        StateDelta::PlayerKilled { killer, victim } => {
            info!("player {} killed player {}", killer, victim);
        }
        StateDelta::ScoreUpdate {
            id,
            kills,
            assists,
            deaths,
        } => {
            if let Some(player) = game.players.get_mut(id) {
                player.score.kills = *kills;
                player.score.assists = *assists;
                player.score.deaths = *deaths;
            }
        }
        StateDelta::PhaseChanged { phase, countdown } => {
            game.countdown = *countdown;
            game.set_phase(*phase);
        }
        StateDelta::MapChanged { index } => {
            game.set_map(*index as usize);
        }
        StateDelta::HostChanged { id } => {
            game.host = *id;
        }
    }
}
