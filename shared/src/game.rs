//! The authoritative game simulation.
//!
//! One [`GameSimulation`] instance runs on the server and one on each
//! client; both execute the same update path so client prediction stays in
//! lockstep with server truth. Everything in [`GameSimulation::update`] is
//! deterministic: no clocks, no RNG, ordered maps only.

use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_4, PI};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bullet::{swept_impact_time, sweep_hits_rect, sweep_hits_segment, BulletPool, BulletSpawn};
use crate::events::{EventQueue, GameEvent};
use crate::map::{map_catalog, GameMap};
use crate::math::{radian_difference, tick_down};
use crate::physics::{PhysicsBody, PhysicsWorld, RectWall, SegmentWall};
use crate::player::{sanitize_name, Player, PlayerId, PlayerInputs, PositionState};
use crate::ship::{ship_classes, Ship};

/// Nominal simulation rate.
pub const TICKS_PER_SECOND: f32 = 20.0;
/// Milliseconds of simulated time per tick.
pub const TICK_MS: f32 = 1000.0 / TICKS_PER_SECOND;

/// Fixed delay between death and respawn eligibility.
pub const RESPAWN_TIMEOUT_MS: f32 = 3000.0;
/// Damage immunity granted on spawn.
pub const SPAWN_INVINCIBILITY_MS: f32 = 1500.0;

/// Velocity factor applied when clamping a ship back inside the bounds.
const BOUNDS_RESTITUTION: f32 = -0.5;
/// Bullet muzzle offset as a fraction of the ship radius.
const MUZZLE_OFFSET: f32 = 0.25;
/// Tactical thrust as a multiple of the ship's base acceleration.
const TACTICAL_IMPULSE: f32 = 4.0;

/// Bot engagement tuning.
const BOT_SIGHT_RANGE: f32 = 900.0;
const BOT_APPROACH_RANGE: f32 = 250.0;
const BOT_RETREAT_RANGE: f32 = 150.0;
const BOT_FIRE_CONE: f32 = PI / 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Setup,
    Countdown,
    Match,
    Results,
}

/// Per-instance behavior switches. The server runs authoritative options;
/// clients run predicted options so they mirror state without double
/// -resolving outcomes the server owns.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameOptions {
    /// Advance COUNTDOWN to MATCH (and MATCH to RESULTS) automatically.
    pub trigger_phases: bool,
    /// Rewind hit detection by the target's ping.
    pub consider_player_ping: bool,
    /// Auto-assign the first player as host.
    pub assign_host: bool,
    /// Run bot steering.
    pub calculate_bots: bool,
    /// Let bots actually fire.
    pub fire_bot_bullets: bool,
    /// Apply damage and kills from bullet hits. Off on clients: bullets
    /// still fly and die locally, but health changes come from the server.
    pub resolve_hits: bool,
}

impl GameOptions {
    pub fn authoritative() -> Self {
        Self {
            trigger_phases: true,
            consider_player_ping: true,
            assign_host: true,
            calculate_bots: true,
            fire_bot_bullets: true,
            resolve_hits: true,
        }
    }

    /// Client-side mirror: phases, hosts, hits all driven by the server.
    pub fn predicted() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameSettings {
    pub use_teams: bool,
    /// Kill count that ends the match; 0 means unlimited.
    pub max_kills: u32,
    pub friendly_fire: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            use_teams: false,
            max_kills: 25,
            friendly_fire: false,
        }
    }
}

/// Caller bugs, not runtime conditions: these fail fast.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("player id {0} is already registered")]
    PlayerIdTaken(PlayerId),
    #[error("player id {0} falls in the reserved bullet id range")]
    PlayerIdReserved(PlayerId),
    #[error("unknown player id {0}")]
    UnknownPlayer(PlayerId),
    #[error("unknown ship class index {0}")]
    UnknownShipClass(usize),
}

pub struct GameSimulation {
    pub options: GameOptions,
    pub settings: GameSettings,
    pub physics: PhysicsWorld,
    pub players: BTreeMap<PlayerId, Player>,
    pub bullets: BulletPool,
    pub events: EventQueue,
    pub host: Option<PlayerId>,
    pub phase: GamePhase,
    /// Ticks left in the countdown phase.
    pub countdown: u32,
    pub tick_number: u64,
    map_index: usize,
    registered_rect_walls: Vec<u32>,
    registered_seg_walls: Vec<u32>,
}

impl GameSimulation {
    pub fn new(options: GameOptions) -> Self {
        let mut game = Self {
            options,
            settings: GameSettings::default(),
            physics: PhysicsWorld::new(TICKS_PER_SECOND),
            players: BTreeMap::new(),
            bullets: BulletPool::new(),
            events: EventQueue::new(),
            host: None,
            phase: GamePhase::Setup,
            countdown: 0,
            tick_number: 0,
            map_index: usize::MAX,
            registered_rect_walls: Vec::new(),
            registered_seg_walls: Vec::new(),
        };
        game.set_map(0);
        game
    }

    pub fn map_index(&self) -> usize {
        self.map_index
    }

    pub fn map(&self) -> &'static GameMap {
        &map_catalog()[self.map_index]
    }

    /// Swaps the active map, tearing down the previous map's geometry.
    pub fn set_map(&mut self, index: usize) {
        let catalog = map_catalog();
        let index = index.min(catalog.len() - 1);
        if index == self.map_index {
            return;
        }

        for id in self.registered_rect_walls.drain(..) {
            self.physics.remove_rect_wall(id);
        }
        for id in self.registered_seg_walls.drain(..) {
            self.physics.remove_seg_wall(id);
        }

        let map = &catalog[index];
        for (i, rect) in map.rect_walls.iter().enumerate() {
            let id = i as u32 + 1;
            self.physics.add_rect_wall(RectWall {
                id,
                min_x: rect.min_x,
                min_y: rect.min_y,
                max_x: rect.max_x,
                max_y: rect.max_y,
            });
            self.registered_rect_walls.push(id);
        }
        for (i, seg) in map.seg_walls.iter().enumerate() {
            let id = i as u32 + 1;
            self.physics.add_seg_wall(SegmentWall {
                id,
                x1: seg.x1,
                y1: seg.y1,
                x2: seg.x2,
                y2: seg.y2,
            });
            self.registered_seg_walls.push(id);
        }

        self.map_index = index;
        self.events.emit(GameEvent::SetMap { map_index: index });
    }

    /// Registers a player with the default ship class. The ship's physics
    /// body is created immediately but stays collision-disabled until spawn.
    pub fn add_player(&mut self, id: PlayerId, name: &str) -> Result<&mut Player, GameError> {
        if id >= crate::bullet::BULLET_ID_BASE {
            return Err(GameError::PlayerIdReserved(id));
        }
        if self.players.contains_key(&id) {
            return Err(GameError::PlayerIdTaken(id));
        }

        let stats = ship_classes()[0].stats;
        let mut body = PhysicsBody::new(id);
        body.mass = 500.0;
        body.radius = 25.0;
        body.air_resistance = 0.1;
        body.collision.enabled = false;
        self.physics.add_body(body);

        let player = Player::new(id, sanitize_name(name), Ship::new(id, stats), 0);
        self.players.insert(id, player);
        self.events.emit(GameEvent::AddPlayer { player: id });
        self.assign_host_if_needed();

        self.players.get_mut(&id).ok_or(GameError::UnknownPlayer(id))
    }

    /// Removes a player and detaches their ship's body from the world.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Player, GameError> {
        let player = self
            .players
            .remove(&id)
            .ok_or(GameError::UnknownPlayer(id))?;
        self.physics.remove_body(player.ship.body);
        self.events.emit(GameEvent::RemovePlayer { player: id });
        if self.host == Some(id) {
            self.host = None;
            self.events.emit(GameEvent::RemoveHost);
        }
        self.assign_host_if_needed();
        Ok(player)
    }

    /// Swaps a player's ship class, keeping the body and its kinematics.
    pub fn set_player_ship(&mut self, id: PlayerId, class_index: usize) -> Result<(), GameError> {
        let classes = ship_classes();
        if class_index >= classes.len() {
            return Err(GameError::UnknownShipClass(class_index));
        }
        let player = self
            .players
            .get_mut(&id)
            .ok_or(GameError::UnknownPlayer(id))?;
        if player.ship_index == class_index {
            return Ok(());
        }

        let rotation = player.ship.rotation;
        let target_rotation = player.ship.target_rotation;
        let mut ship = Ship::new(player.ship.body, classes[class_index].stats);
        ship.rotation = rotation;
        ship.target_rotation = target_rotation;
        player.ship = ship;
        player.ship_index = class_index;

        self.events.emit(GameEvent::PlayerSetShip {
            player: id,
            ship_index: class_index,
        });
        Ok(())
    }

    pub fn set_player_inputs(&mut self, id: PlayerId, inputs: PlayerInputs) {
        // Unknown ids are stale network data; drop them quietly.
        if let Some(player) = self.players.get_mut(&id) {
            player.inputs = inputs;
        }
    }

    pub fn set_player_idle(&mut self, id: PlayerId, idle: bool) {
        if let Some(player) = self.players.get_mut(&id) {
            if player.idle != idle {
                player.idle = idle;
                self.events.emit(GameEvent::PlayerIdleChange { player: id });
            }
        }
    }

    pub fn set_host(&mut self, id: PlayerId) -> Result<(), GameError> {
        if !self.players.contains_key(&id) {
            return Err(GameError::UnknownPlayer(id));
        }
        self.host = Some(id);
        self.events.emit(GameEvent::SetHost { player: id });
        Ok(())
    }

    fn assign_host_if_needed(&mut self) {
        if !self.options.assign_host || self.host.is_some() {
            return;
        }
        if let Some(&id) = self.players.keys().next() {
            self.host = Some(id);
            self.events.emit(GameEvent::SetHost { player: id });
        }
    }

    /// Settings are frozen outside SETUP; late writes are ignored.
    pub fn set_settings(&mut self, settings: GameSettings) {
        if self.phase != GamePhase::Setup {
            debug!("settings change ignored outside setup");
            return;
        }
        if self.settings != settings {
            self.settings = settings;
            self.events.emit(GameEvent::SettingsChange);
        }
    }

    pub fn set_phase(&mut self, phase: GamePhase) {
        self.phase = phase;
        self.events.emit(GameEvent::PhaseChange { phase });
    }

    pub fn begin_countdown(&mut self, ticks: u32) {
        self.countdown = ticks;
        self.set_phase(GamePhase::Countdown);
    }

    /// Places a player at a spawn point with full resources and a fresh
    /// invincibility window. Spawn point choice is a deterministic rotation
    /// so replays stay identical.
    pub fn spawn_player(&mut self, id: PlayerId) -> Result<(), GameError> {
        let map = self.map();
        let player = self
            .players
            .get_mut(&id)
            .ok_or(GameError::UnknownPlayer(id))?;

        let spawn_index = (id as usize + player.score.deaths as usize) % map.spawn_points.len();
        let spawn = map.spawn_points[spawn_index];

        player.ship.health = player.ship.stats.defense.health;
        player.ship.weapon_ammo = player.ship.stats.weapon.capacity;
        player.ship.tactical_ammo = player.ship.stats.tactical.capacity;
        player.ship.timers = Default::default();
        player.ship.timers.invincibility = SPAWN_INVINCIBILITY_MS;
        player.spawned = true;
        player.spawn_timeout_ms = 0.0;

        let body_id = player.ship.body;
        if let Some(body) = self.physics.body_mut(body_id) {
            body.position.set(spawn.x, spawn.y);
            body.velocity.set(0.0, 0.0);
            body.collision.enabled = true;
        }
        self.events.emit(GameEvent::PlayerSpawn { player: id });
        Ok(())
    }

    /// Advances the simulation one tick. The stage order is fixed; changing
    /// it desynchronizes every existing peer.
    pub fn update(&mut self) {
        self.tick_number += 1;

        match self.phase {
            GamePhase::Setup => return,
            GamePhase::Countdown => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 && self.options.trigger_phases {
                    self.set_phase(GamePhase::Match);
                }
            }
            GamePhase::Match | GamePhase::Results => {}
        }

        if self.options.calculate_bots {
            self.steer_bots();
        }
        self.tick_players();
        self.integrate_movement();
        self.physics.update(TICK_MS);
        self.resolve_bullets();
        self.clamp_bounds();
        self.track_positions();
    }

    /// Timers, spawn requests, firing, reloading, tactical, regen, aim.
    fn tick_players(&mut self) {
        let in_match = self.phase == GamePhase::Match;
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();

        for id in ids {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };

            if !player.spawned {
                player.spawn_timeout_ms = tick_down(player.spawn_timeout_ms, TICK_MS);
                if player.inputs.spawn
                    && player.spawn_timeout_ms == 0.0
                    && self.phase != GamePhase::Results
                {
                    self.spawn_player(id).ok();
                }
                continue;
            }

            let was_reloading = player.ship.is_reloading();
            player.ship.timers.tick(TICK_MS);
            if was_reloading && !player.ship.is_reloading() {
                player.ship.weapon_ammo = player.ship.stats.weapon.capacity;
                self.events.emit(GameEvent::ReloadEnd { player: id });
            }

            // Aim eases toward the target; higher accuracy, smaller divisor,
            // snappier convergence.
            player.ship.target_rotation = player.inputs.aim_rotation;
            let divisor = 3.0 + 9.0 * (1.0 - player.ship.stats.aim.accuracy);
            player.ship.rotation +=
                radian_difference(player.ship.rotation, player.ship.target_rotation) / divisor;

            if player.inputs.do_reload && player.ship.can_start_reload() {
                player.ship.timers.weapon_reload = player.ship.stats.weapon.reload_ms;
                self.events.emit(GameEvent::ReloadStart { player: id });
            }

            if in_match && player.inputs.use_weapon {
                if player.ship.weapon_ammo == 0 {
                    if player.ship.can_start_reload() {
                        player.ship.timers.weapon_reload = player.ship.stats.weapon.reload_ms;
                        self.events.emit(GameEvent::ReloadStart { player: id });
                    }
                } else if player.ship.can_fire() {
                    player.ship.weapon_ammo -= 1;
                    player.ship.timers.weapon_rate = player.ship.stats.weapon.rate_ms;
                    let rotation = player.ship.rotation;
                    let stats = player.ship.stats.bullet;
                    let body_id = player.ship.body;

                    if let Some(body) = self.physics.body(body_id) {
                        let offset = body.radius * MUZZLE_OFFSET;
                        let mut spawn = BulletSpawn::aimed(
                            body.position.x + rotation.cos() * offset,
                            body.position.y + rotation.sin() * offset,
                            rotation,
                            stats.speed,
                        );
                        spawn.radius = stats.radius;
                        spawn.damage = stats.damage;
                        spawn.lifespan_ms = stats.lifespan_ms;
                        spawn.owner = Some(id);
                        let bullet = self.bullets.acquire(&mut self.physics, spawn);
                        self.events.emit(GameEvent::AddBullet {
                            bullet,
                            owner: Some(id),
                        });
                    }
                }
            }

            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };

            if in_match && player.inputs.use_tactical && player.ship.can_use_tactical() {
                player.ship.tactical_ammo -= 1;
                player.ship.timers.tactical_rate = player.ship.stats.tactical.rate_ms;
                if player.ship.tactical_ammo == 0 {
                    player.ship.timers.tactical_reload = player.ship.stats.tactical.reload_ms;
                }
                let impulse = player.ship.stats.movement.acceleration * TACTICAL_IMPULSE;
                let rotation = player.ship.rotation;
                let body_id = player.ship.body;
                if let Some(body) = self.physics.body_mut(body_id) {
                    body.velocity.qx += rotation.cos() * impulse;
                    body.velocity.qy += rotation.sin() * impulse;
                }
            }

            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };

            if player.ship.timers.regen_rest == 0.0
                && player.ship.timers.regen_heal == 0.0
                && player.ship.health < player.ship.stats.defense.health
            {
                player.ship.health =
                    (player.ship.health + 1.0).min(player.ship.stats.defense.health);
                player.ship.timers.regen_heal = player.ship.stats.defense.regen_interval_ms;
            }
        }
    }

    /// Applies movement input as queued velocity, agility-modified and
    /// capped so post-drag speed never exceeds the class top speed.
    fn integrate_movement(&mut self) {
        for player in self.players.values() {
            if !player.spawned {
                continue;
            }
            let Some(body) = self.physics.body(player.ship.body) else {
                continue;
            };

            let speed = body.velocity.magnitude();
            let amount = player.inputs.movement_amount.clamp(0.0, 1.0);
            let accel_input = player.ship.stats.movement.acceleration * amount;
            // Cap against the post-drag top speed: drag will multiply by
            // (1 - air_resistance), so allow speed / (1 - r) here.
            let limit = player.ship.stats.movement.speed / (1.0 - body.air_resistance);
            let over = ((speed + accel_input) - limit).max(0.0);
            let capped = accel_input - over;
            if capped <= 0.0 {
                continue;
            }

            let angle_diff =
                radian_difference(player.inputs.movement_angle, player.ship.rotation);
            let agility = player.ship.stats.movement.agility;
            // Quadratic falloff: full control along the aim axis, reduced
            // control off-axis, sharper than linear on purpose.
            let modifier =
                (agility + (1.0 - angle_diff.abs() / PI) * (1.0 - agility)).powi(2);
            let accel = capped * modifier;

            let (angle, body_id) = (player.inputs.movement_angle, player.ship.body);
            if let Some(body) = self.physics.body_mut(body_id) {
                body.velocity.qx += angle.cos() * accel;
                body.velocity.qy += angle.sin() * accel;
            }
        }
    }

    /// Lifespan expiry, wall sweeps, and swept player hits for every live
    /// bullet. Runs after the physics step; each bullet's tested segment is
    /// the displacement it just covered.
    fn resolve_bullets(&mut self) {
        for id in self.bullets.tick_lifespans(TICK_MS) {
            self.bullets.release(&mut self.physics, id);
            self.events.emit(GameEvent::RemoveBullet { bullet: id });
        }

        let bullet_ids = self.bullets.alive_ids();
        let player_ids: Vec<PlayerId> = self.players.keys().copied().collect();

        'bullets: for bullet_id in bullet_ids {
            let Some(body) = self.physics.body(bullet_id) else {
                continue;
            };
            let (bx, by) = (body.position.x, body.position.y);
            let (bvx, bvy) = (body.velocity.x, body.velocity.y);
            let (sx, sy) = (bx - bvx, by - bvy);

            let hit_wall = self
                .physics
                .seg_walls()
                .any(|wall| sweep_hits_segment(sx, sy, bx, by, wall))
                || self
                    .physics
                    .rect_walls()
                    .any(|wall| sweep_hits_rect(sx, sy, bx, by, wall));
            if hit_wall {
                self.bullets.release(&mut self.physics, bullet_id);
                self.events.emit(GameEvent::RemoveBullet { bullet: bullet_id });
                continue;
            }

            let Some(bullet) = self.bullets.get(bullet_id) else {
                continue;
            };
            let (owner, damage, bullet_radius) = (bullet.owner, bullet.damage, bullet.radius);

            for &target_id in &player_ids {
                if owner == Some(target_id) {
                    continue;
                }
                let Some(target) = self.players.get(&target_id) else {
                    continue;
                };
                if !target.spawned || target.ship.timers.invincibility > 0.0 {
                    continue;
                }
                if let Some(owner_id) = owner {
                    if self.settings.use_teams && !self.settings.friendly_fire {
                        if let Some(shooter) = self.players.get(&owner_id) {
                            if shooter.team == target.team {
                                continue;
                            }
                        }
                    }
                }
                let Some(target_body) = self.physics.body(target.ship.body) else {
                    continue;
                };

                // Lag compensation: evaluate the target where the shooter
                // saw it, ping/tick ticks ago.
                let (tx, ty, tvx, tvy) = if self.options.consider_player_ping && !target.bot {
                    match target.lookback_state(target.ping_ms / TICK_MS) {
                        Some(s) => (s.x - s.vx, s.y - s.vy, s.vx, s.vy),
                        None => (
                            target_body.position.x - target_body.velocity.x,
                            target_body.position.y - target_body.velocity.y,
                            target_body.velocity.x,
                            target_body.velocity.y,
                        ),
                    }
                } else {
                    (
                        target_body.position.x - target_body.velocity.x,
                        target_body.position.y - target_body.velocity.y,
                        target_body.velocity.x,
                        target_body.velocity.y,
                    )
                };

                let radius = bullet_radius + target_body.radius;
                let hit = swept_impact_time(sx - tx, sy - ty, bvx - tvx, bvy - tvy, radius);
                if hit.is_some() {
                    self.bullets.release(&mut self.physics, bullet_id);
                    self.events.emit(GameEvent::RemoveBullet { bullet: bullet_id });
                    if self.options.resolve_hits {
                        self.apply_damage(target_id, owner, damage);
                    }
                    continue 'bullets;
                }
            }
        }
    }

    /// Damage with floor-clamped health; exactly zero health is a kill.
    fn apply_damage(&mut self, target_id: PlayerId, attacker: Option<PlayerId>, amount: f32) {
        let Some(target) = self.players.get_mut(&target_id) else {
            return;
        };

        let actual = amount.min(target.ship.health);
        target.ship.health = tick_down(target.ship.health, amount);
        target.ship.timers.regen_rest = target.ship.stats.defense.regen_rest_ms;
        self.events.emit(GameEvent::DealDamage {
            target: target_id,
            attacker,
            amount,
        });

        let killed = target.ship.health == 0.0;
        let target_body = target.ship.body;
        if killed {
            target.score.deaths += 1;
            target.spawned = false;
            target.spawn_timeout_ms = RESPAWN_TIMEOUT_MS;
            if let Some(body) = self.physics.body_mut(target_body) {
                body.collision.enabled = false;
                body.velocity.set(0.0, 0.0);
            }
            self.events.emit(GameEvent::PlayerDespawn { player: target_id });
        }

        let mut match_over = false;
        if let Some(attacker_id) = attacker {
            if let Some(shooter) = self.players.get_mut(&attacker_id) {
                shooter.score.damage += actual;
                if killed {
                    shooter.score.kills += 1;
                    match_over = self.settings.max_kills > 0
                        && shooter.score.kills >= self.settings.max_kills;
                }
            }
            if killed {
                self.events.emit(GameEvent::PlayerKill {
                    killer: attacker_id,
                    victim: target_id,
                });
            }
        }

        if match_over && self.options.trigger_phases && self.phase == GamePhase::Match {
            self.set_phase(GamePhase::Results);
        }
    }

    /// Reflective clamp against the map bounds.
    fn clamp_bounds(&mut self) {
        let bounds = self.map().bounds;
        for player in self.players.values() {
            if !player.spawned {
                continue;
            }
            let Some(body) = self.physics.body_mut(player.ship.body) else {
                continue;
            };

            if body.position.x < bounds.min_x {
                body.position.set(bounds.min_x, body.position.y);
                body.velocity
                    .set(body.velocity.x * BOUNDS_RESTITUTION, body.velocity.y);
            }
            if body.position.x > bounds.max_x {
                body.position.set(bounds.max_x, body.position.y);
                body.velocity
                    .set(body.velocity.x * BOUNDS_RESTITUTION, body.velocity.y);
            }
            if body.position.y < bounds.min_y {
                body.position.set(body.position.x, bounds.min_y);
                body.velocity
                    .set(body.velocity.x, body.velocity.y * BOUNDS_RESTITUTION);
            }
            if body.position.y > bounds.max_y {
                body.position.set(body.position.x, bounds.max_y);
                body.velocity
                    .set(body.velocity.x, body.velocity.y * BOUNDS_RESTITUTION);
            }
        }
    }

    /// Appends this tick's committed kinematics to every player's ring.
    fn track_positions(&mut self) {
        let mut states: Vec<(PlayerId, PositionState)> = Vec::with_capacity(self.players.len());
        for player in self.players.values() {
            if let Some(body) = self.physics.body(player.ship.body) {
                states.push((
                    player.id,
                    PositionState {
                        x: body.position.x,
                        y: body.position.y,
                        vx: body.velocity.x,
                        vy: body.velocity.y,
                        rotation: player.ship.rotation,
                    },
                ));
            }
        }
        for (id, state) in states {
            if let Some(player) = self.players.get_mut(&id) {
                player.track_position_state(state);
            }
        }
    }

    /// Simple pursuit steering for bot players: close in, hold a band,
    /// back off when crowded, fire inside a narrow cone.
    fn steer_bots(&mut self) {
        let targets: Vec<(PlayerId, f32, f32)> = self
            .players
            .values()
            .filter(|p| p.spawned && !p.bot)
            .filter_map(|p| {
                self.physics
                    .body(p.ship.body)
                    .map(|b| (p.id, b.position.x, b.position.y))
            })
            .collect();
        let bot_ids: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.bot)
            .map(|p| p.id)
            .collect();

        for bot_id in bot_ids {
            let Some(bot) = self.players.get(&bot_id) else {
                continue;
            };
            let mut inputs = bot.inputs;
            inputs.spawn = true;

            if !bot.spawned {
                self.set_player_inputs(bot_id, inputs);
                continue;
            }
            let Some(body) = self.physics.body(bot.ship.body) else {
                continue;
            };
            let (bx, by) = (body.position.x, body.position.y);

            let mut nearest: Option<(f32, f32, f32)> = None;
            for &(tid, tx, ty) in &targets {
                if tid == bot_id {
                    continue;
                }
                let (dx, dy) = (tx - bx, ty - by);
                let dist = (dx * dx + dy * dy).sqrt();
                if nearest.map(|(d, _, _)| dist < d).unwrap_or(true) {
                    nearest = Some((dist, dx, dy));
                }
            }

            match nearest {
                None => {
                    inputs.movement_amount = 0.0;
                    inputs.use_weapon = false;
                }
                Some((dist, dx, dy)) => {
                    let angle = dy.atan2(dx);
                    inputs.aim_rotation = angle;
                    let facing = radian_difference(bot.ship.rotation, angle).abs();

                    if dist > BOT_SIGHT_RANGE {
                        inputs.movement_amount = 0.0;
                        inputs.use_weapon = false;
                        inputs.do_reload = true;
                    } else if dist > BOT_APPROACH_RANGE {
                        inputs.movement_angle = angle;
                        inputs.movement_amount = if facing < FRAC_PI_4 { 1.0 } else { 0.5 };
                        inputs.do_reload = false;
                        inputs.use_weapon = facing < BOT_FIRE_CONE && self.options.fire_bot_bullets;
                    } else if dist < BOT_RETREAT_RANGE {
                        inputs.movement_angle = angle + PI;
                        inputs.movement_amount = 1.0;
                        inputs.use_weapon = facing < BOT_FIRE_CONE && self.options.fire_bot_bullets;
                    } else {
                        inputs.movement_amount = 0.0;
                        inputs.use_weapon = facing < BOT_FIRE_CONE && self.options.fire_bot_bullets;
                    }
                }
            }
            self.set_player_inputs(bot_id, inputs);
        }
    }
}
