//! Ship classes as data: a base stat tree plus per-class patches.
//!
//! Every leaf of the nested tree is either overridden by the class patch or
//! inherited from the base, never a partial group. The merge runs once when
//! the catalog is built; the resulting [`ShipStats`] snapshots are immutable.

use std::sync::OnceLock;

use crate::math::tick_down;
use crate::physics::BodyId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimStats {
    /// Turn responsiveness factor in `[0, 1]`.
    pub speed: f32,
    /// Higher accuracy converges the aim onto the target angle faster.
    pub accuracy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementStats {
    /// Acceleration per tick at full input.
    pub acceleration: f32,
    /// Top speed in world units per tick.
    pub speed: f32,
    /// Off-axis control retention in `[0, 1]`.
    pub agility: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    pub capacity: u32,
    /// Milliseconds between shots.
    pub rate_ms: f32,
    pub reload_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TacticalStats {
    pub capacity: u32,
    pub rate_ms: f32,
    pub reload_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletStats {
    /// World units per tick.
    pub speed: f32,
    pub radius: f32,
    pub damage: f32,
    pub lifespan_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefenseStats {
    pub health: f32,
    /// Quiet time after taking damage before regeneration starts.
    pub regen_rest_ms: f32,
    /// Interval between regeneration ticks once resting is over.
    pub regen_interval_ms: f32,
}

/// Immutable stat snapshot for one ship class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipStats {
    pub aim: AimStats,
    pub movement: MovementStats,
    pub weapon: WeaponStats,
    pub tactical: TacticalStats,
    pub bullet: BulletStats,
    pub defense: DefenseStats,
}

impl ShipStats {
    pub fn base() -> Self {
        Self {
            aim: AimStats {
                speed: 0.8,
                accuracy: 0.95,
            },
            movement: MovementStats {
                acceleration: 3.0,
                speed: 15.0,
                agility: 0.6,
            },
            weapon: WeaponStats {
                capacity: 20,
                rate_ms: 150.0,
                reload_ms: 1000.0,
            },
            tactical: TacticalStats {
                capacity: 3,
                rate_ms: 1000.0,
                reload_ms: 5000.0,
            },
            bullet: BulletStats {
                speed: 20.0,
                radius: 10.0,
                damage: 10.0,
                lifespan_ms: 5000.0,
            },
            defense: DefenseStats {
                health: 100.0,
                regen_rest_ms: 3000.0,
                regen_interval_ms: 200.0,
            },
        }
    }

    /// Base stats with every `Some` leaf of the patch applied.
    pub fn merged(patch: &ShipStatsPatch) -> Self {
        let base = Self::base();
        Self {
            aim: AimStats {
                speed: patch.aim.speed.unwrap_or(base.aim.speed),
                accuracy: patch.aim.accuracy.unwrap_or(base.aim.accuracy),
            },
            movement: MovementStats {
                acceleration: patch
                    .movement
                    .acceleration
                    .unwrap_or(base.movement.acceleration),
                speed: patch.movement.speed.unwrap_or(base.movement.speed),
                agility: patch.movement.agility.unwrap_or(base.movement.agility),
            },
            weapon: WeaponStats {
                capacity: patch.weapon.capacity.unwrap_or(base.weapon.capacity),
                rate_ms: patch.weapon.rate_ms.unwrap_or(base.weapon.rate_ms),
                reload_ms: patch.weapon.reload_ms.unwrap_or(base.weapon.reload_ms),
            },
            tactical: TacticalStats {
                capacity: patch.tactical.capacity.unwrap_or(base.tactical.capacity),
                rate_ms: patch.tactical.rate_ms.unwrap_or(base.tactical.rate_ms),
                reload_ms: patch.tactical.reload_ms.unwrap_or(base.tactical.reload_ms),
            },
            bullet: BulletStats {
                speed: patch.bullet.speed.unwrap_or(base.bullet.speed),
                radius: patch.bullet.radius.unwrap_or(base.bullet.radius),
                damage: patch.bullet.damage.unwrap_or(base.bullet.damage),
                lifespan_ms: patch.bullet.lifespan_ms.unwrap_or(base.bullet.lifespan_ms),
            },
            defense: DefenseStats {
                health: patch.defense.health.unwrap_or(base.defense.health),
                regen_rest_ms: patch
                    .defense
                    .regen_rest_ms
                    .unwrap_or(base.defense.regen_rest_ms),
                regen_interval_ms: patch
                    .defense
                    .regen_interval_ms
                    .unwrap_or(base.defense.regen_interval_ms),
            },
        }
    }
}

/// Optional override for every leaf of [`ShipStats`], mirroring its shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShipStatsPatch {
    pub aim: AimPatch,
    pub movement: MovementPatch,
    pub weapon: WeaponPatch,
    pub tactical: TacticalPatch,
    pub bullet: BulletPatch,
    pub defense: DefensePatch,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AimPatch {
    pub speed: Option<f32>,
    pub accuracy: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MovementPatch {
    pub acceleration: Option<f32>,
    pub speed: Option<f32>,
    pub agility: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WeaponPatch {
    pub capacity: Option<u32>,
    pub rate_ms: Option<f32>,
    pub reload_ms: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TacticalPatch {
    pub capacity: Option<u32>,
    pub rate_ms: Option<f32>,
    pub reload_ms: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BulletPatch {
    pub speed: Option<f32>,
    pub radius: Option<f32>,
    pub damage: Option<f32>,
    pub lifespan_ms: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefensePatch {
    pub health: Option<f32>,
    pub regen_rest_ms: Option<f32>,
    pub regen_interval_ms: Option<f32>,
}

/// A named ship class in the catalog.
#[derive(Debug, Clone)]
pub struct ShipClass {
    pub name: &'static str,
    pub stats: ShipStats,
}

/// The static class table. Variants are data, not subclasses.
pub fn ship_classes() -> &'static [ShipClass] {
    static CLASSES: OnceLock<Vec<ShipClass>> = OnceLock::new();
    CLASSES.get_or_init(|| {
        vec![
            ShipClass {
                name: "Vanguard",
                stats: ShipStats::base(),
            },
            ShipClass {
                name: "Dart",
                stats: ShipStats::merged(&ShipStatsPatch {
                    movement: MovementPatch {
                        acceleration: Some(4.0),
                        speed: Some(18.0),
                        agility: Some(0.75),
                    },
                    weapon: WeaponPatch {
                        capacity: Some(14),
                        rate_ms: Some(120.0),
                        reload_ms: None,
                    },
                    bullet: BulletPatch {
                        damage: Some(7.0),
                        ..Default::default()
                    },
                    defense: DefensePatch {
                        health: Some(70.0),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
            },
            ShipClass {
                name: "Bulwark",
                stats: ShipStats::merged(&ShipStatsPatch {
                    aim: AimPatch {
                        speed: None,
                        accuracy: Some(0.85),
                    },
                    movement: MovementPatch {
                        acceleration: Some(2.2),
                        speed: Some(11.0),
                        agility: Some(0.45),
                    },
                    weapon: WeaponPatch {
                        capacity: Some(28),
                        rate_ms: Some(220.0),
                        reload_ms: Some(1400.0),
                    },
                    bullet: BulletPatch {
                        damage: Some(14.0),
                        radius: Some(12.0),
                        ..Default::default()
                    },
                    defense: DefensePatch {
                        health: Some(150.0),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
            },
        ]
    })
}

/// Countdown timers attached to a ship, all in milliseconds and all
/// floor-clamped at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShipTimers {
    pub weapon_rate: f32,
    pub weapon_reload: f32,
    pub tactical_rate: f32,
    pub tactical_reload: f32,
    pub regen_rest: f32,
    pub regen_heal: f32,
    pub invincibility: f32,
}

impl ShipTimers {
    pub fn tick(&mut self, delta_ms: f32) {
        self.weapon_rate = tick_down(self.weapon_rate, delta_ms);
        self.weapon_reload = tick_down(self.weapon_reload, delta_ms);
        self.tactical_rate = tick_down(self.tactical_rate, delta_ms);
        self.tactical_reload = tick_down(self.tactical_reload, delta_ms);
        self.regen_rest = tick_down(self.regen_rest, delta_ms);
        self.regen_heal = tick_down(self.regen_heal, delta_ms);
        self.invincibility = tick_down(self.invincibility, delta_ms);
    }
}

/// A player's ship: derived movement/aim state on top of a physics body.
#[derive(Debug, Clone)]
pub struct Ship {
    /// Id of the backing body in the physics world.
    pub body: BodyId,
    /// Current aim rotation, smoothed toward `target_rotation` each tick.
    pub rotation: f32,
    pub target_rotation: f32,
    pub stats: ShipStats,
    pub health: f32,
    pub weapon_ammo: u32,
    pub tactical_ammo: u32,
    pub timers: ShipTimers,
}

impl Ship {
    pub fn new(body: BodyId, stats: ShipStats) -> Self {
        Self {
            body,
            rotation: 0.0,
            target_rotation: 0.0,
            stats,
            health: stats.defense.health,
            weapon_ammo: stats.weapon.capacity,
            tactical_ammo: stats.tactical.capacity,
            timers: ShipTimers::default(),
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.timers.weapon_reload > 0.0
    }

    pub fn can_fire(&self) -> bool {
        self.weapon_ammo > 0 && self.timers.weapon_rate == 0.0 && !self.is_reloading()
    }

    pub fn can_start_reload(&self) -> bool {
        self.weapon_ammo < self.stats.weapon.capacity && !self.is_reloading()
    }

    pub fn can_use_tactical(&self) -> bool {
        self.tactical_ammo > 0
            && self.timers.tactical_rate == 0.0
            && self.timers.tactical_reload == 0.0
    }
}
