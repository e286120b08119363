//! Property tests for the deterministic simulation core.
//!
//! These pin down the invariants the netcode depends on: bit-identical
//! replays, order-independent collision resolution, pool slot reuse, and
//! the swept tests that keep fast bullets from tunneling.

use shared::{
    tick_down, BulletSpawn, GameOptions, GamePhase, GameSimulation, PhysicsBody, PhysicsWorld,
    PlayerInputs,
};

fn match_game() -> GameSimulation {
    let mut options = GameOptions::authoritative();
    options.calculate_bots = false;
    options.consider_player_ping = false;
    let mut game = GameSimulation::new(options);
    game.set_phase(GamePhase::Match);
    game
}

/// Builds a two-player match and drives both players with the same scripted
/// inputs for `ticks` ticks.
fn run_scripted(ticks: u32) -> GameSimulation {
    let mut game = match_game();
    game.add_player(1, "one").expect("add player 1");
    game.add_player(2, "two").expect("add player 2");
    game.spawn_player(1).expect("spawn 1");
    game.spawn_player(2).expect("spawn 2");

    for tick in 0..ticks {
        let phase = tick as f32 * 0.1;
        game.set_player_inputs(
            1,
            PlayerInputs {
                movement_angle: phase.sin(),
                movement_amount: 1.0,
                aim_rotation: phase.cos(),
                use_weapon: tick % 7 == 0,
                ..Default::default()
            },
        );
        game.set_player_inputs(
            2,
            PlayerInputs {
                movement_angle: -phase.cos(),
                movement_amount: 0.8,
                aim_rotation: phase.sin(),
                use_weapon: tick % 5 == 0,
                ..Default::default()
            },
        );
        game.update();
    }
    game
}

/// TICK DETERMINISM: two freshly built simulations fed identical inputs
/// must agree bit-for-bit, or client prediction could never hold.
#[test]
fn identical_inputs_produce_bit_identical_state() {
    let a = run_scripted(120);
    let b = run_scripted(120);

    assert_eq!(a.tick_number, b.tick_number);
    assert_eq!(a.bullets.alive_count(), b.bullets.alive_count());

    for id in [1u32, 2u32] {
        let body_a = a.physics.body(id).expect("body in sim a");
        let body_b = b.physics.body(id).expect("body in sim b");
        // Bitwise, not approximate: f32 equality is the whole point.
        assert_eq!(body_a.position.x, body_b.position.x);
        assert_eq!(body_a.position.y, body_b.position.y);
        assert_eq!(body_a.velocity.x, body_b.velocity.x);
        assert_eq!(body_a.velocity.y, body_b.velocity.y);
        assert_eq!(
            a.players[&id].ship.rotation,
            b.players[&id].ship.rotation
        );
        assert_eq!(a.players[&id].ship.health, b.players[&id].ship.health);
    }
}

/// FLUSH ATOMICITY: a symmetric three-body overlap must resolve
/// symmetrically. A pass that committed writes mid-iteration would push the
/// middle body before its second contact resolved, breaking the symmetry.
#[test]
fn pairwise_resolution_is_order_independent() {
    let mut world = PhysicsWorld::new(20.0);
    for (id, x) in [(1u32, -30.0f32), (2, 0.0), (3, 30.0)] {
        let mut body = PhysicsBody::new(id);
        body.mass = 500.0;
        body.radius = 25.0;
        body.air_resistance = 0.0;
        body.collision.enabled = true;
        body.position.set(x, 0.0);
        world.add_body(body);
    }

    world.update(50.0);

    let left = world.body(1).expect("left body").position.x;
    let middle = world.body(2).expect("middle body").position.x;
    let right = world.body(3).expect("right body").position.x;

    // The middle body is squeezed equally from both sides and stays put;
    // the outer bodies mirror each other exactly.
    assert_eq!(middle, 0.0);
    assert_eq!(left, -right);
    assert!(left < -30.0);
}

/// BULLET POOL REUSE: a released slot is handed back with the same id and
/// fully overwritten kinematics.
#[test]
fn released_bullet_slot_is_recycled() {
    let mut world = PhysicsWorld::new(20.0);
    let mut pool = shared::BulletPool::new();

    let first = pool.acquire(&mut world, BulletSpawn::aimed(0.0, 0.0, 0.0, 40.0));
    pool.release(&mut world, first);

    let second = pool.acquire(&mut world, BulletSpawn::aimed(9.0, 9.0, 0.0, 10.0));
    assert_eq!(first, second);
    assert_eq!(pool.slot_count(), 1);

    let body = world.body(second).expect("bullet body");
    assert_eq!(body.position.x, 9.0);
    assert_eq!(body.velocity.x, 10.0);
}

/// TUNNELING GUARD: a bullet fast enough to cross the target's whole
/// diameter in one tick must still connect.
#[test]
fn fast_bullet_hits_through_full_diameter_crossing() {
    let mut game = match_game();
    game.add_player(1, "shooter").expect("add shooter");
    game.add_player(2, "target").expect("add target");
    game.spawn_player(1).expect("spawn shooter");
    game.spawn_player(2).expect("spawn target");

    // Park the shooter far out of the bullet's path, target on it.
    if let Some(body) = game.physics.body_mut(1) {
        body.position.set(0.0, 500.0);
        body.velocity.set(0.0, 0.0);
    }
    if let Some(body) = game.physics.body_mut(2) {
        body.position.set(500.0, 0.0);
        body.velocity.set(0.0, 0.0);
        body.radius = 20.0;
    }
    for id in [1u32, 2u32] {
        if let Some(player) = game.players.get_mut(&id) {
            player.ship.timers.invincibility = 0.0;
        }
    }
    let health_before = game.players[&2].ship.health;

    // 1000 units per tick: endpoints straddle the target without ever
    // overlapping it at a tick boundary.
    let mut spawn = BulletSpawn::aimed(0.0, 0.0, 0.0, 1000.0);
    spawn.owner = Some(1);
    spawn.damage = 10.0;
    game.bullets.acquire(&mut game.physics, spawn);

    game.update();

    assert_eq!(game.players[&2].ship.health, health_before - 10.0);
    assert_eq!(game.bullets.alive_count(), 0);
}

/// TIMER FLOOR CLAMP: counting down from zero stays at zero forever.
#[test]
fn tick_down_floor_clamps() {
    assert_eq!(tick_down(0.0, 50.0), 0.0);
    assert_eq!(tick_down(0.0, 1e9), 0.0);

    let mut value = 175.0;
    for _ in 0..100 {
        value = tick_down(value, 50.0);
        assert!(value >= 0.0);
    }
    assert_eq!(value, 0.0);
}

/// END-TO-END: two players 100 units apart, a 50-unit-per-tick bullet.
/// Tick one closes to 50 units (no contact), tick two crosses into the
/// target: exactly one damage instance, and the bullet is gone.
#[test]
fn two_player_fire_and_hit_scenario() {
    let mut game = match_game();
    game.add_player(1, "attacker").expect("add attacker");
    game.add_player(2, "defender").expect("add defender");
    game.spawn_player(1).expect("spawn attacker");
    game.spawn_player(2).expect("spawn defender");

    if let Some(body) = game.physics.body_mut(1) {
        body.position.set(0.0, 500.0);
        body.radius = 20.0;
    }
    if let Some(body) = game.physics.body_mut(2) {
        body.position.set(100.0, 0.0);
        body.radius = 20.0;
    }
    for id in [1u32, 2u32] {
        if let Some(player) = game.players.get_mut(&id) {
            player.ship.timers.invincibility = 0.0;
        }
    }
    let health_before = game.players[&2].ship.health;

    let mut spawn = BulletSpawn::aimed(0.0, 0.0, 0.0, 50.0);
    spawn.owner = Some(1);
    spawn.damage = 10.0;
    spawn.radius = 10.0;
    game.bullets.acquire(&mut game.physics, spawn);
    game.events.drain();

    let mut damage_events = 0;
    for _ in 0..2 {
        game.update();
        damage_events += game
            .events
            .drain()
            .iter()
            .filter(|e| matches!(e, shared::GameEvent::DealDamage { target: 2, .. }))
            .count();
    }

    assert_eq!(damage_events, 1);
    assert_eq!(game.players[&2].ship.health, health_before - 10.0);
    assert_eq!(game.bullets.alive_count(), 0);
    assert_eq!(game.players[&1].score.damage, 10.0);
}

/// Bullets die against thin segment walls even at speed.
#[test]
fn bullet_stops_on_segment_wall() {
    let mut game = match_game();
    // Foundry has segment walls at x = ±400.
    game.set_map(1);
    game.events.drain();

    let mut spawn = BulletSpawn::aimed(300.0, -500.0, 0.0, 300.0);
    spawn.owner = None;
    game.bullets.acquire(&mut game.physics, spawn);

    game.update();

    assert_eq!(game.bullets.alive_count(), 0);
}
