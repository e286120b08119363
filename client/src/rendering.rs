//! Debug-quality world rendering with macroquad.
//!
//! The camera hangs over the local player and everything is primitive
//! shapes; this view exists to exercise the netcode, not to ship.

use macroquad::prelude::*;
use shared::{GamePhase, GameSimulation, PlayerId, TICKS_PER_SECOND};

const BACKGROUND: Color = Color::new(0.08, 0.08, 0.1, 1.0);
const WALL_COLOR: Color = Color::new(0.35, 0.35, 0.4, 1.0);
const BOUNDS_COLOR: Color = Color::new(0.25, 0.25, 0.3, 1.0);
const LOCAL_COLOR: Color = GREEN;
const REMOTE_COLOR: Color = Color::new(1.0, 0.3, 0.3, 1.0);
const BOT_COLOR: Color = Color::new(1.0, 0.7, 0.2, 1.0);
const BULLET_COLOR: Color = YELLOW;

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, game: &GameSimulation, local_id: Option<PlayerId>, ping_ms: f32) {
        clear_background(BACKGROUND);

        let (cam_x, cam_y) = local_id
            .and_then(|id| game.players.get(&id))
            .and_then(|p| game.physics.body(p.ship.body))
            .map(|b| (b.position.x, b.position.y))
            .unwrap_or((0.0, 0.0));
        let offset_x = screen_width() / 2.0 - cam_x;
        let offset_y = screen_height() / 2.0 - cam_y;

        self.draw_bounds(game, offset_x, offset_y);
        self.draw_walls(game, offset_x, offset_y);
        self.draw_bullets(game, offset_x, offset_y);
        self.draw_players(game, local_id, offset_x, offset_y);
        self.draw_hud(game, local_id, ping_ms);
    }

    fn draw_bounds(&self, game: &GameSimulation, ox: f32, oy: f32) {
        let b = game.map().bounds;
        draw_rectangle_lines(
            b.min_x + ox,
            b.min_y + oy,
            b.max_x - b.min_x,
            b.max_y - b.min_y,
            3.0,
            BOUNDS_COLOR,
        );
    }

    fn draw_walls(&self, game: &GameSimulation, ox: f32, oy: f32) {
        for wall in game.physics.rect_walls() {
            draw_rectangle(
                wall.min_x + ox,
                wall.min_y + oy,
                wall.max_x - wall.min_x,
                wall.max_y - wall.min_y,
                WALL_COLOR,
            );
        }
        for wall in game.physics.seg_walls() {
            draw_line(
                wall.x1 + ox,
                wall.y1 + oy,
                wall.x2 + ox,
                wall.y2 + oy,
                4.0,
                WALL_COLOR,
            );
        }
    }

    fn draw_bullets(&self, game: &GameSimulation, ox: f32, oy: f32) {
        for bullet in game.bullets.iter_alive() {
            if let Some(body) = game.physics.body(bullet.id) {
                draw_circle(body.position.x + ox, body.position.y + oy, 4.0, BULLET_COLOR);
            }
        }
    }

    fn draw_players(&self, game: &GameSimulation, local_id: Option<PlayerId>, ox: f32, oy: f32) {
        for player in game.players.values() {
            if !player.spawned {
                continue;
            }
            let Some(body) = game.physics.body(player.ship.body) else {
                continue;
            };
            let x = body.position.x + ox;
            let y = body.position.y + oy;

            let color = if Some(player.id) == local_id {
                LOCAL_COLOR
            } else if player.bot {
                BOT_COLOR
            } else {
                REMOTE_COLOR
            };

            // Invincible ships flicker.
            if player.ship.timers.invincibility > 0.0 && game.tick_number % 4 < 2 {
                continue;
            }

            draw_circle(x, y, body.radius, color);
            // Aim indicator.
            let nose_x = x + player.ship.rotation.cos() * body.radius * 1.4;
            let nose_y = y + player.ship.rotation.sin() * body.radius * 1.4;
            draw_line(x, y, nose_x, nose_y, 2.0, WHITE);

            // Name and health bar.
            draw_text(&player.name, x - 20.0, y - body.radius - 14.0, 16.0, GRAY);
            let health_frac = player.ship.health / player.ship.stats.defense.health;
            draw_rectangle(x - 20.0, y - body.radius - 10.0, 40.0, 4.0, DARKGRAY);
            draw_rectangle(
                x - 20.0,
                y - body.radius - 10.0,
                40.0 * health_frac,
                4.0,
                GREEN,
            );
        }
    }

    fn draw_hud(&self, game: &GameSimulation, local_id: Option<PlayerId>, ping_ms: f32) {
        let phase = match game.phase {
            GamePhase::Setup => "waiting".to_string(),
            GamePhase::Countdown => format!(
                "starting in {:.0}s",
                game.countdown as f32 / TICKS_PER_SECOND
            ),
            GamePhase::Match => "match".to_string(),
            GamePhase::Results => "results".to_string(),
        };
        draw_text(&phase, 10.0, 20.0, 20.0, WHITE);
        draw_text(&format!("ping {:.0}ms", ping_ms), 10.0, 40.0, 20.0, GRAY);

        if let Some(player) = local_id.and_then(|id| game.players.get(&id)) {
            if player.spawned {
                let ammo = if player.ship.is_reloading() {
                    "reloading".to_string()
                } else {
                    format!(
                        "ammo {}/{}",
                        player.ship.weapon_ammo, player.ship.stats.weapon.capacity
                    )
                };
                draw_text(&ammo, 10.0, 60.0, 20.0, GRAY);
                draw_text(
                    &format!("hp {:.0}", player.ship.health),
                    10.0,
                    80.0,
                    20.0,
                    GRAY,
                );
            } else {
                let hint = if player.spawn_timeout_ms > 0.0 {
                    format!("respawn in {:.1}s", player.spawn_timeout_ms / 1000.0)
                } else {
                    "press Enter to spawn".to_string()
                };
                draw_text(&hint, 10.0, 60.0, 20.0, WHITE);
            }
            draw_text(
                &format!(
                    "k/d {} / {}",
                    player.score.kills, player.score.deaths
                ),
                10.0,
                100.0,
                20.0,
                GRAY,
            );
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
