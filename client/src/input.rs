//! Keyboard/mouse sampling and input sequencing.
//!
//! WASD composes into a movement angle and amount, the mouse aims relative
//! to the screen center, and every outgoing input carries a sequence number
//! so the server can acknowledge how far it has processed.

use macroquad::prelude::*;
use shared::protocol::NetInputs;
use std::f32::consts::PI;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Keep-alive resend interval when inputs are unchanged.
const KEEPALIVE: Duration = Duration::from_millis(50);

pub struct InputManager {
    next_sequence: u32,
    current: NetInputs,
    last_sent: Instant,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            current: NetInputs {
                movement_angle: 0.0,
                movement_amount: 0.0,
                aim_rotation: 0.0,
                use_weapon: false,
                use_tactical: false,
                do_reload: false,
                spawn: false,
            },
            last_sent: Instant::now(),
        }
    }

    /// Samples the current frame's devices into an input state.
    pub fn sample(&self) -> NetInputs {
        let mut x: f32 = 0.0;
        let mut y: f32 = 0.0;
        if is_key_down(KeyCode::W) || is_key_down(KeyCode::Up) {
            y -= 1.0;
        }
        if is_key_down(KeyCode::S) || is_key_down(KeyCode::Down) {
            y += 1.0;
        }
        if is_key_down(KeyCode::A) || is_key_down(KeyCode::Left) {
            x -= 1.0;
        }
        if is_key_down(KeyCode::D) || is_key_down(KeyCode::Right) {
            x += 1.0;
        }
        let moving = x != 0.0 || y != 0.0;

        let (mx, my) = mouse_position();
        let aim = (my - screen_height() / 2.0).atan2(mx - screen_width() / 2.0);

        NetInputs {
            movement_angle: if moving {
                y.atan2(x)
            } else {
                self.current.movement_angle
            },
            movement_amount: if moving { 1.0 } else { 0.0 },
            aim_rotation: normalize_angle(aim),
            use_weapon: is_mouse_button_down(MouseButton::Left) || is_key_down(KeyCode::Space),
            use_tactical: is_mouse_button_down(MouseButton::Right)
                || is_key_down(KeyCode::LeftShift),
            do_reload: is_key_down(KeyCode::R),
            spawn: is_key_down(KeyCode::Enter),
        }
    }

    /// Returns a sequenced input to transmit if the state changed or the
    /// keep-alive interval elapsed.
    pub fn update(&mut self) -> (NetInputs, Option<(u32, u64, NetInputs)>) {
        let sampled = self.sample();

        let changed = sampled != self.current;
        let due = self.last_sent.elapsed() >= KEEPALIVE;
        self.current = sampled;

        if changed || due {
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            self.last_sent = Instant::now();
            (sampled, Some((sequence, now_ms(), sampled)))
        } else {
            (sampled, None)
        }
    }

    pub fn current(&self) -> NetInputs {
        self.current
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(PI * 2.0) - PI;
    if wrapped < -PI {
        wrapped + PI * 2.0
    } else {
        wrapped
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_start_at_one() {
        let manager = InputManager::new();
        assert_eq!(manager.next_sequence, 1);
        assert_eq!(manager.current().movement_amount, 0.0);
    }

    #[test]
    fn test_normalize_angle_wraps() {
        let a = normalize_angle(PI * 3.0);
        assert!((-PI..=PI).contains(&a));
        let b = normalize_angle(-PI * 2.5);
        assert!((-PI..=PI).contains(&b));
    }

    #[test]
    fn test_now_ms_monotonic() {
        let a = now_ms();
        std::thread::sleep(Duration::from_millis(2));
        assert!(now_ms() > a);
    }
}
