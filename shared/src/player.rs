//! Player records: inputs, score, spawn lifecycle, and the position-state
//! ring buffer that backs both lag compensation and client reconciliation.

use std::collections::VecDeque;

use crate::math::radian_difference;
use crate::ship::Ship;

pub type PlayerId = u32;

/// How many per-tick snapshots each player keeps, newest first.
pub const MAX_POSITION_STATES: usize = 8;

/// One committed tick of a player's kinematic state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub rotation: f32,
}

/// The full input state a player holds between ticks. Inputs are levels,
/// not edges: the simulation reads whatever is current each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInputs {
    pub movement_angle: f32,
    /// Clamped into `[0, 1]` at application time.
    pub movement_amount: f32,
    pub aim_rotation: f32,
    pub use_weapon: bool,
    pub use_tactical: bool,
    pub do_reload: bool,
    /// Request to (re)spawn once the timeout allows it.
    pub spawn: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerScore {
    pub kills: u32,
    pub assists: u32,
    pub deaths: u32,
    pub damage: f32,
}

#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub ship: Ship,
    pub ship_index: usize,
    pub inputs: PlayerInputs,
    pub score: PlayerScore,
    position_states: VecDeque<PositionState>,
    pub spawned: bool,
    /// Milliseconds until this player may respawn.
    pub spawn_timeout_ms: f32,
    pub team: u8,
    pub idle: bool,
    pub ping_ms: f32,
    pub bot: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, ship: Ship, ship_index: usize) -> Self {
        Self {
            id,
            name,
            ship,
            ship_index,
            inputs: PlayerInputs::default(),
            score: PlayerScore::default(),
            position_states: VecDeque::with_capacity(MAX_POSITION_STATES),
            spawned: false,
            spawn_timeout_ms: 0.0,
            team: 0,
            idle: false,
            ping_ms: 0.0,
            bot: false,
        }
    }

    pub fn reset_score(&mut self) {
        self.score = PlayerScore::default();
    }

    /// Pushes this tick's committed state onto the ring, evicting the
    /// oldest entry once the buffer is full.
    pub fn track_position_state(&mut self, state: PositionState) {
        if self.position_states.len() >= MAX_POSITION_STATES {
            self.position_states.pop_back();
        }
        self.position_states.push_front(state);
    }

    pub fn latest_position_state(&self) -> Option<PositionState> {
        self.position_states.front().copied()
    }

    /// Historical state `index` ticks ago, linearly interpolated between the
    /// two bracketing snapshots. Index 0 is the newest entry; fractional
    /// indices blend. Rotation interpolates along the shortest angular path
    /// so a lookback across the ±PI seam doesn't spin the ship.
    pub fn lookback_state(&self, index: f32) -> Option<PositionState> {
        let newest = self.position_states.front()?;
        let index = index.clamp(0.0, (self.position_states.len() - 1) as f32);
        let from = index.floor() as usize;
        let to = index.ceil() as usize;
        if from == to {
            return self.position_states.get(from).copied();
        }

        let (Some(a), Some(b)) = (self.position_states.get(from), self.position_states.get(to))
        else {
            return Some(*newest);
        };
        let frac = index - from as f32;
        Some(PositionState {
            x: a.x + (b.x - a.x) * frac,
            y: a.y + (b.y - a.y) * frac,
            vx: a.vx + (b.vx - a.vx) * frac,
            vy: a.vy + (b.vy - a.vy) * frac,
            rotation: a.rotation + radian_difference(a.rotation, b.rotation) * frac,
        })
    }

    pub fn position_state_count(&self) -> usize {
        self.position_states.len()
    }
}

/// Strips a display name down to safe characters, capped at 16.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ship::ShipStats;
    use assert_approx_eq::assert_approx_eq;
    use std::f32::consts::PI;

    fn player() -> Player {
        Player::new(1, "pilot".to_string(), Ship::new(1, ShipStats::base()), 0)
    }

    fn state(x: f32) -> PositionState {
        PositionState {
            x,
            y: x * 2.0,
            vx: 1.0,
            vy: 0.0,
            rotation: 0.0,
        }
    }

    #[test]
    fn test_ring_buffer_caps_at_eight() {
        let mut p = player();
        for i in 0..12 {
            p.track_position_state(state(i as f32));
        }

        assert_eq!(p.position_state_count(), MAX_POSITION_STATES);
        // Newest first.
        assert_eq!(p.latest_position_state().map(|s| s.x), Some(11.0));
        // Oldest surviving entry is 11 - 7 = 4.
        assert_eq!(p.lookback_state(7.0).map(|s| s.x), Some(4.0));
    }

    #[test]
    fn test_lookback_interpolates_between_snapshots() {
        let mut p = player();
        p.track_position_state(state(100.0));
        p.track_position_state(state(110.0));

        // Index 0.5 blends the newest (110) and the previous (100).
        let half = p.lookback_state(0.5).expect("history present");
        assert_approx_eq!(half.x, 105.0, 1e-4);
        assert_approx_eq!(half.y, 210.0, 1e-4);
    }

    #[test]
    fn test_lookback_clamps_out_of_range_index() {
        let mut p = player();
        p.track_position_state(state(1.0));
        p.track_position_state(state(2.0));

        assert_eq!(p.lookback_state(-3.0).map(|s| s.x), Some(2.0));
        assert_eq!(p.lookback_state(99.0).map(|s| s.x), Some(1.0));
    }

    #[test]
    fn test_lookback_empty_history() {
        let p = player();
        assert!(p.lookback_state(0.0).is_none());
    }

    #[test]
    fn test_rotation_interpolates_across_pi_seam() {
        let mut p = player();
        let mut near_pi = state(0.0);
        near_pi.rotation = PI - 0.1;
        let mut past_pi = state(0.0);
        past_pi.rotation = -PI + 0.1;
        p.track_position_state(near_pi);
        p.track_position_state(past_pi);

        let mid = p.lookback_state(0.5).expect("history present");
        // Halfway across the seam, not halfway through zero.
        assert!(mid.rotation.abs() > PI - 0.2);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("pilot_7"), "pilot_7");
        assert_eq!(sanitize_name("  sp ace!@#"), "space");
        assert_eq!(
            sanitize_name("averyveryverylongcallsign"),
            "averyveryverylon"
        );
    }
}
