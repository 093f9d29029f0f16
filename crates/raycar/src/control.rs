//! Driver intent snapshot.
//!
//! Produced by whatever captures input; read once per physics step by the
//! controller.

use serde::{Deserialize, Serialize};

/// Discrete driver intents for a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    /// Forward throttle held.
    pub accelerate: bool,
    /// Brake / reverse held.
    pub brake: bool,
    /// Steer left held.
    pub turn_left: bool,
    /// Steer right held.
    pub turn_right: bool,
    /// Handbrake held.
    pub handbrake: bool,
    /// Shift up requested.
    pub gear_up: bool,
    /// Shift down requested.
    pub gear_down: bool,
}

impl ControlState {
    /// Clear every intent. Called when the input source loses focus.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Steering axis in `[-1, 1]`, positive = right.
    pub fn steer_axis(&self) -> f32 {
        axis(self.turn_right, self.turn_left)
    }

    /// Throttle axis in `[-1, 1]`, positive = forward.
    pub fn throttle_axis(&self) -> f32 {
        axis(self.accelerate, self.brake)
    }

    /// Whether any intent is held.
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

fn axis(positive: bool, negative: bool) -> f32 {
    f32::from(u8::from(positive)) - f32::from(u8::from(negative))
}
