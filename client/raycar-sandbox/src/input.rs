//! Driver input mapping.
//!
//! Keys are bound with `leafwing-input-manager` and folded into a raycar
//! [`ControlState`] once per frame. Losing window focus clears every key.

use bevy::{prelude::*, window::WindowFocused};
use leafwing_input_manager::{plugin::InputManagerSystem, prelude::*};
use raycar::ControlState;

// ============================================================================
// Action enums
// ============================================================================

/// Actions for driving.
#[derive(Actionlike, PartialEq, Eq, Hash, Clone, Copy, Debug, Reflect)]
pub enum DriveAction {
    /// W / Up.
    Accelerate,
    /// S / Down. Brakes while rolling forward, reverses when stopped.
    Brake,
    /// A / Left.
    TurnLeft,
    /// D / Right.
    TurnRight,
    /// Space.
    Handbrake,
    /// E.
    GearUp,
    /// Q.
    GearDown,
    /// R: put the car back on its wheels at the start.
    Reset,
}

// ============================================================================
// Input maps
// ============================================================================

/// Create the default input map for driving.
pub fn default_drive_input_map() -> InputMap<DriveAction> {
    InputMap::default()
        .with(DriveAction::Accelerate, KeyCode::KeyW)
        .with(DriveAction::Accelerate, KeyCode::ArrowUp)
        .with(DriveAction::Brake, KeyCode::KeyS)
        .with(DriveAction::Brake, KeyCode::ArrowDown)
        .with(DriveAction::TurnLeft, KeyCode::KeyA)
        .with(DriveAction::TurnLeft, KeyCode::ArrowLeft)
        .with(DriveAction::TurnRight, KeyCode::KeyD)
        .with(DriveAction::TurnRight, KeyCode::ArrowRight)
        .with(DriveAction::Handbrake, KeyCode::Space)
        .with(DriveAction::GearUp, KeyCode::KeyE)
        .with(DriveAction::GearDown, KeyCode::KeyQ)
        .with(DriveAction::Reset, KeyCode::KeyR)
}

/// Current keys for one vehicle.
#[derive(Component, Default, Clone, Copy, Debug)]
pub struct DriverControls(pub ControlState);

// ============================================================================
// Plugin
// ============================================================================

/// Plugin that registers drive actions and feeds [`DriverControls`].
pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(InputManagerPlugin::<DriveAction>::default())
            .add_systems(
                PreUpdate,
                (read_drive_actions, reset_on_focus_loss)
                    .chain()
                    .after(InputManagerSystem::Update),
            );
    }
}

/// Map held actions to a control state.
pub fn control_state(actions: &ActionState<DriveAction>) -> ControlState {
    ControlState {
        accelerate: actions.pressed(&DriveAction::Accelerate),
        brake: actions.pressed(&DriveAction::Brake),
        turn_left: actions.pressed(&DriveAction::TurnLeft),
        turn_right: actions.pressed(&DriveAction::TurnRight),
        handbrake: actions.pressed(&DriveAction::Handbrake),
        gear_up: actions.pressed(&DriveAction::GearUp),
        gear_down: actions.pressed(&DriveAction::GearDown),
    }
}

fn read_drive_actions(mut query: Query<(&ActionState<DriveAction>, &mut DriverControls)>) {
    for (actions, mut controls) in &mut query {
        controls.0 = control_state(actions);
    }
}

fn reset_on_focus_loss(
    mut focus: MessageReader<WindowFocused>,
    mut query: Query<(&mut ActionState<DriveAction>, &mut DriverControls)>,
) {
    if !focus.read().any(|event| !event.focused) {
        return;
    }
    for (mut actions, mut controls) in &mut query {
        actions.reset_all();
        controls.0.reset();
    }
    tracing::debug!("Window lost focus; driver controls cleared");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_state_from_actions() {
        let mut actions = ActionState::<DriveAction>::default();
        actions.press(&DriveAction::Accelerate);
        actions.press(&DriveAction::TurnRight);

        let controls = control_state(&actions);
        assert!(controls.accelerate);
        assert!(controls.turn_right);
        assert!(!controls.brake);
        assert_eq!(controls.steer_axis(), 1.0);
    }
}
