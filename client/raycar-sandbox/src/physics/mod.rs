//! Physics integration using Avian 3D.
//!
//! Avian owns rigid bodies, colliders and contacts. The raycar simulation
//! context owns collider types and feedback; contacts are drained into it
//! after every physics step.

pub mod backend;
pub mod colliders;
pub mod contacts;

use avian3d::debug_render::{PhysicsDebugPlugin, PhysicsGizmos};
use avian3d::prelude::*;
use bevy::color::palettes::css::YELLOW;
use bevy::gizmos::config::{GizmoConfig, GizmoConfigStore};
use bevy::prelude::*;
use raycar::{ColliderPresets, Simulation};

pub use backend::AvianBackend;
pub use contacts::VehicleFeedback;

/// Physics layers, in the same bit order as the raycar collision groups.
#[derive(PhysicsLayer, Clone, Copy, Debug, Default)]
pub enum GameLayer {
    /// Drivable surfaces; the only layer wheel rays hit.
    #[default]
    Ground,
    /// Vehicle chassis.
    Vehicle,
    /// Track boundaries.
    Rail,
    /// Checkpoint sensors.
    Checkpoint,
}

/// Collision classification and feedback state for the world.
#[derive(Resource, Default)]
pub struct SimulationState(pub Simulation);

/// Collider construction constants.
#[derive(Resource, Default, Clone, Debug)]
pub struct Presets(pub ColliderPresets);

/// Plugin for physics integration.
pub struct PhysicsIntegrationPlugin;

impl Plugin for PhysicsIntegrationPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PhysicsPlugins::default())
            .add_plugins(PhysicsDebugPlugin)
            .init_resource::<SimulationState>()
            .init_resource::<Presets>()
            .init_resource::<contacts::ActiveScrapes>()
            .add_message::<VehicleFeedback>()
            .add_systems(Startup, configure_physics_debug_on_startup)
            .add_systems(
                FixedPostUpdate,
                contacts::dispatch_contacts.after(PhysicsSystems::Last),
            )
            .add_systems(Update, (contacts::track_scrapes, toggle_physics_debug));
    }
}

/// Collider gizmos start hidden.
fn configure_physics_debug_on_startup(mut config_store: ResMut<GizmoConfigStore>) {
    let physics_gizmos = PhysicsGizmos {
        collider_color: Some(YELLOW.into()),
        sleeping_color_multiplier: None,
        ..Default::default()
    };
    let gizmo_config = GizmoConfig {
        enabled: false,
        depth_bias: -1.0,
        ..Default::default()
    };
    config_store.insert(gizmo_config, physics_gizmos);
}

/// Toggle collider gizmos with F3.
fn toggle_physics_debug(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut config_store: ResMut<GizmoConfigStore>,
) {
    if !keyboard.just_pressed(KeyCode::F3) {
        return;
    }
    let (config, _) = config_store.config_mut::<PhysicsGizmos>();
    config.enabled = !config.enabled;
    tracing::info!(enabled = config.enabled, "Collider gizmos toggled");
}
