//! Raycast vehicle sandbox using Bevy and Avian.
//!
//! Drives a single car around a demo track. WASD or arrows to drive, Space for
//! the handbrake, R to reset, F3 for collider gizmos, F5 to reload the track.

mod camera;
mod input;
mod launch_params;
mod physics;
mod track;
mod vehicle;

use bevy::prelude::*;
use camera::ChaseCameraPlugin;
use input::InputPlugin;
use physics::PhysicsIntegrationPlugin;
use raycar::telemetry::FileTelemetryOutput;
use track::TrackPlugin;
use vehicle::{SpawnSettings, VehiclePlugin, VehicleTelemetry};

/// Fixed physics step; brake forces are tuned against 60 Hz.
const FIXED_TIMESTEP: f64 = 1.0 / 60.0;

/// Plugin for the main application.
pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            PhysicsIntegrationPlugin,
            InputPlugin,
            TrackPlugin,
            VehiclePlugin,
            ChaseCameraPlugin,
        ))
        .insert_resource(Time::<Fixed>::from_seconds(FIXED_TIMESTEP))
        .add_systems(Startup, setup_scene);
    }
}

/// Sun and ambient light.
fn setup_scene(mut commands: Commands) {
    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.4, 0.0)),
    ));
    commands.insert_resource(ClearColor(Color::srgb(0.55, 0.7, 0.9)));

    tracing::info!("Scene setup complete - WASD to drive, Space for handbrake, R to reset");
}

fn main() {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let launch = launch_params::parse();

    let telemetry = match &launch.telemetry {
        Some(path) => match FileTelemetryOutput::create(path) {
            Ok(output) => VehicleTelemetry::to_file(output),
            Err(e) => {
                eprintln!("ERROR: failed to create {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => VehicleTelemetry::default(),
    };

    let mut app = App::new();

    let window = Window {
        title: "raycar-sandbox".to_string(),
        resolution: (1600, 900).into(),
        position: WindowPosition::Centered(MonitorSelection::Primary),
        ..Default::default()
    };

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }));

    app.insert_resource(SpawnSettings {
        params: launch.params,
        ..Default::default()
    })
    .insert_resource(telemetry)
    .add_plugins(AppPlugin)
    .run();
}
