//! Raycast vehicles on Avian rigid bodies.
//!
//! A vehicle is spawned as a dynamic chassis body carrying a
//! [`PendingVehicle`]. On the first fixed step the raycar controller is built
//! against the live physics world; from then on it runs every fixed step
//! before Avian integrates.

use std::f32::consts::FRAC_PI_2;

use avian3d::prelude::*;
use bevy::prelude::*;
use leafwing_input_manager::prelude::*;
use raycar::{
    ColliderBuilder, VehicleController, VehicleParams,
    backend::MassProperties,
    params::WHEEL_COUNT,
    telemetry::{FileTelemetryOutput, TelemetrySnapshot, emit_telemetry_to, reset_telemetry_to},
};

use crate::{
    camera::ChaseCamera,
    input::{DriveAction, DriverControls, default_drive_input_map},
    physics::{
        AvianBackend, Presets, SimulationState,
        colliders::build_collider,
        contacts::{body_id, collider_id},
    },
};

/// Plugin for vehicle spawning and stepping.
pub struct VehiclePlugin;

impl Plugin for VehiclePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<VehicleTelemetry>()
            .add_systems(Startup, spawn_vehicle)
            .add_systems(
                FixedPreUpdate,
                (attach_controllers, drive_vehicles)
                    .chain()
                    .before(PhysicsSystems::Prepare),
            )
            .add_systems(Update, (reset_vehicle, sync_visuals));
    }
}

// ============================================================================
// Components and resources
// ============================================================================

/// What to spawn at startup.
#[derive(Resource, Clone, Debug)]
pub struct SpawnSettings {
    pub params: VehicleParams,
    pub position: Vec3,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            params: VehicleParams::default(),
            position: Vec3::new(0.0, 1.5, 0.0),
        }
    }
}

/// A chassis waiting for its controller.
#[derive(Component)]
pub struct PendingVehicle(pub VehicleParams);

/// A driven vehicle.
#[derive(Component)]
pub struct Vehicle {
    pub controller: VehicleController,
    mass: MassProperties,
    spawn: Vec3,
}

/// Visual for one wheel of `vehicle`.
#[derive(Component)]
pub struct WheelVisual {
    pub vehicle: Entity,
    pub index: usize,
}

/// Visual body of `vehicle`.
#[derive(Component)]
pub struct ChassisVisual {
    pub vehicle: Entity,
}

/// Optional CSV telemetry for the driven vehicle.
#[derive(Resource, Default)]
pub struct VehicleTelemetry {
    output: Option<FileTelemetryOutput>,
    elapsed: f32,
}

impl VehicleTelemetry {
    /// Write rows to `output`, starting with a header.
    pub fn to_file(mut output: FileTelemetryOutput) -> Self {
        reset_telemetry_to(&mut output);
        Self {
            output: Some(output),
            elapsed: 0.0,
        }
    }
}

// ============================================================================
// Spawning
// ============================================================================

fn spawn_vehicle(
    mut commands: Commands,
    settings: Res<SpawnSettings>,
    presets: Res<Presets>,
    mut simulation: ResMut<SimulationState>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let params = &settings.params;
    let descriptor = ColliderBuilder::new(presets.0.clone()).chassis(params);
    let mut bundle = build_collider(&descriptor, &presets.0);
    bundle.transform = Transform::from_translation(settings.position);

    let chassis = commands
        .spawn((
            bundle,
            RigidBody::Dynamic,
            Position(settings.position),
            Mass(params.chassis_mass),
            LinearDamping(params.linear_damping),
            AngularDamping(params.angular_damping),
            CollisionEventsEnabled,
            PendingVehicle(params.clone()),
            DriverControls::default(),
            default_drive_input_map(),
        ))
        .id();
    simulation
        .0
        .register_vehicle(body_id(chassis), collider_id(chassis));

    let body_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.8, 0.15, 0.1),
        ..default()
    });
    let size = params.chassis_half_extents * 2.0;
    commands
        .spawn((
            ChassisVisual { vehicle: chassis },
            Transform::from_translation(settings.position),
            Visibility::default(),
        ))
        .with_child((
            Mesh3d(meshes.add(Cuboid::new(size.x, size.y, size.z))),
            MeshMaterial3d(body_material),
            Transform::from_translation(params.visual_offset),
        ));

    let wheel_mesh = meshes.add(Cylinder::new(params.wheel_radius, params.wheel_width));
    let wheel_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.1, 0.1, 0.1),
        ..default()
    });
    for index in 0..WHEEL_COUNT {
        commands
            .spawn((
                WheelVisual {
                    vehicle: chassis,
                    index,
                },
                Transform::from_translation(settings.position),
                Visibility::default(),
            ))
            .with_child((
                Mesh3d(wheel_mesh.clone()),
                MeshMaterial3d(wheel_material.clone()),
                // Cylinders are Y-up; axles run along X.
                Transform::from_rotation(Quat::from_rotation_z(FRAC_PI_2)),
            ));
    }

    let chase = ChaseCamera::new(chassis);
    let eye = settings.position + chase.camera_offset;
    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(eye).looking_at(settings.position, Vec3::Y),
        chase,
    ));

    tracing::info!(
        position = ?settings.position,
        drive = ?params.drive_type,
        "Vehicle spawned"
    );
}

/// Build controllers for newly spawned chassis.
///
/// A chassis whose controller cannot be built is removed; there is no
/// half-working vehicle.
#[allow(clippy::type_complexity)]
fn attach_controllers(
    mut commands: Commands,
    pipeline: Res<SpatialQueryPipeline>,
    mut simulation: ResMut<SimulationState>,
    query: Query<
        (
            Entity,
            &PendingVehicle,
            &Position,
            &Rotation,
            &LinearVelocity,
            &AngularVelocity,
        ),
        Without<Vehicle>,
    >,
) {
    for (entity, pending, position, rotation, linear, angular) in &query {
        let params = pending.0.clone();
        let mass = MassProperties::solid_box(params.chassis_mass, params.chassis_half_extents);
        let backend =
            AvianBackend::new(&pipeline, entity, position, rotation, linear, angular, mass);

        match VehicleController::new(params, &backend) {
            Ok(controller) => {
                commands
                    .entity(entity)
                    .remove::<PendingVehicle>()
                    .insert(Vehicle {
                        controller,
                        mass,
                        spawn: position.0,
                    });
            }
            Err(e) => {
                tracing::error!(error = %e, "Vehicle construction failed; removing chassis");
                simulation.0.dispose_vehicle(body_id(entity));
                commands.entity(entity).despawn();
            }
        }
    }
}

// ============================================================================
// Stepping
// ============================================================================

#[allow(clippy::type_complexity)]
fn drive_vehicles(
    time: Res<Time<Fixed>>,
    pipeline: Res<SpatialQueryPipeline>,
    mut telemetry: ResMut<VehicleTelemetry>,
    mut query: Query<(
        Entity,
        &mut Vehicle,
        &DriverControls,
        &Position,
        &Rotation,
        &mut LinearVelocity,
        &mut AngularVelocity,
    )>,
) {
    let dt = time.delta_secs();
    let telemetry = &mut *telemetry;

    for (entity, mut vehicle, controls, position, rotation, mut linear, mut angular) in &mut query {
        let vehicle = &mut *vehicle;
        vehicle.controller.set_controls(&controls.0);

        let mut backend = AvianBackend::new(
            &pipeline,
            entity,
            position,
            rotation,
            &linear,
            &angular,
            vehicle.mass,
        );
        let report = vehicle.controller.step(&mut backend, dt);
        if report.skipped {
            continue;
        }

        let velocity = backend.velocity();
        linear.0 = velocity.linear;
        angular.0 = velocity.angular;

        if let Some(output) = &mut telemetry.output {
            telemetry.elapsed += report.dt;
            let snapshot = TelemetrySnapshot::capture(
                telemetry.elapsed,
                &report,
                &vehicle.controller,
                &backend.pose(),
                &velocity,
            );
            emit_telemetry_to(&snapshot, output);
        }
    }
}

/// Put the vehicle back at its spawn point, upright and at rest.
fn reset_vehicle(
    mut query: Query<(
        &Vehicle,
        &ActionState<DriveAction>,
        &mut Position,
        &mut Rotation,
        &mut LinearVelocity,
        &mut AngularVelocity,
    )>,
) {
    for (vehicle, actions, mut position, mut rotation, mut linear, mut angular) in &mut query {
        if !actions.just_pressed(&DriveAction::Reset) {
            continue;
        }
        position.0 = vehicle.spawn;
        rotation.0 = Quat::IDENTITY;
        linear.0 = Vec3::ZERO;
        angular.0 = Vec3::ZERO;
        tracing::info!("Vehicle reset");
    }
}

/// Move chassis and wheel visuals to the latest simulated poses.
#[allow(clippy::type_complexity)]
fn sync_visuals(
    vehicles: Query<(&Vehicle, &Position, &Rotation)>,
    mut chassis_visuals: Query<(&ChassisVisual, &mut Transform), Without<WheelVisual>>,
    mut wheel_visuals: Query<(&WheelVisual, &mut Transform), Without<ChassisVisual>>,
) {
    for (visual, mut transform) in &mut chassis_visuals {
        let Ok((vehicle, position, rotation)) = vehicles.get(visual.vehicle) else {
            continue;
        };
        let pose = vehicle.controller.chassis_visual_pose(&raycar::ChassisPose {
            position: position.0,
            rotation: rotation.0,
        });
        transform.translation = pose.position;
        transform.rotation = pose.rotation;
    }

    for (visual, mut transform) in &mut wheel_visuals {
        let Ok((vehicle, _, _)) = vehicles.get(visual.vehicle) else {
            continue;
        };
        let wheel = &vehicle.controller.wheels()[visual.index];
        transform.translation = wheel.world_position;
        transform.rotation = wheel.world_rotation;
    }
}
