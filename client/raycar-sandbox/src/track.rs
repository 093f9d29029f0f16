//! Demo track: a straight road between two rails with one checkpoint.
//!
//! Objects are described as named scene meshes and go through the same
//! name-based classification a loaded level would. F5 tears the track down and
//! builds it again.

use avian3d::prelude::*;
use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
};
use raycar::{
    ColliderBuilder, ColliderPresets, CollisionType, MeshSource, Simulation, build_track,
    collider::{HeightfieldSource, ObjectTransform},
    collision::ContactPhase,
};

use crate::physics::{
    Presets, SimulationState,
    colliders::build_collider,
    contacts::{body_id, collider_id},
};

/// Road length along Z.
const TRACK_LENGTH: f32 = 160.0;
/// Distance between the two rails.
const TRACK_WIDTH: f32 = 14.0;
/// Heightfield samples per side.
const TERRAIN_SAMPLES: usize = 9;

/// Plugin for the demo track.
pub struct TrackPlugin;

impl Plugin for TrackPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (subscribe_checkpoint_log, spawn_track))
            .add_systems(Update, reload_track);
    }
}

/// Marks entities owned by the current track.
#[derive(Component)]
pub struct TrackEntity;

// ============================================================================
// Scene description
// ============================================================================

/// Vertices and triangle indices of an axis-aligned box.
fn box_mesh(half_extents: Vec3) -> (Vec<Vec3>, Vec<u32>) {
    let h = half_extents;
    let vertices = vec![
        Vec3::new(-h.x, -h.y, -h.z),
        Vec3::new(h.x, -h.y, -h.z),
        Vec3::new(h.x, h.y, -h.z),
        Vec3::new(-h.x, h.y, -h.z),
        Vec3::new(-h.x, -h.y, h.z),
        Vec3::new(h.x, -h.y, h.z),
        Vec3::new(h.x, h.y, h.z),
        Vec3::new(-h.x, h.y, h.z),
    ];
    let indices = vec![
        0, 2, 1, 0, 3, 2, // -z
        4, 5, 6, 4, 6, 7, // +z
        0, 1, 5, 0, 5, 4, // -y
        3, 7, 6, 3, 6, 2, // +y
        0, 4, 7, 0, 7, 3, // -x
        1, 2, 6, 1, 6, 5, // +x
    ];
    (vertices, indices)
}

/// Named objects making up the demo track.
pub fn demo_track_objects() -> Vec<MeshSource> {
    let half_width = TRACK_WIDTH * 0.5;
    let half_length = TRACK_LENGTH * 0.5;

    let (road_vertices, road_indices) = {
        let (x, z) = (half_width + 4.0, half_length);
        (
            vec![
                Vec3::new(-x, 0.0, -z),
                Vec3::new(x, 0.0, -z),
                Vec3::new(x, 0.0, z),
                Vec3::new(-x, 0.0, z),
            ],
            vec![0, 2, 1, 0, 3, 2],
        )
    };
    let road = MeshSource::new("Road", ObjectTransform::default())
        .with_geometry(road_vertices, Some(road_indices));

    let (rail_vertices, rail_indices) = box_mesh(Vec3::new(0.25, 0.5, half_length));
    let rails = [("Rail_Left", -half_width), ("Rail_Right", half_width)].map(|(name, x)| {
        MeshSource::new(
            name,
            ObjectTransform::from_translation(Vec3::new(x, 0.5, 0.0)),
        )
        .with_geometry(rail_vertices.clone(), Some(rail_indices.clone()))
    });

    let (gate_vertices, _) = box_mesh(Vec3::new(half_width, 2.0, 0.5));
    let checkpoint = MeshSource::new(
        "Gate",
        ObjectTransform::from_translation(Vec3::new(0.0, 2.0, -half_length * 0.5)),
    )
    .with_geometry(gate_vertices, None)
    .with_parent("Checkpoint_01");

    let (lamp_vertices, lamp_indices) = box_mesh(Vec3::new(0.1, 3.0, 0.1));
    let lamp = MeshSource::new(
        "LampPost",
        ObjectTransform::from_translation(Vec3::new(half_width + 2.0, 3.0, -10.0)),
    )
    .with_geometry(lamp_vertices, Some(lamp_indices));

    let [left, right] = rails;
    vec![road, left, right, checkpoint, lamp]
}

/// Level elevation grid under the road.
pub fn demo_heightfield() -> HeightfieldSource {
    HeightfieldSource {
        rows: TERRAIN_SAMPLES,
        cols: TERRAIN_SAMPLES,
        heights: vec![0.0; TERRAIN_SAMPLES * TERRAIN_SAMPLES],
        size: Vec2::splat(TRACK_LENGTH + 40.0),
    }
}

// ============================================================================
// Spawning
// ============================================================================

fn subscribe_checkpoint_log(mut simulation: ResMut<SimulationState>) {
    simulation.0.classifier.subscribe(
        CollisionType::Vehicle,
        CollisionType::Checkpoint,
        |event, _| {
            if event.phase != ContactPhase::Begin {
                return;
            }
            let vehicle = if event.type_a == Some(CollisionType::Vehicle) {
                event.body_a
            } else {
                event.body_b
            };
            tracing::info!(vehicle = vehicle.0, "Checkpoint crossed");
        },
    );
}

fn spawn_track(
    mut commands: Commands,
    presets: Res<Presets>,
    mut simulation: ResMut<SimulationState>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    spawn_track_entities(
        &mut commands,
        &presets.0,
        &mut simulation.0,
        &mut meshes,
        &mut materials,
    );
}

fn spawn_track_entities(
    commands: &mut Commands,
    presets: &ColliderPresets,
    simulation: &mut Simulation,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let objects = demo_track_objects();
    let builder = ColliderBuilder::new(presets.clone());
    let track = match build_track(&builder, &objects, Some(&demo_heightfield())) {
        Ok(track) => track,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build track colliders");
            return;
        }
    };

    for descriptor in &track.colliders {
        let bundle = build_collider(descriptor, presets);
        let (position, rotation) = bundle.pose();
        let mut entity = commands.spawn((
            TrackEntity,
            RigidBody::Static,
            bundle,
            position,
            rotation,
        ));
        if descriptor.sensor {
            entity.insert((Sensor, CollisionEventsEnabled));
        }
        let id = entity.id();
        if !simulation.register_track_collider(
            collider_id(id),
            body_id(id),
            descriptor.collision_type,
        ) {
            tracing::warn!(object = %descriptor.source_name, "Collider registered twice");
        }
    }

    let material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.45, 0.45, 0.5),
        perceptual_roughness: 0.9,
        ..default()
    });
    for object in &objects {
        let (Some(transform), Some(indices)) = (object.transform, object.indices.as_ref()) else {
            continue;
        };
        let mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::default(),
        )
        .with_inserted_attribute(
            Mesh::ATTRIBUTE_POSITION,
            object
                .vertices
                .iter()
                .map(|&v| transform.orient(v).to_array())
                .collect::<Vec<_>>(),
        )
        .with_inserted_indices(Indices::U32(indices.clone()))
        .with_duplicated_vertices()
        .with_computed_flat_normals();

        commands.spawn((
            TrackEntity,
            Mesh3d(meshes.add(mesh)),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(transform.translation),
        ));
    }

    tracing::info!(
        colliders = simulation.track_collider_count(),
        skipped = ?track.skipped,
        "Track spawned"
    );
}

/// Rebuild the track on F5.
fn reload_track(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut simulation: ResMut<SimulationState>,
    presets: Res<Presets>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    entities: Query<Entity, With<TrackEntity>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let removed = simulation.0.dispose_track();
    for entity in &entities {
        commands.entity(entity).despawn();
    }
    tracing::info!(colliders = removed.len(), "Track disposed");

    spawn_track_entities(
        &mut commands,
        &presets.0,
        &mut simulation.0,
        &mut meshes,
        &mut materials,
    );
}
