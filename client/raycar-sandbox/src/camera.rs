//! Third-person chase camera.

use bevy::prelude::*;

/// Plugin for the chase camera.
pub struct ChaseCameraPlugin;

impl Plugin for ChaseCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, chase_camera_system);
    }
}

/// Camera that trails behind `target`.
#[derive(Component, Clone, Debug)]
pub struct ChaseCamera {
    /// Entity being followed.
    pub target: Entity,
    /// Camera position in target-local space (x=right, y=up, -z=forward).
    pub camera_offset: Vec3,
    /// Look-at point in target-local space.
    pub look_target_offset: Vec3,
    /// Exponential smoothing rate, per second.
    pub smoothing: f32,
}

impl ChaseCamera {
    pub fn new(target: Entity) -> Self {
        Self {
            target,
            camera_offset: Vec3::new(0.0, 3.0, 8.0),
            look_target_offset: Vec3::new(0.0, 1.0, -2.0),
            smoothing: 8.0,
        }
    }
}

/// Ignores the target's roll and pitch so the view stays level on bumps.
fn yaw_only(rotation: Quat) -> Quat {
    let forward = rotation * Vec3::NEG_Z;
    let flat = Vec3::new(forward.x, 0.0, forward.z);
    if flat.length_squared() < 1e-6 {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(Vec3::NEG_Z, flat.normalize())
}

fn chase_camera_system(
    time: Res<Time>,
    mut cameras: Query<(&ChaseCamera, &mut Transform)>,
    targets: Query<&Transform, Without<ChaseCamera>>,
) {
    let blend = |rate: f32| 1.0 - (-rate * time.delta_secs()).exp();

    for (chase, mut camera_transform) in &mut cameras {
        let Ok(target) = targets.get(chase.target) else {
            continue;
        };

        let rotation = yaw_only(target.rotation);
        let camera_position = target.translation + rotation * chase.camera_offset;
        let look_target = target.translation + rotation * chase.look_target_offset;

        let t = blend(chase.smoothing);
        camera_transform.translation = camera_transform.translation.lerp(camera_position, t);

        let look_direction = (look_target - camera_transform.translation).normalize_or_zero();
        if look_direction != Vec3::ZERO {
            camera_transform.rotation = Transform::default()
                .looking_to(look_direction, Vec3::Y)
                .rotation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaw_only_drops_roll() {
        let rotation = Quat::from_rotation_y(0.7) * Quat::from_rotation_z(0.4);
        let flat = yaw_only(rotation);
        let up = flat * Vec3::Y;
        assert!((up - Vec3::Y).length() < 1e-5);
        let forward = flat * Vec3::NEG_Z;
        let expected = Quat::from_rotation_y(0.7) * Vec3::NEG_Z;
        assert!((forward - expected).length() < 1e-5);
    }
}
